use rocket::Route;

mod auth;
mod public;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(public::routes());
    routes.extend(auth::routes());
    routes.extend(voting::routes());
    routes
}
