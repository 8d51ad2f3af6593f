#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, DatabaseFairing, IdentityFairing};
use crate::logging::LoggerFairing;

mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod model;

pub use config::Config;

/// Build the server: config, database, identity provider, logging, routes.
pub async fn build() -> Rocket<Build> {
    rocket::build()
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(IdentityFairing)
        .attach(LoggerFairing)
        .mount("/", api::routes())
}

/// Connect to the database named by `db_uri`, for tests.
#[cfg(test)]
async fn db_client() -> mongodb::Client {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .unwrap();
    mongodb::Client::with_uri_str(db_uri).await.unwrap()
}

/// A fresh, randomly named database, for tests.
#[cfg(test)]
fn database() -> String {
    config::get_database_name()
}

/// A server using the given database and identity provider, with the
/// default ballot seeded, for tests.
#[cfg(test)]
async fn rocket_for_db_and_provider(
    client: mongodb::Client,
    db_name: &str,
    provider: identity::Provider,
) -> Rocket<Build> {
    let db = client.database(db_name);
    config::prepare_database(&db, &model::db::candidate::CandidateCore::default_ballot())
        .await
        .unwrap();

    rocket::build()
        .attach(ConfigFairing)
        .attach(LoggerFairing)
        .manage(client)
        .manage(db)
        .manage(provider)
        .mount("/", api::routes())
}
