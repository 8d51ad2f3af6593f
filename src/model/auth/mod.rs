mod identifiable;
mod login;
mod token;

pub use identifiable::Identifiable;
pub use login::{LoginChallenge, LOGIN_COOKIE};
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
