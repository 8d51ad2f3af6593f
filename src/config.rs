use chrono::Duration;
use mongodb::{Client as MongoClient, Database};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::error::Result;
use crate::identity::{google::GoogleProvider, Provider};
use crate::model::{
    db::candidate::{Candidate, CandidateCore, NewCandidate},
    mongodb::{ensure_candidate_id_counter_exists, ensure_indexes_exist, Coll},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    login_ttl: u32,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// Valid lifetime of session cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// How long a user has to complete a provider login, in seconds.
    pub fn login_ttl(&self) -> Duration {
        Duration::seconds(self.login_ttl.into())
    }

    /// Secret key used to sign session and login-state JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    /// Candidates to put on the ballot when the store is empty.
    /// Falls back to [`CandidateCore::default_ballot`].
    seed_candidates: Option<Vec<NewCandidate>>,
    // secrets
    db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places both a `Client` and a `Database`
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        // Create indexes and put the candidates on the ballot.
        let ballot = config
            .seed_candidates
            .unwrap_or_else(CandidateCore::default_ballot);
        if let Err(e) = prepare_database(&db, &ballot).await {
            error!("Failed to prepare database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Ensure indexes and counters exist, and seed the ballot if there are no
/// candidates yet.
///
/// This operation is idempotent.
pub async fn prepare_database(db: &Database, ballot: &[NewCandidate]) -> Result<()> {
    ensure_indexes_exist(db).await?;
    let counters = Coll::from_db(db);
    ensure_candidate_id_counter_exists(&counters).await?;
    Candidate::seed_if_empty(&Coll::from_db(db), &counters, ballot).await?;
    Ok(())
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "votebox".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
pub(crate) fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

/// The default OpenID discovery document location.
fn google_discovery_url() -> String {
    "https://accounts.google.com/.well-known/openid-configuration".to_string()
}

/// Configuration for the Google identity provider.
#[derive(Deserialize)]
pub struct GoogleConfig {
    // non-secrets
    /// Externally visible base URL of this server, used to build the
    /// redirect URI registered with Google.
    pub public_url: String,
    #[serde(default = "google_discovery_url")]
    pub oidc_discovery_url: String,
    pub google_client_id: String,
    // secrets
    pub google_client_secret: String,
}

impl GoogleConfig {
    /// Where Google sends the user back to after they sign in.
    pub fn redirect_uri(&self) -> String {
        format!("{}/auth/google", self.public_url.trim_end_matches('/'))
    }
}

/// A fairing that loads the Google config and places the identity provider
/// into managed state.
pub struct IdentityFairing;

#[rocket::async_trait]
impl Fairing for IdentityFairing {
    fn info(&self) -> Info {
        Info {
            name: "Google Sign-In",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<GoogleConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load identity provider config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        // Construct the client.
        let provider = match GoogleProvider::new(config) {
            Ok(provider) => provider,
            Err(e) => {
                error!("Failed to build identity provider client: {e}");
                return Err(rocket);
            }
        };
        info!("Loaded Google Sign-In config");

        // Manage the state.
        let provider: Provider = Box::new(provider);
        rocket = rocket.manage(provider);
        Ok(rocket)
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Config {
        pub fn example() -> Self {
            Self::example_with_secret("test-jwt-secret")
        }

        pub fn example_with_secret(secret: &str) -> Self {
            Self {
                auth_ttl: 3600,
                login_ttl: 600,
                jwt_secret: secret.to_string(),
            }
        }
    }
}
