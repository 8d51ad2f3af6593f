use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rand::{distributions::Alphanumeric, Rng};
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;

pub const LOGIN_COOKIE: &str = "login";

const RANDOM_LENGTH: usize = 32;

/// An in-flight provider login: the `state` we expect back on the redirect
/// and the `nonce` we expect inside the identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginChallenge {
    pub state: String,
    pub nonce: String,
}

impl LoginChallenge {
    /// Create a new challenge with random state and nonce.
    pub fn new() -> Self {
        Self {
            state: random_string(),
            nonce: random_string(),
        }
    }

    // Challenge serialization never fails.
    #[allow(clippy::missing_panics_doc)]
    /// Convert into a cookie. It must be added as a private cookie.
    pub fn into_cookie(self, config: &Config) -> Cookie<'static> {
        let claims = Claims {
            challenge: self,
            expire_at: Utc::now() + config.login_ttl(),
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .expect("JWT encoding is infallible with default settings");

        // Must survive the cross-site redirect back from the provider.
        Cookie::build((LOGIN_COOKIE, token))
            .max_age(Duration::seconds(config.login_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Lax)
            .build()
    }

    /// Deserialize a challenge from a cookie.
    pub fn from_cookie(cookie: &Cookie<'_>, config: &Config) -> Result<Self, Error> {
        let challenge = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.challenge)?;
        Ok(challenge)
    }

    /// Check the `state` echoed back by the provider belongs to this login.
    pub fn check_state(&self, state: &str) -> Result<(), Error> {
        if self.state == state {
            Ok(())
        } else {
            Err(Error::Authentication(
                "Login state does not match".to_string(),
            ))
        }
    }
}

impl Default for LoginChallenge {
    fn default() -> Self {
        Self::new()
    }
}

fn random_string() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_LENGTH)
        .map(char::from)
        .collect()
}

/// Cookie claims: the challenge itself plus an expiry datetime.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    challenge: LoginChallenge,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for LoginChallenge {
    type Error = Error;

    /// Get the challenge from the private login cookie.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let cookie = match req.cookies().get_private(LOGIN_COOKIE) {
            Some(cookie) => cookie,
            None => {
                return Outcome::Error((
                    Status::Unauthorized,
                    Error::Authentication("No login in progress".to_string()),
                ))
            }
        };

        match Self::from_cookie(&cookie, config) {
            Ok(challenge) => Outcome::Success(challenge),
            Err(e) => Outcome::Error((
                Status::Unauthorized,
                Error::Authentication(format!("Bad login cookie: {e}")),
            )),
        }
    }
}
