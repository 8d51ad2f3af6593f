use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::logging::SessionUser;
use crate::model::{
    db::user::User,
    mongodb::{Coll, Id},
};

use super::identifiable::Identifiable;

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// A session token: proof that the bearer signed in as a specific user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub id: Id,
}

impl AuthToken {
    /// Create a new [`AuthToken`] bound to the given user.
    pub fn new(user: &impl Identifiable) -> Self {
        Self { id: user.id() }
    }

    #[allow(clippy::missing_panics_doc)]
    /// Serialize this token into a signed cookie.
    pub fn into_cookie(self, config: &Config) -> Cookie<'static> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .expect("JWT encoding is infallible with default settings");

        // Lax rather than Strict: the first request after signing in is the
        // tail of a redirect chain that started at the identity provider.
        Cookie::build((AUTH_TOKEN_COOKIE, token))
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Lax)
            .build()
    }

    /// Deserialize a token from a cookie, checking its signature and expiry.
    pub fn from_cookie(cookie: &Cookie<'_>, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.token)?;
        Ok(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    token: AuthToken,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie and check the user it names still exists.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let cookie = match req.cookies().get(AUTH_TOKEN_COOKIE) {
            Some(cookie) => cookie,
            None => {
                return Outcome::Error((
                    Status::Unauthorized,
                    Error::Unauthorized("Not signed in".to_string()),
                ))
            }
        };

        // Decode the token.
        let token = match Self::from_cookie(cookie, config) {
            Ok(token) => token,
            Err(e) => {
                return Outcome::Error((
                    Status::Unauthorized,
                    Error::Unauthorized(format!("Bad session cookie: {e}")),
                ))
            }
        };

        // Check the user actually exists.
        let users = req.guard::<Coll<User>>().await.unwrap();
        match users.find_one(token.id.as_doc(), None).await {
            Ok(Some(_)) => {
                req.local_cache(|| SessionUser(Some(token.id)));
                Outcome::Success(token)
            }
            Ok(None) => Outcome::Error((
                Status::Unauthorized,
                Error::Unauthorized(format!("Session for unknown user {}", token.id)),
            )),
            Err(e) => Outcome::Error((Status::InternalServerError, e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_round_trip() {
        let config = Config::example();
        let token = AuthToken { id: Id::new() };

        let cookie = token.into_cookie(&config);
        assert_eq!(cookie.name(), AUTH_TOKEN_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));

        let decoded = AuthToken::from_cookie(&cookie, &config).unwrap();
        assert_eq!(decoded, token);
    }

    #[test]
    fn cookie_signed_with_other_secret_is_rejected() {
        let token = AuthToken { id: Id::new() };
        let cookie = token.into_cookie(&Config::example_with_secret("someone else"));
        assert!(AuthToken::from_cookie(&cookie, &Config::example()).is_err());
    }

    #[test]
    fn expired_cookie_is_rejected() {
        let config = Config::example();
        let claims = Claims {
            token: AuthToken { id: Id::new() },
            expire_at: Utc::now() - chrono::Duration::hours(1),
        };
        let value = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .unwrap();
        let cookie = Cookie::new(AUTH_TOKEN_COOKIE, value);
        assert!(AuthToken::from_cookie(&cookie, &config).is_err());
    }
}
