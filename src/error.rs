use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::Error as DbError;
use reqwest::Error as HttpError;
use rocket::{http::Status, response::Responder, Request};
use std::fmt::Display;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("Identity provider request failed: {0}")]
    Provider(#[from] HttpError),
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a [`Error::NotFound`] naming the missing thing.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// The HTTP status this error should be reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Internal(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::Provider(_) => Status::BadGateway,
            Self::Authentication(_) | Self::Unauthorized(_) => Status::Unauthorized,
            Self::NotFound(_) => Status::NotFound,
            Self::Conflict(_) => Status::Conflict,
        }
    }
}

impl Error {
    /// Log this error at a level matching its status: server errors at
    /// `error`, client errors at `warn`.
    pub fn log(&self, context: impl Display) {
        if self.status().code >= 500 {
            error!("{context}: {self}");
        } else {
            warn!("{context}: {self}");
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        self.log(format_args!("{} {}", req.method(), req.uri()));
        Err(self.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_taxonomy() {
        assert_eq!(
            Error::Authentication("bad code".into()).status(),
            Status::Unauthorized
        );
        assert_eq!(
            Error::Unauthorized("no session".into()).status(),
            Status::Unauthorized
        );
        assert_eq!(Error::not_found("Candidate 9").status(), Status::NotFound);
        assert_eq!(Error::Conflict("race".into()).status(), Status::Conflict);
        assert_eq!(
            Error::Internal("oops".into()).status(),
            Status::InternalServerError
        );
    }

    #[test]
    fn expired_session_is_unauthorized() {
        let expired: JwtError = JwtErrorKind::ExpiredSignature.into();
        assert_eq!(Error::from(expired).status(), Status::Unauthorized);

        let garbled: JwtError = JwtErrorKind::InvalidToken.into();
        assert_eq!(Error::from(garbled).status(), Status::BadRequest);
    }
}
