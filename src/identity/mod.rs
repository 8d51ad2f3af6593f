//! Sign-in through an external OpenID Connect identity provider.

use serde::Deserialize;

use crate::error::{Error, Result};

pub mod google;

/// The identity provider in managed state.
pub type Provider = Box<dyn IdentityProvider>;

/// An identity the provider has vouched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub email: String,
    pub name: String,
}

/// An external service that signs users in via the authorization-code flow.
#[rocket::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The URL to send the user to in order to sign in. The provider echoes
    /// `state` back on the redirect and embeds `nonce` in the identity token.
    async fn authorization_url(&self, state: &str, nonce: &str) -> Result<String>;

    /// Redeem an authorization code and verify the identity token it yields.
    async fn exchange_code(&self, code: &str, nonce: &str) -> Result<VerifiedIdentity>;
}

/// The identity claims we read from a verified ID token.
/// Signature, audience, issuer and expiry are checked by the caller.
#[derive(Debug, Deserialize)]
pub struct IdentityClaims {
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    pub name: Option<String>,
    pub nonce: Option<String>,
}

impl IdentityClaims {
    /// Check the claims belong to this login attempt and carry a verified
    /// email, yielding the identity.
    pub fn into_identity(self, expected_nonce: &str) -> Result<VerifiedIdentity> {
        if self.nonce.as_deref() != Some(expected_nonce) {
            return Err(Error::Authentication(
                "Identity token nonce does not match login".to_string(),
            ));
        }
        let email = self
            .email
            .filter(|email| !email.is_empty())
            .ok_or_else(|| Error::Authentication("Identity token has no email".to_string()))?;
        if !self.email_verified {
            return Err(Error::Authentication(format!(
                "Email {email} is not verified by the provider"
            )));
        }
        let name = self
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| email.clone());
        Ok(VerifiedIdentity { email, name })
    }
}
