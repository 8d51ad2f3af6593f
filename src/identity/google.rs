use std::time::Duration;

use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use reqwest::{Client as HttpClient, Url};
use rocket::tokio::sync::{OnceCell, RwLock};
use serde::Deserialize;

use crate::config::GoogleConfig;
use crate::error::{Error, Result};

use super::{IdentityClaims, IdentityProvider, VerifiedIdentity};

/// Scopes requested from Google: enough for a verified email and a name.
const SCOPES: &str = "openid email profile";

/// Google also issues tokens with the scheme-less issuer.
const LEGACY_ISSUER: &str = "accounts.google.com";

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// The parts of the OpenID discovery document we use.
#[derive(Debug, Clone, Deserialize)]
struct Discovery {
    issuer: String,
    authorization_endpoint: String,
    token_endpoint: String,
    jwks_uri: String,
}

/// Token endpoint response. We only need the identity token.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
}

/// Google Sign-In via the OpenID Connect authorization-code flow.
///
/// The discovery document is fetched on first use and kept for the life of
/// the process. Signing keys are cached and refetched when a token names a
/// key we haven't seen, since Google rotates them.
pub struct GoogleProvider {
    config: GoogleConfig,
    http: HttpClient,
    discovery: OnceCell<Discovery>,
    keys: RwLock<Option<JwkSet>>,
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig) -> Result<Self> {
        let http = HttpClient::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            config,
            http,
            discovery: OnceCell::new(),
            keys: RwLock::new(None),
        })
    }

    async fn discovery(&self) -> Result<&Discovery> {
        self.discovery
            .get_or_try_init(|| async {
                debug!("Fetching {}", self.config.oidc_discovery_url);
                let discovery = self
                    .http
                    .get(&self.config.oidc_discovery_url)
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<Discovery>()
                    .await?;
                Ok::<_, Error>(discovery)
            })
            .await
    }

    /// Find the decoding key with the given ID, refreshing the key set once
    /// if it isn't cached.
    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey> {
        if let Some(keys) = self.keys.read().await.as_ref() {
            if let Some(jwk) = keys.find(kid) {
                return Ok(DecodingKey::from_jwk(jwk)?);
            }
        }

        let jwks_uri = &self.discovery().await?.jwks_uri;
        debug!("Refreshing signing keys from {jwks_uri}");
        let fresh = self
            .http
            .get(jwks_uri)
            .send()
            .await?
            .error_for_status()?
            .json::<JwkSet>()
            .await?;
        let key = fresh.find(kid).map(DecodingKey::from_jwk).transpose()?;
        *self.keys.write().await = Some(fresh);

        key.ok_or_else(|| {
            Error::Authentication(format!("Identity token signed with unknown key {kid}"))
        })
    }

    /// Check the identity token's signature, audience, issuer, expiry and
    /// nonce, and read the identity out of it.
    pub async fn verify_id_token(&self, id_token: &str, nonce: &str) -> Result<VerifiedIdentity> {
        let header = decode_header(id_token)
            .map_err(|e| Error::Authentication(format!("Malformed identity token: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(Error::Authentication(format!(
                "Identity token uses unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| Error::Authentication("Identity token has no key ID".to_string()))?;
        let key = self.decoding_key(&kid).await?;

        let issuer = &self.discovery().await?.issuer;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.config.google_client_id]);
        validation.set_issuer(&[issuer.as_str(), LEGACY_ISSUER]);

        let claims = decode::<IdentityClaims>(id_token, &key, &validation)
            .map_err(|e| Error::Authentication(format!("Invalid identity token: {e}")))?
            .claims;
        claims.into_identity(nonce)
    }
}

/// Build the URL of Google's consent screen for this login attempt.
fn authorization_url(
    endpoint: &str,
    config: &GoogleConfig,
    state: &str,
    nonce: &str,
) -> Result<String> {
    let url = Url::parse_with_params(
        endpoint,
        &[
            ("response_type", "code"),
            ("client_id", config.google_client_id.as_str()),
            ("redirect_uri", config.redirect_uri().as_str()),
            ("scope", SCOPES),
            ("state", state),
            ("nonce", nonce),
        ],
    )
    .map_err(|e| Error::Internal(format!("Bad authorization endpoint {endpoint}: {e}")))?;
    Ok(url.into())
}

#[rocket::async_trait]
impl IdentityProvider for GoogleProvider {
    async fn authorization_url(&self, state: &str, nonce: &str) -> Result<String> {
        let discovery = self.discovery().await?;
        authorization_url(&discovery.authorization_endpoint, &self.config, state, nonce)
    }

    async fn exchange_code(&self, code: &str, nonce: &str) -> Result<VerifiedIdentity> {
        let token_endpoint = &self.discovery().await?.token_endpoint;
        let redirect_uri = self.config.redirect_uri();
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.google_client_id.as_str()),
            ("client_secret", self.config.google_client_secret.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
        ];
        // Whatever goes wrong redeeming the code, the user is not signed in.
        let response = self
            .http
            .post(token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Authentication(format!("Token exchange failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Authentication(format!(
                "Token exchange rejected ({status}): {body}"
            )));
        }
        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| Error::Authentication(format!("Malformed token response: {e}")))?;

        let id_token = token.id_token.ok_or_else(|| {
            Error::Authentication("Token response has no identity token".to_string())
        })?;
        self.verify_id_token(&id_token, nonce).await
    }
}
