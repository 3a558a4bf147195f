//! Client authentication
//!
//! The access token lives in a [`Credentials`] capability owned by
//! [`PbiClient`]. Every request reads the token from there; nothing refreshes
//! it implicitly. Callers decide when to (re)authenticate.
//!
//! # Methods
//!
//! - [authenticate](PbiClient::authenticate) - fetch a token with the configured client credentials
//! - [authenticate_with](PbiClient::authenticate_with) - fetch a token from any [`TokenProvider`]
//! - [set_token](PbiClient::set_token) - install a token obtained elsewhere
//! - [clear_token](PbiClient::clear_token) - discard the current token
//! - [has_valid_token](PbiClient::has_valid_token) - check for an unexpired token
//!

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer};
use snafu::prelude::*;
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Result, config::TOKEN_EXPIRY_SKEW_SECS, prelude::*};

/// Bearer token used for API requests. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccessToken {
    secret: String,
    #[zeroize(skip)]
    expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AccessToken {
    /// Creates a token with no known expiry.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expires_at: None,
        }
    }

    /// Creates a token that expires at `expires_at`.
    pub fn with_expiry(secret: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: secret.into(),
            expires_at: Some(expires_at),
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// True if the token has a known expiry that is already past (with skew).
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| {
            Utc::now() + Duration::seconds(TOKEN_EXPIRY_SKEW_SECS) >= exp
        })
    }

    pub(crate) fn set_auth_header(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(&self.secret)
    }
}

/// Source of access tokens.
#[allow(async_fn_in_trait)]
pub trait TokenProvider {
    /// Obtains a fresh token.
    async fn fetch_token(&self) -> Result<AccessToken>;
}

/// Holds the current access token for one client.
///
/// A single read/write lock protects the token so concurrent requests can
/// share a client.
#[derive(Debug, Default)]
pub struct Credentials {
    token: RwLock<Option<AccessToken>>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: AccessToken) {
        *self.token.write() = Some(token);
    }

    pub fn clear(&self) {
        *self.token.write() = None;
    }

    /// Returns true if a token is present and not expired.
    pub fn has_valid_token(&self) -> bool {
        self.token.read().as_ref().is_some_and(|t| !t.is_expired())
    }

    /// Returns the current token, or `Unauthorized` if it is missing or expired.
    pub(crate) fn current(&self) -> Result<AccessToken> {
        match self.token.read().as_ref() {
            Some(token) if !token.is_expired() => Ok(token.clone()),
            Some(_) => {
                debug!("access token expired");
                Err(PbiError::Unauthorized)
            }
            None => Err(PbiError::Unauthorized),
        }
    }
}

/// OAuth2 client-credentials grant against the Azure AD v1 token endpoint.
#[derive(Clone)]
pub struct ClientCredentials {
    http: reqwest::Client,
    authority_url: String,
    tenant_id: String,
    client_id: String,
    client_secret: zeroize::Zeroizing<String>,
    resource: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("authority_url", &self.authority_url)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default, deserialize_with = "de_lenient_secs")]
    expires_in: Option<i64>,
}

// the v1 endpoint returns expires_in as a string; v2 returns a number
fn de_lenient_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

impl ClientCredentials {
    pub fn new(
        http: reqwest::Client,
        authority_url: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            http,
            authority_url: authority_url.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: zeroize::Zeroizing::new(client_secret.into()),
            resource: resource.into(),
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/token",
            self.authority_url.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

impl TokenProvider for ClientCredentials {
    async fn fetch_token(&self) -> Result<AccessToken> {
        let url = self.token_url();
        debug!(%url, client_id = %self.client_id, "requesting access token");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("resource", self.resource.as_str()),
        ];
        let response = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .context(HttpSnafu {
                method: "post",
                url: &url,
            })?;
        let status = response.status();
        let body = response.bytes().await.context(HttpSnafu {
            method: "post",
            url: &url,
        })?;
        if !status.is_success() {
            return AuthSnafu {
                message: format!(
                    "token endpoint returned {}: {}",
                    status.as_u16(),
                    String::from_utf8_lossy(&body)
                ),
            }
            .fail();
        }
        let parsed: TokenResponse = serde_json::from_slice(&body).context(DeserializationSnafu)?;
        ensure!(
            !parsed.access_token.is_empty(),
            AuthSnafu {
                message: "token endpoint returned an empty access_token"
            }
        );
        info!("access token obtained");
        Ok(match parsed.expires_in {
            Some(secs) => {
                AccessToken::with_expiry(parsed.access_token, Utc::now() + Duration::seconds(secs))
            }
            None => AccessToken::new(parsed.access_token),
        })
    }
}

impl PbiClient {
    /// Fetches a token with the client credentials from the configuration and
    /// stores it for subsequent requests.
    ///
    /// # Errors
    /// - [`PbiError::Validation`] if tenant, client id or secret are not configured
    /// - [`PbiError::Auth`] if the token endpoint rejects the credentials
    pub async fn authenticate(&self) -> Result<()> {
        let provider = self.client_credentials()?;
        self.authenticate_with(&provider).await
    }

    /// Fetches a token from `provider` and stores it for subsequent requests.
    pub async fn authenticate_with<P: TokenProvider>(&self, provider: &P) -> Result<()> {
        let token = provider.fetch_token().await?;
        self.credentials.set(token);
        Ok(())
    }

    /// Installs a token obtained elsewhere.
    pub fn set_token(&self, token: AccessToken) {
        self.credentials.set(token);
    }

    /// Discards the current token.
    pub fn clear_token(&self) {
        self.credentials.clear();
    }

    /// Returns true if the client holds a token that has not expired.
    pub fn has_valid_token(&self) -> bool {
        self.credentials.has_valid_token()
    }
}
