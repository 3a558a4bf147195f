//! Power BI API Client
//!
//! # Creating new api client
//!
//! - [new](PbiClient::new) - create new client with configuration from the environment
//! - [with_config](PbiClient::with_config) - create client with custom configuration
//! - [with_client](PbiClient::with_client) - create client with configuration and custom reqwest client
//!
//! # Configuration
//!
//! - [get_config](PbiClient::get_config) - returns configuration
//! - [http_metrics](PbiClient::http_metrics) - returns request counters
//!

use std::{fmt, sync::Arc};

use tracing::debug;

use crate::{
    PBI_API_URL, PBI_AUTHORITY_URL, PBI_RESOURCE, Result,
    auth::Credentials,
    config::{
        PBI_API_URL_ENV, PBI_AUTHORITY_URL_ENV, PBI_CLIENT_ID_ENV, PBI_CLIENT_SECRET_ENV,
        PBI_TENANT_ID_ENV,
    },
    http_client::HttpClient,
    prelude::*,
};

/// Configuration for the client: endpoints and service principal credentials.
///
/// `Default` reads `PBI_API_URL`, `PBI_AUTHORITY_URL`, `PBI_TENANT_ID`,
/// `PBI_CLIENT_ID` and `PBI_CLIENT_SECRET` from the environment.
///
/// ```rust,no_run
/// use pbi::prelude::*;
/// # fn create_client() -> Result<PbiClient, PbiError> {
/// let config = ClientConfig::default()
///     .tenant_id("00000000-0000-0000-0000-000000000000")
///     .client_id("app-id")
///     .client_secret("secret");
/// let client = PbiClient::with_config(config)?;
/// # Ok(client)
/// # }
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Base url for all REST requests. Default: env `PBI_API_URL` or [`PBI_API_URL`].
    pub base_url: String,

    /// OAuth authority. Default: env `PBI_AUTHORITY_URL` or [`PBI_AUTHORITY_URL`].
    pub authority_url: String,

    /// OAuth resource requested in the token
    pub resource: String,

    /// Azure AD tenant id
    pub tenant_id: Option<String>,

    /// Application (client) id of the service principal
    pub client_id: Option<String>,

    /// Application secret of the service principal
    pub client_secret: Option<zeroize::Zeroizing<String>>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("authority_url", &self.authority_url)
            .field("resource", &self.resource)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: env_nonempty(PBI_API_URL_ENV).unwrap_or_else(|| PBI_API_URL.to_string()),
            authority_url: env_nonempty(PBI_AUTHORITY_URL_ENV)
                .unwrap_or_else(|| PBI_AUTHORITY_URL.to_string()),
            resource: PBI_RESOURCE.to_string(),
            tenant_id: env_nonempty(PBI_TENANT_ID_ENV),
            client_id: env_nonempty(PBI_CLIENT_ID_ENV),
            client_secret: env_nonempty(PBI_CLIENT_SECRET_ENV).map(zeroize::Zeroizing::new),
        }
    }
}

impl ClientConfig {
    pub fn base_url(self, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..self
        }
    }

    pub fn authority_url(self, authority_url: impl Into<String>) -> Self {
        Self {
            authority_url: authority_url.into(),
            ..self
        }
    }

    pub fn tenant_id(self, tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            ..self
        }
    }

    pub fn client_id(self, client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            ..self
        }
    }

    pub fn client_secret(self, client_secret: impl Into<String>) -> Self {
        Self {
            client_secret: Some(zeroize::Zeroizing::new(client_secret.into())),
            ..self
        }
    }

    /// Returns the names of required credential settings that are missing.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.tenant_id.is_none() {
            missing.push(PBI_TENANT_ID_ENV);
        }
        if self.client_id.is_none() {
            missing.push(PBI_CLIENT_ID_ENV);
        }
        if self.client_secret.is_none() {
            missing.push(PBI_CLIENT_SECRET_ENV);
        }
        missing
    }
}

/// Client for the Power BI workspace REST API.
pub struct PbiClient {
    pub(crate) client: Arc<HttpClient>,
    pub(crate) config: ClientConfig,
    pub(crate) credentials: Arc<Credentials>,
}

impl fmt::Debug for PbiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PbiClient")
            .field("config", &self.config)
            .field("authenticated", &self.credentials.has_valid_token())
            .finish()
    }
}

impl PbiClient {
    /// Creates a new client with configuration from the environment.
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a new client with the provided configuration.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Self::with_client(reqwest::Client::builder(), config)
    }

    /// Creates a client from a `reqwest::ClientBuilder` and configuration.
    /// ClientBuilder can be customized with timeouts, proxies, user_agent, etc.
    ///
    /// ```rust,no_run
    /// use pbi::prelude::*;
    /// # fn create_client() -> Result<PbiClient, PbiError> {
    /// let builder = reqwest::Client::builder().timeout(std::time::Duration::from_secs(300));
    /// let client = PbiClient::with_client(builder, ClientConfig::default())?;
    /// # Ok(client)
    /// # }
    /// ```
    pub fn with_client(builder: reqwest::ClientBuilder, config: ClientConfig) -> Result<Self> {
        debug!(url = %config.base_url, "new client");
        let credentials = Arc::new(Credentials::new());
        let client = HttpClient::new(builder, config.base_url.clone(), credentials.clone())?;
        Ok(Self {
            client: Arc::new(client),
            config,
            credentials,
        })
    }

    /// Returns the configuration.
    pub fn get_config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns a snapshot of current HTTP metrics.
    pub fn http_metrics(&self) -> HttpMetricsSnapshot {
        self.client.metrics_snapshot()
    }

    /// Token provider built from the configured service principal.
    pub(crate) fn client_credentials(&self) -> Result<ClientCredentials> {
        let missing = self.config.missing_credentials();
        if !missing.is_empty() {
            return Err(PbiError::Validation {
                message: format!("missing credentials: {}", missing.join(", ")),
            });
        }
        let (Some(tenant), Some(client_id), Some(secret)) = (
            self.config.tenant_id.as_deref(),
            self.config.client_id.as_deref(),
            self.config.client_secret.as_deref(),
        ) else {
            return Err(PbiError::Validation {
                message: "missing credentials".to_string(),
            });
        };
        Ok(ClientCredentials::new(
            self.client.client.clone(),
            self.config.authority_url.clone(),
            tenant,
            client_id,
            secret.as_str(),
            self.config.resource.clone(),
        ))
    }
}
