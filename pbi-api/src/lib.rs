/*
 * pbi - typed client for the Power BI workspace REST API
 *
 * SPDX-FileCopyrightText: 2025-2026 Steve Schoettler
 * SPDX-License-Identifier: Apache-2.0
 */
//! # Power BI Workspace API Client
//!
//! A small, typed client for the parts of the Power BI REST API needed to
//! back up and restore a workspace.
//!
//! ## Features
//!
//! - typed records for workspaces, reports, datasets, dataflows, dashboards,
//!   apps and refresh schedules
//! - OAuth2 client-credentials authentication with an explicit token capability
//! - binary report export and PBIX import
//! - http metrics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pbi::prelude::*;
//! # async fn example() -> Result<(), PbiError> {
//! let config = ClientConfig::default()
//!     .tenant_id("tenant")
//!     .client_id("app-id")
//!     .client_secret("secret");
//! let client = PbiClient::with_config(config)?;
//! client.authenticate().await?;
//!
//! for workspace in client.list_workspaces().await? {
//!     println!("{} {}", workspace.id, workspace.name);
//!     let reports = client.list_reports(&workspace.id).await?;
//!     println!("  {} reports", reports.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Notes on API Design
//!
//! - Every call is a plain `async fn` on [`PbiClient`](client::PbiClient) returning
//!   `Result<T, PbiError>`. There are no automatic retries; a failed call is
//!   reported to the caller immediately.
//! - List responses are unwrapped from the `{"value": [...]}` envelope, and
//!   records missing an identifier are dropped.
//! - The access token is held by a [`Credentials`](auth::Credentials) capability
//!   owned by the client. Refreshing it is an explicit call.
//!
#![allow(clippy::missing_errors_doc)] // pedantic
#![allow(clippy::missing_const_for_fn)] //  nursery function
#![allow(clippy::must_use_candidate)] // pedantic
#![warn(clippy::default_trait_access)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::future_not_send)]
#![warn(clippy::implicit_clone)]
#![warn(clippy::literal_string_with_formatting_args)]
#![warn(clippy::match_same_arms)]
#![warn(clippy::needless_raw_strings)]
#![warn(clippy::option_if_let_else)]
#![warn(clippy::redundant_clone)]
#![warn(clippy::ref_option)]
#![warn(clippy::redundant_closure)]
#![warn(clippy::uninlined_format_args)]
#![warn(clippy::unnecessary_wraps)]
#![warn(clippy::unused_async)]

pub mod apps;
pub mod auth;
pub mod client;
pub mod dashboards;
pub mod dataflows;
pub mod datasets;
pub mod error;
mod http_client;
pub mod imports;
mod odata;
pub mod reports;
pub mod schedules;
pub mod workspaces;

/// Result type alias using `PbiError` as the default error.
pub type Result<T, E = crate::error::PbiError> = std::result::Result<T, E>;

/// Prelude module - import the common types with `use pbi::prelude::*;`
pub mod prelude {
    pub use super::{PBI_API_URL, PBI_AUTHORITY_URL, PBI_RESOURCE};
    pub use crate::error::*;
    pub use crate::{
        apps::App,
        auth::{AccessToken, ClientCredentials, Credentials, TokenProvider},
        client::{ClientConfig, PbiClient},
        dashboards::Dashboard,
        dataflows::Dataflow,
        datasets::Dataset,
        http_client::HttpMetricsSnapshot,
        imports::{ImportAccepted, NameConflict},
        reports::Report,
        schedules::RefreshSchedule,
        workspaces::{Workspace, WorkspaceSettings},
    };
}

// ============================================================================
// CONSTANTS
// ============================================================================

/// Default REST endpoint
pub const PBI_API_URL: &str = "https://api.powerbi.com/v1.0/myorg";

/// Default OAuth authority
pub const PBI_AUTHORITY_URL: &str = "https://login.microsoftonline.com";

/// OAuth resource identifier for the Power BI API
pub const PBI_RESOURCE: &str = "https://analysis.windows.net/powerbi/api";

pub(crate) mod config {
    /// Environment variable for the REST endpoint
    pub const PBI_API_URL_ENV: &str = "PBI_API_URL";

    /// Environment variable for the OAuth authority
    pub const PBI_AUTHORITY_URL_ENV: &str = "PBI_AUTHORITY_URL";

    /// Environment variable for the Azure AD tenant
    pub const PBI_TENANT_ID_ENV: &str = "PBI_TENANT_ID";

    /// Environment variable for the application (client) id
    pub const PBI_CLIENT_ID_ENV: &str = "PBI_CLIENT_ID";

    /// Environment variable for the application secret
    pub const PBI_CLIENT_SECRET_ENV: &str = "PBI_CLIENT_SECRET";

    /// Seconds subtracted from a token's lifetime so it is treated as expired
    /// slightly before the server does.
    pub const TOKEN_EXPIRY_SKEW_SECS: i64 = 60;
}
