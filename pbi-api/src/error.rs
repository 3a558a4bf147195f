//! Errors returned by `PbiClient`
//!
use std::path::PathBuf;

use snafu::prelude::*;

/// Errors returned by pbi crate
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PbiError {
    // Http connection or timeout error
    #[snafu(display("HTTP error {method} url:{url}"))]
    Http {
        method: String,
        url: String,
        source: reqwest::Error,
    },

    /// Server responded with an error status.
    /// This error usually means the request was invalid, or there was an internal server error.
    #[snafu(display("Api Server reported error ({code}) {method} {url}: {message}"))]
    ApiError {
        code: u16,
        method: String,
        url: String,
        message: String,
    },

    /// Token acquisition failed
    #[snafu(display("Authentication failed: {message}"))]
    Auth { message: String },

    /// Deserialization error. This means we didn't deserialize a server response correctly.
    #[snafu(display("Deserialization: {source}"))]
    Deserialization { source: serde_json::Error },

    /// Serialization error. Unlikely to occur.
    #[snafu(display("Serialization: {source}"))]
    Serialization { source: serde_json::Error },

    /// Expected item was not found (http 404).
    #[snafu(display("{obj_type} {key} not found"))]
    NotFound { obj_type: String, key: String },

    /// Client has no access token, or the server rejected it.
    #[snafu(display("Client is not authenticated. Call authenticate() first."))]
    Unauthorized,

    /// Client is authenticated, but the principal lacks permission for the resource
    #[snafu(display("Permission denied: principal does not have access to the resource"))]
    Forbidden,

    /// Invalid parameter or configuration
    #[snafu(display("Validation error: {message}"))]
    Validation { message: String },

    /// Local file could not be read for upload
    #[snafu(display("file {path:?}: {source}"))]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Some other error occurred
    #[snafu(display("{message}"))]
    Other { message: String },
}

impl PbiError {
    /// Returns true if the error came from the server saying the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
