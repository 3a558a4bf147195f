//! HttpClient middleware used by PbiClient
//!
//! Responsible for
//!  - handing all HTTP api requests
//!  - attaching the bearer token from the client's `Credentials`
//!  - logging/tracing
//!  - metrics
//!  - mapping http status codes into `PbiError`
//!
//! Requests are never retried here. A failed call surfaces to the caller,
//! which decides whether the failure is fatal.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use bytes::Bytes;
use reqwest::{ClientBuilder, Method, StatusCode, header::CONTENT_TYPE, multipart::Form};
use serde::{Serialize, de::DeserializeOwned};
use snafu::prelude::*;
use tracing::{debug, error, trace};

use crate::{Result, auth::Credentials, prelude::*};

/// HTTP metrics tracked using atomic counters for thread-safe access.
/// These counters are cumulative and never reset during the client's lifetime.
#[derive(Debug, Default)]
pub struct HttpMetrics {
    /// Total number of HTTP requests sent to the server
    total_requests: AtomicU64,
    /// Total number of successful responses (2xx status codes)
    successful_responses: AtomicU64,
    /// Total number of failed requests (non-2xx status or transport error)
    errors: AtomicU64,
    /// Total bytes sent in request bodies (json bodies only; multipart uploads are not sized)
    bytes_sent: AtomicU64,
    /// Total bytes received in response bodies
    bytes_received: AtomicU64,
}

impl HttpMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of current metrics as plain u64 values
    pub fn snapshot(&self) -> HttpMetricsSnapshot {
        HttpMetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_responses: self.successful_responses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }

    fn increment_requests(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_success(&self) {
        self.successful_responses.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn add_bytes_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    fn add_bytes_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of HTTP metrics with plain u64 values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HttpMetricsSnapshot {
    /// Total number of HTTP requests sent to the server
    pub total_requests: u64,
    /// Total number of successful responses (2xx status codes)
    pub successful_responses: u64,
    /// Total number of failed requests
    pub errors: u64,
    /// Total bytes sent in request bodies
    pub bytes_sent: u64,
    /// Total bytes received in response bodies
    pub bytes_received: u64,
}

impl std::fmt::Display for HttpMetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "requests={} success={} errors={} sent={} recv={}",
            self.total_requests,
            self.successful_responses,
            self.errors,
            format_bytes(self.bytes_sent),
            format_bytes(self.bytes_received),
        )
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes}B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

pub(crate) enum RequestBody {
    Empty,
    Json(Bytes),
    Multipart(Form),
}

pub(crate) struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match &self.body {
            RequestBody::Empty => "empty".to_string(),
            RequestBody::Json(b) => format!("json({})", b.len()),
            RequestBody::Multipart(_) => "multipart".to_string(),
        };
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("body", &body)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    pub client: reqwest::Client,

    /// Base URL for API requests (e.g., "https://api.powerbi.com/v1.0/myorg")
    pub base_url: String,

    credentials: Arc<Credentials>,

    /// HTTP request/response metrics
    pub metrics: Arc<HttpMetrics>,
}

impl HttpClient {
    pub fn new(
        builder: ClientBuilder,
        base_url: String,
        credentials: Arc<Credentials>,
    ) -> Result<Self> {
        let client = builder.build().context(HttpSnafu {
            method: "client-init",
            url: "",
        })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            metrics: Arc::new(HttpMetrics::new()),
        })
    }

    /// Returns a snapshot of current HTTP metrics
    pub fn metrics_snapshot(&self) -> HttpMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(crate) async fn get_request<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.send(HttpRequest::new(Method::GET, path)).await?;
        deserialize_json(&body)
    }

    /// GET where http 404 means "absent" rather than an error.
    pub(crate) async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.send(HttpRequest::new(Method::GET, path)).await {
            Ok(body) => Ok(Some(deserialize_json(&body)?)),
            Err(PbiError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// GET returning the raw response body.
    pub(crate) async fn get_bytes(&self, path: &str) -> Result<Bytes> {
        self.send(HttpRequest::new(Method::GET, path)).await
    }

    /// Makes an authenticated PATCH request with JSON body. The response body is ignored.
    pub(crate) async fn patch_request<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let mut req = HttpRequest::new(Method::PATCH, path);
        req.body = RequestBody::Json(Bytes::from(
            serde_json::to_vec(body).context(SerializationSnafu)?,
        ));
        self.send(req).await?;
        Ok(())
    }

    pub(crate) async fn post_request<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let mut req = HttpRequest::new(Method::POST, path);
        req.body = RequestBody::Json(Bytes::from(
            serde_json::to_vec(body).context(SerializationSnafu)?,
        ));
        let body = self.send(req).await?;
        deserialize_json(&body)
    }

    /// POST a multipart form. Returns the raw response body.
    pub(crate) async fn post_multipart(
        &self,
        path: &str,
        query: Vec<(String, String)>,
        form: Form,
    ) -> Result<Bytes> {
        let mut req = HttpRequest::new(Method::POST, path);
        req.query = query;
        req.body = RequestBody::Multipart(form);
        self.send(req).await
    }

    /// This function handles all rest api requests
    /// - attaches the bearer token
    /// - maps http error codes into `PbiError`
    /// - returns the response body of any 2xx response
    pub(crate) async fn send(&self, req: HttpRequest) -> Result<Bytes> {
        let token = self.credentials.current()?;
        let full_url = format!("{}{}", self.base_url, req.path);
        let method = req.method.clone();
        let mut builder = self.client.request(method.clone(), &full_url);
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        builder = token.set_auth_header(builder);

        let mut body_size = 0u64;
        let debug_req = format!("{req:?}");
        builder = match req.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => {
                body_size = body.len() as u64;
                log_request(&method, &full_url, Some(&body));
                builder.header(CONTENT_TYPE, "application/json").body(body)
            }
            RequestBody::Multipart(form) => builder.multipart(form),
        };

        self.metrics.increment_requests();
        self.metrics.add_bytes_sent(body_size);

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!(source=?e, req=%debug_req, "http");
                self.metrics.increment_errors();
                return Err(PbiError::Http {
                    method: method.to_string(),
                    url: req.path,
                    source: e,
                });
            }
        };

        let code = response.status();
        match code {
            ok if ok.is_success() => {
                let body = response.bytes().await.context(HttpSnafu {
                    method: method.to_string(),
                    url: req.path.clone(),
                })?;
                self.metrics.increment_success();
                self.metrics.add_bytes_received(body.len() as u64);
                log_response(&req.path, &body);
                Ok(body)
            }
            StatusCode::BAD_REQUEST /* 400 */ => {
                self.metrics.increment_errors();
                let message = response.text().await.unwrap_or_else(|_| "BadRequest".into());
                error!(?code, ?message, req=%debug_req, "http");
                Err(PbiError::Validation { message })
            }
            StatusCode::NOT_FOUND /* 404 */ | StatusCode::GONE /* 410 */ => {
                // absence is often expected (refresh schedules); callers decide the severity
                self.metrics.increment_errors();
                debug!(?code, req=%debug_req, "http");
                Err(PbiError::NotFound {
                    obj_type: "Resource".into(),
                    key: req.path,
                })
            }
            StatusCode::UNAUTHORIZED /* 401 */ => {
                self.metrics.increment_errors();
                let message = response.text().await.unwrap_or_default();
                error!(?code, ?message, req=%debug_req, "http");
                Err(PbiError::Unauthorized)
            }
            StatusCode::FORBIDDEN /* 403 */ => {
                self.metrics.increment_errors();
                let message = response.text().await.unwrap_or_default();
                error!(?code, ?message, req=%debug_req, "http");
                Err(PbiError::Forbidden)
            }
            _ => {
                self.metrics.increment_errors();
                let message = response.text().await.unwrap_or_default();
                error!(?code, req=%debug_req, message, "http");
                Err(PbiError::ApiError {
                    code: code.as_u16(),
                    method: method.to_string(),
                    url: req.path,
                    message,
                })
            }
        }
    }
}

impl HttpRequest {
    fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }
}

// dump request body
// requires RUST_LOG=pbi::http_json=trace
fn log_request(method: &Method, url: &str, body: Option<&Bytes>) {
    if tracing::enabled!(target: "pbi::http_json", tracing::Level::TRACE) {
        let body = body
            .map(|b| String::from_utf8_lossy(b).to_string())
            .unwrap_or_default();
        // headers are not logged so the bearer token never leaks
        trace!(target: "pbi::http_json", "{method} url={url} body={body}");
    }
}

// dump json response, for debugging
fn log_response(path: &str, body: &Bytes) {
    if tracing::enabled!(target: "pbi::http_json", tracing::Level::TRACE) {
        trace!(target: "pbi::http_json", "Response path={path} body={}",
            String::from_utf8_lossy(body)
        );
    }
}

// deserialize, reporting errors with 'serde_path_to_error', which provides
// detailed json path to the error
pub(crate) fn deserialize_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(body);
    match serde_path_to_error::deserialize(&mut deserializer) {
        Ok(value) => Ok(value),
        Err(err) => {
            error!("Deserialization failed at {}: {}", err.path(), err);
            Err(PbiError::Deserialization {
                source: err.into_inner(),
            })
        }
    }
}
