//! IP metadata lookups over HTTP.
//!
//! One GET per address against a templated endpoint (ipinfo.io by default),
//! no retry. The JSON body is expected to carry optional `org`, `city` and
//! `country` keys. Every failure is reported as a typed [`LookupError`]; the
//! pipeline turns it into `N/A` sentinels.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::LookupConfig;
use crate::errors::{EnrichError, Result};

/// Sentinel written for any metadata field that is missing or failed.
pub const NOT_AVAILABLE: &str = "N/A";

/// Default endpoint; `{ip}` is replaced with the address under lookup.
pub const DEFAULT_ENDPOINT: &str = "https://ipinfo.io/{ip}/json";

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Ownership / location metadata for one address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpMetadata {
    pub organization: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl IpMetadata {
    /// Parse a service response body.
    ///
    /// The body must be a JSON object; each key is optional on its own.
    pub fn from_json(body: &[u8]) -> std::result::Result<Self, LookupError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| LookupError::Decode(e.to_string()))?;
        let Value::Object(map) = value else {
            return Err(LookupError::Decode("response is not a JSON object".into()));
        };
        Ok(Self {
            organization: map.get("org").and_then(field_text),
            city: map.get("city").and_then(field_text),
            country: map.get("country").and_then(field_text),
        })
    }

    /// `[organization, city, country]` with `N/A` for missing values.
    pub fn fields(&self) -> [String; 3] {
        [
            or_not_available(&self.organization),
            or_not_available(&self.city),
            or_not_available(&self.country),
        ]
    }
}

/// The three `N/A` sentinels used when a lookup failed outright.
pub fn unavailable_fields() -> [String; 3] {
    [
        NOT_AVAILABLE.to_string(),
        NOT_AVAILABLE.to_string(),
        NOT_AVAILABLE.to_string(),
    ]
}

fn or_not_available(v: &Option<String>) -> String {
    v.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Text for a single JSON field: strings verbatim, other scalars in their JSON
/// form, null and blank strings treated as absent.
fn field_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Why a single lookup produced no metadata.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("service answered with HTTP {0}")]
    Status(u16),

    #[error("response body could not be decoded: {0}")]
    Decode(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for LookupError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LookupError::Timeout
        } else if e.is_connect() {
            LookupError::Connect(e.to_string())
        } else if e.is_decode() {
            LookupError::Decode(e.to_string())
        } else {
            LookupError::Request(e.to_string())
        }
    }
}

/// Address → metadata lookup. Implementations never retry.
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    async fn lookup(&self, ip: &str) -> std::result::Result<IpMetadata, LookupError>;
}

/// HTTP client for ipinfo.io-compatible services.
#[derive(Clone)]
pub struct IpInfoClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl IpInfoClient {
    pub fn new(config: &LookupConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT);
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let http = builder
            .build()
            .map_err(|e| EnrichError::http_client(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            token: config.token.clone(),
        })
    }

    /// Request URL for `ip`; the value is substituted verbatim.
    pub fn url_for(&self, ip: &str) -> String {
        self.endpoint.replace("{ip}", ip)
    }
}

impl fmt::Debug for IpInfoClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IpInfoClient")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl MetadataLookup for IpInfoClient {
    async fn lookup(&self, ip: &str) -> std::result::Result<IpMetadata, LookupError> {
        let mut request = self.http.get(self.url_for(ip));
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        IpMetadata::from_json(&body)
    }
}
