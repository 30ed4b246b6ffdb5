//! Configuration management for ipenrich.
//!
//! Settings are layered: built-in defaults, then `IPENRICH_*` environment
//! variables, then command-line flags. `validate()` runs last and rejects
//! values the pipeline cannot work with.

use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::cli::Cli;
use crate::lookup::DEFAULT_ENDPOINT;
use crate::resolver::ResolverBackend;

/// Upper bound for `--concurrency`.
pub const MAX_CONCURRENCY: usize = 64;

/// Main configuration structure for ipenrich.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Hostname resolution settings
    pub resolve: ResolveConfig,

    /// Metadata lookup (HTTP) settings
    pub lookup: LookupConfig,

    /// Pipeline scheduling settings
    pub pipeline: PipelineConfig,
}

/// Hostname resolution options
#[derive(Debug, Clone)]
pub struct ResolveConfig {
    /// Which resolver implementation to use
    pub backend: ResolverBackend,

    /// Hard deadline for a single resolution
    pub timeout: Duration,
}

/// Metadata lookup options
#[derive(Debug, Clone)]
pub struct LookupConfig {
    /// URL template; `{ip}` is replaced with the address under lookup
    pub endpoint: String,

    /// Request timeout for a single lookup
    pub timeout: Duration,

    /// Optional API token, sent as a bearer token
    pub token: Option<String>,

    /// Honour HTTP(S)_PROXY / NO_PROXY from the environment
    pub use_system_proxy: bool,
}

/// Pipeline options
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of items processed at once (1 = strictly sequential)
    pub concurrency: usize,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            backend: ResolverBackend::System,
            timeout: Duration::from_secs(1),
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(5),
            token: None,
            use_system_proxy: true,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// Unparsable values are logged and ignored so a typo in the environment
    /// never aborts a run that the command line fully specifies.
    pub fn from_vars<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = var("IPENRICH_RESOLVE_TIMEOUT_SECS") {
            match parse_secs("IPENRICH_RESOLVE_TIMEOUT_SECS", &raw) {
                Ok(d) => config.resolve.timeout = d,
                Err(e) => warn!("ignoring environment override: {e}"),
            }
        }

        if let Some(raw) = var("IPENRICH_RESOLVER") {
            match raw.parse::<ResolverBackend>() {
                Ok(b) => config.resolve.backend = b,
                Err(e) => warn!("ignoring environment override: {e}"),
            }
        }

        if let Some(raw) = var("IPENRICH_LOOKUP_TIMEOUT_SECS") {
            match parse_secs("IPENRICH_LOOKUP_TIMEOUT_SECS", &raw) {
                Ok(d) => config.lookup.timeout = d,
                Err(e) => warn!("ignoring environment override: {e}"),
            }
        }

        if let Some(endpoint) = var("IPENRICH_LOOKUP_ENDPOINT")
            && !endpoint.trim().is_empty()
        {
            config.lookup.endpoint = endpoint.trim().to_string();
        }

        if let Some(token) = var("IPENRICH_IPINFO_TOKEN")
            && !token.trim().is_empty()
        {
            config.lookup.token = Some(token.trim().to_string());
        }

        if let Some(raw) = var("IPENRICH_CONCURRENCY") {
            match raw.trim().parse::<usize>() {
                Ok(n) => config.pipeline.concurrency = n,
                Err(_) => warn!("ignoring environment override: IPENRICH_CONCURRENCY={raw}"),
            }
        }

        config
    }

    /// Merge with CLI arguments, giving CLI precedence
    pub fn merge_with_cli(&mut self, cli: &Cli) -> Result<(), ConfigError> {
        if let Some(backend) = cli.resolver {
            self.resolve.backend = backend;
        }
        if let Some(secs) = cli.resolve_timeout {
            self.resolve.timeout = secs_to_duration("resolve-timeout", secs)?;
        }
        if let Some(secs) = cli.lookup_timeout {
            self.lookup.timeout = secs_to_duration("lookup-timeout", secs)?;
        }
        if let Some(ref endpoint) = cli.endpoint {
            self.lookup.endpoint = endpoint.clone();
        }
        if let Some(ref token) = cli.token {
            self.lookup.token = Some(token.clone());
        }
        if let Some(n) = cli.concurrency {
            self.pipeline.concurrency = n;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolve.timeout.is_zero() {
            return Err(ConfigError::invalid(
                "resolve.timeout",
                "0",
                "Timeout must be greater than 0",
            ));
        }

        if self.lookup.timeout.is_zero() {
            return Err(ConfigError::invalid(
                "lookup.timeout",
                "0",
                "Timeout must be greater than 0",
            ));
        }

        let endpoint = &self.lookup.endpoint;
        if !endpoint.contains("{ip}") {
            return Err(ConfigError::invalid(
                "lookup.endpoint",
                endpoint,
                "Endpoint template must contain the {ip} placeholder",
            ));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConfigError::invalid(
                "lookup.endpoint",
                endpoint,
                "Endpoint must be an http:// or https:// URL",
            ));
        }

        let n = self.pipeline.concurrency;
        if n == 0 || n > MAX_CONCURRENCY {
            return Err(ConfigError::invalid(
                "pipeline.concurrency",
                n.to_string(),
                format!("Concurrency must be between 1 and {MAX_CONCURRENCY}"),
            ));
        }

        Ok(())
    }
}

fn parse_secs(field: &str, raw: &str) -> Result<Duration, ConfigError> {
    let secs = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| ConfigError::invalid(field, raw, "Expected a number of seconds"))?;
    secs_to_duration(field, secs)
}

/// Convert fractional seconds into a `Duration`, rejecting zero, negative
/// and non-finite values.
fn secs_to_duration(field: &str, secs: f64) -> Result<Duration, ConfigError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ConfigError::invalid(
            field,
            secs.to_string(),
            "Timeout must be a positive number of seconds",
        ));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ConfigError::invalid(field, secs.to_string(), e.to_string()))
}

/// Configuration-related errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// No stage selection flag was given
    #[error("no mode selected: pass --all (resolve + lookup), --ip (resolve only) or --lookup (lookup only)")]
    MissingMode,

    /// Invalid configuration value
    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}
