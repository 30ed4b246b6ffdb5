//! Unified error handling.
//!
//! `EnrichError` covers everything that can stop a run as a whole:
//!   * Configuration / usage problems (exit code 2)
//!   * Input file problems (missing, unreadable, undecodable)
//!   * Output file problems
//!
//! Per-item resolution and lookup failures are NOT represented here. They
//! live in `resolver::ResolveError` and `lookup::LookupError` and are
//! collapsed to sentinel values inside the pipeline.
//!
//! Categories are coarse on purpose:
//!   - Input: user / data validation issues
//!   - Network: remote-service problems
//!   - Parse: syntax / data-format decoding issues
//!   - Internal: I/O on our side, logic bugs or unexpected states

use std::io;

use thiserror::Error;

use crate::config::ConfigError;

/// High-level classification for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Network,
    Parse,
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCategory::Input => "input",
            ErrorCategory::Network => "network",
            ErrorCategory::Parse => "parse",
            ErrorCategory::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Primary application error type.
#[derive(Error, Debug)]
pub enum EnrichError {
    // ------------------------ Input / Validation ----------------------------
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Input file not found: {path}")]
    InputNotFound { path: String },

    // ---------------------------- Parsing -----------------------------------
    #[error("Failed to parse input file {path}: {reason}")]
    InputParse { path: String, reason: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // ----------------------------- Network ----------------------------------
    #[error("Failed to build HTTP client: {reason}")]
    HttpClient { reason: String },

    #[error("Failed to initialise {backend} resolver: {reason}")]
    ResolverInit { backend: String, reason: String },

    // ----------------------------- I/O / FS ---------------------------------
    #[error("I/O error during {operation} on {path}: {source}")]
    Io {
        path: String,
        operation: String,
        #[source]
        source: io::Error,
    },

    // ---------------------------- Internal ----------------------------------
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl EnrichError {
    /// Categorize the error for reporting.
    pub fn category(&self) -> ErrorCategory {
        use EnrichError::*;
        match self {
            Configuration(_) | InputNotFound { .. } => ErrorCategory::Input,
            InputParse { .. } | Csv(_) => ErrorCategory::Parse,
            HttpClient { .. } | ResolverInit { .. } => ErrorCategory::Network,
            Io { .. } | Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Process exit code for this error: 2 for usage/configuration, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            EnrichError::Configuration(_) => 2,
            _ => 1,
        }
    }

    // ---------------------------- Constructors -----------------------------

    pub fn input_parse(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InputParse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn http_client(reason: impl Into<String>) -> Self {
        Self::HttpClient {
            reason: reason.into(),
        }
    }

    pub fn resolver_init(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ResolverInit {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<String>, operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Public result alias.
pub type Result<T> = std::result::Result<T, EnrichError>;

/// Extension trait for enriching IO results with path + operation context.
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<String>, operation: impl Into<String>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, io::Error> {
    fn with_path(self, path: impl Into<String>, operation: impl Into<String>) -> Result<T> {
        self.map_err(|e| EnrichError::io(path.into(), operation.into(), e))
    }
}
