//! ipenrich library
//!
//! Enriches a list of hostnames or IP addresses with network-ownership
//! metadata. This library provides:
//!
//! - Hostname resolution with a hard per-call deadline
//! - ISP / city / country lookups against an ipinfo-style HTTP service
//! - A pipeline that runs either stage or both, one row per input
//! - CSV input and output helpers
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use ipenrich::pipeline::{Pipeline, Record};
//! use ipenrich::resolver::SystemResolver;
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let resolver = Arc::new(SystemResolver::new(Duration::from_secs(1)));
//! let pipeline = Pipeline::resolve_only(resolver);
//! let records = pipeline.run(&["example.com".to_string()]).await;
//! for record in &records {
//!     println!("{:?}", record.row());
//! }
//! # }
//! ```

pub mod app;
pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod lookup;
pub mod pipeline;
pub mod resolver;
pub mod tabular;

// Re-export commonly used types for convenience
pub use config::Config;
pub use errors::{EnrichError, Result};
pub use lookup::{IpInfoClient, IpMetadata, LookupError, MetadataLookup, NOT_AVAILABLE};
pub use pipeline::{Mode, OutputRow, Pipeline, Record, RunSummary};
pub use resolver::{DnsResolver, Resolve, ResolveError, ResolverBackend, SystemResolver, UNKNOWN};
pub use tabular::InputFormat;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
