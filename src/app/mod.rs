//! High-level application orchestration layer.
//!
//! This module provides the CLI-facing `App` façade. Steps in `App::run`:
//!   1. Mode selection (exactly one of --all / --ip / --lookup)
//!   2. Config load (defaults, environment, CLI) and validation
//!   3. Input read, before any network client is built
//!   4. Pipeline construction for the selected stages
//!   5. Pipeline run over every item
//!   6. Output write and summary
//!
//! Any error returned from here happens before the output file is written,
//! so a failed run never leaves a partial table behind.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cli::Cli;
use crate::config::{Config, ConfigError};
use crate::errors::Result;
use crate::lookup::{IpInfoClient, MetadataLookup};
use crate::pipeline::{Mode, OutputRow, Pipeline, Record, RunSummary};
use crate::resolver::build_resolver;
use crate::tabular::{self, read_items};

/// Application façade.
pub struct App;

impl App {
    /// Execute one enrichment run.
    ///
    /// Returns: intended process exit code (0 = success).
    pub async fn run(cli: &Cli) -> Result<i32> {
        let mode = cli.mode().ok_or(ConfigError::MissingMode)?;
        let config = Self::load_config(cli)?;

        let items = read_items(&cli.file, cli.input_format)?;
        if items.is_empty() {
            warn!(path = %cli.file.display(), "input contains no items");
        }

        let pipeline = Self::build_pipeline(mode, &config)?;
        let (records, summary) = pipeline.run_with_summary(&items).await;
        Self::log_summary(&summary);

        let output = Self::output_path(cli);
        let rows: Vec<OutputRow> = records.iter().map(Record::row).collect();
        tabular::write_rows(&output, mode.headers(), &rows)?;

        println!("Results saved to {}", output.display());
        Ok(0)
    }

    /// Defaults, then environment, then CLI; validated.
    fn load_config(cli: &Cli) -> Result<Config> {
        let mut config = Config::from_env();
        config.merge_with_cli(cli)?;
        config.validate()?;
        debug!(
            resolver = %config.resolve.backend,
            resolve_timeout = ?config.resolve.timeout,
            lookup_timeout = ?config.lookup.timeout,
            endpoint = %config.lookup.endpoint,
            concurrency = config.pipeline.concurrency,
            "configuration loaded"
        );
        Ok(config)
    }

    fn build_pipeline(mode: Mode, config: &Config) -> Result<Pipeline> {
        let pipeline = match mode {
            Mode::Lookup => Pipeline::lookup_only(Self::lookup_client(config)?),
            Mode::Resolve => Pipeline::resolve_only(build_resolver(
                config.resolve.backend,
                config.resolve.timeout,
            )?),
            Mode::Full => Pipeline::full(
                build_resolver(config.resolve.backend, config.resolve.timeout)?,
                Self::lookup_client(config)?,
            ),
        };
        Ok(pipeline.with_concurrency(config.pipeline.concurrency))
    }

    fn lookup_client(config: &Config) -> Result<Arc<dyn MetadataLookup>> {
        Ok(Arc::new(IpInfoClient::new(&config.lookup)?))
    }

    fn output_path(cli: &Cli) -> PathBuf {
        cli.output
            .clone()
            .unwrap_or_else(|| tabular::default_output_path(&cli.file))
    }

    fn log_summary(summary: &RunSummary) {
        info!(
            items = summary.items,
            resolved = summary.resolved,
            unresolved = summary.resolution_failures,
            lookups_found = summary.lookups_found,
            lookup_failures = summary.lookup_failures,
            lookups_skipped = summary.lookups_skipped,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "run complete"
        );
    }
}
