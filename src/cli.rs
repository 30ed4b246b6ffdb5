use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use crate::pipeline::Mode;
use crate::resolver::ResolverBackend;
use crate::tabular::InputFormat;

/// Command-line interface definition.
///
/// Exactly one mode flag selects the pipeline stages:
///   --all     resolve hostnames, then look up ISP / city / country
///   --ip      resolve hostnames only
///   --lookup  look up ISP / city / country for a list of IPs
///
/// Verbosity levels:
/// 0 - silent (only final output)
/// 1 - errors (default)
/// 2 - warnings + errors
/// 3 - run summary
/// 5 - trace/debug (per-item failure causes)
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Resolve hostnames and look up ISP, city and country for a list of hosts or IPs"
)]
#[command(group(ArgGroup::new("mode").args(["all", "ip", "lookup"]).multiple(false)))]
pub struct Cli {
    /// Input file: one hostname/IP per line, or a CSV whose first column holds them
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: PathBuf,

    /// Resolve every input to an IP, then look up ISP, city and country
    #[arg(long)]
    pub all: bool,

    /// Only resolve hostnames to IPs
    #[arg(long)]
    pub ip: bool,

    /// Treat inputs as IPs and only look up ISP, city and country
    #[arg(long)]
    pub lookup: bool,

    /// Output CSV path (default: <input stem>_output.csv next to the input)
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// How to read the input file
    #[arg(long, value_enum, default_value_t = InputFormat::Auto)]
    pub input_format: InputFormat,

    /// Resolver implementation used for hostname lookups
    #[arg(long, value_enum)]
    pub resolver: Option<ResolverBackend>,

    /// Deadline for a single hostname resolution, in (fractional) seconds [default: 1]
    #[arg(long, value_name = "SECS")]
    pub resolve_timeout: Option<f64>,

    /// Timeout for a single metadata request, in seconds [default: 5]
    #[arg(long, value_name = "SECS")]
    pub lookup_timeout: Option<f64>,

    /// Metadata endpoint template; `{ip}` is replaced by the address
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// API token for the metadata service
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Number of inputs processed at once [default: 1]
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Verbosity level (0,1,2,3,5)
    #[arg(long, default_value_t = 1)]
    pub verbose: u8,
}

impl Cli {
    /// Parse CLI arguments from process args.
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Stage selection implied by the mode flags, if any was given.
    pub fn mode(&self) -> Option<Mode> {
        if self.all {
            Some(Mode::Full)
        } else if self.ip {
            Some(Mode::Resolve)
        } else if self.lookup {
            Some(Mode::Lookup)
        } else {
            None
        }
    }

    /// Convenience: are we in very verbose/debug mode?
    pub fn is_trace(&self) -> bool {
        self.verbose >= 5
    }

    /// Are error-level messages enabled?
    pub fn error_enabled(&self) -> bool {
        self.verbose >= 1
    }
}
