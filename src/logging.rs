//! Diagnostic logging on stderr.
//!
//! `--verbose` picks the default filter; `RUST_LOG`, when set, replaces it.
//! Results go to the output file, so everything here is diagnostics only.

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::{self, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent};
use tracing_subscriber::registry::LookupSpan;

/// Max level for a `--verbose` value; `None` silences logging.
pub fn level_for_verbosity(verbosity: u8) -> Option<Level> {
    match verbosity {
        0 => None,
        1 => Some(Level::ERROR),
        2 => Some(Level::WARN),
        3 | 4 => Some(Level::INFO),
        _ => Some(Level::TRACE),
    }
}

/// Default filter directive for a `--verbose` value.
pub fn filter_directive(verbosity: u8) -> String {
    match level_for_verbosity(verbosity) {
        None => "off".to_string(),
        Some(level) => format!("{}={}", env!("CARGO_CRATE_NAME"), level.as_str().to_ascii_lowercase()),
    }
}

/// Compact `[x] message key=value` lines, one symbol per level.
pub struct TagFormatter;

impl TagFormatter {
    fn tag(level: &Level) -> &'static str {
        match *level {
            Level::TRACE => "[ ]",
            Level::DEBUG => "[?]",
            Level::INFO => "[+]",
            Level::WARN => "[*]",
            Level::ERROR => "[-]",
        }
    }
}

impl<S, N> FormatEvent<S, N> for TagFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> format::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        write!(writer, "{} ", Self::tag(event.metadata().level()))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .event_format(TagFormatter)
        .try_init();
}
