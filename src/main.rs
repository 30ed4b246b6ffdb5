use std::error::Error;
use std::process::ExitCode;

use ipenrich::app::App;
use ipenrich::cli::Cli;
use ipenrich::config::ConfigError;
use ipenrich::errors::EnrichError;
use ipenrich::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::from_args();
    logging::init(cli.verbose);

    match App::run(&cli).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(EnrichError::Configuration(ConfigError::MissingMode)) => {
            // Usage guidance is shown regardless of verbosity.
            eprintln!("Error: no mode selected.");
            eprintln!("Use --all to resolve and look up ISP/city/country, --ip to only resolve,");
            eprintln!("or --lookup to look up a list of IPs. See --help for details.");
            ExitCode::from(2)
        }
        Err(e) => {
            if cli.error_enabled() || matches!(e, EnrichError::Configuration(_)) {
                eprintln!("Error ({}): {e}", e.category());
            }
            if cli.is_trace() {
                let mut source = e.source();
                while let Some(cause) = source {
                    eprintln!("  caused by: {cause}");
                    source = cause.source();
                }
            }
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
