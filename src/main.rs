mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;

use skipper::{exit_code_for_error, exit_code_for_status, Logger, SkipperError};

#[cfg(feature = "tracing")]
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};
    let default = if verbose { "skipper=debug" } else { "skipper=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    #[cfg(feature = "tracing")]
    init_tracing(cli.verbose);

    let logger = Logger::for_stderr(cli.verbose, cli.color);
    match commands::dispatch(cli, logger) {
        Ok(code) => ExitCode::from(exit_code_for_status(code)),
        Err(e) => {
            logger.error(&format!("{e:#}"));
            let code = e
                .downcast_ref::<SkipperError>()
                .map(exit_code_for_error)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}
