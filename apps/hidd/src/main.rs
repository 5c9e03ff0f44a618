//! hidd entry point.

mod app;
mod cli;
mod config;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    let (config, config_path) = match config::Config::load(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("hidd: {e:#}");
            return ExitCode::from(1);
        }
    };

    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), mode = %cli.mode(), "starting hidd");
    if cli.nodaemon {
        tracing::debug!("--nodaemon has no effect, hidd always runs in the foreground");
    }
    if let Some(path) = &config_path {
        tracing::debug!(path = %path.display(), "configuration loaded");
    }

    let code = match app::run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(app::exit_code(&e))
        }
    };

    tracing::info!("exit");
    code
}
