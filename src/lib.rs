pub mod analysis;
pub mod args;
pub mod calibration;
pub mod commands;
pub mod config;
pub mod errors;

use clap::Parser;

pub fn run() {
    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = args::Args::parse();
    if let Err(e) = commands::execute(&args.command) {
        tracing::error!(error = %e, "command failed");
        std::process::exit(1);
    }
}
