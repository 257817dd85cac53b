//! buildbox - provision a conda build image and build a recipe across Python versions

use clap::Parser;
use tracing_subscriber::EnvFilter;

use buildbox_cli::cli::{Cli, error_code};
use buildbox_cli::output::json::format_error;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;
    if let Err(e) = cli.run().await {
        tracing::debug!(error = ?e, "command failed");
        match format_error(&format!("{e:#}"), error_code(&e)) {
            Ok(body) if json => println!("{body}"),
            _ => eprintln!("Error: {e:#}"),
        }
        std::process::exit(1);
    }
}
