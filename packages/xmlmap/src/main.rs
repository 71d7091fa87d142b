//! CLI entry point for xmlmap.

use console::style;
use tracing_subscriber::EnvFilter;
use xmlmap::cli;

fn main() {
    // Initialize tracing with WARN level by default, respecting RUST_LOG
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run() {
        eprintln!("{} {e}", style("Error:").red().bold());
        std::process::exit(1);
    }
}
