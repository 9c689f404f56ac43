//! `sysovo-board`: inspect and reorder dashboard boards from a terminal.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Error
//! - 2: Invalid arguments

use clap::Parser;

use sysovo_client::cli::{self, Cli};
use sysovo_client::log_bridge;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = log_bridge::init() {
        log_bridge::write_fallback_line(&format!("Failed to install logger: {}", e));
    }

    let code = match cli::run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    let warnings = log_bridge::warning_count();
    if warnings > 0 {
        eprintln!(
            "{} warning(s) recorded in {}",
            warnings,
            log_bridge::log_file_path()
        );
    }
    std::process::exit(code);
}
