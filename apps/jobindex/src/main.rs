//! # jobindex - CI Job Index Publisher
//!
//! The main binary for the jobindex publication engine.
//!
//! This application provides:
//! - HTTP push endpoints for storage notifications (axum-based)
//! - CLI interface for seeding, indexing and inspecting objects
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    apps/jobindex (THE BINARY)                   │
//! │                                                                 │
//! │        ┌─────────────┐              ┌─────────────┐             │
//! │        │    CLI      │              │  HTTP API   │             │
//! │        │   (clap)    │              │   (axum)    │             │
//! │        └──────┬──────┘              └──────┬──────┘             │
//! │               │                            │                    │
//! │               └─────────────┬──────────────┘                    │
//! │                             ▼                                   │
//! │                    ┌─────────────────┐                          │
//! │                    │  jobindex-core  │                          │
//! │                    │   (THE LOGIC)   │                          │
//! │                    └─────────────────┘                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! jobindex server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! jobindex put -b origin-ci-test -n logs/my-job/55/finished.json -f finished.json
//! jobindex index -b origin-ci-test -n logs/my-job/55/finished.json
//! jobindex list -b origin-ci-test -p index/job-state/
//! ```

use clap::Parser;
use jobindex::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // JOBINDEX_LOG_FORMAT=json switches to one JSON object per line.
    let log_format = std::env::var("JOBINDEX_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            if cli.verbose {
                "jobindex=debug,tower_http=debug".into()
            } else {
                "jobindex=info,tower_http=debug".into()
            }
        });

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    // Display startup banner
    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  jobindex v{}

  finished.json    -> index/job-state/<RFC3339>/<job>/<build>
  job_metrics.json -> index/job-metrics/<RFC3339>/<job>/<build>
"#,
        env!("CARGO_PKG_VERSION")
    );
}
