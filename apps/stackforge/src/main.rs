//! # Stackforge - Swarm Stack Installer
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   apps/stackforge (THE BINARY)                  │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐    │
//! │  │   CLI       │    │  Installer  │    │  Backends        │    │
//! │  │  (clap)     │───▶│ (tokio)     │───▶│  CLI / API       │    │
//! │  └─────────────┘    └──────┬──────┘    └──────────────────┘    │
//! │                            ▼                                    │
//! │                    ┌─────────────────┐                          │
//! │                    │ stackforge-core │                          │
//! │                    │  (THE LOGIC)    │                          │
//! │                    └─────────────────┘                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! stackforge configure --domain example.com --email ops@example.com
//! stackforge plan --profile basic
//! stackforge install --profile basic
//! stackforge install grafana --parallel --dry-run
//! stackforge status
//! ```

use clap::Parser;
use stackforge::cli;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // STACKFORGE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("STACKFORGE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let default_filter = if cli.verbose {
        "stackforge=debug,stackforge_core=debug"
    } else {
        "stackforge=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    // Display startup banner
    if !cli.quiet && !cli.json {
        print_banner();
    }

    // Ctrl-C stops starting new stacks; deployed ones stay up
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight stacks and stopping");
            on_signal.cancel();
        }
    });

    // Execute command
    if let Err(e) = cli::execute(cli, cancel).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Stackforge startup banner.
fn print_banner() {
    println!(
        r#"
  ┌─┐┌┬┐┌─┐┌─┐┬┌─┌─┐┌─┐┬─┐┌─┐┌─┐
  └─┐ │ ├─┤│  ├┴┐├┤ │ │├┬┘│ ┬├┤
  └─┘ ┴ ┴ ┴└─┘┴ ┴└  └─┘┴└─└─┘└─┘

  Swarm Stack Installer v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
