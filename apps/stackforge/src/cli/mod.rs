//! # Stackforge CLI Module
//!
//! ## Available Commands
//!
//! - `catalog` - List every known stack
//! - `profiles` - List installation profiles
//! - `plan` - Show the resolved install order
//! - `render` - Print the manifest of one stack
//! - `configure` - Store base domain, contact email and DNS token
//! - `install` - Install stacks or a profile
//! - `status` - Show deployed stacks and their replicas
//! - `remove` - Remove one deployed stack
//! - `logs` - Show the logs of one service
//! - `rotate` - Replace one stored secret

mod commands;

use crate::error::DeployError;
use crate::settings::BackendMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Stackforge - swarm stack installer
///
/// Resolves stack dependencies, generates secrets and manifests, provisions
/// shared resources and deploys each stack onto a single cluster.
#[derive(Parser, Debug)]
#[command(name = "stackforge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// State directory (config, credentials, manifests)
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List every known stack
    Catalog,

    /// List installation profiles
    Profiles,

    /// Show the resolved install order
    Plan {
        /// Stack ids
        stacks: Vec<String>,

        /// Installation profile instead of explicit ids
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Print the manifest of one stack
    Render {
        /// Stack id
        stack: String,
    },

    /// Store installation-wide settings
    Configure {
        /// Base domain every routing rule is built on
        #[arg(short, long)]
        domain: Option<String>,

        /// Contact email for certificate registration
        #[arg(short, long)]
        email: Option<String>,

        /// External DNS API token (enables the DNS challenge)
        #[arg(long)]
        dns_token: Option<String>,
    },

    /// Install stacks or a profile
    Install {
        /// Stack ids
        stacks: Vec<String>,

        /// Installation profile instead of explicit ids
        #[arg(short, long)]
        profile: Option<String>,

        /// Deploy independent stacks concurrently
        #[arg(long)]
        parallel: bool,

        /// Run against an in-memory cluster without touching anything
        #[arg(long)]
        dry_run: bool,

        /// Do not wait for stacks to become ready
        #[arg(long)]
        no_wait: bool,

        /// Readiness timeout per stack, in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Deployment backend
        #[arg(short, long, value_enum)]
        backend: Option<BackendMode>,

        /// Domain label override, `<id>=<label>` (repeatable)
        #[arg(long = "prefix", value_parser = parse_prefix)]
        prefixes: Vec<(String, String)>,
    },

    /// Show deployed stacks and their replicas
    Status,

    /// Remove one deployed stack
    Remove {
        /// Stack id
        stack: String,
    },

    /// Show the logs of one service
    Logs {
        /// Service name (`<stack>_<service>`)
        service: String,

        /// Number of lines
        #[arg(short = 'n', long, default_value = "100")]
        tail: usize,
    },

    /// Replace one stored secret with a fresh value
    Rotate {
        /// Secret key, e.g. `grafana_password`
        key: String,
    },
}

/// Parse `<id>=<label>`.
pub fn parse_prefix(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, label)) if !key.is_empty() && !label.is_empty() => {
            Ok((key.to_string(), label.to_string()))
        }
        _ => Err(format!("expected <id>=<label>, got '{s}'")),
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli, cancel: CancellationToken) -> Result<(), DeployError> {
    let ctx = Context::new(cli.home, cli.json)?;

    match cli.command {
        Some(Commands::Catalog) => cmd_catalog(&ctx),
        Some(Commands::Profiles) => cmd_profiles(&ctx),
        Some(Commands::Plan { stacks, profile }) => cmd_plan(&ctx, &stacks, profile.as_deref()),
        Some(Commands::Render { stack }) => cmd_render(&ctx, &stack),
        Some(Commands::Configure {
            domain,
            email,
            dns_token,
        }) => cmd_configure(&ctx, domain, email, dns_token),
        Some(Commands::Install {
            stacks,
            profile,
            parallel,
            dry_run,
            no_wait,
            timeout,
            backend,
            prefixes,
        }) => {
            let request = InstallRequest {
                stacks,
                profile,
                parallel,
                dry_run,
                wait: !no_wait,
                timeout,
                backend,
                prefixes: prefixes.into_iter().collect(),
            };
            cmd_install(ctx, request, cancel).await
        }
        Some(Commands::Status) => cmd_status(&ctx).await,
        Some(Commands::Remove { stack }) => cmd_remove(&ctx, &stack).await,
        Some(Commands::Logs { service, tail }) => cmd_logs(&ctx, &service, tail).await,
        Some(Commands::Rotate { key }) => cmd_rotate(&ctx, &key),
        None => {
            // No subcommand - show the catalog by default
            cmd_catalog(&ctx)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn prefix_parser() {
        assert_eq!(
            parse_prefix("grafana=dash"),
            Ok(("grafana".to_string(), "dash".to_string()))
        );
        assert!(parse_prefix("grafana").is_err());
        assert!(parse_prefix("=dash").is_err());
    }

    #[test]
    fn install_arguments_parse() {
        let cli = Cli::try_parse_from([
            "stackforge",
            "--json",
            "install",
            "--profile",
            "basic",
            "--parallel",
            "--backend",
            "cli",
            "--prefix",
            "evolution=api",
        ])
        .expect("parse");
        assert!(cli.json);
        match cli.command {
            Some(Commands::Install {
                profile,
                parallel,
                backend,
                prefixes,
                ..
            }) => {
                assert_eq!(profile.as_deref(), Some("basic"));
                assert!(parallel);
                assert_eq!(backend, Some(BackendMode::Cli));
                assert_eq!(prefixes, vec![("evolution".into(), "api".into())]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
