//! ctxattr CLI — resolve and validate context attribution requests.
//!
//! Arguments are layered from config files, `CTXATTR_*` environment variables,
//! and command-line flags, then validated before being handed to the
//! attribution engine.

mod commands;
mod flags;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// ctxattr: context-sensitivity attribution for language model outputs
#[derive(Parser, Debug)]
#[command(name = "ctxattr", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds `.ctxattr/config.toml`)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Configuration file path, applied on top of user and workspace configs
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Resolve and validate the arguments of a context attribution run
    AttributeContext {
        #[command(flatten)]
        flags: flags::AttributeContextFlags,

        /// Start from a previously saved request; --config, CTXATTR_* variables
        /// and the other flags still apply on top of it
        #[arg(long)]
        from_request: Option<PathBuf>,

        /// Write the validated request as JSON instead of printing it
        #[arg(long)]
        dump_request: Option<PathBuf>,
    },
    /// List the available step functions
    StepFunctions {
        /// Only show contrastive step functions (usable as context sensitivity metrics)
        #[arg(long)]
        contrastive: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create default workspace configuration file
    Init,
    /// Show the merged configuration
    Show,
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    // Human-readable layer for stderr
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "ctxattr", "ctxattr")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "ctxattr.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.config.as_deref())
}
