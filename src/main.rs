use anyhow::{Context, Result};
use clap::Parser;
use devbox_mcp::gateway::{Dispatcher, GatewaySettings};
use devbox_mcp::{platform_dirs, server};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// MCP server exposing a repository's allowlisted commands, logs and files
#[derive(Parser, Debug)]
#[command(name = "devbox-mcp", version, about)]
struct Args {
    /// Repository root (defaults to the current directory)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Command catalog, relative to the root
    #[arg(long, default_value = ".box/box.yaml")]
    box_config: PathBuf,

    /// Policy document, relative to the root
    #[arg(long, default_value = ".box/policies.yaml")]
    policy: PathBuf,

    /// Tool listing document, relative to the root
    #[arg(long, default_value = ".box/mcp/server.json")]
    tools: PathBuf,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also write a daily log file to the platform data directory
    #[arg(long)]
    log_file: bool,
}

/// Logs go to stderr; stdout carries the protocol.
fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let (file_layer, guard) = if args.log_file {
        let dir = platform_dirs::log_dir()?;
        platform_dirs::ensure_dir(&dir)?;
        let appender = tracing_appender::rolling::daily(&dir, "devbox-mcp.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_writer(writer).with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
        .with(file_layer)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(&args)?;

    let root = match &args.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };

    let settings = GatewaySettings::new(root)
        .with_box_file(&args.box_config)
        .with_policy_file(&args.policy)
        .with_tools_file(&args.tools);

    let dispatcher = Arc::new(Dispatcher::new(settings));
    info!(
        root = %dispatcher.root().display(),
        version = env!("CARGO_PKG_VERSION"),
        "Starting devbox MCP server on stdio"
    );

    let io = server::build_handler(dispatcher);
    server::serve(io, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;

    info!("Server stopped");
    Ok(())
}
