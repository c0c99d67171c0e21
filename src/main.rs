/// Version injected at compile time via APTIBLE_MCP_VERSION (set by CI/CD),
/// or the crate version for local builds.
pub const VERSION: &str = match option_env!("APTIBLE_MCP_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};

use anyhow::{Context, Result};
use aptible_mcp::api::{auth, ApiClient};
use aptible_mcp::catalog::Catalog;
use aptible_mcp::config::Config;
use aptible_mcp::mcp::run_server;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// MCP server for the Aptible API, speaking over stdio
#[derive(Parser, Debug)]
#[command(name = "aptible-mcp", version, about, long_about = None)]
struct Args {
    /// Aptible API base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Aptible auth service base URL
    #[arg(long)]
    auth_url: Option<String>,

    /// Seconds between operation status polls
    #[arg(long)]
    poll_interval_secs: Option<u64>,

    /// Polls before an operation is reported as timed out
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Log level for debugging; RUST_LOG takes precedence when set
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    /// Log file (defaults to the config directory)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    /// CLI flags win over everything else
    fn apply(&self, mut config: Config) -> Config {
        if let Some(url) = &self.api_url {
            config.api_url = Some(url.clone());
        }
        if let Some(url) = &self.auth_url {
            config.auth_url = Some(url.clone());
        }
        if let Some(secs) = self.poll_interval_secs {
            config.poll_interval_secs = Some(secs);
        }
        if let Some(attempts) = self.max_attempts {
            config.max_attempts = Some(attempts);
        }
        config
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> Option<&'static str> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some("error"),
            LogLevel::Warn => Some("warn"),
            LogLevel::Info => Some("info"),
            LogLevel::Debug => Some("debug"),
            LogLevel::Trace => Some("trace"),
        }
    }
}

/// Log to a file; stdout carries the protocol
fn setup_logging(
    level: LogLevel,
    log_file: Option<&Path>,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(level.directive()?),
    };

    let log_path = log_file.map(Path::to_path_buf).unwrap_or_else(get_log_path);

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Cannot open log file {}: {e}", log_path.display());
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("aptible-mcp {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("aptible-mcp").join("aptible-mcp.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".aptible-mcp").join("aptible-mcp.log");
    }
    PathBuf::from("aptible-mcp.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level, args.log_file.as_deref());

    let config = args.apply(Config::load());
    let api_url = config.effective_api_url();
    let auth_url = config.effective_auth_url();
    tracing::info!("Using API {} and auth {}", api_url, auth_url);

    let token = auth::resolve_token(&auth_url).context("Failed to resolve Aptible credentials")?;
    let client = ApiClient::new(&api_url, &auth_url, &token)?;
    let catalog = Catalog::new(client, config.wait_config());

    run_server(catalog).await
}
