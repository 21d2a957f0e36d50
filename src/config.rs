use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::HttpApi;

/// dotx - headless explorer for an indexed ledger API
///
/// Resolves identifiers, shows blocks/extrinsics/accounts and follows the chain head.
/// Configuration priority: CLI args > Environment variables > Config file > Defaults
#[derive(Parser, Debug)]
#[command(name = "dotx")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Headless explorer for an indexed ledger API", long_about = None)]
pub struct CliArgs {
    /// Explorer API base URL
    #[arg(long, env = "DOTX_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Refresh period for `watch` in milliseconds (1000-600000)
    #[arg(long, env = "POLL_INTERVAL_MS", global = true)]
    pub poll_interval_ms: Option<u64>,

    /// HTTP request timeout in milliseconds (1000-60000)
    #[arg(long, env = "RPC_TIMEOUT_MS", global = true)]
    pub rpc_timeout_ms: Option<u64>,

    /// Retry attempts for transient HTTP failures (0-10)
    #[arg(long, env = "RPC_RETRIES", global = true)]
    pub rpc_retries: Option<u32>,

    /// Rows per page for extrinsics/events (1-100)
    #[arg(long, env = "PAGE_SIZE", global = true)]
    pub page_size: Option<u32>,

    /// Number of recent blocks fetched per refresh (1-500)
    #[arg(long, env = "RECENT_LIMIT", global = true)]
    pub recent_limit: Option<u32>,

    /// Expected block time in seconds, used for arrival estimates (1-3600)
    #[arg(long, env = "BLOCK_TIME_SECS", global = true)]
    pub block_time_secs: Option<u64>,

    /// Optional config file path (TOML format)
    #[arg(long = "config", env = "DOTX_CONFIG", global = true)]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Resolve a block number, 0x-hash or free text to a target
    Resolve { query: String },
    /// Show a block with its extrinsics, events and logs
    Block {
        number: String,
        /// Extrinsics/events page to show
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Show one extrinsic by `<block>-<index>`
    Extrinsic { index: String },
    /// Search blocks by number, hash or author
    Search {
        #[arg(long)]
        number: Option<String>,
        #[arg(long)]
        hash: Option<String>,
        #[arg(long)]
        author: Option<String>,
        /// Only finalized blocks
        #[arg(long)]
        finalized: bool,
    },
    /// Show asset balances of an account
    Account { id: String },
    /// Poll recent blocks and print range movements until Ctrl-C
    Watch,
}

/// Configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub api: ApiSection,

    #[serde(default)]
    pub polling: PollingSection,

    #[serde(default)]
    pub view: ViewSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSection {
    pub url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub retries: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollingSection {
    pub interval_ms: Option<u64>,
    pub recent_limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewSection {
    pub page_size: Option<u32>,
    pub block_time_secs: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub poll_interval_ms: u64,
    pub rpc_timeout_ms: u64,
    pub rpc_retries: u32,
    pub page_size: u32,
    pub recent_limit: u32,
    pub block_time_secs: u64,
}

/// Validate that a value is within a given range (inclusive)
fn validate_in_range<T>(val: T, min: T, max: T, name: &str) -> Result<T>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if val < min || val > max {
        Err(anyhow!("{name} must be in range [{min}, {max}], got {val}"))
    } else {
        Ok(val)
    }
}

/// Validate URL format (basic check)
fn validate_url(url: &str, name: &str) -> Result<()> {
    if url.is_empty() {
        return Err(anyhow!("{name} cannot be empty"));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow!("{name} must start with http:// or https://"))
    }
}

/// Load configuration from parsed CLI args (env already folded in by clap)
/// and the optional TOML file.
/// Priority: CLI args > Environment variables > Config file > Defaults
pub fn load(args: &CliArgs) -> Result<Config> {
    let file = match &args.config_file {
        Some(path) => {
            log::info!("📄 Loading configuration from {}", path.display());
            Some(load_from_file(path)?)
        }
        None => None,
    };
    resolve(args, file.unwrap_or_default())
}

/// Load configuration from TOML file
pub fn load_from_file(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
}

/// Merge CLI/env values over file values over defaults, then validate.
pub fn resolve(args: &CliArgs, file: ConfigFile) -> Result<Config> {
    let api_url = args
        .api_url
        .clone()
        .or(file.api.url)
        .unwrap_or_else(|| "http://localhost:8000".to_string());
    validate_url(&api_url, "DOTX_API_URL")?;

    let poll_interval_ms = args
        .poll_interval_ms
        .or(file.polling.interval_ms)
        .unwrap_or(12_000);
    let poll_interval_ms = validate_in_range(poll_interval_ms, 1000, 600_000, "POLL_INTERVAL_MS")?;

    let rpc_timeout_ms = args.rpc_timeout_ms.or(file.api.timeout_ms).unwrap_or(8000);
    let rpc_timeout_ms = validate_in_range(rpc_timeout_ms, 1000, 60_000, "RPC_TIMEOUT_MS")?;

    let rpc_retries = args.rpc_retries.or(file.api.retries).unwrap_or(2);
    let rpc_retries = validate_in_range(rpc_retries, 0, 10, "RPC_RETRIES")?;

    let page_size = args.page_size.or(file.view.page_size).unwrap_or(25);
    let page_size = validate_in_range(page_size, 1, 100, "PAGE_SIZE")?;

    let recent_limit = args
        .recent_limit
        .or(file.polling.recent_limit)
        .unwrap_or(50);
    let recent_limit = validate_in_range(recent_limit, 1, 500, "RECENT_LIMIT")?;

    let block_time_secs = args
        .block_time_secs
        .or(file.view.block_time_secs)
        .unwrap_or(6);
    let block_time_secs = validate_in_range(block_time_secs, 1, 3600, "BLOCK_TIME_SECS")?;

    Ok(Config {
        api_url,
        poll_interval_ms,
        rpc_timeout_ms,
        rpc_retries,
        page_size,
        recent_limit,
        block_time_secs,
    })
}

impl Config {
    pub fn http_api(&self) -> HttpApi {
        HttpApi::new(&self.api_url, self.rpc_timeout_ms, self.rpc_retries)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Print current configuration (useful for debugging)
    pub fn print_summary(&self) {
        eprintln!("dotx Configuration:");
        eprintln!("  API URL: {}", self.api_url);
        eprintln!("  Poll Interval: {}ms", self.poll_interval_ms);
        eprintln!("  Request Timeout: {}ms", self.rpc_timeout_ms);
        eprintln!("  Retries: {}", self.rpc_retries);
        eprintln!("  Page Size: {}", self.page_size);
        eprintln!("  Recent Limit: {}", self.recent_limit);
        eprintln!("  Block Time: {}s", self.block_time_secs);
    }
}
