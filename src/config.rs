use clap::Parser;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Redis server URL. Unset means in-memory stores.
    /// Format: redis://[:PASSWORD@]HOST:PORT
    pub redis_url: Option<String>,

    /// CSV file loaded by `POST /data` when the request has no body
    pub data_path: PathBuf,

    pub bind_addr: String,
    pub port: u16,

    /// Maximum payload size for all requests (in bytes)
    /// Default: 10MB (10 * 1024 * 1024)
    pub max_payload_size: usize,

    /// Directory for the rolling log files
    pub log_dir: String,

    /// Longest single wait on the job queue
    pub queue_poll_interval: Duration,

    /// Whether this process runs the job worker
    pub run_worker: bool,
}

/// Command line overrides for the environment configuration
#[derive(Parser, Debug, Default)]
#[command(name = "auto-trends", about = "Auto trends data and plotting service")]
pub struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long)]
    pub bind: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    /// CSV dataset read by POST /data
    #[arg(long)]
    pub data_path: Option<PathBuf>,

    /// Serve HTTP only; another process consumes the queue
    #[arg(long)]
    pub no_worker: bool,
}

/// Parse `key` when it is set, falling back to `default` only when it is absent
fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, String> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("{} has an invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Optional environment variables:
    /// - REDIS_URL: Redis connection string (default: unset, in-memory stores)
    /// - DATA_PATH: dataset CSV (default: auto_trends_data.csv)
    /// - BIND_ADDR / PORT: listen address (default: 127.0.0.1:8080)
    /// - MAX_PAYLOAD_SIZE: Maximum request payload size in bytes (default: 10485760 = 10MB)
    /// - LOG_DIR: log directory (default: logs)
    /// - QUEUE_POLL_SECS: queue wait per poll (default: 1)
    /// - RUN_WORKER: start the job worker in this process (default: true)
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let redis_url = lookup("REDIS_URL").filter(|url| !url.trim().is_empty());

        let port = parse_var(&lookup, "PORT", 8080)?;
        let max_payload_size = parse_var(&lookup, "MAX_PAYLOAD_SIZE", 10 * 1024 * 1024)?;

        let queue_poll_secs: u64 = parse_var(&lookup, "QUEUE_POLL_SECS", 1)?;
        if queue_poll_secs == 0 {
            return Err("QUEUE_POLL_SECS must be at least 1".to_string());
        }

        let run_worker = match lookup("RUN_WORKER").map(|s| s.trim().to_ascii_lowercase()) {
            None => true,
            Some(v) => !matches!(v.as_str(), "0" | "false" | "no" | "off"),
        };

        Ok(Config {
            redis_url,
            data_path: lookup("DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("auto_trends_data.csv")),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            max_payload_size,
            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
            queue_poll_interval: Duration::from_secs(queue_poll_secs),
            run_worker,
        })
    }

    /// Apply command line flags on top of the environment
    pub fn with_cli(mut self, cli: Cli) -> Self {
        if let Some(bind) = cli.bind {
            self.bind_addr = bind;
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(path) = cli.data_path {
            self.data_path = path;
        }
        if cli.no_worker {
            self.run_worker = false;
        }
        self
    }
}
