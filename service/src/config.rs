use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::time::Duration;

/// Default TCP port the push endpoint listens on.
pub const DEFAULT_PORT: u16 = 3201;

/// Default path pattern on which push connections are accepted.
pub const DEFAULT_CONNECTION_URL: &str = "/events/:api";

/// Seconds of inactivity after which an abandoned push connection is reclaimed.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that are allowed to open push connections.
    /// When empty no CORS headers are added to responses.
    #[arg(long, env, value_delimiter = ',', use_value_delimiter = true)]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "0.0.0.0")]
    pub interface: String,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// URL path pattern on which push connections are accepted
    #[arg(short, long, env, default_value = DEFAULT_CONNECTION_URL)]
    pub connection_url: String,

    /// Seconds without a delivered frame before a push connection is dropped
    #[arg(long, env, default_value_t = DEFAULT_IDLE_TIMEOUT_SECS)]
    pub idle_timeout_secs: u64,

    /// Seconds between keepalive broadcasts (0 disables the keepalive scheduler)
    #[arg(long, env, default_value_t = 5)]
    pub keepalive_interval_secs: u64,

    /// Number of frames buffered per subscriber before it is treated as gone
    #[arg(long, env, default_value_t = 64)]
    pub channel_capacity: usize,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Returns the keepalive period, or `None` when the scheduler is disabled.
    pub fn keepalive_interval(&self) -> Option<Duration> {
        match self.keepalive_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
