//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};

use clap::Parser;

use crate::sync::{SyncPolicy, SyncRole};

/// CLI argument parsing structure
#[derive(Parser, Debug, Clone)]
#[command(name = "countdown-sync")]
#[command(about = "Countdown timers kept in step with a peer device")]
#[command(version)]
pub struct Config {
    /// Port to bind the HTTP control surface to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Whether this side holds the true running timer
    #[arg(long, value_enum, default_value_t = SyncRole::Authority)]
    pub role: SyncRole,

    /// Address to accept peer connections on
    #[arg(long)]
    pub peer_listen: Option<String>,

    /// Address of the remote peer
    #[arg(long)]
    pub peer: Option<String>,

    /// JSON file the timer model is persisted to; kept in memory when absent
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Seconds between sync pushes from the authority
    #[arg(long, default_value = "1")]
    pub sync_interval: u64,

    /// Engine sampling period in milliseconds
    #[arg(long, default_value = "250")]
    pub tick_millis: u64,

    /// Retries for a peer send that hit a transient failure
    #[arg(long, default_value = "5")]
    pub max_retries: u32,

    /// Seconds to wait for a peer reply
    #[arg(long, default_value = "10")]
    pub reply_timeout: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval.max(1))
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_millis.clamp(10, 1000))
    }

    /// Delivery policy for the peer link
    pub fn sync_policy(&self) -> SyncPolicy {
        SyncPolicy {
            max_retries: self.max_retries,
            reply_timeout: Duration::from_secs(self.reply_timeout),
            ..SyncPolicy::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["countdown-sync"]).unwrap();
        assert_eq!(config.address(), "127.0.0.1:20554");
        assert_eq!(config.role, SyncRole::Authority);
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.sync_policy(), SyncPolicy::default());
        assert_eq!(config.tick_period(), Duration::from_millis(250));
        assert!(config.peer.is_none() && config.state_file.is_none());
    }

    #[test]
    fn test_replica_flags() {
        let config = Config::try_parse_from([
            "countdown-sync",
            "--role",
            "replica",
            "--peer",
            "10.0.0.2:7000",
            "--max-retries",
            "2",
            "--reply-timeout",
            "3",
            "--sync-interval",
            "0",
            "-v",
        ])
        .unwrap();
        assert_eq!(config.role, SyncRole::Replica);
        assert_eq!(config.peer.as_deref(), Some("10.0.0.2:7000"));
        assert_eq!(config.sync_policy().max_retries, 2);
        assert_eq!(config.sync_policy().reply_timeout, Duration::from_secs(3));
        assert_eq!(config.sync_interval(), Duration::from_secs(1));
        assert_eq!(config.log_level(), "debug");
    }
}
