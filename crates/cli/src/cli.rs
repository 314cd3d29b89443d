//! CLI argument definitions using clap.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Telemetry Bridge - MQTT device telemetry into a hypermedia resource API
#[derive(Parser, Debug)]
#[command(
    name = "telemetry-bridge",
    author,
    version,
    about = "Bridge device telemetry from MQTT into a hypermedia resource API",
    long_about = "Subscribes to device telemetry over MQTT, creates device and sensor \n\
                  resources on first sight and appends every numeric reading to the \n\
                  sensor's data history. Events are processed strictly one at a time, \n\
                  in arrival order."
)]
pub struct Cli {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "TELEMETRY_BRIDGE_CONFIG"
    )]
    pub config: PathBuf,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, env = "TELEMETRY_BRIDGE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "json",
        env = "TELEMETRY_BRIDGE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Expose Prometheus metrics on this port
    #[arg(long, env = "TELEMETRY_BRIDGE_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Load and validate the configuration, then exit
    #[arg(long)]
    pub check: bool,
}

impl Cli {
    /// Log level used when `RUST_LOG` is not set
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logging
    #[default]
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
