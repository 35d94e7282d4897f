//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;

use crate::tracing::TracingConfig;

/// bayeux - Talk to a Bayeux/CometD server from the terminal
#[derive(Debug, Parser)]
#[command(name = "bayeux")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "BAYEUX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server URL, overriding server.url from the configuration
    #[arg(long, env = "BAYEUX_URL")]
    pub url: Option<String>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Log as JSON lines with timestamps, for running under a supervisor
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Picks the logging preset. `debug` comes from the configuration file.
    pub fn tracing_config(&self, debug: bool) -> TracingConfig {
        let debug = self.debug || debug;
        match (self.json_logs, debug) {
            (true, true) => TracingConfig::daemon().with_level(Level::DEBUG),
            (true, false) => TracingConfig::daemon(),
            (false, true) => TracingConfig::cli_debug(),
            (false, false) => TracingConfig::default(),
        }
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Subscribe to channels and print events as JSON lines until Ctrl-C
    Listen {
        /// Channels to subscribe to
        #[arg(required = true)]
        channels: Vec<String>,

        /// Poll with connect requests on the main transport instead of a
        /// dedicated long-polling transport
        #[arg(long)]
        no_long_polling: bool,
    },

    /// Publish one message and print the server's acknowledgement
    Publish {
        /// Channel to publish on
        channel: String,

        /// Message data as JSON
        data: String,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Dump,
    /// Print the default configuration file path
    Path,
}
