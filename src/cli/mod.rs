//! Command-line interface for the diagnostic binary.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::settings::ClientSettings;

#[derive(Parser)]
#[command(name = "ledgerline")]
#[command(about = "Line-delimited JSON-RPC client for indexing/ledger servers")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Server host
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Wrap the connection in TLS
    #[arg(long, global = true)]
    pub tls: bool,

    /// Connect timeout in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Issue one request and print the result
    Call {
        /// RPC method name, e.g. server.ping
        method: String,

        /// JSON params array, defaults to []
        params: Option<String>,
    },

    /// Subscribe to notification events and print them until interrupted
    Listen {
        /// Event names to subscribe to
        #[arg(required = true)]
        events: Vec<String>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Settings from environment defaults, overridden by global flags
    pub fn settings(&self) -> ClientSettings {
        let mut settings = ClientSettings::load();
        if let Some(host) = &self.host {
            settings.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if self.tls {
            settings.tls = true;
        }
        if let Some(ms) = self.timeout_ms {
            settings.connect_timeout_ms = ms;
        }
        if let Some(level) = &self.log_level {
            settings.log_level = level.clone();
        }
        settings
    }

    pub async fn run(self) -> Result<()> {
        let settings = self.settings();
        crate::config::init_logging(&settings.log_level)?;

        match self.command {
            Commands::Call { method, params } => commands::call(&settings, &method, params).await,
            Commands::Listen { events } => commands::listen(&settings, events).await,
        }
    }
}
