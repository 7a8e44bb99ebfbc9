//! Command-line arguments

use std::path::PathBuf;

use clap::Parser;

use crate::config::SeaguardConfig;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "seaguard",
    version,
    about = "LLM proxy and coastal safety guide service"
)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "SEAGUARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address, overrides `server.host`
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port, overrides `server.port`
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Apply command-line overrides on top of loaded configuration
    pub fn apply(&self, config: &mut SeaguardConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}
