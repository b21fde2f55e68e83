//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

/// Serve command arguments.
#[derive(Debug, Default, Args)]
pub struct ServeCommand {
    /// IP address to listen on (overrides `server.host`)
    #[arg(long)]
    pub host: Option<String>,

    /// TCP port to listen on (overrides `server.port`)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Only show members whose name, apartment or phone contains this text
    pub query: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One line per member
    Plain,
    /// Aligned columns
    #[default]
    Table,
    /// JSON output
    Json,
}
