//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for Guildwarden.

use clap::{Parser, Subcommand};

/// Guildwarden - Membership lifecycle and role-hierarchy authorization
///
/// Watches a community guild, moves members through the verification
/// lifecycle, enforces rank bounds on promotions and demotions, and
/// keeps display names and session announcements in sync.
#[derive(Parser, Debug)]
#[command(name = "guildwarden")]
#[command(author, version, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the service (standalone mode against the in-memory gateway)
    Run {
        /// Path to configuration file
        #[arg(short, long, env = "GUILDWARDEN_CONFIG")]
        config: Option<String>,
    },

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,

        /// Emit JSON instead of TOML
        #[arg(long)]
        json: bool,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}
