//! # jobindex CLI Module
//!
//! This module implements the CLI interface for jobindex.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `status` - Show store status
//! - `index` - Deliver one storage event to the indexer
//! - `put` - Store an object from a file (create-if-absent)
//! - `get` - Print an object and its metadata
//! - `list` - List object names under a prefix
//! - `compact` - Compact the database file
//! - `init` - Initialize a new database

mod commands;

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use jobindex_core::IndexError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// jobindex - CI job index publisher
///
/// Turns completion markers and metrics dumps of CI jobs into date-sharded
/// index entries, published at most once.
#[derive(Parser, Debug)]
#[command(name = "jobindex")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the object database
    #[arg(short = 'D', long, global = true, default_value = "jobindex.db")]
    pub database: PathBuf,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Show store status
    Status,

    /// Deliver one storage event to the indexer
    Index {
        /// Bucket holding the changed object
        #[arg(short, long)]
        bucket: String,

        /// Name of the changed object
        #[arg(short, long)]
        name: String,
    },

    /// Store an object from a file; an existing object is left untouched
    Put {
        #[arg(short, long)]
        bucket: String,

        #[arg(short, long)]
        name: String,

        /// File holding the object content
        #[arg(short, long)]
        file: PathBuf,

        /// Metadata attribute as key=value (repeatable)
        #[arg(short, long = "attr")]
        attrs: Vec<String>,
    },

    /// Print an object and its metadata
    Get {
        #[arg(short, long)]
        bucket: String,

        #[arg(short, long)]
        name: String,
    },

    /// List object names under a prefix
    List {
        #[arg(short, long)]
        bucket: String,

        #[arg(short, long, default_value = "")]
        prefix: String,
    },

    /// Compact the database file
    Compact,

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), IndexError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_env(|name| std::env::var(name).ok());
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            cmd_server(&cli.database, config, &host, port).await
        }
        Some(Commands::Status) => cmd_status(&cli.database, &config, json_mode),
        Some(Commands::Index { bucket, name }) => {
            cmd_index(&cli.database, &config, json_mode, &bucket, &name)
        }
        Some(Commands::Put {
            bucket,
            name,
            file,
            attrs,
        }) => cmd_put(&cli.database, json_mode, &bucket, &name, &file, &attrs),
        Some(Commands::Get { bucket, name }) => cmd_get(&cli.database, json_mode, &bucket, &name),
        Some(Commands::List { bucket, prefix }) => {
            cmd_list(&cli.database, json_mode, &bucket, &prefix)
        }
        Some(Commands::Compact) => cmd_compact(&cli.database, json_mode),
        Some(Commands::Init { force }) => cmd_init(&cli.database, force),
        None => {
            // No subcommand - show status by default
            cmd_status(&cli.database, &config, json_mode)
        }
    }
}
