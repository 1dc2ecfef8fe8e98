//! annostore CLI
//!
//! Command-line tools for annotation stores.
//!
//! # Commands
//!
//! - `load` - Print a dataset's document
//! - `save` - Merge (or replace) records from a JSON file into a dataset
//! - `merge` - Preview a merge of two JSON files without a store
//! - `inspect` - List datasets with generation and record count

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// annostore command-line tools.
#[derive(Parser)]
#[command(name = "annostore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a dataset's document
    Load {
        /// Dataset id
        #[arg(short, long)]
        dataset: String,

        /// Read-only store consulted when the primary has nothing
        #[arg(long)]
        fallback: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Save records from a JSON array file into a dataset
    Save {
        /// Dataset id
        #[arg(short, long)]
        dataset: String,

        /// JSON file holding an array of records
        file: PathBuf,

        /// Replace the whole document instead of merging
        #[arg(long)]
        replace: bool,

        /// Maximum commit attempts on generation conflicts
        #[arg(short, long, default_value = "3")]
        attempts: u32,
    },

    /// Merge one JSON records file into another and print the result
    Merge {
        /// Current document
        existing: PathBuf,

        /// Records to merge in
        incoming: PathBuf,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List datasets with generation and record count
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Load {
            dataset,
            fallback,
            format,
        } => {
            let path = cli.path.ok_or("Store path required for load")?;
            commands::load::run(&path, &dataset, fallback.as_deref(), &format).await?;
        }
        Commands::Save {
            dataset,
            file,
            replace,
            attempts,
        } => {
            let path = cli.path.ok_or("Store path required for save")?;
            commands::save::run(&path, &dataset, &file, replace, attempts).await?;
        }
        Commands::Merge {
            existing,
            incoming,
            output,
        } => {
            commands::merge::run(&existing, &incoming, output.as_deref())?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, &format).await?;
        }
        Commands::Version => {
            println!("annostore CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
