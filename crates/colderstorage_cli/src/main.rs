//! ColderStorage CLI
//!
//! Command-line tools for ColderStorage databases.
//!
//! # Commands
//!
//! - `put`, `get`, `delete`, `scan` - Raw key-value access
//! - `sql` - Run one statement and print its rows
//! - `tables`, `describe` - Browse the catalog
//! - `compact` - Merge SSTables and drop deleted data
//! - `inspect` - Display database layout and metadata

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ColderStorage command-line database tools.
#[derive(Parser)]
#[command(name = "colderstorage")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format shared by commands that print structured data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text
    Text,
    /// JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a value under a key
    Put {
        /// Key (UTF-8)
        key: String,
        /// Value (UTF-8)
        value: String,
    },

    /// Print the value stored under a key
    Get {
        /// Key (UTF-8)
        key: String,
    },

    /// Delete a key
    Delete {
        /// Key (UTF-8)
        key: String,
    },

    /// Print every key in an inclusive range
    Scan {
        /// Lowest key to print
        lower: String,
        /// Highest key to print
        upper: String,
        /// Maximum number of entries to print
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Run one statement and print its result
    Sql {
        /// The statement
        statement: String,
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// List tables
    Tables,

    /// Show the columns of a table
    Describe {
        /// Table name
        table: String,
    },

    /// Flush memtables and merge every SSTable
    Compact,

    /// Display database layout and metadata
    Inspect {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Version = cli.command {
        println!("ColderStorage CLI v{}", env!("CARGO_PKG_VERSION"));
        let (major, minor) = colderstorage_core::Config::default().format_version;
        println!("Format version {major}.{minor}");
        return Ok(());
    }

    let path = cli.path.ok_or("Database path required (--path)")?;
    match cli.command {
        Commands::Put { key, value } => commands::kv::put(&path, &key, &value)?,
        Commands::Get { key } => commands::kv::get(&path, &key)?,
        Commands::Delete { key } => commands::kv::delete(&path, &key)?,
        Commands::Scan {
            lower,
            upper,
            limit,
        } => commands::kv::scan(&path, &lower, &upper, limit)?,
        Commands::Sql { statement, format } => commands::sql::run(&path, &statement, format)?,
        Commands::Tables => commands::sql::tables(&path)?,
        Commands::Describe { table } => commands::sql::describe(&path, &table)?,
        Commands::Compact => commands::compact::run(&path)?,
        Commands::Inspect { format } => commands::inspect::run(&path, format)?,
        Commands::Version => {}
    }

    Ok(())
}
