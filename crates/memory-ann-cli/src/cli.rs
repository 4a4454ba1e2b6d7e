//! CLI argument parsing for memory-ann.
//!
//! CLI flags override all other config sources.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Local vector index for Agent Memory
///
/// Maintains an approximate nearest-neighbor index in a snapshot file and
/// answers similarity queries against it.
#[derive(Parser, Debug)]
#[command(name = "memory-ann")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/memory-ann/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override snapshot file path
    #[arg(long, global = true)]
    pub snapshot: Option<String>,

    /// Override vector dimension for a new index
    #[arg(long, global = true)]
    pub dimension: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Index commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Add or replace a vector
    Add {
        /// Record ID
        id: String,

        /// Comma-separated components, e.g. 0.1,0.2,0.3
        #[arg(allow_hyphen_values = true)]
        vector: String,
    },

    /// Remove a vector
    Remove {
        /// Record ID
        id: String,
    },

    /// Find the most similar vectors
    Search {
        /// Comma-separated query components
        #[arg(allow_hyphen_values = true)]
        vector: String,

        /// Maximum results
        #[arg(short, long)]
        k: Option<usize>,

        /// Minimum similarity
        #[arg(short, long, allow_negative_numbers = true)]
        threshold: Option<f64>,
    },

    /// Show index statistics
    Stats,

    /// Bulk-load records from a JSON-lines file ({"id": ..., "vector": [...]})
    Import {
        /// Input file
        path: PathBuf,
    },

    /// Print the index snapshot as JSON
    Export {
        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },
}

/// Parse a comma-separated vector argument.
pub fn parse_vector(input: &str) -> Result<Vec<f64>, String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<f64>() {
            Ok(x) if x.is_finite() => Ok(x),
            Ok(_) => Err(format!("invalid component '{}': not a finite number", s)),
            Err(e) => Err(format!("invalid component '{}': {}", s, e)),
        })
        .collect()
}
