//! memory-ann
//!
//! Local approximate nearest-neighbor index for AI agent knowledge bases.
//!
//! # Usage
//!
//! ```bash
//! memory-ann add <ID> <V1,V2,...>
//! memory-ann remove <ID>
//! memory-ann search <V1,V2,...> [-k N] [-t THRESHOLD]
//! memory-ann stats
//! memory-ann import <FILE.jsonl>
//! memory-ann export [--pretty]
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/memory-ann/config.toml)
//! 3. Environment variables (MEMORY_ANN_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use memory_ann_cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli).await
}
