//! memory-ann CLI library exports.
//!
//! This crate provides the command-line front end for the memory-ann index.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (add, remove, search, stats, import, export)
//! - `settings`: Layered configuration loading

pub mod cli;
pub mod commands;
pub mod settings;

pub use cli::{parse_vector, Cli, Commands};
pub use commands::{execute, init_logging, open_index, resolve_settings, run};
pub use settings::Settings;
