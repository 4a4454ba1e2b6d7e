//! # memory-ann
//!
//! Local approximate nearest-neighbor index for Agent Memory.
//!
//! This crate provides semantic similarity search over embedding vectors
//! without an external vector database. Vectors live in memory behind a
//! single-layer proximity graph; durable storage is delegated to
//! caller-supplied snapshot hooks.
//!
//! ## Features
//! - Cosine similarity over fixed-dimension `f64` vectors
//! - Greedy best-first graph search with deterministic ranking
//! - Incremental insert, upsert and delete with eager link repair
//! - Flat snapshots for export and exact restore
//! - Pluggable persistence via [`SnapshotStore`] (in-memory and JSON file)

pub mod config;
pub mod error;
pub mod graph;
pub mod graph_index;
pub mod index;
pub mod persistence;
pub mod snapshot;
pub mod store;

pub use config::GraphConfig;
pub use error::VectorError;
pub use graph::ProximityGraph;
pub use graph_index::GraphIndex;
pub use index::{IndexStats, SearchResult, VectorIndex};
pub use persistence::{
    FileSnapshotStore, MemorySnapshotStore, SnapshotStore, SNAPSHOT_FORMAT_VERSION,
};
pub use snapshot::{Snapshot, SnapshotParameters, SnapshotRecord};
pub use store::{cosine_similarity, VectorStore};
