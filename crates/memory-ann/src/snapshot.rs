//! Flat, storage-agnostic snapshot of a graph index.
//!
//! Records are emitted in ascending id order and each undirected link once
//! as `(lo, hi)`, so two indexes with the same state produce equal snapshots.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::GraphConfig;
use crate::error::VectorError;
use crate::graph::ProximityGraph;
use crate::store::VectorStore;

/// Graph parameters carried by a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotParameters {
    pub max_neighbors: usize,
    pub search_width: usize,
}

/// A stored `(id, vector)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: String,
    pub vector: Vec<f64>,
}

/// Serialized index state, sufficient to rebuild store, graph and entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub dimension: usize,
    pub parameters: SnapshotParameters,
    pub records: Vec<SnapshotRecord>,
    pub edges: Vec<(String, String)>,
    pub entry_point: Option<String>,
}

impl Snapshot {
    /// Capture the current state of `store` and `graph`.
    pub fn capture(config: &GraphConfig, store: &VectorStore, graph: &ProximityGraph) -> Self {
        Self {
            dimension: config.dimension,
            parameters: SnapshotParameters {
                max_neighbors: config.max_neighbors,
                search_width: config.search_width,
            },
            records: store
                .iter()
                .map(|(id, vector)| SnapshotRecord {
                    id: id.to_string(),
                    vector: vector.to_vec(),
                })
                .collect(),
            edges: graph
                .edges()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
            entry_point: graph.entry_point().map(str::to_string),
        }
    }

    /// Configuration the snapshot was taken with.
    pub fn config(&self) -> GraphConfig {
        GraphConfig {
            dimension: self.dimension,
            max_neighbors: self.parameters.max_neighbors,
            search_width: self.parameters.search_width,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rebuild store and graph, validating the snapshot on the way.
    pub fn restore(&self) -> Result<(GraphConfig, VectorStore, ProximityGraph), VectorError> {
        let config = self.config();
        config
            .validate()
            .map_err(|e| VectorError::InvalidSnapshot(e.to_string()))?;

        let mut store = VectorStore::new(config.dimension);
        let mut seen = HashSet::new();
        for record in &self.records {
            if !seen.insert(record.id.as_str()) {
                return Err(VectorError::InvalidSnapshot(format!(
                    "duplicate record {}",
                    record.id
                )));
            }
            store
                .put(record.id.as_str(), record.vector.clone())
                .map_err(|e| VectorError::InvalidSnapshot(format!("record {}: {e}", record.id)))?;
        }

        let graph = ProximityGraph::from_edges(
            &config,
            &store,
            self.edges.iter().map(|(a, b)| (a.as_str(), b.as_str())),
            self.entry_point.clone(),
        )?;

        Ok((config, store, graph))
    }
}
