//! Graph index: the public façade over vector store, proximity graph and
//! snapshot persistence.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::GraphConfig;
use crate::error::VectorError;
use crate::graph::ProximityGraph;
use crate::index::{IndexStats, SearchResult, VectorIndex};
use crate::persistence::SnapshotStore;
use crate::snapshot::Snapshot;
use crate::store::VectorStore;

/// In-process approximate nearest-neighbor index over a proximity graph.
///
/// The dimension is fixed at construction. All mutation goes through
/// [`VectorIndex::add`] and [`VectorIndex::remove`].
pub struct GraphIndex {
    config: GraphConfig,
    store: VectorStore,
    graph: ProximityGraph,
    persistence: Option<Arc<dyn SnapshotStore>>,
}

impl fmt::Debug for GraphIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphIndex")
            .field("config", &self.config)
            .field("vectors", &self.store.len())
            .field("edges", &self.graph.edge_count())
            .field("persistence", &self.persistence.is_some())
            .finish()
    }
}

impl GraphIndex {
    /// Create an empty index without persistence hooks.
    pub fn new(config: GraphConfig) -> Result<Self, VectorError> {
        config.validate()?;
        Ok(Self {
            config,
            store: VectorStore::new(config.dimension),
            graph: ProximityGraph::new(&config),
            persistence: None,
        })
    }

    /// Create an index, restoring from `persistence` when it holds a snapshot
    /// of the same dimension.
    ///
    /// A snapshot with a different dimension is discarded and the index
    /// starts empty. Load errors are returned unchanged.
    pub async fn init(
        config: GraphConfig,
        persistence: Option<Arc<dyn SnapshotStore>>,
    ) -> Result<Self, VectorError> {
        config.validate()?;

        let loaded = match &persistence {
            Some(hooks) => hooks.load().await?,
            None => None,
        };

        let mut index = match loaded {
            Some(snapshot) if snapshot.dimension == config.dimension => {
                Self::from_snapshot(&snapshot)?
            }
            Some(snapshot) => {
                warn!(
                    expected = config.dimension,
                    found = snapshot.dimension,
                    "Discarding snapshot with mismatched dimension"
                );
                Self::new(config)?
            }
            None => Self::new(config)?,
        };
        index.persistence = persistence;

        info!(
            dim = index.config.dimension,
            vectors = index.store.len(),
            "Initialized graph index"
        );
        Ok(index)
    }

    /// Attach a snapshot store used by `persist`. Nothing is loaded.
    pub fn with_persistence(mut self, persistence: Arc<dyn SnapshotStore>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Rebuild an index exactly from a snapshot.
    ///
    /// The snapshot's own parameters are used so the restored graph searches
    /// identically to the one that produced it.
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self, VectorError> {
        let (config, store, graph) = snapshot.restore()?;
        debug!(
            vectors = store.len(),
            edges = graph.edge_count(),
            "Restored index from snapshot"
        );
        Ok(Self {
            config,
            store,
            graph,
            persistence: None,
        })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Number of stored vectors.
    pub fn size(&self) -> usize {
        self.store.len()
    }

    /// Stored vector for `id`.
    pub fn get(&self, id: &str) -> Option<&[f64]> {
        self.store.get(id)
    }

    /// Pure snapshot of the current state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.config, &self.store, &self.graph)
    }

    /// Hand the current snapshot to the save hook.
    ///
    /// Returns false when no hook is attached.
    pub async fn persist(&self) -> Result<bool, VectorError> {
        let Some(hooks) = &self.persistence else {
            return Ok(false);
        };
        let snapshot = self.snapshot();
        hooks.save(&snapshot).await?;
        info!(vectors = snapshot.len(), "Persisted graph index");
        Ok(true)
    }

    /// Check graph invariants against the stored records.
    pub fn check_invariants(&self) -> Result<(), String> {
        self.graph.check_invariants(&self.store)
    }
}

impl VectorIndex for GraphIndex {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn len(&self) -> usize {
        self.store.len()
    }

    fn add(&mut self, id: &str, vector: Vec<f64>) -> Result<(), VectorError> {
        self.graph.insert(&mut self.store, id, vector)?;
        debug!(id, "Added vector");
        Ok(())
    }

    fn search(
        &self,
        query: &[f64],
        k: usize,
        threshold: f64,
    ) -> Result<Vec<SearchResult>, VectorError> {
        VectorError::check_dimension(self.store.dimension(), query.len())?;
        let results = self.graph.search(&self.store, query, k, threshold);
        debug!(k, threshold, found = results.len(), "Search complete");
        Ok(results)
    }

    fn remove(&mut self, id: &str) -> bool {
        let removed = self.graph.remove(&mut self.store, id);
        if removed {
            debug!(id, "Removed vector");
        }
        removed
    }

    fn contains(&self, id: &str) -> bool {
        self.store.contains(id)
    }

    fn stats(&self) -> IndexStats {
        let vector_count = self.store.len();
        let edge_count = self.graph.edge_count();
        let average_degree = if vector_count == 0 {
            0.0
        } else {
            (2 * edge_count) as f64 / vector_count as f64
        };

        IndexStats {
            vector_count,
            edge_count,
            dimension: self.config.dimension,
            max_neighbors: self.config.max_neighbors,
            search_width: self.config.search_width,
            entry_point: self.graph.entry_point().map(str::to_string),
            average_degree,
        }
    }

    fn clear(&mut self) {
        self.store.clear();
        self.graph.clear();
        info!("Cleared graph index");
    }
}
