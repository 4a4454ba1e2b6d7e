//! Vector index trait and types.
//!
//! Defines the interface for vector similarity search.

use serde::{Deserialize, Serialize};

use crate::error::VectorError;

/// Result of a vector search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Caller-chosen record ID
    pub id: String,
    /// Cosine similarity to the query (higher = more similar)
    pub similarity: f64,
}

impl SearchResult {
    pub fn new(id: impl Into<String>, similarity: f64) -> Self {
        Self {
            id: id.into(),
            similarity,
        }
    }
}

/// Index statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of vectors in the index
    pub vector_count: usize,
    /// Number of undirected graph links
    pub edge_count: usize,
    /// Embedding dimension
    pub dimension: usize,
    /// Link bound per node (M)
    pub max_neighbors: usize,
    /// Candidate pool size during search (ef)
    pub search_width: usize,
    /// Node that seeds graph search
    pub entry_point: Option<String>,
    /// Mean links per node
    pub average_degree: f64,
}

/// Trait for vector indexes.
///
/// Mutation takes `&mut self`; callers sharing an index across tasks must
/// serialize writers themselves (e.g. `Arc<RwLock<_>>`).
pub trait VectorIndex: Send + Sync {
    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the number of vectors in the index
    fn len(&self) -> usize;

    /// Check if the index is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add or replace the vector stored under `id`.
    fn add(&mut self, id: &str, vector: Vec<f64>) -> Result<(), VectorError>;

    /// Add multiple vectors in batch.
    ///
    /// Every vector is checked before the first insert, so a batch with a
    /// bad dimension or a non-finite component changes nothing.
    fn add_batch(&mut self, vectors: Vec<(String, Vec<f64>)>) -> Result<(), VectorError> {
        let expected = self.dimension();
        for (_, vector) in &vectors {
            VectorError::check_vector(expected, vector)?;
        }
        for (id, vector) in vectors {
            self.add(&id, vector)?;
        }
        Ok(())
    }

    /// Search for the `k` most similar vectors with `similarity >= threshold`.
    /// Returns results sorted by similarity (best first, ties by ascending id).
    fn search(
        &self,
        query: &[f64],
        k: usize,
        threshold: f64,
    ) -> Result<Vec<SearchResult>, VectorError>;

    /// Remove a vector by ID. Returns false if it was not present.
    fn remove(&mut self, id: &str) -> bool;

    /// Check if a vector ID exists
    fn contains(&self, id: &str) -> bool;

    /// Get index statistics
    fn stats(&self) -> IndexStats;

    /// Clear all vectors from the index
    fn clear(&mut self);
}
