//! Vector store.
//!
//! Holds `id -> vector` records at a fixed dimension. Every vector is
//! validated here, once, so the graph never sees a record of the wrong length.

use std::collections::BTreeMap;

use crate::error::VectorError;

/// Calculate cosine similarity between two vectors.
///
/// Returns 0.0 when either vector has zero magnitude or the lengths differ.
/// The result is not clamped.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Fixed-dimension record storage keyed by caller-chosen ids.
#[derive(Debug, Clone)]
pub struct VectorStore {
    dimension: usize,
    records: BTreeMap<String, Vec<f64>>,
}

impl VectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            records: BTreeMap::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Validate a record before it is stored. The length must match and
    /// every component must be finite, since JSON has no NaN or infinity.
    pub fn check(&self, vector: &[f64]) -> Result<(), VectorError> {
        VectorError::check_vector(self.dimension, vector)
    }

    /// Insert or overwrite the record for `id`.
    pub fn put(&mut self, id: impl Into<String>, vector: Vec<f64>) -> Result<(), VectorError> {
        self.check(&vector)?;
        self.records.insert(id.into(), vector);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&[f64]> {
        self.records.get(id).map(Vec::as_slice)
    }

    /// Remove a record. Returns true if it existed.
    pub fn delete(&mut self, id: &str) -> bool {
        self.records.remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Smallest stored id.
    pub fn first_id(&self) -> Option<&str> {
        self.records.keys().next().map(String::as_str)
    }

    /// Records in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.records
            .iter()
            .map(|(id, vector)| (id.as_str(), vector.as_slice()))
    }

    /// Cosine similarity between two stored records, 0.0 if either is missing.
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        match (self.get(a), self.get(b)) {
            (Some(va), Some(vb)) => cosine_similarity(va, vb),
            _ => 0.0,
        }
    }

    /// Cosine similarity between `query` and a stored record.
    pub fn similarity_to(&self, query: &[f64], id: &str) -> Option<f64> {
        self.get(id).map(|v| cosine_similarity(query, v))
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
