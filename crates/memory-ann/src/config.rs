//! Graph index configuration.
//!
//! Defaults are tuned for small knowledge bases:
//! - max_neighbors = 16 (links per node, M)
//! - search_width = 32 (candidate pool during search, ef)

use serde::{Deserialize, Serialize};

use crate::error::VectorError;

/// Proximity graph configuration, fixed when the index is initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Vector length (must match the embedding model)
    pub dimension: usize,

    /// Upper bound on links per node (M parameter)
    #[serde(default = "default_max_neighbors")]
    pub max_neighbors: usize,

    /// Candidate pool size during search (ef parameter)
    #[serde(default = "default_search_width")]
    pub search_width: usize,
}

fn default_max_neighbors() -> usize {
    16
}

fn default_search_width() -> usize {
    32
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            dimension: 384, // all-MiniLM-L6-v2
            max_neighbors: default_max_neighbors(),
            search_width: default_search_width(),
        }
    }
}

impl GraphConfig {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Default::default()
        }
    }

    pub fn with_max_neighbors(mut self, m: usize) -> Self {
        self.max_neighbors = m;
        self
    }

    pub fn with_search_width(mut self, ef: usize) -> Self {
        self.search_width = ef;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), VectorError> {
        if self.dimension == 0 {
            return Err(VectorError::InvalidConfig(
                "dimension must be > 0".to_string(),
            ));
        }
        if self.max_neighbors == 0 {
            return Err(VectorError::InvalidConfig(
                "max_neighbors must be > 0".to_string(),
            ));
        }
        if self.search_width == 0 {
            return Err(VectorError::InvalidConfig(
                "search_width must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
