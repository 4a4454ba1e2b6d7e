//! Snapshot persistence hooks.
//!
//! The index never touches files or databases itself. Callers hand it a
//! [`SnapshotStore`]; the index awaits `load` during init and `save` when the
//! owning service asks it to persist.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::VectorError;
use crate::snapshot::Snapshot;

/// Caller-supplied save/load hooks for index snapshots.
///
/// Errors are returned to the index caller unchanged; retries belong to the
/// implementation or the integrating service.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist a snapshot, replacing any previous one.
    async fn save(&self, snapshot: &Snapshot) -> Result<(), VectorError>;

    /// Load the last saved snapshot, if any.
    async fn load(&self) -> Result<Option<Snapshot>, VectorError>;
}

/// In-memory snapshot store.
///
/// Useful for tests and for handing state from one index instance to another.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    slot: Mutex<Option<Snapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `snapshot`.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            slot: Mutex::new(Some(snapshot)),
        }
    }

    /// Copy of the currently held snapshot.
    pub async fn current(&self) -> Option<Snapshot> {
        self.slot.lock().await.clone()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<(), VectorError> {
        *self.slot.lock().await = Some(snapshot.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<Snapshot>, VectorError> {
        Ok(self.slot.lock().await.clone())
    }
}

/// On-disk snapshot format version
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// File wrapper around a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotEnvelope {
    format_version: u32,
    written_at: DateTime<Utc>,
    snapshot: Snapshot,
}

/// JSON file snapshot store.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<(), VectorError> {
        let envelope = SnapshotEnvelope {
            format_version: SNAPSHOT_FORMAT_VERSION,
            written_at: Utc::now(),
            snapshot: snapshot.clone(),
        };
        let bytes = serde_json::to_vec(&envelope)
            .map_err(|e| VectorError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        info!(path = ?self.path, vectors = snapshot.len(), "Saved index snapshot");
        Ok(())
    }

    async fn load(&self) -> Result<Option<Snapshot>, VectorError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "No snapshot file");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let envelope: SnapshotEnvelope = serde_json::from_slice(&bytes)
            .map_err(|e| VectorError::Serialization(e.to_string()))?;
        if envelope.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(VectorError::InvalidSnapshot(format!(
                "unsupported format version {}",
                envelope.format_version
            )));
        }

        info!(
            path = ?self.path,
            vectors = envelope.snapshot.len(),
            written_at = %envelope.written_at,
            "Loaded index snapshot"
        );
        Ok(Some(envelope.snapshot))
    }
}
