use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::service::PlatformSnapshot;

/// Bumped whenever the on-disk layout changes incompatibly.
pub const SNAPSHOT_FORMAT_VERSION: &str = "1";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub snapshot_id: String,
    pub saved_at: DateTime<Utc>,
    pub hostname: String,
    pub pid: u32,
}

impl SnapshotMetadata {
    fn capture() -> Self {
        Self {
            snapshot_id: Uuid::new_v4().to_string(),
            saved_at: Utc::now(),
            hostname: hostname::get()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
            pid: std::process::id(),
        }
    }
}

/// Snapshot as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: String,
    pub metadata: SnapshotMetadata,
    pub state: PlatformSnapshot,
}

#[async_trait]
pub trait StatePersistence: Send + Sync {
    /// Write the snapshot, replacing any previous one.
    async fn save(&self, snapshot: &PlatformSnapshot) -> Result<SnapshotMetadata, PersistenceError>;

    /// Read the last saved snapshot; `None` when nothing was saved yet.
    async fn load(&self) -> Result<Option<PersistedState>, PersistenceError>;
}

/// Single JSON file, written through a temporary file and renamed into place.
pub struct FileSystemPersistence {
    path: PathBuf,
}

impl FileSystemPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StatePersistence for FileSystemPersistence {
    async fn save(
        &self,
        snapshot: &PlatformSnapshot,
    ) -> Result<SnapshotMetadata, PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let persisted = PersistedState {
            version: SNAPSHOT_FORMAT_VERSION.to_string(),
            metadata: SnapshotMetadata::capture(),
            state: snapshot.clone(),
        };
        let serialized = serde_json::to_string_pretty(&persisted)?;

        let temp_file = self.temp_path();
        fs::write(&temp_file, serialized).await?;
        fs::rename(&temp_file, &self.path).await?;

        info!(
            snapshot_id = %persisted.metadata.snapshot_id,
            file = ?self.path,
            requests = persisted.state.workflow.requests.len(),
            "State saved successfully"
        );
        Ok(persisted.metadata)
    }

    async fn load(&self) -> Result<Option<PersistedState>, PersistenceError> {
        if !fs::try_exists(&self.path).await? {
            debug!(file = ?self.path, "No existing state file found");
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path).await?;
        let raw: serde_json::Value = serde_json::from_str(&contents)?;

        let found = raw
            .get("version")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("missing");
        if found != SNAPSHOT_FORMAT_VERSION {
            return Err(PersistenceError::VersionMismatch {
                expected: SNAPSHOT_FORMAT_VERSION.to_string(),
                found: found.to_string(),
            });
        }

        let persisted: PersistedState = serde_json::from_value(raw)?;
        info!(
            snapshot_id = %persisted.metadata.snapshot_id,
            saved_at = %persisted.metadata.saved_at,
            "State loaded successfully"
        );
        Ok(Some(persisted))
    }
}
