use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Snapshot-phase outcome for one repository, as reported by the batched
/// purge script's marker line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOutcome {
    /// Validation found zero remaining snapshots.
    Purged,
    /// The final forget ran but snapshots remained at validation.
    Partial,
    /// The repository was already empty; nothing to forget.
    Empty,
    /// The initial collapse (keep-last-1 prune) failed.
    CollapseFailed,
    /// The final forget of the remaining snapshot failed.
    ForgetFailed,
    /// The script produced no marker for this repository.
    Unreported,
}

/// Durable record of a purge run, written after the snapshot phase and
/// before any metadata is touched.
///
/// The two destructive phases have no compensating transaction, so an
/// interrupted run leaves this file behind as evidence of which
/// repositories already lost their snapshots and which still have
/// metadata on the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeCheckpoint {
    pub run_id: String,
    pub bucket: String,
    pub prefix: String,
    pub started_at: DateTime<Utc>,
    pub repositories: Vec<RepositoryState>,
}

/// Per-repository progress through the two phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryState {
    pub path: String,
    pub snapshot_phase: SnapshotOutcome,
    pub metadata_deleted: bool,
}

impl PurgeCheckpoint {
    pub fn new(bucket: &str, prefix: &str) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            started_at: Utc::now(),
            repositories: Vec::new(),
        }
    }

    pub fn record(&mut self, path: &str, outcome: SnapshotOutcome) {
        self.repositories.push(RepositoryState {
            path: path.to_string(),
            snapshot_phase: outcome,
            metadata_deleted: false,
        });
    }

    pub fn mark_metadata_deleted(&mut self, path: &str) {
        if let Some(repo) = self.repositories.iter_mut().find(|r| r.path == path) {
            repo.metadata_deleted = true;
        }
    }

    /// Repositories whose metadata subtree may still exist on the backend.
    pub fn pending_metadata(&self) -> impl Iterator<Item = &RepositoryState> {
        self.repositories.iter().filter(|r| !r.metadata_deleted)
    }

    /// Default checkpoint location, `~/.reposweep/state/checkpoint.json`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".reposweep")
            .join("state")
            .join("checkpoint.json")
    }

    /// Save the checkpoint as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create state dir: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize checkpoint")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write checkpoint: {}", path.display()))?;
        Ok(())
    }

    /// Load a checkpoint left by a previous run, if any.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read checkpoint: {}", path.display()))?;
        let checkpoint = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse checkpoint: {}", path.display()))?;
        Ok(Some(checkpoint))
    }

    /// Remove the checkpoint after a fully successful metadata phase.
    pub fn clear(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove checkpoint: {}", path.display()))?;
        }
        Ok(())
    }
}
