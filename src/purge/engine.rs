//! Two-phase destructive purge of the selected repositories.
//!
//! Phase one forgets and prunes snapshots inside the sandbox, one
//! batched script with per-repository continue-on-error. Phase two
//! deletes each repository's metadata subtree through the storage
//! backend, outside the sandbox, one call per repository. There is no
//! compensating transaction between the phases; the checkpoint written
//! between them is the durable record of what already happened.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::backend::config::BackendConfig;
use crate::backend::store::ObjectStore;
use crate::common::errors::{PurgeError, PurgeResult};
use crate::purge::checkpoint::{PurgeCheckpoint, SnapshotOutcome};
use crate::purge::probe::RepositoryInfo;
use crate::purge::stats::PurgeStats;
use crate::sandbox::{shell_quote, ScriptExecutor, Workspace};

/// First field of every status line the purge script prints.
const PURGE_MARKER: &str = "purge";

pub struct PurgeExecutor<'a> {
    config: &'a BackendConfig,
    store: &'a dyn ObjectStore,
    executor: &'a dyn ScriptExecutor,
    checkpoint_path: PathBuf,
}

impl<'a> PurgeExecutor<'a> {
    pub fn new(
        config: &'a BackendConfig,
        store: &'a dyn ObjectStore,
        executor: &'a dyn ScriptExecutor,
    ) -> Self {
        Self {
            config,
            store,
            executor,
            checkpoint_path: PurgeCheckpoint::default_path(),
        }
    }

    pub fn with_checkpoint_path(mut self, path: PathBuf) -> Self {
        self.checkpoint_path = path;
        self
    }

    /// Run both destructive phases over the selected repositories and
    /// return the aggregated stats.
    ///
    /// A purge script that fails to launch or exits non-zero as a whole
    /// is fatal and nothing further runs. Per-repository failures in
    /// either phase are recorded and the remaining repositories are
    /// still processed; any recorded failure marks the run as failed.
    pub fn execute(
        &self,
        workspace: &Workspace,
        env_file: &Path,
        repos: &[RepositoryInfo],
    ) -> PurgeResult<PurgeStats> {
        let mut stats = PurgeStats::new(repos.len());

        let script = build_purge_script(self.config, repos);
        let script_path = workspace.write_script("purge.sh", &script)?;

        debug!(repositories = repos.len(), "running batched snapshot purge");
        let output = self.executor.run(&script_path, env_file)?;
        if !output.success() {
            return Err(PurgeError::ScriptExecution(format!(
                "purge script exited with status {}: {}",
                output.code,
                output.stderr.trim()
            )));
        }

        let outcomes = parse_purge_markers(repos, &output.stdout);

        let mut checkpoint = PurgeCheckpoint::new(&self.config.bucket, &self.config.prefix);
        for (repo, outcome) in repos.iter().zip(&outcomes) {
            checkpoint.record(&repo.path, *outcome);
            match outcome {
                SnapshotOutcome::Purged => stats.record_deleted(),
                SnapshotOutcome::Partial => {
                    stats.record_deleted();
                    stats.record_warning(format!(
                        "'{}': snapshots remained after the final forget",
                        repo.path
                    ));
                }
                SnapshotOutcome::Empty => stats.record_skipped(),
                SnapshotOutcome::CollapseFailed => {
                    stats.record_failed(format!("'{}': snapshot collapse failed", repo.path))
                }
                SnapshotOutcome::ForgetFailed => {
                    stats.record_failed(format!("'{}': final forget failed", repo.path))
                }
                SnapshotOutcome::Unreported => stats.record_failed(format!(
                    "'{}': no status marker in purge output",
                    repo.path
                )),
            }
        }

        // Phase one is committed; persist the record before any metadata
        // is touched.
        if let Err(e) = checkpoint.save(&self.checkpoint_path) {
            warn!("could not persist purge checkpoint: {:#}", e);
        }

        let mut metadata_ok = true;
        for repo in repos {
            debug!(path = %repo.path, "deleting repository metadata");
            match self.store.delete(&repo.path, true) {
                Ok(()) => {
                    checkpoint.mark_metadata_deleted(&repo.path);
                    if let Err(e) = checkpoint.save(&self.checkpoint_path) {
                        warn!("could not update purge checkpoint: {:#}", e);
                    }
                }
                Err(e) => {
                    metadata_ok = false;
                    stats.record_failed(e.to_string());
                }
            }
        }

        if metadata_ok {
            if let Err(e) = PurgeCheckpoint::clear(&self.checkpoint_path) {
                warn!("could not remove purge checkpoint: {:#}", e);
            }
        }

        stats.finish();
        Ok(stats)
    }
}

/// One block per repository: collapse to the latest snapshot, forget it,
/// then validate that the repository is empty. Every outcome prints a
/// single `purge\t<directory>\t<status>` marker; a failure in one block
/// never stops the next.
fn build_purge_script(config: &BackendConfig, repos: &[RepositoryInfo]) -> String {
    let mut script =
        String::from("#!/bin/sh\n# generated batch purge, one block per repository\n");
    for repo in repos {
        let url = shell_quote(&config.repository_url(&repo.path));
        let name = shell_quote(&repo.path);
        script.push_str(&format!(
            "export RESTIC_REPOSITORY={url}\n\
             if ! restic forget --keep-last 1 --prune >/dev/null 2>&1; then\n\
             \tprintf 'purge\\t%s\\tcollapse-failed\\n' {name}\n\
             else\n\
             \tsnaps=$(restic snapshots --json --latest 1 2>/dev/null)\n\
             \tlast=$(printf '%s' \"$snaps\" | sed -n 's/.*\"short_id\":\"\\([^\"]*\\)\".*/\\1/p' | head -n 1)\n\
             \tif [ -z \"$last\" ]; then\n\
             \t\tprintf 'purge\\t%s\\tempty\\n' {name}\n\
             \telif ! restic forget \"$last\" --prune >/dev/null 2>&1; then\n\
             \t\tprintf 'purge\\t%s\\tforget-failed\\n' {name}\n\
             \telif [ -z \"$(restic snapshots --json 2>/dev/null | grep -o 'short_id')\" ]; then\n\
             \t\tprintf 'purge\\t%s\\tpurged\\n' {name}\n\
             \telse\n\
             \t\tprintf 'purge\\t%s\\tpartial\\n' {name}\n\
             \tfi\n\
             fi\n"
        ));
    }
    script
}

/// Map marker lines back to repositories; repositories without a marker
/// come back as `Unreported`.
fn parse_purge_markers(repos: &[RepositoryInfo], output: &str) -> Vec<SnapshotOutcome> {
    let index: HashMap<&str, usize> = repos
        .iter()
        .enumerate()
        .map(|(i, r)| (r.path.as_str(), i))
        .collect();
    let mut outcomes = vec![SnapshotOutcome::Unreported; repos.len()];

    for line in output.lines() {
        let mut parts = line.splitn(3, '\t');
        if parts.next() != Some(PURGE_MARKER) {
            continue;
        }
        let (Some(path), Some(status)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Some(&slot) = index.get(path) else {
            continue;
        };
        outcomes[slot] = match status {
            "purged" => SnapshotOutcome::Purged,
            "partial" => SnapshotOutcome::Partial,
            "empty" => SnapshotOutcome::Empty,
            "collapse-failed" => SnapshotOutcome::CollapseFailed,
            "forget-failed" => SnapshotOutcome::ForgetFailed,
            _ => SnapshotOutcome::Unreported,
        };
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::config::Provider;
    use crate::sandbox::ScriptOutput;
    use chrono::{TimeZone, Utc};
    use std::cell::RefCell;
    use tempfile::TempDir;

    fn test_config() -> BackendConfig {
        BackendConfig {
            provider: Provider::S3,
            bucket: "backups".to_string(),
            prefix: "team-a".to_string(),
            credential_secret: "default/s3-creds".to_string(),
            endpoint: None,
            region: None,
            insecure: false,
        }
    }

    fn repo(path: &str) -> RepositoryInfo {
        RepositoryInfo {
            path: path.to_string(),
            last_modified: Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
            size: 0,
        }
    }

    struct FakeExecutor {
        stdout: String,
        code: i32,
    }

    impl ScriptExecutor for FakeExecutor {
        fn run(&self, _script: &Path, _env_file: &Path) -> PurgeResult<ScriptOutput> {
            Ok(ScriptOutput {
                stdout: self.stdout.clone(),
                stderr: String::new(),
                code: self.code,
            })
        }
    }

    /// Store that records deletions and can be told to fail some paths.
    struct MemoryStore {
        fail: Vec<String>,
        deleted: RefCell<Vec<String>>,
    }

    impl MemoryStore {
        fn new() -> Self {
            Self {
                fail: Vec::new(),
                deleted: RefCell::new(Vec::new()),
            }
        }

        fn failing(paths: &[&str]) -> Self {
            Self {
                fail: paths.iter().map(|p| p.to_string()).collect(),
                deleted: RefCell::new(Vec::new()),
            }
        }
    }

    impl ObjectStore for MemoryStore {
        fn list_dir(&self, _path: &str, _depth: u32) -> PurgeResult<Vec<String>> {
            Ok(Vec::new())
        }

        fn delete(&self, path: &str, recursive: bool) -> PurgeResult<()> {
            assert!(recursive, "metadata deletion is always recursive");
            if self.fail.iter().any(|p| p == path) {
                return Err(PurgeError::Deletion {
                    path: path.to_string(),
                    reason: "access denied".to_string(),
                });
            }
            self.deleted.borrow_mut().push(path.to_string());
            Ok(())
        }
    }

    fn run_engine(
        store: &MemoryStore,
        executor: &FakeExecutor,
        repos: &[RepositoryInfo],
    ) -> (PurgeStats, PathBuf, TempDir) {
        let config = test_config();
        let workspace = Workspace::create().unwrap();
        let env_file = workspace.write_script("repo.env", "").unwrap();
        let state = TempDir::new().unwrap();
        let checkpoint_path = state.path().join("checkpoint.json");

        let stats = PurgeExecutor::new(&config, store, executor)
            .with_checkpoint_path(checkpoint_path.clone())
            .execute(&workspace, &env_file, repos)
            .unwrap();
        (stats, checkpoint_path, state)
    }

    #[test]
    fn test_all_purged() {
        let store = MemoryStore::new();
        let executor = FakeExecutor {
            stdout: "purge\trepo-a\tpurged\npurge\trepo-b\tpurged\n".to_string(),
            code: 0,
        };
        let (stats, checkpoint_path, _state) =
            run_engine(&store, &executor, &[repo("repo-a"), repo("repo-b")]);

        assert_eq!(stats.total_found, 2);
        assert_eq!(stats.total_deleted, 2);
        assert_eq!(stats.total_failed, 0);
        assert_eq!(stats.total_skipped, 0);
        assert!(!stats.is_failure());
        assert_eq!(*store.deleted.borrow(), vec!["repo-a", "repo-b"]);
        // Full success clears the checkpoint.
        assert!(!checkpoint_path.exists());
    }

    #[test]
    fn test_empty_repository_is_skipped() {
        let store = MemoryStore::new();
        let executor = FakeExecutor {
            stdout: "purge\trepo-a\tempty\n".to_string(),
            code: 0,
        };
        let (stats, _, _state) = run_engine(&store, &executor, &[repo("repo-a")]);

        assert_eq!(stats.total_skipped, 1);
        assert_eq!(stats.total_deleted, 0);
        assert!(!stats.is_failure());
        // Metadata still goes away for an already-empty repository.
        assert_eq!(*store.deleted.borrow(), vec!["repo-a"]);
    }

    #[test]
    fn test_collapse_failure_continues_with_next_repository() {
        let store = MemoryStore::new();
        let executor = FakeExecutor {
            stdout: "purge\trepo-a\tcollapse-failed\npurge\trepo-b\tpurged\n".to_string(),
            code: 0,
        };
        let (stats, _, _state) =
            run_engine(&store, &executor, &[repo("repo-a"), repo("repo-b")]);

        assert_eq!(stats.total_failed, 1);
        assert_eq!(stats.total_deleted, 1);
        assert!(stats.is_failure());
        assert!(stats.errors[0].contains("repo-a"));
        // The snapshot phase was attempted for both, so both get the
        // metadata phase.
        assert_eq!(*store.deleted.borrow(), vec!["repo-a", "repo-b"]);
    }

    #[test]
    fn test_partial_validation_is_a_warning() {
        let store = MemoryStore::new();
        let executor = FakeExecutor {
            stdout: "purge\trepo-a\tpartial\n".to_string(),
            code: 0,
        };
        let (stats, _, _state) = run_engine(&store, &executor, &[repo("repo-a")]);

        assert_eq!(stats.total_deleted, 1);
        assert!(!stats.is_failure());
        assert_eq!(stats.errors.len(), 1);
        assert!(stats.errors[0].contains("remained"));
    }

    #[test]
    fn test_missing_marker_counts_as_failure() {
        let store = MemoryStore::new();
        let executor = FakeExecutor {
            stdout: "purge\trepo-a\tpurged\n".to_string(),
            code: 0,
        };
        let (stats, _, _state) =
            run_engine(&store, &executor, &[repo("repo-a"), repo("repo-b")]);

        assert_eq!(stats.total_failed, 1);
        assert!(stats.errors[0].contains("repo-b"));
    }

    #[test]
    fn test_asymmetric_metadata_failure() {
        let store = MemoryStore::failing(&["repo-a"]);
        let executor = FakeExecutor {
            stdout: "purge\trepo-a\tpurged\npurge\trepo-b\tpurged\n".to_string(),
            code: 0,
        };
        let (stats, checkpoint_path, _state) =
            run_engine(&store, &executor, &[repo("repo-a"), repo("repo-b")]);

        // Snapshot-phase accounting is untouched by the metadata failure.
        assert_eq!(stats.total_deleted, 2);
        assert!(stats.total_failed >= 1);
        assert!(stats.is_failure());
        assert_eq!(*store.deleted.borrow(), vec!["repo-b"]);

        // The checkpoint survives and names the repository that still
        // has metadata on the backend.
        let checkpoint = PurgeCheckpoint::load(&checkpoint_path).unwrap().unwrap();
        let pending: Vec<_> = checkpoint.pending_metadata().map(|r| r.path.clone()).collect();
        assert_eq!(pending, vec!["repo-a"]);
    }

    #[test]
    fn test_whole_script_failure_is_fatal() {
        let store = MemoryStore::new();
        let executor = FakeExecutor {
            stdout: String::new(),
            code: 126,
        };
        let config = test_config();
        let workspace = Workspace::create().unwrap();
        let env_file = workspace.write_script("repo.env", "").unwrap();
        let state = TempDir::new().unwrap();

        let err = PurgeExecutor::new(&config, &store, &executor)
            .with_checkpoint_path(state.path().join("checkpoint.json"))
            .execute(&workspace, &env_file, &[repo("repo-a")])
            .unwrap_err();

        assert!(matches!(err, PurgeError::ScriptExecution(_)));
        // Nothing was deleted.
        assert!(store.deleted.borrow().is_empty());
    }

    #[test]
    fn test_script_shape() {
        let config = test_config();
        let script = build_purge_script(&config, &[repo("repo-a"), repo("repo-b")]);

        assert_eq!(script.matches("--keep-last 1 --prune").count(), 2);
        assert_eq!(script.matches("collapse-failed").count(), 2);
        assert!(script.contains("'s3:s3.amazonaws.com/backups/team-a/repo-a'"));
        assert!(script.contains("'s3:s3.amazonaws.com/backups/team-a/repo-b'"));
    }

    #[test]
    fn test_marker_parsing_ignores_noise() {
        let repos = [repo("repo-a"), repo("repo-b")];
        let output = "repository opened\n\
                      purge\trepo-b\tempty\n\
                      purge\tstranger\tpurged\n\
                      purge\trepo-a\tpurged\n";
        let outcomes = parse_purge_markers(&repos, output);
        assert_eq!(outcomes, vec![SnapshotOutcome::Purged, SnapshotOutcome::Empty]);
    }
}
