//! Age probing of candidate repositories through the sandboxed tool.
//!
//! The only way to learn a repository's latest snapshot time is to run
//! the snapshot tool against that repository's connection URL. Rather
//! than paying one sandbox launch per candidate, the probe generates a
//! single POSIX script with one query statement per candidate, runs it
//! once, and parses the combined output.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::backend::config::BackendConfig;
use crate::common::errors::{PurgeError, PurgeResult};
use crate::sandbox::{shell_quote, ScriptExecutor, Workspace};

/// Marker a probe statement prints when its repository cannot be opened.
pub const ACCESS_FAILURE_MARKER: &str = "Failed to access repository";

/// A candidate selected for purging: its latest snapshot precedes the
/// cutoff. Immutable once created.
#[derive(Debug, Clone)]
pub struct RepositoryInfo {
    /// Directory name under the backend root.
    pub path: String,
    /// Timestamp of the repository's most recent snapshot.
    pub last_modified: DateTime<Utc>,
    /// Stored bytes, when known. The probe cannot see sizes without a
    /// recursive listing, so this stays zero for probed candidates.
    pub size: u64,
}

/// Outcome of one probe pass.
#[derive(Debug)]
pub struct ProbeReport {
    /// Selected repositories, in candidate order.
    pub stale: Vec<RepositoryInfo>,
    /// Non-fatal per-candidate parse problems.
    pub errors: Vec<String>,
}

/// One entry of the snapshot tool's `snapshots --json` array. Only the
/// field the probe needs.
#[derive(Debug, Deserialize)]
struct SnapshotRecord {
    time: DateTime<Utc>,
}

pub struct AgeProbe<'a> {
    config: &'a BackendConfig,
    executor: &'a dyn ScriptExecutor,
    cutoff: DateTime<Utc>,
}

impl<'a> AgeProbe<'a> {
    pub fn new(
        config: &'a BackendConfig,
        executor: &'a dyn ScriptExecutor,
        cutoff: DateTime<Utc>,
    ) -> Self {
        Self {
            config,
            executor,
            cutoff,
        }
    }

    /// Probe every candidate with one batched script run and keep those
    /// whose latest snapshot is strictly before the cutoff.
    ///
    /// A script that fails to launch or exits non-zero as a whole is
    /// fatal; per-candidate problems are collected in the report.
    pub fn run(
        &self,
        workspace: &Workspace,
        env_file: &Path,
        candidates: &[String],
    ) -> PurgeResult<ProbeReport> {
        let script = build_probe_script(self.config, candidates);
        let script_path = workspace.write_script("probe.sh", &script)?;

        debug!(candidates = candidates.len(), "running batched age probe");
        let output = self.executor.run(&script_path, env_file)?;
        if !output.success() {
            return Err(PurgeError::ScriptExecution(format!(
                "probe script exited with status {}: {}",
                output.code,
                output.stderr.trim()
            )));
        }

        Ok(self.parse(candidates, &output.stdout))
    }

    /// Match output records back to candidates.
    ///
    /// Every record carries its own directory name, so attribution never
    /// depends on line positions. Lines that are not records (tool
    /// noise, blanks) are ignored; a candidate with no record at all is
    /// recorded as a parse problem and excluded.
    fn parse(&self, candidates: &[String], output: &str) -> ProbeReport {
        let index: HashMap<&str, usize> = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut latest: Vec<Option<DateTime<Utc>>> = vec![None; candidates.len()];
        let mut seen = vec![false; candidates.len()];
        let mut errors = Vec::new();

        for line in output.lines() {
            let Some((path, payload)) = line.split_once('\t') else {
                continue;
            };
            let Some(&slot) = index.get(path) else {
                continue;
            };

            if payload == ACCESS_FAILURE_MARKER {
                debug!(path, "repository not accessible, excluding candidate");
                seen[slot] = true;
                continue;
            }
            if !payload.starts_with('[') {
                continue;
            }

            seen[slot] = true;
            match serde_json::from_str::<Vec<SnapshotRecord>>(payload) {
                Ok(records) => {
                    if let Some(newest) = records.first() {
                        latest[slot] = Some(newest.time);
                    }
                }
                Err(e) => {
                    errors.push(
                        PurgeError::Parse {
                            path: path.to_string(),
                            reason: e.to_string(),
                        }
                        .to_string(),
                    );
                }
            }
        }

        let mut stale = Vec::new();
        for (slot, candidate) in candidates.iter().enumerate() {
            if !seen[slot] {
                errors.push(
                    PurgeError::Parse {
                        path: candidate.clone(),
                        reason: "no probe record in script output".to_string(),
                    }
                    .to_string(),
                );
                continue;
            }
            if let Some(time) = latest[slot] {
                if time < self.cutoff {
                    stale.push(RepositoryInfo {
                        path: candidate.clone(),
                        last_modified: time,
                        size: 0,
                    });
                }
            }
        }

        ProbeReport { stale, errors }
    }
}

/// One query statement per candidate, each printing exactly one
/// `<directory>\t<payload>` record so the output identifies its source
/// repository regardless of how the tool's own noise interleaves.
fn build_probe_script(config: &BackendConfig, candidates: &[String]) -> String {
    let mut script = String::from("#!/bin/sh\n# generated batch probe, one statement per repository\n");
    for dir in candidates {
        let url = shell_quote(&config.repository_url(dir));
        let name = shell_quote(dir);
        script.push_str(&format!(
            "export RESTIC_REPOSITORY={url}\n\
             if snaps=$(restic snapshots --json --latest 1 --no-lock 2>/dev/null); then\n\
             \tprintf '%s\\t%s\\n' {name} \"$snaps\"\n\
             else\n\
             \tprintf '%s\\t{ACCESS_FAILURE_MARKER}\\n' {name}\n\
             fi\n"
        ));
    }
    script
}
