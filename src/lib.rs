//! # Reposweep
//!
//! An operator-facing cleanup tool for stale backup repositories in
//! object storage.
//!
//! Reposweep discovers self-contained snapshot repositories under a
//! bucket prefix, probes each one's most recent snapshot by running the
//! snapshot tool inside a sandboxed container, and permanently purges
//! repositories whose newest snapshot is older than a configured cutoff.
//!
//! - **Batched probing**: one generated script per run, not one sandbox
//!   launch per repository
//! - **Two-phase deletion**: snapshots are forgotten and pruned inside
//!   the sandbox first, then each repository's backend metadata subtree
//!   is removed, with a persisted checkpoint between the phases
//! - **Safety-first**: dry-run mode and interactive confirmation before
//!   anything destructive runs
//! - **Injected collaborators**: storage, secrets, and the sandbox are
//!   traits, so the engine is testable without a container runtime

pub mod backend;
pub mod cli;
pub mod common;
pub mod purge;
pub mod sandbox;
pub mod secrets;
