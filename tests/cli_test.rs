use assert_cmd::Command;
use predicates::prelude::*;

fn reposweep() -> Command {
    Command::cargo_bin("reposweep").unwrap()
}

// ─── Help & version ──────────────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    reposweep()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("purge-repos"))
        .stdout(predicate::str::contains("completions"))
        .stdout(predicate::str::contains("object storage"));
}

#[test]
fn test_purge_repos_help() {
    reposweep()
        .args(["purge-repos", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--backend-config"))
        .stdout(predicate::str::contains("--older-than"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_version_flag() {
    reposweep()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("reposweep"));
}

// ─── Pre-flight validation ───────────────────────────────────────────────────

#[test]
fn test_backend_config_is_mandatory() {
    reposweep()
        .args(["purge-repos", "--older-than", "6mo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--backend-config"));
}

#[test]
fn test_older_than_is_mandatory() {
    reposweep()
        .args(["purge-repos", "--backend-config", "/tmp/backend.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--older-than"));
}

#[test]
fn test_invalid_duration_is_rejected_before_anything_else() {
    // The config path does not even exist; the duration check runs first.
    reposweep()
        .args([
            "purge-repos",
            "--backend-config",
            "/nonexistent/backend.yaml",
            "--older-than",
            "soon",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid duration expression"));
}

#[test]
fn test_missing_backend_config_file_is_rejected() {
    reposweep()
        .args([
            "purge-repos",
            "--backend-config",
            "/nonexistent/backend.yaml",
            "--older-than",
            "6mo",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("backend config error"));
}

#[test]
fn test_missing_secret_is_rejected_before_any_listing() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("backend.yaml");
    std::fs::write(
        &config,
        "provider: s3\nbucket: backups\ncredential_secret: default/missing\n",
    )
    .unwrap();

    reposweep()
        .args([
            "purge-repos",
            "--backend-config",
            config.to_str().unwrap(),
            "--older-than",
            "6mo",
            "--secrets-dir",
            dir.path().to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("credential error"));
}

// ─── Completions ─────────────────────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    reposweep()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reposweep"));
}

// ─── Invalid invocations ─────────────────────────────────────────────────────

#[test]
fn test_no_subcommand_shows_usage() {
    reposweep()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}
