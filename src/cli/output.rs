use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::*;

use crate::backend::config::BackendConfig;
use crate::common::format::{self, format_age, format_count};
use crate::purge::probe::RepositoryInfo;
use crate::purge::stats::PurgeStats;

/// Print the backend being swept and the cutoff in effect.
pub fn print_backend_info(config: &BackendConfig, cutoff: DateTime<Utc>) {
    println!();
    println!(
        "  {} Sweeping {}://{}/{}",
        "🧹",
        config.provider,
        config.bucket,
        config.normalized_prefix()
    );
    println!(
        "  {} Purging repositories with no snapshot since {}",
        "⏱",
        cutoff.format("%Y-%m-%d %H:%M UTC").to_string().cyan()
    );
    println!();
}

/// Render the stale-repository table: URL, last snapshot, age.
pub fn print_repository_table(
    config: &BackendConfig,
    repos: &[RepositoryInfo],
    now: DateTime<Utc>,
) {
    println!();
    println!("  {} Stale repositories", "📦");
    println!("{}", "─".repeat(96).dimmed());
    println!(
        "  {} {} {}",
        format!("{:<52}", "REPOSITORY").bold(),
        format!("{:<22}", "LAST SNAPSHOT").bold(),
        "AGE".bold()
    );
    for repo in repos {
        println!(
            "  {:<52} {:<22} {}",
            config.repository_url(&repo.path),
            repo.last_modified.format("%Y-%m-%d %H:%M UTC"),
            format_age(now - repo.last_modified).yellow()
        );
    }
    println!("{}", "─".repeat(96).dimmed());
    println!();
}

/// Print non-fatal probe problems.
pub fn print_probe_warnings(errors: &[String]) {
    println!(
        "  {} {}",
        "⚠".yellow(),
        format!("{} probe warnings:", errors.len()).yellow()
    );
    for error in errors {
        println!("    {} {}", "→".dimmed(), error.dimmed());
    }
    println!();
}

/// Count-only summary for dry runs.
pub fn print_dry_run_summary(count: usize) {
    println!(
        "  {} Dry run: {} would be purged. Nothing was deleted.",
        "ℹ️",
        format_count(count)
    );
}

/// Ask the operator to confirm the purge. Only "y" or "yes" in any case
/// proceeds; everything else, including empty input, aborts.
pub fn confirm_purge(count: usize) -> Result<bool> {
    print!(
        "\n  {} Permanently purge {} and their backend metadata? [y/N] ",
        "❓",
        format_count(count)
    );
    use std::io::Write;
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let answer = input.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Print the final stats report.
pub fn print_purge_report(stats: &PurgeStats) {
    println!();
    println!(
        "  {} Purge finished in {}",
        if stats.is_failure() {
            "⚠".yellow()
        } else {
            "✓".green()
        },
        format::format_duration(stats.duration().num_milliseconds() as f64 / 1000.0).cyan()
    );
    println!(
        "  found {}  •  deleted {}  •  skipped {}  •  failed {}",
        stats.total_found, stats.total_deleted, stats.total_skipped, stats.total_failed
    );

    if !stats.errors.is_empty() {
        println!();
        println!(
            "  {} {}",
            "⚠".yellow(),
            format!("{} problems:", stats.errors.len()).yellow()
        );
        for error in &stats.errors {
            println!("    {} {}", "→".dimmed(), error.dimmed());
        }
    }
    println!();
}

/// Print the final stats as JSON.
pub fn print_purge_json(stats: &PurgeStats) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(stats)?);
    Ok(())
}
