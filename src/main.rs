use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use reposweep::backend::{self, BackendConfig, RemoteStore};
use reposweep::cli::args::{Cli, Commands, CompletionShell, OutputFormat};
use reposweep::cli::output;
use reposweep::common::format::format_count;
use reposweep::purge::{duration, AgeProbe, PurgeCheckpoint, PurgeExecutor};
use reposweep::sandbox::{ContainerExecutor, Workspace};
use reposweep::secrets::{FileSecretResolver, SecretRef, SecretResolver};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("reposweep=debug")
            .init();
    }

    match cli.command {
        Commands::PurgeRepos {
            ref backend_config,
            ref older_than,
            dry_run,
            yes,
            ref tool_image,
            ref secrets_dir,
        } => cmd_purge_repos(
            &cli,
            backend_config,
            older_than,
            dry_run,
            yes,
            tool_image,
            secrets_dir.clone(),
        ),

        Commands::Completions { shell } => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            let shell = match shell {
                CompletionShell::Bash => clap_complete::Shell::Bash,
                CompletionShell::Zsh => clap_complete::Shell::Zsh,
                CompletionShell::Fish => clap_complete::Shell::Fish,
            };
            clap_complete::generate(shell, &mut cmd, "reposweep", &mut std::io::stdout());
            Ok(())
        }
    }
}

// ─── Purge ────────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn cmd_purge_repos(
    cli: &Cli,
    config_path: &Path,
    older_than: &str,
    dry_run: bool,
    yes: bool,
    tool_image: &str,
    secrets_dir: Option<PathBuf>,
) -> Result<()> {
    // The cutoff is a pure computation; validate it before anything else
    // and never recompute it mid-run.
    let now = Utc::now();
    let cutoff = duration::cutoff_before(older_than, now)?;

    let config = BackendConfig::load(config_path)?;
    let secret: SecretRef = config.credential_secret.parse()?;
    let resolver =
        FileSecretResolver::new(secrets_dir.unwrap_or_else(FileSecretResolver::default_root));
    let creds = resolver.resolve(&secret)?;

    if !ContainerExecutor::is_available() {
        anyhow::bail!("container runtime not available; the snapshot tool needs docker");
    }

    // Surface leftovers from an interrupted run before starting a new one.
    let checkpoint_path = PurgeCheckpoint::default_path();
    if let Some(previous) = PurgeCheckpoint::load(&checkpoint_path)? {
        let pending = previous.pending_metadata().count();
        if pending > 0 && !cli.quiet {
            println!(
                "  {} A previous purge (run {}) left {} with undeleted metadata; they will be rediscovered if still present.",
                "⚠".yellow(),
                previous.run_id,
                format_count(pending)
            );
        }
    }

    if !cli.quiet {
        output::print_backend_info(&config, cutoff);
    }

    let store = RemoteStore::connect(&config, &creds)?;
    let candidates = backend::list_candidates(&store)?;
    if candidates.is_empty() {
        println!("  {} No repositories found under the backend prefix.", "✨");
        return Ok(());
    }

    let workspace = Workspace::create()?;
    let env_file = workspace.write_env_file(&creds)?;
    let executor = ContainerExecutor::new(tool_image);

    let show_progress = !cli.quiet && matches!(cli.format, OutputFormat::Human);

    let probe_spinner = spinner(show_progress, "Probing repository ages...");
    let probe = AgeProbe::new(&config, &executor, cutoff);
    let report = probe.run(&workspace, &env_file, &candidates)?;
    if let Some(pb) = probe_spinner {
        pb.finish_and_clear();
    }

    if !report.errors.is_empty() && !cli.quiet {
        output::print_probe_warnings(&report.errors);
    }

    if report.stale.is_empty() {
        println!("  {} No repositories older than {}.", "✨", older_than);
        if !report.errors.is_empty() {
            anyhow::bail!(
                "probe recorded {} problems, see above",
                report.errors.len()
            );
        }
        return Ok(());
    }

    if matches!(cli.format, OutputFormat::Human) {
        output::print_repository_table(&config, &report.stale, now);
    }

    if dry_run {
        output::print_dry_run_summary(report.stale.len());
        if !report.errors.is_empty() {
            anyhow::bail!(
                "probe recorded {} problems, see above",
                report.errors.len()
            );
        }
        return Ok(());
    }

    // Aborting here is a confirmed no-op: no state change, exit 0.
    if !yes && !output::confirm_purge(report.stale.len())? {
        println!("  {} Cancelled", "✗".red());
        return Ok(());
    }

    let purge_spinner = spinner(show_progress, "Purging snapshots and metadata...");
    let engine = PurgeExecutor::new(&config, &store, &executor);
    let mut stats = engine.execute(&workspace, &env_file, &report.stale)?;
    if let Some(pb) = purge_spinner {
        pb.finish_and_clear();
    }

    // The stats record is the single source of truth for the run, so the
    // probe's non-fatal problems belong in it too.
    for error in &report.errors {
        stats.record_warning(error.clone());
    }

    match cli.format {
        OutputFormat::Human => output::print_purge_report(&stats),
        OutputFormat::Json => output::print_purge_json(&stats)?,
    }

    if stats.is_failure() || !report.errors.is_empty() {
        anyhow::bail!(
            "purge completed with {} failed and {} probe problems, see the report above",
            stats.total_failed,
            report.errors.len()
        );
    }
    Ok(())
}

fn spinner(show: bool, message: &str) -> Option<ProgressBar> {
    if !show {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(pb)
}
