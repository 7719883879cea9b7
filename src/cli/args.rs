use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Reposweep, a purge tool for stale backup repositories
#[derive(Parser, Debug)]
#[command(
    name = "reposweep",
    version,
    about = "Purge stale backup repositories from object storage",
    long_about = "Reposweep discovers backup repositories under an object-storage\n\
                  prefix, probes each one's latest snapshot through a sandboxed\n\
                  snapshot-tool container, and permanently purges repositories\n\
                  whose newest snapshot is older than a cutoff.",
    after_help = "EXAMPLES:\n  \
        reposweep purge-repos --backend-config s3.yaml --older-than 6mo --dry-run\n  \
        reposweep purge-repos --backend-config s3.yaml --older-than 1y6mo\n  \
        reposweep purge-repos --backend-config gcs.json --older-than 90d --yes\n  \
        reposweep completions zsh"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Quiet mode, minimal output
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Purge repositories whose newest snapshot is older than a cutoff
    PurgeRepos {
        /// Backend descriptor file (YAML or JSON)
        #[arg(long, value_name = "PATH")]
        backend_config: PathBuf,

        /// Relative age cutoff, e.g. "6mo", "1y6mo", "90d"
        #[arg(long, value_name = "DURATION")]
        older_than: String,

        /// Report what would be purged without deleting anything
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,

        /// Container image providing the snapshot tool
        #[arg(long, value_name = "IMAGE", default_value = "restic/restic:0.17.3")]
        tool_image: String,

        /// Directory holding credential secrets (default: ~/.reposweep/secrets)
        #[arg(long, value_name = "PATH")]
        secrets_dir: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
