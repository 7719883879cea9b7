use thiserror::Error;

/// Error taxonomy for the purge pipeline.
///
/// `InvalidDuration`, `Config`, `Credential`, `Backend`, and
/// `ScriptExecution` are fatal: the run stops before any destructive work.
/// `Parse` and `Deletion` are accumulated per repository and surfaced in
/// the final stats instead.
#[derive(Debug, Error)]
pub enum PurgeError {
    /// The `--older-than` expression could not be parsed.
    #[error("invalid duration expression '{0}'")]
    InvalidDuration(String),

    /// The backend descriptor file is missing or unparsable.
    #[error("backend config error: {0}")]
    Config(String),

    /// The referenced credential secret is missing or malformed.
    #[error("credential error: {0}")]
    Credential(String),

    /// A backend listing call failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// The batched script failed to launch or exited non-zero as a whole.
    #[error("script execution failed: {0}")]
    ScriptExecution(String),

    /// One candidate's probe record was malformed.
    #[error("unparsable probe output for '{path}': {reason}")]
    Parse { path: String, reason: String },

    /// Metadata deletion failed for one repository.
    #[error("failed to delete metadata for '{path}': {reason}")]
    Deletion { path: String, reason: String },
}

pub type PurgeResult<T> = Result<T, PurgeError>;
