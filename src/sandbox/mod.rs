//! Sandboxed execution of the external snapshot tool.
//!
//! The snapshot tool only runs inside an immutable container image with
//! credentials supplied through an environment file. The purge and probe
//! logic sees the `ScriptExecutor` capability, so tests drive it with
//! fakes instead of a real container runtime.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use tracing::debug;

use crate::common::errors::{PurgeError, PurgeResult};
use crate::secrets::Credentials;

/// Output of one sandboxed script run.
#[derive(Debug)]
pub struct ScriptOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl ScriptOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Capability to execute a generated script with injected credentials.
pub trait ScriptExecutor {
    fn run(&self, script: &Path, env_file: &Path) -> PurgeResult<ScriptOutput>;
}

/// Scratch directory holding the generated scripts and the credentials
/// environment file.
///
/// Created fresh at the start of a run; the directory and everything in
/// it is removed when this value drops, on every exit path.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn create() -> PurgeResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("reposweep-")
            .tempdir()
            .map_err(|e| PurgeError::ScriptExecution(format!("cannot create scratch dir: {}", e)))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a generated script into the scratch directory.
    pub fn write_script(&self, name: &str, contents: &str) -> PurgeResult<PathBuf> {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).map_err(|e| {
            PurgeError::ScriptExecution(format!("cannot write {}: {}", path.display(), e))
        })?;
        Ok(path)
    }

    /// Write the credentials environment file, readable by owner only.
    pub fn write_env_file(&self, creds: &Credentials) -> PurgeResult<PathBuf> {
        let path = self.dir.path().join("repo.env");
        std::fs::write(&path, creds.to_env_file()).map_err(|e| {
            PurgeError::ScriptExecution(format!("cannot write {}: {}", path.display(), e))
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).map_err(
                |e| {
                    PurgeError::ScriptExecution(format!(
                        "cannot restrict {}: {}",
                        path.display(),
                        e
                    ))
                },
            )?;
        }
        Ok(path)
    }
}

/// Quote a value for safe inclusion in a generated POSIX script.
pub(crate) fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Runs scripts inside an immutable container image via the docker CLI.
pub struct ContainerExecutor {
    image: String,
}

impl ContainerExecutor {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }

    /// Check the container runtime answers before doing any work.
    pub fn is_available() -> bool {
        Command::new("docker")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Arguments for one `docker run` invocation. The scratch directory
    /// is mounted read-only and the image entrypoint is replaced with a
    /// shell so the whole batch runs as one process.
    fn command_args(&self, script: &Path, env_file: &Path) -> Vec<String> {
        let dir = script.parent().unwrap_or_else(|| Path::new("."));
        let name = script
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("script.sh");
        vec![
            "run".to_string(),
            "--rm".to_string(),
            "--env-file".to_string(),
            env_file.display().to_string(),
            "-v".to_string(),
            format!("{}:/work:ro", dir.display()),
            "--entrypoint".to_string(),
            "sh".to_string(),
            self.image.clone(),
            format!("/work/{}", name),
        ]
    }
}

impl ScriptExecutor for ContainerExecutor {
    fn run(&self, script: &Path, env_file: &Path) -> PurgeResult<ScriptOutput> {
        let args = self.command_args(script, env_file);
        debug!(image = %self.image, script = %script.display(), "running sandboxed script");

        let output = Command::new("docker").args(&args).output().map_err(|e| {
            PurgeError::ScriptExecution(format!("cannot launch container runtime: {}", e))
        })?;

        Ok(ScriptOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            code: output.status.code().unwrap_or(-1),
        })
    }
}
