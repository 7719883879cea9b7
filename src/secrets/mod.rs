//! Credential resolution for backend and repository access.
//!
//! Credentials are flat key/value maps (`AWS_ACCESS_KEY_ID`,
//! `RESTIC_PASSWORD`, ...) resolved from a namespaced secret store and
//! injected into the sandbox as an environment file.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::common::errors::{PurgeError, PurgeResult};

/// Reference to a named credential in the secret store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRef {
    pub namespace: String,
    pub name: String,
}

impl FromStr for SecretRef {
    type Err = PurgeError;

    /// Parse `namespace/name`; a bare name resolves in `default`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((namespace, name))
                if !namespace.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                })
            }
            None if !s.is_empty() => Ok(Self {
                namespace: "default".to_string(),
                name: s.to_string(),
            }),
            _ => Err(PurgeError::Credential(format!(
                "malformed secret reference '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Resolved credential map.
#[derive(Clone, Default)]
pub struct Credentials(BTreeMap<String, String>);

impl Credentials {
    pub fn from_map(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Look up a key the selected provider cannot work without.
    pub fn require(&self, key: &str) -> PurgeResult<String> {
        self.get(key)
            .map(str::to_string)
            .ok_or_else(|| PurgeError::Credential(format!("secret is missing key '{}'", key)))
    }

    /// Render as `KEY=VALUE` lines for the sandbox environment file.
    pub fn to_env_file(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.0 {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        out
    }
}

// Values must never reach logs; only the key names are shown.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.keys()).finish()
    }
}

/// Capability to resolve a named credential.
pub trait SecretResolver {
    fn resolve(&self, secret: &SecretRef) -> PurgeResult<Credentials>;
}

/// Resolves secrets from a directory tree:
/// `<root>/<namespace>/<name>.{yaml,yml,json}`, each file a flat string
/// map.
pub struct FileSecretResolver {
    root: PathBuf,
}

impl FileSecretResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default store location, `~/.reposweep/secrets`.
    pub fn default_root() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".reposweep")
            .join("secrets")
    }
}

impl SecretResolver for FileSecretResolver {
    fn resolve(&self, secret: &SecretRef) -> PurgeResult<Credentials> {
        let dir = self.root.join(&secret.namespace);
        let mut found = None;
        for ext in ["yaml", "yml", "json"] {
            let path = dir.join(format!("{}.{}", secret.name, ext));
            if path.exists() {
                found = Some(path);
                break;
            }
        }
        let path = found.ok_or_else(|| {
            PurgeError::Credential(format!(
                "secret '{}' not found under {}",
                secret,
                self.root.display()
            ))
        })?;

        let contents = std::fs::read_to_string(&path)
            .map_err(|e| PurgeError::Credential(format!("cannot read {}: {}", path.display(), e)))?;

        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let map: BTreeMap<String, String> = if is_json {
            serde_json::from_str(&contents).map_err(|e| {
                PurgeError::Credential(format!("cannot parse {}: {}", path.display(), e))
            })?
        } else {
            serde_yaml::from_str(&contents).map_err(|e| {
                PurgeError::Credential(format!("cannot parse {}: {}", path.display(), e))
            })?
        };

        if map.is_empty() {
            return Err(PurgeError::Credential(format!("secret '{}' is empty", secret)));
        }
        Ok(Credentials::from_map(map))
    }
}
