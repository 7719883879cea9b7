use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::common::errors::{PurgeError, PurgeResult};

/// Object-storage provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    S3,
    Gcs,
    Azure,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::S3 => write!(f, "s3"),
            Provider::Gcs => write!(f, "gcs"),
            Provider::Azure => write!(f, "azure"),
        }
    }
}

/// One backend descriptor. Loaded once per run, immutable afterwards.
///
/// For Azure the `bucket` field holds the container name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub provider: Provider,

    /// Bucket or container name.
    pub bucket: String,

    /// Path prefix under which repositories live. Empty means the root.
    #[serde(default)]
    pub prefix: String,

    /// Credential reference, `namespace/name`, resolved through the
    /// secret store.
    pub credential_secret: String,

    /// Custom endpoint for S3-compatible gateways. Host or full URL.
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    /// Allow plain-HTTP endpoints.
    #[serde(default)]
    pub insecure: bool,
}

impl BackendConfig {
    /// Load a backend descriptor from a YAML or JSON file.
    pub fn load(path: &Path) -> PurgeResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| PurgeError::Config(format!("cannot read {}: {}", path.display(), e)))?;

        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let config: BackendConfig = if is_json {
            serde_json::from_str(&contents)
                .map_err(|e| PurgeError::Config(format!("cannot parse {}: {}", path.display(), e)))?
        } else {
            serde_yaml::from_str(&contents)
                .map_err(|e| PurgeError::Config(format!("cannot parse {}: {}", path.display(), e)))?
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> PurgeResult<()> {
        if self.bucket.is_empty() {
            return Err(PurgeError::Config("bucket must not be empty".to_string()));
        }
        if self.credential_secret.is_empty() {
            return Err(PurgeError::Config(
                "credential_secret must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Prefix normalized to either `""` or `"segments/"`.
    pub fn normalized_prefix(&self) -> String {
        let trimmed = self.prefix.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("{}/", trimmed)
        }
    }

    /// The snapshot tool's connection URL for one repository directory.
    pub fn repository_url(&self, dir: &str) -> String {
        let path = format!("{}{}", self.normalized_prefix(), dir);
        match self.provider {
            Provider::S3 => {
                let endpoint = self.endpoint.as_deref().unwrap_or("s3.amazonaws.com");
                format!("s3:{}/{}/{}", endpoint, self.bucket, path)
            }
            Provider::Gcs => format!("gs:{}:/{}", self.bucket, path),
            Provider::Azure => format!("azure:{}:/{}", self.bucket, path),
        }
    }
}
