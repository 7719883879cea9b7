use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as StorePath;
use object_store::ObjectStore as ClientStore;
use tokio::runtime::Runtime;
use tracing::debug;

use super::config::{BackendConfig, Provider};
use super::store::ObjectStore;
use crate::common::errors::{PurgeError, PurgeResult};
use crate::secrets::Credentials;

/// Production storage backend over the `object_store` client crate.
///
/// The client is async; a current-thread runtime drives it so every call
/// blocks and completes in strict program order.
pub struct RemoteStore {
    runtime: Runtime,
    client: Arc<dyn ClientStore>,
    prefix: String,
}

impl RemoteStore {
    /// Build a client for the configured provider and credentials.
    pub fn connect(config: &BackendConfig, creds: &Credentials) -> PurgeResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| PurgeError::Backend(format!("cannot start client runtime: {}", e)))?;

        let client: Arc<dyn ClientStore> = match config.provider {
            Provider::S3 => {
                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(config.bucket.clone())
                    .with_access_key_id(creds.require("AWS_ACCESS_KEY_ID")?)
                    .with_secret_access_key(creds.require("AWS_SECRET_ACCESS_KEY")?);
                if let Some(region) = &config.region {
                    builder = builder.with_region(region.clone());
                }
                if let Some(endpoint) = &config.endpoint {
                    builder = builder.with_endpoint(endpoint_url(endpoint, config.insecure));
                }
                if config.insecure {
                    builder = builder.with_allow_http(true);
                }
                Arc::new(
                    builder
                        .build()
                        .map_err(|e| PurgeError::Backend(e.to_string()))?,
                )
            }
            Provider::Gcs => {
                let builder = GoogleCloudStorageBuilder::new()
                    .with_bucket_name(config.bucket.clone())
                    .with_service_account_key(creds.require("GOOGLE_SERVICE_ACCOUNT_KEY")?);
                Arc::new(
                    builder
                        .build()
                        .map_err(|e| PurgeError::Backend(e.to_string()))?,
                )
            }
            Provider::Azure => {
                let builder = MicrosoftAzureBuilder::new()
                    .with_container_name(config.bucket.clone())
                    .with_account(creds.require("AZURE_ACCOUNT_NAME")?)
                    .with_access_key(creds.require("AZURE_ACCOUNT_KEY")?);
                Arc::new(
                    builder
                        .build()
                        .map_err(|e| PurgeError::Backend(e.to_string()))?,
                )
            }
        };

        Ok(Self {
            runtime,
            client,
            prefix: config.normalized_prefix(),
        })
    }

    fn full_path(&self, path: &str) -> String {
        let joined = format!("{}{}", self.prefix, path.trim_start_matches('/'));
        joined.trim_matches('/').to_string()
    }

    fn relative<'a>(base: &str, full: &'a str) -> &'a str {
        if base.is_empty() {
            full
        } else {
            full.strip_prefix(base)
                .map(|rest| rest.trim_start_matches('/'))
                .unwrap_or(full)
        }
    }
}

impl ObjectStore for RemoteStore {
    fn list_dir(&self, path: &str, depth: u32) -> PurgeResult<Vec<String>> {
        let base = self.full_path(path);
        debug!(path = %base, depth, "listing backend directory");

        self.runtime.block_on(async {
            let mut entries = Vec::new();
            let mut level: Vec<String> = vec![base.clone()];
            let mut remaining = depth;
            loop {
                let mut below = Vec::new();
                for dir in &level {
                    let loc = if dir.is_empty() {
                        None
                    } else {
                        Some(StorePath::from(dir.as_str()))
                    };
                    let listing = self
                        .client
                        .list_with_delimiter(loc.as_ref())
                        .await
                        .map_err(|e| PurgeError::Backend(e.to_string()))?;
                    for prefix in listing.common_prefixes {
                        entries.push(format!("{}/", Self::relative(&base, prefix.as_ref())));
                        below.push(prefix.as_ref().to_string());
                    }
                    for object in listing.objects {
                        entries.push(Self::relative(&base, object.location.as_ref()).to_string());
                    }
                }
                if remaining == 0 || below.is_empty() {
                    break;
                }
                remaining -= 1;
                level = below;
            }
            Ok(entries)
        })
    }

    fn delete(&self, path: &str, recursive: bool) -> PurgeResult<()> {
        let target = self.full_path(path);
        debug!(path = %target, recursive, "deleting backend path");

        let deletion_error = |e: object_store::Error| PurgeError::Deletion {
            path: path.to_string(),
            reason: e.to_string(),
        };

        self.runtime.block_on(async {
            if !recursive {
                return self
                    .client
                    .delete(&StorePath::from(target.as_str()))
                    .await
                    .map_err(deletion_error);
            }

            // Walk the subtree level by level; list_with_delimiter keeps
            // this free of unbounded result sets per call.
            let mut stack = vec![target.clone()];
            while let Some(dir) = stack.pop() {
                let loc = if dir.is_empty() {
                    None
                } else {
                    Some(StorePath::from(dir.as_str()))
                };
                let listing = self
                    .client
                    .list_with_delimiter(loc.as_ref())
                    .await
                    .map_err(deletion_error)?;
                for object in listing.objects {
                    self.client
                        .delete(&object.location)
                        .await
                        .map_err(deletion_error)?;
                }
                stack.extend(
                    listing
                        .common_prefixes
                        .into_iter()
                        .map(|p| p.as_ref().to_string()),
                );
            }
            Ok(())
        })
    }
}

/// Normalize a configured endpoint into the URL form the client expects.
fn endpoint_url(endpoint: &str, insecure: bool) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else if insecure {
        format!("http://{}", endpoint)
    } else {
        format!("https://{}", endpoint)
    }
}
