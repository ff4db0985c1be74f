//! Blob storage on the local filesystem.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use url::Url;

use super::{BlobStorage, Upload};
use crate::error::{CongregationError, CongregationResult};

/// Stores blobs under `root` and serves them from `public_base_url`.
#[derive(Debug, Clone)]
pub struct LocalBlobStorage {
    root: PathBuf,
    public_base_url: Url,
}

impl LocalBlobStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> CongregationResult<Self> {
        let public_base_url = Url::parse(public_base_url).map_err(|e| {
            CongregationError::Config(format!("Invalid public base URL '{public_base_url}': {e}"))
        })?;

        if public_base_url.cannot_be_a_base() {
            return Err(CongregationError::Config(format!(
                "Public base URL '{public_base_url}' cannot have paths"
            )));
        }

        Ok(LocalBlobStorage {
            root: root.into(),
            public_base_url,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a blob path inside `root`, refusing anything that would escape it.
    fn file_path(&self, path: &str) -> CongregationResult<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes || path.is_empty() {
            return Err(CongregationError::Upload(format!("Invalid object path '{path}'")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn upload(&self, path: &str, upload: &Upload) -> CongregationResult<()> {
        let file = self.file_path(path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file, &upload.bytes).await?;
        tracing::debug!(path, file = %file.display(), "Wrote blob");
        Ok(())
    }

    async fn download_url(&self, path: &str) -> CongregationResult<String> {
        let file = self.file_path(path)?;
        if !tokio::fs::try_exists(&file).await? {
            return Err(CongregationError::Upload(format!("No object at '{path}'")));
        }

        let mut url = self.public_base_url.clone();
        url.path_segments_mut()
            .map_err(|()| CongregationError::Upload("Public base URL cannot have paths".into()))?
            .pop_if_empty()
            .extend(path.split('/'));
        Ok(url.to_string())
    }
}
