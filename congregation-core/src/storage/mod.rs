//! Blob storage port and upload rules.
//!
//! Event images, sermon audio and profile pictures are stored as blobs and
//! referenced from the database by their download URL.

mod cloud;
mod local;

use async_trait::async_trait;

use crate::constants::{IMAGE_URL_EXTENSIONS, MAX_AUDIO_BYTES, MAX_IMAGE_BYTES};
use crate::error::{CongregationError, CongregationResult};

pub use cloud::CloudStorage;
pub use local::LocalBlobStorage;

/// A file received from the site.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Audio,
}

impl UploadKind {
    fn mime_prefix(self) -> &'static str {
        match self {
            UploadKind::Image => "image/",
            UploadKind::Audio => "audio/",
        }
    }

    pub fn max_bytes(self) -> usize {
        match self {
            UploadKind::Image => MAX_IMAGE_BYTES,
            UploadKind::Audio => MAX_AUDIO_BYTES,
        }
    }

    fn label(self) -> &'static str {
        match self {
            UploadKind::Image => "an image",
            UploadKind::Audio => "an audio file",
        }
    }
}

impl Upload {
    /// Check content type and size against what `kind` allows.
    pub fn validate(&self, kind: UploadKind) -> CongregationResult<()> {
        if !self.content_type.starts_with(kind.mime_prefix()) {
            return Err(CongregationError::Validation(format!(
                "Please upload {} (got '{}')",
                kind.label(),
                self.content_type
            )));
        }

        let max = kind.max_bytes();
        if self.bytes.len() > max {
            return Err(CongregationError::Validation(format!(
                "File size must be less than {}MB",
                max / (1024 * 1024)
            )));
        }

        Ok(())
    }
}

/// `{prefix}/{millis}-{file name}`, with path separators removed from the name.
pub fn object_path(prefix: &str, file_name: &str, millis: i64) -> String {
    let name: String = file_name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{prefix}/{millis}-{name}")
}

/// Image URLs entered by hand must point straight at an image file.
pub fn validate_image_url(url: &str) -> CongregationResult<()> {
    let lower = url.to_lowercase();
    if IMAGE_URL_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        Ok(())
    } else {
        Err(CongregationError::Validation(
            "Image URL must end with .jpg, .jpeg, .png, .gif, or .webp".into(),
        ))
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store `upload` at `path`, replacing anything already there.
    async fn upload(&self, path: &str, upload: &Upload) -> CongregationResult<()>;

    /// A public URL for the blob at `path`.
    async fn download_url(&self, path: &str) -> CongregationResult<String>;
}

/// Upload then resolve the download URL.
pub async fn store_upload(
    storage: &dyn BlobStorage,
    path: &str,
    upload: &Upload,
) -> CongregationResult<String> {
    storage.upload(path, upload).await?;
    let url = storage.download_url(path).await?;
    tracing::info!(path, bytes = upload.bytes.len(), "Stored upload");
    Ok(url)
}
