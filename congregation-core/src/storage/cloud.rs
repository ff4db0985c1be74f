//! Hosted storage bucket over its REST API.
//!
//! Objects are addressed as `/v0/b/{bucket}/o/{url-encoded path}`. Uploaded
//! objects carry a download token, and the public URL is the media URL with
//! that token attached.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{BlobStorage, Upload};
use crate::error::{CongregationError, CongregationResult};

const STORAGE_API: &str = "https://firebasestorage.googleapis.com/v0/b/";
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug)]
pub struct CloudStorage {
    http: reqwest::Client,
    bucket: String,
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    #[serde(default)]
    download_tokens: Option<String>,
}

impl CloudStorage {
    pub fn new(bucket: impl Into<String>) -> CongregationResult<Self> {
        let http = reqwest::Client::builder().timeout(UPLOAD_TIMEOUT).build()?;
        Ok(CloudStorage {
            http,
            bucket: bucket.into(),
            id_token: None,
        })
    }

    /// Send requests as a signed-in user so storage rules can check them.
    pub fn with_id_token(mut self, token: impl Into<String>) -> Self {
        self.id_token = Some(token.into());
        self
    }

    fn objects_url(&self) -> CongregationResult<Url> {
        let mut url = Url::parse(STORAGE_API)
            .map_err(|e| CongregationError::Config(format!("Invalid storage API URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| CongregationError::Config("Invalid storage API URL".into()))?
            .pop_if_empty()
            .push(&self.bucket)
            .push("o");
        Ok(url)
    }

    /// The object URL; the whole path is one segment, so `/` is encoded.
    fn object_url(&self, path: &str) -> CongregationResult<Url> {
        let mut url = self.objects_url()?;
        url.path_segments_mut()
            .map_err(|()| CongregationError::Config("Invalid storage API URL".into()))?
            .push(path);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.id_token {
            Some(token) => request.header("Authorization", format!("Firebase {token}")),
            None => request,
        }
    }
}

#[async_trait]
impl BlobStorage for CloudStorage {
    async fn upload(&self, path: &str, upload: &Upload) -> CongregationResult<()> {
        let mut url = self.objects_url()?;
        url.query_pairs_mut().append_pair("name", path);

        let resp = self
            .authorize(self.http.post(url))
            .header("Content-Type", &upload.content_type)
            .body(upload.bytes.clone())
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(path, %status, "Storage upload failed");
            return Err(CongregationError::Upload(format!("{status}: {body}")));
        }

        Ok(())
    }

    async fn download_url(&self, path: &str) -> CongregationResult<String> {
        let url = self.object_url(path)?;
        let resp = self.authorize(self.http.get(url.clone())).send().await?;

        if !resp.status().is_success() {
            return Err(CongregationError::Upload(format!(
                "No object at '{path}' ({})",
                resp.status()
            )));
        }

        let metadata: ObjectMetadata = resp.json().await?;
        let token = metadata
            .download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').next())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CongregationError::Upload(format!("Object '{path}' has no download token")))?
            .to_string();

        let mut media = url;
        media
            .query_pairs_mut()
            .append_pair("alt", "media")
            .append_pair("token", &token);
        Ok(media.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_path_is_a_single_encoded_segment() {
        let storage = CloudStorage::new("parish.appspot.com").unwrap();
        let url = storage.object_url("sermons/17-easter sunday.mp3").unwrap();
        assert_eq!(
            url.as_str(),
            "https://firebasestorage.googleapis.com/v0/b/parish.appspot.com/o/sermons%2F17-easter%20sunday.mp3"
        );
    }

    #[test]
    fn objects_url_points_at_bucket() {
        let storage = CloudStorage::new("parish.appspot.com").unwrap();
        assert_eq!(
            storage.objects_url().unwrap().as_str(),
            "https://firebasestorage.googleapis.com/v0/b/parish.appspot.com/o"
        );
    }
}
