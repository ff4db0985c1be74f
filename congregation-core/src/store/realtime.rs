//! REST client for the hosted realtime database.
//!
//! Every node is reachable at `{database_url}/{path}.json`: GET reads it,
//! PUT replaces it (a null body deletes).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::push_id::PushIdGenerator;
use super::{DataStore, Snapshot, join_path};
use crate::error::{CongregationError, CongregationResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct RealtimeDatabase {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
    keys: PushIdGenerator,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl RealtimeDatabase {
    pub fn new(database_url: &str) -> CongregationResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(RealtimeDatabase {
            http,
            base_url: database_url.trim_end_matches('/').to_string(),
            auth_token: None,
            keys: PushIdGenerator::new(),
        })
    }

    /// Authenticate requests with a database secret or ID token.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, join_path(&[path]))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let request = self.http.request(method, self.url(path));
        match &self.auth_token {
            Some(token) => request.query(&[("auth", token)]),
            None => request,
        }
    }

    /// The database's error message, or the status line when there is none.
    async fn failure_message(resp: reqwest::Response) -> String {
        let status = resp.status();
        match resp.json::<ErrorBody>().await {
            Ok(body) => format!("{status}: {}", body.error),
            Err(_) => status.to_string(),
        }
    }
}

#[async_trait]
impl DataStore for RealtimeDatabase {
    async fn read(&self, path: &str) -> CongregationResult<Snapshot> {
        let read_error = |message: String| CongregationError::StoreRead {
            path: path.to_string(),
            message,
        };

        let resp = self
            .request(reqwest::Method::GET, path)
            .send()
            .await
            .map_err(|e| read_error(e.to_string()))?;

        if !resp.status().is_success() {
            let message = Self::failure_message(resp).await;
            tracing::warn!(path, %message, "Database read failed");
            return Err(read_error(message));
        }

        let value: Value = resp.json().await.map_err(|e| read_error(e.to_string()))?;
        tracing::debug!(path, exists = !value.is_null(), "Database read");
        Ok(Snapshot::new(path, value))
    }

    async fn write(&self, path: &str, value: Value) -> CongregationResult<()> {
        let write_error = |message: String| CongregationError::StoreWrite {
            path: path.to_string(),
            message,
        };

        let resp = self
            .request(reqwest::Method::PUT, path)
            .json(&value)
            .send()
            .await
            .map_err(|e| write_error(e.to_string()))?;

        if !resp.status().is_success() {
            let message = Self::failure_message(resp).await;
            tracing::warn!(path, %message, "Database write failed");
            return Err(write_error(message));
        }

        tracing::debug!(path, "Database write");
        Ok(())
    }

    fn push_new_key(&self, _path: &str) -> String {
        self.keys.generate()
    }
}
