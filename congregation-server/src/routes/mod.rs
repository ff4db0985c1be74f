pub mod auth;
pub mod calendar;
pub mod events;
pub mod sermons;

use std::collections::HashMap;

use axum::{
    Json,
    extract::{FromRequestParts, Multipart},
    http::{HeaderMap, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use congregation_core::CongregationError;
use congregation_core::auth::Identity;
use congregation_core::storage::Upload;
use serde::Serialize;

use crate::state::AppState;

/// Standard API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Convert anyhow errors to HTTP responses
#[derive(Debug)]
pub struct AppError(anyhow::Error);

fn status_for(err: &CongregationError) -> StatusCode {
    use CongregationError as E;

    match err {
        E::Validation(_) | E::InvalidWeekday(_) | E::InvalidFanOut => StatusCode::BAD_REQUEST,
        E::Auth { .. }
        | E::VerificationCodeNotFound
        | E::InvalidVerificationCode
        | E::Unauthenticated => StatusCode::UNAUTHORIZED,
        E::Forbidden => StatusCode::FORBIDDEN,
        E::Upload(_) => StatusCode::BAD_GATEWAY,
        e if e.is_store_failure() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self
            .0
            .downcast_ref::<CongregationError>()
            .map(status_for)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::warn!(%status, error = %self.0, "Request failed");
        }

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The signed-in caller, resolved from the bearer token.
pub struct CurrentUser {
    pub identity: Identity,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(&parts.headers).ok_or(CongregationError::Unauthenticated)?;
        let identity = state
            .accounts
            .current_identity(token)
            .await?
            .ok_or(CongregationError::Unauthenticated)?;
        Ok(CurrentUser { identity })
    }
}

/// Text fields and files of a multipart form, by field name.
#[derive(Debug, Default)]
pub struct Form {
    fields: HashMap<String, String>,
    files: HashMap<String, Upload>,
}

impl Form {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let invalid = |e: axum::extract::multipart::MultipartError| {
            CongregationError::Validation(format!("Invalid form data: {e}"))
        };

        let mut form = Form::default();
        while let Some(field) = multipart.next_field().await.map_err(invalid)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().unwrap_or_default().to_string();
                    let bytes = field.bytes().await.map_err(invalid)?;
                    // Browsers send an empty part for an untouched file input
                    if !bytes.is_empty() {
                        form.files.insert(
                            name,
                            Upload {
                                file_name,
                                content_type,
                                bytes: bytes.to_vec(),
                            },
                        );
                    }
                }
                None => {
                    let text = field.text().await.map_err(invalid)?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    /// A non-empty text field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// A field exactly as sent, whitespace included.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn required(&self, name: &str) -> Result<&str, AppError> {
        self.text(name)
            .ok_or_else(|| CongregationError::Validation(format!("Missing field '{name}'")).into())
    }

    pub fn take_file(&mut self, name: &str) -> Option<Upload> {
        self.files.remove(name)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, Response};
    use congregation_core::auth::{AuthProvider, MemoryAuth};
    use congregation_core::backend::Backends;
    use congregation_core::service::EventSettings;
    use congregation_core::storage::LocalBlobStorage;
    use congregation_core::store::{DataStore, MemoryStore};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::state::AppState;

    pub struct TestApp {
        pub store: Arc<MemoryStore>,
        pub auth: Arc<MemoryAuth>,
        pub state: AppState,
        _uploads: tempfile::TempDir,
    }

    impl TestApp {
        pub fn new(data: Value) -> Self {
            let uploads = tempfile::tempdir().unwrap();
            let store = Arc::new(MemoryStore::with_data(data));
            let auth = Arc::new(MemoryAuth::new());
            let storage =
                LocalBlobStorage::new(uploads.path(), "http://localhost:4180/files/").unwrap();

            let backends = Backends {
                store: store.clone(),
                auth: auth.clone(),
                storage: Arc::new(storage),
            };
            let state = AppState::new(backends, EventSettings::default())
                .with_uploads_dir(uploads.path().to_path_buf());

            TestApp {
                store,
                auth,
                state,
                _uploads: uploads,
            }
        }

        /// A signed-in user with the given stored role; returns their token.
        pub async fn sign_in(&self, email: &str, role: &str) -> String {
            let session = self.auth.create_user(email, "hunter22").await.unwrap();
            self.store
                .write(&format!("users/{}/role", session.user.uid), json!(role))
                .await
                .unwrap();
            session.id_token
        }

        pub async fn send(&self, request: Request<Body>) -> (u16, Value) {
            let response: Response<Body> = crate::app(self.state.clone())
                .oneshot(request)
                .await
                .unwrap();
            let status = response.status().as_u16();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, body)
        }
    }

    pub const BOUNDARY: &str = "congregation-test-boundary";

    /// A multipart body; parts with a file name are sent as files.
    pub fn multipart(parts: &[(&str, Option<(&str, &str)>, &[u8])]) -> Body {
        let mut body = Vec::new();
        for (name, file, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file {
                Some((file_name, content_type)) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Body::from(body)
    }

    pub fn multipart_content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }
}
