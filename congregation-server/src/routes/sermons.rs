//! Sermon endpoints

use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    routing::get,
};
use chrono::Utc;
use congregation_core::CongregationError;
use congregation_core::Sermon;
use congregation_core::service::SermonUpload;

use crate::routes::{AppError, CurrentUser, Form};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/sermons", get(list_sermons).post(upload_sermon))
}

/// GET /sermons - All sermons, newest first
async fn list_sermons(State(state): State<AppState>) -> Result<Json<Vec<Sermon>>, AppError> {
    Ok(Json(state.sermons.list(Utc::now()).await?))
}

/// POST /sermons - Upload a recording (administrators only)
async fn upload_sermon(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Sermon>), AppError> {
    let mut form = Form::read(multipart).await?;
    let audio = form
        .take_file("file")
        .ok_or_else(|| CongregationError::Validation("Please select a file to upload".into()))?;

    let upload = SermonUpload {
        title: form.text("title").unwrap_or_default().to_string(),
        description: form.text("description").unwrap_or_default().to_string(),
        audio,
    };

    let sermon = state
        .sermons
        .upload(&user.identity, upload, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(sermon)))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, header};
    use serde_json::json;

    use crate::routes::test_support::{TestApp, multipart, multipart_content_type};

    fn upload_request(token: &str, content_type: &str) -> Request<Body> {
        Request::post("/sermons")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, multipart_content_type())
            .body(multipart(&[
                ("title", None, b"Grace Abounds"),
                ("description", None, b"Romans 5"),
                ("file", Some(("grace.mp3", content_type)), b"ID3"),
            ]))
            .unwrap()
    }

    #[tokio::test]
    async fn lists_sermons_newest_first() {
        let app = TestApp::new(json!({
            "sermons": {
                "a": { "title": "First", "date": "2024-01-07T10:00:00.000Z", "audioUrl": "u1" },
                "b": { "title": "Second", "date": "2024-01-14T10:00:00.000Z", "audioUrl": "u2" }
            }
        }));

        let (status, body) = app
            .send(Request::get("/sermons").body(Body::empty()).unwrap())
            .await;
        assert_eq!(status, 200);
        assert_eq!(body[0]["title"], "Second");
        assert_eq!(body[1]["audioUrl"], "u1");
    }

    #[tokio::test]
    async fn admin_uploads_sermon() {
        let app = TestApp::new(json!({}));
        let token = app.sign_in("pastor@example.org", "admin").await;

        let (status, created) = app.send(upload_request(&token, "audio/mpeg")).await;
        assert_eq!(status, 201, "{created}");
        assert_eq!(created["title"], "Grace Abounds");

        let (_, listed) = app
            .send(Request::get("/sermons").body(Body::empty()).unwrap())
            .await;
        assert_eq!(listed[0]["id"], created["id"]);
    }

    #[tokio::test]
    async fn non_audio_upload_is_rejected() {
        let app = TestApp::new(json!({}));
        let token = app.sign_in("pastor@example.org", "admin").await;

        let (status, body) = app.send(upload_request(&token, "image/png")).await;
        assert_eq!(status, 400);
        assert!(body["error"].as_str().unwrap().contains("audio"));
    }
}
