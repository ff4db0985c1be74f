//! Event endpoints

use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    routing::get,
};
use chrono::NaiveDate;
use congregation_core::CongregationError;
use congregation_core::event::{DATE_FORMAT, EventInstance, EventType, Recurrence};
use congregation_core::occurrence::today;
use congregation_core::service::{EventImage, NewEvent};
use serde::Serialize;

use crate::routes::{AppError, CurrentUser, Form};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(list_events).post(create_event))
}

/// GET /events - Materialized events, soonest first
async fn list_events(State(state): State<AppState>) -> Result<Json<Vec<EventInstance>>, AppError> {
    Ok(Json(state.events.list(today()).await?))
}

#[derive(Serialize)]
pub struct CreatedEvent {
    pub id: String,
}

fn parse_kind(raw: Option<&str>) -> Result<EventType, CongregationError> {
    match raw {
        None | Some("special") => Ok(EventType::Special),
        Some("regular") => Ok(EventType::Regular),
        Some(other) => Err(CongregationError::Validation(format!(
            "Unknown event type '{other}'"
        ))),
    }
}

fn new_event(mut form: Form) -> Result<NewEvent, AppError> {
    let date = form
        .text("date")
        .map(|d| {
            NaiveDate::parse_from_str(d, DATE_FORMAT).map_err(|_| {
                CongregationError::Validation(format!("Invalid date '{d}', expected YYYY-MM-DD"))
            })
        })
        .transpose()?;

    let recurrence = form
        .text("dayOfWeek")
        .map(|d| {
            d.parse::<i64>()
                .map_err(|_| CongregationError::Validation(format!("Invalid day of week '{d}'")))
                .and_then(Recurrence::weekly)
        })
        .transpose()?;

    let image = match form.take_file("image") {
        Some(upload) => EventImage::Upload(upload),
        None => EventImage::Url(form.required("imageUrl")?.to_string()),
    };

    Ok(NewEvent {
        title: form.required("title")?.to_string(),
        time: form.required("time")?.to_string(),
        date,
        description: form.text("description").unwrap_or_default().to_string(),
        image,
        kind: parse_kind(form.text("type"))?,
        recurrence,
        is_permanent: matches!(form.text("isPermanent"), Some("true" | "on" | "1")),
    })
}

/// POST /events - Create an event (administrators only)
async fn create_event(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CreatedEvent>), AppError> {
    let form = Form::read(multipart).await?;
    let event = new_event(form)?;
    let id = state.events.add(&user.identity, event).await?;
    Ok((StatusCode::CREATED, Json(CreatedEvent { id })))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, header};
    use serde_json::json;

    use crate::routes::test_support::{TestApp, multipart, multipart_content_type};

    fn post_event(token: &str, parts: &[(&str, Option<(&str, &str)>, &[u8])]) -> Request<Body> {
        Request::post("/events")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, multipart_content_type())
            .body(multipart(parts))
            .unwrap()
    }

    #[tokio::test]
    async fn lists_events_with_templates_expanded() {
        let app = TestApp::new(json!({
            "events": {
                "k1": {
                    "title": "Sunday Service", "time": "09:00",
                    "recurrence": { "dayOfWeek": 0, "frequency": "weekly" }
                }
            }
        }));

        let (status, body) = app
            .send(Request::get("/events").body(Body::empty()).unwrap())
            .await;
        assert_eq!(status, 200);
        let ids: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, ["k1-0", "k1-1", "k1-2", "k1-3"]);
        assert_eq!(body[0]["type"], "regular");
    }

    #[tokio::test]
    async fn malformed_store_data_is_a_load_failure() {
        let app = TestApp::new(json!({
            "events": { "bad": { "recurrence": { "dayOfWeek": 9, "frequency": "weekly" } } }
        }));

        let (status, body) = app
            .send(Request::get("/events").body(Body::empty()).unwrap())
            .await;
        assert_eq!(status, 500);
        assert!(body["error"].as_str().unwrap().starts_with("Failed to load events"));
    }

    #[tokio::test]
    async fn admin_creates_event_with_image_url() {
        let app = TestApp::new(json!({}));
        let token = app.sign_in("pastor@example.org", "admin").await;

        let (status, body) = app
            .send(post_event(
                &token,
                &[
                    ("title", None, b"Church Picnic"),
                    ("time", None, b"12:00"),
                    ("date", None, b"2031-06-01"),
                    ("type", None, b"special"),
                    ("imageUrl", None, b"https://example.org/picnic.jpg"),
                ],
            ))
            .await;
        assert_eq!(status, 201, "{body}");

        let (_, listed) = app
            .send(Request::get("/events").body(Body::empty()).unwrap())
            .await;
        assert_eq!(listed[0]["id"], body["id"]);
        assert_eq!(listed[0]["date"], "2031-06-01");
    }

    #[tokio::test]
    async fn uploaded_image_is_served_back() {
        let app = TestApp::new(json!({}));
        let token = app.sign_in("pastor@example.org", "admin").await;

        let (status, _) = app
            .send(post_event(
                &token,
                &[
                    ("title", None, b"Wednesday Prayer"),
                    ("time", None, b"19:00"),
                    ("type", None, b"regular"),
                    ("image", Some(("prayer.png", "image/png")), b"\x89PNG"),
                ],
            ))
            .await;
        assert_eq!(status, 201);

        let (_, listed) = app
            .send(Request::get("/events").body(Body::empty()).unwrap())
            .await;
        let url = listed[0]["imageUrl"].as_str().unwrap();
        assert!(url.starts_with("http://localhost:4180/files/events/"));
        assert_eq!(listed[0]["recurrence"]["dayOfWeek"], 3);
    }

    #[tokio::test]
    async fn members_cannot_create_events() {
        let app = TestApp::new(json!({}));
        let token = app.sign_in("ruth@example.org", "user").await;

        let (status, _) = app
            .send(post_event(
                &token,
                &[
                    ("title", None, b"Retreat"),
                    ("time", None, b"10:00"),
                    ("date", None, b"2031-06-01"),
                    ("imageUrl", None, b"https://example.org/r.png"),
                ],
            ))
            .await;
        assert_eq!(status, 403);
    }

    #[tokio::test]
    async fn anonymous_requests_are_unauthorized() {
        let app = TestApp::new(json!({}));
        let request = Request::post("/events")
            .header(header::CONTENT_TYPE, multipart_content_type())
            .body(multipart(&[("title", None, b"Retreat")]))
            .unwrap();

        let (status, _) = app.send(request).await;
        assert_eq!(status, 401);
    }

    #[tokio::test]
    async fn bad_day_of_week_is_rejected() {
        let app = TestApp::new(json!({}));
        let token = app.sign_in("pastor@example.org", "admin").await;

        let (status, _) = app
            .send(post_event(
                &token,
                &[
                    ("title", None, b"Choir"),
                    ("time", None, b"18:00"),
                    ("type", None, b"regular"),
                    ("dayOfWeek", None, b"7"),
                    ("imageUrl", None, b"https://example.org/c.png"),
                ],
            ))
            .await;
        assert_eq!(status, 400);
    }
}
