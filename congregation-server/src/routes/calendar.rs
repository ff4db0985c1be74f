//! Personal calendar endpoints

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use congregation_core::event::EventInstance;
use congregation_core::month::{MonthView, YearMonth};
use congregation_core::occurrence::today;
use serde::{Deserialize, Serialize};

use crate::routes::{AppError, CurrentUser};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me/calendar", get(month_view).post(add_event))
        .route("/me/events", get(saved_events))
}

#[derive(Deserialize)]
pub struct MonthQuery {
    /// YYYY-MM, defaults to the current month
    pub month: Option<String>,
}

/// GET /me/calendar?month=YYYY-MM - Saved events laid out over a month
async fn month_view(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<MonthQuery>,
) -> Result<Json<MonthView>, AppError> {
    let today = today();
    let month = match query.month.as_deref() {
        Some(raw) => raw.parse::<YearMonth>()?,
        None => YearMonth::containing(today),
    };

    let view = state
        .calendar
        .month_view(&user.identity.id, month, today)
        .await?;
    Ok(Json(view))
}

/// GET /me/events - Saved events, soonest first
async fn saved_events(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<EventInstance>>, AppError> {
    Ok(Json(
        state
            .calendar
            .user_events(&user.identity.id, today())
            .await?,
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEventRequest {
    /// Storage key of the event (not an occurrence id)
    pub event_id: String,
}

#[derive(Serialize)]
pub struct AddEventResponse {
    pub added: bool,
}

/// POST /me/calendar - Save an event to the personal calendar
async fn add_event(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<AddEventRequest>,
) -> Result<Json<AddEventResponse>, AppError> {
    let added = state
        .calendar
        .add_to_calendar(&user.identity.id, &req.event_id)
        .await?;
    Ok(Json(AddEventResponse { added }))
}
