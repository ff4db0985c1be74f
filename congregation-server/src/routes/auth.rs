//! Sign-up, sign-in and profile endpoints

use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use congregation_core::CongregationError;
use congregation_core::auth::{AuthSession, Profile, SignupRequest};
use serde::Deserialize;

use crate::routes::{AppError, Form, bearer_token};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/google", post(google))
        .route("/auth/logout", post(logout))
        .route("/me", get(me))
}

/// POST /auth/signup - Create an account; a verification code is emailed
async fn signup(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<AuthSession>), AppError> {
    let mut form = Form::read(multipart).await?;
    let request = SignupRequest {
        email: form.required("email")?.to_string(),
        password: form
            .raw("password")
            .ok_or_else(|| CongregationError::Validation("Missing field 'password'".into()))?
            .to_string(),
        first_name: form.required("firstName")?.to_string(),
        last_name: form.required("lastName")?.to_string(),
        profile_pic: form.take_file("profilePic"),
    };

    let session = state.accounts.signup(request).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub verification_code: String,
}

/// POST /auth/login - Email and password, gated by the verification code
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthSession>, AppError> {
    let session = state
        .accounts
        .login(&req.email, &req.password, &req.verification_code)
        .await?;
    Ok(Json(session))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleRequest {
    pub id_token: String,
}

/// POST /auth/google - Sign in with a Google ID token
async fn google(
    State(state): State<AppState>,
    Json(req): Json<GoogleRequest>,
) -> Result<Json<AuthSession>, AppError> {
    Ok(Json(state.accounts.login_with_google(&req.id_token).await?))
}

/// POST /auth/logout - End the bearer token's session
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode, AppError> {
    if let Some(token) = bearer_token(&headers) {
        state.accounts.logout(token).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /me - Profile of the signed-in user
async fn me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Profile>, AppError> {
    let token = bearer_token(&headers).ok_or(CongregationError::Unauthenticated)?;
    let profile = state
        .accounts
        .profile(token)
        .await?
        .ok_or(CongregationError::Unauthenticated)?;
    Ok(Json(profile))
}
