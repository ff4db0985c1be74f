mod routes;
mod state;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use congregation_core::backend::Backends;
use congregation_core::config::{BackendKind, Settings};
use congregation_core::constants::MAX_AUDIO_BYTES;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

/// Room for multipart framing around the largest accepted file.
const BODY_LIMIT: usize = MAX_AUDIO_BYTES + 1024 * 1024;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .merge(routes::events::router())
        .merge(routes::sermons::router())
        .merge(routes::auth::router())
        .merge(routes::calendar::router());

    if let Some(dir) = &state.uploads_dir {
        app = app.nest_service("/files", ServeDir::new(dir));
    }

    app.with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level)),
        )
        .init();

    let backends = Backends::connect(&settings).await?;
    let mut state = AppState::new(backends, settings.event_settings()?);
    if settings.backend.kind == BackendKind::Memory {
        state = state.with_uploads_dir(settings.local_dir());
    }

    let addr = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("congregation-server listening on http://{addr}");

    axum::serve(listener, app(state)).await?;

    Ok(())
}
