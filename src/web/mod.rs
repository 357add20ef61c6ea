mod error;
mod handlers;

use std::path::Path;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::leaderboard::Leaderboard;
use crate::Error;

#[derive(Clone)]
pub struct AppState {
    pub leaderboard: Arc<Leaderboard>,
}

impl AppState {
    pub fn new(leaderboard: Leaderboard) -> Self {
        Self {
            leaderboard: Arc::new(leaderboard),
        }
    }
}

pub fn router(state: AppState, static_dir: &Path, cors_origins: &[String]) -> Result<Router, Error> {
    Ok(Router::new()
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .route("/submit_score", post(handlers::submit_score))
        .route("/get_high_scores", get(handlers::get_high_scores))
        .layer(cors_layer(cors_origins)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Any origin when `origins` is empty, otherwise exactly the listed ones.
fn cors_layer(origins: &[String]) -> Result<CorsLayer, Error> {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let parsed = origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .map_err(|e| format!("Invalid CORS origin {}: {}", origin, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(parsed)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any))
}
