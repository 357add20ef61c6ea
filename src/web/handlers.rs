use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use tracing::debug;

use crate::leaderboard::{ScoreEntry, ScoreSubmission};
use crate::web::error::ApiError;
use crate::web::AppState;

pub(crate) async fn submit_score(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Vec<ScoreEntry>>, ApiError> {
    let submission: ScoreSubmission =
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidInput(e.to_string()))?;

    let result = state.leaderboard.submit(&submission).await?;
    debug!(
        admitted_id = result.admitted.as_ref().map(|e| e.id),
        board_len = result.leaderboard.len(),
        "Score submission handled"
    );
    Ok(Json(result.leaderboard))
}

pub(crate) async fn get_high_scores(
    State(state): State<AppState>,
) -> Result<Json<Vec<ScoreEntry>>, ApiError> {
    let scores = state.leaderboard.top().await?;
    Ok(Json(scores))
}
