//! Batch address scoring.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{ScoreRequest, ScoreResponse};
use crate::app_state::{Account, AppState};
use crate::error::GatewayError;

/// `POST /score` — score a batch of free-form addresses. Entries that
/// cannot be resolved come back as `null`.
#[utoipa::path(
    post,
    path = "/score",
    tag = "Scores",
    summary = "Score a batch of addresses",
    request_body = ScoreRequest,
    responses((status = 200, description = "One score (or null) per place", body = ScoreResponse))
)]
pub async fn calculate_scores(
    State(state): State<AppState>,
    Account(_profile): Account,
    Json(req): Json<ScoreRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let mut results = Vec::with_capacity(req.places.len());
    for place in &req.places {
        let score = match state
            .profiles
            .score_for_address(&place.address, state.geocoder.as_ref())
            .await
        {
            Ok(score) => score,
            Err(err) => {
                tracing::warn!(error = %err, address = %place.address, "address scoring failed");
                None
            }
        };
        results.push(score);
    }

    Ok(Json(ScoreResponse { results }))
}

/// Score routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/score", post(calculate_scores))
}
