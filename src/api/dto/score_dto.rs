//! Batch address-scoring DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One place to score.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ScorePlace {
    pub address: String,
}

/// `POST /score` request body.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ScoreRequest {
    pub places: Vec<ScorePlace>,
}

/// `POST /score` response payload; `null` entries mark unresolvable
/// addresses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScoreResponse {
    pub results: Vec<Option<f64>>,
}
