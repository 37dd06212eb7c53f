//! Rating endpoint DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::rating::RatingResource;

/// One submitted rating.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UserRating {
    pub resource_id: String,
    /// Star score 1..=5; 0 means "unrated" and is ignored.
    pub score: f64,
}

/// `POST /points_of_interest/{id}/rating` request body.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateRatingsRequest {
    pub ratings: Vec<UserRating>,
    #[serde(default)]
    pub lang: String,
}

/// `GET /points_of_interest/{id}/ratings` response payload.
#[derive(Debug, Clone, Serialize)]
pub struct RatingsResponse {
    pub ratings: Vec<RatingResource>,
}
