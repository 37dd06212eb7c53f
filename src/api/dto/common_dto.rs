//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The canonical `{"result": "OK"}` acknowledgment.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OkResponse {
    /// Always `"OK"`.
    pub result: &'static str,
}

impl OkResponse {
    /// The acknowledgment value.
    #[must_use]
    pub const fn ok() -> Self {
        Self { result: "OK" }
    }
}

/// Language selector accepted by localized endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LangQuery {
    /// Language tag; empty means English.
    #[serde(default)]
    pub lang: String,
}

/// A `(longitude, latitude)` pair as clients submit it.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema)]
pub struct LocationDto {
    pub longitude: f64,
    pub latitude: f64,
}
