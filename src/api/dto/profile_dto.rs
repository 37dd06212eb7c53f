//! Autonomy-profile endpoint DTOs.

use serde::{Deserialize, Serialize};

use crate::domain::ids::PoiId;
use crate::domain::metric::{IndividualMetric, Metric};
use crate::domain::rating::PoiResourceRating;
use crate::service::profile_service::{IndividualProfile, PlaceProfile};

/// `GET /autonomy_profile` query: exactly one of `me`, `poi_id`, or the
/// coordinate pair selects the subject.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AutonomyProfileQuery {
    #[serde(default)]
    pub me: bool,
    #[serde(default)]
    pub poi_id: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub all_resources: bool,
}

/// The requesting user's own profile payload.
#[derive(Debug, Clone, Serialize)]
pub struct IndividualProfileResponse {
    pub autonomy_score: f64,
    pub autonomy_score_delta: f64,
    pub individual: IndividualMetric,
    pub neighbor: Metric,
}

impl From<IndividualProfile> for IndividualProfileResponse {
    fn from(profile: IndividualProfile) -> Self {
        Self {
            autonomy_score: profile.autonomy_score,
            autonomy_score_delta: profile.autonomy_score_delta,
            individual: profile.individual,
            neighbor: profile.neighbor,
        }
    }
}

/// A place profile payload (saved POI or ad-hoc coordinates).
#[derive(Debug, Clone, Serialize)]
pub struct PlaceProfileResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<PoiId>,
    pub autonomy_score: f64,
    pub autonomy_score_delta: f64,
    pub neighbor: Metric,
    pub resources: Vec<PoiResourceRating>,
}

impl From<PlaceProfile> for PlaceProfileResponse {
    fn from(profile: PlaceProfile) -> Self {
        Self {
            id: profile.poi_id,
            autonomy_score: profile.autonomy_score,
            autonomy_score_delta: profile.autonomy_score_delta,
            neighbor: profile.neighbor,
            resources: profile.resources,
        }
    }
}
