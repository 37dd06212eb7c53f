//! Database row models and their domain conversions.
//!
//! Document-shaped values (metrics, POI lists, rating aggregates) are
//! stored as JSONB so that a metric write stays one atomic column
//! update, matching the document-store semantics the queries were
//! written for.

use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::help::{HelpRequest, HelpState};
use crate::domain::ids::{HelpId, PoiId, ProfileId};
use crate::domain::location::GeoPoint;
use crate::domain::metric::{IndividualMetric, Metric};
use crate::domain::poi::Poi;
use crate::domain::profile::{Profile, ProfilePoi, ScoreCoefficient};
use crate::domain::rating::PoiRatingsMetric;

/// A `profiles` table row.
#[derive(Debug, FromRow)]
pub struct ProfileRow {
    pub id: Uuid,
    pub account_number: String,
    pub metadata: Json<serde_json::Value>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: String,
    pub score_coefficient: Option<Json<ScoreCoefficient>>,
    pub individual_metric: Json<IndividualMetric>,
    pub metric: Json<Metric>,
    pub points_of_interest: Json<Vec<ProfilePoi>>,
    pub last_nudge: Json<serde_json::Value>,
}

impl ProfileRow {
    /// Converts the row into the domain profile.
    #[must_use]
    pub fn into_profile(self) -> Profile {
        let location = match (self.longitude, self.latitude) {
            (Some(lng), Some(lat)) => Some(GeoPoint::new(lng, lat)),
            _ => None,
        };
        let last_nudge = serde_json::from_value(self.last_nudge.0).unwrap_or_default();

        Profile {
            id: ProfileId::from_uuid(self.id),
            account_number: self.account_number,
            metadata: self.metadata.0,
            location,
            timezone: self.timezone,
            score_coefficient: self.score_coefficient.map(|c| c.0),
            individual_metric: self.individual_metric.0,
            metric: self.metric.0,
            points_of_interest: self.points_of_interest.0,
            last_nudge,
        }
    }
}

/// A `poi` table row.
#[derive(Debug, FromRow)]
pub struct PoiRow {
    pub id: Uuid,
    pub longitude: f64,
    pub latitude: f64,
    pub address: String,
    pub alias: String,
    pub country: String,
    pub state: String,
    pub county: String,
    pub place_type: String,
    pub autonomy_score: f64,
    pub autonomy_score_delta: f64,
    pub metric: Json<Metric>,
    pub resource_ratings: Json<PoiRatingsMetric>,
}

impl PoiRow {
    /// Converts the row into the domain POI. Discovery-only fields
    /// (`distance`, `resource_score`) stay unset.
    #[must_use]
    pub fn into_poi(self) -> Poi {
        Poi {
            id: PoiId::from_uuid(self.id),
            location: GeoPoint::new(self.longitude, self.latitude),
            address: self.address,
            alias: self.alias,
            score: self.autonomy_score,
            score_delta: self.autonomy_score_delta,
            metric: self.metric.0,
            country: self.country,
            state: self.state,
            county: self.county,
            place_type: self.place_type,
            distance: None,
            resource_score: None,
            resource_ratings: self.resource_ratings.0,
        }
    }
}

/// A `help_requests` table row.
#[derive(Debug, FromRow)]
pub struct HelpRow {
    pub id: Uuid,
    pub requester: String,
    pub subject: String,
    pub needs: String,
    pub meeting_place: String,
    pub contact_info: String,
    pub state: String,
    pub helper: String,
    pub created_at: i64,
}

impl HelpRow {
    /// Converts the row into the domain help request.
    #[must_use]
    pub fn into_help(self) -> HelpRequest {
        let state = match self.state.as_str() {
            "RESPONDED" => HelpState::Responded,
            "EXPIRED" => HelpState::Expired,
            _ => HelpState::Pending,
        };
        HelpRequest {
            id: HelpId::from_uuid(self.id),
            requester: self.requester,
            subject: self.subject,
            needs: self.needs,
            meeting_place: self.meeting_place,
            contact_info: self.contact_info,
            state,
            helper: self.helper,
            created_at: self.created_at,
        }
    }
}
