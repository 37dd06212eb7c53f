//! Domain layer: the shared data model.
//!
//! Profiles, places, reports, ratings, derived metrics, and the time
//! helpers that define "today" for both UTC collection windows and
//! account-local nudge decisions.

pub mod confirm;
pub mod day;
pub mod help;
pub mod ids;
pub mod location;
pub mod metric;
pub mod poi;
pub mod profile;
pub mod rating;
pub mod report;
pub mod score_record;

pub use confirm::{CdsData, CdsScoreDataSet, CONFIRM_SCORE_WINDOW_SIZE};
pub use help::{HelpRequest, HelpState};
pub use ids::{HelpId, PoiId, ProfileId};
pub use location::{AddressComponent, GeoPoint, Location};
pub use metric::{
    Details, IndividualMetric, Metric, NearestSymptomData, METRIC_UPDATE_INTERVAL,
};
pub use poi::Poi;
pub use profile::{NudgeType, PoiDetail, Profile, ProfilePoi, ScoreCoefficient};
pub use rating::{PoiRatingsMetric, PoiResourceRating, ProfileRatingsMetric, RatingResource, Resource};
pub use report::{Behavior, BehaviorReport, ReportType, Symptom, SymptomReport};
pub use score_record::{Bucket, ScoreRecord, ScoreRecordType, TimeGranularity};

/// Radius in meters within which reports count as "nearby" a location.
pub const NEARBY_DISTANCE_RANGE: i64 = 5_000;

/// Radius in meters for resource-based place discovery.
pub const POI_SEARCH_RANGE: i64 = 50_000;
