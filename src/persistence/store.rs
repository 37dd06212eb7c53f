//! The storage seam.
//!
//! [`Store`] collapses the per-collection query surface into one async
//! trait so services and workflows stay testable against the in-memory
//! implementation. The PostgreSQL implementation is the production one;
//! both must agree on the geospatial semantics: spherical distance with
//! `max_distance` in meters, half-open timestamp ranges `[start, end)`,
//! and per-user deduplication where a query says "distinct".

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::confirm::CdsScoreDataSet;
use crate::domain::help::HelpRequest;
use crate::domain::ids::{HelpId, PoiId, ProfileId};
use crate::domain::location::{AddressComponent, Location};
use crate::domain::metric::{IndividualMetric, Metric};
use crate::domain::poi::Poi;
use crate::domain::profile::{NudgeType, Profile, ProfilePoi};
use crate::domain::rating::{PoiRatingsMetric, ProfileRatingsMetric, Resource};
use crate::domain::report::{Behavior, BehaviorReport, ReportType, Symptom, SymptomReport};
use crate::domain::score_record::{Bucket, ScoreRecord, ScoreRecordType, TimeGranularity};
use crate::error::GatewayError;

/// `symptom_id → distinct reporter count` (or plain occurrence count for
/// non-distinct queries).
pub type Distribution = HashMap<String, i64>;

/// Versioned snapshot of a POI's rating aggregates, for the optimistic
/// compare-and-swap update cycle.
#[derive(Debug, Clone)]
pub struct VersionedRatings {
    pub metric: PoiRatingsMetric,
    pub version: i64,
}

/// Unified storage interface.
#[async_trait]
pub trait Store: Send + Sync {
    // ---- profiles ------------------------------------------------------

    /// Inserts a new profile. The API token authenticates future calls.
    async fn create_profile(&self, profile: &Profile, api_token: &str)
        -> Result<(), GatewayError>;

    async fn get_profile(&self, account_number: &str) -> Result<Profile, GatewayError>;

    /// Resolves the bearer token presented by a client.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Unauthenticated`] when the token is unknown.
    async fn get_profile_by_token(&self, token: &str) -> Result<Profile, GatewayError>;

    async fn delete_profile(&self, account_number: &str) -> Result<(), GatewayError>;

    async fn update_profile_metadata(
        &self,
        account_number: &str,
        metadata: serde_json::Value,
    ) -> Result<(), GatewayError>;

    /// Records the account's current location and timezone.
    async fn update_profile_location(
        &self,
        account_number: &str,
        location: &Location,
        timezone: &str,
    ) -> Result<(), GatewayError>;

    /// Atomically replaces the profile's neighborhood metric.
    async fn update_profile_metric(
        &self,
        account_number: &str,
        metric: &Metric,
    ) -> Result<(), GatewayError>;

    async fn update_profile_individual_metric(
        &self,
        profile_id: ProfileId,
        metric: &IndividualMetric,
    ) -> Result<(), GatewayError>;

    async fn update_last_nudge(
        &self,
        account_number: &str,
        kind: NudgeType,
        ts: i64,
    ) -> Result<(), GatewayError>;

    /// Profiles monitoring the given POI.
    async fn get_profiles_by_poi(&self, poi_id: PoiId) -> Result<Vec<Profile>, GatewayError>;

    // ---- profile POI list ---------------------------------------------

    /// Appends a subscription, or re-monitors an existing one in place.
    async fn append_poi_to_profile(
        &self,
        account_number: &str,
        poi: &ProfilePoi,
    ) -> Result<(), GatewayError>;

    async fn update_profile_poi_alias(
        &self,
        account_number: &str,
        poi_id: PoiId,
        alias: &str,
    ) -> Result<(), GatewayError>;

    /// Reorders the subscription list to match `order`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::PoiListNotFound`] when the profile has no list;
    /// [`GatewayError::PoiListMismatch`] when `order` names POIs outside
    /// the stored set.
    async fn update_profile_poi_order(
        &self,
        account_number: &str,
        order: &[PoiId],
    ) -> Result<(), GatewayError>;

    /// Per-user un-monitoring; the shared POI document is never deleted.
    async fn unmonitor_profile_poi(
        &self,
        account_number: &str,
        poi_id: PoiId,
    ) -> Result<(), GatewayError>;

    /// Updates the metric snapshot embedded in one subscription.
    async fn update_profile_poi_metric(
        &self,
        account_number: &str,
        poi_id: PoiId,
        metric: &Metric,
        score: f64,
    ) -> Result<(), GatewayError>;

    async fn update_profile_poi_rating(
        &self,
        account_number: &str,
        poi_id: PoiId,
        ratings: &ProfileRatingsMetric,
    ) -> Result<(), GatewayError>;

    async fn get_profile_poi_rating(
        &self,
        account_number: &str,
        poi_id: PoiId,
    ) -> Result<ProfileRatingsMetric, GatewayError>;

    // ---- POI -----------------------------------------------------------

    /// Inserts a POI document. Coordinates are unique; callers look up
    /// first via [`Store::get_poi_by_coordinates`].
    async fn insert_poi(&self, poi: &Poi) -> Result<(), GatewayError>;

    async fn get_poi(&self, poi_id: PoiId) -> Result<Poi, GatewayError>;

    async fn get_poi_by_coordinates(
        &self,
        location: &Location,
    ) -> Result<Option<Poi>, GatewayError>;

    /// Fills empty alias/address fields; returns whether a write happened.
    async fn backfill_poi_names(
        &self,
        poi_id: PoiId,
        alias: &str,
        address: &str,
    ) -> Result<bool, GatewayError>;

    /// Stores lazily-resolved political address components.
    async fn update_poi_geo_info(
        &self,
        poi_id: PoiId,
        address: &AddressComponent,
    ) -> Result<(), GatewayError>;

    /// Atomically replaces the POI's metric and composite score.
    async fn update_poi_metric(
        &self,
        poi_id: PoiId,
        metric: &Metric,
        score: f64,
        score_delta: f64,
    ) -> Result<(), GatewayError>;

    /// Ids of POIs within `distance` meters of a location.
    async fn nearest_poi_ids(
        &self,
        distance: i64,
        location: &Location,
    ) -> Result<Vec<PoiId>, GatewayError>;

    /// Places rated for `resource_id` within the search radius, with
    /// `distance` (km) and `resource_score` filled, ordered by resource
    /// score descending.
    async fn list_poi_by_resource(
        &self,
        resource_id: &str,
        location: &Location,
    ) -> Result<Vec<Poi>, GatewayError>;

    /// Places whose alias or address matches `text` within the search
    /// radius.
    async fn list_poi_by_text(
        &self,
        text: &str,
        location: &Location,
    ) -> Result<Vec<Poi>, GatewayError>;

    /// Places of a given type within the search radius.
    async fn list_poi_by_place_type(
        &self,
        place_type: &str,
        location: &Location,
    ) -> Result<Vec<Poi>, GatewayError>;

    /// The rate-able resources attached to a POI (official + customized
    /// added over time; the set grows monotonically).
    async fn get_poi_resources(&self, poi_id: PoiId) -> Result<Vec<Resource>, GatewayError>;

    async fn add_poi_resources(
        &self,
        poi_id: PoiId,
        resources: &[Resource],
    ) -> Result<(), GatewayError>;

    /// Reads the rating aggregates together with their CAS version.
    async fn get_poi_ratings(&self, poi_id: PoiId) -> Result<VersionedRatings, GatewayError>;

    /// Writes the aggregates when the version still matches; returns
    /// `false` on conflict so the caller can re-read and retry.
    async fn write_poi_ratings(
        &self,
        poi_id: PoiId,
        metric: &PoiRatingsMetric,
        expected_version: i64,
    ) -> Result<bool, GatewayError>;

    // ---- reports -------------------------------------------------------

    /// Appends a symptom report. Duplicate `(profile_id, ts)` inserts are
    /// coalesced silently.
    async fn save_symptom_report(&self, report: &SymptomReport) -> Result<(), GatewayError>;

    async fn save_behavior_report(&self, report: &BehaviorReport) -> Result<(), GatewayError>;

    /// Per-symptom counts for reports matching either a profile or a
    /// location radius, over `[start, end)`. With `distinct`, each user
    /// contributes at most one occurrence of a given symptom.
    async fn find_symptom_distribution(
        &self,
        profile_id: Option<&str>,
        location: Option<&Location>,
        distance: i64,
        start: i64,
        end: i64,
        distinct: bool,
    ) -> Result<Distribution, GatewayError>;

    async fn find_behavior_distribution(
        &self,
        profile_id: Option<&str>,
        location: Option<&Location>,
        distance: i64,
        start: i64,
        end: i64,
    ) -> Result<Distribution, GatewayError>;

    /// Number of behavior reports near a location over `[start, end)`.
    async fn find_nearby_behavior_report_times(
        &self,
        distance: i64,
        location: &Location,
        start: i64,
        end: i64,
    ) -> Result<i64, GatewayError>;

    /// Distinct users who reported near a location `(today, yesterday)`
    /// relative to `now`.
    async fn get_nearby_reporting_user_count(
        &self,
        report_type: ReportType,
        distance: i64,
        location: &Location,
        now: DateTime<Utc>,
    ) -> Result<(i64, i64), GatewayError>;

    /// A profile's own symptom counts `(today, yesterday)`, duplicates
    /// within a day counted once.
    async fn get_symptom_count(
        &self,
        profile_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(i64, i64), GatewayError>;

    async fn get_behavior_count(
        &self,
        profile_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(i64, i64), GatewayError>;

    /// Per-symptom time buckets for one profile; duplicates within a day
    /// count once, `utc_offset_secs` shifts the day boundary.
    async fn get_personal_symptom_time_series(
        &self,
        profile_id: &str,
        start: i64,
        end: i64,
        utc_offset_secs: i32,
        granularity: TimeGranularity,
    ) -> Result<HashMap<String, Vec<Bucket>>, GatewayError>;

    async fn get_personal_behavior_time_series(
        &self,
        profile_id: &str,
        start: i64,
        end: i64,
        utc_offset_secs: i32,
        granularity: TimeGranularity,
    ) -> Result<HashMap<String, Vec<Bucket>>, GatewayError>;

    // ---- catalogs ------------------------------------------------------

    /// Persists a customized symptom; duplicate ids are coalesced.
    async fn create_symptom(&self, symptom: &Symptom) -> Result<String, GatewayError>;

    async fn create_behavior(&self, behavior: &Behavior) -> Result<String, GatewayError>;

    async fn find_symptoms_by_ids(&self, ids: &[String]) -> Result<Vec<Symptom>, GatewayError>;

    async fn find_behaviors_by_ids(&self, ids: &[String]) -> Result<Vec<Behavior>, GatewayError>;

    // ---- confirmed cases ----------------------------------------------

    /// Active-case count and day-over-day delta for the narrowest region
    /// enclosing `location`, as of `ts`. `None` when the country has no
    /// imported dataset.
    async fn get_cds_active(
        &self,
        location: &Location,
        ts: i64,
    ) -> Result<Option<(f64, f64, f64)>, GatewayError>;

    /// The most recent `window` days of active cases for the region,
    /// oldest first. Empty when no dataset exists.
    async fn get_confirm_series(
        &self,
        location: &Location,
        window: usize,
    ) -> Result<Vec<CdsScoreDataSet>, GatewayError>;

    // ---- score history -------------------------------------------------

    /// Running-average upsert keyed by `(owner, type, date)`.
    async fn add_score_record(
        &self,
        owner: &str,
        record_type: ScoreRecordType,
        score: f64,
        ts: i64,
    ) -> Result<(), GatewayError>;

    async fn get_score_record(
        &self,
        owner: &str,
        record_type: ScoreRecordType,
        date: &str,
    ) -> Result<Option<ScoreRecord>, GatewayError>;

    async fn get_score_average(
        &self,
        owner: &str,
        start: i64,
        end: i64,
    ) -> Result<f64, GatewayError>;

    async fn get_score_time_series(
        &self,
        owner: &str,
        start: i64,
        end: i64,
        granularity: TimeGranularity,
    ) -> Result<Vec<Bucket>, GatewayError>;

    // ---- help requests -------------------------------------------------

    async fn create_help(&self, help: &HelpRequest) -> Result<(), GatewayError>;

    async fn list_helps(&self, count: i64) -> Result<Vec<HelpRequest>, GatewayError>;

    async fn get_help(&self, id: HelpId) -> Result<Option<HelpRequest>, GatewayError>;

    /// Marks a pending request as responded by `helper`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Forbidden`] when the request is not pending or the
    /// helper is the requester.
    async fn answer_help(&self, helper: &str, id: HelpId) -> Result<HelpRequest, GatewayError>;
}
