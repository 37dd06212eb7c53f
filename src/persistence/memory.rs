//! In-memory implementation of the storage seam.
//!
//! Backs unit tests for services and workflows. Shares the geospatial
//! semantics with the PostgreSQL implementation via
//! [`Location::distance_meters`], so distance-window behavior can be
//! exercised without a database.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::confirm::CdsScoreDataSet;
use crate::domain::day::{consecutive_day_starts, utc_date_string};
use crate::domain::help::{HelpRequest, HelpState};
use crate::domain::ids::{HelpId, PoiId, ProfileId};
use crate::domain::location::{AddressComponent, GeoPoint, Location};
use crate::domain::metric::{IndividualMetric, Metric};
use crate::domain::poi::Poi;
use crate::domain::profile::{NudgeType, Profile, ProfilePoi};
use crate::domain::rating::{PoiRatingsMetric, ProfileRatingsMetric, Resource};
use crate::domain::report::{Behavior, BehaviorReport, ReportType, Symptom, SymptomReport};
use crate::domain::score_record::{Bucket, ScoreRecord, ScoreRecordType, TimeGranularity};
use crate::error::GatewayError;
use crate::score::change_rate;

use super::store::{Distribution, Store, VersionedRatings};

/// One imported confirmed-case row.
#[derive(Debug, Clone, Default)]
pub struct ConfirmRow {
    pub name: String,
    pub country: String,
    pub state: String,
    pub county: String,
    pub active: f64,
    pub report_ts: i64,
}

#[derive(Debug, Default)]
struct State {
    profiles: HashMap<String, Profile>,
    tokens: HashMap<String, String>,
    pois: HashMap<PoiId, Poi>,
    poi_resources: HashMap<PoiId, Vec<Resource>>,
    rating_versions: HashMap<PoiId, i64>,
    symptom_reports: Vec<SymptomReport>,
    behavior_reports: Vec<BehaviorReport>,
    symptoms: HashMap<String, Symptom>,
    behaviors: HashMap<String, Behavior>,
    confirm: Vec<ConfirmRow>,
    score_history: HashMap<(String, String, String), ScoreRecord>,
    helps: HashMap<HelpId, HelpRequest>,
}

/// Mutex-guarded hash-map store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds confirmed-case rows, for tests.
    pub fn seed_confirm(&self, rows: Vec<ConfirmRow>) {
        let mut state = self.lock();
        state.confirm.extend(rows);
        state.confirm.sort_by_key(|r| r.report_ts);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn within(report_location: &GeoPoint, location: &Location, distance: i64) -> bool {
    report_location.to_location().distance_meters(location) <= distance as f64
}

fn confirm_rows_for<'a>(
    rows: &'a [ConfirmRow],
    address: &AddressComponent,
) -> Vec<&'a ConfirmRow> {
    let levels: [(&str, &str, &str); 3] = [
        (&address.country, &address.state, &address.county),
        (&address.country, &address.state, ""),
        (&address.country, "", ""),
    ];
    for (country, state, county) in levels {
        if country.is_empty() {
            continue;
        }
        let matched: Vec<&ConfirmRow> = rows
            .iter()
            .filter(|r| r.country == country && r.state == state && r.county == county)
            .collect();
        if !matched.is_empty() {
            return matched;
        }
    }
    Vec::new()
}

#[async_trait]
impl Store for MemoryStore {
    // ---- profiles ------------------------------------------------------

    async fn create_profile(
        &self,
        profile: &Profile,
        api_token: &str,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        if state.profiles.contains_key(&profile.account_number) {
            return Err(GatewayError::Forbidden);
        }
        state
            .tokens
            .insert(api_token.to_string(), profile.account_number.clone());
        state
            .profiles
            .insert(profile.account_number.clone(), profile.clone());
        Ok(())
    }

    async fn get_profile(&self, account_number: &str) -> Result<Profile, GatewayError> {
        self.lock()
            .profiles
            .get(account_number)
            .cloned()
            .ok_or(GatewayError::Unauthenticated)
    }

    async fn get_profile_by_token(&self, token: &str) -> Result<Profile, GatewayError> {
        let state = self.lock();
        let account = state.tokens.get(token).ok_or(GatewayError::Unauthenticated)?;
        state
            .profiles
            .get(account)
            .cloned()
            .ok_or(GatewayError::Unauthenticated)
    }

    async fn delete_profile(&self, account_number: &str) -> Result<(), GatewayError> {
        let mut state = self.lock();
        state.profiles.remove(account_number);
        state.tokens.retain(|_, acct| acct != account_number);
        Ok(())
    }

    async fn update_profile_metadata(
        &self,
        account_number: &str,
        metadata: serde_json::Value,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        let profile = state
            .profiles
            .get_mut(account_number)
            .ok_or(GatewayError::Unauthenticated)?;
        profile.metadata = metadata;
        Ok(())
    }

    async fn update_profile_location(
        &self,
        account_number: &str,
        location: &Location,
        timezone: &str,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        let profile = state
            .profiles
            .get_mut(account_number)
            .ok_or(GatewayError::Unauthenticated)?;
        profile.location = Some(GeoPoint::from(location));
        profile.timezone = timezone.to_string();
        Ok(())
    }

    async fn update_profile_metric(
        &self,
        account_number: &str,
        metric: &Metric,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        let profile = state
            .profiles
            .get_mut(account_number)
            .ok_or(GatewayError::Unauthenticated)?;
        profile.metric = metric.clone();
        Ok(())
    }

    async fn update_profile_individual_metric(
        &self,
        profile_id: ProfileId,
        metric: &IndividualMetric,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        let profile = state
            .profiles
            .values_mut()
            .find(|p| p.id == profile_id)
            .ok_or(GatewayError::Unauthenticated)?;
        profile.individual_metric = metric.clone();
        Ok(())
    }

    async fn update_last_nudge(
        &self,
        account_number: &str,
        kind: NudgeType,
        ts: i64,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        let profile = state
            .profiles
            .get_mut(account_number)
            .ok_or(GatewayError::Unauthenticated)?;
        profile.last_nudge.insert(kind, ts);
        Ok(())
    }

    async fn get_profiles_by_poi(&self, poi_id: PoiId) -> Result<Vec<Profile>, GatewayError> {
        Ok(self
            .lock()
            .profiles
            .values()
            .filter(|p| p.poi(poi_id).is_some())
            .cloned()
            .collect())
    }

    // ---- profile POI list ---------------------------------------------

    async fn append_poi_to_profile(
        &self,
        account_number: &str,
        poi: &ProfilePoi,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        let profile = state
            .profiles
            .get_mut(account_number)
            .ok_or(GatewayError::Unauthenticated)?;
        if let Some(existing) = profile
            .points_of_interest
            .iter_mut()
            .find(|p| p.id == poi.id)
        {
            existing.monitored = true;
            existing.alias = poi.alias.clone();
            existing.address = poi.address.clone();
            existing.updated_at = poi.updated_at;
        } else {
            profile.points_of_interest.push(poi.clone());
        }
        Ok(())
    }

    async fn update_profile_poi_alias(
        &self,
        account_number: &str,
        poi_id: PoiId,
        alias: &str,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        let profile = state
            .profiles
            .get_mut(account_number)
            .ok_or(GatewayError::Unauthenticated)?;
        let entry = profile
            .points_of_interest
            .iter_mut()
            .find(|p| p.id == poi_id)
            .ok_or(GatewayError::UnknownPoi)?;
        entry.alias = alias.to_string();
        Ok(())
    }

    async fn update_profile_poi_order(
        &self,
        account_number: &str,
        order: &[PoiId],
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        let profile = state
            .profiles
            .get_mut(account_number)
            .ok_or(GatewayError::Unauthenticated)?;
        let list = &mut profile.points_of_interest;
        if list.is_empty() {
            return Err(GatewayError::PoiListNotFound);
        }
        for id in order {
            if !list.iter().any(|p| p.id == *id) {
                return Err(GatewayError::PoiListMismatch);
            }
        }
        list.sort_by_key(|p| order.iter().position(|id| *id == p.id).unwrap_or(usize::MAX));
        Ok(())
    }

    async fn unmonitor_profile_poi(
        &self,
        account_number: &str,
        poi_id: PoiId,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        let profile = state
            .profiles
            .get_mut(account_number)
            .ok_or(GatewayError::Unauthenticated)?;
        if let Some(entry) = profile
            .points_of_interest
            .iter_mut()
            .find(|p| p.id == poi_id)
        {
            entry.monitored = false;
        }
        Ok(())
    }

    async fn update_profile_poi_metric(
        &self,
        account_number: &str,
        poi_id: PoiId,
        metric: &Metric,
        score: f64,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        let profile = state
            .profiles
            .get_mut(account_number)
            .ok_or(GatewayError::Unauthenticated)?;
        let entry = profile
            .points_of_interest
            .iter_mut()
            .find(|p| p.id == poi_id)
            .ok_or(GatewayError::UnknownPoi)?;
        entry.metric = metric.clone();
        entry.score = score;
        Ok(())
    }

    async fn update_profile_poi_rating(
        &self,
        account_number: &str,
        poi_id: PoiId,
        ratings: &ProfileRatingsMetric,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        let profile = state
            .profiles
            .get_mut(account_number)
            .ok_or(GatewayError::Unauthenticated)?;
        let entry = profile
            .points_of_interest
            .iter_mut()
            .find(|p| p.id == poi_id)
            .ok_or(GatewayError::UnknownPoi)?;
        for rating in &ratings.resources {
            match entry
                .resource_ratings
                .resources
                .iter_mut()
                .find(|r| r.resource.id == rating.resource.id)
            {
                Some(existing) => *existing = rating.clone(),
                None => entry.resource_ratings.resources.push(rating.clone()),
            }
        }
        entry.resource_ratings.last_update = ratings.last_update;
        Ok(())
    }

    async fn get_profile_poi_rating(
        &self,
        account_number: &str,
        poi_id: PoiId,
    ) -> Result<ProfileRatingsMetric, GatewayError> {
        let state = self.lock();
        let profile = state
            .profiles
            .get(account_number)
            .ok_or(GatewayError::Unauthenticated)?;
        let entry = profile.poi(poi_id).ok_or(GatewayError::UnknownPoi)?;
        Ok(entry.resource_ratings.clone())
    }

    // ---- POI -----------------------------------------------------------

    async fn insert_poi(&self, poi: &Poi) -> Result<(), GatewayError> {
        let mut state = self.lock();
        state.pois.insert(poi.id, poi.clone());
        state.rating_versions.insert(poi.id, 0);
        Ok(())
    }

    async fn get_poi(&self, poi_id: PoiId) -> Result<Poi, GatewayError> {
        self.lock()
            .pois
            .get(&poi_id)
            .cloned()
            .ok_or(GatewayError::UnknownPoi)
    }

    async fn get_poi_by_coordinates(
        &self,
        location: &Location,
    ) -> Result<Option<Poi>, GatewayError> {
        Ok(self
            .lock()
            .pois
            .values()
            .find(|p| {
                p.location.coordinates[0] == location.longitude
                    && p.location.coordinates[1] == location.latitude
            })
            .cloned())
    }

    async fn backfill_poi_names(
        &self,
        poi_id: PoiId,
        alias: &str,
        address: &str,
    ) -> Result<bool, GatewayError> {
        let mut state = self.lock();
        let poi = state.pois.get_mut(&poi_id).ok_or(GatewayError::UnknownPoi)?;
        if poi.alias.is_empty() || poi.address.is_empty() {
            poi.alias = alias.to_string();
            poi.address = address.to_string();
            return Ok(true);
        }
        Ok(false)
    }

    async fn update_poi_geo_info(
        &self,
        poi_id: PoiId,
        address: &AddressComponent,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        let poi = state.pois.get_mut(&poi_id).ok_or(GatewayError::UnknownPoi)?;
        poi.country = address.country.clone();
        poi.state = address.state.clone();
        poi.county = address.county.clone();
        Ok(())
    }

    async fn update_poi_metric(
        &self,
        poi_id: PoiId,
        metric: &Metric,
        score: f64,
        score_delta: f64,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        let poi = state.pois.get_mut(&poi_id).ok_or(GatewayError::UnknownPoi)?;
        poi.metric = metric.clone();
        poi.score = score;
        poi.score_delta = score_delta;
        Ok(())
    }

    async fn nearest_poi_ids(
        &self,
        distance: i64,
        location: &Location,
    ) -> Result<Vec<PoiId>, GatewayError> {
        Ok(self
            .lock()
            .pois
            .values()
            .filter(|p| within(&p.location, location, distance))
            .map(|p| p.id)
            .collect())
    }

    async fn list_poi_by_resource(
        &self,
        resource_id: &str,
        location: &Location,
    ) -> Result<Vec<Poi>, GatewayError> {
        let state = self.lock();
        let mut pois: Vec<Poi> = state
            .pois
            .values()
            .filter(|p| within(&p.location, location, crate::domain::POI_SEARCH_RANGE))
            .filter_map(|p| {
                let rating = p
                    .resource_ratings
                    .get(resource_id)
                    .filter(|r| r.ratings > 0)?;
                let mut poi = p.clone();
                poi.distance =
                    Some(p.location.to_location().distance_meters(location) / 1000.0);
                poi.resource_score = Some(rating.score);
                Some(poi)
            })
            .collect();
        pois.sort_by(|a, b| {
            b.resource_score
                .partial_cmp(&a.resource_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(pois)
    }

    async fn list_poi_by_text(
        &self,
        text: &str,
        location: &Location,
    ) -> Result<Vec<Poi>, GatewayError> {
        let needle = text.to_lowercase();
        let state = self.lock();
        let mut pois: Vec<Poi> = state
            .pois
            .values()
            .filter(|p| within(&p.location, location, crate::domain::POI_SEARCH_RANGE))
            .filter(|p| {
                p.alias.to_lowercase().contains(&needle)
                    || p.address.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        for poi in &mut pois {
            poi.distance = Some(poi.location.to_location().distance_meters(location) / 1000.0);
        }
        pois.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(pois)
    }

    async fn list_poi_by_place_type(
        &self,
        place_type: &str,
        location: &Location,
    ) -> Result<Vec<Poi>, GatewayError> {
        let state = self.lock();
        let mut pois: Vec<Poi> = state
            .pois
            .values()
            .filter(|p| within(&p.location, location, crate::domain::POI_SEARCH_RANGE))
            .filter(|p| p.place_type == place_type)
            .cloned()
            .collect();
        for poi in &mut pois {
            poi.distance = Some(poi.location.to_location().distance_meters(location) / 1000.0);
        }
        pois.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(pois)
    }

    async fn get_poi_resources(&self, poi_id: PoiId) -> Result<Vec<Resource>, GatewayError> {
        let state = self.lock();
        if !state.pois.contains_key(&poi_id) {
            return Err(GatewayError::UnknownPoi);
        }
        Ok(state.poi_resources.get(&poi_id).cloned().unwrap_or_default())
    }

    async fn add_poi_resources(
        &self,
        poi_id: PoiId,
        resources: &[Resource],
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        if !state.pois.contains_key(&poi_id) {
            return Err(GatewayError::UnknownPoi);
        }
        let existing = state.poi_resources.entry(poi_id).or_default();
        for resource in resources {
            if !existing.iter().any(|r| r.id == resource.id) {
                existing.push(resource.clone());
            }
        }
        Ok(())
    }

    async fn get_poi_ratings(&self, poi_id: PoiId) -> Result<VersionedRatings, GatewayError> {
        let state = self.lock();
        let poi = state.pois.get(&poi_id).ok_or(GatewayError::UnknownPoi)?;
        Ok(VersionedRatings {
            metric: poi.resource_ratings.clone(),
            version: state.rating_versions.get(&poi_id).copied().unwrap_or(0),
        })
    }

    async fn write_poi_ratings(
        &self,
        poi_id: PoiId,
        metric: &PoiRatingsMetric,
        expected_version: i64,
    ) -> Result<bool, GatewayError> {
        let mut state = self.lock();
        let current = state.rating_versions.get(&poi_id).copied().unwrap_or(0);
        if current != expected_version {
            return Ok(false);
        }
        let poi = state.pois.get_mut(&poi_id).ok_or(GatewayError::UnknownPoi)?;
        poi.resource_ratings = metric.clone();
        state.rating_versions.insert(poi_id, current + 1);
        Ok(true)
    }

    // ---- reports -------------------------------------------------------

    async fn save_symptom_report(&self, report: &SymptomReport) -> Result<(), GatewayError> {
        let mut state = self.lock();
        // duplicate (profile_id, ts) inserts are coalesced
        if !state
            .symptom_reports
            .iter()
            .any(|r| r.profile_id == report.profile_id && r.ts == report.ts)
        {
            state.symptom_reports.push(report.clone());
        }
        Ok(())
    }

    async fn save_behavior_report(&self, report: &BehaviorReport) -> Result<(), GatewayError> {
        let mut state = self.lock();
        if !state
            .behavior_reports
            .iter()
            .any(|r| r.profile_id == report.profile_id && r.ts == report.ts)
        {
            state.behavior_reports.push(report.clone());
        }
        Ok(())
    }

    async fn find_symptom_distribution(
        &self,
        profile_id: Option<&str>,
        location: Option<&Location>,
        distance: i64,
        start: i64,
        end: i64,
        distinct: bool,
    ) -> Result<Distribution, GatewayError> {
        let state = self.lock();
        let mut counts: Distribution = HashMap::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();

        for report in &state.symptom_reports {
            let matched = match (profile_id, location) {
                (Some(pid), _) => report.profile_id == pid,
                (None, Some(loc)) => within(&report.location, loc, distance),
                (None, None) => return Err(GatewayError::InvalidParameters),
            };
            if !matched || report.ts < start || report.ts >= end {
                continue;
            }
            for entry in report
                .official_symptoms
                .iter()
                .chain(report.customized_symptoms.iter())
            {
                if distinct
                    && !seen.insert((report.profile_id.clone(), entry.id.clone()))
                {
                    continue;
                }
                *counts.entry(entry.id.clone()).or_default() += 1;
            }
        }
        Ok(counts)
    }

    async fn find_behavior_distribution(
        &self,
        profile_id: Option<&str>,
        location: Option<&Location>,
        distance: i64,
        start: i64,
        end: i64,
    ) -> Result<Distribution, GatewayError> {
        let state = self.lock();
        let mut counts: Distribution = HashMap::new();

        for report in &state.behavior_reports {
            let matched = match (profile_id, location) {
                (Some(pid), _) => report.profile_id == pid,
                (None, Some(loc)) => within(&report.location, loc, distance),
                (None, None) => return Err(GatewayError::InvalidParameters),
            };
            if !matched || report.ts < start || report.ts >= end {
                continue;
            }
            for entry in report
                .official_behaviors
                .iter()
                .chain(report.customized_behaviors.iter())
            {
                *counts.entry(entry.id.clone()).or_default() += 1;
            }
        }
        Ok(counts)
    }

    async fn find_nearby_behavior_report_times(
        &self,
        distance: i64,
        location: &Location,
        start: i64,
        end: i64,
    ) -> Result<i64, GatewayError> {
        Ok(self
            .lock()
            .behavior_reports
            .iter()
            .filter(|r| r.ts >= start && r.ts < end && within(&r.location, location, distance))
            .count() as i64)
    }

    async fn get_nearby_reporting_user_count(
        &self,
        report_type: ReportType,
        distance: i64,
        location: &Location,
        now: DateTime<Utc>,
    ) -> Result<(i64, i64), GatewayError> {
        let (yesterday_start, today_start, tomorrow_start) = consecutive_day_starts(now);
        let state = self.lock();

        let count = |start: i64, end: i64| -> i64 {
            let users: HashSet<&str> = match report_type {
                ReportType::Symptom => state
                    .symptom_reports
                    .iter()
                    .filter(|r| {
                        r.ts >= start && r.ts < end && within(&r.location, location, distance)
                    })
                    .map(|r| r.profile_id.as_str())
                    .collect(),
                ReportType::Behavior => state
                    .behavior_reports
                    .iter()
                    .filter(|r| {
                        r.ts >= start && r.ts < end && within(&r.location, location, distance)
                    })
                    .map(|r| r.profile_id.as_str())
                    .collect(),
            };
            users.len() as i64
        };

        Ok((
            count(today_start, tomorrow_start),
            count(yesterday_start, today_start),
        ))
    }

    async fn get_symptom_count(
        &self,
        profile_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(i64, i64), GatewayError> {
        let (yesterday_start, today_start, tomorrow_start) = consecutive_day_starts(now);
        let state = self.lock();

        let count = |start: i64, end: i64| -> i64 {
            let mut distinct: HashSet<String> = HashSet::new();
            for report in state
                .symptom_reports
                .iter()
                .filter(|r| r.profile_id == profile_id && r.ts >= start && r.ts < end)
            {
                for entry in report
                    .official_symptoms
                    .iter()
                    .chain(report.customized_symptoms.iter())
                {
                    distinct.insert(entry.id.clone());
                }
            }
            distinct.len() as i64
        };

        Ok((
            count(today_start, tomorrow_start),
            count(yesterday_start, today_start),
        ))
    }

    async fn get_behavior_count(
        &self,
        profile_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(i64, i64), GatewayError> {
        let (yesterday_start, today_start, tomorrow_start) = consecutive_day_starts(now);
        let state = self.lock();

        let count = |start: i64, end: i64| -> i64 {
            let mut distinct: HashSet<String> = HashSet::new();
            for report in state
                .behavior_reports
                .iter()
                .filter(|r| r.profile_id == profile_id && r.ts >= start && r.ts < end)
            {
                for entry in report
                    .official_behaviors
                    .iter()
                    .chain(report.customized_behaviors.iter())
                {
                    distinct.insert(entry.id.clone());
                }
            }
            distinct.len() as i64
        };

        Ok((
            count(today_start, tomorrow_start),
            count(yesterday_start, today_start),
        ))
    }

    async fn get_personal_symptom_time_series(
        &self,
        profile_id: &str,
        start: i64,
        end: i64,
        utc_offset_secs: i32,
        granularity: TimeGranularity,
    ) -> Result<HashMap<String, Vec<Bucket>>, GatewayError> {
        let state = self.lock();
        let mut deduped: HashSet<(String, String)> = HashSet::new();
        for report in state
            .symptom_reports
            .iter()
            .filter(|r| r.profile_id == profile_id && r.ts >= start && r.ts < end)
        {
            let day = utc_date_string(report.ts + i64::from(utc_offset_secs));
            for entry in report
                .official_symptoms
                .iter()
                .chain(report.customized_symptoms.iter())
            {
                deduped.insert((entry.id.clone(), day.clone()));
            }
        }
        Ok(bucketize(deduped, granularity))
    }

    async fn get_personal_behavior_time_series(
        &self,
        profile_id: &str,
        start: i64,
        end: i64,
        utc_offset_secs: i32,
        granularity: TimeGranularity,
    ) -> Result<HashMap<String, Vec<Bucket>>, GatewayError> {
        let state = self.lock();
        let mut deduped: HashSet<(String, String)> = HashSet::new();
        for report in state
            .behavior_reports
            .iter()
            .filter(|r| r.profile_id == profile_id && r.ts >= start && r.ts < end)
        {
            let day = utc_date_string(report.ts + i64::from(utc_offset_secs));
            for entry in report
                .official_behaviors
                .iter()
                .chain(report.customized_behaviors.iter())
            {
                deduped.insert((entry.id.clone(), day.clone()));
            }
        }
        Ok(bucketize(deduped, granularity))
    }

    // ---- catalogs ------------------------------------------------------

    async fn create_symptom(&self, symptom: &Symptom) -> Result<String, GatewayError> {
        let mut state = self.lock();
        state
            .symptoms
            .entry(symptom.id.clone())
            .or_insert_with(|| symptom.clone());
        Ok(symptom.id.clone())
    }

    async fn create_behavior(&self, behavior: &Behavior) -> Result<String, GatewayError> {
        let mut state = self.lock();
        state
            .behaviors
            .entry(behavior.id.clone())
            .or_insert_with(|| behavior.clone());
        Ok(behavior.id.clone())
    }

    async fn find_symptoms_by_ids(&self, ids: &[String]) -> Result<Vec<Symptom>, GatewayError> {
        let state = self.lock();
        let mut found: Vec<Symptom> = ids
            .iter()
            .filter_map(|id| state.symptoms.get(id).cloned())
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn find_behaviors_by_ids(&self, ids: &[String]) -> Result<Vec<Behavior>, GatewayError> {
        let state = self.lock();
        let mut found: Vec<Behavior> = ids
            .iter()
            .filter_map(|id| state.behaviors.get(id).cloned())
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    // ---- confirmed cases ----------------------------------------------

    async fn get_cds_active(
        &self,
        location: &Location,
        ts: i64,
    ) -> Result<Option<(f64, f64, f64)>, GatewayError> {
        let state = self.lock();
        let mut rows = confirm_rows_for(&state.confirm, &location.address);
        rows.retain(|r| r.report_ts <= ts);
        rows.sort_by_key(|r| std::cmp::Reverse(r.report_ts));

        let Some(latest) = rows.first() else {
            return Ok(None);
        };
        let previous = rows.get(1).map_or(0.0, |r| r.active);
        Ok(Some((
            latest.active,
            latest.active - previous,
            change_rate(latest.active, previous),
        )))
    }

    async fn get_confirm_series(
        &self,
        location: &Location,
        window: usize,
    ) -> Result<Vec<CdsScoreDataSet>, GatewayError> {
        let state = self.lock();
        let mut rows = confirm_rows_for(&state.confirm, &location.address);
        rows.sort_by_key(|r| std::cmp::Reverse(r.report_ts));
        rows.truncate(window);
        rows.reverse();
        Ok(rows
            .into_iter()
            .map(|r| CdsScoreDataSet {
                name: r.name.clone(),
                cases: r.active,
            })
            .collect())
    }

    // ---- score history -------------------------------------------------

    async fn add_score_record(
        &self,
        owner: &str,
        record_type: ScoreRecordType,
        score: f64,
        ts: i64,
    ) -> Result<(), GatewayError> {
        let date = utc_date_string(ts);
        let key = (
            owner.to_string(),
            record_type.as_str().to_string(),
            date.clone(),
        );
        let mut state = self.lock();
        let record = state.score_history.entry(key).or_insert(ScoreRecord {
            owner: owner.to_string(),
            record_type,
            date,
            score: 0.0,
            update_times: 0.0,
        });
        record.score = record.fold(score);
        record.update_times += 1.0;
        Ok(())
    }

    async fn get_score_record(
        &self,
        owner: &str,
        record_type: ScoreRecordType,
        date: &str,
    ) -> Result<Option<ScoreRecord>, GatewayError> {
        Ok(self
            .lock()
            .score_history
            .get(&(
                owner.to_string(),
                record_type.as_str().to_string(),
                date.to_string(),
            ))
            .cloned())
    }

    async fn get_score_average(
        &self,
        owner: &str,
        start: i64,
        end: i64,
    ) -> Result<f64, GatewayError> {
        let start_date = utc_date_string(start);
        let end_date = utc_date_string(end);
        let state = self.lock();
        let scores: Vec<f64> = state
            .score_history
            .values()
            .filter(|r| r.owner == owner && r.date >= start_date && r.date <= end_date)
            .map(|r| r.score)
            .collect();
        if scores.is_empty() {
            return Ok(0.0);
        }
        Ok(scores.iter().sum::<f64>() / scores.len() as f64)
    }

    async fn get_score_time_series(
        &self,
        owner: &str,
        start: i64,
        end: i64,
        granularity: TimeGranularity,
    ) -> Result<Vec<Bucket>, GatewayError> {
        let start_date = utc_date_string(start);
        let end_date = utc_date_string(end);
        let state = self.lock();

        let mut grouped: HashMap<String, Vec<f64>> = HashMap::new();
        for record in state
            .score_history
            .values()
            .filter(|r| r.owner == owner && r.date >= start_date && r.date <= end_date)
        {
            let prefix = record
                .date
                .chars()
                .take(granularity.date_prefix_len())
                .collect::<String>();
            grouped.entry(prefix).or_default().push(record.score);
        }

        let mut buckets: Vec<Bucket> = grouped
            .into_iter()
            .map(|(name, scores)| Bucket {
                name,
                value: (scores.iter().sum::<f64>() / scores.len() as f64).floor() as i64,
            })
            .collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    // ---- help requests -------------------------------------------------

    async fn create_help(&self, help: &HelpRequest) -> Result<(), GatewayError> {
        self.lock().helps.insert(help.id, help.clone());
        Ok(())
    }

    async fn list_helps(&self, count: i64) -> Result<Vec<HelpRequest>, GatewayError> {
        let state = self.lock();
        let mut helps: Vec<HelpRequest> = state
            .helps
            .values()
            .filter(|h| h.state == HelpState::Pending)
            .cloned()
            .collect();
        helps.sort_by_key(|h| h.created_at);
        helps.truncate(count as usize);
        Ok(helps)
    }

    async fn get_help(&self, id: HelpId) -> Result<Option<HelpRequest>, GatewayError> {
        Ok(self.lock().helps.get(&id).cloned())
    }

    async fn answer_help(&self, helper: &str, id: HelpId) -> Result<HelpRequest, GatewayError> {
        let mut state = self.lock();
        let help = state
            .helps
            .get_mut(&id)
            .ok_or(GatewayError::InvalidParameters)?;
        if help.state != HelpState::Pending || help.requester == helper {
            return Err(GatewayError::Forbidden);
        }
        help.state = HelpState::Responded;
        help.helper = helper.to_string();
        Ok(help.clone())
    }
}

fn bucketize(
    deduped: HashSet<(String, String)>,
    granularity: TimeGranularity,
) -> HashMap<String, Vec<Bucket>> {
    let mut grouped: HashMap<(String, String), i64> = HashMap::new();
    for (id, day) in deduped {
        let prefix = day
            .chars()
            .take(granularity.date_prefix_len())
            .collect::<String>();
        *grouped.entry((id, prefix)).or_default() += 1;
    }

    let mut series: HashMap<String, Vec<Bucket>> = HashMap::new();
    for ((id, bucket), value) in grouped {
        series.entry(id).or_default().push(Bucket {
            name: bucket,
            value,
        });
    }
    for buckets in series.values_mut() {
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
    }
    series
}
