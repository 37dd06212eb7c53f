//! PostgreSQL implementation of the storage seam.
//!
//! Geospatial queries use a haversine predicate over plain
//! latitude/longitude columns with `max_distance` in meters; document
//! values (metrics, POI lists, rating aggregates) live in JSONB columns
//! so each metric write is one atomic column update.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::confirm::CdsScoreDataSet;
use crate::domain::day::{consecutive_day_starts, utc_date_string};
use crate::domain::help::{HelpRequest, HelpState};
use crate::domain::ids::{HelpId, PoiId, ProfileId};
use crate::domain::location::{AddressComponent, Location};
use crate::domain::metric::{IndividualMetric, Metric};
use crate::domain::poi::Poi;
use crate::domain::profile::{NudgeType, Profile, ProfilePoi};
use crate::domain::rating::{PoiRatingsMetric, ProfileRatingsMetric, Resource};
use crate::domain::report::{Behavior, BehaviorReport, ReportType, Symptom, SymptomReport};
use crate::domain::score_record::{Bucket, ScoreRecord, ScoreRecordType, TimeGranularity};
use crate::error::GatewayError;
use crate::score::change_rate;

use super::models::{HelpRow, PoiRow, ProfileRow};
use super::store::{Distribution, Store, VersionedRatings};

/// Spherical-distance predicate in meters. `$1` latitude, `$2` longitude,
/// `$3` max distance; assumes the table exposes `latitude`/`longitude`
/// columns in degrees.
const GEO_WITHIN: &str = "2 * 6371000 * asin(sqrt( \
     power(sin(radians(latitude - $1) / 2), 2) + \
     cos(radians($1)) * cos(radians(latitude)) * \
     power(sin(radians(longitude - $2) / 2), 2))) <= $3";

const PROFILE_COLUMNS: &str = "id, account_number, metadata, latitude, longitude, timezone, \
     score_coefficient, individual_metric, metric, points_of_interest, last_nudge";

const POI_COLUMNS: &str = "id, longitude, latitude, address, alias, country, state, county, \
     place_type, autonomy_score, autonomy_score_delta, metric, resource_ratings";

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the inner pool, e.g. for the migrator.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Read-modify-write cycle on a profile's POI list inside one
    /// transaction with a row lock.
    async fn mutate_poi_list<F>(&self, account_number: &str, f: F) -> Result<(), GatewayError>
    where
        F: FnOnce(&mut Vec<ProfilePoi>) -> Result<(), GatewayError> + Send,
    {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT points_of_interest FROM profiles WHERE account_number = $1 FOR UPDATE",
        )
        .bind(account_number)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(GatewayError::Unauthenticated)?;

        let mut list: Vec<ProfilePoi> = row
            .try_get::<Json<Vec<ProfilePoi>>, _>("points_of_interest")?
            .0;
        f(&mut list)?;

        sqlx::query("UPDATE profiles SET points_of_interest = $2 WHERE account_number = $1")
            .bind(account_number)
            .bind(Json(&list))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn confirm_rows(
        &self,
        address: &AddressComponent,
        ts: Option<i64>,
        limit: i64,
    ) -> Result<Vec<(String, f64)>, GatewayError> {
        // Narrowest enclosing region first: county, then state, then
        // country-level series.
        let levels: [(String, String, String); 3] = [
            (
                address.country.clone(),
                address.state.clone(),
                address.county.clone(),
            ),
            (address.country.clone(), address.state.clone(), String::new()),
            (address.country.clone(), String::new(), String::new()),
        ];

        for (country, state, county) in levels {
            if country.is_empty() {
                continue;
            }
            let rows = sqlx::query_as::<_, (String, f64)>(
                "SELECT name, active FROM confirm_cds \
                 WHERE country = $1 AND state = $2 AND county = $3 AND report_ts <= $4 \
                 ORDER BY report_ts DESC LIMIT $5",
            )
            .bind(&country)
            .bind(&state)
            .bind(&county)
            .bind(ts.unwrap_or(i64::MAX))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

            if !rows.is_empty() {
                return Ok(rows);
            }
        }

        Ok(Vec::new())
    }

    async fn report_distribution(
        &self,
        table: &str,
        entries: &str,
        profile_id: Option<&str>,
        location: Option<&Location>,
        distance: i64,
        start: i64,
        end: i64,
        distinct: bool,
    ) -> Result<Distribution, GatewayError> {
        let count_expr = if distinct {
            "count(DISTINCT profile_id)"
        } else {
            "count(*)"
        };

        let rows: Vec<(String, i64)> = match (profile_id, location) {
            (Some(profile_id), _) => {
                let sql = format!(
                    "SELECT entry->>'id' AS id, {count_expr} AS count FROM ( \
                       SELECT profile_id, jsonb_array_elements({entries}) AS entry \
                       FROM {table} WHERE profile_id = $1 AND ts >= $2 AND ts < $3 \
                     ) reports GROUP BY 1",
                );
                sqlx::query_as(&sql)
                    .bind(profile_id)
                    .bind(start)
                    .bind(end)
                    .fetch_all(&self.pool)
                    .await?
            }
            (None, Some(location)) => {
                let sql = format!(
                    "SELECT entry->>'id' AS id, {count_expr} AS count FROM ( \
                       SELECT profile_id, jsonb_array_elements({entries}) AS entry \
                       FROM {table} WHERE {GEO_WITHIN} AND ts >= $4 AND ts < $5 \
                     ) reports GROUP BY 1",
                );
                sqlx::query_as(&sql)
                    .bind(location.latitude)
                    .bind(location.longitude)
                    .bind(distance as f64)
                    .bind(start)
                    .bind(end)
                    .fetch_all(&self.pool)
                    .await?
            }
            (None, None) => return Err(GatewayError::InvalidParameters),
        };

        Ok(rows.into_iter().collect())
    }

    async fn personal_time_series(
        &self,
        table: &str,
        entries: &str,
        profile_id: &str,
        start: i64,
        end: i64,
        utc_offset_secs: i32,
        granularity: TimeGranularity,
    ) -> Result<HashMap<String, Vec<Bucket>>, GatewayError> {
        let sql = format!(
            "SELECT id, substr(day, 1, $5) AS bucket, count(*) AS value FROM ( \
               SELECT DISTINCT entry->>'id' AS id, \
                      to_char(to_timestamp(ts + $4) AT TIME ZONE 'UTC', 'YYYY-MM-DD') AS day \
               FROM ( \
                 SELECT ts, jsonb_array_elements({entries}) AS entry \
                 FROM {table} WHERE profile_id = $1 AND ts >= $2 AND ts < $3 \
               ) unwound \
             ) deduped GROUP BY id, bucket ORDER BY bucket",
        );

        let rows: Vec<(String, String, i64)> = sqlx::query_as(&sql)
            .bind(profile_id)
            .bind(start)
            .bind(end)
            .bind(i64::from(utc_offset_secs))
            .bind(granularity.date_prefix_len() as i32)
            .fetch_all(&self.pool)
            .await?;

        let mut series: HashMap<String, Vec<Bucket>> = HashMap::new();
        for (id, bucket, value) in rows {
            series
                .entry(id)
                .or_default()
                .push(Bucket { name: bucket, value });
        }
        Ok(series)
    }

    async fn personal_day_counts(
        &self,
        table: &str,
        entries: &str,
        profile_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(i64, i64), GatewayError> {
        let (yesterday_start, today_start, tomorrow_start) = consecutive_day_starts(now);

        let sql = format!(
            "SELECT day, count(*) AS count FROM ( \
               SELECT DISTINCT entry->>'id' AS id, \
                      to_char(to_timestamp(ts) AT TIME ZONE 'UTC', 'YYYY-MM-DD') AS day \
               FROM ( \
                 SELECT ts, jsonb_array_elements({entries}) AS entry \
                 FROM {table} WHERE profile_id = $1 AND ts >= $2 AND ts < $3 \
               ) unwound \
             ) deduped GROUP BY day",
        );

        let rows: Vec<(String, i64)> = sqlx::query_as(&sql)
            .bind(profile_id)
            .bind(yesterday_start)
            .bind(tomorrow_start)
            .fetch_all(&self.pool)
            .await?;

        let counts: HashMap<String, i64> = rows.into_iter().collect();
        let today = counts.get(&utc_date_string(today_start)).copied().unwrap_or(0);
        let yesterday = counts
            .get(&utc_date_string(yesterday_start))
            .copied()
            .unwrap_or(0);
        Ok((today, yesterday))
    }

    async fn discovery_query(
        &self,
        where_clause: &str,
        order_by: &str,
        location: &Location,
        extra: &str,
    ) -> Result<Vec<Poi>, GatewayError> {
        let sql = format!(
            "SELECT {POI_COLUMNS}, \
                    2 * 6371000 * asin(sqrt( \
                      power(sin(radians(latitude - $1) / 2), 2) + \
                      cos(radians($1)) * cos(radians(latitude)) * \
                      power(sin(radians(longitude - $2) / 2), 2))) AS distance_m \
             FROM poi WHERE {GEO_WITHIN} AND {where_clause} ORDER BY {order_by}",
        );

        let rows = sqlx::query(&sql)
            .bind(location.latitude)
            .bind(location.longitude)
            .bind(crate::domain::POI_SEARCH_RANGE as f64)
            .bind(extra)
            .fetch_all(&self.pool)
            .await?;

        let mut pois = Vec::with_capacity(rows.len());
        for row in rows {
            let mut poi = poi_from_row(&row)?;
            let distance_m: f64 = row.try_get("distance_m")?;
            poi.distance = Some(distance_m / 1000.0);
            pois.push(poi);
        }
        Ok(pois)
    }
}

fn poi_from_row(row: &sqlx::postgres::PgRow) -> Result<Poi, GatewayError> {
    let poi = PoiRow {
        id: row.try_get("id")?,
        longitude: row.try_get("longitude")?,
        latitude: row.try_get("latitude")?,
        address: row.try_get("address")?,
        alias: row.try_get("alias")?,
        country: row.try_get("country")?,
        state: row.try_get("state")?,
        county: row.try_get("county")?,
        place_type: row.try_get("place_type")?,
        autonomy_score: row.try_get("autonomy_score")?,
        autonomy_score_delta: row.try_get("autonomy_score_delta")?,
        metric: row.try_get("metric")?,
        resource_ratings: row.try_get("resource_ratings")?,
    };
    Ok(poi.into_poi())
}

fn report_table(report_type: ReportType) -> (&'static str, &'static str) {
    match report_type {
        ReportType::Symptom => (
            "symptom_reports",
            "official_symptoms || customized_symptoms",
        ),
        ReportType::Behavior => (
            "behavior_reports",
            "official_behaviors || customized_behaviors",
        ),
    }
}

#[async_trait]
impl Store for PostgresStore {
    // ---- profiles ------------------------------------------------------

    async fn create_profile(
        &self,
        profile: &Profile,
        api_token: &str,
    ) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO profiles (id, account_number, api_token, metadata, timezone, \
                                   individual_metric, metric, points_of_interest, last_nudge) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(profile.id.as_uuid())
        .bind(&profile.account_number)
        .bind(api_token)
        .bind(Json(&profile.metadata))
        .bind(&profile.timezone)
        .bind(Json(&profile.individual_metric))
        .bind(Json(&profile.metric))
        .bind(Json(&profile.points_of_interest))
        .bind(Json(&profile.last_nudge))
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => GatewayError::Forbidden,
            _ => GatewayError::internal(e),
        })?;
        Ok(())
    }

    async fn get_profile(&self, account_number: &str) -> Result<Profile, GatewayError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE account_number = $1");
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(account_number)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(GatewayError::Unauthenticated)?;
        Ok(row.into_profile())
    }

    async fn get_profile_by_token(&self, token: &str) -> Result<Profile, GatewayError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE api_token = $1");
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(GatewayError::Unauthenticated)?;
        Ok(row.into_profile())
    }

    async fn delete_profile(&self, account_number: &str) -> Result<(), GatewayError> {
        sqlx::query("DELETE FROM profiles WHERE account_number = $1")
            .bind(account_number)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_profile_metadata(
        &self,
        account_number: &str,
        metadata: serde_json::Value,
    ) -> Result<(), GatewayError> {
        sqlx::query("UPDATE profiles SET metadata = $2 WHERE account_number = $1")
            .bind(account_number)
            .bind(Json(metadata))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_profile_location(
        &self,
        account_number: &str,
        location: &Location,
        timezone: &str,
    ) -> Result<(), GatewayError> {
        sqlx::query(
            "UPDATE profiles SET latitude = $2, longitude = $3, timezone = $4 \
             WHERE account_number = $1",
        )
        .bind(account_number)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(timezone)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_profile_metric(
        &self,
        account_number: &str,
        metric: &Metric,
    ) -> Result<(), GatewayError> {
        sqlx::query("UPDATE profiles SET metric = $2 WHERE account_number = $1")
            .bind(account_number)
            .bind(Json(metric))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_profile_individual_metric(
        &self,
        profile_id: ProfileId,
        metric: &IndividualMetric,
    ) -> Result<(), GatewayError> {
        sqlx::query("UPDATE profiles SET individual_metric = $2 WHERE id = $1")
            .bind(profile_id.as_uuid())
            .bind(Json(metric))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_last_nudge(
        &self,
        account_number: &str,
        kind: NudgeType,
        ts: i64,
    ) -> Result<(), GatewayError> {
        let key = serde_json::to_value(kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| GatewayError::internal("unserializable nudge kind"))?;
        sqlx::query(
            "UPDATE profiles SET last_nudge = last_nudge || jsonb_build_object($2::text, $3::bigint) \
             WHERE account_number = $1",
        )
        .bind(account_number)
        .bind(key)
        .bind(ts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_profiles_by_poi(&self, poi_id: PoiId) -> Result<Vec<Profile>, GatewayError> {
        let pattern = serde_json::json!([{ "id": poi_id }]);
        let sql = format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE points_of_interest @> $1"
        );
        let rows = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(Json(pattern))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ProfileRow::into_profile).collect())
    }

    // ---- profile POI list ---------------------------------------------

    async fn append_poi_to_profile(
        &self,
        account_number: &str,
        poi: &ProfilePoi,
    ) -> Result<(), GatewayError> {
        let poi = poi.clone();
        self.mutate_poi_list(account_number, move |list| {
            if let Some(existing) = list.iter_mut().find(|p| p.id == poi.id) {
                existing.monitored = true;
                existing.alias = poi.alias;
                existing.address = poi.address;
                existing.updated_at = poi.updated_at;
            } else {
                list.push(poi);
            }
            Ok(())
        })
        .await
    }

    async fn update_profile_poi_alias(
        &self,
        account_number: &str,
        poi_id: PoiId,
        alias: &str,
    ) -> Result<(), GatewayError> {
        let alias = alias.to_string();
        self.mutate_poi_list(account_number, move |list| {
            let entry = list
                .iter_mut()
                .find(|p| p.id == poi_id)
                .ok_or(GatewayError::UnknownPoi)?;
            entry.alias = alias;
            Ok(())
        })
        .await
    }

    async fn update_profile_poi_order(
        &self,
        account_number: &str,
        order: &[PoiId],
    ) -> Result<(), GatewayError> {
        let order = order.to_vec();
        self.mutate_poi_list(account_number, move |list| {
            if list.is_empty() {
                return Err(GatewayError::PoiListNotFound);
            }
            for id in &order {
                if !list.iter().any(|p| p.id == *id) {
                    return Err(GatewayError::PoiListMismatch);
                }
            }
            // Named entries first in the requested order, the rest keep
            // their relative position.
            list.sort_by_key(|p| {
                order
                    .iter()
                    .position(|id| *id == p.id)
                    .unwrap_or(usize::MAX)
            });
            Ok(())
        })
        .await
    }

    async fn unmonitor_profile_poi(
        &self,
        account_number: &str,
        poi_id: PoiId,
    ) -> Result<(), GatewayError> {
        self.mutate_poi_list(account_number, move |list| {
            if let Some(entry) = list.iter_mut().find(|p| p.id == poi_id) {
                entry.monitored = false;
            }
            Ok(())
        })
        .await
    }

    async fn update_profile_poi_metric(
        &self,
        account_number: &str,
        poi_id: PoiId,
        metric: &Metric,
        score: f64,
    ) -> Result<(), GatewayError> {
        let metric = metric.clone();
        self.mutate_poi_list(account_number, move |list| {
            let entry = list
                .iter_mut()
                .find(|p| p.id == poi_id)
                .ok_or(GatewayError::UnknownPoi)?;
            entry.metric = metric;
            entry.score = score;
            Ok(())
        })
        .await
    }

    async fn update_profile_poi_rating(
        &self,
        account_number: &str,
        poi_id: PoiId,
        ratings: &ProfileRatingsMetric,
    ) -> Result<(), GatewayError> {
        let ratings = ratings.clone();
        self.mutate_poi_list(account_number, move |list| {
            let entry = list
                .iter_mut()
                .find(|p| p.id == poi_id)
                .ok_or(GatewayError::UnknownPoi)?;
            // Per-user ratings overwrite prior ratings for the same
            // resource id; untouched resources survive.
            for rating in ratings.resources {
                match entry
                    .resource_ratings
                    .resources
                    .iter_mut()
                    .find(|r| r.resource.id == rating.resource.id)
                {
                    Some(existing) => *existing = rating,
                    None => entry.resource_ratings.resources.push(rating),
                }
            }
            entry.resource_ratings.last_update = ratings.last_update;
            Ok(())
        })
        .await
    }

    async fn get_profile_poi_rating(
        &self,
        account_number: &str,
        poi_id: PoiId,
    ) -> Result<ProfileRatingsMetric, GatewayError> {
        let profile = self.get_profile(account_number).await?;
        let entry = profile.poi(poi_id).ok_or(GatewayError::UnknownPoi)?;
        Ok(entry.resource_ratings.clone())
    }

    // ---- POI -----------------------------------------------------------

    async fn insert_poi(&self, poi: &Poi) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO poi (id, longitude, latitude, address, alias, country, state, county, \
                              place_type, autonomy_score, autonomy_score_delta, metric, \
                              resource_ratings, resources, rating_version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 0)",
        )
        .bind(poi.id.as_uuid())
        .bind(poi.location.coordinates[0])
        .bind(poi.location.coordinates[1])
        .bind(&poi.address)
        .bind(&poi.alias)
        .bind(&poi.country)
        .bind(&poi.state)
        .bind(&poi.county)
        .bind(&poi.place_type)
        .bind(poi.score)
        .bind(poi.score_delta)
        .bind(Json(&poi.metric))
        .bind(Json(&poi.resource_ratings))
        .bind(Json(Vec::<Resource>::new()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_poi(&self, poi_id: PoiId) -> Result<Poi, GatewayError> {
        let sql = format!("SELECT {POI_COLUMNS} FROM poi WHERE id = $1");
        let row = sqlx::query_as::<_, PoiRow>(&sql)
            .bind(poi_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(GatewayError::UnknownPoi)?;
        Ok(row.into_poi())
    }

    async fn get_poi_by_coordinates(
        &self,
        location: &Location,
    ) -> Result<Option<Poi>, GatewayError> {
        let sql = format!(
            "SELECT {POI_COLUMNS} FROM poi WHERE longitude = $1 AND latitude = $2"
        );
        let row = sqlx::query_as::<_, PoiRow>(&sql)
            .bind(location.longitude)
            .bind(location.latitude)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PoiRow::into_poi))
    }

    async fn backfill_poi_names(
        &self,
        poi_id: PoiId,
        alias: &str,
        address: &str,
    ) -> Result<bool, GatewayError> {
        let result = sqlx::query(
            "UPDATE poi SET alias = $2, address = $3 \
             WHERE id = $1 AND (alias = '' OR address = '')",
        )
        .bind(poi_id.as_uuid())
        .bind(alias)
        .bind(address)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_poi_geo_info(
        &self,
        poi_id: PoiId,
        address: &AddressComponent,
    ) -> Result<(), GatewayError> {
        let result = sqlx::query(
            "UPDATE poi SET country = $2, state = $3, county = $4 WHERE id = $1",
        )
        .bind(poi_id.as_uuid())
        .bind(&address.country)
        .bind(&address.state)
        .bind(&address.county)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(GatewayError::UnknownPoi);
        }
        Ok(())
    }

    async fn update_poi_metric(
        &self,
        poi_id: PoiId,
        metric: &Metric,
        score: f64,
        score_delta: f64,
    ) -> Result<(), GatewayError> {
        let result = sqlx::query(
            "UPDATE poi SET metric = $2, autonomy_score = $3, autonomy_score_delta = $4 \
             WHERE id = $1",
        )
        .bind(poi_id.as_uuid())
        .bind(Json(metric))
        .bind(score)
        .bind(score_delta)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(GatewayError::UnknownPoi);
        }
        Ok(())
    }

    async fn nearest_poi_ids(
        &self,
        distance: i64,
        location: &Location,
    ) -> Result<Vec<PoiId>, GatewayError> {
        let sql = format!("SELECT id FROM poi WHERE {GEO_WITHIN}");
        let rows: Vec<(Uuid,)> = sqlx::query_as(&sql)
            .bind(location.latitude)
            .bind(location.longitude)
            .bind(distance as f64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| PoiId::from_uuid(id)).collect())
    }

    async fn list_poi_by_resource(
        &self,
        resource_id: &str,
        location: &Location,
    ) -> Result<Vec<Poi>, GatewayError> {
        let sql = format!(
            "SELECT {POI_COLUMNS}, \
                    (entry->>'score')::float8 AS resource_score, \
                    2 * 6371000 * asin(sqrt( \
                      power(sin(radians(latitude - $1) / 2), 2) + \
                      cos(radians($1)) * cos(radians(latitude)) * \
                      power(sin(radians(longitude - $2) / 2), 2))) AS distance_m \
             FROM poi, jsonb_array_elements(resource_ratings->'resources') AS entry \
             WHERE {GEO_WITHIN} \
               AND entry->'resource'->>'id' = $4 \
               AND (entry->>'ratings')::bigint > 0 \
             ORDER BY (entry->>'score')::float8 DESC",
        );

        let rows = sqlx::query(&sql)
            .bind(location.latitude)
            .bind(location.longitude)
            .bind(crate::domain::POI_SEARCH_RANGE as f64)
            .bind(resource_id)
            .fetch_all(&self.pool)
            .await?;

        let mut pois = Vec::with_capacity(rows.len());
        for row in rows {
            let mut poi = poi_from_row(&row)?;
            let distance_m: f64 = row.try_get("distance_m")?;
            poi.distance = Some(distance_m / 1000.0);
            poi.resource_score = Some(row.try_get("resource_score")?);
            pois.push(poi);
        }
        Ok(pois)
    }

    async fn list_poi_by_text(
        &self,
        text: &str,
        location: &Location,
    ) -> Result<Vec<Poi>, GatewayError> {
        self.discovery_query(
            "(alias ILIKE '%' || $4 || '%' OR address ILIKE '%' || $4 || '%')",
            "distance_m ASC",
            location,
            text,
        )
        .await
    }

    async fn list_poi_by_place_type(
        &self,
        place_type: &str,
        location: &Location,
    ) -> Result<Vec<Poi>, GatewayError> {
        self.discovery_query("place_type = $4", "distance_m ASC", location, place_type)
            .await
    }

    async fn get_poi_resources(&self, poi_id: PoiId) -> Result<Vec<Resource>, GatewayError> {
        let row = sqlx::query("SELECT resources FROM poi WHERE id = $1")
            .bind(poi_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(GatewayError::UnknownPoi)?;
        Ok(row.try_get::<Json<Vec<Resource>>, _>("resources")?.0)
    }

    async fn add_poi_resources(
        &self,
        poi_id: PoiId,
        resources: &[Resource],
    ) -> Result<(), GatewayError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT resources FROM poi WHERE id = $1 FOR UPDATE")
            .bind(poi_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(GatewayError::UnknownPoi)?;
        let mut existing: Vec<Resource> = row.try_get::<Json<Vec<Resource>>, _>("resources")?.0;

        for resource in resources {
            if !existing.iter().any(|r| r.id == resource.id) {
                existing.push(resource.clone());
            }
        }

        sqlx::query("UPDATE poi SET resources = $2 WHERE id = $1")
            .bind(poi_id.as_uuid())
            .bind(Json(&existing))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_poi_ratings(&self, poi_id: PoiId) -> Result<VersionedRatings, GatewayError> {
        let row = sqlx::query("SELECT resource_ratings, rating_version FROM poi WHERE id = $1")
            .bind(poi_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(GatewayError::UnknownPoi)?;
        Ok(VersionedRatings {
            metric: row
                .try_get::<Json<PoiRatingsMetric>, _>("resource_ratings")?
                .0,
            version: row.try_get("rating_version")?,
        })
    }

    async fn write_poi_ratings(
        &self,
        poi_id: PoiId,
        metric: &PoiRatingsMetric,
        expected_version: i64,
    ) -> Result<bool, GatewayError> {
        let result = sqlx::query(
            "UPDATE poi SET resource_ratings = $2, rating_version = rating_version + 1 \
             WHERE id = $1 AND rating_version = $3",
        )
        .bind(poi_id.as_uuid())
        .bind(Json(metric))
        .bind(expected_version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    // ---- reports -------------------------------------------------------

    async fn save_symptom_report(&self, report: &SymptomReport) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO symptom_reports (profile_id, account_number, official_symptoms, \
                                          customized_symptoms, longitude, latitude, ts) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (profile_id, ts) DO NOTHING",
        )
        .bind(&report.profile_id)
        .bind(&report.account_number)
        .bind(Json(&report.official_symptoms))
        .bind(Json(&report.customized_symptoms))
        .bind(report.location.coordinates[0])
        .bind(report.location.coordinates[1])
        .bind(report.ts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_behavior_report(&self, report: &BehaviorReport) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO behavior_reports (profile_id, account_number, official_behaviors, \
                                           customized_behaviors, longitude, latitude, ts) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (profile_id, ts) DO NOTHING",
        )
        .bind(&report.profile_id)
        .bind(&report.account_number)
        .bind(Json(&report.official_behaviors))
        .bind(Json(&report.customized_behaviors))
        .bind(report.location.coordinates[0])
        .bind(report.location.coordinates[1])
        .bind(report.ts)
        .execute(&self.pool)
        .await?;
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
        let (table, entries) = report_table(ReportType::Symptom);
        self.report_distribution(
            table, entries, profile_id, location, distance, start, end, distinct,
        )
        .await
    }

    async fn find_behavior_distribution(
        &self,
        profile_id: Option<&str>,
        location: Option<&Location>,
        distance: i64,
        start: i64,
        end: i64,
    ) -> Result<Distribution, GatewayError> {
        let (table, entries) = report_table(ReportType::Behavior);
        self.report_distribution(
            table, entries, profile_id, location, distance, start, end, false,
        )
        .await
    }

    async fn find_nearby_behavior_report_times(
        &self,
        distance: i64,
        location: &Location,
        start: i64,
        end: i64,
    ) -> Result<i64, GatewayError> {
        let sql = format!(
            "SELECT count(*) FROM behavior_reports WHERE {GEO_WITHIN} AND ts >= $4 AND ts < $5",
        );
        let (count,): (i64,) = sqlx::query_as(&sql)
            .bind(location.latitude)
            .bind(location.longitude)
            .bind(distance as f64)
            .bind(start)
            .bind(end)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn get_nearby_reporting_user_count(
        &self,
        report_type: ReportType,
        distance: i64,
        location: &Location,
        now: DateTime<Utc>,
    ) -> Result<(i64, i64), GatewayError> {
        let (table, _) = report_table(report_type);
        let (yesterday_start, today_start, tomorrow_start) = consecutive_day_starts(now);

        let sql = format!(
            "SELECT count(DISTINCT profile_id) FROM {table} \
             WHERE {GEO_WITHIN} AND ts >= $4 AND ts < $5",
        );

        let mut counts = [0_i64; 2];
        for (i, (start, end)) in [
            (today_start, tomorrow_start),
            (yesterday_start, today_start),
        ]
        .iter()
        .enumerate()
        {
            let (count,): (i64,) = sqlx::query_as(&sql)
                .bind(location.latitude)
                .bind(location.longitude)
                .bind(distance as f64)
                .bind(start)
                .bind(end)
                .fetch_one(&self.pool)
                .await?;
            counts[i] = count;
        }

        Ok((counts[0], counts[1]))
    }

    async fn get_symptom_count(
        &self,
        profile_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(i64, i64), GatewayError> {
        let (table, entries) = report_table(ReportType::Symptom);
        self.personal_day_counts(table, entries, profile_id, now).await
    }

    async fn get_behavior_count(
        &self,
        profile_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(i64, i64), GatewayError> {
        let (table, entries) = report_table(ReportType::Behavior);
        self.personal_day_counts(table, entries, profile_id, now).await
    }

    async fn get_personal_symptom_time_series(
        &self,
        profile_id: &str,
        start: i64,
        end: i64,
        utc_offset_secs: i32,
        granularity: TimeGranularity,
    ) -> Result<HashMap<String, Vec<Bucket>>, GatewayError> {
        let (table, entries) = report_table(ReportType::Symptom);
        self.personal_time_series(
            table, entries, profile_id, start, end, utc_offset_secs, granularity,
        )
        .await
    }

    async fn get_personal_behavior_time_series(
        &self,
        profile_id: &str,
        start: i64,
        end: i64,
        utc_offset_secs: i32,
        granularity: TimeGranularity,
    ) -> Result<HashMap<String, Vec<Bucket>>, GatewayError> {
        let (table, entries) = report_table(ReportType::Behavior);
        self.personal_time_series(
            table, entries, profile_id, start, end, utc_offset_secs, granularity,
        )
        .await
    }

    // ---- catalogs ------------------------------------------------------

    async fn create_symptom(&self, symptom: &Symptom) -> Result<String, GatewayError> {
        sqlx::query(
            "INSERT INTO symptoms (id, name, descr, source) VALUES ($1, $2, $3, 'customized') \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&symptom.id)
        .bind(&symptom.name)
        .bind(&symptom.desc)
        .execute(&self.pool)
        .await?;
        Ok(symptom.id.clone())
    }

    async fn create_behavior(&self, behavior: &Behavior) -> Result<String, GatewayError> {
        sqlx::query(
            "INSERT INTO behaviors (id, name, descr, source) VALUES ($1, $2, $3, 'customized') \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&behavior.id)
        .bind(&behavior.name)
        .bind(&behavior.desc)
        .execute(&self.pool)
        .await?;
        Ok(behavior.id.clone())
    }

    async fn find_symptoms_by_ids(&self, ids: &[String]) -> Result<Vec<Symptom>, GatewayError> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT id, name, descr FROM symptoms WHERE id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name, desc)| Symptom {
                id,
                name,
                desc,
                source: crate::domain::report::CatalogSource::Customized,
            })
            .collect())
    }

    async fn find_behaviors_by_ids(&self, ids: &[String]) -> Result<Vec<Behavior>, GatewayError> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT id, name, descr FROM behaviors WHERE id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name, desc)| Behavior {
                id,
                name,
                desc,
                source: crate::domain::report::CatalogSource::Customized,
            })
            .collect())
    }

    // ---- confirmed cases ----------------------------------------------

    async fn get_cds_active(
        &self,
        location: &Location,
        ts: i64,
    ) -> Result<Option<(f64, f64, f64)>, GatewayError> {
        let rows = self.confirm_rows(&location.address, Some(ts), 2).await?;
        let Some((_, active)) = rows.first() else {
            return Ok(None);
        };
        let previous = rows.get(1).map_or(0.0, |(_, a)| *a);
        let diff = active - previous;
        Ok(Some((*active, diff, change_rate(*active, previous))))
    }

    async fn get_confirm_series(
        &self,
        location: &Location,
        window: usize,
    ) -> Result<Vec<CdsScoreDataSet>, GatewayError> {
        let mut rows = self
            .confirm_rows(&location.address, None, window as i64)
            .await?;
        rows.reverse(); // oldest first
        Ok(rows
            .into_iter()
            .map(|(name, cases)| CdsScoreDataSet { name, cases })
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
        sqlx::query(
            "INSERT INTO score_history (owner, type, date, score, update_times, ts) \
             VALUES ($1, $2, $3, $4, 1, $5) \
             ON CONFLICT (owner, type, date) DO UPDATE SET \
               score = (score_history.score * score_history.update_times + $4) \
                       / (score_history.update_times + 1), \
               update_times = score_history.update_times + 1, \
               ts = $5",
        )
        .bind(owner)
        .bind(record_type.as_str())
        .bind(&date)
        .bind(score)
        .bind(ts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_score_record(
        &self,
        owner: &str,
        record_type: ScoreRecordType,
        date: &str,
    ) -> Result<Option<ScoreRecord>, GatewayError> {
        let row: Option<(f64, f64)> = sqlx::query_as(
            "SELECT score, update_times FROM score_history \
             WHERE owner = $1 AND type = $2 AND date = $3",
        )
        .bind(owner)
        .bind(record_type.as_str())
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(score, update_times)| ScoreRecord {
            owner: owner.to_string(),
            record_type,
            date: date.to_string(),
            score,
            update_times,
        }))
    }

    async fn get_score_average(
        &self,
        owner: &str,
        start: i64,
        end: i64,
    ) -> Result<f64, GatewayError> {
        let (avg,): (Option<f64>,) = sqlx::query_as(
            "SELECT avg(score) FROM score_history \
             WHERE owner = $1 AND date >= $2 AND date <= $3",
        )
        .bind(owner)
        .bind(utc_date_string(start))
        .bind(utc_date_string(end))
        .fetch_one(&self.pool)
        .await?;
        Ok(avg.unwrap_or(0.0))
    }

    async fn get_score_time_series(
        &self,
        owner: &str,
        start: i64,
        end: i64,
        granularity: TimeGranularity,
    ) -> Result<Vec<Bucket>, GatewayError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT substr(date, 1, $4) AS name, floor(avg(score))::bigint AS value \
             FROM score_history \
             WHERE owner = $1 AND date >= $2 AND date <= $3 \
             GROUP BY 1 ORDER BY 1",
        )
        .bind(owner)
        .bind(utc_date_string(start))
        .bind(utc_date_string(end))
        .bind(granularity.date_prefix_len() as i32)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(name, value)| Bucket { name, value })
            .collect())
    }

    // ---- help requests -------------------------------------------------

    async fn create_help(&self, help: &HelpRequest) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO help_requests (id, requester, subject, needs, meeting_place, \
                                        contact_info, state, helper, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(help.id.as_uuid())
        .bind(&help.requester)
        .bind(&help.subject)
        .bind(&help.needs)
        .bind(&help.meeting_place)
        .bind(&help.contact_info)
        .bind("PENDING")
        .bind(&help.helper)
        .bind(help.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_helps(&self, count: i64) -> Result<Vec<HelpRequest>, GatewayError> {
        let rows = sqlx::query_as::<_, HelpRow>(
            "SELECT id, requester, subject, needs, meeting_place, contact_info, state, helper, \
                    created_at \
             FROM help_requests WHERE state = 'PENDING' ORDER BY created_at ASC LIMIT $1",
        )
        .bind(count)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(HelpRow::into_help).collect())
    }

    async fn get_help(&self, id: HelpId) -> Result<Option<HelpRequest>, GatewayError> {
        let row = sqlx::query_as::<_, HelpRow>(
            "SELECT id, requester, subject, needs, meeting_place, contact_info, state, helper, \
                    created_at \
             FROM help_requests WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(HelpRow::into_help))
    }

    async fn answer_help(&self, helper: &str, id: HelpId) -> Result<HelpRequest, GatewayError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, HelpRow>(
            "SELECT id, requester, subject, needs, meeting_place, contact_info, state, helper, \
                    created_at \
             FROM help_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(GatewayError::InvalidParameters)?;

        let mut help = row.into_help();
        if help.state != HelpState::Pending || help.requester == helper {
            return Err(GatewayError::Forbidden);
        }

        sqlx::query("UPDATE help_requests SET state = 'RESPONDED', helper = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(helper)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        help.state = HelpState::Responded;
        help.helper = helper.to_string();
        Ok(help)
    }
}
