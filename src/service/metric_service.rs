//! Raw-metric collection and metric synchronization.
//!
//! `collect_raw_metrics` gathers everything the score engine needs for a
//! location; the `sync_*` methods drive the collect → calculate →
//! persist cycle for profiles and POIs.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::confirm::CONFIRM_SCORE_WINDOW_SIZE;
use crate::domain::day::consecutive_day_starts;
use crate::domain::ids::{PoiId, ProfileId};
use crate::domain::location::Location;
use crate::domain::metric::{
    BehaviorDetail, ConfirmDetail, Details, IndividualMetric, Metric, NearestSymptomData,
    SymptomDetail,
};
use crate::domain::profile::ScoreCoefficient;
use crate::domain::report::{is_official_symptom, ReportType};
use crate::domain::NEARBY_DISTANCE_RANGE;
use crate::error::GatewayError;
use crate::external::geocoder::Geocoder;
use crate::persistence::{Distribution, Store};
use crate::score;

/// Stateless coordinator over the store and the geocoder.
#[derive(Clone)]
pub struct MetricService {
    store: Arc<dyn Store>,
    geocoder: Arc<dyn Geocoder>,
}

impl MetricService {
    /// Creates a new `MetricService`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self { store, geocoder }
    }

    /// Gathers the raw inputs of an autonomy score for a location.
    ///
    /// The returned metric has populated `details` but zeroed top-level
    /// scores; the score engine fills those. The geocoder runs only when
    /// the location has no resolved country, and its failure is fatal to
    /// this call. A country without confirmed-case data yields an empty
    /// series, which is not an error.
    pub async fn collect_raw_metrics(
        &self,
        location: Location,
    ) -> Result<Metric, GatewayError> {
        let now = Utc::now();
        let (yesterday_start, today_start, tomorrow_start) = consecutive_day_starts(now);

        let behavior_today = self
            .store
            .find_behavior_distribution(
                None,
                Some(&location),
                NEARBY_DISTANCE_RANGE,
                today_start,
                tomorrow_start,
            )
            .await?;
        let behavior_yesterday = self
            .store
            .find_behavior_distribution(
                None,
                Some(&location),
                NEARBY_DISTANCE_RANGE,
                yesterday_start,
                today_start,
            )
            .await?;
        let report_times = self
            .store
            .find_nearby_behavior_report_times(
                NEARBY_DISTANCE_RANGE,
                &location,
                today_start,
                tomorrow_start,
            )
            .await?;
        let report_times_yesterday = self
            .store
            .find_nearby_behavior_report_times(
                NEARBY_DISTANCE_RANGE,
                &location,
                yesterday_start,
                today_start,
            )
            .await?;

        let symptom_today = self
            .store
            .find_symptom_distribution(
                None,
                Some(&location),
                NEARBY_DISTANCE_RANGE,
                today_start,
                tomorrow_start,
                true,
            )
            .await?;
        let symptom_yesterday = self
            .store
            .find_symptom_distribution(
                None,
                Some(&location),
                NEARBY_DISTANCE_RANGE,
                yesterday_start,
                today_start,
                true,
            )
            .await?;
        let (symptom_users_today, symptom_users_yesterday) = self
            .store
            .get_nearby_reporting_user_count(
                ReportType::Symptom,
                NEARBY_DISTANCE_RANGE,
                &location,
                now,
            )
            .await?;

        let location = if location.needs_geocoding() {
            tracing::info!("resolving geo info from external service");
            self.geocoder.political_geo_info(&location).await?
        } else {
            location
        };

        let (confirmed_count, confirmed_delta) = match self
            .store
            .get_cds_active(&location, now.timestamp())
            .await?
        {
            Some((active, _, delta_percent)) => (active, delta_percent),
            None => {
                tracing::warn!(country = %location.address.country, "no confirmed-case dataset");
                (0.0, 0.0)
            }
        };
        let confirm_data = self
            .store
            .get_confirm_series(&location, CONFIRM_SCORE_WINDOW_SIZE)
            .await?;

        Ok(Metric {
            confirmed_count,
            confirmed_delta,
            details: Details {
                confirm: ConfirmDetail {
                    continuous_data: confirm_data,
                    ..ConfirmDetail::default()
                },
                symptoms: SymptomDetail {
                    total_people: symptom_users_today as f64,
                    total_people_yesterday: symptom_users_yesterday as f64,
                    today_data: symptom_day_data(&symptom_today, symptom_users_today),
                    yesterday_data: symptom_day_data(&symptom_yesterday, symptom_users_yesterday),
                    ..SymptomDetail::default()
                },
                behaviors: BehaviorDetail {
                    report_times,
                    report_times_yesterday,
                    today_distribution: behavior_today,
                    yesterday_distribution: behavior_yesterday,
                    ..BehaviorDetail::default()
                },
            },
            ..Metric::default()
        })
    }

    /// Recomputes a profile's personal metric from their own reports and
    /// persists it.
    pub async fn sync_profile_individual_metrics(
        &self,
        profile_id: ProfileId,
    ) -> Result<IndividualMetric, GatewayError> {
        let now = Utc::now();
        let profile_key = profile_id.to_string();

        let (symptoms_today, symptoms_yesterday) =
            self.store.get_symptom_count(&profile_key, now).await?;
        let symptom_delta = score::change_rate(symptoms_today as f64, symptoms_yesterday as f64);

        let (behaviors_today, behaviors_yesterday) =
            self.store.get_behavior_count(&profile_key, now).await?;
        let behavior_delta =
            score::change_rate(behaviors_today as f64, behaviors_yesterday as f64);

        let metric = IndividualMetric {
            score: if symptoms_today == 0 { 100.0 } else { 0.0 },
            score_yesterday: if symptoms_yesterday == 0 { 100.0 } else { 0.0 },
            symptom_count: symptoms_today as f64,
            symptom_delta,
            behavior_count: behaviors_today as f64,
            behavior_delta,
            last_update: now.timestamp(),
        };

        self.store
            .update_profile_individual_metric(profile_id, &metric)
            .await?;
        Ok(metric)
    }

    /// Collect → calculate → persist for an account's own location.
    pub async fn sync_account_metrics(
        &self,
        account_number: &str,
        coefficient: Option<&ScoreCoefficient>,
        location: Location,
    ) -> Result<Metric, GatewayError> {
        let raw = self.collect_raw_metrics(location).await?;
        let metric = score::calculate_metric(raw, coefficient, Utc::now());
        self.store
            .update_profile_metric(account_number, &metric)
            .await?;
        Ok(metric)
    }

    /// Collect → calculate → persist for one POI inside an account's
    /// subscription list.
    pub async fn sync_account_poi_metrics(
        &self,
        account_number: &str,
        coefficient: Option<&ScoreCoefficient>,
        poi_id: PoiId,
    ) -> Result<Metric, GatewayError> {
        let profile = self.store.get_profile(account_number).await?;
        if profile.poi(poi_id).is_none() {
            return Err(GatewayError::UnknownPoi);
        }

        let poi = self.store.get_poi(poi_id).await?;
        let raw = self.collect_raw_metrics(poi.resolved_location()).await?;
        let metric = score::calculate_metric(raw, coefficient, Utc::now());

        let (autonomy_score, _, _) =
            score::calculate_poi_autonomy_score(&poi.resource_ratings.resources, &metric);
        self.store
            .update_profile_poi_metric(account_number, poi_id, &metric, autonomy_score)
            .await?;
        Ok(metric)
    }

    /// Collect → calculate → persist for a shared POI document,
    /// including its composite autonomy score.
    pub async fn sync_poi_metrics(&self, poi_id: PoiId) -> Result<Metric, GatewayError> {
        let poi = self.store.get_poi(poi_id).await?;
        let location = self.resolve_poi_location(&poi).await?;

        let raw = self.collect_raw_metrics(location).await?;
        let metric = score::calculate_metric(raw, None, Utc::now());

        let (autonomy_score, _, autonomy_score_delta) =
            score::calculate_poi_autonomy_score(&poi.resource_ratings.resources, &metric);
        self.store
            .update_poi_metric(poi_id, &metric, autonomy_score, autonomy_score_delta)
            .await?;
        Ok(metric)
    }

    /// The POI's location with lazily-resolved address components,
    /// persisting the resolution on first success.
    pub async fn resolve_poi_location(
        &self,
        poi: &crate::domain::poi::Poi,
    ) -> Result<Location, GatewayError> {
        let location = poi.resolved_location();
        if !location.needs_geocoding() {
            return Ok(location);
        }

        let resolved = self.geocoder.political_geo_info(&location).await?;
        self.store
            .update_poi_geo_info(poi.id, &resolved.address)
            .await?;
        Ok(resolved)
    }
}

fn symptom_day_data(distribution: &Distribution, user_count: i64) -> NearestSymptomData {
    let mut official = 0_i64;
    let mut customized = 0_i64;
    for (id, count) in distribution {
        if is_official_symptom(id) {
            official += count;
        } else {
            customized += count;
        }
    }

    NearestSymptomData {
        weight_distribution: distribution.clone(),
        official_count: official as f64,
        customized_count: customized as f64,
        user_count: user_count as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::location::GeoPoint;
    use crate::domain::profile::Profile;
    use crate::domain::report::{Symptom, SymptomReport, FEVER};
    use crate::external::geocoder::StaticGeocoder;
    use crate::persistence::MemoryStore;

    fn service(store: Arc<MemoryStore>) -> MetricService {
        MetricService::new(store, Arc::new(StaticGeocoder::default()))
    }

    #[tokio::test]
    async fn individual_metric_scores_100_without_symptoms() {
        let store = Arc::new(MemoryStore::new());
        let profile = Profile {
            account_number: "acct".to_string(),
            ..Profile::default()
        };
        store.create_profile(&profile, "token").await.unwrap();

        let metric = service(store.clone())
            .sync_profile_individual_metrics(profile.id)
            .await
            .unwrap();
        assert_eq!(metric.score, 100.0);
        assert_eq!(metric.symptom_count, 0.0);

        let stored = store.get_profile("acct").await.unwrap();
        assert_eq!(stored.individual_metric.score, 100.0);
        assert!(stored.individual_metric.last_update > 0);
    }

    #[tokio::test]
    async fn individual_metric_drops_to_zero_with_symptoms() {
        let store = Arc::new(MemoryStore::new());
        let profile = Profile {
            account_number: "acct".to_string(),
            ..Profile::default()
        };
        store.create_profile(&profile, "token").await.unwrap();
        store
            .save_symptom_report(&SymptomReport {
                profile_id: profile.id.to_string(),
                account_number: "acct".to_string(),
                official_symptoms: vec![Symptom {
                    id: FEVER.to_string(),
                    ..Symptom::default()
                }],
                customized_symptoms: Vec::new(),
                location: GeoPoint::new(121.0, 25.0),
                ts: Utc::now().timestamp(),
            })
            .await
            .unwrap();

        let metric = service(store)
            .sync_profile_individual_metrics(profile.id)
            .await
            .unwrap();
        assert_eq!(metric.score, 0.0);
        assert_eq!(metric.symptom_count, 1.0);
        assert_eq!(metric.symptom_delta, 100.0);
    }

    #[tokio::test]
    async fn collect_raw_metrics_fills_details() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now().timestamp();
        store
            .save_symptom_report(&SymptomReport {
                profile_id: "p1".to_string(),
                account_number: "p1".to_string(),
                official_symptoms: vec![Symptom {
                    id: FEVER.to_string(),
                    ..Symptom::default()
                }],
                customized_symptoms: Vec::new(),
                location: GeoPoint::new(121.0, 25.0),
                ts: now,
            })
            .await
            .unwrap();

        let mut location = Location::new(25.0, 121.0);
        location.address.country = "Taiwan".to_string();

        let metric = service(store).collect_raw_metrics(location).await.unwrap();
        let today = &metric.details.symptoms.today_data;
        assert_eq!(today.weight_distribution.get(FEVER), Some(&1));
        assert_eq!(today.official_count, 1.0);
        assert_eq!(today.user_count, 1.0);
        // score fields stay zero until the score engine runs
        assert_eq!(metric.score, 0.0);
        assert_eq!(metric.autonomy_score, 0.0);
    }

    #[tokio::test]
    async fn collect_raw_metrics_fails_when_geocoder_fails() {
        let store = Arc::new(MemoryStore::new());
        let service = MetricService::new(
            store,
            Arc::new(StaticGeocoder {
                fail: true,
                ..StaticGeocoder::default()
            }),
        );

        // Unresolved location forces the geocoder call.
        let result = service
            .collect_raw_metrics(Location::new(25.0, 121.0))
            .await;
        assert!(result.is_err());
    }
}
