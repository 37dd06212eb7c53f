//! Account profiles and the autonomy-profile read path.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::ids::{PoiId, ProfileId};
use crate::domain::location::Location;
use crate::domain::metric::{IndividualMetric, Metric};
use crate::domain::poi::Poi;
use crate::domain::profile::Profile;
use crate::domain::rating::PoiResourceRating;
use crate::error::GatewayError;
use crate::external::geocoder::Geocoder;
use crate::localization::Localizer;
use crate::persistence::Store;
use crate::score;

use super::metric_service::MetricService;

/// A freshly-registered account: the profile plus its bearer token.
#[derive(Debug, Clone)]
pub struct Registration {
    pub profile: Profile,
    pub api_token: String,
}

/// An individual's resolved autonomy profile.
#[derive(Debug, Clone)]
pub struct IndividualProfile {
    pub autonomy_score: f64,
    pub autonomy_score_delta: f64,
    pub individual: IndividualMetric,
    pub neighbor: Metric,
}

/// A place's resolved autonomy profile.
#[derive(Debug, Clone)]
pub struct PlaceProfile {
    pub poi_id: Option<PoiId>,
    pub autonomy_score: f64,
    pub autonomy_score_delta: f64,
    pub neighbor: Metric,
    pub resources: Vec<PoiResourceRating>,
}

/// Account lifecycle plus the profile read paths.
#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn Store>,
    metrics: MetricService,
}

impl ProfileService {
    /// Creates a new `ProfileService`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, metrics: MetricService) -> Self {
        Self { store, metrics }
    }

    /// Registers an account and mints its bearer token.
    pub async fn register(
        &self,
        account_number: Option<String>,
        metadata: Value,
    ) -> Result<Registration, GatewayError> {
        let profile = Profile {
            id: ProfileId::new(),
            account_number: account_number
                .unwrap_or_else(|| Uuid::new_v4().simple().to_string()),
            metadata,
            timezone: String::new(),
            ..Profile::default()
        };
        let api_token = Uuid::new_v4().simple().to_string();

        self.store.create_profile(&profile, &api_token).await?;
        tracing::info!(account = %profile.account_number, "account registered");
        Ok(Registration { profile, api_token })
    }

    /// Loads a profile by account number.
    pub async fn get_profile(&self, account_number: &str) -> Result<Profile, GatewayError> {
        self.store.get_profile(account_number).await
    }

    /// Replaces the account's metadata blob.
    pub async fn update_metadata(
        &self,
        account_number: &str,
        metadata: Value,
    ) -> Result<(), GatewayError> {
        self.store
            .update_profile_metadata(account_number, metadata)
            .await
    }

    /// Removes the account and its profile document.
    pub async fn delete_account(&self, account_number: &str) -> Result<(), GatewayError> {
        self.store.delete_profile(account_number).await?;
        tracing::info!(account = %account_number, "account removed");
        Ok(())
    }

    /// Records a location ping from the client.
    pub async fn update_location(
        &self,
        account_number: &str,
        location: Location,
        timezone: &str,
    ) -> Result<(), GatewayError> {
        self.store
            .update_profile_location(account_number, &location, timezone)
            .await
    }

    /// The requesting user's own autonomy profile.
    ///
    /// Stale personal or neighborhood metrics are resynced before
    /// composing; a coefficient override newer than the cached metric
    /// also forces a resync so the override takes effect immediately.
    pub async fn current_area_profile(
        &self,
        account_number: &str,
    ) -> Result<IndividualProfile, GatewayError> {
        let profile = self.store.get_profile(account_number).await?;
        let now = Utc::now();

        let individual = if profile.individual_metric.is_stale(now) {
            self.metrics
                .sync_profile_individual_metrics(profile.id)
                .await?
        } else {
            profile.individual_metric.clone()
        };

        let mut neighbor = profile.metric.clone();
        if let Some(location) = profile.last_location() {
            let coefficient_refresh = profile.score_coefficient.as_ref().is_some_and(|c| {
                c.updated_at.timestamp() > profile.metric.last_update
            });

            if profile.metric.is_stale(now) {
                neighbor = self
                    .metrics
                    .sync_account_metrics(account_number, None, location)
                    .await?;
            } else if coefficient_refresh {
                neighbor = self
                    .metrics
                    .sync_account_metrics(
                        account_number,
                        profile.score_coefficient.as_ref(),
                        location,
                    )
                    .await?;
            }
        }

        let (autonomy_score, autonomy_score_delta) =
            score::calculate_individual_autonomy_score(&individual, &neighbor);
        Ok(IndividualProfile {
            autonomy_score,
            autonomy_score_delta,
            individual,
            neighbor,
        })
    }

    /// A saved place's autonomy profile, resyncing stale metrics first.
    pub async fn place_profile(
        &self,
        poi_id: PoiId,
        all_resources: bool,
        localizer: &Localizer,
    ) -> Result<PlaceProfile, GatewayError> {
        let mut poi = self.store.get_poi(poi_id).await?;
        if poi.country.is_empty() {
            let resolved = self.metrics.resolve_poi_location(&poi).await?;
            poi.country = resolved.address.country;
            poi.state = resolved.address.state;
            poi.county = resolved.address.county;
        }

        if poi.metric.is_stale(Utc::now()) {
            self.metrics.sync_poi_metrics(poi_id).await?;
            poi = self.store.get_poi(poi_id).await?;
        }

        Ok(summarize_place(&poi, all_resources, localizer))
    }

    /// An ad-hoc coordinate's autonomy profile. Reuses the shared POI
    /// document when one exists at exactly these coordinates; otherwise
    /// computes a transient profile without persisting anything.
    pub async fn coordinate_profile(
        &self,
        location: Location,
        all_resources: bool,
        localizer: &Localizer,
    ) -> Result<PlaceProfile, GatewayError> {
        if let Some(poi) = self.store.get_poi_by_coordinates(&location).await? {
            return self.place_profile(poi.id, all_resources, localizer).await;
        }

        let raw = self.metrics.collect_raw_metrics(location).await?;
        let metric = score::calculate_metric(raw, None, Utc::now());
        let (autonomy_score, _, autonomy_score_delta) =
            score::calculate_poi_autonomy_score(&[], &metric);

        Ok(PlaceProfile {
            poi_id: None,
            autonomy_score,
            autonomy_score_delta,
            neighbor: metric,
            resources: Vec::new(),
        })
    }

    /// Resolves a free-form address to a place score, for the batch
    /// `/score` endpoint. `None` when the address cannot be resolved.
    pub async fn score_for_address(
        &self,
        address: &str,
        geocoder: &dyn Geocoder,
    ) -> Result<Option<f64>, GatewayError> {
        let Some(location) = geocoder.forward_geocode(address).await? else {
            return Ok(None);
        };

        if let Some(poi) = self.store.get_poi_by_coordinates(&location).await? {
            return Ok(Some(poi.score));
        }

        let raw = self.metrics.collect_raw_metrics(location).await?;
        let metric = score::calculate_metric(raw, None, Utc::now());
        let (autonomy_score, _, _) = score::calculate_poi_autonomy_score(&[], &metric);
        Ok(Some(autonomy_score))
    }
}

fn summarize_place(poi: &Poi, all_resources: bool, localizer: &Localizer) -> PlaceProfile {
    let mut resources: Vec<PoiResourceRating> = poi
        .resource_ratings
        .resources
        .iter()
        .filter(|r| {
            all_resources
                || crate::localization::IMPORTANT_RESOURCE_IDS.contains(&r.resource.id.as_str())
        })
        .cloned()
        .collect();

    for rating in &mut resources {
        if let Some(name) = localizer.resource_name(&rating.resource.id) {
            rating.resource.name = name;
        }
    }
    resources.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    PlaceProfile {
        poi_id: Some(poi.id),
        autonomy_score: poi.score,
        autonomy_score_delta: poi.score_delta,
        neighbor: poi.metric.clone(),
        resources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::geocoder::StaticGeocoder;
    use crate::persistence::MemoryStore;

    fn service(store: Arc<MemoryStore>) -> ProfileService {
        let geocoder = Arc::new(StaticGeocoder::default());
        let metrics = MetricService::new(store.clone(), geocoder);
        ProfileService::new(store, metrics)
    }

    #[tokio::test]
    async fn register_and_fetch_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());

        let registration = service
            .register(None, serde_json::json!({"source": "test"}))
            .await
            .unwrap();
        assert!(!registration.api_token.is_empty());

        let fetched = store
            .get_profile_by_token(&registration.api_token)
            .await
            .unwrap();
        assert_eq!(fetched.account_number, registration.profile.account_number);
    }

    #[tokio::test]
    async fn duplicate_account_number_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store);

        service
            .register(Some("acct".to_string()), Value::Null)
            .await
            .unwrap();
        let err = service.register(Some("acct".to_string()), Value::Null).await;
        assert!(matches!(err, Err(GatewayError::Forbidden)));
    }

    #[tokio::test]
    async fn profile_without_location_still_resolves() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store);

        let registration = service.register(None, Value::Null).await.unwrap();
        let profile = service
            .current_area_profile(&registration.profile.account_number)
            .await
            .unwrap();
        // no symptoms → perfect individual score; neighborhood untouched
        assert_eq!(profile.individual.score, 100.0);
        assert_eq!(profile.neighbor.score, 0.0);
        assert!((profile.autonomy_score - 80.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn delete_account_revokes_token() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());

        let registration = service.register(None, Value::Null).await.unwrap();
        service
            .delete_account(&registration.profile.account_number)
            .await
            .unwrap();
        assert!(store
            .get_profile_by_token(&registration.api_token)
            .await
            .is_err());
    }
}
