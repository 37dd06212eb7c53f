//! POI mutation layer: create/attach, listing, discovery, renaming,
//! reordering, un-monitoring, and the per-place resource set.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::ids::PoiId;
use crate::domain::location::{GeoPoint, Location};
use crate::domain::poi::Poi;
use crate::domain::profile::{PoiDetail, ProfilePoi};
use crate::domain::rating::Resource;
use crate::error::GatewayError;
use crate::external::geocoder::Geocoder;
use crate::localization::Localizer;
use crate::persistence::Store;

use super::metric_service::MetricService;

/// Orchestrates POI documents and profile subscriptions.
#[derive(Clone)]
pub struct PoiService {
    store: Arc<dyn Store>,
    geocoder: Arc<dyn Geocoder>,
    metrics: MetricService,
}

impl PoiService {
    /// Creates a new `PoiService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        geocoder: Arc<dyn Geocoder>,
        metrics: MetricService,
    ) -> Self {
        Self {
            store,
            geocoder,
            metrics,
        }
    }

    /// Creates the shared POI document for a coordinate pair if it does
    /// not exist yet, refreshes its metric when stale, and attaches it
    /// to the requesting account's monitored list.
    pub async fn add_poi(
        &self,
        account_number: &str,
        alias: &str,
        address: &str,
        place_type: &str,
        longitude: f64,
        latitude: f64,
    ) -> Result<PoiDetail, GatewayError> {
        let coordinates = Location::new(latitude, longitude);

        let mut poi = match self.store.get_poi_by_coordinates(&coordinates).await? {
            Some(poi) => poi,
            None => {
                let resolved = self.geocoder.political_geo_info(&coordinates).await?;
                let poi = Poi {
                    id: PoiId::new(),
                    location: GeoPoint::new(longitude, latitude),
                    address: address.to_string(),
                    alias: alias.to_string(),
                    country: resolved.address.country,
                    state: resolved.address.state,
                    county: resolved.address.county,
                    place_type: place_type.to_string(),
                    ..Poi::default()
                };
                self.store.insert_poi(&poi).await?;
                poi
            }
        };

        if self
            .store
            .backfill_poi_names(poi.id, alias, address)
            .await?
        {
            poi.alias = alias.to_string();
            poi.address = address.to_string();
        }

        let now = Utc::now();
        if poi.metric.is_stale(now) {
            match self.metrics.sync_poi_metrics(poi.id).await {
                Ok(metric) => {
                    poi.metric = metric;
                    // pick up the freshly-written composite score
                    poi = self.store.get_poi(poi.id).await?;
                }
                Err(err) => {
                    tracing::error!(poi_id = %poi.id, error = %err, "poi metric sync failed");
                }
            }
        }

        let profile_poi = ProfilePoi {
            id: poi.id,
            alias: alias.to_string(),
            address: address.to_string(),
            score: poi.score,
            place_type: place_type.to_string(),
            monitored: true,
            metric: poi.metric.clone(),
            resource_ratings: Default::default(),
            updated_at: now.timestamp(),
        };
        self.store
            .append_poi_to_profile(account_number, &profile_poi)
            .await?;

        Ok(PoiDetail {
            profile_poi,
            location: Some(poi.location.to_location()),
        })
    }

    /// The account's monitored POIs in profile order, with current
    /// scores and locations joined from the shared documents.
    pub async fn list_poi(&self, account_number: &str) -> Result<Vec<PoiDetail>, GatewayError> {
        let profile = self.store.get_profile(account_number).await?;

        let mut details = Vec::new();
        for entry in profile
            .points_of_interest
            .into_iter()
            .filter(|p| p.monitored)
        {
            let poi = self.store.get_poi(entry.id).await.map_err(|_| {
                tracing::error!(poi_id = %entry.id, "profile references missing poi");
                GatewayError::internal("poi data wrongly retrieved or removed")
            })?;
            let mut entry = entry;
            entry.score = poi.score;
            details.push(PoiDetail {
                profile_poi: entry,
                location: Some(poi.location.to_location()),
            });
        }

        Ok(details)
    }

    /// Resource-based discovery: rated places within the search radius,
    /// best resource score first.
    pub async fn list_poi_by_resource(
        &self,
        resource_id: &str,
        location: &Location,
    ) -> Result<Vec<Poi>, GatewayError> {
        self.store.list_poi_by_resource(resource_id, location).await
    }

    /// Free-text discovery over alias and address.
    pub async fn list_poi_by_text(
        &self,
        text: &str,
        location: &Location,
    ) -> Result<Vec<Poi>, GatewayError> {
        self.store.list_poi_by_text(text, location).await
    }

    /// Place-type discovery.
    pub async fn list_poi_by_place_type(
        &self,
        place_type: &str,
        location: &Location,
    ) -> Result<Vec<Poi>, GatewayError> {
        self.store.list_poi_by_place_type(place_type, location).await
    }

    /// Loads a POI, resolving political address components lazily.
    pub async fn get_poi(&self, poi_id: PoiId) -> Result<Poi, GatewayError> {
        let mut poi = self.store.get_poi(poi_id).await?;
        if poi.country.is_empty() {
            let resolved = self.metrics.resolve_poi_location(&poi).await?;
            poi.country = resolved.address.country;
            poi.state = resolved.address.state;
            poi.county = resolved.address.county;
        }
        Ok(poi)
    }

    /// Renames the account's subscription.
    pub async fn update_poi_alias(
        &self,
        account_number: &str,
        poi_id: PoiId,
        alias: &str,
    ) -> Result<(), GatewayError> {
        self.store
            .update_profile_poi_alias(account_number, poi_id, alias)
            .await
    }

    /// Reorders the account's subscription list.
    pub async fn update_poi_order(
        &self,
        account_number: &str,
        order: &[PoiId],
    ) -> Result<(), GatewayError> {
        self.store
            .update_profile_poi_order(account_number, order)
            .await
    }

    /// Un-monitors the POI for this account only.
    pub async fn delete_poi(
        &self,
        account_number: &str,
        poi_id: PoiId,
    ) -> Result<(), GatewayError> {
        self.store
            .unmonitor_profile_poi(account_number, poi_id)
            .await
    }

    /// Adds official (by id) and customized (by name) resources to a
    /// POI. The per-place resource set only ever grows.
    pub async fn add_poi_resources(
        &self,
        poi_id: PoiId,
        resource_ids: &[String],
        new_names: &[String],
        localizer: &Localizer,
    ) -> Result<Vec<Resource>, GatewayError> {
        let mut resources = Vec::with_capacity(resource_ids.len() + new_names.len());

        for id in resource_ids {
            let name = localizer
                .resource_name(id)
                .ok_or(GatewayError::InvalidParameters)?;
            resources.push(Resource {
                id: id.clone(),
                name,
                important: false,
            });
        }
        for name in new_names {
            let name = name.trim();
            if name.is_empty() {
                return Err(GatewayError::EmptyPoiResourceName);
            }
            resources.push(Resource {
                id: Resource::customized_id(name),
                name: name.to_string(),
                important: false,
            });
        }

        self.store.add_poi_resources(poi_id, &resources).await?;
        Ok(resources)
    }

    /// The rate-able resources for a POI: the official catalog
    /// (optionally only the important subset), plus resources already
    /// added to this place when `include_added` is set.
    pub async fn get_poi_resources(
        &self,
        poi_id: PoiId,
        important_only: bool,
        include_added: bool,
        localizer: &Localizer,
    ) -> Result<Vec<Resource>, GatewayError> {
        let mut resources = if important_only {
            localizer.important_resources()
        } else {
            localizer.resources()
        };

        if include_added {
            for added in self.store.get_poi_resources(poi_id).await? {
                if !resources.iter().any(|r| r.id == added.id) {
                    resources.push(added);
                }
            }
        }

        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::location::AddressComponent;
    use crate::external::geocoder::StaticGeocoder;
    use crate::persistence::MemoryStore;

    fn service(store: Arc<MemoryStore>) -> PoiService {
        let geocoder = Arc::new(StaticGeocoder {
            address: AddressComponent {
                country: "Taiwan".to_string(),
                state: "Taipei City".to_string(),
                county: String::new(),
            },
            fail: false,
        });
        let metrics = MetricService::new(store.clone(), geocoder.clone());
        PoiService::new(store, geocoder, metrics)
    }

    async fn seed_profile(store: &MemoryStore, account: &str) {
        let profile = crate::domain::profile::Profile {
            account_number: account.to_string(),
            ..Default::default()
        };
        store.create_profile(&profile, account).await.unwrap();
    }

    #[tokio::test]
    async fn add_poi_creates_document_and_subscription() {
        let store = Arc::new(MemoryStore::new());
        seed_profile(&store, "acct").await;

        let detail = service(store.clone())
            .add_poi("acct", "Corner store", "1 Main St", "store", 121.5654, 25.033)
            .await
            .unwrap();
        assert!(detail.profile_poi.monitored);
        assert_eq!(detail.profile_poi.alias, "Corner store");

        let poi = store.get_poi(detail.profile_poi.id).await.unwrap();
        assert_eq!(poi.country, "Taiwan");

        let list = service(store).list_poi("acct").await.unwrap();
        assert_eq!(list.len(), 1);
    }

    #[tokio::test]
    async fn add_poi_reuses_existing_coordinates() {
        let store = Arc::new(MemoryStore::new());
        seed_profile(&store, "a").await;
        seed_profile(&store, "b").await;
        let service = service(store.clone());

        let first = service
            .add_poi("a", "Store", "1 Main St", "store", 121.0, 25.0)
            .await
            .unwrap();
        let second = service
            .add_poi("b", "Same place", "1 Main St", "store", 121.0, 25.0)
            .await
            .unwrap();
        assert_eq!(first.profile_poi.id, second.profile_poi.id);
    }

    #[tokio::test]
    async fn unmonitored_pois_disappear_from_list_and_come_back() {
        let store = Arc::new(MemoryStore::new());
        seed_profile(&store, "acct").await;
        let service = service(store);

        let detail = service
            .add_poi("acct", "Store", "1 Main St", "store", 121.0, 25.0)
            .await
            .unwrap();
        let poi_id = detail.profile_poi.id;

        service.delete_poi("acct", poi_id).await.unwrap();
        assert!(service.list_poi("acct").await.unwrap().is_empty());

        // re-adding re-monitors the same subscription
        service
            .add_poi("acct", "Store", "1 Main St", "store", 121.0, 25.0)
            .await
            .unwrap();
        assert_eq!(service.list_poi("acct").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reorder_honors_requested_order_and_rejects_foreign_ids() {
        let store = Arc::new(MemoryStore::new());
        seed_profile(&store, "acct").await;
        let service = service(store);

        let first = service
            .add_poi("acct", "A", "addr", "store", 121.0, 25.0)
            .await
            .unwrap();
        let second = service
            .add_poi("acct", "B", "addr", "store", 121.1, 25.0)
            .await
            .unwrap();

        service
            .update_poi_order("acct", &[second.profile_poi.id, first.profile_poi.id])
            .await
            .unwrap();
        let list = service.list_poi("acct").await.unwrap();
        assert_eq!(list[0].profile_poi.id, second.profile_poi.id);

        let foreign = PoiId::new();
        let err = service.update_poi_order("acct", &[foreign]).await;
        assert!(matches!(err, Err(GatewayError::PoiListMismatch)));
    }

    #[tokio::test]
    async fn customized_resource_requires_a_name() {
        let store = Arc::new(MemoryStore::new());
        seed_profile(&store, "acct").await;
        let service = service(store);
        let detail = service
            .add_poi("acct", "A", "addr", "store", 121.0, 25.0)
            .await
            .unwrap();

        let localizer = Localizer::new("en");
        let err = service
            .add_poi_resources(
                detail.profile_poi.id,
                &[],
                &["   ".to_string()],
                &localizer,
            )
            .await;
        assert!(matches!(err, Err(GatewayError::EmptyPoiResourceName)));

        let added = service
            .add_poi_resources(
                detail.profile_poi.id,
                &["resource_1".to_string()],
                &["Free parking".to_string()],
                &localizer,
            )
            .await
            .unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(added[1].id, Resource::customized_id("Free parking"));
    }

    #[tokio::test]
    async fn resource_listing_filters_and_includes_added() {
        let store = Arc::new(MemoryStore::new());
        seed_profile(&store, "acct").await;
        let service = service(store);
        let detail = service
            .add_poi("acct", "A", "addr", "store", 121.0, 25.0)
            .await
            .unwrap();
        let poi_id = detail.profile_poi.id;

        let localizer = Localizer::new("en");
        service
            .add_poi_resources(poi_id, &[], &["Free parking".to_string()], &localizer)
            .await
            .unwrap();

        let important = service
            .get_poi_resources(poi_id, true, false, &localizer)
            .await
            .unwrap();
        assert_eq!(important.len(), 30);

        let all = service
            .get_poi_resources(poi_id, false, true, &localizer)
            .await
            .unwrap();
        assert_eq!(all.len(), 127);
    }
}
