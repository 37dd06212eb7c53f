//! The place-rating engine.
//!
//! Per-user state (one rating per `(poi, resource)`, overwritten on
//! resubmission) and the per-POI running aggregates with
//! yesterday/today carry-over. Aggregate writes go through an
//! optimistic compare-and-swap so two concurrent submissions for the
//! same POI never lose an update.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::day::day_start_utc;
use crate::domain::ids::PoiId;
use crate::domain::rating::{
    PoiRatingsMetric, PoiResourceRating, ProfileRatingsMetric, RatingResource,
};
use crate::error::GatewayError;
use crate::persistence::Store;
use crate::score::resource_score;

/// Re-reads after a compare-and-swap conflict before giving up.
const RATING_WRITE_RETRIES: u32 = 3;

/// Coordinates per-user rating state and per-POI aggregates.
#[derive(Clone)]
pub struct RatingService {
    store: Arc<dyn Store>,
}

impl RatingService {
    /// Creates a new `RatingService`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Applies one user's rating submission to a POI.
    ///
    /// Scores outside 1..=5 are dropped as no-ops (0 means "unrated").
    /// A resubmission for a resource the user already rated updates the
    /// aggregate sum by the score difference and leaves the distinct
    /// rater count unchanged.
    ///
    /// The aggregate is written first: a profile rating must never exist
    /// without its aggregate counterpart, so if the compare-and-swap
    /// loop gives up the per-user state is left untouched.
    pub async fn update_poi_rating(
        &self,
        account_number: &str,
        poi_id: PoiId,
        ratings: Vec<RatingResource>,
    ) -> Result<(), GatewayError> {
        let now = Utc::now();
        let ratings: Vec<RatingResource> = ratings
            .into_iter()
            .filter(|r| (1.0..=5.0).contains(&r.score))
            .collect();
        if ratings.is_empty() {
            return Ok(());
        }

        // Prior per-user state decides new-vs-update per resource.
        let prior = self
            .store
            .get_profile_poi_rating(account_number, poi_id)
            .await?;

        let today_start = day_start_utc(now);
        let mut applied = false;
        for attempt in 0..RATING_WRITE_RETRIES {
            let snapshot = self.store.get_poi_ratings(poi_id).await?;
            let merged = merge_ratings(
                snapshot.metric,
                &ratings,
                &prior,
                today_start,
                now.timestamp(),
            );
            if self
                .store
                .write_poi_ratings(poi_id, &merged, snapshot.version)
                .await?
            {
                applied = true;
                break;
            }
            tracing::debug!(%poi_id, attempt, "rating aggregate write conflict, retrying");
        }
        if !applied {
            return Err(GatewayError::internal(
                "rating aggregate write kept conflicting",
            ));
        }

        let profile_metric = ProfileRatingsMetric {
            resources: ratings,
            last_update: now.timestamp(),
        };
        self.store
            .update_profile_poi_rating(account_number, poi_id, &profile_metric)
            .await
    }

    /// The requesting user's own ratings for a POI, highest score first.
    pub async fn get_profile_ratings(
        &self,
        account_number: &str,
        poi_id: PoiId,
    ) -> Result<ProfileRatingsMetric, GatewayError> {
        let mut metric = self
            .store
            .get_profile_poi_rating(account_number, poi_id)
            .await?;
        metric.resources.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(metric)
    }
}

/// Folds a submission into the POI aggregates.
///
/// For each touched resource: snapshot `last_day_*` when the previous
/// update happened before local UTC midnight, then apply the new score
/// as either a fresh rating or an in-place revision.
fn merge_ratings(
    mut metric: PoiRatingsMetric,
    submitted: &[RatingResource],
    prior: &ProfileRatingsMetric,
    today_start: i64,
    now: i64,
) -> PoiRatingsMetric {
    for rating in submitted {
        let old_score = prior
            .resources
            .iter()
            .find(|r| r.resource.id == rating.resource.id)
            .map(|r| r.score);

        let idx = match metric
            .resources
            .iter()
            .position(|r| r.resource.id == rating.resource.id)
        {
            Some(idx) => idx,
            None => {
                metric.resources.push(PoiResourceRating {
                    resource: rating.resource.clone(),
                    ..PoiResourceRating::default()
                });
                metric.resources.len() - 1
            }
        };
        let entry = &mut metric.resources[idx];

        if entry.last_update < today_start {
            entry.last_day_score = entry.score;
            entry.last_day_ratings = entry.ratings;
        }

        match old_score {
            Some(old) if old > 0.0 => {
                entry.sum_of_score += rating.score - old;
                if entry.ratings > 0 {
                    entry.score = entry.sum_of_score / entry.ratings as f64;
                }
            }
            _ => {
                let (count, sum, average) =
                    resource_score(entry.ratings, entry.sum_of_score, rating.score);
                entry.ratings = count;
                entry.sum_of_score = sum;
                entry.score = average;
            }
        }
        entry.last_update = now;
    }

    metric.last_update = now;
    metric
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::poi::Poi;
    use crate::domain::profile::{Profile, ProfilePoi};
    use crate::domain::rating::Resource;
    use crate::persistence::MemoryStore;

    fn rating(id: &str, score: f64) -> RatingResource {
        RatingResource {
            resource: Resource {
                id: id.to_string(),
                name: id.to_string(),
                important: false,
            },
            score,
        }
    }

    async fn setup(prior_sum: f64, prior_ratings: i64) -> (Arc<MemoryStore>, RatingService, PoiId) {
        let store = Arc::new(MemoryStore::new());
        let mut poi = Poi::default();
        if prior_ratings > 0 {
            poi.resource_ratings.resources.push(PoiResourceRating {
                resource: Resource {
                    id: "resource_1".to_string(),
                    name: "Hand sanitizer".to_string(),
                    important: true,
                },
                sum_of_score: prior_sum,
                score: prior_sum / prior_ratings as f64,
                ratings: prior_ratings,
                last_update: Utc::now().timestamp(),
                last_day_score: 0.0,
                last_day_ratings: 0,
            });
        }
        let poi_id = poi.id;
        store.insert_poi(&poi).await.unwrap();

        let profile = Profile {
            account_number: "u1".to_string(),
            points_of_interest: vec![ProfilePoi {
                id: poi_id,
                monitored: true,
                ..ProfilePoi::default()
            }],
            ..Profile::default()
        };
        store.create_profile(&profile, "token").await.unwrap();

        let service = RatingService::new(store.clone());
        (store, service, poi_id)
    }

    #[tokio::test]
    async fn first_rating_increments_count_and_sum() {
        let (store, service, poi_id) = setup(30.0, 8).await;

        service
            .update_poi_rating("u1", poi_id, vec![rating("resource_1", 4.0)])
            .await
            .unwrap();

        let poi = store.get_poi(poi_id).await.unwrap();
        let aggregate = poi.resource_ratings.get("resource_1").expect("aggregate");
        assert_eq!(aggregate.sum_of_score, 34.0);
        assert_eq!(aggregate.ratings, 9);
        assert!((aggregate.score - 34.0 / 9.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn re_rating_updates_in_place() {
        let (store, service, poi_id) = setup(30.0, 8).await;

        // The 8 prior ratings include this user's 3.
        service
            .update_poi_rating("u1", poi_id, vec![rating("resource_1", 3.0)])
            .await
            .unwrap();
        let poi = store.get_poi(poi_id).await.unwrap();
        let after_first = poi.resource_ratings.get("resource_1").unwrap().clone();
        assert_eq!(after_first.ratings, 9);
        assert_eq!(after_first.sum_of_score, 33.0);

        // Manually reset to the scenario baseline: sum=30 over 8 raters
        // with u1's prior vote of 3 included.
        let mut snapshot = store.get_poi_ratings(poi_id).await.unwrap();
        snapshot.metric.resources[0].sum_of_score = 30.0;
        snapshot.metric.resources[0].ratings = 8;
        snapshot.metric.resources[0].score = 30.0 / 8.0;
        store
            .write_poi_ratings(poi_id, &snapshot.metric, snapshot.version)
            .await
            .unwrap();

        service
            .update_poi_rating("u1", poi_id, vec![rating("resource_1", 4.0)])
            .await
            .unwrap();

        let poi = store.get_poi(poi_id).await.unwrap();
        let aggregate = poi.resource_ratings.get("resource_1").unwrap();
        assert_eq!(aggregate.sum_of_score, 31.0);
        assert_eq!(aggregate.ratings, 8);
        assert!((aggregate.score - 31.0 / 8.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn zero_scores_are_no_ops() {
        let (store, service, poi_id) = setup(30.0, 8).await;

        service
            .update_poi_rating("u1", poi_id, vec![rating("resource_1", 0.0)])
            .await
            .unwrap();

        let poi = store.get_poi(poi_id).await.unwrap();
        let aggregate = poi.resource_ratings.get("resource_1").unwrap();
        assert_eq!(aggregate.sum_of_score, 30.0);
        assert_eq!(aggregate.ratings, 8);
    }

    #[tokio::test]
    async fn midnight_crossing_snapshots_yesterday() {
        let (store, service, poi_id) = setup(0.0, 0).await;

        // Seed an aggregate last updated well before today.
        let snapshot = store.get_poi_ratings(poi_id).await.unwrap();
        let mut metric = snapshot.metric;
        metric.resources.push(PoiResourceRating {
            resource: Resource {
                id: "resource_1".to_string(),
                name: "Hand sanitizer".to_string(),
                important: true,
            },
            sum_of_score: 20.0,
            score: 4.0,
            ratings: 5,
            last_update: day_start_utc(Utc::now()) - 3600,
            last_day_score: 0.0,
            last_day_ratings: 0,
        });
        store
            .write_poi_ratings(poi_id, &metric, snapshot.version)
            .await
            .unwrap();

        service
            .update_poi_rating("u1", poi_id, vec![rating("resource_1", 5.0)])
            .await
            .unwrap();

        let poi = store.get_poi(poi_id).await.unwrap();
        let aggregate = poi.resource_ratings.get("resource_1").unwrap();
        assert_eq!(aggregate.last_day_score, 4.0);
        assert_eq!(aggregate.last_day_ratings, 5);
        assert_eq!(aggregate.ratings, 6);
        assert_eq!(aggregate.sum_of_score, 25.0);
    }

    #[tokio::test]
    async fn sum_tracks_user_scores_across_operations() {
        let (store, service, poi_id) = setup(0.0, 0).await;

        // add u1=4, revise to 5, then a no-op 0.
        service
            .update_poi_rating("u1", poi_id, vec![rating("resource_1", 4.0)])
            .await
            .unwrap();
        service
            .update_poi_rating("u1", poi_id, vec![rating("resource_1", 5.0)])
            .await
            .unwrap();
        service
            .update_poi_rating("u1", poi_id, vec![rating("resource_1", 0.0)])
            .await
            .unwrap();

        let poi = store.get_poi(poi_id).await.unwrap();
        let aggregate = poi.resource_ratings.get("resource_1").unwrap();
        assert_eq!(aggregate.ratings, 1);
        assert_eq!(aggregate.sum_of_score, 5.0);
        assert_eq!(aggregate.score, 5.0);
    }

    #[tokio::test]
    async fn profile_entries_always_have_aggregate_counterparts() {
        let (store, service, poi_id) = setup(0.0, 0).await;

        service
            .update_poi_rating(
                "u1",
                poi_id,
                vec![rating("resource_1", 4.0), rating("resource_2", 2.0)],
            )
            .await
            .unwrap();

        let profile_metric = store.get_profile_poi_rating("u1", poi_id).await.unwrap();
        let poi = store.get_poi(poi_id).await.unwrap();
        for entry in &profile_metric.resources {
            assert!(
                poi.resource_ratings.get(&entry.resource.id).is_some(),
                "missing aggregate for {}",
                entry.resource.id
            );
        }
    }

    #[tokio::test]
    async fn ratings_sorted_highest_first() {
        let (_, service, poi_id) = setup(0.0, 0).await;

        service
            .update_poi_rating(
                "u1",
                poi_id,
                vec![rating("resource_1", 2.0), rating("resource_2", 5.0)],
            )
            .await
            .unwrap();

        let metric = service.get_profile_ratings("u1", poi_id).await.unwrap();
        assert_eq!(metric.resources[0].resource.id, "resource_2");
        assert_eq!(metric.resources[1].resource.id, "resource_1");
    }
}
