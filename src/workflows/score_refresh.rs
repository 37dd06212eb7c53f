//! Account/POI state refresh: the workflow behind every report and
//! rating submission.

use chrono::{DateTime, Utc};

use crate::domain::day::{account_offset, local_day_start};
use crate::domain::ids::PoiId;
use crate::domain::metric::Metric;
use crate::domain::profile::{NudgeType, Profile};
use crate::domain::score_record::ScoreRecordType;
use crate::error::GatewayError;
use crate::persistence::Store;
use crate::score;

use super::engine::{WorkflowEngine, WorkflowError};

/// Refuse to recompute a POI metric written less than this many seconds
/// ago; bursts of reports collapse into one refresh.
const POI_REFRESH_GUARD_SECONDS: i64 = 5;

/// Summary of how notifications are going to be delivered after a
/// refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationProfile {
    pub state_changed_accounts: Vec<String>,
    pub symptoms_spike_accounts: Vec<String>,
    pub report_risk_area: bool,
    pub remind_good_behavior: bool,
}

/// Freshness state of a POI metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoiMetricState {
    /// Recently synced; serve as-is.
    Fresh,
    /// Older than the update interval; the next read or nudge triggers a
    /// sync.
    Stale,
    /// A sync workflow currently holds the claim.
    Updating,
}

impl PoiMetricState {
    /// Classifies a metric given the wall clock and whether a refresh
    /// workflow is in flight.
    #[must_use]
    pub fn of(metric: &Metric, now: DateTime<Utc>, refresh_in_flight: bool) -> Self {
        if refresh_in_flight {
            Self::Updating
        } else if metric.is_stale(now) {
            Self::Stale
        } else {
            Self::Fresh
        }
    }
}

impl WorkflowEngine {
    /// Workflow id for a state refresh.
    #[must_use]
    pub fn state_refresh_id(account_number: &str, poi_id: Option<PoiId>) -> String {
        match poi_id {
            Some(poi_id) => format!("state-refresh:{poi_id}"),
            None => format!("state-refresh:{account_number}"),
        }
    }

    /// Runs the full refresh cycle for an account or one of its POIs:
    /// collect → score → persist → append history → diff → decide
    /// notifications → dispatch.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::AlreadyStarted`] on a duplicate concurrent start;
    /// activity errors after their retries are exhausted.
    pub async fn run_account_state_refresh(
        &self,
        account_number: &str,
        poi_id: Option<PoiId>,
    ) -> Result<NotificationProfile, WorkflowError> {
        let _guard = self.claim(&Self::state_refresh_id(account_number, poi_id))?;

        let metric = match poi_id {
            Some(poi_id) => match self.calculate_poi_state(poi_id).await? {
                Some(metric) => metric,
                None => {
                    tracing::debug!(%poi_id, "poi metric refreshed too recently, skipping");
                    return Ok(NotificationProfile::default());
                }
            },
            None => self.calculate_account_state(account_number).await?,
        };

        let profile = self
            .refresh_location_state(account_number, poi_id, metric)
            .await?;
        self.dispatch_notifications(account_number, poi_id, &profile)
            .await;

        Ok(profile)
    }

    /// Final fan-out after a refresh: failures are reported, never
    /// fatal. Missing a nudge beats blocking the refresh pipeline.
    pub(crate) async fn dispatch_notifications(
        &self,
        account_number: &str,
        poi_id: Option<PoiId>,
        profile: &NotificationProfile,
    ) {
        if !profile.state_changed_accounts.is_empty() {
            if let Err(err) = self
                .notify_location_state(poi_id, &profile.state_changed_accounts)
                .await
            {
                tracing::error!(error = %err, "location state notification failed");
            }
        }
        if !profile.symptoms_spike_accounts.is_empty() {
            if let Err(err) = self
                .notify_symptom_spike(&profile.symptoms_spike_accounts)
                .await
            {
                tracing::error!(error = %err, "symptom spike notification failed");
            }
        }
        if profile.report_risk_area {
            if let Err(err) = self
                .run_behavior_on_entering_risk_area(account_number)
                .await
            {
                tracing::error!(error = %err, "risk area behavior nudge failed");
            }
        }
        if profile.remind_good_behavior {
            if let Err(err) = self
                .run_behavior_follow_up_on_spike_area(account_number)
                .await
            {
                tracing::error!(error = %err, "behavior reminder failed");
            }
        }
    }

    /// Computes the fresh neighborhood metric for an account's current
    /// location and appends today's individual score history row.
    pub(crate) async fn calculate_account_state(
        &self,
        account_number: &str,
    ) -> Result<Metric, GatewayError> {
        let profile = self.store.get_profile(account_number).await?;
        let location = profile
            .last_location()
            .ok_or(GatewayError::UnknownAccountLocation)?;

        let raw = self.metrics.collect_raw_metrics(location).await?;
        let now = Utc::now();
        let metric = score::calculate_metric(raw, profile.score_coefficient.as_ref(), now);

        let (composite, _) =
            score::calculate_individual_autonomy_score(&profile.individual_metric, &metric);
        // Score chart history is best-effort.
        if let Err(err) = self
            .store
            .add_score_record(
                account_number,
                ScoreRecordType::Individual,
                composite,
                now.timestamp(),
            )
            .await
        {
            tracing::error!(error = %err, account = %account_number, "score history append failed");
        }

        Ok(metric)
    }

    /// Computes the fresh neighborhood metric for a POI's location.
    /// Returns `None` when the metric was written moments ago.
    pub(crate) async fn calculate_poi_state(
        &self,
        poi_id: PoiId,
    ) -> Result<Option<Metric>, GatewayError> {
        let poi = self.store.get_poi(poi_id).await?;
        let now = Utc::now();
        if now.timestamp() - poi.metric.last_update < POI_REFRESH_GUARD_SECONDS {
            return Ok(None);
        }

        let location = self.metrics.resolve_poi_location(&poi).await?;
        let raw = self.metrics.collect_raw_metrics(location).await?;
        Ok(Some(score::calculate_metric(raw, None, now)))
    }

    /// Persists a freshly-computed metric and derives the notification
    /// plan from the before/after difference.
    pub(crate) async fn refresh_location_state(
        &self,
        account_number: &str,
        poi_id: Option<PoiId>,
        metric: Metric,
    ) -> Result<NotificationProfile, GatewayError> {
        match poi_id {
            Some(poi_id) => self.refresh_poi_state(poi_id, metric).await,
            None => self.refresh_profile_state(account_number, metric).await,
        }
    }

    async fn refresh_poi_state(
        &self,
        poi_id: PoiId,
        metric: Metric,
    ) -> Result<NotificationProfile, GatewayError> {
        let now = Utc::now();
        let poi = self.store.get_poi(poi_id).await?;

        let (autonomy_score, _, autonomy_score_delta) =
            score::calculate_poi_autonomy_score(&poi.resource_ratings.resources, &metric);

        self.with_retries("update-poi-metric", || {
            let metric = metric.clone();
            async move {
                self.store
                    .update_poi_metric(poi_id, &metric, autonomy_score, autonomy_score_delta)
                    .await
            }
        })
        .await?;

        if let Err(err) = self
            .store
            .add_score_record(
                &poi_id.to_string(),
                ScoreRecordType::Poi,
                autonomy_score,
                now.timestamp(),
            )
            .await
        {
            tracing::error!(error = %err, %poi_id, "score history append failed");
        }

        let mut profile_summary = NotificationProfile::default();
        for profile in self.store.get_profiles_by_poi(poi_id).await? {
            let Some(entry) = profile.poi(poi_id) else {
                continue;
            };
            let old_metric = entry.metric.clone();

            self.with_retries("update-profile-poi-metric", || {
                let metric = metric.clone();
                let account = profile.account_number.clone();
                async move {
                    self.store
                        .update_profile_poi_metric(&account, poi_id, &metric, autonomy_score)
                        .await
                }
            })
            .await?;

            if spike_should_notify(&profile, &old_metric, &metric, now) {
                profile_summary
                    .symptoms_spike_accounts
                    .push(profile.account_number.clone());
            }

            if score::check_score_color_change(old_metric.score, metric.score) {
                tracing::debug!(
                    account = %profile.account_number,
                    old = old_metric.score,
                    new = metric.score,
                    "state color changed"
                );
                profile_summary
                    .state_changed_accounts
                    .push(profile.account_number.clone());
            }
        }

        Ok(profile_summary)
    }

    async fn refresh_profile_state(
        &self,
        account_number: &str,
        metric: Metric,
    ) -> Result<NotificationProfile, GatewayError> {
        let now = Utc::now();
        let profile = self.store.get_profile(account_number).await?;
        let old_metric = profile.metric.clone();

        self.with_retries("update-profile-metric", || {
            let metric = metric.clone();
            async move { self.store.update_profile_metric(account_number, &metric).await }
        })
        .await?;

        let mut summary = NotificationProfile::default();

        // Entering a symptom-spike area: the delta crosses the threshold
        // and the 90-minute cool-down has passed.
        if profile.nudge_cooled_down(NudgeType::BehaviorOnSymptomSpikeArea, now.timestamp())
            && old_metric.symptom_delta < 10.0
            && metric.symptom_delta >= 10.0
        {
            summary.remind_good_behavior = true;
        }

        if spike_should_notify(&profile, &old_metric, &metric, now) {
            summary
                .symptoms_spike_accounts
                .push(profile.account_number.clone());
        }

        let changed = old_metric.last_update != 0
            && score::check_score_color_change(old_metric.score, metric.score);
        if changed {
            tracing::debug!(
                account = %account_number,
                old = old_metric.score,
                new = metric.score,
                "state color changed"
            );
            summary
                .state_changed_accounts
                .push(account_number.to_string());
        }

        // Only report the risk area when a state change is detected and
        // the score is below the green bucket.
        if changed && metric.score < 67.0 {
            summary.report_risk_area = true;
        }

        Ok(summary)
    }
}

/// Spike notification rule: a non-empty spike list fires when the last
/// notified spike day is in the past, or when today's list grew. A spike
/// day in the future (clock skew) only logs a warning.
fn spike_should_notify(
    profile: &Profile,
    old_metric: &Metric,
    new_metric: &Metric,
    now: DateTime<Utc>,
) -> bool {
    let current_len = new_metric.details.symptoms.last_spike_list.len();
    if current_len == 0 {
        return false;
    }

    let offset = account_offset(&profile.timezone);
    let account_today = local_day_start(now.timestamp(), offset);
    let last_spike_day = local_day_start(old_metric.details.symptoms.last_spike_update, offset);

    if last_spike_day == account_today {
        current_len > old_metric.details.symptoms.last_spike_list.len()
    } else if last_spike_day < account_today {
        true
    } else {
        tracing::warn!(
            account = %profile.account_number,
            account_today,
            last_spike_day,
            "last spike day is greater than today"
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::location::GeoPoint;
    use crate::domain::metric::{Details, SymptomDetail, METRIC_UPDATE_INTERVAL};
    use crate::domain::poi::Poi;
    use crate::domain::profile::ProfilePoi;
    use crate::domain::report::{Symptom, SymptomReport, FEVER};
    use crate::external::geocoder::StaticGeocoder;
    use crate::external::notifier::RecordingNotifier;
    use crate::persistence::{MemoryStore, Store};
    use crate::service::metric_service::MetricService;

    fn engine(store: Arc<MemoryStore>, notifier: Arc<RecordingNotifier>) -> WorkflowEngine {
        let geocoder = Arc::new(StaticGeocoder {
            address: crate::domain::location::AddressComponent {
                country: "Taiwan".to_string(),
                ..Default::default()
            },
            fail: false,
        });
        let metrics = MetricService::new(store.clone(), geocoder);
        WorkflowEngine::new(store, metrics, notifier)
    }

    fn metric_with_spike(score: f64, spike: &[&str], spike_update: i64) -> Metric {
        Metric {
            score,
            last_update: 1,
            details: Details {
                symptoms: SymptomDetail {
                    last_spike_list: spike.iter().map(|s| (*s).to_string()).collect(),
                    last_spike_update: spike_update,
                    ..SymptomDetail::default()
                },
                ..Details::default()
            },
            ..Metric::default()
        }
    }

    async fn seed_profile(store: &MemoryStore, account: &str, metric: Metric) -> Profile {
        let profile = Profile {
            account_number: account.to_string(),
            location: Some(GeoPoint::new(121.0, 25.0)),
            timezone: "GMT+8".to_string(),
            metric,
            ..Profile::default()
        };
        store.create_profile(&profile, account).await.unwrap();
        profile
    }

    #[tokio::test]
    async fn color_change_is_detected_and_risk_area_flagged() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine(store.clone(), notifier);
        seed_profile(&store, "acct", metric_with_spike(80.0, &[], 0)).await;

        let new_metric = Metric {
            score: 30.0,
            ..Metric::default()
        };
        let summary = engine
            .refresh_location_state("acct", None, new_metric)
            .await
            .unwrap();
        assert_eq!(summary.state_changed_accounts, vec!["acct".to_string()]);
        assert!(summary.report_risk_area);
    }

    #[tokio::test]
    async fn color_change_into_green_is_not_a_risk_area() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine(store.clone(), notifier);
        seed_profile(&store, "acct", metric_with_spike(40.0, &[], 0)).await;

        let summary = engine
            .refresh_location_state(
                "acct",
                None,
                Metric {
                    score: 90.0,
                    ..Metric::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(summary.state_changed_accounts.len(), 1);
        assert!(!summary.report_risk_area);
    }

    #[tokio::test]
    async fn entering_a_risk_area_dispatches_the_behavior_nudge() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine(store.clone(), notifier.clone());
        seed_profile(&store, "acct", metric_with_spike(80.0, &[], 0)).await;

        let summary = engine
            .refresh_location_state(
                "acct",
                None,
                Metric {
                    score: 30.0,
                    ..Metric::default()
                },
            )
            .await
            .unwrap();
        assert!(summary.report_risk_area);

        engine.dispatch_notifications("acct", None, &summary).await;

        let templates: Vec<String> = notifier.sent().into_iter().map(|(_, t, _)| t).collect();
        assert!(templates
            .contains(&crate::external::notifier::TEMPLATE_NEW_LOCATION_STATUS_CHANGE.to_string()));
        assert!(templates
            .contains(&crate::external::notifier::TEMPLATE_BEHAVIOR_ON_RISK_AREA.to_string()));

        // the nudge installs its cool-down
        let profile = store.get_profile("acct").await.unwrap();
        assert!(profile.last_nudge.contains_key(&NudgeType::BehaviorOnRiskArea));
    }

    #[tokio::test]
    async fn green_transition_dispatches_no_behavior_nudge() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine(store.clone(), notifier.clone());
        seed_profile(&store, "acct", metric_with_spike(40.0, &[], 0)).await;

        let summary = engine
            .refresh_location_state(
                "acct",
                None,
                Metric {
                    score: 90.0,
                    ..Metric::default()
                },
            )
            .await
            .unwrap();
        engine.dispatch_notifications("acct", None, &summary).await;

        let templates: Vec<String> = notifier.sent().into_iter().map(|(_, t, _)| t).collect();
        assert!(!templates
            .contains(&crate::external::notifier::TEMPLATE_BEHAVIOR_ON_RISK_AREA.to_string()));
    }

    #[tokio::test]
    async fn first_ever_metric_never_signals_color_change() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine(store.clone(), notifier);
        // last_update == 0 means the profile never had a metric
        let mut metric = metric_with_spike(0.0, &[], 0);
        metric.last_update = 0;
        seed_profile(&store, "acct", metric).await;

        let summary = engine
            .refresh_location_state(
                "acct",
                None,
                Metric {
                    score: 90.0,
                    ..Metric::default()
                },
            )
            .await
            .unwrap();
        assert!(summary.state_changed_accounts.is_empty());
    }

    #[tokio::test]
    async fn spike_notifies_when_list_grows_same_day() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine(store.clone(), notifier);
        let now = Utc::now().timestamp();
        seed_profile(&store, "acct", metric_with_spike(50.0, &[FEVER], now)).await;

        let new_metric = metric_with_spike(50.0, &[FEVER, "cough"], now);
        let summary = engine
            .refresh_location_state("acct", None, new_metric)
            .await
            .unwrap();
        assert_eq!(summary.symptoms_spike_accounts, vec!["acct".to_string()]);
    }

    #[tokio::test]
    async fn spike_same_day_same_length_stays_quiet() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine(store.clone(), notifier);
        let now = Utc::now().timestamp();
        seed_profile(&store, "acct", metric_with_spike(50.0, &[FEVER], now)).await;

        let summary = engine
            .refresh_location_state("acct", None, metric_with_spike(50.0, &[FEVER], now))
            .await
            .unwrap();
        assert!(summary.symptoms_spike_accounts.is_empty());
    }

    #[tokio::test]
    async fn spike_from_a_previous_day_notifies() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine(store.clone(), notifier);
        let two_days_ago = Utc::now().timestamp() - 2 * 86_400;
        seed_profile(&store, "acct", metric_with_spike(50.0, &[FEVER], two_days_ago)).await;

        let summary = engine
            .refresh_location_state(
                "acct",
                None,
                metric_with_spike(50.0, &[FEVER], Utc::now().timestamp()),
            )
            .await
            .unwrap();
        assert_eq!(summary.symptoms_spike_accounts.len(), 1);
    }

    #[tokio::test]
    async fn clock_skew_spike_is_dropped() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine(store.clone(), notifier);
        let tomorrow = Utc::now().timestamp() + 2 * 86_400;
        seed_profile(&store, "acct", metric_with_spike(50.0, &[FEVER], tomorrow)).await;

        let summary = engine
            .refresh_location_state(
                "acct",
                None,
                metric_with_spike(50.0, &[FEVER], Utc::now().timestamp()),
            )
            .await
            .unwrap();
        assert!(summary.symptoms_spike_accounts.is_empty());
    }

    #[tokio::test]
    async fn behavior_reminder_requires_delta_crossing_and_cool_down() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine(store.clone(), notifier);

        let mut old = metric_with_spike(50.0, &[], 0);
        old.symptom_delta = 5.0;
        seed_profile(&store, "acct", old).await;

        let mut new_metric = metric_with_spike(50.0, &[], 0);
        new_metric.symptom_delta = 15.0;
        let summary = engine
            .refresh_location_state("acct", None, new_metric.clone())
            .await
            .unwrap();
        assert!(summary.remind_good_behavior);

        // A recent nudge suppresses the reminder.
        store
            .update_last_nudge(
                "acct",
                NudgeType::BehaviorOnSymptomSpikeArea,
                Utc::now().timestamp() - 10 * 60,
            )
            .await
            .unwrap();
        let mut old_again = new_metric.clone();
        old_again.symptom_delta = 5.0;
        store.update_profile_metric("acct", &old_again).await.unwrap();

        let summary = engine
            .refresh_location_state("acct", None, new_metric)
            .await
            .unwrap();
        assert!(!summary.remind_good_behavior);
    }

    #[tokio::test]
    async fn full_refresh_updates_metric_and_history() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine(store.clone(), notifier);
        seed_profile(&store, "acct", Metric::default()).await;

        // one fever report nearby so the collector sees data
        store
            .save_symptom_report(&SymptomReport {
                profile_id: "p".to_string(),
                account_number: "other".to_string(),
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

        let before = Utc::now().timestamp();
        engine.run_account_state_refresh("acct", None).await.unwrap();

        let profile = store.get_profile("acct").await.unwrap();
        assert!(profile.metric.last_update >= before);

        let record = store
            .get_score_record(
                "acct",
                ScoreRecordType::Individual,
                &crate::domain::day::utc_date_string(before),
            )
            .await
            .unwrap()
            .expect("history row");
        assert_eq!(record.update_times, 1.0);

        // run again: history accumulates
        engine.run_account_state_refresh("acct", None).await.unwrap();
        let record = store
            .get_score_record(
                "acct",
                ScoreRecordType::Individual,
                &crate::domain::day::utc_date_string(before),
            )
            .await
            .unwrap()
            .expect("history row");
        assert_eq!(record.update_times, 2.0);
    }

    #[tokio::test]
    async fn poi_refresh_updates_subscribers() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine(store.clone(), notifier.clone());

        let poi = Poi {
            location: GeoPoint::new(121.0, 25.0),
            country: "Taiwan".to_string(),
            ..Poi::default()
        };
        store.insert_poi(&poi).await.unwrap();

        let mut profile = seed_profile(
            &store,
            "acct",
            metric_with_spike(50.0, &[], 0),
        )
        .await;
        profile.points_of_interest.push(ProfilePoi {
            id: poi.id,
            monitored: true,
            metric: metric_with_spike(80.0, &[], 0),
            ..ProfilePoi::default()
        });
        store
            .append_poi_to_profile("acct", &profile.points_of_interest[0])
            .await
            .unwrap();

        let summary = engine
            .run_account_state_refresh("acct", Some(poi.id))
            .await
            .unwrap();
        // old embedded score 0 (default) vs fresh neighborhood score:
        // subscribers see the metric replaced either way
        let stored = store.get_profile("acct").await.unwrap();
        let entry = stored.poi(poi.id).expect("subscription");
        assert!(entry.metric.last_update > 0);
        let _ = summary;
    }

    #[test]
    fn poi_metric_state_transitions() {
        let now = Utc::now();
        let fresh = Metric {
            last_update: now.timestamp(),
            ..Metric::default()
        };
        let stale = Metric {
            last_update: now.timestamp() - METRIC_UPDATE_INTERVAL.num_seconds() - 1,
            ..Metric::default()
        };

        assert_eq!(PoiMetricState::of(&fresh, now, false), PoiMetricState::Fresh);
        assert_eq!(PoiMetricState::of(&stale, now, false), PoiMetricState::Stale);
        assert_eq!(
            PoiMetricState::of(&stale, now, true),
            PoiMetricState::Updating
        );
        // a successful write makes it fresh again
        assert_eq!(PoiMetricState::of(&fresh, now, false), PoiMetricState::Fresh);
    }
}
