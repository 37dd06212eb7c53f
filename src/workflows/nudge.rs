//! Notification fan-out workflows.

use chrono::Utc;

use crate::domain::day::consecutive_day_starts;
use crate::domain::ids::PoiId;
use crate::domain::profile::NudgeType;
use crate::domain::report::{HIGH_RISK_SYMPTOMS, OFFICIAL_SYMPTOMS};
use crate::error::GatewayError;
use crate::persistence::Store;
use crate::external::notifier::{
    NotificationCenter, TEMPLATE_BEHAVIOR_FOLLOW_UP_ON_SPIKE_AREA,
    TEMPLATE_BEHAVIOR_ON_RISK_AREA, TEMPLATE_NEW_LOCATION_STATUS_CHANGE,
    TEMPLATE_SAVED_LOCATION_STATUS_CHANGE, TEMPLATE_SYMPTOM_FOLLOW_UP, TEMPLATE_SYMPTOM_SPIKE,
};

use super::engine::{WorkflowEngine, WorkflowError};

impl WorkflowEngine {
    /// Notifies accounts that a location's status color changed.
    ///
    /// With a POI id the saved-location template carries the place in
    /// its payload; otherwise the current-location template fires.
    /// Idempotent per `(account, template, day)`.
    pub async fn notify_location_state(
        &self,
        poi_id: Option<PoiId>,
        accounts: &[String],
    ) -> Result<(), GatewayError> {
        if accounts.is_empty() {
            tracing::warn!("location state notification without accounts");
            return Ok(());
        }

        let (template, params) = match poi_id {
            Some(poi_id) => (
                TEMPLATE_SAVED_LOCATION_STATUS_CHANGE,
                serde_json::json!({
                    "notification_type": "RISK_LEVEL_CHANGED",
                    "poi_id": poi_id,
                }),
            ),
            None => (
                TEMPLATE_NEW_LOCATION_STATUS_CHANGE,
                serde_json::json!({ "notification_type": "RISK_LEVEL_CHANGED" }),
            ),
        };

        let receivers: Vec<String> = accounts
            .iter()
            .filter(|account| self.first_notification_today(account, template))
            .cloned()
            .collect();
        if receivers.is_empty() {
            return Ok(());
        }

        self.notifier
            .notify_accounts_by_template(&receivers, template, params)
            .await
    }

    /// Notifies accounts about a local symptom spike, naming the
    /// spiking symptoms.
    pub async fn notify_symptom_spike(&self, accounts: &[String]) -> Result<(), GatewayError> {
        let receivers: Vec<String> = accounts
            .iter()
            .filter(|account| self.first_notification_today(account, TEMPLATE_SYMPTOM_SPIKE))
            .cloned()
            .collect();
        if receivers.is_empty() {
            return Ok(());
        }

        self.notifier
            .notify_accounts_by_template(
                &receivers,
                TEMPLATE_SYMPTOM_SPIKE,
                serde_json::json!({ "notification_type": "SYMPTOM_SPIKE" }),
            )
            .await
    }

    /// Seven-day follow-up after a high-risk symptom report.
    ///
    /// Sleeps out the delay, then re-checks that the account still has
    /// unresolved high-risk symptoms before sending. A duplicate start
    /// while one is pending returns [`WorkflowError::AlreadyStarted`];
    /// callers swallow it.
    pub async fn run_symptom_follow_up(&self, account_number: &str) -> Result<(), WorkflowError> {
        let _guard = self.claim(&format!("symptom-follow-up:{account_number}"))?;

        tokio::time::sleep(self.follow_up_delay).await;

        let profile = self.store.get_profile(account_number).await?;
        let profile_key = profile.id.to_string();
        let now = Utc::now();
        let (yesterday_start, _, tomorrow_start) = consecutive_day_starts(now);
        let distribution = self
            .store
            .find_symptom_distribution(
                Some(&profile_key),
                None,
                0,
                yesterday_start,
                tomorrow_start,
                true,
            )
            .await?;

        let still_high_risk = distribution
            .keys()
            .any(|id| HIGH_RISK_SYMPTOMS.contains(&id.as_str()));
        if !still_high_risk {
            tracing::info!(account = %account_number, "high-risk symptoms resolved, no follow-up");
            return Ok(());
        }

        let names: Vec<String> = distribution
            .keys()
            .filter(|id| HIGH_RISK_SYMPTOMS.contains(&id.as_str()))
            .filter_map(|id| {
                OFFICIAL_SYMPTOMS
                    .iter()
                    .find(|s| s.id == *id)
                    .map(|s| s.name.clone())
            })
            .collect();

        self.notifier
            .notify_accounts_by_template(
                &[account_number.to_string()],
                TEMPLATE_SYMPTOM_FOLLOW_UP,
                serde_json::json!({
                    "notification_type": "ACCOUNT_SYMPTOM_FOLLOW_UP",
                    "symptoms": names,
                }),
            )
            .await?;
        Ok(())
    }

    /// One-shot behavior reminder on entering a risk area, then a
    /// 90-minute cool-down.
    pub async fn run_behavior_on_entering_risk_area(
        &self,
        account_number: &str,
    ) -> Result<(), GatewayError> {
        self.behavior_nudge(
            account_number,
            NudgeType::BehaviorOnRiskArea,
            TEMPLATE_BEHAVIOR_ON_RISK_AREA,
        )
        .await
    }

    /// One-shot behavior reminder on entering a symptom-spike area,
    /// then a 90-minute cool-down.
    pub async fn run_behavior_follow_up_on_spike_area(
        &self,
        account_number: &str,
    ) -> Result<(), GatewayError> {
        self.behavior_nudge(
            account_number,
            NudgeType::BehaviorOnSymptomSpikeArea,
            TEMPLATE_BEHAVIOR_FOLLOW_UP_ON_SPIKE_AREA,
        )
        .await
    }

    async fn behavior_nudge(
        &self,
        account_number: &str,
        kind: NudgeType,
        template: &str,
    ) -> Result<(), GatewayError> {
        let now = Utc::now().timestamp();
        let profile = self.store.get_profile(account_number).await?;
        if !profile.nudge_cooled_down(kind, now) {
            tracing::debug!(account = %account_number, ?kind, "nudge still cooling down");
            return Ok(());
        }

        self.notifier
            .notify_accounts_by_template(
                &[account_number.to_string()],
                template,
                serde_json::json!({ "notification_type": "BEHAVIOR_REPORT_REQUIRED" }),
            )
            .await?;

        self.store
            .update_last_nudge(account_number, kind, now)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::domain::location::GeoPoint;
    use crate::domain::profile::Profile;
    use crate::domain::report::{Symptom, SymptomReport, FEVER, NASAL};
    use crate::external::geocoder::StaticGeocoder;
    use crate::external::notifier::RecordingNotifier;
    use crate::persistence::{MemoryStore, Store};
    use crate::service::metric_service::MetricService;

    fn engine(store: Arc<MemoryStore>, notifier: Arc<RecordingNotifier>) -> WorkflowEngine {
        let geocoder = Arc::new(StaticGeocoder::default());
        let metrics = MetricService::new(store.clone(), geocoder);
        let mut engine = WorkflowEngine::new(store, metrics, notifier);
        engine.follow_up_delay = Duration::from_millis(10);
        engine
    }

    async fn seed_profile(store: &MemoryStore, account: &str) -> Profile {
        let profile = Profile {
            account_number: account.to_string(),
            location: Some(GeoPoint::new(121.0, 25.0)),
            timezone: "GMT+8".to_string(),
            ..Profile::default()
        };
        store.create_profile(&profile, account).await.unwrap();
        profile
    }

    #[tokio::test]
    async fn location_state_uses_template_per_target() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine(store, notifier.clone());

        engine
            .notify_location_state(None, &["a".to_string()])
            .await
            .unwrap();
        let poi_id = PoiId::new();
        engine
            .notify_location_state(Some(poi_id), &["a".to_string()])
            .await
            .unwrap();

        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1, TEMPLATE_NEW_LOCATION_STATUS_CHANGE);
        assert_eq!(sent[1].1, TEMPLATE_SAVED_LOCATION_STATUS_CHANGE);
        assert_eq!(
            sent[1].2["poi_id"],
            serde_json::to_value(poi_id).unwrap()
        );
    }

    #[tokio::test]
    async fn location_state_is_idempotent_per_day() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine(store, notifier.clone());

        engine
            .notify_location_state(None, &["a".to_string()])
            .await
            .unwrap();
        engine
            .notify_location_state(None, &["a".to_string()])
            .await
            .unwrap();
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn follow_up_sends_when_high_risk_persists() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine(store.clone(), notifier.clone());
        let profile = seed_profile(&store, "acct").await;

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

        engine.run_symptom_follow_up("acct").await.unwrap();
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, TEMPLATE_SYMPTOM_FOLLOW_UP);
        assert_eq!(sent[0].2["symptoms"][0], "Fever");
    }

    #[tokio::test]
    async fn follow_up_stays_quiet_when_recovered() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine(store.clone(), notifier.clone());
        let profile = seed_profile(&store, "acct").await;

        // only a low-risk symptom remains
        store
            .save_symptom_report(&SymptomReport {
                profile_id: profile.id.to_string(),
                account_number: "acct".to_string(),
                official_symptoms: vec![Symptom {
                    id: NASAL.to_string(),
                    ..Symptom::default()
                }],
                customized_symptoms: Vec::new(),
                location: GeoPoint::new(121.0, 25.0),
                ts: Utc::now().timestamp(),
            })
            .await
            .unwrap();

        engine.run_symptom_follow_up("acct").await.unwrap();
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn duplicate_follow_up_start_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = Arc::new(engine(store.clone(), notifier));
        seed_profile(&store, "acct").await;

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run_symptom_follow_up("acct").await })
        };
        // give the first start a moment to claim
        tokio::time::sleep(Duration::from_millis(2)).await;
        let second = engine.run_symptom_follow_up("acct").await;
        assert!(matches!(second, Err(WorkflowError::AlreadyStarted(_))));
        let _ = first.await;
    }

    #[tokio::test]
    async fn behavior_nudge_installs_cool_down() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine(store.clone(), notifier.clone());
        seed_profile(&store, "acct").await;

        engine
            .run_behavior_on_entering_risk_area("acct")
            .await
            .unwrap();
        assert_eq!(notifier.sent().len(), 1);

        let profile = store.get_profile("acct").await.unwrap();
        assert!(profile.last_nudge.contains_key(&NudgeType::BehaviorOnRiskArea));

        // within the cool-down nothing more is sent
        engine
            .run_behavior_on_entering_risk_area("acct")
            .await
            .unwrap();
        assert_eq!(notifier.sent().len(), 1);
    }
}
