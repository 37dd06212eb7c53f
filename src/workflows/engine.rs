//! The workflow engine.
//!
//! Durable, cancellable, at-least-once state machines built from
//! deterministic steps plus idempotent activities. The engine enforces
//! single-flight per workflow id (a duplicate start is a recoverable
//! error), bounds activity retries with exponential backoff, and tracks
//! per-day notification idempotency.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use crate::domain::day::utc_date_string;
use crate::error::GatewayError;
use crate::external::notifier::NotificationCenter;
use crate::persistence::Store;
use crate::service::metric_service::MetricService;

/// Activity retry attempts after the first failure.
pub(crate) const ACTIVITY_RETRIES: u32 = 2;

/// Base backoff delay; doubles per attempt.
pub(crate) const ACTIVITY_BACKOFF: Duration = Duration::from_millis(500);

/// Errors surfaced by workflow starts.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// A workflow with this id is already running. Callers that fire
    /// workflows opportunistically swallow this.
    #[error("workflow {0} already started")]
    AlreadyStarted(String),

    /// An activity kept failing after its retries.
    #[error(transparent)]
    Activity(#[from] GatewayError),
}

/// Shared engine state and collaborators.
pub struct WorkflowEngine {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) metrics: MetricService,
    pub(crate) notifier: Arc<dyn NotificationCenter>,
    running: Mutex<HashSet<String>>,
    notified: Mutex<HashSet<(String, String, String)>>,
    /// Delay before the symptom follow-up fires. Seven days in
    /// production; tests shrink it.
    pub(crate) follow_up_delay: Duration,
}

impl WorkflowEngine {
    /// Creates an engine over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        metrics: MetricService,
        notifier: Arc<dyn NotificationCenter>,
    ) -> Self {
        Self {
            store,
            metrics,
            notifier,
            running: Mutex::new(HashSet::new()),
            notified: Mutex::new(HashSet::new()),
            follow_up_delay: Duration::from_secs(7 * 24 * 3600),
        }
    }

    /// Claims a workflow id for execution.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::AlreadyStarted`] when a workflow with the same
    /// id is still running.
    pub(crate) fn claim(&self, workflow_id: &str) -> Result<WorkflowGuard<'_>, WorkflowError> {
        let mut running = self
            .running
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !running.insert(workflow_id.to_string()) {
            return Err(WorkflowError::AlreadyStarted(workflow_id.to_string()));
        }
        Ok(WorkflowGuard {
            engine: self,
            workflow_id: workflow_id.to_string(),
        })
    }

    fn release(&self, workflow_id: &str) {
        self.running
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(workflow_id);
    }

    /// True when this `(account, template)` pair has not been notified
    /// today yet; marks it as notified.
    pub(crate) fn first_notification_today(&self, account: &str, template: &str) -> bool {
        let day = utc_date_string(Utc::now().timestamp());
        self.notified
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert((account.to_string(), template.to_string(), day))
    }

    /// Runs an activity with bounded exponential-backoff retries.
    pub(crate) async fn with_retries<T, F, Fut>(
        &self,
        label: &str,
        mut activity: F,
    ) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let mut delay = ACTIVITY_BACKOFF;
        let mut last = None;
        for attempt in 0..=ACTIVITY_RETRIES {
            match activity().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::warn!(label, attempt, error = %err, "activity failed");
                    last = Some(err);
                }
            }
            if attempt < ACTIVITY_RETRIES {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
        Err(last.unwrap_or_else(|| GatewayError::internal("activity failed without error")))
    }
}

/// Releases the single-flight claim when the workflow finishes.
pub(crate) struct WorkflowGuard<'a> {
    engine: &'a WorkflowEngine,
    workflow_id: String,
}

impl Drop for WorkflowGuard<'_> {
    fn drop(&mut self) {
        self.engine.release(&self.workflow_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::geocoder::StaticGeocoder;
    use crate::external::notifier::RecordingNotifier;
    use crate::persistence::MemoryStore;

    fn engine() -> WorkflowEngine {
        let store = Arc::new(MemoryStore::new());
        let geocoder = Arc::new(StaticGeocoder::default());
        let metrics = MetricService::new(store.clone(), geocoder);
        WorkflowEngine::new(store, metrics, Arc::new(RecordingNotifier::new()))
    }

    #[test]
    fn duplicate_claims_are_rejected_until_release() {
        let engine = engine();
        let guard = engine.claim("wf-1").expect("first claim");
        assert!(matches!(
            engine.claim("wf-1"),
            Err(WorkflowError::AlreadyStarted(_))
        ));
        drop(guard);
        assert!(engine.claim("wf-1").is_ok());
    }

    #[test]
    fn notification_idempotency_is_per_account_template_day() {
        let engine = engine();
        assert!(engine.first_notification_today("acct", "tmpl"));
        assert!(!engine.first_notification_today("acct", "tmpl"));
        assert!(engine.first_notification_today("acct", "other"));
        assert!(engine.first_notification_today("other", "tmpl"));
    }

    #[tokio::test]
    async fn retries_stop_after_success() {
        let engine = engine();
        let calls = std::sync::atomic::AtomicU32::new(0);
        let result = engine
            .with_retries("test", || {
                let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(GatewayError::internal("first try fails"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result.ok(), Some(42));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retries_give_up_after_bound() {
        let engine = engine();
        let calls = std::sync::atomic::AtomicU32::new(0);
        let result: Result<(), _> = engine
            .with_retries("test", || {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async { Err(GatewayError::internal("always fails")) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(
            calls.load(std::sync::atomic::Ordering::SeqCst),
            1 + ACTIVITY_RETRIES
        );
    }
}
