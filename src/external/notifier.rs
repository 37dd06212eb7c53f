//! Push-notification transport.
//!
//! The core hands off `(accounts, template, params)`; delivery details
//! belong to the transport. Failures are reported to the error sink but
//! never retried indefinitely: missing a nudge beats spamming one.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::GatewayError;

/// Notification template identifiers.
pub const TEMPLATE_NEW_LOCATION_STATUS_CHANGE: &str = "new_location_status_change";
pub const TEMPLATE_SAVED_LOCATION_STATUS_CHANGE: &str = "saved_location_status_change";
pub const TEMPLATE_SYMPTOM_SPIKE: &str = "symptom_spike";
pub const TEMPLATE_SYMPTOM_FOLLOW_UP: &str = "symptom_follow_up";
pub const TEMPLATE_BEHAVIOR_ON_RISK_AREA: &str = "behavior_on_risk_area";
pub const TEMPLATE_BEHAVIOR_FOLLOW_UP_ON_SPIKE_AREA: &str =
    "behavior_follow_up_on_symptom_spike_area";

/// Fans a templated notification out to a set of accounts.
#[async_trait]
pub trait NotificationCenter: Send + Sync {
    async fn notify_accounts_by_template(
        &self,
        accounts: &[String],
        template: &str,
        params: serde_json::Value,
    ) -> Result<(), GatewayError>;
}

/// HTTP push client.
#[derive(Debug, Clone)]
pub struct PushClient {
    client: reqwest::Client,
    endpoint: String,
    app_key: String,
}

impl PushClient {
    /// Creates a client against the transport `endpoint` with the given
    /// per-call deadline.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InternalServer`] when the HTTP client
    /// cannot be constructed.
    pub fn new(endpoint: &str, app_key: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::internal)?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            app_key: app_key.to_string(),
        })
    }
}

#[async_trait]
impl NotificationCenter for PushClient {
    async fn notify_accounts_by_template(
        &self,
        accounts: &[String],
        template: &str,
        params: serde_json::Value,
    ) -> Result<(), GatewayError> {
        if accounts.is_empty() {
            tracing::warn!(template, "notification requested without accounts");
            return Ok(());
        }

        let url = format!("{}/notifications", self.endpoint);
        let body = serde_json::json!({
            "template_id": template,
            "include_external_user_ids": accounts,
            "data": params,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.app_key)
            .json(&body)
            .send()
            .await
            .map_err(GatewayError::internal)?;

        response
            .error_for_status()
            .map_err(GatewayError::internal)?;
        tracing::info!(template, receivers = accounts.len(), "notification dispatched");
        Ok(())
    }
}

/// Records every dispatch instead of sending, for tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Vec<String>, String, serde_json::Value)>>,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications dispatched so far.
    #[must_use]
    pub fn sent(&self) -> Vec<(Vec<String>, String, serde_json::Value)> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl NotificationCenter for RecordingNotifier {
    async fn notify_accounts_by_template(
        &self,
        accounts: &[String],
        template: &str,
        params: serde_json::Value,
    ) -> Result<(), GatewayError> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((accounts.to_vec(), template.to_string(), params));
        Ok(())
    }
}
