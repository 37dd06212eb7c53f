//! Derived metric documents.
//!
//! A [`Metric`] is never authoritative: it is recomputed from raw reports
//! and confirmed-case series whenever it goes stale, and persisted as a
//! single atomic document on the owning profile or POI.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::confirm::CdsScoreDataSet;

/// A metric older than this is considered stale and gets resynced on read.
pub const METRIC_UPDATE_INTERVAL: Duration = Duration::minutes(5);

/// Confirmed-case component detail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfirmDetail {
    /// Active-case series over the scoring window, oldest first.
    /// Internal to scoring; not exposed to clients.
    #[serde(skip_serializing, default)]
    pub continuous_data: Vec<CdsScoreDataSet>,
    pub score: f64,
    pub score_yesterday: f64,
}

/// Behavior component detail.
///
/// Distributions and report counts feed the score engine and are not
/// persisted: only the resulting scores survive on the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorDetail {
    pub score: f64,
    pub score_yesterday: f64,
    #[serde(skip, default)]
    pub report_times: i64,
    #[serde(skip, default)]
    pub report_times_yesterday: i64,
    #[serde(skip, default)]
    pub today_distribution: HashMap<String, i64>,
    #[serde(skip, default)]
    pub yesterday_distribution: HashMap<String, i64>,
}

/// Per-symptom weighted counts for one day within the nearby radius.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NearestSymptomData {
    pub weight_distribution: HashMap<String, i64>,
    pub official_count: f64,
    pub customized_count: f64,
    /// Distinct users who reported at least one symptom that day.
    pub user_count: f64,
}

/// Symptom component detail, including the spike bookkeeping used by
/// the nudge workflows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymptomDetail {
    pub score: f64,
    pub score_yesterday: f64,
    #[serde(skip, default)]
    pub total_people: f64,
    #[serde(skip, default)]
    pub total_people_yesterday: f64,
    #[serde(skip, default)]
    pub today_data: NearestSymptomData,
    #[serde(skip, default)]
    pub yesterday_data: NearestSymptomData,
    /// Wall-clock time at which a local spike was last first observed.
    #[serde(default)]
    pub last_spike_update: i64,
    /// Symptom ids spiking at `last_spike_update`.
    #[serde(default)]
    pub last_spike_list: Vec<String>,
}

/// Nested component details of a [`Metric`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Details {
    pub confirm: ConfirmDetail,
    pub behaviors: BehaviorDetail,
    pub symptoms: SymptomDetail,
}

/// Neighborhood metric for a location (profile or POI).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(rename = "confirm")]
    pub confirmed_count: f64,
    #[serde(rename = "confirm_delta")]
    pub confirmed_delta: f64,
    #[serde(rename = "symptom")]
    pub symptom_count: f64,
    #[serde(rename = "symptom_delta")]
    pub symptom_delta: f64,
    #[serde(rename = "behavior")]
    pub behavior_count: f64,
    #[serde(rename = "behavior_delta")]
    pub behavior_delta: f64,
    pub score: f64,
    pub score_yesterday: f64,
    pub autonomy_score: f64,
    pub autonomy_score_yesterday: f64,
    /// Epoch seconds of the last successful sync.
    pub last_update: i64,
    pub details: Details,
}

impl Metric {
    /// True when the metric is older than [`METRIC_UPDATE_INTERVAL`] and
    /// should be recomputed before being served.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() - self.last_update > METRIC_UPDATE_INTERVAL.num_seconds()
    }
}

/// Personal metric derived from the account's own reports only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndividualMetric {
    pub score: f64,
    pub score_yesterday: f64,
    #[serde(rename = "symptom")]
    pub symptom_count: f64,
    #[serde(rename = "symptom_delta")]
    pub symptom_delta: f64,
    #[serde(rename = "behavior")]
    pub behavior_count: f64,
    #[serde(rename = "behavior_delta")]
    pub behavior_delta: f64,
    pub last_update: i64,
}

impl IndividualMetric {
    /// True when the personal metric should be recomputed before serving.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() - self.last_update >= METRIC_UPDATE_INTERVAL.num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_metric_is_not_stale() {
        let now = Utc::now();
        let metric = Metric {
            last_update: now.timestamp(),
            ..Metric::default()
        };
        assert!(!metric.is_stale(now));
    }

    #[test]
    fn old_metric_is_stale() {
        let now = Utc::now();
        let metric = Metric {
            last_update: now.timestamp() - 6 * 60,
            ..Metric::default()
        };
        assert!(metric.is_stale(now));
    }

    #[test]
    fn serde_uses_wire_names() {
        let metric = Metric {
            confirmed_count: 12.0,
            symptom_count: 3.0,
            ..Metric::default()
        };
        let value = serde_json::to_value(&metric).unwrap();
        assert_eq!(value["confirm"], 12.0);
        assert_eq!(value["symptom"], 3.0);
        assert!(value.get("confirmed_count").is_none());
    }

    #[test]
    fn spike_fields_survive_round_trip() {
        let metric = Metric {
            details: Details {
                symptoms: SymptomDetail {
                    last_spike_update: 1_589_000_000,
                    last_spike_list: vec!["fever".to_string()],
                    ..SymptomDetail::default()
                },
                ..Details::default()
            },
            ..Metric::default()
        };
        let json = serde_json::to_string(&metric).unwrap();
        let back: Metric = serde_json::from_str(&json).unwrap();
        assert_eq!(back.details.symptoms.last_spike_list, vec!["fever"]);
        assert_eq!(back.details.symptoms.last_spike_update, 1_589_000_000);
    }
}
