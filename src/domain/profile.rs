//! Account profiles and their POI subscriptions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{PoiId, ProfileId};
use super::location::{GeoPoint, Location};
use super::metric::{IndividualMetric, Metric};
use super::rating::ProfileRatingsMetric;

/// Kinds of nudges a profile can receive, used as keys of the
/// per-profile cool-down map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeType {
    SymptomFollowUp,
    BehaviorOnRiskArea,
    BehaviorOnSymptomSpikeArea,
}

/// Minimum delay between two behavior nudges of the same kind.
pub const NUDGE_COOL_DOWN_SECONDS: i64 = 90 * 60;

/// Per-user score weight overrides.
///
/// When present and newer than the cached metric, neighborhood scores are
/// recomputed with these weights instead of the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCoefficient {
    pub symptoms: f64,
    pub behaviors: f64,
    pub confirms: f64,
    pub updated_at: DateTime<Utc>,
}

/// A user's subscription to a POI, embedded in their profile in display
/// order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePoi {
    pub id: PoiId,
    pub alias: String,
    pub address: String,
    pub score: f64,
    #[serde(default)]
    pub place_type: String,
    /// Un-monitored entries are kept so re-adding restores user ratings.
    #[serde(default)]
    pub monitored: bool,
    /// Snapshot of the place's metric as this user last saw it. Stored
    /// with the subscription; the spike comparison diffs against it.
    #[serde(default)]
    pub metric: Metric,
    /// This user's own ratings at this place.
    #[serde(default)]
    pub resource_ratings: ProfileRatingsMetric,
    #[serde(default)]
    pub updated_at: i64,
}

/// Client-facing POI entry: the profile's subscription joined with the
/// shared POI document's location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoiDetail {
    #[serde(flatten)]
    pub profile_poi: ProfilePoi,
    pub location: Option<Location>,
}

/// One account's profile document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub account_number: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Last reported location; `None` until the client shares one.
    pub location: Option<GeoPoint>,
    /// Fixed-offset timezone string such as `"GMT+8"`.
    #[serde(default)]
    pub timezone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_coefficient: Option<ScoreCoefficient>,
    #[serde(default)]
    pub individual_metric: IndividualMetric,
    #[serde(default)]
    pub metric: Metric,
    #[serde(default)]
    pub points_of_interest: Vec<ProfilePoi>,
    /// Last nudge delivery time per kind, epoch seconds.
    #[serde(default)]
    pub last_nudge: HashMap<NudgeType, i64>,
}

impl Profile {
    /// The profile's last location, if shared.
    #[must_use]
    pub fn last_location(&self) -> Option<Location> {
        self.location.as_ref().map(GeoPoint::to_location)
    }

    /// The profile's subscription entry for a POI.
    #[must_use]
    pub fn poi(&self, poi_id: PoiId) -> Option<&ProfilePoi> {
        self.points_of_interest.iter().find(|p| p.id == poi_id)
    }

    /// True when the cool-down for a nudge kind has expired at `now`.
    #[must_use]
    pub fn nudge_cooled_down(&self, kind: NudgeType, now: i64) -> bool {
        match self.last_nudge.get(&kind) {
            Some(last) => now - last > NUDGE_COOL_DOWN_SECONDS,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nudge_cool_down_blocks_within_window() {
        let now = 1_589_000_000;
        let mut profile = Profile::default();
        profile
            .last_nudge
            .insert(NudgeType::BehaviorOnSymptomSpikeArea, now - 30 * 60);
        assert!(!profile.nudge_cooled_down(NudgeType::BehaviorOnSymptomSpikeArea, now));
        assert!(profile.nudge_cooled_down(NudgeType::BehaviorOnRiskArea, now));
    }

    #[test]
    fn nudge_cool_down_expires_after_90_minutes() {
        let now = 1_589_000_000;
        let mut profile = Profile::default();
        profile
            .last_nudge
            .insert(NudgeType::BehaviorOnRiskArea, now - 91 * 60);
        assert!(profile.nudge_cooled_down(NudgeType::BehaviorOnRiskArea, now));
    }

    #[test]
    fn poi_lookup_by_id() {
        let id = PoiId::new();
        let profile = Profile {
            points_of_interest: vec![ProfilePoi {
                id,
                monitored: true,
                ..ProfilePoi::default()
            }],
            ..Profile::default()
        };
        assert!(profile.poi(id).is_some());
        assert!(profile.poi(PoiId::new()).is_none());
    }

    #[test]
    fn nudge_kind_serializes_snake_case() {
        let json = serde_json::to_string(&NudgeType::BehaviorOnSymptomSpikeArea).unwrap();
        assert_eq!(json, "\"behavior_on_symptom_spike_area\"");
    }
}
