//! Place resources and rating aggregates.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A rate-able attribute at a place, e.g. "hand sanitizer".
///
/// Official resources carry stable ids (`resource_1` .. `resource_126`)
/// and names resolved per-language on read. Customized resources get a
/// content-derived id so the same name always maps to the same id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    #[serde(skip, default)]
    pub important: bool,
}

impl Resource {
    /// Derives the stable id for a customized resource:
    /// `hex(sha256(lowercased name))`.
    #[must_use]
    pub fn customized_id(name: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(name.to_lowercase().as_bytes());
        hex_string(&hasher.finalize())
    }
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// One user's score for one resource at one place. Score 0 means
/// "unrated".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingResource {
    pub resource: Resource,
    pub score: f64,
}

/// A user's ratings for a single POI, as embedded in their profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileRatingsMetric {
    pub resources: Vec<RatingResource>,
    #[serde(default)]
    pub last_update: i64,
}

/// POI-level running aggregate for one resource.
///
/// Invariant: `score == sum_of_score / ratings` whenever `ratings > 0`.
/// The `last_day_*` pair snapshots the values as they stood at the most
/// recent local-midnight crossing and feeds the "yesterday" side of the
/// POI autonomy score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoiResourceRating {
    pub resource: Resource,
    #[serde(rename = "sum")]
    pub sum_of_score: f64,
    pub score: f64,
    pub ratings: i64,
    #[serde(default)]
    pub last_update: i64,
    #[serde(default)]
    pub last_day_score: f64,
    #[serde(default, rename = "last_day_rating")]
    pub last_day_ratings: i64,
}

/// All resource aggregates of a POI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoiRatingsMetric {
    pub resources: Vec<PoiResourceRating>,
    #[serde(default)]
    pub last_update: i64,
}

impl PoiRatingsMetric {
    /// Finds the aggregate for a resource id.
    #[must_use]
    pub fn get(&self, resource_id: &str) -> Option<&PoiResourceRating> {
        self.resources.iter().find(|r| r.resource.id == resource_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customized_id_is_case_insensitive() {
        assert_eq!(
            Resource::customized_id("Free Wi-Fi"),
            Resource::customized_id("free wi-fi")
        );
    }

    #[test]
    fn customized_id_is_hex_sha256() {
        let id = Resource::customized_id("hand sanitizer");
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_names_get_different_ids() {
        assert_ne!(
            Resource::customized_id("hand sanitizer"),
            Resource::customized_id("face masks")
        );
    }

    #[test]
    fn ratings_metric_lookup() {
        let metric = PoiRatingsMetric {
            resources: vec![PoiResourceRating {
                resource: Resource {
                    id: "resource_1".to_string(),
                    name: "Hand sanitizer".to_string(),
                    important: true,
                },
                sum_of_score: 8.0,
                score: 4.0,
                ratings: 2,
                ..PoiResourceRating::default()
            }],
            last_update: 0,
        };
        assert!(metric.get("resource_1").is_some());
        assert!(metric.get("resource_2").is_none());
    }
}
