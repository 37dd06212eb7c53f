//! Points of interest.

use serde::{Deserialize, Serialize};

use super::ids::PoiId;
use super::location::{GeoPoint, Location};
use super::metric::Metric;
use super::rating::PoiRatingsMetric;

/// A shared place document, one per unique coordinate pair.
///
/// Created on first reference and never deleted: un-monitoring is a
/// per-user operation on their profile. Country/state/county are resolved
/// lazily by the geocoder on first read that needs them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub id: PoiId,
    pub location: GeoPoint,
    pub address: String,
    pub alias: String,
    #[serde(rename = "autonomy_score")]
    pub score: f64,
    #[serde(rename = "autonomy_score_delta")]
    pub score_delta: f64,
    pub metric: Metric,
    #[serde(skip_serializing, default)]
    pub country: String,
    #[serde(skip_serializing, default)]
    pub state: String,
    #[serde(skip_serializing, default)]
    pub county: String,
    #[serde(skip_serializing, default)]
    pub place_type: String,
    /// Distance from the query point in km; present on discovery results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    /// Average score for the queried resource; present on discovery results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_score: Option<f64>,
    #[serde(skip_serializing, default)]
    pub resource_ratings: PoiRatingsMetric,
}

impl Poi {
    /// Location with the POI's resolved address components attached.
    #[must_use]
    pub fn resolved_location(&self) -> Location {
        let mut loc = self.location.to_location();
        loc.address.country = self.country.clone();
        loc.address.state = self.state.clone();
        loc.address.county = self.county.clone();
        loc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_location_carries_address() {
        let poi = Poi {
            location: GeoPoint::new(121.5654, 25.033),
            country: "Taiwan".to_string(),
            state: "Taipei City".to_string(),
            ..Poi::default()
        };
        let loc = poi.resolved_location();
        assert_eq!(loc.latitude, 25.033);
        assert_eq!(loc.address.country, "Taiwan");
        assert!(!loc.needs_geocoding());
    }

    #[test]
    fn discovery_fields_are_omitted_when_absent() {
        let poi = Poi::default();
        let value = serde_json::to_value(&poi).unwrap();
        assert!(value.get("distance").is_none());
        assert!(value.get("resource_score").is_none());
    }
}
