//! Geographic coordinates and resolved address components.

use serde::{Deserialize, Serialize};

/// Mean earth radius in meters, used by the haversine distance helper.
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Political address components resolved from a coordinate pair.
///
/// Filled lazily by the geocoder; an empty `country` means "not yet
/// resolved".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressComponent {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub county: String,
}

/// A geographic point with optionally-resolved address components.
///
/// Longitude/latitude ordering follows GeoJSON (`[lng, lat]`) on the wire,
/// but the struct keeps named fields to avoid index confusion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(flatten)]
    pub address: AddressComponent,
}

impl Location {
    /// Creates a location from a coordinate pair with no resolved address.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            address: AddressComponent::default(),
        }
    }

    /// True when the geocoder has not yet filled in political components.
    #[must_use]
    pub fn needs_geocoding(&self) -> bool {
        self.address.country.is_empty()
    }

    /// Great-circle distance to `other` in meters (haversine).
    ///
    /// Mirrors the spherical-distance predicate used by the geospatial
    /// queries so that in-process filtering and storage-side filtering
    /// agree on what "nearby" means.
    #[must_use]
    pub fn distance_meters(&self, other: &Self) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlng = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
    }
}

/// GeoJSON point as persisted on report and POI documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Always `"Point"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// `[longitude, latitude]`.
    pub coordinates: [f64; 2],
}

impl Default for GeoPoint {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl GeoPoint {
    /// Builds a GeoJSON point from named coordinates.
    #[must_use]
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [longitude, latitude],
        }
    }

    /// Returns the point as a [`Location`] without address components.
    #[must_use]
    pub fn to_location(&self) -> Location {
        Location::new(self.coordinates[1], self.coordinates[0])
    }
}

impl From<&Location> for GeoPoint {
    fn from(loc: &Location) -> Self {
        Self::new(loc.longitude, loc.latitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let loc = Location::new(25.033, 121.5654);
        assert!(loc.distance_meters(&loc) < 1e-6);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Location::new(25.033, 121.5654);
        let b = Location::new(25.04, 121.55);
        let d1 = a.distance_meters(&b);
        let d2 = b.distance_meters(&a);
        assert!((d1 - d2).abs() < 1e-6);
    }

    #[test]
    fn one_degree_latitude_is_about_111_km() {
        let a = Location::new(0.0, 0.0);
        let b = Location::new(1.0, 0.0);
        let d = a.distance_meters(&b);
        assert!((d - 111_195.0).abs() < 200.0, "got {d}");
    }

    #[test]
    fn geo_point_round_trip() {
        let loc = Location::new(25.033, 121.5654);
        let point = GeoPoint::from(&loc);
        assert_eq!(point.coordinates, [121.5654, 25.033]);
        assert_eq!(point.to_location(), loc);
    }

    #[test]
    fn needs_geocoding_until_country_set() {
        let mut loc = Location::new(25.0, 121.0);
        assert!(loc.needs_geocoding());
        loc.address.country = "Taiwan".to_string();
        assert!(!loc.needs_geocoding());
    }
}
