//! Reverse and forward geocoding.
//!
//! The core only needs `(lat, lng) → (country, state, county)` and
//! `address → (lat, lng)`. [`NominatimGeocoder`] implements both against
//! a Nominatim-compatible HTTP endpoint with a per-call deadline and two
//! retries; after the final failure the call returns a geo-resolution
//! error and higher layers decide how much work can proceed.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::location::{AddressComponent, Location};
use crate::error::GatewayError;

/// Retries after the initial attempt.
const GEOCODER_RETRIES: u32 = 2;

/// Resolves political address components for coordinates and coordinates
/// for free-form addresses.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Fills country/state/county for a coordinate pair.
    async fn political_geo_info(&self, location: &Location) -> Result<Location, GatewayError>;

    /// Resolves a free-form address to coordinates. `None` when the
    /// address does not resolve.
    async fn forward_geocode(&self, address: &str) -> Result<Option<Location>, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: ReverseAddress,
}

#[derive(Debug, Default, Deserialize)]
struct ReverseAddress {
    #[serde(default)]
    country: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    county: String,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
}

/// Nominatim-backed geocoder.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    endpoint: String,
}

impl NominatimGeocoder {
    /// Creates a geocoder against `endpoint` with the given per-call
    /// deadline.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InternalServer`] when the HTTP client
    /// cannot be constructed.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::internal)?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    async fn get_with_retries<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let mut last_error = None;
        for attempt in 0..=GEOCODER_RETRIES {
            match self.client.get(url).query(query).send().await {
                Ok(response) => match response.error_for_status() {
                    Ok(response) => {
                        return response.json::<T>().await.map_err(GatewayError::internal);
                    }
                    Err(err) => last_error = Some(err),
                },
                Err(err) => last_error = Some(err),
            }
            tracing::warn!(url, attempt, "geocoder request failed, retrying");
        }
        Err(GatewayError::internal(format!(
            "geocoder unavailable: {}",
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn political_geo_info(&self, location: &Location) -> Result<Location, GatewayError> {
        let url = format!("{}/reverse", self.endpoint);
        let response: ReverseResponse = self
            .get_with_retries(
                &url,
                &[
                    ("format", "jsonv2".to_string()),
                    ("lat", location.latitude.to_string()),
                    ("lon", location.longitude.to_string()),
                ],
            )
            .await?;

        let mut resolved = location.clone();
        resolved.address = AddressComponent {
            country: response.address.country,
            state: response.address.state,
            county: response.address.county,
        };
        Ok(resolved)
    }

    async fn forward_geocode(&self, address: &str) -> Result<Option<Location>, GatewayError> {
        let url = format!("{}/search", self.endpoint);
        let results: Vec<SearchResult> = self
            .get_with_retries(
                &url,
                &[
                    ("format", "jsonv2".to_string()),
                    ("limit", "1".to_string()),
                    ("q", address.to_string()),
                ],
            )
            .await?;

        let Some(first) = results.first() else {
            return Ok(None);
        };
        match (first.lat.parse::<f64>(), first.lon.parse::<f64>()) {
            (Ok(lat), Ok(lon)) => Ok(Some(Location::new(lat, lon))),
            _ => Ok(None),
        }
    }
}

/// Geocoder double with canned answers, for tests.
#[derive(Debug, Default)]
pub struct StaticGeocoder {
    pub address: AddressComponent,
    /// When set, every call fails with a geo-resolution error.
    pub fail: bool,
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn political_geo_info(&self, location: &Location) -> Result<Location, GatewayError> {
        if self.fail {
            return Err(GatewayError::internal("geocoder down"));
        }
        let mut resolved = location.clone();
        resolved.address = self.address.clone();
        Ok(resolved)
    }

    async fn forward_geocode(&self, _address: &str) -> Result<Option<Location>, GatewayError> {
        if self.fail {
            return Err(GatewayError::internal("geocoder down"));
        }
        Ok(Some(Location::new(25.033, 121.5654)))
    }
}
