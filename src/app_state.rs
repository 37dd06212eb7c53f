//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::profile::Profile;
use crate::error::GatewayError;
use crate::external::geocoder::Geocoder;
use crate::persistence::Store;
use crate::service::{
    MetricService, PoiService, ProfileService, RatingService, ReportService,
};
use crate::workflows::WorkflowEngine;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Storage seam, for the few thin paths without a service.
    pub store: Arc<dyn Store>,
    /// Account lifecycle and profile reads.
    pub profiles: ProfileService,
    /// POI mutation layer.
    pub pois: PoiService,
    /// Place-rating engine.
    pub ratings: RatingService,
    /// Report ingestion.
    pub reports: ReportService,
    /// Raw-metric collection and syncs.
    pub metrics: MetricService,
    /// Nudge workflow engine.
    pub workflows: Arc<WorkflowEngine>,
    /// Forward/reverse geocoding.
    pub geocoder: Arc<dyn Geocoder>,
}

/// The authenticated account, extracted from the bearer token.
///
/// Handlers take `Account(profile)` as an argument; auth stays at the
/// HTTP boundary and the services receive explicit account parameters.
pub struct Account(pub Profile);

impl FromRequestParts<AppState> for Account {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(GatewayError::Unauthenticated)?;

        let profile = state.store.get_profile_by_token(token).await?;
        Ok(Self(profile))
    }
}
