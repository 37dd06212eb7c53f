//! The autonomy-profile read endpoint.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{
    AutonomyProfileQuery, IndividualProfileResponse, PlaceProfileResponse,
};
use crate::app_state::{Account, AppState};
use crate::domain::ids::PoiId;
use crate::domain::location::Location;
use crate::error::GatewayError;
use crate::localization::Localizer;

/// `GET /autonomy_profile` — dispatches between the requesting user's
/// own profile (`me`), a saved place (`poi_id`), and ad-hoc coordinates
/// (`lat`/`lng`). Exactly one selector must be present.
#[utoipa::path(
    get,
    path = "/autonomy_profile",
    tag = "Profile",
    summary = "Autonomy profile for the user, a saved place, or coordinates",
    responses(
        (status = 200, description = "The resolved profile"),
        (status = 400, description = "No subject selector provided"),
    )
)]
pub async fn autonomy_profile(
    State(state): State<AppState>,
    Account(profile): Account,
    Query(params): Query<AutonomyProfileQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let localizer = Localizer::new(&params.lang);

    if params.me {
        let resolved = state
            .profiles
            .current_area_profile(&profile.account_number)
            .await?;
        return Ok(Json(serde_json::to_value(IndividualProfileResponse::from(resolved))
            .map_err(GatewayError::internal)?));
    }

    if let Some(poi_id) = params.poi_id.as_deref() {
        let poi_id = PoiId::parse(poi_id).map_err(|_| GatewayError::UnknownPoi)?;
        let resolved = state
            .profiles
            .place_profile(poi_id, params.all_resources, &localizer)
            .await?;
        return Ok(Json(serde_json::to_value(PlaceProfileResponse::from(resolved))
            .map_err(GatewayError::internal)?));
    }

    if let (Some(lat), Some(lng)) = (params.lat, params.lng) {
        if lat != 0.0 && lng != 0.0 {
            let resolved = state
                .profiles
                .coordinate_profile(Location::new(lat, lng), params.all_resources, &localizer)
                .await?;
            return Ok(Json(serde_json::to_value(PlaceProfileResponse::from(resolved))
                .map_err(GatewayError::internal)?));
        }
    }

    Err(GatewayError::InvalidParameters)
}

/// Profile routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/autonomy_profile", get(autonomy_profile))
}
