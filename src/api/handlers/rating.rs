//! Rating submission and retrieval handlers.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{LangQuery, RatingsResponse, UpdateRatingsRequest};
use crate::app_state::{Account, AppState};
use crate::domain::ids::PoiId;
use crate::domain::rating::{RatingResource, Resource};
use crate::error::GatewayError;
use crate::localization::Localizer;
use crate::persistence::Store;

use super::poi::spawn_poi_refresh;

/// `POST /points_of_interest/{id}/rating` — submit ratings.
///
/// Unknown resource ids are dropped; the POI's composite score is
/// re-driven by a background refresh after the aggregates are written.
#[utoipa::path(
    post,
    path = "/points_of_interest/{id}/rating",
    tag = "Ratings",
    summary = "Submit resource ratings for a POI",
    request_body = UpdateRatingsRequest,
    responses(
        (status = 200, description = "Ratings recorded"),
        (status = 400, description = "Unknown POI"),
    )
)]
pub async fn update_poi_rating(
    State(state): State<AppState>,
    Account(profile): Account,
    Path(id): Path<String>,
    Json(req): Json<UpdateRatingsRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let poi_id = PoiId::parse(&id).map_err(|_| GatewayError::UnknownPoi)?;
    let localizer = Localizer::new(&req.lang);

    let mut ratings = Vec::with_capacity(req.ratings.len());
    for rating in req.ratings {
        // Official names resolve through the catalog; customized
        // resources keep the name stored on the POI.
        let name = match localizer.resource_name(&rating.resource_id) {
            Some(name) => name,
            None => {
                match state
                    .store
                    .get_poi_resources(poi_id)
                    .await?
                    .into_iter()
                    .find(|r| r.id == rating.resource_id)
                {
                    Some(resource) => resource.name,
                    None => continue,
                }
            }
        };
        ratings.push(RatingResource {
            resource: Resource {
                id: rating.resource_id,
                name,
                important: false,
            },
            score: rating.score,
        });
    }

    state
        .ratings
        .update_poi_rating(&profile.account_number, poi_id, ratings)
        .await?;

    spawn_poi_refresh(&state, &profile.account_number, poi_id);

    Ok(Json(serde_json::json!({})))
}

/// `GET /points_of_interest/{id}/ratings` — the account's own ratings.
#[utoipa::path(
    get,
    path = "/points_of_interest/{id}/ratings",
    tag = "Ratings",
    summary = "The account's ratings for a POI",
    responses((status = 200, description = "Rating list"))
)]
pub async fn get_profile_ratings(
    State(state): State<AppState>,
    Account(profile): Account,
    Path(id): Path<String>,
    Query(params): Query<LangQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let poi_id = PoiId::parse(&id).map_err(|_| GatewayError::UnknownPoi)?;
    let localizer = Localizer::new(&params.lang);

    let mut metric = state
        .ratings
        .get_profile_ratings(&profile.account_number, poi_id)
        .await?;
    for rating in &mut metric.resources {
        if let Some(name) = localizer.resource_name(&rating.resource.id) {
            rating.resource.name = name;
        }
    }

    Ok(Json(RatingsResponse {
        ratings: metric.resources,
    }))
}

/// Rating routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/points_of_interest/{id}/rating", post(update_poi_rating))
        .route(
            "/points_of_interest/{id}/ratings",
            get(get_profile_ratings),
        )
}
