//! POI handlers: create/attach, list, discover, rename, reorder,
//! un-monitor, and the per-place resource set.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{post, put};
use axum::{Json, Router};

use crate::api::dto::{
    AddPoiRequest, AddResourcesRequest, ListPoiQuery, ListResourcesQuery, OkResponse,
    PoiDiscoveryResponse, PoiListResponse, ResourcesResponse, UpdatePoiAliasRequest,
    UpdatePoiOrderRequest,
};
use crate::app_state::{Account, AppState};
use crate::domain::ids::PoiId;
use crate::domain::location::Location;
use crate::error::GatewayError;
use crate::localization::Localizer;
use crate::workflows::WorkflowError;

/// `POST /points_of_interest` — create/attach a POI to the account.
#[utoipa::path(
    post,
    path = "/points_of_interest",
    tag = "POI",
    summary = "Create or attach a point of interest",
    request_body = AddPoiRequest,
    responses((status = 200, description = "The attached POI"))
)]
pub async fn add_poi(
    State(state): State<AppState>,
    Account(profile): Account,
    Json(req): Json<AddPoiRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let place_type = req.types.first().map(String::as_str).unwrap_or_default();
    let detail = state
        .pois
        .add_poi(
            &profile.account_number,
            &req.alias,
            &req.address,
            place_type,
            req.location.longitude,
            req.location.latitude,
        )
        .await?;
    Ok(Json(detail))
}

/// `GET /points_of_interest` — the monitored list, or discovery when a
/// filter (`resource_id`, `text`, `place_type`) is present. Discovery
/// centers on the supplied coordinates or the account's last location.
#[utoipa::path(
    get,
    path = "/points_of_interest",
    tag = "POI",
    summary = "List monitored POIs or discover nearby places",
    responses(
        (status = 200, description = "POI list"),
        (status = 400, description = "Discovery without a usable location"),
    )
)]
pub async fn list_poi(
    State(state): State<AppState>,
    Account(profile): Account,
    Query(params): Query<ListPoiQuery>,
) -> Result<axum::response::Response, GatewayError> {
    let is_discovery =
        params.resource_id.is_some() || params.text.is_some() || params.place_type.is_some();
    if !is_discovery {
        let points_of_interest = state.pois.list_poi(&profile.account_number).await?;
        return Ok(Json(PoiListResponse { points_of_interest }).into_response());
    }

    let location = match (params.lat, params.lng) {
        (Some(lat), Some(lng)) => Location::new(lat, lng),
        _ => profile
            .last_location()
            .ok_or(GatewayError::UnknownAccountLocation)?,
    };

    let points_of_interest = if let Some(resource_id) = params.resource_id.as_deref() {
        state.pois.list_poi_by_resource(resource_id, &location).await?
    } else if let Some(text) = params.text.as_deref() {
        state.pois.list_poi_by_text(text, &location).await?
    } else if let Some(place_type) = params.place_type.as_deref() {
        state.pois.list_poi_by_place_type(place_type, &location).await?
    } else {
        Vec::new()
    };

    Ok(Json(PoiDiscoveryResponse { points_of_interest }).into_response())
}

/// `PATCH /points_of_interest/{id}` — rename the account's alias.
#[utoipa::path(
    patch,
    path = "/points_of_interest/{id}",
    tag = "POI",
    summary = "Rename a monitored POI",
    request_body = UpdatePoiAliasRequest,
    responses((status = 200, description = "Alias updated", body = OkResponse))
)]
pub async fn update_poi(
    State(state): State<AppState>,
    Account(profile): Account,
    Path(id): Path<String>,
    Json(req): Json<UpdatePoiAliasRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let poi_id = PoiId::parse(&id).map_err(|_| GatewayError::UnknownPoi)?;
    state
        .pois
        .update_poi_alias(&profile.account_number, poi_id, &req.alias)
        .await?;
    Ok(Json(OkResponse::ok()))
}

/// `DELETE /points_of_interest/{id}` — un-monitor for this account.
#[utoipa::path(
    delete,
    path = "/points_of_interest/{id}",
    tag = "POI",
    summary = "Stop monitoring a POI",
    responses((status = 200, description = "POI un-monitored", body = OkResponse))
)]
pub async fn delete_poi(
    State(state): State<AppState>,
    Account(profile): Account,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let poi_id = PoiId::parse(&id).map_err(|_| GatewayError::UnknownPoi)?;
    state
        .pois
        .delete_poi(&profile.account_number, poi_id)
        .await?;
    Ok(Json(OkResponse::ok()))
}

/// `PUT /points_of_interest/order` — reorder the monitored list.
#[utoipa::path(
    put,
    path = "/points_of_interest/order",
    tag = "POI",
    summary = "Reorder the monitored POI list",
    request_body = UpdatePoiOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = OkResponse),
        (status = 500, description = "Order references a stale list"),
    )
)]
pub async fn update_poi_order(
    State(state): State<AppState>,
    Account(profile): Account,
    Json(req): Json<UpdatePoiOrderRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let mut order = Vec::with_capacity(req.order.len());
    for id in &req.order {
        order.push(PoiId::parse(id).map_err(|_| GatewayError::InvalidParameters)?);
    }
    state
        .pois
        .update_poi_order(&profile.account_number, &order)
        .await?;
    Ok(Json(OkResponse::ok()))
}

/// `POST /points_of_interest/{id}/resources` — attach resources.
#[utoipa::path(
    post,
    path = "/points_of_interest/{id}/resources",
    tag = "POI",
    summary = "Add rate-able resources to a POI",
    request_body = AddResourcesRequest,
    responses(
        (status = 200, description = "Added resources"),
        (status = 400, description = "Blank customized resource name"),
    )
)]
pub async fn add_poi_resources(
    State(state): State<AppState>,
    Account(_profile): Account,
    Path(id): Path<String>,
    Json(req): Json<AddResourcesRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let poi_id = PoiId::parse(&id).map_err(|_| GatewayError::UnknownPoi)?;
    let localizer = Localizer::new(&req.lang);
    let resources = state
        .pois
        .add_poi_resources(poi_id, &req.resource_ids, &req.new_resource_names, &localizer)
        .await?;
    Ok(Json(ResourcesResponse { resources }))
}

/// `GET /points_of_interest/{id}/resources` — list rate-able resources.
#[utoipa::path(
    get,
    path = "/points_of_interest/{id}/resources",
    tag = "POI",
    summary = "List rate-able resources of a POI",
    responses((status = 200, description = "Resource list"))
)]
pub async fn get_poi_resources(
    State(state): State<AppState>,
    Account(_profile): Account,
    Path(id): Path<String>,
    Query(params): Query<ListResourcesQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let poi_id = PoiId::parse(&id).map_err(|_| GatewayError::UnknownPoi)?;
    let localizer = Localizer::new(&params.lang);
    let resources = state
        .pois
        .get_poi_resources(poi_id, params.important_only, params.include_added, &localizer)
        .await?;
    Ok(Json(ResourcesResponse { resources }))
}

/// Kicks a background refresh of a POI's state for all subscribers.
pub(crate) fn spawn_poi_refresh(state: &AppState, account_number: &str, poi_id: PoiId) {
    let engine = state.workflows.clone();
    let account = account_number.to_string();
    tokio::spawn(async move {
        match engine.run_account_state_refresh(&account, Some(poi_id)).await {
            Ok(_) => {}
            Err(WorkflowError::AlreadyStarted(id)) => {
                tracing::debug!(workflow = %id, "refresh already running");
            }
            Err(err) => tracing::error!(error = %err, %poi_id, "poi refresh failed"),
        }
    });
}

/// POI routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/points_of_interest", post(add_poi).get(list_poi))
        .route("/points_of_interest/order", put(update_poi_order))
        .route(
            "/points_of_interest/{id}",
            axum::routing::patch(update_poi).delete(delete_poi),
        )
        .route(
            "/points_of_interest/{id}/resources",
            post(add_poi_resources).get(get_poi_resources),
        )
}
