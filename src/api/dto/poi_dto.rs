//! POI endpoint DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common_dto::LocationDto;
use crate::domain::poi::Poi;
use crate::domain::profile::PoiDetail;
use crate::domain::rating::Resource;

/// `POST /points_of_interest` request body.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddPoiRequest {
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub address: String,
    pub location: LocationDto,
    /// Place-type tags; the first one is persisted.
    #[serde(default)]
    pub types: Vec<String>,
}

/// `GET /points_of_interest` discovery filters. With none set the
/// monitored list is returned.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPoiQuery {
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub place_type: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub lang: String,
}

/// Monitored-list response entry.
#[derive(Debug, Clone, Serialize)]
pub struct PoiListResponse {
    pub points_of_interest: Vec<PoiDetail>,
}

/// Discovery response entry list.
#[derive(Debug, Clone, Serialize)]
pub struct PoiDiscoveryResponse {
    pub points_of_interest: Vec<Poi>,
}

/// `PATCH /points_of_interest/{id}` request body.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdatePoiAliasRequest {
    pub alias: String,
}

/// `PUT /points_of_interest/order` request body.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdatePoiOrderRequest {
    /// POI ids in the desired display order.
    pub order: Vec<String>,
}

/// `POST /points_of_interest/{id}/resources` request body.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddResourcesRequest {
    /// Official resource ids to attach.
    #[serde(default)]
    pub resource_ids: Vec<String>,
    /// Names of customized resources to create and attach.
    #[serde(default)]
    pub new_resource_names: Vec<String>,
    #[serde(default)]
    pub lang: String,
}

/// `GET /points_of_interest/{id}/resources` query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListResourcesQuery {
    #[serde(default)]
    pub important_only: bool,
    #[serde(default)]
    pub include_added: bool,
    #[serde(default)]
    pub lang: String,
}

/// Resource list payload.
#[derive(Debug, Clone, Serialize)]
pub struct ResourcesResponse {
    pub resources: Vec<Resource>,
}
