//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All endpoints are mounted under `/api/v1`; the health check lives at
//! the root.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI documentation for the autonomy-gateway REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "autonomy-gateway",
        version = "0.1.0",
        description = "Location-aware public-health telemetry backend: autonomy scores, place ratings, and nudge workflows.",
        license(name = "MIT"),
    ),
    tags(
        (name = "System", description = "Health check"),
        (name = "Accounts", description = "Account lifecycle and location pings"),
        (name = "Profile", description = "Autonomy profile reads"),
        (name = "POI", description = "Points of interest and their resources"),
        (name = "Ratings", description = "Per-place resource ratings"),
        (name = "Reports", description = "Symptom/behavior catalogs, reports, and charts"),
        (name = "Helps", description = "Community help requests"),
        (name = "Scores", description = "Batch address scoring"),
    ),
    paths(
        handlers::system::health_handler,
        handlers::account::register,
        handlers::account::detail,
        handlers::account::update_metadata,
        handlers::account::delete,
        handlers::account::here,
        handlers::profile::autonomy_profile,
        handlers::poi::add_poi,
        handlers::poi::list_poi,
        handlers::poi::update_poi,
        handlers::poi::delete_poi,
        handlers::poi::update_poi_order,
        handlers::poi::add_poi_resources,
        handlers::poi::get_poi_resources,
        handlers::rating::update_poi_rating,
        handlers::rating::get_profile_ratings,
        handlers::report::get_symptoms,
        handlers::report::create_symptom,
        handlers::report::report_symptoms,
        handlers::report::get_behaviors,
        handlers::report::create_behavior,
        handlers::report::report_behaviors,
        handlers::report_item::get_report_items,
        handlers::help::ask_for_help,
        handlers::help::list_helps,
        handlers::help::get_help,
        handlers::help::answer_help,
        handlers::score::calculate_scores,
    ),
    components(schemas(
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
        dto::OkResponse,
        dto::LocationDto,
        dto::RegisterRequest,
        dto::RegisterResponse,
        dto::RegisteredAccount,
        dto::UpdateMetadataRequest,
        dto::HereRequest,
        dto::AddPoiRequest,
        dto::UpdatePoiAliasRequest,
        dto::UpdatePoiOrderRequest,
        dto::AddResourcesRequest,
        dto::UserRating,
        dto::UpdateRatingsRequest,
        dto::SymptomReportRequest,
        dto::BehaviorReportRequest,
        dto::CreateCatalogItemRequest,
        dto::CreateCatalogItemResponse,
        dto::AskForHelpRequest,
        dto::ScorePlace,
        dto::ScoreRequest,
        dto::ScoreResponse,
    ))
)]
#[derive(Debug)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}
