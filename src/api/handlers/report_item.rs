//! Aggregated chart data: `GET /report_items`.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::DateTime;

use crate::api::dto::{
    ReportItemDto, ReportItemQuery, ReportItemScope, ReportItemType, ReportItemsResponse,
};
use crate::app_state::{Account, AppState};
use crate::domain::confirm::has_case_data;
use crate::domain::ids::PoiId;
use crate::domain::location::Location;
use crate::domain::NEARBY_DISTANCE_RANGE;
use crate::error::GatewayError;
use crate::external::geocoder::Geocoder;
use crate::localization::Localizer;
use crate::persistence::Store;
use crate::service::report_items::{
    gather_report_items, gather_report_items_with_distribution, report_items_for_display,
    ReportItem,
};

/// `GET /report_items` — chart aggregation across scope × type over a
/// current period and the mirrored previous period.
#[utoipa::path(
    get,
    path = "/report_items",
    tag = "Reports",
    summary = "Aggregated chart entries",
    responses(
        (status = 200, description = "Aggregated entries"),
        (status = 400, description = "Bad period or unsupported combination"),
    )
)]
pub async fn get_report_items(
    State(state): State<AppState>,
    Account(profile): Account,
    Query(params): Query<ReportItemQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let start = DateTime::parse_from_rfc3339(&params.start)
        .map_err(|_| GatewayError::InvalidParameters)?;
    let end = DateTime::parse_from_rfc3339(&params.end)
        .map_err(|_| GatewayError::InvalidParameters)?;

    let current_start = start.timestamp();
    let current_end = end.timestamp();
    if current_end <= current_start {
        return Err(GatewayError::InvalidParameters);
    }
    // The previous period mirrors the current one.
    let previous_start = 2 * current_start - current_end;
    let previous_end = current_start;
    let utc_offset_secs = start.offset().local_minus_utc();

    let localizer = Localizer::new(&params.lang);
    let profile_key = profile.id.to_string();

    // Personal symptom/behavior charts use the per-profile time series.
    if params.scope == ReportItemScope::Individual {
        match params.item_type {
            ReportItemType::Symptom => {
                let current = state
                    .store
                    .get_personal_symptom_time_series(
                        &profile_key,
                        current_start,
                        current_end,
                        utc_offset_secs,
                        params.granularity,
                    )
                    .await?;
                let previous = state
                    .store
                    .find_symptom_distribution(
                        Some(&profile_key),
                        None,
                        0,
                        previous_start,
                        previous_end,
                        false,
                    )
                    .await?;
                let items = gather_report_items_with_distribution(&current, &previous, false);
                let items = resolve_symptom_names(&state, &localizer, items).await?;
                return Ok(Json(ReportItemsResponse {
                    report_items: items.into_iter().map(ReportItemDto::from).collect(),
                }));
            }
            ReportItemType::Behavior => {
                let current = state
                    .store
                    .get_personal_behavior_time_series(
                        &profile_key,
                        current_start,
                        current_end,
                        utc_offset_secs,
                        params.granularity,
                    )
                    .await?;
                let previous = state
                    .store
                    .find_behavior_distribution(
                        Some(&profile_key),
                        None,
                        0,
                        previous_start,
                        previous_end,
                    )
                    .await?;
                let items = gather_report_items_with_distribution(&current, &previous, false);
                let items = resolve_behavior_names(&state, &localizer, items).await?;
                return Ok(Json(ReportItemsResponse {
                    report_items: items.into_iter().map(ReportItemDto::from).collect(),
                }));
            }
            _ => {}
        }
    }

    // Everything else needs a subject: the account itself, its
    // neighborhood, or a POI.
    let (score_owner, location) = match params.scope {
        ReportItemScope::Individual => (profile.account_number.clone(), None),
        ReportItemScope::Neighborhood => {
            let location = profile
                .last_location()
                .ok_or(GatewayError::UnknownAccountLocation)?;
            let location = if location.needs_geocoding() {
                state.geocoder.political_geo_info(&location).await?
            } else {
                location
            };
            (profile.account_number.clone(), Some(location))
        }
        ReportItemScope::Poi => {
            let poi_id = params
                .poi_id
                .as_deref()
                .and_then(|id| PoiId::parse(id).ok())
                .ok_or(GatewayError::UnknownPoi)?;
            let poi = state.pois.get_poi(poi_id).await?;
            (poi_id.to_string(), Some(poi.resolved_location()))
        }
    };

    let items = match params.item_type {
        ReportItemType::Score => {
            let buckets = state
                .store
                .get_score_time_series(&score_owner, current_start, current_end, params.granularity)
                .await?;
            let previous_avg = state
                .store
                .get_score_average(&score_owner, previous_start, previous_end)
                .await?;

            let current = HashMap::from([("autonomy score".to_string(), buckets)]);
            let previous =
                HashMap::from([("autonomy score".to_string(), previous_avg as i64)]);
            let items = gather_report_items_with_distribution(&current, &previous, true);
            report_items_for_display(items, |id| id.to_string())
        }
        ReportItemType::Symptom => {
            let location = location.ok_or(GatewayError::InvalidParameters)?;
            let current = state
                .store
                .find_symptom_distribution(
                    None,
                    Some(&location),
                    NEARBY_DISTANCE_RANGE,
                    current_start,
                    current_end,
                    false,
                )
                .await?;
            let previous = state
                .store
                .find_symptom_distribution(
                    None,
                    Some(&location),
                    NEARBY_DISTANCE_RANGE,
                    previous_start,
                    previous_end,
                    false,
                )
                .await?;
            let items = gather_report_items(&current, &previous);
            resolve_symptom_names(&state, &localizer, items).await?
        }
        ReportItemType::Behavior => {
            let location = location.ok_or(GatewayError::InvalidParameters)?;
            let current = state
                .store
                .find_behavior_distribution(
                    None,
                    Some(&location),
                    NEARBY_DISTANCE_RANGE,
                    current_start,
                    current_end,
                )
                .await?;
            let previous = state
                .store
                .find_behavior_distribution(
                    None,
                    Some(&location),
                    NEARBY_DISTANCE_RANGE,
                    previous_start,
                    previous_end,
                )
                .await?;
            let items = gather_report_items(&current, &previous);
            resolve_behavior_names(&state, &localizer, items).await?
        }
        ReportItemType::Case => {
            let location = location.ok_or(GatewayError::InvalidParameters)?;
            case_report_items(&state, &location, current_end, previous_end).await?
        }
    };

    Ok(Json(ReportItemsResponse {
        report_items: items.into_iter().map(ReportItemDto::from).collect(),
    }))
}

async fn case_report_items(
    state: &AppState,
    location: &Location,
    current_end: i64,
    previous_end: i64,
) -> Result<Vec<ReportItem>, GatewayError> {
    const CONDITION: &str = "covid_19";
    let name = "COVID-19".to_string();

    if !has_case_data(&location.address.country) {
        // No dataset for this country: a single nameless-value entry.
        return Ok(vec![ReportItem {
            id: CONDITION.to_string(),
            name,
            value: 0,
            change_rate: 0.0,
            distribution: HashMap::new(),
        }]);
    }

    let current = state
        .store
        .get_cds_active(location, current_end)
        .await?
        .map_or(0.0, |(active, _, _)| active);
    let previous = state
        .store
        .get_cds_active(location, previous_end)
        .await?
        .map_or(0.0, |(active, _, _)| active);

    let current = HashMap::from([(CONDITION.to_string(), current as i64)]);
    let previous = HashMap::from([(CONDITION.to_string(), previous as i64)]);
    let items = gather_report_items(&current, &previous);
    Ok(report_items_for_display(items, |_| name.clone()))
}

/// Fills in symptom display names: catalog first, then the customized
/// symptom table.
async fn resolve_symptom_names(
    state: &AppState,
    localizer: &Localizer,
    items: HashMap<String, ReportItem>,
) -> Result<Vec<ReportItem>, GatewayError> {
    let unknown: Vec<String> = items
        .keys()
        .filter(|id| localizer.symptom_name(id).is_none())
        .cloned()
        .collect();
    let customized: HashMap<String, String> = if unknown.is_empty() {
        HashMap::new()
    } else {
        state
            .store
            .find_symptoms_by_ids(&unknown)
            .await?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect()
    };

    Ok(report_items_for_display(items, |id| {
        localizer
            .symptom_name(id)
            .or_else(|| customized.get(id).cloned())
            .unwrap_or_default()
    }))
}

async fn resolve_behavior_names(
    state: &AppState,
    localizer: &Localizer,
    items: HashMap<String, ReportItem>,
) -> Result<Vec<ReportItem>, GatewayError> {
    let unknown: Vec<String> = items
        .keys()
        .filter(|id| localizer.behavior_name(id).is_none())
        .cloned()
        .collect();
    let customized: HashMap<String, String> = if unknown.is_empty() {
        HashMap::new()
    } else {
        state
            .store
            .find_behaviors_by_ids(&unknown)
            .await?
            .into_iter()
            .map(|b| (b.id, b.name))
            .collect()
    };

    Ok(report_items_for_display(items, |id| {
        localizer
            .behavior_name(id)
            .or_else(|| customized.get(id).cloned())
            .unwrap_or_default()
    }))
}

/// Report-item routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/report_items", get(get_report_items))
}
