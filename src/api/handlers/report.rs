//! Symptom/behavior catalog and report-ingestion handlers.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    BehaviorCatalogResponse, BehaviorReportRequest, CreateCatalogItemRequest,
    CreateCatalogItemResponse, LangQuery, OkResponse, SymptomCatalogResponse,
    SymptomReportRequest,
};
use crate::app_state::{Account, AppState};
use crate::error::GatewayError;
use crate::localization::Localizer;
use crate::service::report_service::IngestOutcome;
use crate::workflows::WorkflowError;

use super::poi::spawn_poi_refresh;

/// `GET /symptoms` — the localized symptom catalog.
#[utoipa::path(
    get,
    path = "/symptoms",
    tag = "Reports",
    summary = "Official and suggested symptom catalogs",
    responses((status = 200, description = "Symptom catalog"))
)]
pub async fn get_symptoms(
    axum::extract::Query(params): axum::extract::Query<LangQuery>,
) -> impl IntoResponse {
    let localizer = Localizer::new(&params.lang);
    Json(SymptomCatalogResponse {
        symptoms: localizer.official_symptoms(),
        suggested_symptoms: localizer.suggested_symptoms(),
    })
}

/// `POST /symptoms` — create a customized symptom.
#[utoipa::path(
    post,
    path = "/symptoms",
    tag = "Reports",
    summary = "Create a customized symptom",
    request_body = CreateCatalogItemRequest,
    responses((status = 200, description = "Stable id of the symptom", body = CreateCatalogItemResponse))
)]
pub async fn create_symptom(
    State(state): State<AppState>,
    Account(_profile): Account,
    Json(req): Json<CreateCatalogItemRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let id = state
        .reports
        .create_customized_symptom(&req.name, &req.desc)
        .await?;
    Ok(Json(CreateCatalogItemResponse { id }))
}

/// `POST /symptoms/report` — ingest a symptom self-report and trigger
/// the follow-up workflows.
#[utoipa::path(
    post,
    path = "/symptoms/report",
    tag = "Reports",
    summary = "Submit a symptom self-report",
    request_body = SymptomReportRequest,
    responses(
        (status = 200, description = "Report ingested", body = OkResponse),
        (status = 400, description = "Account has no known location"),
    )
)]
pub async fn report_symptoms(
    State(state): State<AppState>,
    Account(profile): Account,
    Json(req): Json<SymptomReportRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let outcome = state
        .reports
        .submit_symptom_report(&profile, &req.symptoms)
        .await?;

    spawn_report_workflows(&state, &outcome);
    if outcome.high_risk {
        let engine = state.workflows.clone();
        let account = outcome.account_number.clone();
        tokio::spawn(async move {
            match engine.run_symptom_follow_up(&account).await {
                // a follow-up is already pending; keep the earlier one
                Ok(()) | Err(WorkflowError::AlreadyStarted(_)) => {}
                Err(err) => tracing::error!(error = %err, "symptom follow-up failed"),
            }
        });
    }

    Ok(Json(OkResponse::ok()))
}

/// `GET /behaviors` — the localized behavior catalog.
#[utoipa::path(
    get,
    path = "/behaviors",
    tag = "Reports",
    summary = "Official behavior catalog",
    responses((status = 200, description = "Behavior catalog"))
)]
pub async fn get_behaviors(
    axum::extract::Query(params): axum::extract::Query<LangQuery>,
) -> impl IntoResponse {
    let localizer = Localizer::new(&params.lang);
    Json(BehaviorCatalogResponse {
        behaviors: localizer.official_behaviors(),
    })
}

/// `POST /behaviors` — create a customized behavior.
#[utoipa::path(
    post,
    path = "/behaviors",
    tag = "Reports",
    summary = "Create a customized behavior",
    request_body = CreateCatalogItemRequest,
    responses((status = 200, description = "Stable id of the behavior", body = CreateCatalogItemResponse))
)]
pub async fn create_behavior(
    State(state): State<AppState>,
    Account(_profile): Account,
    Json(req): Json<CreateCatalogItemRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let id = state
        .reports
        .create_customized_behavior(&req.name, &req.desc)
        .await?;
    Ok(Json(CreateCatalogItemResponse { id }))
}

/// `POST /behaviors/report` — ingest a behavior self-report.
#[utoipa::path(
    post,
    path = "/behaviors/report",
    tag = "Reports",
    summary = "Submit a preventive-behavior self-report",
    request_body = BehaviorReportRequest,
    responses(
        (status = 200, description = "Report ingested", body = OkResponse),
        (status = 400, description = "Account has no known location"),
    )
)]
pub async fn report_behaviors(
    State(state): State<AppState>,
    Account(profile): Account,
    Json(req): Json<BehaviorReportRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let outcome = state
        .reports
        .submit_behavior_report(&profile, &req.behaviors)
        .await?;

    spawn_report_workflows(&state, &outcome);
    Ok(Json(OkResponse::ok()))
}

/// Every report refreshes the reporter's own state plus every POI whose
/// neighborhood contains the report.
fn spawn_report_workflows(state: &AppState, outcome: &IngestOutcome) {
    let engine = state.workflows.clone();
    let account = outcome.account_number.clone();
    tokio::spawn(async move {
        match engine.run_account_state_refresh(&account, None).await {
            Ok(_) => {}
            Err(WorkflowError::AlreadyStarted(id)) => {
                tracing::debug!(workflow = %id, "refresh already running");
            }
            Err(err) => tracing::error!(error = %err, "state refresh failed"),
        }
    });

    for poi_id in &outcome.nearby_poi_ids {
        spawn_poi_refresh(state, &outcome.account_number, *poi_id);
    }
}

/// Report routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/symptoms", get(get_symptoms).post(create_symptom))
        .route("/symptoms/report", post(report_symptoms))
        .route("/behaviors", get(get_behaviors).post(create_behavior))
        .route("/behaviors/report", post(report_behaviors))
}
