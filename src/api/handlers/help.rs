//! Community help-request handlers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{AskForHelpRequest, HelpListResponse, HelpResponse, OkResponse};
use crate::app_state::{Account, AppState};
use crate::domain::help::{HelpRequest, HelpState};
use crate::domain::ids::HelpId;
use crate::error::GatewayError;
use crate::persistence::Store;

const DEFAULT_HELP_LIST_COUNT: i64 = 10;

/// `POST /helps` — ask for help.
#[utoipa::path(
    post,
    path = "/helps",
    tag = "Helps",
    summary = "Create a help request",
    request_body = AskForHelpRequest,
    responses((status = 200, description = "The created request"))
)]
pub async fn ask_for_help(
    State(state): State<AppState>,
    Account(profile): Account,
    Json(req): Json<AskForHelpRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    if req.subject.trim().is_empty() {
        return Err(GatewayError::InvalidParameters);
    }

    let help = HelpRequest {
        id: HelpId::new(),
        requester: profile.account_number,
        subject: req.subject,
        needs: req.needs,
        meeting_place: req.meeting_place,
        contact_info: req.contact_info,
        state: HelpState::Pending,
        helper: String::new(),
        created_at: Utc::now().timestamp(),
    };
    state.store.create_help(&help).await?;
    Ok(Json(HelpResponse { result: help }))
}

/// `GET /helps` — open help requests, oldest first.
#[utoipa::path(
    get,
    path = "/helps",
    tag = "Helps",
    summary = "List open help requests",
    responses((status = 200, description = "Open requests"))
)]
pub async fn list_helps(
    State(state): State<AppState>,
    Account(_profile): Account,
) -> Result<impl IntoResponse, GatewayError> {
    let helps = state.store.list_helps(DEFAULT_HELP_LIST_COUNT).await?;
    Ok(Json(HelpListResponse { helps }))
}

/// `GET /helps/{id}` — one help request.
#[utoipa::path(
    get,
    path = "/helps/{id}",
    tag = "Helps",
    summary = "Help request detail",
    responses(
        (status = 200, description = "The request"),
        (status = 400, description = "Unknown id"),
    )
)]
pub async fn get_help(
    State(state): State<AppState>,
    Account(_profile): Account,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let help_id = HelpId::parse(&id).map_err(|_| GatewayError::InvalidParameters)?;
    let help = state
        .store
        .get_help(help_id)
        .await?
        .ok_or(GatewayError::InvalidParameters)?;
    Ok(Json(HelpResponse { result: help }))
}

/// `POST /helps/{id}/answer` — answer a pending request.
#[utoipa::path(
    post,
    path = "/helps/{id}/answer",
    tag = "Helps",
    summary = "Answer a help request",
    responses(
        (status = 200, description = "Answered", body = OkResponse),
        (status = 403, description = "Already answered or own request"),
    )
)]
pub async fn answer_help(
    State(state): State<AppState>,
    Account(profile): Account,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let help_id = HelpId::parse(&id).map_err(|_| GatewayError::InvalidParameters)?;
    state
        .store
        .answer_help(&profile.account_number, help_id)
        .await?;
    Ok(Json(OkResponse::ok()))
}

/// Help routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/helps", post(ask_for_help).get(list_helps))
        .route("/helps/{id}", get(get_help))
        .route("/helps/{id}/answer", post(answer_help))
}
