//! Account lifecycle handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{
    HereRequest, OkResponse, ProfileResponse, RegisterRequest, RegisterResponse,
    RegisteredAccount, UpdateMetadataRequest,
};
use crate::app_state::{Account, AppState};
use crate::domain::location::Location;
use crate::error::GatewayError;
use crate::workflows::WorkflowError;

/// `POST /accounts` — register an account.
///
/// # Errors
///
/// Returns [`GatewayError::Forbidden`] when the account number is taken.
#[utoipa::path(
    post,
    path = "/accounts",
    tag = "Accounts",
    summary = "Register an account",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 403, description = "Account number already taken"),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let mut metadata = req.metadata;
    if let Some(enc_pub_key) = req.enc_pub_key {
        if !metadata.is_object() {
            metadata = serde_json::json!({});
        }
        if let Some(object) = metadata.as_object_mut() {
            object.insert("enc_pub_key".to_string(), enc_pub_key.into());
        }
    }

    let registration = state.profiles.register(req.account_number, metadata).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            result: RegisteredAccount {
                account_number: registration.profile.account_number,
                api_token: registration.api_token,
            },
        }),
    ))
}

/// `GET /accounts/me` — the authenticated account's profile.
#[utoipa::path(
    get,
    path = "/accounts/me",
    tag = "Accounts",
    summary = "Account detail",
    responses(
        (status = 200, description = "The account profile"),
        (status = 401, description = "Missing or invalid token"),
    )
)]
pub async fn detail(Account(profile): Account) -> impl IntoResponse {
    Json(ProfileResponse { result: profile })
}

/// `PATCH /accounts/me` — replace account metadata.
#[utoipa::path(
    patch,
    path = "/accounts/me",
    tag = "Accounts",
    summary = "Update account metadata",
    request_body = UpdateMetadataRequest,
    responses((status = 200, description = "Metadata replaced", body = OkResponse))
)]
pub async fn update_metadata(
    State(state): State<AppState>,
    Account(profile): Account,
    Json(req): Json<UpdateMetadataRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    state
        .profiles
        .update_metadata(&profile.account_number, req.metadata)
        .await?;
    Ok(Json(OkResponse::ok()))
}

/// `DELETE /accounts/me` — remove the account.
#[utoipa::path(
    delete,
    path = "/accounts/me",
    tag = "Accounts",
    summary = "Remove the account",
    responses((status = 200, description = "Account removed", body = OkResponse))
)]
pub async fn delete(
    State(state): State<AppState>,
    Account(profile): Account,
) -> Result<impl IntoResponse, GatewayError> {
    state.profiles.delete_account(&profile.account_number).await?;
    Ok(Json(OkResponse::ok()))
}

/// `POST /accounts/me/here` — location ping. Persists the new location
/// and kicks a state refresh in the background.
#[utoipa::path(
    post,
    path = "/accounts/me/here",
    tag = "Accounts",
    summary = "Report the account's current location",
    request_body = HereRequest,
    responses((status = 200, description = "Location recorded", body = OkResponse))
)]
pub async fn here(
    State(state): State<AppState>,
    Account(profile): Account,
    Json(req): Json<HereRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let timezone = if req.timezone.is_empty() {
        profile.timezone.clone()
    } else {
        req.timezone
    };
    state
        .profiles
        .update_location(
            &profile.account_number,
            Location::new(req.latitude, req.longitude),
            &timezone,
        )
        .await?;

    let engine = state.workflows.clone();
    let account = profile.account_number.clone();
    tokio::spawn(async move {
        match engine.run_account_state_refresh(&account, None).await {
            Ok(_) => {}
            Err(WorkflowError::AlreadyStarted(id)) => {
                tracing::debug!(workflow = %id, "refresh already running");
            }
            Err(err) => tracing::error!(error = %err, "state refresh failed"),
        }
    });

    Ok(Json(OkResponse::ok()))
}

/// Account routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/accounts", post(register))
        .route(
            "/accounts/me",
            axum::routing::get(detail).patch(update_metadata).delete(delete),
        )
        .route("/accounts/me/here", post(here))
}
