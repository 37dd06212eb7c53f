//! Account endpoint DTOs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::profile::Profile;

/// `POST /accounts` request body.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Client-supplied account handle; minted server-side when absent.
    #[serde(default)]
    pub account_number: Option<String>,
    /// Client public key material, stored opaquely in metadata.
    #[serde(default)]
    pub enc_pub_key: Option<String>,
    /// Free-form client metadata.
    #[serde(default)]
    pub metadata: Value,
}

/// `POST /accounts` response payload.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub result: RegisteredAccount,
}

/// The newly-created account and its bearer token.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegisteredAccount {
    pub account_number: String,
    pub api_token: String,
}

/// `GET /accounts/me` response payload.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    pub result: Profile,
}

/// `PATCH /accounts/me` request body.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateMetadataRequest {
    pub metadata: Value,
}

/// `POST /accounts/me/here` request body: a location ping.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct HereRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// Fixed-offset timezone string such as `"GMT+8"`.
    #[serde(default)]
    pub timezone: String,
}
