//! Help-request endpoint DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::help::HelpRequest;

/// `POST /helps` request body.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AskForHelpRequest {
    pub subject: String,
    #[serde(default, rename = "exact_needs")]
    pub needs: String,
    #[serde(default, rename = "meeting_location")]
    pub meeting_place: String,
    #[serde(default)]
    pub contact_info: String,
}

/// A single help request payload.
#[derive(Debug, Clone, Serialize)]
pub struct HelpResponse {
    pub result: HelpRequest,
}

/// `GET /helps` response payload.
#[derive(Debug, Clone, Serialize)]
pub struct HelpListResponse {
    pub helps: Vec<HelpRequest>,
}
