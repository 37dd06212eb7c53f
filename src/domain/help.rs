//! Community help requests.

use serde::{Deserialize, Serialize};

use super::ids::HelpId;

/// Lifecycle state of a help request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HelpState {
    #[default]
    Pending,
    Responded,
    Expired,
}

/// A request for help posted by one account and answerable by another.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HelpRequest {
    pub id: HelpId,
    pub requester: String,
    pub subject: String,
    #[serde(rename = "exact_needs")]
    pub needs: String,
    #[serde(rename = "meeting_location")]
    pub meeting_place: String,
    pub contact_info: String,
    #[serde(default)]
    pub state: HelpState,
    #[serde(default)]
    pub helper: String,
    pub created_at: i64,
}
