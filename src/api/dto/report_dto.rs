//! Report and catalog endpoint DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::report::{Behavior, Symptom};

/// `POST /symptoms/report` request body.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SymptomReportRequest {
    /// Symptom ids, official or customized.
    #[serde(default)]
    pub symptoms: Vec<String>,
}

/// `POST /behaviors/report` request body.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BehaviorReportRequest {
    /// Behavior ids, official or customized.
    #[serde(default)]
    pub behaviors: Vec<String>,
}

/// `POST /symptoms` / `POST /behaviors`: create a customized entry.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateCatalogItemRequest {
    pub name: String,
    #[serde(default)]
    pub desc: String,
}

/// Id of a freshly-created catalog entry.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreateCatalogItemResponse {
    pub id: String,
}

/// `GET /symptoms` response payload.
#[derive(Debug, Clone, Serialize)]
pub struct SymptomCatalogResponse {
    pub symptoms: Vec<Symptom>,
    /// Offered in the UI but excluded from the weighted score table.
    pub suggested_symptoms: Vec<Symptom>,
}

/// `GET /behaviors` response payload.
#[derive(Debug, Clone, Serialize)]
pub struct BehaviorCatalogResponse {
    pub behaviors: Vec<Behavior>,
}
