//! `/report_items` DTOs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::score_record::TimeGranularity;
use crate::service::report_items::ReportItem;

/// Aggregation subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportItemScope {
    Individual,
    Neighborhood,
    Poi,
}

/// Aggregated quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportItemType {
    Score,
    Symptom,
    Behavior,
    Case,
}

/// `GET /report_items` query parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportItemQuery {
    pub scope: ReportItemScope,
    #[serde(rename = "type")]
    pub item_type: ReportItemType,
    pub granularity: TimeGranularity,
    /// RFC3339 period start; its UTC offset shifts day buckets.
    pub start: String,
    /// RFC3339 period end.
    pub end: String,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub poi_id: Option<String>,
}

/// One chart entry on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct ReportItemDto {
    pub id: String,
    pub name: String,
    pub value: i64,
    pub change_rate: f64,
    pub distribution: HashMap<String, i64>,
}

impl From<ReportItem> for ReportItemDto {
    fn from(item: ReportItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
            value: item.value,
            change_rate: item.change_rate,
            distribution: item.distribution,
        }
    }
}

/// `GET /report_items` response payload.
#[derive(Debug, Clone, Serialize)]
pub struct ReportItemsResponse {
    pub report_items: Vec<ReportItemDto>,
}
