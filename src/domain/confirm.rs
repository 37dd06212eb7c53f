//! Confirmed-case time series from the community data source.

use serde::{Deserialize, Serialize};

/// Number of days of confirmed-case history fed into the confirm score.
pub const CONFIRM_SCORE_WINDOW_SIZE: usize = 14;

/// Countries with imported confirmed-case data. Regions outside this set
/// score with an empty series.
pub const CDS_COUNTRIES: [&str; 3] = ["United States", "Taiwan", "Iceland"];

/// One day of the active-case series for a region, oldest-first in a
/// window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CdsScoreDataSet {
    /// Region name as reported by the data source.
    pub name: String,
    /// Active cases on that day.
    pub cases: f64,
}

/// A raw confirmed-case row as imported from the community data source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CdsData {
    pub name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub county: String,
    #[serde(default)]
    pub state: String,
    pub country: String,
    #[serde(default)]
    pub level: String,
    pub cases: f64,
    #[serde(default)]
    pub deaths: f64,
    #[serde(default)]
    pub recovered: f64,
    pub active: f64,
    #[serde(rename = "report_ts")]
    pub report_time: i64,
}

/// True when confirmed-case data is imported for the given country.
#[must_use]
pub fn has_case_data(country: &str) -> bool {
    CDS_COUNTRIES.contains(&country)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_countries_have_case_data() {
        assert!(has_case_data("Taiwan"));
        assert!(has_case_data("United States"));
        assert!(!has_case_data("France"));
        assert!(!has_case_data(""));
    }
}
