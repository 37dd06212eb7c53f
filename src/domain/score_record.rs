//! Per-day score history rows and chart aggregation types.

use serde::{Deserialize, Serialize};

/// Whether a history row belongs to a profile or a POI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreRecordType {
    Individual,
    Poi,
}

impl ScoreRecordType {
    /// Storage discriminator string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Poi => "poi",
        }
    }
}

/// One `(owner, type, date)` running-average history row.
///
/// Upsert rule: `new_score = (score * update_times + incoming) /
/// (update_times + 1)`, so `score` is always the plain average of every
/// value written that day and `update_times` counts the writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub owner: String,
    #[serde(rename = "type")]
    pub record_type: ScoreRecordType,
    /// `YYYY-MM-DD` in UTC.
    pub date: String,
    pub score: f64,
    pub update_times: f64,
}

impl ScoreRecord {
    /// Folds one more score into the running average.
    #[must_use]
    pub fn fold(&self, incoming: f64) -> f64 {
        (self.score * self.update_times + incoming) / (self.update_times + 1.0)
    }
}

/// Chart granularity for time-series report items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeGranularity {
    Day,
    Month,
}

impl TimeGranularity {
    /// Length of the date-string prefix that identifies a bucket
    /// (`2020-05-10` for days, `2020-05` for months).
    #[must_use]
    pub const fn date_prefix_len(self) -> usize {
        match self {
            Self::Day => 10,
            Self::Month => 7,
        }
    }
}

/// One aggregated `(bucket name, value)` pair in a time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    pub value: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_is_running_average() {
        let record = ScoreRecord {
            owner: "acct".to_string(),
            record_type: ScoreRecordType::Individual,
            date: "2020-05-10".to_string(),
            score: 80.0,
            update_times: 3.0,
        };
        // (80*3 + 40) / 4 = 70
        assert!((record.fold(40.0) - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fold_of_first_write_is_identity() {
        let record = ScoreRecord {
            owner: "acct".to_string(),
            record_type: ScoreRecordType::Poi,
            date: "2020-05-10".to_string(),
            score: 0.0,
            update_times: 0.0,
        };
        assert!((record.fold(55.5) - 55.5).abs() < f64::EPSILON);
    }

    #[test]
    fn granularity_prefix_lengths() {
        assert_eq!(TimeGranularity::Day.date_prefix_len(), 10);
        assert_eq!(TimeGranularity::Month.date_prefix_len(), 7);
    }
}
