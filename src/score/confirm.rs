//! Confirmed-case component score.
//!
//! An exponentially-weighted optimism metric over the 14-day active-case
//! window: recent days weigh far more than old ones, and a case-free
//! window scores close to 1 before scaling to [0,100].

use crate::domain::confirm::{CdsScoreDataSet, CONFIRM_SCORE_WINDOW_SIZE};
use crate::domain::metric::Metric;

/// Left-pads a short series with zero-case days so it spans the full
/// scoring window.
fn dataset_prepend_zero(dataset: &[CdsScoreDataSet]) -> Vec<CdsScoreDataSet> {
    if dataset.len() >= CONFIRM_SCORE_WINDOW_SIZE {
        return dataset.to_vec();
    }

    let name = dataset.first().map(|d| d.name.clone()).unwrap_or_default();
    let lack = CONFIRM_SCORE_WINDOW_SIZE - dataset.len();
    let mut padded = Vec::with_capacity(CONFIRM_SCORE_WINDOW_SIZE);
    padded.extend((0..lack).map(|_| CdsScoreDataSet {
        name: name.clone(),
        cases: 0.0,
    }));
    padded.extend_from_slice(dataset);
    padded
}

/// Weighted average with exponential coefficients `e^((i+1)/2)`, oldest
/// day first.
fn exponential_weight_average(dataset: &[CdsScoreDataSet]) -> f64 {
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (idx, entry) in dataset.iter().enumerate() {
        let power = (idx as f64 + 1.0) / 2.0;
        numerator += power.exp() * entry.cases;
        denominator += power.exp() * (entry.cases + 1.0);
    }

    if denominator > 0.0 {
        1.0 - numerator / denominator
    } else {
        0.0
    }
}

/// Fills `details.confirm.score` and `score_yesterday` from the
/// continuous series. An empty series scores zero for both days;
/// yesterday drops the most recent day and re-pads.
pub fn calculate_confirm_score(metric: &mut Metric) {
    let details = &mut metric.details.confirm;

    if details.continuous_data.is_empty() {
        details.score = 0.0;
        details.score_yesterday = 0.0;
        return;
    }

    if details.continuous_data.len() < CONFIRM_SCORE_WINDOW_SIZE {
        details.continuous_data = dataset_prepend_zero(&details.continuous_data);
    }

    let dataset = &details.continuous_data;
    let yesterday = dataset_prepend_zero(&dataset[..dataset.len() - 1]);

    details.score = exponential_weight_average(dataset) * 100.0;
    details.score_yesterday = exponential_weight_average(&yesterday) * 100.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(cases: &[f64]) -> Vec<CdsScoreDataSet> {
        cases
            .iter()
            .map(|&c| CdsScoreDataSet {
                name: "Taiwan".to_string(),
                cases: c,
            })
            .collect()
    }

    fn metric_with(cases: &[f64]) -> Metric {
        let mut metric = Metric::default();
        metric.details.confirm.continuous_data = series(cases);
        metric
    }

    #[test]
    fn empty_series_scores_zero() {
        let mut metric = metric_with(&[]);
        calculate_confirm_score(&mut metric);
        assert_eq!(metric.details.confirm.score, 0.0);
        assert_eq!(metric.details.confirm.score_yesterday, 0.0);
    }

    #[test]
    fn linear_series_matches_reference_values() {
        let cases: Vec<f64> = (1..=14).map(f64::from).collect();
        let mut metric = metric_with(&cases);
        calculate_confirm_score(&mut metric);
        assert!(
            (metric.details.confirm.score - 7.423_197_418_751_16).abs() < 1e-9,
            "score {}",
            metric.details.confirm.score
        );
        assert!(
            (metric.details.confirm.score_yesterday - 8.018_420_610_537_158).abs() < 1e-9,
            "yesterday {}",
            metric.details.confirm.score_yesterday
        );
    }

    #[test]
    fn short_series_is_left_padded() {
        let mut metric = metric_with(&[3.0, 5.0]);
        calculate_confirm_score(&mut metric);
        assert_eq!(
            metric.details.confirm.continuous_data.len(),
            CONFIRM_SCORE_WINDOW_SIZE
        );
        assert_eq!(metric.details.confirm.continuous_data[0].cases, 0.0);
        assert_eq!(metric.details.confirm.continuous_data[0].name, "Taiwan");
        assert_eq!(metric.details.confirm.continuous_data[13].cases, 5.0);
    }

    #[test]
    fn case_free_window_scores_high() {
        let mut metric = metric_with(&[0.0; 14]);
        calculate_confirm_score(&mut metric);
        // No cases anywhere: numerator 0, score is the full 100.
        assert!((metric.details.confirm.score - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn recent_spike_scores_worse_than_old_spike() {
        let mut old_spike = metric_with(&[
            50.0, 50.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ]);
        let mut recent_spike = metric_with(&[
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 50.0, 50.0,
        ]);
        calculate_confirm_score(&mut old_spike);
        calculate_confirm_score(&mut recent_spike);
        assert!(old_spike.details.confirm.score > recent_spike.details.confirm.score);
    }
}
