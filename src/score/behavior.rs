//! Preventive-behavior component score.

use crate::domain::metric::Metric;
use crate::domain::report::{DEFAULT_BEHAVIOR_WEIGHTS, TOTAL_OFFICIAL_BEHAVIOR_WEIGHT};
use crate::score::change_rate;

/// Fills `details.behaviors.score` / `score_yesterday` and the top-level
/// behavior count/delta from the collected distributions.
///
/// Official behaviors are weighted per the default table; customized
/// behaviors count 1 each but their total contribution is capped at half
/// of the maximum weighted sum so that free-form entries cannot dominate
/// the score.
pub fn update_behavior_metrics(metric: &mut Metric) {
    let details = &metric.details.behaviors;

    let (today_total, today_score) = day_score(
        &details.today_distribution,
        details.report_times,
    );
    let (yesterday_total, yesterday_score) = day_score(
        &details.yesterday_distribution,
        details.report_times_yesterday,
    );

    let details = &mut metric.details.behaviors;
    details.score = today_score;
    details.score_yesterday = yesterday_score;

    metric.behavior_count = today_total as f64;
    metric.behavior_delta = change_rate(today_total as f64, yesterday_total as f64);
}

fn day_score(
    distribution: &std::collections::HashMap<String, i64>,
    report_times: i64,
) -> (i64, f64) {
    let mut total = 0;
    let mut official_weighted_sum = 0.0;
    let mut non_official_weighted_sum = 0.0;
    for (behavior_id, &count) in distribution {
        match DEFAULT_BEHAVIOR_WEIGHTS.get(behavior_id) {
            Some(weight) => official_weighted_sum += weight * count as f64,
            None => non_official_weighted_sum += count as f64,
        }
        total += count;
    }

    let max_weighted_sum =
        report_times as f64 * TOTAL_OFFICIAL_BEHAVIOR_WEIGHT + non_official_weighted_sum;
    // cap weighted sum of non-official behaviors
    let non_official_weighted_sum = non_official_weighted_sum.min(max_weighted_sum / 2.0);
    let weighted_sum = official_weighted_sum + non_official_weighted_sum;

    let score = if max_weighted_sum > 0.0 {
        100.0 * weighted_sum / max_weighted_sum
    } else {
        0.0
    };

    (total, score)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::domain::report::{CLEAN_HAND, WEAR_MASK};

    fn metric(
        today: HashMap<String, i64>,
        yesterday: HashMap<String, i64>,
        report_times: i64,
        report_times_yesterday: i64,
    ) -> Metric {
        let mut m = Metric::default();
        m.details.behaviors.today_distribution = today;
        m.details.behaviors.yesterday_distribution = yesterday;
        m.details.behaviors.report_times = report_times;
        m.details.behaviors.report_times_yesterday = report_times_yesterday;
        m
    }

    #[test]
    fn no_reports_scores_zero() {
        let mut m = metric(HashMap::new(), HashMap::new(), 0, 0);
        update_behavior_metrics(&mut m);
        assert_eq!(m.details.behaviors.score, 0.0);
        assert_eq!(m.behavior_count, 0.0);
        assert_eq!(m.behavior_delta, 0.0);
    }

    #[test]
    fn all_official_behaviors_once_scores_full() {
        // One report covering all six official behaviors.
        let today: HashMap<String, i64> = DEFAULT_BEHAVIOR_WEIGHTS
            .keys()
            .map(|id| (id.clone(), 1))
            .collect();
        let mut m = metric(today, HashMap::new(), 1, 0);
        update_behavior_metrics(&mut m);
        assert!((m.details.behaviors.score - 100.0).abs() < 1e-9);
        assert_eq!(m.behavior_count, 6.0);
        assert_eq!(m.behavior_delta, 100.0);
    }

    #[test]
    fn partial_official_coverage_scores_fraction() {
        // One report with two of six behaviors: 2/6 of max.
        let today = HashMap::from([(CLEAN_HAND.to_string(), 1), (WEAR_MASK.to_string(), 1)]);
        let mut m = metric(today, HashMap::new(), 1, 0);
        update_behavior_metrics(&mut m);
        assert!((m.details.behaviors.score - 100.0 * 2.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn customized_contribution_is_capped_at_half() {
        // Only customized behaviors: max = 0*6 + 10 = 10, capped at 5.
        let today = HashMap::from([("made_up".to_string(), 10)]);
        let mut m = metric(today, HashMap::new(), 0, 0);
        update_behavior_metrics(&mut m);
        assert!((m.details.behaviors.score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn yesterday_uses_its_own_distribution() {
        let today = HashMap::from([(CLEAN_HAND.to_string(), 3)]);
        let yesterday = HashMap::from([(CLEAN_HAND.to_string(), 6)]);
        let mut m = metric(today, yesterday, 1, 1);
        update_behavior_metrics(&mut m);
        assert!(m.details.behaviors.score < m.details.behaviors.score_yesterday);
        assert!((m.behavior_delta + 50.0).abs() < 1e-9);
    }
}
