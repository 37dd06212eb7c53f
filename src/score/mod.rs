//! Pure score engine.
//!
//! Every function in this module is deterministic and IO-free: raw
//! metrics in, component and composite scores out. The collector
//! (`service::metric_service`) fills the inputs; the mutation layer
//! persists the outputs.

pub mod autonomy;
pub mod behavior;
pub mod confirm;
pub mod resource;
pub mod symptom;

pub use autonomy::{calculate_individual_autonomy_score, calculate_poi_autonomy_score};
pub use behavior::update_behavior_metrics;
pub use confirm::calculate_confirm_score;
pub use resource::resource_score;
pub use symptom::update_symptom_metrics;

use chrono::{DateTime, Utc};

use crate::domain::metric::Metric;
use crate::domain::profile::ScoreCoefficient;

/// Default component weights for the neighborhood score: confirmed cases
/// dominate, symptoms and behaviors share the rest.
pub const DEFAULT_SYMPTOM_COEFFICIENT: f64 = 0.25;
pub const DEFAULT_BEHAVIOR_COEFFICIENT: f64 = 0.25;
pub const DEFAULT_CONFIRM_COEFFICIENT: f64 = 0.5;

/// Day-over-day change in percent.
///
/// `100·(a−b)/b` when `b > 0`; `100` when `b == 0` and `a > 0`; `0` when
/// both are zero.
#[must_use]
pub fn change_rate(a: f64, b: f64) -> f64 {
    if b > 0.0 {
        100.0 * (a - b) / b
    } else if a > 0.0 {
        100.0
    } else {
        0.0
    }
}

/// Score color buckets shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreColor {
    Red,
    Yellow,
    Green,
}

/// Maps a score in [0,100] to its color bucket:
/// Red [0,33), Yellow [33,67), Green [67,100].
#[must_use]
pub fn score_color(score: f64) -> ScoreColor {
    if score < 33.0 {
        ScoreColor::Red
    } else if score < 67.0 {
        ScoreColor::Yellow
    } else {
        ScoreColor::Green
    }
}

/// True when `old` and `new` fall into different color buckets. This is
/// the sole trigger for the "location status changed" nudge.
#[must_use]
pub fn check_score_color_change(old: f64, new: f64) -> bool {
    score_color(old) != score_color(new)
}

/// Transforms collected raw metrics into a fully-scored [`Metric`].
///
/// Runs the confirm, behavior, and symptom component calculations in
/// place, then blends them into the neighborhood `score` /
/// `score_yesterday` pair using either the account's coefficient
/// overrides or the default weights. `now` stamps `last_update` and the
/// spike bookkeeping; callers pass the same instant they used for the
/// collection windows.
#[must_use]
pub fn calculate_metric(
    mut metric: Metric,
    coefficient: Option<&ScoreCoefficient>,
    now: DateTime<Utc>,
) -> Metric {
    calculate_confirm_score(&mut metric);
    update_behavior_metrics(&mut metric);
    update_symptom_metrics(&mut metric, now);

    let (symptoms, behaviors, confirms) = match coefficient {
        Some(c) => (c.symptoms, c.behaviors, c.confirms),
        None => (
            DEFAULT_SYMPTOM_COEFFICIENT,
            DEFAULT_BEHAVIOR_COEFFICIENT,
            DEFAULT_CONFIRM_COEFFICIENT,
        ),
    };
    let total = symptoms + behaviors + confirms;
    let (symptoms, behaviors, confirms) = if total > 0.0 {
        (symptoms / total, behaviors / total, confirms / total)
    } else {
        (
            DEFAULT_SYMPTOM_COEFFICIENT,
            DEFAULT_BEHAVIOR_COEFFICIENT,
            DEFAULT_CONFIRM_COEFFICIENT,
        )
    };

    let details = &metric.details;
    metric.score = symptoms * details.symptoms.score
        + behaviors * details.behaviors.score
        + confirms * details.confirm.score;
    metric.score_yesterday = symptoms * details.symptoms.score_yesterday
        + behaviors * details.behaviors.score_yesterday
        + confirms * details.confirm.score_yesterday;
    metric.last_update = now.timestamp();

    metric
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_rate_of_equal_values_is_zero() {
        assert_eq!(change_rate(0.0, 0.0), 0.0);
        assert_eq!(change_rate(42.0, 42.0), 0.0);
    }

    #[test]
    fn change_rate_from_zero_is_one_hundred() {
        assert_eq!(change_rate(5.0, 0.0), 100.0);
    }

    #[test]
    fn change_rate_decrease_is_negative() {
        assert!((change_rate(50.0, 100.0) + 50.0).abs() < f64::EPSILON);
        assert!((change_rate(0.0, 4.0) + 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn color_buckets_match_boundaries() {
        assert_eq!(score_color(0.0), ScoreColor::Red);
        assert_eq!(score_color(32.999), ScoreColor::Red);
        assert_eq!(score_color(33.0), ScoreColor::Yellow);
        assert_eq!(score_color(66.999), ScoreColor::Yellow);
        assert_eq!(score_color(67.0), ScoreColor::Green);
        assert_eq!(score_color(100.0), ScoreColor::Green);
    }

    #[test]
    fn color_change_is_symmetric() {
        for (a, b) in [(10.0, 40.0), (40.0, 70.0), (10.0, 90.0), (35.0, 36.0)] {
            assert_eq!(check_score_color_change(a, b), check_score_color_change(b, a));
        }
    }

    #[test]
    fn color_change_false_within_bucket() {
        assert!(!check_score_color_change(0.0, 32.9));
        assert!(!check_score_color_change(33.0, 66.9));
        assert!(!check_score_color_change(67.0, 100.0));
        assert!(check_score_color_change(32.9, 33.0));
        assert!(check_score_color_change(66.9, 67.0));
    }

    #[test]
    fn calculate_metric_blends_components_with_defaults() {
        use crate::domain::metric::{Details, SymptomDetail};

        let now = chrono::Utc::now();
        // Empty raw inputs: confirm 0, behavior 0, symptom 100 (no reports).
        let raw = Metric {
            details: Details {
                symptoms: SymptomDetail::default(),
                ..Details::default()
            },
            ..Metric::default()
        };
        let metric = calculate_metric(raw, None, now);
        assert!((metric.score - 25.0).abs() < 1e-9);
        assert_eq!(metric.last_update, now.timestamp());
    }

    #[test]
    fn calculate_metric_honors_coefficient_overrides() {
        let now = chrono::Utc::now();
        let coefficient = ScoreCoefficient {
            symptoms: 1.0,
            behaviors: 0.0,
            confirms: 0.0,
            updated_at: now,
        };
        let metric = calculate_metric(Metric::default(), Some(&coefficient), now);
        // Pure symptom weighting with no reports: perfect score.
        assert!((metric.score - 100.0).abs() < 1e-9);
    }
}
