//! Composite autonomy scores.

use crate::domain::metric::{IndividualMetric, Metric};
use crate::domain::rating::PoiResourceRating;
use crate::score::change_rate;

/// Composite score for a person: 80% personal, 20% neighborhood.
///
/// Returns `(score, delta)` where the delta is the day-over-day change
/// rate of the composite.
#[must_use]
pub fn calculate_individual_autonomy_score(
    individual: &IndividualMetric,
    neighbor: &Metric,
) -> (f64, f64) {
    let score_today = neighbor.score * 0.2 + individual.score * 0.8;
    let score_yesterday = neighbor.score_yesterday * 0.2 + individual.score_yesterday * 0.8;

    (score_today, change_rate(score_today, score_yesterday))
}

/// Composite score for a place: 20% neighborhood, 80% resource ratings.
///
/// The ratings component is the rating-count-weighted mean star score of
/// every resource with at least one rating, rescaled from [1,5] to
/// [20,100]. Yesterday uses the `last_day_*` snapshots. A place with no
/// rated resources takes only the neighborhood contribution.
///
/// Returns `(score, score_yesterday, delta)`.
#[must_use]
pub fn calculate_poi_autonomy_score(
    resources: &[PoiResourceRating],
    neighbor: &Metric,
) -> (f64, f64, f64) {
    let mut sum_today = 0.0;
    let mut ratings_today = 0.0;
    let mut sum_yesterday = 0.0;
    let mut ratings_yesterday = 0.0;

    for r in resources {
        if r.score > 0.0 && r.ratings > 0 {
            sum_today += r.score * r.ratings as f64;
            ratings_today += r.ratings as f64;
        }
        if r.last_day_score > 0.0 && r.last_day_ratings > 0 {
            sum_yesterday += r.last_day_score * r.last_day_ratings as f64;
            ratings_yesterday += r.last_day_ratings as f64;
        }
    }

    let ratings_score_today = if ratings_today > 0.0 {
        (sum_today / ratings_today) / 5.0 * 100.0
    } else {
        0.0
    };
    let ratings_score_yesterday = if ratings_yesterday > 0.0 {
        (sum_yesterday / ratings_yesterday) / 5.0 * 100.0
    } else {
        0.0
    };

    let score_today = neighbor.score * 0.2 + ratings_score_today * 0.8;
    let score_yesterday = neighbor.score_yesterday * 0.2 + ratings_score_yesterday * 0.8;

    (
        score_today,
        score_yesterday,
        change_rate(score_today, score_yesterday),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rating::Resource;

    fn neighbor(score: f64, score_yesterday: f64) -> Metric {
        Metric {
            score,
            score_yesterday,
            ..Metric::default()
        }
    }

    #[test]
    fn individual_score_increase() {
        let metric = neighbor(100.0, 80.0);
        let individual = IndividualMetric {
            score: 100.0,
            score_yesterday: 80.0,
            ..IndividualMetric::default()
        };

        let (score, delta) = calculate_individual_autonomy_score(&individual, &metric);
        assert_eq!(score, 100.0);
        assert_eq!(delta, 25.0);
    }

    #[test]
    fn individual_score_decrease() {
        let metric = neighbor(50.0, 80.0);
        let individual = IndividualMetric {
            score: 50.0,
            score_yesterday: 100.0,
            ..IndividualMetric::default()
        };

        let (score, delta) = calculate_individual_autonomy_score(&individual, &metric);
        assert_eq!(score, 50.0);
        assert_eq!(delta, -47.916_666_666_666_67);
    }

    #[test]
    fn individual_score_stays_in_range() {
        for (i, n) in [(0.0, 0.0), (100.0, 100.0), (0.0, 100.0), (100.0, 0.0)] {
            let metric = neighbor(n, n);
            let individual = IndividualMetric {
                score: i,
                score_yesterday: i,
                ..IndividualMetric::default()
            };
            let (score, _) = calculate_individual_autonomy_score(&individual, &metric);
            assert!((0.0..=100.0).contains(&score), "score {score}");
        }
    }

    fn rated(id: &str, sum: f64, score: f64, ratings: i64, last_score: f64, last_ratings: i64) -> PoiResourceRating {
        PoiResourceRating {
            resource: Resource {
                id: id.to_string(),
                ..Resource::default()
            },
            sum_of_score: sum,
            score,
            ratings,
            last_update: 0,
            last_day_score: last_score,
            last_day_ratings: last_ratings,
        }
    }

    #[test]
    fn poi_score_weights_resources_by_rating_count() {
        let resources = vec![
            rated("resource_1", 45.0, 4.5, 10, 4.625, 8),
            rated("resource_2", 30.0, 3.75, 8, 3.5, 6),
            // Rated but zero score: excluded from both days.
            rated("resource_3", 0.0, 0.0, 1, 0.0, 0),
            // Never rated: excluded.
            rated("resource_4", 0.0, 0.0, 0, 0.0, 0),
        ];
        let metric = neighbor(50.0, 80.0);

        let (score, score_yesterday, delta) = calculate_poi_autonomy_score(&resources, &metric);
        // today: (4.5*10 + 3.75*8)/18 = 4.1667 → 83.33; 0.2*50 + 0.8*83.33
        assert!((score - 76.666_666_666_666_67).abs() < 1e-9, "score {score}");
        // yesterday: (4.625*8 + 3.5*6)/14 = 4.142857 → 82.857; 0.2*80 + 0.8*82.857
        assert!(
            (score_yesterday - 82.285_714_285_714_29).abs() < 1e-9,
            "yesterday {score_yesterday}"
        );
        assert!((delta + 6.828_703_703_703_705).abs() < 1e-9, "delta {delta}");
    }

    #[test]
    fn poi_without_ratings_takes_neighborhood_share_only() {
        let metric = neighbor(50.0, 50.0);
        let (score, score_yesterday, delta) = calculate_poi_autonomy_score(&[], &metric);
        assert_eq!(score, 10.0);
        assert_eq!(score_yesterday, 10.0);
        assert_eq!(delta, 0.0);
    }

    #[test]
    fn single_rating_scaled_form_stays_in_range() {
        // Any average star score in [1,5] scales into [20,100].
        for stars in [1.0, 2.5, 5.0] {
            let resources = vec![rated("resource_1", stars, stars, 1, 0.0, 0)];
            let metric = neighbor(0.0, 0.0);
            let (score, _, _) = calculate_poi_autonomy_score(&resources, &metric);
            let component = score / 0.8; // neighborhood contributes 0 here
            assert!((20.0..=100.0).contains(&component), "component {component}");
        }
    }
}
