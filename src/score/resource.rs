//! Running-average update for one resource rating.

/// Folds a new user's score into a resource aggregate.
///
/// Returns `(ratings, sum, average)` after the fold. Re-ratings by the
/// same user must not go through here; the rating engine adjusts `sum`
/// by the score difference instead so `ratings` keeps counting distinct
/// users.
#[must_use]
pub fn resource_score(ratings: i64, sum: f64, score: f64) -> (i64, f64, f64) {
    let sum = sum + score;
    let ratings = ratings + 1;
    let average = sum / ratings as f64;
    (ratings, sum, average)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_rating() {
        let (ratings, sum, average) = resource_score(0, 0.0, 4.0);
        assert_eq!(ratings, 1);
        assert_eq!(sum, 4.0);
        assert_eq!(average, 4.0);
    }

    #[test]
    fn additional_rating_folds_into_average() {
        // Prior state sum=30 over 8 ratings; a new user rates 4.
        let (ratings, sum, average) = resource_score(8, 30.0, 4.0);
        assert_eq!(ratings, 9);
        assert_eq!(sum, 34.0);
        assert!((average - 34.0 / 9.0).abs() < f64::EPSILON);
    }
}
