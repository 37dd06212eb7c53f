//! Symptom component score and spike detection.

use chrono::{DateTime, Utc};

use crate::domain::metric::{Metric, NearestSymptomData};
use crate::domain::report::DEFAULT_SYMPTOM_WEIGHTS;
use crate::score::change_rate;

/// Fills `details.symptoms` scores, the top-level symptom count/delta,
/// and the spike bookkeeping from the collected distributions.
///
/// Each reporting user contributes at most one occurrence per symptom, so
/// a weighted count of N means N distinct users reported that symptom.
pub fn update_symptom_metrics(metric: &mut Metric, now: DateTime<Utc>) {
    let details = &metric.details.symptoms;

    let today_score = day_score(&details.today_data);
    let yesterday_score = day_score(&details.yesterday_data);

    let count_today = details.today_data.official_count + details.today_data.customized_count;
    let count_yesterday =
        details.yesterday_data.official_count + details.yesterday_data.customized_count;

    let spike_list = spiked_symptoms(&details.today_data, &details.yesterday_data);

    let details = &mut metric.details.symptoms;
    details.score = today_score;
    details.score_yesterday = yesterday_score;
    details.total_people = details.today_data.user_count;
    details.total_people_yesterday = details.yesterday_data.user_count;
    if !spike_list.is_empty() {
        details.last_spike_list = spike_list;
        details.last_spike_update = now.timestamp();
    } else {
        details.last_spike_list = Vec::new();
    }

    metric.symptom_count = count_today;
    metric.symptom_delta = change_rate(count_today, count_yesterday);
}

fn day_score(data: &NearestSymptomData) -> f64 {
    let max_score_per_person: f64 = DEFAULT_SYMPTOM_WEIGHTS.values().sum();

    let mut weighted_sum = 0.0;
    for (symptom_id, &count) in &data.weight_distribution {
        let weight = DEFAULT_SYMPTOM_WEIGHTS.get(symptom_id).copied().unwrap_or(1.0);
        weighted_sum += weight * count as f64;
    }

    let max_weighted_sum = data.user_count * max_score_per_person + data.customized_count;
    if max_weighted_sum == 0.0 {
        return 100.0;
    }

    100.0 * (1.0 - weighted_sum / max_weighted_sum)
}

/// Symptom ids whose distinct-user count today strictly exceeds
/// yesterday's. Sorted for stable notification payloads.
fn spiked_symptoms(today: &NearestSymptomData, yesterday: &NearestSymptomData) -> Vec<String> {
    let mut spiked: Vec<String> = today
        .weight_distribution
        .iter()
        .filter(|(id, count)| {
            **count > yesterday.weight_distribution.get(id.as_str()).copied().unwrap_or(0)
        })
        .map(|(id, _)| id.clone())
        .collect();
    spiked.sort();
    spiked
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::domain::report::{COUGH, FEVER};

    fn day(
        distribution: &[(&str, i64)],
        official: f64,
        customized: f64,
        users: f64,
    ) -> NearestSymptomData {
        NearestSymptomData {
            weight_distribution: distribution
                .iter()
                .map(|(id, c)| ((*id).to_string(), *c))
                .collect(),
            official_count: official,
            customized_count: customized,
            user_count: users,
        }
    }

    fn metric(today: NearestSymptomData, yesterday: NearestSymptomData) -> Metric {
        let mut m = Metric::default();
        m.details.symptoms.today_data = today;
        m.details.symptoms.yesterday_data = yesterday;
        m
    }

    #[test]
    fn no_reports_scores_perfect() {
        let mut m = metric(NearestSymptomData::default(), NearestSymptomData::default());
        update_symptom_metrics(&mut m, Utc::now());
        assert_eq!(m.details.symptoms.score, 100.0);
        assert_eq!(m.symptom_count, 0.0);
        assert_eq!(m.symptom_delta, 0.0);
        assert!(m.details.symptoms.last_spike_list.is_empty());
    }

    #[test]
    fn weighted_symptoms_lower_the_score() {
        let max_per_person: f64 = DEFAULT_SYMPTOM_WEIGHTS.values().sum();
        // One user reporting fever (weight 3): 100 * (1 - 3/W).
        let mut m = metric(day(&[(FEVER, 1)], 1.0, 0.0, 1.0), NearestSymptomData::default());
        update_symptom_metrics(&mut m, Utc::now());
        let expect = 100.0 * (1.0 - 3.0 / max_per_person);
        assert!((m.details.symptoms.score - expect).abs() < 1e-9);
        assert_eq!(m.symptom_delta, 100.0);
    }

    #[test]
    fn customized_symptoms_weigh_one() {
        // One user, one customized symptom: max = W + 1, weighted = 1.
        let max_per_person: f64 = DEFAULT_SYMPTOM_WEIGHTS.values().sum();
        let mut m = metric(
            day(&[("deadbeef", 1)], 0.0, 1.0, 1.0),
            NearestSymptomData::default(),
        );
        update_symptom_metrics(&mut m, Utc::now());
        let expect = 100.0 * (1.0 - 1.0 / (max_per_person + 1.0));
        assert!((m.details.symptoms.score - expect).abs() < 1e-9);
    }

    #[test]
    fn spike_detected_when_count_exceeds_yesterday() {
        let now = Utc::now();
        let mut m = metric(
            day(&[(FEVER, 3), (COUGH, 2)], 5.0, 0.0, 3.0),
            day(&[(FEVER, 3), (COUGH, 1)], 4.0, 0.0, 3.0),
        );
        update_symptom_metrics(&mut m, now);
        assert_eq!(m.details.symptoms.last_spike_list, vec![COUGH.to_string()]);
        assert_eq!(m.details.symptoms.last_spike_update, now.timestamp());
    }

    #[test]
    fn no_spike_keeps_update_timestamp_untouched() {
        let mut m = metric(
            day(&[(FEVER, 2)], 2.0, 0.0, 2.0),
            day(&[(FEVER, 2)], 2.0, 0.0, 2.0),
        );
        m.details.symptoms.last_spike_update = 123;
        update_symptom_metrics(&mut m, Utc::now());
        assert!(m.details.symptoms.last_spike_list.is_empty());
        assert_eq!(m.details.symptoms.last_spike_update, 123);
    }

    #[test]
    fn new_symptom_today_is_a_spike() {
        let mut m = metric(
            day(&[(FEVER, 1)], 1.0, 0.0, 1.0),
            NearestSymptomData {
                weight_distribution: HashMap::new(),
                ..NearestSymptomData::default()
            },
        );
        update_symptom_metrics(&mut m, Utc::now());
        assert_eq!(m.details.symptoms.last_spike_list, vec![FEVER.to_string()]);
    }
}
