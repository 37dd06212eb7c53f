//! Chart aggregation for `/report_items`.
//!
//! Joins a current-period distribution (or time series) against the
//! previous period's distribution, producing one entry per item id with
//! value and day-over-day change rate.

use std::collections::HashMap;

use crate::domain::score_record::Bucket;
use crate::score::change_rate;

/// One aggregated chart entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportItem {
    pub id: String,
    pub name: String,
    pub value: i64,
    pub change_rate: f64,
    pub distribution: HashMap<String, i64>,
}

/// Merges current and previous distributions into report items.
///
/// An item only present now defaults to +100%; one only present before
/// shows zero with −100%; present in both uses the exact change rate.
#[must_use]
pub fn gather_report_items(
    current: &HashMap<String, i64>,
    previous: &HashMap<String, i64>,
) -> HashMap<String, ReportItem> {
    let mut items: HashMap<String, ReportItem> = current
        .iter()
        .map(|(id, &value)| {
            (
                id.clone(),
                ReportItem {
                    id: id.clone(),
                    name: String::new(),
                    value,
                    change_rate: 100.0,
                    distribution: HashMap::new(),
                },
            )
        })
        .collect();

    for (id, &value) in previous {
        match items.get_mut(id) {
            Some(item) => {
                item.change_rate = change_rate(item.value as f64, value as f64);
            }
            None => {
                items.insert(
                    id.clone(),
                    ReportItem {
                        id: id.clone(),
                        name: String::new(),
                        value: 0,
                        change_rate: -100.0,
                        distribution: HashMap::new(),
                    },
                );
            }
        }
    }

    items
}

/// Like [`gather_report_items`] but the current period arrives as time
/// buckets, which also become the entry's distribution. With `average`
/// the value is the bucket mean instead of the sum (used for scores).
#[must_use]
pub fn gather_report_items_with_distribution(
    current: &HashMap<String, Vec<Bucket>>,
    previous: &HashMap<String, i64>,
    average: bool,
) -> HashMap<String, ReportItem> {
    let mut items: HashMap<String, ReportItem> = HashMap::new();

    for (id, buckets) in current {
        if buckets.is_empty() {
            continue;
        }
        let mut sum = 0;
        let mut distribution = HashMap::new();
        for bucket in buckets {
            sum += bucket.value;
            distribution.insert(bucket.name.clone(), bucket.value);
        }
        let value = if average {
            sum / distribution.len() as i64
        } else {
            sum
        };
        items.insert(
            id.clone(),
            ReportItem {
                id: id.clone(),
                name: String::new(),
                value,
                change_rate: 100.0,
                distribution,
            },
        );
    }

    for (id, &value) in previous {
        match items.get_mut(id) {
            Some(item) => {
                item.change_rate = change_rate(item.value as f64, value as f64);
            }
            None => {
                items.insert(
                    id.clone(),
                    ReportItem {
                        id: id.clone(),
                        name: String::new(),
                        value: 0,
                        change_rate: -100.0,
                        distribution: HashMap::new(),
                    },
                );
            }
        }
    }

    items
}

/// Resolves display names and orders entries by value, descending.
#[must_use]
pub fn report_items_for_display(
    items: HashMap<String, ReportItem>,
    name_of: impl Fn(&str) -> String,
) -> Vec<ReportItem> {
    let mut results: Vec<ReportItem> = items
        .into_values()
        .map(|mut item| {
            item.name = name_of(&item.id);
            item
        })
        .collect();
    results.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.id.cmp(&b.id)));
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_current_and_previous_periods() {
        let current = HashMap::from([("a".to_string(), 3), ("b".to_string(), 5)]);
        let previous = HashMap::from([("b".to_string(), 2), ("c".to_string(), 3)]);

        let items = gather_report_items(&current, &previous);
        assert_eq!(items.len(), 3);

        let a = &items["a"];
        assert_eq!((a.value, a.change_rate), (3, 100.0));
        let b = &items["b"];
        assert_eq!((b.value, b.change_rate), (5, 150.0));
        let c = &items["c"];
        assert_eq!((c.value, c.change_rate), (0, -100.0));
    }

    #[test]
    fn buckets_sum_into_value_and_distribution() {
        let current = HashMap::from([(
            "fever".to_string(),
            vec![
                Bucket {
                    name: "2020-05-09".to_string(),
                    value: 2,
                },
                Bucket {
                    name: "2020-05-10".to_string(),
                    value: 3,
                },
            ],
        )]);
        let items = gather_report_items_with_distribution(&current, &HashMap::new(), false);
        let fever = &items["fever"];
        assert_eq!(fever.value, 5);
        assert_eq!(fever.distribution.get("2020-05-10"), Some(&3));
    }

    #[test]
    fn average_mode_divides_by_bucket_count() {
        let current = HashMap::from([(
            "autonomy score".to_string(),
            vec![
                Bucket {
                    name: "2020-05-09".to_string(),
                    value: 80,
                },
                Bucket {
                    name: "2020-05-10".to_string(),
                    value: 60,
                },
            ],
        )]);
        let items = gather_report_items_with_distribution(&current, &HashMap::new(), true);
        assert_eq!(items["autonomy score"].value, 70);
    }

    #[test]
    fn empty_bucket_lists_are_skipped() {
        let current = HashMap::from([("fever".to_string(), Vec::new())]);
        let items = gather_report_items_with_distribution(&current, &HashMap::new(), false);
        assert!(items.is_empty());
    }

    #[test]
    fn display_sorts_by_value_descending() {
        let current = HashMap::from([
            ("a".to_string(), 1),
            ("b".to_string(), 9),
            ("c".to_string(), 4),
        ]);
        let items = gather_report_items(&current, &HashMap::new());
        let display = report_items_for_display(items, str::to_uppercase);
        let order: Vec<&str> = display.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert_eq!(display[0].name, "B");
    }
}
