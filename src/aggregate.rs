use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{Event, FeatureRow, SeriesPoint, TimeSeries, FEATURE_SCHEMA};

/// Groups events by date and carries running totals forward.
///
/// The cumulative columns are what gets charted; the per-date counts are
/// kept alongside so each row can be checked against the ledger.
pub fn time_series(events: &[Event]) -> TimeSeries {
    let mut by_date: BTreeMap<NaiveDate, (u64, u64)> = BTreeMap::new();

    for event in events {
        let entry = by_date.entry(event.date).or_insert((0, 0));
        if event.is_positive {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    let mut cumulative_positive = 0;
    let mut cumulative_negative = 0;
    let points = by_date
        .into_iter()
        .map(|(date, (positive_count, negative_count))| {
            cumulative_positive += positive_count;
            cumulative_negative += negative_count;
            SeriesPoint {
                date,
                positive_count,
                negative_count,
                cumulative_positive,
                cumulative_negative,
            }
        })
        .collect();

    TimeSeries { points }
}

/// Builds one row per member, in `member_ids` order, from the shared
/// event set. Members without events get an all-zero row.
pub fn feature_rows(member_ids: &[i64], events: &[Event]) -> Vec<FeatureRow> {
    member_ids
        .iter()
        .map(|&employee_id| employee_row(employee_id, events))
        .collect()
}

fn employee_row(employee_id: i64, events: &[Event]) -> FeatureRow {
    let (positive, negative) = events
        .iter()
        .filter(|event| event.entity_id == employee_id)
        .fold((0u64, 0u64), |(pos, neg), event| {
            if event.is_positive {
                (pos + 1, neg)
            } else {
                (pos, neg + 1)
            }
        });

    let values = vec![positive as f64, negative as f64];
    debug_assert_eq!(values.len(), FEATURE_SCHEMA.names.len());
    FeatureRow {
        employee_id,
        values,
    }
}
