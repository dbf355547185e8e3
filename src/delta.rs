use thiserror::Error;

use crate::models::{DeltaItem, DeltaReport, FunnelMetric, TrendPoint, TrendSeries, WeeklySnapshot};

/// Weeks needed before a period-over-period comparison exists.
pub const MIN_WEEKS: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeltaError {
    #[error("not enough weekly history yet: need {} weeks, have {available}", MIN_WEEKS)]
    InsufficientHistory { available: usize },
}

pub fn rate(value: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        value as f64 / total as f64
    }
}

fn delta_item(metric: FunnelMetric, current: &WeeklySnapshot, previous: &WeeklySnapshot) -> DeltaItem {
    let current_value = current.funnel.get(metric);
    let previous_value = previous.funnel.get(metric);
    let rate_current = rate(current_value, current.total_contacts);
    let rate_previous = rate(previous_value, previous.total_contacts);

    DeltaItem {
        metric: metric.label().to_string(),
        current: current_value,
        previous: previous_value,
        rate_current,
        rate_previous,
        delta_abs: current_value as i64 - previous_value as i64,
        delta_pp: (rate_current - rate_previous) * 100.0,
    }
}

/// One series per funnel metric over every retained week, in append order.
pub fn weekly_trend(weekly: &[WeeklySnapshot]) -> Vec<TrendSeries> {
    if weekly.is_empty() {
        return Vec::new();
    }
    FunnelMetric::ALL
        .iter()
        .map(|metric| TrendSeries {
            metric: metric.label().to_string(),
            points: weekly
                .iter()
                .map(|week| {
                    let value = week.funnel.get(*metric);
                    TrendPoint {
                        date: week.week.clone(),
                        value,
                        rate: rate(value, week.total_contacts),
                    }
                })
                .collect(),
        })
        .collect()
}

/// Compare the two most recent weekly entries.
pub fn calculate_deltas(weekly: &[WeeklySnapshot]) -> Result<DeltaReport, DeltaError> {
    let [.., previous, current] = weekly else {
        return Err(DeltaError::InsufficientHistory {
            available: weekly.len(),
        });
    };

    Ok(DeltaReport {
        week_current: current.week.clone(),
        week_previous: previous.week.clone(),
        items: FunnelMetric::ALL
            .iter()
            .map(|metric| delta_item(*metric, current, previous))
            .collect(),
        trend: weekly_trend(weekly),
    })
}
