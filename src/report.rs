use std::fmt::Write;

use crate::delta::{self, DeltaError};
use crate::models::{DeltaItem, History};

fn signed(value: i64) -> String {
    if value > 0 {
        format!("+{value}")
    } else {
        value.to_string()
    }
}

fn format_item(item: &DeltaItem) -> String {
    format!(
        "- {}: {} (was {}, {}), rate {:.1}% (was {:.1}%, {:+.2} pp)",
        item.metric,
        item.current,
        item.previous,
        signed(item.delta_abs),
        item.rate_current * 100.0,
        item.rate_previous * 100.0,
        item.delta_pp
    )
}

/// Markdown summary of the weekly deltas and trend series.
pub fn build_delta_report(history: &History) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Weekly Funnel Report");
    let _ = writeln!(
        output,
        "{} weekly and {} daily snapshots retained",
        history.weekly.len(),
        history.daily.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Week over Week");

    match delta::calculate_deltas(&history.weekly) {
        Err(DeltaError::InsufficientHistory { available }) => {
            let _ = writeln!(
                output,
                "Not enough weekly history yet ({available} of {} weeks recorded).",
                delta::MIN_WEEKS
            );
        }
        Ok(report) => {
            let _ = writeln!(
                output,
                "Comparing {} with {}",
                report.week_current, report.week_previous
            );
            for item in &report.items {
                let _ = writeln!(output, "{}", format_item(item));
            }

            let _ = writeln!(output);
            let _ = writeln!(output, "## Trend");
            for series in &report.trend {
                let points: Vec<String> = series
                    .points
                    .iter()
                    .map(|point| format!("{} {}", point.date, point.value))
                    .collect();
                let _ = writeln!(output, "- {}: {}", series.metric, points.join(" → "));
            }
        }
    }

    if let Some(latest) = history.daily.last() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Latest Daily Run");
        let _ = writeln!(
            output,
            "{}: {} contacts, {} enrolled, {} paying",
            latest.date, latest.total_contacts, latest.funnel.enrolled, latest.funnel.paying
        );
    }

    output
}
