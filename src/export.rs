use std::io::Write;

use clap::ValueEnum;

use crate::aggregate::{aggregate_scope, Aggregation, Scope, OTHER_BUCKET};
use crate::config::ListIds;
use crate::models::Distribution;
use crate::normalize::relabel_cohort_years;
use crate::scrub::ScrubbedContact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Dimension {
    University,
    Source,
    CohortYear,
    BirthYear,
    Course,
    PaidCourse,
    ListMacro,
    ListId,
}

impl Dimension {
    fn select(self, metrics: &Aggregation) -> Distribution {
        match self {
            Dimension::University => metrics.universities.clone(),
            Dimension::Source => metrics.sources.clone(),
            Dimension::CohortYear => relabel_cohort_years(&metrics.cohort_years),
            Dimension::BirthYear => metrics.birth_years.clone(),
            Dimension::Course => metrics.courses.clone(),
            Dimension::PaidCourse => metrics.paid_courses.clone(),
            Dimension::ListMacro => metrics.list_macros.clone(),
            Dimension::ListId => metrics.list_ids.clone(),
        }
    }
}

/// Chart-ready distribution over the scoped part of a snapshot's contacts.
pub fn chart_distribution(
    contacts: &[ScrubbedContact],
    lists: &ListIds,
    scope: Scope,
    dimension: Dimension,
    min_count: u64,
) -> Distribution {
    let metrics = aggregate_scope(contacts.iter().map(ScrubbedContact::as_contact), lists, scope);
    let selected = dimension.select(&metrics);
    match dimension {
        // Already folded into fixed chart buckets.
        Dimension::CohortYear => selected,
        _ => selected.bucket_long_tail(min_count, OTHER_BUCKET),
    }
}

pub fn write_csv<W: Write>(writer: W, distribution: &Distribution) -> anyhow::Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["label", "value"])?;
    for entry in distribution.entries() {
        csv.write_record([entry.name.as_str(), entry.value.to_string().as_str()])?;
    }
    csv.flush()?;
    Ok(())
}
