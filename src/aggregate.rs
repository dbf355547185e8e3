use std::collections::HashMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::canon::canon;
use crate::classify::{
    ContactFacts, BIRTH_DATE_ATTR, COHORT_ATTR, COURSE_ATTR, SOURCE_ATTR, UNIVERSITY_ATTR,
};
use crate::config::ListIds;
use crate::models::{Contact, Distribution, DistributionEntry, FunnelCounters};
use crate::normalize::{
    extract_birth_year, normalize_cohort_year, normalize_source, normalize_university,
    BIRTH_YEAR_MISSING,
};
use crate::taxonomy::course_macro;

pub const OTHER_BUCKET: &str = "Other";

const TARGET_COHORTS: [&str; 2] = ["5", "6"];
const TARGET_BIRTH_YEARS: [u16; 2] = [2000, 2001];

/// Population restriction applied before building distributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scope {
    All,
    Platform,
    Enrolled,
    Paying,
}

impl Scope {
    pub fn admits(self, facts: &ContactFacts) -> bool {
        match self {
            Scope::All => true,
            Scope::Platform => facts.platform_member,
            Scope::Enrolled => facts.enrolled,
            Scope::Paying => facts.paying,
        }
    }
}

/// Everything computed from one contact population. Field names on the
/// wire match the dashboard artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub funnel: FunnelCounters,
    #[serde(rename = "distribuzione_atenei", default)]
    pub universities: Distribution,
    #[serde(rename = "distribuzione_fonte", default)]
    pub sources: Distribution,
    #[serde(rename = "distribuzione_anno_profilazione", default)]
    pub cohort_years: Distribution,
    #[serde(rename = "distribuzione_anno_nascita", default)]
    pub birth_years: Distribution,
    #[serde(rename = "distribuzione_corsi", default)]
    pub courses: Distribution,
    #[serde(rename = "distribuzione_corsi_pagati", default)]
    pub paid_courses: Distribution,
    #[serde(rename = "distribuzione_liste_corsisti", default)]
    pub list_macros: Distribution,
    #[serde(rename = "distribuzione_liste_id", default)]
    pub list_ids: Distribution,
    #[serde(rename = "webinar_conversions", default)]
    pub webinar_conversions: Distribution,
    #[serde(rename = "iscritti_webinar", default)]
    pub platform_webinar: Distribution,
    #[serde(rename = "utenti_crm_webinar", default)]
    pub crm_webinar: Distribution,
    #[serde(rename = "iscritti_con_simulazione", default)]
    pub platform_simulation: Distribution,
    #[serde(rename = "utenti_crm_non_corsisti", default)]
    pub non_enrolled_crm: u64,
    #[serde(rename = "utenti_crm_non_corsisti_in_target", default)]
    pub in_target: u64,
    #[serde(rename = "pct_non_corsisti_in_target", default)]
    pub in_target_share: f64,
}

#[derive(Default)]
struct Counter(HashMap<String, u64>);

impl Counter {
    fn add(&mut self, label: impl Into<String>) {
        *self.0.entry(label.into()).or_insert(0) += 1;
    }

    fn finish(self) -> Distribution {
        Distribution::from_counts(self.0)
    }
}

fn pair(with: (&str, u64), without: (&str, u64)) -> Distribution {
    Distribution(vec![
        DistributionEntry::new(with.0, with.1),
        DistributionEntry::new(without.0, without.1),
    ])
}

fn list_macro_label(list_id: i64, lists: &ListIds) -> &'static str {
    if list_id == lists.platform {
        "MEMBERS"
    } else if list_id == lists.webinar {
        "WEBINAR"
    } else {
        OTHER_BUCKET
    }
}

/// Non-enrolled webinar participant in an advanced cohort or one of the
/// target birth years.
pub fn is_in_target(contact: &Contact, facts: &ContactFacts) -> bool {
    if facts.enrolled || !facts.webinar {
        return false;
    }
    let cohort = normalize_cohort_year(&contact.attribute(COHORT_ATTR));
    let cohort_ok = TARGET_COHORTS.contains(&cohort.as_str());
    let year_ok = extract_birth_year(&contact.attribute(BIRTH_DATE_ATTR))
        .is_some_and(|year| TARGET_BIRTH_YEARS.contains(&year));
    cohort_ok || year_ok
}

/// Fold a contact population into funnel counters, distributions and
/// segment counts in a single pass.
pub fn aggregate<'a, I>(contacts: I, lists: &ListIds) -> Aggregation
where
    I: IntoIterator<Item = &'a Contact>,
{
    let mut funnel = FunnelCounters::default();
    let mut universities = Counter::default();
    let mut sources = Counter::default();
    let mut cohort_years = Counter::default();
    let mut birth_years = Counter::default();
    let mut courses = Counter::default();
    let mut paid_courses = Counter::default();
    let mut list_macros = Counter::default();
    let mut list_ids = Counter::default();

    let mut webinar_total = 0u64;
    let mut webinar_enrolled = 0u64;
    let mut webinar_paying = 0u64;
    let mut platform_with_webinar = 0u64;
    let mut crm_total = 0u64;
    let mut crm_with_webinar = 0u64;
    let mut platform_with_simulation = 0u64;
    let mut non_enrolled_crm = 0u64;
    let mut in_target = 0u64;

    for contact in contacts {
        let facts = ContactFacts::of(contact, lists);

        funnel.leads += 1;
        funnel.platform_members += u64::from(facts.platform_member);
        funnel.profiled += u64::from(facts.profiled);
        funnel.enrolled += u64::from(facts.enrolled);
        funnel.paying += u64::from(facts.paying);

        universities.add(normalize_university(&contact.attribute(UNIVERSITY_ATTR)));
        sources.add(normalize_source(&contact.attribute(SOURCE_ATTR)));
        cohort_years.add(normalize_cohort_year(&contact.attribute(COHORT_ATTR)));
        birth_years.add(
            extract_birth_year(&contact.attribute(BIRTH_DATE_ATTR))
                .map(|year| year.to_string())
                .unwrap_or_else(|| BIRTH_YEAR_MISSING.to_string()),
        );

        if facts.enrolled {
            let label = course_macro(&canon(&contact.attribute(COURSE_ATTR)));
            courses.add(label);
            if facts.paying {
                paid_courses.add(label);
            }
        }

        for list_id in &contact.list_ids {
            list_macros.add(list_macro_label(*list_id, lists));
            list_ids.add(list_id.to_string());
        }

        if facts.webinar {
            webinar_total += 1;
            webinar_enrolled += u64::from(facts.enrolled);
            webinar_paying += u64::from(facts.paying);
            platform_with_webinar += u64::from(facts.platform_member);
        }
        if facts.platform_member && facts.simulated {
            platform_with_simulation += 1;
        }
        if facts.crm_user {
            crm_total += 1;
            crm_with_webinar += u64::from(facts.webinar);
            if !facts.enrolled {
                non_enrolled_crm += 1;
                in_target += u64::from(is_in_target(contact, &facts));
            }
        }
    }

    let in_target_share = if non_enrolled_crm > 0 {
        in_target as f64 / non_enrolled_crm as f64
    } else {
        0.0
    };

    Aggregation {
        funnel,
        universities: universities.finish(),
        sources: sources.finish(),
        cohort_years: cohort_years.finish(),
        birth_years: birth_years.finish(),
        courses: courses.finish(),
        paid_courses: paid_courses.finish(),
        list_macros: list_macros.finish(),
        list_ids: list_ids.finish(),
        webinar_conversions: Distribution(vec![
            DistributionEntry::new("Webinar participants", webinar_total),
            DistributionEntry::new("Enrolled from webinar", webinar_enrolled),
            DistributionEntry::new("Paying from webinar", webinar_paying),
        ]),
        platform_webinar: pair(
            ("Members with webinar", platform_with_webinar),
            (
                "Members without webinar",
                funnel.platform_members - platform_with_webinar,
            ),
        ),
        crm_webinar: pair(
            ("CRM users with webinar", crm_with_webinar),
            ("CRM users without webinar", crm_total - crm_with_webinar),
        ),
        platform_simulation: pair(
            ("With simulation", platform_with_simulation),
            (
                "Without simulation",
                funnel.platform_members - platform_with_simulation,
            ),
        ),
        non_enrolled_crm,
        in_target,
        in_target_share,
    }
}

/// Aggregate only the contacts admitted by `scope`.
pub fn aggregate_scope<'a, I>(contacts: I, lists: &ListIds, scope: Scope) -> Aggregation
where
    I: IntoIterator<Item = &'a Contact>,
{
    aggregate(
        contacts
            .into_iter()
            .filter(|contact| scope.admits(&ContactFacts::of(contact, lists))),
        lists,
    )
}

impl Distribution {
    /// Keep entries with at least `min_count`, sorted descending, and sum
    /// the rest into a trailing `other_label` bucket when it is non-zero.
    pub fn bucket_long_tail(&self, min_count: u64, other_label: &str) -> Distribution {
        let mut kept: Vec<DistributionEntry> = Vec::new();
        let mut other = 0u64;
        for entry in self.entries() {
            if entry.name == other_label || entry.value < min_count {
                other += entry.value;
            } else {
                kept.push(entry.clone());
            }
        }
        kept.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
        if other > 0 {
            kept.push(DistributionEntry::new(other_label, other));
        }
        Distribution(kept)
    }
}
