use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::canon::{canon, capitalize};
use crate::models::{Distribution, DistributionEntry};

pub const SOURCE_UNKNOWN: &str = "Unknown/undeclared";
pub const COHORT_MISSING: &str = "ND";
pub const COHORT_GRADUATE: &str = "Graduate";
pub const COHORT_OFF_TRACK: &str = "Off-track";
pub const COHORT_POST_GRADUATE: &str = "Post-graduate";
pub const COHORT_OTHER: &str = "Other";
pub const UNIVERSITY_MISSING: &str = "Unspecified";
pub const BIRTH_YEAR_MISSING: &str = "No year";

const SOURCE_ALIASES: &[(&str, &str)] = &[
    ("adv meta", "META"),
    ("facebook ads", "META"),
    ("instagram ads", "META"),
    ("fb", "META"),
    ("ig", "Instagram"),
    ("instagram", "Instagram"),
    ("google ads", "Google"),
    ("google", "Google"),
    ("seo", "SEO"),
    ("organic", "SEO"),
    ("referral", "Referral"),
    ("passaparola", "Referral"),
    ("webinar", "Webinar"),
    ("email", "Email"),
    ("newsletter", "Email"),
    ("conversazioni", "Conversations"),
    ("sito", "Website"),
    ("ambassador", "Ambassador"),
    ("iscritto", "Members"),
];

const COHORT_ALIASES: &[(&str, &str)] = &[
    ("primo", "1"),
    ("secondo", "2"),
    ("terzo", "3"),
    ("quarto", "4"),
    ("quinto", "5"),
    ("sesto", "6"),
    ("laureato", COHORT_GRADUATE),
    ("laureata", COHORT_GRADUATE),
    ("post laurea", COHORT_POST_GRADUATE),
    ("fuori corso", COHORT_OFF_TRACK),
    ("fuoricorso", COHORT_OFF_TRACK),
];

static SOURCE_MAP: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| SOURCE_ALIASES.iter().copied().collect());

static COHORT_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\D)([1-6])(?:\D|$)").expect("valid cohort digit regex"));
static GRADUATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"laureat").expect("valid graduate regex"));
static OFF_TRACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"fuori\s*cors").expect("valid off-track regex"));
static POST_GRADUATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"post\s*laurea|specializz|master").expect("valid post-graduate regex")
});
static COHORT_ALIAS_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    COHORT_ALIASES
        .iter()
        .map(|(alias, label)| {
            let pattern = format!(r"\b{}\b", regex::escape(alias));
            (Regex::new(&pattern).expect("valid cohort alias regex"), *label)
        })
        .collect()
});
static BIRTH_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("valid birth year regex"));

/// Map a free-text acquisition source to its canonical channel name.
pub fn normalize_source(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return SOURCE_UNKNOWN.to_string();
    }
    match SOURCE_MAP.get(trimmed.to_lowercase().as_str()) {
        Some(channel) => channel.to_string(),
        None => capitalize(trimmed),
    }
}

/// Map a free-text cohort/year-of-study answer to `1`..`6` or a named
/// bucket.
pub fn normalize_cohort_year(raw: &str) -> String {
    let s = canon(raw);
    if s.is_empty() {
        return COHORT_MISSING.to_string();
    }
    if let Some(caps) = COHORT_DIGIT.captures(&s) {
        return caps[1].to_string();
    }
    if GRADUATE.is_match(&s) {
        return COHORT_GRADUATE.to_string();
    }
    if OFF_TRACK.is_match(&s) {
        return COHORT_OFF_TRACK.to_string();
    }
    if POST_GRADUATE.is_match(&s) {
        return COHORT_POST_GRADUATE.to_string();
    }
    COHORT_ALIAS_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(&s))
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| COHORT_OTHER.to_string())
}

/// First `19xx`/`20xx` year found in a free-text date.
pub fn extract_birth_year(raw: &str) -> Option<u16> {
    BIRTH_YEAR
        .find(raw)
        .and_then(|m| m.as_str().parse().ok())
}

pub fn normalize_university(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        UNIVERSITY_MISSING.to_string()
    } else {
        trimmed.to_string()
    }
}

const COHORT_CHART_ORDER: &[&str] = &[
    "1st Year", "2nd Year", "3rd Year", "4th Year", "5th Year", "6th Year", "Graduate", "Other",
];

fn cohort_chart_label(label: &str) -> &'static str {
    match label {
        "1" => "1st Year",
        "2" => "2nd Year",
        "3" => "3rd Year",
        "4" => "4th Year",
        "5" => "5th Year",
        "6" => "6th Year",
        COHORT_GRADUATE => "Graduate",
        _ => "Other",
    }
}

/// Fold a cohort-year distribution into chart buckets in display order.
///
/// Empty buckets are dropped, except `Other` which is always present.
pub fn relabel_cohort_years(dist: &Distribution) -> Distribution {
    let mut acc: HashMap<&'static str, u64> = HashMap::new();
    for entry in dist.entries() {
        *acc.entry(cohort_chart_label(&entry.name)).or_insert(0) += entry.value;
    }
    Distribution(
        COHORT_CHART_ORDER
            .iter()
            .map(|label| DistributionEntry::new(*label, acc.get(label).copied().unwrap_or(0)))
            .filter(|entry| entry.value > 0 || entry.name == "Other")
            .collect(),
    )
}
