use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContactId {
    Numeric(i64),
    Text(String),
}

impl Default for ContactId {
    fn default() -> Self {
        ContactId::Numeric(0)
    }
}

/// One CRM record as returned by the list-contacts endpoint.
///
/// Fields the pipeline does not look at are kept in `extra` so scrubbed
/// copies re-emit them unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: ContactId,
    #[serde(default, deserialize_with = "lenient_email", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_attributes")]
    pub attributes: Map<String, Value>,
    #[serde(default, deserialize_with = "lenient_list_ids")]
    pub list_ids: BTreeSet<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Contact {
    /// Attribute value rendered as text; missing, null and non-scalar
    /// values read as the empty string.
    pub fn attribute(&self, key: &str) -> String {
        match self.attributes.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        }
    }

    pub fn in_list(&self, list_id: i64) -> bool {
        self.list_ids.contains(&list_id)
    }
}

// A wrongly typed field degrades to its empty value instead of failing
// the whole record.

fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ContactId, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => match n.as_i64() {
            Some(id) => ContactId::Numeric(id),
            None => ContactId::Text(n.to_string()),
        },
        Value::String(s) => ContactId::Text(s),
        _ => ContactId::default(),
    })
}

fn lenient_email<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_attributes<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Map<String, Value>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        _ => Map::new(),
    })
}

/// Integer ids, or strings holding one; anything else is dropped.
fn lenient_list_ids<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeSet<i64>, D::Error> {
    let ids = match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .collect(),
        _ => BTreeSet::new(),
    };
    Ok(ids)
}

/// The five funnel counters. Serialized keys match the published
/// dashboard artifact; a missing key reads as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunnelCounters {
    #[serde(rename = "leadsACRM")]
    pub leads: u64,
    #[serde(rename = "iscrittiPiattaforma")]
    pub platform_members: u64,
    #[serde(rename = "profiloCompleto")]
    pub profiled: u64,
    #[serde(rename = "corsisti")]
    pub enrolled: u64,
    #[serde(rename = "paganti")]
    pub paying: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunnelMetric {
    Leads,
    PlatformMembers,
    Profiled,
    Enrolled,
    Paying,
}

impl FunnelMetric {
    pub const ALL: [FunnelMetric; 5] = [
        FunnelMetric::Leads,
        FunnelMetric::PlatformMembers,
        FunnelMetric::Profiled,
        FunnelMetric::Enrolled,
        FunnelMetric::Paying,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FunnelMetric::Leads => "Leads to CRM",
            FunnelMetric::PlatformMembers => "Platform members",
            FunnelMetric::Profiled => "Complete profile",
            FunnelMetric::Enrolled => "Enrolled students",
            FunnelMetric::Paying => "Paying customers",
        }
    }
}

impl FunnelCounters {
    pub fn get(&self, metric: FunnelMetric) -> u64 {
        match metric {
            FunnelMetric::Leads => self.leads,
            FunnelMetric::PlatformMembers => self.platform_members,
            FunnelMetric::Profiled => self.profiled,
            FunnelMetric::Enrolled => self.enrolled,
            FunnelMetric::Paying => self.paying,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub name: String,
    pub value: u64,
}

impl DistributionEntry {
    pub fn new(name: impl Into<String>, value: u64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Ordered `(label, count)` sequence with unique labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Distribution(pub Vec<DistributionEntry>);

impl Distribution {
    /// Sorted by descending count, ties broken by label.
    pub fn from_counts(counts: HashMap<String, u64>) -> Self {
        let mut entries: Vec<DistributionEntry> = counts
            .into_iter()
            .map(|(name, value)| DistributionEntry { name, value })
            .collect();
        entries.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
        Distribution(entries)
    }

    pub fn entries(&self) -> &[DistributionEntry] {
        &self.0
    }

    pub fn total(&self) -> u64 {
        self.0.iter().map(|entry| entry.value).sum()
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.0
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub const WEEK_KEY_FORMAT: &str = "%d/%m/%Y";

/// ISO date, `DD/MM/YYYY`, or an RFC 3339 timestamp taken as its UTC date.
pub fn parse_loose_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, WEEK_KEY_FORMAT))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|ts| ts.with_timezone(&Utc).date_naive())
        })
}

fn loose_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_loose_date(&raw).ok_or_else(|| D::Error::custom(format!("unparseable date {raw:?}")))
}

fn loose_optional_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(raw) => parse_loose_date(&raw),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySnapshot {
    #[serde(deserialize_with = "loose_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub funnel: FunnelCounters,
    #[serde(default)]
    pub total_contacts: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySnapshot {
    /// Monday of the recorded week, `DD/MM/YYYY`.
    pub week: String,
    #[serde(
        default,
        deserialize_with = "loose_optional_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub funnel: FunnelCounters,
    #[serde(default)]
    pub total_contacts: u64,
}

/// Entries are read one at a time; an unreadable entry is dropped with a
/// warning and the rest of its track is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    #[serde(default, deserialize_with = "lenient_entries")]
    pub weekly: Vec<WeeklySnapshot>,
    #[serde(default, deserialize_with = "lenient_entries")]
    pub daily: Vec<DailySnapshot>,
}

fn lenient_entries<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => {
            tracing::warn!(found = %other, "History track is not a list, starting it empty");
            Vec::new()
        }
    };
    let entries = raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(index, error = %err, "Dropping unreadable history entry");
                None
            }
        })
        .collect();
    Ok(entries)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaItem {
    pub metric: String,
    pub current: u64,
    pub previous: u64,
    pub rate_current: f64,
    pub rate_previous: f64,
    pub delta_abs: i64,
    pub delta_pp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: String,
    pub value: u64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub metric: String,
    pub points: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaReport {
    pub week_current: String,
    pub week_previous: String,
    pub items: Vec<DeltaItem>,
    pub trend: Vec<TrendSeries>,
}
