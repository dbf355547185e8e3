use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::aggregate::Aggregation;
use crate::scrub::ScrubbedContact;
use crate::storage::{self, StorageError};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("snapshot schema version {found} is newer than supported version {}", SCHEMA_VERSION)]
    UnsupportedVersion { found: u32 },
    #[error("snapshot declares {declared} contacts but carries {actual}")]
    CountMismatch { declared: u64, actual: usize },
}

fn legacy_version() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default = "legacy_version")]
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    pub generated_at: DateTime<Utc>,
    pub total_contacts: u64,
    pub contacts: Vec<ScrubbedContact>,
    #[serde(flatten)]
    pub metrics: Aggregation,
}

impl Snapshot {
    pub fn new(contacts: Vec<ScrubbedContact>, metrics: Aggregation, now: DateTime<Utc>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            run_id: Some(Uuid::new_v4()),
            generated_at: now,
            total_contacts: contacts.len() as u64,
            contacts,
            metrics,
        }
    }

    /// Check a deserialized document against the invariants the rest of
    /// the crate relies on.
    fn validate(self) -> Result<Self, SnapshotError> {
        if self.schema_version > SCHEMA_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: self.schema_version,
            });
        }
        if self.total_contacts != self.contacts.len() as u64 {
            return Err(SnapshotError::CountMismatch {
                declared: self.total_contacts,
                actual: self.contacts.len(),
            });
        }
        Ok(self)
    }
}

pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), StorageError> {
    storage::write_json_atomic(path, snapshot)?;
    tracing::info!(
        path = %path.display(),
        total_contacts = snapshot.total_contacts,
        generated_at = %snapshot.generated_at,
        "Snapshot written"
    );
    Ok(())
}

pub fn read_snapshot(path: &Path) -> Result<Snapshot, SnapshotError> {
    let snapshot: Snapshot = storage::read_json(path)?;
    snapshot.validate()
}

/// Holds the last snapshot read from disk until explicitly invalidated.
pub struct SnapshotCache {
    path: PathBuf,
    cached: Option<Snapshot>,
}

impl SnapshotCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: None,
        }
    }

    pub fn get(&mut self) -> Result<&Snapshot, SnapshotError> {
        let snapshot = match self.cached.take() {
            Some(snapshot) => snapshot,
            None => self.load()?,
        };
        Ok(self.cached.insert(snapshot))
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn refresh(&mut self) -> Result<&Snapshot, SnapshotError> {
        self.invalidate();
        self.get()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Snapshot, SnapshotError> {
        let snapshot = read_snapshot(&self.path)?;
        tracing::debug!(path = %self.path.display(), "Snapshot loaded into cache");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::config::ListIds;
    use crate::models::Contact;
    use crate::scrub::scrub;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn sample_snapshot() -> Snapshot {
        let contacts: Vec<Contact> = serde_json::from_str(
            r#"[
                {"id": 1, "email": "a@example.com", "attributes": {"NOME": "Ada", "CORSO_ACQUISTATO": "Focus 2025"}, "listIds": [6]},
                {"id": 2, "attributes": {"FONTE": "fb"}, "listIds": []}
            ]"#,
        )
        .unwrap();
        let scrubbed: Vec<ScrubbedContact> = contacts.iter().map(scrub).collect();
        let metrics = aggregate(scrubbed.iter().map(ScrubbedContact::as_contact), &ListIds::default());
        let now = Utc.with_ymd_and_hms(2025, 10, 1, 6, 0, 0).unwrap();
        Snapshot::new(scrubbed, metrics, now)
    }

    #[test]
    fn distributions_are_flattened_at_top_level() {
        let value = serde_json::to_value(sample_snapshot()).unwrap();
        assert_eq!(value["schemaVersion"], 1);
        assert_eq!(value["totalContacts"], 2);
        assert_eq!(value["generatedAt"], "2025-10-01T06:00:00Z");
        assert_eq!(value["funnel"]["corsisti"], 1);
        assert!(value["distribuzione_fonte"].is_array());
        assert_eq!(value["distribuzione_fonte"][0]["name"], "META");
        assert!(value.get("datasets").is_none());
        assert!(value["contacts"][0].get("email").is_none());
    }

    #[test]
    fn write_then_read_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("datasets.json");
        let snapshot = sample_snapshot();

        write_snapshot(&path, &snapshot).unwrap();
        let loaded = read_snapshot(&path).unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn legacy_documents_without_version_are_accepted() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("datasets.json");
        std::fs::write(
            &path,
            r#"{"generatedAt": "2025-09-24T05:00:00.000Z", "totalContacts": 0, "contacts": [],
                "funnel": {"leadsACRM": 0, "iscrittiPiattaforma": 0, "profiloCompleto": 0, "corsisti": 0, "paganti": 0}}"#,
        )
        .unwrap();
        let loaded = read_snapshot(&path).unwrap();
        assert_eq!(loaded.schema_version, 1);
        assert!(loaded.run_id.is_none());
        assert!(loaded.metrics.universities.is_empty());
    }

    #[test]
    fn newer_schema_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("datasets.json");
        let mut snapshot = sample_snapshot();
        snapshot.schema_version = SCHEMA_VERSION + 1;
        storage::write_json_atomic(&path, &snapshot).unwrap();

        let err = read_snapshot(&path).unwrap_err();
        assert!(matches!(err, SnapshotError::UnsupportedVersion { found: 2 }));
    }

    #[test]
    fn cache_serves_until_invalidated() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("datasets.json");
        write_snapshot(&path, &sample_snapshot()).unwrap();

        let mut cache = SnapshotCache::new(&path);
        assert_eq!(cache.get().unwrap().total_contacts, 2);

        std::fs::remove_file(&path).unwrap();
        assert_eq!(cache.get().unwrap().total_contacts, 2);

        cache.invalidate();
        assert!(cache.get().is_err());
    }

    #[test]
    fn refresh_rereads_the_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("datasets.json");
        write_snapshot(&path, &sample_snapshot()).unwrap();

        let mut cache = SnapshotCache::new(&path);
        let first_run = cache.get().unwrap().run_id;

        write_snapshot(&path, &sample_snapshot()).unwrap();
        assert_eq!(cache.get().unwrap().run_id, first_run);
        assert_ne!(cache.refresh().unwrap().run_id, first_run);

        std::fs::write(&path, "{").unwrap();
        assert!(cache.refresh().is_err());
        assert!(cache.get().is_err());
    }
}
