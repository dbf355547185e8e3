use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::crm::CrmError;
use crate::snapshot::SnapshotError;
use crate::storage::StorageError;

/// Fatal outcomes of one pipeline run.
///
/// Snapshot and history writes are separate commits: a `HistoryWrite`
/// failure leaves an already published snapshot valid.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("contact fetch failed, nothing was published: {0}")]
    Fetch(#[from] CrmError),
    #[error("snapshot could not be written to {path}: {source}")]
    SnapshotWrite {
        path: PathBuf,
        #[source]
        source: StorageError,
    },
    #[error("snapshot written to {path} does not read back: {source}")]
    SnapshotVerify {
        path: PathBuf,
        #[source]
        source: SnapshotError,
    },
    #[error("snapshot published, but history update failed for {path}: {source}")]
    HistoryWrite {
        path: PathBuf,
        #[source]
        source: StorageError,
    },
}
