use chrono::{DateTime, Utc};
use common::storage::types::{
    document::Document,
    document_version::{ChangeType, DocumentVersion},
};
use serde::Serialize;

/// Result of an ingestion attempt. Duplicate detection is an expected
/// outcome, not a failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    Created { document: Document },
    Duplicate { existing_id: String, fingerprint: String },
}

/// Result of an update attempt. An update whose merged fingerprint
/// matches the live row writes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateOutcome {
    Unchanged { current_version: i64 },
    Updated { new_version: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RollbackOutcome {
    pub new_version: i64,
    pub restored_from: i64,
}

/// One entry of a document's version lineage as shown to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionInfo {
    pub version_number: i64,
    pub title: String,
    pub change_summary: String,
    pub change_type: ChangeType,
    pub size_bytes: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub is_current: bool,
}

impl VersionInfo {
    pub fn from_version(version: DocumentVersion, current_version: i64) -> Self {
        Self {
            is_current: version.version_number == current_version,
            version_number: version.version_number,
            title: version.title,
            change_summary: version.change_summary,
            change_type: version.change_type,
            size_bytes: version.size_bytes,
            created_by: version.created_by,
            created_at: version.created_at,
        }
    }
}
