use std::{fmt, str::FromStr};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, types::StoredObject},
    stored_object,
};

/// Kind of change that produced a version.
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    #[default]
    Update,
    Correction,
    MajorRevision,
}

impl FromStr for ChangeType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "update" => Ok(ChangeType::Update),
            "correction" => Ok(ChangeType::Correction),
            "major_revision" | "major-revision" => Ok(ChangeType::MajorRevision),
            other => Err(AppError::Validation(format!(
                "unknown change type '{other}', expected 'update', 'correction' or 'major_revision'"
            ))),
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Update => write!(f, "update"),
            ChangeType::Correction => write!(f, "correction"),
            ChangeType::MajorRevision => write!(f, "major_revision"),
        }
    }
}

stored_object!(DocumentVersion, "document_version", {
    document_id: String,
    tenant_id: String,
    version_number: i64,
    title: String,
    content: String,
    fingerprint: String,
    change_summary: String,
    change_type: ChangeType,
    size_bytes: i64,
    created_by: String
});

impl DocumentVersion {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        document_id: String,
        tenant_id: String,
        version_number: i64,
        title: String,
        content: String,
        fingerprint: String,
        change_summary: String,
        change_type: ChangeType,
        created_by: String,
    ) -> Self {
        let now = Utc::now();
        let size_bytes = content.len() as i64;
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            document_id,
            tenant_id,
            version_number,
            title,
            content,
            fingerprint,
            change_summary,
            change_type,
            size_bytes,
            created_by,
        }
    }

    /// All versions of a document, newest first.
    pub async fn list_for_document(
        document_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let versions: Vec<Self> = db
            .client
            .query(
                "SELECT * FROM type::table($table) \
                 WHERE document_id = $document_id ORDER BY version_number DESC",
            )
            .bind(("table", Self::table_name()))
            .bind(("document_id", document_id.to_string()))
            .await?
            .take(0)?;

        Ok(versions)
    }

    pub async fn get_version(
        document_id: &str,
        version_number: i64,
        db: &SurrealDbClient,
    ) -> Result<Option<Self>, AppError> {
        let versions: Vec<Self> = db
            .client
            .query(
                "SELECT * FROM type::table($table) \
                 WHERE document_id = $document_id AND version_number = $version_number LIMIT 1",
            )
            .bind(("table", Self::table_name()))
            .bind(("document_id", document_id.to_string()))
            .bind(("version_number", version_number))
            .await?
            .take(0)?;

        Ok(versions.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(document_id: &str, number: i64) -> DocumentVersion {
        DocumentVersion::new(
            document_id.to_string(),
            "tenant_a".to_string(),
            number,
            format!("Title v{number}"),
            format!("Content of version {number}"),
            format!("fp-{number}"),
            "Edited".to_string(),
            ChangeType::Update,
            "user_1".to_string(),
        )
    }

    #[test]
    fn test_change_type_from_str() {
        assert_eq!(
            ChangeType::from_str("update").expect("parse failed"),
            ChangeType::Update
        );
        assert_eq!(
            ChangeType::from_str("major_revision").expect("parse failed"),
            ChangeType::MajorRevision
        );
        assert!(ChangeType::from_str("rewrite").is_err());
    }

    #[test]
    fn test_size_bytes_tracks_content() {
        let v = version("doc_1", 1);
        assert_eq!(v.size_bytes, v.content.len() as i64);
    }

    #[tokio::test]
    async fn test_list_for_document_orders_newest_first() {
        let namespace = "test_ns";
        let database = &Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory(namespace, database)
            .await
            .expect("Failed to start in-memory surrealdb");

        for number in 1..=3 {
            db.store_item(version("doc_1", number))
                .await
                .expect("Failed to store version");
        }
        db.store_item(version("doc_2", 1))
            .await
            .expect("Failed to store version");

        let versions = DocumentVersion::list_for_document("doc_1", &db)
            .await
            .expect("Failed to list versions");

        let numbers: Vec<i64> = versions.iter().map(|v| v.version_number).collect();
        assert_eq!(numbers, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_get_version_returns_exact_match() {
        let namespace = "test_ns";
        let database = &Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory(namespace, database)
            .await
            .expect("Failed to start in-memory surrealdb");

        db.store_item(version("doc_1", 2))
            .await
            .expect("Failed to store version");

        let found = DocumentVersion::get_version("doc_1", 2, &db)
            .await
            .expect("Failed to fetch version");
        assert_eq!(found.map(|v| v.version_number), Some(2));

        let missing = DocumentVersion::get_version("doc_1", 9, &db)
            .await
            .expect("Failed to fetch version");
        assert!(missing.is_none());
    }
}
