use std::sync::Arc;

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{
            document::{Category, Document},
            document_version::{ChangeType, DocumentVersion},
            StoredObject,
        },
    },
    utils::{
        embedding::{Embedder, EmbeddingMode},
        fingerprint::content_fingerprint,
    },
};
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    Retry,
};
use tracing::{info, instrument};

use crate::outcome::{IngestOutcome, RollbackOutcome, UpdateOutcome, VersionInfo};

/// Input for a first-time ingestion.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub tenant_id: String,
    pub title: String,
    pub content: String,
    pub category: Category,
    pub created_by: String,
}

/// Partial update; absent fields keep their live values.
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<Category>,
    pub change_summary: Option<String>,
    pub change_type: ChangeType,
}

/// Tenant-scoped, versioned document storage.
///
/// All content-changing operations extend the version lineage before
/// mutating the live row, inside one database transaction. Version
/// numbers are allocated as `version_count + 1` and backstopped by the
/// unique (document_id, version_number) index, so two racing updates
/// can never both claim the same number.
pub struct DocumentStore {
    db: Arc<SurrealDbClient>,
    embedder: Arc<dyn Embedder>,
}

impl DocumentStore {
    pub fn new(db: Arc<SurrealDbClient>, embedder: Arc<dyn Embedder>) -> Self {
        Self { db, embedder }
    }

    /// Ingest a new knowledge document.
    ///
    /// The fingerprint lookup runs before the embedding call, so a
    /// duplicate never pays for a model round-trip.
    #[instrument(skip_all, fields(tenant_id = %new.tenant_id))]
    pub async fn ingest(&self, new: NewDocument) -> Result<IngestOutcome, AppError> {
        validate_required("tenant id", &new.tenant_id)?;
        validate_required("title", &new.title)?;
        validate_required("content", &new.content)?;

        let fingerprint = content_fingerprint(&new.title, &new.content);

        if let Some(existing) =
            Document::get_by_fingerprint(&new.tenant_id, &fingerprint, &self.db).await?
        {
            info!(existing_id = %existing.id, "Ingestion matched existing fingerprint");
            return Ok(IngestOutcome::Duplicate {
                existing_id: existing.id,
                fingerprint,
            });
        }

        let embedding = self
            .embed_with_retry(&embed_input(&new.title, &new.content))
            .await?;

        let document = Document::new(
            new.tenant_id.clone(),
            new.title.clone(),
            new.content.clone(),
            new.category,
            fingerprint.clone(),
            Some(embedding),
            new.created_by.clone(),
        );
        let version = DocumentVersion::new(
            document.id.clone(),
            new.tenant_id.clone(),
            1,
            new.title,
            new.content,
            fingerprint.clone(),
            "Initial version".to_string(),
            ChangeType::Update,
            new.created_by,
        );

        if let Err(err) = self.create_document_with_version(&document, &version).await {
            // A concurrent identical ingest may have won the unique
            // fingerprint index; report it as the duplicate it is.
            if let Some(existing) =
                Document::get_by_fingerprint(&new.tenant_id, &fingerprint, &self.db).await?
            {
                info!(existing_id = %existing.id, "Lost ingestion race to identical content");
                return Ok(IngestOutcome::Duplicate {
                    existing_id: existing.id,
                    fingerprint,
                });
            }
            return Err(err);
        }

        let stored = Document::get_scoped(&document.id, &document.tenant_id, &self.db)
            .await?
            .ok_or_else(|| {
                AppError::InternalError("document vanished after ingestion".to_string())
            })?;

        Ok(IngestOutcome::Created { document: stored })
    }

    /// Apply a partial update, producing a new version when the merged
    /// fingerprint differs from the live one.
    #[instrument(skip_all, fields(%document_id, %tenant_id))]
    pub async fn update(
        &self,
        document_id: &str,
        tenant_id: &str,
        update: DocumentUpdate,
        actor: &str,
    ) -> Result<UpdateOutcome, AppError> {
        if let Some(title) = &update.title {
            validate_required("title", title)?;
        }
        if let Some(content) = &update.content {
            validate_required("content", content)?;
        }

        let document = Document::get_scoped(document_id, tenant_id, &self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;

        let title = update.title.unwrap_or_else(|| document.title.clone());
        let content = update.content.unwrap_or_else(|| document.content.clone());
        let category = update.category.unwrap_or(document.category);

        let fingerprint = content_fingerprint(&title, &content);
        if fingerprint == document.fingerprint {
            return Ok(UpdateOutcome::Unchanged {
                current_version: document.current_version,
            });
        }

        // Title-only edits keep the existing embedding.
        let embedding = if content == document.content {
            document.embedding.clone()
        } else {
            Some(self.embed_with_retry(&embed_input(&title, &content)).await?)
        };

        let next = document.version_count + 1;
        let version = DocumentVersion::new(
            document.id.clone(),
            document.tenant_id.clone(),
            next,
            title,
            content,
            fingerprint,
            update
                .change_summary
                .unwrap_or_else(|| "Content updated".to_string()),
            update.change_type,
            actor.to_string(),
        );

        self.commit_new_version(&document.id, &version, category, embedding, actor)
            .await?;

        Ok(UpdateOutcome::Updated { new_version: next })
    }

    /// Restore an older version by copying it into a new version entry.
    /// History is only ever extended, never rewritten.
    #[instrument(skip_all, fields(%document_id, %tenant_id, target_version))]
    pub async fn rollback(
        &self,
        document_id: &str,
        tenant_id: &str,
        target_version: i64,
        actor: &str,
    ) -> Result<RollbackOutcome, AppError> {
        let document = Document::get_scoped(document_id, tenant_id, &self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;

        if target_version == document.current_version {
            return Err(AppError::Validation(
                "already at this version".to_string(),
            ));
        }

        let target = DocumentVersion::get_version(&document.id, target_version, &self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Version not found".to_string()))?;

        let embedding = self
            .embed_with_retry(&embed_input(&target.title, &target.content))
            .await?;

        let next = document.version_count + 1;
        let version = DocumentVersion::new(
            document.id.clone(),
            document.tenant_id.clone(),
            next,
            target.title,
            target.content,
            target.fingerprint,
            format!("Rollback to version {target_version}"),
            ChangeType::Correction,
            actor.to_string(),
        );

        self.commit_new_version(&document.id, &version, document.category, Some(embedding), actor)
            .await?;

        info!(new_version = next, restored_from = target_version, "Rolled back document");

        Ok(RollbackOutcome {
            new_version: next,
            restored_from: target_version,
        })
    }

    /// Version lineage, newest first, with the live version flagged.
    pub async fn list_versions(
        &self,
        document_id: &str,
        tenant_id: &str,
    ) -> Result<Vec<VersionInfo>, AppError> {
        let document = Document::get_scoped(document_id, tenant_id, &self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;

        let versions = DocumentVersion::list_for_document(&document.id, &self.db).await?;

        Ok(versions
            .into_iter()
            .map(|version| VersionInfo::from_version(version, document.current_version))
            .collect())
    }

    pub async fn get(&self, document_id: &str, tenant_id: &str) -> Result<Document, AppError> {
        Document::get_scoped(document_id, tenant_id, &self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Document not found".to_string()))
    }

    /// Remove a document together with its whole version lineage.
    pub async fn delete(&self, document_id: &str, tenant_id: &str) -> Result<(), AppError> {
        let document = Document::get_scoped(document_id, tenant_id, &self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;

        let query = format!(
            "BEGIN TRANSACTION;
             DELETE type::thing('{doc_table}', $document_id);
             DELETE {version_table} WHERE document_id = $document_id;
             COMMIT TRANSACTION;",
            doc_table = Document::table_name(),
            version_table = DocumentVersion::table_name(),
        );

        let result = self
            .db
            .client
            .query(query)
            .bind(("document_id", document.id))
            .await?;
        result.check()?;

        Ok(())
    }

    /// Provider hiccups are retried with backoff before the operation
    /// gives up.
    async fn embed_with_retry(&self, input: &str) -> Result<Vec<f32>, AppError> {
        let retry_strategy = ExponentialBackoff::from_millis(100).map(jitter).take(3);

        Retry::spawn(retry_strategy, || {
            self.embedder.embed(input, EmbeddingMode::Document)
        })
        .await
    }

    /// Document and version rows are created together or not at all.
    async fn create_document_with_version(
        &self,
        document: &Document,
        version: &DocumentVersion,
    ) -> Result<(), AppError> {
        let query = format!(
            "BEGIN TRANSACTION;
             CREATE type::thing('{doc_table}', $document_id) CONTENT {{
                 tenant_id: $tenant_id,
                 title: $title,
                 content: $content,
                 category: $category,
                 fingerprint: $fingerprint,
                 embedding: $embedding,
                 current_version: 1,
                 version_count: 1,
                 created_by: $actor,
                 updated_by: $actor,
                 created_at: time::now(),
                 updated_at: time::now()
             }};
             CREATE type::thing('{version_table}', $version_id) CONTENT {{
                 document_id: $document_id,
                 tenant_id: $tenant_id,
                 version_number: 1,
                 title: $title,
                 content: $content,
                 fingerprint: $fingerprint,
                 change_summary: $change_summary,
                 change_type: $change_type,
                 size_bytes: $size_bytes,
                 created_by: $actor,
                 created_at: time::now(),
                 updated_at: time::now()
             }};
             COMMIT TRANSACTION;",
            doc_table = Document::table_name(),
            version_table = DocumentVersion::table_name(),
        );

        let result = self
            .db
            .client
            .query(query)
            .bind(("document_id", document.id.clone()))
            .bind(("version_id", version.id.clone()))
            .bind(("tenant_id", document.tenant_id.clone()))
            .bind(("title", document.title.clone()))
            .bind(("content", document.content.clone()))
            .bind(("category", document.category))
            .bind(("fingerprint", document.fingerprint.clone()))
            .bind(("embedding", document.embedding.clone()))
            .bind(("change_summary", version.change_summary.clone()))
            .bind(("change_type", version.change_type))
            .bind(("size_bytes", version.size_bytes))
            .bind(("actor", document.created_by.clone()))
            .await?;
        result.check()?;

        Ok(())
    }

    /// Write the version snapshot and repoint the live row in one
    /// transaction. A racing writer aborts on the unique
    /// (document_id, version_number) index and neither row is applied.
    async fn commit_new_version(
        &self,
        document_id: &str,
        version: &DocumentVersion,
        category: Category,
        embedding: Option<Vec<f32>>,
        actor: &str,
    ) -> Result<(), AppError> {
        let query = format!(
            "BEGIN TRANSACTION;
             CREATE type::thing('{version_table}', $version_id) CONTENT {{
                 document_id: $document_id,
                 tenant_id: $tenant_id,
                 version_number: $version_number,
                 title: $title,
                 content: $content,
                 fingerprint: $fingerprint,
                 change_summary: $change_summary,
                 change_type: $change_type,
                 size_bytes: $size_bytes,
                 created_by: $actor,
                 created_at: time::now(),
                 updated_at: time::now()
             }};
             UPDATE type::thing('{doc_table}', $document_id) SET
                 title = $title,
                 content = $content,
                 category = $category,
                 fingerprint = $fingerprint,
                 embedding = $embedding,
                 current_version = $version_number,
                 version_count = $version_number,
                 updated_by = $actor,
                 updated_at = time::now();
             COMMIT TRANSACTION;",
            doc_table = Document::table_name(),
            version_table = DocumentVersion::table_name(),
        );

        let result = self
            .db
            .client
            .query(query)
            .bind(("document_id", document_id.to_string()))
            .bind(("version_id", version.id.clone()))
            .bind(("tenant_id", version.tenant_id.clone()))
            .bind(("version_number", version.version_number))
            .bind(("title", version.title.clone()))
            .bind(("content", version.content.clone()))
            .bind(("category", category))
            .bind(("fingerprint", version.fingerprint.clone()))
            .bind(("embedding", embedding))
            .bind(("change_summary", version.change_summary.clone()))
            .bind(("change_type", version.change_type))
            .bind(("size_bytes", version.size_bytes))
            .bind(("actor", actor.to_string()))
            .await?;
        result.check()?;

        Ok(())
    }
}

fn embed_input(title: &str, content: &str) -> String {
    format!("{title}\n\n{content}")
}

fn validate_required(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(())
}
