use std::{fmt, str::FromStr};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, types::StoredObject},
    stored_object,
};

/// Closed set of knowledge categories a document can belong to.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Insurance,
    Medical,
    Financial,
    Legal,
    Education,
    Household,
    Travel,
    Other,
}

impl Category {
    pub fn variants() -> &'static [&'static str] {
        &[
            "Insurance",
            "Medical",
            "Financial",
            "Legal",
            "Education",
            "Household",
            "Travel",
            "Other",
        ]
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "insurance" => Ok(Category::Insurance),
            "medical" => Ok(Category::Medical),
            "financial" => Ok(Category::Financial),
            "legal" => Ok(Category::Legal),
            "education" => Ok(Category::Education),
            "household" => Ok(Category::Household),
            "travel" => Ok(Category::Travel),
            "other" => Ok(Category::Other),
            other => Err(AppError::Validation(format!(
                "unknown category '{other}', expected one of {:?}",
                Category::variants()
            ))),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Category::Insurance => "Insurance",
            Category::Medical => "Medical",
            Category::Financial => "Financial",
            Category::Legal => "Legal",
            Category::Education => "Education",
            Category::Household => "Household",
            Category::Travel => "Travel",
            Category::Other => "Other",
        };
        write!(f, "{label}")
    }
}

stored_object!(Document, "document", {
    tenant_id: String,
    title: String,
    content: String,
    category: Category,
    fingerprint: String,
    /// None means the document is unindexed and invisible to retrieval.
    embedding: Option<Vec<f32>>,
    current_version: i64,
    version_count: i64,
    created_by: String,
    updated_by: String
});

impl Document {
    pub fn new(
        tenant_id: String,
        title: String,
        content: String,
        category: Category,
        fingerprint: String,
        embedding: Option<Vec<f32>>,
        created_by: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            tenant_id,
            title,
            content,
            category,
            fingerprint,
            embedding,
            current_version: 1,
            version_count: 1,
            created_by: created_by.clone(),
            updated_by: created_by,
        }
    }

    /// Tenant-scoped fetch. A document owned by another tenant is
    /// indistinguishable from an absent one.
    pub async fn get_scoped(
        document_id: &str,
        tenant_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Option<Self>, AppError> {
        let document: Option<Self> = db.get_item(document_id).await?;

        Ok(document.filter(|d| d.tenant_id == tenant_id))
    }

    /// Fingerprint lookup used for duplicate detection before any
    /// embedding call is made.
    pub async fn get_by_fingerprint(
        tenant_id: &str,
        fingerprint: &str,
        db: &SurrealDbClient,
    ) -> Result<Option<Self>, AppError> {
        let mut result = db
            .client
            .query(
                "SELECT * FROM type::table($table) \
                 WHERE tenant_id = $tenant_id AND fingerprint = $fingerprint LIMIT 1",
            )
            .bind(("table", Self::table_name()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("fingerprint", fingerprint.to_string()))
            .await?;

        let documents: Vec<Self> = result.take(0)?;

        Ok(documents.into_iter().next())
    }

    /// KNN search over the tenant's indexed documents, closest first.
    ///
    /// Documents without an embedding are never returned. The aliased
    /// distance column only drives the ordering; callers re-derive
    /// similarity from the stored embeddings.
    pub async fn vector_search(
        tenant_id: &str,
        embedding: Vec<f32>,
        limit: usize,
        category: Option<Category>,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let category_clause = if category.is_some() {
            "AND category = $category "
        } else {
            ""
        };
        let query = format!(
            "SELECT *, vector::distance::knn() AS distance FROM {table} \
             WHERE tenant_id = $tenant_id AND embedding != NONE {category_clause}\
             AND embedding <|{limit},40|> $embedding \
             ORDER BY distance ASC",
            table = Self::table_name(),
        );

        let mut request = db
            .client
            .query(query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("embedding", embedding));
        if let Some(category) = category {
            request = request.bind(("category", category));
        }

        let documents: Vec<Self> = request.await?.take(0)?;

        Ok(documents)
    }
}
