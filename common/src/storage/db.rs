use crate::error::AppError;

use super::types::StoredObject;
use std::ops::Deref;
use surrealdb::{
    engine::any::{connect, Any},
    opt::auth::Root,
    Error, Surreal,
};

#[derive(Clone)]
pub struct SurrealDbClient {
    pub client: Surreal<Any>,
}

impl SurrealDbClient {
    /// Connect and authenticate against a running SurrealDB instance.
    pub async fn new(
        address: &str,
        username: &str,
        password: &str,
        namespace: &str,
        database: &str,
    ) -> Result<Self, Error> {
        let db = connect(address).await?;

        // Sign in to database
        db.signin(Root { username, password }).await?;

        // Set namespace
        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }

    /// Define tables and indexes. Safe to run on every startup.
    ///
    /// `embedding_dimension` must match the configured embedding provider;
    /// the HNSW index is recreated when the dimension changes.
    pub async fn ensure_initialized(&self, embedding_dimension: usize) -> Result<(), AppError> {
        self.define_schema().await?;
        self.define_document_embedding_index(embedding_dimension)
            .await?;

        Ok(())
    }

    async fn define_schema(&self) -> Result<(), Error> {
        self.client
            .query(
                "DEFINE TABLE IF NOT EXISTS document SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS idx_document_tenant ON TABLE document FIELDS tenant_id;
                DEFINE INDEX IF NOT EXISTS unique_document_fingerprint ON TABLE document FIELDS tenant_id, fingerprint UNIQUE;
                DEFINE TABLE IF NOT EXISTS document_version SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS idx_version_document ON TABLE document_version FIELDS document_id;
                DEFINE INDEX IF NOT EXISTS unique_document_version ON TABLE document_version FIELDS document_id, version_number UNIQUE;
                DEFINE TABLE IF NOT EXISTS conversation SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS idx_conversation_tenant ON TABLE conversation FIELDS tenant_id;
                DEFINE TABLE IF NOT EXISTS message SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS idx_message_conversation ON TABLE message FIELDS conversation_id;
                DEFINE TABLE IF NOT EXISTS rate_limit_window SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS idx_rate_limit_window_start ON TABLE rate_limit_window FIELDS window_start;",
            )
            .await?;

        Ok(())
    }

    /// Recreate the vector index on `document.embedding`.
    ///
    /// Surreal requires the index definition to be recreated when the
    /// embedding length changes.
    pub async fn define_document_embedding_index(
        &self,
        dimension: usize,
    ) -> Result<(), AppError> {
        let query = format!(
            "BEGIN TRANSACTION;
             REMOVE INDEX IF EXISTS idx_document_embedding ON TABLE document;
             DEFINE INDEX idx_document_embedding ON TABLE document FIELDS embedding HNSW DIMENSION {dimension} DIST COSINE;
             COMMIT TRANSACTION;",
        );

        let res = self.client.query(query).await.map_err(AppError::Database)?;
        res.check().map_err(AppError::Database)?;

        Ok(())
    }

    /// Operation to store a object in SurrealDB, requires the struct to implement StoredObject
    ///
    /// # Arguments
    /// * `item` - The item to be stored
    ///
    /// # Returns
    /// * `Result` - Item or Error
    pub async fn store_item<T>(&self, item: T) -> Result<Option<T>, Error>
    where
        T: StoredObject + Send + Sync + 'static,
    {
        self.client
            .create((T::table_name(), item.get_id()))
            .content(item)
            .await
    }

    /// Operation to retrieve all objects from a certain table, requires the struct to implement StoredObject
    ///
    /// # Returns
    /// * `Result` - Vec<T> or Error
    pub async fn get_all_stored_items<T>(&self) -> Result<Vec<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.select(T::table_name()).await
    }

    /// Operation to retrieve a single object by its ID, requires the struct to implement StoredObject
    ///
    /// # Arguments
    /// * `id` - The ID of the item to retrieve
    ///
    /// # Returns
    /// * `Result<Option<T>, Error>` - The found item or Error
    pub async fn get_item<T>(&self, id: &str) -> Result<Option<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.select((T::table_name(), id)).await
    }

    /// Operation to delete a single object by its ID, requires the struct to implement StoredObject
    ///
    /// # Arguments
    /// * `id` - The ID of the item to delete
    ///
    /// # Returns
    /// * `Result<Option<T>, Error>` - The deleted item or Error
    pub async fn delete_item<T>(&self, id: &str) -> Result<Option<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.delete((T::table_name(), id)).await
    }
}

impl Deref for SurrealDbClient {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl SurrealDbClient {
    /// Create an in-memory SurrealDB client for testing.
    pub async fn memory(namespace: &str, database: &str) -> Result<Self, Error> {
        let db = connect("mem://").await?;

        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }
}
