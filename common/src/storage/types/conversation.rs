use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, types::StoredObject},
    stored_object,
};

use super::message::Message;

stored_object!(Conversation, "conversation", {
    tenant_id: String,
    user_id: String,
    title: String
});

impl Conversation {
    pub fn new(tenant_id: String, user_id: String, title: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            tenant_id,
            user_id,
            title,
        }
    }

    /// Tenant-scoped fetch. A conversation owned by another tenant is
    /// reported as absent, never as a permission failure.
    pub async fn get_scoped(
        conversation_id: &str,
        tenant_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Option<Self>, AppError> {
        let conversation: Option<Self> = db.get_item(conversation_id).await?;

        Ok(conversation.filter(|c| c.tenant_id == tenant_id))
    }

    pub async fn get_complete_conversation(
        conversation_id: &str,
        tenant_id: &str,
        db: &SurrealDbClient,
    ) -> Result<(Self, Vec<Message>), AppError> {
        let conversation = Self::get_scoped(conversation_id, tenant_id, db)
            .await?
            .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))?;

        let messages: Vec<Message> = db
            .client
            .query(
                "SELECT * FROM type::table($table_name) \
                 WHERE conversation_id = $conversation_id ORDER BY created_at",
            )
            .bind(("table_name", Message::table_name()))
            .bind(("conversation_id", conversation_id.to_string()))
            .await?
            .take(0)?;

        Ok((conversation, messages))
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::types::message::MessageRole;

    use super::*;

    async fn setup_db() -> SurrealDbClient {
        let namespace = "test_ns";
        let database = &Uuid::new_v4().to_string();
        SurrealDbClient::memory(namespace, database)
            .await
            .expect("Failed to start in-memory surrealdb")
    }

    #[tokio::test]
    async fn test_create_conversation() {
        let db = setup_db().await;

        let conversation = Conversation::new(
            "tenant_a".to_string(),
            "user_1".to_string(),
            "Insurance questions".to_string(),
        );

        assert_eq!(conversation.tenant_id, "tenant_a");
        assert!(!conversation.id.is_empty());

        db.store_item(conversation.clone())
            .await
            .expect("Failed to store conversation");

        let retrieved: Option<Conversation> = db
            .get_item(&conversation.id)
            .await
            .expect("Failed to retrieve conversation");
        assert_eq!(retrieved, Some(conversation));
    }

    #[tokio::test]
    async fn test_get_complete_conversation_not_found() {
        let db = setup_db().await;

        let result =
            Conversation::get_complete_conversation("nonexistent_id", "tenant_a", &db).await;

        match result {
            Err(AppError::NotFound(_)) => { /* expected error */ }
            _ => panic!("Expected NotFound error"),
        }
    }

    #[tokio::test]
    async fn test_foreign_tenant_sees_not_found() {
        let db = setup_db().await;

        let conversation = Conversation::new(
            "tenant_a".to_string(),
            "user_1".to_string(),
            "Private".to_string(),
        );
        let conversation_id = conversation.id.clone();
        db.store_item(conversation)
            .await
            .expect("Failed to store conversation");

        // The other tenant must not learn the conversation exists.
        let result =
            Conversation::get_complete_conversation(&conversation_id, "tenant_b", &db).await;
        match result {
            Err(AppError::NotFound(_)) => { /* expected error */ }
            _ => panic!("Expected NotFound error"),
        }
    }

    #[tokio::test]
    async fn test_get_complete_conversation_with_messages_in_order() {
        let db = setup_db().await;

        let conversation = Conversation::new(
            "tenant_a".to_string(),
            "user_1".to_string(),
            "Conversation".to_string(),
        );
        let conversation_id = conversation.id.clone();
        db.store_item(conversation)
            .await
            .expect("Failed to store conversation");

        let mut first = Message::new(
            conversation_id.clone(),
            MessageRole::User,
            "When does my auto insurance expire?".to_string(),
            None,
            Some("user_1".to_string()),
        );
        first.created_at = Utc::now() - chrono::Duration::seconds(2);
        let second = Message::new(
            conversation_id.clone(),
            MessageRole::Assistant,
            "December 31, 2024.".to_string(),
            None,
            None,
        );

        db.store_item(second).await.expect("Failed to store");
        db.store_item(first).await.expect("Failed to store");

        let (_, messages) =
            Conversation::get_complete_conversation(&conversation_id, "tenant_a", &db)
                .await
                .expect("Failed to retrieve complete conversation");

        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages.first().map(|m| m.role.clone()),
            Some(MessageRole::User)
        );
        assert_eq!(
            messages.last().map(|m| m.role.clone()),
            Some(MessageRole::Assistant)
        );
    }
}
