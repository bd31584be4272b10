use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use ridepool_domain::message::{Message, NewMessage};
use ridepool_domain::repository::MessageStore;
use ridepool_domain::DomainResult;

use crate::storage_err;

pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    sender_id: Uuid,
    recipient_id: Uuid,
    body: String,
    read: bool,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            sender_id: row.sender_id,
            recipient_id: row.recipient_id,
            body: row.body,
            read: row.read,
            created_at: row.created_at,
        }
    }
}

const MESSAGE_COLUMNS: &str = "id, sender_id, recipient_id, body, read, created_at";

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn insert(&self, message: NewMessage) -> DomainResult<Message> {
        let sql = format!(
            "INSERT INTO messages (id, sender_id, recipient_id, body, read) \
             VALUES ($1, $2, $3, $4, FALSE) RETURNING {MESSAGE_COLUMNS}"
        );
        let row: MessageRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(message.sender_id)
            .bind(message.recipient_id)
            .bind(&message.body)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(row.into())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Message>> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1");
        let row: Option<MessageRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(row.map(Message::from))
    }

    async fn between(&self, a: Uuid, b: Uuid) -> DomainResult<Vec<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE (sender_id = $1 AND recipient_id = $2) \
                OR (sender_id = $2 AND recipient_id = $1) \
             ORDER BY created_at ASC"
        );
        let rows: Vec<MessageRow> = sqlx::query_as(&sql)
            .bind(a)
            .bind(b)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(rows.into_iter().map(Message::from).collect())
    }

    async fn for_user(&self, user_id: Uuid) -> DomainResult<Vec<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE sender_id = $1 OR recipient_id = $1 \
             ORDER BY created_at DESC"
        );
        let rows: Vec<MessageRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(rows.into_iter().map(Message::from).collect())
    }

    async fn mark_read(&self, id: Uuid) -> DomainResult<bool> {
        // Conditional on read = FALSE so a repeat call is a no-op.
        let result = sqlx::query("UPDATE messages SET read = TRUE WHERE id = $1 AND read = FALSE")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_conversation_read(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
    ) -> DomainResult<Vec<Uuid>> {
        #[derive(sqlx::FromRow)]
        struct IdRow {
            id: Uuid,
        }

        let rows: Vec<IdRow> = sqlx::query_as(
            "UPDATE messages SET read = TRUE \
             WHERE sender_id = $1 AND recipient_id = $2 AND read = FALSE \
             RETURNING id",
        )
        .bind(sender_id)
        .bind(recipient_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows.into_iter().map(|r| r.id).collect())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(result.rows_affected() > 0)
    }
}
