//! Postgres-backed conversation threads.

use async_trait::async_trait;
use brigade_assistants::{AssistantKind, ThreadStoreProvider};
use brigade_conversation::{Message, Thread, ThreadId, ThreadStore, ThreadStoreError};
use brigade_core::MessageId;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Row type for message queries.
#[derive(Debug, FromRow)]
struct MessageRow {
    message: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    fn try_into_message(self, thread_id: &ThreadId) -> Result<Message, ThreadStoreError> {
        serde_json::from_value(self.message).map_err(|e| ThreadStoreError::Corrupted {
            thread_id: thread_id.to_string(),
            reason: e.to_string(),
        })
    }
}

fn storage_failed(e: sqlx::Error) -> ThreadStoreError {
    ThreadStoreError::StorageFailed {
        reason: e.to_string(),
    }
}

fn encode(message: &Message) -> Result<serde_json::Value, ThreadStoreError> {
    serde_json::to_value(message).map_err(|e| ThreadStoreError::StorageFailed {
        reason: format!("could not encode message {}: {e}", message.id),
    })
}

/// The seed as first stored on a thread: its own id, stamped no later than
/// the first message of the turn that opened the thread.
fn opening_seed(seed: &Message, first: Option<&Message>) -> Message {
    Message {
        id: MessageId::new(),
        timestamp: first.map_or_else(Utc::now, |message| message.timestamp),
        ..seed.clone()
    }
}

/// Builds a thread from its rows, oldest first.
fn thread_from_rows(
    thread_id: &ThreadId,
    rows: Vec<MessageRow>,
) -> Result<Option<Thread>, ThreadStoreError> {
    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return Ok(None);
    };
    let created_at = first.created_at;
    let last_active_at = last.created_at;
    let messages = rows
        .into_iter()
        .map(|row| row.try_into_message(thread_id))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(Thread {
        id: thread_id.clone(),
        messages,
        created_at,
        last_active_at,
    }))
}

/// Thread store keeping one row per message in `conversation_messages`.
///
/// Appends take a transaction-scoped advisory lock on the thread id, so
/// concurrent server processes never interleave writes to one thread.
#[derive(Debug, Clone)]
pub struct PgThreadStore {
    pool: PgPool,
    seed: Message,
}

impl PgThreadStore {
    /// Creates a store whose new threads start from `seed`.
    #[must_use]
    pub fn new(pool: PgPool, seed: Message) -> Self {
        Self { pool, seed }
    }

    async fn rows(&self, thread_id: &ThreadId) -> Result<Vec<MessageRow>, ThreadStoreError> {
        sqlx::query_as(
            r#"
            SELECT message, created_at
            FROM conversation_messages
            WHERE thread_id = $1
            ORDER BY seq
            "#,
        )
        .bind(thread_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_failed)
    }
}

#[async_trait]
impl ThreadStore for PgThreadStore {
    #[instrument(skip_all, fields(thread_id = %thread_id))]
    async fn load(&self, thread_id: &ThreadId) -> Result<Vec<Message>, ThreadStoreError> {
        let rows = self.rows(thread_id).await?;
        if rows.is_empty() {
            return Ok(vec![self.seed.clone()]);
        }
        rows.into_iter()
            .map(|row| row.try_into_message(thread_id))
            .collect()
    }

    #[instrument(skip_all, fields(thread_id = %thread_id, count = messages.len()))]
    async fn append(
        &self,
        thread_id: &ThreadId,
        messages: Vec<Message>,
    ) -> Result<(), ThreadStoreError> {
        let mut tx = self.pool.begin().await.map_err(storage_failed)?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(thread_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(storage_failed)?;

        let last_seq: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(seq) FROM conversation_messages WHERE thread_id = $1",
        )
        .bind(thread_id.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_failed)?;

        let pending = match last_seq {
            Some(_) => messages,
            None => {
                let seed = opening_seed(&self.seed, messages.first());
                std::iter::once(seed).chain(messages).collect()
            }
        };
        let mut seq = last_seq.map_or(0, |last| last + 1);
        for message in &pending {
            sqlx::query(
                r#"
                INSERT INTO conversation_messages (thread_id, seq, message, created_at)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(thread_id.as_str())
            .bind(seq)
            .bind(encode(message)?)
            .bind(message.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(storage_failed)?;
            seq += 1;
        }

        tx.commit().await.map_err(storage_failed)?;
        debug!(stored = pending.len(), "messages appended");
        Ok(())
    }

    #[instrument(skip_all, fields(thread_id = %thread_id))]
    async fn reset(&self, thread_id: &ThreadId) -> Result<(), ThreadStoreError> {
        let result = sqlx::query("DELETE FROM conversation_messages WHERE thread_id = $1")
            .bind(thread_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage_failed)?;
        debug!(deleted = result.rows_affected(), "thread reset");
        Ok(())
    }

    async fn snapshot(&self, thread_id: &ThreadId) -> Result<Option<Thread>, ThreadStoreError> {
        let rows = self.rows(thread_id).await?;
        thread_from_rows(thread_id, rows)
    }
}

/// Opens a [`PgThreadStore`] per assistant kind over one pool.
#[derive(Debug, Clone)]
pub struct PgThreadStores {
    pool: PgPool,
}

impl PgThreadStores {
    /// Creates the provider.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ThreadStoreProvider for PgThreadStores {
    fn store(&self, _kind: AssistantKind, seed: Message) -> Arc<dyn ThreadStore> {
        Arc::new(PgThreadStore::new(self.pool.clone(), seed))
    }
}
