//! PostgreSQL Chat Store
//!
//! Runtime-checked queries against the `messages`, `room_members` and
//! `users` tables (see `migrations/`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;

use crate::domain::{ChatStore, Envelope, StoreError, UserStatus};
use crate::infrastructure::metrics;

/// PostgreSQL implementation of [`ChatStore`].
pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    /// Creates a new PgChatStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

#[async_trait]
impl ChatStore for PgChatStore {
    #[instrument(skip(self, envelope), fields(message_id = %envelope.message_id, room_id = %envelope.room_id))]
    async fn insert_message(&self, envelope: &Envelope) -> Result<(), StoreError> {
        let start = Instant::now();
        let metadata = (!envelope.metadata.is_empty()).then(|| Json(&envelope.metadata));

        sqlx::query(
            r#"
            INSERT INTO messages (id, user_id, username, room_id, content, message_type, created_at, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&envelope.message_id)
        .bind(&envelope.sender_id)
        .bind(&envelope.sender_name)
        .bind(&envelope.room_id)
        .bind(&envelope.content)
        .bind(envelope.kind.as_str())
        .bind(to_timestamp(envelope.created_at))
        .bind(metadata)
        .execute(&self.pool)
        .await?;

        metrics::record_db_query("insert", "messages", start.elapsed().as_secs_f64());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn upsert_room_membership(
        &self,
        room_id: &str,
        user_id: &str,
        joined: bool,
    ) -> Result<(), StoreError> {
        let start = Instant::now();

        if joined {
            sqlx::query(
                r#"
                INSERT INTO room_members (room_id, user_id, joined_at)
                VALUES ($1, $2, NOW())
                ON CONFLICT (room_id, user_id) DO NOTHING
                "#,
            )
            .bind(room_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query("DELETE FROM room_members WHERE room_id = $1 AND user_id = $2")
                .bind(room_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        }

        metrics::record_db_query("upsert", "room_members", start.elapsed().as_secs_f64());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_user_status(&self, user_id: &str, status: UserStatus) -> Result<(), StoreError> {
        let start = Instant::now();

        sqlx::query("UPDATE users SET status = $2, last_seen = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        metrics::record_db_query("update", "users", start.elapsed().as_secs_f64());
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
