use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{AppError, AppResult};

/// A persisted direct message. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    #[serde(rename = "from")]
    pub sender: String,
    #[serde(rename = "to")]
    pub recipient: String,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

type MessageRow = (String, String, String, String, i64);

/// Append-only message log. Holds no pool when persistence is not configured, in which case
/// writes fail with [`AppError::StoreUnavailable`] and reads come back empty.
#[derive(Clone, Default)]
pub struct MessageStore {
    pool: Option<SqlitePool>,
}

impl MessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Some(pool) }
    }

    pub fn unavailable() -> Self {
        Self { pool: None }
    }

    pub fn from_pool(pool: Option<SqlitePool>) -> Self {
        Self { pool }
    }

    pub fn is_available(&self) -> bool {
        self.pool.as_ref().is_some_and(|pool| !pool.is_closed())
    }

    pub async fn append(&self, sender: &str, recipient: &str, text: &str) -> AppResult<Message> {
        self.append_at(sender, recipient, text, OffsetDateTime::now_utc()).await
    }

    pub(crate) async fn append_at(
        &self,
        sender: &str,
        recipient: &str,
        text: &str,
        created_at: OffsetDateTime,
    ) -> AppResult<Message> {
        let pool = self.pool.as_ref().ok_or(AppError::StoreUnavailable)?;

        let id = Uuid::now_v7();
        let stamp = i64::try_from(created_at.unix_timestamp_nanos())
            .map_err(|_| anyhow::anyhow!("timestamp {created_at} out of range"))?;

        sqlx::query("INSERT INTO messages (id,sender,recipient,text,created_at) VALUES (?,?,?,?,?)")
            .bind(id.to_string())
            .bind(sender)
            .bind(recipient)
            .bind(text)
            .bind(stamp)
            .execute(pool)
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, sender, recipient, "message append failed");
                AppError::StoreUnavailable
            })?;

        Ok(Message {
            id,
            sender: sender.to_owned(),
            recipient: recipient.to_owned(),
            text: text.to_owned(),
            created_at,
        })
    }

    /// Every message between `a` and `b`, in either direction, oldest first.
    pub async fn query(&self, a: &str, b: &str) -> Vec<Message> {
        let Some(pool) = self.pool.as_ref() else {
            return Vec::new();
        };

        let rows: Vec<MessageRow> = match sqlx::query_as(
            "SELECT id,sender,recipient,text,created_at FROM messages \
             WHERE (sender=? AND recipient=?) OR (sender=? AND recipient=?) \
             ORDER BY created_at ASC, seq ASC",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_all(pool)
        .await
        {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(error = %err, a, b, "conversation query failed, returning empty");
                return Vec::new();
            }
        };

        rows.into_iter().filter_map(row_to_message).collect()
    }
}

fn row_to_message((id, sender, recipient, text, created_at): MessageRow) -> Option<Message> {
    let id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(err) => {
            tracing::warn!(%id, error = %err, "skipping message with bad id");
            return None;
        }
    };
    let created_at = match OffsetDateTime::from_unix_timestamp_nanos(i128::from(created_at)) {
        Ok(at) => at,
        Err(err) => {
            tracing::warn!(%id, error = %err, "skipping message with bad timestamp");
            return None;
        }
    };

    Some(Message { id, sender, recipient, text, created_at })
}
