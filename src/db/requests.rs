//! Pending moderation requests.

use super::repo::Pool;
use crate::model::{NewPendingRequest, PendingRequest};
use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::instrument;

const REQUEST_COLUMNS: &str = "id, user_id, chat_id, message_id, bot_message_id, celebrity_name, category, geo, username, created_at";

fn request_from_row(row: &SqliteRow) -> Result<PendingRequest> {
    Ok(PendingRequest {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        chat_id: row.try_get("chat_id")?,
        message_id: row.try_get("message_id")?,
        prompt_message_id: row.try_get("bot_message_id")?,
        name: row.try_get("celebrity_name")?,
        category: row.try_get("category")?,
        region: row.try_get("geo")?,
        username: row.try_get("username")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Store a request as submitted. Case is folded only when the decision is
/// written to the catalog.
#[instrument(skip_all)]
pub async fn enqueue_request(pool: &Pool, req: &NewPendingRequest) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO pending_requests (user_id, chat_id, message_id, bot_message_id, celebrity_name, category, geo, username, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(req.user_id)
    .bind(req.chat_id)
    .bind(req.message_id)
    .bind(req.prompt_message_id)
    .bind(req.name.trim())
    .bind(req.category.trim())
    .bind(req.region.trim())
    .bind(req.username.as_deref())
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Remove and return a request in one statement. Of two concurrent callers
/// at most one gets `Some`.
#[instrument(skip_all)]
pub async fn dequeue_request(pool: &Pool, id: i64) -> Result<Option<PendingRequest>> {
    let row = sqlx::query(&format!(
        "DELETE FROM pending_requests WHERE id = ? RETURNING {REQUEST_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(request_from_row).transpose()
}

/// Open requests, oldest first.
#[instrument(skip_all)]
pub async fn list_requests(pool: &Pool) -> Result<Vec<PendingRequest>> {
    let rows = sqlx::query(&format!(
        "SELECT {REQUEST_COLUMNS} FROM pending_requests ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;
    rows.iter().map(request_from_row).collect()
}

#[instrument(skip_all)]
pub async fn get_request(pool: &Pool, id: i64) -> Result<Option<PendingRequest>> {
    let row = sqlx::query(&format!(
        "SELECT {REQUEST_COLUMNS} FROM pending_requests WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(request_from_row).transpose()
}
