//! Chats known to the bot and their roles.

use super::repo::Pool;
use crate::model::{Role, Subscriber};
use anyhow::{anyhow, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::instrument;

fn subscriber_from_row(row: &SqliteRow) -> Result<Subscriber> {
    let role: String = row.try_get("role")?;
    Ok(Subscriber {
        chat_id: row.try_get("chat_id")?,
        username: row.try_get("username")?,
        role: Role::parse_role(&role).ok_or_else(|| anyhow!("unknown role {role}"))?,
    })
}

/// Insert a chat as a plain user, or refresh its username. The role of an
/// existing chat is kept.
#[instrument(skip_all)]
pub async fn register_subscriber(
    pool: &Pool,
    chat_id: i64,
    username: Option<&str>,
) -> Result<Subscriber> {
    let row = sqlx::query(
        "INSERT INTO subscribers (chat_id, username, role) VALUES (?, ?, 'user') \
         ON CONFLICT (chat_id) DO UPDATE SET username = COALESCE(excluded.username, subscribers.username) \
         RETURNING chat_id, username, role",
    )
    .bind(chat_id)
    .bind(username)
    .fetch_one(pool)
    .await?;
    subscriber_from_row(&row)
}

#[instrument(skip_all)]
pub async fn get_subscriber(pool: &Pool, chat_id: i64) -> Result<Option<Subscriber>> {
    let row = sqlx::query("SELECT chat_id, username, role FROM subscribers WHERE chat_id = ?")
        .bind(chat_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(subscriber_from_row).transpose()
}

/// Role of a chat; unknown chats are plain users.
pub async fn role_of(pool: &Pool, chat_id: i64) -> Result<Role> {
    Ok(get_subscriber(pool, chat_id)
        .await?
        .map(|s| s.role)
        .unwrap_or_default())
}

#[instrument(skip_all)]
pub async fn list_subscribers(pool: &Pool) -> Result<Vec<Subscriber>> {
    let rows = sqlx::query("SELECT chat_id, username, role FROM subscribers ORDER BY chat_id")
        .fetch_all(pool)
        .await?;
    rows.iter().map(subscriber_from_row).collect()
}

#[instrument(skip_all)]
pub async fn subscribers_with_roles(pool: &Pool, roles: &[Role]) -> Result<Vec<Subscriber>> {
    Ok(list_subscribers(pool)
        .await?
        .into_iter()
        .filter(|s| roles.contains(&s.role))
        .collect())
}

#[instrument(skip_all)]
pub async fn set_role(pool: &Pool, chat_id: i64, role: Role) -> Result<Subscriber> {
    let row = sqlx::query(
        "INSERT INTO subscribers (chat_id, role) VALUES (?, ?) \
         ON CONFLICT (chat_id) DO UPDATE SET role = excluded.role \
         RETURNING chat_id, username, role",
    )
    .bind(chat_id)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;
    subscriber_from_row(&row)
}
