use super::model::MirrorTask;
use crate::model::MirrorTaskKind;
use anyhow::{anyhow, Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use std::time::Duration;
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let options = SqliteConnectOptions::from_str(&normalized)
        .with_context(|| format!("invalid database url {database_url}"))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .context("failed to open database")?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Queue a mirror write inside the caller's transaction so the task only
/// exists if the catalog write commits.
pub(crate) async fn enqueue_mirror_tx(
    tx: &mut Transaction<'_, Sqlite>,
    kind: MirrorTaskKind,
    ref_id: i64,
) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO mirror_outbox (kind, ref_id, attempt, due_at) VALUES (?, ?, 0, datetime('now')) RETURNING id",
    )
    .bind(kind.as_str())
    .bind(ref_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(rec.get::<i64, _>("id"))
}

#[instrument(skip_all)]
pub async fn next_due_mirror_task(pool: &Pool) -> Result<Option<MirrorTask>> {
    let row = sqlx::query(
        "SELECT id, kind, ref_id, attempt FROM mirror_outbox WHERE datetime(due_at) <= CURRENT_TIMESTAMP ORDER BY datetime(due_at) ASC, id ASC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let kind: String = row.get("kind");
    Ok(Some(MirrorTask {
        id: row.get("id"),
        kind: MirrorTaskKind::parse_kind(&kind)
            .ok_or_else(|| anyhow!("unknown mirror task kind {kind}"))?,
        ref_id: row.get("ref_id"),
        attempt: row.get("attempt"),
    }))
}

#[instrument(skip_all)]
pub async fn delete_mirror_task(pool: &Pool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM mirror_outbox WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Reschedule a failed task: 5s * 2^attempt, capped at `max_secs`.
#[instrument(skip_all)]
pub async fn backoff_mirror_task(pool: &Pool, id: i64, attempt: i32, max_secs: i64) -> Result<()> {
    let secs = (5_i64 * (1_i64 << attempt.clamp(0, 20))).min(max_secs.max(1));
    sqlx::query(
        "UPDATE mirror_outbox SET attempt = ?, due_at = datetime('now', ? || ' seconds') WHERE id = ?",
    )
    .bind(attempt + 1)
    .bind(secs.to_string())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn mirror_backlog(pool: &Pool) -> Result<i64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mirror_outbox")
        .fetch_one(pool)
        .await?;
    Ok(n)
}
