//! Celebrity catalog persistence.
//!
//! Every write recomputes both search forms of the name and queues a
//! mirror task in the same transaction.

use super::repo::{enqueue_mirror_tx, Pool};
use crate::error::StoreError;
use crate::model::{CatalogEntry, EntryKey, EntryPatch, MirrorTaskKind, Status, UNIVERSAL_CATEGORY};
use crate::normalize::{normalize_ascii, normalize_cyrillic};
use anyhow::{anyhow, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{instrument, warn};

const ENTRY_COLUMNS: &str = "id, name, normalized_name, ascii_name, category, geo, status, reason";

fn entry_from_row(row: &SqliteRow) -> Result<CatalogEntry> {
    let status: String = row.try_get("status")?;
    Ok(CatalogEntry {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        normalized_name: row.try_get("normalized_name")?,
        ascii_name: row.try_get("ascii_name")?,
        category: row.try_get("category")?,
        region: row.try_get("geo")?,
        status: Status::parse_status(&status)
            .ok_or_else(|| anyhow!("unknown status {status} in catalog"))?,
        reason: row.try_get("reason")?,
    })
}

fn entries_from_rows(rows: &[SqliteRow]) -> Result<Vec<CatalogEntry>> {
    rows.iter().map(entry_from_row).collect()
}

/// Reasons only accompany a Forbidden verdict; blanks are dropped.
fn verdict_reason(status: Status, reason: Option<&str>) -> Option<String> {
    match status {
        Status::Approved => None,
        Status::Forbidden => reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Insert a row, or overwrite the verdict of the row with the same
/// (name, category, region).
#[instrument(skip_all)]
pub async fn insert_entry(
    pool: &Pool,
    key: &EntryKey,
    status: Status,
    reason: Option<&str>,
) -> Result<CatalogEntry> {
    let mut tx = pool.begin().await?;
    let row = sqlx::query(&format!(
        "INSERT INTO celebrities (name, normalized_name, ascii_name, category, geo, status, reason) \
         VALUES (?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (name, category, geo) DO UPDATE SET \
           normalized_name = excluded.normalized_name, \
           ascii_name = excluded.ascii_name, \
           status = excluded.status, \
           reason = excluded.reason \
         RETURNING {ENTRY_COLUMNS}"
    ))
    .bind(&key.name)
    .bind(normalize_cyrillic(&key.name))
    .bind(normalize_ascii(&key.name))
    .bind(&key.category)
    .bind(&key.region)
    .bind(status.as_str())
    .bind(verdict_reason(status, reason))
    .fetch_one(&mut *tx)
    .await?;
    let entry = entry_from_row(&row)?;
    enqueue_mirror_tx(&mut tx, MirrorTaskKind::PushEntry, entry.id).await?;
    tx.commit().await?;
    Ok(entry)
}

#[instrument(skip_all)]
pub async fn get_entry(pool: &Pool, id: i64) -> Result<Option<CatalogEntry>> {
    let row = sqlx::query(&format!("SELECT {ENTRY_COLUMNS} FROM celebrities WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(entry_from_row).transpose()
}

#[instrument(skip_all)]
pub async fn find_entry(pool: &Pool, key: &EntryKey) -> Result<Option<CatalogEntry>> {
    let row = sqlx::query(&format!(
        "SELECT {ENTRY_COLUMNS} FROM celebrities WHERE name = ? AND category = ? AND geo = ?"
    ))
    .bind(&key.name)
    .bind(&key.category)
    .bind(&key.region)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(entry_from_row).transpose()
}

/// Whole catalog ordered by id.
#[instrument(skip_all)]
pub async fn list_entries(pool: &Pool) -> Result<Vec<CatalogEntry>> {
    let rows = sqlx::query(&format!("SELECT {ENTRY_COLUMNS} FROM celebrities ORDER BY id"))
        .fetch_all(pool)
        .await?;
    entries_from_rows(&rows)
}

/// Apply `patch` to the row identified by its natural key.
/// Returns `None` when no such row exists.
#[instrument(skip_all)]
pub async fn update_entry_by_identity(
    pool: &Pool,
    key: &EntryKey,
    patch: &EntryPatch,
) -> Result<Option<CatalogEntry>> {
    match find_entry(pool, key).await? {
        Some(current) => write_patch(pool, current, patch).await.map(Some),
        None => Ok(None),
    }
}

#[instrument(skip_all)]
pub async fn update_entry_by_id(pool: &Pool, id: i64, patch: &EntryPatch) -> Result<CatalogEntry> {
    let current = get_entry(pool, id)
        .await?
        .ok_or(StoreError::NotFound { id })?;
    write_patch(pool, current, patch).await
}

async fn write_patch(pool: &Pool, current: CatalogEntry, patch: &EntryPatch) -> Result<CatalogEntry> {
    if patch.is_empty() {
        return Ok(current);
    }
    let target = EntryKey::new(
        patch.name.as_deref().unwrap_or(&current.name),
        patch.category.as_deref().unwrap_or(&current.category),
        patch.region.as_deref().unwrap_or(&current.region),
    );
    let status = patch.status.unwrap_or(current.status);
    let reason = match &patch.reason {
        Some(reason) => reason.as_deref(),
        None => current.reason.as_deref(),
    };

    let mut tx = pool.begin().await?;
    let res = sqlx::query(&format!(
        "UPDATE celebrities SET name = ?, normalized_name = ?, ascii_name = ?, category = ?, geo = ?, \
         status = ?, reason = ? WHERE id = ? RETURNING {ENTRY_COLUMNS}"
    ))
    .bind(&target.name)
    .bind(normalize_cyrillic(&target.name))
    .bind(normalize_ascii(&target.name))
    .bind(&target.category)
    .bind(&target.region)
    .bind(status.as_str())
    .bind(verdict_reason(status, reason))
    .bind(current.id)
    .fetch_optional(&mut *tx)
    .await;

    match res {
        Ok(Some(row)) => {
            let entry = entry_from_row(&row)?;
            enqueue_mirror_tx(&mut tx, MirrorTaskKind::PushEntry, entry.id).await?;
            tx.commit().await?;
            Ok(entry)
        }
        Ok(None) => Err(StoreError::NotFound { id: current.id }.into()),
        Err(err) if is_unique_violation(&err) => {
            tx.rollback().await?;
            warn!(id = current.id, name = %target.name, "update collides with existing row; keeping it");
            find_entry(pool, &target)
                .await?
                .ok_or_else(|| anyhow!(err).context("conflicting row vanished"))
        }
        Err(err) => Err(err.into()),
    }
}

#[instrument(skip_all)]
pub async fn delete_entry_by_identity(pool: &Pool, key: &EntryKey) -> Result<bool> {
    let mut tx = pool.begin().await?;
    let deleted: Option<i64> = sqlx::query_scalar(
        "DELETE FROM celebrities WHERE name = ? AND category = ? AND geo = ? RETURNING id",
    )
    .bind(&key.name)
    .bind(&key.category)
    .bind(&key.region)
    .fetch_optional(&mut *tx)
    .await?;
    finish_delete(tx, deleted).await
}

#[instrument(skip_all)]
pub async fn delete_entry_by_id(pool: &Pool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await?;
    let deleted: Option<i64> = sqlx::query_scalar("DELETE FROM celebrities WHERE id = ? RETURNING id")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    finish_delete(tx, deleted).await
}

async fn finish_delete(
    mut tx: sqlx::Transaction<'_, sqlx::Sqlite>,
    deleted: Option<i64>,
) -> Result<bool> {
    let Some(id) = deleted else {
        return Ok(false);
    };
    enqueue_mirror_tx(&mut tx, MirrorTaskKind::ClearEntry, id).await?;
    tx.commit().await?;
    Ok(true)
}

/// Distinct approved names for a region and category, universal rows
/// included, alphabetically.
#[instrument(skip_all)]
pub async fn list_approved(pool: &Pool, region: &str, category: &str) -> Result<Vec<String>> {
    let names = sqlx::query_scalar(
        "SELECT DISTINCT name FROM celebrities \
         WHERE geo = ? AND (category = ? OR category = ?) AND status = 'approved' ORDER BY name",
    )
    .bind(region.trim().to_lowercase())
    .bind(category.trim().to_lowercase())
    .bind(UNIVERSAL_CATEGORY)
    .fetch_all(pool)
    .await?;
    Ok(names)
}

#[instrument(skip_all)]
pub async fn categories_by_region(pool: &Pool, region: &str) -> Result<Vec<String>> {
    let categories = sqlx::query_scalar(
        "SELECT DISTINCT category FROM celebrities WHERE geo = ? ORDER BY category",
    )
    .bind(region.trim().to_lowercase())
    .fetch_all(pool)
    .await?;
    Ok(categories)
}

/// Queue a mirror push for every catalog row. Returns how many were queued.
#[instrument(skip_all)]
pub async fn requeue_catalog(pool: &Pool) -> Result<u64> {
    let res = sqlx::query(
        "INSERT INTO mirror_outbox (kind, ref_id, attempt, due_at) \
         SELECT ?, id, 0, datetime('now') FROM celebrities ORDER BY id",
    )
    .bind(MirrorTaskKind::PushEntry.as_str())
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

/// Copy a verdict set on a universal row onto every concrete-category row
/// of the same name and region. Returns only the rows that changed.
#[instrument(skip_all)]
pub async fn sync_status_from_universal(
    pool: &Pool,
    region: &str,
    name: &str,
    status: Status,
    reason: Option<&str>,
) -> Result<Vec<CatalogEntry>> {
    let reason = verdict_reason(status, reason);
    let mut tx = pool.begin().await?;
    let rows = sqlx::query(&format!(
        "UPDATE celebrities SET status = ?, reason = ? \
         WHERE geo = ? AND name = ? AND category <> ? AND (status <> ? OR reason IS NOT ?) \
         RETURNING {ENTRY_COLUMNS}"
    ))
    .bind(status.as_str())
    .bind(&reason)
    .bind(region.trim().to_lowercase())
    .bind(name.trim().to_lowercase())
    .bind(UNIVERSAL_CATEGORY)
    .bind(status.as_str())
    .bind(&reason)
    .fetch_all(&mut *tx)
    .await?;
    let mut changed = entries_from_rows(&rows)?;
    for entry in &changed {
        enqueue_mirror_tx(&mut tx, MirrorTaskKind::PushEntry, entry.id).await?;
    }
    tx.commit().await?;
    changed.sort_by_key(|e| e.id);
    Ok(changed)
}

/// Exact hit on either search form. A row filed under the requested
/// category wins over a universal one.
#[instrument(skip_all)]
pub async fn exact_match(
    pool: &Pool,
    cyrillic: Option<&str>,
    ascii: Option<&str>,
    category: &str,
    region: &str,
) -> Result<Option<CatalogEntry>> {
    let row = sqlx::query(&format!(
        "SELECT {ENTRY_COLUMNS} FROM celebrities \
         WHERE geo = ? AND (category = ? OR category = ?) \
           AND (normalized_name = ? OR ascii_name = ?) \
         ORDER BY (category = ?), id LIMIT 1"
    ))
    .bind(region)
    .bind(category)
    .bind(UNIVERSAL_CATEGORY)
    .bind(cyrillic)
    .bind(ascii)
    .bind(UNIVERSAL_CATEGORY)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(entry_from_row).transpose()
}

/// Rows whose search forms contain the query, shortest names first.
#[instrument(skip_all)]
pub async fn substring_matches(
    pool: &Pool,
    cyrillic: Option<&str>,
    ascii: Option<&str>,
    category: &str,
    region: &str,
    limit: u32,
) -> Result<Vec<CatalogEntry>> {
    let rows = sqlx::query(&format!(
        "SELECT {ENTRY_COLUMNS} FROM celebrities \
         WHERE geo = ? AND (category = ? OR category = ?) \
           AND (instr(normalized_name, ?) > 0 OR instr(ascii_name, ?) > 0) \
         ORDER BY length(normalized_name), id LIMIT ?"
    ))
    .bind(region)
    .bind(category)
    .bind(UNIVERSAL_CATEGORY)
    .bind(cyrillic)
    .bind(ascii)
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;
    entries_from_rows(&rows)
}

/// Every row a query for (category, region) may match.
#[instrument(skip_all)]
pub async fn scoped_entries(pool: &Pool, category: &str, region: &str) -> Result<Vec<CatalogEntry>> {
    let rows = sqlx::query(&format!(
        "SELECT {ENTRY_COLUMNS} FROM celebrities \
         WHERE geo = ? AND (category = ? OR category = ?) ORDER BY id"
    ))
    .bind(region)
    .bind(category)
    .bind(UNIVERSAL_CATEGORY)
    .fetch_all(pool)
    .await?;
    entries_from_rows(&rows)
}
