use crate::db::{self, Pool};
use crate::model::MirrorTaskKind;
use crate::sheets::SheetMirror;
use anyhow::Result;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Apply the next due mirror task. Returns `false` when nothing was due.
#[instrument(skip_all)]
pub async fn process_next_task(
    pool: &Pool,
    mirror: &dyn SheetMirror,
    max_backoff_secs: i64,
) -> Result<bool> {
    let Some(task) = db::next_due_mirror_task(pool).await? else {
        return Ok(false);
    };
    let res = match task.kind {
        MirrorTaskKind::PushEntry => match db::get_entry(pool, task.ref_id).await? {
            Some(entry) => mirror.push_entry(&entry).await,
            None => {
                debug!(ref_id = task.ref_id, "entry gone before mirroring; skipping push");
                Ok(())
            }
        },
        MirrorTaskKind::ClearEntry => mirror.clear_entry(task.ref_id).await,
    };
    match res {
        Ok(()) => {
            db::delete_mirror_task(pool, task.id).await?;
            info!(id = task.id, kind = task.kind.as_str(), ref_id = task.ref_id, "mirror task done");
        }
        Err(err) => {
            warn!(
                ?err,
                id = task.id,
                kind = task.kind.as_str(),
                ref_id = task.ref_id,
                attempt = task.attempt,
                "mirror task failed; backoff"
            );
            db::backoff_mirror_task(pool, task.id, task.attempt, max_backoff_secs).await?;
        }
    }
    Ok(true)
}

/// Drain the mirror outbox forever, sleeping `poll` when idle.
pub async fn run_worker(pool: Pool, mirror: Box<dyn SheetMirror>, poll: Duration, max_backoff_secs: i64) {
    loop {
        match process_next_task(&pool, mirror.as_ref(), max_backoff_secs).await {
            Ok(true) => {}
            Ok(false) => tokio::time::sleep(poll).await,
            Err(err) => {
                error!(?err, "mirror worker error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}
