mod common;

use celebcheck::db;
use celebcheck::model::NewPendingRequest;
use celebcheck::moderation::{Actor, ModerationAction, Resolution};
use common::{workflow, RecordingMessenger, ADMIN};
use std::sync::Arc;

async fn file_pool(dir: &tempfile::TempDir) -> db::Pool {
    let url = format!("sqlite://{}", dir.path().join("race.db").display());
    let pool = db::init_pool(&url, 4).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

fn request() -> NewPendingRequest {
    NewPendingRequest {
        user_id: 42,
        chat_id: 42,
        message_id: 7,
        prompt_message_id: Some(8),
        name: "Jhon Doe".into(),
        category: "beauty".into(),
        region: "italy".into(),
        username: None,
    }
}

#[tokio::test]
async fn dequeue_returns_record_once() {
    let dir = tempfile::tempdir().unwrap();
    let pool = file_pool(&dir).await;
    let id = db::enqueue_request(&pool, &request()).await.unwrap();

    let first = db::dequeue_request(&pool, id).await.unwrap();
    assert_eq!(first.map(|r| r.id), Some(id));
    assert!(db::dequeue_request(&pool, id).await.unwrap().is_none());
    assert!(db::dequeue_request(&pool, id).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_dequeues_have_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let pool = file_pool(&dir).await;
    let id = db::enqueue_request(&pool, &request()).await.unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { db::dequeue_request(&pool, id).await.unwrap() })
        })
        .collect();
    let mut winners = 0;
    for h in handles {
        if h.await.unwrap().is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_ban_and_approve_write_once() {
    let dir = tempfile::tempdir().unwrap();
    let pool = file_pool(&dir).await;
    let messenger = Arc::new(RecordingMessenger::default());
    let wf = Arc::new(workflow(pool.clone(), messenger));
    let id = db::enqueue_request(&pool, &request()).await.unwrap();

    let admin = Actor {
        chat_id: ADMIN,
        username: None,
        card: None,
    };
    let (ban, approve) = {
        let (wf_a, wf_b) = (wf.clone(), wf.clone());
        let (actor_a, actor_b) = (admin.clone(), admin.clone());
        tokio::join!(
            tokio::spawn(async move { wf_a.resolve(&actor_a, ModerationAction::Ban(id)).await }),
            tokio::spawn(async move {
                wf_b.resolve(&actor_b, ModerationAction::Approve(id)).await
            }),
        )
    };
    let outcomes = [ban.unwrap().unwrap(), approve.unwrap().unwrap()];

    let decided = outcomes
        .iter()
        .filter(|r| matches!(r, Resolution::Decided { .. }))
        .count();
    let handled = outcomes
        .iter()
        .filter(|r| matches!(r, Resolution::AlreadyHandled(x) if *x == id))
        .count();
    assert_eq!((decided, handled), (1, 1));
    assert_eq!(db::list_entries(&pool).await.unwrap().len(), 1);
}
