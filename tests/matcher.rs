mod common;

use celebcheck::config::Matching;
use celebcheck::db::{self, Pool};
use celebcheck::matcher::{find_celebrity, MatchOutcome, Tier};
use celebcheck::model::{CatalogEntry, EntryKey, Status};
use common::setup_pool;

async fn add(pool: &Pool, name: &str, category: &str, region: &str) -> CatalogEntry {
    db::insert_entry(
        pool,
        &EntryKey::new(name, category, region),
        Status::Approved,
        None,
    )
    .await
    .unwrap()
}

async fn find(pool: &Pool, name: &str, category: &str, region: &str) -> MatchOutcome {
    find_celebrity(pool, name, category, region, &Matching::default())
        .await
        .unwrap()
}

fn ids(outcome: &MatchOutcome) -> Vec<i64> {
    match outcome {
        MatchOutcome::Candidates { entries, .. } => entries.iter().map(|e| e.id).collect(),
        other => panic!("expected candidates, got {other:?}"),
    }
}

#[tokio::test]
async fn exact_match_wins_over_similar_decoy() {
    let pool = setup_pool().await;
    let decoy = add(&pool, "Anna Smithe", "beauty", "italy").await;
    let exact = add(&pool, "Anna Smith", "beauty", "italy").await;
    assert!(decoy.id < exact.id);

    match find(&pool, "anna smith", "beauty", "italy").await {
        MatchOutcome::Exact(e) => assert_eq!(e.id, exact.id),
        other => panic!("expected exact, got {other:?}"),
    }
}

#[tokio::test]
async fn typo_round_trips_through_fuzzy_tier() {
    let pool = setup_pool().await;
    let entry = add(&pool, "Anna Smith", "beauty", "italy").await;
    add(&pool, "John Doe", "beauty", "italy").await;

    let outcome = find(&pool, "ana smith", "beauty", "italy").await;
    assert!(matches!(outcome, MatchOutcome::Candidates { tier: Tier::Fuzzy, .. }));
    assert_eq!(ids(&outcome), vec![entry.id]);
}

#[tokio::test]
async fn either_script_hits_the_other() {
    let pool = setup_pool().await;
    let cyr = add(&pool, "Анна Смит", "beauty", "italy").await;
    assert_eq!(cyr.ascii_name, "anna smit");

    match find(&pool, "Anna Smit", "beauty", "italy").await {
        MatchOutcome::Exact(e) => assert_eq!(e.id, cyr.id),
        other => panic!("expected exact, got {other:?}"),
    }
}

#[tokio::test]
async fn substring_tier_is_capped_and_ordered() {
    let pool = setup_pool().await;
    let mut expected = Vec::new();
    for name in [
        "john smith",
        "jo smith",
        "jane smith",
        "al smith",
        "bartholomew smith",
        "li smith",
        "mo smith",
    ] {
        expected.push(add(&pool, name, "beauty", "italy").await);
    }

    let outcome = find(&pool, "Smith", "beauty", "italy").await;
    assert!(matches!(outcome, MatchOutcome::Candidates { tier: Tier::Substring, .. }));
    let found = ids(&outcome);
    assert_eq!(found.len(), 5);
    // Shortest search form first, then insertion order.
    let by_name = |n: &str| expected.iter().find(|e| e.name == n).unwrap().id;
    assert_eq!(
        found,
        vec![
            by_name("al smith"),
            by_name("li smith"),
            by_name("mo smith"),
            by_name("jo smith"),
            by_name("john smith"),
        ]
    );
}

#[tokio::test]
async fn cap_is_configurable() {
    let pool = setup_pool().await;
    for name in ["jo smith", "al smith", "li smith"] {
        add(&pool, name, "beauty", "italy").await;
    }
    let matching = Matching {
        max_candidates: 2,
        ..Matching::default()
    };
    let outcome = find_celebrity(&pool, "smith", "beauty", "italy", &matching)
        .await
        .unwrap();
    assert_eq!(ids(&outcome).len(), 2);
}

#[tokio::test]
async fn universal_rows_match_any_category_for_display_only() {
    let pool = setup_pool().await;
    let stored = add(&pool, "X Star", "all", "italy").await;

    match find(&pool, "x star", "Finance", "Italy").await {
        MatchOutcome::Exact(e) => {
            assert_eq!(e.id, stored.id);
            assert_eq!(e.category, "finance");
        }
        other => panic!("expected exact, got {other:?}"),
    }
    let row = db::get_entry(&pool, stored.id).await.unwrap().unwrap();
    assert_eq!(row.category, "all");

    let outcome = find(&pool, "star", "health", "italy").await;
    let MatchOutcome::Candidates { entries, .. } = outcome else {
        panic!("expected candidates");
    };
    assert_eq!(entries[0].category, "health");
}

#[tokio::test]
async fn concrete_category_beats_universal_on_exact() {
    let pool = setup_pool().await;
    add(&pool, "X Star", "all", "italy").await;
    let concrete = add(&pool, "X Star", "beauty", "italy").await;
    match find(&pool, "X Star", "beauty", "italy").await {
        MatchOutcome::Exact(e) => assert_eq!(e.id, concrete.id),
        other => panic!("expected exact, got {other:?}"),
    }
}

#[tokio::test]
async fn scope_and_empty_queries_miss() {
    let pool = setup_pool().await;
    add(&pool, "Anna Smith", "beauty", "italy").await;

    assert_eq!(find(&pool, "anna smith", "beauty", "spain").await, MatchOutcome::NotFound);
    assert_eq!(find(&pool, "anna smith", "health", "italy").await, MatchOutcome::NotFound);
    assert_eq!(find(&pool, "!!!", "beauty", "italy").await, MatchOutcome::NotFound);
    assert_eq!(find(&pool, "zebediah", "beauty", "italy").await, MatchOutcome::NotFound);
}
