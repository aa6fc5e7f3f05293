//! Three-tier celebrity lookup: exact, substring, then trigram similarity.
//!
//! Each tier only runs when the previous one came back empty. Rows filed
//! under the universal category match any requested category; the copy
//! handed back carries the requested category so cards read naturally,
//! while the stored row keeps `all`.

use crate::config::Matching;
use crate::db::{self, Pool};
use crate::model::CatalogEntry;
use crate::normalize::{normalize_ascii, normalize_cyrillic};
use crate::trigram::similarity;
use anyhow::Result;
use std::cmp::Ordering;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Substring,
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    NotFound,
    Exact(CatalogEntry),
    /// Best first. Even a single candidate is ambiguous and must be
    /// confirmed by a human.
    Candidates { tier: Tier, entries: Vec<CatalogEntry> },
}

#[instrument(skip_all, fields(category = %category, region = %region))]
pub async fn find_celebrity(
    pool: &Pool,
    name: &str,
    category: &str,
    region: &str,
    matching: &Matching,
) -> Result<MatchOutcome> {
    let cyrillic = normalize_cyrillic(name);
    let ascii = normalize_ascii(name);
    if cyrillic.is_empty() && ascii.is_empty() {
        return Ok(MatchOutcome::NotFound);
    }
    let category = category.trim().to_lowercase();
    let region = region.trim().to_lowercase();
    // Empty forms are bound as NULL so they never match.
    let cyr = non_empty(&cyrillic);
    let asc = non_empty(&ascii);

    if let Some(entry) = db::exact_match(pool, cyr, asc, &category, &region).await? {
        debug!(id = entry.id, "exact match");
        return Ok(MatchOutcome::Exact(annotate(entry, &category)));
    }

    let found =
        db::substring_matches(pool, cyr, asc, &category, &region, matching.max_candidates).await?;
    if !found.is_empty() {
        debug!(count = found.len(), "substring matches");
        return Ok(candidates(Tier::Substring, found, &category));
    }

    let scoped = db::scoped_entries(pool, &category, &region).await?;
    let ranked = rank_fuzzy(
        scoped,
        &cyrillic,
        &ascii,
        matching.similarity_threshold,
        matching.max_candidates as usize,
    );
    if ranked.is_empty() {
        return Ok(MatchOutcome::NotFound);
    }
    debug!(count = ranked.len(), "fuzzy matches");
    Ok(candidates(Tier::Fuzzy, ranked, &category))
}

/// Keep rows whose best similarity on either search form exceeds
/// `threshold`, best first, ties by id.
pub fn rank_fuzzy(
    entries: Vec<CatalogEntry>,
    cyrillic: &str,
    ascii: &str,
    threshold: f64,
    cap: usize,
) -> Vec<CatalogEntry> {
    let mut scored: Vec<(f64, CatalogEntry)> = entries
        .into_iter()
        .map(|e| {
            let score = similarity(cyrillic, &e.normalized_name).max(similarity(ascii, &e.ascii_name));
            (score, e)
        })
        .filter(|(score, _)| *score > threshold)
        .collect();
    scored.sort_by(|(sa, a), (sb, b)| {
        sb.partial_cmp(sa)
            .unwrap_or(Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });
    scored.into_iter().take(cap).map(|(_, e)| e).collect()
}

fn candidates(tier: Tier, entries: Vec<CatalogEntry>, category: &str) -> MatchOutcome {
    MatchOutcome::Candidates {
        tier,
        entries: entries.into_iter().map(|e| annotate(e, category)).collect(),
    }
}

fn annotate(mut entry: CatalogEntry, category: &str) -> CatalogEntry {
    if entry.is_universal() {
        entry.category = category.to_string();
    }
    entry
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}
