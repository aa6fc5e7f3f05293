//! Word-trigram similarity in the style of PostgreSQL's `pg_trgm`.
//!
//! Each word is padded with two leading spaces and one trailing space before
//! its trigrams are collected, so short words and word starts carry weight.
//! Two trigram sets are scored with the Dice coefficient.

use std::collections::HashSet;

pub fn trigrams(text: &str) -> HashSet<[char; 3]> {
    let mut set = HashSet::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let padded: Vec<char> = "  "
            .chars()
            .chain(word.chars().flat_map(char::to_lowercase))
            .chain(std::iter::once(' '))
            .collect();
        for window in padded.windows(3) {
            set.insert([window[0], window[1], window[2]]);
        }
    }
    set
}

/// Similarity in `[0, 1]`; 1 means identical trigram sets.
pub fn similarity(a: &str, b: &str) -> f64 {
    let ta = trigrams(a);
    let tb = trigrams(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let shared = ta.intersection(&tb).count();
    (2 * shared) as f64 / (ta.len() + tb.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_trigrams_are_padded() {
        let set = trigrams("cat");
        assert_eq!(set.len(), 4);
        assert!(set.contains(&[' ', ' ', 'c']));
        assert!(set.contains(&['a', 't', ' ']));
    }

    #[test]
    fn identical_strings_score_one() {
        assert_eq!(similarity("anna smith", "Anna Smith"), 1.0);
    }

    #[test]
    fn typo_scores_above_default_threshold() {
        let score = similarity("anna smith", "ana smith");
        assert!(score > 0.8, "score was {score}");
    }

    #[test]
    fn unrelated_names_score_low() {
        assert!(similarity("anna smith", "john doe") < 0.2);
    }

    #[test]
    fn empty_input_scores_zero() {
        assert_eq!(similarity("", "anna"), 0.0);
        assert_eq!(similarity("!!!", "anna"), 0.0);
    }

    #[test]
    fn works_on_cyrillic() {
        assert!(similarity("анна смит", "ана смит") > 0.8);
    }
}
