//! Maps free-text categories and regions onto their canonical keys.

use std::collections::HashMap;

use crate::config::Synonyms;
use crate::model::UNIVERSAL_CATEGORY;

#[derive(Debug, Clone, Default)]
pub struct SynonymResolver {
    categories: HashMap<String, String>,
    regions: HashMap<String, String>,
}

impl SynonymResolver {
    pub fn from_config(synonyms: &Synonyms) -> Self {
        let mut categories = index(&synonyms.categories);
        categories
            .entry(UNIVERSAL_CATEGORY.to_string())
            .or_insert_with(|| UNIVERSAL_CATEGORY.to_string());
        Self {
            categories,
            regions: index(&synonyms.regions),
        }
    }

    pub fn category(&self, input: &str) -> Option<&str> {
        self.categories.get(&fold(input)).map(String::as_str)
    }

    pub fn region(&self, input: &str) -> Option<&str> {
        self.regions.get(&fold(input)).map(String::as_str)
    }

    /// Canonical category keys, sorted, without the universal sentinel.
    pub fn category_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .categories
            .values()
            .map(String::as_str)
            .filter(|k| *k != UNIVERSAL_CATEGORY)
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    pub fn region_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.regions.values().map(String::as_str).collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }
}

fn index<'a, I>(table: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (&'a String, &'a Vec<String>)>,
{
    let mut map = HashMap::new();
    for (canonical, aliases) in table {
        let key = fold(canonical);
        for alias in aliases {
            map.insert(fold(alias), key.clone());
        }
        map.insert(key.clone(), key);
    }
    map
}

fn fold(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
