//! Name normalization used for both storage and lookup.
//!
//! Every catalog name is kept in two search forms: a Cyrillic form
//! (`normalized_name`) and a Latin/ASCII form (`ascii_name`). Queries are
//! folded the same way so that a name typed in either script can hit an
//! entry stored in the other.

use deunicode::deunicode;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s]+").expect("valid punctuation regex"));
static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Latin sequences mapped to Cyrillic, longest first.
const LATIN_TO_CYRILLIC: &[(&str, &str)] = &[
    ("shch", "щ"),
    ("sch", "щ"),
    ("zh", "ж"),
    ("kh", "х"),
    ("ts", "ц"),
    ("ch", "ч"),
    ("sh", "ш"),
    ("yu", "ю"),
    ("ya", "я"),
    ("yo", "е"),
    ("ye", "е"),
    ("th", "т"),
    ("ph", "ф"),
    ("a", "а"),
    ("b", "б"),
    ("c", "к"),
    ("d", "д"),
    ("e", "е"),
    ("f", "ф"),
    ("g", "г"),
    ("h", "х"),
    ("i", "и"),
    ("j", "дж"),
    ("k", "к"),
    ("l", "л"),
    ("m", "м"),
    ("n", "н"),
    ("o", "о"),
    ("p", "п"),
    ("q", "к"),
    ("r", "р"),
    ("s", "с"),
    ("t", "т"),
    ("u", "у"),
    ("v", "в"),
    ("w", "в"),
    ("x", "кс"),
    ("y", "и"),
    ("z", "з"),
];

/// Cyrillic search form: lowercase, Latin letters transliterated to
/// Cyrillic, `ё` folded to `е`, everything but letters, digits and single
/// spaces removed.
pub fn normalize_cyrillic(text: &str) -> String {
    let lowered = text.to_lowercase();
    let transliterated = if lowered.chars().any(|c| c.is_ascii_alphabetic()) {
        latin_to_cyrillic(&lowered)
    } else {
        lowered
    };
    clean(&transliterated.replace('ё', "е"))
}

/// ASCII search form: non-ASCII text (Cyrillic included) is transliterated
/// to a Latin approximation, then punctuation is stripped and the result
/// lowercased. Plain ASCII input only gets lowercased and trimmed.
pub fn normalize_ascii(text: &str) -> String {
    if is_plain_ascii(text) {
        return squeeze(&text.to_lowercase());
    }
    clean(&deunicode(text).to_lowercase())
}

fn is_plain_ascii(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_ascii_alphanumeric() || c.is_ascii_whitespace())
}

fn latin_to_cyrillic(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    let mut rest = text;
    'outer: while let Some(c) = rest.chars().next() {
        if c.is_ascii_alphabetic() {
            for (latin, cyrillic) in LATIN_TO_CYRILLIC {
                if rest.starts_with(latin) {
                    out.push_str(cyrillic);
                    rest = &rest[latin.len()..];
                    continue 'outer;
                }
            }
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

fn clean(text: &str) -> String {
    squeeze(&RE_PUNCT.replace_all(text, ""))
}

fn squeeze(text: &str) -> String {
    RE_SPACES.replace_all(text.trim(), " ").into_owned()
}
