//! Case and diacritic insensitive fuzzy lookups over named catalog entries.

use std::sync::Arc;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Similarity cutoff used against a full catalog.
pub const CATALOG_CUTOFF: f64 = 85.0;

/// Similarity cutoff used against narrow, curated subsets such as a species' ability pool.
pub const SUBSET_CUTOFF: f64 = 60.0;

/// Weight applied to substring matches, keeps them below [`CATALOG_CUTOFF`].
const PARTIAL_WEIGHT: f64 = 0.75;

/// A single ranked match, `index` points into the choices handed to [`FuzzyMatcher::extract`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub index: usize,
    pub score: f64,
}

/// Ranks `choices` by similarity to `query`, best first, dropping anything below `cutoff`.
///
/// Scores are on a 0-100 scale.
pub trait FuzzyMatcher: Send + Sync + std::fmt::Debug {
    fn extract(&self, query: &str, choices: &[&str], cutoff: f64) -> Vec<Match>;

    fn best(&self, query: &str, choices: &[&str], cutoff: f64) -> Option<usize> {
        self.extract(query, choices, cutoff)
            .first()
            .map(|m| m.index)
    }
}

/// Default matcher: NFKD folding, then the best of a plain ratio, a
/// token-sorted ratio and a down-weighted substring ratio.
#[derive(Debug, Default, Clone, Copy)]
pub struct NormalizedMatcher;

impl FuzzyMatcher for NormalizedMatcher {
    fn extract(&self, query: &str, choices: &[&str], cutoff: f64) -> Vec<Match> {
        let query = fold(query);
        if query.is_empty() {
            return Vec::new();
        }
        let sorted_query = token_sort(&query);

        let mut matches: Vec<Match> = choices
            .iter()
            .enumerate()
            .filter_map(|(index, choice)| {
                let choice = fold(choice);
                let plain = strsim::normalized_levenshtein(&query, &choice);
                let sorted = strsim::normalized_levenshtein(&sorted_query, &token_sort(&choice));
                let partial = partial_ratio(&query, &choice) * PARTIAL_WEIGHT;
                let score = plain.max(sorted).max(partial) * 100.0;
                (score >= cutoff).then_some(Match { index, score })
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.index.cmp(&b.index)));
        matches
    }
}

pub fn default_matcher() -> Arc<dyn FuzzyMatcher> {
    Arc::new(NormalizedMatcher)
}

/// Lowercase, strip accents, and collapse everything that is not alphanumeric into single spaces.
pub fn fold(text: &str) -> String {
    let stripped: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Best ratio of the shorter string against every equally long window of the
/// longer one. Only kicks in when the lengths differ noticeably.
fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let short_len = short.chars().count();
    let long_chars: Vec<char> = long.chars().collect();
    if short_len == 0 || (long_chars.len() as f64) < short_len as f64 * 1.5 {
        return 0.0;
    }

    long_chars
        .windows(short_len)
        .map(|window| {
            let window: String = window.iter().collect();
            strsim::normalized_levenshtein(short, &window)
        })
        .fold(0.0, f64::max)
}

fn token_sort(text: &str) -> String {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_strips_accents_and_case() {
        assert_eq!(fold("Flabébé"), "flabebe");
        assert_eq!(fold("  Mr.  Mime "), "mr mime");
    }

    #[test]
    fn test_exact_and_typo_matches() {
        let choices = ["Pikachu", "Raichu", "Pichu"];
        let matcher = NormalizedMatcher;

        assert_eq!(matcher.best("pikachu", &choices, CATALOG_CUTOFF), Some(0));
        assert_eq!(matcher.best("Pikachuu", &choices, CATALOG_CUTOFF), Some(0));
        assert_eq!(matcher.best("Bulbasaur", &choices, CATALOG_CUTOFF), None);
    }

    #[test]
    fn test_token_order_is_ignored() {
        let choices = ["Mega Charizard X"];
        let matcher = NormalizedMatcher;
        assert_eq!(matcher.best("charizard mega x", &choices, CATALOG_CUTOFF), Some(0));
    }

    #[test]
    fn test_subset_cutoff_is_more_lenient() {
        let choices = ["Static", "Lightning Rod"];
        let matcher = NormalizedMatcher;
        assert_eq!(matcher.best("lightnin", &choices, CATALOG_CUTOFF), None);
        assert_eq!(matcher.best("lightnin", &choices, SUBSET_CUTOFF), Some(1));
    }

    #[test]
    fn test_empty_query_never_matches() {
        let matcher = NormalizedMatcher;
        assert!(matcher.extract("  ", &["Static"], 0.0).is_empty());
    }
}
