//! Text normalization and similarity scoring
//!
//! Pure functions underpinning duplicate detection: normalization,
//! content hashing and word-overlap similarity metrics.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

static PUNCTUATION_REGEX: OnceLock<Regex> = OnceLock::new();
static WHITESPACE_REGEX: OnceLock<Regex> = OnceLock::new();
static WORD_REGEX: OnceLock<Regex> = OnceLock::new();

fn punctuation_regex() -> &'static Regex {
    PUNCTUATION_REGEX.get_or_init(|| Regex::new(r"[^\w\s]").expect("Failed to compile punctuation regex"))
}

fn whitespace_regex() -> &'static Regex {
    WHITESPACE_REGEX.get_or_init(|| Regex::new(r"\s+").expect("Failed to compile whitespace regex"))
}

fn word_regex() -> &'static Regex {
    WORD_REGEX.get_or_init(|| Regex::new(r"\b\w+\b").expect("Failed to compile word regex"))
}

/// Text normalization configuration
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    /// Convert to lowercase
    pub lowercase: bool,
    /// Strip punctuation (non-word characters)
    pub strip_punctuation: bool,
    /// Collapse whitespace runs to single spaces and trim
    pub collapse_whitespace: bool,
    /// Apply Unicode NFKD normalization
    pub unicode_normalize: bool,
}

impl TextNormalizer {
    pub fn new(
        lowercase: bool,
        strip_punctuation: bool,
        collapse_whitespace: bool,
        unicode_normalize: bool,
    ) -> Self {
        Self {
            lowercase,
            strip_punctuation,
            collapse_whitespace,
            unicode_normalize,
        }
    }

    /// Aggressive normalization preset
    ///
    /// All transformations enabled. Used for content hashing so that texts
    /// differing only by case, punctuation or whitespace hash identically.
    pub fn aggressive() -> Self {
        Self {
            lowercase: true,
            strip_punctuation: true,
            collapse_whitespace: true,
            unicode_normalize: true,
        }
    }

    /// Conservative normalization preset
    ///
    /// Minimal normalization to reduce false duplicate matches.
    pub fn conservative() -> Self {
        Self {
            lowercase: true,
            strip_punctuation: false,
            collapse_whitespace: true,
            unicode_normalize: false,
        }
    }

    /// Balanced normalization preset (default)
    pub fn balanced() -> Self {
        Self {
            lowercase: true,
            strip_punctuation: true,
            collapse_whitespace: true,
            unicode_normalize: false,
        }
    }

    /// Normalize text according to configuration.
    ///
    /// Applies transformations in order: Unicode NFKD, lowercase,
    /// punctuation removal, whitespace collapse. Empty input yields empty
    /// output without error.
    pub fn normalize(&self, text: &str) -> String {
        let mut result = text.to_string();

        if self.unicode_normalize {
            result = result.nfkd().collect::<String>();
        }

        if self.lowercase {
            result = result.to_lowercase();
        }

        if self.strip_punctuation {
            result = punctuation_regex().replace_all(&result, "").to_string();
        }

        if self.collapse_whitespace {
            result = whitespace_regex().replace_all(&result, " ").trim().to_string();
        }

        result
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::balanced()
    }
}

/// Normalize text with explicit case/punctuation switches.
///
/// Lower-cases unless `case_sensitive`, strips punctuation unless disabled,
/// always collapses whitespace runs and trims.
pub fn normalize(text: &str, case_sensitive: bool, strip_punctuation: bool) -> String {
    TextNormalizer::new(!case_sensitive, strip_punctuation, true, false).normalize(text)
}

/// Extract lowercase words from text
pub fn extract_words(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    word_regex()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Hash of the aggressively normalized text.
///
/// Two texts differing only by case, punctuation or whitespace hash
/// identically; this is the exact-duplicate bucket key.
pub fn content_hash(text: &str) -> u64 {
    let normalized = TextNormalizer::aggressive().normalize(text);
    seahash::hash(normalized.as_bytes())
}

/// Exact match similarity: 1.0 or 0.0
pub fn exact_match(a: &str, b: &str, case_sensitive: bool) -> f64 {
    let equal = if case_sensitive {
        a == b
    } else {
        a.to_lowercase() == b.to_lowercase()
    };
    if equal {
        1.0
    } else {
        0.0
    }
}

/// Jaccard similarity over word sets.
///
/// Both-empty inputs are textually identical "nothing" and score 1.0;
/// one-empty scores 0.0.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let words_a: HashSet<String> = extract_words(a).into_iter().collect();
    let words_b: HashSet<String> = extract_words(b).into_iter().collect();

    if words_a.is_empty() && words_b.is_empty() {
        return 1.0;
    }
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();

    intersection as f64 / union as f64
}

/// Cosine similarity over term-frequency vectors of the union vocabulary.
///
/// Zero-norm vs zero-norm scores 1.0; a single zero-norm side scores 0.0.
pub fn cosine(a: &str, b: &str) -> f64 {
    let words_a = extract_words(a);
    let words_b = extract_words(b);

    let mut counts_a: HashMap<&str, usize> = HashMap::new();
    for word in &words_a {
        *counts_a.entry(word.as_str()).or_insert(0) += 1;
    }
    let mut counts_b: HashMap<&str, usize> = HashMap::new();
    for word in &words_b {
        *counts_b.entry(word.as_str()).or_insert(0) += 1;
    }

    let vocabulary: HashSet<&str> = counts_a.keys().chain(counts_b.keys()).copied().collect();
    if vocabulary.is_empty() {
        return 1.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for word in vocabulary {
        let fa = *counts_a.get(word).unwrap_or(&0) as f64;
        let fb = *counts_b.get(word).unwrap_or(&0) as f64;
        dot += fa * fb;
        norm_a += fa * fa;
        norm_b += fb * fb;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return if norm_a == norm_b { 1.0 } else { 0.0 };
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercase_and_punctuation() {
        assert_eq!(normalize("Hello, World!", false, true), "hello world");
    }

    #[test]
    fn test_normalize_case_sensitive() {
        assert_eq!(normalize("Hello  World", true, false), "Hello World");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize("", false, true), "");
    }

    #[test]
    fn test_normalizer_presets() {
        let aggressive = TextNormalizer::aggressive();
        assert_eq!(aggressive.normalize("  Hello,   WORLD!  "), "hello world");

        let conservative = TextNormalizer::conservative();
        assert_eq!(conservative.normalize("Hello,  World!"), "hello, world!");
    }

    #[test]
    fn test_unicode_normalization() {
        let normalizer = TextNormalizer::new(false, false, false, true);
        // é decomposes to e + combining accent under NFKD
        assert_ne!(normalizer.normalize("café"), "café");
    }

    #[test]
    fn test_content_hash_is_normalization_robust() {
        assert_eq!(content_hash("Hello, World!"), content_hash("hello   world"));
        assert_ne!(content_hash("hello world"), content_hash("goodbye world"));
    }

    #[test]
    fn test_exact_match() {
        assert_eq!(exact_match("Hello", "hello", false), 1.0);
        assert_eq!(exact_match("Hello", "hello", true), 0.0);
        assert_eq!(exact_match("a", "b", false), 0.0);
    }

    #[test]
    fn test_jaccard_overlap() {
        let sim = jaccard("the quick brown fox", "the quick red fox");
        // intersection {the, quick, fox} = 3, union = 5
        assert!((sim - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_jaccard_empty_edge_cases() {
        assert_eq!(jaccard("", ""), 1.0);
        assert_eq!(jaccard("hello", ""), 0.0);
        assert_eq!(jaccard("", "hello"), 0.0);
    }

    #[test]
    fn test_cosine_identical() {
        assert!((cosine("a b c", "a b c") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_disjoint() {
        assert_eq!(cosine("a b", "c d"), 0.0);
    }

    #[test]
    fn test_cosine_empty_edge_cases() {
        assert_eq!(cosine("", ""), 1.0);
        assert_eq!(cosine("hello", ""), 0.0);
    }

    #[test]
    fn test_cosine_bounds() {
        let sim = cosine("a a b", "a b b");
        assert!(sim > 0.0 && sim < 1.0);
    }

    #[test]
    fn test_extract_words() {
        assert_eq!(extract_words("Hello, World!"), vec!["hello", "world"]);
        assert!(extract_words("").is_empty());
    }
}
