//! Exact and near-duplicate detection for record pools
//!
//! Exact duplicates are found by grouping on the normalized content hash;
//! the first record in input order survives each group. An optional second
//! pass compares the exact-duplicate survivors pairwise with Jaccard or
//! cosine similarity to catch near duplicates.
//!
//! Grouping and survivor selection depend only on input order and content,
//! never on map iteration order, so repeated runs over the same input are
//! byte-for-byte identical.

use crate::text;
use crate::{Error, Result};
use ahash::{AHashMap, AHashSet};
use datacurate_formats::Record;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Similarity metric used for a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    ExactMatch,
    Jaccard,
    Cosine,
    ContentHash,
}

/// Kind of duplicate detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateType {
    Exact,
    Near,
}

/// Result of one duplicate finding between a survivor and a removed record
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityResult {
    pub survivor_id: String,
    pub duplicate_id: String,
    pub score: f64,
    pub metric: SimilarityMetric,
    pub duplicate_type: DuplicateType,
}

/// Configuration for deduplication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Records shorter than this bypass dedup entirely (0 = disabled)
    pub min_content_length: usize,
    /// Run the pairwise near-duplicate pass over exact survivors
    pub enable_near_duplicates: bool,
    /// Similarity threshold for the near-duplicate pass
    pub near_duplicate_threshold: f64,
    /// Metric for the near-duplicate pass (Jaccard or Cosine)
    pub near_metric: SimilarityMetric,
    /// Upper bound on survivors entering the pairwise pass
    pub max_items_to_compare: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            min_content_length: 0,
            enable_near_duplicates: false,
            near_duplicate_threshold: 0.95,
            near_metric: SimilarityMetric::Jaccard,
            max_items_to_compare: 10_000,
        }
    }
}

impl DedupConfig {
    /// Strict preset: aggressive near-duplicate removal
    pub fn strict() -> Self {
        Self {
            enable_near_duplicates: true,
            near_duplicate_threshold: 0.85,
            ..Self::default()
        }
    }

    /// Lenient preset: only very close texts count as near duplicates
    pub fn lenient() -> Self {
        Self {
            enable_near_duplicates: true,
            near_duplicate_threshold: 0.98,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.near_duplicate_threshold) {
            return Err(Error::InvalidConfig(format!(
                "near_duplicate_threshold must be in [0, 1], got {}",
                self.near_duplicate_threshold
            )));
        }
        match self.near_metric {
            SimilarityMetric::Jaccard | SimilarityMetric::Cosine => Ok(()),
            other => Err(Error::InvalidConfig(format!(
                "near_metric must be jaccard or cosine, got {other:?}"
            ))),
        }
    }
}

/// Result of a deduplication run
#[derive(Debug, Clone, Serialize)]
pub struct DedupResult {
    /// Surviving records, original input order preserved
    #[serde(skip)]
    pub unique: Vec<Record>,
    pub duplicate_pairs: Vec<SimilarityResult>,
    /// Groups of ids (survivor first) that shared a content hash
    pub duplicate_groups: Vec<Vec<String>>,
    pub removed_ids: Vec<String>,
    pub original_count: usize,
    pub unique_count: usize,
    /// Records that bypassed dedup due to the minimum-length predicate
    pub skipped_short: usize,
}

impl DedupResult {
    /// Fraction of the input removed as duplicates
    pub fn dedup_rate(&self) -> f64 {
        if self.original_count == 0 {
            0.0
        } else {
            self.removed_ids.len() as f64 / self.original_count as f64
        }
    }
}

/// Deduplicator over in-memory record pools
pub struct Deduplicator {
    config: DedupConfig,
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Deduplicate a record pool.
    ///
    /// Records below the minimum-length predicate pass through unchanged.
    /// Empty content is not excluded: all empty-content records form one
    /// exact-duplicate group, surfacing the duplication as a single finding.
    pub fn deduplicate(&self, records: &[Record]) -> DedupResult {
        info!("Starting deduplication of {} records", records.len());

        let mut skipped_short = 0;
        let eligible: Vec<usize> = records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| {
                if self.config.min_content_length > 0
                    && r.content.len() < self.config.min_content_length
                {
                    skipped_short += 1;
                    None
                } else {
                    Some(i)
                }
            })
            .collect();

        // Exact pass: group by normalized content hash, in input order
        let mut groups: AHashMap<u64, Vec<usize>> = AHashMap::new();
        let mut hash_order: Vec<u64> = Vec::new();
        for &i in &eligible {
            let hash = text::content_hash(&records[i].content);
            let group = groups.entry(hash).or_insert_with(|| {
                hash_order.push(hash);
                Vec::new()
            });
            group.push(i);
        }

        let mut removed: AHashSet<usize> = AHashSet::new();
        let mut duplicate_pairs = Vec::new();
        let mut duplicate_groups = Vec::new();

        for hash in &hash_order {
            let group = &groups[hash];
            if group.len() > 1 {
                let survivor = group[0];
                duplicate_groups.push(group.iter().map(|&i| records[i].id.clone()).collect());
                for &other in &group[1..] {
                    removed.insert(other);
                    duplicate_pairs.push(SimilarityResult {
                        survivor_id: records[survivor].id.clone(),
                        duplicate_id: records[other].id.clone(),
                        score: 1.0,
                        metric: SimilarityMetric::ContentHash,
                        duplicate_type: DuplicateType::Exact,
                    });
                }
            }
        }

        // Optional near-duplicate pass over the exact survivors
        if self.config.enable_near_duplicates {
            let survivors: Vec<usize> = eligible
                .iter()
                .copied()
                .filter(|i| !removed.contains(i))
                .collect();
            self.near_duplicate_pass(records, &survivors, &mut removed, &mut duplicate_pairs);
        }

        let removed_ids: Vec<String> = records
            .iter()
            .enumerate()
            .filter(|(i, _)| removed.contains(i))
            .map(|(_, r)| r.id.clone())
            .collect();

        let unique: Vec<Record> = records
            .iter()
            .enumerate()
            .filter(|(i, _)| !removed.contains(i))
            .map(|(_, r)| r.clone())
            .collect();

        info!(
            "Deduplication completed: {} -> {} ({} removed)",
            records.len(),
            unique.len(),
            removed_ids.len()
        );

        DedupResult {
            unique_count: unique.len(),
            unique,
            duplicate_pairs,
            duplicate_groups,
            removed_ids,
            original_count: records.len(),
            skipped_short,
        }
    }

    /// Pairwise similarity over survivors.
    ///
    /// Comparisons run in parallel; matches are sorted by index pair before
    /// survivor selection so the outcome does not depend on scheduling.
    fn near_duplicate_pass(
        &self,
        records: &[Record],
        survivors: &[usize],
        removed: &mut AHashSet<usize>,
        duplicate_pairs: &mut Vec<SimilarityResult>,
    ) {
        let candidates = if survivors.len() > self.config.max_items_to_compare {
            warn!(
                "Near-duplicate pass capped at {} of {} survivors",
                self.config.max_items_to_compare,
                survivors.len()
            );
            &survivors[..self.config.max_items_to_compare]
        } else {
            survivors
        };

        let threshold = self.config.near_duplicate_threshold;
        let metric = self.config.near_metric;

        let mut pairs: Vec<(usize, usize)> = Vec::new();
        for a in 0..candidates.len() {
            for b in (a + 1)..candidates.len() {
                pairs.push((candidates[a], candidates[b]));
            }
        }
        debug!("Comparing {} survivor pairs for near duplicates", pairs.len());

        let mut matches: Vec<(usize, usize, f64)> = pairs
            .into_par_iter()
            .filter_map(|(i, j)| {
                let score = match metric {
                    SimilarityMetric::Cosine => text::cosine(&records[i].content, &records[j].content),
                    _ => text::jaccard(&records[i].content, &records[j].content),
                };
                if score >= threshold {
                    Some((i, j, score))
                } else {
                    None
                }
            })
            .collect();

        matches.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        for (i, j, score) in matches {
            if removed.contains(&i) || removed.contains(&j) {
                continue;
            }
            removed.insert(j);
            duplicate_pairs.push(SimilarityResult {
                survivor_id: records[i].id.clone(),
                duplicate_id: records[j].id.clone(),
                score,
                metric,
                duplicate_type: DuplicateType::Near,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, content: &str) -> Record {
        Record::new(id, content, "cat")
    }

    #[test]
    fn test_exact_duplicates_first_survives() {
        let dedup = Deduplicator::new(DedupConfig::default()).unwrap();
        let records = vec![
            record("a", "hello world"),
            record("b", "Hello, World!"), // same after normalization
            record("c", "something else"),
        ];

        let result = dedup.deduplicate(&records);
        assert_eq!(result.unique_count, 2);
        assert_eq!(result.removed_ids, vec!["b"]);
        assert_eq!(result.duplicate_groups, vec![vec!["a", "b"]]);
        assert_eq!(result.duplicate_pairs.len(), 1);
        assert_eq!(result.duplicate_pairs[0].survivor_id, "a");
        assert_eq!(result.duplicate_pairs[0].metric, SimilarityMetric::ContentHash);
    }

    #[test]
    fn test_empty_content_groups_together() {
        let dedup = Deduplicator::new(DedupConfig::default()).unwrap();
        let records = vec![record("a", ""), record("b", "text"), record("c", "")];

        let result = dedup.deduplicate(&records);
        assert_eq!(result.removed_ids, vec!["c"]);
        assert_eq!(result.duplicate_groups, vec![vec!["a", "c"]]);
    }

    #[test]
    fn test_short_records_bypass_grouping() {
        let config = DedupConfig {
            min_content_length: 5,
            ..DedupConfig::default()
        };
        let dedup = Deduplicator::new(config).unwrap();
        let records = vec![record("a", "hi"), record("b", "hi"), record("c", "long enough")];

        let result = dedup.deduplicate(&records);
        // Both short records pass through unchanged
        assert_eq!(result.unique_count, 3);
        assert_eq!(result.skipped_short, 2);
        assert!(result.removed_ids.is_empty());
    }

    #[test]
    fn test_idempotence() {
        let dedup = Deduplicator::new(DedupConfig::default()).unwrap();
        let records = vec![
            record("a", "one two three"),
            record("b", "one two three"),
            record("c", "four five six"),
        ];

        let first = dedup.deduplicate(&records);
        let second = dedup.deduplicate(&first.unique);
        assert!(second.removed_ids.is_empty());
        assert_eq!(second.unique_count, first.unique_count);
    }

    #[test]
    fn test_determinism_across_runs() {
        let dedup = Deduplicator::new(DedupConfig::strict()).unwrap();
        let records: Vec<Record> = (0..50)
            .map(|i| record(&format!("r{i}"), &format!("sample text number {}", i % 10)))
            .collect();

        let a = dedup.deduplicate(&records);
        let b = dedup.deduplicate(&records);
        let ids_a: Vec<&str> = a.unique.iter().map(|r| r.id.as_str()).collect();
        let ids_b: Vec<&str> = b.unique.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
        assert_eq!(a.removed_ids, b.removed_ids);
    }

    #[test]
    fn test_near_duplicate_pass() {
        let config = DedupConfig {
            enable_near_duplicates: true,
            near_duplicate_threshold: 0.75,
            ..DedupConfig::default()
        };
        let dedup = Deduplicator::new(config).unwrap();
        let records = vec![
            record("a", "the quick brown fox jumps over the lazy dog"),
            record("b", "the quick brown fox jumps over the lazy cat"),
            record("c", "completely unrelated content here"),
        ];

        let result = dedup.deduplicate(&records);
        assert_eq!(result.removed_ids, vec!["b"]);
        let near = &result.duplicate_pairs[0];
        assert_eq!(near.duplicate_type, DuplicateType::Near);
        assert_eq!(near.survivor_id, "a");
        assert!(near.score >= 0.75);
    }

    #[test]
    fn test_dedup_rate() {
        let dedup = Deduplicator::new(DedupConfig::default()).unwrap();
        let records = vec![record("a", "x y z"), record("b", "x y z"), record("c", "p q r"), record("d", "m n o")];
        let result = dedup.deduplicate(&records);
        assert!((result.dedup_rate() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DedupConfig {
            near_duplicate_threshold: 1.5,
            ..DedupConfig::default()
        };
        assert!(Deduplicator::new(config).is_err());

        let config = DedupConfig {
            near_metric: SimilarityMetric::ContentHash,
            ..DedupConfig::default()
        };
        assert!(Deduplicator::new(config).is_err());
    }
}
