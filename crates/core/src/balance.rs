//! Category ratio balancing
//!
//! Adjusts a record pool so per-category proportions match configured
//! targets within a tolerance. Over-represented categories shed their
//! lowest-quality records first; under-represented categories grow by
//! duplicating their highest-quality records under derived ids, capped per
//! original. Content is never invented.

use crate::{Error, Result};
use ahash::AHashMap;
use datacurate_formats::Record;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Configuration for ratio balancing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceConfig {
    /// Target ratio per category; must sum to 1.0
    pub target_ratios: BTreeMap<String, f64>,
    /// Maximum allowed |target - actual| per category
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Floor below which trimming never shrinks a category
    pub min_items_per_category: usize,
    /// Maximum clones derived from one original record
    pub max_duplication_factor: usize,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            target_ratios: BTreeMap::new(),
            tolerance: 0.05,
            max_iterations: 10,
            min_items_per_category: 0,
            max_duplication_factor: 2,
        }
    }
}

impl BalanceConfig {
    pub fn with_targets(targets: &[(&str, f64)]) -> Self {
        Self {
            target_ratios: targets
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_ratios.is_empty() {
            return Err(Error::InvalidConfig("no target ratios configured".into()));
        }
        let sum: f64 = self.target_ratios.values().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(Error::InvalidConfig(format!(
                "target ratios must sum to 1.0, got {sum}"
            )));
        }
        for (category, ratio) in &self.target_ratios {
            if !(0.0..=1.0).contains(ratio) {
                return Err(Error::InvalidConfig(format!(
                    "target ratio for '{category}' is {ratio}, outside [0, 1]"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.tolerance) {
            return Err(Error::InvalidConfig(format!(
                "tolerance {} outside [0, 1]",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidConfig("max_iterations must be at least 1".into()));
        }
        Ok(())
    }
}

/// Ratio comparison for one balancing pass; recomputed fresh, never updated
/// incrementally.
#[derive(Debug, Clone, Serialize)]
pub struct BalancedDatasetReport {
    pub target_ratios: BTreeMap<String, f64>,
    pub actual_ratios: BTreeMap<String, f64>,
    pub per_category_deviation: BTreeMap<String, f64>,
    pub max_deviation: f64,
    pub within_tolerance: bool,
}

/// Result of a balancing run
#[derive(Debug, Clone, Serialize)]
pub struct BalanceResult {
    #[serde(skip)]
    pub records: Vec<Record>,
    pub report: BalancedDatasetReport,
    /// Ids of clones introduced to grow under-represented categories
    pub added_ids: Vec<String>,
    pub removed_ids: Vec<String>,
    pub iterations: usize,
    /// Infeasibilities hit during balancing (floor vs zero target, clone cap)
    pub conflicts: Vec<String>,
}

/// Quality-weighted ratio balancer
pub struct RatioBalancer {
    config: BalanceConfig,
}

impl RatioBalancer {
    pub fn new(config: BalanceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Compute the ratio report for a pool without modifying it.
    ///
    /// Categories present in the pool but absent from the targets are
    /// treated as target 0; the `"unknown"` label participates like any
    /// other.
    pub fn compute_report(&self, records: &[Record]) -> BalancedDatasetReport {
        let total = records.len();
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for record in records {
            *counts.entry(record.category.clone()).or_insert(0) += 1;
        }

        let mut actual_ratios = BTreeMap::new();
        for (category, count) in &counts {
            let ratio = if total == 0 {
                0.0
            } else {
                *count as f64 / total as f64
            };
            actual_ratios.insert(category.clone(), ratio);
        }

        let mut categories: Vec<String> = self.config.target_ratios.keys().cloned().collect();
        for category in counts.keys() {
            if !self.config.target_ratios.contains_key(category) {
                categories.push(category.clone());
            }
        }

        let mut per_category_deviation = BTreeMap::new();
        let mut max_deviation: f64 = 0.0;
        for category in categories {
            let target = self.config.target_ratios.get(&category).copied().unwrap_or(0.0);
            let actual = actual_ratios.get(&category).copied().unwrap_or(0.0);
            let deviation = (target - actual).abs();
            max_deviation = max_deviation.max(deviation);
            per_category_deviation.insert(category, deviation);
        }

        BalancedDatasetReport {
            target_ratios: self.config.target_ratios.clone(),
            actual_ratios,
            per_category_deviation,
            within_tolerance: max_deviation <= self.config.tolerance,
            max_deviation,
        }
    }

    /// Balance a pool toward the target ratios.
    ///
    /// Iterates up to `max_iterations`; if targets are infeasible given the
    /// size floor or clone cap, the best achieved state is returned with
    /// `within_tolerance = false` and the conflicts listed.
    pub fn balance(&self, records: &[Record]) -> BalanceResult {
        let mut pool: Vec<Record> = records.to_vec();
        let mut added_ids = Vec::new();
        let mut removed_ids = Vec::new();
        let mut conflicts = Vec::new();
        // Clones produced per original id, across all iterations
        let mut clone_counts: AHashMap<String, usize> = AHashMap::new();
        let mut iterations = 0;

        info!(
            "Balancing {} records toward {} target categories",
            pool.len(),
            self.config.target_ratios.len()
        );

        for iteration in 1..=self.config.max_iterations {
            let report = self.compute_report(&pool);
            if report.within_tolerance {
                break;
            }
            iterations = iteration;

            let total = pool.len();
            let mut changed = false;

            // Shrink over-represented categories first so growth targets are
            // computed against a smaller pool.
            let categories: Vec<String> = report.per_category_deviation.keys().cloned().collect();
            for category in &categories {
                let target = self.config.target_ratios.get(category).copied().unwrap_or(0.0);
                let desired = (target * total as f64).round() as usize;
                let count = pool.iter().filter(|r| r.category == *category).count();

                if count > desired {
                    let floor = self.config.min_items_per_category;
                    let keep = desired.max(floor);
                    if desired < floor && iteration == 1 {
                        conflicts.push(format!(
                            "category '{category}' target {desired} below floor {floor}; kept at floor"
                        ));
                    }
                    if count > keep {
                        let dropped = self.trim_category(&mut pool, category, count - keep);
                        removed_ids.extend(dropped);
                        changed = true;
                    }
                }
            }

            let total = pool.len();
            for category in &categories {
                let target = self.config.target_ratios.get(category).copied().unwrap_or(0.0);
                let desired = (target * total as f64).round() as usize;
                let count = pool.iter().filter(|r| r.category == *category).count();

                if count < desired {
                    let (clones, capped) =
                        self.grow_category(&pool, category, desired - count, &mut clone_counts);
                    if capped && iteration == self.config.max_iterations {
                        conflicts.push(format!(
                            "category '{category}' duplication cap reached before target"
                        ));
                    }
                    if !clones.is_empty() {
                        added_ids.extend(clones.iter().map(|r| r.id.clone()));
                        pool.extend(clones);
                        changed = true;
                    }
                }
            }

            if !changed {
                // Floors and caps block every remaining move; looping further
                // cannot improve the deviation.
                warn!("Balancing stalled at iteration {iteration}");
                break;
            }
            debug!("Iteration {iteration}: pool size now {}", pool.len());
        }

        let report = self.compute_report(&pool);
        info!(
            "Balancing finished after {} iteration(s): max deviation {:.3}, within tolerance: {}",
            iterations, report.max_deviation, report.within_tolerance
        );

        BalanceResult {
            records: pool,
            report,
            added_ids,
            removed_ids,
            iterations,
            conflicts,
        }
    }

    /// Drop the `n` lowest-quality records of a category.
    ///
    /// Missing quality scores sort below any real score. Ties drop the
    /// later-positioned record so reruns are deterministic.
    fn trim_category(&self, pool: &mut Vec<Record>, category: &str, n: usize) -> Vec<String> {
        let mut candidates: Vec<(usize, f64)> = pool
            .iter()
            .enumerate()
            .filter(|(_, r)| r.category == category)
            .map(|(i, r)| (i, r.quality_score().unwrap_or(-1.0)))
            .collect();

        candidates.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.0.cmp(&a.0))
        });

        let mut drop_indices: Vec<usize> = candidates.into_iter().take(n).map(|(i, _)| i).collect();
        drop_indices.sort_unstable_by(|a, b| b.cmp(a));

        let mut dropped = Vec::with_capacity(drop_indices.len());
        for index in drop_indices {
            dropped.push(pool.remove(index).id);
        }
        dropped.reverse();
        dropped
    }

    /// Clone up to `n` of the highest-quality records of a category.
    ///
    /// Clone ids derive from the original (`{id}_dup{k}`) so provenance is
    /// never lost. Returns the clones and whether the per-original cap
    /// blocked further growth.
    fn grow_category(
        &self,
        pool: &[Record],
        category: &str,
        n: usize,
        clone_counts: &mut AHashMap<String, usize>,
    ) -> (Vec<Record>, bool) {
        let mut candidates: Vec<(usize, f64)> = pool
            .iter()
            .enumerate()
            .filter(|(_, r)| r.category == category && !clone_counts.contains_key(&r.id))
            .filter(|(_, r)| !r.id.contains("_dup"))
            .map(|(i, r)| (i, r.quality_score().unwrap_or(0.0)))
            .collect();
        // Highest quality first; ties prefer the earlier-positioned record
        candidates.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        // Re-admit originals that still have clone budget left
        let mut extra: Vec<(usize, f64)> = pool
            .iter()
            .enumerate()
            .filter(|(_, r)| {
                r.category == category
                    && !r.id.contains("_dup")
                    && clone_counts
                        .get(&r.id)
                        .is_some_and(|&c| c < self.config.max_duplication_factor)
            })
            .map(|(i, r)| (i, r.quality_score().unwrap_or(0.0)))
            .collect();
        extra.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        candidates.extend(extra);

        let mut clones = Vec::new();
        for (index, _) in candidates {
            if clones.len() >= n {
                break;
            }
            let original = &pool[index];
            let used = clone_counts.entry(original.id.clone()).or_insert(0);
            if *used >= self.config.max_duplication_factor {
                continue;
            }
            *used += 1;
            let mut clone = original.clone();
            clone.id = format!("{}_dup{}", original.id, used);
            clones.push(clone);
        }

        let capped = clones.len() < n;
        (clones, capped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, category: &str, quality: f64) -> Record {
        Record::new(id, format!("content for {id}"), category).with_score("quality", quality)
    }

    fn pool(spec: &[(&str, usize)]) -> Vec<Record> {
        let mut records = Vec::new();
        for (category, count) in spec {
            for i in 0..*count {
                // Spread quality so trimming order is observable
                let quality = 0.5 + 0.4 * (i as f64 / (*count).max(1) as f64);
                records.push(record(&format!("{category}_{i}"), category, quality));
            }
        }
        records
    }

    #[test]
    fn test_report_within_tolerance_untouched() {
        let config = BalanceConfig::with_targets(&[("a", 0.5), ("b", 0.5)]);
        let balancer = RatioBalancer::new(config).unwrap();
        let records = pool(&[("a", 50), ("b", 50)]);

        let result = balancer.balance(&records);
        assert!(result.report.within_tolerance);
        assert_eq!(result.records.len(), 100);
        assert!(result.added_ids.is_empty());
        assert!(result.removed_ids.is_empty());
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_trims_lowest_quality_first() {
        let config = BalanceConfig::with_targets(&[("a", 0.5), ("b", 0.5)]);
        let balancer = RatioBalancer::new(config).unwrap();
        // a over-represented: 80 vs 20
        let records = pool(&[("a", 80), ("b", 20)]);

        let result = balancer.balance(&records);
        assert!(result.report.max_deviation <= 0.05 + 1e-9);
        // The dropped "a" records are the low-quality ones (low index = low quality)
        assert!(result.removed_ids.contains(&"a_0".to_string()));
        assert!(!result.removed_ids.contains(&"a_79".to_string()));
    }

    #[test]
    fn test_grows_with_derived_ids() {
        let config = BalanceConfig::with_targets(&[("a", 0.5), ("b", 0.5)]);
        let balancer = RatioBalancer::new(config).unwrap();
        let records = pool(&[("a", 30), ("b", 20)]);

        let result = balancer.balance(&records);
        assert!(result.report.within_tolerance);
        assert!(!result.added_ids.is_empty());
        for id in &result.added_ids {
            assert!(id.contains("_dup"), "clone id missing provenance suffix: {id}");
        }
        // The highest-quality b record was cloned first
        assert!(result.added_ids.contains(&"b_19_dup1".to_string()));
    }

    #[test]
    fn test_convergence_on_balanced_targets() {
        let config = BalanceConfig::with_targets(&[
            ("a", 0.3),
            ("b", 0.25),
            ("c", 0.2),
            ("d", 0.15),
            ("e", 0.1),
        ]);
        let balancer = RatioBalancer::new(config).unwrap();
        let records = pool(&[("a", 200), ("b", 200), ("c", 200), ("d", 200), ("e", 200)]);

        let result = balancer.balance(&records);
        assert!(result.report.within_tolerance, "max deviation {}", result.report.max_deviation);
        for deviation in result.report.per_category_deviation.values() {
            assert!(*deviation <= 0.05 + 1e-9);
        }
    }

    #[test]
    fn test_zero_target_category_dropped() {
        let config = BalanceConfig::with_targets(&[("a", 1.0)]);
        let balancer = RatioBalancer::new(config).unwrap();
        let records = pool(&[("a", 90), ("stray", 10)]);

        let result = balancer.balance(&records);
        assert!(result.records.iter().all(|r| r.category == "a"));
        assert!(result.report.within_tolerance);
    }

    #[test]
    fn test_zero_target_with_floor_reports_conflict() {
        let config = BalanceConfig {
            min_items_per_category: 5,
            ..BalanceConfig::with_targets(&[("a", 1.0)])
        };
        let balancer = RatioBalancer::new(config).unwrap();
        let records = pool(&[("a", 90), ("stray", 10)]);

        let result = balancer.balance(&records);
        let stray = result.records.iter().filter(|r| r.category == "stray").count();
        assert_eq!(stray, 5);
        assert!(result.conflicts.iter().any(|c| c.contains("stray")));
    }

    #[test]
    fn test_duplication_cap_limits_growth() {
        let config = BalanceConfig {
            max_duplication_factor: 1,
            ..BalanceConfig::with_targets(&[("a", 0.9), ("b", 0.1)])
        };
        let balancer = RatioBalancer::new(config).unwrap();
        // a can at most double: 10 originals + 10 clones = 20, far from 90%
        let records = pool(&[("a", 10), ("b", 90)]);

        let result = balancer.balance(&records);
        let a_clones = result.added_ids.iter().filter(|id| id.starts_with("a_")).count();
        assert!(a_clones <= 10);
    }

    #[test]
    fn test_ratios_must_sum_to_one() {
        let config = BalanceConfig::with_targets(&[("a", 0.5), ("b", 0.4)]);
        assert!(RatioBalancer::new(config).is_err());
    }

    #[test]
    fn test_report_is_fresh_each_pass() {
        let config = BalanceConfig::with_targets(&[("a", 0.5), ("b", 0.5)]);
        let balancer = RatioBalancer::new(config).unwrap();
        let records = pool(&[("a", 60), ("b", 40)]);

        let before = balancer.compute_report(&records);
        let result = balancer.balance(&records);
        let after = balancer.compute_report(&result.records);
        assert!(before.max_deviation > after.max_deviation);
        assert_eq!(result.report.max_deviation, after.max_deviation);
    }
}
