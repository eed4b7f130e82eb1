//! Stratified train/validation/test splitting
//!
//! Partitions a dataset into three splits while preserving category and
//! quality composition. Strata are shuffled with a seeded RNG, so the same
//! input and seed always produce the same split.

use crate::{Error, Result};
use datacurate_formats::Record;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Quality bucket used for stratification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Low,
    MediumLow,
    Medium,
    MediumHigh,
    High,
}

impl QualityLevel {
    /// Bucket a quality score. Missing scores bucket as `Low` so unscored
    /// items stratify together rather than being dropped.
    pub fn from_score(score: Option<f64>) -> Self {
        match score {
            Some(s) if s >= 0.9 => Self::High,
            Some(s) if s >= 0.8 => Self::MediumHigh,
            Some(s) if s >= 0.7 => Self::Medium,
            Some(s) if s >= 0.6 => Self::MediumLow,
            _ => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::MediumLow => "medium_low",
            Self::Medium => "medium",
            Self::MediumHigh => "medium_high",
            Self::High => "high",
        }
    }
}

/// Configuration for dataset splitting
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct SplitConfig {
    pub train_ratio: f64,
    pub validation_ratio: f64,
    pub test_ratio: f64,
    /// RNG seed for reproducible shuffling
    pub seed: u64,
    pub min_items_per_split: usize,
    pub stratify_by_category: bool,
    pub stratify_by_quality: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.70,
            validation_ratio: 0.15,
            test_ratio: 0.15,
            seed: 42,
            min_items_per_split: 10,
            stratify_by_category: true,
            stratify_by_quality: true,
        }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<()> {
        let sum = self.train_ratio + self.validation_ratio + self.test_ratio;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(Error::InvalidConfig(format!(
                "split ratios must sum to 1.0, got {sum}"
            )));
        }
        for (name, ratio) in [
            ("train_ratio", self.train_ratio),
            ("validation_ratio", self.validation_ratio),
            ("test_ratio", self.test_ratio),
        ] {
            if ratio <= 0.0 || ratio >= 1.0 {
                return Err(Error::InvalidConfig(format!(
                    "{name} {ratio} outside (0, 1)"
                )));
            }
        }
        Ok(())
    }
}

/// Per-split quality statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityStats {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub scored_items: usize,
}

impl QualityStats {
    fn from_records(records: &[Record]) -> Self {
        let scores: Vec<f64> = records.iter().filter_map(|r| r.quality_score()).collect();
        if scores.is_empty() {
            return Self::default();
        }
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let variance = if scores.len() > 1 {
            scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (scores.len() - 1) as f64
        } else {
            0.0
        };
        Self {
            mean,
            std_dev: variance.sqrt(),
            min: scores.iter().copied().fold(f64::INFINITY, f64::min),
            max: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            scored_items: scores.len(),
        }
    }
}

/// Quality metrics for a completed split
#[derive(Debug, Clone, Serialize)]
pub struct SplitMetrics {
    pub actual_ratios: BTreeMap<String, f64>,
    pub size_balance_score: f64,
    pub category_balance_score: f64,
    pub quality_balance_score: f64,
    pub diversity_score: f64,
    pub overall_quality_score: f64,
    pub category_distribution: BTreeMap<String, BTreeMap<String, usize>>,
    pub quality_stats: BTreeMap<String, QualityStats>,
}

/// A three-way dataset partition.
///
/// The three splits are disjoint and together contain every input record
/// exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSplit {
    #[serde(skip)]
    pub train: Vec<Record>,
    #[serde(skip)]
    pub validation: Vec<Record>,
    #[serde(skip)]
    pub test: Vec<Record>,
    pub train_count: usize,
    pub validation_count: usize,
    pub test_count: usize,
    pub seed: u64,
    pub strata_count: usize,
    pub metrics: SplitMetrics,
}

/// Stratified dataset splitter
pub struct StratifiedSplitter {
    config: SplitConfig,
}

impl StratifiedSplitter {
    pub fn new(config: SplitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Split records into train/validation/test partitions.
    ///
    /// Fails with a capacity error when the dataset cannot fill each split
    /// to its configured minimum.
    pub fn split(&self, records: &[Record]) -> Result<DatasetSplit> {
        let required = self.config.min_items_per_split * 3;
        if records.len() < required {
            return Err(Error::Capacity(format!(
                "dataset has {} items but splitting requires at least {required}",
                records.len()
            )));
        }

        info!(
            "Splitting {} items (train {:.0}%, validation {:.0}%, test {:.0}%, seed {})",
            records.len(),
            self.config.train_ratio * 100.0,
            self.config.validation_ratio * 100.0,
            self.config.test_ratio * 100.0,
            self.config.seed
        );

        // Strata keys sort deterministically; combined with the seeded
        // shuffle this makes the whole split reproducible
        let mut strata: BTreeMap<(String, Option<QualityLevel>), Vec<usize>> = BTreeMap::new();
        for (i, record) in records.iter().enumerate() {
            let category = if self.config.stratify_by_category {
                record.category.clone()
            } else {
                String::new()
            };
            let level = self
                .config
                .stratify_by_quality
                .then(|| QualityLevel::from_score(record.quality_score()));
            strata.entry((category, level)).or_default().push(i);
        }
        let strata_count = strata.len();
        debug!("Formed {strata_count} strata");

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut train = Vec::new();
        let mut validation = Vec::new();
        let mut test = Vec::new();

        for ((category, level), mut indices) in strata {
            indices.shuffle(&mut rng);
            let n = indices.len();

            // Groups too small to spread go entirely to train
            if n < 3 {
                debug!(
                    "Stratum ({category}, {:?}) has {n} items, assigning to train",
                    level
                );
                train.extend(indices.iter().map(|&i| records[i].clone()));
                continue;
            }

            // Rounding can overshoot or starve a split; every stratum of 3+
            // items contributes at least one record to all three
            let n_train =
                ((n as f64 * self.config.train_ratio).round() as usize).clamp(1, n - 2);
            let n_val = ((n as f64 * self.config.validation_ratio).round() as usize)
                .clamp(1, n - n_train - 1);

            train.extend(indices[..n_train].iter().map(|&i| records[i].clone()));
            validation.extend(indices[n_train..n_train + n_val].iter().map(|&i| records[i].clone()));
            test.extend(indices[n_train + n_val..].iter().map(|&i| records[i].clone()));
        }

        // Final per-slice shuffle so stratum order is not visible downstream
        train.shuffle(&mut rng);
        validation.shuffle(&mut rng);
        test.shuffle(&mut rng);

        let metrics = self.compute_metrics(&train, &validation, &test);
        info!(
            "Split complete: {} train, {} validation, {} test (overall quality {:.3})",
            train.len(),
            validation.len(),
            test.len(),
            metrics.overall_quality_score
        );

        Ok(DatasetSplit {
            train_count: train.len(),
            validation_count: validation.len(),
            test_count: test.len(),
            seed: self.config.seed,
            strata_count,
            metrics,
            train,
            validation,
            test,
        })
    }

    fn compute_metrics(
        &self,
        train: &[Record],
        validation: &[Record],
        test: &[Record],
    ) -> SplitMetrics {
        let total = (train.len() + validation.len() + test.len()) as f64;
        let splits: [(&str, &[Record], f64); 3] = [
            ("train", train, self.config.train_ratio),
            ("validation", validation, self.config.validation_ratio),
            ("test", test, self.config.test_ratio),
        ];

        let mut actual_ratios = BTreeMap::new();
        let mut ratio_errors = Vec::new();
        for (name, records, target) in &splits {
            let actual = if total > 0.0 { records.len() as f64 / total } else { 0.0 };
            actual_ratios.insert(name.to_string(), actual);
            ratio_errors.push((actual - target).abs());
        }
        let mean_error = ratio_errors.iter().sum::<f64>() / ratio_errors.len() as f64;
        let size_balance_score = (1.0 - mean_error * 10.0).max(0.0);

        // Category balance: variance of each category's share across splits
        let mut category_distribution: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
        let mut all_categories: BTreeSet<String> = BTreeSet::new();
        for (name, records, _) in &splits {
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for record in *records {
                *counts.entry(record.category.clone()).or_insert(0) += 1;
                all_categories.insert(record.category.clone());
            }
            category_distribution.insert(name.to_string(), counts);
        }

        let mut variances = Vec::new();
        for category in &all_categories {
            let shares: Vec<f64> = splits
                .iter()
                .map(|(name, records, _)| {
                    if records.is_empty() {
                        return 0.0;
                    }
                    let count = category_distribution[*name].get(category).copied().unwrap_or(0);
                    count as f64 / records.len() as f64
                })
                .collect();
            let mean = shares.iter().sum::<f64>() / shares.len() as f64;
            let variance =
                shares.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / shares.len() as f64;
            variances.push(variance);
        }
        let category_balance_score = if variances.is_empty() {
            1.0
        } else {
            let mean_variance = variances.iter().sum::<f64>() / variances.len() as f64;
            (1.0 - mean_variance * 10.0).clamp(0.0, 1.0)
        };

        // Quality balance: variance of mean quality across splits
        let mut quality_stats = BTreeMap::new();
        let mut quality_means = Vec::new();
        for (name, records, _) in &splits {
            let stats = QualityStats::from_records(records);
            if stats.scored_items > 0 {
                quality_means.push(stats.mean);
            }
            quality_stats.insert(name.to_string(), stats);
        }
        let quality_balance_score = if quality_means.len() < 2 {
            1.0
        } else {
            let mean = quality_means.iter().sum::<f64>() / quality_means.len() as f64;
            let variance = quality_means.iter().map(|m| (m - mean).powi(2)).sum::<f64>()
                / quality_means.len() as f64;
            (1.0 - variance * 20.0).max(0.0)
        };

        // Diversity: unique tag coverage relative to split size
        let mut diversity_scores = Vec::new();
        for (_, records, _) in &splits {
            if records.is_empty() {
                continue;
            }
            let unique: BTreeSet<&str> = records
                .iter()
                .flat_map(|r| r.diversity_tags.iter().map(|t| t.as_str()))
                .collect();
            let expected = (records.len() as f64 * 0.1).max(1.0);
            diversity_scores.push((unique.len() as f64 / expected).min(1.0));
        }
        let diversity_score = if diversity_scores.is_empty() {
            0.0
        } else {
            diversity_scores.iter().sum::<f64>() / diversity_scores.len() as f64
        };

        let overall_quality_score = 0.4 * size_balance_score
            + 0.3 * category_balance_score
            + 0.2 * quality_balance_score
            + 0.1 * diversity_score;

        SplitMetrics {
            actual_ratios,
            size_balance_score,
            category_balance_score,
            quality_balance_score,
            diversity_score,
            overall_quality_score,
            category_distribution,
            quality_stats,
        }
    }
}
