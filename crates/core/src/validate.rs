//! Dataset validation and grading
//!
//! Aggregates dataset-level quality metrics, raises itemized issues by
//! severity, and computes a 0-1 validation score with a letter grade.
//!
//! Aggregate means cover only records where a score is present. Absent
//! scores are excluded, not zero-defaulted: the validator reports achieved
//! quality of what exists, while the quality filter decides admission of
//! individual items with the opposite policy. Both contracts are kept
//! distinct on purpose.

use crate::balance::BalancedDatasetReport;
use crate::{Error, Result};
use chrono::{DateTime, Local};
use datacurate_formats::Record;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Validation issue severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationSeverity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

/// One itemized validation finding; append-only within a run
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    pub issue_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
}

/// Pluggable domain accuracy scorer.
///
/// Injected at construction; callers with a real domain validator implement
/// this, everyone else gets the null object which contributes nothing.
pub trait DomainScorer: Send + Sync {
    /// Score a record's domain accuracy, or `None` if not assessable
    fn score(&self, record: &Record) -> Option<f64>;
}

/// Null object for the optional domain validator dependency
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDomainScorer;

impl DomainScorer for NullDomainScorer {
    fn score(&self, _record: &Record) -> Option<f64> {
        None
    }
}

/// Configuration for dataset validation
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct ValidationConfig {
    pub min_dataset_size: usize,
    pub max_dataset_size: usize,

    pub min_overall_quality: f64,
    pub min_domain_accuracy: f64,

    pub min_content_length: usize,
    pub max_content_length: usize,
    pub required_diversity_tags: usize,

    pub min_items_per_category: usize,
    pub ratio_tolerance: f64,
    /// Target ratios for the ratio check; equal split over the observed
    /// categories when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_ratios: Option<BTreeMap<String, f64>>,

    /// Bounded prefix checked for missing required fields
    pub field_sample_size: usize,
    /// Bounded sample checked for domain accuracy failures
    pub domain_sample_size: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_dataset_size: 100,
            max_dataset_size: 100_000,
            min_overall_quality: 0.7,
            min_domain_accuracy: 0.75,
            min_content_length: 10,
            max_content_length: 10_000,
            required_diversity_tags: 2,
            min_items_per_category: 5,
            ratio_tolerance: 0.05,
            target_ratios: None,
            field_sample_size: 100,
            domain_sample_size: 100,
        }
    }
}

impl ValidationConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(targets) = &self.target_ratios {
            let sum: f64 = targets.values().sum();
            if (sum - 1.0).abs() > 1e-6 {
                return Err(Error::InvalidConfig(format!(
                    "validation target ratios must sum to 1.0, got {sum}"
                )));
            }
        }
        for (name, value) in [
            ("min_overall_quality", self.min_overall_quality),
            ("min_domain_accuracy", self.min_domain_accuracy),
            ("ratio_tolerance", self.ratio_tolerance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!("{name} {value} outside [0, 1]")));
            }
        }
        if self.min_dataset_size > self.max_dataset_size {
            return Err(Error::InvalidConfig(
                "min_dataset_size exceeds max_dataset_size".into(),
            ));
        }
        Ok(())
    }
}

/// Aggregate quality metrics for a dataset
#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityMetrics {
    pub overall_quality_score: f64,
    pub quality_std_dev: f64,
    pub quality_distribution: BTreeMap<String, usize>,

    pub domain_accuracy_score: f64,
    pub domain_accuracy_std_dev: f64,

    pub structure_quality_score: f64,
    pub structure_quality_std_dev: f64,

    pub diversity_score: f64,
    pub content_integrity_score: f64,

    pub category_quality_scores: BTreeMap<String, f64>,
    pub category_balance_score: f64,
}

/// Per-category analysis block in the report
#[derive(Debug, Clone, Serialize)]
pub struct CategoryAnalysis {
    pub count: usize,
    pub avg_quality: f64,
    pub quality_std: f64,
    pub min_quality: f64,
    pub max_quality: f64,
}

/// Comprehensive validation result for one dataset
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub dataset_name: String,
    pub validation_timestamp: DateTime<Local>,

    pub is_valid: bool,
    pub validation_score: f64,
    pub quality_grade: String,

    pub quality_metrics: QualityMetrics,
    pub issues: Vec<ValidationIssue>,
    pub category_analysis: BTreeMap<String, CategoryAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio_validation: Option<BalancedDatasetReport>,
    pub recommendations: Vec<String>,

    pub total_items: usize,
    pub valid_items: usize,
    pub invalid_items: usize,
}

impl ValidationResult {
    fn new(dataset_name: &str, total_items: usize) -> Self {
        Self {
            dataset_name: dataset_name.to_string(),
            validation_timestamp: Local::now(),
            is_valid: false,
            validation_score: 0.0,
            quality_grade: "F".to_string(),
            quality_metrics: QualityMetrics::default(),
            issues: Vec::new(),
            category_analysis: BTreeMap::new(),
            ratio_validation: None,
            recommendations: Vec::new(),
            total_items,
            valid_items: 0,
            invalid_items: 0,
        }
    }

    fn add_issue(
        &mut self,
        severity: ValidationSeverity,
        issue_type: &str,
        message: String,
        item_id: Option<String>,
        suggested_fix: Option<&str>,
    ) {
        self.issues.push(ValidationIssue {
            severity,
            issue_type: issue_type.to_string(),
            message,
            item_id,
            suggested_fix: suggested_fix.map(|s| s.to_string()),
        });
    }

    /// Count issues at a severity level
    pub fn issue_count(&self, severity: ValidationSeverity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    /// Human-readable summary block
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Dataset Validation Report: {}", self.dataset_name),
            "=".repeat(50),
            format!("Status: {}", if self.is_valid { "PASSED" } else { "FAILED" }),
            format!("Score: {:.3}/1.000, Grade: {}", self.validation_score, self.quality_grade),
            String::new(),
            format!("  Overall Quality: {:.3}", self.quality_metrics.overall_quality_score),
            format!("  Domain Accuracy: {:.3}", self.quality_metrics.domain_accuracy_score),
            format!("  Structure Quality: {:.3}", self.quality_metrics.structure_quality_score),
            format!("  Diversity: {:.3}", self.quality_metrics.diversity_score),
            format!("  Content Integrity: {:.3}", self.quality_metrics.content_integrity_score),
            String::new(),
            format!(
                "Issues: {} critical, {} high, {} medium, {} low",
                self.issue_count(ValidationSeverity::Critical),
                self.issue_count(ValidationSeverity::High),
                self.issue_count(ValidationSeverity::Medium),
                self.issue_count(ValidationSeverity::Low),
            ),
        ];
        if !self.recommendations.is_empty() {
            lines.push(String::new());
            lines.push("Recommendations:".to_string());
            for (i, rec) in self.recommendations.iter().enumerate() {
                lines.push(format!("  {}. {rec}", i + 1));
            }
        }
        lines.join("\n")
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Dataset validation and grading engine
pub struct ValidationEngine {
    config: ValidationConfig,
    scorer: Box<dyn DomainScorer>,
}

impl ValidationEngine {
    pub fn new(config: ValidationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            scorer: Box::new(NullDomainScorer),
        })
    }

    /// Inject an external domain accuracy scorer
    pub fn with_scorer(mut self, scorer: Box<dyn DomainScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Validate a dataset and produce the full graded report.
    pub fn validate_dataset(&self, records: &[Record], dataset_name: &str) -> ValidationResult {
        info!(
            "Starting validation of dataset '{}' with {} items",
            dataset_name,
            records.len()
        );

        let mut result = ValidationResult::new(dataset_name, records.len());

        self.check_structure(records, &mut result);
        self.check_quality_metrics(records, &mut result);
        self.check_categories(records, &mut result);
        self.check_ratios(records, &mut result);
        self.check_content_integrity(records, &mut result);
        self.check_diversity(records, &mut result);
        self.check_domain_accuracy(records, &mut result);

        self.compute_validation_score(&mut result);
        result.quality_grade = grade_for(result.validation_score).to_string();
        self.generate_recommendations(&mut result);

        // All three conditions are required; any one failing fails the set
        result.is_valid = result.issue_count(ValidationSeverity::Critical) == 0
            && result.quality_metrics.overall_quality_score >= self.config.min_overall_quality
            && result.validation_score >= 0.6;

        info!(
            "Validation completed: score {:.3}, grade {}, valid: {}",
            result.validation_score, result.quality_grade, result.is_valid
        );
        result
    }

    fn check_structure(&self, records: &[Record], result: &mut ValidationResult) {
        if records.len() < self.config.min_dataset_size {
            result.add_issue(
                ValidationSeverity::Critical,
                "dataset_size",
                format!(
                    "Dataset too small: {} items (minimum: {})",
                    records.len(),
                    self.config.min_dataset_size
                ),
                None,
                Some("Add more data items to meet the minimum size requirement"),
            );
        } else if records.len() > self.config.max_dataset_size {
            result.add_issue(
                ValidationSeverity::High,
                "dataset_size",
                format!(
                    "Dataset very large: {} items (maximum recommended: {})",
                    records.len(),
                    self.config.max_dataset_size
                ),
                None,
                Some("Consider splitting into smaller datasets"),
            );
        }

        // Missing required fields, sampled over a bounded prefix
        let mut missing = Vec::new();
        for (i, record) in records.iter().take(self.config.field_sample_size).enumerate() {
            if record.id.is_empty() {
                missing.push(format!("id missing at index {i}"));
            }
            if record.content.is_empty() {
                missing.push(format!("content missing at index {i}"));
            }
        }
        if !missing.is_empty() {
            let shown = missing.iter().take(5).cloned().collect::<Vec<_>>().join(", ");
            result.add_issue(
                ValidationSeverity::Critical,
                "missing_fields",
                format!("Required fields missing: {shown} ({} total)", missing.len()),
                None,
                Some("Ensure all items have id, content and category"),
            );
        }

        // Duplicate ids are flagged, never silently renamed
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut duplicates = 0usize;
        for record in records {
            if !seen.insert(record.id.as_str()) {
                duplicates += 1;
            }
        }
        if duplicates > 0 {
            result.add_issue(
                ValidationSeverity::High,
                "duplicate_ids",
                format!("Found {duplicates} duplicate item ids"),
                None,
                Some("Remove or rename duplicate items to ensure unique ids"),
            );
        }
    }

    fn check_quality_metrics(&self, records: &[Record], result: &mut ValidationResult) {
        // Present scores only; absence must not bias the means
        let quality: Vec<f64> = records.iter().filter_map(|r| r.quality_score()).collect();
        let domain: Vec<f64> = records.iter().filter_map(|r| r.domain_accuracy_score()).collect();
        let structure: Vec<f64> = records.iter().filter_map(|r| r.structure_score()).collect();

        let metrics = &mut result.quality_metrics;
        metrics.overall_quality_score = mean(&quality);
        metrics.quality_std_dev = std_dev(&quality);
        metrics.domain_accuracy_score = mean(&domain);
        metrics.domain_accuracy_std_dev = std_dev(&domain);
        metrics.structure_quality_score = mean(&structure);
        metrics.structure_quality_std_dev = std_dev(&structure);

        if !quality.is_empty() {
            metrics.quality_distribution = BTreeMap::from([
                ("excellent".to_string(), quality.iter().filter(|s| **s >= 0.9).count()),
                ("good".to_string(), quality.iter().filter(|s| (0.8..0.9).contains(*s)).count()),
                ("acceptable".to_string(), quality.iter().filter(|s| (0.7..0.8).contains(*s)).count()),
                ("poor".to_string(), quality.iter().filter(|s| **s < 0.7).count()),
            ]);
        }

        result.valid_items = records
            .iter()
            .filter(|r| r.quality_score().is_some_and(|s| s >= self.config.min_overall_quality))
            .count();
        result.invalid_items = records.len() - result.valid_items;

        if result.quality_metrics.overall_quality_score < self.config.min_overall_quality {
            result.add_issue(
                ValidationSeverity::High,
                "quality_threshold",
                format!(
                    "Average quality score {:.3} below threshold {}",
                    result.quality_metrics.overall_quality_score, self.config.min_overall_quality
                ),
                None,
                Some("Improve data quality or adjust quality thresholds"),
            );
        }
    }

    fn check_categories(&self, records: &[Record], result: &mut ValidationResult) {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut quality: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for record in records {
            *counts.entry(record.category.clone()).or_insert(0) += 1;
            if let Some(score) = record.quality_score() {
                quality.entry(record.category.clone()).or_default().push(score);
            }
        }

        if counts.contains_key("unknown") {
            result.add_issue(
                ValidationSeverity::Medium,
                "unknown_category",
                format!("{} items have an unresolved category", counts["unknown"]),
                None,
                Some("Assign explicit categories to unlabeled items"),
            );
        }

        for (category, count) in &counts {
            if *count < self.config.min_items_per_category {
                result.add_issue(
                    ValidationSeverity::Medium,
                    "category_size",
                    format!(
                        "Category '{category}' has only {count} items (minimum: {})",
                        self.config.min_items_per_category
                    ),
                    None,
                    Some("Add more items to under-populated categories"),
                );
            }
        }

        for (category, scores) in &quality {
            if scores.is_empty() {
                continue;
            }
            let avg = mean(scores);
            result.quality_metrics.category_quality_scores.insert(category.clone(), avg);
            result.category_analysis.insert(
                category.clone(),
                CategoryAnalysis {
                    count: counts[category],
                    avg_quality: avg,
                    quality_std: std_dev(scores),
                    min_quality: scores.iter().copied().fold(f64::INFINITY, f64::min),
                    max_quality: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                },
            );
        }
    }

    fn check_ratios(&self, records: &[Record], result: &mut ValidationResult) {
        if records.is_empty() {
            return;
        }
        let total = records.len() as f64;
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for record in records {
            *counts.entry(record.category.clone()).or_insert(0) += 1;
        }
        let actual_ratios: BTreeMap<String, f64> = counts
            .iter()
            .map(|(c, n)| (c.clone(), *n as f64 / total))
            .collect();

        // Equal distribution fallback when no targets are configured
        let target_ratios: BTreeMap<String, f64> = match &self.config.target_ratios {
            Some(targets) => targets.clone(),
            None => {
                let equal = 1.0 / counts.len() as f64;
                counts.keys().map(|c| (c.clone(), equal)).collect()
            }
        };

        let mut deviations = BTreeMap::new();
        let mut max_deviation: f64 = 0.0;
        for (category, target) in &target_ratios {
            let actual = actual_ratios.get(category).copied().unwrap_or(0.0);
            let deviation = (target - actual).abs();
            deviations.insert(category.clone(), deviation);
            max_deviation = max_deviation.max(deviation);

            if deviation > self.config.ratio_tolerance {
                result.add_issue(
                    ValidationSeverity::Medium,
                    "ratio_deviation",
                    format!(
                        "Category '{category}' ratio deviation {deviation:.3} exceeds tolerance {}",
                        self.config.ratio_tolerance
                    ),
                    None,
                    Some("Rebalance the dataset toward the target ratios"),
                );
            }
        }

        result.quality_metrics.category_balance_score = if max_deviation == 0.0 {
            1.0
        } else {
            (1.0 - max_deviation / 0.5).max(0.0)
        };

        result.ratio_validation = Some(BalancedDatasetReport {
            target_ratios,
            actual_ratios,
            per_category_deviation: deviations,
            within_tolerance: max_deviation <= self.config.ratio_tolerance,
            max_deviation,
        });
    }

    fn check_content_integrity(&self, records: &[Record], result: &mut ValidationResult) {
        let mut offending = 0usize;
        let mut empty = 0usize;

        for record in records {
            if record.content.is_empty() {
                empty += 1;
                continue;
            }
            let length = record.content.chars().count();
            if length < self.config.min_content_length {
                offending += 1;
                result.add_issue(
                    ValidationSeverity::Low,
                    "content_length",
                    format!("Item '{}' content too short: {length} chars", record.id),
                    Some(record.id.clone()),
                    Some("Ensure content has sufficient detail"),
                );
            } else if length > self.config.max_content_length {
                offending += 1;
                result.add_issue(
                    ValidationSeverity::Low,
                    "content_length",
                    format!("Item '{}' content too long: {length} chars", record.id),
                    Some(record.id.clone()),
                    Some("Consider splitting long content"),
                );
            }
        }

        if !records.is_empty() {
            result.quality_metrics.content_integrity_score =
                (1.0 - empty as f64 / records.len() as f64).max(0.0);

            // One rollup when more than 10% of items are out of bounds
            let rate = (offending + empty) as f64 / records.len() as f64;
            if rate > 0.10 {
                result.add_issue(
                    ValidationSeverity::Medium,
                    "content_integrity",
                    format!(
                        "{} of {} items have content issues ({:.0}%)",
                        offending + empty,
                        records.len(),
                        rate * 100.0
                    ),
                    None,
                    Some("Review and fix content integrity issues"),
                );
            }
        }
    }

    fn check_diversity(&self, records: &[Record], result: &mut ValidationResult) {
        let mut all_tags: BTreeSet<&str> = BTreeSet::new();
        let mut tag_counts = Vec::with_capacity(records.len());

        for record in records {
            all_tags.extend(record.diversity_tags.iter().map(|t| t.as_str()));
            tag_counts.push(record.diversity_tags.len() as f64);

            if record.diversity_tags.len() < self.config.required_diversity_tags {
                result.add_issue(
                    ValidationSeverity::Low,
                    "diversity_tags",
                    format!(
                        "Item '{}' has {} diversity tags (minimum: {})",
                        record.id,
                        record.diversity_tags.len(),
                        self.config.required_diversity_tags
                    ),
                    Some(record.id.clone()),
                    Some("Add more diversity tags"),
                );
            }
        }

        if tag_counts.is_empty() {
            result.quality_metrics.diversity_score = 0.0;
            return;
        }

        // Coverage assumes ~20 distinct tags is an ideal vocabulary
        let coverage = (all_tags.len() as f64 / 20.0).min(1.0);
        let distribution =
            (mean(&tag_counts) / self.config.required_diversity_tags.max(1) as f64).min(1.0);
        result.quality_metrics.diversity_score = (coverage + distribution) / 2.0;
    }

    fn check_domain_accuracy(&self, records: &[Record], result: &mut ValidationResult) {
        let sample_size = self.config.domain_sample_size.min(records.len());
        if sample_size == 0 {
            return;
        }

        let mut failures = 0usize;
        let mut assessed = 0usize;
        for record in &records[..sample_size] {
            let score = record
                .domain_accuracy_score()
                .or_else(|| self.scorer.score(record));
            match score {
                Some(score) => {
                    assessed += 1;
                    if score < self.config.min_domain_accuracy {
                        failures += 1;
                    }
                }
                None => {
                    // Item not assessable; excluded from the rate, recorded
                    // so the gap in coverage stays visible
                    warn!("No domain accuracy available for item '{}'", record.id);
                }
            }
        }

        if assessed > 0 && failures as f64 > assessed as f64 * 0.2 {
            result.add_issue(
                ValidationSeverity::High,
                "domain_accuracy",
                format!("High rate of domain accuracy failures: {failures}/{assessed} sampled items"),
                None,
                Some("Review domain content accuracy with subject experts"),
            );
        }
    }

    fn compute_validation_score(&self, result: &mut ValidationResult) {
        let metrics = &result.quality_metrics;
        let score = 0.30 * metrics.overall_quality_score
            + 0.25 * metrics.domain_accuracy_score
            + 0.20 * metrics.structure_quality_score
            + 0.15 * metrics.diversity_score
            + 0.10 * metrics.content_integrity_score;

        let penalty = 0.2 * result.issue_count(ValidationSeverity::Critical) as f64
            + 0.1 * result.issue_count(ValidationSeverity::High) as f64;

        result.validation_score = (score - penalty).max(0.0);
    }

    fn generate_recommendations(&self, result: &mut ValidationResult) {
        let mut recommendations = Vec::new();

        if result.quality_metrics.overall_quality_score < 0.8 {
            recommendations
                .push("Improve overall data quality through better curation and filtering".to_string());
        }
        if let Some(ratio) = &result.ratio_validation {
            if ratio.max_deviation > self.config.ratio_tolerance {
                recommendations.push("Rebalance dataset categories to achieve target ratios".to_string());
            }
        }
        if result.total_items < 1000 {
            recommendations.push("Expand dataset size for better model training".to_string());
        }
        if result.quality_metrics.diversity_score < 0.7 {
            recommendations.push("Increase diversity tag coverage".to_string());
        }

        let critical = result.issue_count(ValidationSeverity::Critical);
        if critical > 0 {
            recommendations.push(format!("Address {critical} critical issues before using this dataset"));
        }
        let high = result.issue_count(ValidationSeverity::High);
        if high > 5 {
            recommendations.push(format!("Address {high} high-priority issues"));
        }

        result.recommendations = recommendations;
    }
}

/// Letter grade for a validation score
pub fn grade_for(score: f64) -> &'static str {
    if score >= 0.9 {
        "A"
    } else if score >= 0.8 {
        "B"
    } else if score >= 0.7 {
        "C"
    } else if score >= 0.6 {
        "D"
    } else {
        "F"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datacurate_formats::record::{SCORE_DOMAIN_ACCURACY, SCORE_QUALITY, SCORE_STRUCTURE};

    fn record(id: &str, category: &str, quality: f64) -> Record {
        let mut r = Record::new(id, format!("a reasonably long content body for {id}"), category)
            .with_score(SCORE_QUALITY, quality)
            .with_score(SCORE_DOMAIN_ACCURACY, 0.85)
            .with_score(SCORE_STRUCTURE, 0.8);
        r.diversity_tags.insert("alpha".to_string());
        r.diversity_tags.insert("beta".to_string());
        r
    }

    fn dataset(size: usize) -> Vec<Record> {
        (0..size)
            .map(|i| record(&format!("r{i}"), if i % 2 == 0 { "a" } else { "b" }, 0.85))
            .collect()
    }

    fn engine() -> ValidationEngine {
        ValidationEngine::new(ValidationConfig::default()).unwrap()
    }

    #[test]
    fn test_healthy_dataset_passes() {
        let result = engine().validate_dataset(&dataset(200), "healthy");
        assert_eq!(result.issue_count(ValidationSeverity::Critical), 0);
        assert!(result.is_valid, "summary:\n{}", result.summary());
        assert!(result.validation_score >= 0.6);
    }

    #[test]
    fn test_small_dataset_is_critical() {
        let result = engine().validate_dataset(&dataset(10), "tiny");
        assert!(result.issue_count(ValidationSeverity::Critical) > 0);
        assert!(!result.is_valid);
    }

    #[test]
    fn test_duplicate_ids_flagged_high() {
        let mut records = dataset(200);
        records[1].id = "r0".to_string();
        let result = engine().validate_dataset(&records, "dups");
        assert!(result
            .issues
            .iter()
            .any(|i| i.issue_type == "duplicate_ids" && i.severity == ValidationSeverity::High));
    }

    #[test]
    fn test_missing_scores_excluded_from_means() {
        let mut records = dataset(200);
        // Half the records lose their quality score entirely
        for record in records.iter_mut().take(100) {
            record.scores.remove(SCORE_QUALITY);
        }
        let result = engine().validate_dataset(&records, "partial");
        // Mean over the present 0.85 scores, not dragged down by absences
        assert!((result.quality_metrics.overall_quality_score - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_all_low_quality_fails_with_low_grade() {
        let records: Vec<Record> = (0..200)
            .map(|i| record(&format!("r{i}"), "a", 0.4))
            .collect();
        let result = engine().validate_dataset(&records, "low");
        assert!(!result.is_valid);
        assert!(matches!(result.quality_grade.as_str(), "D" | "F"));
    }

    #[test]
    fn test_score_floor_under_maximal_penalty() {
        // Empty content everywhere forces critical issues and zero metrics
        let records: Vec<Record> = (0..5).map(|i| Record::new(format!("r{i}"), "", "unknown")).collect();
        let result = engine().validate_dataset(&records, "worst");
        assert!(result.validation_score >= 0.0);
        assert_eq!(result.quality_grade, "F");
    }

    #[test]
    fn test_grade_monotonicity() {
        let scores = [0.1, 0.35, 0.6, 0.61, 0.7, 0.79, 0.8, 0.88, 0.9, 1.0];
        let order = ["F", "D", "C", "B", "A"];
        let mut last = 0usize;
        for score in scores {
            let position = order.iter().position(|g| *g == grade_for(score)).unwrap();
            assert!(position >= last, "grade regressed at score {score}");
            last = position;
        }
    }

    #[test]
    fn test_ratio_deviation_issues() {
        let config = ValidationConfig {
            target_ratios: Some(BTreeMap::from([
                ("a".to_string(), 0.9),
                ("b".to_string(), 0.1),
            ])),
            ..ValidationConfig::default()
        };
        let engine = ValidationEngine::new(config).unwrap();
        let result = engine.validate_dataset(&dataset(200), "skewed");

        let ratio = result.ratio_validation.as_ref().unwrap();
        assert!(!ratio.within_tolerance);
        assert!(result.issues.iter().any(|i| i.issue_type == "ratio_deviation"));
    }

    #[test]
    fn test_unknown_category_flagged() {
        let mut records = dataset(200);
        records[0].category = "unknown".to_string();
        let result = engine().validate_dataset(&records, "unk");
        assert!(result.issues.iter().any(|i| i.issue_type == "unknown_category"));
    }

    #[test]
    fn test_injected_domain_scorer_used() {
        struct FailingScorer;
        impl DomainScorer for FailingScorer {
            fn score(&self, _record: &Record) -> Option<f64> {
                Some(0.1)
            }
        }

        let mut records = dataset(200);
        for record in &mut records {
            record.scores.remove(SCORE_DOMAIN_ACCURACY);
        }
        let engine = ValidationEngine::new(ValidationConfig::default())
            .unwrap()
            .with_scorer(Box::new(FailingScorer));
        let result = engine.validate_dataset(&records, "scored");
        assert!(result
            .issues
            .iter()
            .any(|i| i.issue_type == "domain_accuracy" && i.severity == ValidationSeverity::High));
    }

    #[test]
    fn test_invalid_target_ratio_config() {
        let config = ValidationConfig {
            target_ratios: Some(BTreeMap::from([("a".to_string(), 0.5)])),
            ..ValidationConfig::default()
        };
        assert!(ValidationEngine::new(config).is_err());
    }
}
