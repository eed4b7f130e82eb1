//! End-to-end curation pipeline
//!
//! Chains the curation stages in a fixed order: deduplication, quality
//! filtering, ratio balancing, validation and an optional stratified split.
//! All stage configurations are validated at construction, so a pipeline
//! that builds successfully will not fail later on bad settings.

use crate::balance::{BalanceConfig, BalanceResult, RatioBalancer};
use crate::dedup::{DedupConfig, DedupResult, Deduplicator};
use crate::quality::{FilterConfig, FilterDecision, FilterStats, QualityFilter};
use crate::split::{DatasetSplit, SplitConfig, StratifiedSplitter};
use crate::validate::{DomainScorer, ValidationConfig, ValidationEngine, ValidationResult};
use crate::Result;
use datacurate_formats::Record;
use serde::Serialize;
use tracing::info;

/// Full pipeline configuration.
///
/// Balancing and splitting are optional stages; deduplication, filtering
/// and validation always run.
#[derive(Debug, Clone, Default, Serialize, serde::Deserialize)]
pub struct PipelineConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_name: Option<String>,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<BalanceConfig>,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<SplitConfig>,
}

/// Input/output record counts for one pipeline stage
#[derive(Debug, Clone, Serialize)]
pub struct StageCount {
    pub stage: String,
    pub input: usize,
    pub output: usize,
}

/// Everything a pipeline run produces
#[derive(Debug, Serialize)]
pub struct PipelineOutcome {
    /// Curated records after every enabled stage
    #[serde(skip)]
    pub records: Vec<Record>,
    pub stage_counts: Vec<StageCount>,
    pub dedup: DedupResult,
    pub filter_stats: FilterStats,
    #[serde(skip)]
    pub filter_decisions: Vec<(String, FilterDecision)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<BalanceResult>,
    pub validation: ValidationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split: Option<DatasetSplit>,
}

/// Dataset curation pipeline
pub struct CurationPipeline {
    dataset_name: String,
    deduplicator: Deduplicator,
    filter: QualityFilter,
    balancer: Option<RatioBalancer>,
    validator: ValidationEngine,
    splitter: Option<StratifiedSplitter>,
}

impl CurationPipeline {
    /// Build a pipeline, validating every stage configuration upfront.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let balancer = config.balance.map(RatioBalancer::new).transpose()?;
        let splitter = config.split.map(StratifiedSplitter::new).transpose()?;
        Ok(Self {
            dataset_name: config.dataset_name.unwrap_or_else(|| "dataset".to_string()),
            deduplicator: Deduplicator::new(config.dedup)?,
            filter: QualityFilter::new(config.filter)?,
            balancer,
            validator: ValidationEngine::new(config.validation)?,
            splitter,
        })
    }

    /// Inject a domain accuracy scorer into the validation stage
    pub fn with_scorer(mut self, scorer: Box<dyn DomainScorer>) -> Self {
        self.validator = self.validator.with_scorer(scorer);
        self
    }

    /// Run all enabled stages over the input records.
    pub fn run(&self, records: &[Record]) -> Result<PipelineOutcome> {
        info!(
            "Running curation pipeline '{}' over {} records",
            self.dataset_name,
            records.len()
        );
        let mut stage_counts = Vec::new();

        let dedup = self.deduplicator.deduplicate(records);
        stage_counts.push(StageCount {
            stage: "dedup".to_string(),
            input: records.len(),
            output: dedup.unique.len(),
        });

        let (filtered, filter_decisions, filter_stats) =
            self.filter.filter_dataset(&dedup.unique);
        stage_counts.push(StageCount {
            stage: "filter".to_string(),
            input: dedup.unique.len(),
            output: filtered.len(),
        });

        let (current, balance) = match &self.balancer {
            Some(balancer) => {
                let result = balancer.balance(&filtered);
                stage_counts.push(StageCount {
                    stage: "balance".to_string(),
                    input: filtered.len(),
                    output: result.records.len(),
                });
                (result.records.clone(), Some(result))
            }
            None => (filtered, None),
        };

        let validation = self.validator.validate_dataset(&current, &self.dataset_name);

        let split = match &self.splitter {
            Some(splitter) => Some(splitter.split(&current)?),
            None => None,
        };

        info!(
            "Pipeline '{}' finished: {} records, validation grade {}",
            self.dataset_name,
            current.len(),
            validation.quality_grade
        );

        Ok(PipelineOutcome {
            records: current,
            stage_counts,
            dedup,
            filter_stats,
            filter_decisions,
            balance,
            validation,
            split,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datacurate_formats::record::{SCORE_DOMAIN_ACCURACY, SCORE_QUALITY, SCORE_STRUCTURE};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Build a realistic mixed-quality dataset with a few planted duplicates.
    fn scenario_dataset(size: usize) -> Vec<Record> {
        let mut rng = StdRng::seed_from_u64(1234);
        let categories = ["support", "sales", "technical"];
        let mut records = Vec::with_capacity(size);

        for i in 0..size {
            let category = categories[i % categories.len()];
            let quality: f64 = rng.gen_range(0.6..1.0);
            let mut record = Record::new(
                format!("item_{i}"),
                format!(
                    "conversation {i} about a {category} topic with enough length to pass checks"
                ),
                category,
            )
            .with_score(SCORE_QUALITY, quality)
            .with_score(SCORE_DOMAIN_ACCURACY, rng.gen_range(0.8..1.0))
            .with_score(SCORE_STRUCTURE, rng.gen_range(0.75..1.0))
            .with_score("language_quality", rng.gen_range(0.85..1.0))
            .with_score("coherence", rng.gen_range(0.85..1.0))
            .with_score("authenticity", rng.gen_range(0.85..1.0));
            record.diversity_tags.insert(format!("topic_{}", i % 12));
            record.diversity_tags.insert(format!("tone_{}", i % 7));
            records.push(record);
        }

        // Exact duplicates of the first ten items
        for i in 0..10 {
            let mut dup = records[i].clone();
            dup.id = format!("dup_{i}");
            records.push(dup);
        }
        records
    }

    fn pipeline_config() -> PipelineConfig {
        PipelineConfig {
            dataset_name: Some("scenario".to_string()),
            balance: Some(BalanceConfig::with_targets(&[
                ("support", 0.34),
                ("sales", 0.33),
                ("technical", 0.33),
            ])),
            split: Some(SplitConfig::default()),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_full_pipeline_scenario() {
        let records = scenario_dataset(1000);
        let pipeline = CurationPipeline::new(pipeline_config()).unwrap();
        let outcome = pipeline.run(&records).unwrap();

        // The ten planted duplicates are removed
        assert_eq!(outcome.dedup.unique.len(), 1000);
        assert_eq!(outcome.dedup.removed_ids.len(), 10);

        // Uniform factor scores above the threshold mean nothing is rejected
        assert_eq!(outcome.filter_stats.rejected, 0);

        let balance = outcome.balance.as_ref().unwrap();
        assert!(balance.report.within_tolerance);

        assert!(outcome.validation.is_valid, "{}", outcome.validation.summary());

        let split = outcome.split.as_ref().unwrap();
        assert_eq!(
            split.train.len() + split.validation.len() + split.test.len(),
            outcome.records.len()
        );

        assert_eq!(outcome.stage_counts.len(), 3);
        assert_eq!(outcome.stage_counts[0].stage, "dedup");
        assert_eq!(outcome.stage_counts[0].input, 1010);
    }

    #[test]
    fn test_skewed_targets_scenario() {
        // 1000 records in five equal categories plus two exact duplicates,
        // rebalanced toward uneven targets and split
        let mut rng = StdRng::seed_from_u64(99);
        let categories = ["a", "b", "c", "d", "e"];
        let mut records: Vec<Record> = (0..1000)
            .map(|i| {
                Record::new(
                    format!("r{i}"),
                    format!("unique content body number {i} with sufficient length"),
                    categories[i % 5],
                )
                .with_score(SCORE_QUALITY, rng.gen_range(0.6..1.0))
                .with_score("language_quality", 0.9)
                .with_score("coherence", 0.9)
                .with_score("authenticity", 0.9)
                .with_score("domain_accuracy", 0.9)
            })
            .collect();
        for k in 0..2 {
            let mut dup = records[1].clone();
            dup.id = format!("r1_copy{k}");
            records.push(dup);
        }

        let config = PipelineConfig {
            dataset_name: Some("skewed".to_string()),
            balance: Some(BalanceConfig::with_targets(&[
                ("a", 0.30),
                ("b", 0.25),
                ("c", 0.20),
                ("d", 0.15),
                ("e", 0.10),
            ])),
            split: Some(SplitConfig::default()),
            ..PipelineConfig::default()
        };
        let outcome = CurationPipeline::new(config).unwrap().run(&records).unwrap();

        assert_eq!(outcome.dedup.removed_ids.len(), 2);
        assert_eq!(outcome.dedup.unique.len(), 1000);

        let balance = outcome.balance.as_ref().unwrap();
        assert!(balance.report.within_tolerance);
        for deviation in balance.report.per_category_deviation.values() {
            assert!(*deviation <= 0.05);
        }

        let split = outcome.split.as_ref().unwrap();
        assert_eq!(
            split.train.len() + split.validation.len() + split.test.len(),
            outcome.records.len()
        );
    }

    #[test]
    fn test_pipeline_without_optional_stages() {
        let records = scenario_dataset(200);
        let pipeline = CurationPipeline::new(PipelineConfig {
            dataset_name: Some("minimal".to_string()),
            ..PipelineConfig::default()
        })
        .unwrap();
        let outcome = pipeline.run(&records).unwrap();

        assert!(outcome.balance.is_none());
        assert!(outcome.split.is_none());
        assert_eq!(outcome.stage_counts.len(), 2);
        assert_eq!(outcome.records.len(), 200);
    }

    #[test]
    fn test_pipeline_rejects_bad_stage_config() {
        let config = PipelineConfig {
            balance: Some(BalanceConfig::with_targets(&[("only", 0.5)])),
            ..PipelineConfig::default()
        };
        assert!(CurationPipeline::new(config).is_err());
    }

    #[test]
    fn test_stage_counts_chain() {
        let records = scenario_dataset(300);
        let pipeline = CurationPipeline::new(PipelineConfig::default()).unwrap();
        let outcome = pipeline.run(&records).unwrap();

        for window in outcome.stage_counts.windows(2) {
            assert_eq!(window[0].output, window[1].input);
        }
    }
}
