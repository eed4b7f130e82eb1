//! Dataset curation and balancing engine.
//!
//! Takes raw record pools through deduplication, weighted quality
//! filtering, category ratio balancing, validation with grading and
//! stratified train/validation/test splitting. Every stage is
//! deterministic for a given input and configuration.
//!
//! # Example
//!
//! ```
//! use datacurate_core::{CurationPipeline, PipelineConfig};
//! use datacurate_formats::Record;
//!
//! let records: Vec<Record> = (0..200)
//!     .map(|i| {
//!         Record::new(format!("r{i}"), format!("sample content number {i}"), "general")
//!             .with_score("quality", 0.9)
//!             .with_score("language_quality", 0.9)
//!             .with_score("coherence", 0.9)
//!             .with_score("authenticity", 0.9)
//!             .with_score("domain_accuracy", 0.9)
//!     })
//!     .collect();
//!
//! let pipeline = CurationPipeline::new(PipelineConfig::default()).unwrap();
//! let outcome = pipeline.run(&records).unwrap();
//! assert_eq!(outcome.records.len(), 200);
//! ```

pub mod balance;
pub mod dedup;
pub mod error;
pub mod pipeline;
pub mod quality;
pub mod split;
pub mod text;
pub mod validate;

pub use balance::{BalanceConfig, BalanceResult, BalancedDatasetReport, RatioBalancer};
pub use dedup::{
    DedupConfig, DedupResult, Deduplicator, DuplicateType, SimilarityMetric, SimilarityResult,
};
pub use error::{Error, Result};
pub use pipeline::{CurationPipeline, PipelineConfig, PipelineOutcome, StageCount};
pub use quality::{
    FactorConfig, FilterConfig, FilterDecision, FilterStats, QualityFilter, Verdict,
};
pub use split::{
    DatasetSplit, QualityLevel, SplitConfig, SplitMetrics, StratifiedSplitter,
};
pub use validate::{
    DomainScorer, NullDomainScorer, ValidationConfig, ValidationEngine, ValidationIssue,
    ValidationResult, ValidationSeverity,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        let config = DedupConfig::default();
        assert!(config.validate().is_ok());
    }
}
