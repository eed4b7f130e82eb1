//! Multi-factor quality filtering
//!
//! Each record carries named sub-scores supplied upstream; the filter
//! combines them into a weighted score and decides Accept / Review / Reject.
//!
//! Missing factor scores count as 0 in the weighted sum. This is the
//! conservative admission policy: a partially-scored pool drifts toward
//! Reject instead of inflating averages. The validation engine uses the
//! opposite exclude-missing policy when reporting achieved quality; the two
//! contracts are intentionally distinct.

use crate::{Error, Result};
use datacurate_formats::Record;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// One weighted quality factor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorConfig {
    /// Score key on the record (e.g. "coherence")
    pub key: String,
    pub weight: f64,
    /// If set, a score below this floor vetoes acceptance outright
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_floor: Option<f64>,
}

impl FactorConfig {
    pub fn new(key: &str, weight: f64) -> Self {
        Self {
            key: key.to_string(),
            weight,
            critical_floor: None,
        }
    }

    pub fn with_critical_floor(mut self, floor: f64) -> Self {
        self.critical_floor = Some(floor);
        self
    }
}

/// Configuration for the quality filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Weighted factors; weights must sum to 1.0
    pub factors: Vec<FactorConfig>,
    /// Combined score needed for acceptance
    pub min_overall_score: f64,
    /// Width of the Review band below the acceptance threshold
    pub review_band: f64,
    /// Keep Review records in the surviving pool
    pub keep_review: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            factors: vec![
                FactorConfig::new("language_quality", 0.25).with_critical_floor(0.40),
                FactorConfig::new("coherence", 0.30),
                FactorConfig::new("authenticity", 0.25),
                FactorConfig::new("domain_accuracy", 0.20),
            ],
            min_overall_score: 0.70,
            review_band: 0.10,
            keep_review: false,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.factors.is_empty() {
            return Err(Error::InvalidConfig("no quality factors configured".into()));
        }
        let sum: f64 = self.factors.iter().map(|f| f.weight).sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(Error::InvalidConfig(format!(
                "factor weights must sum to 1.0, got {sum}"
            )));
        }
        for factor in &self.factors {
            if !(0.0..=1.0).contains(&factor.weight) {
                return Err(Error::InvalidConfig(format!(
                    "factor '{}' weight {} outside [0, 1]",
                    factor.key, factor.weight
                )));
            }
            if let Some(floor) = factor.critical_floor {
                if !(0.0..=1.0).contains(&floor) {
                    return Err(Error::InvalidConfig(format!(
                        "factor '{}' critical floor {} outside [0, 1]",
                        factor.key, floor
                    )));
                }
            }
        }
        if !(0.0..=1.0).contains(&self.min_overall_score) {
            return Err(Error::InvalidConfig(format!(
                "min_overall_score {} outside [0, 1]",
                self.min_overall_score
            )));
        }
        if !(0.0..=1.0).contains(&self.review_band) {
            return Err(Error::InvalidConfig(format!(
                "review_band {} outside [0, 1]",
                self.review_band
            )));
        }
        Ok(())
    }
}

/// Filter verdict with audit reasons
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Accept,
    Reject { reasons: Vec<String> },
    Review { reasons: Vec<String> },
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }

    pub fn is_review(&self) -> bool {
        matches!(self, Verdict::Review { .. })
    }
}

/// Full per-record filter decision
#[derive(Debug, Clone, Serialize)]
pub struct FilterDecision {
    pub verdict: Verdict,
    pub combined_score: f64,
    /// Factor scores as used in the weighted sum (0.0 when missing)
    pub individual_scores: BTreeMap<String, f64>,
    /// Fraction of factors that had real, non-defaulted data
    pub confidence: f64,
}

/// Aggregate filter statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterStats {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub review: usize,
}

impl FilterStats {
    pub fn acceptance_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.accepted as f64 / self.total as f64
        }
    }

    pub fn rejection_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.rejected as f64 / self.total as f64
        }
    }
}

/// Weighted multi-factor quality filter
pub struct QualityFilter {
    config: FilterConfig,
}

impl QualityFilter {
    pub fn new(config: FilterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Evaluate one record without filtering it
    pub fn evaluate(&self, record: &Record) -> FilterDecision {
        let mut individual_scores = BTreeMap::new();
        let mut combined_score = 0.0;
        let mut present = 0usize;
        let mut veto_reasons: Vec<String> = Vec::new();

        for factor in &self.config.factors {
            let raw = record.score(&factor.key);
            if raw.is_some() {
                present += 1;
            }
            let score = raw.unwrap_or(0.0);
            individual_scores.insert(factor.key.clone(), score);
            combined_score += factor.weight * score;

            if let Some(floor) = factor.critical_floor {
                if score < floor {
                    veto_reasons.push(format!(
                        "critical factor '{}' score {score:.2} below floor {floor:.2}",
                        factor.key
                    ));
                }
            }
        }

        let confidence = present as f64 / self.config.factors.len() as f64;

        // A single catastrophic factor vetoes acceptance regardless of the
        // combined score.
        let verdict = if !veto_reasons.is_empty() {
            Verdict::Reject { reasons: veto_reasons }
        } else if combined_score >= self.config.min_overall_score {
            Verdict::Accept
        } else if combined_score >= self.config.min_overall_score - self.config.review_band {
            Verdict::Review {
                reasons: vec![format!(
                    "combined score {combined_score:.2} within review band below threshold {:.2}",
                    self.config.min_overall_score
                )],
            }
        } else {
            Verdict::Reject {
                reasons: vec![format!(
                    "combined score {combined_score:.2} below threshold {:.2}",
                    self.config.min_overall_score
                )],
            }
        };

        FilterDecision {
            verdict,
            combined_score,
            individual_scores,
            confidence,
        }
    }

    /// Filter a record pool.
    ///
    /// Returns the surviving records plus the full per-record decision audit
    /// and aggregate statistics.
    pub fn filter_dataset(
        &self,
        records: &[Record],
    ) -> (Vec<Record>, Vec<(String, FilterDecision)>, FilterStats) {
        let mut surviving = Vec::new();
        let mut decisions = Vec::with_capacity(records.len());
        let mut stats = FilterStats {
            total: records.len(),
            ..FilterStats::default()
        };

        for record in records {
            let decision = self.evaluate(record);
            let keep = match &decision.verdict {
                Verdict::Accept => {
                    stats.accepted += 1;
                    true
                }
                Verdict::Review { .. } => {
                    stats.review += 1;
                    self.config.keep_review
                }
                Verdict::Reject { reasons } => {
                    stats.rejected += 1;
                    debug!("Rejected '{}': {}", record.id, reasons.join("; "));
                    false
                }
            };
            if keep {
                surviving.push(record.clone());
            }
            decisions.push((record.id.clone(), decision));
        }

        info!(
            "Quality filtering: {} -> {} (accepted {}, review {}, rejected {})",
            records.len(),
            surviving.len(),
            stats.accepted,
            stats.review,
            stats.rejected
        );

        (surviving, decisions, stats)
    }
}
