//! Canonical record representation for curation pipelines
//!
//! Upstream sources hand us loosely-shaped JSON objects; `RawRecord` accepts
//! that shape leniently and `Record::from_raw` resolves it into the canonical
//! view every pipeline stage consumes. Data integrity problems are collected
//! as `IngestIssue`s instead of aborting ingestion.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Well-known score key: overall per-item quality
pub const SCORE_QUALITY: &str = "quality";
/// Well-known score key: domain accuracy
pub const SCORE_DOMAIN_ACCURACY: &str = "domain_accuracy";
/// Well-known score key: structural/conversational quality
pub const SCORE_STRUCTURE: &str = "structure";

/// Category reference as it arrives from upstream: either a bare string
/// label or an object exposing a `name` field.
///
/// Resolved exactly once at ingestion into a canonical lowercase string;
/// stages never re-resolve categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryRef {
    Name(String),
    Object { name: String },
}

impl CategoryRef {
    /// Resolve into a canonical category label.
    ///
    /// Empty or whitespace-only names resolve to `"unknown"`.
    pub fn resolve(&self) -> String {
        let name = match self {
            CategoryRef::Name(name) => name,
            CategoryRef::Object { name } => name,
        };
        let canonical = name.trim().to_lowercase();
        if canonical.is_empty() {
            "unknown".to_string()
        } else {
            canonical
        }
    }
}

/// Kind of data integrity problem found during ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestIssueKind {
    MissingId,
    MissingContent,
    MissingCategory,
    InvalidScore,
}

/// A non-fatal data integrity problem for one input record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestIssue {
    pub kind: IngestIssueKind,
    pub record_id: String,
    pub message: String,
}

/// Lenient input shape for a single dataset record
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    pub id: Option<String>,
    pub content: Option<String>,
    pub category: Option<CategoryRef>,
    /// Named per-item sub-scores, each expected in [0, 1]
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub diversity_tags: Vec<String>,
    /// Any additional fields the caller owns; carried read-only
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, Value>,
}

/// A single curation record
///
/// Immutable by convention: pipeline stages consume record sequences and
/// produce new sequences, never mutating content in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub content: String,
    /// Canonical category label ("unknown" when unresolvable)
    pub category: String,
    /// Named sub-scores in [0, 1]; absence is distinct from 0.0
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub diversity_tags: BTreeSet<String>,
    #[serde(default)]
    pub metadata: Value,
}

impl Record {
    /// Create a record with the given id, content and category.
    pub fn new(id: impl Into<String>, content: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            category: category.into(),
            scores: BTreeMap::new(),
            diversity_tags: BTreeSet::new(),
            metadata: Value::Null,
        }
    }

    /// Attach a named sub-score.
    pub fn with_score(mut self, key: &str, value: f64) -> Self {
        self.scores.insert(key.to_string(), value);
        self
    }

    /// Look up a named sub-score.
    pub fn score(&self, key: &str) -> Option<f64> {
        self.scores.get(key).copied()
    }

    /// Overall per-item quality score, if present.
    pub fn quality_score(&self) -> Option<f64> {
        self.score(SCORE_QUALITY)
    }

    /// Domain accuracy score, if present.
    pub fn domain_accuracy_score(&self) -> Option<f64> {
        self.score(SCORE_DOMAIN_ACCURACY)
    }

    /// Structural quality score, if present.
    pub fn structure_score(&self) -> Option<f64> {
        self.score(SCORE_STRUCTURE)
    }

    /// Resolve a raw record into the canonical view.
    ///
    /// Missing fields get safe defaults (empty content, `"unknown"` category,
    /// a positional id) and each substitution is reported as an issue.
    /// Out-of-range or non-finite scores are dropped, never clamped.
    pub fn from_raw(raw: RawRecord, index: usize) -> (Self, Vec<IngestIssue>) {
        let mut issues = Vec::new();

        let id = match raw.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                let fallback = format!("record_{index}");
                issues.push(IngestIssue {
                    kind: IngestIssueKind::MissingId,
                    record_id: fallback.clone(),
                    message: format!("record at index {index} has no id"),
                });
                fallback
            }
        };

        let content = match raw.content {
            Some(content) if !content.is_empty() => content,
            _ => {
                issues.push(IngestIssue {
                    kind: IngestIssueKind::MissingContent,
                    record_id: id.clone(),
                    message: format!("record '{id}' has empty content"),
                });
                String::new()
            }
        };

        let category = match raw.category {
            Some(ref cat) => cat.resolve(),
            None => {
                issues.push(IngestIssue {
                    kind: IngestIssueKind::MissingCategory,
                    record_id: id.clone(),
                    message: format!("record '{id}' has no category"),
                });
                "unknown".to_string()
            }
        };

        let mut scores = BTreeMap::new();
        for (key, value) in raw.scores {
            if value.is_finite() && (0.0..=1.0).contains(&value) {
                scores.insert(key, value);
            } else {
                issues.push(IngestIssue {
                    kind: IngestIssueKind::InvalidScore,
                    record_id: id.clone(),
                    message: format!("record '{id}' score '{key}' = {value} outside [0, 1], dropped"),
                });
            }
        }

        let record = Self {
            id,
            content,
            category,
            scores,
            diversity_tags: raw.diversity_tags.into_iter().collect(),
            metadata: if raw.metadata.is_empty() {
                Value::Null
            } else {
                Value::Object(raw.metadata)
            },
        };

        (record, issues)
    }

    /// Flat export row: `id, content, category, quality_score, metadata`.
    pub fn to_export_row(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "content": self.content,
            "category": self.category,
            "quality_score": self.quality_score().unwrap_or(0.0),
            "metadata": self.metadata,
        })
    }
}
