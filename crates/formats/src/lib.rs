//! Record model and file I/O for dataset curation
//!
//! This crate provides the canonical record representation shared by all
//! pipeline stages, a streaming JSONL reader with gzip support, and
//! flat-file export writers for curated splits and reports.

pub mod error;
pub mod export;
pub mod jsonl;
pub mod record;

pub use error::{Error, Result};
pub use record::{CategoryRef, IngestIssue, IngestIssueKind, RawRecord, Record};

#[cfg(test)]
mod tests {
    #[test]
    fn it_works() {
        assert_eq!(2 + 2, 4);
    }
}
