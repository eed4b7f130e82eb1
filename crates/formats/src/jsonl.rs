//! Streaming JSONL (JSON Lines) reading and writing
//!
//! Provides memory-efficient line-by-line reading of JSONL files with
//! automatic gzip decompression, plus a scoped writer for curated output.
//! Malformed lines are logged and skipped, never fatal.

use crate::record::{IngestIssue, RawRecord, Record};
use crate::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Streaming JSONL reader that processes records line-by-line
pub struct JsonlReader<R: Read> {
    reader: BufReader<R>,
    line_number: usize,
    skipped_lines: usize,
}

impl JsonlReader<Box<dyn Read>> {
    /// Open a JSONL file, auto-detecting gzip compression by extension
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;

        let extension = path.extension().and_then(|e| e.to_str());
        let reader: Box<dyn Read> = match extension {
            Some("gz") => {
                debug!("Opening gzip-compressed JSONL file: {:?}", path);
                Box::new(GzDecoder::new(file))
            }
            _ => {
                debug!("Opening plain JSONL file: {:?}", path);
                Box::new(file)
            }
        };

        Ok(Self::new(reader))
    }
}

impl<R: Read> JsonlReader<R> {
    /// Create a new JSONL reader from any Read source
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line_number: 0,
            skipped_lines: 0,
        }
    }

    /// Number of lines consumed so far
    pub fn lines_processed(&self) -> usize {
        self.line_number
    }

    /// Number of malformed lines skipped so far
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Read the next raw record, skipping blank and malformed lines.
    /// Returns `None` at end of input.
    pub fn next_raw(&mut self) -> Result<Option<RawRecord>> {
        let mut line = String::new();
        loop {
            line.clear();
            let bytes = self.reader.read_line(&mut line)?;
            if bytes == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<RawRecord>(trimmed) {
                Ok(raw) => return Ok(Some(raw)),
                Err(e) => {
                    self.skipped_lines += 1;
                    warn!("Skipping malformed line {}: {}", self.line_number, e);
                }
            }
        }
    }

    /// Read the whole input into canonical records plus ingest issues.
    pub fn read_all(mut self) -> Result<(Vec<Record>, Vec<IngestIssue>)> {
        let mut records = Vec::new();
        let mut issues = Vec::new();

        while let Some(raw) = self.next_raw()? {
            let (record, record_issues) = Record::from_raw(raw, records.len());
            records.push(record);
            issues.extend(record_issues);
        }

        debug!(
            "Read {} records ({} malformed lines skipped)",
            records.len(),
            self.skipped_lines
        );
        Ok((records, issues))
    }
}

/// Read a whole JSONL file into canonical records plus ingest issues
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<(Vec<Record>, Vec<IngestIssue>)> {
    JsonlReader::open(path)?.read_all()
}

/// Write records as JSON lines to a file.
///
/// The writer is scoped to this call: the buffer is flushed and the file
/// handle closed before returning.
pub fn write_records<P: AsRef<Path>>(records: &[Record], path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Reject paths with extensions we do not understand
pub fn check_input_extension(path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("jsonl") | Some("json") | Some("gz") => Ok(()),
        Some(other) => Err(Error::UnsupportedFormat(other.to_string())),
        None => Err(Error::InvalidFile(format!(
            "no file extension: {}",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use std::io::Cursor;

    #[test]
    fn test_read_valid_lines() {
        let data = r#"{"id": "a", "content": "hello", "category": "x"}
{"id": "b", "content": "world", "category": "y"}"#;
        let reader = JsonlReader::new(Cursor::new(data));
        let (records, issues) = reader.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert!(issues.is_empty());
        assert_eq!(records[0].id, "a");
        assert_eq!(records[1].category, "y");
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let data = "{\"id\": \"a\", \"content\": \"hi\", \"category\": \"x\"}\nnot json\n\n{\"id\": \"b\", \"content\": \"yo\", \"category\": \"x\"}\n";
        let mut reader = JsonlReader::new(Cursor::new(data));
        let mut count = 0;
        while let Some(_) = reader.next_raw().unwrap() {
            count += 1;
        }
        assert_eq!(count, 2);
        assert_eq!(reader.skipped_lines(), 1);
    }

    #[test]
    fn test_missing_fields_reported_not_fatal() {
        let data = r#"{"content": "no id here"}"#;
        let (records, issues) = JsonlReader::new(Cursor::new(data)).read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert!(!issues.is_empty());
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let records = vec![
            Record::new("a", "hello", "x").with_score("quality", 0.9),
            Record::new("b", "world", "y"),
        ];
        write_records(&records, &path).unwrap();

        let (read_back, issues) = read_records(&path).unwrap();
        assert_eq!(read_back.len(), 2);
        assert_eq!(read_back[0].quality_score(), Some(0.9));
        assert!(issues.is_empty());
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(check_input_extension(Path::new("data.parquet")).is_err());
        assert!(check_input_extension(Path::new("data.jsonl")).is_ok());
    }
}
