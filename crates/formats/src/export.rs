//! Flat-file export of curated splits and reports
//!
//! Each split is exported as rows of `id, content, category, quality_score,
//! metadata` in JSON, JSONL or CSV. Writers are scoped per call: buffers are
//! flushed and handles closed before returning.

use crate::record::Record;
use crate::{Error, Result};
use chrono::Local;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Output format for split exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Jsonl,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Jsonl => "jsonl",
            ExportFormat::Csv => "csv",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "jsonl" => Ok(ExportFormat::Jsonl),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Export records in the given format
pub fn export_records<P: AsRef<Path>>(
    records: &[Record],
    path: P,
    format: ExportFormat,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        ExportFormat::Json => {
            let rows: Vec<_> = records.iter().map(|r| r.to_export_row()).collect();
            serde_json::to_writer_pretty(&mut writer, &rows)?;
        }
        ExportFormat::Jsonl => {
            for record in records {
                serde_json::to_writer(&mut writer, &record.to_export_row())?;
                writer.write_all(b"\n")?;
            }
        }
        ExportFormat::Csv => {
            writeln!(writer, "id,content,category,quality_score,metadata")?;
            for record in records {
                let metadata = match &record.metadata {
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                writeln!(
                    writer,
                    "{},{},{},{},{}",
                    csv_escape(&record.id),
                    csv_escape(&record.content),
                    csv_escape(&record.category),
                    record.quality_score().unwrap_or(0.0),
                    csv_escape(&metadata),
                )?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}

/// Export train/validation/test splits with timestamped file names.
///
/// Returns a map from split name to the written path.
pub fn export_splits<P: AsRef<Path>>(
    train: &[Record],
    validation: &[Record],
    test: &[Record],
    output_dir: P,
    format: ExportFormat,
) -> Result<BTreeMap<String, PathBuf>> {
    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir)?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let mut paths = BTreeMap::new();

    for (name, records) in [("train", train), ("validation", validation), ("test", test)] {
        let path = output_dir.join(format!("{name}_split_{timestamp}.{}", format.extension()));
        export_records(records, &path, format)?;
        paths.insert(name.to_string(), path);
    }

    info!(
        "Exported splits to {} (train={}, validation={}, test={})",
        output_dir.display(),
        train.len(),
        validation.len(),
        test.len()
    );
    Ok(paths)
}

/// Write any serializable report as pretty-printed JSON
pub fn write_json_report<T: Serialize, P: AsRef<Path>>(report: &T, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush()?;

    info!("Report written to {}", path.display());
    Ok(())
}

/// Escape a CSV field, quoting when it contains separators or quotes
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    fn sample() -> Vec<Record> {
        vec![
            Record::new("a", "hello, \"world\"", "x").with_score("quality", 0.9),
            Record::new("b", "plain", "y"),
        ]
    }

    #[test]
    fn test_export_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        export_records(&sample(), &path, ExportFormat::Jsonl).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        let row: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(row["quality_score"], 0.9);
    }

    #[test]
    fn test_export_json_is_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        export_records(&sample(), &path, ExportFormat::Json).unwrap();

        let rows: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_csv_escaping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        export_records(&sample(), &path, ExportFormat::Csv).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), "id,content,category,quality_score,metadata");
        assert!(lines.next().unwrap().contains("\"hello, \"\"world\"\"\""));
    }

    #[test]
    fn test_export_splits_writes_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let records = sample();
        let paths = export_splits(&records, &records, &records, dir.path(), ExportFormat::Jsonl)
            .unwrap();
        assert_eq!(paths.len(), 3);
        for path in paths.values() {
            assert!(path.exists());
        }
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("parquet".parse::<ExportFormat>().is_err());
    }
}
