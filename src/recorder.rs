//! Recording verified labels, one at a time or in bulk from a CSV.

use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::feedback::{FeedbackStore, StoreError};
use crate::models::FeedbackEntry;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to read corrections CSV {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to read corrections CSV: {0}")]
    Read(#[from] csv::Error),

    #[error("CSV must include 'name' and 'ethnicity' columns (missing '{0}')")]
    MissingColumn(&'static str),

    #[error("No valid feedback rows found")]
    NoValidRows,
}

/// A corrections row that was not imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// 1-based line in the source file.
    pub line: u64,
    pub reason: String,
}

/// Outcome of reading (and possibly importing) a corrections CSV.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub entries: Vec<FeedbackEntry>,
    pub rejected: Vec<RejectedRow>,
}

/// Append a single correction.
pub fn record_single(
    store: &mut FeedbackStore,
    name: &str,
    ethnicity: &str,
    notes: Option<&str>,
) -> Result<FeedbackEntry, RecorderError> {
    let entry = FeedbackEntry::new(name, ethnicity, notes);
    store.append(entry.clone())?;
    info!(name = %entry.name, ethnicity = %entry.ethnicity, "Recorded feedback");
    Ok(entry)
}

/// Parse a corrections CSV with a `name,ethnicity[,notes]` header.
///
/// Rows missing a name or label, or not valid UTF-8, are reported in
/// `rejected`; a missing required column fails the whole read.
pub fn read_corrections<R: Read>(input: R) -> Result<ImportReport, RecorderError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);
    read_records(&mut reader)
}

/// Read `path` and append every valid row to `store` in one write.
pub fn import_csv(store: &mut FeedbackStore, path: &Path) -> Result<ImportReport, RecorderError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| RecorderError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    let report = read_records(&mut reader)?;

    for rejected in &report.rejected {
        warn!(line = rejected.line, reason = %rejected.reason, "Skipping corrections row");
    }
    if report.entries.is_empty() {
        return Err(RecorderError::NoValidRows);
    }

    let count = store.extend(report.entries.clone())?;
    info!(
        count,
        rejected = report.rejected.len(),
        store = %store.path().display(),
        "Imported feedback rows"
    );
    Ok(report)
}

fn read_records<R: Read>(reader: &mut csv::Reader<R>) -> Result<ImportReport, RecorderError> {
    let headers = reader.headers()?.clone();
    let column = |name: &'static str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or(RecorderError::MissingColumn(name))
    };
    let name_idx = column("name")?;
    let ethnicity_idx = column("ethnicity")?;
    let notes_idx = headers.iter().position(|h| h == "notes");

    let mut report = ImportReport::default();
    for record in reader.byte_records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let record = match csv::StringRecord::from_byte_record(record) {
            Ok(record) => record,
            Err(_) => {
                report.rejected.push(RejectedRow {
                    line,
                    reason: "invalid UTF-8".to_string(),
                });
                continue;
            }
        };
        let entry = FeedbackEntry::new(
            record.get(name_idx).unwrap_or(""),
            record.get(ethnicity_idx).unwrap_or(""),
            notes_idx.and_then(|i| record.get(i)),
        );

        if entry.name.is_empty() {
            report.rejected.push(RejectedRow {
                line,
                reason: "missing name".to_string(),
            });
        } else if entry.ethnicity.is_empty() {
            report.rejected.push(RejectedRow {
                line,
                reason: format!("missing ethnicity for '{}'", entry.name),
            });
        } else {
            report.entries.push(entry);
        }
    }

    Ok(report)
}
