//! The per-row labeling pipeline.
//!
//! Rows are read, labeled and written one at a time, in input order. Each
//! output row is the input row with the label inserted at index 1, so the
//! output always has exactly one more column than the input, even for rows
//! whose classification failed.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::feedback::FeedbackStore;
use crate::labeler::Classifier;
use crate::models::{FeedbackEntry, RowOutcome, RunSummary};
use crate::prompt::PromptContext;

/// Header of the inserted column.
pub const LABEL_COLUMN: &str = "Ethnicity";

/// Label for rows with no name and rows whose classification failed.
pub const UNKNOWN_LABEL: &str = "Unknown";

pub const DEFAULT_FEWSHOT_COUNT: usize = 5;

/// Fatal pipeline errors. Per-row classifier failures are not errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Input CSV not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Output path {} is the input file", .0.display())]
    OutputIsInput(PathBuf),

    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read CSV: {0}")]
    Read(#[source] csv::Error),

    #[error("Failed to write CSV: {0}")]
    Write(#[source] csv::Error),

    #[error("Failed to write CSV: {0}")]
    Flush(#[source] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub model: String,
    /// Extra instructions appended to the task description.
    pub custom_instructions: Option<String>,
    /// Only the first `limit` data rows are labeled; the rest are left blank.
    pub limit: Option<usize>,
    pub has_header: bool,
    pub fewshot_count: usize,
    /// Query the classifier even when the feedback store has an exact match.
    pub force_api: bool,
}

impl PipelineOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            custom_instructions: None,
            limit: None,
            has_header: true,
            fewshot_count: DEFAULT_FEWSHOT_COUNT,
            force_api: false,
        }
    }
}

pub struct Pipeline<'a, C: Classifier + ?Sized> {
    store: &'a FeedbackStore,
    classifier: &'a C,
    options: PipelineOptions,
}

impl<'a, C: Classifier + ?Sized> Pipeline<'a, C> {
    pub fn new(store: &'a FeedbackStore, classifier: &'a C, options: PipelineOptions) -> Self {
        Self {
            store,
            classifier,
            options,
        }
    }

    /// Label `input` into `output`. Both paths are opened before any row is
    /// processed, so I/O problems surface before the first API call.
    pub async fn run_files(&self, input: &Path, output: &Path) -> Result<RunSummary, PipelineError> {
        if !input.exists() {
            return Err(PipelineError::InputNotFound(input.to_path_buf()));
        }
        if same_file(input, output) {
            return Err(PipelineError::OutputIsInput(output.to_path_buf()));
        }

        let reader = File::open(input).map_err(|source| PipelineError::Open {
            path: input.to_path_buf(),
            source,
        })?;
        let writer = File::create(output).map_err(|source| PipelineError::Open {
            path: output.to_path_buf(),
            source,
        })?;

        info!(input = %input.display(), output = %output.display(), "Labeling signups");
        self.run(reader, writer).await
    }

    /// Stream CSV records from `input` to `output`, inserting a label into each.
    pub async fn run<R: Read, W: Write>(
        &self,
        input: R,
        output: W,
    ) -> Result<RunSummary, PipelineError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(input);
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(output);

        let mut record = csv::StringRecord::new();
        let blank = csv::StringRecord::new();
        let mut summary = RunSummary::default();
        let mut header_pending = self.options.has_header;
        let mut index = 0;

        loop {
            let line_before = reader.position().line();
            if !reader.read_record(&mut record).map_err(PipelineError::Read)? {
                break;
            }

            if header_pending {
                header_pending = false;
                writer
                    .write_record(insert_label(&record, LABEL_COLUMN))
                    .map_err(PipelineError::Write)?;
                continue;
            }

            // Blank lines are rows too; they come out as `[label]`.
            let blank_lines = blank_lines_before(&record, line_before, reader.position().line());
            for _ in 0..blank_lines {
                self.write_row(&mut writer, &blank, index, &mut summary).await?;
                index += 1;
            }
            self.write_row(&mut writer, &record, index, &mut summary).await?;
            index += 1;
        }

        writer.flush().map_err(PipelineError::Flush)?;

        info!(
            rows = summary.rows,
            feedback_hits = summary.feedback_hits,
            api_queried = summary.api_queried,
            api_calls = summary.api_calls(),
            failed = summary.failed,
            skipped = summary.skipped,
            beyond_limit = summary.beyond_limit,
            "Labeling run complete"
        );
        Ok(summary)
    }

    /// Label one data row and write it. `index` is 0-based among data rows.
    async fn write_row<W: Write>(
        &self,
        writer: &mut csv::Writer<W>,
        record: &csv::StringRecord,
        index: usize,
        summary: &mut RunSummary,
    ) -> Result<(), PipelineError> {
        let (label, outcome) = if self.options.limit.is_some_and(|limit| index >= limit) {
            (String::new(), RowOutcome::BeyondLimit)
        } else {
            self.label_row(index + 1, record.get(0).unwrap_or("")).await
        };

        debug!(row = index + 1, outcome = outcome.as_str(), "Row labeled");
        summary.record(outcome);
        writer
            .write_record(insert_label(record, &label))
            .map_err(PipelineError::Write)
    }

    /// Decide the label for a single name.
    ///
    /// `row_number` is 1-based among data rows and only used for logging.
    pub async fn label_row(&self, row_number: usize, raw_name: &str) -> (String, RowOutcome) {
        let name = raw_name.trim();
        if name.is_empty() {
            debug!(row = row_number, "Empty name, skipping");
            return (UNKNOWN_LABEL.to_string(), RowOutcome::Skipped);
        }

        if !self.options.force_api {
            if let Some(entry) = self.store.lookup_exact(name) {
                debug!(row = row_number, name, label = %entry.ethnicity, "Feedback hit");
                return (entry.ethnicity.clone(), RowOutcome::FeedbackHit);
            }
        }

        let context = PromptContext::new(
            name,
            self.fewshot_examples(name),
            self.options.custom_instructions.as_deref(),
        );
        let prompt = context.render();

        match self
            .classifier
            .classify(&prompt, name, &self.options.model)
            .await
        {
            Ok(label) => {
                debug!(row = row_number, name, label = %label, "Classified");
                (label, RowOutcome::ApiQueried)
            }
            Err(e) => {
                warn!(row = row_number, name, error = %e, "Classification failed, using '{}'", UNKNOWN_LABEL);
                (UNKNOWN_LABEL.to_string(), RowOutcome::Failed)
            }
        }
    }

    /// Most similar stored entries, or the oldest ones when nothing is similar.
    ///
    /// An exact match only reaches this point under `force_api`, and then it
    /// is the best example there is.
    fn fewshot_examples(&self, name: &str) -> Vec<&'a FeedbackEntry> {
        let k = self.options.fewshot_count;
        let similar = self.store.find_similar(name, k, self.options.force_api);
        if similar.is_empty() {
            self.store.sample(k)
        } else {
            similar
        }
    }
}

/// Insert `label` at index 1 (or at the end of an empty record).
pub fn insert_label<'r>(record: &'r csv::StringRecord, label: &'r str) -> Vec<&'r str> {
    let mut fields: Vec<&str> = record.iter().collect();
    fields.insert(fields.len().min(1), label);
    fields
}

/// Number of blank lines the csv reader skipped before `record`.
///
/// The reader counts every `\n` it consumes. A record accounts for the
/// newlines inside its fields plus one for its terminator; anything beyond
/// that was a blank line. With CRLF input the terminator's `\n` is consumed
/// by the following read, which balances out for every record after the
/// first. Blank lines at the very end of the input are not rows, and a
/// final record with no line terminator undercounts the blank lines right
/// before it by one.
fn blank_lines_before(record: &csv::StringRecord, line_before: u64, line_after: u64) -> u64 {
    let embedded: u64 = record
        .iter()
        .map(|field| field.matches('\n').count() as u64)
        .sum();
    line_after
        .saturating_sub(line_before)
        .saturating_sub(embedded + 1)
}

/// `<dir>/<stem>_with_ethnicity.csv` next to the input.
pub fn output_path_for(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "signups".to_string());
    input.with_file_name(format!("{}_with_ethnicity.csv", stem))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_label_at_index_one() {
        let record = csv::StringRecord::from(vec!["Rahul Sharma", "rahul@example.com"]);
        assert_eq!(
            insert_label(&record, "Indian"),
            vec!["Rahul Sharma", "Indian", "rahul@example.com"]
        );
    }

    #[test]
    fn test_insert_label_into_empty_record() {
        let record = csv::StringRecord::new();
        assert_eq!(insert_label(&record, ""), vec![""]);
    }

    #[test]
    fn test_output_path_for() {
        assert_eq!(
            output_path_for(Path::new("/data/signups.csv")),
            PathBuf::from("/data/signups_with_ethnicity.csv")
        );
        assert_eq!(
            output_path_for(Path::new("list")),
            PathBuf::from("list_with_ethnicity.csv")
        );
    }
}
