//! Append-only CSV store of verified labels.
//!
//! The file has the columns `name,ethnicity,notes`. Rows are only ever
//! appended; a later row for the same name shadows earlier ones on lookup.

mod similarity;

pub use similarity::rank_similar;

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::FeedbackEntry;

/// Default location of the feedback file, relative to the working directory.
pub const DEFAULT_STORE_PATH: &str = "feedback.csv";

const HEADER: [&str; 3] = ["name", "ethnicity", "notes"];

/// Feedback store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on feedback store {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed feedback store {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Feedback store {} is missing the '{column}' column", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("Invalid feedback entry: {0}")]
    Validation(String),
}

#[derive(Debug, Deserialize)]
struct StoredRow {
    #[serde(default)]
    name: String,
    #[serde(default)]
    ethnicity: String,
    #[serde(default)]
    notes: Option<String>,
}

/// Lookup key for a name: trimmed and lower-cased.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

pub struct FeedbackStore {
    path: PathBuf,
    entries: Vec<FeedbackEntry>,
    /// Normalized name → index of the most recent entry for it.
    by_name: HashMap<String, usize>,
}

impl FeedbackStore {
    /// An empty store that will persist to `path` on the first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Load the store from `path`. A missing file yields an empty store.
    ///
    /// Rows without a name or label are skipped with a warning; a file that
    /// is not valid CSV or lacks the required columns is an error.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let mut store = Self::new(path);
        if !store.path.exists() {
            debug!(path = %store.path.display(), "No feedback store yet, starting empty");
            return Ok(store);
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&store.path)
            .map_err(|source| store.csv_error(source))?;

        let headers = reader
            .headers()
            .map_err(|source| store.csv_error(source))?
            .clone();
        if headers.is_empty() {
            return Ok(store);
        }
        for column in ["name", "ethnicity"] {
            if !headers.iter().any(|h| h == column) {
                return Err(StoreError::MissingColumn {
                    path: store.path.clone(),
                    column,
                });
            }
        }

        for result in reader.deserialize::<StoredRow>() {
            let row = result.map_err(|source| store.csv_error(source))?;
            let entry = FeedbackEntry::new(&row.name, &row.ethnicity, row.notes.as_deref());
            if entry.is_complete() {
                store.insert(entry);
            } else {
                warn!(
                    path = %store.path.display(),
                    name = %entry.name,
                    "Skipping feedback row without a name or ethnicity"
                );
            }
        }

        debug!(path = %store.path.display(), entries = store.entries.len(), "Loaded feedback store");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[FeedbackEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ============================================================
    // Reads
    // ============================================================

    /// The most recently appended entry whose normalized name equals `name`'s.
    pub fn lookup_exact(&self, name: &str) -> Option<&FeedbackEntry> {
        self.by_name
            .get(&normalize_name(name))
            .map(|&index| &self.entries[index])
    }

    /// Up to `k` entries ranked by name similarity. Exact matches are only
    /// included when `include_exact` is set. See [`rank_similar`].
    pub fn find_similar(&self, name: &str, k: usize, include_exact: bool) -> Vec<&FeedbackEntry> {
        rank_similar(name, &self.entries, k, include_exact)
    }

    /// The first `k` entries in insertion order.
    pub fn sample(&self, k: usize) -> Vec<&FeedbackEntry> {
        self.entries.iter().take(k).collect()
    }

    // ============================================================
    // Writes
    // ============================================================

    /// Append one entry. The row is synced to disk before this returns.
    pub fn append(&mut self, entry: FeedbackEntry) -> Result<(), StoreError> {
        self.extend(vec![entry]).map(|_| ())
    }

    /// Append many entries with a single write and sync.
    ///
    /// Every entry is validated before anything is written, so an invalid
    /// entry leaves the file untouched. Returns the number of entries written.
    pub fn extend(&mut self, entries: Vec<FeedbackEntry>) -> Result<usize, StoreError> {
        let entries: Vec<FeedbackEntry> = entries
            .into_iter()
            .map(|e| FeedbackEntry::new(&e.name, &e.ethnicity, e.notes.as_deref()))
            .collect();
        if let Some(bad) = entries.iter().find(|e| !e.is_complete()) {
            return Err(StoreError::Validation(format!(
                "both name and ethnicity must be provided (got name '{}', ethnicity '{}')",
                bad.name, bad.ethnicity
            )));
        }
        if entries.is_empty() {
            return Ok(0);
        }

        self.write_rows(&entries)?;

        let count = entries.len();
        for entry in entries {
            self.insert(entry);
        }
        debug!(path = %self.path.display(), count, "Appended feedback entries");
        Ok(count)
    }

    fn write_rows(&self, entries: &[FeedbackEntry]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        let len = file
            .metadata()
            .map_err(|source| self.io_error(source))?
            .len();
        // A hand-edited file may lack a trailing newline; don't glue rows together.
        if len > 0 && !ends_with_newline(&mut file).map_err(|e| self.io_error(e))? {
            file.write_all(b"\n").map_err(|e| self.io_error(e))?;
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if len == 0 {
            writer
                .write_record(HEADER)
                .map_err(|source| self.csv_error(source))?;
        }
        for entry in entries {
            writer
                .write_record([
                    entry.name.as_str(),
                    entry.ethnicity.as_str(),
                    entry.notes.as_deref().unwrap_or(""),
                ])
                .map_err(|source| self.csv_error(source))?;
        }

        let file = writer
            .into_inner()
            .map_err(|e| self.io_error(e.into_error()))?;
        file.sync_all().map_err(|source| self.io_error(source))
    }

    fn insert(&mut self, entry: FeedbackEntry) {
        self.by_name
            .insert(normalize_name(&entry.name), self.entries.len());
        self.entries.push(entry);
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn csv_error(&self, source: csv::Error) -> StoreError {
        StoreError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}

fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
