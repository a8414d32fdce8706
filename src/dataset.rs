// Dataset module - the tabular metric data model and its TSV persistence
//
// This module is responsible for:
// 1. Defining the MetricRow record shared by collector and merger
// 2. Reading and writing tab-separated dataset files with a fixed header
// 3. Merging row sets with last-wins deduplication and timestamp ordering

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Snapshot filename: the rows collected by a single run, before merging.
/// Created by the collector and deleted by the merger within one invocation.
pub const SNAPSHOT_FILE: &str = "Metric.tsv";

/// Accumulated dataset filename: the long-lived, deduplicated, sorted table
/// of all historical rows.
pub const DATASET_FILE: &str = "Prometheus_data_set.tsv";

/// Header row required in both TSV files.
///
/// The second column is named `pod` for compatibility with existing
/// consumers, even though it holds any entity identifier.
pub const HEADER: &str = "timestamp\tpod\tmetric\tvalue";

/// Errors that can occur while reading, writing, or merging dataset files
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing or invalid header in '{path}': expected columns timestamp, pod, metric, value")]
    BadHeader { path: String },

    #[error("Malformed row at line {line} of '{path}': expected 4 tab-separated fields, got {fields}")]
    MalformedRow {
        path: String,
        line: usize,
        fields: usize,
    },
}

impl DatasetError {
    /// Wraps an I/O error with the path it occurred on
    fn io(path: &Path, source: std::io::Error) -> Self {
        DatasetError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// One collected sample: a single metric value attributed to one entity
/// at one minute-granular timestamp.
///
/// Rows are immutable once created. The `value` field is kept as the opaque
/// text Prometheus returned; downstream numeric expectations are unspecified,
/// so no parsing or validation is performed here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRow {
    /// Collection time in `YYYY-MM-DD HH:MM` format.
    /// String-lexicographic order on this format is also chronological.
    pub timestamp: String,

    /// Entity identifier, usually a pod name; "unknown" when the source
    /// series carried no pod label
    pub pod: String,

    /// Name of the query that produced this row (e.g. "cpu_usage")
    pub metric: String,

    /// Sample value exactly as returned by the source
    pub value: String,
}

impl MetricRow {
    /// Composite deduplication key: (timestamp, pod, metric)
    fn key(&self) -> (String, String, String) {
        (
            self.timestamp.clone(),
            self.pod.clone(),
            self.metric.clone(),
        )
    }

    /// Serializes the row as one TSV line (no trailing newline)
    fn to_tsv_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}",
            self.timestamp, self.pod, self.metric, self.value
        )
    }
}

/// Reads a TSV dataset file into rows
///
/// The first line must be exactly the expected header; every following
/// non-empty line must have exactly four tab-separated fields.
///
/// # Returns
/// * `Ok(Vec<MetricRow>)` - Parsed rows in file order (may be empty)
/// * `Err(DatasetError)` - File unreadable, header wrong, or a row malformed
pub fn read_tsv(path: &Path) -> Result<Vec<MetricRow>, DatasetError> {
    let contents = fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;

    let mut lines = contents.lines();

    match lines.next() {
        Some(header) if header == HEADER => {}
        _ => {
            return Err(DatasetError::BadHeader {
                path: path.display().to_string(),
            })
        }
    }

    let mut rows = Vec::new();

    for (index, line) in lines.enumerate() {
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 4 {
            return Err(DatasetError::MalformedRow {
                path: path.display().to_string(),
                // Line numbers are 1-based and the header is line 1
                line: index + 2,
                fields: fields.len(),
            });
        }

        rows.push(MetricRow {
            timestamp: fields[0].to_string(),
            pod: fields[1].to_string(),
            metric: fields[2].to_string(),
            value: fields[3].to_string(),
        });
    }

    Ok(rows)
}

/// Writes rows to a TSV file, overwriting any existing file
///
/// The header line is always written, so an empty row set produces a valid
/// header-only file. Parent directories are created if missing.
pub fn write_tsv(path: &Path, rows: &[MetricRow]) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| DatasetError::io(parent, e))?;
        }
    }

    let mut contents = String::with_capacity((rows.len() + 1) * 48);
    contents.push_str(HEADER);
    contents.push('\n');

    for row in rows {
        contents.push_str(&row.to_tsv_line());
        contents.push('\n');
    }

    fs::write(path, contents).map_err(|e| DatasetError::io(path, e))
}

/// Merges two row sequences with last-wins deduplication and sorts the
/// result ascending by timestamp
///
/// Rows are folded into a keyed map: each (timestamp, pod, metric) key owns
/// one slot, and a later row with the same key overwrites the slot in place.
/// Because `snapshot` follows `existing` in the fold, snapshot rows override
/// existing rows with the same key; existing rows are otherwise untouched.
///
/// The final stable sort keeps the relative order of rows sharing a
/// timestamp, so within one minute rows stay in source order.
///
/// Merging the same snapshot twice yields the same result as merging it
/// once (idempotence).
pub fn merge_rows(existing: Vec<MetricRow>, snapshot: Vec<MetricRow>) -> Vec<MetricRow> {
    let mut merged: Vec<MetricRow> = Vec::with_capacity(existing.len() + snapshot.len());
    let mut slots: HashMap<(String, String, String), usize> = HashMap::new();

    for row in existing.into_iter().chain(snapshot) {
        match slots.entry(row.key()) {
            // Later row wins: overwrite the slot, keep its position
            Entry::Occupied(slot) => merged[*slot.get()] = row,
            Entry::Vacant(slot) => {
                slot.insert(merged.len());
                merged.push(row);
            }
        }
    }

    merged.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    merged
}
