// Merger module - folds a snapshot into the accumulated dataset
//
// This module is responsible for:
// 1. Loading the snapshot and the accumulated dataset
// 2. Merging them with last-wins deduplication and timestamp ordering
// 3. Overwriting the accumulated dataset and removing the consumed snapshot
//
// The whole operation is idempotent: merging the same snapshot twice leaves
// the dataset exactly as merging it once would.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{info, warn};

use crate::dataset::{self, DatasetError};

/// Merges a snapshot file into the accumulated dataset file
///
/// The accumulated file may not exist yet (first ever run); it is then
/// treated as an empty dataset and created by the merge. The snapshot file
/// must exist and parse.
///
/// After a successful merge the snapshot file is removed; a snapshot that
/// has already vanished by then is reported and ignored.
///
/// # Arguments
/// * `snapshot_path` - The freshly written snapshot (`Metric.tsv`)
/// * `dataset_path` - The long-lived dataset (`Prometheus_data_set.tsv`)
///
/// # Returns
/// * `Ok(usize)` - Number of rows in the dataset after the merge
/// * `Err(DatasetError)` - Snapshot unreadable, dataset unreadable/unwritable
pub fn merge_snapshot(snapshot_path: &Path, dataset_path: &Path) -> Result<usize, DatasetError> {
    let snapshot = dataset::read_tsv(snapshot_path)?;

    let existing = match dataset::read_tsv(dataset_path) {
        Ok(rows) => rows,
        Err(DatasetError::Io { ref source, .. }) if source.kind() == ErrorKind::NotFound => {
            info!(
                "No accumulated dataset at '{}' yet, starting fresh",
                dataset_path.display()
            );
            Vec::new()
        }
        Err(e) => return Err(e),
    };

    let existing_count = existing.len();
    let snapshot_count = snapshot.len();

    let merged = dataset::merge_rows(existing, snapshot);
    dataset::write_tsv(dataset_path, &merged)?;

    info!(
        "Merged {} snapshot row(s) into {} existing row(s): dataset now holds {} row(s)",
        snapshot_count,
        existing_count,
        merged.len()
    );

    remove_snapshot(snapshot_path)?;

    Ok(merged.len())
}

/// Removes the consumed snapshot file
///
/// A missing file is not an error: the run already merged its rows, so the
/// cleanup goal is met either way.
fn remove_snapshot(snapshot_path: &Path) -> Result<(), DatasetError> {
    match fs::remove_file(snapshot_path) {
        Ok(()) => {
            info!("Removed snapshot '{}'", snapshot_path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(
                "Snapshot '{}' does not exist, nothing to remove",
                snapshot_path.display()
            );
            Ok(())
        }
        Err(e) => Err(DatasetError::Io {
            path: snapshot_path.display().to_string(),
            source: e,
        }),
    }
}
