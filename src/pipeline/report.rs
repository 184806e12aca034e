// Run report - processed vs skipped counts for one pipeline run

use serde::Serialize;

use crate::dataset::Split;

/// Counters accumulated while building a dataset
///
/// Workers each fill their own report; the driver merges them after the join.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Source files that produced at least one segment
    pub files_processed: usize,
    /// Source files skipped (empty, undecodable)
    pub files_skipped: usize,
    /// Images written
    pub segments_written: usize,
    /// Segments dropped (too short, write failure)
    pub segments_skipped: usize,
    pub train_entries: usize,
    pub test_entries: usize,
    /// Requested labels whose directory was missing
    pub labels_skipped: Vec<String>,
    /// Rows in metadata.csv, when the export ran
    pub metadata_rows: Option<usize>,
}

impl RunReport {
    pub fn record_written(&mut self, split: Split) {
        self.segments_written += 1;
        match split {
            Split::Train => self.train_entries += 1,
            Split::Test => self.test_entries += 1,
        }
    }

    pub fn merge(&mut self, other: RunReport) {
        self.files_processed += other.files_processed;
        self.files_skipped += other.files_skipped;
        self.segments_written += other.segments_written;
        self.segments_skipped += other.segments_skipped;
        self.train_entries += other.train_entries;
        self.test_entries += other.test_entries;
        self.labels_skipped.extend(other.labels_skipped);
        if other.metadata_rows.is_some() {
            self.metadata_rows = other.metadata_rows;
        }
    }
}
