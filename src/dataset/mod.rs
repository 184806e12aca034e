// Dataset module - on-disk layout of the spectrogram dataset
//
// - partition: which segment of a file goes to the test split
// - writer: image files under <data_root>/<split>/<label>/
// - metadata: metadata.csv over the finished tree
// - prune: remove non-image files from class directories

pub mod metadata;
pub mod partition;
pub mod prune;
pub mod writer;

pub use metadata::{MetadataExporter, MetadataRow};
pub use partition::{PartitionAssigner, Split};
pub use prune::prune_non_images;
pub use writer::DatasetWriter;

/// Directory name for a label (spaces become underscores)
pub fn label_dir_name(label: &str) -> String {
    label.trim().replace(' ', "_")
}
