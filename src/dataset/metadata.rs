// Metadata exporter - caption table over a finished dataset tree
//
// Output: <data_root>/metadata.csv
//
//   file_name,caption_column
//   train/0/0_0.jpeg,"0 0 spectrogram"
//
// Rows follow a fixed walk order (train then test, entries sorted by name) so
// re-running over an unchanged tree produces a byte-identical file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{DatasetConfig, SUPPORTED_IMAGE_EXTENSIONS};
use crate::dataset::Split;
use crate::error::PipelineError;

pub const METADATA_HEADER: &str = "file_name,caption_column";

/// One row of the metadata table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRow {
    /// Path relative to the data root, `/`-separated
    pub file_name: String,
    pub caption: String,
}

pub struct MetadataExporter {
    caption_tokens: usize,
    caption_suffix: String,
    file_name: String,
}

impl MetadataExporter {
    pub fn new(config: &DatasetConfig) -> Self {
        Self {
            caption_tokens: config.caption_tokens.max(1),
            caption_suffix: config.caption_suffix.clone(),
            file_name: config.metadata_file.clone(),
        }
    }

    /// Location of the metadata table under `data_root`
    pub fn output_path(&self, data_root: &Path) -> PathBuf {
        data_root.join(&self.file_name)
    }

    /// Caption for an entry, given its path below the split directory
    ///
    /// Path separators count as underscores, so `0/0_1.jpeg` yields tokens
    /// `0`, `0`, `1` and the caption `"0 0 spectrogram"`.
    pub fn caption(&self, below_split: &str) -> String {
        let without_ext = match below_split.rsplit_once('.') {
            Some((stem, ext)) if !ext.contains('/') => stem,
            _ => below_split,
        };
        let joined = without_ext.replace('/', "_");
        let tokens: Vec<&str> = joined.split('_').take(self.caption_tokens).collect();
        format!("{}{}", tokens.join(" "), self.caption_suffix)
    }

    /// Walk the tree and build the rows
    ///
    /// Missing split directories are skipped; unreadable ones are an error.
    pub fn collect(&self, data_root: &Path) -> Result<Vec<MetadataRow>, PipelineError> {
        let mut rows = Vec::new();

        for split in Split::ALL {
            let split_dir = data_root.join(split.dir_name());
            if !split_dir.is_dir() {
                log::debug!("[MetadataExporter] No {} directory under {:?}", split, data_root);
                continue;
            }

            for entry in sorted_entries(&split_dir)? {
                let name = file_name_of(&entry);
                if entry.is_dir() {
                    for file in sorted_entries(&entry)? {
                        if file.is_file() && is_image(&file) {
                            let below = format!("{}/{}", name, file_name_of(&file));
                            rows.push(self.row(split, &below));
                        }
                    }
                } else if entry.is_file() && is_image(&entry) {
                    rows.push(self.row(split, &name));
                }
            }
        }

        Ok(rows)
    }

    fn row(&self, split: Split, below_split: &str) -> MetadataRow {
        MetadataRow {
            file_name: format!("{}/{}", split.dir_name(), below_split),
            caption: self.caption(below_split),
        }
    }

    /// Render rows as CSV text (header included, `\n` after every row)
    pub fn render(rows: &[MetadataRow]) -> String {
        let mut out = String::with_capacity(32 * (rows.len() + 1));
        out.push_str(METADATA_HEADER);
        out.push('\n');
        for row in rows {
            out.push_str(&csv_field(&row.file_name, false));
            out.push(',');
            out.push_str(&csv_field(&row.caption, true));
            out.push('\n');
        }
        out
    }

    /// Write `metadata.csv` for the tree under `data_root`
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of rows written (header excluded)
    /// * `Err(Io)` - Tree could not be read or the table could not be written
    pub fn export(&self, data_root: &Path) -> Result<usize, PipelineError> {
        let rows = self.collect(data_root)?;
        let path = self.output_path(data_root);
        fs::write(&path, Self::render(&rows)).map_err(|err| PipelineError::io(&path, err))?;
        log::info!(
            "[MetadataExporter] Wrote {} rows to {:?}",
            rows.len(),
            path
        );
        Ok(rows.len())
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut entries = fs::read_dir(dir)
        .map_err(|err| PipelineError::io(dir, err))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| PipelineError::io(dir, err))?;
    entries.sort();
    Ok(entries)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Whether the file carries one of the accepted image extensions
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

fn csv_field(value: &str, always_quote: bool) -> String {
    let needs_quotes =
        always_quote || value.contains(',') || value.contains('"') || value.contains('\n');
    if needs_quotes {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
