// Dataset writer - persists spectrogram images under the split/label layout
//
// Layout: <data_root>/<split>/<label>/<stem>-<idx>.<ext>
//
// The writer is shared by reference between pipeline workers. Directory
// creation is create-if-absent, so two workers racing on the same label
// directory both succeed.

use image::codecs::jpeg::JpegEncoder;
use image::GrayImage;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::{DatasetConfig, ImageFormat};
use crate::dataset::Split;
use crate::error::PipelineError;

pub struct DatasetWriter {
    data_root: PathBuf,
    format: ImageFormat,
    jpeg_quality: u8,
    /// Paths written during this run; only tracked when `unique_names` is on
    written: Option<Mutex<HashSet<PathBuf>>>,
}

impl DatasetWriter {
    /// Create a writer rooted at `data_root`
    pub fn new(data_root: impl Into<PathBuf>, config: &DatasetConfig) -> Self {
        Self {
            data_root: data_root.into(),
            format: config.image_format,
            jpeg_quality: config.jpeg_quality.clamp(1, 100),
            written: config.unique_names.then(|| Mutex::new(HashSet::new())),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Directory holding the images of one label in one split
    pub fn label_dir(&self, split: Split, label: &str) -> PathBuf {
        self.data_root.join(split.dir_name()).join(label)
    }

    /// Destination of segment `idx` of `stem`
    pub fn entry_path(&self, split: Split, label: &str, stem: &str, idx: usize) -> PathBuf {
        self.label_dir(split, label)
            .join(format!("{}-{}.{}", stem, idx, self.format.extension()))
    }

    /// Create a directory and its parents if missing
    pub fn ensure_dir(&self, dir: &Path) -> Result<(), PipelineError> {
        fs::create_dir_all(dir).map_err(|err| PipelineError::io(dir, err))
    }

    /// Write one spectrogram image
    ///
    /// # Returns
    /// * `Ok(PathBuf)` - Path actually written
    /// * `Err(Io)` - Directory creation, file creation or encoding failed
    pub fn write(
        &self,
        image: &GrayImage,
        split: Split,
        label: &str,
        stem: &str,
        idx: usize,
    ) -> Result<PathBuf, PipelineError> {
        let path = self.reserve(split, label, stem, idx);
        if let Some(parent) = path.parent() {
            self.ensure_dir(parent)?;
        }

        match self.format {
            ImageFormat::Jpeg => {
                let file = File::create(&path).map_err(|err| PipelineError::io(&path, err))?;
                let mut out = BufWriter::new(file);
                JpegEncoder::new_with_quality(&mut out, self.jpeg_quality)
                    .encode_image(image)
                    .map_err(|err| PipelineError::io(&path, err))?;
                out.flush().map_err(|err| PipelineError::io(&path, err))?;
            }
            ImageFormat::Png => {
                image
                    .save_with_format(&path, image::ImageFormat::Png)
                    .map_err(|err| PipelineError::io(&path, err))?;
            }
        }

        log::debug!("[DatasetWriter] Wrote {:?}", path);
        Ok(path)
    }

    /// Pick the output path, appending `_<n>` to the stem when the collision
    /// guard has already seen the plain name in this run.
    fn reserve(&self, split: Split, label: &str, stem: &str, idx: usize) -> PathBuf {
        let base = self.entry_path(split, label, stem, idx);
        let Some(written) = &self.written else {
            return base;
        };

        let mut written = written.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut path = base;
        let mut attempt = 1;
        while written.contains(&path) {
            log::warn!(
                "[DatasetWriter] {:?} already written in this run, renaming",
                path
            );
            path = self.entry_path(split, label, &format!("{}_{}", stem, attempt), idx);
            attempt += 1;
        }
        written.insert(path.clone());
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "spectro_writer_{}_{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| image::Luma([((x + y) * 8 % 256) as u8]))
    }

    #[test]
    fn test_entry_path_layout() {
        let writer = DatasetWriter::new("data", &DatasetConfig::default());
        assert_eq!(
            writer.entry_path(Split::Train, "calm_music", "song", 3),
            PathBuf::from("data/train/calm_music/song-3.jpeg")
        );

        let png = DatasetWriter::new(
            "data",
            &DatasetConfig {
                image_format: ImageFormat::Png,
                ..DatasetConfig::default()
            },
        );
        assert_eq!(
            png.entry_path(Split::Test, "x", "y", 0),
            PathBuf::from("data/test/x/y-0.png")
        );
    }

    #[test]
    fn test_ensure_dir_is_idempotent() {
        let root = temp_root("mkdir");
        let writer = DatasetWriter::new(&root, &DatasetConfig::default());
        let dir = writer.label_dir(Split::Train, "calm");
        writer.ensure_dir(&dir).unwrap();
        writer.ensure_dir(&dir).unwrap();
        assert!(dir.is_dir());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_write_jpeg_and_png() {
        let root = temp_root("formats");
        let image = gradient(20, 16);

        let jpeg = DatasetWriter::new(&root, &DatasetConfig::default());
        let path = jpeg.write(&image, Split::Train, "calm", "song", 0).unwrap();
        assert!(path.ends_with("train/calm/song-0.jpeg"));
        let read = image::open(&path).unwrap();
        assert_eq!((read.width(), read.height()), (20, 16));

        let png = DatasetWriter::new(
            &root,
            &DatasetConfig {
                image_format: ImageFormat::Png,
                ..DatasetConfig::default()
            },
        );
        let path = png.write(&image, Split::Test, "calm", "song", 1).unwrap();
        assert!(path.ends_with("test/calm/song-1.png"));
        // PNG is lossless
        assert_eq!(image::open(&path).unwrap().to_luma8(), image);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_rewrite_overwrites_without_guard() {
        let root = temp_root("overwrite");
        let writer = DatasetWriter::new(&root, &DatasetConfig::default());
        let image = gradient(8, 8);
        let a = writer.write(&image, Split::Train, "l", "s", 0).unwrap();
        let b = writer.write(&image, Split::Train, "l", "s", 0).unwrap();
        assert_eq!(a, b);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_collision_guard_renames_repeats() {
        let root = temp_root("guard");
        let writer = DatasetWriter::new(
            &root,
            &DatasetConfig {
                unique_names: true,
                ..DatasetConfig::default()
            },
        );
        let image = gradient(8, 8);
        let first = writer.write(&image, Split::Train, "l", "s", 0).unwrap();
        let second = writer.write(&image, Split::Train, "l", "s", 0).unwrap();
        let third = writer.write(&image, Split::Train, "l", "s", 0).unwrap();

        assert!(first.ends_with("train/l/s-0.jpeg"));
        assert!(second.ends_with("train/l/s_1-0.jpeg"));
        assert!(third.ends_with("train/l/s_2-0.jpeg"));
        assert!(first.exists() && second.exists() && third.exists());
        let _ = fs::remove_dir_all(&root);
    }
}
