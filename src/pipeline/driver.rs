// Pipeline driver - raw label folders in, spectrogram dataset out
//
// Per label directory, every file is decoded, split into segments, assigned a
// test segment and encoded into images. Per-file and per-segment failures are
// logged and counted; only configuration-level problems end the run.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use tracing::{debug, info, warn};

use crate::audio::{decode_file, SegmentSplitter};
use crate::config::AppConfig;
use crate::dataset::{label_dir_name, DatasetWriter, MetadataExporter, PartitionAssigner};
use crate::error::{log_pipeline_error, PipelineError};
use crate::pipeline::RunReport;
use crate::spectrogram::{quantize, SpectrogramEncoder};

/// Components shared by every file of a run
struct RunContext<'a> {
    config: &'a AppConfig,
    splitter: SegmentSplitter,
    encoder: SpectrogramEncoder,
    writer: DatasetWriter,
    assigner: PartitionAssigner,
}

/// Builds a dataset from `<raw_root>/<label>/<files>`
pub struct PipelineDriver {
    raw_root: PathBuf,
    data_root: PathBuf,
    config: AppConfig,
    labels: Option<Vec<String>>,
    assigner: PartitionAssigner,
    jobs: usize,
    export_metadata: bool,
}

impl PipelineDriver {
    /// Create a driver with discovered labels, unseeded partitioning,
    /// one worker and metadata export enabled
    pub fn new(raw_root: impl Into<PathBuf>, data_root: impl Into<PathBuf>, config: AppConfig) -> Self {
        Self {
            raw_root: raw_root.into(),
            data_root: data_root.into(),
            config,
            labels: None,
            assigner: PartitionAssigner::new(),
            jobs: 1,
            export_metadata: true,
        }
    }

    /// Process only these labels (spaces become underscores)
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let labels: Vec<String> = labels
            .into_iter()
            .map(|label| label_dir_name(label.as_ref()))
            .filter(|label| !label.is_empty())
            .collect();
        if !labels.is_empty() {
            self.labels = Some(labels);
        }
        self
    }

    /// Make partitioning reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.assigner = PartitionAssigner::with_seed(seed);
        self
    }

    /// Number of worker threads per label (values below 1 are ignored)
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        if jobs > 0 {
            self.jobs = jobs;
        }
        self
    }

    pub fn with_metadata(mut self, export: bool) -> Self {
        self.export_metadata = export;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Labels to process: the explicit list, or the sorted subdirectories of
    /// the raw root (the data root excluded)
    pub fn resolve_labels(&self) -> Result<Vec<String>, PipelineError> {
        if let Some(labels) = &self.labels {
            return Ok(labels.clone());
        }

        let entries = fs::read_dir(&self.raw_root).map_err(|err| {
            PipelineError::fatal(format!(
                "cannot read raw root {}: {}",
                self.raw_root.display(),
                err
            ))
        })?;

        // The data root may live next to the label folders.
        let data_root = fs::canonicalize(&self.data_root).ok();

        let mut labels = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| PipelineError::fatal(err.to_string()))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if data_root.is_some() && fs::canonicalize(&path).ok() == data_root {
                debug!("[PipelineDriver] Skipping data root {:?} as a label", path);
                continue;
            }
            labels.push(entry.file_name().to_string_lossy().into_owned());
        }
        labels.sort();
        Ok(labels)
    }

    /// Run the whole build
    ///
    /// # Returns
    /// * `Ok(RunReport)` - Counts of processed and skipped items
    /// * `Err(FatalConfig)` - Invalid configuration, missing raw root or
    ///   uncreatable data root
    pub fn run(&self) -> Result<RunReport, PipelineError> {
        self.config.validate()?;
        if !self.raw_root.is_dir() {
            return Err(PipelineError::fatal(format!(
                "raw root {} does not exist or is not a directory",
                self.raw_root.display()
            )));
        }
        fs::create_dir_all(&self.data_root).map_err(|err| {
            PipelineError::fatal(format!(
                "cannot create data root {}: {}",
                self.data_root.display(),
                err
            ))
        })?;

        let ctx = RunContext {
            config: &self.config,
            splitter: SegmentSplitter::new(&self.config.segment)?,
            encoder: SpectrogramEncoder::new(&self.config.spectrogram),
            writer: DatasetWriter::new(&self.data_root, &self.config.dataset),
            assigner: self.assigner,
        };

        let labels = self.resolve_labels()?;
        info!(
            "[PipelineDriver] {} label(s) under {:?}, {} worker(s)",
            labels.len(),
            self.raw_root,
            self.jobs
        );

        let mut report = RunReport::default();
        for label in &labels {
            let label_dir = self.raw_root.join(label);
            if !label_dir.is_dir() {
                warn!("[PipelineDriver] Label directory {:?} missing, skipping", label_dir);
                report.labels_skipped.push(label.clone());
                continue;
            }

            info!("Starting: {}", label);
            match list_files(&label_dir) {
                Ok(files) => report.merge(self.process_label(&ctx, label, &files)),
                Err(err) => {
                    log_pipeline_error(&err, label);
                    report.labels_skipped.push(label.clone());
                }
            }
            info!("Finished: {}", label);
        }

        // All workers have joined at this point.
        if self.export_metadata {
            match MetadataExporter::new(&self.config.dataset).export(&self.data_root) {
                Ok(rows) => report.metadata_rows = Some(rows),
                Err(err) => log_pipeline_error(&err, "metadata export"),
            }
        }

        info!(
            "[PipelineDriver] Done: {} file(s) processed, {} skipped, {} image(s) written ({} train / {} test), {} segment(s) skipped",
            report.files_processed,
            report.files_skipped,
            report.segments_written,
            report.train_entries,
            report.test_entries,
            report.segments_skipped
        );
        Ok(report)
    }

    fn process_label(&self, ctx: &RunContext<'_>, label: &str, files: &[PathBuf]) -> RunReport {
        let workers = self.jobs.min(files.len());
        if workers <= 1 {
            let mut report = RunReport::default();
            for path in files {
                process_file(ctx, label, path, &mut report);
            }
            return report;
        }

        let next = AtomicUsize::new(0);
        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(|| {
                        let mut report = RunReport::default();
                        loop {
                            let i = next.fetch_add(1, Ordering::Relaxed);
                            let Some(path) = files.get(i) else { break };
                            process_file(ctx, label, path, &mut report);
                        }
                        report
                    })
                })
                .collect();

            let mut report = RunReport::default();
            for handle in handles {
                match handle.join() {
                    Ok(worker_report) => report.merge(worker_report),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            report
        })
    }
}

/// Decode, split, partition, encode and write one source file
fn process_file(ctx: &RunContext<'_>, label: &str, path: &Path, report: &mut RunReport) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    info!("[PipelineDriver] Processing {:?}", path);

    let segments = decode_file(path, ctx.config.spectrogram.sample_rate)
        .and_then(|signal| {
            let segments = ctx.splitter.split(&signal)?;
            let mut rng = ctx.assigner.file_rng(label, &stem);
            let splits = ctx.assigner.assign(segments.len(), &mut rng);

            let mut written = 0;
            for (segment, split) in segments.iter().zip(splits) {
                let result = ctx.encoder.encode(segment).and_then(|spectrogram| {
                    let image = quantize(&spectrogram, &ctx.config.spectrogram);
                    ctx.writer.write(&image, split, label, &stem, segment.index)
                });
                match result {
                    Ok(_) => {
                        report.record_written(split);
                        written += 1;
                    }
                    Err(err) => {
                        log_pipeline_error(&err, &format!("{} segment {}", path.display(), segment.index));
                        report.segments_skipped += 1;
                    }
                }
            }
            Ok(written)
        });

    match segments {
        Ok(written) => {
            report.files_processed += 1;
            debug!("[PipelineDriver] {:?}: {} image(s)", path, written);
        }
        Err(err) => {
            log_pipeline_error(&err, &path.display().to_string());
            report.files_skipped += 1;
        }
    }
}

/// Regular files of a label directory, sorted by name
fn list_files(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|err| PipelineError::io(dir, err))? {
        let path = entry.map_err(|err| PipelineError::io(dir, err))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SegmentConfig, SpectrogramConfig};
    use crate::dataset::Split;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "spectro_driver_{}_{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn small_config() -> AppConfig {
        AppConfig {
            segment: SegmentConfig {
                window_seconds: 1.0,
                max_segments: 15,
            },
            spectrogram: SpectrogramConfig {
                sample_rate: 8_000,
                n_fft: 512,
                hop_length: 128,
                n_mels: 32,
                ..SpectrogramConfig::default()
            },
            ..AppConfig::default()
        }
    }

    fn write_tone(path: &Path, seconds: f32, sample_rate: u32) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let len = (seconds * sample_rate as f32) as usize;
        for i in 0..len {
            let t = i as f32 / sample_rate as f32;
            let sample = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5;
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn count_files(dir: &Path) -> usize {
        fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
    }

    #[test]
    fn test_missing_raw_root_is_fatal() {
        let driver = PipelineDriver::new("/nonexistent/spectro/raw", temp_dir("fatal"), small_config());
        assert!(driver.run().unwrap_err().is_fatal());
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let mut config = small_config();
        config.segment.max_segments = 0;
        let raw = temp_dir("badcfg_raw");
        fs::create_dir_all(&raw).unwrap();
        let driver = PipelineDriver::new(&raw, temp_dir("badcfg_data"), config);
        assert!(driver.run().unwrap_err().is_fatal());
        let _ = fs::remove_dir_all(&raw);
    }

    #[test]
    fn test_builds_split_tree() {
        let raw = temp_dir("tree_raw");
        let data = temp_dir("tree_data");
        write_tone(&raw.join("calm/a.wav"), 4.0, 8_000);
        write_tone(&raw.join("calm/b.wav"), 2.5, 8_000);

        let report = PipelineDriver::new(&raw, &data, small_config())
            .with_seed(3)
            .run()
            .unwrap();

        // 4 + 3 segments, one test segment per file
        assert_eq!(report.files_processed, 2);
        assert_eq!(report.segments_written, 7);
        assert_eq!(report.test_entries, 2);
        assert_eq!(report.train_entries, 5);
        assert_eq!(report.metadata_rows, Some(7));
        assert_eq!(count_files(&data.join("train/calm")), 5);
        assert_eq!(count_files(&data.join("test/calm")), 2);

        let _ = fs::remove_dir_all(&raw);
        let _ = fs::remove_dir_all(&data);
    }

    #[test]
    fn test_missing_label_is_skipped() {
        let raw = temp_dir("labels_raw");
        let data = temp_dir("labels_data");
        write_tone(&raw.join("calm_music/a.wav"), 1.5, 8_000);

        let report = PipelineDriver::new(&raw, &data, small_config())
            .with_labels(["calm music", "angry"])
            .run()
            .unwrap();

        assert_eq!(report.labels_skipped, vec!["angry".to_string()]);
        assert_eq!(report.segments_written, 2);
        assert!(data.join("train/calm_music").is_dir() || data.join("test/calm_music").is_dir());

        let _ = fs::remove_dir_all(&raw);
        let _ = fs::remove_dir_all(&data);
    }

    #[test]
    fn test_write_failure_skips_segment_and_continues() {
        let raw = temp_dir("iofail_raw");
        let data = temp_dir("iofail_data");
        write_tone(&raw.join("calm/a.wav"), 3.0, 8_000);
        fs::create_dir_all(&data).unwrap();
        // train/ cannot be created as a directory
        fs::write(data.join("train"), b"not a directory").unwrap();

        let report = PipelineDriver::new(&raw, &data, small_config())
            .with_seed(5)
            .run()
            .expect("write failures are not fatal");

        assert_eq!(report.files_processed, 1);
        assert_eq!(report.files_skipped, 0);
        assert_eq!(report.segments_written, 1);
        assert_eq!(report.segments_skipped, 2);
        assert_eq!(report.test_entries, 1);
        assert_eq!(count_files(&data.join("test/calm")), 1);

        let _ = fs::remove_dir_all(&raw);
        let _ = fs::remove_dir_all(&data);
    }

    #[test]
    fn test_data_root_inside_raw_root_is_not_a_label() {
        let raw = temp_dir("nested_raw");
        let data = raw.join("data");
        write_tone(&raw.join("calm/a.wav"), 2.0, 8_000);

        let driver = PipelineDriver::new(&raw, &data, small_config()).with_seed(1);
        let first = driver.run().unwrap();
        assert_eq!(driver.resolve_labels().unwrap(), vec!["calm".to_string()]);

        // second run sees data/ (with metadata.csv) next to the labels
        let second = driver.run().unwrap();
        assert_eq!(first, second);
        assert_eq!(second.files_skipped, 0);
        assert_eq!(second.files_processed, 1);
        assert!(!data.join("train/data").exists());
        assert!(!data.join("test/data").exists());

        let _ = fs::remove_dir_all(&raw);
    }

    #[test]
    fn test_seeded_runs_match_across_worker_counts() {
        let raw = temp_dir("jobs_raw");
        for name in ["a", "b", "c", "d"] {
            write_tone(&raw.join(format!("calm/{name}.wav")), 3.0, 8_000);
        }

        let test_files = |jobs: usize| -> Vec<String> {
            let data = temp_dir(&format!("jobs_data_{jobs}"));
            PipelineDriver::new(&raw, &data, small_config())
                .with_seed(99)
                .with_jobs(jobs)
                .with_metadata(false)
                .run()
                .unwrap();
            let mut names: Vec<String> = fs::read_dir(data.join(Split::Test.dir_name()).join("calm"))
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            let _ = fs::remove_dir_all(&data);
            names
        };

        let sequential = test_files(1);
        let parallel = test_files(3);
        assert_eq!(sequential.len(), 4);
        assert_eq!(sequential, parallel);
        let _ = fs::remove_dir_all(&raw);
    }
}
