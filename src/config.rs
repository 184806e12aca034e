//! Configuration for the dataset build
//!
//! All transform parameters live in one immutable `AppConfig` value that is
//! built once per run and passed by reference into every component. Images
//! produced in a run therefore share one frequency-bin/time-frame geometry.
//! The configuration can be loaded from a JSON file; any missing field falls
//! back to the defaults below.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::PipelineError;

/// File extensions accepted as dataset images by downstream consumers.
pub const SUPPORTED_IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub segment: SegmentConfig,
    pub spectrogram: SpectrogramConfig,
    pub dataset: DatasetConfig,
    pub inversion: InversionConfig,
}

/// Segmentation parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmentConfig {
    /// Duration of each segment in seconds
    pub window_seconds: f32,
    /// Maximum number of segments taken from one file
    pub max_segments: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            window_seconds: 15.0,
            max_segments: 15,
        }
    }
}

/// How mel power values are mapped to 8-bit intensities.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Quantization {
    /// Round and clamp the raw power into 0..=255 with no scaling.
    Clip,
    /// Decibels relative to the segment maximum, mapped onto 0..=255.
    Decibel,
}

/// Mel spectrogram parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpectrogramConfig {
    /// Analysis sample rate; decoded audio is resampled to this rate
    pub sample_rate: u32,
    /// FFT size in samples (also the minimum segment length)
    pub n_fft: usize,
    /// Hop between consecutive frames in samples
    pub hop_length: usize,
    /// Number of mel bands (image height)
    pub n_mels: usize,
    /// Lowest filter edge in Hz
    pub fmin: f32,
    /// Highest filter edge in Hz (None = Nyquist)
    pub fmax: Option<f32>,
    pub quantization: Quantization,
    /// Dynamic range kept by decibel quantization
    pub top_db: f32,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            fmin: 0.0,
            fmax: None,
            quantization: Quantization::Clip,
            top_db: 80.0,
        }
    }
}

impl SpectrogramConfig {
    pub fn fmax_hz(&self) -> f32 {
        self.fmax.unwrap_or(self.sample_rate as f32 / 2.0)
    }
}

/// Encoded image container.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
        }
    }
}

/// Dataset layout and metadata parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatasetConfig {
    pub image_format: ImageFormat,
    /// JPEG quality (1-100), ignored for PNG
    pub jpeg_quality: u8,
    /// Append a counter to names already written during this run
    pub unique_names: bool,
    /// Number of underscore tokens used for the caption
    pub caption_tokens: usize,
    /// Text appended to every caption
    pub caption_suffix: String,
    /// Name of the metadata table written under the data root
    pub metadata_file: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            image_format: ImageFormat::Jpeg,
            jpeg_quality: 90,
            unique_names: false,
            caption_tokens: 2,
            caption_suffix: " spectrogram".to_string(),
            metadata_file: "metadata.csv".to_string(),
        }
    }
}

/// Spectrogram-to-audio reconstruction parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InversionConfig {
    /// Griffin-Lim iterations
    pub griffin_lim_iters: usize,
    /// Fast Griffin-Lim momentum (0 = classic Griffin-Lim)
    pub momentum: f32,
    /// Iterations of the non-negative mel-to-linear solver
    pub nnls_iters: usize,
    /// Run the spectral-gate noise reduction after reconstruction
    pub noise_reduction: bool,
    /// Fraction by which gated bins are attenuated (0.0 to 1.0)
    pub prop_decrease: f32,
    /// Gate threshold in standard deviations above the per-bin mean (dB)
    pub n_std_thresh: f32,
}

impl Default for InversionConfig {
    fn default() -> Self {
        Self {
            griffin_lim_iters: 32,
            momentum: 0.99,
            nnls_iters: 16,
            noise_reduction: true,
            prop_decrease: 0.9,
            n_std_thresh: 1.5,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// * `Ok(AppConfig)` - Loaded and validated configuration
    /// * `Err(PipelineError::FatalConfig)` - File unreadable, JSON invalid or
    ///   parameters out of range
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| {
            PipelineError::fatal(format!("cannot read config {}: {}", path.display(), err))
        })?;
        let config: AppConfig = serde_json::from_str(&contents).map_err(|err| {
            PipelineError::fatal(format!("cannot parse config {}: {}", path.display(), err))
        })?;
        config.validate()?;
        log::info!("[Config] Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Reject parameter combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let seg = &self.segment;
        if !(seg.window_seconds > 0.0) {
            return Err(PipelineError::fatal(format!(
                "segment.window_seconds must be > 0 (got {})",
                seg.window_seconds
            )));
        }
        if seg.max_segments == 0 {
            return Err(PipelineError::fatal("segment.max_segments must be >= 1"));
        }

        let spec = &self.spectrogram;
        if spec.sample_rate == 0 {
            return Err(PipelineError::fatal("spectrogram.sample_rate must be > 0"));
        }
        if spec.n_fft < 2 || spec.hop_length == 0 || spec.n_mels == 0 {
            return Err(PipelineError::fatal(
                "spectrogram.n_fft must be >= 2, hop_length and n_mels >= 1",
            ));
        }
        if spec.fmin < 0.0 || spec.fmax_hz() <= spec.fmin {
            return Err(PipelineError::fatal(format!(
                "spectrogram frequency range invalid: fmin={} fmax={}",
                spec.fmin,
                spec.fmax_hz()
            )));
        }
        if !(spec.top_db > 0.0) {
            return Err(PipelineError::fatal("spectrogram.top_db must be > 0"));
        }

        let ds = &self.dataset;
        if ds.jpeg_quality == 0 || ds.jpeg_quality > 100 {
            return Err(PipelineError::fatal("dataset.jpeg_quality must be in 1..=100"));
        }
        if ds.caption_tokens == 0 {
            return Err(PipelineError::fatal("dataset.caption_tokens must be >= 1"));
        }

        let inv = &self.inversion;
        if !(0.0..=1.0).contains(&inv.prop_decrease) {
            return Err(PipelineError::fatal("inversion.prop_decrease must be in 0..=1"));
        }
        if !(0.0..1.0).contains(&inv.momentum) {
            return Err(PipelineError::fatal("inversion.momentum must be in 0..1"));
        }

        Ok(())
    }
}
