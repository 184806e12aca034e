// Spectrogram module - mel power spectrograms of audio segments
//
// Module organization:
// - stft: centered STFT / inverse STFT on rustfft
// - mel: Slaney mel filterbank
// - quantize: mel power <-> 8-bit grayscale image
// - denoise: stationary spectral gate used after reconstruction
// - inverter: image -> mel -> linear -> Griffin-Lim -> waveform
// - mod.rs: Spectrogram matrix + SpectrogramEncoder

pub mod denoise;
pub mod inverter;
pub mod mel;
pub mod quantize;
pub mod stft;

pub use inverter::SpectrogramInverter;
pub use quantize::{dequantize, quantize};

use crate::audio::Segment;
use crate::config::SpectrogramConfig;
use crate::error::PipelineError;
use mel::MelFilterbank;
use stft::StftProcessor;

/// Mel power matrix, `n_mels` rows by `n_frames` columns, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    n_mels: usize,
    n_frames: usize,
    data: Vec<f32>,
}

impl Spectrogram {
    /// Wrap row-major data
    ///
    /// # Panics
    /// If `data.len() != n_mels * n_frames`.
    pub fn from_data(n_mels: usize, n_frames: usize, data: Vec<f32>) -> Self {
        assert_eq!(
            data.len(),
            n_mels * n_frames,
            "spectrogram data does not match shape ({n_mels}, {n_frames})"
        );
        Self {
            n_mels,
            n_frames,
            data,
        }
    }

    pub fn n_mels(&self) -> usize {
        self.n_mels
    }

    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    /// `(n_mels, n_frames)`
    pub fn shape(&self) -> (usize, usize) {
        (self.n_mels, self.n_frames)
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn get(&self, mel: usize, frame: usize) -> f32 {
        self.data[mel * self.n_frames + frame]
    }

    /// Mel column of one frame
    pub fn frame(&self, frame: usize) -> Vec<f32> {
        (0..self.n_mels).map(|m| self.get(m, frame)).collect()
    }

    pub fn max_value(&self) -> f32 {
        self.data.iter().copied().fold(0.0f32, f32::max)
    }
}

/// Computes mel power spectrograms with parameters fixed for a whole run
pub struct SpectrogramEncoder {
    stft: StftProcessor,
    mel: MelFilterbank,
    sample_rate: u32,
}

impl SpectrogramEncoder {
    pub fn new(config: &SpectrogramConfig) -> Self {
        Self {
            stft: StftProcessor::new(config.n_fft, config.hop_length),
            mel: MelFilterbank::new(
                config.sample_rate,
                config.n_fft,
                config.n_mels,
                config.fmin,
                config.fmax_hz(),
            ),
            sample_rate: config.sample_rate,
        }
    }

    /// Minimum number of samples a segment needs to be encoded
    pub fn min_samples(&self) -> usize {
        self.stft.n_fft()
    }

    /// Shape of the spectrogram for a segment of `len` samples
    pub fn output_shape(&self, len: usize) -> (usize, usize) {
        (self.mel.n_mels(), self.stft.frame_count(len))
    }

    /// Encode one segment
    ///
    /// # Returns
    /// * `Ok(Spectrogram)` - shape `(n_mels, 1 + len / hop_length)`, all values >= 0
    /// * `Err(InsufficientSamples)` - segment shorter than `n_fft`
    pub fn encode(&self, segment: &Segment<'_>) -> Result<Spectrogram, PipelineError> {
        if segment.sample_rate != self.sample_rate {
            return Err(PipelineError::fatal(format!(
                "segment sampled at {} Hz, encoder configured for {} Hz",
                segment.sample_rate, self.sample_rate
            )));
        }
        self.encode_samples(segment.samples)
    }

    pub fn encode_samples(&self, samples: &[f32]) -> Result<Spectrogram, PipelineError> {
        if samples.len() < self.min_samples() {
            return Err(PipelineError::InsufficientSamples {
                required: self.min_samples(),
                available: samples.len(),
            });
        }

        let power = self.stft.power(samples);
        let (n_mels, n_frames) = self.output_shape(samples.len());
        let mut data = vec![0.0f32; n_mels * n_frames];
        for (t, frame) in power.iter().enumerate() {
            for (m, value) in self.mel.apply(frame).into_iter().enumerate() {
                data[m * n_frames + t] = value.max(0.0);
            }
        }

        Ok(Spectrogram::from_data(n_mels, n_frames, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn small_config() -> SpectrogramConfig {
        SpectrogramConfig {
            sample_rate: 8_000,
            n_fft: 512,
            hop_length: 128,
            n_mels: 32,
            ..SpectrogramConfig::default()
        }
    }

    fn segment(samples: &[f32], sample_rate: u32) -> Segment<'_> {
        Segment {
            index: 0,
            offset: 0,
            sample_rate,
            samples,
        }
    }

    fn sine(frequency: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / 8_000.0).sin())
            .collect()
    }

    #[test]
    fn test_shape_depends_only_on_length() {
        let encoder = SpectrogramEncoder::new(&small_config());
        let mut rng = StdRng::seed_from_u64(7);
        let noise: Vec<f32> = (0..8_000).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let tone = sine(440.0, 8_000);
        let silence = vec![0.0; 8_000];

        let expected = (32, 1 + 8_000 / 128);
        for samples in [&noise, &tone, &silence] {
            let spec = encoder.encode(&segment(samples, 8_000)).unwrap();
            assert_eq!(spec.shape(), expected);
            assert!(spec.data().iter().all(|&v| v >= 0.0));
        }
    }

    #[test]
    #[should_panic(expected = "does not match shape")]
    fn test_from_data_rejects_wrong_length() {
        Spectrogram::from_data(4, 3, vec![0.0; 11]);
    }

    #[test]
    fn test_default_parameters_shape() {
        let encoder = SpectrogramEncoder::new(&SpectrogramConfig::default());
        assert_eq!(encoder.output_shape(22_050 * 15), (128, 647));
    }

    #[test]
    fn test_short_segment_is_insufficient() {
        let encoder = SpectrogramEncoder::new(&small_config());
        let samples = vec![0.1; 100];
        let err = encoder.encode(&segment(&samples, 8_000)).unwrap_err();
        assert_eq!(
            err,
            PipelineError::InsufficientSamples {
                required: 512,
                available: 100
            }
        );
    }

    #[test]
    fn test_sample_rate_mismatch_rejected() {
        let encoder = SpectrogramEncoder::new(&small_config());
        let samples = vec![0.0; 1_024];
        assert!(encoder.encode(&segment(&samples, 16_000)).is_err());
    }

    #[test]
    fn test_low_tone_energy_in_low_bands() {
        let encoder = SpectrogramEncoder::new(&small_config());
        let spec = encoder.encode_samples(&sine(200.0, 4_000)).unwrap();
        let column = spec.frame(spec.n_frames() / 2);
        let low: f32 = column[..8].iter().sum();
        let high: f32 = column[16..].iter().sum();
        assert!(low > high * 100.0, "low={low} high={high}");
    }
}
