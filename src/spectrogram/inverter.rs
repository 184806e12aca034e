// Inverter module - approximate audio reconstruction from spectrogram images
//
// Pipeline: grayscale image -> mel power (dequantize) -> linear power
// (non-negative least squares against the mel filterbank) -> magnitude ->
// fast Griffin-Lim phase recovery -> optional spectral gate -> 16-bit WAV.
//
// Reconstruction is lossy by construction: quantization discards the absolute
// scale and the mel projection discards fine frequency detail. The result is
// meant for listening checks, not for round-trip fidelity.

use image::GrayImage;
use rand::Rng;
use rustfft::num_complex::Complex;
use std::f32::consts::PI;
use std::path::Path;

use crate::audio::write_wav;
use crate::config::{InversionConfig, SpectrogramConfig};
use crate::error::PipelineError;
use crate::spectrogram::denoise::SpectralGate;
use crate::spectrogram::mel::MelFilterbank;
use crate::spectrogram::stft::StftProcessor;
use crate::spectrogram::{dequantize, Spectrogram};

const EPSILON: f32 = 1e-16;

/// Converts mel spectrograms (or their images) back into waveforms
pub struct SpectrogramInverter {
    stft: StftProcessor,
    mel: MelFilterbank,
    spectrogram: SpectrogramConfig,
    inversion: InversionConfig,
}

impl SpectrogramInverter {
    /// Create an inverter for images produced with `spectrogram` parameters
    pub fn new(spectrogram: &SpectrogramConfig, inversion: &InversionConfig) -> Self {
        Self {
            stft: StftProcessor::new(spectrogram.n_fft, spectrogram.hop_length),
            mel: MelFilterbank::new(
                spectrogram.sample_rate,
                spectrogram.n_fft,
                spectrogram.n_mels,
                spectrogram.fmin,
                spectrogram.fmax_hz(),
            ),
            spectrogram: spectrogram.clone(),
            inversion: inversion.clone(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.spectrogram.sample_rate
    }

    /// Output length for a spectrogram with `n_frames` frames
    pub fn output_len(&self, n_frames: usize) -> usize {
        self.stft.hop_length() * n_frames.saturating_sub(1)
    }

    /// Estimate linear power frames from mel power
    ///
    /// Solves `min ||M x - y||^2, x >= 0` per frame with projected Landweber
    /// iterations, started from the band-average spread of `y` onto the bins.
    pub fn mel_to_linear(&self, spectrogram: &Spectrogram) -> Vec<Vec<f32>> {
        let band_weights = self.mel.band_weights();
        let bin_weights = self.mel.bin_weights();
        let max_row = band_weights.iter().copied().fold(0.0f32, f32::max);
        let max_col = bin_weights.iter().copied().fold(0.0f32, f32::max);
        let step = if max_row > 0.0 && max_col > 0.0 {
            1.0 / (max_row * max_col)
        } else {
            0.0
        };

        (0..spectrogram.n_frames())
            .map(|t| {
                let target = spectrogram.frame(t);

                let band_means: Vec<f32> = target
                    .iter()
                    .zip(band_weights.iter())
                    .map(|(&y, &w)| if w > 0.0 { y / w } else { 0.0 })
                    .collect();
                let mut linear: Vec<f32> = self
                    .mel
                    .apply_transpose(&band_means)
                    .into_iter()
                    .zip(bin_weights.iter())
                    .map(|(v, &w)| if w > 0.0 { v / w } else { 0.0 })
                    .collect();

                for _ in 0..self.inversion.nnls_iters {
                    let residual: Vec<f32> = self
                        .mel
                        .apply(&linear)
                        .into_iter()
                        .zip(target.iter())
                        .map(|(estimate, &y)| estimate - y)
                        .collect();
                    let gradient = self.mel.apply_transpose(&residual);
                    for (x, g) in linear.iter_mut().zip(gradient) {
                        *x = (*x - step * g).max(0.0);
                    }
                }

                linear
            })
            .collect()
    }

    /// Fast Griffin-Lim phase recovery
    ///
    /// # Arguments
    /// * `magnitudes` - Linear magnitude frames, `n_fft / 2 + 1` bins each
    /// * `rng` - Source of the random initial phase
    pub fn griffin_lim<R: Rng + ?Sized>(&self, magnitudes: &[Vec<f32>], rng: &mut R) -> Vec<f32> {
        let length = self.output_len(magnitudes.len());
        let mut angles: Vec<Vec<Complex<f32>>> = magnitudes
            .iter()
            .map(|frame| {
                frame
                    .iter()
                    .map(|_| Complex::from_polar(1.0, rng.gen_range(0.0..2.0 * PI)))
                    .collect()
            })
            .collect();

        let momentum = self.inversion.momentum / (1.0 + self.inversion.momentum);
        let mut previous: Vec<Vec<Complex<f32>>> = Vec::new();

        for _ in 0..self.inversion.griffin_lim_iters {
            let signal = self.stft.inverse(&apply_phase(magnitudes, &angles), Some(length));
            let rebuilt = self.stft.forward(&signal);

            for (t, frame) in angles.iter_mut().enumerate() {
                for (k, angle) in frame.iter_mut().enumerate() {
                    let current = rebuilt
                        .get(t)
                        .and_then(|f| f.get(k))
                        .copied()
                        .unwrap_or_default();
                    let prior = previous
                        .get(t)
                        .and_then(|f| f.get(k))
                        .copied()
                        .unwrap_or_default();
                    let next = current - prior * momentum;
                    *angle = next / (next.norm() + EPSILON);
                }
            }
            previous = rebuilt;
        }

        self.stft.inverse(&apply_phase(magnitudes, &angles), Some(length))
    }

    /// Reconstruct a waveform from a mel power spectrogram
    pub fn invert<R: Rng + ?Sized>(&self, spectrogram: &Spectrogram, rng: &mut R) -> Vec<f32> {
        let magnitudes: Vec<Vec<f32>> = self
            .mel_to_linear(spectrogram)
            .into_iter()
            .map(|frame| frame.into_iter().map(f32::sqrt).collect())
            .collect();
        let samples = self.griffin_lim(&magnitudes, rng);

        if self.inversion.noise_reduction {
            SpectralGate::from_config(
                self.spectrogram.n_fft,
                self.spectrogram.hop_length,
                &self.inversion,
            )
            .apply(&samples)
        } else {
            samples
        }
    }

    /// Reconstruct a waveform from a dataset image
    pub fn invert_image<R: Rng + ?Sized>(&self, image: &GrayImage, rng: &mut R) -> Vec<f32> {
        self.invert(&dequantize(image, &self.spectrogram), rng)
    }

    /// Read an image file, reconstruct it and write a 16-bit WAV
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of samples written
    /// * `Err(Decode)` - Image could not be read
    /// * `Err(Io)` - WAV could not be written
    pub fn invert_image_file<R: Rng + ?Sized>(
        &self,
        image_path: &Path,
        output_path: &Path,
        rng: &mut R,
    ) -> Result<usize, PipelineError> {
        let image = image::open(image_path)
            .map_err(|err| PipelineError::decode(image_path, err))?
            .to_luma8();
        log::info!(
            "[SpectrogramInverter] Inverting {:?} ({} frames x {} bands)",
            image_path,
            image.width(),
            image.height()
        );

        let samples = self.invert_image(&image, rng);
        write_wav(output_path, &samples, self.sample_rate())?;

        log::info!(
            "[SpectrogramInverter] Wrote {} samples to {:?}",
            samples.len(),
            output_path
        );
        Ok(samples.len())
    }
}

fn apply_phase(magnitudes: &[Vec<f32>], angles: &[Vec<Complex<f32>>]) -> Vec<Vec<Complex<f32>>> {
    magnitudes
        .iter()
        .zip(angles.iter())
        .map(|(mags, phases)| mags.iter().zip(phases.iter()).map(|(&m, &p)| p * m).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioSignal, SegmentSplitter};
    use crate::config::SegmentConfig;
    use crate::spectrogram::SpectrogramEncoder;
    use rand::{rngs::StdRng, SeedableRng};

    fn small_config() -> SpectrogramConfig {
        SpectrogramConfig {
            sample_rate: 8_000,
            n_fft: 256,
            hop_length: 64,
            n_mels: 40,
            ..SpectrogramConfig::default()
        }
    }

    fn quick_inversion(noise_reduction: bool) -> InversionConfig {
        InversionConfig {
            griffin_lim_iters: 8,
            nnls_iters: 8,
            noise_reduction,
            ..InversionConfig::default()
        }
    }

    fn tone(frequency: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * PI * frequency * i as f32 / 8_000.0).sin())
            .collect()
    }

    fn peak_band(spec: &Spectrogram) -> usize {
        let column = spec.frame(spec.n_frames() / 2);
        column
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn test_mel_to_linear_is_non_negative_and_improves_fit() {
        let config = small_config();
        let encoder = SpectrogramEncoder::new(&config);
        let spec = encoder.encode_samples(&tone(700.0, 2_000)).unwrap();

        let solved = SpectrogramInverter::new(&config, &quick_inversion(false));
        let initial = SpectrogramInverter::new(
            &config,
            &InversionConfig {
                nnls_iters: 0,
                ..quick_inversion(false)
            },
        );

        let linear = solved.mel_to_linear(&spec);
        assert_eq!(linear.len(), spec.n_frames());
        assert!(linear.iter().flatten().all(|&v| v >= 0.0));

        let frame = spec.n_frames() / 2;
        let target = spec.frame(frame);
        let residual = |estimate: &[f32]| -> f32 {
            solved
                .mel
                .apply(estimate)
                .iter()
                .zip(&target)
                .map(|(a, b)| (a - b).powi(2))
                .sum()
        };
        let before = residual(&initial.mel_to_linear(&spec)[frame]);
        let after = residual(&linear[frame]);
        assert!(after <= before * 1.0001, "residual {before} -> {after}");
    }

    #[test]
    fn test_output_length_follows_frame_count() {
        let config = small_config();
        let inverter = SpectrogramInverter::new(&config, &quick_inversion(true));
        let spec = Spectrogram::from_data(40, 21, vec![1.0; 40 * 21]);
        let mut rng = StdRng::seed_from_u64(1);
        let samples = inverter.invert(&spec, &mut rng);
        assert_eq!(samples.len(), 64 * 20);
        assert!(samples.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_reconstructed_tone_keeps_its_band() {
        let config = small_config();
        let encoder = SpectrogramEncoder::new(&config);
        let inverter = SpectrogramInverter::new(&config, &quick_inversion(false));
        let original = encoder.encode_samples(&tone(1_000.0, 4_000)).unwrap();

        let mut rng = StdRng::seed_from_u64(42);
        let samples = inverter.invert(&original, &mut rng);
        let rebuilt = encoder.encode_samples(&samples).unwrap();

        let (a, b) = (peak_band(&original), peak_band(&rebuilt));
        assert!(a.abs_diff(b) <= 1, "peak band moved from {a} to {b}");
    }

    #[test]
    fn test_same_seed_same_waveform() {
        let config = small_config();
        let inverter = SpectrogramInverter::new(&config, &quick_inversion(false));
        let spec = Spectrogram::from_data(40, 10, (0..400).map(|i| (i % 7) as f32).collect());
        let a = inverter.invert(&spec, &mut StdRng::seed_from_u64(9));
        let b = inverter.invert(&spec, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_invert_image_file_writes_wav() {
        let dir = std::env::temp_dir().join(format!("spectro_invert_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let image_path = dir.join("clip.png");
        let wav_path = dir.join("out/clip.wav");

        let config = small_config();
        let signal = AudioSignal::new(tone(440.0, 3_000), 8_000).unwrap();
        let splitter = SegmentSplitter::new(&SegmentConfig::default()).unwrap();
        let segments = splitter.split(&signal).unwrap();
        let spec = SpectrogramEncoder::new(&config).encode(&segments[0]).unwrap();
        crate::spectrogram::quantize(&spec, &config)
            .save(&image_path)
            .unwrap();

        let inverter = SpectrogramInverter::new(&config, &quick_inversion(true));
        let written = inverter
            .invert_image_file(&image_path, &wav_path, &mut StdRng::seed_from_u64(5))
            .unwrap();
        assert_eq!(written, 64 * (spec.n_frames() - 1));

        let reader = hound::WavReader::open(&wav_path).unwrap();
        assert_eq!(reader.spec().sample_rate, 8_000);
        assert_eq!(reader.spec().bits_per_sample, 16);
        assert_eq!(reader.len() as usize, written);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_unreadable_image_is_decode_error() {
        let config = small_config();
        let inverter = SpectrogramInverter::new(&config, &quick_inversion(false));
        let err = inverter
            .invert_image_file(
                Path::new("/nonexistent/spectro.png"),
                Path::new("/nonexistent/out.wav"),
                &mut StdRng::seed_from_u64(0),
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }
}
