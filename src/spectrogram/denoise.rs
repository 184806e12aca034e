// Denoise module - stationary spectral gate
//
// The noise floor is estimated from the signal itself: for every frequency bin
// the mean and standard deviation of its level (dB) over all frames give a
// threshold, and bins below it are attenuated. Griffin-Lim output carries a
// broadband phase-noise floor that this removes reasonably well.

use crate::config::InversionConfig;
use crate::spectrogram::stft::StftProcessor;

/// Magnitude floor before taking logarithms
const MIN_MAGNITUDE: f32 = 1e-10;

pub struct SpectralGate {
    stft: StftProcessor,
    n_std_thresh: f32,
    prop_decrease: f32,
}

impl SpectralGate {
    /// Create a gate
    ///
    /// # Arguments
    /// * `n_fft` / `hop_length` - STFT geometry used for the analysis
    /// * `n_std_thresh` - Threshold in standard deviations above the per-bin mean
    /// * `prop_decrease` - 1.0 removes gated bins entirely, 0.0 leaves them untouched
    pub fn new(n_fft: usize, hop_length: usize, n_std_thresh: f32, prop_decrease: f32) -> Self {
        Self {
            stft: StftProcessor::new(n_fft, hop_length),
            n_std_thresh,
            prop_decrease: prop_decrease.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(n_fft: usize, hop_length: usize, config: &InversionConfig) -> Self {
        Self::new(n_fft, hop_length, config.n_std_thresh, config.prop_decrease)
    }

    /// Per-bin gate thresholds in dB
    fn thresholds(&self, levels: &[Vec<f32>]) -> Vec<f32> {
        let n_bins = self.stft.n_bins();
        let count = levels.len().max(1) as f32;
        (0..n_bins)
            .map(|k| {
                let mean = levels.iter().map(|frame| frame[k]).sum::<f32>() / count;
                let variance = levels
                    .iter()
                    .map(|frame| (frame[k] - mean).powi(2))
                    .sum::<f32>()
                    / count;
                mean + self.n_std_thresh * variance.sqrt()
            })
            .collect()
    }

    /// Gate a waveform; output has the same length as the input
    pub fn apply(&self, signal: &[f32]) -> Vec<f32> {
        if signal.is_empty() {
            return Vec::new();
        }

        let mut frames = self.stft.forward(signal);
        let levels: Vec<Vec<f32>> = frames
            .iter()
            .map(|frame| {
                frame
                    .iter()
                    .map(|c| 20.0 * c.norm().max(MIN_MAGNITUDE).log10())
                    .collect()
            })
            .collect();
        let thresholds = self.thresholds(&levels);

        let gain = 1.0 - self.prop_decrease;
        for (frame, frame_levels) in frames.iter_mut().zip(levels.iter()) {
            for ((bin, &level), &threshold) in
                frame.iter_mut().zip(frame_levels.iter()).zip(thresholds.iter())
            {
                if level < threshold {
                    *bin *= gain;
                }
            }
        }

        self.stft.inverse(&frames, Some(signal.len()))
    }
}
