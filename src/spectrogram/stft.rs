// STFT module - centered short-time Fourier transform and its inverse
//
// Frames are taken from the signal zero-padded by n_fft / 2 on both sides, so
// frame t is centered on sample t * hop and a signal of `len` samples always
// yields `1 + len / hop` frames. The inverse is a windowed overlap-add
// normalized by the summed squared window.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Forward/inverse STFT with a fixed frame size, hop and periodic Hann window
pub struct StftProcessor {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    n_fft: usize,
    hop_length: usize,
    window: Vec<f32>,
}

impl StftProcessor {
    /// Create a new STFT processor
    ///
    /// # Arguments
    /// * `n_fft` - FFT size in samples (>= 2)
    /// * `hop_length` - Hop between frames in samples (>= 1)
    pub fn new(n_fft: usize, hop_length: usize) -> Self {
        let n_fft = n_fft.max(2);
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(n_fft);
        let inverse = planner.plan_fft_inverse(n_fft);

        Self {
            forward,
            inverse,
            n_fft,
            hop_length: hop_length.max(1),
            window: hann_window(n_fft),
        }
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Number of positive-frequency bins per frame
    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Number of frames produced for a signal of `len` samples
    pub fn frame_count(&self, len: usize) -> usize {
        1 + len / self.hop_length
    }

    /// Compute the complex STFT, one `Vec` of `n_bins` per frame
    pub fn forward(&self, signal: &[f32]) -> Vec<Vec<Complex<f32>>> {
        let pad = self.n_fft / 2;
        let n_frames = self.frame_count(signal.len());
        let mut frames = Vec::with_capacity(n_frames);
        let mut buffer = vec![Complex::new(0.0, 0.0); self.n_fft];

        for t in 0..n_frames {
            let start = t * self.hop_length;
            for (j, slot) in buffer.iter_mut().enumerate() {
                let sample = (start + j)
                    .checked_sub(pad)
                    .and_then(|idx| signal.get(idx))
                    .copied()
                    .unwrap_or(0.0);
                *slot = Complex::new(sample * self.window[j], 0.0);
            }
            self.forward.process(&mut buffer);
            frames.push(buffer[..self.n_bins()].to_vec());
        }

        frames
    }

    /// Power spectrum |X|^2 of every frame
    pub fn power(&self, signal: &[f32]) -> Vec<Vec<f32>> {
        self.forward(signal)
            .into_iter()
            .map(|frame| frame.iter().map(|c| c.norm_sqr()).collect())
            .collect()
    }

    /// Reconstruct a time-domain signal from STFT frames
    ///
    /// # Arguments
    /// * `frames` - Positive-frequency frames as produced by [`forward`](Self::forward)
    /// * `length` - Output length; defaults to `hop * (n_frames - 1)`
    pub fn inverse(&self, frames: &[Vec<Complex<f32>>], length: Option<usize>) -> Vec<f32> {
        if frames.is_empty() {
            return vec![0.0; length.unwrap_or(0)];
        }

        let n = self.n_fft;
        let pad = n / 2;
        let n_bins = self.n_bins();
        let total = n + self.hop_length * (frames.len() - 1);
        let mut output = vec![0.0f32; total];
        let mut window_sum = vec![0.0f32; total];
        let mut buffer = vec![Complex::new(0.0, 0.0); n];
        let scale = 1.0 / n as f32;

        for (t, frame) in frames.iter().enumerate() {
            for k in 0..n {
                buffer[k] = if k < n_bins {
                    frame.get(k).copied().unwrap_or_default()
                } else {
                    // Hermitian mirror of the positive half
                    frame.get(n - k).copied().unwrap_or_default().conj()
                };
            }
            // DC and Nyquist must be real for a real signal
            buffer[0].im = 0.0;
            if n % 2 == 0 {
                buffer[n / 2].im = 0.0;
            }
            self.inverse.process(&mut buffer);

            let start = t * self.hop_length;
            for j in 0..n {
                let w = self.window[j];
                output[start + j] += buffer[j].re * scale * w;
                window_sum[start + j] += w * w;
            }
        }

        for (sample, &wsum) in output.iter_mut().zip(window_sum.iter()) {
            if wsum > 1e-8 {
                *sample /= wsum;
            }
        }

        let length = length.unwrap_or(self.hop_length * (frames.len() - 1));
        let mut trimmed: Vec<f32> = output.into_iter().skip(pad).take(length).collect();
        trimmed.resize(length, 0.0);
        trimmed
    }
}

/// Periodic Hann window
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}
