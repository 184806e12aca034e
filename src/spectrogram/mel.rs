// Mel filterbank - Slaney-style triangular filters with area normalization
//
// Filters are stored sparsely (first non-zero bin + weights) because each
// triangle only covers a small slice of the linear spectrum; applying them to
// a 1025-bin frame is then proportional to the filter widths instead of
// n_mels * n_bins.
//
// References:
// - Slaney, M. (1998). Auditory Toolbox, Technical Report #1998-010

/// Linear region of the Slaney mel scale: 200/3 Hz per mel
const F_SP: f32 = 200.0 / 3.0;
/// Frequency where the log region starts
const MIN_LOG_HZ: f32 = 1_000.0;
const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;

fn log_step() -> f32 {
    6.4f32.ln() / 27.0
}

/// Convert Hz to mels (Slaney scale)
pub fn hz_to_mel(hz: f32) -> f32 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

/// Convert mels to Hz (Slaney scale)
pub fn mel_to_hz(mel: f32) -> f32 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

#[derive(Debug, Clone)]
struct MelFilter {
    start: usize,
    weights: Vec<f32>,
}

/// Mel filterbank mapping `n_fft / 2 + 1` linear bins onto `n_mels` bands
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    filters: Vec<MelFilter>,
    n_bins: usize,
}

impl MelFilterbank {
    /// Build the filterbank
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate in Hz
    /// * `n_fft` - FFT size the linear spectrum was computed with
    /// * `n_mels` - Number of mel bands
    /// * `fmin` / `fmax` - Frequency range covered by the filters in Hz
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize, fmin: f32, fmax: f32) -> Self {
        let n_bins = n_fft / 2 + 1;
        let bin_hz = sample_rate as f32 / n_fft as f32;

        let mel_min = hz_to_mel(fmin);
        let mel_max = hz_to_mel(fmax);
        let edges: Vec<f32> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f32 / (n_mels + 1) as f32))
            .collect();

        let filters = (0..n_mels)
            .map(|m| {
                let (left, center, right) = (edges[m], edges[m + 1], edges[m + 2]);
                let enorm = 2.0 / (right - left);
                let dense: Vec<f32> = (0..n_bins)
                    .map(|k| {
                        let freq = k as f32 * bin_hz;
                        let lower = (freq - left) / (center - left);
                        let upper = (right - freq) / (right - center);
                        lower.min(upper).max(0.0) * enorm
                    })
                    .collect();

                match dense.iter().position(|&w| w > 0.0) {
                    Some(start) => {
                        let end = dense.iter().rposition(|&w| w > 0.0).unwrap_or(start);
                        MelFilter {
                            start,
                            weights: dense[start..=end].to_vec(),
                        }
                    }
                    // Band narrower than one FFT bin
                    None => MelFilter {
                        start: 0,
                        weights: Vec::new(),
                    },
                }
            })
            .collect();

        Self { filters, n_bins }
    }

    pub fn n_mels(&self) -> usize {
        self.filters.len()
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Project one linear power frame onto the mel bands
    pub fn apply(&self, frame: &[f32]) -> Vec<f32> {
        self.filters
            .iter()
            .map(|filter| {
                filter
                    .weights
                    .iter()
                    .zip(frame.iter().skip(filter.start))
                    .map(|(w, p)| w * p)
                    .sum()
            })
            .collect()
    }

    /// Transposed projection: spread mel band values back onto linear bins
    pub fn apply_transpose(&self, mel: &[f32]) -> Vec<f32> {
        let mut linear = vec![0.0f32; self.n_bins];
        for (filter, &value) in self.filters.iter().zip(mel.iter()) {
            for (offset, &w) in filter.weights.iter().enumerate() {
                linear[filter.start + offset] += w * value;
            }
        }
        linear
    }

    /// Sum of weights of each band (row sums of the filter matrix)
    pub fn band_weights(&self) -> Vec<f32> {
        self.filters.iter().map(|f| f.weights.iter().sum()).collect()
    }

    /// Sum of weights landing on each linear bin (column sums)
    pub fn bin_weights(&self) -> Vec<f32> {
        self.apply_transpose(&vec![1.0; self.filters.len()])
    }
}
