// SegmentSplitter - cuts a signal into evenly spread fixed-length windows
//
// The signal is viewed as `total_windows = ceil(len / window)` back-to-back
// windows. When there are more windows than the per-file budget `K`, the K
// chosen windows are spread with equal gaps (window index floor(total * i / K))
// so a long recording contributes its beginning, middle and end rather than
// only its first K windows. With at most K windows every window is taken
// once. Start offsets are clamped so a slice never runs past the end of the
// signal; for a signal at least one window long every segment is exactly
// `window` samples.

use crate::audio::signal::{AudioSignal, Segment};
use crate::config::SegmentConfig;
use crate::error::PipelineError;

/// Splits signals into at most `max_segments` windows of a fixed duration.
#[derive(Debug, Clone)]
pub struct SegmentSplitter {
    window_seconds: f32,
    max_segments: usize,
}

impl SegmentSplitter {
    pub fn new(config: &SegmentConfig) -> Result<Self, PipelineError> {
        if !(config.window_seconds > 0.0) {
            return Err(PipelineError::fatal(format!(
                "segment window must be > 0 seconds (got {})",
                config.window_seconds
            )));
        }
        if config.max_segments == 0 {
            return Err(PipelineError::fatal("max segment count must be >= 1"));
        }
        Ok(Self {
            window_seconds: config.window_seconds,
            max_segments: config.max_segments,
        })
    }

    /// Window length in samples for a given sample rate.
    pub fn window_length(&self, sample_rate: u32) -> usize {
        (sample_rate as f64 * self.window_seconds as f64).floor() as usize
    }

    /// Window indices chosen for a signal of `total_windows` windows.
    pub fn window_indices(&self, total_windows: usize) -> Vec<usize> {
        let count = total_windows.min(self.max_segments);
        (0..count)
            .map(|i| {
                if total_windows > self.max_segments {
                    total_windows * i / self.max_segments
                } else {
                    i
                }
            })
            .collect()
    }

    /// Split a signal into ordered segments.
    ///
    /// # Returns
    /// * `Ok(segments)` - `min(ceil(len / window), K)` segments, or a single
    ///   segment holding everything when the signal is shorter than a window
    /// * `Err(PipelineError::EmptyInput)` - the signal has no samples
    pub fn split<'a>(&self, signal: &'a AudioSignal) -> Result<Vec<Segment<'a>>, PipelineError> {
        let samples = signal.samples();
        let len = samples.len();
        if len == 0 {
            return Err(PipelineError::EmptyInput {
                path: signal.source().to_string(),
            });
        }

        let window = self.window_length(signal.sample_rate());
        if window == 0 {
            return Err(PipelineError::fatal(format!(
                "segment window of {} s is shorter than one sample at {} Hz",
                self.window_seconds,
                signal.sample_rate()
            )));
        }

        if len < window {
            return Ok(vec![Segment {
                index: 0,
                offset: 0,
                sample_rate: signal.sample_rate(),
                samples,
            }]);
        }

        let total_windows = len.div_ceil(window);
        let last_start = len - window;

        let segments = self
            .window_indices(total_windows)
            .into_iter()
            .enumerate()
            .map(|(index, window_index)| {
                let offset = (window_index * window).min(last_start);
                Segment {
                    index,
                    offset,
                    sample_rate: signal.sample_rate(),
                    samples: &samples[offset..offset + window],
                }
            })
            .collect();

        Ok(segments)
    }
}
