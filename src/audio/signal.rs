// Signal types - decoded audio and the segments cut from it

use crate::error::PipelineError;

/// Mono audio at a known sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSignal {
    samples: Vec<f32>,
    sample_rate: u32,
    source: String,
}

impl AudioSignal {
    /// Wrap decoded samples.
    ///
    /// # Arguments
    /// * `samples` - Mono samples, nominally in [-1.0, 1.0]
    /// * `sample_rate` - Sample rate in Hz (must be > 0)
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, PipelineError> {
        if sample_rate == 0 {
            return Err(PipelineError::fatal("audio sample rate must be > 0"));
        }
        Ok(Self {
            samples,
            sample_rate,
            source: String::from("<memory>"),
        })
    }

    /// Record where the samples came from (used in error reports).
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// A contiguous slice of an [`AudioSignal`], tagged with its ordinal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment<'a> {
    /// Position of this segment within its parent file (0..N-1)
    pub index: usize,
    /// Sample offset of the first sample in the parent signal
    pub offset: usize,
    pub sample_rate: u32,
    pub samples: &'a [f32],
}

impl Segment<'_> {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sample_rate_rejected() {
        assert!(AudioSignal::new(vec![0.0; 4], 0).is_err());
    }

    #[test]
    fn test_duration() {
        let signal = AudioSignal::new(vec![0.0; 44_100], 22_050).unwrap();
        assert_eq!(signal.len(), 44_100);
        assert!((signal.duration_secs() - 2.0).abs() < 1e-9);
        assert!(!signal.is_empty());
    }
}
