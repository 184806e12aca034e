// WAV writer for reconstructed audio

use std::path::Path;

use crate::error::PipelineError;

/// Write mono samples as 16-bit PCM. Samples outside [-1, 1] are clipped.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| PipelineError::io(parent, err))?;
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|err| PipelineError::io(path, err))?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        writer
            .write_sample(value)
            .map_err(|err| PipelineError::io(path, err))?;
    }
    writer.finalize().map_err(|err| PipelineError::io(path, err))
}
