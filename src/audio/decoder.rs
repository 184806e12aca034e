// Decoder - turns an audio file on disk into a mono AudioSignal
//
// WAV files are read with hound; every other container (mp3, flac, ogg, ...)
// goes through symphonia's probe. Multi-channel audio is averaged to mono and
// the result is resampled to the analysis rate so that every segment in a run
// shares one sample rate.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::resampler::resample;
use crate::audio::signal::AudioSignal;
use crate::error::PipelineError;

/// Interleaved samples straight out of a container.
struct DecodedAudio {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: usize,
}

/// Decode an audio file into a mono signal at `target_rate`.
///
/// A file that decodes to zero samples is returned as an empty signal; the
/// segmenter reports it as `EmptyInput`.
pub fn decode_file(path: &Path, target_rate: u32) -> Result<AudioSignal, PipelineError> {
    let is_wav = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));

    let decoded = if is_wav {
        read_wav(path)?
    } else {
        read_compressed(path)?
    };

    if decoded.sample_rate == 0 {
        return Err(PipelineError::decode(path, "stream reports a 0 Hz sample rate"));
    }

    let mono = mix_to_mono(&decoded.samples, decoded.channels);
    let samples = resample(&mono, decoded.sample_rate, target_rate)
        .map_err(|err| PipelineError::decode(path, err))?;

    log::debug!(
        "[Decoder] {}: {} ch @ {} Hz -> {} samples @ {} Hz",
        path.display(),
        decoded.channels,
        decoded.sample_rate,
        samples.len(),
        target_rate
    );

    Ok(AudioSignal::new(samples, target_rate)?.with_source(path.display().to_string()))
}

fn read_wav(path: &Path) -> Result<DecodedAudio, PipelineError> {
    let reader = hound::WavReader::open(path).map_err(|err| PipelineError::decode(path, err))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()
            .map_err(|err| PipelineError::decode(path, err))?,
        hound::SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(PipelineError::decode(
                    path,
                    format!("unsupported bits per sample {}", spec.bits_per_sample),
                ));
            }
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / max))
                .collect::<Result<Vec<f32>, _>>()
                .map_err(|err| PipelineError::decode(path, err))?
        }
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels.max(1) as usize,
    })
}

fn read_compressed(path: &Path) -> Result<DecodedAudio, PipelineError> {
    let file = File::open(path).map_err(|err| PipelineError::decode(path, err))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| PipelineError::decode(path, err))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| PipelineError::decode(path, "no audio track found"))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| PipelineError::decode(path, "stream does not advertise a sample rate"))?;
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|err| PipelineError::decode(path, err))?;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(PipelineError::decode(path, err)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                channels = spec.channels.count().max(1);
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            // Corrupt frames are dropped, the rest of the stream is kept.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(err) => return Err(PipelineError::decode(path, err)),
        }
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

fn mix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("spectro-decoder-{}-{}", std::process::id(), name))
    }

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &sample in frames {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_mix_to_mono_averages_channels() {
        let stereo = [1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(mix_to_mono(&stereo, 2), vec![0.5, 0.5, 0.0]);
        assert_eq!(mix_to_mono(&stereo, 1), stereo.to_vec());
    }

    #[test]
    fn test_decode_mono_wav() {
        let path = temp_path("mono.wav");
        write_wav(&path, 1, 22_050, &[0, 16_384, -16_384, 32_767]);

        let signal = decode_file(&path, 22_050).unwrap();
        assert_eq!(signal.sample_rate(), 22_050);
        assert_eq!(signal.len(), 4);
        assert!((signal.samples()[1] - 0.5).abs() < 1e-4);
        assert!((signal.samples()[2] + 0.5).abs() < 1e-4);
        assert!(signal.source().ends_with("mono.wav"));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_decode_stereo_wav_mixes_down() {
        let path = temp_path("stereo.wav");
        write_wav(&path, 2, 22_050, &[16_384, 0, 16_384, 16_384]);

        let signal = decode_file(&path, 22_050).unwrap();
        assert_eq!(signal.len(), 2);
        assert!((signal.samples()[0] - 0.25).abs() < 1e-4);
        assert!((signal.samples()[1] - 0.5).abs() < 1e-4);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_zero_sample_wav_decodes_empty() {
        let path = temp_path("silent.wav");
        write_wav(&path, 1, 22_050, &[]);

        let signal = decode_file(&path, 22_050).unwrap();
        assert!(signal.is_empty());

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_zero_byte_file_is_decode_error() {
        let path = temp_path("zero.wav");
        std::fs::write(&path, b"").unwrap();

        let err = decode_file(&path, 22_050).unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
        assert!(!err.is_fatal());

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_garbage_mp3_is_decode_error() {
        let path = temp_path("garbage.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();

        let err = decode_file(&path, 22_050).unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));

        let _ = std::fs::remove_file(path);
    }
}
