//! Audio resampling using rubato

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Resample mono audio from one sample rate to another.
///
/// Returns the input unchanged when the rates already match or there is
/// nothing to resample.
pub fn resample(samples: &[f32], from_sr: u32, to_sr: u32) -> Result<Vec<f32>, String> {
    if from_sr == to_sr || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_sr == 0 || to_sr == 0 {
        return Err(format!("cannot resample {from_sr} Hz -> {to_sr} Hz"));
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        to_sr as f64 / from_sr as f64,
        2.0,
        params,
        samples.len(),
        1,
    )
    .map_err(|err| err.to_string())?;

    // Output lags the input by the filter delay; flush until the tail is out.
    let delay = resampler.output_delay();
    let expected = expected_len(samples.len(), from_sr, to_sr);

    let input = vec![samples.to_vec()];
    let mut output = resampler
        .process(&input, None)
        .map_err(|err| err.to_string())?
        .into_iter()
        .next()
        .unwrap_or_default();

    // each flush yields about `expected` frames; short inputs need several
    let max_flushes = 2 + 2 * (delay + expected) / expected.max(1);
    let mut flushes = 0;
    while output.len() < delay + expected && flushes < max_flushes {
        let tail = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|err| err.to_string())?;
        output.extend(tail.into_iter().next().unwrap_or_default());
        flushes += 1;
    }

    let mut output = output.split_off(delay.min(output.len()));
    output.resize(expected, 0.0);
    Ok(output)
}

/// Output length for `len` input samples: `ceil(len * to / from)`
fn expected_len(len: usize, from_sr: u32, to_sr: u32) -> usize {
    let (from, to) = (from_sr as u64, to_sr as u64);
    ((len as u64 * to + from - 1) / from) as usize
}
