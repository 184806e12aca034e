// Quantize module - mel power <-> 8-bit grayscale
//
// Row y of the image is mel band y, column x is frame x. Both modes are
// lossy: `Clip` saturates every power above 255 and flattens everything below
// 0.5 to black; `Decibel` stores levels relative to the segment maximum,
// which itself is not kept anywhere.

use image::GrayImage;

use crate::config::{Quantization, SpectrogramConfig};
use crate::spectrogram::Spectrogram;

/// Floor applied before taking logarithms
const AMIN: f32 = 1e-10;

/// Convert a spectrogram into an 8-bit grayscale image
pub fn quantize(spectrogram: &Spectrogram, config: &SpectrogramConfig) -> GrayImage {
    let pixels: Vec<u8> = match config.quantization {
        Quantization::Clip => spectrogram
            .data()
            .iter()
            .map(|&p| p.round().clamp(0.0, 255.0) as u8)
            .collect(),
        Quantization::Decibel => {
            let reference = spectrogram.max_value();
            if reference <= 0.0 {
                vec![0; spectrogram.data().len()]
            } else {
                let top_db = config.top_db;
                spectrogram
                    .data()
                    .iter()
                    .map(|&p| {
                        let db = 10.0 * (p.max(AMIN) / reference).log10();
                        let db = db.clamp(-top_db, 0.0);
                        ((db + top_db) / top_db * 255.0).round() as u8
                    })
                    .collect()
            }
        }
    };

    // Buffer length always equals width * height.
    GrayImage::from_raw(
        spectrogram.n_frames() as u32,
        spectrogram.n_mels() as u32,
        pixels,
    )
    .unwrap_or_else(|| GrayImage::new(spectrogram.n_frames() as u32, spectrogram.n_mels() as u32))
}

/// Read intensities back as mel power
///
/// `Clip` images are taken at face value (intensity = power). `Decibel`
/// images are mapped back relative to a reference power of 1.0 because the
/// original reference was not stored.
pub fn dequantize(image: &GrayImage, config: &SpectrogramConfig) -> Spectrogram {
    let n_mels = image.height() as usize;
    let n_frames = image.width() as usize;
    let data: Vec<f32> = match config.quantization {
        Quantization::Clip => image.as_raw().iter().map(|&v| v as f32).collect(),
        Quantization::Decibel => {
            let top_db = config.top_db;
            image
                .as_raw()
                .iter()
                .map(|&v| {
                    let db = v as f32 / 255.0 * top_db - top_db;
                    10f32.powf(db / 10.0)
                })
                .collect()
        }
    };
    Spectrogram::from_data(n_mels, n_frames, data)
}
