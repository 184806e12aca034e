// Audio module - decoding, resampling and segmentation of source files

pub mod decoder;
pub mod resampler;
pub mod segmenter;
pub mod signal;
pub mod writer;

pub use decoder::decode_file;
pub use segmenter::SegmentSplitter;
pub use signal::{AudioSignal, Segment};
pub use writer::write_wav;
