// Spectro Dataset - audio to mel-spectrogram image dataset builder
// Batch pipeline: decode -> segment -> partition -> encode -> persist -> caption

// Module declarations
pub mod audio;
pub mod config;
pub mod dataset;
pub mod error;
pub mod pipeline;
pub mod spectrogram;

// Re-exports for convenience
pub use config::AppConfig;
pub use error::{ErrorCode, PipelineError};
pub use pipeline::{PipelineDriver, RunReport};
