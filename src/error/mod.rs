// Error types for the spectrogram dataset builder
//
// This module defines the closed set of failure conditions the pipeline can
// hit, each carrying a numeric code so the CLI and logs can report them
// uniformly.

mod pipeline;

pub use pipeline::{log_pipeline_error, ErrorClass, PipelineError, PipelineErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
