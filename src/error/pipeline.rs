// Pipeline error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;
use std::path::Path;

/// Pipeline error code constants
///
/// Error code range: 3001-3005
pub struct PipelineErrorCodes {}

impl PipelineErrorCodes {
    /// Audio file decoded to zero samples
    pub const EMPTY_INPUT: i32 = 3001;

    /// Audio file could not be opened or decoded
    pub const DECODE_FAILED: i32 = 3002;

    /// Segment shorter than the transform window
    pub const INSUFFICIENT_SAMPLES: i32 = 3003;

    /// Filesystem read/write/mkdir failure
    pub const IO_FAILURE: i32 = 3004;

    /// Missing root directory or invalid configuration
    pub const FATAL_CONFIG: i32 = 3005;
}

/// How the driver reacts to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Skip the whole source file and continue with the next one.
    SkipFile,
    /// Skip a single segment of a file.
    SkipSegment,
    /// Skip one persisted artifact.
    SkipArtifact,
    /// Abort the run.
    Fatal,
}

/// Log a pipeline error with structured context
///
/// Logs the numeric code, the component and the message in one line so that
/// skipped items can be grepped out of a long batch log.
pub fn log_pipeline_error(err: &PipelineError, context: &str) {
    error!(
        "Pipeline error in {}: code={}, component=PipelineDriver, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Pipeline-related errors
///
/// Every per-item failure is one of the first four variants and is recovered
/// from at the driver level; only `FatalConfig` propagates to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Decoded signal contains no samples
    EmptyInput { path: String },

    /// File could not be decoded as audio
    Decode { path: String, reason: String },

    /// Segment shorter than the minimum transform window
    InsufficientSamples { required: usize, available: usize },

    /// Write, read or mkdir failure for one path
    Io { path: String, reason: String },

    /// Configuration-level failure (missing root, invalid parameters)
    FatalConfig { reason: String },
}

impl PipelineError {
    pub fn empty_input(path: &Path) -> Self {
        PipelineError::EmptyInput {
            path: path.display().to_string(),
        }
    }

    pub fn decode(path: &Path, reason: impl fmt::Display) -> Self {
        PipelineError::Decode {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn io(path: &Path, err: impl fmt::Display) -> Self {
        PipelineError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        PipelineError::FatalConfig {
            reason: reason.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            PipelineError::EmptyInput { .. } | PipelineError::Decode { .. } => {
                ErrorClass::SkipFile
            }
            PipelineError::InsufficientSamples { .. } => ErrorClass::SkipSegment,
            PipelineError::Io { .. } => ErrorClass::SkipArtifact,
            PipelineError::FatalConfig { .. } => ErrorClass::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }
}

impl ErrorCode for PipelineError {
    fn code(&self) -> i32 {
        match self {
            PipelineError::EmptyInput { .. } => PipelineErrorCodes::EMPTY_INPUT,
            PipelineError::Decode { .. } => PipelineErrorCodes::DECODE_FAILED,
            PipelineError::InsufficientSamples { .. } => PipelineErrorCodes::INSUFFICIENT_SAMPLES,
            PipelineError::Io { .. } => PipelineErrorCodes::IO_FAILURE,
            PipelineError::FatalConfig { .. } => PipelineErrorCodes::FATAL_CONFIG,
        }
    }

    fn message(&self) -> String {
        match self {
            PipelineError::EmptyInput { path } => {
                format!("No audio samples in {}", path)
            }
            PipelineError::Decode { path, reason } => {
                format!("Failed to decode {}: {}", path, reason)
            }
            PipelineError::InsufficientSamples {
                required,
                available,
            } => {
                format!(
                    "Insufficient samples: need {}, got {}",
                    required, available
                )
            }
            PipelineError::Io { path, reason } => {
                format!("I/O failure on {}: {}", path, reason)
            }
            PipelineError::FatalConfig { reason } => {
                format!("Invalid configuration: {}", reason)
            }
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PipelineError::{} (code {}): {}",
            self.variant_name(),
            self.code(),
            self.message()
        )
    }
}

impl PipelineError {
    fn variant_name(&self) -> &'static str {
        match self {
            PipelineError::EmptyInput { .. } => "EmptyInput",
            PipelineError::Decode { .. } => "Decode",
            PipelineError::InsufficientSamples { .. } => "InsufficientSamples",
            PipelineError::Io { .. } => "Io",
            PipelineError::FatalConfig { .. } => "FatalConfig",
        }
    }
}

impl std::error::Error for PipelineError {}
