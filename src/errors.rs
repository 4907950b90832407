// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the filter pipeline
//!
//! Recoverable conditions are returned as `Result`s with one error enum per
//! subsystem. Broken invariants (corrupt parameter data, a field that was
//! never seeded, a texture cache that cannot be created on a live device) go
//! through [`fatal`], which logs and then terminates.

use crate::params::{ParameterField, ParameterType};
use thiserror::Error;

/// Errors at the parameter store boundary
#[derive(Debug, Error)]
pub enum ParameterError {
    /// Durable data for a key could not be decoded as its declared type
    #[error("stored value {raw:?} for {key} is not a valid {expected}")]
    Corrupt {
        key: String,
        raw: String,
        expected: ParameterType,
    },
    /// A value of the wrong kind was supplied for a field
    #[error("field {field:?} expects {expected}, got {actual}")]
    TypeMismatch {
        field: ParameterField,
        expected: ParameterType,
        actual: ParameterType,
    },
    /// Text given on the command line could not be parsed
    #[error("cannot parse {raw:?} as {expected}")]
    Parse { raw: String, expected: ParameterType },
    #[error("parameter file I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("parameter file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while binding a frame buffer pool
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("unsupported pixel format {0:?}")]
    UnsupportedFormat(crate::frame::PixelFormat),
    #[error("buffer count hint must be at least 1")]
    EmptyPool,
    #[error("frame dimensions {width}x{height} are empty")]
    EmptyFrame { width: u32, height: u32 },
    #[error("texture cache creation failed: {0}")]
    TextureCache(String),
}

/// Errors from pipeline construction and GPU dispatch
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no GPU adapter available: {0}")]
    NoAdapter(String),
    #[error("device request failed: {0}")]
    Device(String),
    #[error("kernel function {0:?} not found")]
    KernelNotFound(String),
    #[error("pipeline for {kernel} failed to build: {message}")]
    PipelineBuild { kernel: String, message: String },
    #[error("buffer readback failed: {0}")]
    Readback(String),
}

/// Configuration file errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration directory on this system")]
    NoConfigDir,
    #[error("config I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Image file load/save errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("image I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("image codec: {0}")]
    Image(#[from] image::ImageError),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Terminate on a broken invariant.
///
/// Logs the message at error level so it reaches the subscriber before the
/// panic unwinds.
#[track_caller]
pub fn fatal(message: impl AsRef<str>) -> ! {
    let message = message.as_ref();
    tracing::error!(fatal = true, "{}", message);
    panic!("{}", message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_messages() {
        let err = DispatchError::KernelNotFound("nope".into());
        assert_eq!(err.to_string(), "kernel function \"nope\" not found");
        let err = DispatchError::PipelineBuild {
            kernel: "sobel".into(),
            message: "bad binding".into(),
        };
        assert_eq!(err.to_string(), "pipeline for sobel failed to build: bad binding");
    }

    #[test]
    fn test_corrupt_message_names_key_and_type() {
        let err = ParameterError::Corrupt {
            key: "ABC_Width".into(),
            raw: "wide".into(),
            expected: ParameterType::Double,
        };
        let text = err.to_string();
        assert!(text.contains("ABC_Width"));
        assert!(text.contains("Double"));
    }

    #[test]
    #[should_panic(expected = "unseeded")]
    fn test_fatal_panics_with_message() {
        fatal("field was unseeded");
    }
}
