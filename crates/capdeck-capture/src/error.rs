// crates/capdeck-capture/src/error.rs

use thiserror::Error;

/// Everything that can go wrong on the device/codec side. Each variant maps
/// to a user-visible toast in the UI — device failures are never log-only.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device available")]
    NoDevice,

    #[error("device access failed: {0}")]
    DeviceAccess(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CaptureResult<T> = Result<T, CaptureError>;
