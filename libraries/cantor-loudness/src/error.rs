//! Error types for loudness analysis

use thiserror::Error;

/// Result type for loudness operations
pub type Result<T> = std::result::Result<T, LoudnessError>;

/// Errors that can occur during loudness analysis
///
/// The measurement engine itself only ever fails with [`LoudnessError::SessionDisposed`].
/// Degenerate input (empty buffers, zero channels, zero sample rate) is not an error and
/// yields negative infinity loudness instead.
#[derive(Error, Debug)]
pub enum LoudnessError {
    /// A session was used after `dispose()`
    #[error("Loudness session has been disposed")]
    SessionDisposed,

    /// Channel map length does not match the channel count
    #[error("Channel map has {actual} entries but the stream has {expected} channels")]
    InvalidChannelMap { expected: u32, actual: usize },

    /// No samples were provided for analysis
    #[error("No audio samples provided for analysis")]
    NoSamples,

    /// Audio is completely silent
    #[error("Audio is silent (no loudness data available)")]
    SilentAudio,

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Unsupported file format
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Decoder failure
    #[error("Decode failed: {0}")]
    Decode(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<symphonia::core::errors::Error> for LoudnessError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        match err {
            symphonia::core::errors::Error::IoError(e) => Self::Io(e),
            symphonia::core::errors::Error::Unsupported(what) => {
                Self::UnsupportedFormat(what.to_string())
            }
            other => Self::Decode(other.to_string()),
        }
    }
}
