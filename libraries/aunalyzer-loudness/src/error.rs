//! Error types for loudness measurement

use thiserror::Error;

/// Result type for loudness operations
pub type Result<T> = std::result::Result<T, LoudnessError>;

/// Errors raised by the loudness meter
///
/// Each message names the layer that failed: input rejected by the meter
/// itself, or a status code from the ebur128 engine.
#[derive(Error, Debug)]
pub enum LoudnessError {
    /// Interleaved input does not divide into whole frames
    #[error("Loudness meter error: sample count {samples} is not divisible by channel count {channels}")]
    PartialFrame { samples: usize, channels: u32 },

    /// Planar input has the wrong number of planes
    #[error("Loudness meter error: expected {expected} channel planes, got {actual}")]
    PlaneCount { expected: u32, actual: usize },

    /// Allocation failed, or the engine rejected its parameters
    #[error("libebur128 error: Not enough memory")]
    NoMem,

    /// Requested a measurement whose mode was not enabled
    #[error("libebur128 error: Invalid mode")]
    InvalidMode,

    /// Peak requested for a channel the meter does not have
    #[error("libebur128 error: Invalid channel index")]
    InvalidChannelIndex,
}

impl LoudnessError {
    /// Whether the engine, rather than the meter's own input checks, failed
    pub fn is_engine(&self) -> bool {
        matches!(
            self,
            Self::NoMem | Self::InvalidMode | Self::InvalidChannelIndex
        )
    }
}

impl From<ebur128::Error> for LoudnessError {
    fn from(err: ebur128::Error) -> Self {
        match err {
            ebur128::Error::NoMem => Self::NoMem,
            ebur128::Error::InvalidMode => Self::InvalidMode,
            ebur128::Error::InvalidChannelIndex => Self::InvalidChannelIndex,
        }
    }
}
