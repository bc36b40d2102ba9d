//! Error types for sample construction and format lookup

use thiserror::Error;

/// Errors raised while constructing or describing frame samples
///
/// Late or stale samples are not represented here: they are an expected
/// steady-state condition and are handled by the queue as a counted soft
/// drop rather than an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    /// Format tag is outside the supported set (or `Undefined`).
    ///
    /// The format enumeration is closed, so hitting this is a contract
    /// violation by the producing backend, not a runtime condition.
    #[error("pixel format is not part of the supported set")]
    UnknownFormat,

    /// Sample carries neither a pixel buffer nor a texture handle.
    #[error("sample carries neither a pixel buffer nor a texture handle")]
    MissingPixelSource,

    /// Buffer or output dimensions are zero.
    #[error("invalid sample dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Pixel buffer is smaller than the format's layout requires.
    #[error("pixel buffer holds {actual} bytes, layout requires at least {expected}")]
    BufferTooSmall { expected: usize, actual: usize },

    /// Row stride is too small to hold one row of texels.
    #[error("row stride {stride} is below the minimum {minimum} for this format")]
    StrideTooSmall { stride: u32, minimum: u32 },

    /// Tiling description with a zero grid or tile dimension.
    #[error("tiling description has a zero grid or tile dimension")]
    InvalidTiling,
}
