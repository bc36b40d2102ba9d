//! Frame sample data model and format normalization
//!
//! Defines the uniform record decoder backends produce for every decoded
//! frame, the closed pixel-format registry describing its byte layout,
//! and the converter that normalizes non-native encodings to RGBA before
//! display.

mod convert;
mod format;
mod frame;

pub use convert::{
    conversion_for, decompress_lz4, decompress_snappy, ConvertError, Conversion, Converted,
    Packed422Order, RgbaImage, SampleConverter,
};
pub use format::{describe, ChannelLayout, ChromaSubsampling, FormatInfo, PixelFormat};
pub use frame::{
    FrameSample, FrameSampleBuilder, Orientation, PixelSource, SamplePool, TilingDescription,
    YUV_TO_RGB_REC709_SCALED, YUV_VIDEO_RANGE_OFFSET,
};
