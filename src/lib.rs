//! Media Sink Library
//!
//! A decoded-frame delivery and format-normalization pipeline. Decoder
//! backends hand frames over in whatever pixel encoding they natively
//! produce (packed or planar YUV, block-compressed textures, floating
//! point HDR) and the sink receives a uniform, correctly time-stamped,
//! correctly color-converted stream regardless of source format.
//!
//! The flow: a decoder constructs a [`FrameSample`] and pushes it into a
//! [`SampleQueue`]; the render side calls
//! [`SampleQueue::select_for_time`] with the presentation clock and gets
//! back the sample that belongs on screen, running the
//! [`SampleConverter`] first when the sample's format is not
//! renderer-native.

pub mod error;
pub mod queue;
pub mod sample;
pub mod telemetry;
pub mod texture;
pub mod time;

pub use error::SampleError;
pub use queue::{QueueConfig, SampleQueue};
pub use sample::{
    describe, ChannelLayout, ChromaSubsampling, ConvertError, Conversion, Converted, FormatInfo,
    FrameSample, FrameSampleBuilder, Orientation, PixelFormat, PixelSource, RgbaImage,
    SampleConverter, SamplePool, TilingDescription,
};
pub use telemetry::{init_logging, LogConfig, MetricsSnapshot, SinkMetrics};
pub use texture::{TextureDesc, TextureHandle, TextureRegistry, TextureUse};
pub use time::{MediaTime, TimeSource, Timecode};
