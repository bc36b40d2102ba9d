//! Decoded frame sample representation
//!
//! A [`FrameSample`] is one decoded unit of video or image data plus the
//! metadata a sink needs to display it: dimensions, stride, format tag,
//! presentation time, duration, orientation, and color-space matrices.
//! Samples are constructed by decoder backends, pushed into the sample
//! queue, and read-only from then on.
//!
//! Pixel data lives either in a CPU buffer or in a renderer-side texture,
//! never both; [`PixelSource`] enforces that structurally.

use bytes::Bytes;
use glam::{Mat2, Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::SampleError;
use crate::sample::convert::{conversion_for, Conversion};
use crate::sample::format::{describe, PixelFormat};
use crate::texture::TextureHandle;
use crate::time::{MediaTime, Timecode};

/// Image orientation relative to the physically stored pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    /// Stored as displayed.
    #[default]
    Original,
    /// Rotate 90 degrees clockwise to display.
    Cw90,
    /// Rotate 180 degrees to display.
    Cw180,
    /// Rotate 270 degrees clockwise to display.
    Cw270,
}

/// Tile grid metadata for tiled image-sequence sources.
///
/// Absent on ordinary samples; a frame carrying one is split into a grid
/// of sub-images with a shared per-tile border.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingDescription {
    /// Grid dimensions in tiles (columns, rows).
    pub tile_count: (u32, u32),
    /// Size of one tile in pixels.
    pub tile_size: (u32, u32),
    /// Border around each tile in pixels.
    pub border: u32,
}

impl TilingDescription {
    /// A description is valid iff grid and tile dimensions are all
    /// strictly positive.
    pub fn is_valid(&self) -> bool {
        self.tile_count.0 > 0 && self.tile_count.1 > 0 && self.tile_size.0 > 0 && self.tile_size.1 > 0
    }
}

/// Where a sample's pixels live.
///
/// Exactly one variant per sample: either a CPU buffer valid for the
/// sample's lifetime, or a non-owning handle to a renderer-side texture.
#[derive(Debug, Clone)]
pub enum PixelSource {
    /// CPU pixel buffer with its row stride in bytes.
    Buffer { data: Bytes, stride: u32 },
    /// Renderer-side texture; lifetime managed by the texture registry.
    Texture(TextureHandle),
}

/// YUV-to-RGB matrix for Rec.709 video-range sources, scaled.
///
/// Rows are the R, G, B formulas applied to `(Y, Cb, Cr, _)` after the
/// video-range offset is subtracted; see [`YUV_VIDEO_RANGE_OFFSET`].
pub const YUV_TO_RGB_REC709_SCALED: Mat4 = Mat4::from_cols(
    Vec4::new(1.164_383_6, 1.164_383_6, 1.164_383_6, 0.0),
    Vec4::new(0.0, -0.213_237_02, 2.112_419_3, 0.0),
    Vec4::new(1.792_652_3, -0.533_004_04, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 0.0, 0.0),
);

/// Offset subtracted from normalized video-range YCbCr before the matrix
/// is applied: 16/255 for luma, 128/255 for chroma.
pub const YUV_VIDEO_RANGE_OFFSET: Vec3 = Vec3::new(0.062_745_1, 0.501_960_8, 0.501_960_8);

/// One decoded frame plus its display metadata.
///
/// Immutable after construction; build through [`FrameSample::builder`],
/// which validates every invariant atomically so a consumer can never
/// observe a partially constructed sample.
#[derive(Debug, Clone)]
pub struct FrameSample {
    source: Option<PixelSource>,
    dim: (u32, u32),
    output_dim: (u32, u32),
    format: PixelFormat,
    num_mips: u8,
    tiling: Option<TilingDescription>,
    orientation: Orientation,
    time: MediaTime,
    timecode: Option<Timecode>,
    duration: MediaTime,
    cacheable: bool,
    output_srgb: bool,
    aspect_ratio: Option<f64>,
    scale_rotation: Mat2,
    offset: Vec2,
    yuv_to_rgb: Mat4,
}

impl FrameSample {
    /// Start building a sample of the given format and presentation time.
    pub fn builder(format: PixelFormat, time: MediaTime) -> FrameSampleBuilder {
        FrameSampleBuilder::new(format, time)
    }

    /// The sample's frame buffer and row stride, if pixels live on the
    /// CPU. `None` iff the sample holds a texture instead.
    ///
    /// The returned buffer is only valid for the lifetime of the sample.
    pub fn buffer(&self) -> Option<(&Bytes, u32)> {
        match &self.source {
            Some(PixelSource::Buffer { data, stride }) => Some((data, *stride)),
            _ => None,
        }
    }

    /// The sample's texture handle, if pixels live on the renderer.
    /// `None` iff the sample holds a CPU buffer instead.
    pub fn texture(&self) -> Option<TextureHandle> {
        match &self.source {
            Some(PixelSource::Texture(handle)) => Some(*handle),
            _ => None,
        }
    }

    /// Buffer dimensions in texels. May exceed the output dimensions
    /// because of padding some formats require.
    pub fn dim(&self) -> (u32, u32) {
        self.dim
    }

    /// The visually meaningful output dimensions in pixels.
    pub fn output_dim(&self) -> (u32, u32) {
        self.output_dim
    }

    /// Pixel format tag.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Number of mip levels encoded in the sample, including base.
    pub fn num_mips(&self) -> u8 {
        self.num_mips
    }

    /// Tiling metadata, present only on tiled image-sequence samples.
    pub fn tiling(&self) -> Option<TilingDescription> {
        self.tiling
    }

    /// Image orientation relative to the stored pixel data.
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Presentation timestamp on the player's local clock.
    pub fn time(&self) -> MediaTime {
        self.time
    }

    /// Wall-clock timecode, when the source carries one.
    pub fn timecode(&self) -> Option<Timecode> {
        self.timecode
    }

    /// How long the sample stays valid. [`MediaTime::ZERO`] means "until
    /// the next sample's timestamp"; the queue selector special-cases it.
    pub fn duration(&self) -> MediaTime {
        self.duration
    }

    /// Whether the sample may be retained and redisplayed after a newer
    /// sample exists. Non-cacheable samples are display-once.
    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    /// Whether the sample's output is in sRGB color space.
    pub fn is_output_srgb(&self) -> bool {
        self.output_srgb
    }

    /// Pixel aspect ratio.
    ///
    /// Defaults to output width over output height; an explicit override
    /// (anamorphic sources) takes precedence and need not match the raw
    /// dimension ratio. The builder rejects zero output dimensions, so
    /// the default computation cannot divide by zero.
    pub fn aspect_ratio(&self) -> f64 {
        match self.aspect_ratio {
            Some(ratio) => ratio,
            None => self.output_dim.0 as f64 / self.output_dim.1 as f64,
        }
    }

    /// Scale-rotation applied for "external image" passthrough display.
    /// Identity unless the backend set one; intended as mutually
    /// exclusive with [`orientation`](Self::orientation).
    pub fn scale_rotation(&self) -> Mat2 {
        self.scale_rotation
    }

    /// Offset applied after the scale-rotation for passthrough display.
    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    /// The YUV-to-RGB conversion matrix, consumed only when the format is
    /// a YUV family. Defaults to [`YUV_TO_RGB_REC709_SCALED`].
    pub fn yuv_to_rgb_matrix(&self) -> &Mat4 {
        &self.yuv_to_rgb
    }

    /// Conversion capability for this sample's format.
    ///
    /// `Some` exactly when the format is not renderer-native; the sink
    /// must run the converter before treating such a sample as
    /// displayable RGB.
    pub fn conversion(&self) -> Option<Conversion> {
        conversion_for(self.format)
    }

    /// Return the sample to construction defaults so a pool can recycle
    /// the instance without reallocation of the sample itself.
    ///
    /// After `reset` every accessor reports defaults and the sample is no
    /// longer usable until rebuilt through the pool's builder path.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Default for FrameSample {
    fn default() -> Self {
        Self {
            source: None,
            dim: (0, 0),
            output_dim: (0, 0),
            format: PixelFormat::Undefined,
            num_mips: 1,
            tiling: None,
            orientation: Orientation::Original,
            time: MediaTime::ZERO,
            timecode: None,
            duration: MediaTime::ZERO,
            cacheable: true,
            output_srgb: true,
            aspect_ratio: None,
            scale_rotation: Mat2::IDENTITY,
            offset: Vec2::ZERO,
            yuv_to_rgb: YUV_TO_RGB_REC709_SCALED,
        }
    }
}

/// Builder for [`FrameSample`].
///
/// `build` validates the whole record at once: a sample either comes out
/// fully populated or not at all.
#[derive(Debug)]
pub struct FrameSampleBuilder {
    sample: FrameSample,
}

impl FrameSampleBuilder {
    fn new(format: PixelFormat, time: MediaTime) -> Self {
        Self {
            sample: FrameSample {
                format,
                time,
                ..FrameSample::default()
            },
        }
    }

    /// Attach a CPU pixel buffer with its row stride in bytes.
    pub fn buffer(mut self, data: Bytes, stride: u32) -> Self {
        self.sample.source = Some(PixelSource::Buffer { data, stride });
        self
    }

    /// Attach a renderer-side texture handle.
    pub fn texture(mut self, handle: TextureHandle) -> Self {
        self.sample.source = Some(PixelSource::Texture(handle));
        self
    }

    /// Buffer dimensions in texels; also the output dimensions unless
    /// [`output_dim`](Self::output_dim) narrows them.
    pub fn dim(mut self, width: u32, height: u32) -> Self {
        self.sample.dim = (width, height);
        if self.sample.output_dim == (0, 0) {
            self.sample.output_dim = (width, height);
        }
        self
    }

    /// The visually meaningful sub-rectangle of the buffer.
    pub fn output_dim(mut self, width: u32, height: u32) -> Self {
        self.sample.output_dim = (width, height);
        self
    }

    /// Mip levels encoded in the sample (default 1).
    pub fn num_mips(mut self, mips: u8) -> Self {
        self.sample.num_mips = mips;
        self
    }

    /// Tiling metadata for tiled image-sequence sources.
    pub fn tiling(mut self, tiling: TilingDescription) -> Self {
        self.sample.tiling = Some(tiling);
        self
    }

    /// Image orientation (default [`Orientation::Original`]).
    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.sample.orientation = orientation;
        self
    }

    /// Wall-clock timecode.
    pub fn timecode(mut self, timecode: Timecode) -> Self {
        self.sample.timecode = Some(timecode);
        self
    }

    /// Validity duration; zero means "until the next sample".
    pub fn duration(mut self, duration: MediaTime) -> Self {
        self.sample.duration = duration;
        self
    }

    /// Cacheability (default true). Non-cacheable samples are superseded
    /// the moment a newer sample arrives.
    pub fn cacheable(mut self, cacheable: bool) -> Self {
        self.sample.cacheable = cacheable;
        self
    }

    /// Whether output is sRGB (default true).
    pub fn output_srgb(mut self, srgb: bool) -> Self {
        self.sample.output_srgb = srgb;
        self
    }

    /// Override the pixel aspect ratio for non-square-pixel sources.
    pub fn aspect_ratio(mut self, ratio: f64) -> Self {
        self.sample.aspect_ratio = Some(ratio);
        self
    }

    /// Scale-rotation for external-image passthrough display.
    pub fn scale_rotation(mut self, matrix: Mat2) -> Self {
        self.sample.scale_rotation = matrix;
        self
    }

    /// Offset applied after the scale-rotation.
    pub fn offset(mut self, offset: Vec2) -> Self {
        self.sample.offset = offset;
        self
    }

    /// YUV-to-RGB matrix for YUV-family formats (default Rec.709 scaled).
    pub fn yuv_to_rgb(mut self, matrix: Mat4) -> Self {
        self.sample.yuv_to_rgb = matrix;
        self
    }

    /// Validate and finish the sample.
    pub fn build(self) -> Result<FrameSample, SampleError> {
        let sample = self.sample;
        let info = describe(sample.format)?;

        let (width, height) = sample.dim;
        if width == 0 || height == 0 {
            return Err(SampleError::InvalidDimensions { width, height });
        }
        let (out_w, out_h) = sample.output_dim;
        if out_w == 0 || out_h == 0 {
            return Err(SampleError::InvalidDimensions {
                width: out_w,
                height: out_h,
            });
        }

        if let Some(tiling) = &sample.tiling {
            if !tiling.is_valid() {
                return Err(SampleError::InvalidTiling);
            }
        }

        match &sample.source {
            None => return Err(SampleError::MissingPixelSource),
            Some(PixelSource::Texture(_)) => {}
            Some(PixelSource::Buffer { data, stride }) => {
                let min_stride = info.min_stride(width);
                if *stride < min_stride {
                    return Err(SampleError::StrideTooSmall {
                        stride: *stride,
                        minimum: min_stride,
                    });
                }
                let expected = info.min_buffer_len(sample.dim, *stride);
                if data.len() < expected {
                    return Err(SampleError::BufferTooSmall {
                        expected,
                        actual: data.len(),
                    });
                }
            }
        }

        Ok(sample)
    }
}

/// Free-list of recycled sample instances.
///
/// Backends that allocate a sample per decoded frame at high rates can
/// return spent samples here; [`SamplePool::acquire`] hands back a reset
/// instance for the builder to repopulate.
#[derive(Debug, Default)]
pub struct SamplePool {
    free: Vec<FrameSample>,
    capacity: usize,
}

impl SamplePool {
    /// Create a pool retaining at most `capacity` spent samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Take a reset sample from the free list, if one is available.
    pub fn acquire(&mut self) -> Option<FrameSample> {
        self.free.pop()
    }

    /// Reset a spent sample and keep it for reuse. Samples beyond the
    /// pool capacity are dropped.
    pub fn recycle(&mut self, mut sample: FrameSample) {
        if self.free.len() < self.capacity {
            sample.reset();
            self.free.push(sample);
        }
    }

    /// Number of samples currently pooled.
    pub fn len(&self) -> usize {
        self.free.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bgra_buffer(width: u32, height: u32) -> Bytes {
        Bytes::from(vec![0u8; (width * height * 4) as usize])
    }

    #[test]
    fn buffer_and_texture_are_mutually_exclusive() {
        let sample = FrameSample::builder(PixelFormat::Bgra, MediaTime::ZERO)
            .dim(64, 32)
            .buffer(bgra_buffer(64, 32), 64 * 4)
            .build()
            .unwrap();

        assert!(sample.buffer().is_some() ^ sample.texture().is_some());
    }

    #[test]
    fn missing_pixel_source_is_rejected() {
        let err = FrameSample::builder(PixelFormat::Bgra, MediaTime::ZERO)
            .dim(64, 32)
            .build()
            .unwrap_err();
        assert_eq!(err, SampleError::MissingPixelSource);
    }

    #[test]
    fn undefined_format_is_rejected() {
        let err = FrameSample::builder(PixelFormat::Undefined, MediaTime::ZERO)
            .dim(64, 32)
            .buffer(bgra_buffer(64, 32), 64 * 4)
            .build()
            .unwrap_err();
        assert_eq!(err, SampleError::UnknownFormat);
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let err = FrameSample::builder(PixelFormat::Bgra, MediaTime::ZERO)
            .dim(64, 0)
            .buffer(bgra_buffer(64, 1), 64 * 4)
            .build()
            .unwrap_err();
        assert!(matches!(err, SampleError::InvalidDimensions { .. }));
    }

    #[test]
    fn short_buffer_is_rejected() {
        let err = FrameSample::builder(PixelFormat::Bgra, MediaTime::ZERO)
            .dim(64, 32)
            .buffer(Bytes::from(vec![0u8; 16]), 64 * 4)
            .build()
            .unwrap_err();
        assert!(matches!(err, SampleError::BufferTooSmall { .. }));
    }

    #[test]
    fn aspect_ratio_defaults_and_override() {
        let sample = FrameSample::builder(PixelFormat::Bgra, MediaTime::ZERO)
            .dim(1920, 1080)
            .buffer(bgra_buffer(1920, 1080), 1920 * 4)
            .build()
            .unwrap();
        assert!((sample.aspect_ratio() - 16.0 / 9.0).abs() < 1e-9);

        // Anamorphic override wins and need not match the dimensions.
        let sample = FrameSample::builder(PixelFormat::Bgra, MediaTime::ZERO)
            .dim(1440, 1080)
            .buffer(bgra_buffer(1440, 1080), 1440 * 4)
            .aspect_ratio(16.0 / 9.0)
            .build()
            .unwrap();
        assert!((sample.aspect_ratio() - 16.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn output_dim_narrows_padded_buffer() {
        // 1920-wide buffer padded to 1928 texels for alignment.
        let sample = FrameSample::builder(PixelFormat::Bgra, MediaTime::ZERO)
            .dim(1928, 1080)
            .output_dim(1920, 1080)
            .buffer(bgra_buffer(1928, 1080), 1928 * 4)
            .build()
            .unwrap();
        assert_eq!(sample.dim(), (1928, 1080));
        assert_eq!(sample.output_dim(), (1920, 1080));
    }

    #[test]
    fn invalid_tiling_is_rejected() {
        let err = FrameSample::builder(PixelFormat::Bgra, MediaTime::ZERO)
            .dim(64, 64)
            .buffer(bgra_buffer(64, 64), 64 * 4)
            .tiling(TilingDescription {
                tile_count: (0, 4),
                tile_size: (16, 16),
                border: 1,
            })
            .build()
            .unwrap_err();
        assert_eq!(err, SampleError::InvalidTiling);
    }

    #[test]
    fn conversion_capability_tracks_format() {
        let native = FrameSample::builder(PixelFormat::Bgra, MediaTime::ZERO)
            .dim(4, 4)
            .buffer(bgra_buffer(4, 4), 16)
            .build()
            .unwrap();
        assert!(native.conversion().is_none());

        let yuv = FrameSample::builder(PixelFormat::Uyvy, MediaTime::ZERO)
            .dim(4, 4)
            .buffer(Bytes::from(vec![0u8; 32]), 8)
            .build()
            .unwrap();
        assert!(yuv.conversion().is_some());
    }

    #[test]
    fn reset_restores_defaults() {
        let mut sample = FrameSample::builder(PixelFormat::Uyvy, MediaTime::from_millis(40))
            .dim(4, 4)
            .buffer(Bytes::from(vec![0u8; 32]), 8)
            .duration(MediaTime::from_millis(40))
            .cacheable(false)
            .orientation(Orientation::Cw90)
            .build()
            .unwrap();

        sample.reset();
        assert!(sample.buffer().is_none());
        assert!(sample.texture().is_none());
        assert_eq!(sample.format(), PixelFormat::Undefined);
        assert_eq!(sample.time(), MediaTime::ZERO);
        assert_eq!(sample.duration(), MediaTime::ZERO);
        assert_eq!(sample.orientation(), Orientation::Original);
        assert!(sample.is_cacheable());
        assert_eq!(sample.num_mips(), 1);
    }

    #[test]
    fn pool_recycles_reset_samples() {
        let mut pool = SamplePool::new(2);
        let sample = FrameSample::builder(PixelFormat::Bgra, MediaTime::from_millis(16))
            .dim(4, 4)
            .buffer(bgra_buffer(4, 4), 16)
            .build()
            .unwrap();

        pool.recycle(sample);
        assert_eq!(pool.len(), 1);

        let recycled = pool.acquire().unwrap();
        assert_eq!(recycled.format(), PixelFormat::Undefined);
        assert!(recycled.buffer().is_none());
        assert!(pool.is_empty());
    }
}
