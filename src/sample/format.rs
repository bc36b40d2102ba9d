//! Pixel format registry
//!
//! Enumerates every pixel encoding a decoder backend may hand to the sink
//! and describes its byte layout. Depending on the backend, frame data may
//! arrive packed, planar, floating point, or as GPU-compressed blocks;
//! some of these are renderer-native, others must pass through the sample
//! converter before generic RGB compositing.
//!
//! For details on the packed YUV layouts see: https://www.fourcc.org/yuv.php

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SampleError;

/// Pixel encoding of a frame sample.
///
/// The tag is fixed for the lifetime of a sample and fully determines how
/// its raw buffer is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Format not defined. Rejected at sample construction.
    #[default]
    Undefined,
    /// Packed 4:4:4 YUV with alpha, four 8-bit components per texel.
    Ayuv,
    /// Four 8-bit components per texel: blue, green, red, alpha.
    Bgra,
    /// Three 10-bit color components plus 2-bit alpha per texel.
    Bgr10A2,
    /// Windows bitmap rows: like `Bgra`, but stored bottom-up.
    Bmp,
    /// 4:2:0 semi-planar: full-res Y plane, interleaved UV at quarter res.
    Nv12,
    /// Like `Nv12` with the chroma bytes swapped (VU order).
    Nv21,
    /// Packed 4:2:2, byte order U0 Y0 V0 Y1 (aka HDYC, Y422).
    Uyvy,
    /// Packed 4:2:2, byte order Y0 U0 Y1 V0 (aka YUNV, YUYV).
    Yuy2,
    /// Packed 4:2:2, byte order Y0 V0 Y1 U0.
    Yvyu,
    /// Three 16-bit float components per texel.
    FloatRgb,
    /// Four 16-bit float components per texel.
    FloatRgba,
    /// 10-bit 4:2:2: six texels packed into each 128-bit group.
    YuvV210,
    /// 16-bit-per-component packed 4:4:4:4 (U, Y, V, A little-endian words).
    Y416,
    /// BC1 block compression, 8 bytes per 4x4 block.
    Dxt1,
    /// BC3 block compression, 16 bytes per 4x4 block.
    Dxt5,
    /// Scaled YCoCg color encoded in BC3 blocks.
    YcocgDxt5,
    /// Scaled YCoCg in BC3 plus a trailing BC4 alpha plane.
    YcocgDxt5AlphaBc4,
}

impl PixelFormat {
    /// Whether the format belongs to a YUV family and therefore consumes
    /// the sample's YUV-to-RGB matrix during conversion.
    pub fn is_yuv(self) -> bool {
        matches!(
            self,
            Self::Ayuv
                | Self::Nv12
                | Self::Nv21
                | Self::Uyvy
                | Self::Yuy2
                | Self::Yvyu
                | Self::YuvV210
                | Self::Y416
        )
    }

    /// Whether the format stores texels as 4x4 compressed blocks.
    pub fn is_block_compressed(self) -> bool {
        matches!(
            self,
            Self::Dxt1 | Self::Dxt5 | Self::YcocgDxt5 | Self::YcocgDxt5AlphaBc4
        )
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Undefined => "undefined",
            Self::Ayuv => "AYUV",
            Self::Bgra => "BGRA",
            Self::Bgr10A2 => "BGR10A2",
            Self::Bmp => "BMP",
            Self::Nv12 => "NV12",
            Self::Nv21 => "NV21",
            Self::Uyvy => "UYVY",
            Self::Yuy2 => "YUY2",
            Self::Yvyu => "YVYU",
            Self::FloatRgb => "RGB16F",
            Self::FloatRgba => "RGBA16F",
            Self::YuvV210 => "v210",
            Self::Y416 => "Y416",
            Self::Dxt1 => "DXT1",
            Self::Dxt5 => "DXT5",
            Self::YcocgDxt5 => "YCoCg-DXT5",
            Self::YcocgDxt5AlphaBc4 => "YCoCg-DXT5+BC4",
        };
        f.write_str(name)
    }
}

/// Channel arrangement of a pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelLayout {
    /// Interleaved blue/green/red/alpha bytes or words.
    Bgra,
    /// Interleaved red/green/blue (no alpha).
    Rgb,
    /// Interleaved red/green/blue/alpha.
    Rgba,
    /// Packed luma/chroma words sharing chroma between texels.
    PackedYuv,
    /// Packed luma/chroma with a dedicated alpha component.
    PackedYuva,
    /// Full-resolution luma plane followed by an interleaved chroma plane.
    SemiPlanarYuv,
    /// 4x4 texel blocks in a GPU compression scheme.
    BlockCompressed,
}

/// Chroma subsampling of a pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChromaSubsampling {
    /// Every texel carries its own chroma (4:4:4, or not YUV at all).
    Full,
    /// Chroma shared by horizontal texel pairs (4:2:2).
    Half422,
    /// Chroma shared by 2x2 texel quads (4:2:0).
    Quarter420,
}

/// Byte-layout description of a pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    /// The format this description belongs to.
    pub format: PixelFormat,
    /// Channel arrangement.
    pub layout: ChannelLayout,
    /// Chroma subsampling.
    pub subsampling: ChromaSubsampling,
    /// Effective bits per texel averaged over the format's smallest
    /// repeating cell (floor for v210, whose cell is 128 bits / 6 texels).
    pub bits_per_texel: u32,
    /// Whether a sink must run the sample converter before treating the
    /// sample as generically RGB-compositable.
    pub requires_conversion: bool,
    /// Bytes per 4x4 block for block-compressed formats.
    pub bytes_per_block: Option<u32>,
}

impl FormatInfo {
    /// Minimum byte length a conformant buffer must have for the given
    /// buffer dimensions and row stride.
    ///
    /// Block-compressed formats ignore the stride and count whole blocks;
    /// semi-planar formats count the trailing chroma plane rows.
    pub fn min_buffer_len(&self, dim: (u32, u32), stride: u32) -> usize {
        let (width, height) = dim;
        match self.layout {
            ChannelLayout::BlockCompressed => {
                let blocks_wide = width.div_ceil(4) as usize;
                let blocks_high = height.div_ceil(4) as usize;
                blocks_wide * blocks_high * self.bytes_per_block.unwrap_or(0) as usize
            }
            ChannelLayout::SemiPlanarYuv => {
                let luma = stride as usize * height as usize;
                let chroma = stride as usize * height.div_ceil(2) as usize;
                luma + chroma
            }
            _ => stride as usize * height as usize,
        }
    }

    /// Minimum stride for one row of texels at the given width, in bytes.
    ///
    /// For semi-planar formats this is the luma-plane row length; the
    /// chroma plane shares it.
    pub fn min_stride(&self, width: u32) -> u32 {
        match self.format {
            PixelFormat::YuvV210 => width.div_ceil(6) * 16,
            _ => match self.layout {
                ChannelLayout::BlockCompressed => {
                    width.div_ceil(4) * self.bytes_per_block.unwrap_or(0)
                }
                ChannelLayout::SemiPlanarYuv => width,
                // Packed 4:2:2 rows advance in whole sample pairs.
                ChannelLayout::PackedYuv => width.div_ceil(2) * 4,
                _ => (width as u64 * self.bits_per_texel as u64 / 8) as u32,
            },
        }
    }
}

/// Describe a pixel format's byte layout.
///
/// Pure and total over the closed format set. `Undefined` (the only
/// representable out-of-set tag) yields [`SampleError::UnknownFormat`];
/// the set is closed by design, so that is an invariant-violation signal
/// rather than a normal error path.
pub fn describe(format: PixelFormat) -> Result<FormatInfo, SampleError> {
    use ChannelLayout as L;
    use ChromaSubsampling as S;

    let info = match format {
        PixelFormat::Undefined => return Err(SampleError::UnknownFormat),
        PixelFormat::Ayuv => FormatInfo {
            format,
            layout: L::PackedYuva,
            subsampling: S::Full,
            bits_per_texel: 32,
            requires_conversion: true,
            bytes_per_block: None,
        },
        PixelFormat::Bgra => FormatInfo {
            format,
            layout: L::Bgra,
            subsampling: S::Full,
            bits_per_texel: 32,
            requires_conversion: false,
            bytes_per_block: None,
        },
        PixelFormat::Bgr10A2 => FormatInfo {
            format,
            layout: L::Bgra,
            subsampling: S::Full,
            bits_per_texel: 32,
            requires_conversion: true,
            bytes_per_block: None,
        },
        PixelFormat::Bmp => FormatInfo {
            format,
            layout: L::Bgra,
            subsampling: S::Full,
            bits_per_texel: 32,
            requires_conversion: true,
            bytes_per_block: None,
        },
        PixelFormat::Nv12 | PixelFormat::Nv21 => FormatInfo {
            format,
            layout: L::SemiPlanarYuv,
            subsampling: S::Quarter420,
            bits_per_texel: 12,
            requires_conversion: true,
            bytes_per_block: None,
        },
        PixelFormat::Uyvy | PixelFormat::Yuy2 | PixelFormat::Yvyu => FormatInfo {
            format,
            layout: L::PackedYuv,
            subsampling: S::Half422,
            bits_per_texel: 16,
            requires_conversion: true,
            bytes_per_block: None,
        },
        PixelFormat::FloatRgb => FormatInfo {
            format,
            layout: L::Rgb,
            subsampling: S::Full,
            bits_per_texel: 48,
            requires_conversion: false,
            bytes_per_block: None,
        },
        PixelFormat::FloatRgba => FormatInfo {
            format,
            layout: L::Rgba,
            subsampling: S::Full,
            bits_per_texel: 64,
            requires_conversion: false,
            bytes_per_block: None,
        },
        PixelFormat::YuvV210 => FormatInfo {
            format,
            layout: L::PackedYuv,
            subsampling: S::Half422,
            bits_per_texel: 21,
            requires_conversion: true,
            bytes_per_block: None,
        },
        PixelFormat::Y416 => FormatInfo {
            format,
            layout: L::PackedYuva,
            subsampling: S::Full,
            bits_per_texel: 64,
            requires_conversion: true,
            bytes_per_block: None,
        },
        PixelFormat::Dxt1 => FormatInfo {
            format,
            layout: L::BlockCompressed,
            subsampling: S::Full,
            bits_per_texel: 4,
            requires_conversion: false,
            bytes_per_block: Some(8),
        },
        PixelFormat::Dxt5 => FormatInfo {
            format,
            layout: L::BlockCompressed,
            subsampling: S::Full,
            bits_per_texel: 8,
            requires_conversion: false,
            bytes_per_block: Some(16),
        },
        PixelFormat::YcocgDxt5 => FormatInfo {
            format,
            layout: L::BlockCompressed,
            subsampling: S::Full,
            bits_per_texel: 8,
            requires_conversion: true,
            bytes_per_block: Some(16),
        },
        PixelFormat::YcocgDxt5AlphaBc4 => FormatInfo {
            format,
            layout: L::BlockCompressed,
            subsampling: S::Full,
            bits_per_texel: 12,
            requires_conversion: true,
            bytes_per_block: Some(24),
        },
    };

    Ok(info)
}
