//! Sample format conversion
//!
//! Normalizes CPU-buffer samples whose native encoding is not
//! renderer-native into display-ready RGBA8. The converter is invoked by
//! the sink immediately before display, consumes the sample's declared
//! YUV-to-RGB matrix for YUV families, and never mutates the source.
//!
//! Block-compressed payloads sometimes arrive with a second compression
//! stage on top (Hap-style snappy or LZ4 wrapping); backends unwrap those
//! with [`decompress_snappy`] / [`decompress_lz4`] before constructing
//! samples.

use glam::{Mat4, Vec4};
use thiserror::Error;

use crate::error::SampleError;
use crate::sample::format::PixelFormat;
use crate::sample::frame::{FrameSample, YUV_VIDEO_RANGE_OFFSET};

/// Errors raised during sample conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Sample(#[from] SampleError),

    /// The sample's pixels live in a renderer-side texture; conversion of
    /// texture-backed samples belongs to the compositing layer.
    #[error("sample is texture-backed; CPU conversion needs a pixel buffer")]
    TextureBacked,

    /// Second-stage payload decompression failed.
    #[error("payload decompression failed: {0}")]
    Decompress(String),
}

/// Byte order of a packed 4:2:2 sample pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packed422Order {
    /// U0 Y0 V0 Y1
    Uyvy,
    /// Y0 U0 Y1 V0
    Yuy2,
    /// Y0 V0 Y1 U0
    Yvyu,
}

/// The conversion step a sample's format requires before display.
///
/// Obtained through [`FrameSample::conversion`]; formats the renderer
/// composites natively have no conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Packed 4:2:2 YUV pairs to RGBA.
    PackedYuv422(Packed422Order),
    /// Packed 4:4:4 AYUV to RGBA.
    PackedAyuv,
    /// Semi-planar 4:2:0 (NV12 family) to RGBA.
    SemiPlanarYuv {
        /// NV21 stores chroma as VU instead of UV.
        chroma_swapped: bool,
    },
    /// 10-bit packed 4:2:2 (v210) to RGBA.
    V210,
    /// 16-bit packed 4:4:4:4 (Y416) to RGBA.
    Y416,
    /// 10-bit BGR with 2-bit alpha to RGBA.
    TenBitBgr,
    /// Bottom-up BGRA rows to top-down RGBA.
    FlippedBgra,
    /// Scaled-YCoCg BC3 blocks to RGBA, optionally with a trailing BC4
    /// alpha plane.
    YcocgDxt5 {
        separate_alpha: bool,
    },
}

/// Conversion capability for a format.
///
/// `Some` exactly for formats whose registry entry requires conversion.
pub fn conversion_for(format: PixelFormat) -> Option<Conversion> {
    match format {
        PixelFormat::Uyvy => Some(Conversion::PackedYuv422(Packed422Order::Uyvy)),
        PixelFormat::Yuy2 => Some(Conversion::PackedYuv422(Packed422Order::Yuy2)),
        PixelFormat::Yvyu => Some(Conversion::PackedYuv422(Packed422Order::Yvyu)),
        PixelFormat::Ayuv => Some(Conversion::PackedAyuv),
        PixelFormat::Nv12 => Some(Conversion::SemiPlanarYuv {
            chroma_swapped: false,
        }),
        PixelFormat::Nv21 => Some(Conversion::SemiPlanarYuv {
            chroma_swapped: true,
        }),
        PixelFormat::YuvV210 => Some(Conversion::V210),
        PixelFormat::Y416 => Some(Conversion::Y416),
        PixelFormat::Bgr10A2 => Some(Conversion::TenBitBgr),
        PixelFormat::Bmp => Some(Conversion::FlippedBgra),
        PixelFormat::YcocgDxt5 => Some(Conversion::YcocgDxt5 {
            separate_alpha: false,
        }),
        PixelFormat::YcocgDxt5AlphaBc4 => Some(Conversion::YcocgDxt5 {
            separate_alpha: true,
        }),
        _ => None,
    }
}

/// A display-ready RGBA8 image borrowed from the converter's scratch
/// buffer. Valid until the next `convert` call.
#[derive(Debug)]
pub struct RgbaImage<'a> {
    pub pixels: &'a [u8],
    pub width: u32,
    pub height: u32,
}

/// Result of a conversion request.
#[derive(Debug)]
pub enum Converted<'a> {
    /// The format is already display-ready; use the sample's own pixel
    /// source untouched. This is the no-op answer for conversion requests
    /// on formats that require none.
    Passthrough,
    /// Normalized RGBA8 pixels.
    Rgba(RgbaImage<'a>),
}

/// Converts samples to display-ready RGBA8 using a reusable scratch
/// buffer, so steady-state conversion allocates nothing.
#[derive(Debug, Default)]
pub struct SampleConverter {
    scratch: Vec<u8>,
}

impl SampleConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a sample's pixels for display.
    ///
    /// Formats with no conversion step yield [`Converted::Passthrough`].
    /// The source sample is never mutated; orientation and the
    /// external-image scale-rotation transform remain metadata for the
    /// compositing layer and are not baked into the pixels.
    pub fn convert<'a>(&'a mut self, sample: &FrameSample) -> Result<Converted<'a>, ConvertError> {
        let Some(conversion) = sample.conversion() else {
            return Ok(Converted::Passthrough);
        };

        let Some((data, stride)) = sample.buffer() else {
            return Err(ConvertError::TextureBacked);
        };
        let data: &[u8] = data;
        let stride = stride as usize;

        let (out_w, out_h) = sample.output_dim();
        let (buf_w, buf_h) = sample.dim();
        self.scratch.clear();
        self.scratch.resize(out_w as usize * out_h as usize * 4, 0);

        let matrix = *sample.yuv_to_rgb_matrix();

        match conversion {
            Conversion::PackedYuv422(order) => {
                packed_422_to_rgba(data, stride, out_w, out_h, order, &matrix, &mut self.scratch);
            }
            Conversion::PackedAyuv => {
                ayuv_to_rgba(data, stride, out_w, out_h, &matrix, &mut self.scratch);
            }
            Conversion::SemiPlanarYuv { chroma_swapped } => {
                semi_planar_to_rgba(
                    data,
                    stride,
                    buf_h,
                    out_w,
                    out_h,
                    chroma_swapped,
                    &matrix,
                    &mut self.scratch,
                );
            }
            Conversion::V210 => {
                v210_to_rgba(data, stride, out_w, out_h, &matrix, &mut self.scratch);
            }
            Conversion::Y416 => {
                y416_to_rgba(data, stride, out_w, out_h, &matrix, &mut self.scratch);
            }
            Conversion::TenBitBgr => {
                bgr10a2_to_rgba(data, stride, out_w, out_h, &mut self.scratch);
            }
            Conversion::FlippedBgra => {
                flipped_bgra_to_rgba(data, stride, out_w, out_h, &mut self.scratch);
            }
            Conversion::YcocgDxt5 { separate_alpha } => {
                ycocg_dxt5_to_rgba(data, buf_w, buf_h, out_w, out_h, separate_alpha, &mut self.scratch);
            }
        }

        Ok(Converted::Rgba(RgbaImage {
            pixels: &self.scratch,
            width: out_w,
            height: out_h,
        }))
    }
}

/// Decompress a snappy-wrapped payload.
pub fn decompress_snappy(compressed: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let mut decoder = snap::raw::Decoder::new();
    decoder
        .decompress_vec(compressed)
        .map_err(|e| ConvertError::Decompress(format!("snappy: {e}")))
}

/// Decompress an LZ4-wrapped payload of known uncompressed size.
pub fn decompress_lz4(compressed: &[u8], uncompressed_size: usize) -> Result<Vec<u8>, ConvertError> {
    lz4_flex::decompress(compressed, uncompressed_size)
        .map_err(|e| ConvertError::Decompress(format!("lz4: {e}")))
}

fn to_channel(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Apply a YUV-to-RGB matrix to normalized video-range YCbCr.
fn yuv_pixel(matrix: &Mat4, y: f32, u: f32, v: f32) -> [u8; 3] {
    let rgb = *matrix
        * Vec4::new(
            y - YUV_VIDEO_RANGE_OFFSET.x,
            u - YUV_VIDEO_RANGE_OFFSET.y,
            v - YUV_VIDEO_RANGE_OFFSET.z,
            0.0,
        );
    [to_channel(rgb.x), to_channel(rgb.y), to_channel(rgb.z)]
}

fn put_rgba(out: &mut [u8], width: u32, x: u32, y: u32, rgb: [u8; 3], a: u8) {
    let idx = (y as usize * width as usize + x as usize) * 4;
    out[idx] = rgb[0];
    out[idx + 1] = rgb[1];
    out[idx + 2] = rgb[2];
    out[idx + 3] = a;
}

fn packed_422_to_rgba(
    data: &[u8],
    stride: usize,
    width: u32,
    height: u32,
    order: Packed422Order,
    matrix: &Mat4,
    out: &mut [u8],
) {
    for row in 0..height {
        let line = &data[row as usize * stride..];
        for x in (0..width).step_by(2) {
            let group = &line[(x / 2) as usize * 4..];
            let (y0, u, y1, v) = match order {
                Packed422Order::Uyvy => (group[1], group[0], group[3], group[2]),
                Packed422Order::Yuy2 => (group[0], group[1], group[2], group[3]),
                Packed422Order::Yvyu => (group[0], group[3], group[2], group[1]),
            };
            let u = u as f32 / 255.0;
            let v = v as f32 / 255.0;
            let rgb0 = yuv_pixel(matrix, y0 as f32 / 255.0, u, v);
            put_rgba(out, width, x, row, rgb0, 255);
            if x + 1 < width {
                let rgb1 = yuv_pixel(matrix, y1 as f32 / 255.0, u, v);
                put_rgba(out, width, x + 1, row, rgb1, 255);
            }
        }
    }
}

fn ayuv_to_rgba(
    data: &[u8],
    stride: usize,
    width: u32,
    height: u32,
    matrix: &Mat4,
    out: &mut [u8],
) {
    // AYUV texels pack low-to-high as V, U, Y, A.
    for row in 0..height {
        let line = &data[row as usize * stride..];
        for x in 0..width {
            let texel = &line[x as usize * 4..];
            let rgb = yuv_pixel(
                matrix,
                texel[2] as f32 / 255.0,
                texel[1] as f32 / 255.0,
                texel[0] as f32 / 255.0,
            );
            put_rgba(out, width, x, row, rgb, texel[3]);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn semi_planar_to_rgba(
    data: &[u8],
    stride: usize,
    buf_height: u32,
    width: u32,
    height: u32,
    chroma_swapped: bool,
    matrix: &Mat4,
    out: &mut [u8],
) {
    // Chroma plane starts after the full-height luma plane.
    let (luma, chroma) = data.split_at(stride * buf_height as usize);
    for row in 0..height {
        let y_line = &luma[row as usize * stride..];
        let uv_line = &chroma[(row / 2) as usize * stride..];
        for x in 0..width {
            let uv = &uv_line[(x / 2) as usize * 2..];
            let (u, v) = if chroma_swapped {
                (uv[1], uv[0])
            } else {
                (uv[0], uv[1])
            };
            let rgb = yuv_pixel(
                matrix,
                y_line[x as usize] as f32 / 255.0,
                u as f32 / 255.0,
                v as f32 / 255.0,
            );
            put_rgba(out, width, x, row, rgb, 255);
        }
    }
}

fn v210_to_rgba(
    data: &[u8],
    stride: usize,
    width: u32,
    height: u32,
    matrix: &Mat4,
    out: &mut [u8],
) {
    // Each 16-byte group packs six texels as 10-bit components:
    //   w0: Cb01 | Y0 | Cr01    w1: Y1 | Cb23 | Y2
    //   w2: Cr23 | Y3 | Cb45    w3: Y4 | Cr45 | Y5
    let unpack = |word: u32| {
        (
            (word & 0x3ff) as f32 / 1023.0,
            ((word >> 10) & 0x3ff) as f32 / 1023.0,
            ((word >> 20) & 0x3ff) as f32 / 1023.0,
        )
    };
    for row in 0..height {
        let line = &data[row as usize * stride..];
        for group_idx in 0..width.div_ceil(6) {
            let group = &line[group_idx as usize * 16..];
            let words: [u32; 4] = [
                u32::from_le_bytes([group[0], group[1], group[2], group[3]]),
                u32::from_le_bytes([group[4], group[5], group[6], group[7]]),
                u32::from_le_bytes([group[8], group[9], group[10], group[11]]),
                u32::from_le_bytes([group[12], group[13], group[14], group[15]]),
            ];
            let (cb01, y0, cr01) = unpack(words[0]);
            let (y1, cb23, y2) = unpack(words[1]);
            let (cr23, y3, cb45) = unpack(words[2]);
            let (y4, cr45, y5) = unpack(words[3]);
            let texels = [
                (y0, cb01, cr01),
                (y1, cb01, cr01),
                (y2, cb23, cr23),
                (y3, cb23, cr23),
                (y4, cb45, cr45),
                (y5, cb45, cr45),
            ];
            for (offset, (y, u, v)) in texels.into_iter().enumerate() {
                let x = group_idx * 6 + offset as u32;
                if x >= width {
                    break;
                }
                let rgb = yuv_pixel(matrix, y, u, v);
                put_rgba(out, width, x, row, rgb, 255);
            }
        }
    }
}

fn y416_to_rgba(
    data: &[u8],
    stride: usize,
    width: u32,
    height: u32,
    matrix: &Mat4,
    out: &mut [u8],
) {
    // Four 16-bit little-endian words per texel: U, Y, V, A.
    for row in 0..height {
        let line = &data[row as usize * stride..];
        for x in 0..width {
            let texel = &line[x as usize * 8..];
            let word = |i: usize| u16::from_le_bytes([texel[i * 2], texel[i * 2 + 1]]) as f32 / 65535.0;
            let rgb = yuv_pixel(matrix, word(1), word(0), word(2));
            put_rgba(out, width, x, row, rgb, to_channel(word(3)));
        }
    }
}

fn bgr10a2_to_rgba(data: &[u8], stride: usize, width: u32, height: u32, out: &mut [u8]) {
    for row in 0..height {
        let line = &data[row as usize * stride..];
        for x in 0..width {
            let texel = &line[x as usize * 4..];
            let packed = u32::from_le_bytes([texel[0], texel[1], texel[2], texel[3]]);
            let ten = |v: u32| ((v * 255 + 511) / 1023) as u8;
            let b = ten(packed & 0x3ff);
            let g = ten((packed >> 10) & 0x3ff);
            let r = ten((packed >> 20) & 0x3ff);
            let a = (((packed >> 30) & 0x3) * 85) as u8;
            put_rgba(out, width, x, row, [r, g, b], a);
        }
    }
}

fn flipped_bgra_to_rgba(data: &[u8], stride: usize, width: u32, height: u32, out: &mut [u8]) {
    // Bitmap rows are stored bottom-up.
    for row in 0..height {
        let src_row = height - 1 - row;
        let line = &data[src_row as usize * stride..];
        for x in 0..width {
            let texel = &line[x as usize * 4..];
            put_rgba(out, width, x, row, [texel[2], texel[1], texel[0]], texel[3]);
        }
    }
}

/// Decode a BC3 alpha block (also a standalone BC4 block) into 16 values.
fn decode_bc_alpha_block(block: &[u8]) -> [u8; 16] {
    let a0 = block[0] as u16;
    let a1 = block[1] as u16;
    let mut palette = [0u8; 8];
    palette[0] = a0 as u8;
    palette[1] = a1 as u8;
    if a0 > a1 {
        for i in 1..7 {
            palette[i + 1] = (((7 - i as u16) * a0 + i as u16 * a1) / 7) as u8;
        }
    } else {
        for i in 1..5 {
            palette[i + 1] = (((5 - i as u16) * a0 + i as u16 * a1) / 5) as u8;
        }
        palette[6] = 0;
        palette[7] = 255;
    }

    // 16 3-bit indices packed little-endian across six bytes.
    let mut bits = 0u64;
    for (i, byte) in block[2..8].iter().enumerate() {
        bits |= (*byte as u64) << (i * 8);
    }
    let mut values = [0u8; 16];
    for (i, value) in values.iter_mut().enumerate() {
        *value = palette[((bits >> (i * 3)) & 0x7) as usize];
    }
    values
}

/// Decode the color half of a BC3 block into 16 RGB texels.
///
/// BC3 color blocks always interpolate in four-color mode.
fn decode_bc3_color_block(block: &[u8]) -> [[u8; 3]; 16] {
    let expand565 = |c: u16| {
        let r = ((c >> 11) & 0x1f) as u8;
        let g = ((c >> 5) & 0x3f) as u8;
        let b = (c & 0x1f) as u8;
        [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
    };
    let c0 = u16::from_le_bytes([block[0], block[1]]);
    let c1 = u16::from_le_bytes([block[2], block[3]]);
    let p0 = expand565(c0);
    let p1 = expand565(c1);
    let lerp = |a: u8, b: u8, num: u16, den: u16| (((den - num) * a as u16 + num * b as u16) / den) as u8;
    let palette = [
        p0,
        p1,
        [lerp(p0[0], p1[0], 1, 3), lerp(p0[1], p1[1], 1, 3), lerp(p0[2], p1[2], 1, 3)],
        [lerp(p0[0], p1[0], 2, 3), lerp(p0[1], p1[1], 2, 3), lerp(p0[2], p1[2], 2, 3)],
    ];

    let indices = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
    let mut texels = [[0u8; 3]; 16];
    for (i, texel) in texels.iter_mut().enumerate() {
        *texel = palette[((indices >> (i * 2)) & 0x3) as usize];
    }
    texels
}

/// Reconstruct RGB from a scaled-YCoCg texel as stored in the BC3 color
/// channels (Co, Cg, scale) and alpha channel (Y).
fn ycocg_texel(co_raw: u8, cg_raw: u8, scale_raw: u8, y_raw: u8) -> [u8; 3] {
    const CHROMA_BIAS: f32 = 0.501_960_8;
    let scale = (scale_raw as f32 / 255.0) * (255.0 / 8.0) + 1.0;
    let co = (co_raw as f32 / 255.0 - CHROMA_BIAS) / scale;
    let cg = (cg_raw as f32 / 255.0 - CHROMA_BIAS) / scale;
    let y = y_raw as f32 / 255.0;
    [
        to_channel(y + co - cg),
        to_channel(y + cg),
        to_channel(y - co - cg),
    ]
}

#[allow(clippy::too_many_arguments)]
fn ycocg_dxt5_to_rgba(
    data: &[u8],
    buf_width: u32,
    buf_height: u32,
    width: u32,
    height: u32,
    separate_alpha: bool,
    out: &mut [u8],
) {
    let blocks_wide = buf_width.div_ceil(4) as usize;
    let blocks_high = buf_height.div_ceil(4) as usize;
    let color_len = blocks_wide * blocks_high * 16;
    let (color_plane, alpha_plane) = data.split_at(color_len.min(data.len()));

    for by in 0..blocks_high {
        for bx in 0..blocks_wide {
            let block = &color_plane[(by * blocks_wide + bx) * 16..];
            // Alpha half of the BC3 block carries Y, color half carries
            // (Co, Cg, scale).
            let luma = decode_bc_alpha_block(&block[..8]);
            let chroma = decode_bc3_color_block(&block[8..16]);
            let alpha = if separate_alpha {
                let bc4 = &alpha_plane[(by * blocks_wide + bx) * 8..];
                decode_bc_alpha_block(&bc4[..8])
            } else {
                [255u8; 16]
            };

            for ty in 0..4 {
                for tx in 0..4 {
                    let x = bx as u32 * 4 + tx as u32;
                    let y = by as u32 * 4 + ty as u32;
                    if x >= width || y >= height {
                        continue;
                    }
                    let i = ty * 4 + tx;
                    let [co, cg, scale] = chroma[i];
                    let rgb = ycocg_texel(co, cg, scale, luma[i]);
                    put_rgba(out, width, x, y, rgb, alpha[i]);
                }
            }
        }
    }
}
