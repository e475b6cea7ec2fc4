//! Per-format pixel codecs. Pixels travel between formats as premultiplied RGBA8.

use crate::foundation::core::{Palette, PixelFormat};
use crate::foundation::math::{premultiply_rgba8, quantize_channel, unpremultiply_rgba8};

const CLEAR: [u8; 4] = [0; 4];

fn expand5(v: u16) -> u8 {
    ((v << 3) | (v >> 2)) as u8
}

fn expand6(v: u16) -> u8 {
    ((v << 2) | (v >> 4)) as u8
}

/// Decode one pixel into premultiplied RGBA8. Short input decodes as transparent.
pub(crate) fn decode(format: PixelFormat, bytes: &[u8], palette: Option<&Palette>) -> [u8; 4] {
    if bytes.len() < format.bytes_per_pixel() as usize {
        return CLEAR;
    }
    match format {
        PixelFormat::Rgba8888 => premultiply_rgba8([bytes[0], bytes[1], bytes[2], bytes[3]]),
        PixelFormat::Rgba8888Pre => [bytes[0], bytes[1], bytes[2], bytes[3]],
        PixelFormat::Bgra8888 => premultiply_rgba8([bytes[2], bytes[1], bytes[0], bytes[3]]),
        PixelFormat::Bgra8888Pre => [bytes[2], bytes[1], bytes[0], bytes[3]],
        PixelFormat::Rgbx8888 => [bytes[0], bytes[1], bytes[2], 255],
        PixelFormat::Rgb565 => {
            let v = u16::from_le_bytes([bytes[0], bytes[1]]);
            [expand5(v >> 11), expand6((v >> 5) & 0x3F), expand5(v & 0x1F), 255]
        }
        PixelFormat::Alpha8 => [0, 0, 0, bytes[0]],
        PixelFormat::Lut8 => {
            let Some(p) = palette else {
                return CLEAR;
            };
            let bpp = p.format.bytes_per_pixel() as usize;
            let at = usize::from(bytes[0]) * bpp;
            match p.entries.get(at..at + bpp) {
                Some(entry) => decode(p.format, entry, None),
                None => CLEAR,
            }
        }
    }
}

/// Encode a premultiplied RGBA8 pixel. `threshold` holds per-channel ordered-dither offsets
/// in `[0, 1)` for red, green and blue, used when the format drops precision.
pub(crate) fn encode(
    format: PixelFormat,
    px: [u8; 4],
    out: &mut [u8],
    threshold: Option<[f32; 3]>,
) {
    if out.len() < format.bytes_per_pixel() as usize {
        return;
    }
    match format {
        PixelFormat::Rgba8888 => out[..4].copy_from_slice(&unpremultiply_rgba8(px)),
        PixelFormat::Rgba8888Pre => out[..4].copy_from_slice(&px),
        PixelFormat::Bgra8888 => {
            let s = unpremultiply_rgba8(px);
            out[..4].copy_from_slice(&[s[2], s[1], s[0], s[3]]);
        }
        PixelFormat::Bgra8888Pre => out[..4].copy_from_slice(&[px[2], px[1], px[0], px[3]]),
        PixelFormat::Rgbx8888 => out[..4].copy_from_slice(&[px[0], px[1], px[2], 255]),
        PixelFormat::Rgb565 => {
            let t = |ch: usize| threshold.map(|t| t[ch]);
            let r = quantize_channel(px[0], 5, t(0));
            let g = quantize_channel(px[1], 6, t(1));
            let b = quantize_channel(px[2], 5, t(2));
            out[..2].copy_from_slice(&((r << 11) | (g << 5) | b).to_le_bytes());
        }
        PixelFormat::Alpha8 => out[0] = px[3],
        // Indexed destinations are refused before execution.
        PixelFormat::Lut8 => {}
    }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/pixel.rs"]
mod tests;
