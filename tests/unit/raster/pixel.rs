use super::*;

use std::sync::Arc;

#[test]
fn straight_formats_premultiply_on_decode() {
    assert_eq!(
        decode(PixelFormat::Rgba8888, &[255, 128, 0, 128], None),
        [128, 64, 0, 128]
    );
    assert_eq!(
        decode(PixelFormat::Bgra8888Pre, &[1, 2, 3, 4], None),
        [3, 2, 1, 4]
    );
    assert_eq!(
        decode(PixelFormat::Rgbx8888, &[9, 8, 7, 0], None),
        [9, 8, 7, 255]
    );
}

#[test]
fn rgb565_expands_to_full_range() {
    let white = 0xFFFFu16.to_le_bytes();
    assert_eq!(decode(PixelFormat::Rgb565, &white, None), [255, 255, 255, 255]);
    let red = 0xF800u16.to_le_bytes();
    assert_eq!(decode(PixelFormat::Rgb565, &red, None), [255, 0, 0, 255]);

    let mut out = [0u8; 2];
    encode(PixelFormat::Rgb565, [0, 255, 0, 255], &mut out, None);
    assert_eq!(u16::from_le_bytes(out), 0x07E0);
}

#[test]
fn palette_lookup_decodes_the_entry() {
    let mut entries = vec![0u8; 256 * 4];
    entries[4 * 3..4 * 4].copy_from_slice(&[10, 20, 30, 255]);
    let palette = Palette {
        format: PixelFormat::Rgba8888,
        entries: Arc::new(entries),
    };
    assert_eq!(
        decode(PixelFormat::Lut8, &[3], Some(&palette)),
        [10, 20, 30, 255]
    );
    assert_eq!(decode(PixelFormat::Lut8, &[3], None), [0, 0, 0, 0]);
}

#[test]
fn encode_unpremultiplies_straight_formats() {
    let mut out = [0u8; 4];
    encode(PixelFormat::Bgra8888, [128, 64, 0, 128], &mut out, None);
    assert_eq!(out, [0, 128, 255, 128]);

    let mut a = [0u8; 1];
    encode(PixelFormat::Alpha8, [1, 2, 3, 77], &mut a, None);
    assert_eq!(a, [77]);
}

#[test]
fn short_buffers_are_tolerated() {
    assert_eq!(decode(PixelFormat::Rgba8888Pre, &[1, 2], None), [0, 0, 0, 0]);
    let mut out = [9u8; 1];
    encode(PixelFormat::Rgb565, [255; 4], &mut out, None);
    assert_eq!(out, [9]);
}
