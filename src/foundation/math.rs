pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

/// `[0, 1]` → `[0, 255]`, rounded and clamped.
pub(crate) fn unit_to_u8(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

pub(crate) fn u8_to_unit(v: u8) -> f32 {
    f32::from(v) / 255.0
}

/// Straight RGBA8 → premultiplied RGBA8.
pub(crate) fn premultiply_rgba8(px: [u8; 4]) -> [u8; 4] {
    let a = u16::from(px[3]);
    [
        mul_div255_u8(u16::from(px[0]), a),
        mul_div255_u8(u16::from(px[1]), a),
        mul_div255_u8(u16::from(px[2]), a),
        px[3],
    ]
}

/// Premultiplied RGBA8 → straight RGBA8. Zero alpha yields transparent black.
pub(crate) fn unpremultiply_rgba8(px: [u8; 4]) -> [u8; 4] {
    let a = u32::from(px[3]);
    if a == 0 {
        return [0, 0, 0, 0];
    }
    let un = |c: u8| ((u32::from(c) * 255 + a / 2) / a).min(255) as u8;
    [un(px[0]), un(px[1]), un(px[2]), px[3]]
}

pub(crate) const BAYER_2X2: [[u8; 2]; 2] = [[0, 2], [3, 1]];

pub(crate) const BAYER_4X4: [[u8; 4]; 4] = [[0, 8, 2, 10], [12, 4, 14, 6], [3, 11, 1, 9], [15, 7, 13, 5]];

/// Ordered-dither threshold in `[0, 1)` for a matrix of side `n` (2 or 4).
pub(crate) fn bayer_threshold(n: usize, x: u32, y: u32) -> f32 {
    let (xi, yi) = (x as usize % n, y as usize % n);
    let (v, cells) = if n == 2 {
        (BAYER_2X2[yi][xi], 4.0)
    } else {
        (BAYER_4X4[yi][xi], 16.0)
    };
    (f32::from(v) + 0.5) / cells
}

/// Quantize an 8-bit channel to `bits` bits, nudging by a dither threshold.
pub(crate) fn quantize_channel(v: u8, bits: u32, threshold: Option<f32>) -> u16 {
    let levels = (1u32 << bits) - 1;
    let scaled = f32::from(v) * levels as f32 / 255.0;
    let q = match threshold {
        Some(t) => (scaled + t - 0.5).round(),
        None => scaled.round(),
    };
    q.clamp(0.0, levels as f32) as u16
}
