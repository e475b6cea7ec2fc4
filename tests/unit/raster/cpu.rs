use super::*;

use crate::descriptor::flags::BltFlags;
use crate::descriptor::params::{BltParams, TileParams};
use crate::descriptor::validate::validate;
use crate::foundation::config::EngineConfig;
use crate::foundation::core::{BufferDesc, PixelBuffer, SlotRole, SurfaceGeometry};
use crate::mode::blend::BlendMode;
use crate::mode::dither::DitherMode;
use crate::mode::rop::RopCode;
use crate::mode::scale::ScaleMode;
use crate::registry::map::{MapHandle, MapRegistry, RegistryLimits};

struct Fixture {
    registry: MapRegistry,
}

impl Fixture {
    fn new() -> Self {
        Self {
            registry: MapRegistry::new(RegistryLimits::from(&EngineConfig::default())),
        }
    }

    fn map(&self, pixels: &[[u8; 4]]) -> (MapHandle, PixelBuffer) {
        let buf = PixelBuffer::from_vec(pixels.iter().flatten().copied().collect());
        (self.registry.map(&BufferDesc::new(&buf)).unwrap(), buf)
    }

    fn run(&self, params: &BltParams) -> BltResult<()> {
        let op = validate(params)?;
        let kernel = CpuKernel::new();
        kernel.supports(&op)?;
        let lease = self.registry.lease(&op.handles())?;
        kernel.execute(&op, &lease)
    }
}

fn rgba(w: u32, h: u32) -> SurfaceGeometry {
    SurfaceGeometry::packed(PixelFormat::Rgba8888Pre, w, h)
}

fn pixels(buf: &PixelBuffer) -> Vec<[u8; 4]> {
    buf.to_vec()
        .unwrap()
        .chunks_exact(4)
        .map(|c| [c[0], c[1], c[2], c[3]])
        .collect()
}

const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];
const HALF_GREEN: [u8; 4] = [0, 128, 0, 128];

#[test]
fn srccopy_writes_only_the_destination_rect() {
    let fx = Fixture::new();
    let (src, _) = fx.map(&[RED; 4]);
    let (dst, out) = fx.map(&[BLUE; 4]);
    let p = BltParams::rop(RopCode::SRCCOPY)
        .with_dst(dst, rgba(2, 2), Rect::new(1, 0, 1, 2))
        .with_src1(src, rgba(2, 2), Rect::new(0, 0, 1, 2));
    fx.run(&p).unwrap();
    assert_eq!(pixels(&out), vec![BLUE, RED, BLUE, RED]);
}

#[test]
fn source_over_mixes_premultiplied_pixels() {
    let fx = Fixture::new();
    let (src, _) = fx.map(&[HALF_GREEN]);
    let (dst, out) = fx.map(&[RED]);
    let p = BltParams::blend(BlendMode::SRC1OVER)
        .with_dst(dst, rgba(1, 1), Rect::new(0, 0, 1, 1))
        .with_src1(src, rgba(1, 1), Rect::new(0, 0, 1, 1))
        .with_src2(dst, rgba(1, 1), Rect::new(0, 0, 1, 1));
    fx.run(&p).unwrap();
    let px = pixels(&out)[0];
    assert!((126..=128).contains(&px[0]), "{px:?}");
    assert_eq!(px[1], 128);
    assert_eq!(px[2], 0);
    assert_eq!(px[3], 255);
}

#[test]
fn quarter_turn_maps_rows_onto_columns() {
    let fx = Fixture::new();
    let (src, _) = fx.map(&[RED, BLUE]);
    let (dst, out) = fx.map(&[[0; 4]; 2]);
    let p = BltParams::rop(RopCode::SRCCOPY)
        .with_dst(dst, rgba(1, 2), Rect::new(0, 0, 1, 2))
        .with_src1(src, rgba(2, 1).with_orientation(90), Rect::new(0, 0, 2, 1));
    fx.run(&p).unwrap();
    assert_eq!(pixels(&out), vec![RED, BLUE]);
}

#[test]
fn horizontal_flip_mirrors_the_source() {
    let fx = Fixture::new();
    let (src, _) = fx.map(&[RED, BLUE]);
    let (dst, out) = fx.map(&[[0; 4]; 2]);
    let p = BltParams::rop(RopCode::SRCCOPY)
        .with_dst(dst, rgba(2, 1), Rect::new(0, 0, 2, 1))
        .with_src1(src, rgba(2, 1), Rect::new(0, 0, 2, 1))
        .with_flags(BltFlags::HORZ_FLIP_SRC1);
    fx.run(&p).unwrap();
    assert_eq!(pixels(&out), vec![BLUE, RED]);
}

#[test]
fn nearest_upscale_repeats_pixels() {
    let fx = Fixture::new();
    let (src, _) = fx.map(&[RED, BLUE]);
    let (dst, out) = fx.map(&[[0; 4]; 4]);
    let p = BltParams::rop(RopCode::SRCCOPY)
        .with_dst(dst, rgba(4, 1), Rect::new(0, 0, 4, 1))
        .with_src1(src, rgba(2, 1), Rect::new(0, 0, 2, 1));
    fx.run(&p).unwrap();
    assert_eq!(pixels(&out), vec![RED, RED, BLUE, BLUE]);
}

#[test]
fn tiled_brush_repeats_across_the_destination() {
    let fx = Fixture::new();
    let (brush, _) = fx.map(&[RED, BLUE]);
    let (dst, out) = fx.map(&[[0; 4]; 5]);
    let p = BltParams::rop(RopCode::SRCCOPY)
        .with_dst(dst, rgba(5, 1), Rect::new(0, 0, 5, 1))
        .with_tile(
            SlotRole::Src1,
            TileParams::repeat(brush, 5, 1),
            rgba(2, 1),
            Rect::new(0, 0, 2, 1),
        );
    fx.run(&p).unwrap();
    assert_eq!(pixels(&out), vec![RED, BLUE, RED, BLUE, RED]);
}

#[test]
fn wrap_mirrors_with_a_double_period() {
    assert_eq!(wrap(2, 2, TileEdge::Mirror), 1);
    assert_eq!(wrap(3, 2, TileEdge::Mirror), 0);
    assert_eq!(wrap(4, 2, TileEdge::Mirror), 0);
    assert_eq!(wrap(-1, 2, TileEdge::Mirror), 0);
    assert_eq!(wrap(-1, 3, TileEdge::Repeat), 2);
}

#[test]
fn clip_limits_the_written_region() {
    let fx = Fixture::new();
    let (src, _) = fx.map(&[RED; 4]);
    let (dst, out) = fx.map(&[BLUE; 4]);
    let p = BltParams::rop(RopCode::SRCCOPY)
        .with_dst(dst, rgba(4, 1), Rect::new(0, 0, 4, 1))
        .with_src1(src, rgba(4, 1), Rect::new(0, 0, 4, 1))
        .with_clip(Rect::new(1, 0, 2, 1));
    fx.run(&p).unwrap();
    assert_eq!(pixels(&out), vec![BLUE, RED, RED, BLUE]);
}

#[test]
fn color_keys_skip_pixels() {
    let fx = Fixture::new();
    let (src, _) = fx.map(&[RED, HALF_GREEN]);
    let (dst, out) = fx.map(&[BLUE, [0; 4]]);
    let p = BltParams::rop(RopCode::SRCCOPY)
        .with_dst(dst, rgba(2, 1), Rect::new(0, 0, 2, 1))
        .with_src1(src, rgba(2, 1), Rect::new(0, 0, 2, 1))
        .with_flags(BltFlags::KEY_SRC)
        .with_color_key(RED);
    fx.run(&p).unwrap();
    assert_eq!(pixels(&out), vec![BLUE, HALF_GREEN]);

    let (dst, out) = fx.map(&[BLUE, [0; 4]]);
    let p = BltParams::rop(RopCode::SRCCOPY)
        .with_dst(dst, rgba(2, 1), Rect::new(0, 0, 2, 1))
        .with_src1(src, rgba(2, 1), Rect::new(0, 0, 2, 1))
        .with_flags(BltFlags::KEY_DST)
        .with_color_key(BLUE);
    fx.run(&p).unwrap();
    assert_eq!(pixels(&out), vec![RED, [0; 4]]);
}

#[test]
fn mask_selects_foreground_and_background_rops() {
    let fx = Fixture::new();
    let (src, _) = fx.map(&[RED, RED]);
    let (dst, out) = fx.map(&[BLUE, BLUE]);
    let (mask, _) = fx.map(&[[0, 0, 0, 255], [0, 0, 0, 0]]);
    // Copy where the mask is set, keep the destination elsewhere.
    let p = BltParams::rop(RopCode(0xAACC))
        .with_dst(dst, rgba(2, 1), Rect::new(0, 0, 2, 1))
        .with_src1(src, rgba(2, 1), Rect::new(0, 0, 2, 1))
        .with_mask(mask, rgba(2, 1), Rect::new(0, 0, 2, 1));
    fx.run(&p).unwrap();
    assert_eq!(pixels(&out), vec![RED, BLUE]);
}

#[test]
fn aliased_source_reads_pre_blit_pixels() {
    let fx = Fixture::new();
    let (surf, out) = fx.map(&[RED, BLUE, [0; 4]]);
    let p = BltParams::rop(RopCode::SRCCOPY)
        .with_dst(surf, rgba(3, 1), Rect::new(1, 0, 2, 1))
        .with_src1(surf, rgba(3, 1), Rect::new(0, 0, 2, 1));
    fx.run(&p).unwrap();
    assert_eq!(pixels(&out), vec![RED, RED, BLUE]);
}

#[test]
fn unsupported_requests_are_refused_before_execution() {
    let fx = Fixture::new();
    let (src, _) = fx.map(&[RED; 4]);
    let (dst, _) = fx.map(&[BLUE; 4]);

    let p = BltParams::rop(RopCode::SRCCOPY)
        .with_dst(dst, rgba(4, 1), Rect::new(0, 0, 4, 1))
        .with_src1(src, rgba(2, 1), Rect::new(0, 0, 2, 1))
        .with_scale(ScaleMode::BICUBIC);
    assert_eq!(fx.run(&p).unwrap_err().code(), ErrorCode::ScaleMode);

    let geom = SurfaceGeometry::packed(PixelFormat::Rgb565, 4, 1);
    let p = BltParams::rop(RopCode::SRCCOPY)
        .with_dst(dst, geom, Rect::new(0, 0, 4, 1))
        .with_src1(src, rgba(4, 1), Rect::new(0, 0, 4, 1))
        .with_dither(DitherMode::FASTEST_RANDOM);
    assert_eq!(fx.run(&p).unwrap_err().code(), ErrorCode::DitherMode);

    let p = BltParams::rop(RopCode::SRCCOPY)
        .with_dst(dst, rgba(2, 1), Rect::new(0, 0, 2, 1))
        .with_tile(
            SlotRole::Src1,
            TileParams::repeat(src, 2, 1),
            rgba(2, 1).with_orientation(180),
            Rect::new(0, 0, 2, 1),
        );
    assert_eq!(fx.run(&p).unwrap_err().code(), ErrorCode::Src1Rot);
}

#[test]
fn ordered_dither_into_rgb565_stays_in_range() {
    let fx = Fixture::new();
    let grey = [100, 100, 100, 255];
    let (src, _) = fx.map(&[grey; 4]);
    let (dst, out) = fx.map(&[[0; 4]; 2]);
    let geom = SurfaceGeometry::packed(PixelFormat::Rgb565, 4, 1);
    let p = BltParams::blend(BlendMode::SRC1)
        .with_dst(dst, geom.clone(), Rect::new(0, 0, 4, 1))
        .with_src1(src, rgba(4, 1), Rect::new(0, 0, 4, 1))
        .with_src2(dst, geom, Rect::new(0, 0, 4, 1))
        .with_dither(DitherMode::FASTEST_ORDERED);
    fx.run(&p).unwrap();
    let bytes = out.to_vec().unwrap();
    for px in bytes.chunks_exact(2) {
        let r = u16::from_le_bytes([px[0], px[1]]) >> 11;
        assert!((11..=13).contains(&r), "red {r}");
    }
}

#[test]
fn combined_ordered_dither_uses_2x2_for_green_only() {
    let fx = Fixture::new();
    let ramp: Vec<[u8; 4]> = (0..16u8)
        .map(|i| {
            let v = 60 + i * 9;
            [v, v, v, 255]
        })
        .collect();
    let (src, _) = fx.map(&ramp);
    let geom = SurfaceGeometry::packed(PixelFormat::Rgb565, 4, 4);
    let rect = Rect::new(0, 0, 4, 4);

    let render = |mode: DitherMode| -> Vec<(u16, u16)> {
        let (dst, out) = fx.map(&[[0; 4]; 8]);
        let p = BltParams::blend(BlendMode::SRC1)
            .with_dst(dst, geom.clone(), rect)
            .with_src1(src, rgba(4, 4), rect)
            .with_src2(dst, geom.clone(), rect)
            .with_dither(mode);
        fx.run(&p).unwrap();
        out.to_vec()
            .unwrap()
            .chunks_exact(2)
            .map(|b| {
                let v = u16::from_le_bytes([b[0], b[1]]);
                (v >> 11, (v >> 5) & 0x3F)
            })
            .collect()
    };

    let two = render(DitherMode::ORDERED_2X2);
    let four = render(DitherMode::ORDERED_4X4);
    let both = render(DitherMode::ORDERED_2X2_4X4);
    for i in 0..16 {
        assert_eq!(both[i].0, four[i].0, "red at {i}");
        assert_eq!(both[i].1, two[i].1, "green at {i}");
    }
}
