use super::*;

#[test]
fn rect_fits_within_boundaries() {
    assert!(Rect::new(0, 0, 64, 64).fits_within(64, 64));
    assert!(!Rect::new(1, 0, 64, 64).fits_within(64, 64));
    assert!(!Rect::new(-1, 0, 4, 4).fits_within(64, 64));
    assert!(Rect::new(60, 60, 4, 4).fits_within(64, 64));
}

#[test]
fn rect_edges_do_not_overflow() {
    let r = Rect::new(i32::MAX, i32::MAX, u32::MAX, u32::MAX);
    assert!(r.right() > i64::from(i32::MAX));
    assert!(!r.fits_within(u32::MAX, u32::MAX));
}

#[test]
fn rect_intersection() {
    let a = Rect::new(0, 0, 10, 10);
    let b = Rect::new(5, 5, 10, 10);
    assert_eq!(a.intersect(b), Rect::new(5, 5, 5, 5));
    assert!(a.intersect(Rect::new(20, 20, 1, 1)).is_empty());
}

#[test]
fn packed_geometry_stride_and_extent() {
    let g = SurfaceGeometry::packed(PixelFormat::Rgba8888, 64, 64);
    assert_eq!(g.stride, 256);
    assert_eq!(g.required_len(Rect::new(0, 0, 64, 64)), Some(64 * 64 * 4));
    assert_eq!(g.required_len(Rect::new(0, 0, 1, 1)), Some(4));
    assert_eq!(g.required_len(Rect::new(0, 1, 1, 1)), Some(256 + 4));
}

#[test]
fn palette_is_gated_by_struct_size() {
    let palette = Palette {
        format: PixelFormat::Rgba8888,
        entries: Arc::new(vec![0; 256 * 4]),
    };
    let mut g = SurfaceGeometry::packed(PixelFormat::Lut8, 4, 4).with_palette(palette);
    assert!(g.palette().is_some());
    g.struct_size = abi::SURFACE_GEOMETRY_MIN_SIZE;
    assert!(g.palette().is_none());
}

#[test]
fn orientation_normalizes() {
    let g = SurfaceGeometry::packed(PixelFormat::Alpha8, 1, 1).with_orientation(-90);
    assert_eq!(g.normalized_orientation(), 270);
}

#[test]
fn format_properties() {
    assert_eq!(PixelFormat::Rgb565.bytes_per_pixel(), 2);
    assert!(PixelFormat::Rgba8888Pre.is_premultiplied());
    assert!(!PixelFormat::Bgra8888.is_premultiplied());
    assert!(PixelFormat::Lut8.is_indexed());
    assert!(!PixelFormat::Rgbx8888.has_alpha());
}

#[test]
fn pixel_buffers_share_memory_through_clones() {
    let a = PixelBuffer::zeroed(8);
    let b = a.clone();
    b.write().unwrap()[0] = 7;
    assert_eq!(a.to_vec().unwrap()[0], 7);
    assert!(a.same_memory(&b));
    assert!(!a.same_memory(&PixelBuffer::zeroed(8)));
}

#[test]
fn slot_codes_are_distinct_per_source() {
    assert_eq!(SlotRole::Src1.codes().handle, ErrorCode::Src1Handle);
    assert_eq!(SlotRole::Src2.codes().rot, ErrorCode::Src2Rot);
    assert_eq!(SlotRole::Mask.codes().tile_flags, ErrorCode::MaskTileFlags);
    assert_eq!(SlotRole::Dst.codes().stride, ErrorCode::DstStride);
}
