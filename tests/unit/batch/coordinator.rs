use super::*;

use crate::foundation::core::{PixelFormat, Rect, SurfaceGeometry};
use crate::mode::blend::BlendMode;
use crate::mode::rop::RopCode;
use crate::registry::map::MapHandle;

fn geom() -> SurfaceGeometry {
    SurfaceGeometry::packed(PixelFormat::Rgba8888Pre, 16, 16)
}

fn begin() -> BltParams {
    BltParams::blend(BlendMode::SRC1OVER)
        .with_flags(BltFlags::BATCH_BEGIN)
        .with_dst(MapHandle::from_raw(1), geom(), Rect::new(0, 0, 4, 4))
        .with_src1(MapHandle::from_raw(2), geom(), Rect::new(0, 0, 4, 4))
        .with_src2(MapHandle::from_raw(1), geom(), Rect::new(0, 0, 4, 4))
}

fn open(c: &BatchCoordinator) -> BatchHandle {
    let staged = c.stage(begin()).unwrap();
    c.commit(&staged, None).unwrap().unwrap()
}

fn delta(handle: BatchHandle, flags: BltFlags, changes: BatchChanges) -> BltParams {
    BltParams::rop(RopCode::BLACKNESS)
        .with_flags(flags)
        .in_batch(handle, changes)
}

#[test]
fn begin_continue_end_lifecycle() {
    let c = BatchCoordinator::new(4);
    let h = open(&c);
    assert!(c.is_open(h));

    for _ in 0..3 {
        let staged = c
            .stage(delta(h, BltFlags::BATCH_CONTINUE, BatchChanges::empty()))
            .unwrap();
        assert_eq!(c.commit(&staged, None).unwrap(), Some(h));
    }
    let staged = c
        .stage(delta(h, BltFlags::BATCH_END, BatchChanges::empty()))
        .unwrap();
    assert_eq!(staged.mode, BatchMode::End);
    c.commit(&staged, None).unwrap();
    assert!(!c.is_open(h));
    assert_eq!(c.open_batches(), 0);
}

#[test]
fn continue_without_begin_is_rejected() {
    let c = BatchCoordinator::new(4);
    let bogus = BatchHandle::from_raw(77);
    let err = c
        .stage(delta(bogus, BltFlags::BATCH_CONTINUE, BatchChanges::empty()))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::BatchHandle);

    let mut p = delta(bogus, BltFlags::BATCH_END, BatchChanges::empty());
    p.batch = None;
    assert_eq!(c.stage(p).unwrap_err().code(), ErrorCode::BatchHandle);
    assert_eq!(c.open_batches(), 0);
}

#[test]
fn begin_naming_an_open_batch_is_rejected() {
    let c = BatchCoordinator::new(4);
    let h = open(&c);
    let mut again = begin();
    again.batch = Some(h);
    assert_eq!(c.stage(again).unwrap_err().code(), ErrorCode::BatchHandle);
    assert_eq!(c.open_batches(), 1);
}

#[test]
fn staging_has_no_side_effects() {
    let c = BatchCoordinator::new(4);
    let h = open(&c);
    let staged = c
        .stage(delta(h, BltFlags::BATCH_END, BatchChanges::empty()))
        .unwrap();
    drop(staged);
    assert!(c.is_open(h));

    let b = c.stage(begin()).unwrap();
    drop(b);
    assert_eq!(c.open_batches(), 1);
}

#[test]
fn open_batch_limit_is_enforced() {
    let c = BatchCoordinator::new(1);
    open(&c);
    assert_eq!(c.stage(begin()).unwrap_err().code(), ErrorCode::Oom);
}

#[test]
fn reserved_change_bits_and_misplaced_endnop() {
    let c = BatchCoordinator::new(4);
    let h = open(&c);
    let p = delta(
        h,
        BltFlags::BATCH_CONTINUE,
        BatchChanges::from_bits_retain(1 << 6),
    );
    assert_eq!(c.stage(p).unwrap_err().code(), ErrorCode::BatchFlags);

    let p = delta(h, BltFlags::BATCH_CONTINUE, BatchChanges::ENDNOP);
    assert_eq!(c.stage(p).unwrap_err().code(), ErrorCode::BatchFlags);

    let p = delta(h, BltFlags::BATCH_END, BatchChanges::ENDNOP);
    let staged = c.stage(p).unwrap();
    assert!(staged.end_nop);
    c.commit(&staged, None).unwrap();
    assert!(!c.is_open(h));
}

#[test]
fn unmarked_fields_are_inherited() {
    let c = BatchCoordinator::new(4);
    let h = open(&c);
    let staged = c
        .stage(delta(h, BltFlags::BATCH_CONTINUE, BatchChanges::empty()))
        .unwrap();
    let p = &staged.params;
    assert_eq!(p.op, Some(crate::descriptor::params::OpParams::Blend(BlendMode::SRC1OVER)));
    assert!(p.flags.contains(BltFlags::BLEND));
    assert!(!p.flags.contains(BltFlags::ROP));
    assert_eq!(p.flags.batch_mode(), BatchMode::Continue);
    assert_eq!(p.dst.rect, Rect::new(0, 0, 4, 4));
}

#[test]
fn marked_fields_replace_the_carried_ones() {
    let prev = begin().with_clip(Rect::new(0, 0, 8, 8));
    let mut next = BltParams::rop(RopCode::SRCCOPY)
        .with_flags(BltFlags::BATCH_CONTINUE)
        .with_dst(MapHandle::from_raw(5), geom(), Rect::new(4, 4, 2, 2));
    next.clip_rect = Rect::new(1, 1, 3, 3);
    let changes = BatchChanges::OP | BatchChanges::DSTRECT_ORIGIN | BatchChanges::CLIPRECT_SIZE;

    let merged = merge(&prev, next, changes);
    assert!(merged.flags.contains(BltFlags::ROP));
    assert!(!merged.flags.contains(BltFlags::BLEND));
    assert!(merged.flags.contains(BltFlags::CLIP));
    assert_eq!(merged.dst.rect, Rect::new(4, 4, 4, 4));
    assert_eq!(merged.dst.source, prev.dst.source);
    assert_eq!(merged.clip_rect, Rect::new(0, 0, 3, 3));
    assert_eq!(merged.batch_flags, changes);
}

#[test]
fn per_call_flags_come_from_the_new_request() {
    let prev = begin().with_async(None, 3);
    let next = BltParams::rop(RopCode::SRCCOPY).with_flags(BltFlags::BATCH_END);
    let merged = merge(&prev, next, BatchChanges::empty());
    assert!(!merged.flags.contains(BltFlags::ASYNC));
    assert_eq!(merged.flags.batch_mode(), BatchMode::End);
    assert_eq!(merged.callback_data, 0);
}

#[test]
fn op_key_and_surfaces_change_together() {
    let prev = begin();
    let next = BltParams::rop(RopCode::SRCCOPY)
        .with_flags(BltFlags::BATCH_CONTINUE | BltFlags::KEY_SRC)
        .with_color_key(vec![1, 2, 3, 4])
        .with_dst(MapHandle::from_raw(5), geom(), Rect::new(2, 2, 6, 6))
        .with_src1(MapHandle::from_raw(6), geom(), Rect::new(1, 1, 6, 6));
    let changes = BatchChanges::OP
        | BatchChanges::KEY
        | BatchChanges::DST
        | BatchChanges::SRC1
        | BatchChanges::DSTRECT_SIZE;

    let merged = merge(&prev, next.clone(), changes);
    assert_eq!(merged.op, next.op);
    assert_eq!(merged.color_key, Some(vec![1, 2, 3, 4]));
    assert!(merged.flags.contains(BltFlags::KEY_SRC));
    assert_eq!(merged.dst.source, next.dst.source);
    assert_eq!(merged.src1.source, next.src1.source);
    assert_eq!(merged.src2.source, prev.src2.source);
    assert_eq!(merged.dst.rect, Rect::new(0, 0, 6, 6));
    assert_eq!(merged.src1.rect, Rect::new(0, 0, 4, 4));
}
