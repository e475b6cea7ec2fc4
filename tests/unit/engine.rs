use super::*;

use crate::descriptor::flags::{BatchChanges, BltFlags};
use crate::foundation::core::{PixelBuffer, PixelFormat, Rect, SurfaceGeometry};
use crate::mode::blend::BlendMode;
use crate::mode::rop::RopCode;

fn engine() -> Engine {
    Engine::new(EngineConfig {
        worker_threads: Some(2),
        ..EngineConfig::default()
    })
    .unwrap()
}

fn geom() -> SurfaceGeometry {
    SurfaceGeometry::packed(PixelFormat::Rgba8888Pre, 4, 4)
}

fn surface(e: &Engine, fill: u8) -> (MapHandle, PixelBuffer) {
    let buf = PixelBuffer::from_vec(vec![fill; 4 * 4 * 4]);
    (e.map(&BufferDesc::new(&buf)).unwrap(), buf)
}

fn copy(dst: MapHandle, src: MapHandle) -> BltParams {
    BltParams::rop(RopCode::SRCCOPY)
        .with_dst(dst, geom(), Rect::new(0, 0, 4, 4))
        .with_src1(src, geom(), Rect::new(0, 0, 4, 4))
}

#[test]
fn sync_copy_completes_before_returning() {
    let e = engine();
    let (src, _) = surface(&e, 7);
    let (dst, out) = surface(&e, 0);
    let outcome = e.blt(copy(dst, src)).unwrap();
    assert!(matches!(outcome.status, BltStatus::Done));
    assert!(outcome.batch.is_none());
    assert_eq!(out.to_vec().unwrap(), vec![7; 64]);
    assert_eq!(e.registry().refs(dst), Some(1));
}

#[test]
fn rejected_requests_leave_no_references() {
    let e = engine();
    let (src, _) = surface(&e, 7);
    let (dst, _) = surface(&e, 0);
    let p = copy(dst, src).with_flags(BltFlags::KEY_SRC | BltFlags::KEY_DST);
    assert_eq!(e.blt(p).unwrap_err().code(), ErrorCode::Key);
    assert_eq!(e.registry().refs(src), Some(1));
    e.unmap(src).unwrap();
    e.unmap(dst).unwrap();
}

#[test]
fn short_mappings_fail_the_extent_check() {
    let e = engine();
    let (src, _) = surface(&e, 7);
    let small = PixelBuffer::zeroed(16);
    let dst = e.map(&BufferDesc::new(&small)).unwrap();
    assert_eq!(e.blt(copy(dst, src)).unwrap_err().code(), ErrorCode::DstStride);
    assert_eq!(e.registry().refs(dst), Some(1));
}

#[test]
fn mode_return_flags_report_the_resolved_modes() {
    let e = engine();
    let (src, _) = surface(&e, 7);
    let (dst, _) = surface(&e, 0);
    let p = copy(dst, src).with_flags(BltFlags::SCALE_RETURN | BltFlags::DITHER_RETURN);
    let outcome = e.blt(p).unwrap();
    let scale = outcome.scale_mode.unwrap().decode().unwrap().resolve();
    assert_eq!(scale.horizontal, crate::mode::scale::ScaleKernel::NearestNeighbor);
    assert!(outcome.dither_mode.is_some());

    let outcome = e.blt(copy(dst, src)).unwrap();
    assert!(outcome.scale_mode.is_none() && outcome.dither_mode.is_none());
}

#[test]
fn open_batches_pin_their_mappings() {
    let e = engine();
    let (src, _) = surface(&e, 7);
    let (dst, _) = surface(&e, 0);
    let begin = e
        .blt(copy(dst, src).with_flags(BltFlags::BATCH_BEGIN))
        .unwrap();
    let h = begin.batch.unwrap();
    assert_eq!(e.open_batches(), 1);
    assert_eq!(e.unmap(src).unwrap_err().code(), ErrorCode::Rsrc);

    let end = BltParams::rop(RopCode::SRCCOPY)
        .with_flags(BltFlags::BATCH_END)
        .in_batch(h, BatchChanges::ENDNOP);
    let outcome = e.blt(end).unwrap();
    assert!(matches!(outcome.status, BltStatus::BatchClosed));
    assert_eq!(outcome.batch, Some(h));
    assert_eq!(e.open_batches(), 0);
    e.unmap(src).unwrap();
}

#[test]
fn async_blit_reports_through_ticket_and_callback() {
    let e = engine();
    let (src, _) = surface(&e, 9);
    let (dst, out) = surface(&e, 0);
    let (tx, rx) = std::sync::mpsc::channel();
    let cb = crate::exec::completion::Callback::new(move |err, token| {
        let _ = tx.send((err.map(|e| e.error), token));
    });
    let outcome = e.blt(copy(dst, src).with_async(Some(cb), 42)).unwrap();
    let ticket = outcome.into_ticket().unwrap();
    assert_eq!(ticket.token(), 42);
    ticket.wait().unwrap();
    assert_eq!(rx.recv().unwrap(), (None, 42));
    assert_eq!(out.to_vec().unwrap(), vec![9; 64]);
    e.flush();
    e.unmap(dst).unwrap();
}

#[test]
fn filters_are_refused_synchronously() {
    let e = engine();
    let (src, _) = surface(&e, 1);
    let (dst, _) = surface(&e, 0);
    let p = BltParams::new(
        BltFlags::FILTER,
        crate::descriptor::params::OpParams::Filter(crate::descriptor::params::FilterOp::new(
            0x1,
            Vec::new(),
        )),
    )
    .with_dst(dst, geom(), Rect::new(0, 0, 4, 4))
    .with_src1(src, geom(), Rect::new(0, 0, 4, 4));
    assert_eq!(e.blt(p).unwrap_err().code(), ErrorCode::Filter);
}

#[test]
fn cache_ops_check_handle_and_range() {
    let e = engine();
    let (h, _) = surface(&e, 0);
    let ok = CacheParams {
        map: h,
        op: CacheOp::Clean,
        offset: 16,
        len: 48,
    };
    e.cache_op(&ok).unwrap();

    let past_end = CacheParams { len: 49, ..ok };
    assert_eq!(
        e.cache_op(&past_end).unwrap_err().code(),
        ErrorCode::MemoryUnmappable
    );
    let overflow = CacheParams {
        offset: usize::MAX,
        len: 2,
        ..ok
    };
    assert_eq!(
        e.cache_op(&overflow).unwrap_err().code(),
        ErrorCode::MemoryUnmappable
    );

    e.unmap(h).unwrap();
    assert_eq!(e.cache_op(&ok).unwrap_err().code(), ErrorCode::Rsrc);
}

#[test]
fn blend_sources_may_alias_the_destination() {
    let e = engine();
    let (src, _) = surface(&e, 0);
    let (dst, out) = surface(&e, 200);
    let p = BltParams::blend(BlendMode::SRC1OVER)
        .with_dst(dst, geom(), Rect::new(0, 0, 4, 4))
        .with_src1(src, geom(), Rect::new(0, 0, 4, 4))
        .with_src2(dst, geom(), Rect::new(0, 0, 4, 4));
    e.blt(p).unwrap();
    assert_eq!(out.to_vec().unwrap(), vec![200; 64]);
}

#[test]
fn failed_sync_begin_leaves_no_batch_open() {
    let e = engine();
    let (src, _) = surface(&e, 7);
    let (dst, backing) = surface(&e, 0);
    backing.write().unwrap().truncate(8);

    let err = e
        .blt(copy(dst, src).with_flags(BltFlags::BATCH_BEGIN))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::MemoryError);
    assert_eq!(e.open_batches(), 0);
    assert_eq!(e.registry().refs(src), Some(1));
    e.unmap(src).unwrap();
    e.unmap(dst).unwrap();
}

#[test]
fn panicking_callback_leaves_the_engine_usable() {
    let e = engine();
    let (src, _) = surface(&e, 5);
    let (dst, out) = surface(&e, 0);
    let cb = crate::exec::completion::Callback::new(|_, _| panic!("client callback"));
    let ticket = e
        .blt(copy(dst, src).with_async(Some(cb), 1))
        .unwrap()
        .into_ticket()
        .unwrap();
    e.flush();
    assert_eq!(ticket.wait(), Ok(()));
    assert_eq!(out.to_vec().unwrap(), vec![5; 64]);
    e.unmap(src).unwrap();
    e.unmap(dst).unwrap();
}
