use crate::descriptor::flags::TileEdge;
use crate::descriptor::validate::{BltOperation, KeyTarget, Operation, SurfacePlan, TileSpec};
use crate::foundation::core::{PixelFormat, Rect};
use crate::foundation::error::{BltError, BltResult, ErrorCode};
use crate::foundation::math::{bayer_threshold, u8_to_unit, unit_to_u8};
use crate::mode::blend::BlendKind;
use crate::mode::dither::{DitherMatrix, ResolvedDither};
use crate::mode::scale::{ResolvedScale, ScaleKernel};
use crate::raster::{CacheOp, RasterKernel, pixel};
use crate::registry::map::{MapLease, MappedView};

/// Reference kernel: one thread, one pixel at a time, every supported format.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuKernel;

impl CpuKernel {
    /// Create the kernel.
    pub fn new() -> Self {
        Self
    }
}

impl RasterKernel for CpuKernel {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn supports(&self, op: &BltOperation) -> BltResult<()> {
        if let Operation::Filter(f) = &op.op {
            return Err(BltError::field(
                ErrorCode::Filter,
                format!("cpu kernel implements no filters (requested {:#x})", f.filter),
            ));
        }
        let dst_format = op.dst.geometry.format;
        if dst_format.is_indexed() {
            return Err(BltError::field(
                ErrorCode::DstFormat,
                format!("cannot write {dst_format:?} surfaces"),
            ));
        }
        if dst_format == PixelFormat::Rgb565
            && matches!(op.dither, ResolvedDither::Random | ResolvedDither::Diffused)
        {
            return Err(BltError::field(
                ErrorCode::DitherMode,
                format!("{:?} dither into {dst_format:?} unsupported", op.dither),
            ));
        }
        for input in op.inputs() {
            let codes = input.role.codes();
            let turn = turn(input, &op.dst);
            if input.tile.is_some() {
                if turn != 0 {
                    return Err(BltError::field(
                        codes.rot,
                        format!("{:?} tiled brush cannot rotate", input.role),
                    ));
                }
                continue;
            }
            let axes = Axes::new(input, &op.dst, op.scale);
            for (scaled, kernel) in [(axes.scaled_x, axes.kernel_x), (axes.scaled_y, axes.kernel_y)] {
                if scaled
                    && !matches!(kernel, ScaleKernel::NearestNeighbor | ScaleKernel::Linear)
                {
                    return Err(BltError::field(
                        ErrorCode::ScaleMode,
                        format!("{kernel:?} scaling of {:?} unsupported", input.role),
                    ));
                }
            }
        }
        Ok(())
    }

    fn execute(&self, op: &BltOperation, lease: &MapLease) -> BltResult<()> {
        let src1 = op.src1.as_ref().map(|p| Input::snapshot(p, op, lease)).transpose()?;
        let src2 = op.src2.as_ref().map(|p| Input::snapshot(p, op, lease)).transpose()?;
        let mask = op.mask.as_ref().map(|p| Input::snapshot(p, op, lease)).transpose()?;

        let dst = &op.dst;
        let region = write_region(op);
        if region.is_empty() {
            return Ok(());
        }

        let view = lease.view(dst.role).ok_or_else(|| not_leased(dst))?;
        let mut guard = view.buffer.write()?;
        let target = guard
            .get_mut(view.offset..view.offset + view.length)
            .ok_or_else(|| out_of_bounds(view))?;
        let format = dst.geometry.format;
        let bpp = format.bytes_per_pixel() as usize;
        let stride = usize::try_from(dst.geometry.stride).unwrap_or(0);
        let matrix = dither_sides(op.dither, format);

        for y in region.top..(region.bottom() as i32) {
            for x in region.left..(region.right() as i32) {
                let (dx, dy) = ((x - dst.rect.left) as u32, (y - dst.rect.top) as u32);
                let at = y as usize * stride + x as usize * bpp;
                let Some(out) = target.get_mut(at..at + bpp) else {
                    return Err(out_of_bounds(view));
                };

                if let Some(key) = &op.color_key
                    && key.target == KeyTarget::Destination
                    && out[..] != key.pixel[..]
                {
                    continue;
                }
                let s1 = src1.as_ref().map(|s| s.sample(dx, dy));
                if let (Some(key), Some(s1), Some(input)) = (&op.color_key, &s1, &src1)
                    && key.target == KeyTarget::Source
                    && input.raw(s1.nearest) == key.pixel.as_slice()
                {
                    continue;
                }
                let s2 = src2.as_ref().map(|s| s.sample(dx, dy).texel);
                let coverage = mask.as_ref().map(|m| match (&s1, &src1) {
                    (Some(s1), Some(src)) if op.mask_in_source_space => {
                        m.coverage_at_source(src, s1.nearest)
                    }
                    _ => m.sample(dx, dy).texel[3],
                });

                match &op.op {
                    Operation::Rop(rop) => {
                        let mut p = [0u8; 4];
                        let mut s = [0u8; 4];
                        if let Some(t) = s2 {
                            pixel::encode(format, t, &mut p, None);
                        }
                        if let Some(t) = &s1 {
                            pixel::encode(format, t.texel, &mut s, None);
                        }
                        let mask_set = coverage.is_none_or(|c| c >= 128);
                        for (i, d) in out.iter_mut().enumerate() {
                            *d = rop.apply(p[i], s[i], *d, mask_set);
                        }
                    }
                    Operation::Blend(blend) => {
                        let mut c1 = to_unit(s1.map(|s| s.texel).unwrap_or_default());
                        let c2 = to_unit(s2.unwrap_or_default());
                        let mut scale = blend.global_alpha;
                        if blend.desc.remote_alpha {
                            scale *= u8_to_unit(coverage.unwrap_or(0));
                        }
                        c1 = c1.map(|v| v * scale);
                        let result = match blend.desc.kind {
                            BlendKind::Classic(k) => k.apply(c1, c2),
                            BlendKind::Essential { mode } => mode.apply(c1, c2),
                        };
                        let threshold = matrix.map(|[five, six]| {
                            let t5 = bayer_threshold(five, x as u32, y as u32);
                            [t5, bayer_threshold(six, x as u32, y as u32), t5]
                        });
                        pixel::encode(format, result.map(unit_to_u8), out, threshold);
                    }
                    Operation::Filter(_) => {
                        return Err(BltError::execution(
                            ErrorCode::OpFailed,
                            "filter reached the cpu kernel",
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn cache_op(&self, view: &MappedView, op: CacheOp, offset: usize, len: usize) -> BltResult<()> {
        // Client memory is the kernel's memory; there is nothing to write back.
        tracing::debug!(handle = view.handle.raw(), ?op, offset, len, "cpu cache op");
        Ok(())
    }
}

fn to_unit(px: [u8; 4]) -> [f32; 4] {
    px.map(u8_to_unit)
}

/// Bayer matrix sides for the 5-bit and the 6-bit channels of an `Rgb565` destination.
fn dither_sides(dither: ResolvedDither, format: PixelFormat) -> Option<[usize; 2]> {
    if format != PixelFormat::Rgb565 {
        return None;
    }
    match dither {
        ResolvedDither::Ordered(DitherMatrix::Ordered2x2) => Some([2, 2]),
        ResolvedDither::Ordered(DitherMatrix::Ordered4x4) => Some([4, 4]),
        ResolvedDither::Ordered(DitherMatrix::Ordered2x2And4x4) => Some([4, 2]),
        _ => None,
    }
}

fn not_leased(plan: &SurfacePlan) -> BltError {
    BltError::execution(
        ErrorCode::OpFailed,
        format!("{:?} mapping {} is not leased", plan.role, plan.map.raw()),
    )
}

fn out_of_bounds(view: &MappedView) -> BltError {
    BltError::execution(
        ErrorCode::MemoryError,
        format!(
            "mapping {} range {}+{} is no longer backed",
            view.handle.raw(),
            view.offset,
            view.length
        ),
    )
}

/// Clockwise quarter turns, in degrees, between an input and the destination.
fn turn(input: &SurfacePlan, dst: &SurfacePlan) -> i32 {
    (input.geometry.normalized_orientation() - dst.geometry.normalized_orientation())
        .rem_euclid(360)
}

/// Per-axis scaling of one input, in source axes.
#[derive(Clone, Copy, Debug)]
struct Axes {
    turn: i32,
    dst_w: u32,
    dst_h: u32,
    scaled_x: bool,
    scaled_y: bool,
    kernel_x: ScaleKernel,
    kernel_y: ScaleKernel,
}

impl Axes {
    fn new(input: &SurfacePlan, dst: &SurfacePlan, scale: ResolvedScale) -> Self {
        let turn = turn(input, dst);
        let (sw, sh) = (input.rect.width, input.rect.height);
        let (dw, dh) = (dst.rect.width, dst.rect.height);
        let quarter = turn == 90 || turn == 270;
        // Source x runs along the destination's vertical axis after a quarter turn.
        let (scaled_x, scaled_y, kernel_x, kernel_y) = if quarter {
            (sw != dh, sh != dw, scale.vertical, scale.horizontal)
        } else {
            (sw != dw, sh != dh, scale.horizontal, scale.vertical)
        };
        Self {
            turn,
            dst_w: dw,
            dst_h: dh,
            scaled_x,
            scaled_y,
            kernel_x,
            kernel_y,
        }
    }
}

/// Absolute source coordinates contributing to one destination pixel.
#[derive(Clone, Copy, Debug)]
struct Sample {
    texel: [u8; 4],
    nearest: (u32, u32),
}

struct Input<'a> {
    plan: &'a SurfacePlan,
    bytes: Vec<u8>,
    bpp: usize,
    stride: usize,
    axes: Axes,
}

impl<'a> Input<'a> {
    /// Copy the mapped range so inputs that alias the destination read pre-blit pixels.
    fn snapshot(plan: &'a SurfacePlan, op: &BltOperation, lease: &MapLease) -> BltResult<Self> {
        let view = lease.view(plan.role).ok_or_else(|| not_leased(plan))?;
        let bytes = view
            .buffer
            .read()?
            .get(view.offset..view.offset + view.length)
            .ok_or_else(|| out_of_bounds(view))?
            .to_vec();
        Ok(Self {
            plan,
            bytes,
            bpp: plan.geometry.format.bytes_per_pixel() as usize,
            stride: usize::try_from(plan.geometry.stride).unwrap_or(0),
            axes: Axes::new(plan, &op.dst, op.scale),
        })
    }

    fn raw(&self, (x, y): (u32, u32)) -> &[u8] {
        let at = y as usize * self.stride + x as usize * self.bpp;
        self.bytes.get(at..at + self.bpp).unwrap_or(&[])
    }

    fn texel(&self, at: (u32, u32)) -> [u8; 4] {
        let g = &self.plan.geometry;
        pixel::decode(g.format, self.raw(at), g.palette())
    }

    fn sample(&self, dx: u32, dy: u32) -> Sample {
        match self.plan.tile {
            Some(tile) => self.sample_tile(&tile, dx, dy),
            None => self.sample_rect(dx, dy),
        }
    }

    fn sample_tile(&self, tile: &TileSpec, dx: u32, dy: u32) -> Sample {
        let rect = self.plan.rect;
        let axis = |d: u32, origin: i32, virt: u32, dst: u32, n: u32, lo: TileEdge, hi: TileEdge| {
            let u = ((i64::from(d) - i64::from(origin)) * i64::from(virt))
                .div_euclid(i64::from(dst.max(1)));
            let edge = if u < 0 { lo } else { hi };
            wrap(u, i64::from(n), edge) as u32
        };
        let e = tile.edges;
        let mut bx = axis(dx, tile.dst_left, tile.src_width, self.axes.dst_w, rect.width, e.left, e.right);
        let mut by = axis(dy, tile.dst_top, tile.src_height, self.axes.dst_h, rect.height, e.top, e.bottom);
        if self.plan.flip_h {
            bx = rect.width - 1 - bx;
        }
        if self.plan.flip_v {
            by = rect.height - 1 - by;
        }
        let at = (rect.left as u32 + bx, rect.top as u32 + by);
        Sample {
            texel: self.texel(at),
            nearest: at,
        }
    }

    fn sample_rect(&self, dx: u32, dy: u32) -> Sample {
        let rect = self.plan.rect;
        let a = self.axes;
        let (sw, sh) = (rect.width as f32, rect.height as f32);
        let quarter = a.turn == 90 || a.turn == 270;
        let (ew, eh) = if quarter { (sh, sw) } else { (sw, sh) };
        let ex = (dx as f32 + 0.5) * ew / a.dst_w as f32 - 0.5;
        let ey = (dy as f32 + 0.5) * eh / a.dst_h as f32 - 0.5;
        let (mut sx, mut sy) = match a.turn {
            90 => (ey, sh - 1.0 - ex),
            180 => (sw - 1.0 - ex, sh - 1.0 - ey),
            270 => (sw - 1.0 - ey, ex),
            _ => (ex, ey),
        };
        if self.plan.flip_h {
            sx = sw - 1.0 - sx;
        }
        if self.plan.flip_v {
            sy = sh - 1.0 - sy;
        }
        let (x0, x1, tx) = taps(sx, rect.width, a.scaled_x, a.kernel_x);
        let (y0, y1, ty) = taps(sy, rect.height, a.scaled_y, a.kernel_y);
        let (ox, oy) = (rect.left as u32, rect.top as u32);
        let at = |x: u32, y: u32| (ox + x, oy + y);

        let texel = if tx == 0.0 && ty == 0.0 {
            self.texel(at(x0, y0))
        } else {
            let p00 = self.texel(at(x0, y0));
            let p10 = self.texel(at(x1, y0));
            let p01 = self.texel(at(x0, y1));
            let p11 = self.texel(at(x1, y1));
            let mut out = [0u8; 4];
            for ch in 0..4 {
                let top = f32::from(p00[ch]) * (1.0 - tx) + f32::from(p10[ch]) * tx;
                let bottom = f32::from(p01[ch]) * (1.0 - tx) + f32::from(p11[ch]) * tx;
                out[ch] = (top * (1.0 - ty) + bottom * ty + 0.5).clamp(0.0, 255.0) as u8;
            }
            out
        };
        let near_x = if tx < 0.5 { x0 } else { x1 };
        let near_y = if ty < 0.5 { y0 } else { y1 };
        Sample {
            texel,
            nearest: at(near_x, near_y),
        }
    }

    /// Mask coverage one-to-one with source 1 pixels.
    fn coverage_at_source(&self, src1: &Input<'_>, (x, y): (u32, u32)) -> u8 {
        let lx = x - src1.plan.rect.left as u32;
        let ly = y - src1.plan.rect.top as u32;
        let rect = self.plan.rect;
        if lx >= rect.width || ly >= rect.height {
            return 0;
        }
        self.texel((rect.left as u32 + lx, rect.top as u32 + ly))[3]
    }
}

/// Source taps and weight along one axis of `n` pixels.
fn taps(s: f32, n: u32, scaled: bool, kernel: ScaleKernel) -> (u32, u32, f32) {
    let last = n.saturating_sub(1) as f32;
    if !scaled || kernel != ScaleKernel::Linear {
        let i = s.round().clamp(0.0, last) as u32;
        return (i, i, 0.0);
    }
    let f = s.floor();
    let t = s - f;
    let i0 = f.clamp(0.0, last) as u32;
    let i1 = (f + 1.0).clamp(0.0, last) as u32;
    if i0 == i1 { (i0, i0, 0.0) } else { (i0, i1, t) }
}

/// Fold `u` into `[0, n)` with repeat or mirror periodicity.
fn wrap(u: i64, n: i64, edge: TileEdge) -> i64 {
    if (0..n).contains(&u) {
        return u;
    }
    match edge {
        TileEdge::Repeat => u.rem_euclid(n),
        TileEdge::Mirror => {
            let m = u.rem_euclid(2 * n);
            if m < n { m } else { 2 * n - 1 - m }
        }
    }
}

/// Region a blit writes: the destination rect, clipped.
pub fn write_region(op: &BltOperation) -> Rect {
    match op.clip {
        Some(c) => op.dst.rect.intersect(c),
        None => op.dst.rect,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/cpu.rs"]
mod tests;
