use crate::descriptor::flags::{BatchMode, BltFlags, OpKind, TileEdges};
use crate::descriptor::params::{
    BltParams, FilterOp, GlobalAlpha, OpParams, SurfaceSlot, SurfaceSource,
};
use crate::foundation::core::{Rect, SlotRole, SurfaceGeometry, abi};
use crate::foundation::error::{BltError, BltResult, ErrorCode};
use crate::mode::blend::{BlendDesc, GlobalAlphaWidth};
use crate::mode::dither::ResolvedDither;
use crate::mode::rop::RopCode;
use crate::mode::scale::ResolvedScale;
use crate::registry::map::MapHandle;

/// Blend equation plus its resolved global alpha.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlendOp {
    /// Decoded blend word.
    pub desc: BlendDesc,
    /// Global alpha in `[0, 1]`; `1.0` when the word names none.
    pub global_alpha: f32,
}

/// The single operation of a validated blit.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    /// ROP4.
    Rop(RopCode),
    /// Blend.
    Blend(BlendOp),
    /// Filter.
    Filter(FilterOp),
}

/// Validated tiling of one input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileSpec {
    /// Edge behavior.
    pub edges: TileEdges,
    /// Brush origin relative to the destination rect.
    pub dst_left: i32,
    /// Brush origin relative to the destination rect.
    pub dst_top: i32,
    /// Virtual source width.
    pub src_width: u32,
    /// Virtual source height.
    pub src_height: u32,
}

/// One resolved slot of a blit.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfacePlan {
    /// Slot this plan fills.
    pub role: SlotRole,
    /// Backing mapping (the brush for tiled inputs).
    pub map: MapHandle,
    /// Surface layout.
    pub geometry: SurfaceGeometry,
    /// Rect read or written; the brush region for tiled inputs.
    pub rect: Rect,
    /// Tiling, when the slot is tiled.
    pub tile: Option<TileSpec>,
    /// Mirror horizontally.
    pub flip_h: bool,
    /// Mirror vertically.
    pub flip_v: bool,
}

impl SurfacePlan {
    /// Verify the surface's rect lies inside a mapping of `len` bytes.
    pub fn check_extent(&self, len: usize) -> BltResult<()> {
        let needed = self.geometry.required_len(self.rect);
        match needed {
            Some(n) if n <= len as u64 => Ok(()),
            _ => Err(BltError::field(
                self.role.codes().stride,
                format!(
                    "{:?} rect {:?} with stride {} needs {} bytes, mapping holds {len}",
                    self.role,
                    self.rect,
                    self.geometry.stride,
                    needed.map_or_else(|| "too many".to_string(), |n| n.to_string()),
                ),
            )),
        }
    }
}

/// Surface a color key compares against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum KeyTarget {
    /// Source 1 pixels matching the key are skipped.
    Source,
    /// Only destination pixels matching the key are written.
    Destination,
}

/// Validated color key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorKey {
    /// Keyed surface.
    pub target: KeyTarget,
    /// Key pixel in the keyed surface's format.
    pub pixel: Vec<u8>,
}

/// Fully resolved blit.
#[derive(Clone, Debug, PartialEq)]
pub struct BltOperation {
    /// What to compute.
    pub op: Operation,
    /// Where to write.
    pub dst: SurfacePlan,
    /// Source 1, when the operation reads it.
    pub src1: Option<SurfacePlan>,
    /// Source 2, when the operation reads it.
    pub src2: Option<SurfacePlan>,
    /// Mask, when the operation reads it.
    pub mask: Option<SurfacePlan>,
    /// Color key.
    pub color_key: Option<ColorKey>,
    /// Destination clip.
    pub clip: Option<Rect>,
    /// Sample the mask in source 1 space.
    pub mask_in_source_space: bool,
    /// Scaling kernels.
    pub scale: ResolvedScale,
    /// Dithering.
    pub dither: ResolvedDither,
    /// Return once queued.
    pub is_async: bool,
    /// Report the scale mode used.
    pub scale_return: bool,
    /// Report the dither mode used.
    pub dither_return: bool,
    /// Batch role.
    pub batch: BatchMode,
}

impl BltOperation {
    /// Every mapping the operation cites, with the slot citing it.
    pub fn handles(&self) -> Vec<(MapHandle, SlotRole)> {
        self.plans().map(|p| (p.map, p.role)).collect()
    }

    /// Destination followed by the used inputs.
    pub fn plans(&self) -> impl Iterator<Item = &SurfacePlan> {
        std::iter::once(&self.dst).chain(self.inputs())
    }

    /// Used inputs.
    pub fn inputs(&self) -> impl Iterator<Item = &SurfacePlan> {
        [&self.src1, &self.src2, &self.mask]
            .into_iter()
            .filter_map(Option::as_ref)
    }

    /// Input plan for `role`.
    pub fn input(&self, role: SlotRole) -> Option<&SurfacePlan> {
        match role {
            SlotRole::Dst => Some(&self.dst),
            SlotRole::Src1 => self.src1.as_ref(),
            SlotRole::Src2 => self.src2.as_ref(),
            SlotRole::Mask => self.mask.as_ref(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct SlotUsage {
    src1: bool,
    src2: bool,
    mask: bool,
}

/// Check a request and resolve it into an operation. First failure wins.
pub fn validate(params: &BltParams) -> BltResult<BltOperation> {
    check_version(params)?;
    let flags = params.flags;
    let kind = flags.op_kind()?;
    let key_target = check_key_flags(params)?;
    let op = resolve_op(kind, params)?;
    let scale = params.scale_mode.decode()?.resolve();
    let dither = params.dither_mode.decode()?.resolve();

    let usage = usage_of(&op);
    if key_target == Some(KeyTarget::Source) && !usage.src1 {
        return Err(BltError::field(
            ErrorCode::Key,
            "source color key on an operation without source 1",
        ));
    }

    for role in [SlotRole::Src1, SlotRole::Src2, SlotRole::Mask] {
        let slot = params.slot(role);
        if flags.tiles(role) || matches!(slot.source, Some(SurfaceSource::Tile(_))) {
            check_tile(role, slot, flags)?;
        }
    }

    let dst = plan_slot(SlotRole::Dst, &params.dst, flags, None)?;
    let plan_input = |used: bool, role: SlotRole| -> BltResult<Option<SurfacePlan>> {
        if !used {
            return Ok(None);
        }
        plan_slot(role, params.slot(role), flags, Some(dst.rect)).map(Some)
    };
    let src1 = plan_input(usage.src1, SlotRole::Src1)?;
    let src2 = plan_input(usage.src2, SlotRole::Src2)?;
    let mask = plan_input(usage.mask, SlotRole::Mask)?;

    if let Some(m) = &mask
        && !m.geometry.format.has_alpha()
    {
        return Err(BltError::field(
            ErrorCode::MaskFormat,
            format!("mask format {:?} has no alpha", m.geometry.format),
        ));
    }

    let color_key = match key_target {
        None => None,
        Some(target) => {
            let keyed = match target {
                KeyTarget::Source => src1.as_ref(),
                KeyTarget::Destination => Some(&dst),
            };
            let pixel = params.color_key.clone().unwrap_or_default();
            if let Some(plan) = keyed {
                let bpp = plan.geometry.format.bytes_per_pixel() as usize;
                if pixel.len() != bpp {
                    return Err(BltError::field(
                        ErrorCode::Key,
                        format!(
                            "key pixel has {} bytes, {:?} needs {bpp}",
                            pixel.len(),
                            plan.geometry.format
                        ),
                    ));
                }
            }
            Some(ColorKey { target, pixel })
        }
    };

    let clip = if flags.contains(BltFlags::CLIP) {
        Some(check_clip(params.clip_rect)?)
    } else {
        None
    };

    Ok(BltOperation {
        op,
        dst,
        src1,
        src2,
        mask,
        color_key,
        clip,
        mask_in_source_space: flags.contains(BltFlags::SRCMASK),
        scale,
        dither,
        is_async: flags.contains(BltFlags::ASYNC),
        scale_return: flags.contains(BltFlags::SCALE_RETURN),
        dither_return: flags.contains(BltFlags::DITHER_RETURN),
        batch: flags.batch_mode(),
    })
}

fn check_version(params: &BltParams) -> BltResult<()> {
    let size = params.struct_size;
    if size < abi::BLT_PARAMS_MIN_SIZE {
        return Err(BltError::version(
            ErrorCode::BltparamsVers,
            format!("blit parameters size {size} < {}", abi::BLT_PARAMS_MIN_SIZE),
        ));
    }
    if params.flags.batch_mode() != BatchMode::None && !params.has_batch_fields() {
        return Err(BltError::version(
            ErrorCode::BltparamsVers,
            format!("batching needs size {}, got {size}", abi::BLT_PARAMS_BATCH_SIZE),
        ));
    }
    if params.flags.contains(BltFlags::ASYNC) && !params.has_callback_fields() {
        return Err(BltError::version(
            ErrorCode::BltparamsVers,
            format!("async needs size {}, got {size}", abi::BLT_PARAMS_SIZE),
        ));
    }
    Ok(())
}

fn check_key_flags(params: &BltParams) -> BltResult<Option<KeyTarget>> {
    let target = match (
        params.flags.contains(BltFlags::KEY_SRC),
        params.flags.contains(BltFlags::KEY_DST),
    ) {
        (true, true) => {
            return Err(BltError::field(
                ErrorCode::Key,
                "source and destination color keys are mutually exclusive",
            ));
        }
        (true, false) => KeyTarget::Source,
        (false, true) => KeyTarget::Destination,
        (false, false) => return Ok(None),
    };
    if params.color_key.is_none() {
        return Err(BltError::field(ErrorCode::Key, "color key flag without a key pixel"));
    }
    Ok(Some(target))
}

fn resolve_op(kind: OpKind, params: &BltParams) -> BltResult<Operation> {
    match (kind, &params.op) {
        (OpKind::Rop, Some(OpParams::Rop(rop))) => Ok(Operation::Rop(*rop)),
        (OpKind::Blend, Some(OpParams::Blend(mode))) => {
            let desc = mode.decode()?;
            let global_alpha = resolve_global_alpha(desc.global_alpha, params.global_alpha)?;
            Ok(Operation::Blend(BlendOp { desc, global_alpha }))
        }
        (OpKind::Filter, Some(OpParams::Filter(filter))) => {
            if filter.struct_size < abi::FILTER_OP_SIZE {
                return Err(BltError::version(
                    ErrorCode::FilterParamsVers,
                    format!(
                        "filter size {} < {}",
                        filter.struct_size,
                        abi::FILTER_OP_SIZE
                    ),
                ));
            }
            Ok(Operation::Filter(filter.clone()))
        }
        (OpKind::Filter, None) => Err(BltError::field(
            ErrorCode::Filter,
            "filter flag without a filter",
        )),
        (kind, other) => Err(BltError::field(
            ErrorCode::Op,
            format!("{kind:?} selected but the operation field holds {other:?}"),
        )),
    }
}

fn resolve_global_alpha(width: GlobalAlphaWidth, value: Option<GlobalAlpha>) -> BltResult<f32> {
    let normalized = match (width, value) {
        (GlobalAlphaWidth::None, _) => return Ok(1.0),
        (GlobalAlphaWidth::U8, Some(v @ GlobalAlpha::U8(_)))
        | (GlobalAlphaWidth::U16, Some(v @ GlobalAlpha::U16(_)))
        | (GlobalAlphaWidth::U32, Some(v @ GlobalAlpha::U32(_)))
        | (GlobalAlphaWidth::F32, Some(v @ GlobalAlpha::F32(_))) => v.normalized(),
        _ => None,
    };
    normalized.ok_or_else(|| {
        BltError::field(
            ErrorCode::Blend,
            format!("global alpha {value:?} does not match width {width:?}"),
        )
    })
}

fn usage_of(op: &Operation) -> SlotUsage {
    match op {
        Operation::Rop(rop) => SlotUsage {
            src1: rop.uses_source(),
            src2: rop.uses_pattern(),
            mask: rop.uses_mask(),
        },
        Operation::Blend(b) => SlotUsage {
            src1: true,
            src2: true,
            mask: b.desc.remote_alpha,
        },
        Operation::Filter(_) => SlotUsage {
            src1: true,
            ..SlotUsage::default()
        },
    }
}

fn check_tile(role: SlotRole, slot: &SurfaceSlot, flags: BltFlags) -> BltResult<TileSpec> {
    let codes = role.codes();
    let tile = match (flags.tiles(role), slot.source) {
        (true, Some(SurfaceSource::Tile(t))) => t,
        (true, _) => {
            return Err(BltError::field(
                codes.tile,
                format!("{role:?} tile flag set without tile parameters"),
            ));
        }
        (false, _) => {
            return Err(BltError::field(
                codes.tile,
                format!("{role:?} carries tile parameters without its tile flag"),
            ));
        }
    };
    if tile.struct_size < abi::TILE_PARAMS_SIZE {
        return Err(BltError::version(
            codes.tile_vers,
            format!(
                "{role:?} tile parameters size {} < {}",
                tile.struct_size,
                abi::TILE_PARAMS_SIZE
            ),
        ));
    }
    let edges = TileEdges::decode(tile.flags).ok_or_else(|| {
        BltError::field(
            codes.tile_flags,
            format!("{role:?} tile flags {:#x} use reserved values", tile.flags),
        )
    })?;
    if tile.src_width == 0 || tile.src_height == 0 {
        return Err(BltError::field(
            codes.tile_size,
            format!(
                "{role:?} virtual source {}x{} is empty",
                tile.src_width, tile.src_height
            ),
        ));
    }
    Ok(TileSpec {
        edges,
        dst_left: tile.dst_left,
        dst_top: tile.dst_top,
        src_width: tile.src_width,
        src_height: tile.src_height,
    })
}

fn check_geometry(role: SlotRole, geometry: Option<&SurfaceGeometry>) -> BltResult<&SurfaceGeometry> {
    let codes = role.codes();
    let Some(geom) = geometry else {
        return Err(BltError::version(
            codes.vers,
            format!("{role:?} has no surface geometry"),
        ));
    };
    if geom.struct_size < abi::SURFACE_GEOMETRY_MIN_SIZE {
        return Err(BltError::version(
            codes.vers,
            format!(
                "{role:?} geometry size {} < {}",
                geom.struct_size,
                abi::SURFACE_GEOMETRY_MIN_SIZE
            ),
        ));
    }
    if geom.format.is_indexed() {
        if geom.struct_size < abi::SURFACE_GEOMETRY_SIZE {
            return Err(BltError::version(
                codes.vers,
                format!("{role:?} indexed geometry predates the palette field"),
            ));
        }
        check_palette(role, geom)?;
    }
    if geom.orientation % 90 != 0 {
        return Err(BltError::field(
            codes.rot,
            format!("{role:?} orientation {} is not a multiple of 90", geom.orientation),
        ));
    }
    let min_stride = i64::from(geom.width) * i64::from(geom.format.bytes_per_pixel());
    if geom.stride <= 0 || geom.stride < min_stride {
        return Err(BltError::field(
            codes.stride,
            format!(
                "{role:?} stride {} below the {min_stride}-byte row",
                geom.stride
            ),
        ));
    }
    Ok(geom)
}

fn check_palette(role: SlotRole, geom: &SurfaceGeometry) -> BltResult<()> {
    let format_code = role.codes().format;
    let Some(palette) = geom.palette() else {
        return Err(BltError::field(
            format_code,
            format!("{role:?} {:?} surface has no palette", geom.format),
        ));
    };
    if !palette.format.is_palette_entry_format() {
        return Err(BltError::field(
            format_code,
            format!("{role:?} palette format {:?} unsupported", palette.format),
        ));
    }
    let needed = (1usize << (geom.format.bytes_per_pixel() * 8))
        * palette.format.bytes_per_pixel() as usize;
    if palette.entries.len() < needed {
        return Err(BltError::field(
            format_code,
            format!(
                "{role:?} palette holds {} bytes, needs {needed}",
                palette.entries.len()
            ),
        ));
    }
    Ok(())
}

fn plan_slot(
    role: SlotRole,
    slot: &SurfaceSlot,
    flags: BltFlags,
    dst_rect: Option<Rect>,
) -> BltResult<SurfacePlan> {
    let codes = role.codes();
    let tile = if flags.tiles(role) {
        Some(check_tile(role, slot, flags)?)
    } else {
        None
    };
    let map = match slot.source {
        Some(SurfaceSource::Map(h)) if tile.is_none() => h,
        Some(SurfaceSource::Tile(t)) if tile.is_some() => t.brush,
        Some(SurfaceSource::Tile(_)) => {
            return Err(BltError::field(
                codes.tile,
                format!("{role:?} carries tile parameters without its tile flag"),
            ));
        }
        _ => {
            return Err(BltError::resource(
                codes.handle,
                format!("{role:?} has no buffer mapping"),
            ));
        }
    };
    let geometry = check_geometry(role, slot.geometry.as_ref())?.clone();
    let rect = slot.rect;

    match (dst_rect, tile) {
        (None, _) => {
            if rect.is_empty() {
                return Err(BltError::field(
                    codes.rect,
                    format!("destination rect {rect:?} is empty"),
                ));
            }
        }
        (Some(_), Some(_)) if rect.is_empty() => {
            return Err(BltError::field(
                codes.tile_size,
                format!("{role:?} brush rect {rect:?} is empty"),
            ));
        }
        (Some(dst), Some(t)) => {
            let inside = |off: i32, extent: u32| off >= 0 && i64::from(off) < i64::from(extent);
            if !inside(t.dst_left, dst.width) || !inside(t.dst_top, dst.height) {
                return Err(BltError::field(
                    codes.tile_origin,
                    format!(
                        "{role:?} brush origin ({}, {}) outside the {}x{} destination",
                        t.dst_left, t.dst_top, dst.width, dst.height
                    ),
                ));
            }
        }
        (Some(_), None) => {
            if rect.width == 0 {
                return Err(BltError::field(
                    codes.horz_scale,
                    format!("{role:?} rect {rect:?} collapses horizontally"),
                ));
            }
            if rect.height == 0 {
                return Err(BltError::field(
                    codes.vert_scale,
                    format!("{role:?} rect {rect:?} collapses vertically"),
                ));
            }
        }
    }

    if !rect.fits_within(geometry.width, geometry.height) {
        return Err(BltError::field(
            codes.rect,
            format!(
                "{role:?} rect {rect:?} outside the {}x{} surface",
                geometry.width, geometry.height
            ),
        ));
    }

    let (flip_h, flip_v) = flags.flips(role);
    Ok(SurfacePlan {
        role,
        map,
        geometry,
        rect,
        tile,
        flip_h,
        flip_v,
    })
}

fn check_clip(clip: Rect) -> BltResult<Rect> {
    if clip.is_empty() {
        return Err(BltError::field(
            ErrorCode::ClipRect,
            format!("clip rect {clip:?} is empty"),
        ));
    }
    if clip.right() > i64::from(i32::MAX) || clip.bottom() > i64::from(i32::MAX) {
        return Err(BltError::field(
            ErrorCode::ClipRect,
            format!("clip rect {clip:?} overflows"),
        ));
    }
    Ok(clip)
}

#[cfg(test)]
#[path = "../../tests/unit/descriptor/validate.rs"]
mod tests;
