use crate::batch::BatchHandle;
use crate::descriptor::flags::{BatchChanges, BltFlags};
use crate::exec::completion::Callback;
use crate::foundation::core::{Rect, SlotRole, SurfaceGeometry, abi};
use crate::mode::blend::BlendMode;
use crate::mode::dither::DitherMode;
use crate::mode::rop::RopCode;
use crate::mode::scale::ScaleMode;
use crate::registry::map::MapHandle;

/// Implementation-defined filter request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterOp {
    /// Structure version; see [`abi`].
    pub struct_size: u32,
    /// Filter identifier.
    pub filter: u32,
    /// Opaque filter parameters.
    pub params: Vec<u8>,
}

impl FilterOp {
    /// Filter request of the current version.
    pub fn new(filter: u32, params: Vec<u8>) -> Self {
        Self {
            struct_size: abi::FILTER_OP_SIZE,
            filter,
            params,
        }
    }
}

/// Operation field. Which arm is read is decided by the flags.
#[derive(Clone, Debug, PartialEq)]
pub enum OpParams {
    /// ROP4 code.
    Rop(RopCode),
    /// Packed blend word.
    Blend(BlendMode),
    /// Filter request.
    Filter(FilterOp),
}

/// Global alpha value, tagged by the width named in the blend word.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GlobalAlpha {
    /// `0..=255` maps to `0.0..=1.0`.
    U8(u8),
    /// `0..=65535` maps to `0.0..=1.0`.
    U16(u16),
    /// `0..=u32::MAX` maps to `0.0..=1.0`.
    U32(u32),
    /// Already normalized.
    F32(f32),
}

impl GlobalAlpha {
    /// Value in `[0, 1]`, or `None` for a float outside that range.
    pub fn normalized(self) -> Option<f32> {
        match self {
            Self::U8(v) => Some(f32::from(v) / 255.0),
            Self::U16(v) => Some(f32::from(v) / 65535.0),
            Self::U32(v) => Some((f64::from(v) / f64::from(u32::MAX)) as f32),
            Self::F32(v) => (v.is_finite() && (0.0..=1.0).contains(&v)).then_some(v),
        }
    }
}

/// Tiling request that stands in for a mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileParams {
    /// Structure version; see [`abi`].
    pub struct_size: u32,
    /// Per-edge repeat/mirror flags.
    pub flags: u32,
    /// Mapping that holds the brush.
    pub brush: MapHandle,
    /// Brush origin, relative to the destination rect.
    pub dst_left: i32,
    /// Brush origin, relative to the destination rect.
    pub dst_top: i32,
    /// Virtual source width; with the destination width it sets the horizontal scale.
    pub src_width: u32,
    /// Virtual source height; with the destination height it sets the vertical scale.
    pub src_height: u32,
}

impl TileParams {
    /// Unscaled repeat tiling of a `width`×`height` brush anchored at the destination origin.
    pub fn repeat(brush: MapHandle, width: u32, height: u32) -> Self {
        Self {
            struct_size: abi::TILE_PARAMS_SIZE,
            flags: 0,
            brush,
            dst_left: 0,
            dst_top: 0,
            src_width: width,
            src_height: height,
        }
    }
}

/// What backs a surface slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceSource {
    /// A registered mapping.
    Map(MapHandle),
    /// A tiled brush.
    Tile(TileParams),
}

impl SurfaceSource {
    /// Mapping cited by this source.
    pub fn handle(self) -> MapHandle {
        match self {
            Self::Map(h) => h,
            Self::Tile(t) => t.brush,
        }
    }
}

/// Buffer, geometry and rect of one slot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurfaceSlot {
    /// Backing buffer.
    pub source: Option<SurfaceSource>,
    /// Surface layout.
    pub geometry: Option<SurfaceGeometry>,
    /// Rect read from (inputs) or written to (destination).
    pub rect: Rect,
}

impl SurfaceSlot {
    /// Slot backed by a mapping.
    pub fn mapped(map: MapHandle, geometry: SurfaceGeometry, rect: Rect) -> Self {
        Self {
            source: Some(SurfaceSource::Map(map)),
            geometry: Some(geometry),
            rect,
        }
    }

    /// Slot backed by a tiled brush.
    pub fn tiled(tile: TileParams, geometry: SurfaceGeometry, rect: Rect) -> Self {
        Self {
            source: Some(SurfaceSource::Tile(tile)),
            geometry: Some(geometry),
            rect,
        }
    }
}

/// Raw blit request.
///
/// Fields past `struct_size` are treated as absent: the batch fields need
/// [`abi::BLT_PARAMS_BATCH_SIZE`], the callback fields [`abi::BLT_PARAMS_SIZE`].
#[derive(Clone, Debug)]
pub struct BltParams {
    /// Structure version; see [`abi`].
    pub struct_size: u32,
    /// Request flags.
    pub flags: BltFlags,
    /// Operation field.
    pub op: Option<OpParams>,
    /// Key pixel in the keyed surface's format.
    pub color_key: Option<Vec<u8>>,
    /// Global alpha, read when the blend word names a width.
    pub global_alpha: Option<GlobalAlpha>,
    /// Requested scaling.
    pub scale_mode: ScaleMode,
    /// Requested dithering.
    pub dither_mode: DitherMode,
    /// Destination slot.
    pub dst: SurfaceSlot,
    /// Source 1 slot.
    pub src1: SurfaceSlot,
    /// Source 2 slot.
    pub src2: SurfaceSlot,
    /// Mask slot.
    pub mask: SurfaceSlot,
    /// Clip rect, honored with [`BltFlags::CLIP`].
    pub clip_rect: Rect,
    /// Fields changed since the previous request of the batch.
    pub batch_flags: BatchChanges,
    /// Batch this request continues or ends.
    pub batch: Option<BatchHandle>,
    /// Completion callback for asynchronous requests.
    pub callback: Option<Callback>,
    /// Token handed back to the callback.
    pub callback_data: u64,
}

impl BltParams {
    /// Request of the current version with the given flags and operation.
    pub fn new(flags: BltFlags, op: OpParams) -> Self {
        Self {
            struct_size: abi::BLT_PARAMS_SIZE,
            flags,
            op: Some(op),
            color_key: None,
            global_alpha: None,
            scale_mode: ScaleMode::FASTEST,
            dither_mode: DitherMode::FASTEST,
            dst: SurfaceSlot::default(),
            src1: SurfaceSlot::default(),
            src2: SurfaceSlot::default(),
            mask: SurfaceSlot::default(),
            clip_rect: Rect::default(),
            batch_flags: BatchChanges::empty(),
            batch: None,
            callback: None,
            callback_data: 0,
        }
    }

    /// ROP4 request.
    pub fn rop(rop: RopCode) -> Self {
        Self::new(BltFlags::ROP, OpParams::Rop(rop))
    }

    /// Blend request.
    pub fn blend(mode: BlendMode) -> Self {
        Self::new(BltFlags::BLEND, OpParams::Blend(mode))
    }

    /// Set the destination.
    pub fn with_dst(mut self, map: MapHandle, geometry: SurfaceGeometry, rect: Rect) -> Self {
        self.dst = SurfaceSlot::mapped(map, geometry, rect);
        self
    }

    /// Set source 1.
    pub fn with_src1(mut self, map: MapHandle, geometry: SurfaceGeometry, rect: Rect) -> Self {
        self.src1 = SurfaceSlot::mapped(map, geometry, rect);
        self
    }

    /// Set source 2.
    pub fn with_src2(mut self, map: MapHandle, geometry: SurfaceGeometry, rect: Rect) -> Self {
        self.src2 = SurfaceSlot::mapped(map, geometry, rect);
        self
    }

    /// Set the mask.
    pub fn with_mask(mut self, map: MapHandle, geometry: SurfaceGeometry, rect: Rect) -> Self {
        self.mask = SurfaceSlot::mapped(map, geometry, rect);
        self
    }

    /// Tile an input slot from a brush and raise its tile flag.
    pub fn with_tile(
        mut self,
        role: SlotRole,
        tile: TileParams,
        geometry: SurfaceGeometry,
        rect: Rect,
    ) -> Self {
        let (slot, flag) = match role {
            SlotRole::Dst => return self,
            SlotRole::Src1 => (&mut self.src1, BltFlags::TILE_SRC1),
            SlotRole::Src2 => (&mut self.src2, BltFlags::TILE_SRC2),
            SlotRole::Mask => (&mut self.mask, BltFlags::TILE_MASK),
        };
        *slot = SurfaceSlot::tiled(tile, geometry, rect);
        self.flags |= flag;
        self
    }

    /// Add flags.
    pub fn with_flags(mut self, flags: BltFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Set the key pixel.
    pub fn with_color_key(mut self, pixel: impl Into<Vec<u8>>) -> Self {
        self.color_key = Some(pixel.into());
        self
    }

    /// Set the global alpha value.
    pub fn with_global_alpha(mut self, alpha: GlobalAlpha) -> Self {
        self.global_alpha = Some(alpha);
        self
    }

    /// Clip to `rect` and raise [`BltFlags::CLIP`].
    pub fn with_clip(mut self, rect: Rect) -> Self {
        self.clip_rect = rect;
        self.flags |= BltFlags::CLIP;
        self
    }

    /// Set the scale mode.
    pub fn with_scale(mut self, mode: ScaleMode) -> Self {
        self.scale_mode = mode;
        self
    }

    /// Set the dither mode.
    pub fn with_dither(mut self, mode: DitherMode) -> Self {
        self.dither_mode = mode;
        self
    }

    /// Run asynchronously with an optional callback.
    pub fn with_async(mut self, callback: Option<Callback>, token: u64) -> Self {
        self.flags |= BltFlags::ASYNC;
        self.callback = callback;
        self.callback_data = token;
        self
    }

    /// Continue or end `batch`, declaring the changed fields.
    pub fn in_batch(mut self, batch: BatchHandle, changes: BatchChanges) -> Self {
        self.batch = Some(batch);
        self.batch_flags = changes;
        self
    }

    /// Slot for `role`.
    pub fn slot(&self, role: SlotRole) -> &SurfaceSlot {
        match role {
            SlotRole::Dst => &self.dst,
            SlotRole::Src1 => &self.src1,
            SlotRole::Src2 => &self.src2,
            SlotRole::Mask => &self.mask,
        }
    }

    /// Mutable slot for `role`.
    pub fn slot_mut(&mut self, role: SlotRole) -> &mut SurfaceSlot {
        match role {
            SlotRole::Dst => &mut self.dst,
            SlotRole::Src1 => &mut self.src1,
            SlotRole::Src2 => &mut self.src2,
            SlotRole::Mask => &mut self.mask,
        }
    }

    /// Return `true` when the structure covers the batch fields.
    pub fn has_batch_fields(&self) -> bool {
        self.struct_size >= abi::BLT_PARAMS_BATCH_SIZE
    }

    /// Return `true` when the structure covers the callback fields.
    pub fn has_callback_fields(&self) -> bool {
        self.struct_size >= abi::BLT_PARAMS_SIZE
    }

    /// Batch change word, or empty when the structure predates it.
    pub fn changes(&self) -> BatchChanges {
        if self.has_batch_fields() {
            self.batch_flags
        } else {
            BatchChanges::empty()
        }
    }

    /// Batch handle, or `None` when the structure predates it.
    pub fn batch_handle(&self) -> Option<BatchHandle> {
        if self.has_batch_fields() {
            self.batch
        } else {
            None
        }
    }

    /// Callback, or `None` when the structure predates it.
    pub fn completion(&self) -> (Option<Callback>, u64) {
        if self.has_callback_fields() {
            (self.callback.clone(), self.callback_data)
        } else {
            (None, 0)
        }
    }
}
