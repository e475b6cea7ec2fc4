use bitflags::bitflags;

use crate::foundation::core::SlotRole;
use crate::foundation::error::{BltError, BltResult, ErrorCode};

bitflags! {
    /// Request flags of a blit.
    ///
    /// Bits 0-3 hold the operation selector, bits 12-13 the batch mode. Bits 22-31 are
    /// reserved.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub struct BltFlags: u32 {
        /// ROP4 in the operation field.
        const ROP = 0x0000_0001;
        /// Blend word in the operation field.
        const BLEND = 0x0000_0002;
        /// Filter in the operation field.
        const FILTER = 0x0000_0004;
        /// Source color key.
        const KEY_SRC = 0x0000_0010;
        /// Destination color key.
        const KEY_DST = 0x0000_0020;
        /// Clip to the clip rect.
        const CLIP = 0x0000_0040;
        /// Mask sampled in source 1 space instead of destination space.
        const SRCMASK = 0x0000_0080;
        /// Return once queued.
        const ASYNC = 0x0000_0100;
        /// Source 1 slot carries tile parameters.
        const TILE_SRC1 = 0x0000_0200;
        /// Source 2 slot carries tile parameters.
        const TILE_SRC2 = 0x0000_0400;
        /// Mask slot carries tile parameters.
        const TILE_MASK = 0x0000_0800;
        /// Open a batch.
        const BATCH_BEGIN = 1 << 12;
        /// Continue a batch.
        const BATCH_CONTINUE = 2 << 12;
        /// Close a batch.
        const BATCH_END = 3 << 12;
        /// Mirror source 1 horizontally.
        const HORZ_FLIP_SRC1 = 0x0000_4000;
        /// Mirror source 1 vertically.
        const VERT_FLIP_SRC1 = 0x0000_8000;
        /// Mirror source 2 horizontally.
        const HORZ_FLIP_SRC2 = 0x0001_0000;
        /// Mirror source 2 vertically.
        const VERT_FLIP_SRC2 = 0x0002_0000;
        /// Mirror the mask horizontally.
        const HORZ_FLIP_MASK = 0x0004_0000;
        /// Mirror the mask vertically.
        const VERT_FLIP_MASK = 0x0008_0000;
        /// Report the scale mode used.
        const SCALE_RETURN = 0x0010_0000;
        /// Report the dither mode used.
        const DITHER_RETURN = 0x0020_0000;
    }
}

/// Operation arm selected by the flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum OpKind {
    /// Raster operation.
    Rop,
    /// Blend.
    Blend,
    /// Filter.
    Filter,
}

/// Batch role of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum BatchMode {
    /// Not batched.
    None,
    /// First request of a batch.
    Begin,
    /// Middle request of a batch.
    Continue,
    /// Last request of a batch.
    End,
}

const OP_MASK: u32 = 0xF;
const BATCH_SHIFT: u32 = 12;

impl BltFlags {
    /// Flags carried forward by the miscellaneous-flags batch group.
    pub const MISC: Self = Self::CLIP
        .union(Self::SRCMASK)
        .union(Self::TILE_SRC1)
        .union(Self::TILE_SRC2)
        .union(Self::TILE_MASK)
        .union(Self::HORZ_FLIP_SRC1)
        .union(Self::VERT_FLIP_SRC1)
        .union(Self::HORZ_FLIP_SRC2)
        .union(Self::VERT_FLIP_SRC2)
        .union(Self::HORZ_FLIP_MASK)
        .union(Self::VERT_FLIP_MASK);

    /// Flags of the color-key batch group.
    pub const KEY: Self = Self::KEY_SRC.union(Self::KEY_DST);

    /// Flags of the operation batch group.
    pub const OP: Self = Self::ROP.union(Self::BLEND).union(Self::FILTER);

    /// Flags that describe only the request they arrive with and are never inherited.
    pub const PER_CALL: Self = Self::ASYNC
        .union(Self::BATCH_END)
        .union(Self::SCALE_RETURN)
        .union(Self::DITHER_RETURN);

    /// Reject reserved bits, then require exactly one operation selector.
    pub fn op_kind(self) -> BltResult<OpKind> {
        let reserved = self.bits() & !Self::all().bits() & !OP_MASK;
        if reserved != 0 {
            return Err(BltError::field(
                ErrorCode::Flags,
                format!("reserved flag bits {reserved:#010x}"),
            ));
        }
        match self.bits() & OP_MASK {
            0x1 => Ok(OpKind::Rop),
            0x2 => Ok(OpKind::Blend),
            0x4 => Ok(OpKind::Filter),
            other => Err(BltError::field(
                ErrorCode::Op,
                format!("operation selector {other:#x} is not exactly one of ROP, BLEND, FILTER"),
            )),
        }
    }

    /// Batch role encoded in bits 12-13.
    pub fn batch_mode(self) -> BatchMode {
        match (self.bits() >> BATCH_SHIFT) & 3 {
            1 => BatchMode::Begin,
            2 => BatchMode::Continue,
            3 => BatchMode::End,
            _ => BatchMode::None,
        }
    }

    /// Tile flag for an input slot. The destination never tiles.
    pub fn tiles(self, role: SlotRole) -> bool {
        match role {
            SlotRole::Dst => false,
            SlotRole::Src1 => self.contains(Self::TILE_SRC1),
            SlotRole::Src2 => self.contains(Self::TILE_SRC2),
            SlotRole::Mask => self.contains(Self::TILE_MASK),
        }
    }

    /// `(horizontal, vertical)` flip flags for a slot.
    pub fn flips(self, role: SlotRole) -> (bool, bool) {
        let (h, v) = match role {
            SlotRole::Dst => return (false, false),
            SlotRole::Src1 => (Self::HORZ_FLIP_SRC1, Self::VERT_FLIP_SRC1),
            SlotRole::Src2 => (Self::HORZ_FLIP_SRC2, Self::VERT_FLIP_SRC2),
            SlotRole::Mask => (Self::HORZ_FLIP_MASK, Self::VERT_FLIP_MASK),
        };
        (self.contains(h), self.contains(v))
    }

    /// Replace the flags of `group` with those of `from`.
    pub fn with_group(self, group: Self, from: Self) -> Self {
        (self - group) | (from & group)
    }
}

bitflags! {
    /// Fields that changed since the previous request of a batch.
    ///
    /// Bits 6-7 and 25-30 are reserved.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub struct BatchChanges: u32 {
        /// Operation selector and operation field.
        const OP = 0x0000_0001;
        /// Color key flags and key pixel.
        const KEY = 0x0000_0002;
        /// Clip, mask placement, tiling and flip flags.
        const MISCFLAGS = 0x0000_0004;
        /// Global alpha value.
        const ALPHA = 0x0000_0008;
        /// Dither mode.
        const DITHER = 0x0000_0010;
        /// Scale mode.
        const SCALE = 0x0000_0020;
        /// Destination mapping and geometry.
        const DST = 0x0000_0100;
        /// Source 1 mapping and geometry.
        const SRC1 = 0x0000_0200;
        /// Source 2 mapping and geometry.
        const SRC2 = 0x0000_0400;
        /// Mask mapping and geometry.
        const MASK = 0x0000_0800;
        /// Destination rect origin.
        const DSTRECT_ORIGIN = 0x0000_1000;
        /// Destination rect size.
        const DSTRECT_SIZE = 0x0000_2000;
        /// Source 1 rect origin.
        const SRC1RECT_ORIGIN = 0x0000_4000;
        /// Source 1 rect size.
        const SRC1RECT_SIZE = 0x0000_8000;
        /// Source 2 rect origin.
        const SRC2RECT_ORIGIN = 0x0001_0000;
        /// Source 2 rect size.
        const SRC2RECT_SIZE = 0x0002_0000;
        /// Mask rect origin.
        const MASKRECT_ORIGIN = 0x0004_0000;
        /// Mask rect size.
        const MASKRECT_SIZE = 0x0008_0000;
        /// Clip rect origin.
        const CLIPRECT_ORIGIN = 0x0010_0000;
        /// Clip rect size.
        const CLIPRECT_SIZE = 0x0020_0000;
        /// Clip rect origin and size.
        const CLIPRECT = 0x0030_0000;
        /// Source 1 tile parameters.
        const TILE_SRC1 = 0x0040_0000;
        /// Source 2 tile parameters.
        const TILE_SRC2 = 0x0080_0000;
        /// Mask tile parameters.
        const TILE_MASK = 0x0100_0000;
        /// Close the batch without a blit.
        const ENDNOP = 0x8000_0000;
    }
}

impl BatchChanges {
    /// Reject reserved bits.
    pub fn checked(self) -> BltResult<Self> {
        let reserved = self.bits() & !Self::all().bits();
        if reserved != 0 {
            return Err(BltError::protocol(
                ErrorCode::BatchFlags,
                format!("reserved batch change bits {reserved:#010x}"),
            ));
        }
        Ok(self)
    }

    /// Surface, rect origin, rect size and tile bits for a slot.
    pub fn slot_bits(role: SlotRole) -> (Self, Self, Self, Self) {
        match role {
            SlotRole::Dst => (
                Self::DST,
                Self::DSTRECT_ORIGIN,
                Self::DSTRECT_SIZE,
                Self::empty(),
            ),
            SlotRole::Src1 => (
                Self::SRC1,
                Self::SRC1RECT_ORIGIN,
                Self::SRC1RECT_SIZE,
                Self::TILE_SRC1,
            ),
            SlotRole::Src2 => (
                Self::SRC2,
                Self::SRC2RECT_ORIGIN,
                Self::SRC2RECT_SIZE,
                Self::TILE_SRC2,
            ),
            SlotRole::Mask => (
                Self::MASK,
                Self::MASKRECT_ORIGIN,
                Self::MASKRECT_SIZE,
                Self::TILE_MASK,
            ),
        }
    }
}

/// Edge behavior outside a tile brush.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize)]
pub enum TileEdge {
    /// `...0123 0123 0123...`
    #[default]
    Repeat,
    /// `...0123 3210 0123...`
    Mirror,
}

/// Decoded per-edge tile flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize)]
pub struct TileEdges {
    /// Behavior left of the brush origin.
    pub left: TileEdge,
    /// Behavior above the brush origin.
    pub top: TileEdge,
    /// Behavior right of the brush.
    pub right: TileEdge,
    /// Behavior below the brush.
    pub bottom: TileEdge,
}

impl TileEdges {
    /// Decode 2 bits per edge (left, top, right, bottom from bit 0). Values 2-3 and bits 8 and
    /// above are reserved; `None` on violation.
    pub fn decode(raw: u32) -> Option<Self> {
        if raw >> 8 != 0 {
            return None;
        }
        let edge = |shift: u32| match (raw >> shift) & 3 {
            0 => Some(TileEdge::Repeat),
            1 => Some(TileEdge::Mirror),
            _ => None,
        };
        Some(Self {
            left: edge(0)?,
            top: edge(2)?,
            right: edge(4)?,
            bottom: edge(6)?,
        })
    }

    /// Pack into tile flags.
    pub fn encode(self) -> u32 {
        let bit = |e: TileEdge, shift: u32| match e {
            TileEdge::Repeat => 0,
            TileEdge::Mirror => 1 << shift,
        };
        bit(self.left, 0) | bit(self.top, 2) | bit(self.right, 4) | bit(self.bottom, 6)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/descriptor/flags.rs"]
mod tests;
