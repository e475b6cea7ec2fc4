use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::foundation::error::{BltError, BltResult, ErrorCode};

/// Structure sizes of the LP64 reference layout, used for version negotiation.
///
/// A caller built against an older layout reports a smaller `struct_size`; fields past that
/// size are treated as absent.
pub mod abi {
    /// Buffer descriptor: size, address, length.
    pub const BUFFER_DESC_SIZE: u32 = 24;
    /// Surface geometry up to and including the stride.
    pub const SURFACE_GEOMETRY_MIN_SIZE: u32 = 32;
    /// Surface geometry including the palette format and palette pointer.
    pub const SURFACE_GEOMETRY_SIZE: u32 = 48;
    /// Tile parameters.
    pub const TILE_PARAMS_SIZE: u32 = 40;
    /// Filter operation header.
    pub const FILTER_OP_SIZE: u32 = 16;
    /// Completion error payload.
    pub const CALLBACK_ERROR_SIZE: u32 = 16;
    /// Blit parameters up to and including the clip rect.
    pub const BLT_PARAMS_MIN_SIZE: u32 = 192;
    /// Blit parameters including batch change flags and batch handle.
    pub const BLT_PARAMS_BATCH_SIZE: u32 = 208;
    /// Blit parameters including the completion callback and its token.
    pub const BLT_PARAMS_SIZE: u32 = 224;
}

/// Integer rectangle: signed origin, unsigned extent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    /// Left edge (inclusive).
    pub left: i32,
    /// Top edge (inclusive).
    pub top: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Create a rectangle.
    pub const fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Return `true` when the rect covers no pixels.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge, widened so it cannot overflow.
    pub fn right(self) -> i64 {
        i64::from(self.left) + i64::from(self.width)
    }

    /// Exclusive bottom edge, widened so it cannot overflow.
    pub fn bottom(self) -> i64 {
        i64::from(self.top) + i64::from(self.height)
    }

    /// Return `true` when the rect lies inside a `width`×`height` surface.
    pub fn fits_within(self, width: u32, height: u32) -> bool {
        self.left >= 0
            && self.top >= 0
            && self.right() <= i64::from(width)
            && self.bottom() <= i64::from(height)
    }

    /// Intersection of two rects; empty when they do not overlap.
    pub fn intersect(self, other: Rect) -> Rect {
        let left = i64::from(self.left).max(i64::from(other.left));
        let top = i64::from(self.top).max(i64::from(other.top));
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return Rect::new(left as i32, top as i32, 0, 0);
        }
        Rect::new(
            left as i32,
            top as i32,
            (right - left) as u32,
            (bottom - top) as u32,
        )
    }

    /// Same rect with a new origin.
    pub fn with_origin(self, origin: Rect) -> Rect {
        Rect {
            left: origin.left,
            top: origin.top,
            ..self
        }
    }

    /// Same rect with a new size.
    pub fn with_size(self, size: Rect) -> Rect {
        Rect {
            width: size.width,
            height: size.height,
            ..self
        }
    }
}

/// Pixel formats understood by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PixelFormat {
    /// 8-bit R, G, B, A in memory order; straight alpha.
    Rgba8888,
    /// 8-bit R, G, B, A in memory order; premultiplied alpha.
    Rgba8888Pre,
    /// 8-bit B, G, R, A in memory order; straight alpha.
    Bgra8888,
    /// 8-bit B, G, R, A in memory order; premultiplied alpha.
    Bgra8888Pre,
    /// 8-bit R, G, B and an ignored byte; opaque.
    Rgbx8888,
    /// Little-endian 5:6:5 packed RGB; opaque.
    Rgb565,
    /// 8-bit coverage only.
    Alpha8,
    /// 8-bit palette index; requires a palette.
    Lut8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgba8888
            | Self::Rgba8888Pre
            | Self::Bgra8888
            | Self::Bgra8888Pre
            | Self::Rgbx8888 => 4,
            Self::Rgb565 => 2,
            Self::Alpha8 | Self::Lut8 => 1,
        }
    }

    /// Return `true` when the format stores an alpha channel.
    pub fn has_alpha(self) -> bool {
        matches!(
            self,
            Self::Rgba8888 | Self::Rgba8888Pre | Self::Bgra8888 | Self::Bgra8888Pre | Self::Alpha8
        )
    }

    /// Return `true` when stored color is already scaled by alpha.
    ///
    /// Opaque formats count as premultiplied since `C·1 = C`.
    pub fn is_premultiplied(self) -> bool {
        !matches!(self, Self::Rgba8888 | Self::Bgra8888)
    }

    /// Return `true` for palette-indexed formats.
    pub fn is_indexed(self) -> bool {
        matches!(self, Self::Lut8)
    }

    /// Return `true` for formats usable as palette entries.
    pub fn is_palette_entry_format(self) -> bool {
        self.bytes_per_pixel() == 4
    }
}

/// Palette attached to an indexed surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    /// Format of each entry.
    pub format: PixelFormat,
    /// Packed entries, `2^bpp` of them.
    pub entries: Arc<Vec<u8>>,
}

/// How a buffer is laid out as a 2-D surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurfaceGeometry {
    /// Structure version; see [`abi`].
    pub struct_size: u32,
    /// Color format.
    pub format: PixelFormat,
    /// Width in pixels.
    pub width: u32,
    /// Height in lines.
    pub height: u32,
    /// Surface angle in degrees; multiples of 90 only.
    pub orientation: i32,
    /// Bytes from one pixel to the pixel immediately below it.
    pub stride: i64,
    /// Palette for indexed formats. Only read when `struct_size` covers it.
    pub palette: Option<Palette>,
}

impl SurfaceGeometry {
    /// Tightly packed, unrotated geometry of the current version.
    pub fn packed(format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            struct_size: abi::SURFACE_GEOMETRY_SIZE,
            format,
            width,
            height,
            orientation: 0,
            stride: i64::from(width) * i64::from(format.bytes_per_pixel()),
            palette: None,
        }
    }

    /// Builder-style orientation override.
    pub fn with_orientation(mut self, degrees: i32) -> Self {
        self.orientation = degrees;
        self
    }

    /// Builder-style palette attachment.
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = Some(palette);
        self
    }

    /// Palette if the structure version carries one.
    pub fn palette(&self) -> Option<&Palette> {
        if self.struct_size >= abi::SURFACE_GEOMETRY_SIZE {
            self.palette.as_ref()
        } else {
            None
        }
    }

    /// Orientation normalized into `[0, 360)`.
    pub fn normalized_orientation(&self) -> i32 {
        self.orientation.rem_euclid(360)
    }

    /// Smallest byte length that holds `rect` of this surface, measured from the surface origin.
    pub fn required_len(&self, rect: Rect) -> Option<u64> {
        if rect.is_empty() {
            return Some(0);
        }
        let bpp = u64::from(self.format.bytes_per_pixel());
        let stride = u64::try_from(self.stride).ok()?;
        let last_row = u64::try_from(rect.bottom() - 1).ok()?;
        let row_end = u64::try_from(rect.right()).ok()?.checked_mul(bpp)?;
        last_row.checked_mul(stride)?.checked_add(row_end)
    }
}

/// Shared client memory the engine may view but never allocates on the client's behalf.
#[derive(Clone, Debug, Default)]
pub struct PixelBuffer(Arc<RwLock<Vec<u8>>>);

impl PixelBuffer {
    /// Zero-filled buffer of `len` bytes.
    pub fn zeroed(len: usize) -> Self {
        Self::from_vec(vec![0; len])
    }

    /// Wrap existing bytes.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self(Arc::new(RwLock::new(bytes)))
    }

    /// Current byte length.
    pub fn len(&self) -> usize {
        self.read().map(|b| b.len()).unwrap_or(0)
    }

    /// Return `true` when the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return `true` when both handles view the same memory.
    pub fn same_memory(&self, other: &PixelBuffer) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Copy of the current contents.
    pub fn to_vec(&self) -> BltResult<Vec<u8>> {
        Ok(self.read()?.clone())
    }

    /// Shared read access. A poisoned lock is a memory fault.
    pub fn read(&self) -> BltResult<RwLockReadGuard<'_, Vec<u8>>> {
        self.0
            .read()
            .map_err(|_| BltError::execution(ErrorCode::MemoryError, "pixel buffer poisoned"))
    }

    /// Exclusive write access. A poisoned lock is a memory fault.
    pub fn write(&self) -> BltResult<RwLockWriteGuard<'_, Vec<u8>>> {
        self.0
            .write()
            .map_err(|_| BltError::execution(ErrorCode::MemoryError, "pixel buffer poisoned"))
    }
}

/// Client request to make a buffer available to the engine.
#[derive(Clone, Debug)]
pub struct BufferDesc {
    /// Structure version; see [`abi`].
    pub struct_size: u32,
    /// Client memory; `None` is a null virtual address.
    pub buffer: Option<PixelBuffer>,
    /// Start of the mapped range inside `buffer`.
    pub offset: usize,
    /// Length of the mapped range in bytes.
    pub length: u64,
}

impl BufferDesc {
    /// Describe the whole of `buffer`.
    pub fn new(buffer: &PixelBuffer) -> Self {
        Self {
            struct_size: abi::BUFFER_DESC_SIZE,
            length: buffer.len() as u64,
            buffer: Some(buffer.clone()),
            offset: 0,
        }
    }

    /// Describe `length` bytes of `buffer` starting at `offset`.
    pub fn range(buffer: &PixelBuffer, offset: usize, length: u64) -> Self {
        Self {
            struct_size: abi::BUFFER_DESC_SIZE,
            buffer: Some(buffer.clone()),
            offset,
            length,
        }
    }
}

/// Surface slot of a blit: the destination or one of the three inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum SlotRole {
    /// Destination surface.
    Dst,
    /// Source 1.
    Src1,
    /// Source 2.
    Src2,
    /// Alpha / stencil mask.
    Mask,
}

/// Per-slot error codes, one table row per [`SlotRole`].
#[derive(Clone, Copy, Debug)]
pub struct SlotCodes {
    /// Missing or dead mapping.
    pub handle: ErrorCode,
    /// Geometry too old.
    pub vers: ErrorCode,
    /// Unsupported format.
    pub format: ErrorCode,
    /// Unsupported stride or extent.
    pub stride: ErrorCode,
    /// Unsupported rect.
    pub rect: ErrorCode,
    /// Unsupported horizontal scale.
    pub horz_scale: ErrorCode,
    /// Unsupported vertical scale.
    pub vert_scale: ErrorCode,
    /// Unsupported rotation.
    pub rot: ErrorCode,
    /// Tiling flag/slot mismatch.
    pub tile: ErrorCode,
    /// Tile parameters too old.
    pub tile_vers: ErrorCode,
    /// Unsupported tile flags.
    pub tile_flags: ErrorCode,
    /// Unsupported tile origin.
    pub tile_origin: ErrorCode,
    /// Unsupported tile size.
    pub tile_size: ErrorCode,
}

impl SlotRole {
    /// Error codes reported against this slot.
    pub fn codes(self) -> SlotCodes {
        use ErrorCode::*;
        match self {
            Self::Dst => SlotCodes {
                handle: DstHandle,
                vers: DstVers,
                format: DstFormat,
                stride: DstStride,
                rect: DstRect,
                horz_scale: DstRect,
                vert_scale: DstRect,
                rot: DstFormat,
                tile: Flags,
                tile_vers: Flags,
                tile_flags: Flags,
                tile_origin: Flags,
                tile_size: Flags,
            },
            Self::Src1 => SlotCodes {
                handle: Src1Handle,
                vers: Src1Vers,
                format: Src1Format,
                stride: Src1Stride,
                rect: Src1Rect,
                horz_scale: Src1HorzScale,
                vert_scale: Src1VertScale,
                rot: Src1Rot,
                tile: Src1Tile,
                tile_vers: Src1TileVers,
                tile_flags: Src1TileFlags,
                tile_origin: Src1TileOrigin,
                tile_size: Src1TileSize,
            },
            Self::Src2 => SlotCodes {
                handle: Src2Handle,
                vers: Src2Vers,
                format: Src2Format,
                stride: Src2Stride,
                rect: Src2Rect,
                horz_scale: Src2HorzScale,
                vert_scale: Src2VertScale,
                rot: Src2Rot,
                tile: Src2Tile,
                tile_vers: Src2TileVers,
                tile_flags: Src2TileFlags,
                tile_origin: Src2TileOrigin,
                tile_size: Src2TileSize,
            },
            Self::Mask => SlotCodes {
                handle: MaskHandle,
                vers: MaskVers,
                format: MaskFormat,
                stride: MaskStride,
                rect: MaskRect,
                horz_scale: MaskHorzScale,
                vert_scale: MaskVertScale,
                rot: MaskRot,
                tile: MaskTile,
                tile_vers: MaskTileVers,
                tile_flags: MaskTileFlags,
                tile_origin: MaskTileOrigin,
                tile_size: MaskTileSize,
            },
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
