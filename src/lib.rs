//! bltkit is a hardware-agnostic 2-D blit engine.
//!
//! A client maps buffers, describes a blit with [`BltParams`] and hands it to a [`BltDevice`]:
//!
//! - Mode words (scale, dither, blend, ROP) decode into canonical descriptions
//! - The request validates into a resolved [`BltOperation`] or is rejected with an [`ErrorCode`]
//! - Batches carry unchanged parameters from one call to the next
//! - Work runs inline, or queued with an [`AsyncTicket`] and optional callback
//!
//! [`Engine`] is the provided device; it executes on the reference CPU kernel.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Open batches and their carried parameters.
pub mod batch;
/// Blit request structures and validation.
pub mod descriptor;
/// The engine and the device trait.
pub mod engine;
/// Execution and completion.
pub mod exec;
/// Mode word decoders.
pub mod mode;
/// Raster kernels.
pub mod raster;
/// Buffer mappings.
pub mod registry;

pub use crate::foundation::config::EngineConfig;
pub use crate::foundation::core::{
    BufferDesc, Palette, PixelBuffer, PixelFormat, Rect, SlotCodes, SlotRole, SurfaceGeometry,
    abi,
};
pub use crate::foundation::error::{BltError, BltResult, ErrorCategory, ErrorCode};

pub use crate::batch::BatchHandle;
pub use crate::descriptor::flags::{BatchChanges, BltFlags, TileEdge, TileEdges};
pub use crate::descriptor::params::{
    BltParams, FilterOp, GlobalAlpha, OpParams, SurfaceSlot, SurfaceSource, TileParams,
};
pub use crate::descriptor::validate::{BltOperation, Operation, validate};
pub use crate::engine::{BltDevice, BltOutcome, BltStatus, CacheParams, Engine};
pub use crate::exec::completion::{AsyncTicket, Callback, CallbackError};
pub use crate::mode::blend::{BlendDesc, BlendKind, BlendMode, ClassicBlend, EssentialBlend};
pub use crate::mode::dither::DitherMode;
pub use crate::mode::rop::RopCode;
pub use crate::mode::scale::ScaleMode;
pub use crate::raster::{CacheOp, KernelKind, RasterKernel};
pub use crate::registry::map::MapHandle;
