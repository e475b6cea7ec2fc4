//! Per-pixel execution behind the [`RasterKernel`] seam.

use std::fmt;
use std::sync::Arc;

use crate::descriptor::validate::BltOperation;
use crate::foundation::error::BltResult;
use crate::registry::map::{MapLease, MappedView};

/// Reference CPU kernel.
pub mod cpu;
pub(crate) mod pixel;

/// Cache maintenance requested for a mapped range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOp {
    /// Write back CPU caches so the device sees CPU writes.
    Clean,
    /// Drop CPU cache lines so the CPU sees device writes.
    Invalidate,
    /// Clean, then invalidate.
    Flush,
}

/// Executes validated blits against leased mappings.
pub trait RasterKernel: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Refuse operations this kernel cannot execute. Called before anything is leased or
    /// queued, so refusals are synchronous.
    fn supports(&self, op: &BltOperation) -> BltResult<()>;

    /// Execute `op`. `lease` holds a view for every slot in [`BltOperation::handles`].
    fn execute(&self, op: &BltOperation, lease: &MapLease) -> BltResult<()>;

    /// Cache maintenance on `len` bytes at `offset` inside `view`. The range is already
    /// checked.
    fn cache_op(&self, view: &MappedView, op: CacheOp, offset: usize, len: usize) -> BltResult<()> {
        let _ = (view, op, offset, len);
        Ok(())
    }
}

/// Available kernels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelKind {
    /// Reference CPU kernel.
    #[default]
    Cpu,
}

/// Instantiate a kernel.
pub fn create_kernel(kind: KernelKind) -> BltResult<Arc<dyn RasterKernel>> {
    match kind {
        KernelKind::Cpu => Ok(Arc::new(cpu::CpuKernel::new())),
    }
}
