//! The blit engine: mapping, validation, batching and dispatch behind one [`BltDevice`].

use std::sync::Arc;

use crate::batch::BatchHandle;
use crate::batch::coordinator::BatchCoordinator;
use crate::descriptor::flags::BatchMode;
use crate::descriptor::params::BltParams;
use crate::descriptor::validate::validate;
use crate::exec::completion::{AsyncTicket, CompletionGuard};
use crate::exec::dispatcher::{Dispatcher, Job};
use crate::foundation::config::EngineConfig;
use crate::foundation::core::{BufferDesc, SlotRole};
use crate::foundation::error::{BltError, BltResult, ErrorCode};
use crate::mode::dither::DitherMode;
use crate::mode::scale::ScaleMode;
use crate::raster::{CacheOp, RasterKernel, create_kernel};
use crate::registry::map::{MapHandle, MapRegistry, RegistryLimits};

/// Operations every blit backend exposes.
pub trait BltDevice {
    /// Register client memory for use in blits.
    fn map(&self, desc: &BufferDesc) -> BltResult<MapHandle>;

    /// Release a mapping. Fails while an operation or open batch still cites it.
    fn unmap(&self, handle: MapHandle) -> BltResult<()>;

    /// Validate and perform (or queue) one blit.
    fn blt(&self, params: BltParams) -> BltResult<BltOutcome>;

    /// Cache maintenance on part of a mapping.
    fn cache_op(&self, params: &CacheParams) -> BltResult<()>;
}

/// How an accepted blit finished.
#[derive(Debug)]
pub enum BltStatus {
    /// Executed before returning.
    Done,
    /// Queued; the ticket (and the callback, if any) reports the result.
    Queued(AsyncTicket),
    /// Batch closed without a blit.
    BatchClosed,
}

/// Result of [`BltDevice::blt`].
#[derive(Debug)]
pub struct BltOutcome {
    /// Completion state.
    pub status: BltStatus,
    /// Batch the request belongs to; set for BEGIN, CONTINUE and END.
    pub batch: Option<BatchHandle>,
    /// Scale mode used, when `SCALE_RETURN` was set.
    pub scale_mode: Option<ScaleMode>,
    /// Dither mode used, when `DITHER_RETURN` was set.
    pub dither_mode: Option<DitherMode>,
}

impl BltOutcome {
    /// Return `true` when the blit was queued.
    pub fn is_queued(&self) -> bool {
        matches!(self.status, BltStatus::Queued(_))
    }

    /// Take the ticket of a queued blit.
    pub fn into_ticket(self) -> Option<AsyncTicket> {
        match self.status {
            BltStatus::Queued(t) => Some(t),
            _ => None,
        }
    }
}

/// Cache maintenance request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheParams {
    /// Mapping to maintain.
    pub map: MapHandle,
    /// What to do.
    pub op: CacheOp,
    /// Start of the range, relative to the mapping.
    pub offset: usize,
    /// Length of the range.
    pub len: usize,
}

/// Reference [`BltDevice`] backed by a [`RasterKernel`].
#[derive(Debug)]
pub struct Engine {
    registry: MapRegistry,
    batches: BatchCoordinator,
    dispatcher: Dispatcher,
    kernel: Arc<dyn RasterKernel>,
}

impl Engine {
    /// Build an engine with the kernel named by `config`.
    pub fn new(config: EngineConfig) -> BltResult<Self> {
        let kernel = create_kernel(config.kernel)?;
        Self::with_kernel(config, kernel)
    }

    /// Build an engine around a caller-supplied kernel.
    pub fn with_kernel(config: EngineConfig, kernel: Arc<dyn RasterKernel>) -> BltResult<Self> {
        config.validate()?;
        let dispatcher = Dispatcher::new(config.worker_threads)?;
        tracing::debug!(
            kernel = kernel.name(),
            threads = dispatcher.threads(),
            "engine ready"
        );
        Ok(Self {
            registry: MapRegistry::new(RegistryLimits::from(&config)),
            batches: BatchCoordinator::new(config.max_open_batches),
            dispatcher,
            kernel,
        })
    }

    /// Block until no queued blit is in flight.
    pub fn flush(&self) {
        self.dispatcher.flush();
    }

    /// Mapping registry, for diagnostics.
    pub fn registry(&self) -> &MapRegistry {
        &self.registry
    }

    /// Number of open batches.
    pub fn open_batches(&self) -> usize {
        self.batches.open_batches()
    }
}

impl BltDevice for Engine {
    #[tracing::instrument(skip(self, desc), fields(length = desc.length))]
    fn map(&self, desc: &BufferDesc) -> BltResult<MapHandle> {
        self.registry.map(desc)
    }

    #[tracing::instrument(skip(self, handle), fields(handle = handle.raw()))]
    fn unmap(&self, handle: MapHandle) -> BltResult<()> {
        self.registry.unmap(handle)
    }

    #[tracing::instrument(skip(self, params), fields(flags = params.flags.bits()))]
    fn blt(&self, params: BltParams) -> BltResult<BltOutcome> {
        let staged = self.batches.stage(params)?;
        if staged.end_nop {
            let batch = self.batches.commit(&staged, None)?;
            return Ok(BltOutcome {
                status: BltStatus::BatchClosed,
                batch,
                scale_mode: None,
                dither_mode: None,
            });
        }

        let op = validate(&staged.params)?;
        self.kernel.supports(&op)?;
        let lease = self.registry.lease(&op.handles())?;
        for plan in op.plans() {
            let view = lease.view(plan.role).ok_or_else(|| {
                BltError::resource(plan.role.codes().handle, "mapping missing from lease")
            })?;
            plan.check_extent(view.length)?;
        }

        let carried = matches!(staged.mode, BatchMode::Begin | BatchMode::Continue)
            .then(|| lease.duplicate());
        let batch = self.batches.commit(&staged, carried)?;

        let scale_mode = op.scale_return.then(|| op.scale.mode());
        let dither_mode = op.dither_return.then(|| op.dither.mode());
        let is_async = op.is_async;
        let kernel = Arc::clone(&self.kernel);
        let job: Job = Box::new(move || {
            let result = kernel.execute(&op, &lease);
            drop(lease);
            if let Err(e) = &result {
                tracing::warn!(error = %e, "blit failed");
            }
            result
        });

        let status = if is_async {
            let (callback, token) = staged.params.completion();
            let (guard, ticket) = CompletionGuard::new(callback, token);
            self.dispatcher.submit(batch, job, guard);
            BltStatus::Queued(ticket)
        } else {
            if let Err(e) = self.dispatcher.run_sync(batch, job) {
                if let (BatchMode::Begin, Some(handle)) = (staged.mode, batch) {
                    self.batches.abandon(handle);
                }
                return Err(e);
            }
            BltStatus::Done
        };
        Ok(BltOutcome {
            status,
            batch,
            scale_mode,
            dither_mode,
        })
    }

    #[tracing::instrument(skip(self, params), fields(handle = params.map.raw(), op = ?params.op))]
    fn cache_op(&self, params: &CacheParams) -> BltResult<()> {
        let Some(length) = self.registry.mapping_len(params.map) else {
            return Err(BltError::resource(
                ErrorCode::Rsrc,
                format!("mapping {} is unknown or released", params.map.raw()),
            ));
        };
        let in_range = params
            .offset
            .checked_add(params.len)
            .is_some_and(|end| end <= length);
        if !in_range {
            return Err(BltError::resource(
                ErrorCode::MemoryUnmappable,
                format!(
                    "cache range {}+{} outside mapping of {length} bytes",
                    params.offset, params.len
                ),
            ));
        }
        let lease = self.registry.lease(&[(params.map, SlotRole::Dst)])?;
        let view = lease.view(SlotRole::Dst).ok_or_else(|| {
            BltError::resource(ErrorCode::Rsrc, "mapping missing from lease")
        })?;
        self.kernel.cache_op(view, params.op, params.offset, params.len)
    }
}

#[cfg(test)]
#[path = "../tests/unit/engine.rs"]
mod tests;
