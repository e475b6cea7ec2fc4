use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::descriptor::flags::{BatchChanges, BatchMode, BltFlags};
use crate::descriptor::params::BltParams;
use crate::foundation::core::SlotRole;
use crate::foundation::error::{BltError, BltResult, ErrorCode};
use crate::registry::map::MapLease;

/// Opaque handle to an open batch. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct BatchHandle(u64);

impl BatchHandle {
    /// Raw id, for logging and diagnostics.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Rebuild a handle from a raw id. Unknown ids are rejected by the coordinator.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// A request merged against its batch, not yet committed.
#[derive(Clone, Debug)]
pub struct Staged {
    /// Batch role of the request.
    pub mode: BatchMode,
    /// Batch continued or ended; `None` for BEGIN and unbatched requests.
    pub handle: Option<BatchHandle>,
    /// Full parameters after inheriting unchanged fields.
    pub params: BltParams,
    /// END without a blit.
    pub end_nop: bool,
}

#[derive(Debug)]
struct OpenBatch {
    last: BltParams,
    _lease: Option<MapLease>,
}

#[derive(Debug)]
struct CoordinatorState {
    open: HashMap<BatchHandle, OpenBatch>,
    next: u64,
}

/// Tracks open batches and the parameters each one carries forward.
#[derive(Debug)]
pub struct BatchCoordinator {
    state: Mutex<CoordinatorState>,
    max_open: usize,
}

impl BatchCoordinator {
    /// Coordinator allowing at most `max_open` simultaneously open batches.
    pub fn new(max_open: usize) -> Self {
        Self {
            state: Mutex::new(CoordinatorState {
                open: HashMap::new(),
                next: 1,
            }),
            max_open,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge a request against its batch. Changes nothing.
    pub fn stage(&self, params: BltParams) -> BltResult<Staged> {
        let mode = if params.has_batch_fields() {
            params.flags.batch_mode()
        } else {
            BatchMode::None
        };
        match mode {
            BatchMode::None => Ok(Staged {
                mode,
                handle: None,
                params,
                end_nop: false,
            }),
            BatchMode::Begin => {
                let st = self.lock();
                if let Some(h) = params.batch
                    && st.open.contains_key(&h)
                {
                    return Err(protocol_reject(
                        ErrorCode::BatchHandle,
                        format!("batch {} is already open", h.0),
                    ));
                }
                if st.open.len() >= self.max_open {
                    return Err(BltError::resource(
                        ErrorCode::Oom,
                        format!("{} batches already open", st.open.len()),
                    ));
                }
                Ok(Staged {
                    mode,
                    handle: None,
                    params,
                    end_nop: false,
                })
            }
            BatchMode::Continue | BatchMode::End => {
                let changes = params.batch_flags.checked()?;
                let end_nop = changes.contains(BatchChanges::ENDNOP);
                if end_nop && mode == BatchMode::Continue {
                    return Err(protocol_reject(
                        ErrorCode::BatchFlags,
                        "ENDNOP on a request that does not end its batch",
                    ));
                }
                let Some(handle) = params.batch else {
                    return Err(protocol_reject(
                        ErrorCode::BatchHandle,
                        format!("{mode:?} without a batch handle"),
                    ));
                };
                let st = self.lock();
                let Some(open) = st.open.get(&handle) else {
                    return Err(protocol_reject(
                        ErrorCode::BatchHandle,
                        format!("{mode:?} on batch {} which is not open", handle.0),
                    ));
                };
                let merged = if end_nop {
                    open.last.clone()
                } else {
                    merge(&open.last, params, changes)
                };
                Ok(Staged {
                    mode,
                    handle: Some(handle),
                    params: merged,
                    end_nop,
                })
            }
        }
    }

    /// Apply a staged request after it validated and its mappings were leased.
    ///
    /// `lease` pins the mappings the batch carries forward; it is held until the next
    /// request of the batch replaces it or the batch ends.
    pub fn commit(&self, staged: &Staged, lease: Option<MapLease>) -> BltResult<Option<BatchHandle>> {
        let mut st = self.lock();
        match staged.mode {
            BatchMode::None => Ok(None),
            BatchMode::Begin => {
                if st.open.len() >= self.max_open {
                    return Err(BltError::resource(
                        ErrorCode::Oom,
                        format!("{} batches already open", st.open.len()),
                    ));
                }
                let handle = BatchHandle(st.next);
                st.next += 1;
                st.open.insert(
                    handle,
                    OpenBatch {
                        last: staged.params.clone(),
                        _lease: lease,
                    },
                );
                tracing::debug!(batch = handle.0, "batch opened");
                Ok(Some(handle))
            }
            BatchMode::Continue => {
                let handle = staged_handle(staged)?;
                let Some(open) = st.open.get_mut(&handle) else {
                    return Err(protocol_reject(
                        ErrorCode::BatchHandle,
                        format!("batch {} closed while the request was validated", handle.0),
                    ));
                };
                open.last = staged.params.clone();
                open._lease = lease;
                Ok(Some(handle))
            }
            BatchMode::End => {
                let handle = staged_handle(staged)?;
                if st.open.remove(&handle).is_none() {
                    return Err(protocol_reject(
                        ErrorCode::BatchHandle,
                        format!("batch {} closed while the request was validated", handle.0),
                    ));
                }
                tracing::debug!(batch = handle.0, nop = staged.end_nop, "batch closed");
                Ok(Some(handle))
            }
        }
    }

    /// Close a batch whose opening request failed, releasing the mappings it carried.
    pub fn abandon(&self, handle: BatchHandle) {
        let removed = self.lock().open.remove(&handle);
        if removed.is_some() {
            tracing::debug!(batch = handle.0, "batch abandoned");
        }
    }

    /// Return `true` while `handle` is open.
    pub fn is_open(&self, handle: BatchHandle) -> bool {
        self.lock().open.contains_key(&handle)
    }

    /// Number of open batches.
    pub fn open_batches(&self) -> usize {
        self.lock().open.len()
    }
}

fn staged_handle(staged: &Staged) -> BltResult<BatchHandle> {
    staged.handle.ok_or_else(|| {
        BltError::protocol(ErrorCode::BatchHandle, "staged request lost its batch handle")
    })
}

fn protocol_reject(code: ErrorCode, msg: impl Into<String>) -> BltError {
    let err = BltError::protocol(code, msg);
    tracing::warn!(%code, error = %err, "batch request rejected");
    err
}

/// Fill every field `changes` does not mark from `prev`.
pub fn merge(prev: &BltParams, next: BltParams, changes: BatchChanges) -> BltParams {
    let mut out = prev.clone();

    let mut flags = prev.flags;
    for (bit, group) in [
        (BatchChanges::OP, BltFlags::OP),
        (BatchChanges::KEY, BltFlags::KEY),
        (BatchChanges::MISCFLAGS, BltFlags::MISC),
    ] {
        if changes.contains(bit) {
            flags = flags.with_group(group, next.flags);
        }
    }
    out.flags = flags.with_group(BltFlags::PER_CALL, next.flags);

    if changes.contains(BatchChanges::OP) {
        out.op = next.op.clone();
    }
    if changes.contains(BatchChanges::KEY) {
        out.color_key = next.color_key.clone();
    }
    if changes.contains(BatchChanges::ALPHA) {
        out.global_alpha = next.global_alpha;
    }
    if changes.contains(BatchChanges::DITHER) {
        out.dither_mode = next.dither_mode;
    }
    if changes.contains(BatchChanges::SCALE) {
        out.scale_mode = next.scale_mode;
    }

    for role in [SlotRole::Dst, SlotRole::Src1, SlotRole::Src2, SlotRole::Mask] {
        let (surface, origin, size, tile) = BatchChanges::slot_bits(role);
        let incoming = next.slot(role);
        let slot = out.slot_mut(role);
        if changes.contains(surface) {
            slot.geometry = incoming.geometry.clone();
            slot.source = incoming.source;
        } else if !tile.is_empty() && changes.contains(tile) {
            slot.source = incoming.source;
        }
        if changes.contains(origin) {
            slot.rect = slot.rect.with_origin(incoming.rect);
        }
        if changes.contains(size) {
            slot.rect = slot.rect.with_size(incoming.rect);
        }
    }
    if changes.contains(BatchChanges::CLIPRECT_ORIGIN) {
        out.clip_rect = out.clip_rect.with_origin(next.clip_rect);
    }
    if changes.contains(BatchChanges::CLIPRECT_SIZE) {
        out.clip_rect = out.clip_rect.with_size(next.clip_rect);
    }

    out.struct_size = next.struct_size;
    out.batch_flags = changes;
    out.batch = next.batch;
    out.callback = next.callback;
    out.callback_data = next.callback_data;
    out
}

#[cfg(test)]
#[path = "../../tests/unit/batch/coordinator.rs"]
mod tests;
