use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::foundation::config::EngineConfig;
use crate::foundation::core::{BufferDesc, PixelBuffer, SlotRole, abi};
use crate::foundation::error::{BltError, BltResult, ErrorCode};

/// Opaque handle to a registered buffer mapping.
///
/// Handles are never reused for the lifetime of a registry, so a stale handle is always
/// detected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct MapHandle(u64);

impl MapHandle {
    /// Raw id, for logging and diagnostics.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Rebuild a handle from a raw id. Unknown ids are rejected by the registry.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// Limits the registry enforces on `map`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistryLimits {
    /// Largest mappable length in bytes.
    pub max_buffer_len: u64,
    /// Required alignment of offsets and lengths.
    pub alignment: u64,
    /// Maximum number of live mappings.
    pub max_mappings: usize,
}

impl From<&EngineConfig> for RegistryLimits {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            max_buffer_len: cfg.max_buffer_len,
            alignment: cfg.buffer_alignment,
            max_mappings: cfg.max_mappings,
        }
    }
}

#[derive(Debug)]
struct Entry {
    buffer: PixelBuffer,
    offset: usize,
    length: usize,
    refs: usize,
}

#[derive(Debug, Default)]
struct RegistryState {
    entries: HashMap<MapHandle, Entry>,
    next: u64,
}

type SharedState = Arc<Mutex<RegistryState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, RegistryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reference-counted table of buffer mappings.
///
/// Every mutation and every lease goes through one registry-wide mutex, so "no live
/// references" checks are atomic with respect to new leases.
#[derive(Debug)]
pub struct MapRegistry {
    state: SharedState,
    limits: RegistryLimits,
}

impl MapRegistry {
    /// Create an empty registry.
    pub fn new(limits: RegistryLimits) -> Self {
        Self {
            state: Arc::new(Mutex::new(RegistryState {
                entries: HashMap::new(),
                next: 1,
            })),
            limits,
        }
    }

    /// Register a buffer. The new mapping starts with one (client) reference.
    pub fn map(&self, desc: &BufferDesc) -> BltResult<MapHandle> {
        if desc.struct_size < abi::BUFFER_DESC_SIZE {
            return Err(BltError::version(
                ErrorCode::BufferdescVers,
                format!(
                    "buffer descriptor size {} < {}",
                    desc.struct_size,
                    abi::BUFFER_DESC_SIZE
                ),
            ));
        }
        let Some(buffer) = desc.buffer.as_ref() else {
            return Err(BltError::resource(
                ErrorCode::Virtptr,
                "buffer descriptor has no address",
            ));
        };
        let align = self.limits.alignment.max(1);
        if desc.length == 0
            || desc.length > self.limits.max_buffer_len
            || desc.length % align != 0
            || (desc.offset as u64) % align != 0
        {
            return Err(BltError::resource(
                ErrorCode::BufferdescLen,
                format!(
                    "length {} at offset {} unsupported (max {}, alignment {align})",
                    desc.length, desc.offset, self.limits.max_buffer_len
                ),
            ));
        }
        let length = usize::try_from(desc.length).map_err(|_| {
            BltError::resource(ErrorCode::BufferdescLen, "length exceeds address space")
        })?;
        let end = desc.offset.checked_add(length);
        if end.is_none_or(|end| end > buffer.len()) {
            return Err(BltError::resource(
                ErrorCode::MemoryUnmappable,
                format!(
                    "range {}+{} exceeds the {}-byte buffer",
                    desc.offset,
                    length,
                    buffer.len()
                ),
            ));
        }

        let mut st = lock(&self.state);
        if st.entries.len() >= self.limits.max_mappings {
            return Err(BltError::resource(
                ErrorCode::Oom,
                format!("mapping table full ({} entries)", self.limits.max_mappings),
            ));
        }
        let handle = MapHandle(st.next);
        st.next += 1;
        st.entries.insert(
            handle,
            Entry {
                buffer: buffer.clone(),
                offset: desc.offset,
                length,
                refs: 1,
            },
        );
        tracing::debug!(handle = handle.0, length, "mapped buffer");
        Ok(handle)
    }

    /// Release the client reference. Fails while any operation or open batch still holds one.
    pub fn unmap(&self, handle: MapHandle) -> BltResult<()> {
        let mut st = lock(&self.state);
        let Some(entry) = st.entries.get(&handle) else {
            return Err(BltError::resource(
                ErrorCode::Rsrc,
                format!("mapping {} is unknown or already released", handle.0),
            ));
        };
        if entry.refs > 1 {
            let pending = entry.refs - 1;
            tracing::warn!(handle = handle.0, pending, "unmap refused, mapping busy");
            return Err(BltError::resource(
                ErrorCode::Rsrc,
                format!("mapping {} busy: {pending} operation reference(s)", handle.0),
            ));
        }
        st.entries.remove(&handle);
        tracing::debug!(handle = handle.0, "unmapped buffer");
        Ok(())
    }

    /// Pin every cited mapping. All-or-nothing: on failure no count changes.
    pub fn lease(&self, slots: &[(MapHandle, SlotRole)]) -> BltResult<MapLease> {
        let mut st = lock(&self.state);
        if let Some((handle, role)) = slots
            .iter()
            .find(|(h, _)| !st.entries.contains_key(h))
            .copied()
        {
            return Err(BltError::resource(
                role.codes().handle,
                format!("{role:?} mapping {} is unknown or released", handle.0),
            ));
        }
        let mut views = Vec::with_capacity(slots.len());
        for &(handle, role) in slots {
            if let Some(entry) = st.entries.get_mut(&handle) {
                entry.refs += 1;
                views.push(MappedView {
                    handle,
                    role,
                    buffer: entry.buffer.clone(),
                    offset: entry.offset,
                    length: entry.length,
                });
            }
        }
        Ok(MapLease {
            state: Arc::clone(&self.state),
            views,
        })
    }

    /// Reference count of a live mapping (1 = client only).
    pub fn refs(&self, handle: MapHandle) -> Option<usize> {
        lock(&self.state).entries.get(&handle).map(|e| e.refs)
    }

    /// Mapped length of a live mapping.
    pub fn mapping_len(&self, handle: MapHandle) -> Option<usize> {
        lock(&self.state).entries.get(&handle).map(|e| e.length)
    }

    /// Number of live mappings.
    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    /// Return `true` when no mapping is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One pinned mapping inside a [`MapLease`].
#[derive(Clone, Debug)]
pub struct MappedView {
    /// Mapping handle.
    pub handle: MapHandle,
    /// Slot the mapping was cited for.
    pub role: SlotRole,
    /// Client memory.
    pub buffer: PixelBuffer,
    /// Start of the mapped range in `buffer`.
    pub offset: usize,
    /// Length of the mapped range.
    pub length: usize,
}

/// Reference on a set of mappings; released on drop.
#[derive(Debug)]
pub struct MapLease {
    state: SharedState,
    views: Vec<MappedView>,
}

impl MapLease {
    /// Pinned mappings, in the order they were requested.
    pub fn views(&self) -> &[MappedView] {
        &self.views
    }

    /// First view cited for `role`.
    pub fn view(&self, role: SlotRole) -> Option<&MappedView> {
        self.views.iter().find(|v| v.role == role)
    }

    /// Take another reference on the same mappings.
    pub fn duplicate(&self) -> MapLease {
        let mut st = lock(&self.state);
        for v in &self.views {
            if let Some(entry) = st.entries.get_mut(&v.handle) {
                entry.refs += 1;
            }
        }
        MapLease {
            state: Arc::clone(&self.state),
            views: self.views.clone(),
        }
    }
}

impl Drop for MapLease {
    fn drop(&mut self) {
        let mut st = lock(&self.state);
        for v in &self.views {
            if let Some(entry) = st.entries.get_mut(&v.handle) {
                entry.refs = entry.refs.saturating_sub(1);
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/registry/map.rs"]
mod tests;
