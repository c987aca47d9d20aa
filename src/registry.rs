//! Context registry: maps generation-checked handles to live engine
//! contexts.
//!
//! Handles are a slot index plus a generation counter rather than a raw
//! engine address, so use-after-shutdown is detected instead of undefined:
//! removing a context bumps its slot's generation, and any handle minted
//! before that fails validation afterwards.
//!
//! All operations are `Mutex`-protected; the table is process-wide and
//! created by the first `load()`.

use std::sync::Mutex;

use crate::error::{BridgeError, Result};
use crate::symbols::NativeNetwork;

/// Process-wide context table.
static REGISTRY: Mutex<Option<ContextRegistry>> = Mutex::new(None);

/// Raw engine network pointer.
///
/// Held only in the registry and handed to engine entry points. The bridge
/// never dereferences it; callers serialize access per the concurrency
/// contract, so moving it across threads inside the lock is sound.
#[derive(Clone, Copy)]
struct RawNetwork(*mut NativeNetwork);

unsafe impl Send for RawNetwork {}

/// Opaque, generation-checked handle to one loaded engine context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle {
    slot: u32,
    generation: u32,
}

impl ContextHandle {
    /// The null handle. Never validates; every operation on it fails with
    /// `InvalidHandle` until `load()` has produced a real handle.
    pub const NULL: ContextHandle = ContextHandle {
        slot: 0,
        generation: 0,
    };
}

struct Slot {
    generation: u32,
    network: Option<RawNetwork>,
}

#[derive(Default)]
struct ContextRegistry {
    slots: Vec<Slot>,
}

impl ContextRegistry {
    fn insert(&mut self, network: RawNetwork) -> ContextHandle {
        if let Some(index) = self.slots.iter().position(|s| s.network.is_none()) {
            let slot = &mut self.slots[index];
            slot.network = Some(network);
            return ContextHandle {
                slot: index as u32,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 1,
            network: Some(network),
        });
        ContextHandle {
            slot: (self.slots.len() - 1) as u32,
            generation: 1,
        }
    }

    fn slot_for(&mut self, handle: ContextHandle) -> Option<&mut Slot> {
        let slot = self.slots.get_mut(handle.slot as usize)?;
        if slot.generation != handle.generation || slot.network.is_none() {
            return None;
        }
        Some(slot)
    }
}

/// Registers a loaded network and mints its handle.
pub(crate) fn insert(network: *mut NativeNetwork) -> Result<ContextHandle> {
    if network.is_null() {
        return Err(BridgeError::InvalidHandle);
    }
    let mut guard = REGISTRY.lock().expect("context registry mutex poisoned");
    let registry = guard.get_or_insert_with(ContextRegistry::default);
    Ok(registry.insert(RawNetwork(network)))
}

/// Resolves a handle to its engine network pointer.
///
/// Every public operation calls this first; null, unknown, and stale
/// handles all fail with `InvalidHandle`.
pub(crate) fn resolve(handle: ContextHandle) -> Result<*mut NativeNetwork> {
    let mut guard = REGISTRY.lock().expect("context registry mutex poisoned");
    let registry = guard.as_mut().ok_or(BridgeError::InvalidHandle)?;
    let slot = registry.slot_for(handle).ok_or(BridgeError::InvalidHandle)?;
    let network = slot.network.ok_or(BridgeError::InvalidHandle)?;
    Ok(network.0)
}

/// Removes a handle, invalidating it, and returns the owned pointer.
///
/// The slot's generation is bumped so the removed handle can never
/// validate again.
pub(crate) fn remove(handle: ContextHandle) -> Result<*mut NativeNetwork> {
    let mut guard = REGISTRY.lock().expect("context registry mutex poisoned");
    let registry = guard.as_mut().ok_or(BridgeError::InvalidHandle)?;
    let slot = registry.slot_for(handle).ok_or(BridgeError::InvalidHandle)?;
    let network = slot.network.take().ok_or(BridgeError::InvalidHandle)?;
    slot.generation = slot.generation.wrapping_add(1);
    Ok(network.0)
}

/// Number of live contexts (for diagnostics).
pub fn len() -> usize {
    let guard = REGISTRY.lock().expect("context registry mutex poisoned");
    guard
        .as_ref()
        .map(|r| r.slots.iter().filter(|s| s.network.is_some()).count())
        .unwrap_or(0)
}
