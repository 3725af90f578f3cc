//! [`AttributeCache`] — a per-node set of attribute slots, each
//! `{value, state, mutex}`, per spec.md §3/§4.D.
//!
//! Grounded in `examples/original_source/src-ng/nautilus-cache.c`
//! (`NautilusCache`/`CacheItemDetails`): one mutex per item, a small state
//! machine, and a "set on non-pending is a discarded cancellation" policy
//! instead of generation counters (Design Notes, §9).

use std::any::Any;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;

/// A slot's lifecycle state. Transitions: `Invalid -> Pending -> Valid ->
/// Invalid -> …`. A direct `Valid -> Pending` request is a programmer error
/// and is logged and discarded rather than applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CacheState {
    Invalid = 0,
    Pending = 1,
    Valid = 2,
}

impl CacheState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => CacheState::Invalid,
            1 => CacheState::Pending,
            _ => CacheState::Valid,
        }
    }
}

/// Opaque handle to a slot, allocated densely from 0 by [`AttributeCache::install_slot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotId(usize);

struct Slot {
    state: AtomicU8,
    value: Mutex<Option<Box<dyn Any + Send>>>,
}

/// Owned by a [`crate::node::FileNode`]. Slot count and type are fixed at
/// node-construction time (`install_slot` is only ever called then); after
/// that, slots are addressed by their dense [`SlotId`].
#[derive(Default)]
pub struct AttributeCache {
    slots: Vec<Slot>,
}

impl AttributeCache {
    pub fn new() -> Self {
        AttributeCache { slots: Vec::new() }
    }

    /// Allocates a fresh `Invalid` slot. Precondition: called only during
    /// node construction.
    pub fn install_slot(&mut self) -> SlotId {
        let id = SlotId(self.slots.len());
        self.slots.push(Slot {
            state: AtomicU8::new(CacheState::Invalid as u8),
            value: Mutex::new(None),
        });
        id
    }

    /// Lock-free read of the slot's current state.
    pub fn state(&self, slot: SlotId) -> CacheState {
        CacheState::from_u8(self.slots[slot.0].state.load(Ordering::Acquire))
    }

    /// `Invalid -> Pending`. No-op (and logged) if already `Pending` or `Valid`.
    pub fn set_pending(&self, slot: SlotId) {
        let s = &self.slots[slot.0];
        let _guard = s.value.lock();
        match CacheState::from_u8(s.state.load(Ordering::Acquire)) {
            CacheState::Invalid => s.state.store(CacheState::Pending as u8, Ordering::Release),
            CacheState::Valid => {
                tracing::warn!("set_pending on a Valid slot ignored (Valid -> Pending is a programmer error)");
            }
            CacheState::Pending => {}
        }
    }

    /// Accepted only if the slot is `Pending`; otherwise the value is a
    /// late result for an update nobody is waiting on and is discarded.
    pub fn set_value<T: Send + 'static>(&self, slot: SlotId, value: T) {
        let s = &self.slots[slot.0];
        let mut guard = s.value.lock();
        if CacheState::from_u8(s.state.load(Ordering::Acquire)) == CacheState::Pending {
            *guard = Some(Box::new(value));
            s.state.store(CacheState::Valid as u8, Ordering::Release);
        } else {
            tracing::debug!("discarding set_value on non-pending slot");
        }
    }

    /// `copy = true` in spec terms: returns an owned clone.
    pub fn get_value<T: Clone + Send + 'static>(&self, slot: SlotId) -> Option<T> {
        let s = &self.slots[slot.0];
        let guard = s.value.lock();
        guard.as_ref().and_then(|b| b.downcast_ref::<T>()).cloned()
    }

    /// `copy = false` in spec terms: the borrow is only valid for the
    /// duration of `f`, which holds the slot's mutex.
    pub fn with_value<T: Send + 'static, R>(&self, slot: SlotId, f: impl FnOnce(Option<&T>) -> R) -> R {
        let s = &self.slots[slot.0];
        let guard = s.value.lock();
        f(guard.as_ref().and_then(|b| b.downcast_ref::<T>()))
    }

    /// `-> Invalid`. If `destroy_now`, the stored value is dropped
    /// immediately; otherwise it may still be read by tolerant callers
    /// until the next `set_value`.
    pub fn invalidate(&self, slot: SlotId, destroy_now: bool) {
        let s = &self.slots[slot.0];
        let mut guard = s.value.lock();
        s.state.store(CacheState::Invalid as u8, Ordering::Release);
        if destroy_now {
            *guard = None;
        }
    }

    /// Bulk invalidate without destroying values; used on `renamed`.
    pub fn invalidate_all(&self) {
        for s in &self.slots {
            s.state.store(CacheState::Invalid as u8, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine() {
        let mut cache = AttributeCache::new();
        let slot = cache.install_slot();
        assert_eq!(cache.state(slot), CacheState::Invalid);

        cache.set_pending(slot);
        assert_eq!(cache.state(slot), CacheState::Pending);

        cache.set_pending(slot);
        assert_eq!(cache.state(slot), CacheState::Pending);

        cache.set_value(slot, 42i32);
        assert_eq!(cache.state(slot), CacheState::Valid);
        assert_eq!(cache.get_value::<i32>(slot), Some(42));
    }

    #[test]
    fn set_after_invalidate_discards() {
        let mut cache = AttributeCache::new();
        let slot = cache.install_slot();
        cache.set_pending(slot);
        cache.invalidate(slot, false);
        cache.set_value(slot, 7i32);
        assert_eq!(cache.state(slot), CacheState::Invalid);
        assert_eq!(cache.get_value::<i32>(slot), None);
    }

    #[test]
    fn valid_to_pending_is_noop() {
        let mut cache = AttributeCache::new();
        let slot = cache.install_slot();
        cache.set_pending(slot);
        cache.set_value(slot, 1i32);
        cache.set_pending(slot);
        assert_eq!(cache.state(slot), CacheState::Valid);
    }
}
