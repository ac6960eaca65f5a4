//! Debug-only detection of reentrant calls into a map.
//!
//! Map operations call user code (`K: Hash`, `K: Eq`) while segment
//! boundaries may be mid-update. Each operation records its name on entry;
//! a second entry before the first guard drops panics in debug builds and
//! names both operations. Release builds keep only a zero-sized marker.

use core::cell::Cell;
use core::marker::PhantomData;

#[derive(Debug)]
pub(crate) struct ReentrancyCheck {
    #[cfg(debug_assertions)]
    active: Cell<Option<&'static str>>,
    // Same auto traits in every profile: Send, never Sync.
    _not_sync: PhantomData<Cell<()>>,
}

impl ReentrancyCheck {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            active: Cell::new(None),
            _not_sync: PhantomData,
        }
    }

    /// Mark `op` as running until the returned guard drops.
    #[inline]
    pub(crate) fn enter(&self, op: &'static str) -> OperationGuard<'_> {
        #[cfg(debug_assertions)]
        {
            if let Some(outer) = self.active.get() {
                panic!("reentrant call to SegmentedHashMap::{op} while {outer} is running");
            }
            self.active.set(Some(op));
            OperationGuard { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            let _ = op;
            OperationGuard { _owner: PhantomData }
        }
    }
}

impl Default for ReentrancyCheck {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct OperationGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a ReentrancyCheck,
    #[cfg(not(debug_assertions))]
    _owner: PhantomData<&'a ReentrancyCheck>,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.owner.active.set(None);
    }
}
