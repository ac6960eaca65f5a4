//! segmap: a chained hash map whose chains are contiguous segments of a
//! single linked entry list, indexed by an explicit bucket directory.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a hash map built from two plain structures, with one invariant
//!   tying them together that every operation re-establishes before it
//!   returns.
//! - Layers:
//!   - EntryStore<K, V>: ordered doubly-linked list of entries living in a
//!     generational arena (`slotmap`). Links are arena keys, so positions of
//!     untouched entries survive inserts and removals elsewhere.
//!   - BucketDirectory: `capacity` slots, each `Empty` or a
//!     `Segment { first, last }` boundary pair into the store. Owns the
//!     splice (prepend) and unlink (boundary repair) primitives.
//!   - SegmentedHashMap<K, V, S>: public API. Hashes keys, guards against
//!     reentrancy, and decides when to rehash.
//!
//! Segment invariant
//! - Entries whose `hash % capacity` equal a slot's index are contiguous in
//!   the store, between the slot's `first` and `last` inclusive.
//! - Inserting prepends to the key's segment; a key whose slot is empty
//!   opens a new segment at the end of the store.
//! - Erasing repairs the slot's boundaries before the node is unlinked; a
//!   segment that loses its last entry turns back into `Empty`.
//! - Lookups scan one segment only.
//!
//! Rehashing
//! - Growth: after an insert leaves `len > capacity`, the store and
//!   directory are rebuilt at `capacity * growth_factor` (2 by default).
//! - Shrink (opt-in via `ShrinkPolicy`): after an erase leaves
//!   `2 * len < capacity`, rebuild at `capacity * factor` (0.7 by default),
//!   never below the policy floor.
//! - A rebuild moves entries in iteration order into a fresh store using the
//!   same prepend rule, so each segment's internal order flips.
//! - Each entry caches its `u64` hash; rebuilds never call `K: Hash`.
//!
//! Handles
//! - `insert` and `find` return a `Handle`. It survives operations on other
//!   entries, dies with its own entry, and dies for every entry on rehash
//!   or clear. Dead handles resolve to `None`; they never alias another
//!   entry of the same map.
//!
//! Constraints and non-goals
//! - Single-threaded; the map is `Send` but not `Sync`.
//! - Unique keys. `insert` is insert-if-absent, never an upsert.
//! - `at`/`at_mut` are the only lookups that return an error
//!   (`KeyNotFound`); elsewhere absence is `None` or a no-op.
//! - In debug builds, re-entering the map from `K: Eq`/`K: Hash` panics.

mod bucket_directory;
pub mod config;
mod entry_store;
pub mod error;
mod reentrancy;
pub mod segmented_map;
mod segmented_map_proptest;

// Public surface
pub use config::{Config, ShrinkPolicy};
pub use error::{ConfigError, InsertError, KeyNotFound, ValidationError};
pub use segmented_map::{Handle, SegmentedHashMap};
