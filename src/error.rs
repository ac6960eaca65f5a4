//! Error types returned by `SegmentedHashMap` and its configuration.

use thiserror::Error;

/// Returned by `at`/`at_mut` when the key is absent.
///
/// This is the only lookup failure reported as an error; `find`, `get` and
/// `erase` model absence as `None` or a no-op.
#[derive(Error, Copy, Clone, Debug, Eq, PartialEq)]
#[error("key not found in map")]
pub struct KeyNotFound;

/// Returned by the strict insert variants when the key is already present.
#[derive(Error, Copy, Clone, Debug, Eq, PartialEq)]
pub enum InsertError {
    #[error("key already present in map")]
    DuplicateKey,
}

/// Invalid `Config` passed at construction.
#[derive(Error, Copy, Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// A capacity of zero leaves no slot to hash into.
    #[error("initial capacity must be at least 1")]
    ZeroCapacity,

    #[error("growth factor must be a finite number greater than 1, got {0}")]
    GrowthFactor(f64),

    #[error("shrink factor must be within (0, 1), got {0}")]
    ShrinkFactor(f64),

    #[error("shrink floor must be at least 1")]
    ZeroMinCapacity,

    #[error("shrink floor {min_capacity} exceeds initial capacity {initial_capacity}")]
    MinCapacityAboveInitial {
        min_capacity: usize,
        initial_capacity: usize,
    },
}

/// A broken structural invariant, reported by `SegmentedHashMap::validate`.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum ValidationError {
    #[error("size counter is {counter} but the entry store holds {stored}")]
    SizeMismatch { counter: usize, stored: usize },

    #[error("segments cover {covered} entries but the entry store holds {stored}")]
    CoverageMismatch { covered: usize, stored: usize },

    #[error("slot {slot}: {message}")]
    Slot { slot: usize, message: String },

    #[error("entry store links are inconsistent: {0}")]
    Links(String),
}
