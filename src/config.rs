//! Construction-time sizing policy for `SegmentedHashMap`.

use crate::error::ConfigError;

/// Number of slots a map starts with when no capacity is configured.
pub const DEFAULT_CAPACITY: usize = 5;
/// Directory growth multiplier applied once `len > capacity`.
pub const DEFAULT_GROWTH_FACTOR: f64 = 2.0;
/// Directory shrink multiplier applied once `2 * len < capacity`.
pub const DEFAULT_SHRINK_FACTOR: f64 = 0.7;

/// Shrink-on-underflow settings. Absent from `Config` means the directory
/// never shrinks on erase.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ShrinkPolicy {
    pub(crate) factor: f64,
    pub(crate) min_capacity: usize,
}

impl Default for ShrinkPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SHRINK_FACTOR, DEFAULT_CAPACITY)
    }
}

impl ShrinkPolicy {
    /// Shrink by `factor`, never below `min_capacity` slots.
    pub fn new(factor: f64, min_capacity: usize) -> Self {
        Self {
            factor,
            min_capacity,
        }
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Capacity floor; a shrink never goes below it.
    pub fn min_capacity(&self) -> usize {
        self.min_capacity
    }
}

/// Sizing policy: initial capacity, growth factor and optional shrink.
///
/// ```
/// use segmap::{Config, ShrinkPolicy};
///
/// let cfg = Config::new()
///     .with_initial_capacity(16)
///     .with_growth_factor(1.5)
///     .with_shrink(ShrinkPolicy::new(0.5, 8));
/// assert!(cfg.validate().is_ok());
/// assert_eq!(cfg.initial_capacity(), 16);
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Config {
    pub(crate) initial_capacity: usize,
    pub(crate) growth_factor: f64,
    pub(crate) shrink: Option<ShrinkPolicy>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            shrink: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn with_growth_factor(mut self, factor: f64) -> Self {
        self.growth_factor = factor;
        self
    }

    pub fn with_shrink(mut self, policy: ShrinkPolicy) -> Self {
        self.shrink = Some(policy);
        self
    }

    pub fn without_shrink(mut self) -> Self {
        self.shrink = None;
        self
    }

    pub fn initial_capacity(&self) -> usize {
        self.initial_capacity
    }

    pub fn growth_factor(&self) -> f64 {
        self.growth_factor
    }

    pub fn shrink(&self) -> Option<ShrinkPolicy> {
        self.shrink
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if !self.growth_factor.is_finite() || self.growth_factor <= 1.0 {
            return Err(ConfigError::GrowthFactor(self.growth_factor));
        }
        if let Some(policy) = self.shrink {
            if !policy.factor.is_finite() || policy.factor <= 0.0 || policy.factor >= 1.0 {
                return Err(ConfigError::ShrinkFactor(policy.factor));
            }
            if policy.min_capacity == 0 {
                return Err(ConfigError::ZeroMinCapacity);
            }
            if policy.min_capacity > self.initial_capacity {
                return Err(ConfigError::MinCapacityAboveInitial {
                    min_capacity: policy.min_capacity,
                    initial_capacity: self.initial_capacity,
                });
            }
        }
        Ok(())
    }

    /// Capacity after a growth step; always strictly larger than `capacity`.
    pub(crate) fn grown(&self, capacity: usize) -> usize {
        let scaled = (capacity as f64 * self.growth_factor).ceil() as usize;
        scaled.max(capacity + 1)
    }

    /// Capacity after a shrink step, or `None` when no shrink applies.
    pub(crate) fn shrunk(&self, capacity: usize, len: usize) -> Option<usize> {
        let policy = self.shrink?;
        if len.saturating_mul(2) >= capacity {
            return None;
        }
        let scaled = (capacity as f64 * policy.factor).floor() as usize;
        let target = scaled.max(policy.min_capacity).max(1);
        (target < capacity).then_some(target)
    }
}
