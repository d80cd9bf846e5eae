use thiserror::Error;

/// Default batch size (`B`): number of headers requested per fetch.
pub const DEFAULT_BATCH_SIZE: u64 = 512;

/// Default scratch window capacity (`W`): total header slots held in memory per cycle.
pub const DEFAULT_SCRATCH_CAPACITY: u64 = 131_072;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("scratch capacity {scratch_capacity} must be a non-zero multiple of batch size {batch_size}")]
    CapacityNotMultipleOfBatch { scratch_capacity: u64, batch_size: u64 },

    #[error("batch size must be non-zero")]
    ZeroBatchSize,
}

/// Compile/config-time constants for the skeleton synchronizer.
///
/// Produced from a builder rather than handed around as bare constants: validation (§8 —
/// `W mod B == 0`) happens once, at construction, instead of being re-checked on every
/// scheduling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkeletonConfig {
    /// `B`: headers requested per batch.
    pub batch_size: u64,
    /// `W`: total scratch window capacity, in header slots. Must be a multiple of `batch_size`.
    pub scratch_capacity: u64,
}

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self { batch_size: DEFAULT_BATCH_SIZE, scratch_capacity: DEFAULT_SCRATCH_CAPACITY }
    }
}

impl SkeletonConfig {
    /// Number of task slots in the scratch window (`C = W / B`).
    pub fn task_count(&self) -> u64 {
        self.scratch_capacity / self.batch_size
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConfigBuilder {
    batch_size: u64,
    scratch_capacity: u64,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self { batch_size: DEFAULT_BATCH_SIZE, scratch_capacity: DEFAULT_SCRATCH_CAPACITY }
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn scratch_capacity(mut self, scratch_capacity: u64) -> Self {
        self.scratch_capacity = scratch_capacity;
        self
    }

    pub fn build(self) -> Result<SkeletonConfig, ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.scratch_capacity == 0 || self.scratch_capacity % self.batch_size != 0 {
            return Err(ConfigError::CapacityNotMultipleOfBatch { scratch_capacity: self.scratch_capacity, batch_size: self.batch_size });
        }
        Ok(SkeletonConfig { batch_size: self.batch_size, scratch_capacity: self.scratch_capacity })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_multiple_capacity() {
        assert!(ConfigBuilder::new().batch_size(4).scratch_capacity(15).build().is_err());
    }

    #[test]
    fn accepts_default() {
        let cfg = SkeletonConfig::default();
        assert_eq!(cfg.task_count(), DEFAULT_SCRATCH_CAPACITY / DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn rejects_zero_batch() {
        assert_eq!(ConfigBuilder::new().batch_size(0).build(), Err(ConfigError::ZeroBatchSize));
    }
}
