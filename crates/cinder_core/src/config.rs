//! # Pool Configuration
//!
//! Loaded once at startup from TOML and validated before the pool is built.
//!
//! ```toml
//! capacity = 512
//! free_reserve = 128
//! termination_queue = 256
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, QueueKind};

/// Sizing for a [`SlotPool`](crate::SlotPool).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Number of slots.
    pub capacity: usize,
    /// Free slots withheld from non-forced allocations.
    ///
    /// Once `free_count <= free_reserve`, only forced requests are served.
    pub free_reserve: usize,
    /// Bound on activations queued during one locked scan.
    /// Defaults to `capacity`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation_queue: Option<usize>,
    /// Bound on terminations queued during one locked scan.
    /// Defaults to `capacity`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub termination_queue: Option<usize>,
}

impl PoolConfig {
    /// Default slot count.
    pub const DEFAULT_CAPACITY: usize = 512;

    /// Largest capacity a 32-bit slot index can address.
    pub const MAX_CAPACITY: usize = u32::MAX as usize;

    /// Creates a config with no reserve and queues as large as the pool.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            free_reserve: 0,
            activation_queue: None,
            termination_queue: None,
        }
    }

    /// Holds back a quarter of the pool for forced requests.
    ///
    /// Ordinary spawns start failing while plenty of slots remain, so
    /// important effects can still be placed without evicting anything.
    #[must_use]
    pub const fn with_quarter_reserve(mut self) -> Self {
        self.free_reserve = self.capacity / 4;
        self
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML and the matching
    /// validation error for out-of-range values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the values describe a usable pool.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 || self.capacity >= Self::MAX_CAPACITY {
            return Err(ConfigError::Capacity {
                capacity: self.capacity,
                max: Self::MAX_CAPACITY - 1,
            });
        }
        if self.free_reserve >= self.capacity {
            return Err(ConfigError::Reserve {
                reserve: self.free_reserve,
                capacity: self.capacity,
            });
        }
        if self.activation_queue == Some(0) {
            return Err(ConfigError::EmptyQueue {
                queue: QueueKind::Activation,
            });
        }
        if self.termination_queue == Some(0) {
            return Err(ConfigError::EmptyQueue {
                queue: QueueKind::Termination,
            });
        }
        Ok(())
    }

    /// Effective activation queue bound.
    #[inline]
    #[must_use]
    pub fn activation_capacity(&self) -> usize {
        self.activation_queue.unwrap_or(self.capacity)
    }

    /// Effective termination queue bound.
    #[inline]
    #[must_use]
    pub fn termination_capacity(&self) -> usize {
        self.termination_queue.unwrap_or(self.capacity)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = PoolConfig::from_toml_str("capacity = 64").unwrap();
        assert_eq!(config.capacity, 64);
        assert_eq!(config.free_reserve, 0);
        assert_eq!(config.activation_capacity(), 64);
        assert_eq!(config.termination_capacity(), 64);
    }

    #[test]
    fn test_explicit_queues() {
        let config = PoolConfig::from_toml_str(
            "capacity = 64\nfree_reserve = 16\nactivation_queue = 8\ntermination_queue = 4",
        )
        .unwrap();
        assert_eq!(config.free_reserve, 16);
        assert_eq!(config.activation_capacity(), 8);
        assert_eq!(config.termination_capacity(), 4);
    }

    #[test]
    fn test_quarter_reserve() {
        assert_eq!(PoolConfig::new(512).with_quarter_reserve().free_reserve, 128);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            PoolConfig::from_toml_str("capacity = 0"),
            Err(ConfigError::Capacity { capacity: 0, .. })
        ));
        assert!(matches!(
            PoolConfig::from_toml_str("capacity = 4\nfree_reserve = 4"),
            Err(ConfigError::Reserve { .. })
        ));
        assert!(matches!(
            PoolConfig::from_toml_str("capacity = 4\ntermination_queue = 0"),
            Err(ConfigError::EmptyQueue {
                queue: QueueKind::Termination
            })
        ));
        assert!(matches!(
            PoolConfig::from_toml_str("capacity = 4\nbogus = 1"),
            Err(ConfigError::Parse(_))
        ));
    }
}
