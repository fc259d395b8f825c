//! # Particle Configuration
//!
//! ```toml
//! ghost_linger_frames = 32
//!
//! [pool]
//! capacity = 512
//! free_reserve = 128
//! ```
//!
//! A `[pool]` table without `free_reserve` holds back a quarter of its
//! capacity, the same as the default config.

use cinder_core::{ConfigError, PoolConfig};
use serde::{Deserialize, Deserializer, Serialize};

/// Settings for a [`ParticleSystem`](crate::ParticleSystem).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParticleConfig {
    /// Slot pool sizing.
    #[serde(deserialize_with = "pool_with_quarter_reserve")]
    pub pool: PoolConfig,
    /// Upper bound on frames a ghost keeps displaying. Zero disables
    /// ghosts entirely.
    pub ghost_linger_frames: u32,
}

impl ParticleConfig {
    /// Default cap on ghost frames.
    pub const DEFAULT_GHOST_LINGER_FRAMES: u32 = 32;

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML and the pool's
    /// validation error for out-of-range values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.pool.validate()?;
        Ok(config)
    }
}

impl Default for ParticleConfig {
    /// Default pool with a quarter of it held back for forced spawns.
    fn default() -> Self {
        Self {
            pool: PoolConfig::default().with_quarter_reserve(),
            ghost_linger_frames: Self::DEFAULT_GHOST_LINGER_FRAMES,
        }
    }
}

/// `[pool]` as written in a particle config; absent fields fall back to
/// the particle defaults rather than the bare pool defaults.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PoolTable {
    capacity: Option<usize>,
    free_reserve: Option<usize>,
    activation_queue: Option<usize>,
    termination_queue: Option<usize>,
}

fn pool_with_quarter_reserve<'de, D>(deserializer: D) -> Result<PoolConfig, D::Error>
where
    D: Deserializer<'de>,
{
    let table = PoolTable::deserialize(deserializer)?;
    let mut pool = PoolConfig::new(table.capacity.unwrap_or(PoolConfig::DEFAULT_CAPACITY))
        .with_quarter_reserve();
    if let Some(reserve) = table.free_reserve {
        pool.free_reserve = reserve;
    }
    pool.activation_queue = table.activation_queue;
    pool.termination_queue = table.termination_queue;
    Ok(pool)
}
