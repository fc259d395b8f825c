//! # CINDER Core
//!
//! Fixed-capacity slot pool for short-lived game entities (particles, hit
//! sparks, weather drops) designed for:
//! - Zero allocations after construction
//! - Safe spawn/destroy requests while the pool is being iterated
//! - Graceful eviction when the pool runs dry
//!
//! ## Architecture Rules
//!
//! 1. **All storage is pre-allocated** - records, free/used lists, deferred queues
//! 2. **Structural mutation is deferred during scans** - see [`ScanGuard`]
//! 3. **Bookkeeping bugs never crash a frame** - divergence is repaired, not fatal
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::collections::HashMap;
//! use cinder_core::{SlotPool, SlotSetup};
//!
//! let definitions = HashMap::new();
//! let mut pool = SlotPool::new(512);
//!
//! let slot = pool.allocate(false, &definitions)?;
//! pool.get_mut(slot).unwrap().configure(SlotSetup { lifetime: 60, ..SlotSetup::default() })?;
//! pool.activate(slot)?;
//!
//! pool.for_each_active(|pool, slot| {
//!     // Releases requested here are applied when the scan ends.
//!     let _ = pool.release(slot);
//! });
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod collab;
pub mod config;
pub mod error;
pub mod slot;

pub use collab::{DefinitionHandle, DefinitionId, DefinitionStore, OwnerRef, OwnerRegistry, TickSource};
pub use config::PoolConfig;
pub use error::{ConfigError, PoolError, PoolResult, QueueKind, TransitionError};
pub use slot::{
    Membership, Outcome, Record, ScanGuard, SlotPool, SlotRef, SlotSetup, SlotState, UsedRange,
    Victim, VictimReason,
};
