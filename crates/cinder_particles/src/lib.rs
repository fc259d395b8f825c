//! # CINDER Particles
//!
//! Particle lifecycles on top of the [`cinder_core`] slot pool.
//!
//! ## Design Principles
//!
//! 1. **Definitions are external data** - loaded from TOML, shared through
//!    a read-mostly registry, resolvable or not at any tick
//! 2. **Ending is not freeing** - lingering particles become ghosts and keep
//!    displaying until their frames run out
//! 3. **Owners are never trusted** - every update re-checks owner liveness
//!
//! ## Example
//!
//! ```rust,ignore
//! use cinder_particles::{GlobalDefinition, ParticleConfig, ParticleSystem, SharedRegistry, SpawnRequest};
//!
//! let registry = SharedRegistry::default();
//! registry.write().load_globals_toml(&std::fs::read_to_string("data/particles/globals.toml")?)?;
//!
//! let mut particles = ParticleSystem::new(&ParticleConfig::default(), registry)?;
//! let coin = particles.spawn(SpawnRequest::new(GlobalDefinition::Coin5.id()).forced())?;
//!
//! // Once per frame
//! let stats = particles.update(&frame_counter, &characters);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod definition;
pub mod error;
pub mod system;

pub use config::ParticleConfig;
pub use definition::{
    DefinitionRegistry, GlobalDefinition, ParticleDefinition, SharedRegistry,
    GLOBAL_DEFINITION_COUNT,
};
pub use error::{ParticleError, ParticleResult};
pub use system::{spawn_into, Ending, ParticleSystem, SpawnRequest, UpdateStats};
