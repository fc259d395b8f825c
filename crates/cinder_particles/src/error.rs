//! # Particle Error Types
//!
//! All errors that can occur in the particle layer.

use cinder_core::{ConfigError, DefinitionId, PoolError};
use thiserror::Error;

use crate::definition::GlobalDefinition;

/// Errors that can occur in the particle system.
#[derive(Error, Debug)]
pub enum ParticleError {
    /// Spawn requested for a definition that is not loaded.
    #[error("particle definition {0} is not loaded")]
    DefinitionUnresolved(DefinitionId),

    /// The slot pool refused the request.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Invalid particle or pool configuration.
    #[error("invalid particle configuration: {0}")]
    Config(#[from] ConfigError),

    /// Malformed definition file.
    #[error("malformed definition file: {0}")]
    Definition(#[from] toml::de::Error),

    /// A local definition was registered under a reserved global id.
    #[error("definition id {id} is reserved for global definitions")]
    ReservedId {
        /// The rejected id.
        id: DefinitionId,
    },

    /// A definition file names a global kind that does not exist.
    #[error("unknown global definition: {name}")]
    UnknownGlobal {
        /// The table name found in the file.
        name: String,
    },

    /// A definition file lacks globals the game cannot run without.
    #[error("missing required global definitions: {missing:?}")]
    MissingGlobals {
        /// Every required kind that was absent.
        missing: Vec<GlobalDefinition>,
    },
}

/// Result type for particle operations.
pub type ParticleResult<T> = Result<T, ParticleError>;

#[cfg(test)]
mod tests {
    use cinder_core::QueueKind;

    use super::*;

    #[test]
    fn test_pool_errors_pass_through_unchanged() {
        let error = ParticleError::from(PoolError::QueueFull {
            queue: QueueKind::Termination,
            capacity: 8,
        });
        assert_eq!(error.to_string(), "termination queue full (8 entries)");
    }

    #[test]
    fn test_missing_globals_lists_kinds() {
        let error = ParticleError::MissingGlobals {
            missing: vec![GlobalDefinition::Splash, GlobalDefinition::Defend],
        };
        assert_eq!(
            error.to_string(),
            "missing required global definitions: [Splash, Defend]"
        );
    }
}
