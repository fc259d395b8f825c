//! # Particle Definitions
//!
//! Definitions describe how a kind of particle lives and dies. The slot pool
//! only ever sees their ids; the registry here resolves them.
//!
//! Ids below [`GLOBAL_DEFINITION_COUNT`] are reserved for the global
//! definitions every level needs (coins, gems, weather, water effects).
//! They are loaded from one TOML file, one table per kind:
//!
//! ```toml
//! [coin1]
//! name = "Coin (1)"
//! lifetime_ticks = 600
//! frames = 24
//! linger = true
//!
//! [defend]
//! name = "Defend"
//! lifetime_ticks = 20
//! protected = true
//! end_with_owner = true
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use cinder_core::{DefinitionHandle, DefinitionId, DefinitionStore};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};

use crate::error::{ParticleError, ParticleResult};

/// Number of ids reserved for [`GlobalDefinition`]s.
pub const GLOBAL_DEFINITION_COUNT: u32 = 13;

/// Definitions loaded for every level, at fixed ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum GlobalDefinition {
    /// Single coin.
    Coin1 = 0,
    /// Five-coin pile.
    Coin5 = 1,
    /// Twenty-five-coin pile.
    Coin25 = 2,
    /// Hundred-coin pile.
    Coin100 = 3,
    /// Small gem.
    Gem200 = 4,
    /// Medium gem.
    Gem500 = 5,
    /// Large gem.
    Gem1000 = 6,
    /// Huge gem.
    Gem2000 = 7,
    /// Weather drop. Optional.
    Weather = 8,
    /// Weather drop hitting the ground. Optional.
    WeatherFinish = 9,
    /// Water splash.
    Splash = 10,
    /// Water ripple.
    Ripple = 11,
    /// Defend effect.
    Defend = 12,
}

impl GlobalDefinition {
    /// Every kind, in id order.
    pub const ALL: [Self; GLOBAL_DEFINITION_COUNT as usize] = [
        Self::Coin1,
        Self::Coin5,
        Self::Coin25,
        Self::Coin100,
        Self::Gem200,
        Self::Gem500,
        Self::Gem1000,
        Self::Gem2000,
        Self::Weather,
        Self::WeatherFinish,
        Self::Splash,
        Self::Ripple,
        Self::Defend,
    ];

    /// Reserved id of this kind.
    #[inline]
    #[must_use]
    pub const fn id(self) -> DefinitionId {
        DefinitionId(self as u32)
    }

    /// Kind reserved at `id`, if any.
    #[must_use]
    pub fn from_id(id: DefinitionId) -> Option<Self> {
        Self::ALL.get(id.0 as usize).copied()
    }

    /// Levels can run without weather.
    #[inline]
    #[must_use]
    pub const fn is_optional(self) -> bool {
        matches!(self, Self::Weather | Self::WeatherFinish)
    }

    /// Table name used in definition files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Coin1 => "coin1",
            Self::Coin5 => "coin5",
            Self::Coin25 => "coin25",
            Self::Coin100 => "coin100",
            Self::Gem200 => "gem200",
            Self::Gem500 => "gem500",
            Self::Gem1000 => "gem1000",
            Self::Gem2000 => "gem2000",
            Self::Weather => "weather",
            Self::WeatherFinish => "weather_finish",
            Self::Splash => "splash",
            Self::Ripple => "ripple",
            Self::Defend => "defend",
        }
    }

    /// Parses a table name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for GlobalDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How one kind of particle lives and dies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParticleDefinition {
    /// Display name.
    pub name: String,
    /// Ticks a spawned particle stays in game.
    pub lifetime_ticks: u32,
    /// Frames the particle may keep displaying after it ends.
    #[serde(default)]
    pub frames: u32,
    /// Immune to forced eviction.
    #[serde(default)]
    pub protected: bool,
    /// Ends when its owner dies, instead of outliving it.
    #[serde(default)]
    pub end_with_owner: bool,
    /// Keeps displaying as a ghost after it ends, while frames remain.
    #[serde(default)]
    pub linger: bool,
}

impl ParticleDefinition {
    /// Creates a plain definition.
    #[must_use]
    pub fn new(name: impl Into<String>, lifetime_ticks: u32, frames: u32) -> Self {
        Self {
            name: name.into(),
            lifetime_ticks,
            frames,
            protected: false,
            end_with_owner: false,
            linger: false,
        }
    }

    /// Marks the definition immune to forced eviction.
    #[must_use]
    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    /// Ends particles together with their owner.
    #[must_use]
    pub fn ending_with_owner(mut self) -> Self {
        self.end_with_owner = true;
        self
    }

    /// Lets ended particles keep displaying as ghosts.
    #[must_use]
    pub fn lingering(mut self) -> Self {
        self.linger = true;
        self
    }

    /// Pool-facing view of this definition.
    #[inline]
    #[must_use]
    pub fn handle(&self, id: DefinitionId) -> DefinitionHandle {
        DefinitionHandle {
            id,
            protected: self.protected,
        }
    }
}

/// Loaded definitions by id.
#[derive(Debug)]
pub struct DefinitionRegistry {
    definitions: HashMap<DefinitionId, ParticleDefinition>,
    next_local: u32,
}

impl DefinitionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            definitions: HashMap::new(),
            next_local: GLOBAL_DEFINITION_COUNT,
        }
    }

    /// Replaces every global definition with the contents of a TOML file.
    ///
    /// Missing optional kinds are tolerated. If any required kind is
    /// missing, or the file names an unknown kind, the registry is left
    /// untouched. Returns the number of globals loaded.
    ///
    /// # Errors
    ///
    /// [`ParticleError::Definition`] for malformed TOML,
    /// [`ParticleError::UnknownGlobal`], or
    /// [`ParticleError::MissingGlobals`].
    pub fn load_globals_toml(&mut self, source: &str) -> ParticleResult<usize> {
        let tables: BTreeMap<String, ParticleDefinition> = toml::from_str(source)?;

        let mut globals = Vec::with_capacity(tables.len());
        for (name, definition) in tables {
            let kind = GlobalDefinition::from_name(&name)
                .ok_or(ParticleError::UnknownGlobal { name })?;
            globals.push((kind, definition));
        }

        let missing: Vec<GlobalDefinition> = GlobalDefinition::ALL
            .into_iter()
            .filter(|kind| !kind.is_optional())
            .filter(|kind| !globals.iter().any(|(loaded, _)| loaded == kind))
            .collect();
        if !missing.is_empty() {
            return Err(ParticleError::MissingGlobals { missing });
        }

        for kind in GlobalDefinition::ALL {
            if kind.is_optional() && !globals.iter().any(|(loaded, _)| *loaded == kind) {
                tracing::debug!(%kind, "optional global definition not provided");
            }
        }

        self.definitions
            .retain(|id, _| GlobalDefinition::from_id(*id).is_none());
        let loaded = globals.len();
        for (kind, definition) in globals {
            self.definitions.insert(kind.id(), definition);
        }

        tracing::debug!(loaded, "loaded global particle definitions");
        Ok(loaded)
    }

    /// Registers a local definition under a fresh id.
    pub fn register(&mut self, definition: ParticleDefinition) -> DefinitionId {
        while self.definitions.contains_key(&DefinitionId(self.next_local)) {
            self.next_local += 1;
        }
        let id = DefinitionId(self.next_local);
        self.next_local += 1;
        self.definitions.insert(id, definition);
        id
    }

    /// Registers a local definition under a chosen id, returning the one
    /// it replaced.
    ///
    /// # Errors
    ///
    /// [`ParticleError::ReservedId`] for ids of global definitions.
    pub fn register_at(
        &mut self,
        id: DefinitionId,
        definition: ParticleDefinition,
    ) -> ParticleResult<Option<ParticleDefinition>> {
        if GlobalDefinition::from_id(id).is_some() {
            return Err(ParticleError::ReservedId { id });
        }
        Ok(self.definitions.insert(id, definition))
    }

    /// Sets one global definition directly.
    pub fn set_global(
        &mut self,
        kind: GlobalDefinition,
        definition: ParticleDefinition,
    ) -> Option<ParticleDefinition> {
        self.definitions.insert(kind.id(), definition)
    }

    /// Unloads a definition. Live particles using it become eviction
    /// candidates and end normally at their next update.
    pub fn unload(&mut self, id: DefinitionId) -> Option<ParticleDefinition> {
        self.definitions.remove(&id)
    }

    /// Unloads every definition, globals included.
    pub fn release_all(&mut self) {
        self.definitions.clear();
        self.next_local = GLOBAL_DEFINITION_COUNT;
    }

    /// Looks up a definition.
    #[inline]
    #[must_use]
    pub fn get(&self, id: DefinitionId) -> Option<&ParticleDefinition> {
        self.definitions.get(&id)
    }

    /// Looks up a global definition.
    #[inline]
    #[must_use]
    pub fn global(&self, kind: GlobalDefinition) -> Option<&ParticleDefinition> {
        self.get(kind.id())
    }

    /// Number of loaded definitions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether nothing is loaded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Default for DefinitionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DefinitionStore for DefinitionRegistry {
    fn resolve(&self, id: DefinitionId) -> Option<DefinitionHandle> {
        self.get(id).map(|definition| definition.handle(id))
    }
}

/// Registry shared between the particle system and the asset loader.
///
/// Cloning shares the same registry. Lookups take a read lock; loading and
/// unloading take a write lock and must happen between ticks.
#[derive(Clone, Debug, Default)]
pub struct SharedRegistry {
    inner: Arc<RwLock<DefinitionRegistry>>,
}

impl SharedRegistry {
    /// Wraps a registry for sharing.
    #[must_use]
    pub fn new(registry: DefinitionRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    /// Read access.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, DefinitionRegistry> {
        self.inner.read()
    }

    /// Write access.
    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, DefinitionRegistry> {
        self.inner.write()
    }
}

impl DefinitionStore for SharedRegistry {
    fn resolve(&self, id: DefinitionId) -> Option<DefinitionHandle> {
        self.read().resolve(id)
    }
}
