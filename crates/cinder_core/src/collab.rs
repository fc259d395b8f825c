//! # Collaborator Seams
//!
//! The pool does not own particle definitions, characters, or time. It sees
//! them through three narrow traits:
//!
//! - [`DefinitionStore`]: resolves a definition id to an opaque handle
//! - [`OwnerRegistry`]: answers whether an owning character still exists
//! - [`TickSource`]: reads the global frame counter
//!
//! None of them are ever mutated by the pool.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an externally loaded particle definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefinitionId(pub u32);

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "def#{}", self.0)
    }
}

/// Non-owning reference to an owning character.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerRef(pub u32);

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

/// What the pool needs to know about a resolved definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DefinitionHandle {
    /// The id this handle was resolved from.
    pub id: DefinitionId,
    /// Records using this definition are immune to forced eviction.
    pub protected: bool,
}

impl DefinitionHandle {
    /// Creates an unprotected handle.
    #[inline]
    #[must_use]
    pub const fn new(id: DefinitionId) -> Self {
        Self {
            id,
            protected: false,
        }
    }

    /// Creates a handle immune to forced eviction.
    #[inline]
    #[must_use]
    pub const fn protected(id: DefinitionId) -> Self {
        Self {
            id,
            protected: true,
        }
    }
}

/// Lookup of particle definitions by id.
///
/// Definitions may be unloaded at any time between ticks; a record whose
/// definition stops resolving becomes the first eviction candidate.
pub trait DefinitionStore {
    /// Resolves a definition, or `None` if it is not loaded.
    fn resolve(&self, id: DefinitionId) -> Option<DefinitionHandle>;
}

impl<S: DefinitionStore + ?Sized> DefinitionStore for &S {
    #[inline]
    fn resolve(&self, id: DefinitionId) -> Option<DefinitionHandle> {
        (**self).resolve(id)
    }
}

impl DefinitionStore for HashMap<DefinitionId, DefinitionHandle> {
    #[inline]
    fn resolve(&self, id: DefinitionId) -> Option<DefinitionHandle> {
        self.get(&id).copied()
    }
}

/// Existence check for owning characters.
pub trait OwnerRegistry {
    /// Returns `true` if the owner still exists.
    fn is_alive(&self, owner: OwnerRef) -> bool;
}

impl<R: OwnerRegistry + ?Sized> OwnerRegistry for &R {
    #[inline]
    fn is_alive(&self, owner: OwnerRef) -> bool {
        (**self).is_alive(owner)
    }
}

impl OwnerRegistry for HashSet<OwnerRef> {
    #[inline]
    fn is_alive(&self, owner: OwnerRef) -> bool {
        self.contains(&owner)
    }
}

/// Monotonic frame counter owned by the game loop.
pub trait TickSource {
    /// Current tick. Never decreases.
    fn now(&self) -> u64;
}

impl TickSource for u64 {
    #[inline]
    fn now(&self) -> u64 {
        *self
    }
}

impl<T: TickSource + ?Sized> TickSource for &T {
    #[inline]
    fn now(&self) -> u64 {
        (**self).now()
    }
}
