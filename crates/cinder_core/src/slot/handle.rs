//! # Slot References
//!
//! Callers never hold a record, only a [`SlotRef`]. The pool checks the
//! generation on every lookup, so a reference kept past a release or a
//! forced eviction resolves to nothing instead of to whoever moved in.
//!
//! ```text
//!  63            32 31             0
//! ┌────────────────┬────────────────┐
//! │   generation   │     index      │
//! └────────────────┴────────────────┘
//! ```

use std::fmt;

/// One occupancy of one pool slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SlotRef(u64);

impl SlotRef {
    /// Never handed out by a pool; `index` is `u32::MAX`, past any capacity.
    pub const NULL: Self = Self(u64::MAX);

    /// Packs a slot index with the generation the slot had when claimed.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Position in the pool's record array.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// [`Self::index`] widened for slice indexing.
    #[inline]
    #[must_use]
    pub const fn slot(self) -> usize {
        self.index() as usize
    }

    /// Claim count of the slot at the time this reference was issued.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// `true` for [`Self::NULL`].
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == Self::NULL.0
    }
}

impl Default for SlotRef {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("slot#null")
        } else {
            write!(f, "slot#{}@{}", self.index(), self.generation())
        }
    }
}
