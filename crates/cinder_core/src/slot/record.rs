//! # Slot Records
//!
//! One record per pool slot. The lifecycle is an explicit state machine:
//!
//! ```text
//!  Free ──┐
//!         ├─(claim)──► Constructing ──(activate)──► Active
//!  Terminated ◄──┐          │                         │
//!                │          └──────(deferred release)─┴──► Waiting
//!                │                                         │
//!                └──── Destructing ◄──────(release)────────┘
//! ```
//!
//! Records never own their definition or owner; both are plain ids that
//! collaborators resolve on demand.

use std::fmt;

use crate::collab::{DefinitionId, OwnerRef, OwnerRegistry};
use crate::error::TransitionError;

/// Lifecycle state of a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotState {
    /// Never used since the pool was built.
    Free,
    /// Handed out by `allocate`, being configured by its caller.
    Constructing,
    /// Live. Visible to scans once switched on.
    Active,
    /// A release was requested during a locked scan and is queued.
    Waiting,
    /// Being torn down by `release`.
    Destructing,
    /// Torn down; the slot is reusable.
    Terminated,
}

impl SlotState {
    /// States between allocation and the end of destruction.
    #[inline]
    #[must_use]
    pub const fn is_allocated(self) -> bool {
        matches!(
            self,
            Self::Constructing | Self::Active | Self::Waiting | Self::Destructing
        )
    }

    /// Allocated and not yet being torn down.
    #[inline]
    #[must_use]
    pub const fn is_defined(self) -> bool {
        matches!(self, Self::Constructing | Self::Active | Self::Waiting)
    }

    /// Lower-case name used in logs and error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Constructing => "constructing",
            Self::Active => "active",
            Self::Waiting => "waiting",
            Self::Destructing => "destructing",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which index list holds a slot, and where.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Membership {
    /// In neither list. Only seen transiently, or after corruption.
    Detached,
    /// In the free list at this position.
    Free(u32),
    /// In the used list at this position.
    Used(u32),
}

impl Membership {
    /// Returns `true` for [`Membership::Used`].
    #[inline]
    #[must_use]
    pub const fn is_used(self) -> bool {
        matches!(self, Self::Used(_))
    }

    /// Returns `true` for [`Membership::Free`].
    #[inline]
    #[must_use]
    pub const fn is_free(self) -> bool {
        matches!(self, Self::Free(_))
    }
}

/// Caller-supplied contents of a freshly allocated record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SlotSetup {
    /// Definition to resolve on demand.
    pub definition: Option<DefinitionId>,
    /// Owning character, if any.
    pub owner: Option<OwnerRef>,
    /// Ticks until the record dies.
    pub lifetime: u32,
    /// Animation frames left to display.
    pub frames: u32,
}

/// A single pool slot.
#[derive(Clone, Debug)]
pub struct Record {
    state: SlotState,
    generation: u32,
    /// Visible to scans.
    on: bool,
    /// Activated during a locked scan; switched on when the scan drains.
    pending_on: bool,
    ghost: bool,
    definition: Option<DefinitionId>,
    owner: Option<OwnerRef>,
    lifetime_remaining: u32,
    frames_remaining: u32,
    pub(crate) membership: Membership,
}

impl Record {
    /// Creates a never-used record.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SlotState::Free,
            generation: 0,
            on: false,
            pending_on: false,
            ghost: false,
            definition: None,
            owner: None,
            lifetime_remaining: 0,
            frames_remaining: 0,
            membership: Membership::Detached,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current lifecycle state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> SlotState {
        self.state
    }

    /// Generation of the current occupancy.
    #[inline]
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// List membership.
    #[inline]
    #[must_use]
    pub const fn membership(&self) -> Membership {
        self.membership
    }

    /// See [`SlotState::is_allocated`].
    #[inline]
    #[must_use]
    pub const fn is_allocated(&self) -> bool {
        self.state.is_allocated()
    }

    /// See [`SlotState::is_defined`].
    #[inline]
    #[must_use]
    pub const fn is_defined(&self) -> bool {
        self.state.is_defined()
    }

    /// Active and switched on: drawn and updated by scans.
    #[inline]
    #[must_use]
    pub const fn is_displayed(&self) -> bool {
        matches!(self.state, SlotState::Active) && self.on
    }

    /// Displayed and not a ghost: takes part in gameplay.
    #[inline]
    #[must_use]
    pub const fn is_in_game(&self) -> bool {
        self.is_displayed() && !self.ghost
    }

    /// Switched on.
    #[inline]
    #[must_use]
    pub const fn is_on(&self) -> bool {
        self.on
    }

    /// Activated during a scan, not yet switched on.
    #[inline]
    #[must_use]
    pub const fn is_pending_on(&self) -> bool {
        self.pending_on
    }

    /// Kept only for display continuity.
    #[inline]
    #[must_use]
    pub const fn is_ghost(&self) -> bool {
        self.ghost
    }

    /// Definition id, if configured.
    #[inline]
    #[must_use]
    pub const fn definition(&self) -> Option<DefinitionId> {
        self.definition
    }

    /// Owner id, if attached.
    #[inline]
    #[must_use]
    pub const fn owner(&self) -> Option<OwnerRef> {
        self.owner
    }

    /// Ticks left to live.
    #[inline]
    #[must_use]
    pub const fn lifetime_remaining(&self) -> u32 {
        self.lifetime_remaining
    }

    /// Animation frames left.
    #[inline]
    #[must_use]
    pub const fn frames_remaining(&self) -> u32 {
        self.frames_remaining
    }

    /// Re-checks the owner against the registry.
    ///
    /// Records without an owner report `false`.
    #[must_use]
    pub fn owner_alive<R: OwnerRegistry + ?Sized>(&self, owners: &R) -> bool {
        self.owner.is_some_and(|owner| owners.is_alive(owner))
    }

    // =========================================================================
    // Caller-side mutation
    // =========================================================================

    /// Fills in a record handed out by `allocate`.
    ///
    /// # Errors
    ///
    /// Fails unless the record is still [`SlotState::Constructing`].
    pub fn configure(&mut self, setup: SlotSetup) -> Result<(), TransitionError> {
        if self.state != SlotState::Constructing {
            return Err(TransitionError {
                from: self.state,
                to: SlotState::Constructing,
            });
        }
        self.definition = setup.definition;
        self.owner = setup.owner;
        self.lifetime_remaining = setup.lifetime;
        self.frames_remaining = setup.frames;
        Ok(())
    }

    /// Counts the lifetime down, returning `true` once it reaches zero.
    pub fn count_down_lifetime(&mut self, ticks: u32) -> bool {
        self.lifetime_remaining = self.lifetime_remaining.saturating_sub(ticks);
        self.lifetime_remaining == 0
    }

    /// Counts animation frames down, returning `true` once none remain.
    pub fn count_down_frames(&mut self, frames: u32) -> bool {
        self.frames_remaining = self.frames_remaining.saturating_sub(frames);
        self.frames_remaining == 0
    }

    /// Turns a defined record into a ghost: logically dead, still drawn.
    ///
    /// Has no effect on records that are not defined.
    pub fn make_ghost(&mut self) {
        if self.is_defined() {
            self.ghost = true;
            self.lifetime_remaining = 0;
        }
    }

    /// Forgets the owner, e.g. after it died.
    pub fn detach_owner(&mut self) {
        self.owner = None;
    }

    /// Terminates the record without telling the pool.
    ///
    /// This is how per-entry update code kills records directly. The slot
    /// stays in the used list until the pool's next `reconcile` moves it
    /// back to the free list.
    pub fn terminate_in_place(&mut self) {
        self.clear();
        self.state = SlotState::Terminated;
    }

    // =========================================================================
    // Pool-side transitions
    // =========================================================================

    /// Starts a new occupancy from any state, returning the state it left.
    ///
    /// Any previous contents are discarded and the generation advances,
    /// so outstanding references to the old occupant go stale.
    pub(crate) fn claim(&mut self) -> SlotState {
        let previous = self.state;
        self.clear();
        self.generation = self.generation.wrapping_add(1);
        self.state = SlotState::Constructing;
        previous
    }

    /// Constructing → Active. Visible immediately unless `deferred`.
    pub(crate) fn activate(&mut self, deferred: bool) -> Result<(), TransitionError> {
        if self.state != SlotState::Constructing {
            return Err(TransitionError {
                from: self.state,
                to: SlotState::Active,
            });
        }
        self.state = SlotState::Active;
        self.on = !deferred;
        self.pending_on = deferred;
        Ok(())
    }

    /// Applies a deferred activation.
    pub(crate) fn turn_on(&mut self) -> bool {
        if !self.pending_on {
            return false;
        }
        self.pending_on = false;
        self.on = true;
        true
    }

    /// Marks a deferred release.
    pub(crate) fn mark_waiting(&mut self) -> Result<(), TransitionError> {
        match self.state {
            SlotState::Constructing | SlotState::Active | SlotState::Waiting => {
                self.state = SlotState::Waiting;
                Ok(())
            }
            from => Err(TransitionError {
                from,
                to: SlotState::Waiting,
            }),
        }
    }

    /// Allocated → Destructing → Terminated.
    pub(crate) fn deconstruct(&mut self) -> Result<(), TransitionError> {
        if !self.is_allocated() {
            return Err(TransitionError {
                from: self.state,
                to: SlotState::Destructing,
            });
        }
        self.state = SlotState::Destructing;
        self.clear();
        self.state = SlotState::Terminated;
        Ok(())
    }

    /// Resets everything but state, generation and membership.
    fn clear(&mut self) {
        self.on = false;
        self.pending_on = false;
        self.ghost = false;
        self.definition = None;
        self.owner = None;
        self.lifetime_remaining = 0;
        self.frames_remaining = 0;
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}
