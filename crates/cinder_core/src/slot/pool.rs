//! # Slot Pool
//!
//! Fixed-capacity record array partitioned by two index lists.
//!
//! ```text
//!   records: [ R0 | R1 | R2 | R3 | R4 | R5 ]
//!
//!   used:    [ 4, 0, 2 ]      ◄─ swap-remove on release, push on allocate
//!   free:    [ 5, 3, 1 ]      ◄─ pop on allocate, push on release
//! ```
//!
//! Every record remembers its list and position ([`Membership`]), so all
//! list moves are O(1). `update_guid` increases on every list change;
//! cached [`UsedRange`]s from an older guid no longer resolve.

use crate::collab::DefinitionStore;
use crate::config::PoolConfig;
use crate::error::{ConfigError, PoolError, PoolResult, TransitionError};

use super::deferred::DeferredQueues;
use super::guard::ScanGuard;
use super::handle::SlotRef;
use super::policy::{self, VictimReason};
use super::record::{Membership, Record, SlotState};

/// Whether a request took effect now or was queued behind a scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Applied immediately.
    Applied,
    /// Queued; applied when the outermost scan ends.
    Deferred,
}

/// A cached prefix of the used list, valid for one `update_guid`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UsedRange {
    guid: u64,
    len: usize,
}

impl UsedRange {
    /// The guid this range was taken at.
    #[inline]
    #[must_use]
    pub const fn guid(&self) -> u64 {
        self.guid
    }

    /// Number of indices in the range.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the range is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Fixed-capacity pool of slot records.
///
/// # Thread Safety
///
/// The pool is driven from a single update thread. Scan locking guards
/// against re-entrant calls from visitors, not against other threads.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool = SlotPool::new(4);
/// let slot = pool.allocate(false, &definitions)?;
/// pool.activate(slot)?;
/// assert_eq!(pool.used_count(), 1);
///
/// pool.release(slot)?;
/// assert_eq!(pool.free_count(), 4);
/// ```
pub struct SlotPool {
    records: Box<[Record]>,
    free: Vec<u32>,
    used: Vec<u32>,
    deferred: DeferredQueues,
    free_reserve: usize,
    update_guid: u64,
}

impl SlotPool {
    /// Creates a pool with `capacity` slots, no reserve, and queues as
    /// large as the pool.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or does not fit a 32-bit slot index.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        assert!(
            capacity < PoolConfig::MAX_CAPACITY,
            "Capacity must fit a 32-bit slot index"
        );
        Self::build(&PoolConfig::new(capacity))
    }

    /// Creates a pool from a validated config.
    ///
    /// # Errors
    ///
    /// Returns the config's validation error.
    pub fn with_config(config: &PoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: &PoolConfig) -> Self {
        let capacity = config.capacity;
        let records = (0..capacity)
            .map(|_| Record::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let mut pool = Self {
            records,
            free: Vec::with_capacity(capacity),
            used: Vec::with_capacity(capacity),
            deferred: DeferredQueues::new(
                config.activation_capacity(),
                config.termination_capacity(),
            ),
            free_reserve: config.free_reserve,
            update_guid: 0,
        };

        // Reversed so that allocation hands out index 0 first.
        for index in (0..list_position(capacity)).rev() {
            pool.push_free(index);
        }
        pool
    }

    // =========================================================================
    // Counters
    // =========================================================================

    /// Total slot count.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    /// Slots in the used list.
    #[inline]
    #[must_use]
    pub fn used_count(&self) -> usize {
        self.used.len()
    }

    /// Slots in the free list.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Free slots withheld from non-forced requests.
    #[inline]
    #[must_use]
    pub const fn free_reserve(&self) -> usize {
        self.free_reserve
    }

    /// Structural change counter.
    #[inline]
    #[must_use]
    pub const fn update_guid(&self) -> u64 {
        self.update_guid
    }

    /// Current scan nesting depth.
    #[inline]
    #[must_use]
    pub const fn lock_count(&self) -> u32 {
        self.deferred.lock_count()
    }

    /// Whether a scan is in progress.
    #[inline]
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.deferred.is_locked()
    }

    /// Activations waiting for the current scan to end.
    #[inline]
    #[must_use]
    pub fn pending_activation_count(&self) -> usize {
        self.deferred.pending_activations()
    }

    /// Terminations waiting for the current scan to end.
    #[inline]
    #[must_use]
    pub fn pending_termination_count(&self) -> usize {
        self.deferred.pending_terminations()
    }

    // =========================================================================
    // Access
    // =========================================================================

    /// Looks up an allocated record by reference.
    ///
    /// Returns `None` for out-of-range, unallocated, or stale references.
    #[must_use]
    pub fn get(&self, slot: SlotRef) -> Option<&Record> {
        let index = self.resolve(slot).ok()?;
        self.records.get(index as usize)
    }

    /// Mutable variant of [`Self::get`].
    pub fn get_mut(&mut self, slot: SlotRef) -> Option<&mut Record> {
        let index = self.resolve(slot).ok()?;
        self.records.get_mut(index as usize)
    }

    /// Raw record by index, whatever its state.
    #[inline]
    #[must_use]
    pub fn record(&self, index: u32) -> Option<&Record> {
        self.records.get(index as usize)
    }

    /// All records, in slot order.
    #[inline]
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Current reference for an allocated index.
    #[must_use]
    pub fn slot_ref(&self, index: u32) -> Option<SlotRef> {
        let record = self.records.get(index as usize)?;
        record
            .is_allocated()
            .then(|| SlotRef::new(index, record.generation()))
    }

    /// Whether `slot` still names the current occupant of its slot.
    #[inline]
    #[must_use]
    pub fn is_current(&self, slot: SlotRef) -> bool {
        self.resolve(slot).is_ok()
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Hands out a slot in the [`SlotState::Constructing`] state.
    ///
    /// Free slots are used while more than the reserve remain; after that
    /// only forced requests get them. With no free slot left, a forced
    /// request recycles a victim chosen by [`policy::select_victim`]. The
    /// returned slot is already tracked in the used list.
    ///
    /// # Errors
    ///
    /// [`PoolError::Exhausted`] for unforced requests that cannot be
    /// served, [`PoolError::NoVictim`] if forcing finds every record
    /// protected.
    pub fn allocate<D>(&mut self, force: bool, definitions: &D) -> PoolResult<SlotRef>
    where
        D: DefinitionStore + ?Sized,
    {
        let free = self.free.len();
        let (index, recycled) = if free > 0 && (force || free > self.free_reserve) {
            let index = self.pop_free().ok_or_else(|| self.exhausted())?;
            (index, false)
        } else if force {
            (self.evict(definitions)?, true)
        } else {
            return Err(self.exhausted());
        };

        let record = &mut self.records[index as usize];
        let previous = record.claim();
        let generation = record.generation();
        let tracked = record.membership.is_used();
        if previous.is_allocated() && !recycled {
            tracing::warn!(index, state = %previous, "free list held an allocated slot");
        }

        if !tracked {
            self.detach(index);
            self.push_used(index);
        }
        self.check_integrity();

        let slot = SlotRef::new(index, generation);
        tracing::trace!(%slot, recycled, "slot allocated");
        Ok(slot)
    }

    fn evict<D>(&mut self, definitions: &D) -> PoolResult<u32>
    where
        D: DefinitionStore + ?Sized,
    {
        let victim = policy::select_victim(&self.records, definitions).ok_or(
            PoolError::NoVictim {
                capacity: self.capacity(),
            },
        )?;

        match victim.reason {
            VictimReason::Inconsistent | VictimReason::Unresolved => {
                tracing::warn!(index = victim.index, reason = ?victim.reason, "recycling broken slot");
            }
            VictimReason::Waiting | VictimReason::ShortestLived => {
                tracing::debug!(index = victim.index, reason = ?victim.reason, "evicting slot under pressure");
            }
        }
        Ok(victim.index)
    }

    fn exhausted(&self) -> PoolError {
        PoolError::Exhausted {
            capacity: self.capacity(),
            free: self.free.len(),
            reserve: self.free_reserve,
        }
    }

    /// Makes a constructed record live.
    ///
    /// During a scan the record becomes [`SlotState::Active`] but stays
    /// invisible to scans until the deferred queues drain.
    ///
    /// # Errors
    ///
    /// Reference errors as for [`Self::release`],
    /// [`PoolError::InvalidTransition`] unless the record is constructing,
    /// [`PoolError::QueueFull`] if the activation cannot be queued (the
    /// record is left constructing).
    pub fn activate(&mut self, slot: SlotRef) -> PoolResult<Outcome> {
        let index = self.resolve(slot)?;
        let state = self.records[index as usize].state();
        if state != SlotState::Constructing {
            return Err(PoolError::InvalidTransition {
                index,
                source: TransitionError {
                    from: state,
                    to: SlotState::Active,
                },
            });
        }

        let deferred = self.deferred.is_locked();
        if deferred {
            self.deferred.push_activation(slot)?;
        }
        self.records[index as usize]
            .activate(deferred)
            .map_err(|source| PoolError::InvalidTransition { index, source })?;

        Ok(if deferred {
            Outcome::Deferred
        } else {
            Outcome::Applied
        })
    }

    /// Returns a slot to the free list.
    ///
    /// During a scan the record is marked [`SlotState::Waiting`] and the
    /// release is queued. Releasing a waiting record again is a no-op.
    ///
    /// # Errors
    ///
    /// [`PoolError::InvalidIndex`] for out-of-range or unallocated slots
    /// (including a second release of the same reference),
    /// [`PoolError::StaleRef`] if the slot was recycled,
    /// [`PoolError::QueueFull`] if the release cannot be queued (the record
    /// stays alive and can be released next tick).
    pub fn release(&mut self, slot: SlotRef) -> PoolResult<Outcome> {
        let index = self.resolve(slot)?;

        if self.deferred.is_locked() {
            if self.records[index as usize].state() == SlotState::Waiting {
                return Ok(Outcome::Deferred);
            }
            self.deferred.push_termination(slot)?;
            self.records[index as usize]
                .mark_waiting()
                .map_err(|source| PoolError::InvalidTransition { index, source })?;
            return Ok(Outcome::Deferred);
        }

        self.records[index as usize]
            .deconstruct()
            .map_err(|source| PoolError::InvalidTransition { index, source })?;
        self.detach(index);
        self.push_free(index);
        self.check_integrity();

        tracing::trace!(%slot, "slot released");
        Ok(Outcome::Applied)
    }

    /// Terminates every allocated record and rebuilds both lists.
    ///
    /// Returns `false` (and does nothing) while a scan is in progress.
    pub fn clear(&mut self) -> bool {
        if self.deferred.is_locked() {
            tracing::warn!("pool clear requested during a scan, ignored");
            return false;
        }
        for record in self.records.iter_mut().filter(|record| record.is_allocated()) {
            record.terminate_in_place();
        }
        self.rebuild()
    }

    fn resolve(&self, slot: SlotRef) -> PoolResult<u32> {
        let index = slot.index();
        let record = self
            .records
            .get(slot.slot())
            .filter(|record| record.is_allocated())
            .ok_or(PoolError::InvalidIndex { index })?;

        if record.generation() != slot.generation() {
            return Err(PoolError::StaleRef {
                index,
                expected: record.generation(),
                found: slot.generation(),
            });
        }
        Ok(index)
    }

    // =========================================================================
    // Scanning
    // =========================================================================

    /// Locks the pool until the returned guard is dropped.
    pub fn scan(&mut self) -> ScanGuard<'_> {
        ScanGuard::new(self)
    }

    /// Visits every displayed record under a scan lock.
    ///
    /// The visitor may allocate, activate and release through the pool it
    /// is handed; releases and activations are applied after the last
    /// visit. Records allocated during the scan are not visited. Returns
    /// the number of visits.
    pub fn for_each_active<F>(&mut self, mut visit: F) -> usize
    where
        F: FnMut(&mut SlotPool, SlotRef),
    {
        let mut scan = self.scan();
        let mut cursor = 0;
        let mut visited = 0;

        // The used list only grows while locked, so positions are stable.
        while let Some(&index) = scan.used.get(cursor) {
            cursor += 1;
            let record = &scan.records[index as usize];
            if !record.is_displayed() {
                continue;
            }
            let slot = SlotRef::new(index, record.generation());
            visit(&mut *scan, slot);
            visited += 1;
        }
        visited
    }

    /// Lazily yields every displayed record, ghosts included.
    pub fn iter_active(&self) -> impl Iterator<Item = SlotRef> + '_ {
        self.used.iter().filter_map(move |&index| {
            let record = &self.records[index as usize];
            record
                .is_displayed()
                .then(|| SlotRef::new(index, record.generation()))
        })
    }

    /// Lazily yields displayed records that are not ghosts.
    pub fn iter_in_game(&self) -> impl Iterator<Item = SlotRef> + '_ {
        self.used.iter().filter_map(move |&index| {
            let record = &self.records[index as usize];
            record
                .is_in_game()
                .then(|| SlotRef::new(index, record.generation()))
        })
    }

    /// Lazily yields every used slot, whatever its state.
    pub fn iter_used(&self) -> impl Iterator<Item = SlotRef> + '_ {
        self.used
            .iter()
            .map(move |&index| SlotRef::new(index, self.records[index as usize].generation()))
    }

    /// Captures the current used list for later reuse.
    #[must_use]
    pub fn used_range(&self) -> UsedRange {
        UsedRange {
            guid: self.update_guid,
            len: self.used.len(),
        }
    }

    /// Resolves a cached range, or `None` if the lists changed since.
    #[must_use]
    pub fn resolve_range(&self, range: UsedRange) -> Option<&[u32]> {
        (range.guid == self.update_guid).then(|| &self.used[..range.len])
    }

    pub(crate) fn enter_scan(&mut self) {
        self.deferred.lock();
    }

    pub(crate) fn exit_scan(&mut self) {
        if self.deferred.unlock() == 0 {
            self.drain_deferred();
        }
    }

    /// Applies queued activations, then queued terminations.
    ///
    /// Queued references whose slot was recycled during the scan are
    /// dropped.
    fn drain_deferred(&mut self) {
        let mut activated = 0usize;
        let mut freed = 0usize;
        let mut dropped = 0usize;

        let activations = self.deferred.take_activations();
        for &slot in &activations {
            match self.get_mut(slot) {
                Some(record) => {
                    if record.turn_on() {
                        activated += 1;
                    }
                }
                None => dropped += 1,
            }
        }
        self.deferred.restore_activations(activations);

        let terminations = self.deferred.take_terminations();
        for &slot in &terminations {
            match self.release(slot) {
                Ok(_) => freed += 1,
                Err(error) => {
                    dropped += 1;
                    tracing::trace!(%slot, %error, "dropped deferred termination");
                }
            }
        }
        self.deferred.restore_terminations(terminations);

        if activated + freed + dropped > 0 {
            tracing::debug!(activated, freed, dropped, "drained deferred slot mutations");
        }
    }

    // =========================================================================
    // Self-healing
    // =========================================================================

    /// Moves every slot into the list its state calls for.
    ///
    /// Repairs divergence left by code that changed record state directly
    /// (see [`Record::terminate_in_place`]). Idempotent and O(capacity);
    /// `update_guid` only changes if something moved. Skipped while a scan
    /// is in progress. Returns the number of slots moved.
    pub fn reconcile(&mut self) -> usize {
        if self.deferred.is_locked() {
            tracing::trace!("reconcile skipped: pool is locked");
            return 0;
        }

        let mut moved = 0;

        // Prune the used list of records that are no longer allocated.
        let mut position = 0;
        while let Some(&index) = self.used.get(position) {
            if self.records[index as usize].is_allocated() {
                position += 1;
                continue;
            }
            swap_remove_entry(&mut self.used, &mut self.records, position, Membership::Used);
            self.bump();
            if self.records[index as usize].membership == Membership::Detached {
                self.push_free(index);
            }
            moved += 1;
        }

        // Prune the free list of records that are allocated.
        let mut position = 0;
        while let Some(&index) = self.free.get(position) {
            if !self.records[index as usize].is_allocated() {
                position += 1;
                continue;
            }
            swap_remove_entry(&mut self.free, &mut self.records, position, Membership::Free);
            self.bump();
            if self.records[index as usize].membership == Membership::Detached {
                self.push_used(index);
            }
            moved += 1;
        }

        // Catch anything that fell out of both lists.
        for index in 0..list_position(self.records.len()) {
            let record = &self.records[index as usize];
            let allocated = record.is_allocated();
            let placed = if allocated {
                record.membership.is_used()
            } else {
                record.membership.is_free()
            };
            if placed {
                continue;
            }
            self.detach(index);
            if allocated {
                self.push_used(index);
            } else {
                self.push_free(index);
            }
            moved += 1;
        }

        if moved > 0 {
            tracing::debug!(moved, guid = self.update_guid, "reconciled slot lists");
        }
        self.check_integrity();
        moved
    }

    /// Rebuilds both lists from record states alone.
    ///
    /// Returns `false` (and does nothing) while a scan is in progress.
    pub fn rebuild(&mut self) -> bool {
        if self.deferred.is_locked() {
            tracing::warn!("slot list rebuild requested during a scan, ignored");
            return false;
        }

        self.free.clear();
        self.used.clear();
        for record in self.records.iter_mut() {
            record.membership = Membership::Detached;
        }

        let capacity = list_position(self.records.len());
        for index in 0..capacity {
            if self.records[index as usize].is_allocated() {
                self.push_used(index);
            }
        }
        for index in (0..capacity).rev() {
            if !self.records[index as usize].is_allocated() {
                self.push_free(index);
            }
        }
        true
    }

    /// Full consistency check.
    ///
    /// Both lists must cover every slot exactly once, agree with each
    /// record's membership, and match each record's liveness. Returns
    /// `false` between an in-place termination and the next reconcile.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        if self.free.len() + self.used.len() != self.capacity() {
            return false;
        }
        let agrees = |list: &[u32], tag: fn(u32) -> Membership| {
            list.iter().enumerate().all(|(position, &index)| {
                self.records
                    .get(index as usize)
                    .is_some_and(|record| record.membership == tag(list_position(position)))
            })
        };
        agrees(&self.free, Membership::Free)
            && agrees(&self.used, Membership::Used)
            && self
                .records
                .iter()
                .all(|record| record.is_allocated() == record.membership.is_used())
    }

    fn check_integrity(&mut self) {
        if self.deferred.is_locked() {
            return;
        }
        if self.free.len() + self.used.len() != self.capacity() {
            tracing::warn!(
                free = self.free.len(),
                used = self.used.len(),
                capacity = self.capacity(),
                "slot lists out of balance, rebuilding"
            );
            self.rebuild();
        }
    }

    // =========================================================================
    // List primitives
    // =========================================================================

    fn bump(&mut self) {
        self.update_guid += 1;
    }

    fn push_free(&mut self, index: u32) {
        let position = list_position(self.free.len());
        self.free.push(index);
        self.records[index as usize].membership = Membership::Free(position);
        self.bump();
    }

    fn push_used(&mut self, index: u32) {
        let position = list_position(self.used.len());
        self.used.push(index);
        self.records[index as usize].membership = Membership::Used(position);
        self.bump();
    }

    fn pop_free(&mut self) -> Option<u32> {
        let index = self.free.pop()?;
        self.records[index as usize].membership = Membership::Detached;
        self.bump();
        Some(index)
    }

    /// Takes a slot out of whichever list holds it.
    fn detach(&mut self, index: u32) {
        let (list, position, tag): (&mut Vec<u32>, u32, fn(u32) -> Membership) =
            match self.records[index as usize].membership {
                Membership::Detached => return,
                Membership::Free(position) => {
                    (&mut self.free, position, Membership::Free as fn(u32) -> Membership)
                }
                Membership::Used(position) => {
                    (&mut self.used, position, Membership::Used as fn(u32) -> Membership)
                }
            };

        let found = if list.get(position as usize) == Some(&index) {
            Some(position as usize)
        } else {
            list.iter().position(|&entry| entry == index)
        };
        if let Some(position) = found {
            swap_remove_entry(list, &mut self.records, position, tag);
        }
        self.records[index as usize].membership = Membership::Detached;
        self.bump();
    }
}

/// Swap-removes `list[position]`, fixing the membership of the entry that
/// moves into its place. Returns the removed index.
fn swap_remove_entry(
    list: &mut Vec<u32>,
    records: &mut [Record],
    position: usize,
    tag: fn(u32) -> Membership,
) -> u32 {
    let index = list.swap_remove(position);
    let slot = tag(list_position(position));
    if let Some(&moved) = list.get(position) {
        records[moved as usize].membership = slot;
    }
    if records[index as usize].membership == slot {
        records[index as usize].membership = Membership::Detached;
    }
    index
}

/// List positions and indices are bounded by capacity, which fits `u32`.
#[inline]
fn list_position(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::collab::{DefinitionHandle, DefinitionId};
    use crate::slot::record::SlotSetup;

    use super::*;

    type Defs = HashMap<DefinitionId, DefinitionHandle>;

    fn spawn(pool: &mut SlotPool, defs: &Defs, lifetime: u32) -> SlotRef {
        let slot = pool.allocate(false, defs).unwrap();
        pool.get_mut(slot)
            .unwrap()
            .configure(SlotSetup {
                lifetime,
                frames: lifetime,
                ..SlotSetup::default()
            })
            .unwrap();
        pool.activate(slot).unwrap();
        slot
    }

    #[test]
    fn test_allocation_hands_out_lowest_index_first() {
        let defs = Defs::new();
        let mut pool = SlotPool::new(3);
        let indices: Vec<u32> = (0..3)
            .map(|_| pool.allocate(false, &defs).unwrap().index())
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_swap_remove_keeps_positions_in_sync() {
        let defs = Defs::new();
        let mut pool = SlotPool::new(5);
        let slots: Vec<SlotRef> = (0..5).map(|_| spawn(&mut pool, &defs, 10)).collect();

        pool.release(slots[1]).unwrap();
        pool.release(slots[0]).unwrap();
        assert!(pool.is_consistent());
        assert_eq!(pool.used_count(), 3);

        let again = pool.allocate(false, &defs).unwrap();
        assert_eq!(again.index(), 0);
        assert_eq!(again.generation(), 2);
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_reserve_blocks_only_unforced_requests() {
        let defs = Defs::new();
        let config = PoolConfig::new(8).with_quarter_reserve();
        let mut pool = SlotPool::with_config(&config).unwrap();

        for _ in 0..6 {
            pool.allocate(false, &defs).unwrap();
        }
        assert_eq!(pool.free_count(), 2);
        assert_eq!(
            pool.allocate(false, &defs),
            Err(PoolError::Exhausted {
                capacity: 8,
                free: 2,
                reserve: 2
            })
        );

        let forced = pool.allocate(true, &defs).unwrap();
        assert_eq!(forced.index(), 6);
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn test_forced_recycle_keeps_slot_in_used_list() {
        let defs = Defs::new();
        let mut pool = SlotPool::new(2);
        let long = spawn(&mut pool, &defs, 50);
        let short = spawn(&mut pool, &defs, 5);
        let guid = pool.update_guid();

        let recycled = pool.allocate(true, &defs).unwrap();
        assert_eq!(recycled.index(), short.index());
        assert_eq!(recycled.generation(), short.generation() + 1);
        assert_eq!(pool.update_guid(), guid);
        assert!(pool.get(short).is_none());
        assert!(pool.get(long).is_some());
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_stale_and_invalid_references() {
        let defs = Defs::new();
        let mut pool = SlotPool::new(1);
        let first = spawn(&mut pool, &defs, 1);
        pool.release(first).unwrap();
        let second = spawn(&mut pool, &defs, 1);

        assert_eq!(
            pool.release(first),
            Err(PoolError::StaleRef {
                index: 0,
                expected: second.generation(),
                found: first.generation()
            })
        );
        assert_eq!(
            pool.release(SlotRef::new(9, 1)),
            Err(PoolError::InvalidIndex { index: 9 })
        );
        assert_eq!(
            pool.release(SlotRef::NULL),
            Err(PoolError::InvalidIndex { index: u32::MAX })
        );
    }

    #[test]
    fn test_activate_requires_constructing() {
        let defs = Defs::new();
        let mut pool = SlotPool::new(2);
        let slot = spawn(&mut pool, &defs, 3);
        assert!(matches!(
            pool.activate(slot),
            Err(PoolError::InvalidTransition { index: 0, .. })
        ));
    }

    #[test]
    fn test_reconcile_returns_terminated_records_to_free_list() {
        let defs = Defs::new();
        let mut pool = SlotPool::new(4);
        let a = spawn(&mut pool, &defs, 3);
        let b = spawn(&mut pool, &defs, 3);

        pool.get_mut(a).unwrap().terminate_in_place();
        assert!(!pool.is_consistent());
        assert_eq!(pool.used_count(), 2);

        assert_eq!(pool.reconcile(), 1);
        assert!(pool.is_consistent());
        assert_eq!(pool.used_count(), 1);
        assert!(pool.get(b).is_some());

        let guid = pool.update_guid();
        assert_eq!(pool.reconcile(), 0);
        assert_eq!(pool.update_guid(), guid);
    }

    #[test]
    fn test_reconcile_reattaches_detached_slots() {
        let defs = Defs::new();
        let mut pool = SlotPool::new(3);
        let slot = spawn(&mut pool, &defs, 3);

        // Simulate lost bookkeeping for an allocated and a free slot.
        pool.detach(slot.index());
        pool.detach(2);
        assert_eq!(pool.used_count() + pool.free_count(), 1);

        assert_eq!(pool.reconcile(), 2);
        assert!(pool.is_consistent());
        assert!(pool.get(slot).unwrap().membership().is_used());
    }

    #[test]
    fn test_rebuild_from_ground_truth() {
        let defs = Defs::new();
        let mut pool = SlotPool::new(4);
        spawn(&mut pool, &defs, 3);
        spawn(&mut pool, &defs, 3);

        pool.used.clear();
        assert!(!pool.is_consistent());
        // The next structural operation notices the imbalance.
        spawn(&mut pool, &defs, 3);
        assert!(pool.is_consistent());
        assert_eq!(pool.used_count(), 3);
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn test_cached_range_goes_stale() {
        let defs = Defs::new();
        let mut pool = SlotPool::new(4);
        spawn(&mut pool, &defs, 3);

        let range = pool.used_range();
        assert_eq!(pool.resolve_range(range), Some(&[0u32][..]));

        spawn(&mut pool, &defs, 3);
        assert_eq!(pool.resolve_range(range), None);
        assert_eq!(pool.resolve_range(pool.used_range()).map(<[u32]>::len), Some(2));
    }

    #[test]
    fn test_clear_terminates_everything() {
        let defs = Defs::new();
        let mut pool = SlotPool::new(3);
        let slot = spawn(&mut pool, &defs, 3);
        spawn(&mut pool, &defs, 3);

        assert!(pool.clear());
        assert_eq!(pool.free_count(), 3);
        assert!(pool.get(slot).is_none());
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_iterators_filter_by_visibility() {
        let defs = Defs::new();
        let mut pool = SlotPool::new(4);
        let shown = spawn(&mut pool, &defs, 3);
        let ghost = spawn(&mut pool, &defs, 3);
        let building = pool.allocate(false, &defs).unwrap();
        pool.get_mut(ghost).unwrap().make_ghost();

        let active: Vec<SlotRef> = pool.iter_active().collect();
        assert_eq!(active, vec![shown, ghost]);
        let in_game: Vec<SlotRef> = pool.iter_in_game().collect();
        assert_eq!(in_game, vec![shown]);
        assert_eq!(pool.iter_used().count(), 3);
        assert!(pool.iter_used().any(|slot| slot == building));
    }
}
