//! # Deferred Mutation Queues
//!
//! While a scan holds the pool locked, activations and terminations are
//! parked here instead of touching the index lists. The outermost scan
//! guard drains both queues on exit: activations first, then terminations.

use crate::error::{PoolError, PoolResult, QueueKind};

use super::handle::SlotRef;

/// Lock depth plus the two bounded queues.
///
/// Both queues are pre-allocated to their bound; pushing never allocates.
#[derive(Debug)]
pub struct DeferredQueues {
    lock_count: u32,
    activations: Vec<SlotRef>,
    terminations: Vec<SlotRef>,
    activation_capacity: usize,
    termination_capacity: usize,
}

impl DeferredQueues {
    /// Creates empty queues with the given bounds.
    #[must_use]
    pub fn new(activation_capacity: usize, termination_capacity: usize) -> Self {
        Self {
            lock_count: 0,
            activations: Vec::with_capacity(activation_capacity),
            terminations: Vec::with_capacity(termination_capacity),
            activation_capacity,
            termination_capacity,
        }
    }

    /// Current scan nesting depth.
    #[inline]
    #[must_use]
    pub const fn lock_count(&self) -> u32 {
        self.lock_count
    }

    /// Whether any scan is in progress.
    #[inline]
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.lock_count > 0
    }

    /// Queued activations.
    #[inline]
    #[must_use]
    pub fn pending_activations(&self) -> usize {
        self.activations.len()
    }

    /// Queued terminations.
    #[inline]
    #[must_use]
    pub fn pending_terminations(&self) -> usize {
        self.terminations.len()
    }

    pub(crate) fn lock(&mut self) {
        self.lock_count += 1;
    }

    /// Leaves one scan level, returning the remaining depth.
    pub(crate) fn unlock(&mut self) -> u32 {
        if self.lock_count == 0 {
            tracing::warn!("scan unlock without a matching lock");
            return 0;
        }
        self.lock_count -= 1;
        self.lock_count
    }

    pub(crate) fn push_activation(&mut self, slot: SlotRef) -> PoolResult<()> {
        push_bounded(
            &mut self.activations,
            self.activation_capacity,
            slot,
            QueueKind::Activation,
        )
    }

    pub(crate) fn push_termination(&mut self, slot: SlotRef) -> PoolResult<()> {
        push_bounded(
            &mut self.terminations,
            self.termination_capacity,
            slot,
            QueueKind::Termination,
        )
    }

    /// Moves the activation queue out, leaving an empty one behind.
    ///
    /// Hand the vector back with [`Self::restore_activations`] so its
    /// allocation is reused.
    pub(crate) fn take_activations(&mut self) -> Vec<SlotRef> {
        std::mem::take(&mut self.activations)
    }

    pub(crate) fn restore_activations(&mut self, mut queue: Vec<SlotRef>) {
        queue.clear();
        self.activations = queue;
    }

    /// Moves the termination queue out. See [`Self::take_activations`].
    pub(crate) fn take_terminations(&mut self) -> Vec<SlotRef> {
        std::mem::take(&mut self.terminations)
    }

    pub(crate) fn restore_terminations(&mut self, mut queue: Vec<SlotRef>) {
        queue.clear();
        self.terminations = queue;
    }
}

fn push_bounded(
    queue: &mut Vec<SlotRef>,
    capacity: usize,
    slot: SlotRef,
    kind: QueueKind,
) -> PoolResult<()> {
    if queue.len() >= capacity {
        return Err(PoolError::QueueFull {
            queue: kind,
            capacity,
        });
    }
    queue.push(slot);
    Ok(())
}
