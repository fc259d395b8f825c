//! # Pool Error Types
//!
//! All errors that can occur while allocating, releasing, or configuring
//! slots. None of them are fatal: the worst outcome is a dropped effect.

use std::fmt;

use thiserror::Error;

use crate::slot::SlotState;

/// Which deferred queue an operation targeted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// Activations requested during a locked scan.
    Activation,
    /// Terminations requested during a locked scan.
    Termination,
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activation => f.write_str("activation"),
            Self::Termination => f.write_str("termination"),
        }
    }
}

/// A record was asked to make a lifecycle move its state does not allow.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("illegal slot transition: {from} -> {to}")]
pub struct TransitionError {
    /// State the record was in.
    pub from: SlotState,
    /// State the caller asked for.
    pub to: SlotState,
}

/// Errors that can occur in the slot pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// No free slot can be handed out without forcing.
    #[error("pool exhausted: {free} free of {capacity}, {reserve} held in reserve")]
    Exhausted {
        /// Total slot count.
        capacity: usize,
        /// Free slots at the time of the request.
        free: usize,
        /// Free slots withheld from non-forced requests.
        reserve: usize,
    },

    /// Forced allocation found nothing it was allowed to evict.
    #[error("no evictable slot among {capacity}: every record is protected")]
    NoVictim {
        /// Total slot count.
        capacity: usize,
    },

    /// Index out of range, or the slot is not allocated.
    #[error("invalid slot index {index}")]
    InvalidIndex {
        /// The offending index.
        index: u32,
    },

    /// The slot was recycled since the reference was handed out.
    #[error("stale slot reference {index}: generation {found}, slot is at {expected}")]
    StaleRef {
        /// The slot index.
        index: u32,
        /// Current generation of the slot.
        expected: u32,
        /// Generation carried by the reference.
        found: u32,
    },

    /// A deferred queue is at capacity; the request is dropped for this tick.
    #[error("{queue} queue full ({capacity} entries)")]
    QueueFull {
        /// The queue that overflowed.
        queue: QueueKind,
        /// Its capacity.
        capacity: usize,
    },

    /// A lifecycle move the record's state does not allow.
    #[error("slot {index}: {source}")]
    InvalidTransition {
        /// The slot index.
        index: u32,
        /// The rejected move.
        #[source]
        source: TransitionError,
    },
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors raised while loading or validating a [`PoolConfig`](crate::PoolConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The TOML document could not be parsed.
    #[error("failed to parse pool config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Capacity is zero or does not fit a slot index.
    #[error("pool capacity must be in 1..={max}, got {capacity}")]
    Capacity {
        /// Requested capacity.
        capacity: usize,
        /// Largest capacity a slot index can address.
        max: usize,
    },

    /// The reserve would swallow the whole pool.
    #[error("free reserve {reserve} must be smaller than capacity {capacity}")]
    Reserve {
        /// Requested reserve.
        reserve: usize,
        /// Pool capacity.
        capacity: usize,
    },

    /// A deferred queue with no room can never accept a request.
    #[error("{queue} queue must hold at least one entry")]
    EmptyQueue {
        /// The zero-sized queue.
        queue: QueueKind,
    },
}
