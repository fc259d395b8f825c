//! # Scan Guard
//!
//! RAII lock over a [`SlotPool`] for the duration of a scan.
//!
//! ```rust,ignore
//! {
//!     let mut scan = pool.scan();
//!     // Releases and activations through `scan` are queued.
//!     scan.release(slot)?;
//! } // Outermost guard dropped: queues drained here.
//! ```

use std::ops::{Deref, DerefMut};

use super::pool::SlotPool;

/// Holds the pool locked; derefs to it.
///
/// Guards nest. Only the outermost guard drains the deferred queues, and
/// it does so exactly once, on every exit path including unwinding.
pub struct ScanGuard<'a> {
    pool: &'a mut SlotPool,
}

impl<'a> ScanGuard<'a> {
    pub(crate) fn new(pool: &'a mut SlotPool) -> Self {
        pool.enter_scan();
        Self { pool }
    }

    /// Nesting depth including this guard.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.pool.lock_count()
    }
}

impl Deref for ScanGuard<'_> {
    type Target = SlotPool;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.pool
    }
}

impl DerefMut for ScanGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.pool
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.pool.exit_scan();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::slot::pool::Outcome;
    use crate::slot::record::SlotState;
    use crate::{DefinitionHandle, DefinitionId};

    use super::*;

    #[test]
    fn test_nested_guards_drain_once_at_outermost_exit() {
        let defs: HashMap<DefinitionId, DefinitionHandle> = HashMap::new();
        let mut pool = SlotPool::new(4);
        let slot = pool.allocate(false, &defs).unwrap();
        pool.activate(slot).unwrap();

        {
            let mut outer = pool.scan();
            assert_eq!(outer.depth(), 1);
            {
                let mut inner = outer.scan();
                assert_eq!(inner.depth(), 2);
                assert_eq!(inner.release(slot), Ok(Outcome::Deferred));
            }
            // Inner exit must not drain.
            assert_eq!(outer.pending_termination_count(), 1);
            assert_eq!(outer.record(0).unwrap().state(), SlotState::Waiting);
        }

        assert_eq!(pool.lock_count(), 0);
        assert_eq!(pool.pending_termination_count(), 0);
        assert_eq!(pool.record(0).unwrap().state(), SlotState::Terminated);
        assert_eq!(pool.free_count(), 4);
    }

    #[test]
    fn test_guard_drains_on_unwind() {
        let defs: HashMap<DefinitionId, DefinitionHandle> = HashMap::new();
        let mut pool = SlotPool::new(2);
        let slot = pool.allocate(false, &defs).unwrap();
        pool.activate(slot).unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut scan = pool.scan();
            let _ = scan.release(slot);
            panic!("visitor blew up");
        }));

        assert!(result.is_err());
        assert_eq!(pool.lock_count(), 0);
        assert_eq!(pool.used_count(), 0);
    }
}
