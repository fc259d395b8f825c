//! # Victim Selection
//!
//! When a forced allocation finds the free list empty, one used record is
//! recycled. A single pass over every record picks it:
//!
//! 1. A record that is not defined, or not tracked in the used list, is
//!    taken on the spot. The pool's bookkeeping is wrong about it anyway.
//! 2. A record whose definition no longer resolves is taken on the spot.
//! 3. Otherwise the pass tracks the best waiting-to-die record (smallest
//!    `min(lifetime, frames)`) and the best live record (smallest lifetime,
//!    then fewest frames). Waiting beats live.
//!
//! Records whose definition is protected are skipped by step 3.

use crate::collab::DefinitionStore;

use super::record::{Record, SlotState};

/// Why a record was chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VictimReason {
    /// Its state or list membership disagrees with the pool.
    Inconsistent,
    /// Its definition has been unloaded.
    Unresolved,
    /// It was already waiting to die.
    Waiting,
    /// It was the live record closest to death.
    ShortestLived,
}

/// The record chosen for recycling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Victim {
    /// Slot index.
    pub index: u32,
    /// Why it was picked.
    pub reason: VictimReason,
}

/// Picks the record to recycle, or `None` if every record is protected.
///
/// O(`records.len()`), early exit only for inconsistent or unresolved
/// records.
pub fn select_victim<D>(records: &[Record], definitions: &D) -> Option<Victim>
where
    D: DefinitionStore + ?Sized,
{
    // (index, min(lifetime, frames))
    let mut best_waiting: Option<(u32, u32)> = None;
    // (index, (lifetime, frames))
    let mut best_live: Option<(u32, (u32, u32))> = None;

    for (index, record) in (0u32..).zip(records) {
        if !record.is_defined() || !record.membership().is_used() {
            return Some(Victim {
                index,
                reason: VictimReason::Inconsistent,
            });
        }

        let protected = match record.definition() {
            Some(id) => match definitions.resolve(id) {
                Some(handle) => handle.protected,
                None => {
                    return Some(Victim {
                        index,
                        reason: VictimReason::Unresolved,
                    })
                }
            },
            None => false,
        };
        if protected {
            continue;
        }

        let lifetime = record.lifetime_remaining();
        let frames = record.frames_remaining();

        if record.state() == SlotState::Waiting {
            let remaining = lifetime.min(frames);
            if best_waiting.map_or(true, |(_, best)| remaining < best) {
                best_waiting = Some((index, remaining));
            }
        } else if best_live.map_or(true, |(_, best)| (lifetime, frames) < best) {
            best_live = Some((index, (lifetime, frames)));
        }
    }

    best_waiting
        .map(|(index, _)| Victim {
            index,
            reason: VictimReason::Waiting,
        })
        .or_else(|| {
            best_live.map(|(index, _)| Victim {
                index,
                reason: VictimReason::ShortestLived,
            })
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::collab::{DefinitionHandle, DefinitionId};
    use crate::slot::record::{Membership, SlotSetup};

    use super::*;

    const PLAIN: DefinitionId = DefinitionId(1);
    const SHIELD: DefinitionId = DefinitionId(2);

    fn store() -> HashMap<DefinitionId, DefinitionHandle> {
        let mut defs = HashMap::new();
        defs.insert(PLAIN, DefinitionHandle::new(PLAIN));
        defs.insert(SHIELD, DefinitionHandle::protected(SHIELD));
        defs
    }

    fn live(position: u32, definition: DefinitionId, lifetime: u32, frames: u32) -> Record {
        let mut record = Record::new();
        record.claim();
        record
            .configure(SlotSetup {
                definition: Some(definition),
                owner: None,
                lifetime,
                frames,
            })
            .unwrap();
        record.activate(false).unwrap();
        record.membership = Membership::Used(position);
        record
    }

    fn waiting(position: u32, definition: DefinitionId, lifetime: u32, frames: u32) -> Record {
        let mut record = live(position, definition, lifetime, frames);
        record.mark_waiting().unwrap();
        record
    }

    #[test]
    fn test_waiting_beats_shorter_lived_live_record() {
        let records = vec![live(0, PLAIN, 5, 5), waiting(1, PLAIN, 1, 9), live(2, PLAIN, 0, 0)];
        let victim = select_victim(&records, &store()).unwrap();
        assert_eq!(victim.index, 1);
        assert_eq!(victim.reason, VictimReason::Waiting);
    }

    #[test]
    fn test_best_waiting_uses_min_of_both_counters() {
        let records = vec![waiting(0, PLAIN, 3, 8), waiting(1, PLAIN, 9, 2)];
        let victim = select_victim(&records, &store()).unwrap();
        assert_eq!(victim.index, 1);
    }

    #[test]
    fn test_shortest_lifetime_with_frame_tiebreak() {
        let records = vec![live(0, PLAIN, 7, 1), live(1, PLAIN, 3, 9), live(2, PLAIN, 3, 4)];
        let victim = select_victim(&records, &store()).unwrap();
        assert_eq!(victim.index, 2);
        assert_eq!(victim.reason, VictimReason::ShortestLived);
    }

    #[test]
    fn test_protected_records_are_skipped() {
        let records = vec![live(0, SHIELD, 1, 1), waiting(1, SHIELD, 0, 0), live(2, PLAIN, 50, 50)];
        let victim = select_victim(&records, &store()).unwrap();
        assert_eq!(victim.index, 2);

        let all_protected = vec![live(0, SHIELD, 1, 1), waiting(1, SHIELD, 0, 0)];
        assert_eq!(select_victim(&all_protected, &store()), None);
    }

    #[test]
    fn test_unloaded_definition_is_taken_immediately() {
        let records = vec![live(0, PLAIN, 1, 1), live(1, DefinitionId(77), 99, 99), waiting(2, PLAIN, 0, 0)];
        let victim = select_victim(&records, &store()).unwrap();
        assert_eq!(
            victim,
            Victim {
                index: 1,
                reason: VictimReason::Unresolved
            }
        );
    }

    #[test]
    fn test_inconsistent_record_even_if_protected_neighbours() {
        let mut stray = live(1, SHIELD, 10, 10);
        stray.membership = Membership::Detached;
        let records = vec![live(0, SHIELD, 1, 1), stray];
        let victim = select_victim(&records, &store()).unwrap();
        assert_eq!(victim.reason, VictimReason::Inconsistent);
        assert_eq!(victim.index, 1);

        let mut dead = Record::new();
        dead.membership = Membership::Used(0);
        let victim = select_victim(&[dead], &store()).unwrap();
        assert_eq!(victim.reason, VictimReason::Inconsistent);
    }
}
