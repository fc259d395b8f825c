//! # Slot Management
//!
//! The fixed-capacity pool and everything that guards its lists.
//!
//! ## Design Philosophy
//!
//! Every slot is allocated once at startup. During gameplay:
//! - Indices move between the free and used lists in O(1)
//! - Structural changes requested mid-scan are queued, not applied
//! - A full pool recycles its least valuable record instead of failing

mod deferred;
mod guard;
mod handle;
mod policy;
mod pool;
mod record;

pub use deferred::DeferredQueues;
pub use guard::ScanGuard;
pub use handle::SlotRef;
pub use policy::{select_victim, Victim, VictimReason};
pub use pool::{Outcome, SlotPool, UsedRange};
pub use record::{Membership, Record, SlotSetup, SlotState};
