//! Tracked containers: the mutation side of the ledger.
//!
//! Each container owns a piece of in-memory state and a
//! [`TargetId`](crate::id::TargetId) naming it in the history. Mutating through the container applies the change first and
//! then records an [`Operation`](crate::operation::Operation) carrying the
//! exact inverse, so a later rollback restores the prior state without
//! re-deriving it. Compensations hold [`Weak`](std::sync::Weak) references to
//! the container interior; a rollback that outlives its container reports
//! [`CompensationFault::TargetDropped`](crate::error::CompensationFault).

pub mod cell;
pub mod map;
pub mod vec;

pub use cell::TrackedCell;
pub use map::TrackedMap;
pub use vec::TrackedVec;
