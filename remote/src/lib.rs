//! Client side of the remote credit service.
//!
//! The remote service mirrors virtual bank balances as credits on an external
//! account. [`CreditService`] is the saga participant: every balance-affecting
//! call it makes is recorded in the operation ledger with a compensation that
//! re-invokes the service with the opposite delta, so a failed transaction can
//! unwind remote state the same way it unwinds local state.

pub mod api;
pub mod memory;
pub mod service;

pub use api::{ApiError, CreditApi, RemoteAccount};
pub use memory::InMemoryCreditApi;
pub use service::{CreditError, CreditService, NegatedAdjustment};
