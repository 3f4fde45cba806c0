//! Lead lifecycle and contractor matching for the aging-in-place home
//! modification marketplace.
//!
//! The crate owns the domain core only: the persistence adapter, the matching
//! engine, the lead/quote managers, and the purchase reconciliation path.
//! Session authentication, file storage, the vision-model assessment calls,
//! and the payment provider itself are external collaborators reached through
//! the traits in [`marketplace`].

pub mod config;
pub mod error;
pub mod marketplace;
pub mod telemetry;
