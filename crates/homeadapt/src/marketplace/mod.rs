//! Marketplace core: lead lifecycle, contractor matching, quoting, and
//! pay-per-lead purchase reconciliation over a pluggable store.

pub mod domain;
pub mod error;
pub mod leads;
pub mod matching;
pub mod purchase;
pub mod quotes;
pub mod router;
pub mod store;
pub mod webhook;

#[cfg(test)]
mod tests;

pub use domain::{Caller, Lead, LeadId, LeadStatus, Quote, QuoteId, QuoteStatus, Role, UserId};
pub use error::MarketError;
pub use leads::{AssessmentSource, CreateLeadRequest, LeadLifecycle};
pub use matching::{ContractorMatch, MatchingConfig, MatchingEngine};
pub use purchase::{CheckoutGateway, PurchaseOutcome, PurchaseService};
pub use quotes::{QuoteManager, QuoteSubmission};
pub use router::{marketplace_router, MarketplaceService};
pub use store::{InMemoryMarketStore, MarketStore, StoreError};
pub use webhook::{SignatureValidator, SIGNATURE_HEADER};
