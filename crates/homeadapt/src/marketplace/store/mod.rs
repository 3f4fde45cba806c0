//! Persistence adapter over the five marketplace collections.
//!
//! The trait mirrors the document-store operations the managers need:
//! get/insert/list plus closure-based read-modify-write updates, and the two
//! multi-document operations that must be atomic to readers: purchase
//! recording and quote acceptance. Implementations guarantee that those two
//! run as a single serializable unit.

mod memory;

pub use memory::InMemoryMarketStore;

use chrono::{DateTime, Utc};

use super::domain::{
    ContractorProfile, Lead, LeadId, Notification, Quote, QuoteId, TransactionRecord, UserId,
    UserRecord,
};

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of the atomic purchase write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseWrite {
    /// The contractor was added to `purchased_by` and the ledger entry was
    /// upserted in the same transaction.
    Recorded,
    /// The contractor had already purchased the lead; nothing was written.
    AlreadyRecorded,
}

/// Result of the atomic quote acceptance cascade.
#[derive(Debug, Clone)]
pub struct QuoteAcceptance {
    pub accepted: Quote,
    /// Sibling quotes that moved from pending to rejected in the same unit.
    pub rejected: Vec<QuoteId>,
}

pub trait MarketStore: Send + Sync {
    // -- users ------------------------------------------------------------
    fn upsert_user(&self, record: UserRecord) -> Result<(), StoreError>;
    fn user(&self, id: &UserId) -> Result<Option<UserRecord>, StoreError>;
    fn contractor(&self, id: &UserId) -> Result<Option<ContractorProfile>, StoreError>;
    /// The matching candidate pool: verified contractors with payment
    /// onboarding complete.
    fn eligible_contractors(&self) -> Result<Vec<ContractorProfile>, StoreError>;
    fn contractor_by_payment_account(
        &self,
        account_id: &str,
    ) -> Result<Option<ContractorProfile>, StoreError>;
    fn update_contractor(
        &self,
        id: &UserId,
        apply: &mut dyn FnMut(&mut ContractorProfile),
    ) -> Result<ContractorProfile, StoreError>;

    // -- leads ------------------------------------------------------------
    fn insert_lead(&self, lead: Lead) -> Result<Lead, StoreError>;
    fn lead(&self, id: &LeadId) -> Result<Option<Lead>, StoreError>;
    /// Read-modify-write under the store lock; bumps `updated_at` to `now`.
    fn update_lead(
        &self,
        id: &LeadId,
        now: DateTime<Utc>,
        apply: &mut dyn FnMut(&mut Lead),
    ) -> Result<Lead, StoreError>;
    /// Newest first.
    fn leads_for_homeowner(&self, homeowner_id: &UserId) -> Result<Vec<Lead>, StoreError>;
    /// Leads the contractor is matched to and that are still open for
    /// quoting, newest first.
    fn leads_for_contractor(&self, contractor_id: &UserId) -> Result<Vec<Lead>, StoreError>;

    // -- quotes -----------------------------------------------------------
    fn insert_quote(&self, quote: Quote) -> Result<Quote, StoreError>;
    fn quote(&self, id: &QuoteId) -> Result<Option<Quote>, StoreError>;
    fn quotes_for_lead(&self, lead_id: &LeadId) -> Result<Vec<Quote>, StoreError>;
    fn quotes_for_contractor(&self, contractor_id: &UserId) -> Result<Vec<Quote>, StoreError>;
    /// Atomic cascade: the targeted quote becomes accepted, every other
    /// pending quote on the lead becomes rejected, and the lead moves to
    /// `accepted`, all visible to readers as one write. Fails with
    /// `NotFound` if the quote or lead is missing (or the quote belongs to a
    /// different lead) and `Conflict` if a quote on the lead was already
    /// resolved. Re-accepting the already-accepted quote is a no-op success.
    fn finalize_quote_acceptance(
        &self,
        lead_id: &LeadId,
        quote_id: &QuoteId,
        now: DateTime<Utc>,
    ) -> Result<QuoteAcceptance, StoreError>;

    // -- transactions -----------------------------------------------------
    fn transaction(&self, session_id: &str) -> Result<Option<TransactionRecord>, StoreError>;
    /// Atomic unit for the dual-trigger purchase path: union-add the
    /// contractor to `purchased_by` and insert the ledger entry keyed by the
    /// external session id unless one already exists. Safe to call any
    /// number of times with the same `(lead, contractor, session)`.
    fn record_purchase(
        &self,
        lead_id: &LeadId,
        contractor_id: &UserId,
        entry: TransactionRecord,
        now: DateTime<Utc>,
    ) -> Result<PurchaseWrite, StoreError>;

    // -- notifications ----------------------------------------------------
    fn push_notification(&self, notification: Notification) -> Result<(), StoreError>;
    fn notifications_for_contractor(
        &self,
        contractor_id: &UserId,
    ) -> Result<Vec<Notification>, StoreError>;
    /// `NotFound` unless the notification exists and belongs to the
    /// contractor.
    fn mark_notification_read(
        &self,
        contractor_id: &UserId,
        notification_id: &str,
    ) -> Result<(), StoreError>;
}
