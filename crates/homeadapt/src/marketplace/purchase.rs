use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    Caller, LeadId, Role, TransactionKind, TransactionRecord, UserId,
};
use super::error::MarketError;
use super::store::{MarketStore, PurchaseWrite};

/// Provider-reported settlement state of a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
}

/// Metadata we attach when creating a session and read back on both
/// reconciliation triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutMetadata {
    pub lead_id: LeadId,
    pub contractor_id: UserId,
    pub kind: TransactionKind,
}

/// Session details as retrieved from the payment provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub payment_status: PaymentStatus,
    pub metadata: CheckoutMetadata,
    pub amount_total: u32,
    pub currency: String,
    pub payment_intent: Option<String>,
}

/// Redirect handle returned to the contractor's browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutHandle {
    pub session_id: String,
    pub checkout_url: String,
}

/// Line-item description for the hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub metadata: CheckoutMetadata,
    pub amount_cents: u32,
    pub currency: String,
    pub product_name: String,
    pub product_description: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("payment provider error: {0}")]
    Provider(String),
    #[error("unknown checkout session {0}")]
    UnknownSession(String),
}

impl From<GatewayError> for MarketError {
    fn from(value: GatewayError) -> Self {
        MarketError::ExternalService(value.to_string())
    }
}

/// Payment provider abstraction: create a hosted checkout session and
/// retrieve one by id. The provider is an external ledger this crate only
/// reacts to.
pub trait CheckoutGateway: Send + Sync {
    fn create_session(&self, request: CheckoutRequest) -> Result<CheckoutHandle, GatewayError>;
    fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, GatewayError>;
}

/// Outcome of the idempotent purchase recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOutcome {
    Recorded,
    AlreadyRecorded,
}

/// Owns lead purchase initiation and the dual-trigger reconciliation: the
/// synchronous post-redirect verification call and the asynchronous provider
/// webhook both funnel into [`PurchaseService::record`], whichever lands
/// first.
pub struct PurchaseService<S, G> {
    store: Arc<S>,
    gateway: Arc<G>,
}

impl<S, G> PurchaseService<S, G>
where
    S: MarketStore + 'static,
    G: CheckoutGateway + 'static,
{
    pub fn new(store: Arc<S>, gateway: Arc<G>) -> Self {
        Self { store, gateway }
    }

    /// Start a checkout for contact access to a matched lead.
    pub fn initiate(
        &self,
        caller: &Caller,
        lead_id: &LeadId,
    ) -> Result<CheckoutHandle, MarketError> {
        if caller.role != Role::Contractor {
            return Err(MarketError::Unauthorized);
        }
        let contractor = self
            .store
            .contractor(&caller.user_id)?
            .ok_or(MarketError::NotFound("contractor"))?;
        if !contractor.payment_onboarding_complete {
            return Err(MarketError::Forbidden(
                "complete payment onboarding first".to_string(),
            ));
        }
        if !contractor.verified {
            return Err(MarketError::Forbidden(
                "account must be verified to purchase leads".to_string(),
            ));
        }

        let lead = self
            .store
            .lead(lead_id)?
            .ok_or(MarketError::NotFound("lead"))?;
        if !lead.is_matched_to(&caller.user_id) {
            return Err(MarketError::Forbidden(
                "not matched to this lead".to_string(),
            ));
        }
        if lead.is_purchased_by(&caller.user_id) {
            return Err(MarketError::Conflict(
                "lead already purchased".to_string(),
            ));
        }

        let shown_types: Vec<&str> = lead
            .project_type
            .iter()
            .take(3)
            .map(String::as_str)
            .collect();
        let product_name = if shown_types.is_empty() {
            "Lead: Home Modification".to_string()
        } else {
            format!("Lead: {}", shown_types.join(", "))
        };
        let product_description = format!(
            "{}, {} - {} services",
            lead.address.city,
            lead.address.state,
            lead.project_type.len()
        );

        let handle = self.gateway.create_session(CheckoutRequest {
            metadata: CheckoutMetadata {
                lead_id: lead.id.clone(),
                contractor_id: caller.user_id.clone(),
                kind: TransactionKind::LeadPurchase,
            },
            amount_cents: lead.price_cents,
            currency: "usd".to_string(),
            product_name,
            product_description,
        })?;

        info!(
            lead = %lead.id.0,
            contractor = %caller.user_id.0,
            session = %handle.session_id,
            "checkout session created"
        );
        Ok(handle)
    }

    /// Synchronous trigger: the contractor's browser came back from checkout
    /// and asks us to verify. Validates the provider-reported state and the
    /// session metadata against the caller before reconciling.
    pub fn verify(
        &self,
        caller: &Caller,
        session_id: &str,
        lead_id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<PurchaseOutcome, MarketError> {
        if caller.role != Role::Contractor {
            return Err(MarketError::Unauthorized);
        }
        let session = self.gateway.retrieve_session(session_id)?;

        if session.payment_status != PaymentStatus::Paid {
            return Err(MarketError::Validation("payment not completed".to_string()));
        }
        if session.metadata.lead_id != *lead_id || session.metadata.contractor_id != caller.user_id
        {
            return Err(MarketError::Conflict("session metadata mismatch".to_string()));
        }

        self.record(&session, true, now)
    }

    /// Webhook trigger for a completed checkout. Signature validation happens
    /// at the HTTP boundary before this is reached.
    pub fn on_checkout_completed(
        &self,
        session: &CheckoutSession,
        now: DateTime<Utc>,
    ) -> Result<PurchaseOutcome, MarketError> {
        if session.metadata.kind != TransactionKind::LeadPurchase {
            return Ok(PurchaseOutcome::AlreadyRecorded);
        }
        self.record(session, false, now)
    }

    /// The single reconciliation point both triggers funnel into. Calling it
    /// any number of times for the same `(lead, contractor, session)` writes
    /// at most one ledger entry and one `purchased_by` membership.
    fn record(
        &self,
        session: &CheckoutSession,
        verified_via_api: bool,
        now: DateTime<Utc>,
    ) -> Result<PurchaseOutcome, MarketError> {
        let lead_id = &session.metadata.lead_id;
        let contractor_id = &session.metadata.contractor_id;

        let lead = self
            .store
            .lead(lead_id)?
            .ok_or(MarketError::NotFound("lead"))?;
        if lead.is_purchased_by(contractor_id) {
            return Ok(PurchaseOutcome::AlreadyRecorded);
        }
        if !lead.is_matched_to(contractor_id) {
            return Err(MarketError::Forbidden(
                "not matched to this lead".to_string(),
            ));
        }

        let entry = TransactionRecord {
            kind: TransactionKind::LeadPurchase,
            contractor_id: contractor_id.clone(),
            lead_id: lead_id.clone(),
            amount_cents: session.amount_total,
            currency: session.currency.clone(),
            external_session_id: session.id.clone(),
            external_payment_id: session.payment_intent.clone(),
            status: "completed".to_string(),
            verified_via_api,
            created_at: now,
        };

        match self
            .store
            .record_purchase(lead_id, contractor_id, entry, now)?
        {
            PurchaseWrite::Recorded => {
                info!(
                    lead = %lead_id.0,
                    contractor = %contractor_id.0,
                    session = %session.id,
                    via_api = verified_via_api,
                    "lead purchase recorded"
                );
                Ok(PurchaseOutcome::Recorded)
            }
            PurchaseWrite::AlreadyRecorded => Ok(PurchaseOutcome::AlreadyRecorded),
        }
    }

    /// Webhook trigger for provider account capability updates: onboarding is
    /// complete exactly when charges and payouts are both enabled. A missing
    /// contractor is logged and acknowledged, not an error; the provider
    /// retries independently of us.
    pub fn on_account_updated(
        &self,
        account_id: &str,
        charges_enabled: bool,
        payouts_enabled: bool,
    ) -> Result<(), MarketError> {
        let Some(contractor) = self.store.contractor_by_payment_account(account_id)? else {
            warn!(account = %account_id, "no contractor for payment account");
            return Ok(());
        };

        let complete = charges_enabled && payouts_enabled;
        self.store.update_contractor(&contractor.id, &mut |profile| {
            profile.payment_onboarding_complete = complete;
        })?;

        info!(
            contractor = %contractor.id.0,
            onboarding_complete = complete,
            "payment onboarding status reconciled"
        );
        Ok(())
    }
}
