use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::info;

use super::domain::{
    next_quote_id, Caller, LeadId, LeadStatus, Quote, QuoteId, QuoteLineItem, QuoteStatus,
    QuoteView, Role,
};
use super::error::MarketError;
use super::leads::quote_submission_allowed;
use super::store::{MarketStore, QuoteAcceptance, StoreError};
use crate::config::MarketplaceConfig;

/// Payload for a contractor's quote submission. `amount` is never taken from
/// the wire; it is always derived from the surviving breakdown lines.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteSubmission {
    pub lead_id: LeadId,
    pub breakdown: Vec<QuoteLineItem>,
    pub estimated_duration: String,
    #[serde(default)]
    pub valid_days: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Upper bound on a caller-supplied validity window. Anything past a year is
/// a client bug, and unbounded values would overflow the expiry arithmetic.
const MAX_VALID_DAYS: i64 = 365;

/// Owns quote creation and acceptance, including the cascade onto sibling
/// quotes and the parent lead.
pub struct QuoteManager<S> {
    store: Arc<S>,
    config: MarketplaceConfig,
}

impl<S> QuoteManager<S>
where
    S: MarketStore + 'static,
{
    pub fn new(store: Arc<S>, config: MarketplaceConfig) -> Self {
        Self { store, config }
    }

    pub fn submit(
        &self,
        caller: &Caller,
        submission: QuoteSubmission,
        now: DateTime<Utc>,
    ) -> Result<Quote, MarketError> {
        if caller.role != Role::Contractor {
            return Err(MarketError::Forbidden(
                "contractor account required".to_string(),
            ));
        }
        let contractor = self
            .store
            .contractor(&caller.user_id)?
            .ok_or(MarketError::NotFound("contractor"))?;
        let lead = self
            .store
            .lead(&submission.lead_id)?
            .ok_or(MarketError::NotFound("lead"))?;

        quote_submission_allowed(&lead, &contractor)?;

        if !matches!(lead.status, LeadStatus::Matched | LeadStatus::Quoted) {
            return Err(MarketError::Conflict(format!(
                "lead is {} and no longer open for quotes",
                lead.status.label()
            )));
        }

        let already_quoted = self
            .store
            .quotes_for_lead(&lead.id)?
            .iter()
            .any(|quote| quote.contractor_id == caller.user_id);
        if already_quoted {
            return Err(MarketError::Conflict(
                "quote already submitted for this lead".to_string(),
            ));
        }

        let valid_days = match submission.valid_days {
            Some(days) if days <= 0 => {
                return Err(MarketError::Validation(
                    "valid_days must be a positive number of days".to_string(),
                ))
            }
            Some(days) if days > MAX_VALID_DAYS => {
                return Err(MarketError::Validation(format!(
                    "valid_days must be at most {MAX_VALID_DAYS}"
                )))
            }
            Some(days) => days,
            None => self.config.quote_valid_days,
        };

        // Entries failing validation are excluded from both the sum and the
        // persisted breakdown.
        let breakdown: Vec<QuoteLineItem> = submission
            .breakdown
            .into_iter()
            .filter(QuoteLineItem::is_valid)
            .collect();
        if breakdown.is_empty() {
            return Err(MarketError::Validation(
                "quote needs at least one priced line item".to_string(),
            ));
        }
        let amount_cents = breakdown.iter().map(|line| line.cost).sum();

        let quote = Quote {
            id: next_quote_id(),
            lead_id: lead.id.clone(),
            contractor_id: contractor.id.clone(),
            contractor_name: contractor.display_name.clone(),
            contractor_company: contractor.company_label(),
            amount_cents,
            breakdown,
            estimated_duration: submission.estimated_duration,
            valid_until: now + Duration::days(valid_days),
            notes: submission.notes,
            status: QuoteStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let quote = self.store.insert_quote(quote)?;

        // Any contractor-visible state lands on quoted; re-entry from quoted
        // is idempotent.
        self.store.update_lead(&lead.id, now, &mut |lead| {
            lead.status = LeadStatus::Quoted;
        })?;

        info!(quote = %quote.id.0, lead = %lead.id.0, "quote submitted");
        Ok(quote)
    }

    /// Atomic acceptance cascade. Ownership is NOT re-verified here; callers
    /// authorize the homeowner before invoking this.
    pub fn accept(
        &self,
        quote_id: &QuoteId,
        lead_id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<QuoteAcceptance, MarketError> {
        let acceptance = self
            .store
            .finalize_quote_acceptance(lead_id, quote_id, now)
            .map_err(|err| match err {
                StoreError::NotFound => MarketError::NotFound("quote"),
                StoreError::Conflict => {
                    MarketError::Conflict("a quote on this lead was already resolved".to_string())
                }
                other => MarketError::Store(other),
            })?;

        info!(
            quote = %acceptance.accepted.id.0,
            lead = %lead_id.0,
            rejected = acceptance.rejected.len(),
            "quote accepted"
        );
        Ok(acceptance)
    }

    /// Quotes on a lead with lazy expiry applied, newest first.
    pub fn quotes_for_lead(
        &self,
        lead_id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<Vec<QuoteView>, MarketError> {
        let quotes = self.store.quotes_for_lead(lead_id)?;
        Ok(quotes
            .iter()
            .map(|quote| QuoteView::from_quote(quote, now))
            .collect())
    }

    pub fn quotes_for_contractor(
        &self,
        caller: &Caller,
        now: DateTime<Utc>,
    ) -> Result<Vec<QuoteView>, MarketError> {
        let quotes = self.store.quotes_for_contractor(&caller.user_id)?;
        Ok(quotes
            .iter()
            .map(|quote| QuoteView::from_quote(quote, now))
            .collect())
    }
}
