use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use super::domain::{
    expiry_from, next_lead_id, Address, AssessmentSummary, Budget, Caller, Lead, LeadId,
    LeadStatus, LeadView, Notification, Role, Urgency, UserId, UserRecord,
};
use super::error::MarketError;
use super::matching::{ContractorMatch, MatchingConfig, MatchingEngine};
use super::store::MarketStore;
use crate::config::MarketplaceConfig;

/// External collaborator supplying completed accessibility assessments. The
/// vision-model pipeline behind it is out of scope; this crate only consumes
/// its structured output.
pub trait AssessmentSource: Send + Sync {
    fn assessment(&self, id: &str) -> Result<Option<AssessmentSummary>, MarketError>;
}

/// Payload for converting a completed assessment into a lead.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLeadRequest {
    pub assessment_id: String,
    pub address: Address,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub urgency: Option<Urgency>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Owns the lead state machine: creation, matching, quoting transitions,
/// acceptance, completion, and cancellation, plus the read-side authorization
/// and redaction rules.
pub struct LeadLifecycle<S, A> {
    store: Arc<S>,
    assessments: Arc<A>,
    engine: MatchingEngine,
    config: MarketplaceConfig,
}

impl<S, A> LeadLifecycle<S, A>
where
    S: MarketStore + 'static,
    A: AssessmentSource + 'static,
{
    pub fn new(
        store: Arc<S>,
        assessments: Arc<A>,
        matching: MatchingConfig,
        config: MarketplaceConfig,
    ) -> Self {
        Self {
            store,
            assessments,
            engine: MatchingEngine::new(matching),
            config,
        }
    }

    /// Convert a completed assessment into a pending lead and immediately run
    /// matching over the contractor pool. Returns the stored lead and the
    /// number of contractors it was matched to.
    pub fn create(
        &self,
        caller: &Caller,
        request: CreateLeadRequest,
        now: DateTime<Utc>,
    ) -> Result<(Lead, usize), MarketError> {
        let assessment = self
            .assessments
            .assessment(&request.assessment_id)?
            .filter(|assessment| assessment.homeowner_id == caller.user_id)
            .ok_or(MarketError::NotFound("assessment"))?;

        let (homeowner_name, homeowner_email, account_phone) =
            match self.store.user(&caller.user_id)? {
                Some(UserRecord::Homeowner(account)) => {
                    (account.display_name, account.email, account.phone)
                }
                _ => return Err(MarketError::Forbidden("homeowner account required".to_string())),
            };

        let lead = Lead {
            id: next_lead_id(),
            assessment_id: assessment.id.clone(),
            homeowner_id: caller.user_id.clone(),
            homeowner_name,
            homeowner_email,
            homeowner_phone: request.phone.or(account_phone),
            address: request.address,
            project_type: assessment.project_types.clone(),
            description: request
                .description
                .unwrap_or_else(|| assessment.summary.clone()),
            urgency: request.urgency.unwrap_or(Urgency::Medium),
            budget: Budget {
                min: assessment.estimate.min,
                max: assessment.estimate.max,
            },
            matched_contractors: Vec::new(),
            purchased_by: Vec::new(),
            price_cents: self.config.lead_price_cents,
            status: LeadStatus::Pending,
            created_at: now,
            updated_at: now,
            expires_at: expiry_from(now, self.config.lead_expiry_days),
        };

        let lead = self.store.insert_lead(lead)?;
        let matches = self.run_matching(&lead.id, now)?;
        let lead = self
            .store
            .lead(&lead.id)?
            .ok_or(MarketError::NotFound("lead"))?;

        Ok((lead, matches.len()))
    }

    /// Invoke the matching engine over the eligible pool and apply the
    /// result: union-add the selected contractors, notify the newly added
    /// ones, and move `pending → matched` iff anyone was selected. Re-running
    /// is idempotent thanks to the set semantics.
    pub fn run_matching(
        &self,
        lead_id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<Vec<ContractorMatch>, MarketError> {
        let lead = self
            .store
            .lead(lead_id)?
            .ok_or(MarketError::NotFound("lead"))?;
        let pool = self.store.eligible_contractors()?;
        let ranked = self.engine.rank(&lead, &pool);

        if ranked.is_empty() {
            // No explicit unmatched state exists; the lead stays pending.
            info!(lead = %lead_id.0, "no contractors scored above the matching cutoff");
            return Ok(ranked);
        }

        let mut newly_added: Vec<UserId> = Vec::new();
        self.store.update_lead(lead_id, now, &mut |lead| {
            for entry in &ranked {
                if lead.add_matched_contractor(entry.contractor.id.clone()) {
                    newly_added.push(entry.contractor.id.clone());
                }
            }
            if lead.status == LeadStatus::Pending {
                lead.status = LeadStatus::Matched;
            }
        })?;

        for contractor_id in newly_added {
            self.store.push_notification(Notification::new_lead(
                lead_id.clone(),
                contractor_id,
                now,
            ))?;
        }

        info!(
            lead = %lead_id.0,
            matched = ranked.len(),
            "matched contractors to lead"
        );
        Ok(ranked)
    }

    /// Read a lead as the caller is entitled to see it: owners and admins get
    /// the full projection, matched contractors get the redacted one until
    /// they purchase contact access.
    pub fn view(
        &self,
        caller: &Caller,
        lead_id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<LeadView, MarketError> {
        let lead = self
            .store
            .lead(lead_id)?
            .ok_or(MarketError::NotFound("lead"))?;

        if lead.homeowner_id == caller.user_id || caller.is_admin() {
            return Ok(LeadView::full(&lead, now));
        }
        if caller.role == Role::Contractor && lead.is_matched_to(&caller.user_id) {
            return Ok(LeadView::for_contractor(&lead, &caller.user_id, now));
        }
        Err(MarketError::Forbidden(
            "not entitled to view this lead".to_string(),
        ))
    }

    pub fn leads_for_homeowner(
        &self,
        caller: &Caller,
        now: DateTime<Utc>,
    ) -> Result<Vec<LeadView>, MarketError> {
        let leads = self.store.leads_for_homeowner(&caller.user_id)?;
        Ok(leads.iter().map(|lead| LeadView::full(lead, now)).collect())
    }

    pub fn leads_for_contractor(
        &self,
        caller: &Caller,
        now: DateTime<Utc>,
    ) -> Result<Vec<LeadView>, MarketError> {
        if caller.role != Role::Contractor {
            return Err(MarketError::Forbidden(
                "contractor account required".to_string(),
            ));
        }
        let leads = self.store.leads_for_contractor(&caller.user_id)?;
        Ok(leads
            .iter()
            .map(|lead| LeadView::for_contractor(lead, &caller.user_id, now))
            .collect())
    }

    /// Ownership gate used by callers that must pre-authorize an operation
    /// (e.g. quote acceptance, which does not re-verify internally).
    pub fn authorize_owner(&self, caller: &Caller, lead_id: &LeadId) -> Result<Lead, MarketError> {
        let lead = self
            .store
            .lead(lead_id)?
            .ok_or(MarketError::NotFound("lead"))?;
        if lead.homeowner_id == caller.user_id || caller.is_admin() {
            Ok(lead)
        } else {
            Err(MarketError::Forbidden(
                "only the lead owner may do this".to_string(),
            ))
        }
    }

    /// `accepted → completed`.
    pub fn complete(
        &self,
        caller: &Caller,
        lead_id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<Lead, MarketError> {
        let lead = self.authorize_owner(caller, lead_id)?;
        if lead.status != LeadStatus::Accepted {
            return Err(MarketError::Conflict(format!(
                "cannot complete a {} lead",
                lead.status.label()
            )));
        }
        Ok(self.store.update_lead(lead_id, now, &mut |lead| {
            lead.status = LeadStatus::Completed;
        })?)
    }

    /// A contractor's notification feed, newest first.
    pub fn notifications(&self, caller: &Caller) -> Result<Vec<Notification>, MarketError> {
        if caller.role != Role::Contractor {
            return Err(MarketError::Forbidden(
                "contractor account required".to_string(),
            ));
        }
        Ok(self.store.notifications_for_contractor(&caller.user_id)?)
    }

    pub fn mark_notification_read(
        &self,
        caller: &Caller,
        notification_id: &str,
    ) -> Result<(), MarketError> {
        if caller.role != Role::Contractor {
            return Err(MarketError::Forbidden(
                "contractor account required".to_string(),
            ));
        }
        self.store
            .mark_notification_read(&caller.user_id, notification_id)
            .map_err(|err| match err {
                super::store::StoreError::NotFound => MarketError::NotFound("notification"),
                other => MarketError::Store(other),
            })
    }

    /// Cancellation is reachable from any non-terminal state.
    pub fn cancel(
        &self,
        caller: &Caller,
        lead_id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<Lead, MarketError> {
        let lead = self.authorize_owner(caller, lead_id)?;
        if lead.status.is_terminal() {
            return Err(MarketError::Conflict(format!(
                "cannot cancel a {} lead",
                lead.status.label()
            )));
        }
        Ok(self.store.update_lead(lead_id, now, &mut |lead| {
            lead.status = LeadStatus::Cancelled;
        })?)
    }
}

/// Preconditions the lifecycle manager imposes on quote submissions: payment
/// onboarding finished, contractor matched to the lead, and contact access
/// purchased when the lead enforces pay-per-lead.
pub fn quote_submission_allowed(
    lead: &Lead,
    contractor: &super::domain::ContractorProfile,
) -> Result<(), MarketError> {
    if !contractor.payment_onboarding_complete {
        return Err(MarketError::Forbidden(
            "complete payment onboarding before quoting".to_string(),
        ));
    }
    if !lead.is_matched_to(&contractor.id) {
        return Err(MarketError::Forbidden(
            "not matched to this lead".to_string(),
        ));
    }
    if lead.price_cents > 0 && !lead.is_purchased_by(&contractor.id) {
        return Err(MarketError::Forbidden(
            "purchase this lead before quoting".to_string(),
        ));
    }
    Ok(())
}
