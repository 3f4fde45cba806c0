use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for marketplace users (homeowners, contractors, admins).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier wrapper for leads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadId(pub String);

/// Identifier wrapper for quotes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

static LEAD_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static QUOTE_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static NOTIFICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_lead_id() -> LeadId {
    let id = LEAD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    LeadId(format!("lead-{id:06}"))
}

pub(crate) fn next_quote_id() -> QuoteId {
    let id = QUOTE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    QuoteId(format!("quote-{id:06}"))
}

pub(crate) fn next_notification_id() -> String {
    let id = NOTIFICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("ntf-{id:06}")
}

/// Role attached to the authenticated caller by the upstream session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Homeowner,
    Contractor,
    Admin,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "homeowner" => Some(Self::Homeowner),
            "contractor" => Some(Self::Contractor),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Authenticated identity forwarded by the session layer. The managers trust
/// it; establishing it is out of scope for this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Street address captured on leads and homeowner accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// Homeowner-declared urgency for the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

/// Budget band in whole dollars supplied by the assessment estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub min: u32,
    pub max: u32,
}

/// Lead state machine. `Cancelled` is reachable from any non-terminal state;
/// `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Pending,
    Matched,
    Quoted,
    Accepted,
    Completed,
    Cancelled,
}

impl LeadStatus {
    pub const fn label(self) -> &'static str {
        match self {
            LeadStatus::Pending => "pending",
            LeadStatus::Matched => "matched",
            LeadStatus::Quoted => "quoted",
            LeadStatus::Accepted => "accepted",
            LeadStatus::Completed => "completed",
            LeadStatus::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, LeadStatus::Completed | LeadStatus::Cancelled)
    }

    /// Contractors only see leads that are still open for quoting.
    pub const fn visible_to_contractors(self) -> bool {
        matches!(self, LeadStatus::Matched | LeadStatus::Quoted)
    }
}

/// A homeowner's modification project request, denormalized at creation time
/// so contractor-facing reads never join back to the homeowner account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub assessment_id: String,
    pub homeowner_id: UserId,
    pub homeowner_name: String,
    pub homeowner_email: String,
    pub homeowner_phone: Option<String>,
    pub address: Address,
    pub project_type: Vec<String>,
    pub description: String,
    pub urgency: Urgency,
    pub budget: Budget,
    pub matched_contractors: Vec<UserId>,
    pub purchased_by: Vec<UserId>,
    pub price_cents: u32,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Lead {
    pub fn is_matched_to(&self, contractor_id: &UserId) -> bool {
        self.matched_contractors.contains(contractor_id)
    }

    pub fn is_purchased_by(&self, contractor_id: &UserId) -> bool {
        self.purchased_by.contains(contractor_id)
    }

    /// Set-union append; returns whether the contractor was newly added.
    pub fn add_matched_contractor(&mut self, contractor_id: UserId) -> bool {
        if self.matched_contractors.contains(&contractor_id) {
            return false;
        }
        self.matched_contractors.push(contractor_id);
        true
    }

    /// Set-union append; returns whether the contractor was newly added.
    pub fn add_purchaser(&mut self, contractor_id: UserId) -> bool {
        if self.purchased_by.contains(&contractor_id) {
            return false;
        }
        self.purchased_by.push(contractor_id);
        true
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Quote state machine. `Expired` is never written proactively; it is the
/// read-time projection of a pending quote whose `valid_until` has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

impl QuoteStatus {
    pub const fn label(self) -> &'static str {
        match self {
            QuoteStatus::Pending => "pending",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Expired => "expired",
        }
    }
}

/// One priced line in a quote breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLineItem {
    pub item: String,
    pub cost: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl QuoteLineItem {
    /// Line items need a non-empty name and a positive cost to count toward
    /// the quote amount.
    pub fn is_valid(&self) -> bool {
        !self.item.trim().is_empty() && self.cost > 0
    }
}

/// A contractor's priced proposal against a lead, with the contractor display
/// data denormalized at submission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub lead_id: LeadId,
    pub contractor_id: UserId,
    pub contractor_name: String,
    pub contractor_company: String,
    pub amount_cents: u32,
    pub breakdown: Vec<QuoteLineItem>,
    pub estimated_duration: String,
    pub valid_until: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    /// Stored status with lazy expiry applied. Storage is never updated when
    /// the validity window lapses.
    pub fn effective_status(&self, now: DateTime<Utc>) -> QuoteStatus {
        if self.status == QuoteStatus::Pending && now > self.valid_until {
            QuoteStatus::Expired
        } else {
            self.status
        }
    }
}

/// Contractor profile fields the matching and purchase paths consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractorProfile {
    pub id: UserId,
    pub display_name: String,
    pub company_name: Option<String>,
    /// ZIP codes or city names the contractor covers.
    pub service_areas: Vec<String>,
    /// Offered service categories, free-form (e.g. "Bathroom Modifications").
    pub services: Vec<String>,
    pub payment_account_id: Option<String>,
    pub payment_onboarding_complete: bool,
    pub verified: bool,
    pub rating: Option<f32>,
    pub review_count: Option<u32>,
}

impl ContractorProfile {
    /// Admin-verified and finished payment onboarding: the gate for entering
    /// the matching pool.
    pub fn is_eligible(&self) -> bool {
        self.verified && self.payment_onboarding_complete
    }

    pub fn company_label(&self) -> String {
        self.company_name
            .clone()
            .unwrap_or_else(|| self.display_name.clone())
    }
}

/// Homeowner account fields the lead creation path snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeownerAccount {
    pub id: UserId,
    pub display_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<Address>,
}

/// Admin account; admins bypass ownership checks on lead reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminAccount {
    pub id: UserId,
    pub display_name: String,
    pub email: String,
}

/// A document in the `users` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum UserRecord {
    Homeowner(HomeownerAccount),
    Contractor(ContractorProfile),
    Admin(AdminAccount),
}

impl UserRecord {
    pub fn id(&self) -> &UserId {
        match self {
            UserRecord::Homeowner(account) => &account.id,
            UserRecord::Contractor(profile) => &profile.id,
            UserRecord::Admin(account) => &account.id,
        }
    }
}

/// Kind tag on audit ledger entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    LeadPurchase,
}

/// Audit entry for a lead purchase, keyed by the external checkout session id
/// so retries of the same session cannot double-write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub kind: TransactionKind,
    pub contractor_id: UserId,
    pub lead_id: LeadId,
    pub amount_cents: u32,
    pub currency: String,
    pub external_session_id: String,
    pub external_payment_id: Option<String>,
    pub status: String,
    /// Whether the synchronous verification call, rather than the webhook,
    /// recorded the purchase first.
    pub verified_via_api: bool,
    pub created_at: DateTime<Utc>,
}

/// Fire-and-forget contractor notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewLead,
    QuoteAccepted,
    LeadExpired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub lead_id: LeadId,
    pub contractor_id: UserId,
    pub kind: NotificationKind,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new_lead(lead_id: LeadId, contractor_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: next_notification_id(),
            lead_id,
            contractor_id,
            kind: NotificationKind::NewLead,
            read: false,
            created_at: now,
        }
    }
}

/// Output of the assessment subsystem consumed as a black box: category tags,
/// a summary, and a budget estimate for the triggering assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentSummary {
    pub id: String,
    pub homeowner_id: UserId,
    pub project_types: Vec<String>,
    pub summary: String,
    pub estimate: Budget,
}

/// Address projection with the street withheld until the contractor has
/// purchased contact access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// Homeowner contact block, present only on full views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactView {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Read-time projection of a lead. Redaction is applied here, never stored:
/// the same lead document serves both the full and the redacted shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadView {
    pub id: LeadId,
    pub project_type: Vec<String>,
    pub description: String,
    pub urgency: Urgency,
    pub budget: Budget,
    pub price_cents: u32,
    pub status: LeadStatus,
    pub address: AddressView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homeowner: Option<ContactView>,
    pub matched_contractor_count: usize,
    pub purchased: bool,
    pub expired: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LeadView {
    /// Full projection for the owning homeowner or an admin.
    pub fn full(lead: &Lead, now: DateTime<Utc>) -> Self {
        Self::project(lead, now, true, true)
    }

    /// Contractor-scoped projection. Contact details appear only once the
    /// contractor is in `purchased_by`.
    pub fn for_contractor(lead: &Lead, contractor_id: &UserId, now: DateTime<Utc>) -> Self {
        let purchased = lead.is_purchased_by(contractor_id);
        Self::project(lead, now, purchased, purchased)
    }

    fn project(lead: &Lead, now: DateTime<Utc>, full_contact: bool, purchased: bool) -> Self {
        let address = AddressView {
            street: full_contact.then(|| lead.address.street.clone()),
            city: lead.address.city.clone(),
            state: lead.address.state.clone(),
            zip: lead.address.zip.clone(),
        };
        let homeowner = full_contact.then(|| ContactView {
            name: lead.homeowner_name.clone(),
            email: lead.homeowner_email.clone(),
            phone: lead.homeowner_phone.clone(),
        });

        Self {
            id: lead.id.clone(),
            project_type: lead.project_type.clone(),
            description: lead.description.clone(),
            urgency: lead.urgency,
            budget: lead.budget,
            price_cents: lead.price_cents,
            status: lead.status,
            address,
            homeowner,
            matched_contractor_count: lead.matched_contractors.len(),
            purchased,
            expired: lead.is_expired(now),
            created_at: lead.created_at,
            expires_at: lead.expires_at,
        }
    }
}

/// Quote projection with lazy expiry applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteView {
    pub id: QuoteId,
    pub lead_id: LeadId,
    pub contractor_id: UserId,
    pub contractor_name: String,
    pub contractor_company: String,
    pub amount_cents: u32,
    pub breakdown: Vec<QuoteLineItem>,
    pub estimated_duration: String,
    pub valid_until: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
}

impl QuoteView {
    pub fn from_quote(quote: &Quote, now: DateTime<Utc>) -> Self {
        Self {
            id: quote.id.clone(),
            lead_id: quote.lead_id.clone(),
            contractor_id: quote.contractor_id.clone(),
            contractor_name: quote.contractor_name.clone(),
            contractor_company: quote.contractor_company.clone(),
            amount_cents: quote.amount_cents,
            breakdown: quote.breakdown.clone(),
            estimated_duration: quote.estimated_duration.clone(),
            valid_until: quote.valid_until,
            notes: quote.notes.clone(),
            status: quote.effective_status(now),
            created_at: quote.created_at,
        }
    }
}

pub(crate) fn expiry_from(created_at: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    created_at + Duration::days(days)
}
