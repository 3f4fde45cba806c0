use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use secrecy::SecretString;

use crate::config::MarketplaceConfig;
use crate::marketplace::domain::{
    Address, AssessmentSummary, Budget, Caller, ContractorProfile, HomeownerAccount, Role, UserId,
    UserRecord,
};
use crate::marketplace::error::MarketError;
use crate::marketplace::leads::AssessmentSource;
use crate::marketplace::purchase::{
    CheckoutGateway, CheckoutHandle, CheckoutRequest, CheckoutSession, GatewayError, PaymentStatus,
};
use crate::marketplace::webhook::SignatureValidator;
use crate::marketplace::{
    InMemoryMarketStore, LeadLifecycle, MarketStore, MarketplaceService, MatchingConfig,
    PurchaseService, QuoteManager,
};

pub(super) type TestService =
    MarketplaceService<InMemoryMarketStore, InMemoryAssessments, FakeGateway>;

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn homeowner_caller() -> Caller {
    Caller {
        user_id: UserId("homeowner-1".to_string()),
        role: Role::Homeowner,
    }
}

pub(super) fn contractor_caller(suffix: &str) -> Caller {
    Caller {
        user_id: UserId(format!("contractor-{suffix}")),
        role: Role::Contractor,
    }
}

pub(super) fn homeowner() -> HomeownerAccount {
    HomeownerAccount {
        id: UserId("homeowner-1".to_string()),
        display_name: "Pat Rivera".to_string(),
        email: "pat@example.com".to_string(),
        phone: Some("515-555-0100".to_string()),
        address: Some(lead_address()),
    }
}

pub(super) fn lead_address() -> Address {
    Address {
        street: "412 Grand Ave".to_string(),
        city: "Des Moines".to_string(),
        state: "IA".to_string(),
        zip: "50309".to_string(),
    }
}

/// Fully eligible contractor serving the lead's exact ZIP with both project
/// types, a high rating, and a deep review history.
pub(super) fn contractor(suffix: &str) -> ContractorProfile {
    ContractorProfile {
        id: UserId(format!("contractor-{suffix}")),
        display_name: format!("Contractor {suffix}"),
        company_name: Some(format!("Crew {suffix} LLC")),
        service_areas: vec!["50309".to_string()],
        services: vec![
            "Bathroom Modifications".to_string(),
            "Grab Bar Installation".to_string(),
        ],
        payment_account_id: Some(format!("acct_{suffix}")),
        payment_onboarding_complete: true,
        verified: true,
        rating: Some(4.8),
        review_count: Some(24),
    }
}

pub(super) fn assessment() -> AssessmentSummary {
    AssessmentSummary {
        id: "assessment-1".to_string(),
        homeowner_id: UserId("homeowner-1".to_string()),
        project_types: vec!["bathroom".to_string(), "grab bar".to_string()],
        summary: "Walk-in shower conversion with two grab bars".to_string(),
        estimate: Budget {
            min: 4_000,
            max: 9_000,
        },
    }
}

pub(super) fn create_lead_request() -> crate::marketplace::CreateLeadRequest {
    crate::marketplace::CreateLeadRequest {
        assessment_id: "assessment-1".to_string(),
        address: lead_address(),
        phone: None,
        urgency: None,
        description: None,
    }
}

#[derive(Default)]
pub(super) struct InMemoryAssessments {
    records: Mutex<HashMap<String, AssessmentSummary>>,
}

impl InMemoryAssessments {
    pub(super) fn insert(&self, assessment: AssessmentSummary) {
        self.records
            .lock()
            .expect("assessment mutex poisoned")
            .insert(assessment.id.clone(), assessment);
    }
}

impl AssessmentSource for InMemoryAssessments {
    fn assessment(&self, id: &str) -> Result<Option<AssessmentSummary>, MarketError> {
        Ok(self
            .records
            .lock()
            .expect("assessment mutex poisoned")
            .get(id)
            .cloned())
    }
}

/// Gateway double: hands out `cs_test_N` session ids and reports every
/// session as paid unless a test flips it.
#[derive(Default)]
pub(super) struct FakeGateway {
    sequence: AtomicU64,
    sessions: Mutex<HashMap<String, CheckoutSession>>,
}

impl FakeGateway {
    pub(super) fn set_payment_status(&self, session_id: &str, status: PaymentStatus) {
        let mut sessions = self.sessions.lock().expect("gateway mutex poisoned");
        if let Some(session) = sessions.get_mut(session_id) {
            session.payment_status = status;
        }
    }

    pub(super) fn session(&self, session_id: &str) -> Option<CheckoutSession> {
        self.sessions
            .lock()
            .expect("gateway mutex poisoned")
            .get(session_id)
            .cloned()
    }
}

impl CheckoutGateway for FakeGateway {
    fn create_session(&self, request: CheckoutRequest) -> Result<CheckoutHandle, GatewayError> {
        let id = format!("cs_test_{}", self.sequence.fetch_add(1, Ordering::Relaxed) + 1);
        let session = CheckoutSession {
            id: id.clone(),
            payment_status: PaymentStatus::Paid,
            metadata: request.metadata,
            amount_total: request.amount_cents,
            currency: request.currency,
            payment_intent: Some(format!("pi_{id}")),
        };
        self.sessions
            .lock()
            .expect("gateway mutex poisoned")
            .insert(id.clone(), session);
        Ok(CheckoutHandle {
            session_id: id.clone(),
            checkout_url: format!("https://checkout.test/{id}"),
        })
    }

    fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, GatewayError> {
        self.session(session_id)
            .ok_or_else(|| GatewayError::UnknownSession(session_id.to_string()))
    }
}

/// Initiate and verify a checkout so the contractor can quote the lead.
pub(super) fn purchase_lead(
    service: &TestService,
    caller: &Caller,
    lead_id: &crate::marketplace::LeadId,
) {
    let handle = service
        .purchases
        .initiate(caller, lead_id)
        .expect("checkout session");
    service
        .purchases
        .verify(caller, &handle.session_id, lead_id, now())
        .expect("purchase verified");
}

/// Store seeded with the homeowner, three eligible contractors, and one
/// completed assessment.
pub(super) fn build_service() -> (
    Arc<TestService>,
    Arc<InMemoryMarketStore>,
    Arc<FakeGateway>,
) {
    build_service_with_contractors(vec![contractor("1"), contractor("2"), contractor("3")])
}

pub(super) fn build_service_with_contractors(
    contractors: Vec<ContractorProfile>,
) -> (
    Arc<TestService>,
    Arc<InMemoryMarketStore>,
    Arc<FakeGateway>,
) {
    let store = Arc::new(InMemoryMarketStore::default());
    store
        .upsert_user(UserRecord::Homeowner(homeowner()))
        .expect("seed homeowner");
    for profile in contractors {
        store
            .upsert_user(UserRecord::Contractor(profile))
            .expect("seed contractor");
    }

    let assessments = Arc::new(InMemoryAssessments::default());
    assessments.insert(assessment());

    let gateway = Arc::new(FakeGateway::default());
    let config = MarketplaceConfig::default();

    let service = Arc::new(MarketplaceService {
        leads: LeadLifecycle::new(
            store.clone(),
            assessments,
            MatchingConfig::default(),
            config.clone(),
        ),
        quotes: QuoteManager::new(store.clone(), config),
        purchases: PurchaseService::new(store.clone(), gateway.clone()),
        webhook: Some(SignatureValidator::new(SecretString::from(
            "whsec_fixture_secret",
        ))),
    });

    (service, store, gateway)
}
