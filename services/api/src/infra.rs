use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use metrics_exporter_prometheus::PrometheusHandle;
use secrecy::SecretString;

use homeadapt::config::MarketplaceConfig;
use homeadapt::marketplace::domain::{
    Address, AssessmentSummary, Budget, ContractorProfile, HomeownerAccount, UserId, UserRecord,
};
use homeadapt::marketplace::purchase::{
    CheckoutHandle, CheckoutRequest, CheckoutSession, GatewayError, PaymentStatus,
};
use homeadapt::marketplace::{
    AssessmentSource, CheckoutGateway, InMemoryMarketStore, LeadLifecycle, MarketError,
    MarketStore, MarketplaceService, MatchingConfig, PurchaseService, QuoteManager,
    SignatureValidator,
};

pub(crate) type Marketplace =
    MarketplaceService<InMemoryMarketStore, InMemoryAssessmentSource, FakeCheckoutGateway>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Assessment store backing the service until the vision pipeline is wired
/// in; the demo and seed data populate it directly.
#[derive(Default)]
pub(crate) struct InMemoryAssessmentSource {
    records: Mutex<HashMap<String, AssessmentSummary>>,
}

impl InMemoryAssessmentSource {
    pub(crate) fn insert(&self, assessment: AssessmentSummary) {
        self.records
            .lock()
            .expect("assessment mutex poisoned")
            .insert(assessment.id.clone(), assessment);
    }
}

impl AssessmentSource for InMemoryAssessmentSource {
    fn assessment(&self, id: &str) -> Result<Option<AssessmentSummary>, MarketError> {
        Ok(self
            .records
            .lock()
            .expect("assessment mutex poisoned")
            .get(id)
            .cloned())
    }
}

/// Checkout gateway stand-in: sessions settle as paid immediately, which is
/// enough to exercise the reconciliation paths without a provider account.
#[derive(Default)]
pub(crate) struct FakeCheckoutGateway {
    sequence: AtomicU64,
    sessions: Mutex<HashMap<String, CheckoutSession>>,
}

impl FakeCheckoutGateway {
    pub(crate) fn session(&self, session_id: &str) -> Option<CheckoutSession> {
        self.sessions
            .lock()
            .expect("gateway mutex poisoned")
            .get(session_id)
            .cloned()
    }
}

impl CheckoutGateway for FakeCheckoutGateway {
    fn create_session(&self, request: CheckoutRequest) -> Result<CheckoutHandle, GatewayError> {
        let id = format!("cs_{:08}", self.sequence.fetch_add(1, Ordering::Relaxed) + 1);
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
            checkout_url: format!("https://pay.example.com/checkout/{id}"),
        })
    }

    fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, GatewayError> {
        self.session(session_id)
            .ok_or_else(|| GatewayError::UnknownSession(session_id.to_string()))
    }
}

/// Wire the three managers over a shared in-memory store and the fake
/// gateway. The webhook validator is present only when a secret is supplied.
pub(crate) fn build_marketplace(
    signing_secret: Option<String>,
) -> (
    Arc<Marketplace>,
    Arc<InMemoryMarketStore>,
    Arc<InMemoryAssessmentSource>,
    Arc<FakeCheckoutGateway>,
) {
    let store = Arc::new(InMemoryMarketStore::default());
    let assessments = Arc::new(InMemoryAssessmentSource::default());
    let gateway = Arc::new(FakeCheckoutGateway::default());
    let config = MarketplaceConfig::default();

    let service = Arc::new(MarketplaceService {
        leads: LeadLifecycle::new(
            store.clone(),
            assessments.clone(),
            MatchingConfig::default(),
            config.clone(),
        ),
        quotes: QuoteManager::new(store.clone(), config),
        purchases: PurchaseService::new(store.clone(), gateway.clone()),
        webhook: signing_secret.map(|secret| SignatureValidator::new(SecretString::from(secret))),
    });

    (service, store, assessments, gateway)
}

/// Seed a homeowner, a small contractor pool, and one completed assessment so
/// the service is usable straight after boot.
pub(crate) fn seed_demo_data(
    store: &InMemoryMarketStore,
    assessments: &InMemoryAssessmentSource,
) -> Result<(), MarketError> {
    store.upsert_user(UserRecord::Homeowner(HomeownerAccount {
        id: UserId("homeowner-demo".to_string()),
        display_name: "Dana Whitfield".to_string(),
        email: "dana@example.com".to_string(),
        phone: Some("515-555-0147".to_string()),
        address: Some(Address {
            street: "902 Walnut St".to_string(),
            city: "Des Moines".to_string(),
            state: "IA".to_string(),
            zip: "50309".to_string(),
        }),
    }))?;

    let contractors = [
        ContractorProfile {
            id: UserId("contractor-alvarez".to_string()),
            display_name: "Maria Alvarez".to_string(),
            company_name: Some("Alvarez Accessibility".to_string()),
            service_areas: vec!["50309".to_string(), "50310".to_string()],
            services: vec![
                "Bathroom Modifications".to_string(),
                "Grab Bar Installation".to_string(),
                "Ramp Construction".to_string(),
            ],
            payment_account_id: Some("acct_alvarez".to_string()),
            payment_onboarding_complete: true,
            verified: true,
            rating: Some(4.9),
            review_count: Some(37),
        },
        ContractorProfile {
            id: UserId("contractor-okafor".to_string()),
            display_name: "Sam Okafor".to_string(),
            company_name: Some("Okafor Home Works".to_string()),
            service_areas: vec!["Des Moines".to_string()],
            services: vec![
                "Bathroom Modifications".to_string(),
                "Stair Lift Installation".to_string(),
            ],
            payment_account_id: Some("acct_okafor".to_string()),
            payment_onboarding_complete: true,
            verified: true,
            rating: Some(4.2),
            review_count: Some(11),
        },
        // Still mid-onboarding; stays out of the matching pool until the
        // provider reports full capabilities.
        ContractorProfile {
            id: UserId("contractor-briggs".to_string()),
            display_name: "Lee Briggs".to_string(),
            company_name: None,
            service_areas: vec!["50309".to_string()],
            services: vec!["Grab Bar Installation".to_string()],
            payment_account_id: Some("acct_briggs".to_string()),
            payment_onboarding_complete: false,
            verified: true,
            rating: None,
            review_count: None,
        },
    ];
    for profile in contractors {
        store.upsert_user(UserRecord::Contractor(profile))?;
    }

    assessments.insert(AssessmentSummary {
        id: "assessment-demo".to_string(),
        homeowner_id: UserId("homeowner-demo".to_string()),
        project_types: vec!["bathroom".to_string(), "grab bar".to_string()],
        summary: "Convert the tub to a walk-in shower and add grab bars by the toilet"
            .to_string(),
        estimate: Budget {
            min: 5_000,
            max: 12_000,
        },
    });

    Ok(())
}
