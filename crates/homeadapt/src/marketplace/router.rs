use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::domain::{Caller, LeadId, QuoteId, Role, UserId};
use super::error::MarketError;
use super::leads::{AssessmentSource, CreateLeadRequest, LeadLifecycle};
use super::purchase::{CheckoutGateway, PurchaseService};
use super::quotes::{QuoteManager, QuoteSubmission};
use super::store::MarketStore;
use super::webhook::{self, PaymentEvent, SignatureValidator, SIGNATURE_HEADER};

/// The wired marketplace core: the three managers over one shared store,
/// plus the webhook signature validator when a secret is configured.
pub struct MarketplaceService<S, A, G> {
    pub leads: LeadLifecycle<S, A>,
    pub quotes: QuoteManager<S>,
    pub purchases: PurchaseService<S, G>,
    pub webhook: Option<SignatureValidator>,
}

/// Router builder exposing the marketplace operations. Session identity is
/// established upstream and forwarded as `x-user-id` / `x-user-role`.
pub fn marketplace_router<S, A, G>(service: Arc<MarketplaceService<S, A, G>>) -> Router
where
    S: MarketStore + 'static,
    A: AssessmentSource + 'static,
    G: CheckoutGateway + 'static,
{
    Router::new()
        .route("/api/v1/leads", post(create_lead::<S, A, G>))
        .route("/api/v1/leads/homeowner", get(homeowner_leads::<S, A, G>))
        .route("/api/v1/leads/contractor", get(contractor_leads::<S, A, G>))
        .route("/api/v1/leads/:lead_id", get(lead_detail::<S, A, G>))
        .route("/api/v1/leads/:lead_id/quotes", get(lead_quotes::<S, A, G>))
        .route(
            "/api/v1/leads/:lead_id/complete",
            post(complete_lead::<S, A, G>),
        )
        .route(
            "/api/v1/leads/:lead_id/cancel",
            post(cancel_lead::<S, A, G>),
        )
        .route(
            "/api/v1/leads/:lead_id/purchase",
            post(initiate_purchase::<S, A, G>),
        )
        .route("/api/v1/purchases/verify", post(verify_purchase::<S, A, G>))
        .route("/api/v1/webhooks/payment", post(payment_webhook::<S, A, G>))
        .route("/api/v1/quotes", post(submit_quote::<S, A, G>))
        .route(
            "/api/v1/quotes/contractor",
            get(contractor_quotes::<S, A, G>),
        )
        .route(
            "/api/v1/quotes/:quote_id/accept",
            post(accept_quote::<S, A, G>),
        )
        .route("/api/v1/notifications", get(notifications::<S, A, G>))
        .route(
            "/api/v1/notifications/:notification_id/read",
            post(mark_notification_read::<S, A, G>),
        )
        .with_state(service)
}

fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, MarketError> {
    let user_id = headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or(MarketError::Unauthorized)?;
    let role = headers
        .get("x-user-role")
        .and_then(|value| value.to_str().ok())
        .and_then(Role::parse)
        .ok_or(MarketError::Unauthorized)?;

    Ok(Caller {
        user_id: UserId(user_id.to_string()),
        role,
    })
}

async fn create_lead<S, A, G>(
    State(service): State<Arc<MarketplaceService<S, A, G>>>,
    headers: HeaderMap,
    Json(request): Json<CreateLeadRequest>,
) -> Result<Json<serde_json::Value>, MarketError>
where
    S: MarketStore + 'static,
    A: AssessmentSource + 'static,
    G: CheckoutGateway + 'static,
{
    let caller = caller_from_headers(&headers)?;
    let (lead, matched) = service.leads.create(&caller, request, Utc::now())?;
    Ok(Json(json!({
        "lead_id": lead.id,
        "matched_contractors": matched,
    })))
}

async fn homeowner_leads<S, A, G>(
    State(service): State<Arc<MarketplaceService<S, A, G>>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, MarketError>
where
    S: MarketStore + 'static,
    A: AssessmentSource + 'static,
    G: CheckoutGateway + 'static,
{
    let caller = caller_from_headers(&headers)?;
    let leads = service.leads.leads_for_homeowner(&caller, Utc::now())?;
    Ok(Json(json!({ "leads": leads })))
}

async fn contractor_leads<S, A, G>(
    State(service): State<Arc<MarketplaceService<S, A, G>>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, MarketError>
where
    S: MarketStore + 'static,
    A: AssessmentSource + 'static,
    G: CheckoutGateway + 'static,
{
    let caller = caller_from_headers(&headers)?;
    let leads = service.leads.leads_for_contractor(&caller, Utc::now())?;
    Ok(Json(json!({ "leads": leads })))
}

async fn lead_detail<S, A, G>(
    State(service): State<Arc<MarketplaceService<S, A, G>>>,
    headers: HeaderMap,
    Path(lead_id): Path<String>,
) -> Result<Json<serde_json::Value>, MarketError>
where
    S: MarketStore + 'static,
    A: AssessmentSource + 'static,
    G: CheckoutGateway + 'static,
{
    let caller = caller_from_headers(&headers)?;
    let view = service
        .leads
        .view(&caller, &LeadId(lead_id), Utc::now())?;
    Ok(Json(json!({ "lead": view })))
}

async fn lead_quotes<S, A, G>(
    State(service): State<Arc<MarketplaceService<S, A, G>>>,
    headers: HeaderMap,
    Path(lead_id): Path<String>,
) -> Result<Json<serde_json::Value>, MarketError>
where
    S: MarketStore + 'static,
    A: AssessmentSource + 'static,
    G: CheckoutGateway + 'static,
{
    let caller = caller_from_headers(&headers)?;
    let lead_id = LeadId(lead_id);
    // Quotes are visible to the lead's homeowner (or an admin) only.
    service.leads.authorize_owner(&caller, &lead_id)?;
    let quotes = service.quotes.quotes_for_lead(&lead_id, Utc::now())?;
    Ok(Json(json!({ "quotes": quotes })))
}

async fn complete_lead<S, A, G>(
    State(service): State<Arc<MarketplaceService<S, A, G>>>,
    headers: HeaderMap,
    Path(lead_id): Path<String>,
) -> Result<Json<serde_json::Value>, MarketError>
where
    S: MarketStore + 'static,
    A: AssessmentSource + 'static,
    G: CheckoutGateway + 'static,
{
    let caller = caller_from_headers(&headers)?;
    let lead = service
        .leads
        .complete(&caller, &LeadId(lead_id), Utc::now())?;
    Ok(Json(json!({ "lead_id": lead.id, "status": lead.status })))
}

async fn cancel_lead<S, A, G>(
    State(service): State<Arc<MarketplaceService<S, A, G>>>,
    headers: HeaderMap,
    Path(lead_id): Path<String>,
) -> Result<Json<serde_json::Value>, MarketError>
where
    S: MarketStore + 'static,
    A: AssessmentSource + 'static,
    G: CheckoutGateway + 'static,
{
    let caller = caller_from_headers(&headers)?;
    let lead = service
        .leads
        .cancel(&caller, &LeadId(lead_id), Utc::now())?;
    Ok(Json(json!({ "lead_id": lead.id, "status": lead.status })))
}

async fn initiate_purchase<S, A, G>(
    State(service): State<Arc<MarketplaceService<S, A, G>>>,
    headers: HeaderMap,
    Path(lead_id): Path<String>,
) -> Result<Json<serde_json::Value>, MarketError>
where
    S: MarketStore + 'static,
    A: AssessmentSource + 'static,
    G: CheckoutGateway + 'static,
{
    let caller = caller_from_headers(&headers)?;
    let handle = service.purchases.initiate(&caller, &LeadId(lead_id))?;
    Ok(Json(json!({
        "session_id": handle.session_id,
        "checkout_url": handle.checkout_url,
    })))
}

#[derive(Debug, Deserialize)]
struct VerifyPurchaseRequest {
    session_id: String,
    lead_id: LeadId,
}

async fn verify_purchase<S, A, G>(
    State(service): State<Arc<MarketplaceService<S, A, G>>>,
    headers: HeaderMap,
    Json(request): Json<VerifyPurchaseRequest>,
) -> Result<Json<serde_json::Value>, MarketError>
where
    S: MarketStore + 'static,
    A: AssessmentSource + 'static,
    G: CheckoutGateway + 'static,
{
    let caller = caller_from_headers(&headers)?;
    let outcome = service.purchases.verify(
        &caller,
        &request.session_id,
        &request.lead_id,
        Utc::now(),
    )?;
    Ok(Json(json!({ "success": true, "outcome": outcome })))
}

async fn payment_webhook<S, A, G>(
    State(service): State<Arc<MarketplaceService<S, A, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, MarketError>
where
    S: MarketStore + 'static,
    A: AssessmentSource + 'static,
    G: CheckoutGateway + 'static,
{
    let Some(validator) = service.webhook.as_ref() else {
        tracing::warn!("webhook delivery rejected: no signing secret configured");
        return Err(MarketError::SignatureInvalid);
    };
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(MarketError::SignatureInvalid)?;
    validator
        .verify(&body, signature)
        .map_err(|_| MarketError::SignatureInvalid)?;

    match webhook::parse_event(&body)
        .map_err(|err| MarketError::Validation(err.to_string()))?
    {
        PaymentEvent::CheckoutCompleted(session) => {
            service.purchases.on_checkout_completed(&session, Utc::now())?;
        }
        PaymentEvent::AccountUpdated {
            account_id,
            charges_enabled,
            payouts_enabled,
        } => {
            service
                .purchases
                .on_account_updated(&account_id, charges_enabled, payouts_enabled)?;
        }
        PaymentEvent::Unhandled(event_type) => {
            debug!(event = %event_type, "ignoring unhandled webhook event");
        }
    }

    Ok(Json(json!({ "received": true })))
}

async fn submit_quote<S, A, G>(
    State(service): State<Arc<MarketplaceService<S, A, G>>>,
    headers: HeaderMap,
    Json(submission): Json<QuoteSubmission>,
) -> Result<Json<serde_json::Value>, MarketError>
where
    S: MarketStore + 'static,
    A: AssessmentSource + 'static,
    G: CheckoutGateway + 'static,
{
    let caller = caller_from_headers(&headers)?;
    let quote = service.quotes.submit(&caller, submission, Utc::now())?;
    Ok(Json(json!({ "quote_id": quote.id })))
}

#[derive(Debug, Deserialize)]
struct AcceptQuoteRequest {
    lead_id: LeadId,
}

async fn accept_quote<S, A, G>(
    State(service): State<Arc<MarketplaceService<S, A, G>>>,
    headers: HeaderMap,
    Path(quote_id): Path<String>,
    Json(request): Json<AcceptQuoteRequest>,
) -> Result<Json<serde_json::Value>, MarketError>
where
    S: MarketStore + 'static,
    A: AssessmentSource + 'static,
    G: CheckoutGateway + 'static,
{
    let caller = caller_from_headers(&headers)?;
    // The manager does not re-verify ownership; authorize here.
    service.leads.authorize_owner(&caller, &request.lead_id)?;
    let acceptance = service
        .quotes
        .accept(&QuoteId(quote_id), &request.lead_id, Utc::now())?;
    Ok(Json(json!({
        "accepted": acceptance.accepted.id,
        "rejected": acceptance.rejected,
    })))
}

async fn contractor_quotes<S, A, G>(
    State(service): State<Arc<MarketplaceService<S, A, G>>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, MarketError>
where
    S: MarketStore + 'static,
    A: AssessmentSource + 'static,
    G: CheckoutGateway + 'static,
{
    let caller = caller_from_headers(&headers)?;
    if caller.role != Role::Contractor {
        return Err(MarketError::Forbidden(
            "contractor account required".to_string(),
        ));
    }
    let quotes = service.quotes.quotes_for_contractor(&caller, Utc::now())?;
    Ok(Json(json!({ "quotes": quotes })))
}

async fn notifications<S, A, G>(
    State(service): State<Arc<MarketplaceService<S, A, G>>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, MarketError>
where
    S: MarketStore + 'static,
    A: AssessmentSource + 'static,
    G: CheckoutGateway + 'static,
{
    let caller = caller_from_headers(&headers)?;
    let notifications = service.leads.notifications(&caller)?;
    Ok(Json(json!({ "notifications": notifications })))
}

async fn mark_notification_read<S, A, G>(
    State(service): State<Arc<MarketplaceService<S, A, G>>>,
    headers: HeaderMap,
    Path(notification_id): Path<String>,
) -> Result<Json<serde_json::Value>, MarketError>
where
    S: MarketStore + 'static,
    A: AssessmentSource + 'static,
    G: CheckoutGateway + 'static,
{
    let caller = caller_from_headers(&headers)?;
    service
        .leads
        .mark_notification_read(&caller, &notification_id)?;
    Ok(Json(json!({ "ok": true })))
}
