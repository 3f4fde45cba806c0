use crate::infra::{build_marketplace, seed_demo_data};
use chrono::Utc;
use clap::Args;
use homeadapt::error::AppError;
use homeadapt::marketplace::domain::{Caller, QuoteLineItem, Role, UserId};
use homeadapt::marketplace::{CreateLeadRequest, MarketStore, QuoteSubmission};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Skip the payment-provider webhook portion of the demo.
    #[arg(long)]
    pub(crate) skip_webhook: bool,
}

/// Canned end-to-end scenario over the seeded in-memory marketplace:
/// assessment intake, matching, purchase reconciliation, quoting, and
/// acceptance.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let (service, store, assessments, gateway) = build_marketplace(None);
    seed_demo_data(&store, &assessments)?;

    let homeowner = Caller {
        user_id: UserId("homeowner-demo".to_string()),
        role: Role::Homeowner,
    };
    let alvarez = Caller {
        user_id: UserId("contractor-alvarez".to_string()),
        role: Role::Contractor,
    };
    let okafor = Caller {
        user_id: UserId("contractor-okafor".to_string()),
        role: Role::Contractor,
    };

    println!("Lead marketplace demo");
    println!("=====================");

    let (lead, matched) = service.leads.create(
        &homeowner,
        CreateLeadRequest {
            assessment_id: "assessment-demo".to_string(),
            address: homeadapt::marketplace::domain::Address {
                street: "902 Walnut St".to_string(),
                city: "Des Moines".to_string(),
                state: "IA".to_string(),
                zip: "50309".to_string(),
            },
            phone: None,
            urgency: None,
            description: None,
        },
        Utc::now(),
    )?;
    println!(
        "\nLead {} created from the assessment and matched to {} contractor(s):",
        lead.id.0, matched
    );
    for contractor_id in &lead.matched_contractors {
        println!("  - {}", contractor_id.0);
    }

    if !args.skip_webhook {
        // The provider finishes Lee Briggs' onboarding; re-running the match
        // pulls the now-eligible contractor in.
        service
            .purchases
            .on_account_updated("acct_briggs", true, true)?;
        service.leads.run_matching(&lead.id, Utc::now())?;
        let refreshed = store
            .lead(&lead.id)
            .map_err(homeadapt::marketplace::MarketError::from)?
            .ok_or(homeadapt::marketplace::MarketError::NotFound("lead"))?;
        println!(
            "\nAfter onboarding webhook, the lead covers {} contractor(s).",
            refreshed.matched_contractors.len()
        );
    }

    // Maria Alvarez buys contact access. The verify call and the provider
    // webhook race to record it; the second trigger is a no-op.
    let handle = service.purchases.initiate(&alvarez, &lead.id)?;
    let outcome = service
        .purchases
        .verify(&alvarez, &handle.session_id, &lead.id, Utc::now())?;
    println!(
        "\nAlvarez purchased the lead via session {} ({outcome:?}).",
        handle.session_id
    );
    if let Some(session) = gateway.session(&handle.session_id) {
        let replay = service.purchases.on_checkout_completed(&session, Utc::now())?;
        println!("Webhook replay for the same session: {replay:?}.");
    }

    let handle = service.purchases.initiate(&okafor, &lead.id)?;
    service
        .purchases
        .verify(&okafor, &handle.session_id, &lead.id, Utc::now())?;
    println!("Okafor purchased the lead via session {}.", handle.session_id);

    let alvarez_quote = service.quotes.submit(
        &alvarez,
        QuoteSubmission {
            lead_id: lead.id.clone(),
            breakdown: vec![
                QuoteLineItem {
                    item: "Walk-in shower conversion".to_string(),
                    cost: 420_000,
                    description: Some("Curbless entry, tiled walls".to_string()),
                },
                QuoteLineItem {
                    item: "Grab bar installation".to_string(),
                    cost: 80_000,
                    description: None,
                },
            ],
            estimated_duration: "2-3 weeks".to_string(),
            valid_days: None,
            notes: Some("Can start within two weeks.".to_string()),
        },
        Utc::now(),
    )?;
    let okafor_quote = service.quotes.submit(
        &okafor,
        QuoteSubmission {
            lead_id: lead.id.clone(),
            breakdown: vec![QuoteLineItem {
                item: "Full bathroom accessibility package".to_string(),
                cost: 650_000,
                description: None,
            }],
            estimated_duration: "4 weeks".to_string(),
            valid_days: Some(21),
            notes: None,
        },
        Utc::now(),
    )?;
    println!(
        "\nQuotes received: {} (${:.2}) and {} (${:.2}).",
        alvarez_quote.id.0,
        f64::from(alvarez_quote.amount_cents) / 100.0,
        okafor_quote.id.0,
        f64::from(okafor_quote.amount_cents) / 100.0,
    );

    service.leads.authorize_owner(&homeowner, &lead.id)?;
    let acceptance = service
        .quotes
        .accept(&alvarez_quote.id, &lead.id, Utc::now())?;
    println!(
        "\nHomeowner accepted {} ; {} sibling quote(s) rejected in the same write.",
        acceptance.accepted.id.0,
        acceptance.rejected.len()
    );

    let completed = service.leads.complete(&homeowner, &lead.id, Utc::now())?;
    println!("\nProject closed out with status '{}'.", completed.status.label());

    Ok(())
}
