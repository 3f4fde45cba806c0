use chrono::Duration;

use super::common::*;
use crate::marketplace::domain::{Lead, LeadStatus, QuoteLineItem, QuoteStatus};
use crate::marketplace::{MarketError, QuoteSubmission};

fn line(item: &str, cost: u32) -> QuoteLineItem {
    QuoteLineItem {
        item: item.to_string(),
        cost,
        description: None,
    }
}

fn submission(lead: &Lead, breakdown: Vec<QuoteLineItem>) -> QuoteSubmission {
    QuoteSubmission {
        lead_id: lead.id.clone(),
        breakdown,
        estimated_duration: "2-3 weeks".to_string(),
        valid_days: None,
        notes: None,
    }
}

/// Create a lead and put contractors 1 and 2 through purchase so both may
/// quote it.
fn quotable_lead() -> (std::sync::Arc<TestService>, Lead) {
    let (service, _, _) = build_service();
    let (lead, _) = service
        .leads
        .create(&homeowner_caller(), create_lead_request(), now())
        .expect("lead created");
    purchase_lead(&service, &contractor_caller("1"), &lead.id);
    purchase_lead(&service, &contractor_caller("2"), &lead.id);
    (service, lead)
}

#[test]
fn amount_is_derived_and_invalid_lines_are_dropped() {
    let (service, lead) = quotable_lead();

    let quote = service
        .quotes
        .submit(
            &contractor_caller("1"),
            submission(
                &lead,
                vec![
                    line("Walk-in shower", 420_000),
                    line("   ", 50_000),
                    line("Permit fee", 0),
                    line("Grab bars", 80_000),
                ],
            ),
            now(),
        )
        .expect("quote accepted for storage");

    assert_eq!(quote.amount_cents, 500_000);
    assert_eq!(quote.breakdown.len(), 2);
    assert_eq!(quote.valid_until, now() + Duration::days(14));
    assert_eq!(quote.status, QuoteStatus::Pending);
}

#[test]
fn a_quote_with_no_valid_lines_is_rejected() {
    let (service, lead) = quotable_lead();

    let result = service.quotes.submit(
        &contractor_caller("1"),
        submission(&lead, vec![line("", 100), line("Labor", 0)]),
        now(),
    );
    assert!(matches!(result, Err(MarketError::Validation(_))));
}

#[test]
fn non_positive_validity_windows_are_rejected() {
    let (service, lead) = quotable_lead();

    let mut bad = submission(&lead, vec![line("Labor", 100_000)]);
    bad.valid_days = Some(0);
    assert!(matches!(
        service.quotes.submit(&contractor_caller("1"), bad, now()),
        Err(MarketError::Validation(_))
    ));

    let mut custom = submission(&lead, vec![line("Labor", 100_000)]);
    custom.valid_days = Some(30);
    let quote = service
        .quotes
        .submit(&contractor_caller("1"), custom, now())
        .expect("custom window accepted");
    assert_eq!(quote.valid_until, now() + Duration::days(30));
}

#[test]
fn oversized_validity_windows_are_rejected_not_overflowed() {
    let (service, lead) = quotable_lead();

    // Wire input: anything up to i64::MAX can arrive here.
    for days in [366, i64::MAX] {
        let mut huge = submission(&lead, vec![line("Labor", 100_000)]);
        huge.valid_days = Some(days);
        assert!(matches!(
            service.quotes.submit(&contractor_caller("1"), huge, now()),
            Err(MarketError::Validation(_))
        ));
    }

    let mut max = submission(&lead, vec![line("Labor", 100_000)]);
    max.valid_days = Some(365);
    let quote = service
        .quotes
        .submit(&contractor_caller("1"), max, now())
        .expect("year-long window accepted");
    assert_eq!(quote.valid_until, now() + Duration::days(365));
}

#[test]
fn quoting_requires_purchase_when_the_lead_is_paid() {
    let (service, _, _) = build_service();
    let (lead, _) = service
        .leads
        .create(&homeowner_caller(), create_lead_request(), now())
        .expect("lead created");

    let result = service.quotes.submit(
        &contractor_caller("1"),
        submission(&lead, vec![line("Labor", 100_000)]),
        now(),
    );
    assert!(matches!(result, Err(MarketError::Forbidden(_))));
}

#[test]
fn duplicate_quotes_on_a_lead_conflict() {
    let (service, lead) = quotable_lead();
    let caller = contractor_caller("1");

    service
        .quotes
        .submit(&caller, submission(&lead, vec![line("Labor", 100_000)]), now())
        .expect("first quote");
    let result = service.quotes.submit(
        &caller,
        submission(&lead, vec![line("Labor", 90_000)]),
        now(),
    );
    assert!(matches!(result, Err(MarketError::Conflict(_))));
}

#[test]
fn submission_moves_the_lead_to_quoted() {
    let (service, lead) = quotable_lead();

    service
        .quotes
        .submit(
            &contractor_caller("1"),
            submission(&lead, vec![line("Labor", 100_000)]),
            now(),
        )
        .expect("quote");

    let view = service
        .leads
        .view(&homeowner_caller(), &lead.id, now())
        .expect("view");
    assert_eq!(view.status, LeadStatus::Quoted);
}

#[test]
fn accepting_one_quote_rejects_the_other_and_accepts_the_lead() {
    let (service, lead) = quotable_lead();

    let first = service
        .quotes
        .submit(
            &contractor_caller("1"),
            submission(&lead, vec![line("Full remodel", 500_000)]),
            now(),
        )
        .expect("first quote");
    let second = service
        .quotes
        .submit(
            &contractor_caller("2"),
            submission(&lead, vec![line("Full remodel", 650_000)]),
            now(),
        )
        .expect("second quote");

    let acceptance = service
        .quotes
        .accept(&second.id, &lead.id, now())
        .expect("acceptance cascade");
    assert_eq!(acceptance.accepted.id, second.id);
    assert_eq!(acceptance.accepted.status, QuoteStatus::Accepted);
    assert_eq!(acceptance.rejected, vec![first.id.clone()]);

    let quotes = service
        .quotes
        .quotes_for_lead(&lead.id, now())
        .expect("quotes");
    let rejected = quotes
        .iter()
        .find(|quote| quote.id == first.id)
        .expect("first quote present");
    assert_eq!(rejected.status, QuoteStatus::Rejected);

    let view = service
        .leads
        .view(&homeowner_caller(), &lead.id, now())
        .expect("view");
    assert_eq!(view.status, LeadStatus::Accepted);
}

#[test]
fn re_accepting_the_winner_is_a_no_op_but_switching_conflicts() {
    let (service, lead) = quotable_lead();

    let first = service
        .quotes
        .submit(
            &contractor_caller("1"),
            submission(&lead, vec![line("Full remodel", 500_000)]),
            now(),
        )
        .expect("first quote");
    let second = service
        .quotes
        .submit(
            &contractor_caller("2"),
            submission(&lead, vec![line("Full remodel", 650_000)]),
            now(),
        )
        .expect("second quote");

    service
        .quotes
        .accept(&second.id, &lead.id, now())
        .expect("accept");

    let replay = service
        .quotes
        .accept(&second.id, &lead.id, now())
        .expect("idempotent re-accept");
    assert!(replay.rejected.is_empty());

    assert!(matches!(
        service.quotes.accept(&first.id, &lead.id, now()),
        Err(MarketError::Conflict(_))
    ));
}

#[test]
fn closed_leads_take_no_further_quotes() {
    let (service, lead) = quotable_lead();

    let quote = service
        .quotes
        .submit(
            &contractor_caller("1"),
            submission(&lead, vec![line("Full remodel", 500_000)]),
            now(),
        )
        .expect("quote");
    service
        .quotes
        .accept(&quote.id, &lead.id, now())
        .expect("accept");

    let late = service.quotes.submit(
        &contractor_caller("2"),
        submission(&lead, vec![line("Late bid", 400_000)]),
        now(),
    );
    assert!(matches!(late, Err(MarketError::Conflict(_))));
}

#[test]
fn accepting_a_quote_against_the_wrong_lead_is_not_found() {
    let (service, lead) = quotable_lead();

    let quote = service
        .quotes
        .submit(
            &contractor_caller("1"),
            submission(&lead, vec![line("Full remodel", 500_000)]),
            now(),
        )
        .expect("quote");

    let other_lead = crate::marketplace::LeadId("lead-999999".to_string());
    assert!(matches!(
        service.quotes.accept(&quote.id, &other_lead, now()),
        Err(MarketError::NotFound(_))
    ));
}

#[test]
fn contractor_quote_listing_shows_own_quotes_only() {
    let (service, lead) = quotable_lead();

    service
        .quotes
        .submit(
            &contractor_caller("1"),
            submission(&lead, vec![line("Full remodel", 500_000)]),
            now(),
        )
        .expect("quote");

    let mine = service
        .quotes
        .quotes_for_contractor(&contractor_caller("1"), now())
        .expect("own quotes");
    assert_eq!(mine.len(), 1);

    let theirs = service
        .quotes
        .quotes_for_contractor(&contractor_caller("2"), now())
        .expect("other quotes");
    assert!(theirs.is_empty());
}
