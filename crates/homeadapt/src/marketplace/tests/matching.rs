use super::common::*;
use crate::marketplace::domain::{LeadStatus, NotificationKind, UserId};
use crate::marketplace::{MarketError, MarketStore};

#[test]
fn lead_creation_matches_eligible_contractors_and_notifies_them() {
    let (service, store, _) = build_service();

    let (lead, matched) = service
        .leads
        .create(&homeowner_caller(), create_lead_request(), now())
        .expect("lead created");

    assert_eq!(matched, 3);
    assert_eq!(lead.status, LeadStatus::Matched);
    assert_eq!(lead.matched_contractors.len(), 3);
    assert_eq!(lead.price_cents, 2_500);

    for suffix in ["1", "2", "3"] {
        let inbox = store
            .notifications_for_contractor(&UserId(format!("contractor-{suffix}")))
            .expect("inbox");
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::NewLead);
        assert_eq!(inbox[0].lead_id, lead.id);
    }
}

#[test]
fn ineligible_contractors_never_enter_the_pool() {
    let mut unverified = contractor("unverified");
    unverified.verified = false;
    let mut unboarded = contractor("unboarded");
    unboarded.payment_onboarding_complete = false;

    let (service, _, _) =
        build_service_with_contractors(vec![contractor("ok"), unverified, unboarded]);

    let (lead, matched) = service
        .leads
        .create(&homeowner_caller(), create_lead_request(), now())
        .expect("lead created");

    assert_eq!(matched, 1);
    assert_eq!(
        lead.matched_contractors,
        vec![UserId("contractor-ok".to_string())]
    );
}

#[test]
fn lead_with_no_scoring_contractors_stays_pending() {
    let mut distant = contractor("far");
    distant.service_areas = vec!["97201".to_string()];
    distant.services = vec!["Roofing".to_string()];
    distant.rating = None;
    distant.review_count = None;

    let (service, _, _) = build_service_with_contractors(vec![distant]);

    let (lead, matched) = service
        .leads
        .create(&homeowner_caller(), create_lead_request(), now())
        .expect("lead created");

    assert_eq!(matched, 0);
    assert_eq!(lead.status, LeadStatus::Pending);
    assert!(lead.matched_contractors.is_empty());
}

#[test]
fn rerunning_matching_is_idempotent_and_does_not_renotify() {
    let (service, store, _) = build_service();

    let (lead, _) = service
        .leads
        .create(&homeowner_caller(), create_lead_request(), now())
        .expect("lead created");

    service
        .leads
        .run_matching(&lead.id, now())
        .expect("second matching pass");

    let lead = store.lead(&lead.id).expect("fetch").expect("present");
    assert_eq!(lead.matched_contractors.len(), 3);

    let inbox = store
        .notifications_for_contractor(&UserId("contractor-1".to_string()))
        .expect("inbox");
    assert_eq!(inbox.len(), 1, "no duplicate notification on re-match");
}

#[test]
fn only_the_recipient_can_mark_a_notification_read() {
    let (service, _, _) = build_service();

    service
        .leads
        .create(&homeowner_caller(), create_lead_request(), now())
        .expect("lead created");

    let inbox = service
        .leads
        .notifications(&contractor_caller("1"))
        .expect("inbox");
    let notification_id = inbox[0].id.clone();

    assert!(matches!(
        service
            .leads
            .mark_notification_read(&contractor_caller("2"), &notification_id),
        Err(MarketError::NotFound("notification"))
    ));

    service
        .leads
        .mark_notification_read(&contractor_caller("1"), &notification_id)
        .expect("own notification marked");
    let inbox = service
        .leads
        .notifications(&contractor_caller("1"))
        .expect("inbox");
    assert!(inbox[0].read);
}
