use super::common::*;
use crate::marketplace::domain::{Caller, LeadStatus, Role, UserId};
use crate::marketplace::{MarketError, MarketStore};

#[test]
fn homeowner_and_admin_see_full_views_matched_contractor_sees_redacted() {
    let (service, _, _) = build_service();
    let (lead, _) = service
        .leads
        .create(&homeowner_caller(), create_lead_request(), now())
        .expect("lead created");

    let owner_view = service
        .leads
        .view(&homeowner_caller(), &lead.id, now())
        .expect("owner view");
    assert!(owner_view.homeowner.is_some());
    assert!(owner_view.address.street.is_some());

    let admin = Caller {
        user_id: UserId("admin-1".to_string()),
        role: Role::Admin,
    };
    let admin_view = service.leads.view(&admin, &lead.id, now()).expect("admin view");
    assert!(admin_view.homeowner.is_some());

    let contractor_view = service
        .leads
        .view(&contractor_caller("1"), &lead.id, now())
        .expect("matched contractor view");
    assert!(contractor_view.homeowner.is_none());
    assert!(contractor_view.address.street.is_none());
    assert_eq!(contractor_view.address.zip, "50309");
}

#[test]
fn unmatched_contractor_cannot_view_the_lead() {
    let (service, _, _) = build_service();
    let (lead, _) = service
        .leads
        .create(&homeowner_caller(), create_lead_request(), now())
        .expect("lead created");

    let outsider = contractor_caller("outsider");
    assert!(matches!(
        service.leads.view(&outsider, &lead.id, now()),
        Err(MarketError::Forbidden(_))
    ));
}

#[test]
fn lead_creation_requires_owning_the_assessment() {
    let (service, _, _) = build_service();

    let other = Caller {
        user_id: UserId("homeowner-2".to_string()),
        role: Role::Homeowner,
    };
    assert!(matches!(
        service.leads.create(&other, create_lead_request(), now()),
        Err(MarketError::NotFound("assessment"))
    ));
}

#[test]
fn complete_requires_an_accepted_lead() {
    let (service, store, _) = build_service();
    let (lead, _) = service
        .leads
        .create(&homeowner_caller(), create_lead_request(), now())
        .expect("lead created");

    assert!(matches!(
        service.leads.complete(&homeowner_caller(), &lead.id, now()),
        Err(MarketError::Conflict(_))
    ));

    store
        .update_lead(&lead.id, now(), &mut |lead| {
            lead.status = LeadStatus::Accepted;
        })
        .expect("force accepted");

    let completed = service
        .leads
        .complete(&homeowner_caller(), &lead.id, now())
        .expect("completes");
    assert_eq!(completed.status, LeadStatus::Completed);
}

#[test]
fn cancel_reaches_any_non_terminal_state_but_not_terminal_ones() {
    let (service, _, _) = build_service();
    let (lead, _) = service
        .leads
        .create(&homeowner_caller(), create_lead_request(), now())
        .expect("lead created");

    let cancelled = service
        .leads
        .cancel(&homeowner_caller(), &lead.id, now())
        .expect("cancel from matched");
    assert_eq!(cancelled.status, LeadStatus::Cancelled);

    assert!(matches!(
        service.leads.cancel(&homeowner_caller(), &lead.id, now()),
        Err(MarketError::Conflict(_))
    ));
}

#[test]
fn only_the_owner_may_cancel() {
    let (service, _, _) = build_service();
    let (lead, _) = service
        .leads
        .create(&homeowner_caller(), create_lead_request(), now())
        .expect("lead created");

    assert!(matches!(
        service.leads.cancel(&contractor_caller("1"), &lead.id, now()),
        Err(MarketError::Forbidden(_))
    ));
}

#[test]
fn listing_queries_are_scoped_to_the_caller() {
    let (service, _, _) = build_service();
    let (lead, _) = service
        .leads
        .create(&homeowner_caller(), create_lead_request(), now())
        .expect("lead created");

    let mine = service
        .leads
        .leads_for_homeowner(&homeowner_caller(), now())
        .expect("homeowner list");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, lead.id);

    let theirs = service
        .leads
        .leads_for_contractor(&contractor_caller("1"), now())
        .expect("contractor list");
    assert_eq!(theirs.len(), 1);
    assert!(theirs[0].homeowner.is_none());

    // Cancelled leads fall out of the contractor listing.
    service
        .leads
        .cancel(&homeowner_caller(), &lead.id, now())
        .expect("cancel");
    let theirs = service
        .leads
        .leads_for_contractor(&contractor_caller("1"), now())
        .expect("contractor list");
    assert!(theirs.is_empty());
}
