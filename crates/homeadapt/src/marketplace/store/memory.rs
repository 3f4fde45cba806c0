use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::{MarketStore, PurchaseWrite, QuoteAcceptance, StoreError};
use crate::marketplace::domain::{
    ContractorProfile, Lead, LeadId, LeadStatus, Notification, Quote, QuoteId, QuoteStatus,
    TransactionRecord, UserId, UserRecord,
};

#[derive(Default)]
struct Collections {
    users: HashMap<UserId, UserRecord>,
    leads: HashMap<LeadId, Lead>,
    quotes: HashMap<QuoteId, Quote>,
    transactions: HashMap<String, TransactionRecord>,
    notifications: Vec<Notification>,
}

/// All collections live behind a single mutex so the composite operations
/// (`record_purchase`, `finalize_quote_acceptance`) are serializable without
/// further coordination.
#[derive(Default, Clone)]
pub struct InMemoryMarketStore {
    inner: Arc<Mutex<Collections>>,
}

impl InMemoryMarketStore {
    fn lock(&self) -> Result<MutexGuard<'_, Collections>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl MarketStore for InMemoryMarketStore {
    fn upsert_user(&self, record: UserRecord) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        guard.users.insert(record.id().clone(), record);
        Ok(())
    }

    fn user(&self, id: &UserId) -> Result<Option<UserRecord>, StoreError> {
        let guard = self.lock()?;
        Ok(guard.users.get(id).cloned())
    }

    fn contractor(&self, id: &UserId) -> Result<Option<ContractorProfile>, StoreError> {
        let guard = self.lock()?;
        Ok(guard.users.get(id).and_then(|record| match record {
            UserRecord::Contractor(profile) => Some(profile.clone()),
            _ => None,
        }))
    }

    fn eligible_contractors(&self) -> Result<Vec<ContractorProfile>, StoreError> {
        let guard = self.lock()?;
        let mut pool: Vec<ContractorProfile> = guard
            .users
            .values()
            .filter_map(|record| match record {
                UserRecord::Contractor(profile) if profile.is_eligible() => Some(profile.clone()),
                _ => None,
            })
            .collect();
        pool.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(pool)
    }

    fn contractor_by_payment_account(
        &self,
        account_id: &str,
    ) -> Result<Option<ContractorProfile>, StoreError> {
        let guard = self.lock()?;
        Ok(guard.users.values().find_map(|record| match record {
            UserRecord::Contractor(profile)
                if profile.payment_account_id.as_deref() == Some(account_id) =>
            {
                Some(profile.clone())
            }
            _ => None,
        }))
    }

    fn update_contractor(
        &self,
        id: &UserId,
        apply: &mut dyn FnMut(&mut ContractorProfile),
    ) -> Result<ContractorProfile, StoreError> {
        let mut guard = self.lock()?;
        match guard.users.get_mut(id) {
            Some(UserRecord::Contractor(profile)) => {
                apply(profile);
                Ok(profile.clone())
            }
            _ => Err(StoreError::NotFound),
        }
    }

    fn insert_lead(&self, lead: Lead) -> Result<Lead, StoreError> {
        let mut guard = self.lock()?;
        if guard.leads.contains_key(&lead.id) {
            return Err(StoreError::Conflict);
        }
        guard.leads.insert(lead.id.clone(), lead.clone());
        Ok(lead)
    }

    fn lead(&self, id: &LeadId) -> Result<Option<Lead>, StoreError> {
        let guard = self.lock()?;
        Ok(guard.leads.get(id).cloned())
    }

    fn update_lead(
        &self,
        id: &LeadId,
        now: DateTime<Utc>,
        apply: &mut dyn FnMut(&mut Lead),
    ) -> Result<Lead, StoreError> {
        let mut guard = self.lock()?;
        let lead = guard.leads.get_mut(id).ok_or(StoreError::NotFound)?;
        apply(lead);
        lead.updated_at = now;
        Ok(lead.clone())
    }

    fn leads_for_homeowner(&self, homeowner_id: &UserId) -> Result<Vec<Lead>, StoreError> {
        let guard = self.lock()?;
        let mut leads: Vec<Lead> = guard
            .leads
            .values()
            .filter(|lead| &lead.homeowner_id == homeowner_id)
            .cloned()
            .collect();
        leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(leads)
    }

    fn leads_for_contractor(&self, contractor_id: &UserId) -> Result<Vec<Lead>, StoreError> {
        let guard = self.lock()?;
        let mut leads: Vec<Lead> = guard
            .leads
            .values()
            .filter(|lead| {
                lead.is_matched_to(contractor_id) && lead.status.visible_to_contractors()
            })
            .cloned()
            .collect();
        leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(leads)
    }

    fn insert_quote(&self, quote: Quote) -> Result<Quote, StoreError> {
        let mut guard = self.lock()?;
        if guard.quotes.contains_key(&quote.id) {
            return Err(StoreError::Conflict);
        }
        guard.quotes.insert(quote.id.clone(), quote.clone());
        Ok(quote)
    }

    fn quote(&self, id: &QuoteId) -> Result<Option<Quote>, StoreError> {
        let guard = self.lock()?;
        Ok(guard.quotes.get(id).cloned())
    }

    fn quotes_for_lead(&self, lead_id: &LeadId) -> Result<Vec<Quote>, StoreError> {
        let guard = self.lock()?;
        let mut quotes: Vec<Quote> = guard
            .quotes
            .values()
            .filter(|quote| &quote.lead_id == lead_id)
            .cloned()
            .collect();
        quotes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(quotes)
    }

    fn quotes_for_contractor(&self, contractor_id: &UserId) -> Result<Vec<Quote>, StoreError> {
        let guard = self.lock()?;
        let mut quotes: Vec<Quote> = guard
            .quotes
            .values()
            .filter(|quote| &quote.contractor_id == contractor_id)
            .cloned()
            .collect();
        quotes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(quotes)
    }

    fn finalize_quote_acceptance(
        &self,
        lead_id: &LeadId,
        quote_id: &QuoteId,
        now: DateTime<Utc>,
    ) -> Result<QuoteAcceptance, StoreError> {
        let mut guard = self.lock()?;

        let target = guard.quotes.get(quote_id).ok_or(StoreError::NotFound)?;
        if &target.lead_id != lead_id {
            return Err(StoreError::NotFound);
        }
        if !guard.leads.contains_key(lead_id) {
            return Err(StoreError::NotFound);
        }

        // Re-accepting the winner is a no-op so a retried request cannot fail.
        if target.status == QuoteStatus::Accepted {
            return Ok(QuoteAcceptance {
                accepted: target.clone(),
                rejected: Vec::new(),
            });
        }
        if target.status != QuoteStatus::Pending {
            return Err(StoreError::Conflict);
        }
        let another_accepted = guard
            .quotes
            .values()
            .any(|quote| &quote.lead_id == lead_id && quote.status == QuoteStatus::Accepted);
        if another_accepted {
            return Err(StoreError::Conflict);
        }

        let mut rejected = Vec::new();
        for quote in guard.quotes.values_mut() {
            if &quote.lead_id != lead_id {
                continue;
            }
            if &quote.id == quote_id {
                quote.status = QuoteStatus::Accepted;
                quote.updated_at = now;
            } else if quote.status == QuoteStatus::Pending {
                quote.status = QuoteStatus::Rejected;
                quote.updated_at = now;
                rejected.push(quote.id.clone());
            }
        }

        let lead = guard.leads.get_mut(lead_id).ok_or(StoreError::NotFound)?;
        lead.status = LeadStatus::Accepted;
        lead.updated_at = now;

        let accepted = guard
            .quotes
            .get(quote_id)
            .cloned()
            .ok_or(StoreError::NotFound)?;
        Ok(QuoteAcceptance { accepted, rejected })
    }

    fn transaction(&self, session_id: &str) -> Result<Option<TransactionRecord>, StoreError> {
        let guard = self.lock()?;
        Ok(guard.transactions.get(session_id).cloned())
    }

    fn record_purchase(
        &self,
        lead_id: &LeadId,
        contractor_id: &UserId,
        entry: TransactionRecord,
        now: DateTime<Utc>,
    ) -> Result<PurchaseWrite, StoreError> {
        let mut guard = self.lock()?;
        let lead = guard.leads.get_mut(lead_id).ok_or(StoreError::NotFound)?;

        if lead.is_purchased_by(contractor_id) {
            return Ok(PurchaseWrite::AlreadyRecorded);
        }

        lead.add_purchaser(contractor_id.clone());
        lead.updated_at = now;

        let key = entry.external_session_id.clone();
        guard.transactions.entry(key).or_insert(entry);

        Ok(PurchaseWrite::Recorded)
    }

    fn push_notification(&self, notification: Notification) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        guard.notifications.push(notification);
        Ok(())
    }

    fn notifications_for_contractor(
        &self,
        contractor_id: &UserId,
    ) -> Result<Vec<Notification>, StoreError> {
        let guard = self.lock()?;
        let mut notifications: Vec<Notification> = guard
            .notifications
            .iter()
            .filter(|notification| &notification.contractor_id == contractor_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    fn mark_notification_read(
        &self,
        contractor_id: &UserId,
        notification_id: &str,
    ) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let notification = guard
            .notifications
            .iter_mut()
            .find(|notification| {
                notification.id == notification_id && &notification.contractor_id == contractor_id
            })
            .ok_or(StoreError::NotFound)?;
        notification.read = true;
        Ok(())
    }
}
