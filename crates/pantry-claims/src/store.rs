use anyhow::Result;
use chrono::{DateTime, Utc};
use pantry_db::Database;
use pantry_types::models::{
    ClaimIntent, Donation, DonationFilter, DonationOrder, Notification, Transition,
    TransitionOutcome,
};

/// Persistent donation records.
///
/// `transition` must be an atomic compare-and-set on the record's current
/// status; it is the only serialization point the claim protocol relies on.
pub trait DonationStore: Send + Sync {
    fn create(&self, donation: &Donation) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<Donation>>;
    fn transition(&self, id: &str, transition: &Transition) -> Result<TransitionOutcome>;
    /// Returns false if there was nothing to delete.
    fn delete(&self, id: &str) -> Result<bool>;
    fn list(&self, filter: &DonationFilter, order: DonationOrder) -> Result<Vec<Donation>>;
    /// Ids of ACTIVE donations whose expiry is at or before `now`.
    fn expired_active(&self, now: DateTime<Utc>) -> Result<Vec<String>>;
}

/// Append-only log of claim attempts. No compare-and-swap: concurrent
/// appends and removes are expected, and removes are idempotent.
pub trait IntentQueue: Send + Sync {
    fn append(&self, donation_id: &str, requester_id: &str, at: DateTime<Utc>) -> Result<String>;
    /// Ordered by `requested_at` ascending, then id ascending.
    fn list_for(&self, donation_id: &str) -> Result<Vec<ClaimIntent>>;
    /// Retires a single intent, e.g. the winner's after its commit.
    fn remove(&self, intent_id: &str) -> Result<bool>;
    fn remove_requester(&self, donation_id: &str, requester_id: &str) -> Result<usize>;
    fn remove_all_for(&self, donation_id: &str) -> Result<usize>;
    fn remove_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Where emitted notifications end up. Failures are the emitter's problem
/// to log, never the caller's.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: &Notification) -> Result<()>;
}

impl DonationStore for Database {
    fn create(&self, donation: &Donation) -> Result<()> {
        self.insert_donation(donation)
    }

    fn get(&self, id: &str) -> Result<Option<Donation>> {
        self.get_donation(id)
    }

    fn transition(&self, id: &str, transition: &Transition) -> Result<TransitionOutcome> {
        self.transition_donation(id, transition)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        self.delete_donation(id)
    }

    fn list(&self, filter: &DonationFilter, order: DonationOrder) -> Result<Vec<Donation>> {
        self.list_donations(filter, order)
    }

    fn expired_active(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        self.list_expired_active(now)
    }
}

impl IntentQueue for Database {
    fn append(&self, donation_id: &str, requester_id: &str, at: DateTime<Utc>) -> Result<String> {
        self.append_intent(donation_id, requester_id, at)
    }

    fn list_for(&self, donation_id: &str) -> Result<Vec<ClaimIntent>> {
        self.list_intents_for(donation_id)
    }

    fn remove(&self, intent_id: &str) -> Result<bool> {
        self.remove_intent(intent_id)
    }

    fn remove_requester(&self, donation_id: &str, requester_id: &str) -> Result<usize> {
        self.remove_intents_of_requester(donation_id, requester_id)
    }

    fn remove_all_for(&self, donation_id: &str) -> Result<usize> {
        self.remove_intents_for(donation_id)
    }

    fn remove_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.remove_intents_older_than(cutoff)
    }
}

impl NotificationSink for Database {
    fn deliver(&self, notification: &Notification) -> Result<()> {
        self.insert_notification(notification)
    }
}
