#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use pantry_claims::env::{Clock, CodeSource};
use pantry_claims::store::{DonationStore, NotificationSink};
use pantry_claims::{LifecycleController, Ports};
use pantry_db::Database;
use pantry_types::models::{
    Donation, DonationFilter, DonationOrder, NewDonation, Notification, NotificationCategory,
    Transition, TransitionOutcome,
};

pub const OWNER: &str = "owner";

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Mutex::new(start))
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Hands out the given codes in order, then repeats the last one.
pub struct ScriptedCodes(Mutex<VecDeque<String>>);

impl ScriptedCodes {
    pub fn new(codes: &[&str]) -> Self {
        Self(Mutex::new(codes.iter().map(|c| c.to_string()).collect()))
    }
}

impl CodeSource for ScriptedCodes {
    fn collection_code(&self) -> String {
        let mut codes = self.0.lock().unwrap();
        if codes.len() > 1 {
            codes.pop_front().unwrap()
        } else {
            codes.front().cloned().unwrap_or_else(|| "0000".into())
        }
    }
}

pub struct FailingSink;

impl NotificationSink for FailingSink {
    fn deliver(&self, _: &Notification) -> anyhow::Result<()> {
        anyhow::bail!("notification backend unavailable")
    }
}

/// Records every delivery along with whether the donation still existed.
pub struct ProbeSink {
    pub db: Arc<Database>,
    pub seen: Mutex<Vec<(String, NotificationCategory, bool)>>,
}

impl NotificationSink for ProbeSink {
    fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
        let exists = self.db.get_donation(&notification.donation_id)?.is_some();
        self.seen.lock().unwrap().push((
            notification.recipient_id.clone(),
            notification.category,
            exists,
        ));
        self.db.insert_notification(notification)
    }
}

/// Delegates to the database but fails conditional transitions on demand.
pub struct FlakyDonations {
    pub db: Arc<Database>,
    pub fail_transitions: AtomicBool,
}

impl FlakyDonations {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            fail_transitions: AtomicBool::new(false),
        }
    }
}

impl DonationStore for FlakyDonations {
    fn create(&self, donation: &Donation) -> anyhow::Result<()> {
        self.db.insert_donation(donation)
    }

    fn get(&self, id: &str) -> anyhow::Result<Option<Donation>> {
        self.db.get_donation(id)
    }

    fn transition(&self, id: &str, transition: &Transition) -> anyhow::Result<TransitionOutcome> {
        if self.fail_transitions.load(Ordering::SeqCst) {
            anyhow::bail!("database is locked");
        }
        self.db.transition_donation(id, transition)
    }

    fn delete(&self, id: &str) -> anyhow::Result<bool> {
        self.db.delete_donation(id)
    }

    fn list(&self, filter: &DonationFilter, order: DonationOrder) -> anyhow::Result<Vec<Donation>> {
        self.db.list_donations(filter, order)
    }

    fn expired_active(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<String>> {
        self.db.list_expired_active(now)
    }
}

pub fn sqlite_ports() -> (Arc<Database>, Ports) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let ports = Ports::sqlite(db.clone());
    (db, ports)
}

pub fn new_donation(title: &str) -> NewDonation {
    NewDonation {
        title: title.into(),
        food_type: "bakery".into(),
        weight: 2.0,
        expiry_hours: 12,
        address: "21 Baker St".into(),
        contact_person: Some("Robin".into()),
        contact_phone: None,
        notes: None,
        photo_ref: None,
    }
}

pub fn post(ports: &Ports, title: &str) -> Donation {
    LifecycleController::new(ports.clone())
        .create_donation(OWNER, new_donation(title))
        .unwrap()
}
