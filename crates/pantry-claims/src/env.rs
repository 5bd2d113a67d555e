use std::sync::Arc;

use chrono::{DateTime, Utc};
use pantry_db::Database;
use rand::Rng;

use crate::store::{DonationStore, IntentQueue, NotificationSink};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Source of collection codes handed to claim winners.
pub trait CodeSource: Send + Sync {
    fn collection_code(&self) -> String;
}

/// Uniform 4-digit codes, zero-padded. No uniqueness across donations or
/// across claim cycles of the same donation.
pub struct RandomCodes;

impl CodeSource for RandomCodes {
    fn collection_code(&self) -> String {
        format!("{:04}", rand::rng().random_range(0..10_000u32))
    }
}

/// Everything the core talks to. Each client session runs its own protocol
/// instance over a shared set of ports.
#[derive(Clone)]
pub struct Ports {
    pub donations: Arc<dyn DonationStore>,
    pub intents: Arc<dyn IntentQueue>,
    pub sink: Arc<dyn NotificationSink>,
    pub clock: Arc<dyn Clock>,
    pub codes: Arc<dyn CodeSource>,
}

impl Ports {
    /// All three stores on one SQLite database, wall clock, random codes.
    pub fn sqlite(db: Arc<Database>) -> Self {
        Self {
            donations: db.clone(),
            intents: db.clone(),
            sink: db,
            clock: Arc::new(SystemClock),
            codes: Arc::new(RandomCodes),
        }
    }
}
