//! Database row types. These map directly to SQLite rows and are converted
//! into `pantry_types::models` values at the query boundary.

use anyhow::{Result, anyhow};
use pantry_types::models::{ClaimIntent, Donation, Notification};

use crate::from_millis;

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct DonationRow {
    pub id: String,
    pub title: String,
    pub food_type: String,
    pub weight: f64,
    pub expiry_hours: i64,
    pub address: String,
    pub contact_person: Option<String>,
    pub contact_phone: Option<String>,
    pub notes: Option<String>,
    pub photo_ref: Option<String>,
    pub status: String,
    pub created_by: String,
    pub created_at: i64,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<i64>,
    pub collection_code: Option<String>,
    pub pickup_at: Option<i64>,
}

impl DonationRow {
    pub const COLUMNS: &'static str = "id, title, food_type, weight, expiry_hours, address, \
         contact_person, contact_phone, notes, photo_ref, status, created_by, created_at, \
         claimed_by, claimed_at, collection_code, pickup_at";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            food_type: row.get(2)?,
            weight: row.get(3)?,
            expiry_hours: row.get(4)?,
            address: row.get(5)?,
            contact_person: row.get(6)?,
            contact_phone: row.get(7)?,
            notes: row.get(8)?,
            photo_ref: row.get(9)?,
            status: row.get(10)?,
            created_by: row.get(11)?,
            created_at: row.get(12)?,
            claimed_by: row.get(13)?,
            claimed_at: row.get(14)?,
            collection_code: row.get(15)?,
            pickup_at: row.get(16)?,
        })
    }
}

impl TryFrom<DonationRow> for Donation {
    type Error = anyhow::Error;

    fn try_from(row: DonationRow) -> Result<Self> {
        Ok(Donation {
            status: row
                .status
                .parse()
                .map_err(|e| anyhow!("Corrupt status on donation '{}': {}", row.id, e))?,
            expiry_hours: u32::try_from(row.expiry_hours)
                .map_err(|_| anyhow!("Corrupt expiry_hours on donation '{}'", row.id))?,
            created_at: from_millis(row.created_at)?,
            claimed_at: row.claimed_at.map(from_millis).transpose()?,
            pickup_at: row.pickup_at.map(from_millis).transpose()?,
            id: row.id,
            title: row.title,
            food_type: row.food_type,
            weight: row.weight,
            address: row.address,
            contact_person: row.contact_person,
            contact_phone: row.contact_phone,
            notes: row.notes,
            photo_ref: row.photo_ref,
            created_by: row.created_by,
            claimed_by: row.claimed_by,
            collection_code: row.collection_code,
        })
    }
}

pub struct IntentRow {
    pub id: String,
    pub donation_id: String,
    pub requester_id: String,
    pub requested_at: i64,
}

impl TryFrom<IntentRow> for ClaimIntent {
    type Error = anyhow::Error;

    fn try_from(row: IntentRow) -> Result<Self> {
        Ok(ClaimIntent {
            requested_at: from_millis(row.requested_at)?,
            id: row.id,
            donation_id: row.donation_id,
            requester_id: row.requester_id,
        })
    }
}

pub struct NotificationRow {
    pub id: String,
    pub recipient_id: String,
    pub category: String,
    pub message: String,
    pub donation_id: String,
    pub created_at: i64,
    pub read: bool,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = anyhow::Error;

    fn try_from(row: NotificationRow) -> Result<Self> {
        Ok(Notification {
            category: row
                .category
                .parse()
                .map_err(|e| anyhow!("Corrupt category on notification '{}': {}", row.id, e))?,
            created_at: from_millis(row.created_at)?,
            id: row.id,
            recipient_id: row.recipient_id,
            message: row.message,
            donation_id: row.donation_id,
            read: row.read,
        })
    }
}
