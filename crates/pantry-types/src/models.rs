use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a donation.
///
/// Transitions only move forward, except for the two undo edges
/// CLAIMED -> ACTIVE and PICKED_UP -> CLAIMED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DonationStatus {
    Active,
    Claimed,
    PickedUp,
    Expired,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Claimed => "CLAIMED",
            Self::PickedUp => "PICKED_UP",
            Self::Expired => "EXPIRED",
        }
    }

    /// Whether a donation in this state has a holder and a collection code.
    pub fn is_held(&self) -> bool {
        matches!(self, Self::Claimed | Self::PickedUp)
    }
}

impl fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DonationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "CLAIMED" => Ok(Self::Claimed),
            "PICKED_UP" => Ok(Self::PickedUp),
            "EXPIRED" => Ok(Self::Expired),
            other => Err(format!("unknown donation status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donation {
    pub id: String,
    pub title: String,
    pub food_type: String,
    /// Kilograms.
    pub weight: f64,
    pub expiry_hours: u32,
    pub address: String,
    pub contact_person: Option<String>,
    pub contact_phone: Option<String>,
    pub notes: Option<String>,
    pub photo_ref: Option<String>,
    pub status: DonationStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub collection_code: Option<String>,
    pub pickup_at: Option<DateTime<Utc>>,
}

impl Donation {
    /// The instant after which an unclaimed donation is no longer offered.
    /// Saturates at the end of representable time instead of overflowing.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at
            .checked_add_signed(Duration::hours(i64::from(self.expiry_hours)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Holder fields, the collection code and the status must agree:
    /// all present for CLAIMED / PICKED_UP, all absent otherwise.
    pub fn is_consistent(&self) -> bool {
        let held = self.status.is_held();
        self.claimed_by.is_some() == held
            && self.claimed_at.is_some() == held
            && self.collection_code.is_some() == held
            && (self.pickup_at.is_none() || self.status == DonationStatus::PickedUp)
    }
}

/// Fields supplied by a donor when posting a donation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewDonation {
    pub title: String,
    #[serde(default)]
    pub food_type: String,
    pub weight: f64,
    pub expiry_hours: u32,
    pub address: String,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub photo_ref: Option<String>,
}

/// A conditional status change. Each variant is only valid from one prior
/// status, which the store checks atomically before writing. Variants that
/// carry a `holder` additionally require `claimed_by == holder`.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Claim {
        claimed_by: String,
        claimed_at: DateTime<Utc>,
        collection_code: String,
    },
    Unclaim {
        holder: String,
    },
    Pickup {
        holder: String,
        picked_up_at: DateTime<Utc>,
    },
    UndoPickup {
        holder: String,
    },
    Expire,
}

impl Transition {
    /// Status the record must currently hold for the transition to apply.
    pub fn expected(&self) -> DonationStatus {
        match self {
            Self::Claim { .. } | Self::Expire => DonationStatus::Active,
            Self::Unclaim { .. } | Self::Pickup { .. } => DonationStatus::Claimed,
            Self::UndoPickup { .. } => DonationStatus::PickedUp,
        }
    }

    pub fn target(&self) -> DonationStatus {
        match self {
            Self::Claim { .. } | Self::UndoPickup { .. } => DonationStatus::Claimed,
            Self::Unclaim { .. } => DonationStatus::Active,
            Self::Pickup { .. } => DonationStatus::PickedUp,
            Self::Expire => DonationStatus::Expired,
        }
    }
}

/// Result of a conditional transition against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    /// The record exists but was not in the expected status, or is held by
    /// someone other than the expected holder. Carries the observed status.
    Conflict(DonationStatus),
    NotFound,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DonationFilter {
    pub status: Option<DonationStatus>,
    pub created_by: Option<String>,
    pub claimed_by: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationOrder {
    #[default]
    Newest,
    Oldest,
    ExpiryAsc,
    ExpiryDesc,
    WeightAsc,
    WeightDesc,
}

/// One requester's entry in the race for a donation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimIntent {
    pub id: String,
    pub donation_id: String,
    pub requester_id: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationCategory {
    DonationCreated,
    DonationClaimed,
    ClaimCancelled,
    DonationPickedUp,
    PickupReverted,
    DonationDeleted,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DonationCreated => "donation-created",
            Self::DonationClaimed => "donation-claimed",
            Self::ClaimCancelled => "claim-cancelled",
            Self::DonationPickedUp => "donation-picked-up",
            Self::PickupReverted => "pickup-reverted",
            Self::DonationDeleted => "donation-deleted",
        }
    }
}

impl FromStr for NotificationCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "donation-created" => Ok(Self::DonationCreated),
            "donation-claimed" => Ok(Self::DonationClaimed),
            "claim-cancelled" => Ok(Self::ClaimCancelled),
            "donation-picked-up" => Ok(Self::DonationPickedUp),
            "pickup-reverted" => Ok(Self::PickupReverted),
            "donation-deleted" => Ok(Self::DonationDeleted),
            other => Err(format!("unknown notification category: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub category: NotificationCategory,
    pub message: String,
    pub donation_id: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Donation {
        Donation {
            id: "d1".into(),
            title: "Bread".into(),
            food_type: "bakery".into(),
            weight: 2.5,
            expiry_hours: 6,
            address: "1 Main St".into(),
            contact_person: None,
            contact_phone: None,
            notes: None,
            photo_ref: None,
            status: DonationStatus::Active,
            created_by: "owner".into(),
            created_at: "2026-01-01T08:00:00Z".parse().unwrap(),
            claimed_by: None,
            claimed_at: None,
            collection_code: None,
            pickup_at: None,
        }
    }

    #[test]
    fn status_string_roundtrip() {
        for s in [
            DonationStatus::Active,
            DonationStatus::Claimed,
            DonationStatus::PickedUp,
            DonationStatus::Expired,
        ] {
            assert_eq!(s.as_str().parse::<DonationStatus>().unwrap(), s);
        }
        assert!("PICKED-UP".parse::<DonationStatus>().is_err());
    }

    #[test]
    fn transition_edges() {
        let unclaim = Transition::Unclaim { holder: "a".into() };
        assert_eq!(unclaim.expected(), DonationStatus::Claimed);
        assert_eq!(unclaim.target(), DonationStatus::Active);
        let undo = Transition::UndoPickup { holder: "a".into() };
        assert_eq!(undo.expected(), DonationStatus::PickedUp);
        assert_eq!(undo.target(), DonationStatus::Claimed);
        assert_eq!(Transition::Expire.expected(), DonationStatus::Active);
    }

    #[test]
    fn consistency_requires_all_holder_fields() {
        let mut d = sample();
        assert!(d.is_consistent());

        d.status = DonationStatus::Claimed;
        assert!(!d.is_consistent());

        d.claimed_by = Some("alice".into());
        d.claimed_at = Some(d.created_at);
        d.collection_code = Some("0412".into());
        assert!(d.is_consistent());

        d.pickup_at = Some(d.created_at);
        assert!(!d.is_consistent());
        d.status = DonationStatus::PickedUp;
        assert!(d.is_consistent());
    }

    #[test]
    fn expiry_is_creation_plus_hours() {
        let d = sample();
        let six_hours_later = d.created_at + Duration::hours(6);
        assert_eq!(d.expires_at(), six_hours_later);
        assert!(!d.is_past_expiry(six_hours_later - Duration::seconds(1)));
        assert!(d.is_past_expiry(six_hours_later));
    }

    #[test]
    fn out_of_range_expiry_never_lapses() {
        let d = Donation {
            expiry_hours: u32::MAX,
            ..sample()
        };
        assert_eq!(d.expires_at(), DateTime::<Utc>::MAX_UTC);
        assert!(!d.is_past_expiry(d.created_at + Duration::days(365 * 100)));
    }

    #[test]
    fn category_serializes_kebab_case() {
        let json = serde_json::to_string(&NotificationCategory::DonationPickedUp).unwrap();
        assert_eq!(json, "\"donation-picked-up\"");
        assert_eq!(
            "claim-cancelled".parse::<NotificationCategory>().unwrap(),
            NotificationCategory::ClaimCancelled
        );
    }
}
