use pantry_types::models::{
    Donation, DonationStatus, NewDonation, NotificationCategory, Transition, TransitionOutcome,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::env::Ports;
use crate::error::{ClaimError, Unavailable};
use crate::notify::Notifier;

/// Status first, then holder: a non-holder poking at a donation in the wrong
/// state learns about the state, which is public anyway.
pub(crate) fn require_holder(
    donation: &Donation,
    requester_id: &str,
    expected: DonationStatus,
) -> Result<(), ClaimError> {
    if donation.status != expected {
        return Err(ClaimError::InvalidStateTransition(Unavailable::Status {
            expected,
            actual: donation.status,
        }));
    }
    if donation.claimed_by.as_deref() != Some(requester_id) {
        return Err(ClaimError::PermissionDenied("only the current holder can do this"));
    }
    Ok(())
}

/// Upper bound on a donation's shelf life, one year.
pub const MAX_EXPIRY_HOURS: u32 = 24 * 365;

fn validate(new: &NewDonation) -> Result<(), ClaimError> {
    if new.title.trim().is_empty() {
        return Err(ClaimError::InvalidInput("title is required".into()));
    }
    if new.address.trim().is_empty() {
        return Err(ClaimError::InvalidInput("address is required".into()));
    }
    if !(new.weight.is_finite() && new.weight > 0.0) {
        return Err(ClaimError::InvalidInput("weight must be positive".into()));
    }
    if new.expiry_hours == 0 {
        return Err(ClaimError::InvalidInput("expiry must be at least one hour".into()));
    }
    if new.expiry_hours > MAX_EXPIRY_HOURS {
        return Err(ClaimError::InvalidInput(format!(
            "expiry must be at most {MAX_EXPIRY_HOURS} hours"
        )));
    }
    Ok(())
}

/// Owner and holder operations outside the claim race: posting, pickup and
/// its undo, and deletion with intent cleanup.
pub struct LifecycleController {
    ports: Ports,
    notifier: Notifier,
}

impl LifecycleController {
    pub fn new(ports: Ports) -> Self {
        let notifier = Notifier::new(ports.sink.clone(), ports.clock.clone());
        Self { ports, notifier }
    }

    pub fn create_donation(&self, owner_id: &str, new: NewDonation) -> Result<Donation, ClaimError> {
        validate(&new)?;

        let donation = Donation {
            id: Uuid::new_v4().to_string(),
            title: new.title.trim().to_string(),
            food_type: new.food_type,
            weight: new.weight,
            expiry_hours: new.expiry_hours,
            address: new.address,
            contact_person: new.contact_person,
            contact_phone: new.contact_phone,
            notes: new.notes,
            photo_ref: new.photo_ref,
            status: DonationStatus::Active,
            created_by: owner_id.to_string(),
            created_at: self.ports.clock.now(),
            claimed_by: None,
            claimed_at: None,
            collection_code: None,
            pickup_at: None,
        };
        self.ports.donations.create(&donation)?;

        info!("Donation {} posted by {}", donation.id, owner_id);
        self.notifier.emit(
            owner_id,
            NotificationCategory::DonationCreated,
            format!("Your donation \"{}\" is now listed.", donation.title),
            &donation.id,
        );

        Ok(donation)
    }

    pub fn confirm_pickup(&self, donation_id: &str, requester_id: &str) -> Result<(), ClaimError> {
        let donation = self.load(donation_id)?;
        require_holder(&donation, requester_id, DonationStatus::Claimed)?;

        let transition = Transition::Pickup {
            holder: requester_id.to_string(),
            picked_up_at: self.ports.clock.now(),
        };
        self.apply(donation_id, &transition)?;

        info!("Donation {} picked up by {}", donation_id, requester_id);
        self.notifier.emit(
            &donation.created_by,
            NotificationCategory::DonationPickedUp,
            format!("Your donation \"{}\" has been picked up.", donation.title),
            donation_id,
        );
        self.notifier.emit(
            requester_id,
            NotificationCategory::DonationPickedUp,
            format!("You confirmed pickup of \"{}\".", donation.title),
            donation_id,
        );
        Ok(())
    }

    /// PICKED_UP -> CLAIMED. The collection code is kept.
    pub fn undo_pickup(&self, donation_id: &str, requester_id: &str) -> Result<(), ClaimError> {
        let donation = self.load(donation_id)?;
        require_holder(&donation, requester_id, DonationStatus::PickedUp)?;

        let transition = Transition::UndoPickup {
            holder: requester_id.to_string(),
        };
        self.apply(donation_id, &transition)?;

        info!("Pickup of donation {} reverted by {}", donation_id, requester_id);
        self.notifier.emit(
            &donation.created_by,
            NotificationCategory::PickupReverted,
            format!("Pickup of your donation \"{}\" was reverted.", donation.title),
            donation_id,
        );
        self.notifier.emit(
            requester_id,
            NotificationCategory::PickupReverted,
            format!("You reverted the pickup of \"{}\".", donation.title),
            donation_id,
        );
        Ok(())
    }

    /// Owner-only. Notifies the holder first, then removes queued intents,
    /// then the record, so no settling round can resolve against intents
    /// that outlive their donation.
    pub fn delete_donation(&self, donation_id: &str, requester_id: &str) -> Result<(), ClaimError> {
        let donation = self.load(donation_id)?;
        if donation.created_by != requester_id {
            return Err(ClaimError::PermissionDenied("only the owner can delete a donation"));
        }

        if let Some(holder) = donation.claimed_by.as_deref().filter(|_| donation.status.is_held()) {
            self.notifier.emit(
                holder,
                NotificationCategory::DonationDeleted,
                format!("The donation \"{}\" you claimed was deleted by its owner.", donation.title),
                donation_id,
            );
        }

        let removed = self.ports.intents.remove_all_for(donation_id)?;
        if removed > 0 {
            warn!("Deleting donation {} discarded {} queued intent(s)", donation_id, removed);
        }

        if !self.ports.donations.delete(donation_id)? {
            return Err(ClaimError::NotFound(donation_id.to_string()));
        }

        info!("Donation {} deleted by {}", donation_id, requester_id);
        Ok(())
    }

    fn load(&self, donation_id: &str) -> Result<Donation, ClaimError> {
        self.ports
            .donations
            .get(donation_id)?
            .ok_or_else(|| ClaimError::NotFound(donation_id.to_string()))
    }

    fn apply(&self, donation_id: &str, transition: &Transition) -> Result<(), ClaimError> {
        match self.ports.donations.transition(donation_id, transition)? {
            TransitionOutcome::Applied => Ok(()),
            TransitionOutcome::Conflict(actual) => {
                Err(ClaimError::InvalidStateTransition(Unavailable::Status {
                    expected: transition.expected(),
                    actual,
                }))
            }
            TransitionOutcome::NotFound => Err(ClaimError::InvalidStateTransition(Unavailable::Deleted)),
        }
    }
}
