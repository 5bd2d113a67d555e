//! The claim protocol.
//!
//! A round for `(donation, requester)` goes SUBMITTED -> SETTLING -> RESOLVED:
//!
//! 1. append an intent to the queue,
//! 2. wait one settling interval so intents submitted around the same time
//!    become visible,
//! 3. re-read the queue (filtered to this donation) and the donation,
//! 4. win only if this round's intent is the single queued intent and the
//!    donation is still ACTIVE,
//! 5. on a win, commit ACTIVE -> CLAIMED through the store's conditional
//!    transition, which is the real serialization point, then retire the
//!    winning intent and notify donor and claimer.
//!
//! Store calls run on the blocking pool. The commit step runs there as a
//! single task, so it completes even if the awaiting round is dropped.
//!
//! Overlapping rounds all lose rather than guessing an arrival order, so the
//! settling interval trades latency against the false-conflict rate. The
//! default is one second.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pantry_types::models::{
    ClaimIntent, Donation, DonationStatus, NotificationCategory, Transition, TransitionOutcome,
};
use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::env::Ports;
use crate::error::{ClaimError, Unavailable};
use crate::lifecycle::require_holder;
use crate::notify::Notifier;
use crate::store::{DonationStore, IntentQueue};

pub const DEFAULT_SETTLING_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ArbiterConfig {
    /// Fixed wait between appending an intent and resolving the round.
    pub settling_interval: Duration,
    /// Intents older than this many settling intervals count as orphaned.
    pub intent_ttl_factor: u32,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            settling_interval: DEFAULT_SETTLING_INTERVAL,
            intent_ttl_factor: 10,
        }
    }
}

impl ArbiterConfig {
    pub fn intent_ttl(&self) -> Duration {
        self.settling_interval * self.intent_ttl_factor
    }
}

/// Caller-side retry for lost rounds. Each retry is a full new round with a
/// fresh intent, preceded by a uniform random delay in `[0, jitter)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    fn jitter_delay(&self) -> Duration {
        let max_ms = self.jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..max_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimReceipt {
    pub donation_id: String,
    pub collection_code: String,
    pub claimed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Loss {
    Unavailable(Unavailable),
    Contended { competing: usize },
}

impl From<Loss> for ClaimError {
    fn from(loss: Loss) -> Self {
        match loss {
            Loss::Unavailable(reason) => ClaimError::InvalidStateTransition(reason),
            Loss::Contended { competing } => ClaimError::ConcurrentClaimDetected { competing },
        }
    }
}

/// Decide a settled round. Donation state is checked before the queue so a
/// requester learns "taken" or "gone" rather than "try again" when retrying
/// cannot help.
fn resolve<'a>(
    requester_id: &str,
    own_intent_id: &str,
    intents: &[ClaimIntent],
    donation: Option<&'a Donation>,
    now: DateTime<Utc>,
) -> Result<&'a Donation, Loss> {
    let donation = donation.ok_or(Loss::Unavailable(Unavailable::Deleted))?;

    match donation.status {
        DonationStatus::Active if donation.is_past_expiry(now) => {
            return Err(Loss::Unavailable(Unavailable::Expired));
        }
        DonationStatus::Active => {}
        DonationStatus::Expired => return Err(Loss::Unavailable(Unavailable::Expired)),
        DonationStatus::Claimed | DonationStatus::PickedUp => {
            let reason = if donation.claimed_by.as_deref() == Some(requester_id) {
                Unavailable::AlreadyHeld
            } else {
                Unavailable::ClaimedByOther
            };
            return Err(Loss::Unavailable(reason));
        }
    }

    let own_queued = intents.iter().any(|i| i.id == own_intent_id);
    let competing = intents.iter().filter(|i| i.id != own_intent_id).count();

    if !own_queued || competing > 0 {
        return Err(Loss::Contended { competing });
    }

    Ok(donation)
}

/// Mapping for a conditional claim that lost at the store.
fn claim_conflict(actual: DonationStatus) -> Unavailable {
    match actual {
        DonationStatus::Claimed | DonationStatus::PickedUp => Unavailable::ClaimedByOther,
        DonationStatus::Expired => Unavailable::Expired,
        DonationStatus::Active => Unavailable::Status {
            expected: DonationStatus::Active,
            actual,
        },
    }
}

/// Removes the requester's queued intents for the donation when dropped.
/// Every way out of a round drops it, including a future cancelled while
/// settling.
struct PendingIntents {
    queue: Arc<dyn IntentQueue>,
    donation_id: String,
    requester_id: String,
}

impl Drop for PendingIntents {
    fn drop(&mut self) {
        match self.queue.remove_requester(&self.donation_id, &self.requester_id) {
            Ok(removed) => debug!(
                "Removed {} intent(s) of {} for donation {}",
                removed, self.requester_id, self.donation_id
            ),
            Err(e) => warn!(
                "Failed to remove intents of {} for donation {} (left for sweep): {}",
                self.requester_id, self.donation_id, e
            ),
        }
    }
}

/// Store calls block on SQLite; keep them off the async workers.
async fn offload<F, T>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

/// The winning side of a round: conditional ACTIVE -> CLAIMED, removal of
/// the winning intent, then both notifications.
struct Commit {
    donations: Arc<dyn DonationStore>,
    intents: Arc<dyn IntentQueue>,
    notifier: Notifier,
    donation: Donation,
    intent_id: String,
    requester_id: String,
    collection_code: String,
    claimed_at: DateTime<Utc>,
}

impl Commit {
    fn run(self) -> anyhow::Result<TransitionOutcome> {
        let donation_id = self.donation.id.as_str();
        let transition = Transition::Claim {
            claimed_by: self.requester_id.clone(),
            claimed_at: self.claimed_at,
            collection_code: self.collection_code.clone(),
        };

        let outcome = self.donations.transition(donation_id, &transition)?;
        if outcome != TransitionOutcome::Applied {
            return Ok(outcome);
        }
        info!("Donation {} claimed by {}", donation_id, self.requester_id);

        if let Err(e) = self.intents.remove(&self.intent_id) {
            warn!("Failed to remove winning intent {}: {}", self.intent_id, e);
        }

        self.notifier.emit(
            &self.donation.created_by,
            NotificationCategory::DonationClaimed,
            format!("Your donation \"{}\" has been claimed.", self.donation.title),
            donation_id,
        );
        self.notifier.emit(
            &self.requester_id,
            NotificationCategory::DonationClaimed,
            format!(
                "You claimed \"{}\". Your collection code is {}.",
                self.donation.title, self.collection_code
            ),
            donation_id,
        );

        Ok(outcome)
    }
}

pub struct ClaimArbiter {
    ports: Ports,
    notifier: Notifier,
    config: ArbiterConfig,
}

impl ClaimArbiter {
    pub fn new(ports: Ports, config: ArbiterConfig) -> Self {
        let notifier = Notifier::new(ports.sink.clone(), ports.clock.clone());
        Self {
            ports,
            notifier,
            config,
        }
    }

    /// Run one claim round. A lost race comes back as
    /// `InvalidStateTransition` or `ConcurrentClaimDetected`.
    ///
    /// Dropping the future before the commit abandons the round and removes
    /// its intent. The commit and its notifications run as one task on the
    /// blocking pool, so a cancellation that lands mid-commit cannot skip
    /// the notifications of a committed win.
    pub async fn claim(&self, donation_id: &str, requester_id: &str) -> Result<ClaimReceipt, ClaimError> {
        let intent_id = {
            let intents = self.ports.intents.clone();
            let (id, requester) = (donation_id.to_string(), requester_id.to_string());
            let now = self.ports.clock.now();
            offload(move || intents.append(&id, &requester, now)).await?
        };
        let pending = PendingIntents {
            queue: self.ports.intents.clone(),
            donation_id: donation_id.to_string(),
            requester_id: requester_id.to_string(),
        };
        debug!(
            "Claim round on {} by {}: intent {} submitted, settling {:?}",
            donation_id, requester_id, intent_id, self.config.settling_interval
        );

        tokio::time::sleep(self.config.settling_interval).await;

        let (intents, donation) = {
            let queue = self.ports.intents.clone();
            let donations = self.ports.donations.clone();
            let id = donation_id.to_string();
            offload(move || Ok((queue.list_for(&id)?, donations.get(&id)?)))
                .await
                .map_err(|e| {
                    error!("Claim round on {}: failed to read round state: {}", donation_id, e);
                    ClaimError::StorageFailure(e)
                })?
        };

        let donation = match resolve(
            requester_id,
            &intent_id,
            &intents,
            donation.as_ref(),
            self.ports.clock.now(),
        ) {
            Ok(donation) => donation.clone(),
            Err(loss) => {
                debug!("Claim round on {} by {} lost: {:?}", donation_id, requester_id, loss);
                return Err(loss.into());
            }
        };

        let collection_code = self.ports.codes.collection_code();
        let claimed_at = self.ports.clock.now();
        let commit = Commit {
            donations: self.ports.donations.clone(),
            intents: self.ports.intents.clone(),
            notifier: self.notifier.clone(),
            donation,
            intent_id,
            requester_id: requester_id.to_string(),
            collection_code: collection_code.clone(),
            claimed_at,
        };

        let outcome = offload(move || commit.run()).await.map_err(|e| {
            error!("Claim commit on {} by {} failed: {}", donation_id, requester_id, e);
            ClaimError::StorageFailure(e)
        })?;

        match outcome {
            TransitionOutcome::Applied => {}
            TransitionOutcome::Conflict(actual) => {
                warn!(
                    "Claim commit on {} by {} lost at the store: status is {}",
                    donation_id, requester_id, actual
                );
                return Err(ClaimError::InvalidStateTransition(claim_conflict(actual)));
            }
            TransitionOutcome::NotFound => {
                warn!("Claim commit on {} by {}: donation deleted mid-round", donation_id, requester_id);
                return Err(ClaimError::InvalidStateTransition(Unavailable::Deleted));
            }
        }

        drop(pending);

        Ok(ClaimReceipt {
            donation_id: donation_id.to_string(),
            collection_code,
            claimed_at,
        })
    }

    /// `claim`, repeated with jitter while the loss is retryable.
    pub async fn claim_with_retry(
        &self,
        donation_id: &str,
        requester_id: &str,
        policy: &RetryPolicy,
    ) -> Result<ClaimReceipt, ClaimError> {
        let mut attempt = 1;
        loop {
            match self.claim(donation_id, requester_id).await {
                Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                    let delay = policy.jitter_delay();
                    debug!(
                        "Claim attempt {} on {} by {} lost ({}), retrying in {:?}",
                        attempt, donation_id, requester_id, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Release a claim. Only the current holder may do this.
    pub fn unclaim(&self, donation_id: &str, requester_id: &str) -> Result<(), ClaimError> {
        let donation = self
            .ports
            .donations
            .get(donation_id)?
            .ok_or_else(|| ClaimError::NotFound(donation_id.to_string()))?;
        require_holder(&donation, requester_id, DonationStatus::Claimed)?;

        let transition = Transition::Unclaim {
            holder: requester_id.to_string(),
        };
        match self.ports.donations.transition(donation_id, &transition)? {
            TransitionOutcome::Applied => {}
            TransitionOutcome::Conflict(actual) => {
                return Err(ClaimError::InvalidStateTransition(Unavailable::Status {
                    expected: DonationStatus::Claimed,
                    actual,
                }));
            }
            TransitionOutcome::NotFound => {
                return Err(ClaimError::InvalidStateTransition(Unavailable::Deleted));
            }
        }

        info!("Donation {} released by {}", donation_id, requester_id);

        self.notifier.emit(
            &donation.created_by,
            NotificationCategory::ClaimCancelled,
            format!("The claim on your donation \"{}\" was cancelled.", donation.title),
            donation_id,
        );
        self.notifier.emit(
            requester_id,
            NotificationCategory::ClaimCancelled,
            format!("You cancelled your claim on \"{}\".", donation.title),
            donation_id,
        );

        Ok(())
    }
}
