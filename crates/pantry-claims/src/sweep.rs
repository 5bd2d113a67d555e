use std::time::Duration;

use pantry_types::models::{Transition, TransitionOutcome};
use tracing::{debug, info, warn};

use crate::env::Ports;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub intents_removed: usize,
    pub donations_expired: usize,
}

/// Periodic maintenance: drops intents left behind by rounds that never
/// resolved (crashed clients, failed cleanup) and moves ACTIVE donations
/// past their expiry to EXPIRED.
pub struct Sweeper {
    ports: Ports,
    intent_ttl: Duration,
}

impl Sweeper {
    /// `intent_ttl` should be several settling intervals so a live round's
    /// intent is never swept out from under it.
    pub fn new(ports: Ports, intent_ttl: Duration) -> Self {
        Self { ports, intent_ttl }
    }

    pub fn sweep_once(&self) -> anyhow::Result<SweepReport> {
        let now = self.ports.clock.now();
        let cutoff = now - chrono::Duration::from_std(self.intent_ttl)?;
        let intents_removed = self.ports.intents.remove_older_than(cutoff)?;

        let mut donations_expired = 0;
        for id in self.ports.donations.expired_active(now)? {
            match self.ports.donations.transition(&id, &Transition::Expire)? {
                TransitionOutcome::Applied => donations_expired += 1,
                // Claimed or deleted since the listing; nothing to do.
                other => debug!("Skipping expiry of donation {}: {:?}", id, other),
            }
        }

        Ok(SweepReport {
            intents_removed,
            donations_expired,
        })
    }

    pub async fn run(self, every: Duration) {
        let mut interval = tokio::time::interval(every);

        loop {
            interval.tick().await;

            match self.sweep_once() {
                Ok(report) => {
                    if report.intents_removed > 0 || report.donations_expired > 0 {
                        info!(
                            "Sweep: removed {} orphaned intent(s), expired {} donation(s)",
                            report.intents_removed, report.donations_expired
                        );
                    }
                }
                Err(e) => {
                    warn!("Sweep error: {}", e);
                }
            }
        }
    }
}
