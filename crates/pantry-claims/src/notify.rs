use std::sync::Arc;

use pantry_types::models::{Notification, NotificationCategory};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::env::Clock;
use crate::store::NotificationSink;

/// Fire-and-forget producer of user notifications.
///
/// Called after a transition has committed. Delivery failures are logged
/// and dropped; they never roll back or fail the transition.
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>, clock: Arc<dyn Clock>) -> Self {
        Self { sink, clock }
    }

    pub fn emit(
        &self,
        recipient_id: &str,
        category: NotificationCategory,
        message: String,
        donation_id: &str,
    ) {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            recipient_id: recipient_id.to_string(),
            category,
            message,
            donation_id: donation_id.to_string(),
            created_at: self.clock.now(),
            read: false,
        };

        match self.sink.deliver(&notification) {
            Ok(()) => debug!(
                "Notified {} ({}) about donation {}",
                recipient_id,
                category.as_str(),
                donation_id
            ),
            Err(e) => warn!(
                "Notification to {} ({}) for donation {} failed: {}",
                recipient_id,
                category.as_str(),
                donation_id,
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::SystemClock;
    use pantry_db::Database;

    struct BrokenSink;

    impl NotificationSink for BrokenSink {
        fn deliver(&self, _: &Notification) -> anyhow::Result<()> {
            anyhow::bail!("sink offline")
        }
    }

    #[test]
    fn delivers_unread_notification() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let notifier = Notifier::new(db.clone(), Arc::new(SystemClock));

        notifier.emit("alice", NotificationCategory::DonationClaimed, "hi".into(), "d1");

        let inbox = db.list_notifications("alice").unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].donation_id, "d1");
        assert!(!inbox[0].read);
    }

    #[test]
    fn sink_failure_is_swallowed() {
        let notifier = Notifier::new(Arc::new(BrokenSink), Arc::new(SystemClock));
        notifier.emit("alice", NotificationCategory::DonationDeleted, "gone".into(), "d1");
    }
}
