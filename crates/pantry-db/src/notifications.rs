use anyhow::Result;
use pantry_types::models::Notification;

use crate::models::NotificationRow;
use crate::{Database, to_millis};

impl Database {
    pub fn insert_notification(&self, notification: &Notification) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, recipient_id, category, message, donation_id, created_at, read)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    notification.id,
                    notification.recipient_id,
                    notification.category.as_str(),
                    notification.message,
                    notification.donation_id,
                    to_millis(notification.created_at),
                    notification.read,
                ],
            )?;
            Ok(())
        })
    }

    /// Inbox for one recipient, newest first.
    pub fn list_notifications(&self, recipient_id: &str) -> Result<Vec<Notification>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, recipient_id, category, message, donation_id, created_at, read
                 FROM notifications
                 WHERE recipient_id = ?1
                 ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt
                .query_map([recipient_id], |row| {
                    Ok(NotificationRow {
                        id: row.get(0)?,
                        recipient_id: row.get(1)?,
                        category: row.get(2)?,
                        message: row.get(3)?,
                        donation_id: row.get(4)?,
                        created_at: row.get(5)?,
                        read: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    /// Returns false if no notification with that id belongs to the recipient.
    pub fn mark_notification_read(&self, id: &str, recipient_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE notifications SET read = 1 WHERE id = ?1 AND recipient_id = ?2",
                [id, recipient_id],
            )?;
            Ok(updated > 0)
        })
    }

    pub fn mark_all_notifications_read(&self, recipient_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE notifications SET read = 1 WHERE recipient_id = ?1 AND read = 0",
                [recipient_id],
            )?;
            Ok(updated)
        })
    }

    /// Deletes the given notifications, ignoring ids owned by someone else.
    pub fn delete_notifications(&self, ids: &[String], recipient_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let mut stmt =
                conn.prepare("DELETE FROM notifications WHERE id = ?1 AND recipient_id = ?2")?;
            let mut deleted = 0;
            for id in ids {
                deleted += stmt.execute([id.as_str(), recipient_id])?;
            }
            Ok(deleted)
        })
    }
}
