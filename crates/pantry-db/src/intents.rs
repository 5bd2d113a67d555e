use anyhow::Result;
use chrono::{DateTime, Utc};
use pantry_types::models::ClaimIntent;
use uuid::Uuid;

use crate::models::IntentRow;
use crate::{Database, to_millis};

impl Database {
    pub fn append_intent(
        &self,
        donation_id: &str,
        requester_id: &str,
        requested_at: DateTime<Utc>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO claim_intents (id, donation_id, requester_id, requested_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, donation_id, requester_id, to_millis(requested_at)],
            )?;
            Ok(())
        })?;
        Ok(id)
    }

    /// Intents for one donation, oldest first, ties broken by id.
    /// Filtered in SQL so a round never acts on another donation's entries.
    pub fn list_intents_for(&self, donation_id: &str) -> Result<Vec<ClaimIntent>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, donation_id, requester_id, requested_at
                 FROM claim_intents
                 WHERE donation_id = ?1
                 ORDER BY requested_at ASC, id ASC",
            )?;
            let rows = stmt
                .query_map([donation_id], |row| {
                    Ok(IntentRow {
                        id: row.get(0)?,
                        donation_id: row.get(1)?,
                        requester_id: row.get(2)?,
                        requested_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(ClaimIntent::try_from).collect()
    }

    /// Idempotent: removing an intent that is already gone returns false.
    pub fn remove_intent(&self, intent_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM claim_intents WHERE id = ?1", [intent_id])?;
            Ok(removed > 0)
        })
    }

    pub fn remove_intents_of_requester(&self, donation_id: &str, requester_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM claim_intents WHERE donation_id = ?1 AND requester_id = ?2",
                [donation_id, requester_id],
            )?;
            Ok(removed)
        })
    }

    pub fn remove_intents_for(&self, donation_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let removed =
                conn.execute("DELETE FROM claim_intents WHERE donation_id = ?1", [donation_id])?;
            Ok(removed)
        })
    }

    pub fn remove_intents_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM claim_intents WHERE requested_at < ?1",
                [to_millis(cutoff)],
            )?;
            Ok(removed)
        })
    }
}
