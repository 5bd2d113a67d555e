use anyhow::Result;
use chrono::{DateTime, Utc};
use pantry_types::models::{
    Donation, DonationFilter, DonationOrder, DonationStatus, Transition, TransitionOutcome,
};
use rusqlite::Connection;

use crate::models::DonationRow;
use crate::{Database, OptionalExt, to_millis};

const EXPIRES_AT_SQL: &str = "(created_at + expiry_hours * 3600000)";

impl Database {
    pub fn insert_donation(&self, donation: &Donation) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO donations (id, title, food_type, weight, expiry_hours, address,
                    contact_person, contact_phone, notes, photo_ref, status, created_by, created_at,
                    claimed_by, claimed_at, collection_code, pickup_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                rusqlite::params![
                    donation.id,
                    donation.title,
                    donation.food_type,
                    donation.weight,
                    donation.expiry_hours,
                    donation.address,
                    donation.contact_person,
                    donation.contact_phone,
                    donation.notes,
                    donation.photo_ref,
                    donation.status.as_str(),
                    donation.created_by,
                    to_millis(donation.created_at),
                    donation.claimed_by,
                    donation.claimed_at.map(to_millis),
                    donation.collection_code,
                    donation.pickup_at.map(to_millis),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_donation(&self, id: &str) -> Result<Option<Donation>> {
        let row = self.with_conn(|conn| query_donation(conn, id))?;
        row.map(Donation::try_from).transpose()
    }

    /// Compare-and-set on the donation's status (and holder, where the
    /// transition names one). A single UPDATE statement, so the check and the
    /// write cannot interleave with another writer.
    pub fn transition_donation(&self, id: &str, transition: &Transition) -> Result<TransitionOutcome> {
        self.with_conn_mut(|conn| {
            let expected = transition.expected().as_str();
            let target = transition.target().as_str();

            let changed = match transition {
                Transition::Claim {
                    claimed_by,
                    claimed_at,
                    collection_code,
                } => conn.execute(
                    "UPDATE donations
                     SET status = ?1, claimed_by = ?2, claimed_at = ?3, collection_code = ?4, pickup_at = NULL
                     WHERE id = ?5 AND status = ?6",
                    rusqlite::params![
                        target,
                        claimed_by,
                        to_millis(*claimed_at),
                        collection_code,
                        id,
                        expected
                    ],
                )?,
                Transition::Unclaim { holder } => conn.execute(
                    "UPDATE donations
                     SET status = ?1, claimed_by = NULL, claimed_at = NULL, collection_code = NULL, pickup_at = NULL
                     WHERE id = ?2 AND status = ?3 AND claimed_by = ?4",
                    rusqlite::params![target, id, expected, holder],
                )?,
                Transition::Pickup {
                    holder,
                    picked_up_at,
                } => conn.execute(
                    "UPDATE donations SET status = ?1, pickup_at = ?2
                     WHERE id = ?3 AND status = ?4 AND claimed_by = ?5",
                    rusqlite::params![target, to_millis(*picked_up_at), id, expected, holder],
                )?,
                Transition::UndoPickup { holder } => conn.execute(
                    "UPDATE donations SET status = ?1, pickup_at = NULL
                     WHERE id = ?2 AND status = ?3 AND claimed_by = ?4",
                    rusqlite::params![target, id, expected, holder],
                )?,
                Transition::Expire => conn.execute(
                    "UPDATE donations SET status = ?1 WHERE id = ?2 AND status = ?3",
                    rusqlite::params![target, id, expected],
                )?,
            };

            if changed > 0 {
                return Ok(TransitionOutcome::Applied);
            }

            let current: Option<String> = conn
                .query_row("SELECT status FROM donations WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;

            match current {
                None => Ok(TransitionOutcome::NotFound),
                Some(status) => Ok(TransitionOutcome::Conflict(
                    status.parse().map_err(|e: String| anyhow::anyhow!(e))?,
                )),
            }
        })
    }

    /// Returns false if the donation did not exist.
    pub fn delete_donation(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM donations WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    pub fn list_donations(&self, filter: &DonationFilter, order: DonationOrder) -> Result<Vec<Donation>> {
        let rows = self.with_conn(|conn| query_donations(conn, filter, order))?;
        rows.into_iter().map(Donation::try_from).collect()
    }

    /// Ids of ACTIVE donations whose expiry has passed at `now`.
    pub fn list_expired_active(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id FROM donations WHERE status = ?1 AND {} <= ?2",
                EXPIRES_AT_SQL
            );
            let mut stmt = conn.prepare(&sql)?;
            let ids = stmt
                .query_map(
                    rusqlite::params![DonationStatus::Active.as_str(), to_millis(now)],
                    |row| row.get::<_, String>(0),
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }
}

fn query_donation(conn: &Connection, id: &str) -> Result<Option<DonationRow>> {
    let sql = format!("SELECT {} FROM donations WHERE id = ?1", DonationRow::COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([id], DonationRow::from_row).optional()?;
    Ok(row)
}

fn query_donations(
    conn: &Connection,
    filter: &DonationFilter,
    order: DonationOrder,
) -> Result<Vec<DonationRow>> {
    let mut clauses = Vec::new();
    let mut params: Vec<String> = Vec::new();

    if let Some(status) = filter.status {
        params.push(status.as_str().to_string());
        clauses.push(format!("status = ?{}", params.len()));
    }
    if let Some(owner) = &filter.created_by {
        params.push(owner.clone());
        clauses.push(format!("created_by = ?{}", params.len()));
    }
    if let Some(holder) = &filter.claimed_by {
        params.push(holder.clone());
        clauses.push(format!("claimed_by = ?{}", params.len()));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let order_sql = match order {
        DonationOrder::Newest => "created_at DESC".to_string(),
        DonationOrder::Oldest => "created_at ASC".to_string(),
        DonationOrder::ExpiryAsc => format!("{} ASC", EXPIRES_AT_SQL),
        DonationOrder::ExpiryDesc => format!("{} DESC", EXPIRES_AT_SQL),
        DonationOrder::WeightAsc => "weight ASC".to_string(),
        DonationOrder::WeightDesc => "weight DESC".to_string(),
    };

    let sql = format!(
        "SELECT {} FROM donations {} ORDER BY {}, id ASC",
        DonationRow::COLUMNS,
        where_sql,
        order_sql
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), DonationRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
