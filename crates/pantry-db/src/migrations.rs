use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE donations (
                id               TEXT PRIMARY KEY,
                title            TEXT NOT NULL,
                food_type        TEXT NOT NULL DEFAULT '',
                weight           REAL NOT NULL,
                expiry_hours     INTEGER NOT NULL,
                address          TEXT NOT NULL,
                contact_person   TEXT,
                contact_phone    TEXT,
                notes            TEXT,
                photo_ref        TEXT,
                status           TEXT NOT NULL DEFAULT 'ACTIVE',
                created_by       TEXT NOT NULL,
                created_at       INTEGER NOT NULL,
                claimed_by       TEXT,
                claimed_at       INTEGER,
                collection_code  TEXT,
                pickup_at        INTEGER
            );

            CREATE INDEX idx_donations_status ON donations(status, created_at);
            CREATE INDEX idx_donations_owner ON donations(created_by);
            CREATE INDEX idx_donations_holder ON donations(claimed_by);

            -- No foreign key: an intent may briefly outlive its donation
            -- while a claim round is settling.
            CREATE TABLE claim_intents (
                id            TEXT PRIMARY KEY,
                donation_id   TEXT NOT NULL,
                requester_id  TEXT NOT NULL,
                requested_at  INTEGER NOT NULL
            );

            CREATE INDEX idx_intents_donation
                ON claim_intents(donation_id, requested_at, id);

            CREATE TABLE notifications (
                id            TEXT PRIMARY KEY,
                recipient_id  TEXT NOT NULL,
                category      TEXT NOT NULL,
                message       TEXT NOT NULL,
                donation_id   TEXT NOT NULL,
                created_at    INTEGER NOT NULL,
                read          INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_notifications_recipient
                ON notifications(recipient_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
