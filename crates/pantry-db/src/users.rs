use anyhow::Result;
use rusqlite::Connection;

use crate::models::UserRow;
use crate::{Database, OptionalExt};

impl Database {
    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, username, password, created_at FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_lookup() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "donor", "hash").unwrap();

        assert_eq!(db.get_user_by_username("donor").unwrap().unwrap().id, "u1");
        assert!(db.get_user_by_username("nobody").unwrap().is_none());
        assert!(db.create_user("u2", "donor", "hash").is_err());
    }
}
