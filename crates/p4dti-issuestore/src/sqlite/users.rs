//! User accounts, group memberships, and the bug/product-group
//! permission check consulted by [`p4dti_core::validation::IssueInvariants`].

use rusqlite::{params, OptionalExtension};

use crate::error::Result;
use crate::sqlite::store::SqliteStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub email: String,
}

impl SqliteStore {
    pub(crate) fn user_by_name_impl(&self, name: &str) -> Result<Option<User>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT name, email FROM users WHERE name = ?1",
            params![name],
            |row| Ok(User { name: row.get(0)?, email: row.get(1)? }),
        )
        .optional()
        .map_err(Into::into)
    }

    pub(crate) fn user_by_email_impl(&self, email: &str) -> Result<Option<User>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT name, email FROM users WHERE email = ?1",
            params![email],
            |row| Ok(User { name: row.get(0)?, email: row.get(1)? }),
        )
        .optional()
        .map_err(Into::into)
    }

    pub(crate) fn upsert_user_impl(&self, name: &str, email: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (name, email) VALUES (?1, ?2) \
             ON CONFLICT(name) DO UPDATE SET email = excluded.email",
            params![name, email],
        )?;
        Ok(())
    }

    pub(crate) fn all_users_impl(&self) -> Result<Vec<User>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT name, email FROM users")?;
        let rows = stmt
            .query_map([], |row| Ok(User { name: row.get(0)?, email: row.get(1)? }))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Whether `user` belongs to a group permitted to touch issues in
    /// `product`, via `product_groups` join `user_groups`. A product with
    /// no configured groups is open to everyone.
    pub(crate) fn user_permitted_for_product_impl(&self, user: &str, product: &str) -> Result<bool> {
        let conn = self.lock()?;
        let group_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM product_groups WHERE product = ?1",
            params![product],
            |row| row.get(0),
        )?;
        if group_count == 0 {
            return Ok(true);
        }

        let matches: i64 = conn.query_row(
            "SELECT COUNT(*) FROM product_groups pg \
             JOIN user_groups ug ON ug.group_name = pg.group_name \
             JOIN users u ON u.user_id = ug.user_id \
             WHERE pg.product = ?1 AND u.name = ?2",
            params![product, user],
            |row| row.get(0),
        )?;
        Ok(matches > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        let s = SqliteStore::open_in_memory().unwrap();
        s.init_schema("DT", "p4.example.com").unwrap();
        s
    }

    #[test]
    fn upsert_and_look_up_by_name_and_email() {
        let store = store();
        store.upsert_user_impl("alice", "alice@example.com").unwrap();
        assert_eq!(
            store.user_by_name_impl("alice").unwrap().unwrap().email,
            "alice@example.com"
        );
        assert_eq!(
            store.user_by_email_impl("alice@example.com").unwrap().unwrap().name,
            "alice"
        );
    }

    #[test]
    fn product_with_no_groups_is_open() {
        let store = store();
        assert!(store.user_permitted_for_product_impl("anyone", "Widgets").unwrap());
    }
}
