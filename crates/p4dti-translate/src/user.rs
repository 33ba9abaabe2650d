//! The user translator.
//!
//! Built once per poll cycle (cached from `poll_start` until the next
//! one) from the full user list on each side: a side-1 user/email
//! table, a side-0 id/email table, the identical-lower-cased-email
//! bijection between them (first match wins on either side), and the
//! residual unmatched sets. Strict mode fails translation of an unknown
//! side-1 user; lax mode maps unknowns to the configured bookkeeping
//! user, for fix/changelist user fields where historical users may have
//! vanished.

use std::collections::HashMap;

use crate::error::{Result, TranslateError};

/// How an unmatched user should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Strict,
    Lax,
}

/// One side-0 account: its id and (lower-cased) email.
#[derive(Debug, Clone)]
pub struct Side0User {
    pub id: String,
    pub email: String,
}

/// One side-1 account: its name and (lower-cased) email.
#[derive(Debug, Clone)]
pub struct Side1User {
    pub name: String,
    pub email: String,
}

/// The user translator's cached bidirectional tables.
pub struct UserTranslator {
    id_to_name: HashMap<String, String>,
    name_to_id: HashMap<String, String>,
    unmatched_side0: Vec<String>,
    unmatched_side1: Vec<String>,
    bookkeeping_side0: String,
    bookkeeping_side1: String,
}

impl UserTranslator {
    /// Builds the four maps and validates the bookkeeping user exists,
    /// is unique on each side, and that the two configured bookkeeping
    /// accounts share an email. Emails are compared case-insensitively;
    /// first-seen wins on duplicates.
    pub fn build(
        side0_users: &[Side0User],
        side1_users: &[Side1User],
        bookkeeping_side0: &str,
        bookkeeping_side1: &str,
    ) -> Result<Self> {
        let mut side0_by_email: HashMap<String, String> = HashMap::new();
        for u in side0_users {
            let email = u.email.to_lowercase();
            side0_by_email.entry(email).or_insert_with(|| u.id.clone());
        }

        let mut side1_by_email: HashMap<String, String> = HashMap::new();
        for u in side1_users {
            let email = u.email.to_lowercase();
            side1_by_email.entry(email).or_insert_with(|| u.name.clone());
        }

        let mut id_to_name = HashMap::new();
        let mut name_to_id = HashMap::new();
        let mut matched_side0 = std::collections::HashSet::new();
        let mut matched_side1 = std::collections::HashSet::new();

        for (email, id) in &side0_by_email {
            if let Some(name) = side1_by_email.get(email) {
                id_to_name.insert(id.clone(), name.clone());
                name_to_id.insert(name.clone(), id.clone());
                matched_side0.insert(id.clone());
                matched_side1.insert(name.clone());
            }
        }

        let unmatched_side0: Vec<String> = side0_users
            .iter()
            .map(|u| u.id.clone())
            .filter(|id| !matched_side0.contains(id))
            .collect();
        let unmatched_side1: Vec<String> = side1_users
            .iter()
            .map(|u| u.name.clone())
            .filter(|name| !matched_side1.contains(name))
            .collect();

        let translator = Self {
            id_to_name,
            name_to_id,
            unmatched_side0,
            unmatched_side1,
            bookkeeping_side0: bookkeeping_side0.to_string(),
            bookkeeping_side1: bookkeeping_side1.to_string(),
        };

        translator.check_bookkeeping_user(side0_users, side1_users)?;
        Ok(translator)
    }

    fn check_bookkeeping_user(&self, side0_users: &[Side0User], side1_users: &[Side1User]) -> Result<()> {
        let side0_matches: Vec<&Side0User> = side0_users.iter().filter(|u| u.id == self.bookkeeping_side0).collect();
        if side0_matches.len() != 1 {
            return Err(TranslateError::BookkeepingUserInvalid {
                user: self.bookkeeping_side0.clone(),
                side: 0,
            });
        }
        let side1_matches: Vec<&Side1User> = side1_users.iter().filter(|u| u.name == self.bookkeeping_side1).collect();
        if side1_matches.len() != 1 {
            return Err(TranslateError::BookkeepingUserInvalid {
                user: self.bookkeeping_side1.clone(),
                side: 1,
            });
        }
        if side0_matches[0].email.to_lowercase() != side1_matches[0].email.to_lowercase() {
            return Err(TranslateError::BookkeepingUserInvalid {
                user: self.bookkeeping_side0.clone(),
                side: 0,
            });
        }
        Ok(())
    }

    /// Side-0 id -> side-1 name, consulting the identical-email
    /// bijection. Strict mode fails on an unknown side-0 id; lax mode
    /// falls back to the configured side-1 bookkeeping user.
    pub fn to_1(&self, side0_id: &str, mode: Mode) -> Result<String> {
        if let Some(name) = self.id_to_name.get(side0_id) {
            return Ok(name.clone());
        }
        match mode {
            Mode::Strict => Err(TranslateError::UnknownUser { user: side0_id.to_string(), side: 0 }),
            Mode::Lax => Ok(self.bookkeeping_side1.clone()),
        }
    }

    /// Side-1 name -> side-0 id.
    pub fn to_0(&self, side1_name: &str, mode: Mode) -> Result<String> {
        if let Some(id) = self.name_to_id.get(side1_name) {
            return Ok(id.clone());
        }
        match mode {
            Mode::Strict => Err(TranslateError::UnknownUser { user: side1_name.to_string(), side: 1 }),
            Mode::Lax => Ok(self.bookkeeping_side0.clone()),
        }
    }

    pub fn unmatched_side0(&self) -> &[String] {
        &self.unmatched_side0
    }

    pub fn unmatched_side1(&self) -> &[String] {
        &self.unmatched_side1
    }

    #[cfg(test)]
    fn matched_count(&self) -> usize {
        self.id_to_name.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side0(id: &str, email: &str) -> Side0User {
        Side0User { id: id.to_string(), email: email.to_lowercase() }
    }
    fn side1(name: &str, email: &str) -> Side1User {
        Side1User { name: name.to_string(), email: email.to_lowercase() }
    }

    #[test]
    fn matches_by_identical_lowercased_email() {
        let s0 = vec![side0("alice", "Alice@Example.com"), side0("dt-bot", "dt@example.com")];
        let s1 = vec![side1("alice.p4", "alice@example.com"), side1("dt", "dt@example.com")];
        let t = UserTranslator::build(&s0, &s1, "dt-bot", "dt").unwrap();
        assert_eq!(t.to_1("alice", Mode::Strict).unwrap(), "alice.p4");
        assert_eq!(t.to_0("alice.p4", Mode::Strict).unwrap(), "alice");
        assert_eq!(t.matched_count(), 2);
    }

    #[test]
    fn unmatched_users_are_tracked() {
        let s0 = vec![side0("alice", "alice@example.com"), side0("dt-bot", "dt@example.com")];
        let s1 = vec![side1("dt", "dt@example.com")];
        let t = UserTranslator::build(&s0, &s1, "dt-bot", "dt").unwrap();
        assert_eq!(t.unmatched_side0(), &["alice".to_string()]);
    }

    #[test]
    fn strict_mode_fails_unknown_user() {
        let s0 = vec![side0("dt-bot", "dt@example.com")];
        let s1 = vec![side1("dt", "dt@example.com")];
        let t = UserTranslator::build(&s0, &s1, "dt-bot", "dt").unwrap();
        assert!(matches!(t.to_1("mallory", Mode::Strict), Err(TranslateError::UnknownUser { .. })));
    }

    #[test]
    fn lax_mode_maps_unknown_to_bookkeeping_user() {
        let s0 = vec![side0("dt-bot", "dt@example.com")];
        let s1 = vec![side1("dt", "dt@example.com")];
        let t = UserTranslator::build(&s0, &s1, "dt-bot", "dt").unwrap();
        assert_eq!(t.to_1("mallory", Mode::Lax).unwrap(), "dt");
    }

    #[test]
    fn missing_bookkeeping_user_is_fatal() {
        let s0 = vec![side0("alice", "alice@example.com")];
        let s1 = vec![side1("dt", "dt@example.com")];
        let err = UserTranslator::build(&s0, &s1, "dt-bot", "dt");
        assert!(matches!(err, Err(TranslateError::BookkeepingUserInvalid { .. })));
    }

    #[test]
    fn mismatched_bookkeeping_emails_is_fatal() {
        let s0 = vec![side0("dt-bot", "dt-bot@example.com")];
        let s1 = vec![side1("dt", "dt@example.com")];
        let err = UserTranslator::build(&s0, &s1, "dt-bot", "dt");
        assert!(matches!(err, Err(TranslateError::BookkeepingUserInvalid { .. })));
    }
}
