//! The `p4dti_replications` journal: one row per poll cycle, and the
//! deferred-mail queue flushed when a cycle ends.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::error::{Result, StorageError};
use crate::sqlite::store::{DeferredMail, SqliteStore};

impl SqliteStore {
    /// Opens a new replication-journal row and marks this store as
    /// mid-cycle. Returns the row id (passed back to [`Self::poll_end`])
    /// and the fence timestamp: the end of the last *completed* cycle,
    /// or `None` on a store's first poll ever.
    ///
    /// `changed_issues_since` calls made during this cycle should use
    /// this fence, not `Utc::now()`, so that issues touched between the
    /// fence being read and the cycle's own writes landing are picked
    /// up on the *next* cycle rather than missed.
    pub fn poll_start(&self, rid: &str, sid: &str) -> Result<(i64, Option<DateTime<Utc>>)> {
        {
            let mut in_cycle = self
                .in_cycle
                .lock()
                .map_err(|e| StorageError::Internal(format!("mutex poisoned: {e}")))?;
            if *in_cycle {
                return Err(StorageError::DatabaseLocked(
                    "a poll cycle is already in progress on this store".to_string(),
                ));
            }
            *in_cycle = true;
        }

        let fence = self.last_replication_end(rid, sid)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO p4dti_replications (rid, sid, start, end, completed) VALUES (?1, ?2, ?3, NULL, 0)",
            params![rid, sid, now],
        )?;
        Ok((conn.last_insert_rowid(), fence))
    }

    /// Closes the replication-journal row opened by [`Self::poll_start`],
    /// records whether the cycle completed successfully, and returns the
    /// mail queued during the cycle for the caller to hand to the
    /// notification layer.
    pub fn poll_end(&self, id: i64, completed: bool) -> Result<Vec<DeferredMail>> {
        let now = Utc::now().to_rfc3339();
        {
            let conn = self.lock()?;
            conn.execute(
                "UPDATE p4dti_replications SET end = ?2, completed = ?3 WHERE id = ?1",
                params![id, now, completed as i64],
            )?;
        }

        let mail = {
            let mut queue = self
                .deferred_mail
                .lock()
                .map_err(|e| StorageError::Internal(format!("mutex poisoned: {e}")))?;
            std::mem::take(&mut *queue)
        };

        let mut in_cycle = self
            .in_cycle
            .lock()
            .map_err(|e| StorageError::Internal(format!("mutex poisoned: {e}")))?;
        *in_cycle = false;

        Ok(mail)
    }

    /// Queues a mail action to be flushed by the next [`Self::poll_end`].
    pub fn queue_mail(&self, to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Result<()> {
        let mut queue = self
            .deferred_mail
            .lock()
            .map_err(|e| StorageError::Internal(format!("mutex poisoned: {e}")))?;
        queue.push(DeferredMail {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        });
        Ok(())
    }

    fn last_replication_end(&self, rid: &str, sid: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.lock()?;
        let end: Option<String> = conn
            .query_row(
                "SELECT end FROM p4dti_replications WHERE rid = ?1 AND sid = ?2 AND completed = 1 \
                 ORDER BY start DESC LIMIT 1",
                params![rid, sid],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        Ok(end.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }))
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
    fn first_cycle_has_no_fence() {
        let store = store();
        let (id, fence) = store.poll_start("DT", "p4.example.com").unwrap();
        assert!(fence.is_none());
        store.poll_end(id, true).unwrap();
    }

    #[test]
    fn second_cycle_fences_on_first_end() {
        let store = store();
        let (id1, _) = store.poll_start("DT", "p4.example.com").unwrap();
        store.poll_end(id1, true).unwrap();

        let (_id2, fence) = store.poll_start("DT", "p4.example.com").unwrap();
        assert!(fence.is_some());
    }

    #[test]
    fn concurrent_cycle_is_rejected() {
        let store = store();
        let _ = store.poll_start("DT", "p4.example.com").unwrap();
        let err = store.poll_start("DT", "p4.example.com");
        assert!(matches!(err, Err(StorageError::DatabaseLocked(_))));
    }

    #[test]
    fn queued_mail_flushes_on_poll_end() {
        let store = store();
        let (id, _) = store.poll_start("DT", "p4.example.com").unwrap();
        store.queue_mail("admin@example.com", "conflict", "body").unwrap();
        let mail = store.poll_end(id, true).unwrap();
        assert_eq!(mail.len(), 1);
        assert_eq!(mail[0].subject, "conflict");
    }
}
