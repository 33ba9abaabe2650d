//! DDL statements and schema-extension migrations for the issue-side
//! SQLite database.
//!
//! The `issues` and `activity_log` tables model the native issue
//! tracker this replicator sits beside; everything prefixed `p4dti_` is
//! a schema extension this crate owns exclusively (link rows, mirror
//! tables, config, and the replications journal). Timestamps are stored
//! as TEXT in RFC 3339 (SQLite has no native datetime type); booleans as
//! INTEGER.

/// Current schema-extension version. Bumped whenever the `p4dti_*` DDL
/// changes; the upgrade map in [`UPGRADES`] must connect every
/// previously-shipped version to this one.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Lowest schema-extension version this build still knows how to
/// upgrade from.
pub const MIN_SUPPORTED_SCHEMA_VERSION: i32 = 1;

/// Core DDL statements executed by `init_schema`, idempotent via
/// `IF NOT EXISTS`.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    // -- Native issue tracker tables -----------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS issues (
        issue_id     INTEGER PRIMARY KEY AUTOINCREMENT,
        status       TEXT NOT NULL DEFAULT 'open',
        assignee     TEXT NOT NULL DEFAULT '',
        reporter     TEXT NOT NULL DEFAULT '',
        summary      TEXT NOT NULL,
        description  TEXT NOT NULL DEFAULT '',
        component    TEXT NOT NULL DEFAULT '',
        version      TEXT NOT NULL DEFAULT '',
        product      TEXT NOT NULL DEFAULT '',
        resolution   TEXT NOT NULL DEFAULT '',
        extra_json   TEXT NOT NULL DEFAULT '{}',
        creation_ts  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        delta_ts     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_issues_creation_ts ON issues(creation_ts)",
    "CREATE INDEX IF NOT EXISTS idx_issues_delta_ts ON issues(delta_ts)",
    "CREATE INDEX IF NOT EXISTS idx_issues_product ON issues(product)",
    r#"
    CREATE TABLE IF NOT EXISTS activity_log (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        issue_id    INTEGER NOT NULL,
        when_ts     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        who         TEXT NOT NULL,
        field       TEXT NOT NULL,
        old_value   TEXT NOT NULL DEFAULT '',
        new_value   TEXT NOT NULL DEFAULT '',
        FOREIGN KEY (issue_id) REFERENCES issues(issue_id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_activity_log_issue_when ON activity_log(issue_id, when_ts)",
    r#"
    CREATE TABLE IF NOT EXISTS users (
        user_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name    TEXT NOT NULL UNIQUE,
        email   TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_groups (
        user_id    INTEGER NOT NULL,
        group_name TEXT NOT NULL,
        PRIMARY KEY (user_id, group_name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS product_groups (
        product    TEXT NOT NULL,
        group_name TEXT NOT NULL,
        PRIMARY KEY (product, group_name)
    )
    "#,
    // -- Schema-extension tables, exclusively owned by the replicator --------
    r#"
    CREATE TABLE IF NOT EXISTS p4dti_link (
        issue_id INTEGER NOT NULL,
        rid      TEXT NOT NULL,
        sid      TEXT NOT NULL,
        jobname  TEXT NOT NULL,
        migrated TEXT,
        PRIMARY KEY (issue_id, rid, sid),
        FOREIGN KEY (issue_id) REFERENCES issues(issue_id) ON DELETE CASCADE
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_p4dti_link_jobname ON p4dti_link(jobname, rid, sid)",
    r#"
    CREATE TABLE IF NOT EXISTS p4dti_mirror_activity_log (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        issue_id  INTEGER NOT NULL,
        when_ts   TEXT NOT NULL,
        who       TEXT NOT NULL,
        field     TEXT NOT NULL,
        old_value TEXT NOT NULL DEFAULT '',
        new_value TEXT NOT NULL DEFAULT '',
        rid       TEXT NOT NULL,
        sid       TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_p4dti_mirror_log_lookup ON p4dti_mirror_activity_log(issue_id, when_ts, who, field, old_value, new_value, rid, sid)",
    r#"
    CREATE TABLE IF NOT EXISTS p4dti_changelists (
        change      INTEGER NOT NULL,
        rid         TEXT NOT NULL,
        sid         TEXT NOT NULL,
        user        TEXT NOT NULL,
        flags       TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        client      TEXT NOT NULL DEFAULT '',
        date        TEXT NOT NULL,
        status      TEXT NOT NULL,
        PRIMARY KEY (change, rid, sid)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS p4dti_fixes (
        change   INTEGER NOT NULL,
        issue_id INTEGER NOT NULL,
        rid      TEXT NOT NULL,
        sid      TEXT NOT NULL,
        user     TEXT NOT NULL,
        client   TEXT NOT NULL DEFAULT '',
        status   TEXT NOT NULL,
        date     TEXT NOT NULL,
        PRIMARY KEY (change, issue_id, rid, sid),
        FOREIGN KEY (issue_id) REFERENCES issues(issue_id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_p4dti_fixes_issue ON p4dti_fixes(issue_id, rid, sid)",
    r#"
    CREATE TABLE IF NOT EXISTS p4dti_filespecs (
        issue_id INTEGER NOT NULL,
        rid      TEXT NOT NULL,
        sid      TEXT NOT NULL,
        filespec TEXT NOT NULL,
        PRIMARY KEY (issue_id, rid, sid, filespec),
        FOREIGN KEY (issue_id) REFERENCES issues(issue_id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS p4dti_config (
        rid         TEXT NOT NULL,
        sid         TEXT NOT NULL,
        config_key  TEXT NOT NULL,
        config_value TEXT NOT NULL,
        PRIMARY KEY (rid, sid, config_key)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS p4dti_replications (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        rid       TEXT NOT NULL,
        sid       TEXT NOT NULL,
        start     TEXT NOT NULL,
        end       TEXT,
        completed INTEGER NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_p4dti_replications_rid_sid ON p4dti_replications(rid, sid, start)",
];

/// An ordered migration step: upgrades the schema-extension tables from
/// `from` to `to` by running `statements`.
pub struct Upgrade {
    pub from: i32,
    pub to: i32,
    pub statements: &'static [&'static str],
}

/// Static map of upgrade steps, keyed by source version, applied in
/// sequence until the stored version reaches [`CURRENT_SCHEMA_VERSION`].
///
/// Empty for now: this is the first shipped schema-extension version.
/// A future bump adds an `Upgrade { from: 1, to: 2, statements: &[...] }`
/// entry here, and `MIN_SUPPORTED_SCHEMA_VERSION` stays at 1 as long as
/// version 1 remains upgradeable.
pub const UPGRADES: &[Upgrade] = &[];
