//! Configuration types and loading for the p4dti replicator.
//!
//! The main entry point is [`ReplicatorConfig`], which represents the
//! contents of `.p4dti/config.yaml`. Configuration is loaded with
//! [`ReplicatorConfig::load`] and saved with [`ReplicatorConfig::save`].

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// The configuration file contained invalid YAML.
    #[error("failed to parse config file: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// No `.p4dti/` directory was found and none was given explicitly.
    #[error("no .p4dti directory found (run 'p4dti init' first)")]
    P4dtiDirNotFound,

    /// A configuration value was invalid.
    #[error("invalid configuration value for key '{key}': {reason}")]
    InvalidValue {
        /// The configuration key that had an invalid value.
        key: String,
        /// A description of why the value is invalid.
        reason: String,
    },
}

/// A specialized `Result` type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// ---------------------------------------------------------------------------
// Conflict resolution
// ---------------------------------------------------------------------------

/// The default conflict-resolution policy applied when both sides have
/// changed an entity since the last mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Side 0 (the issue store) wins; the job is overwritten. Default,
    /// since side-1 jobs are treated as a working copy.
    #[default]
    Dt,
    /// Side 1 (the job store) wins; the issue is overwritten.
    P4,
    /// Neither side is overwritten this cycle.
    NoAction,
}

// ---------------------------------------------------------------------------
// User translation mode
// ---------------------------------------------------------------------------

/// Controls how the user translator handles a side-1 user with no known
/// email match on side 0 (and vice versa).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserTranslationMode {
    /// Fail translation of an unknown user.
    #[default]
    Strict,
    /// Map unknown users to the configured bookkeeping user. Used for
    /// fix/changelist user fields where historical users may have
    /// vanished.
    Lax,
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Issue-side (side 0) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueStoreConfig {
    /// Path to the SQLite database file.
    pub database_path: String,

    /// User predicate: a SQL-style `LIKE` pattern over `product`,
    /// matched when deciding whether an unowned new issue should be
    /// accepted for replication.
    #[serde(default = "default_predicate")]
    pub accept_product_pattern: String,
}

/// Job-side (side 1) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStoreConfig {
    /// Path to the subprocess client binary (e.g. a `p4`-compatible CLI).
    pub client_binary: String,

    /// Additional arguments passed to every invocation (port, user,
    /// client spec), before the per-command arguments.
    #[serde(default)]
    pub client_args: Vec<String>,

    /// Whether to request server-assigned job names (`new`) on create
    /// rather than the issue-supplied name.
    #[serde(default)]
    pub use_job_store_names: bool,

    /// Skip installing/extending the jobspec at startup; assume an
    /// administrator has already brought it into compliance.
    #[serde(default)]
    pub keep_jobspec: bool,
}

/// SMTP settings for the notification crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub relay_host: String,
    #[serde(default = "default_smtp_port")]
    pub relay_port: u16,
    pub from_address: String,
    pub admin_address: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_smtp_port() -> u16 {
    25
}

fn default_predicate() -> String {
    "*".to_string()
}

/// Feature flags toggling optional replication surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlags {
    #[serde(default = "default_true")]
    pub fixes: bool,
    #[serde(default = "default_true")]
    pub filespecs: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            fixes: true,
            filespecs: true,
        }
    }
}

/// Status translation settings: the closed-state convention and
/// prohibited-name remapping applied when constructing the table-driven
/// status translator.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StatusTranslationConfig {
    /// Side-0 statuses considered closed, beyond the built-in `closed`.
    #[serde(default)]
    pub closed_states: Vec<String>,
    /// Prefix used to remap the prohibited side-1 status names `new` and
    /// `ignore` (e.g. prefix `dt` maps them to `dt_new`/`dt_ignore`).
    #[serde(default = "default_prohibited_prefix")]
    pub prohibited_name_prefix: String,
}

fn default_prohibited_prefix() -> String {
    "dt".to_string()
}

/// Site-configured invariant policy for issue updates: read-only and
/// append-only field sets, the allowed state-transition table, and the
/// resolved/unresolved state partition. Converted into
/// [`p4dti_core::validation::IssueInvariants`] at replicator startup.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IssueInvariantsConfig {
    #[serde(default)]
    pub read_only_fields: Vec<String>,
    #[serde(default)]
    pub append_only_fields: Vec<String>,
    /// Allowed next-states per current status. A status absent from this
    /// map has no restriction.
    #[serde(default)]
    pub transitions: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub resolved_states: Vec<String>,
    #[serde(default)]
    pub unresolved_states: Vec<String>,
    #[serde(default = "default_resolution")]
    pub default_resolution: String,
}

fn default_resolution() -> String {
    "FIXED".to_string()
}

// ---------------------------------------------------------------------------
// Top-level configuration
// ---------------------------------------------------------------------------

/// The full contents of `.p4dti/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicatorConfig {
    /// Replicator id, scoping all replicator-owned rows on side 0.
    pub rid: String,
    /// Server id, identifying the side-1 server instance.
    pub sid: String,

    pub issue_store: IssueStoreConfig,
    pub job_store: JobStoreConfig,
    pub smtp: SmtpConfig,

    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
    #[serde(default)]
    pub user_translation_mode: UserTranslationMode,
    #[serde(default)]
    pub features: FeatureFlags,
    #[serde(default)]
    pub status_translation: StatusTranslationConfig,
    #[serde(default)]
    pub invariants: IssueInvariantsConfig,

    /// The replicator's own bookkeeping user name on side 1, and its
    /// matching account on side 0. Both must resolve to the same email
    /// or startup is fatal.
    pub bookkeeping_user_side1: String,
    pub bookkeeping_user_side0: String,

    /// Base poll cadence in seconds. Doubled on each consecutive poll
    /// failure and reset to this value after a successful poll.
    #[serde(default = "default_poll_period_secs")]
    pub poll_period_secs: u64,

    /// Upper bound the doubling back-off is clamped to.
    #[serde(default = "default_max_poll_period_secs")]
    pub max_poll_period_secs: u64,

    /// Free-form site settings not otherwise modeled, preserved
    /// round-trip.
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

fn default_poll_period_secs() -> u64 {
    30
}

fn default_max_poll_period_secs() -> u64 {
    3600
}

impl ReplicatorConfig {
    /// Loads configuration from a YAML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Saves configuration to a YAML file at `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = serde_yaml::to_string(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// A minimal configuration suitable for `p4dti init` to bootstrap,
    /// pointed at the given database path.
    pub fn bootstrap(rid: &str, sid: &str, database_path: &str) -> Self {
        Self {
            rid: rid.to_string(),
            sid: sid.to_string(),
            issue_store: IssueStoreConfig {
                database_path: database_path.to_string(),
                accept_product_pattern: default_predicate(),
            },
            job_store: JobStoreConfig {
                client_binary: "p4".to_string(),
                client_args: Vec::new(),
                use_job_store_names: false,
                keep_jobspec: false,
            },
            smtp: SmtpConfig {
                relay_host: "localhost".to_string(),
                relay_port: default_smtp_port(),
                from_address: format!("{rid}@localhost"),
                admin_address: format!("{rid}-admin@localhost"),
                username: None,
                password: None,
            },
            conflict_policy: ConflictPolicy::default(),
            user_translation_mode: UserTranslationMode::default(),
            features: FeatureFlags::default(),
            status_translation: StatusTranslationConfig::default(),
            invariants: IssueInvariantsConfig::default(),
            bookkeeping_user_side1: format!("{rid}-dt"),
            bookkeeping_user_side0: format!("{rid}-dt"),
            poll_period_secs: default_poll_period_secs(),
            max_poll_period_secs: default_max_poll_period_secs(),
            extra: HashMap::new(),
        }
    }
}

/// Resolves the configuration file path, in priority order: an explicit
/// `--config` flag, then the `P4DTI_CONFIG` environment variable, then
/// `.p4dti/config.yaml` discovered by walking up from `cwd`.
pub fn resolve_config_path(explicit: Option<&Path>, cwd: &Path) -> Result<std::path::PathBuf> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }
    if let Ok(env_path) = std::env::var(crate::p4dti_dir::P4DTI_CONFIG_ENV) {
        return Ok(std::path::PathBuf::from(env_path));
    }
    let dir = crate::p4dti_dir::find_p4dti_dir(cwd).ok_or(ConfigError::P4dtiDirNotFound)?;
    Ok(dir.join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn bootstrap_round_trips_through_yaml() {
        let config = ReplicatorConfig::bootstrap("DT", "p4.example.com", "/tmp/p4dti.db");
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        config.save(&path).unwrap();

        let loaded = ReplicatorConfig::load(&path).unwrap();
        assert_eq!(loaded.rid, "DT");
        assert_eq!(loaded.sid, "p4.example.com");
        assert_eq!(loaded.conflict_policy, ConflictPolicy::Dt);
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempdir().unwrap();
        let err = ReplicatorConfig::load(dir.path().join("nope.yaml"));
        assert!(matches!(err, Err(ConfigError::ReadError(_))));
    }

    #[test]
    fn resolve_config_path_prefers_explicit() {
        let dir = tempdir().unwrap();
        let explicit = dir.path().join("explicit.yaml");
        let resolved = resolve_config_path(Some(&explicit), dir.path()).unwrap();
        assert_eq!(resolved, explicit);
    }
}
