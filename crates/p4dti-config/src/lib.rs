//! Configuration management for the p4dti replicator.
//!
//! This crate handles loading and saving `.p4dti/config.yaml` files,
//! discovering `.p4dti/` directories in the filesystem, and providing
//! typed access to the replicator's configuration: identity (rid/sid),
//! the issue-store and job-store connections, conflict policy, feature
//! flags, SMTP settings, and poll cadence.

pub mod config;
pub mod p4dti_dir;

pub use config::{
    resolve_config_path, ConfigError, ConflictPolicy, FeatureFlags, IssueInvariantsConfig, IssueStoreConfig,
    JobStoreConfig, ReplicatorConfig, Result, SmtpConfig, StatusTranslationConfig, UserTranslationMode,
};
