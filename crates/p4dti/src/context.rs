//! Wires a loaded [`ReplicatorConfig`] into a live [`Replicator`] over
//! the real adapters: [`SqliteStore`], [`ProcessJobStore`] over
//! [`ProcessJobClient`], and [`SmtpNotifier`].

use std::env;

use anyhow::{Context, Result};
use p4dti_config::ReplicatorConfig;
use p4dti_issuestore::SqliteStore;
use p4dti_jobstore::{ProcessJobClient, ProcessJobStore};
use p4dti_notify::SmtpNotifier;
use p4dti_replicator::Replicator;

use crate::cli::GlobalArgs;

pub type LiveReplicator = Replicator<SqliteStore, ProcessJobStore<ProcessJobClient>, SmtpNotifier>;

/// Loads configuration per `global`'s resolution rules and builds a
/// fully wired [`Replicator`] from it.
pub fn build_replicator(global: &GlobalArgs) -> Result<LiveReplicator> {
    let config = load_config(global)?;
    replicator_from_config(config)
}

/// Resolves and loads `config.yaml` without constructing the adapters,
/// for commands (`init`) that only need the path-resolution rules.
pub fn load_config(global: &GlobalArgs) -> Result<ReplicatorConfig> {
    let cwd = env::current_dir().context("resolving current directory")?;
    let path = p4dti_config::resolve_config_path(global.config.as_deref(), &cwd)
        .context("resolving .p4dti/config.yaml")?;
    ReplicatorConfig::load(&path).with_context(|| format!("loading {}", path.display()))
}

fn replicator_from_config(config: ReplicatorConfig) -> Result<LiveReplicator> {
    let issue_store = SqliteStore::open(&config.issue_store.database_path)
        .with_context(|| format!("opening issue store at {}", config.issue_store.database_path))?;
    issue_store.init_schema(&config.rid, &config.sid).context("initializing issue-store schema")?;

    let client = ProcessJobClient::new(config.job_store.client_binary.clone(), config.job_store.client_args.clone());
    client.negotiate_encoding().context("negotiating job store encoding")?;
    let job_store = ProcessJobStore::new(client);

    let notifier = SmtpNotifier::new(&config.smtp).context("configuring SMTP notifier")?;

    Ok(Replicator::new(config, issue_store, job_store, notifier))
}
