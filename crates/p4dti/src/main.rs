//! `p4dti` -- bidirectional issue-tracker/job-store replicator CLI.
//!
//! Parses arguments with clap, resolves and loads `.p4dti/config.yaml`,
//! wires up the real adapters, and dispatches to the requested
//! replicator operation.

mod cli;
mod context;
mod output;

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Commands};
use p4dti_config::ReplicatorConfig;
use p4dti_jobstore::JobStore;
use p4dti_replicator::PollBackoff;

/// Set on the first Ctrl+C; `run`'s loop checks it between poll cycles
/// and exits cleanly. A second signal force-exits immediately.
static CTRLC_RECEIVED: AtomicBool = AtomicBool::new(false);

fn main() {
    let _ = ctrlc::set_handler(|| {
        if CTRLC_RECEIVED.swap(true, Ordering::SeqCst) {
            std::process::exit(1);
        }
    });

    let cli = Cli::parse();

    if cli.global.verbose {
        tracing_subscriber::fmt().with_env_filter("p4dti=debug").with_writer(std::io::stderr).init();
    } else {
        tracing_subscriber::fmt().with_env_filter("p4dti=info").with_writer(std::io::stderr).init();
    }

    let result = dispatch(&cli);

    if let Err(e) = result {
        if cli.global.json {
            output::print_json(&serde_json::json!({ "error": format!("{e:#}") }));
        } else {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(1);
    }
}

fn dispatch(cli: &Cli) -> Result<()> {
    let json = cli.global.json;

    match &cli.command {
        Some(Commands::Poll) => {
            let mut r = context::build_replicator(&cli.global)?;
            let summary = r.poll().context("poll cycle failed")?;
            output::print_poll_summary(&summary, json);
            Ok(())
        }
        Some(Commands::Run) => run_loop(cli),
        Some(Commands::Refresh) => {
            let mut r = context::build_replicator(&cli.global)?;
            let summary = r.refresh().context("refresh failed")?;
            output::print_refresh_summary(&summary, json);
            Ok(())
        }
        Some(Commands::Check) => {
            let r = context::build_replicator(&cli.global)?;
            let report = r.audit().context("audit failed")?;
            output::print_audit_report(&report, json);
            Ok(())
        }
        Some(Commands::CheckJobs) => {
            let r = context::build_replicator(&cli.global)?;
            let report = r.check_jobs().context("check-jobs failed")?;
            if json {
                output::print_json(&report.failures);
            } else if report.failures.is_empty() {
                println!("all jobs match the jobspec");
            } else {
                println!("{} job(s) do not match the jobspec:", report.failures.len());
                for (name, reason) in &report.failures {
                    println!("  - {name}: {reason}");
                }
            }
            Ok(())
        }
        Some(Commands::CheckJobspec) => {
            let r = context::build_replicator(&cli.global)?;
            let target = r.target_jobspec();
            let issues = r.job_store().validate_jobspec(&target).context("check-jobspec failed")?;
            if json {
                let items: Vec<String> = issues.iter().map(|i| format!("{i:?}")).collect();
                output::print_json(&items);
            } else if issues.is_empty() {
                println!("installed jobspec already satisfies the replicator's requirements");
            } else {
                println!("{} jobspec issue(s):", issues.len());
                for issue in &issues {
                    println!("  - {issue:?}");
                }
            }
            Ok(())
        }
        Some(Commands::ExtendJobspec(args)) => {
            let r = context::build_replicator(&cli.global)?;
            let target = r.target_jobspec();
            let extended = r.job_store().extend_jobspec(&target, args.force).context("extend-jobspec failed")?;
            println!("jobspec now has {} field(s)", extended.fields.len());
            Ok(())
        }
        Some(Commands::Migrate(args)) => {
            let mut r = context::build_replicator(&cli.global)?;
            let summary = r.migrate(args.start.as_deref()).context("migrate failed")?;
            output::print_migration_summary(&summary, json);
            Ok(())
        }
        Some(Commands::MigrateUsers) => {
            let mut r = context::build_replicator(&cli.global)?;
            let summary = r.migrate_users().context("migrate-users failed")?;
            output::print_user_migration_summary(&summary, json);
            Ok(())
        }
        Some(Commands::Init(args)) => init(cli, args),
        Some(Commands::Version) => {
            println!("p4dti {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    }
}

/// Polls in a loop until interrupted. A failed cycle is mailed as an
/// admin report by the poll cycle itself; the loop doubles the poll
/// period and retries, halving it back to baseline after a success.
fn run_loop(cli: &Cli) -> Result<()> {
    let mut r = context::build_replicator(&cli.global)?;
    let mut backoff = PollBackoff::new(r.config().poll_period_secs, r.config().max_poll_period_secs);

    loop {
        match r.poll() {
            Ok(summary) => {
                output::print_poll_summary(&summary, cli.global.json);
                backoff.on_success();
            }
            Err(e) => {
                tracing::error!(error = %e, "poll cycle failed; backing off");
                backoff.on_failure();
            }
        }

        if CTRLC_RECEIVED.load(Ordering::SeqCst) {
            return Ok(());
        }
        thread::sleep(backoff.period());
        if CTRLC_RECEIVED.load(Ordering::SeqCst) {
            return Ok(());
        }
    }
}

/// Bootstraps a `.p4dti/` directory with a starter `config.yaml`
/// pointed at a fresh issue-store database.
fn init(cli: &Cli, args: &cli::InitArgs) -> Result<()> {
    let cwd = std::env::current_dir().context("resolving current directory")?;
    let dir = p4dti_config::p4dti_dir::init_p4dti_dir(&cwd).context("creating .p4dti directory")?;

    let config_path = cli.global.config.clone().unwrap_or_else(|| dir.join("config.yaml"));
    if config_path.exists() {
        anyhow::bail!("{} already exists", config_path.display());
    }

    let config = ReplicatorConfig::bootstrap(&args.rid, &args.sid, &args.database);
    config.save(&config_path).with_context(|| format!("writing {}", config_path.display()))?;

    let store = p4dti_issuestore::SqliteStore::open(&args.database)
        .with_context(|| format!("creating issue store at {}", args.database))?;
    store.init_schema(&args.rid, &args.sid).context("initializing issue-store schema")?;

    println!("initialized {} ({})", config_path.display(), args.database);
    Ok(())
}
