//! Clap CLI definitions for the `p4dti` command.
//!
//! One flattened set of global flags plus a subcommand enum, each
//! variant carrying its own `clap::Args` struct when it takes
//! parameters.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// p4dti -- defect tracker / job store replicator.
#[derive(Parser, Debug)]
#[command(name = "p4dti", about = "Defect tracker <-> job store replicator", version, propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Global flags available to all subcommands.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to `config.yaml` (default: `P4DTI_CONFIG` env, else `.p4dti/`
    /// discovered by walking up from the current directory).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit command output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug-level logging to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Runs a single poll cycle.
    Poll,
    /// Runs the poll loop until interrupted, backing off the poll
    /// period on repeated failure.
    Run,
    /// Force-pushes every issue to its linked job.
    Refresh,
    /// Read-only consistency audit across every linked pair.
    Check,
    /// Validates every existing job against the installed jobspec.
    CheckJobs,
    /// Compares the installed jobspec against the target one, without
    /// writing anything.
    CheckJobspec,
    /// Installs or extends the jobspec with the replicator's fields.
    ExtendJobspec(ExtendJobspecArgs),
    /// Imports pre-existing unlinked jobs as new issues.
    Migrate(MigrateArgs),
    /// Cross-checks user accounts on both sides.
    MigrateUsers,
    /// Bootstraps a `.p4dti/` directory and a starter `config.yaml`.
    Init(InitArgs),
    /// Prints the replicator version.
    Version,
}

#[derive(Args, Debug)]
pub struct ExtendJobspecArgs {
    /// Overwrite conflicting field definitions instead of failing.
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Resume migration from this job name (inclusive).
    #[arg(long)]
    pub start: Option<String>,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Replicator id.
    #[arg(long)]
    pub rid: String,
    /// Job-store server id.
    #[arg(long)]
    pub sid: String,
    /// Path to the issue-side SQLite database to create.
    #[arg(long, default_value = "p4dti.db")]
    pub database: String,
}
