//! catalog-mirror: publish workspace datasets and groups to a remote folder tree.
//!
//! # Usage
//!
//! ```text
//! catalog-mirror [--workspace DIR] [-f] [-n] [--output DIR] changed [--category C] [--days N]
//! catalog-mirror changed-groups [--days N]
//! catalog-mirror dataset <NAME>... | dataset --list FILE
//! catalog-mirror group <NAME>...   | group --list FILE
//! catalog-mirror upload <NAME>
//! catalog-mirror delete <NAME> [--yes]
//! catalog-mirror register dataset <NAME> --category C
//! catalog-mirror register group <NAME> --category C [--member NAME]...
//! catalog-mirror status [--json]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use commands::{
    delete::DeleteArgs,
    register::RegisterCommand,
    status::StatusArgs,
    sync::{ChangedArgs, ChangedGroupsArgs, DatasetArgs, GroupArgs},
    upload::UploadArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "catalog-mirror",
    version,
    about = "Mirror workspace datasets and groups into a remote folder hierarchy",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory holding the source datasets. Defaults to the current directory.
    #[arg(long, global = true, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Upload even when a dataset's payload is unchanged.
    #[arg(short = 'f', long, global = true)]
    pub force: bool,

    /// Package locally without uploading anything.
    #[arg(short = 'n', long = "no-upload", global = true)]
    pub no_upload: bool,

    /// Scratch directory for exports and archives.
    #[arg(long, global = true, value_name = "DIR", default_value = "package_temp")]
    pub output: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Update every dataset reported by the change table.
    Changed(ChangedArgs),

    /// Update every group declaring a changed dataset.
    ChangedGroups(ChangedGroupsArgs),

    /// Update named datasets.
    Dataset(DatasetArgs),

    /// Reconcile named groups and update their members.
    Group(GroupArgs),

    /// Upload a payload packaged by an earlier `--no-upload` run.
    Upload(UploadArgs),

    /// Permanently delete a dataset's remote files and record.
    Delete(DeleteArgs),

    /// Create or extend dataset and group records.
    Register {
        #[command(subcommand)]
        command: RegisterCommand,
    },

    /// Show registered datasets and groups.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let global = cli.global;
    match cli.command {
        Commands::Changed(args) => args.run(&global),
        Commands::ChangedGroups(args) => args.run(&global),
        Commands::Dataset(args) => args.run(&global),
        Commands::Group(args) => args.run(&global),
        Commands::Upload(args) => args.run(&global),
        Commands::Delete(args) => args.run(&global),
        Commands::Register { command } => commands::register::run(command),
        Commands::Status(args) => args.run(),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
