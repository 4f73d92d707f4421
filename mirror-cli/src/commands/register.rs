//! `catalog-mirror register dataset|group`

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};

use mirror_core::types::{DatasetName, GroupName};
use mirror_core::{config, RecordStore};

#[derive(Subcommand, Debug)]
pub enum RegisterCommand {
    /// Create a dataset record.
    Dataset(RegisterDatasetArgs),

    /// Create a group record or add members to an existing one.
    Group(RegisterGroupArgs),
}

#[derive(Args, Debug)]
pub struct RegisterDatasetArgs {
    pub name: String,

    #[arg(long, short = 'c')]
    pub category: String,
}

#[derive(Args, Debug)]
pub struct RegisterGroupArgs {
    pub name: String,

    #[arg(long, short = 'c')]
    pub category: String,

    /// Member dataset; repeat for several.
    #[arg(long = "member", short = 'm', value_name = "NAME")]
    pub members: Vec<String>,
}

pub fn run(cmd: RegisterCommand) -> Result<()> {
    let store = open_store()?;
    match cmd {
        RegisterCommand::Dataset(args) => {
            let dataset = store
                .register_dataset(DatasetName::from(args.name), &args.category)
                .context("failed to register dataset")?;
            println!("✓ dataset '{}' registered in '{}'", dataset.name, dataset.category);
        }
        RegisterCommand::Group(args) => {
            let members: Vec<DatasetName> = args.members.into_iter().map(DatasetName::from).collect();
            for member in &members {
                if !store.dataset_exists(member) {
                    println!("  warning: '{member}' has no dataset record yet");
                }
            }
            let group = store
                .register_group(GroupName::from(args.name), &args.category, members)
                .context("failed to register group")?;
            println!(
                "✓ group '{}' registered in '{}' ({} member(s))",
                group.name,
                group.category,
                group.datasets.len()
            );
        }
    }
    Ok(())
}

pub(crate) fn open_store() -> Result<RecordStore> {
    let home = config::home().context("could not determine home directory")?;
    let cfg = config::load_at(&home).context("failed to load config")?;
    Ok(RecordStore::open(cfg.records_dir_at(&home)))
}
