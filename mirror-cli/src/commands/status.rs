//! `catalog-mirror status`: registered datasets and groups.

use anyhow::{Context as _, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use mirror_core::types::{Dataset, Group};

use super::register::open_store;

/// Arguments for `catalog-mirror status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let store = open_store()?;
        let datasets = store.list_datasets().context("failed to list dataset records")?;
        let groups = store.list_groups().context("failed to list group records")?;

        if self.json {
            print_json(&datasets, &groups)?;
            return Ok(());
        }
        print_tables(&datasets, &groups);
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusJson<'a> {
    datasets: &'a [Dataset],
    groups: &'a [Group],
}

#[derive(Tabled)]
struct DatasetRow {
    #[tabled(rename = "dataset")]
    name: String,
    #[tabled(rename = "category")]
    category: String,
    #[tabled(rename = "state")]
    state: String,
    #[tabled(rename = "groups")]
    groups: String,
    #[tabled(rename = "last sync")]
    last_sync: String,
}

#[derive(Tabled)]
struct GroupRow {
    #[tabled(rename = "group")]
    name: String,
    #[tabled(rename = "category")]
    category: String,
    #[tabled(rename = "members")]
    members: usize,
    #[tabled(rename = "folders")]
    folders: String,
}

fn print_json(datasets: &[Dataset], groups: &[Group]) -> Result<()> {
    let payload = StatusJson { datasets, groups };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_tables(datasets: &[Dataset], groups: &[Group]) {
    println!(
        "catalog-mirror v{} | {} datasets | {} groups",
        env!("CARGO_PKG_VERSION"),
        datasets.len(),
        groups.len(),
    );
    if datasets.is_empty() && groups.is_empty() {
        println!("No records registered.");
        return;
    }

    if !datasets.is_empty() {
        let rows: Vec<DatasetRow> = datasets
            .iter()
            .map(|d| DatasetRow {
                name: d.name.to_string(),
                category: d.category.clone(),
                state: dataset_state(d),
                groups: d.groups.iter().map(|g| g.to_string()).collect::<Vec<_>>().join(", "),
                last_sync: d
                    .last_synced
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".to_string()),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{}", "DATASETS".bold());
        println!("{table}");
    }

    if !groups.is_empty() {
        let rows: Vec<GroupRow> = groups
            .iter()
            .map(|g| GroupRow {
                name: g.name.to_string(),
                category: g.category.clone(),
                members: g.datasets.len(),
                folders: if g.needs_skeleton() {
                    "missing".yellow().to_string()
                } else {
                    "ready".green().to_string()
                },
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{}", "GROUPS".bold());
        println!("{table}");
    }
}

fn dataset_state(dataset: &Dataset) -> String {
    if dataset.primary_file_id.is_some() && dataset.shape_file_id.is_some() {
        "published".green().to_string()
    } else if dataset.remote_folder_ids.is_empty() {
        "new".bright_black().to_string()
    } else {
        "packaged".yellow().to_string()
    }
}
