//! `catalog-mirror changed | changed-groups | dataset | group`

use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use chrono::Local;
use clap::Args;
use colored::Colorize;

use mirror_core::types::{DatasetName, GroupName};
use mirror_detector::ChangeWindow;
use mirror_sync::pipeline::{self, read_dataset_list, read_group_list, ChangeSource, SyncScope};
use mirror_sync::{DatasetStatus, RunSummary};

use super::context::Context;
use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct ChangedArgs {
    /// Only datasets in this category (case-insensitive).
    #[arg(long)]
    pub category: Option<String>,

    /// Look back this many days instead of yesterday only.
    #[arg(long, value_name = "N")]
    pub days: Option<u32>,
}

#[derive(Args, Debug)]
pub struct ChangedGroupsArgs {
    /// Look back this many days instead of yesterday only.
    #[arg(long, value_name = "N")]
    pub days: Option<u32>,
}

#[derive(Args, Debug)]
pub struct DatasetArgs {
    /// Dataset names.
    #[arg(required_unless_present = "list", conflicts_with = "list")]
    pub names: Vec<String>,

    /// JSON file with a `datasets` array.
    #[arg(long, value_name = "FILE")]
    pub list: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct GroupArgs {
    /// Group names.
    #[arg(required_unless_present = "list", conflicts_with = "list")]
    pub names: Vec<String>,

    /// JSON file with a `groups` array.
    #[arg(long, value_name = "FILE")]
    pub list: Option<PathBuf>,
}

impl ChangedArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let scope = SyncScope::ChangedDatasets {
            category: self.category,
        };
        run_scope(global, scope, window(self.days))
    }
}

impl ChangedGroupsArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        run_scope(global, SyncScope::ChangedGroups, window(self.days))
    }
}

impl DatasetArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let names = match &self.list {
            Some(path) => read_dataset_list(path).with_context(|| format!("failed to read {}", path.display()))?,
            None => self.names.into_iter().map(DatasetName::from).collect(),
        };
        run_scope(global, SyncScope::Datasets(names), ChangeWindow::default())
    }
}

impl GroupArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let names = match &self.list {
            Some(path) => read_group_list(path).with_context(|| format!("failed to read {}", path.display()))?,
            None => self.names.into_iter().map(GroupName::from).collect(),
        };
        run_scope(global, SyncScope::Groups(names), ChangeWindow::default())
    }
}

fn window(days: Option<u32>) -> ChangeWindow {
    days.map(ChangeWindow::TrailingDays).unwrap_or_default()
}

fn run_scope(global: &GlobalArgs, scope: SyncScope, window: ChangeWindow) -> Result<()> {
    let ctx = Context::load(global)?;
    if !ctx.workspace.is_dir() {
        bail!("workspace {} is not a directory", ctx.workspace.display());
    }
    ctx.renew_output()?;

    let changes = ChangeSource {
        table: ctx.change_table(),
        today: Local::now().date_naive(),
        window,
    };
    let summary = ctx.with_mirror(|mirror| {
        pipeline::run(mirror, scope, &changes, &ctx.output, ctx.options).context("sync run failed")
    })?;

    print_summary(&summary, ctx.options.upload);
    Ok(())
}

fn print_summary(summary: &RunSummary, upload: bool) {
    for outcome in &summary.datasets {
        let (mark, label) = match outcome.status {
            DatasetStatus::Uploaded => ("✓".green(), "uploaded"),
            DatasetStatus::Packaged => ("✓".green(), "packaged"),
            DatasetStatus::Unchanged => ("·".bright_black(), "unchanged"),
            DatasetStatus::Skipped => ("!".yellow(), "source missing, skipped"),
        };
        println!(
            "{mark} '{}' {label} ({:.1}s)",
            outcome.name,
            outcome.duration.as_secs_f64()
        );
    }
    for failure in &summary.failures {
        println!("{} {}: {}", "✗".red(), failure.item, failure.error);
    }

    if !upload {
        println!("[no-upload] payloads left in the output directory");
    }
    println!(
        "{} dataset(s) processed, {} failed, {} group(s) touched",
        summary.datasets.len(),
        summary.failures.len(),
        summary.groups_touched.len()
    );
    for group in &summary.groups_touched {
        println!("  group updated: {group}");
    }
}
