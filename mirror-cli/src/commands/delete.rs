//! `catalog-mirror delete <NAME> [--yes]`

use std::io::{self, BufRead, Write};

use anyhow::{Context as _, Result};
use clap::Args;

use mirror_core::types::DatasetName;

use super::context::Context;
use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Dataset to delete.
    pub name: String,

    /// Skip the confirmation prompt.
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl DeleteArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let ctx = Context::load(global)?;
        let name = DatasetName::from(self.name);
        let dataset = ctx
            .store
            .load_dataset(&name)
            .with_context(|| format!("no record for dataset '{name}'"))?;

        println!("Deleting {}", dataset.label());
        if !self.yes && !confirm(&mut io::stdin().lock(), &mut io::stdout())? {
            println!("Quitting without delete");
            return Ok(());
        }

        let groups = ctx.with_mirror(|mirror| {
            mirror
                .delete_dataset(&name, true)
                .with_context(|| format!("delete failed for '{name}'"))
        })?;
        for group in groups {
            println!("  removed from group {group}");
        }
        println!("✓ '{}' deleted", dataset.name);
        Ok(())
    }
}

/// Ask for confirmation; any answer containing a `y` counts as yes.
fn confirm(input: &mut impl BufRead, output: &mut impl Write) -> Result<bool> {
    write!(output, "Are you sure you want to permanently delete files (yes, no): ")?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer).context("failed to read confirmation")?;
    Ok(answer.to_lowercase().contains('y'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_accepts_answers_with_y() {
        for (answer, expected) in [("yes\n", true), ("Y\n", true), ("no\n", false), ("\n", false)] {
            let mut out = Vec::new();
            let got = confirm(&mut answer.as_bytes(), &mut out).expect("confirm");
            assert_eq!(got, expected, "answer {answer:?}");
        }
    }
}
