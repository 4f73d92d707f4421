//! `catalog-mirror upload <NAME>`

use anyhow::{Context as _, Result};
use clap::Args;

use mirror_core::types::DatasetName;

use super::context::Context;
use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Dataset whose packaged files are in the output directory.
    pub name: String,
}

impl UploadArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let ctx = Context::load(global)?;
        let name = DatasetName::from(self.name);
        let dataset = ctx.with_mirror(|mirror| {
            mirror
                .upload_only(&name, &ctx.output)
                .with_context(|| format!("upload failed for '{name}'"))
        })?;

        println!("✓ '{}' uploaded from {}", dataset.name, ctx.output.display());
        Ok(())
    }
}
