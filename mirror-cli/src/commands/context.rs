//! Config, record store and remote clients shared by the commands.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};

use mirror_core::{config, MirrorConfig, RecordStore, RemoteId};
use mirror_drive::{DriveClient, SheetsLog};
use mirror_sync::{Capabilities, Mirror, MirrorSettings, UpdateOptions, WorkspaceCatalog};

use crate::GlobalArgs;

/// Everything a command needs before any remote call.
pub struct Context {
    pub config: MirrorConfig,
    pub config_path: PathBuf,
    pub store: RecordStore,
    pub workspace: PathBuf,
    pub output: PathBuf,
    pub options: UpdateOptions,
}

impl Context {
    pub fn load(global: &GlobalArgs) -> Result<Self> {
        let home = config::home().context("could not determine home directory")?;
        let config = config::load_at(&home)
            .with_context(|| format!("failed to load {}", config::config_path_at(&home).display()))?;
        let store = RecordStore::open(config.records_dir_at(&home));
        let workspace = match &global.workspace {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("could not determine current directory")?,
        };
        Ok(Self {
            config,
            config_path: config::config_path_at(&home),
            store,
            workspace,
            output: global.output.clone(),
            options: UpdateOptions {
                upload: !global.no_upload,
                force: global.force,
            },
        })
    }

    /// Delete and recreate the output directory.
    pub fn renew_output(&self) -> Result<()> {
        renew_dir(&self.output)
    }

    pub fn change_table(&self) -> PathBuf {
        self.config.change_table_for(&self.workspace)
    }

    /// Build the remote clients and hand a [`Mirror`] to `f`.
    pub fn with_mirror<T>(&self, f: impl FnOnce(&Mirror<'_>) -> Result<T>) -> Result<T> {
        let settings = self.settings()?;
        let api = &self.config.api;
        let token = read_token(&api.token_env)?;
        let owner_token = match std::env::var(&api.owner_token_env) {
            Ok(t) if !t.is_empty() => t,
            _ => token.clone(),
        };

        let standard = DriveClient::new(token.clone(), &api.drive_url, &api.upload_url);
        let ownership = DriveClient::new(owner_token, &api.drive_url, &api.upload_url);
        let audit = SheetsLog::new(token, &api.sheets_url);
        let catalog = WorkspaceCatalog::new(&self.workspace);

        let caps = Capabilities::new(&standard, &ownership, &self.config.owner);
        let mirror = Mirror::new(&self.store, caps, &catalog, &audit, settings);
        f(&mirror)
    }

    fn settings(&self) -> Result<MirrorSettings> {
        if self.config.root_folder_id.is_empty() {
            bail!("root_folder_id is not configured; set it in {}", self.config_path.display());
        }
        let hash_folder_id = Some(self.config.hash_folder_id.as_str())
            .filter(|id| !id.is_empty())
            .map(RemoteId::from);
        Ok(MirrorSettings {
            root_folder_id: RemoteId::from(self.config.root_folder_id.as_str()),
            hash_folder_id,
            audit_sheet_id: self.config.audit.sheet_id.clone(),
            audit_tab: self.config.audit.tab.clone(),
        })
    }
}

fn read_token(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(token) if !token.is_empty() => Ok(token),
        _ => bail!("no access token: set the {var} environment variable"),
    }
}

fn renew_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("failed to clear {}", dir.display()))?;
        tracing::debug!("cleared {}", dir.display());
    }
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn renew_dir_empties_existing_output() {
        let tmp = TempDir::new().expect("tmp");
        let out = tmp.path().join("package_temp");
        fs::create_dir_all(out.join("old")).expect("mkdir");
        fs::write(out.join("old/file"), "x").expect("write");

        renew_dir(&out).expect("renew");
        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).expect("read").count(), 0);
    }
}
