//! `~/.catalog-mirror/config.yaml`: remote folder IDs, audit sheet, API endpoints.
//!
//! Follows the `fn_at(home)` / `fn()` pair: tests always pass an explicit home.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CONFIG_DIR: &str = ".catalog-mirror";
pub const CONFIG_FILE: &str = "config.yaml";

/// Audit sheet settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub sheet_id: String,
    pub tab: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sheet_id: String::new(),
            tab: "Drive Update".to_string(),
        }
    }
}

/// Endpoints and credential sources for the remote services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub drive_url: String,
    pub upload_url: String,
    pub sheets_url: String,
    /// Environment variable holding the standard bearer token.
    pub token_env: String,
    /// Environment variable holding the ownership-capable bearer token.
    pub owner_token_env: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            drive_url: "https://www.googleapis.com/drive/v3".to_string(),
            upload_url: "https://www.googleapis.com/upload/drive/v3".to_string(),
            sheets_url: "https://sheets.googleapis.com/v4".to_string(),
            token_env: "CATALOG_MIRROR_TOKEN".to_string(),
            owner_token_env: "CATALOG_MIRROR_OWNER_TOKEN".to_string(),
        }
    }
}

/// Root of `config.yaml`. Every field has a default so a partial file loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MirrorConfig {
    /// Record store root; defaults to `<home>/.catalog-mirror/records`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records_dir: Option<PathBuf>,
    /// Folder under which category folders are created.
    pub root_folder_id: String,
    /// Folder receiving every dataset's hash artifact.
    pub hash_folder_id: String,
    /// Administrative principal that owns created folders and files.
    pub owner: String,
    /// Change-detection table; defaults to `<workspace>/change_detection.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_table: Option<PathBuf>,
    pub audit: AuditConfig,
    pub api: ApiConfig,
}

impl MirrorConfig {
    /// Resolved record store root.
    pub fn records_dir_at(&self, home: &Path) -> PathBuf {
        self.records_dir
            .clone()
            .unwrap_or_else(|| home.join(CONFIG_DIR).join("records"))
    }

    /// Resolved change-detection table for `workspace`.
    pub fn change_table_for(&self, workspace: &Path) -> PathBuf {
        self.change_table
            .clone()
            .unwrap_or_else(|| workspace.join("change_detection.json"))
    }
}

/// `<home>/.catalog-mirror/config.yaml`. Pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// Load the config, returning defaults when the file does not exist.
pub fn load_at(home: &Path) -> Result<MirrorConfig, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(MirrorConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
        path: path.clone(),
        source: e,
    })?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// Atomically write the config.
pub fn save_at(home: &Path, config: &MirrorConfig) -> Result<(), ConfigError> {
    let path = config_path_at(home);
    let dir = home.join(CONFIG_DIR);
    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::Io {
        path: dir.clone(),
        source: e,
    })?;
    let yaml = serde_yaml::to_string(config)?;
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, yaml).map_err(|e| ConfigError::Io {
        path: tmp.clone(),
        source: e,
    })?;
    std::fs::rename(&tmp, &path).map_err(|e| ConfigError::Io { path, source: e })
}

pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let home = TempDir::new().expect("home");
        let config = load_at(home.path()).expect("load");
        assert_eq!(config, MirrorConfig::default());
        assert_eq!(config.audit.tab, "Drive Update");
        assert!(config
            .records_dir_at(home.path())
            .ends_with(".catalog-mirror/records"));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let home = TempDir::new().expect("home");
        let dir = home.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(
            dir.join(CONFIG_FILE),
            "root_folder_id: root-1\naudit:\n  sheet_id: sheet-9\n",
        )
        .expect("write");

        let config = load_at(home.path()).expect("load");
        assert_eq!(config.root_folder_id, "root-1");
        assert_eq!(config.audit.sheet_id, "sheet-9");
        assert_eq!(config.audit.tab, "Drive Update");
        assert_eq!(config.api.token_env, "CATALOG_MIRROR_TOKEN");
    }

    #[test]
    fn save_then_load_roundtrip() {
        let home = TempDir::new().expect("home");
        let config = MirrorConfig {
            root_folder_id: "root".into(),
            owner: "admin@example.org".into(),
            ..MirrorConfig::default()
        };
        save_at(home.path(), &config).expect("save");
        assert_eq!(load_at(home.path()).expect("load"), config);
    }

    #[test]
    fn malformed_yaml_reports_path() {
        let home = TempDir::new().expect("home");
        let dir = home.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(dir.join(CONFIG_FILE), "- not: [a mapping").expect("write");

        let err = load_at(home.path()).unwrap_err();
        assert!(err.to_string().contains("config.yaml"));
    }
}
