use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReconError, Result};
use crate::models::SourceLabels;
use crate::reconciler::{DuplicatePolicy, ReconcileOptions};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub export_dir: String,
    #[serde(default = "default_left_label")]
    pub left_label: String,
    #[serde(default = "default_right_label")]
    pub right_label: String,
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
    #[serde(default = "default_unmatched_preview_rows")]
    pub unmatched_preview_rows: usize,
    #[serde(default)]
    pub duplicates: DuplicatePolicy,
    #[serde(default = "default_true")]
    pub case_insensitive_keys: bool,
}

fn default_left_label() -> String {
    SourceLabels::default().left
}

fn default_right_label() -> String {
    SourceLabels::default().right
}

fn default_preview_rows() -> usize {
    50
}

fn default_unmatched_preview_rows() -> usize {
    10
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            export_dir: default_export_dir().to_string_lossy().to_string(),
            left_label: default_left_label(),
            right_label: default_right_label(),
            preview_rows: default_preview_rows(),
            unmatched_preview_rows: default_unmatched_preview_rows(),
            duplicates: DuplicatePolicy::default(),
            case_insensitive_keys: true,
        }
    }
}

impl Settings {
    pub fn labels(&self) -> SourceLabels {
        SourceLabels {
            left: self.left_label.clone(),
            right: self.right_label.clone(),
        }
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            duplicates: self.duplicates,
            case_insensitive_keys: self.case_insensitive_keys,
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("payrecon")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_export_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("payrecon")
}

pub fn load_settings() -> Settings {
    load_settings_from(&settings_path())
}

fn load_settings_from(path: &Path) -> Settings {
    if path.exists() {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(settings, &settings_path())
}

fn save_settings_to(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| ReconError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}
