use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::filter::{FeatureGate, FilterCriteria};
use crate::settings::Settings;

/// User preferences persisted as `prefs.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
  pub enabled: bool,
  pub advanced_filters: bool,
  pub criteria: FilterCriteria,
}

impl Default for Config {
  fn default() -> Self {
    Self { enabled: true, advanced_filters: false, criteria: FilterCriteria::default() }
  }
}

pub fn project_dirs() -> Option<ProjectDirs> {
  ProjectDirs::from("", "", "vidsift")
}

fn prefs_path() -> Option<PathBuf> {
  project_dirs().map(|dirs| dirs.config_dir().join("prefs.toml"))
}

impl Config {
  /// Load from the user config dir, falling back to defaults on any problem.
  pub fn load() -> Self {
    if let Some(path) = prefs_path()
      && path.exists()
    {
      match Self::load_from(&path) {
        Ok(config) => return config,
        Err(e) => warn!(err = %format!("{e:#}"), "config: ignoring unreadable prefs"),
      }
    }
    Self::default()
  }

  pub fn load_from(path: &Path) -> Result<Self> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
  }

  pub fn save(&self) -> Result<PathBuf> {
    let path = prefs_path().context("No home directory to store preferences in")?;
    self.save_to(&path)?;
    Ok(path)
  }

  pub fn save_to(&self, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
      std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let content = toml::to_string(self).context("Failed to serialize preferences")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
  }

  pub fn settings(&self) -> Settings {
    Settings { enabled: self.enabled, criteria: self.criteria.clone() }
  }

  pub fn gate(&self) -> FeatureGate {
    FeatureGate { advanced_filters: self.advanced_filters }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn save_then_load_keeps_criteria() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("prefs.toml");
    let config = Config {
      enabled: false,
      advanced_filters: true,
      criteria: FilterCriteria {
        min_duration: Some(300),
        keywords: vec!["rust".to_string()],
        exclude_channels: vec!["Spam".to_string()],
        ..Default::default()
      },
    };
    config.save_to(&path).unwrap();
    assert_eq!(Config::load_from(&path).unwrap(), config);
  }

  #[test]
  fn missing_keys_use_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.toml");
    std::fs::write(&path, "advanced_filters = true\n[criteria]\nmax_duration = 600\n").unwrap();
    let config = Config::load_from(&path).unwrap();
    assert!(config.enabled);
    assert!(config.gate().advanced_filters);
    assert_eq!(config.settings().criteria.max_duration, Some(600));
    assert!(config.settings().criteria.keywords.is_empty());
  }

  #[test]
  fn malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.toml");
    std::fs::write(&path, "enabled = \"yes\"").unwrap();
    assert!(Config::load_from(&path).is_err());
  }
}
