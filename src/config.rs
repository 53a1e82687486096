//! Settings file handling
//!
//! The daemon reads `wallshift.toml` from the user config directory:
//!
//! ```toml
//! log_level = "info"
//! rotate_time = 3600
//!
//! [workspaces]
//! 1 = "/home/me/walls"
//! 2 = ["/home/me/walls", "/mnt/photos"]
//! ```
//!
//! A missing `rotate_time` (or any value <= 0) disables periodic rotation.
//! A parse failure is surfaced to the caller, who keeps the previous
//! settings; a broken edit never wipes running state.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::constants::{config, workspace};
use crate::types::LogLevel;

/// One directory or several; TOML accepts either shape for a workspace
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DirList {
    One(PathBuf),
    Many(Vec<PathBuf>),
}

impl DirList {
    fn into_vec(self) -> Vec<PathBuf> {
        match self {
            Self::One(path) => vec![path],
            Self::Many(paths) => paths,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    pub log_level: Option<LogLevel>,
    pub rotate_time: Option<i64>,
    #[serde(default)]
    pub workspaces: HashMap<String, DirList>,
}

impl Settings {
    /// `<config_dir>/wallshift/wallshift.toml`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(config::APP_DIR);
        path.push(config::FILE_NAME);
        path
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .context(format!("failed to read settings file {}", path.display()))?;
        toml::from_str(&contents)
            .context(format!("failed to parse settings file {}", path.display()))
    }

    /// Periodic rotation interval, `None` when rotation is disabled
    pub fn rotate_interval(&self) -> Option<Duration> {
        self.rotate_time
            .filter(|&secs| secs > 0)
            .map(|secs| Duration::from_secs(secs as u64))
    }

    /// Workspace id to directory-list map derived from the `workspaces`
    /// table. Keys that are not numeric or out of range are dropped with a
    /// warning; the rest of the table still applies.
    pub fn folder_map(&self) -> HashMap<u32, Vec<PathBuf>> {
        let mut map = HashMap::new();
        for (key, dirs) in &self.workspaces {
            match key.parse::<u32>() {
                Ok(ws) if (1..=workspace::MAX).contains(&ws) => {
                    map.insert(ws, dirs.clone().into_vec());
                }
                _ => warn!(key = %key, "ignoring invalid workspace id in settings"),
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_and_multi_directory() {
        let settings: Settings = toml::from_str(
            r#"
            log_level = "debug"
            rotate_time = 3600

            [workspaces]
            1 = "/walls/main"
            2 = ["/walls/a", "/walls/b"]
            "#,
        )
        .unwrap();

        assert_eq!(settings.log_level, Some(LogLevel::Debug));
        assert_eq!(settings.rotate_interval(), Some(Duration::from_secs(3600)));

        let folders = settings.folder_map();
        assert_eq!(folders[&1], vec![PathBuf::from("/walls/main")]);
        assert_eq!(
            folders[&2],
            vec![PathBuf::from("/walls/a"), PathBuf::from("/walls/b")]
        );
    }

    #[test]
    fn test_missing_keys_disable_rotation() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.log_level, None);
        assert_eq!(settings.rotate_interval(), None);
        assert!(settings.folder_map().is_empty());
    }

    #[test]
    fn test_nonpositive_rotate_time_disables_rotation() {
        let settings: Settings = toml::from_str("rotate_time = 0").unwrap();
        assert_eq!(settings.rotate_interval(), None);
        let settings: Settings = toml::from_str("rotate_time = -5").unwrap();
        assert_eq!(settings.rotate_interval(), None);
    }

    #[test]
    fn test_invalid_workspace_keys_dropped() {
        let settings: Settings = toml::from_str(
            r#"
            [workspaces]
            donut = "/walls"
            0 = "/walls"
            33 = "/walls"
            8 = "/walls"
            "#,
        )
        .unwrap();

        let folders = settings.folder_map();
        assert_eq!(folders.len(), 1);
        assert!(folders.contains_key(&8));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallshift.toml");
        std::fs::write(&path, "rotate_time = [not toml").unwrap();
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(&dir.path().join("absent.toml")).is_err());
    }
}
