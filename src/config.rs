//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/treeview/treeview.toml`
//! 3. Local config: `<dir>/.treeview.toml`
//! 4. Environment variables: `TREEVIEW_*` prefix, `__` between sections

use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::TreeOptions;
use crate::infrastructure::InfraError;

/// Filesystem-backed tree settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FsOptions {
    /// Include entries whose name starts with a dot
    pub show_hidden: bool,
    /// List directories before files
    pub directories_first: bool,
}

impl Default for FsOptions {
    fn default() -> Self {
        Self {
            show_hidden: false,
            directories_first: true,
        }
    }
}

/// Unified configuration for treeview.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Path resolution and selection behavior
    pub tree: TreeOptions,
    /// Directory listing
    pub fs: FsOptions,
}

/// Get the XDG config directory for treeview.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "treeview").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("treeview.toml"))
}

/// Get the path to the local config file of a directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(".treeview.toml")
}

impl Settings {
    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local_dir` - Optional directory holding a `.treeview.toml`
    pub fn load(local_dir: Option<&Path>) -> Result<Self, InfraError> {
        let local = local_dir.map(local_config_path);
        Self::load_from(global_config_path().as_deref(), local.as_deref())
    }

    /// Load from explicit file locations; missing files are skipped.
    pub fn load_from(global: Option<&Path>, local: Option<&Path>) -> Result<Self, InfraError> {
        let mut builder = Self::defaults_builder().map_err(config_err)?;

        for path in [global, local].into_iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("TREEVIEW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_err)?;
        config.try_deserialize().map_err(config_err)
    }

    /// Parse settings from TOML text, on top of compiled defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, InfraError> {
        let config = Self::defaults_builder()
            .map_err(config_err)?
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()
            .map_err(config_err)?;
        config.try_deserialize().map_err(config_err)
    }

    fn defaults_builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let defaults = Settings::default();
        Config::builder()
            .set_default(
                "tree.path_separator",
                defaults.tree.path_separator.to_string(),
            )?
            .set_default(
                "tree.case_insensitive_paths",
                defaults.tree.case_insensitive_paths,
            )?
            .set_default("tree.expand_on_select", defaults.tree.expand_on_select)?
            .set_default("fs.show_hidden", defaults.fs.show_hidden)?
            .set_default("fs.directories_first", defaults.fs.directories_first)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, InfraError> {
        toml::to_string_pretty(self).map_err(|e| InfraError::Config {
            message: format!("serialize config: {e}"),
        })
    }
}

fn config_err(e: ConfigError) -> InfraError {
    InfraError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_defaults_when_serialized_then_round_trips_through_toml() {
        let settings = Settings::default();
        let text = settings.to_toml().unwrap();
        assert!(text.contains("path_separator = \"/\""));
        assert_eq!(Settings::from_toml_str(&text).unwrap(), settings);
    }

    #[test]
    fn given_local_dir_when_building_path_then_uses_dotfile() {
        let path = local_config_path(Path::new("/tmp/project"));
        assert_eq!(path, PathBuf::from("/tmp/project/.treeview.toml"));
    }
}
