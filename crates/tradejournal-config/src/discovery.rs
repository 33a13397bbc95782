//! Where the journal client reads its settings from.
//!
//! Layers, lowest precedence first:
//! 1. `config.toml` in the user directory: `--config-dir`,
//!    `TRADEJOURNAL_CONFIG_DIR`, or `<platform config dir>/tradejournal`
//! 2. `tradejournal.toml` in the project directory (the working directory
//!    when none is given)
//! 3. `TRADEJOURNAL_*` environment variables
//!
//! A layer that cannot be read or parsed is skipped with a warning, and a
//! section that fails validation after merging falls back to its defaults.

use std::path::{Path, PathBuf};

use crate::{ConfigError, Result, TradeJournalConfig};

/// File name of the project-local layer.
const PROJECT_CONFIG_FILE: &str = "tradejournal.toml";

/// File name inside the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "tradejournal";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "TRADEJOURNAL_CONFIG_DIR";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: TradeJournalConfig,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Warnings generated during loading (e.g., malformed layers).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }

    /// Merge the file at `path` over what is loaded so far, if it exists.
    fn apply_layer(&mut self, path: PathBuf) {
        let loaded = path.is_file()
            && match load_config_file(&path) {
                Ok(layer) => {
                    self.config.merge(layer);
                    true
                }
                Err(e) => {
                    self.warnings
                        .push(format!("Skipping config layer {}: {}", path.display(), e));
                    false
                }
            };
        self.sources.push(ConfigSource { path, loaded });
    }
}

/// Merge the user, project and environment layers.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Like [`load_config`], with the user directory chosen by the caller.
///
/// `config_dir` takes the place of `TRADEJOURNAL_CONFIG_DIR` and the
/// platform directory; the binary passes its `--config-dir` flag here.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut loaded = LoadedConfig {
        config: TradeJournalConfig::new(),
        sources: Vec::new(),
        warnings: Vec::new(),
    };

    let user_file = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => xdg_config_path(),
    };
    if let Some(path) = user_file {
        loaded.apply_layer(path);
    }

    let project_file = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    loaded.apply_layer(project_file);

    loaded.config.apply_env_overrides();

    for e in loaded.config.drop_invalid_sections() {
        loaded
            .warnings
            .push(format!("{}; using defaults for that section", e));
    }

    Ok(loaded)
}

/// Parse one TOML file into a config layer without merging it anywhere.
pub fn load_config_file(path: &Path) -> Result<TradeJournalConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    TradeJournalConfig::from_toml(&contents)
}

/// `config.toml` inside [`xdg_config_dir`].
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// The user directory holding `config.toml` and `logs/`.
///
/// A non-empty `TRADEJOURNAL_CONFIG_DIR` wins over the platform location.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
