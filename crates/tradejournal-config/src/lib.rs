//! Configuration system for the Trading Journal client.
//!
//! Provides TOML-based configuration with:
//! - `[identity]`: OpenID Connect provider (Keycloak) connection
//! - `[session]`: periodic token refresh cadence
//! - `[api]`: backend location, timeout and retry statuses
//! - Config file layering (XDG user config + project-local overrides)
//! - Environment overrides for the provider and backend URLs

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, load_config, load_config_file, load_config_with_options, xdg_config_dir,
    xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
