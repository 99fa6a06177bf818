// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for Sillybus.
//!
//! Handles loading, merging, and validation of configuration from multiple sources:
//! - Global config: ~/.sillybus/config.json
//! - Workspace config: .sillybus.json, .sillybus.yaml, .sillybus/config.json, or sillybus.config.json
//! - Local config: .sillybus.local.json (gitignored, for personal overrides)
//! - Environment: SILLYBUS_API_KEY / HONEYCOMB_API_KEY for the collector key
//! - CLI options: command-line arguments
//!
//! Configuration is merged with precedence (CLI > env > local > workspace > global > defaults),
//! except that the environment only fills an API key nothing else set.

mod loader;
mod merger;
mod types;

pub use loader::{
    get_default_session_path, get_global_config_dir, get_global_config_path, load_config_file,
    load_global_config, load_local_config, load_workspace_config, save_workspace_config,
    CONFIG_FILES, GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILE, LOCAL_CONFIG_FILE, SESSION_FILE,
};

pub use merger::{apply_env_overrides, default_config, merge_config, CliOptions, API_KEY_ENV_VARS};

pub use types::{
    ResolvedConfig, SessionSettings, TelemetrySettings, WorkspaceConfig, DEFAULT_API_KEY_HEADER,
    DEFAULT_API_URL, DEFAULT_COLLECTOR_ENDPOINT, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SERVICE_NAME,
};

use crate::error::ConfigError;
use std::path::Path;

/// Load and merge all configuration sources for a workspace.
///
/// This is the main entry point for configuration loading.
pub fn load_config(
    workspace_root: &Path,
    cli_options: CliOptions,
) -> Result<ResolvedConfig, ConfigError> {
    let global = load_global_config()?;
    let workspace = load_workspace_config(workspace_root)?;
    let local = load_local_config(workspace_root)?;

    let mut config = merge_config(global, workspace, local, cli_options);
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());

    if config.session_file.is_none() {
        config.session_file = get_default_session_path();
    }

    config.validate()?;
    Ok(config)
}
