// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use std::path::PathBuf;

use super::types::{ResolvedConfig, WorkspaceConfig};

/// Environment variables consulted for the collector API key, in order.
pub const API_KEY_ENV_VARS: &[&str] = &["SILLYBUS_API_KEY", "HONEYCOMB_API_KEY"];

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub no_export: Option<bool>,
    pub log_level: Option<String>,
    pub session_file: Option<String>,
}

/// Default configuration values.
pub fn default_config() -> ResolvedConfig {
    ResolvedConfig::default()
}

/// Merge multiple configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Local config (.sillybus.local.json)
/// 3. Workspace config (.sillybus.json)
/// 4. Global config (~/.sillybus/config.json)
/// 5. Default values
pub fn merge_config(
    global: Option<WorkspaceConfig>,
    workspace: Option<WorkspaceConfig>,
    local: Option<WorkspaceConfig>,
    cli: CliOptions,
) -> ResolvedConfig {
    let mut result = default_config();

    for config in [global, workspace, local].into_iter().flatten() {
        apply_workspace_config(&mut result, &config);
    }

    apply_cli_options(&mut result, &cli);

    result
}

/// Fill the API key from the environment when no file or flag provided one.
pub fn apply_env_overrides(result: &mut ResolvedConfig, lookup: impl Fn(&str) -> Option<String>) {
    if result.api_key.is_some() {
        return;
    }
    result.api_key = API_KEY_ENV_VARS
        .iter()
        .find_map(|name| lookup(name).filter(|v| !v.is_empty()));
}

fn apply_workspace_config(result: &mut ResolvedConfig, config: &WorkspaceConfig) {
    if let Some(ref api_url) = config.api_url {
        result.api_url = api_url.clone();
    }

    if let Some(ref service_name) = config.service_name {
        result.service_name = service_name.clone();
    }

    if let Some(timeout) = config.request_timeout_ms {
        result.request_timeout_ms = timeout;
    }

    if config.log_level.is_some() {
        result.log_level = config.log_level.clone();
    }

    if let Some(ref telemetry) = config.telemetry {
        if let Some(enabled) = telemetry.export_enabled {
            result.export_enabled = enabled;
        }
        if let Some(ref endpoint) = telemetry.collector_endpoint {
            result.collector_endpoint = endpoint.clone();
        }
        if let Some(ref header) = telemetry.api_key_header {
            result.api_key_header = header.clone();
        }
        if telemetry.api_key.is_some() {
            result.api_key = telemetry.api_key.clone();
        }
    }

    if let Some(ref session) = config.session {
        if let Some(ref file) = session.file {
            result.session_file = Some(PathBuf::from(file));
        }
        if session.ttl_secs.is_some() {
            result.session_ttl_secs = session.ttl_secs;
        }
    }
}

fn apply_cli_options(result: &mut ResolvedConfig, cli: &CliOptions) {
    if let Some(ref api_url) = cli.api_url {
        result.api_url = api_url.clone();
    }

    if cli.api_key.is_some() {
        result.api_key = cli.api_key.clone();
    }

    if let Some(true) = cli.no_export {
        result.export_enabled = false;
    }

    if cli.log_level.is_some() {
        result.log_level = cli.log_level.clone();
    }

    if let Some(ref file) = cli.session_file {
        result.session_file = Some(PathBuf::from(file));
    }
}
