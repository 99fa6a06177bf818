// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Defines the structure of workspace and resolved configuration,
//! supporting JSON and YAML formats.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

use crate::error::ConfigError;

/// Default REST API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Default OTLP/HTTP trace collector endpoint.
pub const DEFAULT_COLLECTOR_ENDPOINT: &str = "https://api.honeycomb.io/v1/traces";

/// Default header carrying the collector API key.
pub const DEFAULT_API_KEY_HEADER: &str = "x-honeycomb-team";

/// Default `service.name` resource attribute.
pub const DEFAULT_SERVICE_NAME: &str = "sillybus-client";

/// Default request timeout in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Workspace configuration for Sillybus.
/// Can be defined in .sillybus.json or .sillybus/config.json in the project root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    /// Base URL of the REST API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Service name reported on exported spans
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    /// Request timeout in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,

    /// Log filter directive (e.g. "sillybus=debug")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Trace export settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<TelemetrySettings>,

    /// Session identifier slot settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionSettings>,
}

/// Trace export settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySettings {
    /// Whether spans are exported to the collector at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_enabled: Option<bool>,

    /// OTLP/HTTP endpoint receiving spans
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collector_endpoint: Option<String>,

    /// Header name carrying the API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_header: Option<String>,

    /// Collector API key (prefer the environment for this)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Session identifier slot settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    /// Path of the file holding the session identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Lifetime of a stored identifier in seconds; unset means no expiry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}

/// Fully resolved configuration after merging all sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub api_url: String,
    pub service_name: String,
    pub request_timeout_ms: u64,
    pub log_level: Option<String>,
    pub export_enabled: bool,
    pub collector_endpoint: String,
    pub api_key_header: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub session_file: Option<PathBuf>,
    pub session_ttl_secs: Option<u64>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            log_level: None,
            export_enabled: true,
            collector_endpoint: DEFAULT_COLLECTOR_ENDPOINT.to_string(),
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            api_key: None,
            session_file: None,
            session_ttl_secs: None,
        }
    }
}

impl ResolvedConfig {
    /// Reject values that would only fail later, at the first request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_http_url("apiUrl", &self.api_url)?;
        if self.export_enabled {
            check_http_url("collectorEndpoint", &self.collector_endpoint)?;
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "requestTimeoutMs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Whether spans can actually leave the process.
    pub fn can_export(&self) -> bool {
        self.export_enabled && self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

fn check_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::InvalidValue {
        field: field.to_string(),
        message,
    };
    let url = Url::parse(value).map_err(|e| invalid(format!("{}: {}", value, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(invalid(format!("unsupported scheme '{}'", scheme))),
    }
}
