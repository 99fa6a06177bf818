// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the Sillybus client.
//!
//! This module provides strongly-typed errors for different parts of the client,
//! using `thiserror` for ergonomic error definitions and `anyhow` for error propagation.
//!
//! Submission and API errors live next to the code that produces them
//! ([`crate::form::SubmitError`], [`crate::api::ApiError`]) because they carry
//! HTTP responses.

use thiserror::Error;

/// Errors that can occur while sending a request.
///
/// HTTP error statuses are not errors at this layer; a response with any
/// status is returned as `Ok`. Only failures that leave no response behind
/// end up here.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(0)
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config format: {0}")]
    InvalidFormat(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Errors from the session identifier slot.
///
/// These never escape [`crate::telemetry::get_or_create_session_id`], which
/// degrades to a fresh identifier instead.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to load session: {0}")]
    LoadFailed(String),

    #[error("Failed to save session: {0}")]
    SaveFailed(String),

    #[error("Session corrupted: {0}")]
    Corrupted(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

/// Errors that can occur while bootstrapping telemetry.
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to build span exporter: {0}")]
    Exporter(String),

    #[error("Invalid collector header: {0}")]
    InvalidHeader(String),

    #[error("Failed to install subscriber: {0}")]
    Subscriber(String),

    #[error("Failed to shut down tracer provider: {0}")]
    Shutdown(String),
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;
