// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Failure classification for traced requests.
//!
//! Message matching is a best-effort layer over English error text from the
//! backend. The patterns are fixed; the status fallback is authoritative.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Method, StatusCode};
use serde::Serialize;

use super::body::ErrorBody;
use super::transport::HttpResponse;

/// Value of the `error.type` span attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    DuplicateResource,
    ResourceNotFound,
    ValidationError,
    AuthenticationError,
    ClientError,
    ServerError,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    NetworkError,
    UnknownError,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateResource => "duplicate_resource",
            Self::ResourceNotFound => "resource_not_found",
            Self::ValidationError => "validation_error",
            Self::AuthenticationError => "authentication_error",
            Self::ClientError => "client_error",
            Self::ServerError => "server_error",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::NetworkError => "network_error",
            Self::UnknownError => "unknown_error",
        }
    }

    /// Coarse class of this error type.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NetworkError => ErrorClass::Network,
            Self::ServerError => ErrorClass::HttpServer,
            Self::ValidationError => ErrorClass::Validation,
            Self::UnknownError => ErrorClass::Unknown,
            Self::DuplicateResource
            | Self::ResourceNotFound
            | Self::AuthenticationError
            | Self::ClientError
            | Self::Unauthorized
            | Self::Forbidden
            | Self::NotFound
            | Self::Conflict => ErrorClass::HttpClient,
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top level of the failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Network,
    HttpClient,
    HttpServer,
    Validation,
    Unknown,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network_error",
            Self::HttpClient => "http_client_error",
            Self::HttpServer => "http_server_error",
            Self::Validation => "validation_error",
            Self::Unknown => "unknown_error",
        }
    }
}

/// Intended operation of a request, from its method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Create,
    Update,
    Delete,
    Query,
}

impl OperationType {
    pub fn from_method(method: &Method) -> Self {
        match *method {
            Method::POST => Self::Create,
            Method::PUT => Self::Update,
            Method::DELETE => Self::Delete,
            _ => Self::Query,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Query => "query",
        }
    }
}

/// Result of classifying a non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub error_type: ErrorType,
    pub message: String,
}

static MESSAGE_PATTERNS: Lazy<Vec<(Regex, ErrorType)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"(?i)already exists|taken|duplicate").unwrap(),
            ErrorType::DuplicateResource,
        ),
        (
            Regex::new(r"(?i)not found|missing|doesn't exist").unwrap(),
            ErrorType::ResourceNotFound,
        ),
        (
            Regex::new(r"(?i)invalid|validation").unwrap(),
            ErrorType::ValidationError,
        ),
        (
            Regex::new(r"(?i)unauthorized|forbidden|permission|access denied").unwrap(),
            ErrorType::AuthenticationError,
        ),
    ]
});

/// Classify a backend error message. First matching pattern wins.
pub fn classify_message(message: &str, status: StatusCode) -> ErrorType {
    MESSAGE_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(message))
        .map(|(_, error_type)| *error_type)
        .unwrap_or_else(|| {
            if status.is_client_error() {
                ErrorType::ClientError
            } else if status.is_server_error() {
                ErrorType::ServerError
            } else {
                ErrorType::UnknownError
            }
        })
}

/// Classify by status code alone.
pub fn classify_status(status: StatusCode) -> ErrorType {
    match status.as_u16() {
        401 => ErrorType::Unauthorized,
        403 => ErrorType::Forbidden,
        404 => ErrorType::NotFound,
        409 => ErrorType::Conflict,
        422 => ErrorType::ValidationError,
        s if s >= 500 => ErrorType::ServerError,
        _ => ErrorType::ClientError,
    }
}

/// Classify a response. `None` for 2xx.
pub fn classify_response(response: &HttpResponse) -> Option<Classification> {
    if response.ok() {
        return None;
    }
    Some(classify_body(response.status, &ErrorBody::decode(&response.body)))
}

/// Classify a non-2xx status with an already decoded body.
pub fn classify_body(status: StatusCode, body: &ErrorBody) -> Classification {
    match body.message() {
        Some(message) => Classification {
            error_type: classify_message(message, status),
            message: message.to_string(),
        },
        None => Classification {
            error_type: classify_status(status),
            message: fallback_message(status),
        },
    }
}

fn fallback_message(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {} {}", status.as_u16(), reason),
        None => format!("HTTP {}", status.as_u16()),
    }
}
