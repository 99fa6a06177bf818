// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Sillybus - traced API client for the Silly Bus coaching-technique tracker.
//!
//! Every request to the backend and every form submission runs in an
//! OpenTelemetry span. Spans carry a per-profile session id, propagate
//! their context to the backend as `traceparent`, and record a classified
//! error type when the backend answers with an error status.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`error`] - Error types and result aliases
//! - [`config`] - Configuration loading and merging
//! - [`telemetry`] - Session ids, tracer provider, span helpers, propagation and logging
//! - [`http`] - Transport seam, error body decoding, failure classification and traced fetch
//! - [`form`] - Traced form submission and server-side validation feedback
//! - [`api`] - Typed backend client and the role-gated route table
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use sillybus::config::{load_config, CliOptions};
//! use sillybus::http::{ReqwestTransport, TracedClient};
//! use sillybus::telemetry::{get_or_create_session_id, init_tracer_provider, FileSessionStore};
//!
//! let config = load_config(".".as_ref(), CliOptions::default())?;
//! let session_id = get_or_create_session_id(&FileSessionStore::new(session_path));
//! let telemetry = init_tracer_provider(&(&config).into(), &session_id)?;
//!
//! let transport = Arc::new(ReqwestTransport::new(Duration::from_millis(config.request_timeout_ms))?);
//! let client = TracedClient::from_telemetry(transport, &telemetry);
//! let response = client.fetch(HttpRequest::get("http://localhost:8000/api/me")).await?;
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod form;
pub mod http;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use api::{ApiClient, ApiError, Role, Route, User};
pub use error::{ConfigError, FetchError, Result, SessionError, TelemetryError};
pub use form::{FormData, FormSpec, SubmitError, SubmitOutcome, TracedForm};
pub use http::{ErrorType, HttpRequest, HttpResponse, HttpTransport, TracedClient};
pub use telemetry::{SessionId, Telemetry};

/// Sillybus version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        // Verify key types are accessible
        let _request = HttpRequest::get("http://localhost:8000/api/me");
        let _form = FormSpec::new("login", "/api/login");
        assert_eq!(ErrorType::NotFound.as_str(), "not_found");
        assert_eq!(Route::parse("/admin"), Some(Route::Admin));
    }
}
