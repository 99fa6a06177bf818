// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry, tracing, and logging infrastructure.
//!
//! This module provides the observability plumbing for the client:
//!
//! - **Session IDs**: a per-profile identifier correlating all spans of one client
//! - **Provider**: the process-wide OpenTelemetry tracer provider and OTLP exporter
//! - **Spans**: helpers that guarantee status recording and a single end per span
//! - **Propagation**: `traceparent` header handling for outgoing requests
//! - **Logging**: `tracing-subscriber` setup, optionally bridged into OpenTelemetry
//!
//! # Usage
//!
//! Initialize telemetry at application startup:
//!
//! ```rust,ignore
//! use sillybus::telemetry::{
//!     get_or_create_session_id, init_logging, init_tracer_provider, FileSessionStore, LogConfig,
//!     TracingConfig,
//! };
//!
//! let session_id = get_or_create_session_id(&FileSessionStore::new(path));
//! let telemetry = init_tracer_provider(&TracingConfig::from(&config), &session_id)?;
//! let _guard = init_logging(&LogConfig::default(), Some(telemetry.tracer()))?;
//! ```
//!
//! Nested spans take their parent explicitly:
//!
//! ```rust,ignore
//! use sillybus::telemetry::{in_span, SpanOptions};
//!
//! in_span(&tracer, "load_dashboard", SpanOptions::new(), |cx| async move {
//!     client.fetch_in(HttpRequest::get(url), &cx).await
//! })
//! .await?;
//! ```

mod init;
mod propagation;
mod provider;
mod session;
mod spans;

pub use init::{init_logging, LogConfig, TelemetryGuard};
pub use propagation::{
    extract_trace_context, inject_trace_context, HeaderExtractor, HeaderInjector, TraceParent,
    TraceParentError, TRACEPARENT_HEADER,
};
pub use provider::{
    build_provider, current_tracer, init_tracer_provider, is_initialized, shutdown_telemetry,
    Telemetry, TracingConfig, SESSION_ID_ATTRIBUTE, TRACER_NAME,
};
pub use session::{
    get_or_create_session_id, FileSessionStore, MemorySessionStore, SessionId, SessionStore,
};
pub use spans::{in_span, in_span_sync, SpanOptions, SpanScope, EXCEPTION_EVENT};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracer, SdkTracerProvider, SpanData};

    /// Serializes tests touching the process-wide provider slot.
    pub(crate) static GLOBAL_LOCK: Mutex<()> = Mutex::new(());

    pub(crate) fn tracer_with_exporter() -> (SdkTracerProvider, SdkTracer, InMemorySpanExporter) {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let tracer = provider.tracer("sillybus-test");
        (provider, tracer, exporter)
    }

    pub(crate) fn attr(span: &SpanData, key: &str) -> Option<String> {
        span.attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| kv.value.as_str().into_owned())
    }

    pub(crate) fn event_attr(span: &SpanData, event: &str, key: &str) -> Option<String> {
        span.events
            .events
            .iter()
            .find(|e| e.name == event)
            .and_then(|e| e.attributes.iter().find(|kv| kv.key.as_str() == key))
            .map(|kv| kv.value.as_str().into_owned())
    }

    pub(crate) fn has_event(span: &SpanData, event: &str) -> bool {
        span.events.events.iter().any(|e| e.name == event)
    }
}
