// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process-wide tracer provider bootstrap.
//!
//! [`init_tracer_provider`] installs one provider per process: spans are
//! batched and exported over OTLP/HTTP to the configured collector, tagged
//! with the service name and the session identifier. Later calls reuse the
//! installed provider. [`shutdown_telemetry`] flushes and clears it so a
//! fresh provider can be installed (tests rely on this).

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use opentelemetry::global;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{Protocol, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use reqwest::header::HeaderName;
use tracing::{debug, info, warn};

use crate::config::{
    ResolvedConfig, DEFAULT_API_KEY_HEADER, DEFAULT_COLLECTOR_ENDPOINT, DEFAULT_SERVICE_NAME,
};
use crate::error::TelemetryError;

use super::session::SessionId;

/// Instrumentation scope name of the crate's tracer.
pub const TRACER_NAME: &str = "sillybus";

/// Resource attribute carrying the session identifier.
pub const SESSION_ID_ATTRIBUTE: &str = "session.id";

struct Installed {
    provider: SdkTracerProvider,
    session_id: SessionId,
}

static INSTALLED: Lazy<Mutex<Option<Installed>>> = Lazy::new(|| Mutex::new(None));

static FALLBACK: Lazy<SdkTracerProvider> = Lazy::new(|| SdkTracerProvider::builder().build());

/// Settings for the trace exporter and resource.
#[derive(Clone)]
pub struct TracingConfig {
    pub service_name: String,
    pub export_enabled: bool,
    pub collector_endpoint: String,
    pub api_key_header: String,
    pub api_key: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            export_enabled: true,
            collector_endpoint: DEFAULT_COLLECTOR_ENDPOINT.to_string(),
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            api_key: None,
        }
    }
}

impl TracingConfig {
    /// A config that never exports.
    pub fn local(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            export_enabled: false,
            ..Default::default()
        }
    }

    fn export_key(&self) -> Option<&str> {
        if !self.export_enabled {
            return None;
        }
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

impl fmt::Debug for TracingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracingConfig")
            .field("service_name", &self.service_name)
            .field("export_enabled", &self.export_enabled)
            .field("collector_endpoint", &self.collector_endpoint)
            .field("api_key_header", &self.api_key_header)
            .field("api_key", &self.api_key.as_ref().map(|_| "<set>"))
            .finish()
    }
}

impl From<&ResolvedConfig> for TracingConfig {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            service_name: config.service_name.clone(),
            export_enabled: config.export_enabled,
            collector_endpoint: config.collector_endpoint.clone(),
            api_key_header: config.api_key_header.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

/// Handle to an installed tracer provider.
#[derive(Clone)]
pub struct Telemetry {
    provider: SdkTracerProvider,
    session_id: SessionId,
}

impl Telemetry {
    /// Wrap a provider that was built elsewhere (tests, embedding apps).
    pub fn from_provider(provider: SdkTracerProvider, session_id: SessionId) -> Self {
        Self {
            provider,
            session_id,
        }
    }

    pub fn tracer(&self) -> SdkTracer {
        self.provider.tracer(TRACER_NAME)
    }

    pub fn provider(&self) -> &SdkTracerProvider {
        &self.provider
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Export everything buffered so far.
    pub fn force_flush(&self) {
        if let Err(e) = self.provider.force_flush() {
            warn!(error = %e, "Failed to flush spans");
        }
    }
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

/// Build a provider without installing it globally.
pub fn build_provider(
    config: &TracingConfig,
    session_id: &SessionId,
) -> Result<SdkTracerProvider, TelemetryError> {
    let resource = Resource::builder()
        .with_service_name(config.service_name.clone())
        .with_attributes([KeyValue::new(SESSION_ID_ATTRIBUTE, session_id.to_string())])
        .build();

    let mut builder = SdkTracerProvider::builder().with_resource(resource);

    match config.export_key() {
        Some(api_key) => {
            let exporter = build_exporter(config, api_key)?;
            builder = builder.with_batch_exporter(exporter);
            debug!(endpoint = %config.collector_endpoint, "Configured OTLP span exporter");
        }
        None => debug!("Trace export disabled, spans stay in-process"),
    }

    Ok(builder.build())
}

fn build_exporter(
    config: &TracingConfig,
    api_key: &str,
) -> Result<opentelemetry_otlp::SpanExporter, TelemetryError> {
    HeaderName::from_bytes(config.api_key_header.as_bytes())
        .map_err(|e| TelemetryError::InvalidHeader(format!("{}: {}", config.api_key_header, e)))?;

    let mut headers = HashMap::new();
    headers.insert(config.api_key_header.clone(), api_key.to_string());

    opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(config.collector_endpoint.clone())
        .with_headers(headers)
        .build()
        .map_err(|e| TelemetryError::Exporter(e.to_string()))
}

/// Install the process-wide tracer provider and W3C propagator.
///
/// Must run before spans are created. A second call returns the provider
/// installed by the first without building another exporter.
pub fn init_tracer_provider(
    config: &TracingConfig,
    session_id: &SessionId,
) -> Result<Telemetry, TelemetryError> {
    let mut slot = INSTALLED.lock().unwrap_or_else(|e| e.into_inner());

    if let Some(installed) = slot.as_ref() {
        debug!("Tracer provider already initialized, reusing it");
        return Ok(Telemetry::from_provider(
            installed.provider.clone(),
            installed.session_id.clone(),
        ));
    }

    let provider = build_provider(config, session_id)?;

    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TraceContextPropagator::new());

    *slot = Some(Installed {
        provider: provider.clone(),
        session_id: session_id.clone(),
    });

    info!(
        service = %config.service_name,
        session_id = %session_id.short(),
        exporting = config.export_key().is_some(),
        "Telemetry initialized"
    );

    Ok(Telemetry::from_provider(provider, session_id.clone()))
}

/// Whether [`init_tracer_provider`] has installed a provider.
pub fn is_initialized() -> bool {
    INSTALLED
        .lock()
        .map(|slot| slot.is_some())
        .unwrap_or(false)
}

/// Tracer of the installed provider, or of an exporter-less fallback.
pub fn current_tracer() -> SdkTracer {
    let slot = INSTALLED.lock().unwrap_or_else(|e| e.into_inner());
    match slot.as_ref() {
        Some(installed) => installed.provider.tracer(TRACER_NAME),
        None => FALLBACK.tracer(TRACER_NAME),
    }
}

/// Flush and shut down the installed provider, clearing the slot.
pub fn shutdown_telemetry() -> Result<(), TelemetryError> {
    let installed = INSTALLED
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .take();

    let Some(installed) = installed else {
        return Ok(());
    };

    if let Err(e) = installed.provider.force_flush() {
        warn!(error = %e, "Failed to flush spans before shutdown");
    }
    installed
        .provider
        .shutdown()
        .map_err(|e| TelemetryError::Shutdown(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::test_support::GLOBAL_LOCK;

    #[test]
    fn test_tracing_config_from_resolved() {
        let resolved = ResolvedConfig {
            service_name: "dashboard".to_string(),
            api_key: Some("key".to_string()),
            ..Default::default()
        };
        let config = TracingConfig::from(&resolved);
        assert_eq!(config.service_name, "dashboard");
        assert_eq!(config.export_key(), Some("key"));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = TracingConfig {
            api_key: Some("super-secret".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<set>"));
    }

    #[test]
    fn test_export_key_requires_enabled_and_non_empty() {
        let mut config = TracingConfig::local("svc");
        config.api_key = Some("key".to_string());
        assert!(config.export_key().is_none());

        config.export_enabled = true;
        config.api_key = Some(String::new());
        assert!(config.export_key().is_none());
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let config = TracingConfig {
            api_key: Some("key".to_string()),
            api_key_header: "bad header".to_string(),
            ..Default::default()
        };
        let result = build_provider(&config, &SessionId::generate());
        assert!(matches!(result, Err(TelemetryError::InvalidHeader(_))));
    }

    #[test]
    fn test_init_is_idempotent_and_resettable() {
        let _lock = GLOBAL_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        shutdown_telemetry().unwrap();

        let first_session = SessionId::generate();
        let first = init_tracer_provider(&TracingConfig::local("svc"), &first_session).unwrap();
        assert!(is_initialized());

        let second =
            init_tracer_provider(&TracingConfig::local("svc"), &SessionId::generate()).unwrap();
        assert_eq!(second.session_id(), &first_session);
        assert_eq!(first.session_id(), second.session_id());

        shutdown_telemetry().unwrap();
        assert!(!is_initialized());

        let fresh_session = SessionId::generate();
        let third = init_tracer_provider(&TracingConfig::local("svc"), &fresh_session).unwrap();
        assert_eq!(third.session_id(), &fresh_session);
        shutdown_telemetry().unwrap();
    }

    #[test]
    fn test_shutdown_without_init_is_ok() {
        let _lock = GLOBAL_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        shutdown_telemetry().unwrap();
        assert!(shutdown_telemetry().is_ok());
    }
}
