// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Logging initialization and configuration.
//!
//! The subscriber always carries an env filter and a fmt layer. When given a
//! tracer it also carries a `tracing-opentelemetry` layer, so every `tracing`
//! span in the process is exported next to the hand-written spans.

use opentelemetry_sdk::trace::SdkTracer;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::error::TelemetryError;

use super::provider::shutdown_telemetry;

/// Configuration for logging initialization.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level if RUST_LOG is not set.
    pub default_level: Level,

    /// Whether to include span events (enter/exit).
    pub include_span_events: bool,

    /// Whether to include file/line information.
    pub include_file_line: bool,

    /// Whether to include target module path.
    pub include_target: bool,

    /// Whether to use ANSI colors in output.
    pub ansi_colors: bool,

    /// Whether to use compact log format.
    pub compact: bool,

    /// Custom filter directive (overrides default_level, yields to `RUST_LOG`).
    pub filter_directive: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: Level::WARN,
            include_span_events: false,
            include_file_line: false,
            include_target: true,
            ansi_colors: true,
            compact: true,
            filter_directive: None,
        }
    }
}

impl LogConfig {
    /// Create a config suitable for development with verbose output.
    pub fn development() -> Self {
        Self {
            default_level: Level::DEBUG,
            include_span_events: true,
            include_file_line: true,
            include_target: true,
            ansi_colors: true,
            compact: false,
            filter_directive: None,
        }
    }

    /// Create a config suitable for production with minimal output.
    pub fn production() -> Self {
        Self {
            default_level: Level::WARN,
            include_span_events: false,
            include_file_line: false,
            include_target: false,
            ansi_colors: false,
            compact: true,
            filter_directive: None,
        }
    }

    /// Create a config for testing with trace-level output.
    pub fn testing() -> Self {
        Self {
            default_level: Level::TRACE,
            include_span_events: true,
            include_file_line: true,
            include_target: true,
            ansi_colors: false,
            compact: false,
            filter_directive: Some("sillybus=trace".to_string()),
        }
    }

    /// Set the default log level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    /// Set a custom filter directive.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_directive = Some(filter.into());
        self
    }

    /// Enable or disable ANSI colors.
    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi_colors = ansi;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        self.resolve_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok())
    }

    /// `RUST_LOG` first, then the configured directive, then the default level.
    /// Unparseable directives fall through to the next source.
    fn resolve_filter(&self, env_directive: Option<String>) -> EnvFilter {
        env_directive
            .iter()
            .chain(self.filter_directive.iter())
            .filter(|d| !d.trim().is_empty())
            .find_map(|d| EnvFilter::try_new(d).ok())
            .unwrap_or_else(|| EnvFilter::new(self.default_level.to_string()))
    }
}

/// Guard that flushes and shuts down the tracer provider on drop.
///
/// Keep this guard alive for the duration of your program.
pub struct TelemetryGuard {
    exporting: bool,
}

impl TelemetryGuard {
    /// Whether spans from `tracing` are routed to the tracer provider.
    pub fn is_exporting(&self) -> bool {
        self.exporting
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if self.exporting {
            if let Err(e) = shutdown_telemetry() {
                eprintln!("Error shutting down tracer provider: {e}");
            }
        }
    }
}

/// Initialize logging with the given configuration.
///
/// Pass the tracer from [`super::init_tracer_provider`] to bridge `tracing`
/// spans into OpenTelemetry. This should be called once at application startup.
///
/// # Example
///
/// ```rust,ignore
/// use sillybus::telemetry::{init_logging, init_tracer_provider, LogConfig};
///
/// let telemetry = init_tracer_provider(&tracing_config, &session_id)?;
/// let _guard = init_logging(&LogConfig::default(), Some(telemetry.tracer()))?;
/// ```
pub fn init_logging(
    config: &LogConfig,
    tracer: Option<SdkTracer>,
) -> Result<TelemetryGuard, TelemetryError> {
    let exporting = tracer.is_some();

    // Build span events
    let span_events = if config.include_span_events {
        FmtSpan::ENTER | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_file(config.include_file_line)
        .with_line_number(config.include_file_line)
        .with_span_events(span_events);

    if config.compact {
        tracing_subscriber::registry()
            .with(config.env_filter())
            .with(fmt_layer.compact())
            .with(tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t)))
            .try_init()
            .map_err(|e| TelemetryError::Subscriber(e.to_string()))?;
    } else {
        tracing_subscriber::registry()
            .with(config.env_filter())
            .with(fmt_layer)
            .with(tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t)))
            .try_init()
            .map_err(|e| TelemetryError::Subscriber(e.to_string()))?;
    }

    Ok(TelemetryGuard { exporting })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_wins_over_configured_filter() {
        let config = LogConfig::default().with_filter("sillybus=info");

        let shown = |env: Option<&str>| {
            config
                .resolve_filter(env.map(str::to_string))
                .to_string()
                .to_lowercase()
        };

        assert_eq!(shown(Some("sillybus=trace")), "sillybus=trace");
        assert_eq!(shown(None), "sillybus=info");
    }

    #[test]
    fn test_filter_falls_back_to_default_level() {
        let config = LogConfig::default();
        let shown = |env: Option<String>| config.resolve_filter(env).to_string().to_lowercase();
        assert_eq!(shown(None), "warn");
        assert_eq!(shown(Some(String::new())), "warn");
    }

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.default_level, Level::WARN);
        assert!(config.ansi_colors);
        assert!(config.compact);
    }

    #[test]
    fn test_log_config_development() {
        let config = LogConfig::development();
        assert_eq!(config.default_level, Level::DEBUG);
        assert!(config.include_span_events);
    }

    #[test]
    fn test_log_config_production() {
        let config = LogConfig::production();
        assert_eq!(config.default_level, Level::WARN);
        assert!(!config.include_target);
    }

    #[test]
    fn test_log_config_builder() {
        let config = LogConfig::default()
            .with_level(Level::DEBUG)
            .with_filter("sillybus=trace")
            .with_ansi(false);

        assert_eq!(config.default_level, Level::DEBUG);
        assert_eq!(config.filter_directive, Some("sillybus=trace".to_string()));
        assert!(!config.ansi_colors);
    }

    #[test]
    fn test_invalid_directive_falls_back() {
        let config = LogConfig::default().with_filter("not a [valid filter");
        let filter = config.env_filter();
        assert!(filter.to_string().contains("warn"));
    }
}
