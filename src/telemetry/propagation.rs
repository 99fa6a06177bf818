// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! W3C trace-context propagation over HTTP headers.
//!
//! Outgoing requests carry the active span as a single `traceparent` header,
//! `00-<32 hex trace id>-<16 hex span id>-<2 hex flags>`.

use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::{
    SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
};
use opentelemetry::Context;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;

/// Header carrying the serialized trace context.
pub const TRACEPARENT_HEADER: &str = "traceparent";

const SUPPORTED_VERSION: &str = "00";

/// Reasons a `traceparent` value is rejected.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TraceParentError {
    #[error("expected 4 dash-separated fields, got {0}")]
    FieldCount(usize),

    #[error("unsupported version: {0}")]
    Version(String),

    #[error("invalid trace id: {0}")]
    TraceId(String),

    #[error("invalid span id: {0}")]
    SpanId(String),

    #[error("invalid flags: {0}")]
    Flags(String),
}

/// A parsed `traceparent` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceParent {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub flags: TraceFlags,
}

impl TraceParent {
    /// Take the trace/span ids of a span context, if it is valid.
    pub fn from_span_context(span_context: &SpanContext) -> Option<Self> {
        span_context.is_valid().then(|| Self {
            trace_id: span_context.trace_id(),
            span_id: span_context.span_id(),
            flags: span_context.trace_flags(),
        })
    }

    /// Take the active span of `cx`.
    pub fn from_context(cx: &Context) -> Option<Self> {
        Self::from_span_context(cx.span().span_context())
    }

    pub fn is_sampled(&self) -> bool {
        self.flags.is_sampled()
    }

    /// Serialize to the header value.
    pub fn to_header(&self) -> String {
        format!(
            "{}-{}-{}-{:02x}",
            SUPPORTED_VERSION,
            self.trace_id,
            self.span_id,
            self.flags.to_u8()
        )
    }

    /// Parse a header value.
    pub fn parse(value: &str) -> Result<Self, TraceParentError> {
        let parts: Vec<&str> = value.trim().split('-').collect();
        if parts.len() != 4 {
            return Err(TraceParentError::FieldCount(parts.len()));
        }

        if parts[0] != SUPPORTED_VERSION {
            return Err(TraceParentError::Version(parts[0].to_string()));
        }

        if !is_lower_hex(parts[1], 32) {
            return Err(TraceParentError::TraceId(parts[1].to_string()));
        }
        let trace_id = TraceId::from_hex(parts[1])
            .map_err(|_| TraceParentError::TraceId(parts[1].to_string()))?;
        if trace_id == TraceId::INVALID {
            return Err(TraceParentError::TraceId(parts[1].to_string()));
        }

        if !is_lower_hex(parts[2], 16) {
            return Err(TraceParentError::SpanId(parts[2].to_string()));
        }
        let span_id = SpanId::from_hex(parts[2])
            .map_err(|_| TraceParentError::SpanId(parts[2].to_string()))?;
        if span_id == SpanId::INVALID {
            return Err(TraceParentError::SpanId(parts[2].to_string()));
        }

        if !is_lower_hex(parts[3], 2) {
            return Err(TraceParentError::Flags(parts[3].to_string()));
        }
        let flags = u8::from_str_radix(parts[3], 16)
            .map_err(|_| TraceParentError::Flags(parts[3].to_string()))?;

        Ok(Self {
            trace_id,
            span_id,
            flags: TraceFlags::new(flags),
        })
    }

    /// A remote span context suitable as a parent.
    pub fn to_span_context(&self) -> SpanContext {
        SpanContext::new(
            self.trace_id,
            self.span_id,
            self.flags,
            true,
            TraceState::default(),
        )
    }

    /// A context whose active span is this remote parent.
    pub fn into_context(self) -> Context {
        Context::new().with_remote_span_context(self.to_span_context())
    }
}

fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Writes propagator output into a request header map.
pub struct HeaderInjector<'a>(pub &'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            self.0.insert(name, value);
        }
    }
}

/// Reads propagator input from a header map.
pub struct HeaderExtractor<'a>(pub &'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

/// Inject `cx` into `headers`. Returns whether a `traceparent` was written.
pub fn inject_trace_context(
    propagator: &dyn TextMapPropagator,
    cx: &Context,
    headers: &mut HeaderMap,
) -> bool {
    propagator.inject_context(cx, &mut HeaderInjector(headers));
    headers.contains_key(TRACEPARENT_HEADER)
}

/// Extract a remote parent context from `headers`.
pub fn extract_trace_context(propagator: &dyn TextMapPropagator, headers: &HeaderMap) -> Context {
    propagator.extract(&HeaderExtractor(headers))
}
