// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};
use reqwest::StatusCode;

use sillybus::http::{HttpRequest, HttpResponse, HttpTransport, TracedClient};
use sillybus::telemetry::SessionId;
use sillybus::FetchError;

pub const API: &str = "http://localhost:8000/api";
pub const SESSION: &str = "kq2x9f0abc";

/// Transport that answers from a script and records what it was sent.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<HttpResponse, FetchError>>>,
    sent: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, status: u16, url: &str, body: &str) -> &Self {
        let status = StatusCode::from_u16(status).expect("valid status");
        self.push(Ok(HttpResponse::new(status, url, body)))
    }

    pub fn push(&self, reply: Result<HttpResponse, FetchError>) -> &Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn sent(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        self.sent.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Network("no scripted reply".to_string())))
    }
}

/// A traced client wired to `transport`, with spans kept in memory.
pub struct Harness {
    pub provider: SdkTracerProvider,
    pub exporter: InMemorySpanExporter,
    pub client: TracedClient,
}

impl Harness {
    pub fn new(transport: Arc<ScriptedTransport>) -> Self {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let client = TracedClient::new(
            transport,
            provider.tracer("sillybus-it"),
            SessionId::from_string(SESSION),
        );
        Self {
            provider,
            exporter,
            client,
        }
    }

    pub fn spans(&self) -> Vec<SpanData> {
        self.exporter.get_finished_spans().expect("finished spans")
    }

    pub fn span(&self, name: &str) -> SpanData {
        self.spans()
            .into_iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("no span named {name}"))
    }
}

pub fn attr(span: &SpanData, key: &str) -> Option<String> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.as_str().into_owned())
}

pub fn event<'a>(span: &'a SpanData, name: &str) -> Option<&'a opentelemetry::trace::Event> {
    span.events.events.iter().find(|e| e.name == name)
}
