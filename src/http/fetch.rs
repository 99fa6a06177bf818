// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Traced fetch.
//!
//! Every request runs in its own client span named `"{METHOD} {url}"`. The
//! span's context is sent along as `traceparent`, the session id as
//! `x-session-id`. Non-2xx responses are classified onto the span and then
//! returned as-is; the caller decides what an error status means.

use std::fmt;
use std::sync::Arc;

use opentelemetry::trace::{FutureExt, SpanKind};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracer;
use opentelemetry_semantic_conventions::attribute::{
    ERROR_TYPE, HTTP_REQUEST_METHOD, HTTP_RESPONSE_STATUS_CODE, URL_FULL,
};
use reqwest::header::HeaderValue;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::telemetry::{inject_trace_context, SessionId, SpanOptions, SpanScope, Telemetry};

use super::classify::{classify_response, ErrorType, OperationType};
use super::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Header carrying the session identifier.
pub const SESSION_ID_HEADER: &str = "x-session-id";

pub const OPERATION_TYPE_ATTRIBUTE: &str = "operation.type";
pub const STATUS_TEXT_ATTRIBUTE: &str = "http.status_text";
pub const ERROR_ATTRIBUTE: &str = "error";
pub const ERROR_MESSAGE_ATTRIBUTE: &str = "error.message";

/// HTTP client that wraps each request in a span.
#[derive(Clone)]
pub struct TracedClient {
    transport: Arc<dyn HttpTransport>,
    tracer: SdkTracer,
    propagator: TraceContextPropagator,
    session_id: SessionId,
}

impl TracedClient {
    pub fn new(transport: Arc<dyn HttpTransport>, tracer: SdkTracer, session_id: SessionId) -> Self {
        Self {
            transport,
            tracer,
            propagator: TraceContextPropagator::new(),
            session_id,
        }
    }

    /// A client using the tracer and session of an installed provider.
    pub fn from_telemetry(transport: Arc<dyn HttpTransport>, telemetry: &Telemetry) -> Self {
        Self::new(transport, telemetry.tracer(), telemetry.session_id().clone())
    }

    pub fn tracer(&self) -> &SdkTracer {
        &self.tracer
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Send `request` as a child of the ambient context.
    pub async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        self.fetch_in(request, &Context::current()).await
    }

    /// Send `request` as a child of `parent`.
    ///
    /// Returns the response whatever its status. `Err` only when no
    /// response was received.
    pub async fn fetch_in(
        &self,
        mut request: HttpRequest,
        parent: &Context,
    ) -> Result<HttpResponse, FetchError> {
        let method = request.method.clone();
        let operation = OperationType::from_method(&method);

        let scope = SpanScope::start(
            &self.tracer,
            format!("{} {}", method, request.url),
            SpanOptions::new()
                .with_parent(parent)
                .with_kind(SpanKind::Client)
                .with_attributes([
                    KeyValue::new(HTTP_REQUEST_METHOD, method.to_string()),
                    KeyValue::new(URL_FULL, request.url.clone()),
                    KeyValue::new(OPERATION_TYPE_ATTRIBUTE, operation.as_str()),
                ]),
        );

        let propagated = inject_trace_context(&self.propagator, scope.context(), &mut request.headers);
        match HeaderValue::from_str(self.session_id.as_str()) {
            Ok(value) => {
                request.headers.insert(SESSION_ID_HEADER, value);
            }
            Err(e) => warn!(error = %e, "Session id is not a valid header value"),
        }

        debug!(
            method = %method,
            url = %request.url,
            operation = operation.as_str(),
            propagated,
            "Sending traced request"
        );

        let result = self
            .transport
            .send(request)
            .with_context(scope.context().clone())
            .await;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                record_failure(&scope, ErrorType::NetworkError, &err.to_string());
                scope.record_exception(&err);
                warn!(method = %method, error = %err, "Request failed without a response");
                return Err(err);
            }
        };

        scope.set_attribute(KeyValue::new(
            HTTP_RESPONSE_STATUS_CODE,
            i64::from(response.status.as_u16()),
        ));
        scope.set_attribute(KeyValue::new(STATUS_TEXT_ATTRIBUTE, response.status_text()));

        if let Some(classification) = classify_response(&response) {
            record_failure(&scope, classification.error_type, &classification.message);
            debug!(
                status = response.status.as_u16(),
                error_type = %classification.error_type,
                "Request returned an error status"
            );
        }

        Ok(response)
    }
}

fn record_failure(scope: &SpanScope, error_type: ErrorType, message: &str) {
    scope.set_attribute(KeyValue::new(ERROR_ATTRIBUTE, true));
    scope.set_attribute(KeyValue::new(ERROR_TYPE, error_type.as_str()));
    scope.set_attribute(KeyValue::new(ERROR_MESSAGE_ATTRIBUTE, message.to_string()));
    scope.set_error(message.to_string());
}

impl fmt::Debug for TracedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracedClient")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::transport::MockHttpTransport;
    use crate::telemetry::test_support::{attr, tracer_with_exporter};
    use crate::telemetry::{in_span, TraceParent, TRACEPARENT_HEADER};
    use opentelemetry::trace::Status;
    use reqwest::StatusCode;

    fn json_response(status: u16, body: &str) -> HttpResponse {
        HttpResponse::new(
            StatusCode::from_u16(status).unwrap(),
            "http://localhost:8000/api/tags",
            body,
        )
    }

    fn client_with(mock: MockHttpTransport, tracer: SdkTracer) -> TracedClient {
        TracedClient::new(Arc::new(mock), tracer, SessionId::from_string("abc123"))
    }

    #[tokio::test]
    async fn test_success_records_status_and_headers() {
        let (_provider, tracer, exporter) = tracer_with_exporter();
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|req| {
                req.headers.get(SESSION_ID_HEADER).map(|v| v.as_bytes()) == Some(b"abc123".as_slice())
                    && req.headers.contains_key(TRACEPARENT_HEADER)
            })
            .times(1)
            .returning(|_| Ok(json_response(200, "[]")));

        let client = client_with(mock, tracer);
        let response = client
            .fetch(HttpRequest::get("http://localhost:8000/api/tags"))
            .await
            .unwrap();
        assert!(response.ok());

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(span.name, "GET http://localhost:8000/api/tags");
        assert_eq!(span.span_kind, SpanKind::Client);
        assert_eq!(attr(span, OPERATION_TYPE_ATTRIBUTE).as_deref(), Some("query"));
        assert_eq!(attr(span, HTTP_RESPONSE_STATUS_CODE).as_deref(), Some("200"));
        assert_eq!(attr(span, STATUS_TEXT_ATTRIBUTE).as_deref(), Some("OK"));
        assert!(attr(span, ERROR_TYPE).is_none());
        assert_eq!(span.status, Status::Unset);
    }

    #[tokio::test]
    async fn test_traceparent_names_request_span() {
        let (_provider, tracer, exporter) = tracer_with_exporter();
        let sent = Arc::new(std::sync::Mutex::new(None));
        let captured = sent.clone();
        let mut mock = MockHttpTransport::new();
        mock.expect_send().returning(move |req| {
            *captured.lock().unwrap() = req
                .headers
                .get(TRACEPARENT_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            Ok(json_response(204, ""))
        });

        let client = client_with(mock, tracer);
        client
            .fetch(HttpRequest::delete("http://localhost:8000/api/tags/3"))
            .await
            .unwrap();

        let header = sent.lock().unwrap().clone().unwrap();
        let parsed = TraceParent::parse(&header).unwrap();
        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(parsed.trace_id, spans[0].span_context.trace_id());
        assert_eq!(parsed.span_id, spans[0].span_context.span_id());
        assert_eq!(attr(&spans[0], OPERATION_TYPE_ATTRIBUTE).as_deref(), Some("delete"));
    }

    #[tokio::test]
    async fn test_duplicate_message_classified() {
        let (_provider, tracer, exporter) = tracer_with_exporter();
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .returning(|_| Ok(json_response(400, r#"{"error":"Tag already exists"}"#)));

        let client = client_with(mock, tracer);
        let response = client
            .fetch(HttpRequest::post("http://localhost:8000/api/tags"))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.text(), r#"{"error":"Tag already exists"}"#);

        let spans = exporter.get_finished_spans().unwrap();
        let span = &spans[0];
        assert_eq!(attr(span, ERROR_ATTRIBUTE).as_deref(), Some("true"));
        assert_eq!(attr(span, ERROR_TYPE).as_deref(), Some("duplicate_resource"));
        assert_eq!(
            attr(span, ERROR_MESSAGE_ATTRIBUTE).as_deref(),
            Some("Tag already exists")
        );
        assert_eq!(attr(span, OPERATION_TYPE_ATTRIBUTE).as_deref(), Some("create"));
        assert_eq!(span.status, Status::error("Tag already exists"));
    }

    #[tokio::test]
    async fn test_bare_404_classified_by_status() {
        let (_provider, tracer, exporter) = tracer_with_exporter();
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .returning(|_| Ok(json_response(404, "<h1>Not Found</h1>")));

        let client = client_with(mock, tracer);
        let response = client
            .fetch(HttpRequest::get("http://localhost:8000/api/student/9/techniques"))
            .await
            .unwrap();
        assert!(!response.ok());

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(attr(&spans[0], ERROR_TYPE).as_deref(), Some("not_found"));
    }

    #[tokio::test]
    async fn test_network_failure_propagates() {
        let (_provider, tracer, exporter) = tracer_with_exporter();
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .returning(|_| Err(FetchError::Network("connection refused".to_string())));

        let client = client_with(mock, tracer);
        let result = client
            .fetch(HttpRequest::put("http://localhost:8000/api/profile"))
            .await;
        assert!(matches!(result, Err(FetchError::Network(_))));

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(attr(span, ERROR_TYPE).as_deref(), Some("network_error"));
        assert!(attr(span, HTTP_RESPONSE_STATUS_CODE).is_none());
        assert!(matches!(span.status, Status::Error { .. }));
    }

    #[tokio::test]
    async fn test_request_span_nests_under_parent() {
        let (_provider, tracer, exporter) = tracer_with_exporter();
        let mut mock = MockHttpTransport::new();
        mock.expect_send().returning(|_| Ok(json_response(200, "{}")));
        let client = client_with(mock, tracer.clone());

        let result: Result<HttpResponse, FetchError> =
            in_span(&tracer, "load_profile", SpanOptions::new(), |cx| {
                let client = client.clone();
                async move {
                    client
                        .fetch_in(HttpRequest::get("http://localhost:8000/api/me"), &cx)
                        .await
                }
            })
            .await;
        assert!(result.is_ok());

        let spans = exporter.get_finished_spans().unwrap();
        let parent = spans.iter().find(|s| s.name == "load_profile").unwrap();
        let child = spans
            .iter()
            .find(|s| s.name == "GET http://localhost:8000/api/me")
            .unwrap();
        assert_eq!(child.parent_span_id, parent.span_context.span_id());
    }
}
