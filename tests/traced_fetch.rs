// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Integration tests for traced fetch and the typed API client.

mod common;

use opentelemetry::trace::{SpanKind, Status};
use sillybus::api::{ApiClient, ApiError, StudentsQuery};
use sillybus::http::{ErrorType, HttpRequest, SESSION_ID_HEADER};
use sillybus::telemetry::{in_span, SpanOptions, TraceParent, TRACEPARENT_HEADER};
use sillybus::FetchError;

use common::{attr, Harness, ScriptedTransport, API, SESSION};

// ============================================================================
// Request Span Tests
// ============================================================================

#[tokio::test]
async fn test_success_span_and_headers() {
    let transport = ScriptedTransport::new();
    transport.reply(200, &format!("{API}/me"), r#"{"id":1}"#);
    let harness = Harness::new(transport.clone());

    let response = harness
        .client
        .fetch(HttpRequest::get(format!("{API}/me")))
        .await
        .unwrap();
    assert!(response.ok());

    let span = harness.span(&format!("GET {API}/me"));
    assert_eq!(span.span_kind, SpanKind::Client);
    assert_eq!(attr(&span, "http.request.method").as_deref(), Some("GET"));
    assert_eq!(attr(&span, "http.response.status_code").as_deref(), Some("200"));
    assert_eq!(attr(&span, "operation.type").as_deref(), Some("query"));
    assert_eq!(attr(&span, "error"), None);

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    let headers = &sent[0].headers;
    assert_eq!(
        headers.get(SESSION_ID_HEADER).and_then(|v| v.to_str().ok()),
        Some(SESSION)
    );
    let traceparent = headers
        .get(TRACEPARENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    let parsed = TraceParent::parse(traceparent).unwrap();
    assert_eq!(parsed.trace_id, span.span_context.trace_id());
    assert_eq!(parsed.span_id, span.span_context.span_id());
}

#[tokio::test]
async fn test_error_status_is_classified_not_raised() {
    let transport = ScriptedTransport::new();
    transport.reply(404, &format!("{API}/student/7/techniques"), r#"{"error":"Student not found"}"#);
    let harness = Harness::new(transport);

    let response = harness
        .client
        .fetch(HttpRequest::get(format!("{API}/student/7/techniques")))
        .await
        .unwrap();
    assert_eq!(response.status.as_u16(), 404);

    let span = harness.span(&format!("GET {API}/student/7/techniques"));
    assert_eq!(attr(&span, "error").as_deref(), Some("true"));
    assert_eq!(attr(&span, "error.type").as_deref(), Some("resource_not_found"));
    assert_eq!(attr(&span, "error.message").as_deref(), Some("Student not found"));
    assert!(matches!(span.status, Status::Error { .. }));
}

#[tokio::test]
async fn test_network_failure_is_raised_and_recorded() {
    let transport = ScriptedTransport::new();
    transport.push(Err(FetchError::Network("connection refused".to_string())));
    let harness = Harness::new(transport);

    let result = harness
        .client
        .fetch(HttpRequest::post(format!("{API}/login")))
        .await;
    assert!(matches!(result, Err(FetchError::Network(_))));

    let span = harness.span(&format!("POST {API}/login"));
    assert_eq!(attr(&span, "error.type").as_deref(), Some("network_error"));
    assert_eq!(attr(&span, "operation.type").as_deref(), Some("create"));
    assert!(matches!(span.status, Status::Error { .. }));
}

#[tokio::test]
async fn test_request_span_is_child_of_explicit_parent() {
    let transport = ScriptedTransport::new();
    transport.reply(200, &format!("{API}/tags"), r#"{"tags":[]}"#);
    let harness = Harness::new(transport);

    let client = harness.client.clone();
    let tracer = client.tracer().clone();
    in_span(
        &tracer,
        "load tags",
        SpanOptions::new(),
        |cx| async move {
            client
                .fetch_in(HttpRequest::get(format!("{API}/tags")), &cx)
                .await
        },
    )
    .await
    .unwrap();

    let parent = harness.span("load tags");
    let child = harness.span(&format!("GET {API}/tags"));
    assert_eq!(child.span_context.trace_id(), parent.span_context.trace_id());
    assert_eq!(child.parent_span_id, parent.span_context.span_id());
}

// ============================================================================
// API Client Tests
// ============================================================================

#[tokio::test]
async fn test_login_then_list_students() {
    let transport = ScriptedTransport::new();
    transport
        .reply(
            200,
            &format!("{API}/login"),
            r#"{"success":true,"user":{"id":2,"username":"coach","display_name":"Coach Sam","role":"coach"}}"#,
        )
        .reply(
            200,
            &format!("{API}/students"),
            r#"[
                {"id":5,"username":"amy","display_name":"Amy","role":"student"},
                {"id":6,"username":"bob","display_name":"Bob","role":"student"}
            ]"#,
        );
    let harness = Harness::new(transport.clone());
    let api = ApiClient::new(harness.client.clone(), API).unwrap();

    let user = api.login("coach", "hunter22").await.unwrap();
    assert_eq!(user.display_name, "Coach Sam");

    let query = StudentsQuery {
        search: Some("am".to_string()),
        ..Default::default()
    };
    let students = api.students(&query).await.unwrap();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].username, "amy");

    let sent = transport.sent();
    assert_eq!(sent[0].url, format!("{API}/login"));
    assert_eq!(sent[1].url, format!("{API}/students"));
}

#[tokio::test]
async fn test_api_error_carries_classification() {
    let transport = ScriptedTransport::new();
    transport.reply(403, &format!("{API}/admin/users"), r#"{"error":"Permission denied"}"#);
    let harness = Harness::new(transport);
    let api = ApiClient::new(harness.client.clone(), API).unwrap();

    let err = api.admin_users().await.unwrap_err();
    assert!(matches!(err, ApiError::Status { .. }));
    assert_eq!(err.status().map(|s| s.as_u16()), Some(403));
    assert_eq!(err.error_type(), ErrorType::AuthenticationError);
}
