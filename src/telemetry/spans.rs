// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Span helpers for consistent instrumentation.
//!
//! Parent spans are passed explicitly through [`SpanOptions::parent`]; when
//! none is given the ambient [`Context::current`] is used. [`in_span`] also
//! attaches the new span as the ambient context of the wrapped future, so
//! nested helpers pick it up without threading it by hand.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;

use opentelemetry::trace::{
    FutureExt, SpanKind, SpanRef, Status, TraceContextExt, Tracer,
};
use opentelemetry::{Context, KeyValue};
use opentelemetry_semantic_conventions::attribute::{EXCEPTION_MESSAGE, EXCEPTION_TYPE};

/// Name of span events recording an error.
pub const EXCEPTION_EVENT: &str = "exception";

/// Options for starting a span.
#[derive(Debug, Clone)]
pub struct SpanOptions {
    /// Parent context; the ambient context when `None`.
    pub parent: Option<Context>,
    /// Attributes set at span start.
    pub attributes: Vec<KeyValue>,
    pub kind: SpanKind,
}

impl Default for SpanOptions {
    fn default() -> Self {
        Self {
            parent: None,
            attributes: Vec::new(),
            kind: SpanKind::Internal,
        }
    }
}

impl SpanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(mut self, parent: &Context) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn with_attribute(mut self, attribute: KeyValue) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_attributes(mut self, attributes: impl IntoIterator<Item = KeyValue>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    pub fn with_kind(mut self, kind: SpanKind) -> Self {
        self.kind = kind;
        self
    }
}

/// An open span that is ended exactly once when the scope is dropped.
///
/// Dropping during a panic marks the span as failed before ending it.
pub struct SpanScope {
    cx: Context,
}

impl SpanScope {
    /// Start a span as a child of `options.parent`.
    pub fn start<T>(tracer: &T, name: impl Into<Cow<'static, str>>, options: SpanOptions) -> Self
    where
        T: Tracer,
        T::Span: Send + Sync + 'static,
    {
        let parent = options.parent.unwrap_or_else(Context::current);
        let span = tracer
            .span_builder(name)
            .with_kind(options.kind)
            .with_attributes(options.attributes)
            .start_with_context(tracer, &parent);

        Self {
            cx: parent.with_span(span),
        }
    }

    /// Context carrying this span, for children and propagation.
    pub fn context(&self) -> &Context {
        &self.cx
    }

    pub fn span(&self) -> SpanRef<'_> {
        self.cx.span()
    }

    pub fn set_attribute(&self, attribute: KeyValue) {
        self.span().set_attribute(attribute);
    }

    pub fn add_event(&self, name: impl Into<Cow<'static, str>>, attributes: Vec<KeyValue>) {
        self.span().add_event(name, attributes);
    }

    pub fn set_ok(&self) {
        self.span().set_status(Status::Ok);
    }

    pub fn set_error(&self, message: impl Into<Cow<'static, str>>) {
        self.span().set_status(Status::error(message));
    }

    /// Add an `exception` event describing `err`.
    pub fn record_exception<E: fmt::Display + ?Sized>(&self, err: &E) {
        self.add_event(
            EXCEPTION_EVENT,
            vec![
                KeyValue::new(EXCEPTION_TYPE, std::any::type_name::<E>()),
                KeyValue::new(EXCEPTION_MESSAGE, err.to_string()),
            ],
        );
    }

    /// End the span now.
    pub fn end(self) {}
}

impl Drop for SpanScope {
    fn drop(&mut self) {
        let span = self.cx.span();
        if std::thread::panicking() {
            span.set_status(Status::error("panicked"));
        }
        span.end();
    }
}

impl fmt::Debug for SpanScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanScope")
            .field("span_context", self.span().span_context())
            .finish()
    }
}

/// Run `f` inside a new span.
///
/// `Ok` marks the span OK. `Err` marks it ERROR with the error's message and
/// records an exception event; the error itself is returned untouched.
pub async fn in_span<T, R, E, F, Fut>(
    tracer: &T,
    name: impl Into<Cow<'static, str>>,
    options: SpanOptions,
    f: F,
) -> Result<R, E>
where
    T: Tracer,
    T::Span: Send + Sync + 'static,
    F: FnOnce(Context) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: fmt::Display,
{
    let scope = SpanScope::start(tracer, name, options);
    let cx = scope.context().clone();

    let result = f(cx.clone()).with_context(cx).await;
    finish(&scope, &result);

    result
}

/// Synchronous form of [`in_span`].
pub fn in_span_sync<T, R, E, F>(
    tracer: &T,
    name: impl Into<Cow<'static, str>>,
    options: SpanOptions,
    f: F,
) -> Result<R, E>
where
    T: Tracer,
    T::Span: Send + Sync + 'static,
    F: FnOnce(Context) -> Result<R, E>,
    E: fmt::Display,
{
    let scope = SpanScope::start(tracer, name, options);
    let cx = scope.context().clone();

    let result = {
        let _attached = cx.clone().attach();
        f(cx)
    };
    finish(&scope, &result);

    result
}

fn finish<R, E: fmt::Display>(scope: &SpanScope, result: &Result<R, E>) {
    match result {
        Ok(_) => scope.set_ok(),
        Err(err) => {
            scope.set_error(err.to_string());
            scope.record_exception(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::test_support::{attr, tracer_with_exporter};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Boom(&'static str);

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    #[tokio::test]
    async fn test_in_span_success() {
        let (_provider, tracer, exporter) = tracer_with_exporter();

        let value: Result<u32, Boom> = in_span(
            &tracer,
            "load_students",
            SpanOptions::new().with_attribute(KeyValue::new("students.page", 2)),
            |_cx| async { Ok(42) },
        )
        .await;
        assert_eq!(value.unwrap(), 42);

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "load_students");
        assert_eq!(spans[0].status, Status::Ok);
        assert_eq!(attr(&spans[0], "students.page").as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_in_span_error_is_returned_unchanged() {
        let (_provider, tracer, exporter) = tracer_with_exporter();
        let original = Arc::new(Boom("student not found"));
        let thrown = original.clone();

        let result: Result<(), Arc<Boom>> =
            in_span(&tracer, "load_student", SpanOptions::new(), |_cx| async move {
                Err(thrown)
            })
            .await;

        let err = result.unwrap_err();
        assert!(Arc::ptr_eq(&err, &original));

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].status, Status::error("student not found"));
        let exception = spans[0]
            .events
            .events
            .iter()
            .find(|e| e.name == EXCEPTION_EVENT)
            .expect("exception event");
        assert!(exception
            .attributes
            .iter()
            .any(|kv| kv.key.as_str() == EXCEPTION_MESSAGE
                && kv.value.as_str() == "student not found"));
    }

    #[test]
    fn test_in_span_sync_error_ends_once() {
        let (_provider, tracer, exporter) = tracer_with_exporter();

        let result: Result<(), Boom> =
            in_span_sync(&tracer, "parse", SpanOptions::new(), |_cx| Err(Boom("bad input")));
        assert_eq!(result.unwrap_err().0, "bad input");

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].status, Status::error("bad input"));
    }

    #[tokio::test]
    async fn test_children_nest_under_explicit_parent() {
        let (_provider, tracer, exporter) = tracer_with_exporter();

        let outer: Result<(), Boom> = in_span(&tracer, "outer", SpanOptions::new(), |cx| {
            let tracer = tracer.clone();
            async move {
                in_span(
                    &tracer,
                    "inner",
                    SpanOptions::new().with_parent(&cx),
                    |_| async { Ok::<_, Boom>(()) },
                )
                .await
            }
        })
        .await;
        assert!(outer.is_ok());

        let spans = exporter.get_finished_spans().unwrap();
        let outer = spans.iter().find(|s| s.name == "outer").unwrap();
        let inner = spans.iter().find(|s| s.name == "inner").unwrap();
        assert_eq!(inner.parent_span_id, outer.span_context.span_id());
        assert_eq!(
            inner.span_context.trace_id(),
            outer.span_context.trace_id()
        );
    }

    #[tokio::test]
    async fn test_ambient_context_inside_future() {
        let (_provider, tracer, _exporter) = tracer_with_exporter();

        let _: Result<(), Boom> = in_span(&tracer, "ambient", SpanOptions::new(), |cx| async move {
            let ambient = Context::current();
            assert_eq!(
                ambient.span().span_context().span_id(),
                cx.span().span_context().span_id()
            );
            Ok(())
        })
        .await;
    }

    #[test]
    fn test_double_end_is_tolerated() {
        let (_provider, tracer, exporter) = tracer_with_exporter();

        let scope = SpanScope::start(&tracer, "twice", SpanOptions::new());
        scope.span().end();
        scope.set_attribute(KeyValue::new("late", true));
        drop(scope);

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert!(attr(&spans[0], "late").is_none());
    }

    #[test]
    fn test_panic_marks_span_failed() {
        let (_provider, tracer, exporter) = tracer_with_exporter();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<(), Boom> =
                in_span_sync(&tracer, "explode", SpanOptions::new(), |_| panic!("kaboom"));
        }));
        assert!(outcome.is_err());

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].status, Status::error("panicked"));
    }
}
