// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Traced HTTP.
//!
//! - [`transport`]: the request/response seam and its `reqwest` implementation
//! - [`body`]: decoding of backend error bodies
//! - [`classify`]: the failure taxonomy
//! - [`fetch`]: [`TracedClient`], which ties the three together

pub mod body;
pub mod classify;
pub mod fetch;
pub mod transport;

pub use body::{ErrorBody, FieldErrors, ValidationErrorResponse};
pub use classify::{
    classify_body, classify_message, classify_response, classify_status, Classification,
    ErrorClass, ErrorType, OperationType,
};
pub use fetch::{TracedClient, SESSION_ID_HEADER};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
