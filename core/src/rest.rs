// StaySync
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Generic code for REST handlers.
//!
//! All services should implement an `app` function in their `rest` module that returns the
//! `Router` for the application.
//!
//! Every API should be put in its own `.rs` file, using a name like `<entity>_<method>.rs`.  This
//! may seem overkill, but putting every API in its own file makes it easy to ensure all the
//! integration tests for the given API truly belong to that API.
//!
//! More specifically, the `tests` module within an API should define a `route` method that
//! returns the HTTP method and the API path under test.  All integration tests within the module
//! then rely on `route` to obtain this information, ensuring that they all test the desired API.
//!
//! All responses share an envelope: successful responses are wrapped in `ApiResponse` and failed
//! ones are rendered from a `RestError` as an `ErrorResponse`, both carrying a `success` flag.

use crate::driver::DriverError;
use crate::model::{FieldErrors, ModelError};
use async_trait::async_trait;
use axum::Json;
use axum::body::HttpBody;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::http::{StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use log::{error, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Frontend errors.  These are the errors that are visible to the user on failed requests.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum RestError {
    /// Indicates that the request clashes with the current state of the data.
    #[error("{message}")]
    Conflict {
        /// Stable code identifying the condition.
        code: &'static str,

        /// Descriptive message explaining the nature of the problem.
        message: String,

        /// Diagnostic data for the client.
        details: Option<serde_json::Value>,
    },

    /// Catch-all error type for all unexpected errors.
    #[error("{0}")]
    InternalError(String),

    /// Indicates an error in the contents of the request.
    #[error("{message}")]
    InvalidRequest {
        /// Stable code identifying the condition.
        code: &'static str,

        /// Descriptive message explaining the nature of the problem.
        message: String,
    },

    /// Indicates that a requested entity does not exist.
    #[error("{message}")]
    NotFound {
        /// Stable code identifying the condition.
        code: &'static str,

        /// Descriptive message explaining the nature of the problem.
        message: String,

        /// Diagnostic data for the client.
        details: Option<serde_json::Value>,
    },

    /// Indicates that a request that should have empty content did not.
    #[error("Content should be empty")]
    PayloadNotEmpty,

    /// Indicates that one or more fields of the request failed validation.
    #[error("Request validation failed")]
    Validation(FieldErrors),
}

impl RestError {
    /// Shorthand to construct an `InvalidRequest` error.
    pub fn invalid_request<S: Into<String>>(code: &'static str, message: S) -> Self {
        RestError::InvalidRequest { code, message: message.into() }
    }

    /// Returns the stable code that identifies this error.
    pub fn code(&self) -> &'static str {
        match self {
            RestError::Conflict { code, .. } => code,
            RestError::InternalError(_) => "INTERNAL_ERROR",
            RestError::InvalidRequest { code, .. } => code,
            RestError::NotFound { code, .. } => code,
            RestError::PayloadNotEmpty => "PAYLOAD_NOT_EMPTY",
            RestError::Validation(_) => "VALIDATION_ERROR",
        }
    }
}

impl From<DriverError> for RestError {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::AlreadyExists { code, message } => {
                RestError::Conflict { code, message, details: None }
            }
            DriverError::BackendError(message) => RestError::InternalError(message),
            DriverError::Conflict { code, message, details } => {
                RestError::Conflict { code, message, details }
            }
            DriverError::HasDependents { code, message, details } => {
                RestError::Conflict { code, message, details }
            }
            DriverError::InvalidInput { code, message } => {
                RestError::InvalidRequest { code, message }
            }
            DriverError::NotFound { code, message } => {
                RestError::NotFound { code, message, details: None }
            }
            DriverError::Validation(errors) => RestError::Validation(errors),
        }
    }
}

impl From<FieldErrors> for RestError {
    fn from(e: FieldErrors) -> Self {
        RestError::Validation(e)
    }
}

impl From<ModelError> for RestError {
    fn from(e: ModelError) -> Self {
        RestError::invalid_request("VALIDATION_ERROR", e.to_string())
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = match self {
            RestError::Conflict { .. } => StatusCode::CONFLICT,
            RestError::InternalError(ref message) => {
                error!("Request failed with an internal error: {}", message);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            RestError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            RestError::NotFound { .. } => StatusCode::NOT_FOUND,
            RestError::PayloadNotEmpty => StatusCode::PAYLOAD_TOO_LARGE,
            RestError::Validation(_) => StatusCode::BAD_REQUEST,
        };

        let code = self.code().to_owned();
        let error = self.to_string();
        let details = match self {
            RestError::Conflict { details, .. } => details,
            RestError::NotFound { details, .. } => details,
            RestError::Validation(errors) => serde_json::to_value(errors.errors()).ok(),
            _ => None,
        };

        let response = ErrorResponse { success: false, error, code, details };
        (status, Json(response)).into_response()
    }
}

/// Result type for this module.
pub type RestResult<T> = Result<T, RestError>;

/// Representation of the details of an error response.
#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    /// Always false.
    pub success: bool,

    /// Textual representation of the error message.
    pub error: String,

    /// Stable code identifying the error.
    pub code: String,

    /// Additional error-specific data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Pagination metadata attached to list responses.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Pagination {
    /// The 1-based page that was returned.
    pub page: u32,

    /// Maximum number of items per page.
    pub limit: u32,

    /// Total number of items across all pages.
    pub total: u64,

    /// Total number of pages.
    pub pages: u64,
}

impl Pagination {
    /// Computes the pagination metadata for `total` items split in pages of `limit` items.
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let pages = if limit == 0 { 0 } else { total.div_ceil(u64::from(limit)) };
        Self { page, limit, total, pages }
    }
}

/// Envelope for successful responses.
#[derive(Debug, Deserialize, Serialize)]
pub struct ApiResponse<T> {
    /// Always true.
    pub success: bool,

    /// The payload of the response.
    pub data: T,

    /// Optional human-readable note about the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Pagination metadata for list responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> ApiResponse<T> {
    /// Wraps `data` in a successful response.
    pub fn new(data: T) -> Self {
        Self { success: true, data, message: None, pagination: None }
    }

    /// Attaches a human-readable `message` to the response.
    pub fn with_message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attaches `pagination` metadata to the response.
    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// A request body extractor that forbids any content.
///
/// Any API that doesn't expect a body should use this to ensure we don't get garbage data that we
/// don't care about.  This future-proofs the service.
pub struct EmptyBody {}

#[async_trait]
impl<S> FromRequest<S> for EmptyBody
where
    S: Send + Sync,
{
    type Rejection = RestError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        if req.into_body().is_end_stream() {
            Ok(EmptyBody {})
        } else {
            Err(RestError::PayloadNotEmpty)
        }
    }
}

/// A JSON body extractor whose failures are reported with the common error envelope.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = RestError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                Err(RestError::invalid_request("VALIDATION_ERROR", rejection.body_text()))
            }
        }
    }
}

/// A query string extractor whose failures are reported with the common error envelope.
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = RestError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(QueryParams(value)),
            Err(rejection) => {
                Err(RestError::invalid_request("VALIDATION_ERROR", rejection.body_text()))
            }
        }
    }
}

/// Fallback handler for requests that do not match any route.
pub async fn endpoint_not_found(uri: Uri) -> RestError {
    RestError::NotFound {
        code: "ENDPOINT_NOT_FOUND",
        message: "The requested endpoint does not exist".to_owned(),
        details: Some(serde_json::json!({ "path": uri.path() })),
    }
}

/// Middleware that logs every request once its response is ready.
pub async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();
    let response = next.run(req).await;
    info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        response.status().as_u16(),
        start.elapsed().as_millis()
    );
    response
}

/// Common test code for the REST server.
#[cfg(feature = "testutils")]
pub mod testutils {
    use super::*;
    use axum::Router;
    use axum::http::{self, HeaderName, HeaderValue};
    use bytes::Bytes;
    use tower::util::ServiceExt;

    /// Maximum body size for testing purposes.
    const MAX_BODY_SIZE: usize = 1024 * 1024;

    /// Builder for a single request to the API server.
    #[must_use]
    pub struct OneShotBuilder {
        /// The router for the app being tested.
        app: Router,

        /// Builder for the request that will be sent to the app.
        builder: axum::http::request::Builder,
    }

    impl OneShotBuilder {
        /// Creates a new request against a given `method`/`uri` pair served by an `app` router.
        pub fn new<U: AsRef<str>>(app: Router, (method, uri): (http::Method, U)) -> Self {
            let builder = Request::builder().method(method).uri(uri.as_ref());
            Self { app, builder }
        }

        /// Extends the URI in the request with a `query`.
        pub fn with_query<Q: Serialize>(mut self, query: Q) -> Self {
            let uri = self.builder.uri_ref().unwrap().to_string();
            assert!(!uri.contains('?'), "URI already contains a query: {}", uri);
            assert!(!uri.contains('#'), "URI contains a fragment: {}", uri);
            self.builder = self.builder.uri(format!(
                "{}?{}",
                uri,
                serde_urlencoded::to_string(query).unwrap()
            ));
            self
        }

        /// Sets the header `name` to `value` in the outgoing request.
        pub fn with_header<K, V>(mut self, name: K, value: V) -> Self
        where
            HeaderName: TryFrom<K>,
            <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
            HeaderValue: TryFrom<V>,
            <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
        {
            self.builder = self.builder.header(name, value);
            self
        }

        /// Finishes building the request and sends it with an empty payload.
        pub async fn send_empty(self) -> ResponseChecker {
            let request = self.builder.body(axum::body::Body::empty()).unwrap();
            ResponseChecker::from(self.app.oneshot(request).await.unwrap())
        }

        /// Finishes building the request and sends it with a binary payload.
        pub async fn send_bytes(self, bytes: Bytes) -> ResponseChecker {
            let request = self
                .builder
                .header(http::header::CONTENT_TYPE, mime::APPLICATION_OCTET_STREAM.as_ref())
                .body(axum::body::Body::from(bytes))
                .unwrap();
            ResponseChecker::from(self.app.oneshot(request).await.unwrap())
        }

        /// Finishes building the request and sends it with a text payload.
        pub async fn send_text<T: Into<String>>(self, text: T) -> ResponseChecker {
            let request = self
                .builder
                .header(http::header::CONTENT_TYPE, mime::TEXT_PLAIN.as_ref())
                .body(axum::body::Body::from(text.into()))
                .unwrap();
            ResponseChecker::from(self.app.oneshot(request).await.unwrap())
        }

        /// Finishes building the request and sends it with a JSON payload.
        pub async fn send_json<T: Serialize>(self, request: T) -> ResponseChecker {
            let request = self
                .builder
                .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                .body(axum::body::Body::from(serde_json::to_vec(&request).unwrap()))
                .unwrap();
            ResponseChecker::from(self.app.oneshot(request).await.unwrap())
        }
    }

    /// Type alias for the complex type returned by the `oneshot` function.
    type HttpResponse = hyper::Response<axum::body::Body>;

    /// Validator for the outcome of a request sent by a `OneShotBuilder`.
    #[must_use]
    pub struct ResponseChecker {
        /// Actual response that we received from the app.
        response: HttpResponse,

        /// Expected HTTP status code in the response above.
        exp_status: http::StatusCode,
    }

    impl From<HttpResponse> for ResponseChecker {
        fn from(response: HttpResponse) -> Self {
            Self { response, exp_status: http::StatusCode::OK }
        }
    }

    impl ResponseChecker {
        /// Sets the expected exit HTTP status to `status`.
        pub fn expect_status(mut self, status: http::StatusCode) -> Self {
            self.exp_status = status;
            self
        }

        /// Performs common validation operations on the response.
        pub fn verify(&self) {
            assert_eq!(self.exp_status, self.response.status());
        }

        /// Reads the whole body of the response after verifying it.
        async fn take_body(self) -> Bytes {
            let status = self.response.status();
            let body =
                axum::body::to_bytes(self.response.into_body(), MAX_BODY_SIZE).await.unwrap();
            assert_eq!(
                self.exp_status,
                status,
                "Unexpected status; body was {}",
                String::from_utf8_lossy(&body)
            );
            body
        }

        /// Finishes checking the response and expects it to contain an empty body.
        pub async fn expect_empty(self) {
            let body = self.take_body().await;
            let body = String::from_utf8(body.to_vec()).unwrap();
            assert!(body.is_empty(), "Body not empty; got {}", body);
        }

        /// Finishes checking the response and expects its body to be an `ErrorResponse` whose
        /// message matches `exp_re`.  Returns the response for further inspection.
        pub async fn expect_error(self, exp_re: &str) -> ErrorResponse {
            let body = self.take_body().await;
            let response: ErrorResponse = match serde_json::from_slice(&body) {
                Ok(response) => response,
                Err(e) => {
                    let body = String::from_utf8(body.to_vec()).unwrap();
                    panic!("Invalid error response due to {}; content was {}", e, body);
                }
            };
            assert!(!response.success, "Error response must not report success");
            let re = regex::Regex::new(exp_re).unwrap();
            assert!(
                re.is_match(&response.error),
                "Response content '{:?}' does not match re '{}'",
                response,
                exp_re
            );
            response
        }

        /// Finishes checking the response and expects its body to be an `ErrorResponse` with the
        /// given `exp_code`.  Returns the response for further inspection.
        pub async fn expect_error_code(self, exp_code: &str) -> ErrorResponse {
            let response = self.expect_error("").await;
            assert_eq!(exp_code, response.code, "Unexpected code in {:?}", response);
            response
        }

        /// Finishes checking the response and expects it to contain a valid JSON object of
        /// type `T`.
        pub async fn expect_json<T: DeserializeOwned>(self) -> T {
            let body = self.take_body().await;
            match serde_json::from_slice::<T>(&body) {
                Ok(value) => value,
                Err(e) => panic!(
                    "Cannot deserialize response due to {}; content was {}",
                    e,
                    String::from_utf8_lossy(&body)
                ),
            }
        }

        /// Finishes checking the response and expects it to contain a successful envelope whose
        /// payload is of type `T`.  Returns the payload.
        pub async fn expect_data<T: DeserializeOwned>(self) -> T {
            let response = self.expect_json::<ApiResponse<T>>().await;
            assert!(response.success);
            response.data
        }

        /// Finishes checking the response and expects its body to be valid UTF-8 and to match
        /// `exp_re`.
        pub async fn expect_text(self, exp_re: &str) {
            assert!(!exp_re.is_empty(), "Use expect_empty to validate empty responses");

            let body = self.take_body().await;
            let body = String::from_utf8(body.to_vec()).unwrap();
            let re = regex::Regex::new(exp_re).unwrap();
            assert!(re.is_match(&body), "Body content '{}' does not match re '{}'", body, exp_re);
        }
    }

    /// Generates a test to verify that an API that expects JSON fails when it gets something else.
    #[macro_export]
    macro_rules! test_payload_must_be_json {
        ( $app:expr, $route:expr $(, $query:expr)? ) => {
            #[tokio::test]
            async fn test_payload_must_be_json() {
                $crate::rest::testutils::OneShotBuilder::new($app, $route)
                    $( .with_query($query) )?
                    .send_text("this is not json")
                    .await
                    .expect_status(axum::http::StatusCode::BAD_REQUEST)
                    .expect_error("Content-Type")
                    .await;

                $crate::rest::testutils::OneShotBuilder::new($app, $route)
                    $( .with_query($query) )?
                    .with_header(axum::http::header::CONTENT_TYPE, "application/json")
                    .send_text("this is not json")
                    .await
                    .expect_status(axum::http::StatusCode::BAD_REQUEST)
                    .expect_error("expected ident")
                    .await;
            }
        };
    }

    pub use test_payload_must_be_json;

    /// Generates a test to verify that an API that does not expect a payload fails as necessary.
    #[macro_export]
    macro_rules! test_payload_must_be_empty {
        ( $app:expr, $route:expr $(, $query:expr)? ) => {
            #[tokio::test]
            async fn test_payload_must_be_empty() {
                $crate::rest::testutils::OneShotBuilder::new($app, $route)
                    $( .with_query($query) )?
                    .send_text("should not be here")
                    .await
                    .expect_status(axum::http::StatusCode::PAYLOAD_TOO_LARGE)
                    .expect_error("should be empty")
                    .await;
            }
        };
    }

    pub use test_payload_must_be_empty;
}
