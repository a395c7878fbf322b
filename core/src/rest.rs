// RestFault
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

//! HTTP glue to turn faults into responses.
//!
//! Handlers return `Result<T, Fault>` (or `Result<T, FaultResponse>` when they already know the
//! status code to use).  Faults implement `IntoResponse` on their own and render in a
//! production-safe way, but services should attach a `FaultListener` to their `Router` so that
//! responses honor the configured tables and debug mode:
//!
//! ```rust,no_run
//! use axum::Router;
//! use restfault_core::normalizer::FaultOptions;
//! use restfault_core::rest::FaultListener;
//!
//! let options = FaultOptions::from_env("MYAPP_FAULTS").unwrap();
//! let app: Router = FaultListener::new(options).attach(Router::new());
//! ```
//!
//! The listener marks the requests it serves.  Faults raised within those requests are not rendered
//! by `IntoResponse`: they travel in the response extensions from the handler to the listener,
//! which normalizes them exactly once and replaces the response.  Outside of a listener, faults are
//! normalized with the default, production-safe rules.

use crate::fault::{Fault, FaultKind};
use crate::model::HttpCode;
use crate::normalizer::{FaultNormalizer, FaultOptions, FaultRecord};
use async_trait::async_trait;
use axum::body::HttpBody;
use axum::extract::{FromRequest, Request, State};
use axum::http::header::AsHeaderName;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use log::{info, warn};
use std::sync::{Arc, LazyLock};

/// Normalizer used to render faults when no listener is attached.
static DEFAULT_NORMALIZER: LazyLock<FaultNormalizer> = LazyLock::new(FaultNormalizer::default);

tokio::task_local! {
    /// Set while an enabled `FaultListener` is serving the current request.
    static LISTENING: ();
}

/// Returns true if the current request is served by an enabled `FaultListener`.
fn is_listening() -> bool {
    LISTENING.try_with(|_| ()).is_ok()
}

/// A fault raised by a handler, optionally with the status code the handler wants to use.
#[derive(Clone, Debug)]
pub struct FaultResponse {
    /// The raised fault.
    fault: Fault,

    /// Status code already decided by the handler.
    status_code: Option<HttpCode>,
}

impl FaultResponse {
    /// Returns the raised fault.
    pub fn fault(&self) -> &Fault {
        &self.fault
    }

    /// Returns the status code requested by the handler, if any.
    pub fn status_code(&self) -> Option<HttpCode> {
        self.status_code
    }
}

impl From<Fault> for FaultResponse {
    fn from(fault: Fault) -> Self {
        Self { fault, status_code: None }
    }
}

impl Fault {
    /// Raises this fault with an explicit status `code`, bypassing the code tables.
    pub fn respond_with(self, code: HttpCode) -> FaultResponse {
        FaultResponse { fault: self, status_code: Some(code) }
    }
}

/// Builds the HTTP response for `fault`, which was normalized into `record`.
fn render(fault: &Fault, record: FaultRecord) -> Response {
    let mut headers = HeaderMap::new();
    if let FaultKind::Unauthorized { scheme, realm } = fault.kind() {
        if record.code.as_status() == http::StatusCode::UNAUTHORIZED {
            match HeaderValue::from_str(&format!("{} realm=\"{}\"", scheme, realm)) {
                Ok(value) => {
                    headers.insert(http::header::WWW_AUTHENTICATE, value);
                }
                Err(e) => warn!("Cannot build WWW-Authenticate header for realm {}: {}", realm, e),
            }
        }
    }

    (record.code.as_status(), headers, Json(record)).into_response()
}

impl IntoResponse for FaultResponse {
    fn into_response(self) -> Response {
        if is_listening() {
            // Placeholder only: the listener replaces the whole response.
            let mut response = http::StatusCode::INTERNAL_SERVER_ERROR.into_response();
            response.extensions_mut().insert(self);
            return response;
        }

        let mut context = DEFAULT_NORMALIZER.context();
        context.status_code = self.status_code;
        let record = DEFAULT_NORMALIZER.normalize(&self.fault, &context);
        render(&self.fault, record)
    }
}

impl IntoResponse for Fault {
    fn into_response(self) -> Response {
        FaultResponse::from(self).into_response()
    }
}

/// Result type for this module.
pub type RestResult<T> = Result<T, Fault>;

/// Rewrites responses carrying raised faults according to the configured normalization rules.
#[derive(Clone)]
pub struct FaultListener {
    /// Normalizer shared by all requests.
    normalizer: Arc<FaultNormalizer>,

    /// Whether the listener rewrites responses at all.
    enabled: bool,
}

impl FaultListener {
    /// Creates a new listener from `options`.
    pub fn new(options: FaultOptions) -> Self {
        let enabled = options.enabled;
        Self { normalizer: Arc::from(FaultNormalizer::new(options)), enabled }
    }

    /// Returns the normalizer used by this listener.
    pub fn normalizer(&self) -> &FaultNormalizer {
        &self.normalizer
    }

    /// Installs the listener on all routes of `router`.
    pub fn attach<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(middleware::from_fn_with_state(self, listen))
    }

    /// Computes the response for a `raised` fault.
    pub fn handle(&self, raised: &FaultResponse) -> Response {
        let mut context = self.normalizer.context();
        context.status_code = raised.status_code;
        let record = self.normalizer.normalize(&raised.fault, &context);

        let location = raised.fault.location();
        if record.code.is_server_error() {
            warn!(
                "Request failed with {} due to {} fault raised at {}:{}: {}",
                record.code,
                raised.fault.kind().name(),
                location.file(),
                location.line(),
                raised.fault
            );
        } else {
            info!(
                "Request failed with {} due to {} fault: {}",
                record.code,
                raised.fault.kind().name(),
                raised.fault
            );
        }

        render(&raised.fault, record)
    }
}

/// Middleware that hands responses carrying raised faults to the `listener`.
async fn listen(State(listener): State<FaultListener>, request: Request, next: Next) -> Response {
    if !listener.enabled {
        return next.run(request).await;
    }

    let mut response = LISTENING.scope((), next.run(request)).await;
    match response.extensions_mut().remove::<FaultResponse>() {
        Some(raised) => listener.handle(&raised),
        None => response,
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
    type Rejection = Fault;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        if req.into_body().is_end_stream() {
            Ok(EmptyBody {})
        } else {
            Err(Fault::payload_not_empty())
        }
    }
}

/// Extracts the header `name` from `headers` and ensures it has at most one value.
pub fn get_unique_header<K: AsHeaderName + Copy>(
    headers: &HeaderMap,
    name: K,
) -> RestResult<Option<&HeaderValue>> {
    let mut iter = headers.get_all(name).iter();
    let value = iter.next();
    if iter.next().is_some() {
        return Err(Fault::invalid_request(format!(
            "Header {} cannot have more than one value",
            name.as_str()
        )));
    }
    Ok(value)
}

/// Common test code for services that raise faults.
#[cfg(any(test, feature = "testutils"))]
pub mod testutils {
    use super::*;
    use axum::http::{self, HeaderName};
    use serde::Serialize;
    use serde::de::DeserializeOwned;
    use std::fmt;
    use tower::util::ServiceExt;

    /// Maximum body size for testing purposes.
    const MAX_BODY_SIZE: usize = 4096;

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
            let _can_fail = env_logger::builder().is_test(true).try_init();

            let builder = Request::builder().method(method).uri(uri.as_ref());
            Self { app, builder }
        }

        /// Adds bearer authentication to the request.
        pub fn with_bearer_auth<T>(mut self, token: T) -> Self
        where
            T: fmt::Display,
        {
            let value = format!("Bearer {}", token);
            self.builder = self.builder.header(http::header::AUTHORIZATION, value);
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

        /// Finishes checking the response and expects its body to be a `FaultRecord`, which is
        /// returned for further validation.
        pub async fn expect_fault(self) -> FaultRecord {
            self.verify();

            let body =
                axum::body::to_bytes(self.response.into_body(), MAX_BODY_SIZE).await.unwrap();
            let record: FaultRecord = match serde_json::from_slice(&body) {
                Ok(record) => record,
                Err(e) => {
                    let body = String::from_utf8(body.to_vec()).unwrap();
                    panic!("Invalid fault record due to {}; content was {}", e, body);
                }
            };
            assert_eq!(
                self.exp_status.as_u16(),
                record.code.as_u16(),
                "Status code and record code differ"
            );
            record
        }

        /// Finishes checking the response and expects its body to be a `FaultRecord` without
        /// details whose message matches `exp_re`.
        pub async fn expect_error(self, exp_re: &str) {
            let record = self.expect_fault().await;
            assert!(record.detail.is_none(), "Unexpected details in '{:?}'", record);
            let re = regex::Regex::new(exp_re).unwrap();
            assert!(
                re.is_match(&record.message),
                "Response content '{:?}' does not match re '{}'",
                record,
                exp_re
            );
        }

        /// Finishes checking the response and expects it to contain a valid JSON object of
        /// type `T`.
        pub async fn expect_json<T: DeserializeOwned>(self) -> T {
            self.verify();

            let body =
                axum::body::to_bytes(self.response.into_body(), MAX_BODY_SIZE).await.unwrap();
            serde_json::from_slice::<T>(&body).unwrap()
        }

        /// Finishes checking the response and expects its body to be valid UTF-8 and to match
        /// `exp_re`.
        pub async fn expect_text(self, exp_re: &str) {
            assert!(!exp_re.is_empty(), "Use expect_empty to validate empty responses");

            self.verify();

            let body =
                axum::body::to_bytes(self.response.into_body(), MAX_BODY_SIZE).await.unwrap();
            let body = String::from_utf8(body.to_vec()).unwrap();
            assert!(
                !body.contains("\"message\":"),
                "Use expect_error to validate faults wrapped in a FaultRecord"
            );
            let re = regex::Regex::new(exp_re).unwrap();
            assert!(re.is_match(&body), "Body content '{}' does not match re '{}'", body, exp_re);
        }

        /// Finishes checking the response and expects it to contain an empty body.
        pub async fn expect_empty(self) {
            self.verify();

            let body =
                axum::body::to_bytes(self.response.into_body(), MAX_BODY_SIZE).await.unwrap();
            let body = String::from_utf8(body.to_vec()).unwrap();
            assert!(body.is_empty(), "Body not empty; got {}", body);
        }

        /// Finishes checking the response and returns the response itself for out of band
        /// validation of properties not supported by the `ResponseChecker`.
        pub async fn take_response(self) -> HttpResponse {
            self.verify();

            self.response
        }
    }

    /// Generates a test to verify that an API that does not expect a payload fails as necessary.
    #[macro_export]
    macro_rules! test_payload_must_be_empty {
        ( $app:expr, $route:expr ) => {
            #[tokio::test]
            async fn test_payload_must_be_empty() {
                $crate::rest::testutils::OneShotBuilder::new($app, $route)
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
