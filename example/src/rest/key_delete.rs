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

//! API to delete a key.

use crate::driver::Driver;
use crate::model::Key;
use axum::extract::{Path, State};
use axum::http::{self, HeaderMap};
use restfault_core::fault::Fault;
use restfault_core::rest::{EmptyBody, RestResult, get_unique_header};

/// Extracts the bearer token from the `Authorization` header in `headers`, if any.
fn get_bearer_token(headers: &HeaderMap) -> RestResult<Option<&str>> {
    let value = match get_unique_header(headers, &http::header::AUTHORIZATION)? {
        Some(value) => value,
        None => return Ok(None),
    };

    let value = value
        .to_str()
        .map_err(|_| Fault::invalid_request("Authorization header contains invalid characters"))?;
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("Bearer") => Ok(Some(token.trim())),
        _ => Err(Fault::invalid_request("Authorization header must use the Bearer scheme")),
    }
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Path(key): Path<String>,
    headers: HeaderMap,
    _: EmptyBody,
) -> RestResult<http::StatusCode> {
    let key = Key::new(key)?;
    let token = get_bearer_token(&headers)?;
    driver.delete_key(&key, token).await?;
    Ok(http::StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::testutils::*;
    use restfault_core::rest::testutils::*;

    fn route(key: &str) -> (http::Method, String) {
        (http::Method::DELETE, format!("/api/v1/keys/{}", key))
    }

    #[tokio::test]
    async fn test_ok() {
        let mut context = TestContext::setup();

        context.set_key("first", "value").await;
        context.set_key("second", "value").await;

        OneShotBuilder::new(context.app(), route("first"))
            .with_bearer_auth(ADMIN_TOKEN)
            .send_empty()
            .await
            .expect_status(http::StatusCode::NO_CONTENT)
            .expect_empty()
            .await;

        assert!(!context.has_key("first").await);
        assert!(context.has_key("second").await);
    }

    #[tokio::test]
    async fn test_not_found() {
        let context = TestContext::setup();

        OneShotBuilder::new(context.app(), route("first"))
            .with_bearer_auth(ADMIN_TOKEN)
            .send_empty()
            .await
            .expect_status(http::StatusCode::NOT_FOUND)
            .expect_error("^Key first not found$")
            .await;
    }

    #[tokio::test]
    async fn test_missing_token() {
        let mut context = TestContext::setup();

        context.set_key("first", "value").await;

        let response = OneShotBuilder::new(context.app(), route("first"))
            .send_empty()
            .await
            .expect_status(http::StatusCode::UNAUTHORIZED)
            .take_response()
            .await;
        assert_eq!(
            "Bearer realm=\"example\"",
            response.headers().get(http::header::WWW_AUTHENTICATE).unwrap()
        );

        assert!(context.has_key("first").await);
    }

    #[tokio::test]
    async fn test_bad_token() {
        let mut context = TestContext::setup();

        context.set_key("first", "value").await;

        OneShotBuilder::new(context.app(), route("first"))
            .with_bearer_auth("not-the-token")
            .send_empty()
            .await
            .expect_status(http::StatusCode::UNAUTHORIZED)
            .expect_error("^Unauthorized: Invalid admin token$")
            .await;

        assert!(context.has_key("first").await);
    }

    #[tokio::test]
    async fn test_bad_scheme() {
        let context = TestContext::setup();

        OneShotBuilder::new(context.app(), route("first"))
            .with_header(http::header::AUTHORIZATION, "Basic Zm9vOmJhcg==")
            .send_empty()
            .await
            .expect_status(http::StatusCode::BAD_REQUEST)
            .expect_error("must use the Bearer scheme")
            .await;
    }

    #[tokio::test]
    async fn test_duplicate_authorization() {
        let context = TestContext::setup();

        OneShotBuilder::new(context.app(), route("first"))
            .with_bearer_auth(ADMIN_TOKEN)
            .with_bearer_auth(ADMIN_TOKEN)
            .send_empty()
            .await
            .expect_status(http::StatusCode::BAD_REQUEST)
            .expect_error("cannot have more than one value")
            .await;
    }

    test_payload_must_be_empty!(TestContext::setup().into_app(), route("first"));
}
