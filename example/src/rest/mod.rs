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

//! Entry point to the REST server.

use crate::driver::Driver;
use axum::Router;
use restfault_core::normalizer::FaultOptions;
use restfault_core::rest::FaultListener;

mod key_delete;
mod key_get;
mod key_number_get;
mod key_put;
#[cfg(test)]
mod testutils;

/// Creates the router for the application, with faults rendered according to `options`.
pub(crate) fn app(driver: Driver, options: FaultOptions) -> Router {
    use axum::routing::get;
    let router = Router::new()
        .route(
            "/api/v1/keys/:key",
            get(key_get::handler).put(key_put::handler).delete(key_delete::handler),
        )
        .route("/api/v1/keys/:key/number", get(key_number_get::handler))
        .with_state(driver);
    FaultListener::new(options).attach(router)
}
