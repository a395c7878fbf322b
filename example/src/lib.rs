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

//! Sample REST service that implements a key/value store and reports its failures as faults.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

use restfault_core::normalizer::FaultOptions;
use std::error::Error;
use std::net::SocketAddr;
use tokio::net::TcpListener;

mod driver;
use driver::Driver;
pub(crate) mod model;
mod rest;
use rest::app;

/// Instantiates all resources to serve the application on `bind_addr`.
///
/// Faults raised by the handlers are rendered according to `options`, and deleting keys requires
/// presenting `admin_token` as a bearer token.
///
/// While it'd be nice to push this responsibility to `main`, doing so would force us to expose many
/// crate-internal types to the public, which in turn would make dead code detection harder.
pub async fn serve(
    bind_addr: impl Into<SocketAddr>,
    options: FaultOptions,
    admin_token: String,
) -> Result<(), Box<dyn Error>> {
    options.validate()?;
    if options.debug {
        log::warn!("Fault debug mode is enabled; responses will expose internal details");
    }

    let driver = Driver::new(admin_token);
    let app = app(driver, options);

    let listener = TcpListener::bind(bind_addr.into()).await?;
    log::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
