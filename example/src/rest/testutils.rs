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

//! Test utilities for the REST API.

use crate::driver::Driver;
use crate::model::*;
use crate::rest::app;
use axum::Router;
use restfault_core::normalizer::FaultOptions;

/// Token that the test driver accepts for administrative operations.
pub(crate) const ADMIN_TOKEN: &str = "the-admin-token";

pub(crate) struct TestContext {
    driver: Driver,
    app: Router,
}

impl TestContext {
    /// Sets up a new app with production-safe fault handling.
    pub(crate) fn setup() -> Self {
        Self::setup_with_options(FaultOptions::default())
    }

    /// Sets up a new app with debug mode enabled for fault handling.
    pub(crate) fn setup_debug() -> Self {
        Self::setup_with_options(FaultOptions { debug: true, ..Default::default() })
    }

    /// Sets up a new app whose faults are handled according to `options`.
    pub(crate) fn setup_with_options(options: FaultOptions) -> Self {
        let driver = Driver::new(ADMIN_TOKEN);
        let app = app(driver.clone(), options);
        Self { driver, app }
    }

    pub(crate) fn app(&self) -> Router {
        self.app.clone()
    }

    pub(crate) fn into_app(self) -> Router {
        self.app
    }

    pub(crate) async fn set_key<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.driver.clone().set_key(Key::new(key).unwrap(), value.into()).await.unwrap();
    }

    pub(crate) async fn has_key<K: Into<String>>(&self, key: K) -> bool {
        self.driver.clone().get_key(&Key::new(key).unwrap()).await.is_ok()
    }

    pub(crate) async fn get_key<K: Into<String>>(&self, key: K) -> Entry {
        self.driver.clone().get_key(&Key::new(key).unwrap()).await.unwrap()
    }
}
