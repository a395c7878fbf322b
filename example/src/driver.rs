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

//! Business logic for the service.

use crate::model::{Entry, Key, Version};
use restfault_core::fault::Fault;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Realm advertised to clients that fail to authenticate.
pub(crate) const REALM: &str = "example";

/// Result type for the driver's operations.
pub(crate) type DriverResult<T> = Result<T, Fault>;

/// Business logic.
///
/// The driver is cheap to clone: all clones share the same in-memory store.
#[derive(Clone)]
pub(crate) struct Driver {
    /// The key/value store.
    store: Arc<RwLock<BTreeMap<Key, Entry>>>,

    /// Token that grants access to administrative operations.
    admin_token: Arc<String>,
}

impl Driver {
    /// Creates a new driver with an empty store that accepts `admin_token` for administrative
    /// operations.
    pub(crate) fn new<S: Into<String>>(admin_token: S) -> Self {
        Self { store: Arc::default(), admin_token: Arc::from(admin_token.into()) }
    }

    /// Ensures that `token` grants administrative access.
    fn check_admin(&self, token: Option<&str>) -> DriverResult<()> {
        match token {
            Some(token) if token == self.admin_token.as_str() => Ok(()),
            Some(_) => Err(Fault::unauthorized("Bearer", REALM, "Invalid admin token")),
            None => Err(Fault::unauthorized("Bearer", REALM, "Missing admin token")),
        }
    }

    /// Gets the current value of the given `key`.
    pub(crate) async fn get_key(self, key: &Key) -> DriverResult<Entry> {
        let store = self.store.read().await;
        match store.get(key) {
            Some(entry) => Ok(entry.clone()),
            None => Err(Fault::not_found(format!("Key {} not found", key)).with_field("key", key)),
        }
    }

    /// Sets `key` to `value`, returning the new entry.
    pub(crate) async fn set_key(self, key: Key, value: String) -> DriverResult<Entry> {
        let mut store = self.store.write().await;
        let version = match store.get(&key) {
            Some(entry) => entry.version.next(),
            None => Version::initial(),
        };
        let entry = Entry { value, version };
        store.insert(key, entry.clone());
        Ok(entry)
    }

    /// Deletes `key` on behalf of the holder of `token`.
    pub(crate) async fn delete_key(self, key: &Key, token: Option<&str>) -> DriverResult<()> {
        self.check_admin(token)?;

        let mut store = self.store.write().await;
        match store.remove(key) {
            Some(_) => Ok(()),
            None => Err(Fault::not_found(format!("Key {} not found", key)).with_field("key", key)),
        }
    }

    /// Gets the value of `key` interpreted as an integer.
    pub(crate) async fn get_key_number(self, key: &Key) -> DriverResult<i64> {
        let entry = self.get_key(key).await?;
        entry.value.trim().parse::<i64>().map_err(|e| Fault::from_error(&e).with_field("key", key))
    }
}
