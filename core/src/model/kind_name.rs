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

//! The `KindName` data type.

use crate::model::{ModelError, ModelResult};
use serde::{Deserialize, Serialize, de::Visitor};
use std::borrow::Borrow;
use std::fmt;

/// Maximum length of a kind name.
pub(crate) const MAX_KIND_NAME_LENGTH: usize = 128;

/// Represents the name of a fault kind, as used to key the code and message tables.
///
/// Kind names are case-sensitive and restricted to ASCII alphanumerics and a few separators so
/// that they can be written in configuration without quoting.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct KindName(String);

impl KindName {
    /// Creates a new kind name from an untrusted string `s`, making sure it is valid.
    pub fn new<S: Into<String>>(s: S) -> ModelResult<Self> {
        let s = s.into();

        if s.is_empty() {
            return Err(ModelError("Kind name cannot be empty".to_owned()));
        }
        if s.len() > MAX_KIND_NAME_LENGTH {
            return Err(ModelError("Kind name is too long".to_owned()));
        }

        for ch in s.chars() {
            if !(ch.is_ascii_alphanumeric() || "_.:-".find(ch).is_some()) {
                return Err(ModelError(format!(
                    "Unsupported character '{}' in kind name '{}'",
                    ch, s
                )));
            }
        }

        Ok(Self(s))
    }

    /// Derives a kind name from a Rust type name such as `core::num::error::ParseIntError`.
    ///
    /// Only the last path segment survives, without generic arguments or trait object markers.
    /// Returns `None` if nothing valid remains.
    pub(crate) fn from_type_name(type_name: &str) -> Option<Self> {
        let base = type_name.split('<').next().unwrap_or(type_name);
        let base = base.split(" + ").next().unwrap_or(base);
        let base = base.trim().trim_start_matches("dyn ").trim_start_matches('&');
        let last = base.rsplit("::").next().unwrap_or(base);
        KindName::new(last).ok()
    }

    /// Returns the name given to errors whose concrete type is unknown.
    pub(crate) fn generic_error() -> Self {
        Self("Error".to_owned())
    }

    /// Returns a string view of the kind name.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Borrow<str> for KindName {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for KindName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(any(test, feature = "testutils"))]
impl From<&'static str> for KindName {
    /// Creates a new kind name from a hardcoded string, which must be valid.
    fn from(name: &'static str) -> Self {
        KindName::new(name).expect("Hardcoded kind names must be valid")
    }
}

/// A deserialization visitor for a `KindName`.
struct KindNameVisitor;

impl Visitor<'_> for KindNameVisitor {
    type Value = KindName;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        KindName::new(v).map_err(|e| E::custom(e.to_string()))
    }

    fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        KindName::new(v).map_err(|e| E::custom(e.to_string()))
    }
}

impl<'de> Deserialize<'de> for KindName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_string(KindNameVisitor)
    }
}
