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

//! The `HttpCode` data type.

use crate::model::{ModelError, ModelResult};
use http::StatusCode;
use serde::de::Visitor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest status code we accept.
const MIN_CODE: u16 = 100;

/// Largest status code we accept.
const MAX_CODE: u16 = 599;

/// Represents an HTTP-style status code in the 100 to 599 range.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct HttpCode(u16);

impl HttpCode {
    /// Code for requests that failed validation.
    pub const BAD_REQUEST: HttpCode = HttpCode(400);

    /// Code for faults nobody knows how to classify.
    pub const INTERNAL_SERVER_ERROR: HttpCode = HttpCode(500);

    /// Creates a new status code from an untrusted `code`, making sure it is in range.
    pub fn new(code: u16) -> ModelResult<Self> {
        if !(MIN_CODE..=MAX_CODE).contains(&code) {
            return Err(ModelError(format!(
                "Status code {} is out of range [{}, {}]",
                code, MIN_CODE, MAX_CODE
            )));
        }
        Ok(Self(code))
    }

    /// Returns the numeric value of the code.
    pub fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns the code as understood by the `http` crate.
    pub fn as_status(self) -> StatusCode {
        StatusCode::from_u16(self.0).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Returns the standard reason phrase for the code (e.g. "Not Found"), if any.
    pub fn canonical_reason(self) -> Option<&'static str> {
        self.as_status().canonical_reason()
    }

    /// Returns true if the code is in the 4xx family.
    pub fn is_client_error(self) -> bool {
        (400..500).contains(&self.0)
    }

    /// Returns true if the code is in the 5xx family.
    pub fn is_server_error(self) -> bool {
        (500..600).contains(&self.0)
    }
}

#[cfg(test)]
impl From<u16> for HttpCode {
    /// Creates a new code from a hardcoded number, which must be valid.
    fn from(code: u16) -> Self {
        HttpCode::new(code).expect("Hardcoded codes must be valid")
    }
}

impl fmt::Display for HttpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for HttpCode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<u16>() {
            Ok(code) => HttpCode::new(code),
            Err(e) => Err(ModelError(format!("Invalid status code '{}': {}", s, e))),
        }
    }
}

/// A deserialization visitor for an `HttpCode`.
struct HttpCodeVisitor;

impl Visitor<'_> for HttpCodeVisitor {
    type Value = HttpCode;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an HTTP status code between 100 and 599")
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        match u16::try_from(v) {
            Ok(code) => HttpCode::new(code).map_err(|e| E::custom(e.to_string())),
            Err(_) => Err(E::custom(format!("Status code {} is out of range", v))),
        }
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        match u64::try_from(v) {
            Ok(v) => self.visit_u64(v),
            Err(_) => Err(E::custom(format!("Status code {} is out of range", v))),
        }
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        HttpCode::from_str(v).map_err(|e| E::custom(e.to_string()))
    }
}

impl<'de> Deserialize<'de> for HttpCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(HttpCodeVisitor)
    }
}
