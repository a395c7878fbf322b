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

//! High-level data types.

use derive_more::{AsRef, Display};
use restfault_core::model::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};

/// Maximum length of a key.
const MAX_KEY_LENGTH: usize = 64;

/// Newtype pattern for the keys of our key/value store.
#[derive(AsRef, Clone, Debug, Display, Eq, Ord, PartialEq, PartialOrd)]
#[as_ref(str)]
pub(crate) struct Key(String);

impl Key {
    /// Creates a new key from an untrusted string `s`, making sure it is valid.
    pub(crate) fn new<S: Into<String>>(s: S) -> ModelResult<Self> {
        let s = s.into();

        if s.is_empty() {
            return Err(ModelError("Key cannot be empty".to_owned()));
        }
        if s.len() > MAX_KEY_LENGTH {
            return Err(ModelError(format!("Key is longer than {} characters", MAX_KEY_LENGTH)));
        }
        if let Some(ch) = s.chars().find(|ch| !(ch.is_ascii_alphanumeric() || "-_.".contains(*ch))) {
            return Err(ModelError(format!("Unsupported character '{}' in key '{}'", ch, s)));
        }

        Ok(Self(s))
    }
}

/// A key's current version number.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub(crate) struct Version(u32);

impl Version {
    /// Returns the initial version assigned to new keys.
    pub(crate) fn initial() -> Version {
        Version(1)
    }

    /// Returns the next version to assign to an existing key.
    pub(crate) fn next(self) -> Version {
        Version(self.0.saturating_add(1))
    }
}

/// A value stored in the key/value store along with its version.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub(crate) struct Entry {
    /// The stored value.
    pub(crate) value: String,

    /// Version of the value.
    pub(crate) version: Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ok() {
        assert_eq!("foo", Key::new("foo").unwrap().as_ref());
        assert_eq!("a-b_c.9", Key::new("a-b_c.9").unwrap().as_ref());
        assert!(Key::new("x".repeat(MAX_KEY_LENGTH)).is_ok());
    }

    #[test]
    fn test_key_error() {
        assert_eq!(ModelError("Key cannot be empty".to_owned()), Key::new("").unwrap_err());
        assert_eq!(
            ModelError("Unsupported character ' ' in key 'a b'".to_owned()),
            Key::new("a b").unwrap_err()
        );
        assert!(Key::new("x".repeat(MAX_KEY_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_version_next() {
        assert_eq!(Version(2), Version::initial().next());
        assert_eq!(Version(u32::MAX), Version(u32::MAX).next());
    }
}
