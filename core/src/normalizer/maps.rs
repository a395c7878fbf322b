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

//! Read-only tables that map fault kinds to status codes and messages.

use crate::model::{HttpCode, KindName, ModelError};
use crate::normalizer::template::Template;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;

/// How to compute the message of faults of a given kind.
#[derive(Clone, Debug, PartialEq)]
pub enum MessageRule {
    /// Show the fault's own message to the client.
    Expose,

    /// Render the given template.
    Template(Template),
}

/// Configuration representation of a `MessageRule`: `true` to expose or a template string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawMessageRule {
    /// Whether to expose the fault's own message.
    Flag(bool),

    /// Template source.
    Text(String),
}

impl RawMessageRule {
    /// Converts the raw rule into a `MessageRule`.  A `false` flag yields no rule at all.
    fn into_rule(self) -> Result<Option<MessageRule>, ModelError> {
        match self {
            RawMessageRule::Flag(true) => Ok(Some(MessageRule::Expose)),
            RawMessageRule::Flag(false) => Ok(None),
            RawMessageRule::Text(text) => Ok(Some(MessageRule::Template(Template::parse(text)?))),
        }
    }
}

/// Mapping of fault kinds to status codes.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct CodesMap(BTreeMap<KindName, HttpCode>);

impl CodesMap {
    /// Creates a new table from `entries`.
    pub fn new<I: IntoIterator<Item = (KindName, HttpCode)>>(entries: I) -> Self {
        Self(entries.into_iter().collect())
    }

    /// Returns the code for the kind called `name`, if any.
    pub fn resolve(&self, name: &str) -> Option<HttpCode> {
        self.0.get(name).copied()
    }

    /// Returns true if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for CodesMap {
    type Err = String;

    /// Parses a table in the `Kind=404,OtherKind=409` format.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut entries = BTreeMap::default();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, code) = split_entry(entry)?;
            let code = HttpCode::from_str(code).map_err(|e| format!("{} in '{}'", e, entry))?;
            entries.insert(name, code);
        }
        Ok(Self(entries))
    }
}

/// Mapping of fault kinds to message rules.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessagesMap(BTreeMap<KindName, MessageRule>);

impl MessagesMap {
    /// Creates a new table from `entries`.
    pub fn new<I: IntoIterator<Item = (KindName, MessageRule)>>(entries: I) -> Self {
        Self(entries.into_iter().collect())
    }

    /// Returns the message rule for the kind called `name`, if any.
    pub fn resolve(&self, name: &str) -> Option<&MessageRule> {
        self.0.get(name)
    }

    /// Returns true if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for MessagesMap {
    /// Deserializes a table, dropping entries explicitly set to `false`.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = BTreeMap::<KindName, RawMessageRule>::deserialize(deserializer)?;
        let mut entries = BTreeMap::default();
        for (name, raw) in raw {
            let rule = raw.into_rule().map_err(|e| {
                serde::de::Error::custom(format!("Invalid message rule for {}: {}", name, e))
            })?;
            if let Some(rule) = rule {
                entries.insert(name, rule);
            }
        }
        Ok(Self(entries))
    }
}

impl FromStr for MessagesMap {
    type Err = String;

    /// Parses a table in the `Kind=true;OtherKind=Some template {field}` format.
    ///
    /// Templates cannot contain semicolons in this format.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut entries = BTreeMap::default();
        for entry in s.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, text) = split_entry(entry)?;
            match text {
                "true" => {
                    entries.insert(name, MessageRule::Expose);
                }
                "false" => (),
                text => {
                    let template =
                        Template::parse(text).map_err(|e| format!("{} in '{}'", e, entry))?;
                    entries.insert(name, MessageRule::Template(template));
                }
            }
        }
        Ok(Self(entries))
    }
}

/// Splits a `name=value` table entry, validating the name.
fn split_entry(entry: &str) -> Result<(KindName, &str), String> {
    let Some((name, value)) = entry.split_once('=') else {
        return Err(format!("Missing '=' in table entry '{}'", entry));
    };
    let name = KindName::new(name.trim()).map_err(|e| format!("{} in '{}'", e, entry))?;
    Ok((name, value.trim()))
}
