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

//! Configuration of the fault normalization layer.

use crate::env::get_optional_var;
use crate::model::HttpCode;
use crate::normalizer::maps::{CodesMap, MessagesMap};
use derivative::Derivative;
use serde::Deserialize;
use std::str::FromStr;

/// Message used for faults whose details must not reach the client.
pub const DEFAULT_GENERIC_MESSAGE: &str = "An error occurred";

/// Strategy to compute the message of faults that cannot be shown to the client.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// Use the configured generic message.
    #[default]
    Generic,

    /// Use the standard reason phrase of the status code, like "Internal Server Error".
    StatusText,
}

impl FromStr for Fallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generic" => Ok(Fallback::Generic),
            "status_text" => Ok(Fallback::StatusText),
            s => Err(format!("Unknown fallback '{}'; must be generic or status_text", s)),
        }
    }
}

/// Options to configure fault normalization and the listener that applies it.
#[derive(Clone, Deserialize, Derivative)]
#[derivative(Debug, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FaultOptions {
    /// Whether the listener rewrites fault responses at all.
    #[derivative(Default(value = "true"))]
    pub enabled: bool,

    /// Whether to expose fault internals to clients.  Never enable in production.
    pub debug: bool,

    /// Status codes for specific fault kinds.
    pub codes: CodesMap,

    /// Message rules for specific fault kinds.
    pub messages: MessagesMap,

    /// Status code for `ValidationFailed` faults not listed in `codes`.
    #[derivative(Default(value = "HttpCode::BAD_REQUEST"))]
    pub failed_validation: HttpCode,

    /// How to compute messages that cannot be shown.
    pub fallback: Fallback,

    /// Message to use for faults that cannot be shown when `fallback` is `Generic`.
    #[derivative(Default(value = "DEFAULT_GENERIC_MESSAGE.to_owned()"))]
    pub generic_message: String,
}

impl FaultOptions {
    /// Initializes a set of options from environment variables whose name is prefixed with the
    /// given `prefix`.
    ///
    /// This will use variables such as `<prefix>_ENABLED`, `<prefix>_DEBUG`, `<prefix>_CODES`,
    /// `<prefix>_MESSAGES`, `<prefix>_FAILED_VALIDATION`, `<prefix>_FALLBACK` and
    /// `<prefix>_GENERIC_MESSAGE`.  All of them are optional.
    pub fn from_env(prefix: &str) -> Result<FaultOptions, String> {
        let defaults = FaultOptions::default();
        let options = FaultOptions {
            enabled: get_optional_var::<bool>(prefix, "ENABLED")?.unwrap_or(defaults.enabled),
            debug: get_optional_var::<bool>(prefix, "DEBUG")?.unwrap_or(defaults.debug),
            codes: get_optional_var::<CodesMap>(prefix, "CODES")?.unwrap_or(defaults.codes),
            messages: get_optional_var::<MessagesMap>(prefix, "MESSAGES")?
                .unwrap_or(defaults.messages),
            failed_validation: get_optional_var::<HttpCode>(prefix, "FAILED_VALIDATION")?
                .unwrap_or(defaults.failed_validation),
            fallback: get_optional_var::<Fallback>(prefix, "FALLBACK")?
                .unwrap_or(defaults.fallback),
            generic_message: get_optional_var::<String>(prefix, "GENERIC_MESSAGE")?
                .unwrap_or(defaults.generic_message),
        };
        options.validate()?;
        Ok(options)
    }

    /// Checks that the options are consistent.
    pub fn validate(&self) -> Result<(), String> {
        if self.generic_message.trim().is_empty() {
            return Err("Generic message cannot be empty".to_owned());
        }
        Ok(())
    }
}
