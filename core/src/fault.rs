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

//! Faults raised while handling a request.
//!
//! A `Fault` is a plain value: handlers return `Result<T, Fault>` and let the `?` operator float
//! failures up to the REST layer, where the normalizer turns them into a response.  Failures from
//! other crates become faults via `Fault::from_error`, which snapshots everything the normalizer
//! may later need (message, cause chain, origin) so that the original error does not have to
//! outlive the request.

use crate::model::{HttpCode, KindName, ModelError};
use std::any::Any;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{self, Write};
use std::panic::Location;

/// Maximum number of nested causes recorded for a fault.
pub(crate) const MAX_CAUSES: usize = 16;

/// Classification of a fault.
///
/// Every variant other than `Other` has an intrinsic status code.  `Other` covers all faults that
/// the application did not anticipate and is only ever exposed via the configured tables.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FaultKind {
    /// Indicates an authorization problem.
    AccessDenied,

    /// Indicates that the request conflicts with the current state of the target.
    Conflict,

    /// Catch-all for unexpected errors detected by the application itself.
    Internal,

    /// Indicates an error in the contents of the request.
    InvalidRequest,

    /// Indicates that the route exists but not for the requested method.
    MethodNotAllowed,

    /// Indicates insufficient disk quota to perform the requested write operation.
    NoSpace,

    /// Indicates that none of the acceptable response formats can be produced.
    NotAcceptable,

    /// Indicates that a requested entity does not exist.
    NotFound,

    /// Indicates that a request that should have empty content did not.
    PayloadNotEmpty,

    /// Indicates an authentication problem.
    Unauthorized {
        /// Expected authorization scheme.
        scheme: &'static str,

        /// Expected authorization realm.
        realm: &'static str,
    },

    /// Indicates that the request body is in a format we cannot decode.
    UnsupportedMediaType,

    /// Indicates that the request was well-formed but its values are not acceptable.
    ValidationFailed,

    /// Any other fault, identified only by its name.
    Other(KindName),
}

impl FaultKind {
    /// Returns the name of the kind, which is the key used to look it up in the tables.
    pub fn name(&self) -> &str {
        match self {
            FaultKind::AccessDenied => "AccessDenied",
            FaultKind::Conflict => "Conflict",
            FaultKind::Internal => "Internal",
            FaultKind::InvalidRequest => "InvalidRequest",
            FaultKind::MethodNotAllowed => "MethodNotAllowed",
            FaultKind::NoSpace => "NoSpace",
            FaultKind::NotAcceptable => "NotAcceptable",
            FaultKind::NotFound => "NotFound",
            FaultKind::PayloadNotEmpty => "PayloadNotEmpty",
            FaultKind::Unauthorized { .. } => "Unauthorized",
            FaultKind::UnsupportedMediaType => "UnsupportedMediaType",
            FaultKind::ValidationFailed => "ValidationFailed",
            FaultKind::Other(name) => name.as_str(),
        }
    }

    /// Returns the status code that this kind maps to in the absence of configuration.
    ///
    /// `ValidationFailed` is special: its code is configurable and the value returned here is only
    /// the default for that setting.
    pub fn intrinsic_code(&self) -> Option<HttpCode> {
        let code = match self {
            FaultKind::AccessDenied => 403,
            FaultKind::Conflict => 409,
            FaultKind::Internal => 500,
            FaultKind::InvalidRequest => 400,
            FaultKind::MethodNotAllowed => 405,
            FaultKind::NoSpace => 507,
            FaultKind::NotAcceptable => 406,
            FaultKind::NotFound => 404,
            FaultKind::PayloadNotEmpty => 413,
            FaultKind::Unauthorized { .. } => 401,
            FaultKind::UnsupportedMediaType => 415,
            FaultKind::ValidationFailed => 400,
            FaultKind::Other(_) => return None,
        };
        HttpCode::new(code).ok()
    }

    /// Returns true if faults of this kind carry messages written for the client.
    ///
    /// These are the kinds with an intrinsic 4xx code: the client caused them and needs to know
    /// what to fix.
    pub fn is_public(&self) -> bool {
        self.intrinsic_code().map(HttpCode::is_client_error).unwrap_or(false)
    }
}

/// A failure raised while processing a request.
#[derive(Clone, Debug)]
pub struct Fault {
    /// Classification of the fault.
    kind: FaultKind,

    /// The fault's own diagnostic message.  May contain internal details.
    message: String,

    /// Named values that message templates can refer to.
    fields: BTreeMap<String, String>,

    /// Messages of the nested causes of the fault, outermost first.
    causes: Vec<String>,

    /// Source location where the fault was raised.
    location: &'static Location<'static>,

    /// Whether inspecting the original error failed while capturing it.
    malformed: bool,
}

impl Fault {
    /// Creates a new fault of `kind` with a diagnostic `message`.
    #[track_caller]
    pub fn new<S: Into<String>>(kind: FaultKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
            fields: BTreeMap::default(),
            causes: vec![],
            location: Location::caller(),
            malformed: false,
        }
    }

    /// Creates an `AccessDenied` fault.
    #[track_caller]
    pub fn access_denied<S: Into<String>>(message: S) -> Self {
        Self::new(FaultKind::AccessDenied, format!("Access denied: {}", message.into()))
    }

    /// Creates a `Conflict` fault.
    #[track_caller]
    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::new(FaultKind::Conflict, message)
    }

    /// Creates an `Internal` fault.
    #[track_caller]
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(FaultKind::Internal, message)
    }

    /// Creates an `InvalidRequest` fault.
    #[track_caller]
    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Self::new(FaultKind::InvalidRequest, message)
    }

    /// Creates a `NoSpace` fault.
    #[track_caller]
    pub fn no_space<S: Into<String>>(message: S) -> Self {
        Self::new(FaultKind::NoSpace, message)
    }

    /// Creates a `NotFound` fault.
    #[track_caller]
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(FaultKind::NotFound, message)
    }

    /// Creates a `PayloadNotEmpty` fault.
    #[track_caller]
    pub fn payload_not_empty() -> Self {
        Self::new(FaultKind::PayloadNotEmpty, "Content should be empty")
    }

    /// Creates an `Unauthorized` fault for the given authentication `scheme` and `realm`.
    #[track_caller]
    pub fn unauthorized<S: Into<String>>(
        scheme: &'static str,
        realm: &'static str,
        message: S,
    ) -> Self {
        Self::new(
            FaultKind::Unauthorized { scheme, realm },
            format!("Unauthorized: {}", message.into()),
        )
    }

    /// Creates a `ValidationFailed` fault.
    #[track_caller]
    pub fn validation_failed<S: Into<String>>(message: S) -> Self {
        Self::new(FaultKind::ValidationFailed, message)
    }

    /// Creates a fault of an application-specific kind called `name`.
    #[track_caller]
    pub fn other<S: Into<String>>(name: KindName, message: S) -> Self {
        Self::new(FaultKind::Other(name), message)
    }

    /// Captures an arbitrary error `e` as a fault.
    ///
    /// The kind is named after the type of `e` (`ParseIntError` for `std::num::ParseIntError`)
    /// and the causes are collected from its `source` chain.  If `e` is already a `Fault`, it is
    /// returned unchanged.
    #[track_caller]
    pub fn from_error<E: Error + 'static>(e: &E) -> Self {
        if let Some(fault) = (e as &dyn Any).downcast_ref::<Fault>() {
            return fault.clone();
        }
        let name = KindName::from_type_name(std::any::type_name::<E>());
        Self::capture(name, e)
    }

    /// Captures a type-erased error `e` as a fault.
    ///
    /// Type erasure hides the concrete type name, so unless `e` is a `Fault`, the kind is named
    /// `Error`.
    #[track_caller]
    pub fn from_dyn_error(e: &(dyn Error + 'static)) -> Self {
        if let Some(fault) = e.downcast_ref::<Fault>() {
            return fault.clone();
        }
        Self::capture(None, e)
    }

    /// Snapshots the message and causes of `e` into a new fault named `name`.
    #[track_caller]
    fn capture(name: Option<KindName>, e: &(dyn Error + 'static)) -> Self {
        let name = name.unwrap_or_else(KindName::generic_error);

        let mut malformed = false;
        let message = match render(e) {
            Ok(message) => message,
            Err(_) => {
                malformed = true;
                String::new()
            }
        };

        let mut causes = vec![];
        let mut next = e.source();
        while let Some(cause) = next {
            if causes.len() == MAX_CAUSES {
                break;
            }
            match render(cause) {
                Ok(message) => causes.push(message),
                Err(_) => {
                    malformed = true;
                    break;
                }
            }
            next = cause.source();
        }

        let mut fault = Self::new(FaultKind::Other(name), message);
        fault.causes = causes;
        fault.malformed = malformed;
        fault
    }

    /// Attaches a named `value` to the fault for use in message templates.
    pub fn with_field<K: Into<String>, V: fmt::Display>(mut self, name: K, value: V) -> Self {
        self.fields.insert(name.into(), value.to_string());
        self
    }

    /// Appends a nested cause to the fault.
    pub fn with_cause<S: Into<String>>(mut self, message: S) -> Self {
        if self.causes.len() < MAX_CAUSES {
            self.causes.push(message.into());
        }
        self
    }

    /// Returns the classification of the fault.
    pub fn kind(&self) -> &FaultKind {
        &self.kind
    }

    /// Returns the fault's own diagnostic message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the value of the field `name`, if any.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Returns all fields attached to the fault.
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Returns the messages of the nested causes, outermost first.
    pub fn causes(&self) -> &[String] {
        &self.causes
    }

    /// Returns the source location where the fault was raised.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Returns true if the fault could not be fully inspected when it was captured.
    pub fn is_malformed(&self) -> bool {
        self.malformed
    }
}

/// Formats `e` into a string without panicking if its `Display` implementation fails.
fn render(e: &dyn Error) -> Result<String, fmt::Error> {
    let mut message = String::new();
    write!(message, "{}", e)?;
    Ok(message)
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for Fault {}

impl From<fmt::Error> for Fault {
    #[track_caller]
    fn from(e: fmt::Error) -> Self {
        Fault::internal(e.to_string())
    }
}

impl From<ModelError> for Fault {
    #[track_caller]
    fn from(e: ModelError) -> Self {
        Fault::validation_failed(e.to_string())
    }
}

impl From<serde_json::Error> for Fault {
    #[track_caller]
    fn from(e: serde_json::Error) -> Self {
        Fault::invalid_request(e.to_string())
    }
}
