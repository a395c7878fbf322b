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

//! Translation of faults into canonical, serializable error records.
//!
//! The normalizer decides three things for every fault: the status code, the message and whether
//! diagnostic details are attached.  The code comes from the explicit override in the context, then
//! the codes table, then the kind itself, and finally defaults to 500.  The message comes from the
//! messages table, then from the fault itself if its kind is public or if debug mode is on, and
//! otherwise from a generic fallback that reveals nothing about the fault.  Details are attached in
//! debug mode only.
//!
//! Normalization never fails.  Faults that cannot be inspected, or whose configured template cannot
//! be rendered, degrade to the generic message.

use crate::fault::{Fault, FaultKind};
use crate::model::HttpCode;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;

mod maps;
pub use maps::{CodesMap, MessageRule, MessagesMap};
mod options;
pub use options::{DEFAULT_GENERIC_MESSAGE, Fallback, FaultOptions};
mod template;
pub use template::{Template, TemplateError};

/// Per-failure inputs to normalization.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FaultContext {
    /// Status code that was already decided by the caller.  Takes precedence over everything.
    pub status_code: Option<HttpCode>,

    /// Whether fault internals may be exposed.
    pub debug: bool,
}

impl FaultContext {
    /// Returns a copy of this context with an explicit status `code`.
    pub fn with_status_code(mut self, code: HttpCode) -> Self {
        self.status_code = Some(code);
        self
    }
}

/// Diagnostic information about a fault, only emitted in debug mode.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FaultDetail {
    /// Name of the fault kind.
    pub kind: String,

    /// The fault's own message, unfiltered.
    pub message: String,

    /// Messages of the nested causes, outermost first.
    pub causes: Vec<String>,

    /// Source location where the fault was raised, as `file:line:column`.
    pub location: String,

    /// Named values attached to the fault.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl From<&Fault> for FaultDetail {
    fn from(fault: &Fault) -> Self {
        let location = fault.location();
        Self {
            kind: fault.kind().name().to_owned(),
            message: fault.message().to_owned(),
            causes: fault.causes().to_vec(),
            location: format!("{}:{}:{}", location.file(), location.line(), location.column()),
            fields: fault.fields().clone(),
        }
    }
}

/// Canonical representation of a fault, ready to be serialized into a response.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FaultRecord {
    /// Status code of the response.
    pub code: HttpCode,

    /// Human-readable summary, safe to show to the client.  Never empty.
    pub message: String,

    /// Diagnostic information, only present in debug mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<FaultDetail>,
}

#[cfg(test)]
thread_local! {
    /// Number of faults normalized by the current thread.
    pub(crate) static NORMALIZATIONS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

/// Converts faults into `FaultRecord`s according to read-only mapping tables.
#[derive(Debug)]
pub struct FaultNormalizer {
    /// Status codes for specific fault kinds.
    codes: CodesMap,

    /// Message rules for specific fault kinds.
    messages: MessagesMap,

    /// Status code for `ValidationFailed` faults not listed in `codes`.
    failed_validation: HttpCode,

    /// How to compute messages that cannot be shown.
    fallback: Fallback,

    /// Message to use for faults that cannot be shown when `fallback` is `Generic`.
    generic_message: String,

    /// Default value of `FaultContext::debug` for contexts created by this normalizer.
    debug: bool,
}

impl Default for FaultNormalizer {
    fn default() -> Self {
        Self::new(FaultOptions::default())
    }
}

impl FaultNormalizer {
    /// Creates a new normalizer from `options`.
    ///
    /// An empty generic message in `options` is replaced by the default one so that records never
    /// carry empty messages.
    pub fn new(options: FaultOptions) -> Self {
        let generic_message = if options.generic_message.trim().is_empty() {
            DEFAULT_GENERIC_MESSAGE.to_owned()
        } else {
            options.generic_message
        };
        Self {
            codes: options.codes,
            messages: options.messages,
            failed_validation: options.failed_validation,
            fallback: options.fallback,
            generic_message,
            debug: options.debug,
        }
    }

    /// Returns a new context with no explicit status code and the configured debug flag.
    pub fn context(&self) -> FaultContext {
        FaultContext { status_code: None, debug: self.debug }
    }

    /// Returns true if `fault` is something this normalizer can handle.
    ///
    /// Every error is supported regardless of its concrete type, including unsized ones such as
    /// `dyn Error`: those that are not already `Fault`s are captured on normalization.  Values that
    /// are not errors at all are rejected at compile time.
    pub fn supports<E: Error + ?Sized>(&self, _fault: &E) -> bool {
        true
    }

    /// Normalizes `fault` within `context`.
    pub fn normalize(&self, fault: &Fault, context: &FaultContext) -> FaultRecord {
        #[cfg(test)]
        NORMALIZATIONS.set(NORMALIZATIONS.get() + 1);

        if fault.is_malformed() {
            warn!("Cannot inspect fault of kind {}; using generic message", fault.kind().name());
            return self.degrade(context);
        }

        let code = self.resolve_code(fault, context);
        let message = match self.resolve_message(fault, code, context) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    "Cannot render message for fault of kind {}: {}; using generic message",
                    fault.kind().name(),
                    e
                );
                return self.degrade(context);
            }
        };
        let detail = if context.debug { Some(FaultDetail::from(fault)) } else { None };

        FaultRecord { code, message, detail }
    }

    /// Captures an arbitrary error `e` as a fault and normalizes it within `context`.
    pub fn normalize_error(&self, e: &(dyn Error + 'static), context: &FaultContext) -> FaultRecord {
        self.normalize(&Fault::from_dyn_error(e), context)
    }

    /// Computes the status code for `fault`.
    fn resolve_code(&self, fault: &Fault, context: &FaultContext) -> HttpCode {
        if let Some(code) = context.status_code {
            return code;
        }
        if let Some(code) = self.codes.resolve(fault.kind().name()) {
            return code;
        }
        if *fault.kind() == FaultKind::ValidationFailed {
            return self.failed_validation;
        }
        fault.kind().intrinsic_code().unwrap_or(HttpCode::INTERNAL_SERVER_ERROR)
    }

    /// Computes the client-visible message for `fault`, which resolved to `code`.
    fn resolve_message(
        &self,
        fault: &Fault,
        code: HttpCode,
        context: &FaultContext,
    ) -> Result<String, TemplateError> {
        let candidate = match self.messages.resolve(fault.kind().name()) {
            Some(MessageRule::Template(template)) => {
                let code = code.to_string();
                template.render(|name| match name {
                    "kind" => Some(fault.kind().name()),
                    "code" => Some(code.as_str()),
                    "message" => Some(fault.message()),
                    name => fault.field(name),
                })?
            }
            Some(MessageRule::Expose) => fault.message().to_owned(),
            None if fault.kind().is_public() || context.debug => fault.message().to_owned(),
            None => String::new(),
        };

        if candidate.trim().is_empty() {
            Ok(self.generic_message(code))
        } else {
            Ok(candidate)
        }
    }

    /// Returns the message for faults that cannot be shown, which resolved to `code`.
    fn generic_message(&self, code: HttpCode) -> String {
        match self.fallback {
            Fallback::Generic => self.generic_message.clone(),
            Fallback::StatusText => match code.canonical_reason() {
                Some(reason) => reason.to_owned(),
                None => self.generic_message.clone(),
            },
        }
    }

    /// Returns the record for faults that could not be normalized.
    fn degrade(&self, context: &FaultContext) -> FaultRecord {
        let code = context.status_code.unwrap_or(HttpCode::INTERNAL_SERVER_ERROR);
        FaultRecord { code, message: self.generic_message(code), detail: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KindName;
    use std::fmt;

    /// Returns a context without an explicit status code.
    fn context(debug: bool) -> FaultContext {
        FaultContext { status_code: None, debug }
    }

    /// Creates a fault of an unanticipated kind.
    fn null_pointer_access() -> Fault {
        Fault::other(KindName::from("NullPointerAccess"), "pointer at 0x0 dereferenced in cache.rs")
    }

    /// Creates a normalizer with a few table entries.
    fn mapped_normalizer(debug: bool) -> FaultNormalizer {
        FaultNormalizer::new(FaultOptions {
            debug,
            codes: CodesMap::new([
                (KindName::from("ValidationFailed"), HttpCode::from(400)),
                (KindName::from("Timeout"), HttpCode::from(504)),
            ]),
            messages: MessagesMap::new([
                (
                    KindName::from("ValidationFailed"),
                    MessageRule::Template(Template::parse("Validation failed").unwrap()),
                ),
                (
                    KindName::from("Timeout"),
                    MessageRule::Template(
                        Template::parse("{kind} after {seconds}s ({code})").unwrap(),
                    ),
                ),
                (KindName::from("Conflict"), MessageRule::Expose),
                (KindName::from("Broken"), MessageRule::Template(Template::parse("{nope}").unwrap())),
            ]),
            ..Default::default()
        })
    }

    /// An error whose `Display` implementation always fails.
    #[derive(Debug)]
    struct Unprintable;

    impl fmt::Display for Unprintable {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            Err(fmt::Error)
        }
    }

    impl Error for Unprintable {}

    #[test]
    fn test_scenario_a_mapped_kind() {
        let normalizer = mapped_normalizer(false);
        let fault = Fault::validation_failed("field 'age' must be positive");
        assert_eq!(
            FaultRecord {
                code: HttpCode::from(400),
                message: "Validation failed".to_owned(),
                detail: None
            },
            normalizer.normalize(&fault, &context(false))
        );
    }

    #[test]
    fn test_scenario_b_unmapped_production() {
        let normalizer = mapped_normalizer(false);
        assert_eq!(
            FaultRecord {
                code: HttpCode::from(500),
                message: "An error occurred".to_owned(),
                detail: None
            },
            normalizer.normalize(&null_pointer_access(), &context(false))
        );
    }

    #[test]
    fn test_scenario_c_unmapped_debug() {
        let normalizer = mapped_normalizer(true);
        let fault = null_pointer_access().with_cause("cache miss");
        let record = normalizer.normalize(&fault, &context(true));
        assert_eq!(HttpCode::from(500), record.code);
        assert_eq!("pointer at 0x0 dereferenced in cache.rs", record.message);
        let detail = record.detail.unwrap();
        assert_eq!("NullPointerAccess", detail.kind);
        assert_eq!("pointer at 0x0 dereferenced in cache.rs", detail.message);
        assert_eq!(vec!["cache miss".to_owned()], detail.causes);
        assert!(detail.location.starts_with(file!()), "Bad location {}", detail.location);
    }

    #[test]
    fn test_scenario_d_explicit_code() {
        let normalizer = mapped_normalizer(false);
        let fault = Fault::other(KindName::from("PermissionDenied"), "user 5 lacks role admin");
        let record = normalizer
            .normalize(&fault, &context(false).with_status_code(HttpCode::from(403)));
        assert_eq!(
            FaultRecord {
                code: HttpCode::from(403),
                message: "An error occurred".to_owned(),
                detail: None
            },
            record
        );
    }

    #[test]
    fn test_explicit_code_overrides_everything() {
        let normalizer = mapped_normalizer(false);
        let code = HttpCode::from(418);
        let faults = [
            Fault::validation_failed("bad"),
            Fault::not_found("missing"),
            Fault::other(KindName::from("Timeout"), "slow").with_field("seconds", 3),
            null_pointer_access(),
        ];
        for fault in faults {
            for debug in [false, true] {
                let record =
                    normalizer.normalize(&fault, &context(debug).with_status_code(code));
                assert_eq!(code, record.code);
            }
        }
    }

    #[test]
    fn test_debug_off_never_has_detail() {
        let normalizer = mapped_normalizer(false);
        let faults = [
            Fault::validation_failed("bad"),
            Fault::not_found("missing"),
            Fault::internal("boom"),
            Fault::conflict("busy"),
            Fault::other(KindName::from("Timeout"), "slow").with_field("seconds", 3),
            null_pointer_access(),
        ];
        for fault in faults {
            assert!(normalizer.normalize(&fault, &context(false)).detail.is_none());
        }
    }

    #[test]
    fn test_debug_on_unmapped_uses_raw_message() {
        let normalizer = mapped_normalizer(true);
        let faults = [Fault::internal("boom at line 3"), null_pointer_access()];
        for fault in faults {
            let record = normalizer.normalize(&fault, &context(true));
            assert_eq!(fault.message(), record.message);
            assert!(record.detail.is_some());
        }
    }

    #[test]
    fn test_mapped_template_wins_over_debug() {
        let normalizer = mapped_normalizer(true);
        let record = normalizer.normalize(&Fault::validation_failed("internal"), &context(true));
        assert_eq!("Validation failed", record.message);
        assert_eq!("internal", record.detail.unwrap().message);
    }

    #[test]
    fn test_template_with_fields() {
        let normalizer = mapped_normalizer(false);
        let fault = Fault::other(KindName::from("Timeout"), "db pool exhausted")
            .with_field("seconds", 30);
        assert_eq!(
            FaultRecord {
                code: HttpCode::from(504),
                message: "Timeout after 30s (504)".to_owned(),
                detail: None
            },
            normalizer.normalize(&fault, &context(false))
        );
    }

    #[test]
    fn test_template_missing_field_degrades() {
        let normalizer = mapped_normalizer(true);
        let fault = Fault::other(KindName::from("Timeout"), "db pool exhausted");
        assert_eq!(
            FaultRecord {
                code: HttpCode::from(500),
                message: "An error occurred".to_owned(),
                detail: None
            },
            normalizer.normalize(&fault, &context(true))
        );

        let fault = Fault::other(KindName::from("Broken"), "whatever");
        let record =
            normalizer.normalize(&fault, &context(true).with_status_code(HttpCode::from(409)));
        assert_eq!(HttpCode::from(409), record.code);
        assert_eq!("An error occurred", record.message);
        assert!(record.detail.is_none());
    }

    #[test]
    fn test_expose_rule() {
        let normalizer = mapped_normalizer(false);
        let record = normalizer.normalize(&Fault::conflict("Key foo is locked"), &context(false));
        assert_eq!(HttpCode::from(409), record.code);
        assert_eq!("Key foo is locked", record.message);
    }

    #[test]
    fn test_public_kinds_show_own_message() {
        let normalizer = FaultNormalizer::default();
        let record = normalizer.normalize(&Fault::not_found("Key foo not found"), &context(false));
        assert_eq!(
            FaultRecord {
                code: HttpCode::from(404),
                message: "Key foo not found".to_owned(),
                detail: None
            },
            record
        );

        let fault = Fault::unauthorized("Bearer", "example", "Invalid token");
        let record = normalizer.normalize(&fault, &context(false));
        assert_eq!(HttpCode::from(401), record.code);
        assert_eq!("Unauthorized: Invalid token", record.message);
    }

    #[test]
    fn test_private_kinds_hide_own_message() {
        let normalizer = FaultNormalizer::default();
        let record = normalizer.normalize(&Fault::no_space("/var is full"), &context(false));
        assert_eq!(HttpCode::from(507), record.code);
        assert_eq!("An error occurred", record.message);

        let record = normalizer.normalize(&Fault::internal("SELECT failed"), &context(false));
        assert_eq!(HttpCode::from(500), record.code);
        assert_eq!("An error occurred", record.message);
    }

    #[test]
    fn test_codes_table_overrides_intrinsic_code() {
        let normalizer = FaultNormalizer::new(FaultOptions {
            codes: CodesMap::new([(KindName::from("NotFound"), HttpCode::from(410))]),
            ..Default::default()
        });
        assert_eq!(HttpCode::from(410), normalizer.normalize(&Fault::not_found("x"), &context(false)).code);
    }

    #[test]
    fn test_failed_validation_code() {
        let normalizer = FaultNormalizer::new(FaultOptions {
            failed_validation: HttpCode::from(422),
            ..Default::default()
        });
        let record = normalizer.normalize(&Fault::validation_failed("bad age"), &context(false));
        assert_eq!(HttpCode::from(422), record.code);
        assert_eq!("bad age", record.message);
    }

    #[test]
    fn test_status_text_fallback() {
        let normalizer = FaultNormalizer::new(FaultOptions {
            fallback: Fallback::StatusText,
            codes: CodesMap::new([(KindName::from("Odd"), HttpCode::from(599))]),
            ..Default::default()
        });
        let record = normalizer.normalize(&null_pointer_access(), &context(false));
        assert_eq!("Internal Server Error", record.message);

        let record = normalizer.normalize(&Fault::other(KindName::from("Odd"), "x"), &context(false));
        assert_eq!(HttpCode::from(599), record.code);
        assert_eq!("An error occurred", record.message);
    }

    #[test]
    fn test_custom_generic_message() {
        let normalizer = FaultNormalizer::new(FaultOptions {
            generic_message: "Something went wrong".to_owned(),
            ..Default::default()
        });
        let record = normalizer.normalize(&null_pointer_access(), &context(false));
        assert_eq!("Something went wrong", record.message);

        let normalizer = FaultNormalizer::new(FaultOptions {
            generic_message: "".to_owned(),
            ..Default::default()
        });
        let record = normalizer.normalize(&null_pointer_access(), &context(false));
        assert_eq!(DEFAULT_GENERIC_MESSAGE, record.message);
    }

    #[test]
    fn test_message_never_empty() {
        let normalizer = FaultNormalizer::default();
        for debug in [false, true] {
            let record = normalizer.normalize(&Fault::not_found(""), &context(debug));
            assert_eq!("An error occurred", record.message);
            let record = normalizer
                .normalize(&Fault::other(KindName::from("Blank"), "   "), &context(debug));
            assert_eq!("An error occurred", record.message);
        }
    }

    #[test]
    fn test_malformed_fault_degrades() {
        let normalizer = FaultNormalizer::default();
        let fault = Fault::from_error(&Unprintable);
        for debug in [false, true] {
            assert_eq!(
                FaultRecord {
                    code: HttpCode::from(500),
                    message: "An error occurred".to_owned(),
                    detail: None
                },
                normalizer.normalize(&fault, &context(debug))
            );
        }
    }

    #[test]
    fn test_normalize_error() {
        let normalizer = FaultNormalizer::default();
        let e: Box<dyn Error + Send + Sync> = "12x".parse::<u8>().unwrap_err().into();

        let record = normalizer.normalize_error(e.as_ref(), &context(false));
        assert_eq!(HttpCode::from(500), record.code);
        assert_eq!("An error occurred", record.message);

        let record = normalizer.normalize_error(e.as_ref(), &context(true));
        assert_eq!("invalid digit found in string", record.message);
        assert_eq!("Error", record.detail.unwrap().kind);

        let e: Box<dyn Error> = Box::new(Fault::not_found("gone"));
        let record = normalizer.normalize_error(e.as_ref(), &context(false));
        assert_eq!(HttpCode::from(404), record.code);
        assert_eq!("gone", record.message);
    }

    #[test]
    fn test_idempotent() {
        let normalizer = mapped_normalizer(true);
        let fault = null_pointer_access().with_field("address", "0x0").with_cause("inner");
        let ctx = context(true);
        assert_eq!(normalizer.normalize(&fault, &ctx), normalizer.normalize(&fault, &ctx));
    }

    #[test]
    fn test_supports() {
        let normalizer = FaultNormalizer::default();
        assert!(normalizer.supports(&Fault::internal("x")));
        assert!(normalizer.supports(&"x".parse::<u8>().unwrap_err()));
        assert!(normalizer.supports(&std::io::Error::other("disk on fire")));

        let boxed: Box<dyn Error + Send + Sync> = "x".parse::<u8>().unwrap_err().into();
        assert!(normalizer.supports(&*boxed));
        let boxed: Box<dyn Error + Send> = Box::new(Fault::internal("x"));
        assert!(normalizer.supports(&*boxed));
        let boxed: Box<dyn Error> = Box::new(std::io::Error::other("x"));
        assert!(normalizer.supports(&*boxed));
    }

    #[test]
    fn test_context() {
        assert_eq!(FaultContext { status_code: None, debug: false }, FaultNormalizer::default().context());
        assert!(mapped_normalizer(true).context().debug);
    }

    #[test]
    fn test_normalizer_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FaultNormalizer>();
    }

    #[test]
    fn test_record_serialization() {
        let record = FaultRecord {
            code: HttpCode::from(404),
            message: "Key foo not found".to_owned(),
            detail: None,
        };
        assert_eq!(
            r#"{"code":404,"message":"Key foo not found"}"#,
            serde_json::to_string(&record).unwrap()
        );

        let record = FaultRecord {
            code: HttpCode::from(500),
            message: "boom".to_owned(),
            detail: Some(FaultDetail {
                kind: "Internal".to_owned(),
                message: "boom".to_owned(),
                causes: vec![],
                location: "src/x.rs:1:2".to_owned(),
                fields: BTreeMap::default(),
            }),
        };
        assert_eq!(
            r#"{"code":500,"message":"boom","detail":{"kind":"Internal","message":"boom","causes":[],"location":"src/x.rs:1:2"}}"#,
            serde_json::to_string(&record).unwrap()
        );
    }
}
