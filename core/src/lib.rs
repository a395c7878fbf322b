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

//! Translation of failures into REST error responses.
//!
//! Services built on top of this crate raise `Fault`s from their handlers and let this crate
//! decide what the client gets to see.  The crate is organized in layers, bottom to top:
//!
//! 1.  `model`: Validated data types, such as status codes and fault kind names.
//!
//! 1.  `fault`: The `Fault` value that handlers raise, classified by a `FaultKind`.
//!
//! 1.  `normalizer`: The logic that turns a fault into a `FaultRecord` with a status code, a message
//!     that is safe to show, and diagnostic details in debug mode only.  The rules come from
//!     read-only tables that are configured once at startup.
//!
//! 1.  `rest`: The HTTP layer, offering `IntoResponse` for faults and a `FaultListener` that
//!     applies the configured normalizer to every response of an `axum::Router`.
//!
//! Errors can transparently float to the top of the app using the `?` operator, being translated to
//! HTTP status codes once returned from the REST layer.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

pub mod env;
pub mod fault;
pub mod model;
pub mod normalizer;
pub mod rest;
