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

//! Entry point to the sample service.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

use restfault_core::env::{get_optional_var, get_required_var};
use restfault_core::normalizer::FaultOptions;
use restfault_example::serve;
use std::net::Ipv4Addr;

#[tokio::main]
async fn main() {
    env_logger::init();

    let port = get_optional_var::<u16>("EXAMPLE", "PORT").unwrap().unwrap_or(3000);
    let addr = (Ipv4Addr::LOCALHOST, port);

    let admin_token = get_required_var::<String>("EXAMPLE", "ADMIN_TOKEN").unwrap();
    let options = FaultOptions::from_env("EXAMPLE_FAULTS").unwrap();

    serve(addr, options, admin_token).await.unwrap()
}
