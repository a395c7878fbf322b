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

//! API to get the value of a key as a number.

use crate::driver::Driver;
use crate::model::Key;
use axum::Json;
use axum::extract::{Path, State};
use restfault_core::rest::{EmptyBody, RestResult};

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Path(key): Path<String>,
    _: EmptyBody,
) -> RestResult<Json<i64>> {
    let key = Key::new(key)?;
    let number = driver.get_key_number(&key).await?;
    Ok(Json(number))
}
