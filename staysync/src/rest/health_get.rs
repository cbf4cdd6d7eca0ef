// StaySync
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

//! API to check the liveness of the service.

use crate::driver::Driver;
use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use staysync_core::rest::{EmptyBody, RestError, RestResult};
use time::format_description::well_known::Rfc3339;

/// Message returned when the service is healthy.
const HEALTHY: &str = "StaySync API is running";

/// Health report.
#[derive(Deserialize, Serialize)]
#[cfg_attr(test, derive(Debug, PartialEq))]
pub(crate) struct Response {
    /// Always `OK` when a response is produced.
    status: String,

    /// Human-readable description of the status.
    message: String,

    /// Time of the check in RFC 3339 format.
    timestamp: String,

    /// Version of the service.
    version: String,
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    _: EmptyBody,
) -> RestResult<impl IntoResponse> {
    let now = driver.ping().await?;
    let timestamp = now.format(&Rfc3339).map_err(|e| RestError::InternalError(e.to_string()))?;
    Ok(Json(Response {
        status: "OK".to_owned(),
        message: HEALTHY.to_owned(),
        timestamp,
        version: env!("CARGO_PKG_VERSION").to_owned(),
    }))
}
