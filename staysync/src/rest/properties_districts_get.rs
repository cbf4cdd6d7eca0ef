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

//! API to list the districts of a city that have properties.

use crate::driver::Driver;
use crate::model::City;
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;
use staysync_core::model::FieldErrors;
use staysync_core::rest::{ApiResponse, EmptyBody, QueryParams, RestError, RestResult};

/// Query parameters accepted by this API.
#[derive(Default, Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub(crate) struct Query {
    /// City to list the districts of.
    city: Option<String>,
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    QueryParams(query): QueryParams<Query>,
    _: EmptyBody,
) -> RestResult<impl IntoResponse> {
    let city = match query.city {
        Some(city) if !city.trim().is_empty() => City::new(city)
            .map_err(|e| RestError::Validation(FieldErrors::single("city", e.0)))?,
        _ => return Err(RestError::invalid_request("CITY_REQUIRED", "City is required")),
    };
    let districts = driver.list_districts(city).await?;
    Ok(ApiResponse::new(districts))
}
