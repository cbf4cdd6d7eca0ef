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

//! API to check whether several properties are free for the same stay.

use crate::driver::Driver;
use crate::model::{DateRange, PropertyId, parse_date};
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;
use staysync_core::model::{FieldErrors, ModelError, ModelResult};
use staysync_core::rest::{ApiResponse, JsonBody, RestResult};
use std::collections::HashSet;

/// Maximum number of properties that can be checked at once.
const MAX_PROPERTIES: usize = 20;

/// Untrusted contents of a batch availability request.
#[derive(Default, Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub(crate) struct Request {
    /// Properties to check.
    property_ids: Option<Vec<i64>>,

    /// First night of the stay.
    check_in: Option<String>,

    /// Departure day.
    check_out: Option<String>,
}

/// Validates a list of distinct property identifiers.
fn parse_property_ids(raw: Vec<i64>) -> ModelResult<Vec<PropertyId>> {
    if raw.is_empty() || raw.len() > MAX_PROPERTIES {
        return Err(ModelError(format!(
            "property_ids must contain between 1 and {} properties",
            MAX_PROPERTIES
        )));
    }
    let mut seen = HashSet::with_capacity(raw.len());
    let mut ids = Vec::with_capacity(raw.len());
    for id in raw {
        if !seen.insert(id) {
            return Err(ModelError(format!("property_ids contains {} more than once", id)));
        }
        ids.push(PropertyId::new(id)?);
    }
    Ok(ids)
}

impl Request {
    /// Validates all fields of the request.
    fn into_query(self) -> Result<(Vec<PropertyId>, DateRange), FieldErrors> {
        let mut errors = FieldErrors::default();
        let property_ids = errors.required("property_ids", self.property_ids, parse_property_ids);
        let check_in = errors.required("check_in", self.check_in, |s| parse_date("check_in", s));
        let check_out =
            errors.required("check_out", self.check_out, |s| parse_date("check_out", s));
        let range = match (check_in, check_out) {
            (Some(check_in), Some(check_out)) => {
                errors.optional("check_out", Some((check_in, check_out)), |(i, o)| {
                    DateRange::new(i, o)
                })
            }
            _ => None,
        };

        match (property_ids, range) {
            (Some(property_ids), Some(range)) if errors.is_empty() => Ok((property_ids, range)),
            _ => Err(errors),
        }
    }
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    JsonBody(request): JsonBody<Request>,
) -> RestResult<impl IntoResponse> {
    let (property_ids, range) = request.into_query()?;
    let availability = driver.check_availability(property_ids, range).await?;
    Ok(ApiResponse::new(availability))
}
