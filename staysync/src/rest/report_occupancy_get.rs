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

//! API to report the occupancy of the properties.

use crate::driver::{Driver, OccupancyQuery};
use crate::model::{Granularity, PropertyId};
use crate::rest::date_window;
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;
use staysync_core::model::FieldErrors;
use staysync_core::rest::{ApiResponse, EmptyBody, QueryParams, RestResult};

/// Query parameters accepted by this API.
#[derive(Default, Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub(crate) struct Query {
    /// Length of the periods to group bookings in.
    group_by: Option<String>,

    /// Property to restrict the report to.
    property_id: Option<i64>,

    /// Earliest check-in date.
    start_date: Option<String>,

    /// Latest check-out date.
    end_date: Option<String>,
}

impl Query {
    /// Validates all parameters.
    fn into_query(self) -> Result<OccupancyQuery, FieldErrors> {
        let mut errors = FieldErrors::default();
        let query = OccupancyQuery {
            group_by: errors.optional("group_by", self.group_by, |s| Granularity::parse(&s)),
            property_id: errors.optional("property_id", self.property_id, PropertyId::new),
            window: date_window(&mut errors, self.start_date, self.end_date),
        };
        errors.finish()?;
        Ok(query)
    }
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    QueryParams(query): QueryParams<Query>,
    _: EmptyBody,
) -> RestResult<impl IntoResponse> {
    let query = query.into_query()?;
    let report = driver.get_occupancy_report(query).await?;
    Ok(ApiResponse::new(report))
}
