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

//! API to analyze the behavior of guests.

use crate::driver::{Driver, GuestQuery};
use crate::model::{GuestSort, Page};
use crate::rest::date_window;
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;
use staysync_core::model::{FieldErrors, ModelError, ModelResult};
use staysync_core::rest::{ApiResponse, EmptyBody, Pagination, QueryParams, RestResult};

/// Query parameters accepted by this API.
#[derive(Default, Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub(crate) struct Query {
    /// Earliest check-in date.
    start_date: Option<String>,

    /// Latest check-out date.
    end_date: Option<String>,

    /// Minimum number of bookings a guest needs to be listed.
    min_bookings: Option<i64>,

    /// Metric to rank guests by.
    sort_by: Option<String>,

    /// Page to return.
    page: Option<i64>,

    /// Number of guests per page.
    limit: Option<i64>,
}

/// Validates the minimum number of bookings of a listed guest.
fn parse_min_bookings(n: i64) -> ModelResult<i64> {
    if n < 1 {
        return Err(ModelError("min_bookings must be a positive integer".to_owned()));
    }
    Ok(n)
}

impl Query {
    /// Validates all parameters.
    fn into_query(self) -> Result<GuestQuery, FieldErrors> {
        let mut errors = FieldErrors::default();
        let query = GuestQuery {
            window: date_window(&mut errors, self.start_date, self.end_date),
            min_bookings: errors.optional("min_bookings", self.min_bookings, parse_min_bookings),
            sort_by: errors.optional("sort_by", self.sort_by, |s| GuestSort::parse(&s)),
            page: Page::validate(&mut errors, self.page, self.limit),
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
    let page = query.page;
    let (analysis, total) = driver.get_guest_analysis(query).await?;
    let pagination = Pagination::new(page.page(), page.limit(), total);
    Ok(ApiResponse::new(analysis).with_pagination(pagination))
}
