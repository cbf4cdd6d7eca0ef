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

//! API to rank properties by how well they perform.

use crate::driver::{Driver, PerformanceQuery};
use crate::model::{Page, PerformanceSort, SortOrder};
use crate::rest::{date_window, paginated};
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;
use staysync_core::model::FieldErrors;
use staysync_core::rest::{EmptyBody, QueryParams, RestResult};

/// Query parameters accepted by this API.
#[derive(Default, Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub(crate) struct Query {
    /// Earliest check-in date.
    start_date: Option<String>,

    /// Latest check-out date.
    end_date: Option<String>,

    /// Page to return.
    page: Option<i64>,

    /// Number of properties per page.
    limit: Option<i64>,

    /// Metric to rank properties by.
    sort_by: Option<String>,

    /// Direction of the ranking.
    sort_order: Option<String>,
}

impl Query {
    /// Validates all parameters.
    fn into_query(self) -> Result<PerformanceQuery, FieldErrors> {
        let mut errors = FieldErrors::default();
        let query = PerformanceQuery {
            window: date_window(&mut errors, self.start_date, self.end_date),
            page: Page::validate(&mut errors, self.page, self.limit),
            sort_by: errors.optional("sort_by", self.sort_by, |s| PerformanceSort::parse(&s)),
            sort_order: errors.optional("sort_order", self.sort_order, |s| SortOrder::parse(&s)),
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
    let performance = driver.get_property_performance(query).await?;
    Ok(paginated(page, performance))
}
