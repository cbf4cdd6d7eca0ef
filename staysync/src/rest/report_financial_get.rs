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

//! API to summarize revenue and business tax for tax filings.

use crate::driver::{Driver, FinancialQuery};
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;
use staysync_core::model::{FieldErrors, ModelError, ModelResult};
use staysync_core::rest::{ApiResponse, EmptyBody, QueryParams, RestResult};
use std::ops::RangeInclusive;

/// Years that can be summarized.
const YEARS: RangeInclusive<i64> = 2020..=2030;

/// Query parameters accepted by this API.
#[derive(Default, Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub(crate) struct Query {
    /// Year to summarize.
    year: Option<i64>,

    /// Month within the year to summarize.
    month: Option<i64>,

    /// Whether to break down revenue by owner.
    include_tax_details: Option<String>,
}

/// Validates the year to summarize.
fn parse_year(year: i64) -> ModelResult<i32> {
    match i32::try_from(year) {
        Ok(year) if YEARS.contains(&i64::from(year)) => Ok(year),
        _ => Err(ModelError(format!(
            "year must be between {} and {}",
            YEARS.start(),
            YEARS.end()
        ))),
    }
}

/// Validates the month to summarize.
fn parse_month(month: i64) -> ModelResult<u8> {
    match u8::try_from(month) {
        Ok(month) if (1..=12).contains(&month) => Ok(month),
        _ => Err(ModelError("month must be between 1 and 12".to_owned())),
    }
}

/// Parses a boolean flag.
fn parse_flag(s: String) -> ModelResult<bool> {
    match s.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ModelError("include_tax_details must be true or false".to_owned())),
    }
}

impl Query {
    /// Validates all parameters.
    fn into_query(self) -> Result<FinancialQuery, FieldErrors> {
        let mut errors = FieldErrors::default();
        let query = FinancialQuery {
            year: errors.optional("year", self.year, parse_year),
            month: errors.optional("month", self.month, parse_month),
            include_tax_details: errors
                .optional("include_tax_details", self.include_tax_details, parse_flag)
                .unwrap_or(true),
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
    let summary = driver.get_financial_summary(query).await?;
    Ok(ApiResponse::new(summary))
}
