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

//! API to search properties.

use crate::driver::Driver;
use crate::model::{City, DateRange, District, Page, PropertyFilter};
use crate::rest::{optional_date, paginated};
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;
use staysync_core::model::FieldErrors;
use staysync_core::rest::{EmptyBody, QueryParams, RestResult};

/// Query parameters accepted by this API.
#[derive(Default, Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub(crate) struct Query {
    /// City the property must be in.
    city: Option<String>,

    /// District the property must be in.
    district: Option<String>,

    /// Lowest nightly price.
    min_price: Option<i64>,

    /// Highest nightly price.
    max_price: Option<i64>,

    /// First night of a stay the property must be free for.  Requires `check_out`.
    check_in: Option<String>,

    /// Departure day of a stay the property must be free for.  Requires `check_in`.
    check_out: Option<String>,

    /// Page to return.
    page: Option<i64>,

    /// Number of properties per page.
    limit: Option<i64>,
}

impl Query {
    /// Validates all parameters and builds the search criteria.
    fn into_filter(self) -> Result<(PropertyFilter, Page), FieldErrors> {
        let mut errors = FieldErrors::default();
        let city = errors.optional("city", self.city, City::new);
        let district = errors.optional("district", self.district, District::new);
        for (field, price) in [("min_price", self.min_price), ("max_price", self.max_price)] {
            if let Some(price) = price {
                errors.check(field, price >= 0, format!("{} cannot be negative", field));
            }
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            errors.check("max_price", min <= max, "max_price cannot be below min_price");
        }

        let available_for = match (self.check_in, self.check_out) {
            (None, None) => None,
            (Some(check_in), Some(check_out)) => {
                let check_in = optional_date(&mut errors, "check_in", Some(check_in));
                let check_out = optional_date(&mut errors, "check_out", Some(check_out));
                match (check_in, check_out) {
                    (Some(check_in), Some(check_out)) => {
                        errors.optional("check_out", Some((check_in, check_out)), |(i, o)| {
                            DateRange::new(i, o)
                        })
                    }
                    _ => None,
                }
            }
            (Some(_), None) => {
                errors.add("check_out", "check_out is required when check_in is given");
                None
            }
            (None, Some(_)) => {
                errors.add("check_in", "check_in is required when check_out is given");
                None
            }
        };

        let page = Page::validate(&mut errors, self.page, self.limit);
        errors.finish()?;
        let filter = PropertyFilter {
            city,
            district,
            min_price: self.min_price,
            max_price: self.max_price,
            available_for,
        };
        Ok((filter, page))
    }
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    QueryParams(query): QueryParams<Query>,
    _: EmptyBody,
) -> RestResult<impl IntoResponse> {
    let (filter, page) = query.into_filter()?;
    let properties = driver.list_properties(filter, page).await?;
    Ok(paginated(page, properties))
}
