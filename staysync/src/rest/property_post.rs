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

//! API to create a property.

use crate::driver::Driver;
use crate::model::{Address, City, District, LicenseNo, Price, PropertyInfo, Title, UserId};
use crate::rest::optional_text;
use axum::extract::State;
use axum::http;
use axum::response::IntoResponse;
use serde::Deserialize;
use staysync_core::model::FieldErrors;
use staysync_core::rest::{ApiResponse, JsonBody, RestResult};

/// Untrusted contents of a property creation request.
#[derive(Default, Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub(crate) struct Request {
    /// Identifier of the owner.
    owner_id: Option<i64>,

    /// Listing title.
    title: Option<String>,

    /// City.
    city: Option<String>,

    /// District within the city.
    district: Option<String>,

    /// Street address.
    address: Option<String>,

    /// Legal license number of the rental.
    legal_license_no: Option<String>,

    /// Nightly base price in TWD.
    base_price_twd: Option<i64>,
}

impl Request {
    /// Validates all fields of the request and builds the description of the new property.
    fn into_info(self) -> Result<PropertyInfo, FieldErrors> {
        let mut errors = FieldErrors::default();
        let owner_id = errors.required("owner_id", self.owner_id, UserId::new);
        let title = errors.required("title", self.title, Title::new);
        let city = errors.required("city", self.city, City::new);
        let district = errors.required("district", self.district, District::new);
        let address = errors.required("address", self.address, Address::new);
        let legal_license_no =
            optional_text(&mut errors, "legal_license_no", self.legal_license_no, LicenseNo::new);
        let base_price_twd = errors.required("base_price_twd", self.base_price_twd, Price::new);

        match (owner_id, title, city, district, address, base_price_twd) {
            (
                Some(owner_id),
                Some(title),
                Some(city),
                Some(district),
                Some(address),
                Some(base_price_twd),
            ) if errors.is_empty() => Ok(PropertyInfo {
                owner_id,
                title,
                city,
                district,
                address,
                legal_license_no,
                base_price_twd,
            }),
            _ => Err(errors),
        }
    }
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    JsonBody(request): JsonBody<Request>,
) -> RestResult<impl IntoResponse> {
    let info = request.into_info()?;
    let property = driver.create_property(info).await?;
    let response = ApiResponse::new(property).with_message("Property created successfully");
    Ok((http::StatusCode::CREATED, response))
}
