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

//! API to update some fields of a property.

use crate::driver::Driver;
use crate::model::{Address, City, District, LicenseNo, Price, PropertyId, PropertyUpdate, Title};
use crate::rest::{clearable_text, nullable, path_id};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use staysync_core::model::FieldErrors;
use staysync_core::rest::{ApiResponse, JsonBody, RestResult};

/// Untrusted contents of a property update request.  The owner of a property cannot change.
#[derive(Default, Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub(crate) struct Request {
    /// New listing title.
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    title: Option<String>,

    /// New city.
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    city: Option<String>,

    /// New district.
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    district: Option<String>,

    /// New street address.
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    address: Option<String>,

    /// New license number, or `null` to clear it.
    #[serde(default, deserialize_with = "nullable")]
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    legal_license_no: Option<Option<String>>,

    /// New nightly base price.
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    base_price_twd: Option<i64>,
}

impl Request {
    /// Validates all given fields and builds the update to apply.
    fn into_update(self) -> Result<PropertyUpdate, FieldErrors> {
        let mut errors = FieldErrors::default();
        let update = PropertyUpdate {
            title: errors.optional("title", self.title, Title::new),
            city: errors.optional("city", self.city, City::new),
            district: errors.optional("district", self.district, District::new),
            address: errors.optional("address", self.address, Address::new),
            legal_license_no: clearable_text(
                &mut errors,
                "legal_license_no",
                self.legal_license_no,
                LicenseNo::new,
            ),
            base_price_twd: errors.optional("base_price_twd", self.base_price_twd, Price::new),
        };
        errors.finish()?;
        Ok(update)
    }
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Path(property_id): Path<String>,
    JsonBody(request): JsonBody<Request>,
) -> RestResult<impl IntoResponse> {
    let property_id = path_id::<PropertyId>(&property_id)?;
    let update = request.into_update()?;
    let property = driver.update_property(property_id, update).await?;
    Ok(ApiResponse::new(property).with_message("Property updated successfully"))
}
