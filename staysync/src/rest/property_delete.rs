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

//! API to delete a property that has no bookings.

use crate::driver::Driver;
use crate::model::PropertyId;
use crate::rest::path_id;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use staysync_core::rest::{ApiResponse, EmptyBody, RestResult};

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Path(property_id): Path<String>,
    _: EmptyBody,
) -> RestResult<impl IntoResponse> {
    let property_id = path_id::<PropertyId>(&property_id)?;
    driver.delete_property(property_id).await?;
    Ok(ApiResponse::new(()).with_message("Property deleted successfully"))
}
