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

//! API to move a booking along its lifecycle.

use crate::driver::Driver;
use crate::model::{BookingId, BookingStatus};
use crate::rest::path_id;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use staysync_core::model::FieldErrors;
use staysync_core::rest::{ApiResponse, JsonBody, RestResult};

/// Untrusted contents of a status change request.
#[derive(Default, Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub(crate) struct Request {
    /// Status to move the booking to.
    status: Option<String>,
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Path(booking_id): Path<String>,
    JsonBody(request): JsonBody<Request>,
) -> RestResult<impl IntoResponse> {
    let booking_id = path_id::<BookingId>(&booking_id)?;
    let mut errors = FieldErrors::default();
    let status = errors.required("status", request.status, |s| BookingStatus::parse(&s));
    let Some(status) = status else {
        return Err(errors.into());
    };

    let change = driver.change_booking_status(booking_id, status).await?;
    let message = format!("Booking status changed from {} to {}", change.old_status, status);
    Ok(ApiResponse::new(change).with_message(message))
}
