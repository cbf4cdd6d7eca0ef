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

//! API to create a booking.

use crate::driver::Driver;
use crate::model::{
    BookingStatus, Channel, DateRange, GuestIdNo, GuestName, NewBooking, PropertyId,
    SpecialNote, booking_amount, parse_date,
};
use crate::rest::optional_text;
use axum::extract::State;
use axum::http;
use axum::response::IntoResponse;
use serde::Deserialize;
use staysync_core::model::FieldErrors;
use staysync_core::rest::{ApiResponse, JsonBody, RestResult};

/// Untrusted contents of a booking creation request.
#[derive(Default, Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub(crate) struct Request {
    /// Property to book.
    property_id: Option<i64>,

    /// Sales channel.  Defaults to direct bookings.
    source_channel: Option<String>,

    /// Name of the guest.
    guest_name: Option<String>,

    /// National ID or passport number of the guest.
    guest_id_no: Option<String>,

    /// First night of the stay.
    check_in: Option<String>,

    /// Departure day.
    check_out: Option<String>,

    /// Amount charged.  Computed from the base price of the property if absent or zero.
    total_amount: Option<i64>,

    /// Whether the amount includes business tax.  Defaults to true.
    is_tax_included: Option<bool>,

    /// Whether breakfast is included.  Defaults to true.
    breakfast_included: Option<bool>,

    /// Free-form note.
    special_note: Option<String>,

    /// Initial status.  Defaults to reserved.
    status: Option<String>,
}

impl Request {
    /// Validates all fields of the request and builds the new booking.
    fn into_booking(self) -> Result<NewBooking, FieldErrors> {
        let mut errors = FieldErrors::default();
        let property_id = errors.required("property_id", self.property_id, PropertyId::new);
        let source_channel = errors
            .optional("source_channel", self.source_channel, |s| Channel::parse(&s))
            .unwrap_or(Channel::Direct);
        let guest_name = errors.required("guest_name", self.guest_name, GuestName::new);
        let guest_id_no = errors.required("guest_id_no", self.guest_id_no, GuestIdNo::new);

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

        let total_amount = errors.optional("total_amount", self.total_amount, booking_amount);
        let special_note =
            optional_text(&mut errors, "special_note", self.special_note, SpecialNote::new);
        let status = errors
            .optional("status", self.status, |s| BookingStatus::parse(&s))
            .unwrap_or(BookingStatus::Reserved);

        match (property_id, guest_name, guest_id_no, range) {
            (Some(property_id), Some(guest_name), Some(guest_id_no), Some(range))
                if errors.is_empty() =>
            {
                Ok(NewBooking {
                    property_id,
                    source_channel,
                    guest_name,
                    guest_id_no,
                    range,
                    total_amount,
                    is_tax_included: self.is_tax_included.unwrap_or(true),
                    breakfast_included: self.breakfast_included.unwrap_or(true),
                    special_note,
                    status,
                })
            }
            _ => Err(errors),
        }
    }
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    JsonBody(request): JsonBody<Request>,
) -> RestResult<impl IntoResponse> {
    let booking = request.into_booking()?;
    let created = driver.create_booking(booking).await?;
    let response = ApiResponse::new(created).with_message("Booking created successfully");
    Ok((http::StatusCode::CREATED, response))
}
