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

//! API to update some fields of a booking.

use crate::driver::Driver;
use crate::model::{
    BookingId, BookingStatus, BookingUpdate, Channel, GuestIdNo, GuestName, SpecialNote,
    booking_amount,
};
use crate::rest::{clearable_text, nullable, optional_date, path_id};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use staysync_core::model::FieldErrors;
use staysync_core::rest::{ApiResponse, JsonBody, RestResult};

/// Untrusted contents of a booking update request.  Absent fields are left untouched.
#[derive(Default, Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub(crate) struct Request {
    /// New sales channel.
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    source_channel: Option<String>,

    /// New guest name.
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    guest_name: Option<String>,

    /// New guest ID number.
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    guest_id_no: Option<String>,

    /// New first night.
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    check_in: Option<String>,

    /// New departure day.
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    check_out: Option<String>,

    /// New amount charged.
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    total_amount: Option<i64>,

    /// New tax treatment.
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    is_tax_included: Option<bool>,

    /// New breakfast option.
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    breakfast_included: Option<bool>,

    /// New note, or `null` to clear it.
    #[serde(default, deserialize_with = "nullable")]
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    special_note: Option<Option<String>>,

    /// New status, which must be reachable from the current one.
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    status: Option<String>,
}

impl Request {
    /// Validates all given fields and builds the update to apply.
    fn into_update(self) -> Result<BookingUpdate, FieldErrors> {
        let mut errors = FieldErrors::default();
        let update = BookingUpdate {
            source_channel: errors
                .optional("source_channel", self.source_channel, |s| Channel::parse(&s)),
            guest_name: errors.optional("guest_name", self.guest_name, GuestName::new),
            guest_id_no: errors.optional("guest_id_no", self.guest_id_no, GuestIdNo::new),
            check_in: optional_date(&mut errors, "check_in", self.check_in),
            check_out: optional_date(&mut errors, "check_out", self.check_out),
            total_amount: errors.optional("total_amount", self.total_amount, booking_amount),
            is_tax_included: self.is_tax_included,
            breakfast_included: self.breakfast_included,
            special_note: clearable_text(
                &mut errors,
                "special_note",
                self.special_note,
                SpecialNote::new,
            ),
            status: errors.optional("status", self.status, |s| BookingStatus::parse(&s)),
        };
        errors.finish()?;
        Ok(update)
    }
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Path(booking_id): Path<String>,
    JsonBody(request): JsonBody<Request>,
) -> RestResult<impl IntoResponse> {
    let booking_id = path_id::<BookingId>(&booking_id)?;
    let update = request.into_update()?;
    let listing = driver.update_booking(booking_id, update).await?;
    Ok(ApiResponse::new(listing).with_message("Booking updated successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::rest::testutils::*;
    use axum::http;
    use serde_json::json;
    use staysync_core::rest::testutils::*;
    use time::macros::date;

    fn route(booking_id: &str) -> (http::Method, String) {
        (http::Method::PUT, format!("/api/v1/bookings/{}", booking_id))
    }

    #[tokio::test]
    async fn test_partial_update() {
        let context = TestContext::setup().await;
        let owner = context.create_user("owner@example.com").await;
        let property = context.create_property(owner.user_id, 2000).await;
        let booking = context
            .create_booking(
                property.property_id,
                date!(2026 - 06 - 01),
                date!(2026 - 06 - 03),
                BookingStatus::Reserved,
            )
            .await;

        let request = Request {
            guest_name: Some("New Guest".to_owned()),
            check_out: Some("2026-06-05".to_owned()),
            special_note: Some(Some("Crib needed".to_owned())),
            ..Default::default()
        };
        let listing = OneShotBuilder::new(context.app(), route(&booking.booking_id.to_string()))
            .send_json(request)
            .await
            .expect_data::<BookingListing>()
            .await;
        assert_eq!("New Guest", listing.booking.guest_name.as_str());
        assert_eq!(date!(2026 - 06 - 05), listing.booking.check_out);
        assert_eq!(4, listing.stay_nights);
        assert_eq!("Crib needed", listing.booking.special_note.as_ref().unwrap().as_str());
        assert_eq!(Some(listing.booking), context.get_booking(booking.booking_id).await);
    }

    #[tokio::test]
    async fn test_date_change_conflicts_with_others_only() {
        let context = TestContext::setup().await;
        let owner = context.create_user("owner@example.com").await;
        let property = context.create_property(owner.user_id, 2000).await;
        let booking = context
            .create_booking(
                property.property_id,
                date!(2026 - 06 - 01),
                date!(2026 - 06 - 03),
                BookingStatus::Reserved,
            )
            .await;
        let other = context
            .create_booking(
                property.property_id,
                date!(2026 - 06 - 05),
                date!(2026 - 06 - 07),
                BookingStatus::CheckedIn,
            )
            .await;
        let route = route(&booking.booking_id.to_string());

        OneShotBuilder::new(context.app(), route.clone())
            .send_json(json!({"check_out": "2026-06-04"}))
            .await
            .expect_data::<BookingListing>()
            .await;

        let response = OneShotBuilder::new(context.app(), route)
            .send_json(json!({"check_out": "2026-06-06"}))
            .await
            .expect_status(http::StatusCode::CONFLICT)
            .expect_error_code("DATE_CONFLICT")
            .await;
        let conflicts = &response.details.unwrap()["conflicting_bookings"];
        assert_eq!(json!(other.booking_id), conflicts[0]["booking_id"]);
        assert_eq!(
            date!(2026 - 06 - 04),
            context.get_booking(booking.booking_id).await.unwrap().check_out
        );
    }

    #[tokio::test]
    async fn test_inverted_dates() {
        let context = TestContext::setup().await;
        let owner = context.create_user("owner@example.com").await;
        let property = context.create_property(owner.user_id, 2000).await;
        let booking = context
            .create_booking(
                property.property_id,
                date!(2026 - 06 - 01),
                date!(2026 - 06 - 03),
                BookingStatus::Reserved,
            )
            .await;

        let response =
            OneShotBuilder::new(context.into_app(), route(&booking.booking_id.to_string()))
                .send_json(json!({"check_in": "2026-06-03"}))
                .await
                .expect_status(http::StatusCode::BAD_REQUEST)
                .expect_error_code("VALIDATION_ERROR")
                .await;
        assert_eq!(vec!["check_out"], error_fields(&response));
    }

    #[tokio::test]
    async fn test_status_change_must_be_allowed() {
        let context = TestContext::setup().await;
        let owner = context.create_user("owner@example.com").await;
        let property = context.create_property(owner.user_id, 2000).await;
        let booking = context
            .create_booking(
                property.property_id,
                date!(2026 - 06 - 01),
                date!(2026 - 06 - 03),
                BookingStatus::CheckedOut,
            )
            .await;
        let route = route(&booking.booking_id.to_string());

        OneShotBuilder::new(context.app(), route.clone())
            .send_json(json!({"status": "Reserved"}))
            .await
            .expect_status(http::StatusCode::CONFLICT)
            .expect_error_code("INVALID_STATUS_TRANSITION")
            .await;

        let listing = OneShotBuilder::new(context.app(), route)
            .send_json(json!({"status": "CheckedOut", "breakfast_included": true}))
            .await
            .expect_data::<BookingListing>()
            .await;
        assert!(listing.booking.breakfast_included);
    }

    #[tokio::test]
    async fn test_no_fields() {
        let context = TestContext::setup().await;

        OneShotBuilder::new(context.into_app(), route("1"))
            .send_json(json!({}))
            .await
            .expect_status(http::StatusCode::BAD_REQUEST)
            .expect_error_code("NO_UPDATE_DATA")
            .await;
    }

    #[tokio::test]
    async fn test_not_found() {
        let context = TestContext::setup().await;

        OneShotBuilder::new(context.into_app(), route("5"))
            .send_json(json!({"guest_name": "Someone"}))
            .await
            .expect_status(http::StatusCode::NOT_FOUND)
            .expect_error_code("BOOKING_NOT_FOUND")
            .await;
    }

    test_payload_must_be_json!(TestContext::setup().await.into_app(), route("1"));
}
