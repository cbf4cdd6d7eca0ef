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

//! API to check when a property is booked.

use crate::driver::Driver;
use crate::model::{DateRange, PropertyId};
use crate::rest::{optional_date, path_id};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use staysync_core::model::FieldErrors;
use staysync_core::rest::{ApiResponse, EmptyBody, QueryParams, RestResult};

/// Query parameters accepted by this API.
#[derive(Default, Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub(crate) struct Query {
    /// First night of the stay to check.
    start_date: Option<String>,

    /// Departure day of the stay to check.
    end_date: Option<String>,
}

impl Query {
    /// Validates the requested stay, if any.  Both dates must be given together.
    fn into_range(self) -> Result<Option<DateRange>, FieldErrors> {
        let mut errors = FieldErrors::default();
        let start_date = optional_date(&mut errors, "start_date", self.start_date);
        let end_date = optional_date(&mut errors, "end_date", self.end_date);
        errors.finish()?;

        match (start_date, end_date) {
            (None, None) => Ok(None),
            (Some(start_date), Some(end_date)) => DateRange::new(start_date, end_date)
                .map(Some)
                .map_err(|e| FieldErrors::single("end_date", e.0)),
            (Some(_), None) => Err(FieldErrors::single(
                "end_date",
                "end_date is required when start_date is given",
            )),
            (None, Some(_)) => Err(FieldErrors::single(
                "start_date",
                "start_date is required when end_date is given",
            )),
        }
    }
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Path(property_id): Path<String>,
    QueryParams(query): QueryParams<Query>,
    _: EmptyBody,
) -> RestResult<impl IntoResponse> {
    let property_id = path_id::<PropertyId>(&property_id)?;
    let range = query.into_range()?;
    let calendar = driver.get_property_availability(property_id, range).await?;
    Ok(ApiResponse::new(calendar))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::rest::testutils::*;
    use axum::http;
    use staysync_core::rest::testutils::*;
    use time::macros::date;

    fn route(property_id: &str) -> (http::Method, String) {
        (http::Method::GET, format!("/api/v1/properties/{}/availability", property_id))
    }

    /// Builds a query for the stay `[start_date, end_date)`.
    fn query(start_date: &str, end_date: &str) -> Query {
        Query { start_date: Some(start_date.to_owned()), end_date: Some(end_date.to_owned()) }
    }

    #[tokio::test]
    async fn test_range() {
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
        let route = route(&property.property_id.to_string());

        let calendar = OneShotBuilder::new(context.app(), route.clone())
            .with_query(query("2026-06-02", "2026-06-04"))
            .send_empty()
            .await
            .expect_data::<PropertyCalendar>()
            .await;
        assert!(!calendar.is_available);
        assert_eq!("Cozy loft downtown", calendar.property_title);
        let requested =
            RequestedDates { start_date: date!(2026 - 06 - 02), end_date: date!(2026 - 06 - 04) };
        assert_eq!(Some(requested), calendar.date_range);
        assert_eq!(vec![BookingSummary::from(&booking)], calendar.conflicting_bookings);

        let calendar = OneShotBuilder::new(context.into_app(), route)
            .with_query(query("2026-06-03", "2026-06-05"))
            .send_empty()
            .await
            .expect_data::<PropertyCalendar>()
            .await;
        assert!(calendar.is_available);
        assert!(calendar.conflicting_bookings.is_empty());
    }

    #[tokio::test]
    async fn test_no_range_lists_active_bookings() {
        let context = TestContext::setup().await;
        let owner = context.create_user("owner@example.com").await;
        let property = context.create_property(owner.user_id, 2000).await;
        let reserved = context
            .create_booking(
                property.property_id,
                date!(2026 - 06 - 10),
                date!(2026 - 06 - 12),
                BookingStatus::Reserved,
            )
            .await;
        context
            .create_booking(
                property.property_id,
                date!(2026 - 06 - 01),
                date!(2026 - 06 - 03),
                BookingStatus::Cancelled,
            )
            .await;

        let calendar =
            OneShotBuilder::new(context.into_app(), route(&property.property_id.to_string()))
                .send_empty()
                .await
                .expect_data::<PropertyCalendar>()
                .await;
        assert_eq!(None, calendar.date_range);
        let ids = calendar.conflicting_bookings.iter().map(|b| b.booking_id).collect::<Vec<_>>();
        assert_eq!(vec![reserved.booking_id], ids);
    }

    #[tokio::test]
    async fn test_unpaired_dates() {
        let context = TestContext::setup().await;
        let owner = context.create_user("owner@example.com").await;
        let property = context.create_property(owner.user_id, 2000).await;

        let query = Query { start_date: Some("2026-06-01".to_owned()), end_date: None };
        let response =
            OneShotBuilder::new(context.into_app(), route(&property.property_id.to_string()))
                .with_query(query)
                .send_empty()
                .await
                .expect_status(http::StatusCode::BAD_REQUEST)
                .expect_error_code("VALIDATION_ERROR")
                .await;
        assert_eq!(vec!["end_date"], error_fields(&response));
    }

    #[tokio::test]
    async fn test_not_found() {
        let context = TestContext::setup().await;

        OneShotBuilder::new(context.into_app(), route("4"))
            .send_empty()
            .await
            .expect_status(http::StatusCode::NOT_FOUND)
            .expect_error_code("PROPERTY_NOT_FOUND")
            .await;
    }

    test_payload_must_be_empty!(TestContext::setup().await.into_app(), route("1"));
}
