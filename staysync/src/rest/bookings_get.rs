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

//! API to search bookings.

use crate::driver::Driver;
use crate::model::{BookingFilter, BookingStatus, Channel, Page, PropertyId};
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
    /// Status the bookings must be in.
    status: Option<String>,

    /// Channel the bookings must come from.
    source_channel: Option<String>,

    /// Property the bookings must be for.
    property_id: Option<i64>,

    /// Text that the guest name must contain.
    guest_name: Option<String>,

    /// Earliest check-in date.
    start_date: Option<String>,

    /// Latest check-out date.
    end_date: Option<String>,

    /// Page to return.
    page: Option<i64>,

    /// Number of bookings per page.
    limit: Option<i64>,
}

impl Query {
    /// Validates all parameters and builds the search criteria.
    fn into_filter(self) -> Result<(BookingFilter, Page), FieldErrors> {
        let mut errors = FieldErrors::default();
        let filter = BookingFilter {
            status: errors.optional("status", self.status, |s| BookingStatus::parse(&s)),
            source_channel: errors
                .optional("source_channel", self.source_channel, |s| Channel::parse(&s)),
            property_id: errors.optional("property_id", self.property_id, PropertyId::new),
            guest_name: self
                .guest_name
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty()),
            start_date: optional_date(&mut errors, "start_date", self.start_date),
            end_date: optional_date(&mut errors, "end_date", self.end_date),
        };
        let page = Page::validate(&mut errors, self.page, self.limit);
        errors.finish()?;
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
    let bookings = driver.list_bookings(filter, page).await?;
    Ok(paginated(page, bookings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::rest::testutils::*;
    use axum::http;
    use staysync_core::rest::ApiResponse;
    use staysync_core::rest::testutils::*;
    use time::macros::date;

    fn route() -> (http::Method, String) {
        (http::Method::GET, "/api/v1/bookings".to_owned())
    }

    /// Extracts the identifiers of the bookings in a listing.
    fn ids(listings: &[BookingListing]) -> Vec<BookingId> {
        listings.iter().map(|l| l.booking.booking_id).collect()
    }

    #[tokio::test]
    async fn test_all_newest_first() {
        let context = TestContext::setup().await;
        let owner = context.create_user("owner@example.com").await;
        let property = context.create_property(owner.user_id, 2000).await;
        let first = context
            .create_booking(
                property.property_id,
                date!(2026 - 06 - 01),
                date!(2026 - 06 - 04),
                BookingStatus::Reserved,
            )
            .await;
        let second = context
            .create_booking(
                property.property_id,
                date!(2026 - 06 - 10),
                date!(2026 - 06 - 12),
                BookingStatus::Cancelled,
            )
            .await;

        let response = OneShotBuilder::new(context.into_app(), route())
            .send_empty()
            .await
            .expect_json::<ApiResponse<Vec<BookingListing>>>()
            .await;
        assert_eq!(vec![second.booking_id, first.booking_id], ids(&response.data));
        assert_eq!(2, response.pagination.unwrap().total);
        let listing = &response.data[1];
        assert_eq!("Cozy loft downtown", listing.property_title);
        assert_eq!("Taipei", listing.property_city);
        assert_eq!("Daan", listing.property_district);
        assert_eq!("Property Owner", listing.owner_name);
        assert_eq!(3, listing.stay_nights);
    }

    #[tokio::test]
    async fn test_filters() {
        let context = TestContext::setup().await;
        let owner = context.create_user("owner@example.com").await;
        let property = context.create_property(owner.user_id, 2000).await;
        let other = context.create_property(owner.user_id, 2000).await;
        let june = context
            .create_booking(
                property.property_id,
                date!(2026 - 06 - 01),
                date!(2026 - 06 - 04),
                BookingStatus::Reserved,
            )
            .await;
        let july = context
            .create_booking(
                property.property_id,
                date!(2026 - 07 - 01),
                date!(2026 - 07 - 04),
                BookingStatus::CheckedIn,
            )
            .await;
        context
            .create_booking(
                other.property_id,
                date!(2026 - 07 - 01),
                date!(2026 - 07 - 04),
                BookingStatus::Reserved,
            )
            .await;

        let query = Query {
            status: Some("Reserved".to_owned()),
            property_id: Some(property.property_id.as_i64()),
            ..Default::default()
        };
        let listings = OneShotBuilder::new(context.app(), route())
            .with_query(query)
            .send_empty()
            .await
            .expect_data::<Vec<BookingListing>>()
            .await;
        assert_eq!(vec![june.booking_id], ids(&listings));

        let query = Query {
            guest_name: Some("guest".to_owned()),
            start_date: Some("2026-06-15".to_owned()),
            property_id: Some(property.property_id.as_i64()),
            ..Default::default()
        };
        let listings = OneShotBuilder::new(context.app(), route())
            .with_query(query)
            .send_empty()
            .await
            .expect_data::<Vec<BookingListing>>()
            .await;
        assert_eq!(vec![july.booking_id], ids(&listings));

        let query = Query { end_date: Some("2026-06-30".to_owned()), ..Default::default() };
        let listings = OneShotBuilder::new(context.into_app(), route())
            .with_query(query)
            .send_empty()
            .await
            .expect_data::<Vec<BookingListing>>()
            .await;
        assert_eq!(vec![june.booking_id], ids(&listings));
    }

    #[tokio::test]
    async fn test_invalid_query() {
        let context = TestContext::setup().await;

        let query = Query {
            status: Some("Pending".to_owned()),
            source_channel: Some("Expedia".to_owned()),
            property_id: Some(-1),
            start_date: Some("tomorrow".to_owned()),
            ..Default::default()
        };
        let response = OneShotBuilder::new(context.into_app(), route())
            .with_query(query)
            .send_empty()
            .await
            .expect_status(http::StatusCode::BAD_REQUEST)
            .expect_error_code("VALIDATION_ERROR")
            .await;
        assert_eq!(
            vec!["status", "source_channel", "property_id", "start_date"],
            error_fields(&response)
        );
    }

    test_payload_must_be_empty!(TestContext::setup().await.into_app(), route());
}
