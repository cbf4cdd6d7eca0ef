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

//! API to get a property with its owner, statistics and bookings.

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
    let details = driver.get_property(property_id).await?;
    Ok(ApiResponse::new(details))
}

#[cfg(test)]
mod tests {
    use crate::model::*;
    use crate::rest::testutils::*;
    use axum::http;
    use staysync_core::rest::testutils::*;
    use time::macros::date;

    fn route(property_id: &str) -> (http::Method, String) {
        (http::Method::GET, format!("/api/v1/properties/{}", property_id))
    }

    #[tokio::test]
    async fn test_ok() {
        let context = TestContext::setup().await;
        let owner = context.create_user("owner@example.com").await;
        let property = context.create_property(owner.user_id, 2000).await;
        let past = context
            .create_booking(
                property.property_id,
                date!(2026 - 05 - 01),
                date!(2026 - 05 - 03),
                BookingStatus::CheckedOut,
            )
            .await;
        let upcoming = context
            .create_booking(
                property.property_id,
                date!(2026 - 06 - 01),
                date!(2026 - 06 - 03),
                BookingStatus::Reserved,
            )
            .await;

        let details =
            OneShotBuilder::new(context.into_app(), route(&property.property_id.to_string()))
                .send_empty()
                .await
                .expect_data::<PropertyDetails>()
                .await;
        assert_eq!(property, details.property);
        assert_eq!("Property Owner", details.owner.owner_name);
        assert_eq!(2, details.statistics.total_bookings);
        assert_eq!(1, details.statistics.active_bookings);
        assert_eq!(1, details.statistics.completed_bookings);
        assert_eq!(2000, details.statistics.total_revenue);
        assert_eq!(
            vec![upcoming.booking_id, past.booking_id],
            details.recent_bookings.iter().map(|b| b.booking_id).collect::<Vec<_>>()
        );
        assert_eq!(
            vec![upcoming.booking_id],
            details.upcoming_bookings.iter().map(|b| b.booking_id).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_not_found() {
        let context = TestContext::setup().await;

        OneShotBuilder::new(context.into_app(), route("12"))
            .send_empty()
            .await
            .expect_status(http::StatusCode::NOT_FOUND)
            .expect_error_code("PROPERTY_NOT_FOUND")
            .await;
    }

    #[tokio::test]
    async fn test_invalid_id() {
        let context = TestContext::setup().await;

        OneShotBuilder::new(context.into_app(), route("x1"))
            .send_empty()
            .await
            .expect_status(http::StatusCode::BAD_REQUEST)
            .expect_error_code("INVALID_PROPERTY_ID")
            .await;
    }

    test_payload_must_be_empty!(TestContext::setup().await.into_app(), route("1"));
}
