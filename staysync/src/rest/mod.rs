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

//! Entry point to the REST server.

use crate::driver::Driver;
use crate::model::{DateWindow, EntityId, Page, Paginated, blank_as_none, parse_date};
use axum::Router;
use axum::http::HeaderValue;
use serde::{Deserialize, Deserializer};
use staysync_core::model::{FieldErrors, ModelResult};
use staysync_core::rest::{
    ApiResponse, EmptyBody, Pagination, RestError, RestResult, endpoint_not_found, log_request,
};
use time::Date;
use tower_http::cors::{Any, CorsLayer};

mod booking_delete;
mod booking_get;
mod booking_post;
mod booking_put;
mod booking_status_patch;
mod bookings_check_availability_post;
mod bookings_dashboard_get;
mod bookings_get;
mod health_get;
mod properties_cities_get;
mod properties_districts_get;
mod properties_get;
mod property_availability_get;
mod property_delete;
mod property_get;
mod property_post;
mod property_put;
mod report_channels_get;
mod report_financial_get;
mod report_guests_get;
mod report_occupancy_get;
mod report_performance_get;
mod report_revenue_get;
mod root_get;
#[cfg(test)]
mod testutils;
mod user_delete;
mod user_get;
mod user_post;
mod user_properties_get;
mod user_put;
mod users_get;

/// Builds the CORS policy for the given allowed `origin`, or for any origin if not set.
pub(crate) fn cors_layer(origin: Option<&str>) -> Result<CorsLayer, String> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origin {
        None => Ok(layer.allow_origin(Any)),
        Some(origin) => {
            let origin = HeaderValue::from_str(origin)
                .map_err(|e| format!("Invalid CORS origin '{}': {}", origin, e))?;
            Ok(layer.allow_origin(origin))
        }
    }
}

/// Creates the router for the application with all APIs mounted under `/api/<api_version>`.
pub(crate) fn app(driver: Driver, api_version: &str, cors: CorsLayer) -> Router {
    use axum::routing::{get, patch, post};

    let prefix = format!("/api/{}", api_version);
    let api = Router::new()
        .route("/users", get(users_get::handler).post(user_post::handler))
        .route(
            "/users/:id",
            get(user_get::handler).put(user_put::handler).delete(user_delete::handler),
        )
        .route("/users/:id/properties", get(user_properties_get::handler))
        .route("/properties", get(properties_get::handler).post(property_post::handler))
        .route("/properties/search/cities", get(properties_cities_get::handler))
        .route("/properties/search/districts", get(properties_districts_get::handler))
        .route(
            "/properties/:id",
            get(property_get::handler).put(property_put::handler).delete(property_delete::handler),
        )
        .route("/properties/:id/availability", get(property_availability_get::handler))
        .route("/bookings", get(bookings_get::handler).post(booking_post::handler))
        .route("/bookings/check-availability", post(bookings_check_availability_post::handler))
        .route("/bookings/dashboard/summary", get(bookings_dashboard_get::handler))
        .route(
            "/bookings/:id",
            get(booking_get::handler).put(booking_put::handler).delete(booking_delete::handler),
        )
        .route("/bookings/:id/status", patch(booking_status_patch::handler))
        .route("/reports/revenue", get(report_revenue_get::handler))
        .route("/reports/property-performance", get(report_performance_get::handler))
        .route("/reports/booking-channels", get(report_channels_get::handler))
        .route("/reports/guest-analysis", get(report_guests_get::handler))
        .route("/reports/occupancy", get(report_occupancy_get::handler))
        .route("/reports/financial-summary", get(report_financial_get::handler));

    Router::new()
        .route("/", get(move |body: EmptyBody| root_get::handler(prefix.clone(), body)))
        .route("/health", get(health_get::handler))
        .nest(&format!("/api/{}", api_version), api)
        .fallback(endpoint_not_found)
        .with_state(driver)
        .layer(cors)
        .layer(axum::middleware::from_fn(log_request))
}

/// Parses the identifier `raw` taken from a URL path.
fn path_id<T: EntityId>(raw: &str) -> RestResult<T> {
    T::parse(raw).map_err(|e| RestError::invalid_request(T::INVALID_CODE, e.0))
}

/// Deserializes a field that may be explicitly set to `null` in a payload.
///
/// Combined with `#[serde(default)]`, absent fields become `None` and `null` becomes `Some(None)`.
fn nullable<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Validates an optional text field in a creation payload, treating blanks as absent.
fn optional_text<T, P>(
    errors: &mut FieldErrors,
    field: &str,
    raw: Option<String>,
    parse: P,
) -> Option<T>
where
    P: FnOnce(String) -> ModelResult<T>,
{
    errors.optional(field, raw, |s| blank_as_none(s, parse)).flatten()
}

/// Validates an optional text field in an update payload.
///
/// Returns `None` if the field was not given and `Some(None)` if it was set to `null` or to a
/// blank string, which clears the stored value.
fn clearable_text<T, P>(
    errors: &mut FieldErrors,
    field: &str,
    raw: Option<Option<String>>,
    parse: P,
) -> Option<Option<T>>
where
    P: FnOnce(String) -> ModelResult<T>,
{
    match raw {
        None => None,
        Some(None) => Some(None),
        Some(Some(s)) => errors.optional(field, Some(s), |s| blank_as_none(s, parse)),
    }
}

/// Validates the optional date `raw` of `field`.
fn optional_date(errors: &mut FieldErrors, field: &str, raw: Option<String>) -> Option<Date> {
    errors.optional(field, raw, |s| parse_date(field, s))
}

/// Validates the optional `start_date`/`end_date` bounds of a report.
fn date_window(
    errors: &mut FieldErrors,
    start_date: Option<String>,
    end_date: Option<String>,
) -> DateWindow {
    let start_date = optional_date(errors, "start_date", start_date);
    let end_date = optional_date(errors, "end_date", end_date);
    match DateWindow::new(start_date, end_date) {
        Ok(window) => window,
        Err(e) => {
            errors.add("end_date", e.0);
            DateWindow::default()
        }
    }
}

/// Wraps one page of `result` in a response with its pagination metadata.
fn paginated<T>(page: Page, result: Paginated<T>) -> ApiResponse<Vec<T>> {
    let pagination = Pagination::new(page.page(), page.limit(), result.total);
    ApiResponse::new(result.items).with_pagination(pagination)
}
