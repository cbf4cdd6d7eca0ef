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

//! Data types for the rental domain.
//!
//! Every type here validates its contents when constructed.  Request handlers use these
//! constructors together with `FieldErrors` to report every invalid field at once.

use serde::{Deserialize, Serialize};
use staysync_core::model::{FieldErrors, ModelError, ModelResult};
use std::fmt;
use time::Date;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

/// Defines a string newtype whose trimmed length must fall within `[$min, $max]` characters.
macro_rules! bounded_string [
    ( $(#[$meta:meta])* $name:ident, $what:expr, $min:expr, $max:expr ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        #[derive(serde::Deserialize, serde::Serialize)]
        #[serde(try_from = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new value from an untrusted string `s`, making sure it is valid.
            pub fn new<S: Into<String>>(s: S) -> staysync_core::model::ModelResult<Self> {
                staysync_core::model::bounded_text($what, s.into(), $min, $max).map(Self)
            }

            /// Returns a string view of the value.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = staysync_core::model::ModelError;

            fn try_from(s: String) -> staysync_core::model::ModelResult<Self> {
                Self::new(s)
            }
        }

        #[cfg(test)]
        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s).unwrap()
            }
        }
    }
];

/// Common behavior of the identifiers of persisted entities.
pub trait EntityId: Copy + Sized {
    /// Error code reported when a path parameter does not hold a valid identifier.
    const INVALID_CODE: &'static str;

    /// Parses an identifier from its textual form, as found in URL paths.
    fn parse(raw: &str) -> ModelResult<Self>;
}

/// Defines a positive integer identifier for an entity.
macro_rules! entity_id [
    ( $(#[$meta:meta])* $name:ident, $what:expr, $code:expr ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
        #[serde(try_from = "i64")]
        pub struct $name(i64);

        impl $name {
            /// Creates a new identifier from an untrusted integer, making sure it is valid.
            pub fn new(id: i64) -> ModelResult<Self> {
                if id < 1 {
                    return Err(ModelError(format!("{} must be a positive integer", $what)));
                }
                Ok(Self(id))
            }

            /// Returns the raw value of the identifier.
            pub fn as_i64(self) -> i64 {
                self.0
            }
        }

        impl EntityId for $name {
            const INVALID_CODE: &'static str = $code;

            fn parse(raw: &str) -> ModelResult<Self> {
                match raw.parse::<i64>() {
                    Ok(id) => Self::new(id),
                    Err(_) => Err(ModelError(format!("{} must be a positive integer", $what))),
                }
            }
        }

        impl TryFrom<i64> for $name {
            type Error = ModelError;

            fn try_from(id: i64) -> ModelResult<Self> {
                Self::new(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    }
];

entity_id!(
    /// Identifier of a user.
    UserId,
    "User ID",
    "INVALID_USER_ID"
);

entity_id!(
    /// Identifier of a property.
    PropertyId,
    "Property ID",
    "INVALID_PROPERTY_ID"
);

entity_id!(
    /// Identifier of a booking.
    BookingId,
    "Booking ID",
    "INVALID_BOOKING_ID"
);

mod booking;
mod property;
mod report;
mod user;

pub use booking::*;
pub use property::*;
pub use report::*;
pub use user::*;

/// Format of calendar dates in requests and responses.
const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Parses a `YYYY-MM-DD` date.  `what` names the value in error messages.
pub fn parse_date(what: &str, s: String) -> ModelResult<Date> {
    Date::parse(s.trim(), DATE_FORMAT)
        .map_err(|_| ModelError(format!("{} must be a valid date in YYYY-MM-DD format", what)))
}

/// Formats a date as `YYYY-MM-DD`.
pub fn format_date(date: Date) -> String {
    match date.format(DATE_FORMAT) {
        Ok(s) => s,
        // Only years beyond four digits fail to format, and those cannot be parsed back in.
        Err(_) => date.to_string(),
    }
}

/// Parses an optional text value with `parse`, treating blank strings as the absence of a value.
pub fn blank_as_none<T, P>(s: String, parse: P) -> ModelResult<Option<T>>
where
    P: FnOnce(String) -> ModelResult<T>,
{
    if s.trim().is_empty() { Ok(None) } else { parse(s).map(Some) }
}

/// A validated page of results to return from a listing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Page {
    /// One-based page number.
    page: u32,

    /// Maximum number of items per page.
    limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, limit: Page::DEFAULT_LIMIT }
    }
}

impl Page {
    /// Number of items per page when not specified.
    pub const DEFAULT_LIMIT: u32 = 10;

    /// Largest number of items per page that clients can request.
    pub const MAX_LIMIT: u32 = 100;

    /// Creates a page from untrusted query parameters, recording any problems in `errors`.
    ///
    /// Invalid values are replaced by their defaults so that validation can continue; callers
    /// are expected to reject the request if `errors` is not empty.
    pub fn validate(errors: &mut FieldErrors, page: Option<i64>, limit: Option<i64>) -> Self {
        let mut result = Self::default();
        if let Some(page) = page {
            match u32::try_from(page) {
                Ok(page) if page >= 1 => result.page = page,
                _ => errors.add("page", "page must be a positive integer"),
            }
        }
        if let Some(limit) = limit {
            match u32::try_from(limit) {
                Ok(limit) if (1..=Self::MAX_LIMIT).contains(&limit) => result.limit = limit,
                _ => errors
                    .add("limit", format!("limit must be between 1 and {}", Self::MAX_LIMIT)),
            }
        }
        result
    }

    /// Returns the one-based page number.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Returns the maximum number of items in the page.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Returns the number of items to skip to reach this page.
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

/// Sets of results along with the total number of matches before pagination.
#[derive(Debug, PartialEq)]
pub struct Paginated<T> {
    /// Items in the requested page.
    pub items: Vec<T>,

    /// Total number of items across all pages.
    pub total: u64,
}

/// Rounds `value` to two decimal places, as presented to clients.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Computes `part / whole` as a percentage with two decimals, or 0 when `whole` is 0.
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole == 0 { 0.0 } else { round2(part as f64 * 100.0 / whole as f64) }
}

/// Computes `total / count` with two decimals, or 0 when `count` is 0.
pub fn average(total: i64, count: i64) -> f64 {
    if count == 0 { 0.0 } else { round2(total as f64 / count as f64) }
}
