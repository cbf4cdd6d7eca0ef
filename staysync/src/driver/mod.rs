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

//! Business logic for the rental service.

use staysync_core::clocks::Clock;
use staysync_core::db::{Db, DbError, DbResult};
use staysync_core::driver::{DriverError, DriverResult};
use std::sync::Arc;
use time::macros::offset;
use time::{Date, OffsetDateTime, UtcOffset};

mod availability;
mod bookings;
mod properties;
mod reports;
#[cfg(test)]
pub(crate) mod testutils;
mod users;

pub(crate) use reports::{
    FinancialQuery, GuestQuery, OccupancyQuery, PerformanceQuery, RevenueQuery,
};

/// Offset of the time zone in which business dates are computed.
const TAIWAN: UtcOffset = offset!(+8);

/// Business logic.
///
/// The public operations exposed by the driver are all "one shot": they start and commit a
/// transaction, so it's incorrect for the caller to use two separate calls.  For this reason,
/// these operations consume the driver in an attempt to minimize the possibility of executing
/// two operations.
#[derive(Clone)]
pub(crate) struct Driver {
    /// The database that the driver uses for persistence.
    db: Arc<dyn Db + Send + Sync>,

    /// Clock instance to obtain the current business date.
    clock: Arc<dyn Clock + Send + Sync>,
}

impl Driver {
    /// Creates a new driver backed by the given injected components.
    pub(crate) fn new(db: Arc<dyn Db + Send + Sync>, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self { db, clock }
    }

    /// Returns the current business date.
    fn today(&self) -> Date {
        self.clock.today_in(TAIWAN)
    }

    /// Checks that the database can hand out a connection and returns the time of the check.
    pub(crate) async fn ping(self) -> DriverResult<OffsetDateTime> {
        self.db.ex().await?;
        Ok(self.clock.now_utc())
    }
}

/// Extension to translate a generic `NotFound` database error into a domain-specific one.
trait NotFoundAs<T> {
    /// Converts `DbError::NotFound` into a `DriverError::NotFound` with `code` and `message`,
    /// and any other error as usual.
    fn not_found_as(self, code: &'static str, message: &str) -> DriverResult<T>;
}

impl<T> NotFoundAs<T> for DbResult<T> {
    fn not_found_as(self, code: &'static str, message: &str) -> DriverResult<T> {
        match self {
            Err(DbError::NotFound) => Err(DriverError::not_found(code, message)),
            result => Ok(result?),
        }
    }
}

/// Message for `USER_NOT_FOUND` errors.
const USER_NOT_FOUND: &str = "User not found";

/// Message for `PROPERTY_NOT_FOUND` errors.
const PROPERTY_NOT_FOUND: &str = "Property not found";

/// Message for `BOOKING_NOT_FOUND` errors.
const BOOKING_NOT_FOUND: &str = "Booking not found";

/// Builds the error returned when an update request carries no fields.
fn no_update_data() -> DriverError {
    DriverError::invalid_input("NO_UPDATE_DATA", "No fields to update were provided")
}
