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

//! Test utilities for the business layer.

use crate::db;
use crate::db::tests::{new_booking, profile, property_info};
use crate::driver::Driver;
use crate::model::*;
use staysync_core::clocks::testutils::SettableClock;
use staysync_core::db::sqlite::testutils::setup;
use staysync_core::db::{Db, Executor};
use std::sync::Arc;
use time::Date;
use time::macros::datetime;

/// State of a running test.
pub(crate) struct TestContext {
    /// The database backing the driver.
    db: Arc<dyn Db + Send + Sync>,

    /// The clock used by the driver, pinned at a known instant.
    clock: Arc<SettableClock>,

    /// The driver under test.
    driver: Driver,
}

impl TestContext {
    /// Initializes an in-memory database and a driver whose business date is 2026-05-20.
    pub(crate) async fn setup() -> Self {
        let db = setup().await;
        db::init_schema(&mut db.ex().await.unwrap()).await.unwrap();
        Self::with_db(Arc::from(db))
    }

    /// Builds a context on top of `db`, which must already hold the schema.
    pub(crate) fn with_db(db: Arc<dyn Db + Send + Sync>) -> Self {
        let clock = Arc::from(SettableClock::new(datetime!(2026-05-20 04:00:00 UTC)));
        let driver = Driver::new(db.clone(), clock.clone());
        Self { db, clock, driver }
    }

    /// Gets a direct executor against the database.
    pub(crate) async fn ex(&self) -> Executor {
        self.db.ex().await.unwrap()
    }

    /// Gets the clock used by the driver.
    pub(crate) fn clock(&self) -> &SettableClock {
        &self.clock
    }

    /// Gets a copy of the driver to call one operation on it.
    pub(crate) fn driver(&self) -> Driver {
        self.driver.clone()
    }

    /// Creates a user identified by `email`.
    pub(crate) async fn create_user(&self, email: &str) -> User {
        db::create_user(&mut self.ex().await, &profile("Property Owner", email)).await.unwrap()
    }

    /// Creates a property in Taipei owned by `owner_id` with a nightly `price`.
    pub(crate) async fn create_property(&self, owner_id: UserId, price: i64) -> Property {
        let info = property_info(owner_id, "Cozy loft downtown", "Taipei", "Daan", price);
        db::create_property(&mut self.ex().await, &info).await.unwrap()
    }

    /// Creates a booking of `property_id` over `[check_in, check_out)` in `status`, bypassing
    /// all business rules.
    pub(crate) async fn create_booking(
        &self,
        property_id: PropertyId,
        check_in: Date,
        check_out: Date,
        status: BookingStatus,
    ) -> Booking {
        let mut booking = new_booking(property_id, "Some Guest", check_in, check_out);
        booking.status = status;
        db::create_booking(&mut self.ex().await, &booking, 1000).await.unwrap()
    }
}
