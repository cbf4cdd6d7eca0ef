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

//! Test utilities for the REST API.

use crate::db;
use crate::db::tests::{new_booking, profile, property_info};
use crate::driver::Driver;
use crate::model::*;
use crate::rest::{app, cors_layer};
use axum::Router;
use staysync_core::clocks::testutils::SettableClock;
use staysync_core::db::{Db, Executor};
use staysync_core::db::sqlite::testutils::setup;
use staysync_core::model::FieldError;
use staysync_core::rest::ErrorResponse;
use std::sync::Arc;
use time::Date;
use time::macros::datetime;

pub(crate) struct TestContext {
    db: Arc<dyn Db + Send + Sync>,
    clock: Arc<SettableClock>,
    app: Router,
}

impl TestContext {
    /// Initializes an app backed by an in-memory database whose business date is 2026-05-20.
    pub(crate) async fn setup() -> Self {
        let _can_fail = env_logger::builder().is_test(true).try_init();

        let db = setup().await;
        db::init_schema(&mut db.ex().await.unwrap()).await.unwrap();
        let db: Arc<dyn Db + Send + Sync> = Arc::from(db);
        let clock = Arc::from(SettableClock::new(datetime!(2026-05-20 04:00:00 UTC)));
        let driver = Driver::new(db.clone(), clock.clone());
        let app = app(driver, "v1", cors_layer(None).unwrap());
        Self { db, clock, app }
    }

    pub(crate) fn app(&self) -> Router {
        self.app.clone()
    }

    pub(crate) fn into_app(self) -> Router {
        self.app
    }

    pub(crate) async fn ex(&self) -> Executor {
        self.db.ex().await.unwrap()
    }

    /// Shuts down the database so that later requests cannot obtain connections.
    pub(crate) async fn close_db(&self) {
        self.db.close().await
    }

    pub(crate) fn clock(&self) -> &SettableClock {
        &self.clock
    }

    pub(crate) async fn create_user(&self, email: &str) -> User {
        db::create_user(&mut self.ex().await, &profile("Property Owner", email)).await.unwrap()
    }

    pub(crate) async fn create_property(&self, owner_id: UserId, price: i64) -> Property {
        let info = property_info(owner_id, "Cozy loft downtown", "Taipei", "Daan", price);
        db::create_property(&mut self.ex().await, &info).await.unwrap()
    }

    /// Creates a booking of `property_id` over `[check_in, check_out)` in `status` for 1000 TWD,
    /// bypassing all business rules.
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

    /// Creates a reserved booking for `guest` that came through `channel` and costs `amount`.
    pub(crate) async fn create_sale(
        &self,
        property_id: PropertyId,
        guest: &str,
        (check_in, check_out): (Date, Date),
        channel: Channel,
        amount: i64,
    ) -> Booking {
        let mut booking = new_booking(property_id, guest, check_in, check_out);
        booking.source_channel = channel;
        db::create_booking(&mut self.ex().await, &booking, amount).await.unwrap()
    }

    pub(crate) async fn get_user(&self, user_id: UserId) -> Option<User> {
        match db::get_user(&mut self.ex().await, user_id).await {
            Ok(user) => Some(user),
            Err(staysync_core::db::DbError::NotFound) => None,
            Err(e) => panic!("Unexpected error {:?}", e),
        }
    }

    pub(crate) async fn get_property(&self, property_id: PropertyId) -> Option<Property> {
        match db::get_property(&mut self.ex().await, property_id).await {
            Ok(property) => Some(property),
            Err(staysync_core::db::DbError::NotFound) => None,
            Err(e) => panic!("Unexpected error {:?}", e),
        }
    }

    pub(crate) async fn get_booking(&self, booking_id: BookingId) -> Option<Booking> {
        match db::get_booking(&mut self.ex().await, booking_id).await {
            Ok(booking) => Some(booking),
            Err(staysync_core::db::DbError::NotFound) => None,
            Err(e) => panic!("Unexpected error {:?}", e),
        }
    }
}

/// Returns the names of the fields reported as invalid in a validation error `response`.
pub(crate) fn error_fields(response: &ErrorResponse) -> Vec<String> {
    let details = response.details.clone().expect("Validation errors must carry details");
    let errors: Vec<FieldError> = serde_json::from_value(details).unwrap();
    errors.into_iter().map(|e| e.field).collect()
}
