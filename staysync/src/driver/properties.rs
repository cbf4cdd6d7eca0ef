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

//! Operations on properties.

use crate::db;
use crate::driver::availability::find_conflicts;
use crate::driver::{Driver, NotFoundAs, PROPERTY_NOT_FOUND, USER_NOT_FOUND, no_update_data};
use crate::model::*;
use log::info;
use serde_json::json;
use staysync_core::driver::{DriverError, DriverResult};
use time::Date;

/// Number of latest bookings to include in the details of a property.
const RECENT_BOOKINGS: usize = 5;

/// Number of upcoming bookings to include in the details of a property.
const UPCOMING_BOOKINGS: usize = 10;

/// Computes the statistics of a property from all of its `bookings`.
fn property_stats(bookings: &[Booking]) -> PropertyStats {
    let count = |status| bookings.iter().filter(|b| b.status == status).count() as i64;
    let paid = bookings.iter().filter(|b| b.status != BookingStatus::Cancelled);
    let total_revenue = paid.clone().map(|b| b.total_amount).sum();
    PropertyStats {
        total_bookings: bookings.len() as i64,
        active_bookings: count(BookingStatus::Reserved),
        current_guests: count(BookingStatus::CheckedIn),
        completed_bookings: count(BookingStatus::CheckedOut),
        cancelled_bookings: count(BookingStatus::Cancelled),
        total_revenue,
        avg_booking_value: average(total_revenue, paid.count() as i64),
    }
}

/// Selects the active bookings of a property that start on or after `today`, soonest first.
///
/// `bookings` must be sorted newest first, as returned by the database.
fn upcoming_bookings(bookings: &[Booking], today: Date) -> Vec<BookingSummary> {
    let mut upcoming = bookings
        .iter()
        .filter(|b| b.status.is_active() && b.check_in >= today)
        .collect::<Vec<&Booking>>();
    upcoming.sort_by_key(|b| (b.check_in, b.booking_id));
    upcoming.into_iter().take(UPCOMING_BOOKINGS).map(BookingSummary::from).collect()
}

impl Driver {
    /// Gets one page of the properties that match `filter`, newest first.
    pub(crate) async fn list_properties(
        self,
        filter: PropertyFilter,
        page: Page,
    ) -> DriverResult<Paginated<PropertyListing>> {
        let properties = db::list_properties(&mut self.db.ex().await?, &filter, page).await?;
        Ok(properties)
    }

    /// Gets the property identified by `property_id` with its owner, statistics, and latest and
    /// upcoming bookings.
    pub(crate) async fn get_property(
        self,
        property_id: PropertyId,
    ) -> DriverResult<PropertyDetails> {
        let today = self.today();
        let mut ex = self.db.ex().await?;
        let (property, owner) = db::get_property_with_owner(&mut ex, property_id)
            .await
            .not_found_as("PROPERTY_NOT_FOUND", PROPERTY_NOT_FOUND)?;
        let bookings = db::list_property_bookings(&mut ex, property_id).await?;
        let recent_bookings =
            bookings.iter().take(RECENT_BOOKINGS).map(BookingSummary::from).collect();
        Ok(PropertyDetails {
            property,
            owner,
            statistics: property_stats(&bookings),
            recent_bookings,
            upcoming_bookings: upcoming_bookings(&bookings, today),
        })
    }

    /// Creates a new property described by `info`.
    pub(crate) async fn create_property(self, info: PropertyInfo) -> DriverResult<Property> {
        let mut tx = self.db.begin().await?;
        db::get_user(tx.ex(), info.owner_id).await.not_found_as("OWNER_NOT_FOUND", USER_NOT_FOUND)?;
        let property = db::create_property(tx.ex(), &info).await?;
        tx.commit().await?;
        info!("Created property {} for owner {}", property.property_id, info.owner_id);
        Ok(property)
    }

    /// Applies `update` to the property identified by `property_id` and returns the updated
    /// property.
    pub(crate) async fn update_property(
        self,
        property_id: PropertyId,
        update: PropertyUpdate,
    ) -> DriverResult<Property> {
        if update.is_empty() {
            return Err(no_update_data());
        }

        let mut tx = self.db.begin().await?;
        db::get_property(tx.ex(), property_id)
            .await
            .not_found_as("PROPERTY_NOT_FOUND", PROPERTY_NOT_FOUND)?;
        db::update_property(tx.ex(), property_id, &update).await?;
        let property = db::get_property(tx.ex(), property_id).await?;
        tx.commit().await?;
        Ok(property)
    }

    /// Deletes the property identified by `property_id` unless it has bookings in any status.
    pub(crate) async fn delete_property(self, property_id: PropertyId) -> DriverResult<()> {
        let mut tx = self.db.begin().await?;
        db::lock_property(tx.ex(), property_id)
            .await
            .not_found_as("PROPERTY_NOT_FOUND", PROPERTY_NOT_FOUND)?;
        let booking_count = db::count_property_bookings(tx.ex(), property_id).await?;
        if booking_count > 0 {
            return Err(DriverError::HasDependents {
                code: "PROPERTY_HAS_BOOKINGS",
                message: format!(
                    "Cannot delete property {} because it has {} bookings",
                    property_id, booking_count
                ),
                details: Some(json!({ "booking_count": booking_count })),
            });
        }
        db::delete_property(tx.ex(), property_id).await?;
        tx.commit().await?;
        info!("Deleted property {}", property_id);
        Ok(())
    }

    /// Reports the active bookings of `property_id` that overlap `range`, or all of its active
    /// bookings if no range is given.
    pub(crate) async fn get_property_availability(
        self,
        property_id: PropertyId,
        range: Option<DateRange>,
    ) -> DriverResult<PropertyCalendar> {
        let mut ex = self.db.ex().await?;
        let property = db::get_property(&mut ex, property_id)
            .await
            .not_found_as("PROPERTY_NOT_FOUND", PROPERTY_NOT_FOUND)?;
        let active =
            db::list_active_bookings(&mut ex, property_id, range.map(|r| r.check_in())).await?;
        let conflicting_bookings = match range {
            Some(range) => find_conflicts(&active, &range, None),
            None => active.iter().map(BookingSummary::from).collect(),
        };
        Ok(PropertyCalendar {
            property_id,
            property_title: property.info.title.as_str().to_owned(),
            date_range: range.map(RequestedDates::from),
            is_available: conflicting_bookings.is_empty(),
            conflicting_bookings,
        })
    }

    /// Gets the cities that have properties, with how many each one has.
    pub(crate) async fn list_cities(self) -> DriverResult<Vec<LocationCount>> {
        let cities = db::list_cities(&mut self.db.ex().await?).await?;
        Ok(cities)
    }

    /// Gets the districts of `city` that have properties, with how many each one has.
    pub(crate) async fn list_districts(self, city: City) -> DriverResult<Vec<LocationCount>> {
        let districts = db::list_districts(&mut self.db.ex().await?, &city).await?;
        Ok(districts)
    }
}
