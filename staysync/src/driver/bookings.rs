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

//! Operations on bookings.

use crate::db::{self, BookingTally};
use crate::driver::availability::find_conflicts;
use crate::driver::{BOOKING_NOT_FOUND, Driver, NotFoundAs, PROPERTY_NOT_FOUND, no_update_data};
use crate::model::*;
use log::{info, warn};
use serde_json::json;
use staysync_core::db::DbError;
use staysync_core::driver::{DriverError, DriverResult};
use staysync_core::model::FieldErrors;
use std::collections::HashMap;
use time::{Date, Duration};

/// Builds the error returned when a stay overlaps the active `conflicts`.
fn date_conflict(conflicts: Vec<BookingSummary>) -> DriverError {
    DriverError::Conflict {
        code: "DATE_CONFLICT",
        message: "The property is already booked for some of the requested dates".to_owned(),
        details: Some(json!({ "conflicting_bookings": conflicts })),
    }
}

/// Builds the error returned when a booking cannot move to the requested status.
fn invalid_transition(e: InvalidTransition) -> DriverError {
    DriverError::Conflict {
        code: "INVALID_STATUS_TRANSITION",
        message: e.to_string(),
        details: Some(json!({
            "current_status": e.from,
            "valid_transitions": e.from.successors(),
        })),
    }
}

/// Rejects stays that start before `today`.
fn check_not_past(check_in: Date, today: Date) -> DriverResult<()> {
    if check_in < today {
        return Err(FieldErrors::single("check_in", "Check-in date cannot be in the past").into());
    }
    Ok(())
}

/// Returns the first day of the month of `day` and the first day of the following month.
pub(crate) fn month_bounds(day: Date) -> (Date, Date) {
    let first = day - Duration::days(i64::from(day.day()) - 1);
    let later = first + Duration::days(31);
    (first, later - Duration::days(i64::from(later.day()) - 1))
}

/// Computes the dashboard from the tallies of `all` bookings, the tallies of the bookings that
/// check in this `month`, and today's `(checking_in, checking_out)` movements.
fn summarize_dashboard(
    all: &[BookingTally],
    month: &[BookingTally],
    movements: (i64, i64),
) -> DashboardSummary {
    let billable = |t: &&BookingTally| t.status != BookingStatus::Cancelled;

    let mut overview = DashboardOverview::default();
    for tally in all {
        overview.total_bookings += tally.booking_count;
        match tally.status {
            BookingStatus::Reserved => overview.pending_bookings += tally.booking_count,
            BookingStatus::CheckedIn => overview.current_guests += tally.booking_count,
            BookingStatus::CheckedOut => overview.completed_bookings += tally.booking_count,
            BookingStatus::Cancelled => overview.cancelled_bookings += tally.booking_count,
        }
    }
    overview.total_revenue = all.iter().filter(billable).map(|t| t.amount).sum();

    let monthly = DashboardMonthly {
        monthly_bookings: month.iter().map(|t| t.booking_count).sum(),
        monthly_revenue: month.iter().filter(billable).map(|t| t.amount).sum(),
    };

    let mut by_channel: HashMap<Channel, (i64, i64)> = HashMap::default();
    for tally in all {
        let (count, revenue) = by_channel.entry(tally.source_channel).or_default();
        *count += tally.booking_count;
        if tally.status != BookingStatus::Cancelled {
            *revenue += tally.amount;
        }
    }
    let mut channels = by_channel
        .into_iter()
        .map(|(source_channel, (booking_count, revenue))| ChannelShare {
            source_channel,
            booking_count,
            percentage: percentage(booking_count, overview.total_bookings),
            revenue,
        })
        .collect::<Vec<ChannelShare>>();
    channels.sort_by(|a, b| {
        b.booking_count.cmp(&a.booking_count).then(a.source_channel.cmp(&b.source_channel))
    });

    DashboardSummary {
        overview,
        today: DashboardToday { checking_in_today: movements.0, checking_out_today: movements.1 },
        monthly,
        channels,
    }
}

impl Driver {
    /// Gets one page of the bookings that match `filter`, newest first.
    pub(crate) async fn list_bookings(
        self,
        filter: BookingFilter,
        page: Page,
    ) -> DriverResult<Paginated<BookingListing>> {
        let bookings = db::list_bookings(&mut self.db.ex().await?, &filter, page).await?;
        Ok(bookings)
    }

    /// Gets the booking identified by `booking_id` with its property and owner.
    pub(crate) async fn get_booking(self, booking_id: BookingId) -> DriverResult<BookingDetails> {
        let today = self.today();
        let mut ex = self.db.ex().await?;
        let details = db::get_booking_details(&mut ex, booking_id, today)
            .await
            .not_found_as("BOOKING_NOT_FOUND", BOOKING_NOT_FOUND)?;
        Ok(details)
    }

    /// Creates a new booking as long as its dates do not overlap any active booking of the same
    /// property.
    ///
    /// The property is locked while its calendar is checked so that concurrent requests for the
    /// same dates cannot both succeed.
    pub(crate) async fn create_booking(self, booking: NewBooking) -> DriverResult<CreatedBooking> {
        check_not_past(booking.range.check_in(), self.today())?;

        let mut tx = self.db.begin().await?;
        let property = db::lock_property(tx.ex(), booking.property_id)
            .await
            .not_found_as("PROPERTY_NOT_FOUND", PROPERTY_NOT_FOUND)?;

        if booking.status.is_active() {
            let candidates = db::list_active_bookings(
                tx.ex(),
                booking.property_id,
                Some(booking.range.check_in()),
            )
            .await?;
            let conflicts = find_conflicts(&candidates, &booking.range, None);
            if !conflicts.is_empty() {
                warn!(
                    "Rejected booking of property {} for {}: {} conflicts",
                    booking.property_id,
                    booking.range,
                    conflicts.len()
                );
                return Err(date_conflict(conflicts));
            }
        }

        let suggested_amount = property.info.base_price_twd.as_i64() * booking.range.nights();
        let amount_used = match booking.total_amount {
            Some(amount) if amount > 0 => amount,
            _ => suggested_amount,
        };
        booking_amount(amount_used)
            .map_err(|e| DriverError::from(FieldErrors::single("total_amount", e.0)))?;
        let created = db::create_booking(tx.ex(), &booking, amount_used).await?;
        let listing = db::get_booking_listing(tx.ex(), created.booking_id).await?;
        tx.commit().await?;

        info!(
            "Created booking {} of property {} for {}",
            created.booking_id, booking.property_id, booking.range
        );
        Ok(CreatedBooking { listing, suggested_amount, amount_used })
    }

    /// Applies `update` to the booking identified by `booking_id` and returns the updated
    /// booking.
    ///
    /// New dates are checked against the other active bookings of the property, and a new
    /// status must be reachable from the current one.
    pub(crate) async fn update_booking(
        self,
        booking_id: BookingId,
        update: BookingUpdate,
    ) -> DriverResult<BookingListing> {
        if update.is_empty() {
            return Err(no_update_data());
        }

        let mut tx = self.db.begin().await?;
        let property_id = db::get_booking(tx.ex(), booking_id)
            .await
            .not_found_as("BOOKING_NOT_FOUND", BOOKING_NOT_FOUND)?
            .property_id;
        db::lock_property(tx.ex(), property_id).await?;
        let current = db::get_booking(tx.ex(), booking_id)
            .await
            .not_found_as("BOOKING_NOT_FOUND", BOOKING_NOT_FOUND)?;

        if let Some(status) = update.status {
            if status != current.status {
                current.status.transition(status).map_err(invalid_transition)?;
            }
        }
        let merged = update
            .apply(&current)
            .map_err(|e| DriverError::from(FieldErrors::single("check_out", e.0)))?;

        if merged.status.is_active() && merged.range() != current.range() {
            let range = merged.range();
            let candidates =
                db::list_active_bookings(tx.ex(), property_id, Some(range.check_in())).await?;
            let conflicts = find_conflicts(&candidates, &range, Some(booking_id));
            if !conflicts.is_empty() {
                return Err(date_conflict(conflicts));
            }
        }

        db::update_booking(tx.ex(), &merged).await?;
        let listing = db::get_booking_listing(tx.ex(), booking_id).await?;
        tx.commit().await?;
        Ok(listing)
    }

    /// Moves the booking identified by `booking_id` to `status` if the transition is allowed.
    pub(crate) async fn change_booking_status(
        self,
        booking_id: BookingId,
        status: BookingStatus,
    ) -> DriverResult<StatusChange> {
        let mut tx = self.db.begin().await?;
        let booking = db::get_booking(tx.ex(), booking_id)
            .await
            .not_found_as("BOOKING_NOT_FOUND", BOOKING_NOT_FOUND)?;
        let new_status = booking.status.transition(status).map_err(invalid_transition)?;
        match db::set_booking_status(tx.ex(), booking_id, booking.status, new_status).await {
            Ok(()) => (),
            Err(DbError::NotFound) => {
                return Err(DriverError::Conflict {
                    code: "INVALID_STATUS_TRANSITION",
                    message: "The status of the booking changed while processing the request"
                        .to_owned(),
                    details: None,
                });
            }
            Err(e) => return Err(e.into()),
        }
        tx.commit().await?;

        info!("Booking {} moved from {} to {}", booking_id, booking.status, new_status);
        Ok(StatusChange {
            booking_id,
            guest_name: booking.guest_name,
            old_status: booking.status,
            new_status,
        })
    }

    /// Deletes the booking identified by `booking_id`, which must have been cancelled.
    pub(crate) async fn delete_booking(self, booking_id: BookingId) -> DriverResult<()> {
        let mut tx = self.db.begin().await?;
        let booking = db::get_booking(tx.ex(), booking_id)
            .await
            .not_found_as("BOOKING_NOT_FOUND", BOOKING_NOT_FOUND)?;
        if booking.status != BookingStatus::Cancelled {
            return Err(DriverError::Conflict {
                code: "CANNOT_DELETE_ACTIVE_BOOKING",
                message: "Only cancelled bookings can be deleted".to_owned(),
                details: Some(json!({ "current_status": booking.status })),
            });
        }
        db::delete_booking(tx.ex(), booking_id).await?;
        tx.commit().await?;
        info!("Deleted booking {}", booking_id);
        Ok(())
    }

    /// Checks whether each of `property_ids` is free over `range`.
    ///
    /// Results follow the order of `property_ids`.  Unknown properties are reported separately
    /// instead of failing the whole request.
    pub(crate) async fn check_availability(
        self,
        property_ids: Vec<PropertyId>,
        range: DateRange,
    ) -> DriverResult<BatchAvailability> {
        check_not_past(range.check_in(), self.today())?;

        let mut ex = self.db.ex().await?;
        let found = db::get_properties(&mut ex, &property_ids).await?;

        let mut properties = Vec::with_capacity(found.len());
        let mut missing_properties = vec![];
        for property_id in &property_ids {
            let Some(property) = found.iter().find(|p| p.property_id == *property_id) else {
                missing_properties.push(MissingProperty {
                    property_id: *property_id,
                    code: "PROPERTY_NOT_FOUND".to_owned(),
                    error: PROPERTY_NOT_FOUND.to_owned(),
                });
                continue;
            };

            let candidates =
                db::list_active_bookings(&mut ex, *property_id, Some(range.check_in())).await?;
            let conflicting_bookings = find_conflicts(&candidates, &range, None);
            let base_price_twd = property.info.base_price_twd.as_i64();
            properties.push(PropertyAvailability {
                property_id: *property_id,
                property_title: property.info.title.as_str().to_owned(),
                base_price_twd,
                stay_nights: range.nights(),
                estimated_total: base_price_twd * range.nights(),
                is_available: conflicting_bookings.is_empty(),
                conflicting_bookings,
            });
        }

        Ok(BatchAvailability {
            check_in: range.check_in(),
            check_out: range.check_out(),
            available_count: properties.iter().filter(|p| p.is_available).count(),
            total_checked: property_ids.len(),
            properties,
            missing_properties,
        })
    }

    /// Summarizes the booking activity overall, today and in the current month.
    pub(crate) async fn get_dashboard(self) -> DriverResult<DashboardSummary> {
        let today = self.today();
        let (month_start, next_month) = month_bounds(today);

        let mut ex = self.db.ex().await?;
        let all = db::tally_bookings(&mut ex, None, None).await?;
        let month = db::tally_bookings(&mut ex, Some(month_start), Some(next_month)).await?;
        let movements = db::count_movements(&mut ex, today).await?;
        Ok(summarize_dashboard(&all, &month, movements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::new_booking;
    use crate::driver::testutils::*;
    use time::macros::date;

    /// Extracts the identifiers of the conflicting bookings reported in a `DATE_CONFLICT` error.
    fn conflicting_ids(e: DriverError) -> Vec<i64> {
        match e {
            DriverError::Conflict { code: "DATE_CONFLICT", details: Some(details), .. } => details
                ["conflicting_bookings"]
                .as_array()
                .unwrap()
                .iter()
                .map(|b| b["booking_id"].as_i64().unwrap())
                .collect(),
            e => panic!("Unexpected error: {:?}", e),
        }
    }

    #[test]
    fn test_month_bounds() {
        assert_eq!(
            (date!(2026 - 05 - 01), date!(2026 - 06 - 01)),
            month_bounds(date!(2026 - 05 - 20))
        );
        assert_eq!(
            (date!(2026 - 02 - 01), date!(2026 - 03 - 01)),
            month_bounds(date!(2026 - 02 - 28))
        );
        assert_eq!(
            (date!(2026 - 12 - 01), date!(2027 - 01 - 01)),
            month_bounds(date!(2026 - 12 - 01))
        );
        assert_eq!(
            (date!(2024 - 02 - 01), date!(2024 - 03 - 01)),
            month_bounds(date!(2024 - 02 - 29))
        );
    }

    #[test]
    fn test_summarize_dashboard() {
        let tally = |status, source_channel, booking_count, amount| BookingTally {
            status,
            source_channel,
            booking_count,
            amount,
        };
        let all = vec![
            tally(BookingStatus::Reserved, Channel::Airbnb, 2, 6000),
            tally(BookingStatus::CheckedIn, Channel::Direct, 1, 2000),
            tally(BookingStatus::Cancelled, Channel::Direct, 2, 5000),
            tally(BookingStatus::CheckedOut, Channel::Agoda, 3, 9000),
        ];
        let month = vec![
            tally(BookingStatus::Reserved, Channel::Airbnb, 1, 3000),
            tally(BookingStatus::Cancelled, Channel::Direct, 1, 2500),
        ];

        let summary = summarize_dashboard(&all, &month, (2, 1));
        assert_eq!(
            DashboardOverview {
                total_bookings: 8,
                pending_bookings: 2,
                current_guests: 1,
                completed_bookings: 3,
                cancelled_bookings: 2,
                total_revenue: 17000,
            },
            summary.overview
        );
        assert_eq!(DashboardToday { checking_in_today: 2, checking_out_today: 1 }, summary.today);
        assert_eq!(
            DashboardMonthly { monthly_bookings: 2, monthly_revenue: 3000 },
            summary.monthly
        );
        assert_eq!(
            vec![
                ChannelShare {
                    source_channel: Channel::Direct,
                    booking_count: 3,
                    percentage: 37.5,
                    revenue: 2000,
                },
                ChannelShare {
                    source_channel: Channel::Agoda,
                    booking_count: 3,
                    percentage: 37.5,
                    revenue: 9000,
                },
                ChannelShare {
                    source_channel: Channel::Airbnb,
                    booking_count: 2,
                    percentage: 25.0,
                    revenue: 6000,
                },
            ],
            summary.channels
        );
    }

    #[test]
    fn test_summarize_dashboard_empty() {
        let summary = summarize_dashboard(&[], &[], (0, 0));
        assert_eq!(DashboardOverview::default(), summary.overview);
        assert!(summary.channels.is_empty());
    }

    #[tokio::test]
    async fn test_create_booking_defaults_amount() {
        let context = TestContext::setup().await;
        let owner = context.create_user("owner@example.com").await;
        let property = context.create_property(owner.user_id, 2000).await;

        let booking = new_booking(
            property.property_id,
            "Lin Guest",
            date!(2026 - 06 - 01),
            date!(2026 - 06 - 04),
        );
        let created = context.driver().create_booking(booking).await.unwrap();
        assert_eq!(6000, created.suggested_amount);
        assert_eq!(6000, created.amount_used);
        assert_eq!(6000, created.listing.booking.total_amount);
        assert_eq!(3, created.listing.stay_nights);
        assert_eq!("Cozy loft downtown", created.listing.property_title);

        let mut booking = new_booking(
            property.property_id,
            "Lin Guest",
            date!(2026 - 06 - 10),
            date!(2026 - 06 - 11),
        );
        booking.total_amount = Some(1500);
        let created = context.driver().create_booking(booking).await.unwrap();
        assert_eq!(2000, created.suggested_amount);
        assert_eq!(1500, created.amount_used);

        let mut booking = new_booking(
            property.property_id,
            "Lin Guest",
            date!(2026 - 06 - 20),
            date!(2026 - 06 - 21),
        );
        booking.total_amount = Some(0);
        let created = context.driver().create_booking(booking).await.unwrap();
        assert_eq!(2000, created.amount_used);
    }

    /// Races `racers` requests for the same stay and checks that exactly one of them wins.
    async fn do_concurrent_create_booking_test(context: TestContext, racers: usize) {
        let owner = context.create_user("owner@example.com").await;
        let property = context.create_property(owner.user_id, 2000).await;

        let mut handles = Vec::with_capacity(racers);
        for i in 0..racers {
            let booking = new_booking(
                property.property_id,
                &format!("Guest {}", i),
                date!(2026 - 06 - 01),
                date!(2026 - 06 - 03),
            );
            handles.push(tokio::spawn(context.driver().create_booking(booking)));
        }

        let mut created = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(DriverError::Conflict { code: "DATE_CONFLICT", .. }) => conflicts += 1,
                Err(e) => panic!("Unexpected error: {:?}", e),
            }
        }
        assert_eq!((1, racers - 1), (created, conflicts));

        let mut ex = context.ex().await;
        assert_eq!(1, db::count_property_bookings(&mut ex, property.property_id).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_create_booking_sqlite() {
        do_concurrent_create_booking_test(TestContext::setup().await, 8).await;
    }

    #[cfg(feature = "postgres")]
    #[ignore = "Requires environment configuration and is expensive"]
    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_create_booking_postgres() {
        use staysync_core::db::Db;

        let pgdb = staysync_core::db::postgres::testutils::setup().await;
        db::init_schema(&mut pgdb.ex().await.unwrap()).await.unwrap();
        do_concurrent_create_booking_test(TestContext::with_db(std::sync::Arc::new(pgdb)), 8).await;
    }

    #[tokio::test]
    async fn test_create_booking_rejects_default_amount_over_limit() {
        let context = TestContext::setup().await;
        let owner = context.create_user("owner@example.com").await;
        let property = context.create_property(owner.user_id, 50000).await;

        // 50000 TWD over 200001 nights is just above the largest amount a booking can hold.
        let check_in = date!(2026 - 06 - 01);
        let booking = new_booking(
            property.property_id,
            "Lin Guest",
            check_in,
            check_in + Duration::days(200_001),
        );
        match context.driver().create_booking(booking).await {
            Err(DriverError::Validation(errors)) => {
                assert_eq!(vec!["total_amount"], errors.fields())
            }
            e => panic!("Unexpected result: {:?}", e),
        }

        let mut ex = context.ex().await;
        assert_eq!(0, db::count_property_bookings(&mut ex, property.property_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_booking_rejects_past_and_unknown_property() {
        let context = TestContext::setup().await;
        let owner = context.create_user("owner@example.com").await;
        let property = context.create_property(owner.user_id, 2000).await;

        let booking = new_booking(
            property.property_id,
            "Lin Guest",
            date!(2026 - 05 - 19),
            date!(2026 - 05 - 21),
        );
        match context.driver().create_booking(booking).await {
            Err(DriverError::Validation(errors)) => assert_eq!(vec!["check_in"], errors.fields()),
            e => panic!("Unexpected result: {:?}", e),
        }

        let booking = new_booking(
            PropertyId::new(99).unwrap(),
            "Lin Guest",
            date!(2026 - 05 - 20),
            date!(2026 - 05 - 21),
        );
        assert_eq!(
            DriverError::not_found("PROPERTY_NOT_FOUND", "Property not found"),
            context.driver().create_booking(booking).await.unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_create_booking_conflict_lists_overlaps() {
        let context = TestContext::setup().await;
        let owner = context.create_user("owner@example.com").await;
        let property = context.create_property(owner.user_id, 2000).await;

        let first = new_booking(
            property.property_id,
            "Guest A",
            date!(2026 - 06 - 01),
            date!(2026 - 06 - 03),
        );
        let a = context.driver().create_booking(first).await.unwrap();

        let second = new_booking(
            property.property_id,
            "Guest B",
            date!(2026 - 06 - 02),
            date!(2026 - 06 - 04),
        );
        let e = context.driver().create_booking(second).await.unwrap_err();
        assert_eq!(vec![a.listing.booking.booking_id.as_i64()], conflicting_ids(e));

        let touching = new_booking(
            property.property_id,
            "Guest B",
            date!(2026 - 06 - 03),
            date!(2026 - 06 - 04),
        );
        context.driver().create_booking(touching).await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_booking_frees_dates() {
        let context = TestContext::setup().await;
        let owner = context.create_user("owner@example.com").await;
        let property = context.create_property(owner.user_id, 2000).await;

        let first = new_booking(
            property.property_id,
            "Guest A",
            date!(2026 - 06 - 01),
            date!(2026 - 06 - 03),
        );
        let a = context.driver().create_booking(first).await.unwrap();
        let a_id = a.listing.booking.booking_id;
        context.driver().change_booking_status(a_id, BookingStatus::Cancelled).await.unwrap();

        let second = new_booking(
            property.property_id,
            "Guest B",
            date!(2026 - 06 - 01),
            date!(2026 - 06 - 03),
        );
        context.driver().create_booking(second).await.unwrap();
    }

    #[tokio::test]
    async fn test_status_transitions() {
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
        let id = booking.booking_id;

        match context.driver().change_booking_status(id, BookingStatus::CheckedOut).await {
            Err(DriverError::Conflict { code, details, .. }) => {
                assert_eq!("INVALID_STATUS_TRANSITION", code);
                assert_eq!(
                    Some(json!({
                        "current_status": "Reserved",
                        "valid_transitions": ["CheckedIn", "Cancelled"],
                    })),
                    details
                );
            }
            e => panic!("Unexpected result: {:?}", e),
        }

        let change =
            context.driver().change_booking_status(id, BookingStatus::CheckedIn).await.unwrap();
        assert_eq!(BookingStatus::Reserved, change.old_status);
        assert_eq!(BookingStatus::CheckedIn, change.new_status);
        assert_eq!("Some Guest", change.guest_name.as_str());

        let change =
            context.driver().change_booking_status(id, BookingStatus::CheckedOut).await.unwrap();
        assert_eq!(BookingStatus::CheckedIn, change.old_status);

        for status in BookingStatus::ALL {
            match context.driver().change_booking_status(id, status).await {
                Err(DriverError::Conflict { code, .. }) => {
                    assert_eq!("INVALID_STATUS_TRANSITION", code)
                }
                e => panic!("Unexpected result: {:?}", e),
            }
        }

        assert_eq!(
            DriverError::not_found("BOOKING_NOT_FOUND", "Booking not found"),
            context
                .driver()
                .change_booking_status(BookingId::new(99).unwrap(), BookingStatus::CheckedIn)
                .await
                .unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_update_booking_dates() {
        let context = TestContext::setup().await;
        let owner = context.create_user("owner@example.com").await;
        let property = context.create_property(owner.user_id, 2000).await;
        let pid = property.property_id;
        let first = context
            .create_booking(
                pid,
                date!(2026 - 06 - 01),
                date!(2026 - 06 - 03),
                BookingStatus::Reserved,
            )
            .await;
        let second = context
            .create_booking(
                pid,
                date!(2026 - 06 - 05),
                date!(2026 - 06 - 07),
                BookingStatus::Reserved,
            )
            .await;

        let update = BookingUpdate { check_out: Some(date!(2026 - 06 - 04)), ..Default::default() };
        let updated = context.driver().update_booking(first.booking_id, update).await.unwrap();
        assert_eq!(date!(2026 - 06 - 04), updated.booking.check_out);
        assert_eq!(3, updated.stay_nights);

        let update = BookingUpdate { check_out: Some(date!(2026 - 06 - 06)), ..Default::default() };
        let e = context.driver().update_booking(first.booking_id, update).await.unwrap_err();
        assert_eq!(vec![second.booking_id.as_i64()], conflicting_ids(e));

        let update = BookingUpdate { check_in: Some(date!(2026 - 06 - 04)), ..Default::default() };
        match context.driver().update_booking(first.booking_id, update).await {
            Err(DriverError::Validation(errors)) => assert_eq!(vec!["check_out"], errors.fields()),
            e => panic!("Unexpected result: {:?}", e),
        }

        let update = BookingUpdate {
            check_in: Some(date!(2026 - 06 - 06)),
            check_out: Some(date!(2026 - 06 - 08)),
            ..Default::default()
        };
        let updated = context.driver().update_booking(second.booking_id, update).await.unwrap();
        assert_eq!(date!(2026 - 06 - 06), updated.booking.check_in);
    }

    #[tokio::test]
    async fn test_update_booking_status_and_errors() {
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
        let id = booking.booking_id;

        match context.driver().update_booking(id, BookingUpdate::default()).await {
            Err(DriverError::InvalidInput { code, .. }) => assert_eq!("NO_UPDATE_DATA", code),
            e => panic!("Unexpected result: {:?}", e),
        }

        let update =
            BookingUpdate { status: Some(BookingStatus::CheckedOut), ..Default::default() };
        match context.driver().update_booking(id, update).await {
            Err(DriverError::Conflict { code, .. }) => {
                assert_eq!("INVALID_STATUS_TRANSITION", code)
            }
            e => panic!("Unexpected result: {:?}", e),
        }

        let update = BookingUpdate {
            status: Some(BookingStatus::Reserved),
            total_amount: Some(4321),
            ..Default::default()
        };
        let updated = context.driver().update_booking(id, update).await.unwrap();
        assert_eq!(4321, updated.booking.total_amount);

        let update = BookingUpdate { total_amount: Some(1), ..Default::default() };
        assert_eq!(
            DriverError::not_found("BOOKING_NOT_FOUND", "Booking not found"),
            context.driver().update_booking(BookingId::new(99).unwrap(), update).await.unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_delete_only_cancelled() {
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
        let id = booking.booking_id;

        match context.driver().delete_booking(id).await {
            Err(DriverError::Conflict { code, details, .. }) => {
                assert_eq!("CANNOT_DELETE_ACTIVE_BOOKING", code);
                assert_eq!(Some(json!({"current_status": "Reserved"})), details);
            }
            e => panic!("Unexpected result: {:?}", e),
        }

        context.driver().change_booking_status(id, BookingStatus::Cancelled).await.unwrap();
        context.driver().delete_booking(id).await.unwrap();
        assert_eq!(
            DriverError::not_found("BOOKING_NOT_FOUND", "Booking not found"),
            context.driver().get_booking(id).await.unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_get_booking_phase_follows_clock() {
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

        let details = context.driver().get_booking(booking.booking_id).await.unwrap();
        assert_eq!(StayPhase::Upcoming, details.current_status);
        assert_eq!(2000, details.base_price_twd);
        assert_eq!("owner@example.com", details.owner_email);

        context.clock().advance(std::time::Duration::from_secs(13 * 24 * 3600));
        let details = context.driver().get_booking(booking.booking_id).await.unwrap();
        assert_eq!(StayPhase::InStay, details.current_status);

        context.clock().advance(std::time::Duration::from_secs(10 * 24 * 3600));
        let details = context.driver().get_booking(booking.booking_id).await.unwrap();
        assert_eq!(StayPhase::Ended, details.current_status);
    }

    #[tokio::test]
    async fn test_check_availability_batch() {
        let context = TestContext::setup().await;
        let owner = context.create_user("owner@example.com").await;
        let free = context.create_property(owner.user_id, 2000).await;
        let booked = context.create_property(owner.user_id, 3000).await;
        let blocker = context
            .create_booking(
                booked.property_id,
                date!(2026 - 07 - 02),
                date!(2026 - 07 - 03),
                BookingStatus::CheckedIn,
            )
            .await;

        let missing = PropertyId::new(99).unwrap();
        let range = DateRange::new(date!(2026 - 07 - 01), date!(2026 - 07 - 05)).unwrap();
        let batch = context
            .driver()
            .check_availability(vec![booked.property_id, missing, free.property_id], range)
            .await
            .unwrap();

        assert_eq!(3, batch.total_checked);
        assert_eq!(1, batch.available_count);
        assert_eq!(2, batch.properties.len());

        let first = &batch.properties[0];
        assert_eq!(booked.property_id, first.property_id);
        assert!(!first.is_available);
        assert_eq!(12000, first.estimated_total);
        assert_eq!(
            vec![blocker.booking_id],
            first.conflicting_bookings.iter().map(|b| b.booking_id).collect::<Vec<_>>()
        );

        let second = &batch.properties[1];
        assert_eq!(free.property_id, second.property_id);
        assert!(second.is_available);
        assert_eq!(4, second.stay_nights);
        assert_eq!(8000, second.estimated_total);

        assert_eq!(
            vec![MissingProperty {
                property_id: missing,
                code: "PROPERTY_NOT_FOUND".to_owned(),
                error: "Property not found".to_owned(),
            }],
            batch.missing_properties
        );
    }

    #[tokio::test]
    async fn test_dashboard() {
        let context = TestContext::setup().await;
        let owner = context.create_user("owner@example.com").await;
        let property = context.create_property(owner.user_id, 2000).await;
        let pid = property.property_id;
        context
            .create_booking(
                pid,
                date!(2026 - 05 - 18),
                date!(2026 - 05 - 20),
                BookingStatus::CheckedOut,
            )
            .await;
        context
            .create_booking(
                pid,
                date!(2026 - 05 - 20),
                date!(2026 - 05 - 22),
                BookingStatus::CheckedIn,
            )
            .await;
        context
            .create_booking(
                pid,
                date!(2026 - 06 - 01),
                date!(2026 - 06 - 03),
                BookingStatus::Cancelled,
            )
            .await;

        let summary = context.driver().get_dashboard().await.unwrap();
        assert_eq!(3, summary.overview.total_bookings);
        assert_eq!(1, summary.overview.current_guests);
        assert_eq!(2000, summary.overview.total_revenue);
        assert_eq!(DashboardToday { checking_in_today: 1, checking_out_today: 1 }, summary.today);
        assert_eq!(
            DashboardMonthly { monthly_bookings: 2, monthly_revenue: 2000 },
            summary.monthly
        );
        assert_eq!(
            vec![ChannelShare {
                source_channel: Channel::Direct,
                booking_count: 3,
                percentage: 100.0,
                revenue: 2000,
            }],
            summary.channels
        );
    }
}
