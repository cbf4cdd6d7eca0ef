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

//! Reservations and the rules that govern their lifecycle.

use crate::model::{BookingId, PropertyId, format_date};
use serde::{Deserialize, Serialize};
use staysync_core::model::{ModelError, ModelResult};
use std::fmt;
use time::Date;

bounded_string!(
    /// Name of the guest holding a booking.
    GuestName,
    "Guest name",
    2,
    100
);

bounded_string!(
    /// National ID or passport number of a guest.
    GuestIdNo,
    "Guest ID number",
    8,
    20
);

bounded_string!(
    /// Free-form note attached to a booking.
    SpecialNote,
    "Special note",
    1,
    1000
);

/// Largest amount in TWD that a single booking can be charged.
pub const MAX_AMOUNT_TWD: i64 = 10_000_000_000;

/// Validates a booking amount in TWD.
pub fn booking_amount(twd: i64) -> ModelResult<i64> {
    if twd < 0 {
        return Err(ModelError("Total amount cannot be negative".to_owned()));
    }
    if twd > MAX_AMOUNT_TWD {
        return Err(ModelError(format!("Total amount cannot exceed {} TWD", MAX_AMOUNT_TWD)));
    }
    Ok(twd)
}

/// Sales channel through which a booking was made.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Channel {
    /// Booked directly with the owner.
    Direct,

    /// Booked through Airbnb.
    Airbnb,

    /// Booked through Booking.com.
    #[serde(rename = "Booking.com")]
    BookingCom,

    /// Booked through Agoda.
    Agoda,
}

impl Channel {
    /// All known channels.
    pub const ALL: [Channel; 4] =
        [Channel::Direct, Channel::Airbnb, Channel::BookingCom, Channel::Agoda];

    /// Returns the textual representation of the channel, as used in requests and storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Direct => "Direct",
            Channel::Airbnb => "Airbnb",
            Channel::BookingCom => "Booking.com",
            Channel::Agoda => "Agoda",
        }
    }

    /// Parses a channel from its textual representation.
    pub fn parse(s: &str) -> ModelResult<Self> {
        Channel::ALL.into_iter().find(|c| c.as_str() == s.trim()).ok_or_else(|| {
            ModelError(
                "Source channel must be one of Direct, Airbnb, Booking.com, Agoda".to_owned(),
            )
        })
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a booking.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum BookingStatus {
    /// The stay is booked but the guest has not arrived.
    Reserved,

    /// The guest is staying at the property.
    CheckedIn,

    /// The guest left.  Terminal.
    CheckedOut,

    /// The booking was called off.  Terminal.
    Cancelled,
}

/// Error returned when a booking cannot move between two statuses.
#[derive(Debug, PartialEq, thiserror::Error)]
#[error("Cannot change status from {from} to {to}")]
pub struct InvalidTransition {
    /// Status the booking is in.
    pub from: BookingStatus,

    /// Status that was requested.
    pub to: BookingStatus,
}

impl BookingStatus {
    /// All known statuses.
    pub const ALL: [BookingStatus; 4] = [
        BookingStatus::Reserved,
        BookingStatus::CheckedIn,
        BookingStatus::CheckedOut,
        BookingStatus::Cancelled,
    ];

    /// Statuses whose bookings hold their dates.
    pub const ACTIVE: [BookingStatus; 2] = [BookingStatus::Reserved, BookingStatus::CheckedIn];

    /// Returns the textual representation of the status, as used in requests and storage.
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Reserved => "Reserved",
            BookingStatus::CheckedIn => "CheckedIn",
            BookingStatus::CheckedOut => "CheckedOut",
            BookingStatus::Cancelled => "Cancelled",
        }
    }

    /// Parses a status from its textual representation.
    pub fn parse(s: &str) -> ModelResult<Self> {
        BookingStatus::ALL.into_iter().find(|st| st.as_str() == s.trim()).ok_or_else(|| {
            ModelError(
                "Status must be one of Reserved, CheckedIn, CheckedOut, Cancelled".to_owned(),
            )
        })
    }

    /// Returns true if bookings in this status block their dates for other guests.
    pub fn is_active(self) -> bool {
        BookingStatus::ACTIVE.contains(&self)
    }

    /// Returns the statuses that a booking in this status may move to.
    pub fn successors(self) -> &'static [BookingStatus] {
        match self {
            BookingStatus::Reserved => &[BookingStatus::CheckedIn, BookingStatus::Cancelled],
            BookingStatus::CheckedIn => &[BookingStatus::CheckedOut],
            BookingStatus::CheckedOut => &[],
            BookingStatus::Cancelled => &[],
        }
    }

    /// Validates the move from this status to `to`, returning the new status.
    pub fn transition(self, to: BookingStatus) -> Result<BookingStatus, InvalidTransition> {
        if self.successors().contains(&to) {
            Ok(to)
        } else {
            Err(InvalidTransition { from: self, to })
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stay as a half-open `[check_in, check_out)` range of dates.  Never empty.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DateRange {
    /// First night of the stay.
    check_in: Date,

    /// Departure day, which is not a night of the stay.
    check_out: Date,
}

impl DateRange {
    /// Creates a new range, making sure that `check_out` is after `check_in`.
    pub fn new(check_in: Date, check_out: Date) -> ModelResult<Self> {
        if check_out <= check_in {
            return Err(ModelError("Check-out date must be after the check-in date".to_owned()));
        }
        Ok(Self { check_in, check_out })
    }

    /// Returns the arrival date.
    pub fn check_in(&self) -> Date {
        self.check_in
    }

    /// Returns the departure date.
    pub fn check_out(&self) -> Date {
        self.check_out
    }

    /// Returns the number of nights in the stay.
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).whole_days()
    }

    /// Returns true if the two stays share at least one night.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", format_date(self.check_in), format_date(self.check_out))
    }
}

/// A persisted booking.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Booking {
    /// Identifier assigned by the database.
    pub booking_id: BookingId,

    /// Property being booked.
    pub property_id: PropertyId,

    /// Channel through which the booking arrived.
    pub source_channel: Channel,

    /// Name of the guest.
    pub guest_name: GuestName,

    /// ID or passport number of the guest.
    pub guest_id_no: GuestIdNo,

    /// Arrival date.
    pub check_in: Date,

    /// Departure date, always after `check_in`.
    pub check_out: Date,

    /// Amount charged for the stay in TWD.
    pub total_amount: i64,

    /// Whether `total_amount` already includes business tax.
    pub is_tax_included: bool,

    /// Whether breakfast is served.
    pub breakfast_included: bool,

    /// Free-form note.
    pub special_note: Option<SpecialNote>,

    /// Lifecycle status.
    pub status: BookingStatus,
}

impl Booking {
    /// Returns the stay covered by this booking.
    pub fn range(&self) -> DateRange {
        DateRange { check_in: self.check_in, check_out: self.check_out }
    }

    /// Returns the number of nights of the stay.
    pub fn stay_nights(&self) -> i64 {
        self.range().nights()
    }
}

/// A booking to be created.
#[derive(Clone, Debug, PartialEq)]
pub struct NewBooking {
    /// Property being booked.
    pub property_id: PropertyId,

    /// Channel through which the booking arrived.
    pub source_channel: Channel,

    /// Name of the guest.
    pub guest_name: GuestName,

    /// ID or passport number of the guest.
    pub guest_id_no: GuestIdNo,

    /// Dates of the stay.
    pub range: DateRange,

    /// Amount to charge.  If missing or zero, the property's base price for the stay is used.
    pub total_amount: Option<i64>,

    /// Whether the amount includes business tax.
    pub is_tax_included: bool,

    /// Whether breakfast is served.
    pub breakfast_included: bool,

    /// Free-form note.
    pub special_note: Option<SpecialNote>,

    /// Initial status.
    pub status: BookingStatus,
}

/// Changes to apply to an existing booking.
#[derive(Debug, Default, PartialEq)]
pub struct BookingUpdate {
    /// New channel.
    pub source_channel: Option<Channel>,

    /// New guest name.
    pub guest_name: Option<GuestName>,

    /// New guest ID.
    pub guest_id_no: Option<GuestIdNo>,

    /// New arrival date.
    pub check_in: Option<Date>,

    /// New departure date.
    pub check_out: Option<Date>,

    /// New amount.
    pub total_amount: Option<i64>,

    /// New tax inclusion flag.
    pub is_tax_included: Option<bool>,

    /// New breakfast flag.
    pub breakfast_included: Option<bool>,

    /// New note, where `Some(None)` clears it.
    pub special_note: Option<Option<SpecialNote>>,

    /// New status, which must be reachable from the current one.
    pub status: Option<BookingStatus>,
}

impl BookingUpdate {
    /// Returns true if the update does not modify any field.
    pub fn is_empty(&self) -> bool {
        self.source_channel.is_none()
            && self.guest_name.is_none()
            && self.guest_id_no.is_none()
            && self.check_in.is_none()
            && self.check_out.is_none()
            && self.total_amount.is_none()
            && self.is_tax_included.is_none()
            && self.breakfast_included.is_none()
            && self.special_note.is_none()
            && self.status.is_none()
    }

    /// Applies the update on top of `booking`, returning the merged booking.
    ///
    /// Fails if the merged dates do not form a valid stay.
    pub fn apply(&self, booking: &Booking) -> ModelResult<Booking> {
        let check_in = self.check_in.unwrap_or(booking.check_in);
        let check_out = self.check_out.unwrap_or(booking.check_out);
        let range = DateRange::new(check_in, check_out)?;
        Ok(Booking {
            booking_id: booking.booking_id,
            property_id: booking.property_id,
            source_channel: self.source_channel.unwrap_or(booking.source_channel),
            guest_name: self.guest_name.clone().unwrap_or_else(|| booking.guest_name.clone()),
            guest_id_no: self.guest_id_no.clone().unwrap_or_else(|| booking.guest_id_no.clone()),
            check_in: range.check_in,
            check_out: range.check_out,
            total_amount: self.total_amount.unwrap_or(booking.total_amount),
            is_tax_included: self.is_tax_included.unwrap_or(booking.is_tax_included),
            breakfast_included: self.breakfast_included.unwrap_or(booking.breakfast_included),
            special_note: match &self.special_note {
                Some(note) => note.clone(),
                None => booking.special_note.clone(),
            },
            status: self.status.unwrap_or(booking.status),
        })
    }
}

/// Criteria to select bookings in listings.
#[derive(Debug, Default, PartialEq)]
pub struct BookingFilter {
    /// Status to match.
    pub status: Option<BookingStatus>,

    /// Channel to match.
    pub source_channel: Option<Channel>,

    /// Property to match.
    pub property_id: Option<PropertyId>,

    /// Case-insensitive substring of the guest name.
    pub guest_name: Option<String>,

    /// Earliest check-in date to include.
    pub start_date: Option<Date>,

    /// Latest check-out date to include.
    pub end_date: Option<Date>,
}

/// Key facts of a booking, used when listing bookings under another entity.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct BookingSummary {
    /// Identifier of the booking.
    pub booking_id: BookingId,

    /// Name of the guest.
    pub guest_name: GuestName,

    /// Arrival date.
    pub check_in: Date,

    /// Departure date.
    pub check_out: Date,

    /// Amount charged.
    pub total_amount: i64,

    /// Lifecycle status.
    pub status: BookingStatus,

    /// Sales channel.
    pub source_channel: Channel,
}

impl From<&Booking> for BookingSummary {
    fn from(booking: &Booking) -> Self {
        Self {
            booking_id: booking.booking_id,
            guest_name: booking.guest_name.clone(),
            check_in: booking.check_in,
            check_out: booking.check_out,
            total_amount: booking.total_amount,
            status: booking.status,
            source_channel: booking.source_channel,
        }
    }
}

/// A booking as shown in listings, with the location of the property.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct BookingListing {
    /// The booking.
    #[serde(flatten)]
    pub booking: Booking,

    /// Title of the booked property.
    pub property_title: String,

    /// City of the booked property.
    pub property_city: String,

    /// District of the booked property.
    pub property_district: String,

    /// Name of the owner of the property.
    pub owner_name: String,

    /// Number of nights of the stay.
    pub stay_nights: i64,
}

/// Where today falls with respect to a stay.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StayPhase {
    /// The stay has not started.
    Upcoming,

    /// Today is between the check-in and check-out dates, both included.
    InStay,

    /// The stay is over.
    Ended,
}

impl StayPhase {
    /// Classifies `range` with respect to `today`.
    pub fn of(range: &DateRange, today: Date) -> Self {
        if range.check_in > today {
            StayPhase::Upcoming
        } else if range.check_out < today {
            StayPhase::Ended
        } else {
            StayPhase::InStay
        }
    }
}

/// A booking with everything known about its property and owner.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct BookingDetails {
    /// The booking along with its property location.
    #[serde(flatten)]
    pub listing: BookingListing,

    /// Address of the property.
    pub property_address: String,

    /// Nightly base price of the property.
    pub base_price_twd: i64,

    /// Email of the owner.
    pub owner_email: String,

    /// Phone of the owner.
    pub owner_phone: Option<String>,

    /// Company tax ID of the owner.
    pub owner_tax_id: Option<String>,

    /// Where today falls with respect to the stay.
    pub current_status: StayPhase,
}

/// Result of creating a booking.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CreatedBooking {
    /// The new booking.
    #[serde(flatten)]
    pub listing: BookingListing,

    /// Base price of the property times the number of nights.
    pub suggested_amount: i64,

    /// Amount that was recorded for the booking.
    pub amount_used: i64,
}

/// Result of a status change.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct StatusChange {
    /// The modified booking.
    pub booking_id: BookingId,

    /// Name of the guest.
    pub guest_name: GuestName,

    /// Status before the change.
    pub old_status: BookingStatus,

    /// Status after the change.
    pub new_status: BookingStatus,
}

/// Dates requested in an availability query.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RequestedDates {
    /// Arrival date.
    pub start_date: Date,

    /// Departure date.
    pub end_date: Date,
}

impl From<DateRange> for RequestedDates {
    fn from(range: DateRange) -> Self {
        Self { start_date: range.check_in, end_date: range.check_out }
    }
}

/// Availability of a single property.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PropertyCalendar {
    /// Property that was checked.
    pub property_id: PropertyId,

    /// Title of the property.
    pub property_title: String,

    /// Dates that were checked, if any.  Without dates, every active booking is reported.
    pub date_range: Option<RequestedDates>,

    /// Whether no active booking blocks the requested dates.
    pub is_available: bool,

    /// Active bookings that block the dates.
    pub conflicting_bookings: Vec<BookingSummary>,
}

/// Availability of a property within a batch query.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PropertyAvailability {
    /// Property that was checked.
    pub property_id: PropertyId,

    /// Title of the property.
    pub property_title: String,

    /// Nightly base price.
    pub base_price_twd: i64,

    /// Number of nights requested.
    pub stay_nights: i64,

    /// Base price for the whole stay.
    pub estimated_total: i64,

    /// Whether no active booking blocks the requested dates.
    pub is_available: bool,

    /// Active bookings that block the dates.
    pub conflicting_bookings: Vec<BookingSummary>,
}

/// A property of a batch query that does not exist.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct MissingProperty {
    /// Identifier that was requested.
    pub property_id: PropertyId,

    /// Stable error code.
    pub code: String,

    /// Human-readable description.
    pub error: String,
}

/// Result of checking the availability of several properties for the same stay.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct BatchAvailability {
    /// Arrival date.
    pub check_in: Date,

    /// Departure date.
    pub check_out: Date,

    /// Availability of each existing property, in request order.
    pub properties: Vec<PropertyAvailability>,

    /// Requested properties that do not exist, in request order.
    pub missing_properties: Vec<MissingProperty>,

    /// Number of existing properties that are available.
    pub available_count: usize,

    /// Number of properties that were requested.
    pub total_checked: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn range(check_in: Date, check_out: Date) -> DateRange {
        DateRange::new(check_in, check_out).unwrap()
    }

    #[test]
    fn test_channel_wire_format() {
        assert_eq!("\"Booking.com\"", serde_json::to_string(&Channel::BookingCom).unwrap());
        assert_eq!(Channel::Agoda, serde_json::from_str::<Channel>("\"Agoda\"").unwrap());
        assert_eq!(Channel::BookingCom, Channel::parse("Booking.com").unwrap());
        assert!(Channel::parse("Expedia").is_err());
        for channel in Channel::ALL {
            assert_eq!(channel, Channel::parse(channel.as_str()).unwrap());
        }
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!("\"CheckedIn\"", serde_json::to_string(&BookingStatus::CheckedIn).unwrap());
        for status in BookingStatus::ALL {
            assert_eq!(status, BookingStatus::parse(status.as_str()).unwrap());
        }
        assert!(BookingStatus::parse("Pending").is_err());
    }

    #[test]
    fn test_status_is_active() {
        assert!(BookingStatus::Reserved.is_active());
        assert!(BookingStatus::CheckedIn.is_active());
        assert!(!BookingStatus::CheckedOut.is_active());
        assert!(!BookingStatus::Cancelled.is_active());
    }

    #[test]
    fn test_status_transitions_table() {
        use BookingStatus::*;
        let allowed = [(Reserved, CheckedIn), (Reserved, Cancelled), (CheckedIn, CheckedOut)];
        for from in BookingStatus::ALL {
            for to in BookingStatus::ALL {
                let result = from.transition(to);
                if allowed.contains(&(from, to)) {
                    assert_eq!(Ok(to), result, "{} -> {} should be allowed", from, to);
                } else {
                    assert_eq!(
                        Err(InvalidTransition { from, to }),
                        result,
                        "{} -> {} should be rejected",
                        from,
                        to
                    );
                }
            }
        }
    }

    #[test]
    fn test_status_terminal_states() {
        assert!(BookingStatus::CheckedOut.successors().is_empty());
        assert!(BookingStatus::Cancelled.successors().is_empty());
        assert_eq!(
            "Cannot change status from Reserved to CheckedOut",
            BookingStatus::Reserved.transition(BookingStatus::CheckedOut).unwrap_err().to_string()
        );
    }

    #[test]
    fn test_date_range_validation() {
        assert!(DateRange::new(date!(2026 - 06 - 01), date!(2026 - 06 - 01)).is_err());
        assert!(DateRange::new(date!(2026 - 06 - 02), date!(2026 - 06 - 01)).is_err());
        assert_eq!(2, range(date!(2026 - 06 - 01), date!(2026 - 06 - 03)).nights());
        assert_eq!(1, range(date!(2026 - 12 - 31), date!(2027 - 01 - 01)).nights());
    }

    #[test]
    fn test_date_range_overlaps() {
        let a = range(date!(2026 - 06 - 01), date!(2026 - 06 - 03));

        // Partial overlaps, in both directions.
        assert!(a.overlaps(&range(date!(2026 - 06 - 02), date!(2026 - 06 - 04))));
        assert!(a.overlaps(&range(date!(2026 - 05 - 30), date!(2026 - 06 - 02))));

        // Containment.
        assert!(a.overlaps(&range(date!(2026 - 05 - 01), date!(2026 - 07 - 01))));
        assert!(a.overlaps(&range(date!(2026 - 06 - 01), date!(2026 - 06 - 02))));
        assert!(a.overlaps(&a));

        // Back-to-back stays share the changeover day but no night.
        assert!(!a.overlaps(&range(date!(2026 - 06 - 03), date!(2026 - 06 - 05))));
        assert!(!a.overlaps(&range(date!(2026 - 05 - 30), date!(2026 - 06 - 01))));
        assert!(!a.overlaps(&range(date!(2026 - 07 - 01), date!(2026 - 07 - 05))));
    }

    #[test]
    fn test_date_range_overlap_is_symmetric() {
        let days = [
            date!(2026 - 06 - 01),
            date!(2026 - 06 - 02),
            date!(2026 - 06 - 03),
            date!(2026 - 06 - 04),
            date!(2026 - 06 - 05),
        ];
        for a1 in days {
            for a2 in days.into_iter().filter(|d| *d > a1) {
                for b1 in days {
                    for b2 in days.into_iter().filter(|d| *d > b1) {
                        let a = range(a1, a2);
                        let b = range(b1, b2);
                        assert_eq!(a1 < b2 && b1 < a2, a.overlaps(&b));
                        assert_eq!(a.overlaps(&b), b.overlaps(&a));
                    }
                }
            }
        }
    }

    #[test]
    fn test_stay_phase() {
        let stay = range(date!(2026 - 06 - 01), date!(2026 - 06 - 03));
        assert_eq!(StayPhase::Upcoming, StayPhase::of(&stay, date!(2026 - 05 - 31)));
        assert_eq!(StayPhase::InStay, StayPhase::of(&stay, date!(2026 - 06 - 01)));
        assert_eq!(StayPhase::InStay, StayPhase::of(&stay, date!(2026 - 06 - 03)));
        assert_eq!(StayPhase::Ended, StayPhase::of(&stay, date!(2026 - 06 - 04)));
        assert_eq!("\"in_stay\"", serde_json::to_string(&StayPhase::InStay).unwrap());
    }

    fn sample_booking() -> Booking {
        Booking {
            booking_id: BookingId::new(1).unwrap(),
            property_id: PropertyId::new(2).unwrap(),
            source_channel: Channel::Direct,
            guest_name: GuestName::from("Chen Wei"),
            guest_id_no: GuestIdNo::from("A123456789"),
            check_in: date!(2026 - 06 - 01),
            check_out: date!(2026 - 06 - 03),
            total_amount: 4000,
            is_tax_included: true,
            breakfast_included: true,
            special_note: Some(SpecialNote::from("Late arrival")),
            status: BookingStatus::Reserved,
        }
    }

    #[test]
    fn test_booking_update_apply() {
        let booking = sample_booking();
        let update = BookingUpdate {
            check_out: Some(date!(2026 - 06 - 05)),
            special_note: Some(None),
            breakfast_included: Some(false),
            ..Default::default()
        };
        let merged = update.apply(&booking).unwrap();
        assert_eq!(date!(2026 - 06 - 01), merged.check_in);
        assert_eq!(date!(2026 - 06 - 05), merged.check_out);
        assert_eq!(None, merged.special_note);
        assert!(!merged.breakfast_included);
        assert_eq!(booking.guest_name, merged.guest_name);
        assert_eq!(4, merged.stay_nights());
    }

    #[test]
    fn test_booking_update_apply_rejects_inverted_dates() {
        let booking = sample_booking();
        let update = BookingUpdate { check_in: Some(date!(2026 - 06 - 03)), ..Default::default() };
        assert!(update.apply(&booking).is_err());
    }

    #[test]
    fn test_booking_update_is_empty() {
        assert!(BookingUpdate::default().is_empty());
        assert!(!BookingUpdate { total_amount: Some(0), ..Default::default() }.is_empty());
    }

    #[test]
    fn test_booking_amount() {
        assert_eq!(0, booking_amount(0).unwrap());
        assert_eq!(MAX_AMOUNT_TWD, booking_amount(MAX_AMOUNT_TWD).unwrap());
        assert_eq!(
            ModelError("Total amount cannot be negative".to_owned()),
            booking_amount(-1).unwrap_err()
        );
        assert_eq!(
            ModelError("Total amount cannot exceed 10000000000 TWD".to_owned()),
            booking_amount(MAX_AMOUNT_TWD + 1).unwrap_err()
        );
    }
}
