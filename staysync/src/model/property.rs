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

//! Rental properties.

use crate::model::{BookingSummary, DateRange, PropertyId, UserId};
use serde::{Deserialize, Serialize};
use staysync_core::model::{ModelError, ModelResult};

bounded_string!(
    /// Public title of a listing.
    Title,
    "Title",
    5,
    255
);

bounded_string!(
    /// City (縣市) where a property is located.
    City,
    "City",
    1,
    50
);

bounded_string!(
    /// District (鄉鎮市區) where a property is located.
    District,
    "District",
    1,
    50
);

bounded_string!(
    /// Street address of a property.
    Address,
    "Address",
    1,
    255
);

bounded_string!(
    /// Short-term rental license number issued by the authorities.
    LicenseNo,
    "Legal license number",
    1,
    100
);

/// Nightly base price of a property in TWD.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(try_from = "i64")]
pub struct Price(i64);

impl Price {
    /// Lowest accepted nightly price.
    pub const MIN: i64 = 500;

    /// Highest accepted nightly price.
    pub const MAX: i64 = 50_000;

    /// Creates a new price from an untrusted amount, making sure it is within bounds.
    pub fn new(twd: i64) -> ModelResult<Self> {
        if !(Self::MIN..=Self::MAX).contains(&twd) {
            return Err(ModelError(format!(
                "Base price must be between {} and {} TWD",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(twd))
    }

    /// Returns the price in TWD.
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Price {
    type Error = ModelError;

    fn try_from(twd: i64) -> ModelResult<Self> {
        Self::new(twd)
    }
}

/// Descriptive details of a property.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PropertyInfo {
    /// Owner of the property.  Cannot change after creation.
    pub owner_id: UserId,

    /// Public title.
    pub title: Title,

    /// City.
    pub city: City,

    /// District within the city.
    pub district: District,

    /// Street address.
    pub address: Address,

    /// License number, if the property is registered.
    pub legal_license_no: Option<LicenseNo>,

    /// Nightly base price.
    pub base_price_twd: Price,
}

/// A persisted property.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Property {
    /// Identifier assigned by the database.
    pub property_id: PropertyId,

    /// Descriptive details.
    #[serde(flatten)]
    pub info: PropertyInfo,
}

/// Changes to apply to an existing property.  The owner cannot be changed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyUpdate {
    /// New title.
    pub title: Option<Title>,

    /// New city.
    pub city: Option<City>,

    /// New district.
    pub district: Option<District>,

    /// New address.
    pub address: Option<Address>,

    /// New license number, where `Some(None)` clears it.
    pub legal_license_no: Option<Option<LicenseNo>>,

    /// New nightly base price.
    pub base_price_twd: Option<Price>,
}

impl PropertyUpdate {
    /// Returns true if the update does not modify any field.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.city.is_none()
            && self.district.is_none()
            && self.address.is_none()
            && self.legal_license_no.is_none()
            && self.base_price_twd.is_none()
    }
}

/// Criteria to select properties in listings.
#[derive(Debug, Default, PartialEq)]
pub struct PropertyFilter {
    /// Exact city to match.
    pub city: Option<City>,

    /// Exact district to match.
    pub district: Option<District>,

    /// Lowest base price to include.
    pub min_price: Option<i64>,

    /// Highest base price to include.
    pub max_price: Option<i64>,

    /// Stay for which the property must have no active booking.
    pub available_for: Option<DateRange>,
}

/// A property as shown in listings, with owner contact details and booking totals.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PropertyListing {
    /// The property.
    #[serde(flatten)]
    pub property: Property,

    /// Name of the owner.
    pub owner_name: String,

    /// Email of the owner.
    pub owner_email: String,

    /// Phone of the owner.
    pub owner_phone: Option<String>,

    /// Number of bookings, in any status.
    pub total_bookings: i64,

    /// Revenue of the bookings that were not cancelled.
    pub total_revenue: i64,

    /// Average value of the bookings that were not cancelled.
    pub avg_booking_value: f64,
}

/// Owner contact details attached to a property.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct OwnerContact {
    /// Name of the owner.
    pub owner_name: String,

    /// Email of the owner.
    pub owner_email: String,

    /// Phone of the owner.
    pub owner_phone: Option<String>,

    /// Company tax ID of the owner.
    pub owner_tax_id: Option<String>,
}

/// Booking activity of a single property.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct PropertyStats {
    /// Number of bookings, in any status.
    pub total_bookings: i64,

    /// Number of bookings that are reserved.
    pub active_bookings: i64,

    /// Number of bookings whose guests are checked in.
    pub current_guests: i64,

    /// Number of bookings whose guests checked out.
    pub completed_bookings: i64,

    /// Number of cancelled bookings.
    pub cancelled_bookings: i64,

    /// Revenue of the bookings that were not cancelled.
    pub total_revenue: i64,

    /// Average value of the bookings that were not cancelled.
    pub avg_booking_value: f64,
}

/// A property with its owner and its recent and upcoming activity.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PropertyDetails {
    /// The property.
    #[serde(flatten)]
    pub property: Property,

    /// Contact details of the owner.
    #[serde(flatten)]
    pub owner: OwnerContact,

    /// Aggregated booking activity.
    pub statistics: PropertyStats,

    /// Most recently created bookings.
    pub recent_bookings: Vec<BookingSummary>,

    /// Active bookings that start today or later, soonest first.
    pub upcoming_bookings: Vec<BookingSummary>,
}

/// Number of properties in a location.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct LocationCount {
    /// City or district name.
    pub name: String,

    /// Number of properties there.
    pub property_count: i64,
}
