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

//! Aggregated views over bookings for reporting purposes.

use crate::model::{BookingStatus, Channel, PropertyId, UserId, format_date};
use serde::{Deserialize, Serialize};
use staysync_core::model::{ModelError, ModelResult};
use std::collections::BTreeMap;
use time::Date;

/// Business tax levied in Taiwan on accommodation revenue, in percent.
pub const BUSINESS_TAX_PERCENT: i64 = 5;

/// Computes the business tax on `amount`, rounded to the nearest TWD.
pub fn business_tax(amount: i64) -> i64 {
    (amount * BUSINESS_TAX_PERCENT + 50).div_euclid(100)
}

/// Length of the periods in which bookings are grouped.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Calendar days.
    Day,

    /// ISO weeks.
    Week,

    /// Calendar months.
    Month,

    /// Calendar years.
    Year,
}

impl Granularity {
    /// Parses a granularity from its textual representation.
    pub fn parse(s: &str) -> ModelResult<Self> {
        match s.trim() {
            "day" => Ok(Granularity::Day),
            "week" => Ok(Granularity::Week),
            "month" => Ok(Granularity::Month),
            "year" => Ok(Granularity::Year),
            _ => Err(ModelError("group_by must be one of day, week, month, year".to_owned())),
        }
    }

    /// Returns the key of the period that contains `date`.  Keys sort chronologically.
    pub fn period_key(self, date: Date) -> String {
        match self {
            Granularity::Day => format_date(date),
            Granularity::Week => {
                let (year, week, _) = date.to_iso_week_date();
                format!("{:04}-W{:02}", year, week)
            }
            Granularity::Month => format!("{:04}-{:02}", date.year(), u8::from(date.month())),
            Granularity::Year => format!("{:04}", date.year()),
        }
    }

    /// Returns the number of nights that a single property can offer in one period, or `None`
    /// if occupancy is not computed at this granularity.
    pub fn nights_per_period(self) -> Option<i64> {
        match self {
            Granularity::Day => Some(1),
            Granularity::Week => Some(7),
            Granularity::Month => Some(30),
            Granularity::Year => None,
        }
    }
}

/// Optional bounds of a report: bookings must check in on or after `start_date` and check out
/// on or before `end_date`.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct DateWindow {
    /// Earliest check-in date.
    pub start_date: Option<Date>,

    /// Latest check-out date.
    pub end_date: Option<Date>,
}

impl DateWindow {
    /// Creates a new window, making sure that `end_date` is after `start_date` when both exist.
    pub fn new(start_date: Option<Date>, end_date: Option<Date>) -> ModelResult<Self> {
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if end <= start {
                return Err(ModelError("end_date must be after start_date".to_owned()));
            }
        }
        Ok(Self { start_date, end_date })
    }
}

/// Criteria to select the bookings that feed a report.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReportFilter {
    /// Statuses to include.  Empty means all.
    pub statuses: Vec<BookingStatus>,

    /// Property to restrict to.
    pub property_id: Option<PropertyId>,

    /// Channel to restrict to.
    pub source_channel: Option<Channel>,

    /// Earliest check-in date, inclusive.
    pub check_in_from: Option<Date>,

    /// Latest check-in date, exclusive.
    pub check_in_before: Option<Date>,

    /// Latest check-out date, inclusive.
    pub check_out_until: Option<Date>,
}

impl ReportFilter {
    /// Creates a filter for bookings that were not cancelled within `window`.
    pub fn billable(window: DateWindow) -> Self {
        Self {
            statuses: vec![
                BookingStatus::Reserved,
                BookingStatus::CheckedIn,
                BookingStatus::CheckedOut,
            ],
            check_in_from: window.start_date,
            check_out_until: window.end_date,
            ..Default::default()
        }
    }
}

/// A booking joined with the data of its property and owner, as consumed by reports.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportRow {
    /// Property of the booking.
    pub property_id: PropertyId,

    /// Channel of the booking.
    pub source_channel: Channel,

    /// Name of the guest.
    pub guest_name: String,

    /// ID of the guest.
    pub guest_id_no: String,

    /// Arrival date.
    pub check_in: Date,

    /// Departure date.
    pub check_out: Date,

    /// Amount charged.
    pub total_amount: i64,

    /// Whether the amount includes business tax.
    pub is_tax_included: bool,

    /// Whether breakfast is served.
    pub breakfast_included: bool,

    /// Lifecycle status.
    pub status: BookingStatus,

    /// License number of the property.
    pub legal_license_no: Option<String>,

    /// Owner of the property.
    pub owner_id: UserId,

    /// Name of the owner.
    pub owner_name: String,

    /// Tax ID of the owner.
    pub owner_tax_id: Option<String>,

    /// Bank code of the owner.
    pub owner_bank_code: Option<String>,

    /// Bank account of the owner.
    pub owner_bank_account: Option<String>,
}

impl ReportRow {
    /// Returns the number of nights of the stay.
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).whole_days()
    }
}

/// A property as considered by performance reports.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyRef {
    /// Identifier of the property.
    pub property_id: PropertyId,

    /// Title.
    pub title: String,

    /// City.
    pub city: String,

    /// District.
    pub district: String,

    /// Nightly base price.
    pub base_price_twd: i64,

    /// Name of the owner.
    pub owner_name: String,
}

/// Revenue of bookings checking in during one period.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RevenuePeriod {
    /// Key of the period.
    pub period: String,

    /// Number of bookings.
    pub booking_count: i64,

    /// Sum of their amounts.
    pub total_revenue: i64,

    /// Average amount.
    pub avg_booking_value: f64,

    /// Sum of their nights.
    pub total_nights: i64,

    /// Number of distinct properties booked.
    pub unique_properties: i64,

    /// Number of distinct guest names.
    pub unique_guests: i64,
}

/// Totals of a revenue report.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct RevenueSummary {
    /// Number of bookings.
    pub total_bookings: i64,

    /// Sum of their amounts.
    pub total_revenue: i64,

    /// Average amount.
    pub avg_booking_value: f64,
}

/// Revenue over time.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RevenueReport {
    /// Grouping of the periods.
    pub period_type: Granularity,

    /// Bounds requested by the caller.
    pub date_range: DateWindow,

    /// Most recent periods first.
    pub periods: Vec<RevenuePeriod>,

    /// Totals over all matching bookings.
    pub summary: RevenueSummary,
}

/// Field by which property performance is ranked.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceSort {
    /// Total revenue.
    Revenue,

    /// Number of bookings.
    Bookings,

    /// Occupancy rate.
    Occupancy,

    /// Average booking value.
    Rating,
}

impl PerformanceSort {
    /// Parses a sort key from its textual representation.
    pub fn parse(s: &str) -> ModelResult<Self> {
        match s.trim() {
            "revenue" => Ok(PerformanceSort::Revenue),
            "bookings" => Ok(PerformanceSort::Bookings),
            "occupancy" => Ok(PerformanceSort::Occupancy),
            "rating" => Ok(PerformanceSort::Rating),
            _ => Err(ModelError(
                "sort_by must be one of revenue, bookings, occupancy, rating".to_owned(),
            )),
        }
    }
}

/// Direction of a sort.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first.
    Asc,

    /// Largest first.
    Desc,
}

impl SortOrder {
    /// Parses a sort order from its textual representation.
    pub fn parse(s: &str) -> ModelResult<Self> {
        match s.trim() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(ModelError("sort_order must be one of asc, desc".to_owned())),
        }
    }
}

/// Booking activity of a property.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PropertyPerformance {
    /// Identifier of the property.
    pub property_id: PropertyId,

    /// Title.
    pub title: String,

    /// City.
    pub city: String,

    /// District.
    pub district: String,

    /// Nightly base price.
    pub base_price_twd: i64,

    /// Name of the owner.
    pub owner_name: String,

    /// Number of bookings, in any status.
    pub total_bookings: i64,

    /// Number of reserved bookings.
    pub pending_bookings: i64,

    /// Number of checked-in bookings.
    pub current_guests: i64,

    /// Number of checked-out bookings.
    pub completed_bookings: i64,

    /// Number of cancelled bookings.
    pub cancelled_bookings: i64,

    /// Revenue of the bookings that were not cancelled.
    pub total_revenue: i64,

    /// Average value of the bookings that were not cancelled.
    pub avg_booking_value: f64,

    /// Nights of the bookings that were not cancelled.
    pub total_nights: i64,

    /// Share of bookings that were not cancelled, in percent.
    pub occupancy_rate: f64,
}

/// Performance of a single sales channel.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ChannelSummary {
    /// The channel.
    pub source_channel: Channel,

    /// Number of bookings.
    pub booking_count: i64,

    /// Share of all bookings, in percent.
    pub percentage: f64,

    /// Sum of amounts.
    pub total_revenue: i64,

    /// Average amount.
    pub avg_booking_value: f64,

    /// Average nights per booking.
    pub avg_stay_nights: f64,

    /// Number of checked-out bookings.
    pub completed_bookings: i64,

    /// Share of checked-out bookings, in percent.
    pub completion_rate: f64,
}

/// Activity of a channel during a month.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ChannelMonth {
    /// Number of bookings.
    pub booking_count: i64,

    /// Sum of amounts.
    pub revenue: i64,
}

/// Totals of a channel report.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ChannelTotals {
    /// Number of bookings.
    pub total_bookings: i64,

    /// Sum of amounts.
    pub total_revenue: i64,
}

/// Breakdown of bookings by sales channel.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ChannelReport {
    /// Bounds requested by the caller.
    pub date_range: DateWindow,

    /// Channels by decreasing revenue.
    pub channel_summary: Vec<ChannelSummary>,

    /// Activity per month and channel, for the most recent months.
    pub channel_trends: BTreeMap<String, BTreeMap<Channel, ChannelMonth>>,

    /// Totals across channels.
    pub total_statistics: ChannelTotals,
}

/// Field by which guests are ranked.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuestSort {
    /// Number of bookings.
    Bookings,

    /// Total spent.
    Revenue,

    /// Average nights per stay.
    AvgStay,

    /// Most recent check-out date.
    LastVisit,
}

impl GuestSort {
    /// Parses a sort key from its textual representation.
    pub fn parse(s: &str) -> ModelResult<Self> {
        match s.trim() {
            "bookings" => Ok(GuestSort::Bookings),
            "revenue" => Ok(GuestSort::Revenue),
            "avg_stay" => Ok(GuestSort::AvgStay),
            "last_visit" => Ok(GuestSort::LastVisit),
            _ => Err(ModelError(
                "sort_by must be one of bookings, revenue, avg_stay, last_visit".to_owned(),
            )),
        }
    }
}

/// History of a guest, identified by name and ID number.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GuestStats {
    /// Name of the guest.
    pub guest_name: String,

    /// ID number of the guest.
    pub guest_id_no: String,

    /// Number of bookings.
    pub total_bookings: i64,

    /// Sum of amounts.
    pub total_spent: i64,

    /// Average amount.
    pub avg_booking_value: f64,

    /// Sum of nights.
    pub total_nights: i64,

    /// Average nights per booking.
    pub avg_stay_nights: f64,

    /// Earliest arrival.
    pub first_check_in: Date,

    /// Latest departure.
    pub last_check_out: Date,

    /// Number of distinct properties stayed at.
    pub properties_visited: i64,

    /// Channels through which the guest booked.
    pub channels_used: Vec<Channel>,

    /// Number of bookings with breakfast.
    pub bookings_with_breakfast: i64,
}

/// Totals across all guests.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct GuestOverview {
    /// Number of distinct guests.
    pub total_unique_guests: i64,

    /// Number of guests with more than one booking.
    pub repeat_customers: i64,

    /// Average bookings per guest.
    pub avg_bookings_per_guest: f64,

    /// Average spent per guest.
    pub avg_spent_per_guest: f64,
}

/// Analysis of guest behavior.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GuestAnalysis {
    /// Requested page of guests.
    pub guests: Vec<GuestStats>,

    /// Totals across all guests, regardless of pagination.
    pub overview: GuestOverview,
}

/// Occupancy of the properties that had bookings checking in during one period.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct OccupancyPeriod {
    /// Key of the period.
    pub period: String,

    /// Number of distinct properties with bookings.
    pub properties_with_bookings: i64,

    /// Number of bookings.
    pub total_bookings: i64,

    /// Sum of booked nights.
    pub total_occupied_nights: i64,

    /// Nights that the booked properties could offer in the period.
    pub total_available_nights: i64,

    /// Occupied over available nights, in percent.
    pub occupancy_rate: f64,

    /// Average nights per booking.
    pub avg_stay_length: f64,
}

/// Occupancy totals.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct OccupancyOverall {
    /// Number of properties considered.
    pub total_properties: i64,

    /// Number of those with bookings.
    pub properties_with_bookings: i64,

    /// Number of bookings.
    pub total_bookings: i64,

    /// Average nights per booking.
    pub avg_stay_length: f64,

    /// Sum of booked nights.
    pub total_occupied_nights: i64,
}

/// Occupancy over time.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct OccupancyReport {
    /// Grouping of the periods.
    pub period_type: Granularity,

    /// Bounds requested by the caller.
    pub date_range: DateWindow,

    /// Most recent periods first.
    pub occupancy_by_period: Vec<OccupancyPeriod>,

    /// Totals over all matching bookings.
    pub overall_statistics: OccupancyOverall,
}

/// Period covered by a financial summary.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FinancialPeriod {
    /// Calendar year.
    pub year: i32,

    /// Month within the year, if the summary is monthly.
    pub month: Option<u8>,

    /// Whether the summary covers a single month.
    pub is_monthly: bool,
}

/// Revenue and tax totals.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct FinancialTotals {
    /// Number of bookings.
    pub total_transactions: i64,

    /// Sum of amounts.
    pub gross_revenue: i64,

    /// Tax contained in the amounts of tax-included bookings.
    pub included_tax_amount: i64,

    /// Tax owed on top of the amounts of tax-excluded bookings.
    pub additional_tax_amount: i64,

    /// Sum of both tax amounts.
    pub total_tax_amount: i64,

    /// Gross revenue minus all taxes.
    pub net_revenue: i64,

    /// Average amount.
    pub avg_transaction_value: f64,
}

/// Revenue of a sales channel.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ChannelRevenue {
    /// The channel.
    pub source_channel: Channel,

    /// Number of bookings.
    pub transaction_count: i64,

    /// Sum of amounts.
    pub revenue: i64,

    /// Share of the gross revenue, in percent.
    pub percentage: f64,
}

/// Revenue of an owner, as needed for tax filings.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct OwnerRevenue {
    /// Identifier of the owner.
    pub user_id: UserId,

    /// Name of the owner.
    pub full_name: String,

    /// Tax ID of the owner.
    pub company_tax_id: Option<String>,

    /// Bank code for payouts.
    pub bank_code: Option<String>,

    /// Bank account for payouts.
    pub bank_account: Option<String>,

    /// Number of bookings.
    pub booking_count: i64,

    /// Sum of amounts.
    pub total_revenue: i64,

    /// Tax contained in the amounts of tax-included bookings.
    pub tax_included_amount: i64,

    /// License numbers of the booked properties.
    pub license_numbers: Vec<String>,
}

/// Revenue of a month within a year.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct MonthlyRevenue {
    /// Month number, starting at 1.
    pub month: u8,

    /// Number of bookings.
    pub booking_count: i64,

    /// Sum of amounts.
    pub revenue: i64,

    /// Average amount.
    pub avg_booking_value: f64,
}

/// Revenue and tax summary for a year or a month.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FinancialSummary {
    /// Period covered.
    pub period: FinancialPeriod,

    /// Revenue and tax totals.
    pub financial_summary: FinancialTotals,

    /// Revenue by channel, largest first.
    pub revenue_by_channel: Vec<ChannelRevenue>,

    /// Revenue by owner, largest first.  Empty unless tax details were requested.
    pub owner_revenue: Vec<OwnerRevenue>,

    /// Revenue by month.  Empty for monthly summaries.
    pub monthly_trend: Vec<MonthlyRevenue>,
}

/// Counts of bookings by status.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct DashboardOverview {
    /// Number of bookings.
    pub total_bookings: i64,

    /// Number of reserved bookings.
    pub pending_bookings: i64,

    /// Number of checked-in bookings.
    pub current_guests: i64,

    /// Number of checked-out bookings.
    pub completed_bookings: i64,

    /// Number of cancelled bookings.
    pub cancelled_bookings: i64,

    /// Revenue of the bookings that were not cancelled.
    pub total_revenue: i64,
}

/// Movements happening today.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct DashboardToday {
    /// Bookings that check in today.
    pub checking_in_today: i64,

    /// Bookings that check out today.
    pub checking_out_today: i64,
}

/// Activity of the current month.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct DashboardMonthly {
    /// Bookings that check in this month.
    pub monthly_bookings: i64,

    /// Revenue of those that were not cancelled.
    pub monthly_revenue: i64,
}

/// Share of bookings of a channel.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ChannelShare {
    /// The channel.
    pub source_channel: Channel,

    /// Number of bookings.
    pub booking_count: i64,

    /// Share of all bookings, in percent.
    pub percentage: f64,

    /// Revenue of the bookings that were not cancelled.
    pub revenue: i64,
}

/// At-a-glance view of the booking activity.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DashboardSummary {
    /// Counts by status.
    pub overview: DashboardOverview,

    /// Movements today.
    pub today: DashboardToday,

    /// Activity this month.
    pub monthly: DashboardMonthly,

    /// Channels by decreasing number of bookings.
    pub channels: Vec<ChannelShare>,
}
