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

//! Reports over the booking history.
//!
//! Bookings are selected in the database and aggregated here, which keeps the queries portable
//! across backends.  Each report is computed by a pure function over the selected rows.

use crate::db;
use crate::driver::Driver;
use crate::driver::bookings::month_bounds;
use crate::model::*;
use staysync_core::driver::DriverResult;
use staysync_core::model::FieldErrors;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use time::{Date, Month};

/// Maximum number of periods returned by the period-based reports.
const MAX_PERIODS: usize = 12;

/// Statuses of the bookings that occupy a property.
const OCCUPYING: [BookingStatus; 3] =
    [BookingStatus::Reserved, BookingStatus::CheckedIn, BookingStatus::CheckedOut];

/// Parameters of the revenue report.
#[derive(Debug, Default)]
pub(crate) struct RevenueQuery {
    /// Bounds of the bookings to consider.
    pub(crate) window: DateWindow,

    /// Length of the periods to group bookings in.
    pub(crate) group_by: Option<Granularity>,

    /// Property to restrict the report to.
    pub(crate) property_id: Option<PropertyId>,

    /// Channel to restrict the report to.
    pub(crate) source_channel: Option<Channel>,
}

/// Parameters of the property performance report.
#[derive(Debug, Default)]
pub(crate) struct PerformanceQuery {
    /// Bounds of the bookings to consider.
    pub(crate) window: DateWindow,

    /// Page of properties to return.
    pub(crate) page: Page,

    /// Ranking criteria.
    pub(crate) sort_by: Option<PerformanceSort>,

    /// Ranking direction.
    pub(crate) sort_order: Option<SortOrder>,
}

/// Parameters of the guest analysis.
#[derive(Debug, Default)]
pub(crate) struct GuestQuery {
    /// Bounds of the bookings to consider.
    pub(crate) window: DateWindow,

    /// Page of guests to return.
    pub(crate) page: Page,

    /// Minimum number of bookings for a guest to be listed.
    pub(crate) min_bookings: Option<i64>,

    /// Ranking criteria.
    pub(crate) sort_by: Option<GuestSort>,
}

/// Parameters of the occupancy report.
#[derive(Debug, Default)]
pub(crate) struct OccupancyQuery {
    /// Bounds of the bookings to consider.
    pub(crate) window: DateWindow,

    /// Length of the periods to group bookings in.  Years are not supported.
    pub(crate) group_by: Option<Granularity>,

    /// Property to restrict the report to.
    pub(crate) property_id: Option<PropertyId>,
}

/// Parameters of the financial summary.
#[derive(Debug)]
pub(crate) struct FinancialQuery {
    /// Year to summarize.  Defaults to the current year.
    pub(crate) year: Option<i32>,

    /// Month within `year` to summarize, if not the whole year.
    pub(crate) month: Option<u8>,

    /// Whether to break down revenue by owner.
    pub(crate) include_tax_details: bool,
}

impl Default for FinancialQuery {
    fn default() -> Self {
        Self { year: None, month: None, include_tax_details: true }
    }
}

/// Groups `rows` by the period in which they check in, keeping the `MAX_PERIODS` most recent
/// periods with the latest first.
fn recent_periods(granularity: Granularity, rows: &[ReportRow]) -> Vec<(String, Vec<&ReportRow>)> {
    let mut periods: BTreeMap<String, Vec<&ReportRow>> = BTreeMap::default();
    for row in rows {
        periods.entry(granularity.period_key(row.check_in)).or_default().push(row);
    }
    periods.into_iter().rev().take(MAX_PERIODS).collect()
}

/// Computes the revenue of non-cancelled `rows` grouped by `granularity`.
fn revenue_report(
    granularity: Granularity,
    window: DateWindow,
    rows: &[ReportRow],
) -> RevenueReport {
    let periods = recent_periods(granularity, rows)
        .into_iter()
        .map(|(period, rows)| {
            let booking_count = rows.len() as i64;
            let total_revenue = rows.iter().map(|r| r.total_amount).sum();
            RevenuePeriod {
                period,
                booking_count,
                total_revenue,
                avg_booking_value: average(total_revenue, booking_count),
                total_nights: rows.iter().map(|r| r.nights()).sum(),
                unique_properties: rows.iter().map(|r| r.property_id).collect::<HashSet<_>>().len()
                    as i64,
                unique_guests: rows.iter().map(|r| &r.guest_name).collect::<HashSet<_>>().len()
                    as i64,
            }
        })
        .collect();

    let total_bookings = rows.len() as i64;
    let total_revenue = rows.iter().map(|r| r.total_amount).sum();
    RevenueReport {
        period_type: granularity,
        date_range: window,
        periods,
        summary: RevenueSummary {
            total_bookings,
            total_revenue,
            avg_booking_value: average(total_revenue, total_bookings),
        },
    }
}

/// Computes the performance of every property in `properties` from their `rows`, in any status.
fn property_performance(
    properties: &[PropertyRef],
    rows: &[ReportRow],
    sort_by: PerformanceSort,
    sort_order: SortOrder,
) -> Vec<PropertyPerformance> {
    let mut by_property: HashMap<PropertyId, Vec<&ReportRow>> = HashMap::default();
    for row in rows {
        by_property.entry(row.property_id).or_default().push(row);
    }

    let mut performance = properties
        .iter()
        .map(|property| {
            let rows = by_property.remove(&property.property_id).unwrap_or_default();
            let count = |status| rows.iter().filter(|r| r.status == status).count() as i64;
            let billable =
                rows.iter().filter(|r| r.status != BookingStatus::Cancelled).collect::<Vec<_>>();
            let total_bookings = rows.len() as i64;
            let total_revenue = billable.iter().map(|r| r.total_amount).sum();
            PropertyPerformance {
                property_id: property.property_id,
                title: property.title.clone(),
                city: property.city.clone(),
                district: property.district.clone(),
                base_price_twd: property.base_price_twd,
                owner_name: property.owner_name.clone(),
                total_bookings,
                pending_bookings: count(BookingStatus::Reserved),
                current_guests: count(BookingStatus::CheckedIn),
                completed_bookings: count(BookingStatus::CheckedOut),
                cancelled_bookings: count(BookingStatus::Cancelled),
                total_revenue,
                avg_booking_value: average(total_revenue, billable.len() as i64),
                total_nights: billable.iter().map(|r| r.nights()).sum(),
                occupancy_rate: percentage(billable.len() as i64, total_bookings),
            }
        })
        .collect::<Vec<PropertyPerformance>>();

    performance.sort_by(|a, b| {
        let ordering = match sort_by {
            PerformanceSort::Revenue => a.total_revenue.cmp(&b.total_revenue),
            PerformanceSort::Bookings => a.total_bookings.cmp(&b.total_bookings),
            PerformanceSort::Occupancy => a.occupancy_rate.total_cmp(&b.occupancy_rate),
            PerformanceSort::Rating => a.avg_booking_value.total_cmp(&b.avg_booking_value),
        };
        let ordering = match sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        ordering.then(a.property_id.cmp(&b.property_id))
    });
    performance
}

/// Breaks down non-cancelled `rows` by channel and by month.
fn channel_report(window: DateWindow, rows: &[ReportRow]) -> ChannelReport {
    let total_bookings = rows.len() as i64;
    let total_revenue = rows.iter().map(|r| r.total_amount).sum();

    let mut by_channel: BTreeMap<Channel, Vec<&ReportRow>> = BTreeMap::default();
    for row in rows {
        by_channel.entry(row.source_channel).or_default().push(row);
    }
    let mut channel_summary = by_channel
        .into_iter()
        .map(|(source_channel, rows)| {
            let booking_count = rows.len() as i64;
            let revenue = rows.iter().map(|r| r.total_amount).sum();
            let completed_bookings =
                rows.iter().filter(|r| r.status == BookingStatus::CheckedOut).count() as i64;
            ChannelSummary {
                source_channel,
                booking_count,
                percentage: percentage(booking_count, total_bookings),
                total_revenue: revenue,
                avg_booking_value: average(revenue, booking_count),
                avg_stay_nights: average(rows.iter().map(|r| r.nights()).sum(), booking_count),
                completed_bookings,
                completion_rate: percentage(completed_bookings, booking_count),
            }
        })
        .collect::<Vec<ChannelSummary>>();
    channel_summary.sort_by(|a, b| b.total_revenue.cmp(&a.total_revenue));

    let channel_trends = recent_periods(Granularity::Month, rows)
        .into_iter()
        .map(|(month, rows)| {
            let mut channels: BTreeMap<Channel, ChannelMonth> = BTreeMap::default();
            for row in rows {
                let entry = channels
                    .entry(row.source_channel)
                    .or_insert(ChannelMonth { booking_count: 0, revenue: 0 });
                entry.booking_count += 1;
                entry.revenue += row.total_amount;
            }
            (month, channels)
        })
        .collect();

    ChannelReport {
        date_range: window,
        channel_summary,
        channel_trends,
        total_statistics: ChannelTotals { total_bookings, total_revenue },
    }
}

/// Aggregates non-cancelled `rows` by guest, identified by name and ID number.
///
/// Returns the guests with at least `min_bookings` bookings sorted by `sort_by` in decreasing
/// order, along with an overview of all guests.
fn guest_analysis(
    rows: &[ReportRow],
    min_bookings: i64,
    sort_by: GuestSort,
) -> (Vec<GuestStats>, GuestOverview) {
    let mut by_guest: BTreeMap<(&str, &str), Vec<&ReportRow>> = BTreeMap::default();
    for row in rows {
        by_guest.entry((row.guest_name.as_str(), row.guest_id_no.as_str())).or_default().push(row);
    }

    let mut guests = vec![];
    for ((guest_name, guest_id_no), rows) in by_guest {
        let total_bookings = rows.len() as i64;
        let total_spent = rows.iter().map(|r| r.total_amount).sum();
        let total_nights = rows.iter().map(|r| r.nights()).sum();
        let (Some(first_check_in), Some(last_check_out)) = (
            rows.iter().map(|r| r.check_in).min(),
            rows.iter().map(|r| r.check_out).max(),
        ) else {
            continue;
        };
        guests.push(GuestStats {
            guest_name: guest_name.to_owned(),
            guest_id_no: guest_id_no.to_owned(),
            total_bookings,
            total_spent,
            avg_booking_value: average(total_spent, total_bookings),
            total_nights,
            avg_stay_nights: average(total_nights, total_bookings),
            first_check_in,
            last_check_out,
            properties_visited: rows.iter().map(|r| r.property_id).collect::<HashSet<_>>().len()
                as i64,
            channels_used: rows
                .iter()
                .map(|r| r.source_channel)
                .collect::<BTreeSet<Channel>>()
                .into_iter()
                .collect(),
            bookings_with_breakfast: rows.iter().filter(|r| r.breakfast_included).count() as i64,
        });
    }

    let unique = guests.len() as i64;
    let overview = GuestOverview {
        total_unique_guests: unique,
        repeat_customers: guests.iter().filter(|g| g.total_bookings > 1).count() as i64,
        avg_bookings_per_guest: average(rows.len() as i64, unique),
        avg_spent_per_guest: average(guests.iter().map(|g| g.total_spent).sum(), unique),
    };

    guests.retain(|g| g.total_bookings >= min_bookings);
    guests.sort_by(|a, b| {
        let ordering = match sort_by {
            GuestSort::Bookings => a.total_bookings.cmp(&b.total_bookings),
            GuestSort::Revenue => a.total_spent.cmp(&b.total_spent),
            GuestSort::AvgStay => a.avg_stay_nights.total_cmp(&b.avg_stay_nights),
            GuestSort::LastVisit => a.last_check_out.cmp(&b.last_check_out),
        };
        ordering.reverse()
    });
    (guests, overview)
}

/// Computes how much of the available capacity the `rows` occupy, grouped by `granularity`.
///
/// `nights_per_period` is the capacity of one property in one period and `total_properties` is
/// the number of properties under consideration.
fn occupancy_report(
    granularity: Granularity,
    nights_per_period: i64,
    window: DateWindow,
    rows: &[ReportRow],
    total_properties: i64,
) -> OccupancyReport {
    let occupancy_by_period = recent_periods(granularity, rows)
        .into_iter()
        .map(|(period, rows)| {
            let properties_with_bookings =
                rows.iter().map(|r| r.property_id).collect::<HashSet<_>>().len() as i64;
            let total_bookings = rows.len() as i64;
            let total_occupied_nights = rows.iter().map(|r| r.nights()).sum();
            let total_available_nights = properties_with_bookings * nights_per_period;
            OccupancyPeriod {
                period,
                properties_with_bookings,
                total_bookings,
                total_occupied_nights,
                total_available_nights,
                occupancy_rate: percentage(total_occupied_nights, total_available_nights),
                avg_stay_length: average(total_occupied_nights, total_bookings),
            }
        })
        .collect();

    let total_bookings = rows.len() as i64;
    let total_occupied_nights = rows.iter().map(|r| r.nights()).sum();
    OccupancyReport {
        period_type: granularity,
        date_range: window,
        occupancy_by_period,
        overall_statistics: OccupancyOverall {
            total_properties,
            properties_with_bookings: rows
                .iter()
                .map(|r| r.property_id)
                .collect::<HashSet<_>>()
                .len() as i64,
            total_bookings,
            avg_stay_length: average(total_occupied_nights, total_bookings),
            total_occupied_nights,
        },
    }
}

/// Summarizes the revenue and business tax of the non-cancelled `rows` of `period`.
fn financial_summary(
    period: FinancialPeriod,
    include_tax_details: bool,
    rows: &[ReportRow],
) -> FinancialSummary {
    // Tax is computed on summed amounts and rounded once.
    let tax_of = |included: bool| {
        business_tax(
            rows.iter().filter(|r| r.is_tax_included == included).map(|r| r.total_amount).sum(),
        )
    };
    let total_transactions = rows.len() as i64;
    let gross_revenue = rows.iter().map(|r| r.total_amount).sum();
    let included_tax_amount = tax_of(true);
    let additional_tax_amount = tax_of(false);
    let total_tax_amount = business_tax(gross_revenue);
    let totals = FinancialTotals {
        total_transactions,
        gross_revenue,
        included_tax_amount,
        additional_tax_amount,
        total_tax_amount,
        net_revenue: gross_revenue - total_tax_amount,
        avg_transaction_value: average(gross_revenue, total_transactions),
    };

    let mut by_channel: BTreeMap<Channel, (i64, i64)> = BTreeMap::default();
    for row in rows {
        let (count, revenue) = by_channel.entry(row.source_channel).or_default();
        *count += 1;
        *revenue += row.total_amount;
    }
    let mut revenue_by_channel = by_channel
        .into_iter()
        .map(|(source_channel, (transaction_count, revenue))| ChannelRevenue {
            source_channel,
            transaction_count,
            revenue,
            percentage: percentage(revenue, gross_revenue),
        })
        .collect::<Vec<ChannelRevenue>>();
    revenue_by_channel.sort_by(|a, b| b.revenue.cmp(&a.revenue));

    let mut owner_revenue = vec![];
    if include_tax_details {
        let mut by_owner: BTreeMap<UserId, Vec<&ReportRow>> = BTreeMap::default();
        for row in rows {
            by_owner.entry(row.owner_id).or_default().push(row);
        }
        for (user_id, rows) in by_owner {
            let first = rows[0];
            owner_revenue.push(OwnerRevenue {
                user_id,
                full_name: first.owner_name.clone(),
                company_tax_id: first.owner_tax_id.clone(),
                bank_code: first.owner_bank_code.clone(),
                bank_account: first.owner_bank_account.clone(),
                booking_count: rows.len() as i64,
                total_revenue: rows.iter().map(|r| r.total_amount).sum(),
                tax_included_amount: business_tax(
                    rows.iter().filter(|r| r.is_tax_included).map(|r| r.total_amount).sum(),
                ),
                license_numbers: rows
                    .iter()
                    .filter_map(|r| r.legal_license_no.clone())
                    .collect::<BTreeSet<String>>()
                    .into_iter()
                    .collect(),
            });
        }
        owner_revenue.sort_by(|a, b| b.total_revenue.cmp(&a.total_revenue));
    }

    let mut monthly_trend = vec![];
    if !period.is_monthly {
        let mut by_month: BTreeMap<u8, (i64, i64)> = BTreeMap::default();
        for row in rows {
            let (count, revenue) = by_month.entry(u8::from(row.check_in.month())).or_default();
            *count += 1;
            *revenue += row.total_amount;
        }
        monthly_trend = by_month
            .into_iter()
            .map(|(month, (booking_count, revenue))| MonthlyRevenue {
                month,
                booking_count,
                revenue,
                avg_booking_value: average(revenue, booking_count),
            })
            .collect();
    }

    FinancialSummary {
        period,
        financial_summary: totals,
        revenue_by_channel,
        owner_revenue,
        monthly_trend,
    }
}

/// Computes the `[first, after_last)` check-in dates covered by `year` and optional `month`.
fn financial_bounds(year: i32, month: Option<u8>) -> DriverResult<(Date, Date)> {
    let first_month = match month {
        Some(month) => Month::try_from(month)
            .map_err(|_| FieldErrors::single("month", "month must be between 1 and 12"))?,
        None => Month::January,
    };
    let first = Date::from_calendar_date(year, first_month, 1)
        .map_err(|_| FieldErrors::single("year", "year is out of range"))?;
    if month.is_some() {
        return Ok(month_bounds(first));
    }
    let next_year = Date::from_calendar_date(year + 1, Month::January, 1)
        .map_err(|_| FieldErrors::single("year", "year is out of range"))?;
    Ok((first, next_year))
}

impl Driver {
    /// Computes the revenue report.
    pub(crate) async fn get_revenue_report(
        self,
        query: RevenueQuery,
    ) -> DriverResult<RevenueReport> {
        let filter = ReportFilter {
            property_id: query.property_id,
            source_channel: query.source_channel,
            ..ReportFilter::billable(query.window)
        };
        let rows = db::get_report_rows(&mut self.db.ex().await?, &filter).await?;
        let granularity = query.group_by.unwrap_or(Granularity::Month);
        Ok(revenue_report(granularity, query.window, &rows))
    }

    /// Computes one page of the property performance report.
    pub(crate) async fn get_property_performance(
        self,
        query: PerformanceQuery,
    ) -> DriverResult<Paginated<PropertyPerformance>> {
        let filter = ReportFilter {
            check_in_from: query.window.start_date,
            check_out_until: query.window.end_date,
            ..Default::default()
        };
        let mut ex = self.db.ex().await?;
        let properties = db::list_property_refs(&mut ex, None).await?;
        let rows = db::get_report_rows(&mut ex, &filter).await?;

        let performance = property_performance(
            &properties,
            &rows,
            query.sort_by.unwrap_or(PerformanceSort::Revenue),
            query.sort_order.unwrap_or(SortOrder::Desc),
        );
        let total = performance.len() as u64;
        let items = performance
            .into_iter()
            .skip(query.page.offset() as usize)
            .take(query.page.limit() as usize)
            .collect();
        Ok(Paginated { items, total })
    }

    /// Computes the booking channel report.
    pub(crate) async fn get_channel_report(
        self,
        window: DateWindow,
    ) -> DriverResult<ChannelReport> {
        let filter = ReportFilter::billable(window);
        let rows = db::get_report_rows(&mut self.db.ex().await?, &filter).await?;
        Ok(channel_report(window, &rows))
    }

    /// Computes one page of the guest analysis.  Returns the analysis and the number of guests
    /// that qualify across all pages.
    pub(crate) async fn get_guest_analysis(
        self,
        query: GuestQuery,
    ) -> DriverResult<(GuestAnalysis, u64)> {
        let filter = ReportFilter::billable(query.window);
        let rows = db::get_report_rows(&mut self.db.ex().await?, &filter).await?;

        let (guests, overview) = guest_analysis(
            &rows,
            query.min_bookings.unwrap_or(1),
            query.sort_by.unwrap_or(GuestSort::Revenue),
        );
        let total = guests.len() as u64;
        let guests = guests
            .into_iter()
            .skip(query.page.offset() as usize)
            .take(query.page.limit() as usize)
            .collect();
        Ok((GuestAnalysis { guests, overview }, total))
    }

    /// Computes the occupancy report.
    pub(crate) async fn get_occupancy_report(
        self,
        query: OccupancyQuery,
    ) -> DriverResult<OccupancyReport> {
        let granularity = query.group_by.unwrap_or(Granularity::Month);
        let nights_per_period = granularity.nights_per_period().ok_or_else(|| {
            FieldErrors::single("group_by", "group_by must be one of day, week, month")
        })?;

        let filter = ReportFilter {
            statuses: OCCUPYING.to_vec(),
            property_id: query.property_id,
            check_in_from: query.window.start_date,
            check_out_until: query.window.end_date,
            ..Default::default()
        };
        let mut ex = self.db.ex().await?;
        let rows = db::get_report_rows(&mut ex, &filter).await?;
        let total_properties = db::list_property_refs(&mut ex, query.property_id).await?.len();

        Ok(occupancy_report(
            granularity,
            nights_per_period,
            query.window,
            &rows,
            total_properties as i64,
        ))
    }

    /// Computes the financial summary of a year or of a month for tax filing.
    pub(crate) async fn get_financial_summary(
        self,
        query: FinancialQuery,
    ) -> DriverResult<FinancialSummary> {
        let year = query.year.unwrap_or_else(|| self.today().year());
        let (from, before) = financial_bounds(year, query.month)?;

        let filter = ReportFilter {
            check_in_from: Some(from),
            check_in_before: Some(before),
            ..ReportFilter::billable(DateWindow::default())
        };
        let rows = db::get_report_rows(&mut self.db.ex().await?, &filter).await?;

        let period =
            FinancialPeriod { year, month: query.month, is_monthly: query.month.is_some() };
        Ok(financial_summary(period, query.include_tax_details, &rows))
    }
}
