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

//! Rules to decide whether a stay can be booked.

use crate::model::{Booking, BookingId, BookingSummary, DateRange};

/// Returns the bookings in `candidates` that prevent booking `range`.
///
/// Only active bookings block dates, and `exclude` names a booking that must not conflict with
/// itself when it is being modified.  The result keeps the order of `candidates`.
pub(crate) fn find_conflicts(
    candidates: &[Booking],
    range: &DateRange,
    exclude: Option<BookingId>,
) -> Vec<BookingSummary> {
    candidates
        .iter()
        .filter(|b| Some(b.booking_id) != exclude)
        .filter(|b| b.status.is_active())
        .filter(|b| b.range().overlaps(range))
        .map(BookingSummary::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use time::Date;
    use time::macros::date;

    /// Builds a booking with `id` over `[check_in, check_out)` in the given `status`.
    fn booking(id: i64, check_in: Date, check_out: Date, status: BookingStatus) -> Booking {
        Booking {
            booking_id: BookingId::new(id).unwrap(),
            property_id: PropertyId::new(1).unwrap(),
            source_channel: Channel::Direct,
            guest_name: GuestName::from("Some Guest"),
            guest_id_no: GuestIdNo::from("A123456789"),
            check_in,
            check_out,
            total_amount: 4000,
            is_tax_included: true,
            breakfast_included: true,
            special_note: None,
            status,
        }
    }

    fn ids(conflicts: &[BookingSummary]) -> Vec<i64> {
        conflicts.iter().map(|b| b.booking_id.as_i64()).collect()
    }

    #[test]
    fn test_find_conflicts_overlap_and_touching() {
        let existing =
            [booking(1, date!(2026 - 06 - 01), date!(2026 - 06 - 03), BookingStatus::Reserved)];

        let overlapping = DateRange::new(date!(2026 - 06 - 02), date!(2026 - 06 - 04)).unwrap();
        assert_eq!(vec![1], ids(&find_conflicts(&existing, &overlapping, None)));

        let after = DateRange::new(date!(2026 - 06 - 03), date!(2026 - 06 - 05)).unwrap();
        assert!(find_conflicts(&existing, &after, None).is_empty());

        let before = DateRange::new(date!(2026 - 05 - 30), date!(2026 - 06 - 01)).unwrap();
        assert!(find_conflicts(&existing, &before, None).is_empty());

        let inside = DateRange::new(date!(2026 - 06 - 01), date!(2026 - 06 - 02)).unwrap();
        assert_eq!(vec![1], ids(&find_conflicts(&existing, &inside, None)));
    }

    #[test]
    fn test_find_conflicts_only_active_block() {
        let range = DateRange::new(date!(2026 - 06 - 01), date!(2026 - 06 - 10)).unwrap();
        let existing = [
            booking(1, date!(2026 - 06 - 01), date!(2026 - 06 - 03), BookingStatus::Reserved),
            booking(2, date!(2026 - 06 - 03), date!(2026 - 06 - 05), BookingStatus::CheckedIn),
            booking(3, date!(2026 - 06 - 05), date!(2026 - 06 - 07), BookingStatus::CheckedOut),
            booking(4, date!(2026 - 06 - 07), date!(2026 - 06 - 09), BookingStatus::Cancelled),
        ];
        assert_eq!(vec![1, 2], ids(&find_conflicts(&existing, &range, None)));
    }

    #[test]
    fn test_find_conflicts_excludes_self() {
        let existing = [
            booking(1, date!(2026 - 06 - 01), date!(2026 - 06 - 03), BookingStatus::Reserved),
            booking(2, date!(2026 - 06 - 04), date!(2026 - 06 - 06), BookingStatus::Reserved),
        ];
        let extended = DateRange::new(date!(2026 - 06 - 01), date!(2026 - 06 - 05)).unwrap();
        assert_eq!(
            vec![2],
            ids(&find_conflicts(&existing, &extended, Some(BookingId::new(1).unwrap())))
        );
    }

    #[test]
    fn test_find_conflicts_matches_interval_rule() {
        let base = date!(2026 - 06 - 01);
        let day = |n: i64| base + time::Duration::days(n);
        for a1 in 0..6 {
            for a2 in (a1 + 1)..7 {
                let existing = [booking(1, day(a1), day(a2), BookingStatus::CheckedIn)];
                for b1 in 0..6 {
                    for b2 in (b1 + 1)..7 {
                        let range = DateRange::new(day(b1), day(b2)).unwrap();
                        let expected = a1 < b2 && b1 < a2;
                        let conflicts = find_conflicts(&existing, &range, None);
                        assert_eq!(expected, !conflicts.is_empty(), "{:?} vs {:?}", a1..a2, b1..b2);

                        // Querying again without mutation yields the same answer.
                        assert_eq!(conflicts, find_conflicts(&existing, &range, None));
                    }
                }
            }
        }
    }
}
