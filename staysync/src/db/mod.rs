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

//! Database abstraction in terms of the operations needed by the rental service.
//!
//! All queries are built with `sqlx::QueryBuilder` so that the same statement text serves both
//! backends: placeholders are rendered in the dialect of whichever executor runs the query.

use crate::model::*;
use sqlx::{QueryBuilder, Row};
#[cfg(feature = "postgres")]
use sqlx::postgres::PgRow;
#[cfg(any(feature = "sqlite", test))]
use sqlx::sqlite::SqliteRow;
#[cfg(feature = "postgres")]
use staysync_core::db::postgres;
#[cfg(any(feature = "sqlite", test))]
use staysync_core::db::sqlite;
use staysync_core::db::{DbError, DbResult, Executor, ensure_one_row};
use staysync_core::model::EmailAddress;
use time::Date;


/// SQL list of the statuses that hold a property's dates.
const ACTIVE_STATUSES: &str = "('Reserved', 'CheckedIn')";

/// Destructures the executor `$ex` and runs `$body` against the backend it wraps.
///
/// Within `$body`, `$conn` is the backend connection, `$db` names the `sqlx::Database` type of the
/// backend, and `$map_err` converts `sqlx` errors into `DbError`s.
macro_rules! with_backend [
    ( $ex:expr, |$conn:ident, $db:ident, $map_err:ident| $body:block ) => {
        match $ex {
            #[cfg(feature = "postgres")]
            Executor::Postgres(ex) => {
                #[allow(unused)]
                type $db = sqlx::Postgres;
                let $map_err = postgres::map_sqlx_error;
                let $conn = ex.conn();
                $body
            }

            #[cfg(any(feature = "sqlite", test))]
            Executor::Sqlite(ex) => {
                #[allow(unused)]
                type $db = sqlx::Sqlite;
                let $map_err = sqlite::map_sqlx_error;
                let $conn = ex.conn();
                $body
            }

            #[allow(unused)]
            _ => unreachable!(),
        }
    }
];

/// Typed access to the columns of a row, regardless of the backend that produced it.
trait ColumnReader {
    /// Gets the non-null text in column `col`.
    fn text(&self, col: &str) -> DbResult<String>;

    /// Gets the nullable text in column `col`.
    fn opt_text(&self, col: &str) -> DbResult<Option<String>>;

    /// Gets the integer in column `col`.
    fn int(&self, col: &str) -> DbResult<i64>;

    /// Gets the boolean in column `col`.
    fn flag(&self, col: &str) -> DbResult<bool>;

    /// Gets the date in column `col`.
    fn date(&self, col: &str) -> DbResult<Date>;
}

/// Implements `ColumnReader` for the `$row` type of a backend whose errors map with `$map_err`.
macro_rules! impl_column_reader [
    ( $row:ty, $map_err:path ) => {
        impl ColumnReader for $row {
            fn text(&self, col: &str) -> DbResult<String> {
                self.try_get(col).map_err($map_err)
            }

            fn opt_text(&self, col: &str) -> DbResult<Option<String>> {
                self.try_get(col).map_err($map_err)
            }

            fn int(&self, col: &str) -> DbResult<i64> {
                self.try_get(col).map_err($map_err)
            }

            fn flag(&self, col: &str) -> DbResult<bool> {
                self.try_get(col).map_err($map_err)
            }

            fn date(&self, col: &str) -> DbResult<Date> {
                self.try_get(col).map_err($map_err)
            }
        }
    }
];

#[cfg(feature = "postgres")]
impl_column_reader!(PgRow, postgres::map_sqlx_error);

#[cfg(any(feature = "sqlite", test))]
impl_column_reader!(SqliteRow, sqlite::map_sqlx_error);

/// Converts a row with all columns of the `users` table into a `User`.
fn user_from_row<R: ColumnReader>(row: &R) -> DbResult<User> {
    Ok(User {
        user_id: UserId::new(row.int("user_id")?)?,
        profile: UserProfile {
            full_name: FullName::new(row.text("full_name")?)?,
            email: EmailAddress::new(row.text("email")?)?,
            company_tax_id: row.opt_text("company_tax_id")?.map(TaxId::new).transpose()?,
            phone: row.opt_text("phone")?.map(Phone::new).transpose()?,
            bank_code: row.opt_text("bank_code")?.map(BankCode::new).transpose()?,
            bank_account: row.opt_text("bank_account")?.map(BankAccount::new).transpose()?,
        },
    })
}

/// Converts a row with all columns of the `properties` table into a `Property`.
fn property_from_row<R: ColumnReader>(row: &R) -> DbResult<Property> {
    Ok(Property {
        property_id: PropertyId::new(row.int("property_id")?)?,
        info: PropertyInfo {
            owner_id: UserId::new(row.int("owner_id")?)?,
            title: Title::new(row.text("title")?)?,
            city: City::new(row.text("city")?)?,
            district: District::new(row.text("district")?)?,
            address: Address::new(row.text("address")?)?,
            legal_license_no: row.opt_text("legal_license_no")?.map(LicenseNo::new).transpose()?,
            base_price_twd: Price::new(row.int("base_price_twd")?)?,
        },
    })
}

/// Converts a row with all columns of the `bookings` table into a `Booking`.
fn booking_from_row<R: ColumnReader>(row: &R) -> DbResult<Booking> {
    Ok(Booking {
        booking_id: BookingId::new(row.int("booking_id")?)?,
        property_id: PropertyId::new(row.int("property_id")?)?,
        source_channel: Channel::parse(&row.text("source_channel")?)?,
        guest_name: GuestName::new(row.text("guest_name")?)?,
        guest_id_no: GuestIdNo::new(row.text("guest_id_no")?)?,
        check_in: row.date("check_in")?,
        check_out: row.date("check_out")?,
        total_amount: row.int("total_amount")?,
        is_tax_included: row.flag("is_tax_included")?,
        breakfast_included: row.flag("breakfast_included")?,
        special_note: row.opt_text("special_note")?.map(SpecialNote::new).transpose()?,
        status: BookingStatus::parse(&row.text("status")?)?,
    })
}

/// Columns and joins to fetch a booking together with its property and owner names.
const BOOKING_LISTING_QUERY: &str = "
    SELECT
        b.*,
        p.title AS property_title, p.city AS property_city, p.district AS property_district,
        p.address AS property_address, p.base_price_twd,
        u.full_name AS owner_name, u.email AS owner_email, u.phone AS owner_phone,
        u.company_tax_id AS owner_tax_id
    FROM bookings b
    JOIN properties p ON p.property_id = b.property_id
    JOIN users u ON u.user_id = p.owner_id
    WHERE 1 = 1";

/// Converts a row returned by `BOOKING_LISTING_QUERY` into a `BookingListing`.
fn listing_from_row<R: ColumnReader>(row: &R) -> DbResult<BookingListing> {
    let booking = booking_from_row(row)?;
    let stay_nights = booking.stay_nights();
    Ok(BookingListing {
        booking,
        property_title: row.text("property_title")?,
        property_city: row.text("property_city")?,
        property_district: row.text("property_district")?,
        owner_name: row.text("owner_name")?,
        stay_nights,
    })
}

/// Columns and joins to fetch a property together with its owner and booking totals.
const PROPERTY_LISTING_QUERY: &str = "
    SELECT
        p.*,
        u.full_name AS owner_name, u.email AS owner_email, u.phone AS owner_phone,
        u.company_tax_id AS owner_tax_id,
        (SELECT COUNT(*) FROM bookings b WHERE b.property_id = p.property_id)
            AS total_bookings,
        (SELECT COUNT(*) FROM bookings b
            WHERE b.property_id = p.property_id AND b.status <> 'Cancelled')
            AS paid_bookings,
        (SELECT CAST(COALESCE(SUM(b.total_amount), 0) AS BIGINT) FROM bookings b
            WHERE b.property_id = p.property_id AND b.status <> 'Cancelled')
            AS total_revenue
    FROM properties p
    JOIN users u ON u.user_id = p.owner_id
    WHERE 1 = 1";

/// Converts a row returned by `PROPERTY_LISTING_QUERY` into a `PropertyListing`.
fn property_listing_from_row<R: ColumnReader>(row: &R) -> DbResult<PropertyListing> {
    let total_revenue = row.int("total_revenue")?;
    Ok(PropertyListing {
        property: property_from_row(row)?,
        owner_name: row.text("owner_name")?,
        owner_email: row.text("owner_email")?,
        owner_phone: row.opt_text("owner_phone")?,
        total_bookings: row.int("total_bookings")?,
        total_revenue,
        avg_booking_value: average(total_revenue, row.int("paid_bookings")?),
    })
}

/// Initializes the database schema.
pub async fn init_schema(ex: &mut Executor) -> DbResult<()> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => postgres::run_schema(ex, include_str!("postgres.sql")).await,

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => sqlite::run_schema(ex, include_str!("sqlite.sql")).await,

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Pushes a `LIMIT`/`OFFSET` clause for `page` into the query builder `$qb`.
macro_rules! push_page [
    ( $qb:ident, $page:expr ) => {
        $qb.push(" LIMIT ");
        $qb.push_bind(i64::from($page.limit()));
        $qb.push(" OFFSET ");
        $qb.push_bind($page.offset());
    }
];

/// Creates a new user from `profile` and returns it with its assigned identifier.
pub(crate) async fn create_user(ex: &mut Executor, profile: &UserProfile) -> DbResult<User> {
    let user_id = with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new(
            "INSERT INTO users
                (full_name, email, company_tax_id, phone, bank_code, bank_account)
            VALUES (",
        );
        let mut values = qb.separated(", ");
        values.push_bind(profile.full_name.as_str());
        values.push_bind(profile.email.as_str());
        values.push_bind(profile.company_tax_id.as_ref().map(TaxId::as_str));
        values.push_bind(profile.phone.as_ref().map(Phone::as_str));
        values.push_bind(profile.bank_code.as_ref().map(BankCode::as_str));
        values.push_bind(profile.bank_account.as_ref().map(BankAccount::as_str));
        qb.push(") RETURNING user_id");
        let row = qb.build().fetch_one(&mut *conn).await.map_err(map_err)?;
        row.int("user_id")?
    });
    Ok(User { user_id: UserId::new(user_id)?, profile: profile.clone() })
}

/// Gets the user identified by `user_id`.
pub(crate) async fn get_user(ex: &mut Executor, user_id: UserId) -> DbResult<User> {
    with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new("SELECT * FROM users WHERE user_id = ");
        qb.push_bind(user_id.as_i64());
        match qb.build().fetch_optional(&mut *conn).await.map_err(map_err)? {
            Some(row) => user_from_row(&row),
            None => Err(DbError::NotFound),
        }
    })
}

/// Gets one page of users, newest first.
pub(crate) async fn list_users(ex: &mut Executor, page: Page) -> DbResult<Paginated<User>> {
    with_backend!(ex, |conn, DB, map_err| {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM users")
            .fetch_one(&mut *conn)
            .await
            .map_err(map_err)?;
        let total = row.int("total")?;

        let mut qb = QueryBuilder::<DB>::new("SELECT * FROM users ORDER BY user_id DESC");
        push_page!(qb, page);
        let rows = qb.build().fetch_all(&mut *conn).await.map_err(map_err)?;
        let items = rows.iter().map(|row| user_from_row(row)).collect::<DbResult<Vec<User>>>()?;
        Ok(Paginated { items, total: total as u64 })
    })
}

/// Applies the fields present in `update` to the user identified by `user_id`.
///
/// The caller must ensure that `update` is not empty.
pub(crate) async fn update_user(
    ex: &mut Executor,
    user_id: UserId,
    update: &UserUpdate,
) -> DbResult<()> {
    let rows_affected = with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new("UPDATE users SET ");
        let mut set = qb.separated(", ");
        if let Some(full_name) = &update.full_name {
            set.push("full_name = ");
            set.push_bind_unseparated(full_name.as_str());
        }
        if let Some(email) = &update.email {
            set.push("email = ");
            set.push_bind_unseparated(email.as_str());
        }
        if let Some(tax_id) = &update.company_tax_id {
            set.push("company_tax_id = ");
            set.push_bind_unseparated(tax_id.as_ref().map(TaxId::as_str));
        }
        if let Some(phone) = &update.phone {
            set.push("phone = ");
            set.push_bind_unseparated(phone.as_ref().map(Phone::as_str));
        }
        if let Some(bank_code) = &update.bank_code {
            set.push("bank_code = ");
            set.push_bind_unseparated(bank_code.as_ref().map(BankCode::as_str));
        }
        if let Some(bank_account) = &update.bank_account {
            set.push("bank_account = ");
            set.push_bind_unseparated(bank_account.as_ref().map(BankAccount::as_str));
        }
        qb.push(" WHERE user_id = ");
        qb.push_bind(user_id.as_i64());
        qb.build().execute(&mut *conn).await.map_err(map_err)?.rows_affected()
    });
    ensure_one_row(rows_affected)
}

/// Deletes the user identified by `user_id`.
pub(crate) async fn delete_user(ex: &mut Executor, user_id: UserId) -> DbResult<()> {
    let rows_affected = with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new("DELETE FROM users WHERE user_id = ");
        qb.push_bind(user_id.as_i64());
        qb.build().execute(&mut *conn).await.map_err(map_err)?.rows_affected()
    });
    ensure_one_row(rows_affected)
}

/// Counts the properties owned by `user_id`.
pub(crate) async fn count_user_properties(ex: &mut Executor, user_id: UserId) -> DbResult<i64> {
    with_backend!(ex, |conn, DB, map_err| {
        let mut qb =
            QueryBuilder::<DB>::new("SELECT COUNT(*) AS total FROM properties WHERE owner_id = ");
        qb.push_bind(user_id.as_i64());
        let row = qb.build().fetch_one(&mut *conn).await.map_err(map_err)?;
        row.int("total")
    })
}

/// Computes the statistics of the properties owned by `user_id` and of their bookings.
pub(crate) async fn get_user_stats(ex: &mut Executor, user_id: UserId) -> DbResult<UserStats> {
    with_backend!(ex, |conn, DB, map_err| {
        let mut qb =
            QueryBuilder::<DB>::new("SELECT (SELECT COUNT(*) FROM properties WHERE owner_id = ");
        qb.push_bind(user_id.as_i64());
        qb.push(") AS property_count, (SELECT CAST(COALESCE(SUM(base_price_twd), 0) AS BIGINT)");
        qb.push(" FROM properties WHERE owner_id = ");
        qb.push_bind(user_id.as_i64());
        qb.push(") AS price_sum, (SELECT COUNT(*) FROM bookings b");
        qb.push(" JOIN properties p ON p.property_id = b.property_id WHERE p.owner_id = ");
        qb.push_bind(user_id.as_i64());
        qb.push(") AS total_bookings, (SELECT CAST(COALESCE(SUM(b.total_amount), 0) AS BIGINT)");
        qb.push(" FROM bookings b JOIN properties p ON p.property_id = b.property_id");
        qb.push(" WHERE b.status <> 'Cancelled' AND p.owner_id = ");
        qb.push_bind(user_id.as_i64());
        qb.push(") AS total_revenue, (SELECT COUNT(*) FROM bookings b");
        qb.push(" JOIN properties p ON p.property_id = b.property_id");
        qb.push(" WHERE b.status IN ");
        qb.push(ACTIVE_STATUSES);
        qb.push(" AND p.owner_id = ");
        qb.push_bind(user_id.as_i64());
        qb.push(") AS active_bookings");
        let row = qb.build().fetch_one(&mut *conn).await.map_err(map_err)?;

        let property_count = row.int("property_count")?;
        Ok(UserStats {
            property_count,
            avg_price: average(row.int("price_sum")?, property_count),
            total_bookings: row.int("total_bookings")?,
            total_revenue: row.int("total_revenue")?,
            active_bookings: row.int("active_bookings")?,
        })
    })
}

/// Gets all properties owned by `user_id` with their booking totals, newest first.
pub(crate) async fn list_owned_properties(
    ex: &mut Executor,
    user_id: UserId,
) -> DbResult<Vec<OwnedProperty>> {
    with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new(PROPERTY_LISTING_QUERY);
        qb.push(" AND p.owner_id = ");
        qb.push_bind(user_id.as_i64());
        qb.push(" ORDER BY p.property_id DESC");
        let rows = qb.build().fetch_all(&mut *conn).await.map_err(map_err)?;
        rows.iter()
            .map(|row| {
                Ok(OwnedProperty {
                    property: property_from_row(row)?,
                    total_bookings: row.int("total_bookings")?,
                    total_revenue: row.int("total_revenue")?,
                })
            })
            .collect()
    })
}

/// Creates a new property from `info` and returns it with its assigned identifier.
pub(crate) async fn create_property(ex: &mut Executor, info: &PropertyInfo) -> DbResult<Property> {
    let property_id = with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new(
            "INSERT INTO properties
                (owner_id, title, city, district, address, legal_license_no, base_price_twd)
            VALUES (",
        );
        let mut values = qb.separated(", ");
        values.push_bind(info.owner_id.as_i64());
        values.push_bind(info.title.as_str());
        values.push_bind(info.city.as_str());
        values.push_bind(info.district.as_str());
        values.push_bind(info.address.as_str());
        values.push_bind(info.legal_license_no.as_ref().map(LicenseNo::as_str));
        values.push_bind(info.base_price_twd.as_i64());
        qb.push(") RETURNING property_id");
        let row = qb.build().fetch_one(&mut *conn).await.map_err(map_err)?;
        row.int("property_id")?
    });
    Ok(Property { property_id: PropertyId::new(property_id)?, info: info.clone() })
}

/// Gets the property identified by `property_id`.
pub(crate) async fn get_property(ex: &mut Executor, property_id: PropertyId) -> DbResult<Property> {
    with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new("SELECT * FROM properties WHERE property_id = ");
        qb.push_bind(property_id.as_i64());
        match qb.build().fetch_optional(&mut *conn).await.map_err(map_err)? {
            Some(row) => property_from_row(&row),
            None => Err(DbError::NotFound),
        }
    })
}

/// Gets the property identified by `property_id` and locks it until the end of the current
/// transaction, serializing writers that check and modify the property's bookings.
pub(crate) async fn lock_property(
    ex: &mut Executor,
    property_id: PropertyId,
) -> DbResult<Property> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = "SELECT * FROM properties WHERE property_id = $1 FOR UPDATE";
            match sqlx::query(query_str)
                .bind(property_id.as_i64())
                .fetch_optional(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?
            {
                Some(row) => property_from_row(&row),
                None => Err(DbError::NotFound),
            }
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            // SQLite has no row locks but a write takes the database-wide lock until commit.
            let query_str = "UPDATE properties SET property_id = property_id WHERE property_id = ?";
            let done = sqlx::query(query_str)
                .bind(property_id.as_i64())
                .execute(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            ensure_one_row(done.rows_affected())?;

            let query_str = "SELECT * FROM properties WHERE property_id = ?";
            let row = sqlx::query(query_str)
                .bind(property_id.as_i64())
                .fetch_one(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            property_from_row(&row)
        }

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Gets the property identified by `property_id` together with the contact data of its owner.
pub(crate) async fn get_property_with_owner(
    ex: &mut Executor,
    property_id: PropertyId,
) -> DbResult<(Property, OwnerContact)> {
    with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new(PROPERTY_LISTING_QUERY);
        qb.push(" AND p.property_id = ");
        qb.push_bind(property_id.as_i64());
        match qb.build().fetch_optional(&mut *conn).await.map_err(map_err)? {
            Some(row) => {
                let owner = OwnerContact {
                    owner_name: row.text("owner_name")?,
                    owner_email: row.text("owner_email")?,
                    owner_phone: row.opt_text("owner_phone")?,
                    owner_tax_id: row.opt_text("owner_tax_id")?,
                };
                Ok((property_from_row(&row)?, owner))
            }
            None => Err(DbError::NotFound),
        }
    })
}

/// Gets the properties whose identifiers appear in `ids`, in ascending identifier order.
///
/// Identifiers that do not exist are silently skipped.
pub(crate) async fn get_properties(
    ex: &mut Executor,
    ids: &[PropertyId],
) -> DbResult<Vec<Property>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }
    with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new("SELECT * FROM properties WHERE property_id IN (");
        let mut list = qb.separated(", ");
        for id in ids {
            list.push_bind(id.as_i64());
        }
        qb.push(") ORDER BY property_id");
        let rows = qb.build().fetch_all(&mut *conn).await.map_err(map_err)?;
        rows.iter().map(|row| property_from_row(row)).collect()
    })
}

/// Pushes the `WHERE` conditions that implement `filter` into the query builder `$qb`.
///
/// The query must alias the `properties` table as `p`.
macro_rules! push_property_filters [
    ( $qb:ident, $filter:expr ) => {
        if let Some(city) = &$filter.city {
            $qb.push(" AND p.city = ");
            $qb.push_bind(city.as_str());
        }
        if let Some(district) = &$filter.district {
            $qb.push(" AND p.district = ");
            $qb.push_bind(district.as_str());
        }
        if let Some(min_price) = $filter.min_price {
            $qb.push(" AND p.base_price_twd >= ");
            $qb.push_bind(min_price);
        }
        if let Some(max_price) = $filter.max_price {
            $qb.push(" AND p.base_price_twd <= ");
            $qb.push_bind(max_price);
        }
        if let Some(range) = &$filter.available_for {
            $qb.push(" AND NOT EXISTS (SELECT 1 FROM bookings b");
            $qb.push(" WHERE b.property_id = p.property_id AND b.status IN ");
            $qb.push(ACTIVE_STATUSES);
            $qb.push(" AND b.check_in < ");
            $qb.push_bind(range.check_out());
            $qb.push(" AND b.check_out > ");
            $qb.push_bind(range.check_in());
            $qb.push(")");
        }
    }
];

/// Gets one page of the properties that match `filter`, newest first.
pub(crate) async fn list_properties(
    ex: &mut Executor,
    filter: &PropertyFilter,
    page: Page,
) -> DbResult<Paginated<PropertyListing>> {
    with_backend!(ex, |conn, DB, map_err| {
        let mut qb =
            QueryBuilder::<DB>::new("SELECT COUNT(*) AS total FROM properties p WHERE 1 = 1");
        push_property_filters!(qb, filter);
        let row = qb.build().fetch_one(&mut *conn).await.map_err(map_err)?;
        let total = row.int("total")?;

        let mut qb = QueryBuilder::<DB>::new(PROPERTY_LISTING_QUERY);
        push_property_filters!(qb, filter);
        qb.push(" ORDER BY p.property_id DESC");
        push_page!(qb, page);
        let rows = qb.build().fetch_all(&mut *conn).await.map_err(map_err)?;
        let items = rows
            .iter()
            .map(|row| property_listing_from_row(row))
            .collect::<DbResult<Vec<PropertyListing>>>()?;
        Ok(Paginated { items, total: total as u64 })
    })
}

/// Applies the fields present in `update` to the property identified by `property_id`.
///
/// The caller must ensure that `update` is not empty.
pub(crate) async fn update_property(
    ex: &mut Executor,
    property_id: PropertyId,
    update: &PropertyUpdate,
) -> DbResult<()> {
    let rows_affected = with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new("UPDATE properties SET ");
        let mut set = qb.separated(", ");
        if let Some(title) = &update.title {
            set.push("title = ");
            set.push_bind_unseparated(title.as_str());
        }
        if let Some(city) = &update.city {
            set.push("city = ");
            set.push_bind_unseparated(city.as_str());
        }
        if let Some(district) = &update.district {
            set.push("district = ");
            set.push_bind_unseparated(district.as_str());
        }
        if let Some(address) = &update.address {
            set.push("address = ");
            set.push_bind_unseparated(address.as_str());
        }
        if let Some(license_no) = &update.legal_license_no {
            set.push("legal_license_no = ");
            set.push_bind_unseparated(license_no.as_ref().map(LicenseNo::as_str));
        }
        if let Some(price) = update.base_price_twd {
            set.push("base_price_twd = ");
            set.push_bind_unseparated(price.as_i64());
        }
        qb.push(" WHERE property_id = ");
        qb.push_bind(property_id.as_i64());
        qb.build().execute(&mut *conn).await.map_err(map_err)?.rows_affected()
    });
    ensure_one_row(rows_affected)
}

/// Deletes the property identified by `property_id`.
pub(crate) async fn delete_property(ex: &mut Executor, property_id: PropertyId) -> DbResult<()> {
    let rows_affected = with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new("DELETE FROM properties WHERE property_id = ");
        qb.push_bind(property_id.as_i64());
        qb.build().execute(&mut *conn).await.map_err(map_err)?.rows_affected()
    });
    ensure_one_row(rows_affected)
}

/// Counts the bookings of `property_id` in any status.
pub(crate) async fn count_property_bookings(
    ex: &mut Executor,
    property_id: PropertyId,
) -> DbResult<i64> {
    with_backend!(ex, |conn, DB, map_err| {
        let mut qb =
            QueryBuilder::<DB>::new("SELECT COUNT(*) AS total FROM bookings WHERE property_id = ");
        qb.push_bind(property_id.as_i64());
        let row = qb.build().fetch_one(&mut *conn).await.map_err(map_err)?;
        row.int("total")
    })
}

/// Gets the distinct cities with properties and how many properties each one has, most
/// populated first.
pub(crate) async fn list_cities(ex: &mut Executor) -> DbResult<Vec<LocationCount>> {
    with_backend!(ex, |conn, DB, map_err| {
        let query_str = "
            SELECT city AS name, COUNT(*) AS property_count
            FROM properties
            GROUP BY city
            ORDER BY property_count DESC, city";
        let rows = sqlx::query(query_str).fetch_all(&mut *conn).await.map_err(map_err)?;
        rows.iter()
            .map(|row| {
                Ok(LocationCount {
                    name: row.text("name")?,
                    property_count: row.int("property_count")?,
                })
            })
            .collect()
    })
}

/// Gets the distinct districts of `city` and how many properties each one has, most populated
/// first.
pub(crate) async fn list_districts(ex: &mut Executor, city: &City) -> DbResult<Vec<LocationCount>> {
    with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new(
            "SELECT district AS name, COUNT(*) AS property_count FROM properties WHERE city = ",
        );
        qb.push_bind(city.as_str());
        qb.push(" GROUP BY district ORDER BY property_count DESC, district");
        let rows = qb.build().fetch_all(&mut *conn).await.map_err(map_err)?;
        rows.iter()
            .map(|row| {
                Ok(LocationCount {
                    name: row.text("name")?,
                    property_count: row.int("property_count")?,
                })
            })
            .collect()
    })
}

/// Creates a new booking from `booking` charging `total_amount`, and returns it with its
/// assigned identifier.
pub(crate) async fn create_booking(
    ex: &mut Executor,
    booking: &NewBooking,
    total_amount: i64,
) -> DbResult<Booking> {
    let booking_id = with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new(
            "INSERT INTO bookings
                (property_id, source_channel, guest_name, guest_id_no, check_in, check_out,
                total_amount, is_tax_included, breakfast_included, special_note, status)
            VALUES (",
        );
        let mut values = qb.separated(", ");
        values.push_bind(booking.property_id.as_i64());
        values.push_bind(booking.source_channel.as_str());
        values.push_bind(booking.guest_name.as_str());
        values.push_bind(booking.guest_id_no.as_str());
        values.push_bind(booking.range.check_in());
        values.push_bind(booking.range.check_out());
        values.push_bind(total_amount);
        values.push_bind(booking.is_tax_included);
        values.push_bind(booking.breakfast_included);
        values.push_bind(booking.special_note.as_ref().map(SpecialNote::as_str));
        values.push_bind(booking.status.as_str());
        qb.push(") RETURNING booking_id");
        let row = qb.build().fetch_one(&mut *conn).await.map_err(map_err)?;
        row.int("booking_id")?
    });
    Ok(Booking {
        booking_id: BookingId::new(booking_id)?,
        property_id: booking.property_id,
        source_channel: booking.source_channel,
        guest_name: booking.guest_name.clone(),
        guest_id_no: booking.guest_id_no.clone(),
        check_in: booking.range.check_in(),
        check_out: booking.range.check_out(),
        total_amount,
        is_tax_included: booking.is_tax_included,
        breakfast_included: booking.breakfast_included,
        special_note: booking.special_note.clone(),
        status: booking.status,
    })
}

/// Gets the booking identified by `booking_id`.
pub(crate) async fn get_booking(ex: &mut Executor, booking_id: BookingId) -> DbResult<Booking> {
    with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new("SELECT * FROM bookings WHERE booking_id = ");
        qb.push_bind(booking_id.as_i64());
        match qb.build().fetch_optional(&mut *conn).await.map_err(map_err)? {
            Some(row) => booking_from_row(&row),
            None => Err(DbError::NotFound),
        }
    })
}

/// Gets the booking identified by `booking_id` with the names of its property and owner.
pub(crate) async fn get_booking_listing(
    ex: &mut Executor,
    booking_id: BookingId,
) -> DbResult<BookingListing> {
    with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new(BOOKING_LISTING_QUERY);
        qb.push(" AND b.booking_id = ");
        qb.push_bind(booking_id.as_i64());
        match qb.build().fetch_optional(&mut *conn).await.map_err(map_err)? {
            Some(row) => listing_from_row(&row),
            None => Err(DbError::NotFound),
        }
    })
}

/// Gets the booking identified by `booking_id` with the full data of its property and owner.
///
/// `today` is the business date used to compute the phase of the stay.
pub(crate) async fn get_booking_details(
    ex: &mut Executor,
    booking_id: BookingId,
    today: Date,
) -> DbResult<BookingDetails> {
    with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new(BOOKING_LISTING_QUERY);
        qb.push(" AND b.booking_id = ");
        qb.push_bind(booking_id.as_i64());
        match qb.build().fetch_optional(&mut *conn).await.map_err(map_err)? {
            Some(row) => {
                let listing = listing_from_row(&row)?;
                let current_status = StayPhase::of(&listing.booking.range(), today);
                Ok(BookingDetails {
                    listing,
                    property_address: row.text("property_address")?,
                    base_price_twd: row.int("base_price_twd")?,
                    owner_email: row.text("owner_email")?,
                    owner_phone: row.opt_text("owner_phone")?,
                    owner_tax_id: row.opt_text("owner_tax_id")?,
                    current_status,
                })
            }
            None => Err(DbError::NotFound),
        }
    })
}

/// Pushes the `WHERE` conditions that implement `filter` into the query builder `$qb`.
///
/// The query must alias the `bookings` table as `b`.
macro_rules! push_booking_filters [
    ( $qb:ident, $filter:expr ) => {
        if let Some(status) = $filter.status {
            $qb.push(" AND b.status = ");
            $qb.push_bind(status.as_str());
        }
        if let Some(channel) = $filter.source_channel {
            $qb.push(" AND b.source_channel = ");
            $qb.push_bind(channel.as_str());
        }
        if let Some(property_id) = $filter.property_id {
            $qb.push(" AND b.property_id = ");
            $qb.push_bind(property_id.as_i64());
        }
        if let Some(guest_name) = &$filter.guest_name {
            $qb.push(" AND LOWER(b.guest_name) LIKE LOWER(");
            $qb.push_bind(like_pattern(guest_name));
            $qb.push(") ESCAPE '\\'");
        }
        if let Some(start_date) = $filter.start_date {
            $qb.push(" AND b.check_in >= ");
            $qb.push_bind(start_date);
        }
        if let Some(end_date) = $filter.end_date {
            $qb.push(" AND b.check_out <= ");
            $qb.push_bind(end_date);
        }
    }
];

/// Builds a `LIKE` pattern that matches any text containing `needle` literally.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Gets one page of the bookings that match `filter`, newest first.
pub(crate) async fn list_bookings(
    ex: &mut Executor,
    filter: &BookingFilter,
    page: Page,
) -> DbResult<Paginated<BookingListing>> {
    with_backend!(ex, |conn, DB, map_err| {
        let mut qb =
            QueryBuilder::<DB>::new("SELECT COUNT(*) AS total FROM bookings b WHERE 1 = 1");
        push_booking_filters!(qb, filter);
        let row = qb.build().fetch_one(&mut *conn).await.map_err(map_err)?;
        let total = row.int("total")?;

        let mut qb = QueryBuilder::<DB>::new(BOOKING_LISTING_QUERY);
        push_booking_filters!(qb, filter);
        qb.push(" ORDER BY b.booking_id DESC");
        push_page!(qb, page);
        let rows = qb.build().fetch_all(&mut *conn).await.map_err(map_err)?;
        let items = rows
            .iter()
            .map(|row| listing_from_row(row))
            .collect::<DbResult<Vec<BookingListing>>>()?;
        Ok(Paginated { items, total: total as u64 })
    })
}

/// Gets all bookings of `property_id`, newest first.
pub(crate) async fn list_property_bookings(
    ex: &mut Executor,
    property_id: PropertyId,
) -> DbResult<Vec<Booking>> {
    with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new("SELECT * FROM bookings WHERE property_id = ");
        qb.push_bind(property_id.as_i64());
        qb.push(" ORDER BY booking_id DESC");
        let rows = qb.build().fetch_all(&mut *conn).await.map_err(map_err)?;
        rows.iter().map(|row| booking_from_row(row)).collect()
    })
}

/// Gets the active bookings of `property_id` in check-in order.
///
/// If `ending_after` is present, only returns the bookings that check out after that day.  These
/// are the only bookings that can conflict with a stay starting on that day.
pub(crate) async fn list_active_bookings(
    ex: &mut Executor,
    property_id: PropertyId,
    ending_after: Option<Date>,
) -> DbResult<Vec<Booking>> {
    with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new("SELECT * FROM bookings WHERE property_id = ");
        qb.push_bind(property_id.as_i64());
        qb.push(" AND status IN ");
        qb.push(ACTIVE_STATUSES);
        if let Some(day) = ending_after {
            qb.push(" AND check_out > ");
            qb.push_bind(day);
        }
        qb.push(" ORDER BY check_in, booking_id");
        let rows = qb.build().fetch_all(&mut *conn).await.map_err(map_err)?;
        rows.iter().map(|row| booking_from_row(row)).collect()
    })
}

/// Overwrites all mutable fields of the stored booking with those in `booking`.
pub(crate) async fn update_booking(ex: &mut Executor, booking: &Booking) -> DbResult<()> {
    let rows_affected = with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new("UPDATE bookings SET ");
        let mut set = qb.separated(", ");
        set.push("source_channel = ");
        set.push_bind_unseparated(booking.source_channel.as_str());
        set.push("guest_name = ");
        set.push_bind_unseparated(booking.guest_name.as_str());
        set.push("guest_id_no = ");
        set.push_bind_unseparated(booking.guest_id_no.as_str());
        set.push("check_in = ");
        set.push_bind_unseparated(booking.check_in);
        set.push("check_out = ");
        set.push_bind_unseparated(booking.check_out);
        set.push("total_amount = ");
        set.push_bind_unseparated(booking.total_amount);
        set.push("is_tax_included = ");
        set.push_bind_unseparated(booking.is_tax_included);
        set.push("breakfast_included = ");
        set.push_bind_unseparated(booking.breakfast_included);
        set.push("special_note = ");
        set.push_bind_unseparated(booking.special_note.as_ref().map(SpecialNote::as_str));
        set.push("status = ");
        set.push_bind_unseparated(booking.status.as_str());
        qb.push(" WHERE booking_id = ");
        qb.push_bind(booking.booking_id.as_i64());
        qb.build().execute(&mut *conn).await.map_err(map_err)?.rows_affected()
    });
    ensure_one_row(rows_affected)
}

/// Moves the booking identified by `booking_id` from status `from` to status `to`.
///
/// Returns `NotFound` if the booking does not exist or if its status is no longer `from`.
pub(crate) async fn set_booking_status(
    ex: &mut Executor,
    booking_id: BookingId,
    from: BookingStatus,
    to: BookingStatus,
) -> DbResult<()> {
    let rows_affected = with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new("UPDATE bookings SET status = ");
        qb.push_bind(to.as_str());
        qb.push(" WHERE booking_id = ");
        qb.push_bind(booking_id.as_i64());
        qb.push(" AND status = ");
        qb.push_bind(from.as_str());
        qb.build().execute(&mut *conn).await.map_err(map_err)?.rows_affected()
    });
    ensure_one_row(rows_affected)
}

/// Deletes the booking identified by `booking_id`.
pub(crate) async fn delete_booking(ex: &mut Executor, booking_id: BookingId) -> DbResult<()> {
    let rows_affected = with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new("DELETE FROM bookings WHERE booking_id = ");
        qb.push_bind(booking_id.as_i64());
        qb.build().execute(&mut *conn).await.map_err(map_err)?.rows_affected()
    });
    ensure_one_row(rows_affected)
}

/// Number and value of the bookings that share a status and a channel.
#[derive(Debug, PartialEq)]
pub(crate) struct BookingTally {
    /// Status of the bookings in this tally.
    pub(crate) status: BookingStatus,

    /// Channel of the bookings in this tally.
    pub(crate) source_channel: Channel,

    /// Number of bookings.
    pub(crate) booking_count: i64,

    /// Sum of the amounts of the bookings.
    pub(crate) amount: i64,
}

/// Tallies the bookings by status and channel, optionally restricted to those that check in
/// within `[check_in_from, check_in_before)`.
pub(crate) async fn tally_bookings(
    ex: &mut Executor,
    check_in_from: Option<Date>,
    check_in_before: Option<Date>,
) -> DbResult<Vec<BookingTally>> {
    with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new(
            "SELECT status, source_channel, COUNT(*) AS booking_count,
                CAST(COALESCE(SUM(total_amount), 0) AS BIGINT) AS amount
            FROM bookings WHERE 1 = 1",
        );
        if let Some(from) = check_in_from {
            qb.push(" AND check_in >= ");
            qb.push_bind(from);
        }
        if let Some(before) = check_in_before {
            qb.push(" AND check_in < ");
            qb.push_bind(before);
        }
        qb.push(" GROUP BY status, source_channel");
        let rows = qb.build().fetch_all(&mut *conn).await.map_err(map_err)?;
        rows.iter()
            .map(|row| {
                Ok(BookingTally {
                    status: BookingStatus::parse(&row.text("status")?)?,
                    source_channel: Channel::parse(&row.text("source_channel")?)?,
                    booking_count: row.int("booking_count")?,
                    amount: row.int("amount")?,
                })
            })
            .collect()
    })
}

/// Counts the bookings that check in and that check out on `day`, in any status.
pub(crate) async fn count_movements(ex: &mut Executor, day: Date) -> DbResult<(i64, i64)> {
    with_backend!(ex, |conn, DB, map_err| {
        let mut qb =
            QueryBuilder::<DB>::new("SELECT (SELECT COUNT(*) FROM bookings WHERE check_in = ");
        qb.push_bind(day);
        qb.push(") AS checking_in, (SELECT COUNT(*) FROM bookings WHERE check_out = ");
        qb.push_bind(day);
        qb.push(") AS checking_out");
        let row = qb.build().fetch_one(&mut *conn).await.map_err(map_err)?;
        Ok((row.int("checking_in")?, row.int("checking_out")?))
    })
}

/// Gets the bookings that match `filter` joined with their property and owner data, in
/// check-in order.
pub(crate) async fn get_report_rows(
    ex: &mut Executor,
    filter: &ReportFilter,
) -> DbResult<Vec<ReportRow>> {
    with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new(
            "SELECT
                b.property_id, b.source_channel, b.guest_name, b.guest_id_no, b.check_in,
                b.check_out, b.total_amount, b.is_tax_included, b.breakfast_included, b.status,
                p.legal_license_no, p.owner_id, u.full_name AS owner_name,
                u.company_tax_id AS owner_tax_id, u.bank_code AS owner_bank_code,
                u.bank_account AS owner_bank_account
            FROM bookings b
            JOIN properties p ON p.property_id = b.property_id
            JOIN users u ON u.user_id = p.owner_id
            WHERE 1 = 1",
        );
        if !filter.statuses.is_empty() {
            qb.push(" AND b.status IN (");
            let mut list = qb.separated(", ");
            for status in &filter.statuses {
                list.push_bind(status.as_str());
            }
            qb.push(")");
        }
        if let Some(property_id) = filter.property_id {
            qb.push(" AND b.property_id = ");
            qb.push_bind(property_id.as_i64());
        }
        if let Some(channel) = filter.source_channel {
            qb.push(" AND b.source_channel = ");
            qb.push_bind(channel.as_str());
        }
        if let Some(from) = filter.check_in_from {
            qb.push(" AND b.check_in >= ");
            qb.push_bind(from);
        }
        if let Some(before) = filter.check_in_before {
            qb.push(" AND b.check_in < ");
            qb.push_bind(before);
        }
        if let Some(until) = filter.check_out_until {
            qb.push(" AND b.check_out <= ");
            qb.push_bind(until);
        }
        qb.push(" ORDER BY b.check_in, b.booking_id");
        let rows = qb.build().fetch_all(&mut *conn).await.map_err(map_err)?;
        rows.iter()
            .map(|row| {
                Ok(ReportRow {
                    property_id: PropertyId::new(row.int("property_id")?)?,
                    source_channel: Channel::parse(&row.text("source_channel")?)?,
                    guest_name: row.text("guest_name")?,
                    guest_id_no: row.text("guest_id_no")?,
                    check_in: row.date("check_in")?,
                    check_out: row.date("check_out")?,
                    total_amount: row.int("total_amount")?,
                    is_tax_included: row.flag("is_tax_included")?,
                    breakfast_included: row.flag("breakfast_included")?,
                    status: BookingStatus::parse(&row.text("status")?)?,
                    legal_license_no: row.opt_text("legal_license_no")?,
                    owner_id: UserId::new(row.int("owner_id")?)?,
                    owner_name: row.text("owner_name")?,
                    owner_tax_id: row.opt_text("owner_tax_id")?,
                    owner_bank_code: row.opt_text("owner_bank_code")?,
                    owner_bank_account: row.opt_text("owner_bank_account")?,
                })
            })
            .collect()
    })
}

/// Gets the descriptive data of all properties, or only of `property_id` if given, in
/// ascending identifier order.
pub(crate) async fn list_property_refs(
    ex: &mut Executor,
    property_id: Option<PropertyId>,
) -> DbResult<Vec<PropertyRef>> {
    with_backend!(ex, |conn, DB, map_err| {
        let mut qb = QueryBuilder::<DB>::new(
            "SELECT
                p.property_id, p.title, p.city, p.district, p.base_price_twd,
                u.full_name AS owner_name
            FROM properties p
            JOIN users u ON u.user_id = p.owner_id",
        );
        if let Some(property_id) = property_id {
            qb.push(" WHERE p.property_id = ");
            qb.push_bind(property_id.as_i64());
        }
        qb.push(" ORDER BY p.property_id");
        let rows = qb.build().fetch_all(&mut *conn).await.map_err(map_err)?;
        rows.iter()
            .map(|row| {
                Ok(PropertyRef {
                    property_id: PropertyId::new(row.int("property_id")?)?,
                    title: row.text("title")?,
                    city: row.text("city")?,
                    district: row.text("district")?,
                    base_price_twd: row.int("base_price_twd")?,
                    owner_name: row.text("owner_name")?,
                })
            })
            .collect()
    })
}
