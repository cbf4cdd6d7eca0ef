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

//! Property owners and their payout profiles.

use crate::model::{Property, UserId};
use regex::Regex;
use serde::{Deserialize, Serialize};
use staysync_core::model::{EmailAddress, ModelError, ModelResult};
use std::sync::LazyLock;

bounded_string!(
    /// Full legal name of a user.
    FullName,
    "Full name",
    2,
    100
);

bounded_string!(
    /// Bank account number for payouts.
    BankAccount,
    "Bank account",
    10,
    20
);

/// Taiwan unified business number, made of exactly 8 digits.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(try_from = "String")]
pub struct TaxId(String);

impl TaxId {
    /// Creates a new tax ID from an untrusted string `s`, making sure it is valid.
    pub fn new<S: Into<String>>(s: S) -> ModelResult<Self> {
        let s = s.into();
        let s = s.trim();
        if s.len() != 8 || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(ModelError("Company tax ID must be exactly 8 digits".to_owned()));
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns a string view of the tax ID.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TaxId {
    type Error = ModelError;

    fn try_from(s: String) -> ModelResult<Self> {
        Self::new(s)
    }
}

/// Pattern of Taiwan mobile phone numbers, with optional dashes.
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^09\d{2}-?\d{3}-?\d{3}$").expect("Hardcoded regex must be valid")
});

/// Taiwan mobile phone number in the `09XX-XXX-XXX` format.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(try_from = "String")]
pub struct Phone(String);

impl Phone {
    /// Creates a new phone number from an untrusted string `s`, making sure it is valid.
    pub fn new<S: Into<String>>(s: S) -> ModelResult<Self> {
        let s = s.into();
        let s = s.trim();
        if !PHONE_RE.is_match(s) {
            return Err(ModelError(
                "Phone number must be a Taiwan mobile number in the 09XX-XXX-XXX format".to_owned(),
            ));
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns a string view of the phone number.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Phone {
    type Error = ModelError;

    fn try_from(s: String) -> ModelResult<Self> {
        Self::new(s)
    }
}

/// Code of the bank that receives payouts, exactly 3 characters long.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(try_from = "String")]
pub struct BankCode(String);

impl BankCode {
    /// Creates a new bank code from an untrusted string `s`, making sure it is valid.
    pub fn new<S: Into<String>>(s: S) -> ModelResult<Self> {
        let s = s.into();
        let s = s.trim();
        if s.chars().count() != 3 {
            return Err(ModelError("Bank code must be exactly 3 characters".to_owned()));
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns a string view of the bank code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BankCode {
    type Error = ModelError;

    fn try_from(s: String) -> ModelResult<Self> {
        Self::new(s)
    }
}

/// Identity and payout details of a user.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct UserProfile {
    /// Full legal name.
    pub full_name: FullName,

    /// Contact email, unique across users.
    pub email: EmailAddress,

    /// Tax ID of the company operating the properties, if any.
    pub company_tax_id: Option<TaxId>,

    /// Contact phone.
    pub phone: Option<Phone>,

    /// Bank code for payouts.
    pub bank_code: Option<BankCode>,

    /// Bank account for payouts.
    pub bank_account: Option<BankAccount>,
}

/// A persisted user.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct User {
    /// Identifier assigned by the database.
    pub user_id: UserId,

    /// Identity and payout details.
    #[serde(flatten)]
    pub profile: UserProfile,
}

/// Changes to apply to an existing user.  Fields set to `None` are left untouched, and optional
/// fields set to `Some(None)` are cleared.
#[derive(Debug, Default, PartialEq)]
pub struct UserUpdate {
    /// New full name.
    pub full_name: Option<FullName>,

    /// New email address.
    pub email: Option<EmailAddress>,

    /// New tax ID.
    pub company_tax_id: Option<Option<TaxId>>,

    /// New phone.
    pub phone: Option<Option<Phone>>,

    /// New bank code.
    pub bank_code: Option<Option<BankCode>>,

    /// New bank account.
    pub bank_account: Option<Option<BankAccount>>,
}

impl UserUpdate {
    /// Returns true if the update does not modify any field.
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.email.is_none()
            && self.company_tax_id.is_none()
            && self.phone.is_none()
            && self.bank_code.is_none()
            && self.bank_account.is_none()
    }
}

/// Aggregated activity of the properties owned by a user.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct UserStats {
    /// Number of properties owned.
    pub property_count: i64,

    /// Average nightly base price across the owned properties.
    pub avg_price: f64,

    /// Number of bookings across all owned properties, in any status.
    pub total_bookings: i64,

    /// Revenue of the bookings that were not cancelled.
    pub total_revenue: i64,

    /// Number of bookings that are reserved or checked in.
    pub active_bookings: i64,
}

/// A user along with the statistics of their properties.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct UserDetails {
    /// The user.
    #[serde(flatten)]
    pub user: User,

    /// Activity of the user's properties.
    pub statistics: UserStats,
}

/// A property as listed under its owner.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct OwnedProperty {
    /// The property.
    #[serde(flatten)]
    pub property: Property,

    /// Number of bookings of the property, in any status.
    pub total_bookings: i64,

    /// Revenue of the bookings that were not cancelled.
    pub total_revenue: i64,
}
