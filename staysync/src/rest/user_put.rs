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

//! API to update some fields of a user.

use crate::driver::Driver;
use crate::model::{BankAccount, BankCode, FullName, Phone, TaxId, UserId, UserUpdate};
use crate::rest::{clearable_text, nullable, path_id};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use staysync_core::model::{EmailAddress, FieldErrors};
use staysync_core::rest::{ApiResponse, JsonBody, RestResult};

/// Untrusted contents of a user update request.  Absent fields are left untouched and optional
/// fields set to `null` are cleared.
#[derive(Default, Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub(crate) struct Request {
    /// New full legal name.
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    full_name: Option<String>,

    /// New contact email.
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    email: Option<String>,

    /// New company tax ID.
    #[serde(default, deserialize_with = "nullable")]
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    company_tax_id: Option<Option<String>>,

    /// New mobile phone.
    #[serde(default, deserialize_with = "nullable")]
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    phone: Option<Option<String>>,

    /// New bank code.
    #[serde(default, deserialize_with = "nullable")]
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    bank_code: Option<Option<String>>,

    /// New bank account.
    #[serde(default, deserialize_with = "nullable")]
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    bank_account: Option<Option<String>>,
}

impl Request {
    /// Validates all given fields and builds the update to apply.
    fn into_update(self) -> Result<UserUpdate, FieldErrors> {
        let mut errors = FieldErrors::default();
        let update = UserUpdate {
            full_name: errors.optional("full_name", self.full_name, FullName::new),
            email: errors.optional("email", self.email, EmailAddress::new),
            company_tax_id: clearable_text(
                &mut errors,
                "company_tax_id",
                self.company_tax_id,
                TaxId::new,
            ),
            phone: clearable_text(&mut errors, "phone", self.phone, Phone::new),
            bank_code: clearable_text(&mut errors, "bank_code", self.bank_code, BankCode::new),
            bank_account: clearable_text(
                &mut errors,
                "bank_account",
                self.bank_account,
                BankAccount::new,
            ),
        };
        errors.finish()?;
        Ok(update)
    }
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Path(user_id): Path<String>,
    JsonBody(request): JsonBody<Request>,
) -> RestResult<impl IntoResponse> {
    let user_id = path_id::<UserId>(&user_id)?;
    let update = request.into_update()?;
    let user = driver.update_user(user_id, update).await?;
    Ok(ApiResponse::new(user).with_message("User updated successfully"))
}
