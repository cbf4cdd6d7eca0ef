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

//! API to create a user.

use crate::driver::Driver;
use crate::model::{BankAccount, BankCode, FullName, Phone, TaxId, UserProfile};
use crate::rest::optional_text;
use axum::extract::State;
use axum::http;
use axum::response::IntoResponse;
use serde::Deserialize;
use staysync_core::model::{EmailAddress, FieldErrors};
use staysync_core::rest::{ApiResponse, JsonBody, RestResult};

/// Message returned along with the new user.
const CREATED: &str = "User created successfully";

/// Untrusted contents of a user creation request.
#[derive(Default, Deserialize)]
#[cfg_attr(test, derive(serde::Serialize))]
pub(crate) struct Request {
    /// Full legal name.
    full_name: Option<String>,

    /// Contact email.
    email: Option<String>,

    /// Company tax ID.
    company_tax_id: Option<String>,

    /// Mobile phone.
    phone: Option<String>,

    /// Bank code for payouts.
    bank_code: Option<String>,

    /// Bank account for payouts.
    bank_account: Option<String>,
}

impl Request {
    /// Validates all fields of the request and builds the profile of the new user.
    fn into_profile(self) -> Result<UserProfile, FieldErrors> {
        let mut errors = FieldErrors::default();
        let full_name = errors.required("full_name", self.full_name, FullName::new);
        let email = errors.required("email", self.email, EmailAddress::new);
        let company_tax_id =
            optional_text(&mut errors, "company_tax_id", self.company_tax_id, TaxId::new);
        let phone = optional_text(&mut errors, "phone", self.phone, Phone::new);
        let bank_code = optional_text(&mut errors, "bank_code", self.bank_code, BankCode::new);
        let bank_account =
            optional_text(&mut errors, "bank_account", self.bank_account, BankAccount::new);

        match (full_name, email) {
            (Some(full_name), Some(email)) if errors.is_empty() => Ok(UserProfile {
                full_name,
                email,
                company_tax_id,
                phone,
                bank_code,
                bank_account,
            }),
            _ => Err(errors),
        }
    }
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    JsonBody(request): JsonBody<Request>,
) -> RestResult<impl IntoResponse> {
    let profile = request.into_profile()?;
    let user = driver.create_user(profile).await?;
    Ok((http::StatusCode::CREATED, ApiResponse::new(user).with_message(CREATED)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::User;
    use crate::rest::testutils::*;
    use staysync_core::rest::testutils::*;

    fn route() -> (http::Method, String) {
        (http::Method::POST, "/api/v1/users".to_owned())
    }

    /// Builds a request with valid values for all fields.
    fn full_request(email: &str) -> Request {
        Request {
            full_name: Some("王小明".to_owned()),
            email: Some(email.to_owned()),
            company_tax_id: Some("12345678".to_owned()),
            phone: Some("0912-345-678".to_owned()),
            bank_code: Some("812".to_owned()),
            bank_account: Some("1234567890123".to_owned()),
        }
    }

    #[tokio::test]
    async fn test_create_all_fields() {
        let context = TestContext::setup().await;

        let response = OneShotBuilder::new(context.app(), route())
            .send_json(full_request("ming@example.com"))
            .await
            .expect_status(http::StatusCode::CREATED)
            .expect_json::<ApiResponse<User>>()
            .await;
        assert_eq!(Some(CREATED), response.message.as_deref());
        let user = response.data;
        assert_eq!("王小明", user.profile.full_name.as_str());
        assert_eq!("ming@example.com", user.profile.email.as_str());
        assert_eq!("12345678", user.profile.company_tax_id.as_ref().unwrap().as_str());
        assert_eq!("0912-345-678", user.profile.phone.as_ref().unwrap().as_str());

        assert_eq!(Some(user.clone()), context.get_user(user.user_id).await);
    }

    #[tokio::test]
    async fn test_create_blank_optionals_are_absent() {
        let context = TestContext::setup().await;

        let request = Request {
            full_name: Some("Lin Mei".to_owned()),
            email: Some("mei@example.com".to_owned()),
            company_tax_id: Some("".to_owned()),
            phone: Some("  ".to_owned()),
            ..Default::default()
        };
        let user = OneShotBuilder::new(context.into_app(), route())
            .send_json(request)
            .await
            .expect_status(http::StatusCode::CREATED)
            .expect_data::<User>()
            .await;
        assert_eq!(None, user.profile.company_tax_id);
        assert_eq!(None, user.profile.phone);
    }

    #[tokio::test]
    async fn test_validation_reports_every_field() {
        let context = TestContext::setup().await;

        let request = Request {
            full_name: None,
            email: Some("not-an-email".to_owned()),
            company_tax_id: Some("1234".to_owned()),
            phone: Some("02-1234-5678".to_owned()),
            bank_code: Some("8".to_owned()),
            bank_account: Some("12".to_owned()),
        };
        let response = OneShotBuilder::new(context.into_app(), route())
            .send_json(request)
            .await
            .expect_status(http::StatusCode::BAD_REQUEST)
            .expect_error_code("VALIDATION_ERROR")
            .await;
        assert_eq!(
            vec!["full_name", "email", "company_tax_id", "phone", "bank_code", "bank_account"],
            error_fields(&response)
        );
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let context = TestContext::setup().await;
        context.create_user("taken@example.com").await;

        OneShotBuilder::new(context.into_app(), route())
            .send_json(full_request("taken@example.com"))
            .await
            .expect_status(http::StatusCode::CONFLICT)
            .expect_error_code("EMAIL_ALREADY_EXISTS")
            .await;
    }

    test_payload_must_be_json!(TestContext::setup().await.into_app(), route());
}
