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

//! Operations on users.

use crate::db;
use crate::driver::{Driver, NotFoundAs, USER_NOT_FOUND, no_update_data};
use crate::model::*;
use log::info;
use serde_json::json;
use staysync_core::db::DbError;
use staysync_core::driver::{DriverError, DriverResult};
use staysync_core::model::EmailAddress;

/// Builds the error returned when an email address is already registered.
fn email_taken(email: &str) -> DriverError {
    DriverError::AlreadyExists {
        code: "EMAIL_ALREADY_EXISTS",
        message: format!("Email {} is already registered", email),
    }
}

impl Driver {
    /// Gets one page of users, newest first.
    pub(crate) async fn list_users(self, page: Page) -> DriverResult<Paginated<User>> {
        let users = db::list_users(&mut self.db.ex().await?, page).await?;
        Ok(users)
    }

    /// Gets the user identified by `user_id` along with statistics about their properties.
    pub(crate) async fn get_user(self, user_id: UserId) -> DriverResult<UserDetails> {
        let mut ex = self.db.ex().await?;
        let user =
            db::get_user(&mut ex, user_id).await.not_found_as("USER_NOT_FOUND", USER_NOT_FOUND)?;
        let statistics = db::get_user_stats(&mut ex, user_id).await?;
        Ok(UserDetails { user, statistics })
    }

    /// Registers a new user described by `profile`.
    pub(crate) async fn create_user(self, profile: UserProfile) -> DriverResult<User> {
        let user = match db::create_user(&mut self.db.ex().await?, &profile).await {
            Ok(user) => user,
            Err(DbError::AlreadyExists) => return Err(email_taken(profile.email.as_str())),
            Err(e) => return Err(e.into()),
        };
        info!("Created user {}", user.user_id);
        Ok(user)
    }

    /// Applies `update` to the user identified by `user_id` and returns the updated user.
    pub(crate) async fn update_user(
        self,
        user_id: UserId,
        update: UserUpdate,
    ) -> DriverResult<User> {
        if update.is_empty() {
            return Err(no_update_data());
        }

        let mut tx = self.db.begin().await?;
        db::get_user(tx.ex(), user_id).await.not_found_as("USER_NOT_FOUND", USER_NOT_FOUND)?;
        match db::update_user(tx.ex(), user_id, &update).await {
            Ok(()) => (),
            Err(DbError::AlreadyExists) => {
                let email = update.email.as_ref().map(EmailAddress::as_str).unwrap_or_default();
                return Err(email_taken(email));
            }
            Err(e) => return Err(e.into()),
        }
        let user = db::get_user(tx.ex(), user_id).await?;
        tx.commit().await?;
        Ok(user)
    }

    /// Deletes the user identified by `user_id` unless they still own properties.
    pub(crate) async fn delete_user(self, user_id: UserId) -> DriverResult<()> {
        let mut tx = self.db.begin().await?;
        db::get_user(tx.ex(), user_id).await.not_found_as("USER_NOT_FOUND", USER_NOT_FOUND)?;
        let property_count = db::count_user_properties(tx.ex(), user_id).await?;
        if property_count > 0 {
            return Err(DriverError::HasDependents {
                code: "USER_HAS_PROPERTIES",
                message: format!(
                    "Cannot delete user {} because they still own {} properties",
                    user_id, property_count
                ),
                details: Some(json!({ "property_count": property_count })),
            });
        }
        db::delete_user(tx.ex(), user_id).await?;
        tx.commit().await?;
        info!("Deleted user {}", user_id);
        Ok(())
    }

    /// Gets the properties owned by `user_id` with their booking totals.
    pub(crate) async fn get_user_properties(
        self,
        user_id: UserId,
    ) -> DriverResult<Vec<OwnedProperty>> {
        let mut ex = self.db.ex().await?;
        db::get_user(&mut ex, user_id).await.not_found_as("USER_NOT_FOUND", USER_NOT_FOUND)?;
        let properties = db::list_owned_properties(&mut ex, user_id).await?;
        Ok(properties)
    }
}

#[cfg(test)]
mod tests {
    use crate::db;
    use crate::db::tests::{profile, property_info};
    use crate::driver::testutils::*;
    use crate::model::*;
    use staysync_core::driver::DriverError;
    use staysync_core::model::EmailAddress;

    #[tokio::test]
    async fn test_create_and_get_user() {
        let context = TestContext::setup().await;

        let mei = profile("Chen Mei-Ling", "mei@example.com");
        let user = context.driver().create_user(mei).await.unwrap();
        let details = context.driver().get_user(user.user_id).await.unwrap();
        assert_eq!(user, details.user);
        assert_eq!(UserStats::default(), details.statistics);
    }

    #[tokio::test]
    async fn test_create_user_duplicate_email() {
        let context = TestContext::setup().await;

        context.driver().create_user(profile("Chen Mei-Ling", "mei@example.com")).await.unwrap();
        match context.driver().create_user(profile("Other Person", "mei@example.com")).await {
            Err(DriverError::AlreadyExists { code, .. }) => {
                assert_eq!("EMAIL_ALREADY_EXISTS", code)
            }
            e => panic!("Unexpected result: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let context = TestContext::setup().await;

        assert_eq!(
            DriverError::not_found("USER_NOT_FOUND", "User not found"),
            context.driver().get_user(UserId::new(5).unwrap()).await.unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_update_user() {
        let context = TestContext::setup().await;
        let user = context.create_user("mei@example.com").await;

        let update = UserUpdate {
            bank_code: Some(Some(BankCode::new("812").unwrap())),
            ..Default::default()
        };
        let updated = context.driver().update_user(user.user_id, update).await.unwrap();
        assert_eq!(Some(BankCode::new("812").unwrap()), updated.profile.bank_code);
        assert_eq!(user.profile.full_name, updated.profile.full_name);
    }

    #[tokio::test]
    async fn test_update_user_errors() {
        let context = TestContext::setup().await;
        let user = context.create_user("mei@example.com").await;
        context.create_user("taken@example.com").await;

        match context.driver().update_user(user.user_id, UserUpdate::default()).await {
            Err(DriverError::InvalidInput { code, .. }) => assert_eq!("NO_UPDATE_DATA", code),
            e => panic!("Unexpected result: {:?}", e),
        }

        let update = UserUpdate {
            email: Some(EmailAddress::new("taken@example.com").unwrap()),
            ..Default::default()
        };
        match context.driver().update_user(user.user_id, update).await {
            Err(DriverError::AlreadyExists { code, .. }) => {
                assert_eq!("EMAIL_ALREADY_EXISTS", code)
            }
            e => panic!("Unexpected result: {:?}", e),
        }

        let update =
            UserUpdate { full_name: Some(FullName::from("New Name")), ..Default::default() };
        match context.driver().update_user(UserId::new(999).unwrap(), update).await {
            Err(DriverError::NotFound { code, .. }) => assert_eq!("USER_NOT_FOUND", code),
            e => panic!("Unexpected result: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_delete_user_guarded_by_properties() {
        let context = TestContext::setup().await;
        let user = context.create_user("owner@example.com").await;
        let info = property_info(user.user_id, "Cozy loft downtown", "Taipei", "Daan", 2500);
        let property = db::create_property(&mut context.ex().await, &info).await.unwrap();

        match context.driver().delete_user(user.user_id).await {
            Err(DriverError::HasDependents { code, details, .. }) => {
                assert_eq!("USER_HAS_PROPERTIES", code);
                assert_eq!(Some(serde_json::json!({"property_count": 1})), details);
            }
            e => panic!("Unexpected result: {:?}", e),
        }

        db::delete_property(&mut context.ex().await, property.property_id).await.unwrap();
        context.driver().delete_user(user.user_id).await.unwrap();
        match context.driver().delete_user(user.user_id).await {
            Err(DriverError::NotFound { code, .. }) => assert_eq!("USER_NOT_FOUND", code),
            e => panic!("Unexpected result: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_get_user_properties() {
        let context = TestContext::setup().await;
        let user = context.create_user("owner@example.com").await;
        let info = property_info(user.user_id, "Cozy loft downtown", "Taipei", "Daan", 2500);
        db::create_property(&mut context.ex().await, &info).await.unwrap();

        let properties = context.driver().get_user_properties(user.user_id).await.unwrap();
        assert_eq!(1, properties.len());
        assert_eq!(info, properties[0].property.info);

        match context.driver().get_user_properties(UserId::new(999).unwrap()).await {
            Err(DriverError::NotFound { code, .. }) => assert_eq!("USER_NOT_FOUND", code),
            e => panic!("Unexpected result: {:?}", e),
        }
    }
}
