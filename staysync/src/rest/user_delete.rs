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

//! API to delete a user who no longer owns properties.

use crate::driver::Driver;
use crate::model::UserId;
use crate::rest::path_id;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use staysync_core::rest::{ApiResponse, EmptyBody, RestResult};

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Path(user_id): Path<String>,
    _: EmptyBody,
) -> RestResult<impl IntoResponse> {
    let user_id = path_id::<UserId>(&user_id)?;
    driver.delete_user(user_id).await?;
    Ok(ApiResponse::new(()).with_message("User deleted successfully"))
}

#[cfg(test)]
mod tests {
    use crate::rest::testutils::*;
    use axum::http;
    use serde_json::json;
    use staysync_core::rest::testutils::*;

    fn route(user_id: &str) -> (http::Method, String) {
        (http::Method::DELETE, format!("/api/v1/users/{}", user_id))
    }

    #[tokio::test]
    async fn test_ok() {
        let context = TestContext::setup().await;
        let user = context.create_user("owner@example.com").await;

        OneShotBuilder::new(context.app(), route(&user.user_id.to_string()))
            .send_empty()
            .await
            .expect_data::<()>()
            .await;
        assert_eq!(None, context.get_user(user.user_id).await);
    }

    #[tokio::test]
    async fn test_has_properties() {
        let context = TestContext::setup().await;
        let user = context.create_user("owner@example.com").await;
        context.create_property(user.user_id, 2000).await;
        context.create_property(user.user_id, 2500).await;

        let response = OneShotBuilder::new(context.app(), route(&user.user_id.to_string()))
            .send_empty()
            .await
            .expect_status(http::StatusCode::CONFLICT)
            .expect_error_code("USER_HAS_PROPERTIES")
            .await;
        assert_eq!(Some(json!({"property_count": 2})), response.details);
        assert!(context.get_user(user.user_id).await.is_some());
    }

    #[tokio::test]
    async fn test_not_found() {
        let context = TestContext::setup().await;

        OneShotBuilder::new(context.into_app(), route("7"))
            .send_empty()
            .await
            .expect_status(http::StatusCode::NOT_FOUND)
            .expect_error_code("USER_NOT_FOUND")
            .await;
    }

    test_payload_must_be_empty!(TestContext::setup().await.into_app(), route("1"));
}
