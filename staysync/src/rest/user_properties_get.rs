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

//! API to list the properties owned by a user.

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
    let properties = driver.get_user_properties(user_id).await?;
    Ok(ApiResponse::new(properties))
}
