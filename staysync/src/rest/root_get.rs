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

//! API to describe the service and where its resources live.

use axum::Json;
use serde::{Deserialize, Serialize};
use staysync_core::rest::EmptyBody;

/// Locations of the resource collections.
#[derive(Deserialize, Serialize)]
#[cfg_attr(test, derive(Debug, PartialEq))]
pub(crate) struct Endpoints {
    /// Liveness check.
    health: String,

    /// User accounts.
    users: String,

    /// Rental properties.
    properties: String,

    /// Bookings.
    bookings: String,

    /// Business reports.
    reports: String,
}

/// Description of the service.
#[derive(Deserialize, Serialize)]
#[cfg_attr(test, derive(Debug, PartialEq))]
pub(crate) struct Response {
    /// Name of the service.
    name: String,

    /// Version of the service.
    version: String,

    /// What the service does.
    description: String,

    /// Resource collections.
    endpoints: Endpoints,
}

/// API handler for a service whose APIs are mounted under `api_prefix`.
pub(crate) async fn handler(api_prefix: String, _: EmptyBody) -> Json<Response> {
    Json(Response {
        name: "StaySync API".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        description: "Short-term rental management for Taiwan".to_owned(),
        endpoints: Endpoints {
            health: "/health".to_owned(),
            users: format!("{}/users", api_prefix),
            properties: format!("{}/properties", api_prefix),
            bookings: format!("{}/bookings", api_prefix),
            reports: format!("{}/reports", api_prefix),
        },
    })
}
