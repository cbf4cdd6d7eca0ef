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

//! StaySync: REST service to manage short-term rentals in Taiwan.
//!
//! The service keeps track of property owners, their licensed properties and the bookings of
//! those properties, and derives the business and tax reports that owners need.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

use log::info;
use staysync_core::clocks::SystemClock;
use staysync_core::db::Db;
use staysync_core::env::get_optional_var;
use std::error::Error;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

pub mod db;
mod driver;
use driver::Driver;
mod model;
mod rest;
use rest::{app, cors_layer};

/// Configuration of the HTTP server.
#[derive(Debug, PartialEq)]
pub struct ServerOptions {
    /// Address to listen on.
    pub bind_address: IpAddr,

    /// Port to listen on.
    pub port: u16,

    /// Version component of the `/api/<version>` prefix under which the APIs are mounted.
    pub api_version: String,

    /// Origin allowed to make cross-origin requests.  Any origin is allowed if not set.
    pub cors_origin: Option<String>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            api_version: "v1".to_owned(),
            cors_origin: None,
        }
    }
}

impl ServerOptions {
    /// Initializes a set of options from environment variables whose name is prefixed with the
    /// given `prefix`.
    ///
    /// This will use variables such as `<prefix>_PORT`, `<prefix>_BIND_ADDRESS`,
    /// `<prefix>_API_VERSION` and `<prefix>_CORS_ORIGIN`, all of which are optional.
    pub fn from_env(prefix: &str) -> Result<Self, String> {
        let defaults = Self::default();
        Ok(Self {
            bind_address: get_optional_var::<IpAddr>(prefix, "BIND_ADDRESS")?
                .unwrap_or(defaults.bind_address),
            port: get_optional_var::<u16>(prefix, "PORT")?.unwrap_or(defaults.port),
            api_version: get_optional_var::<String>(prefix, "API_VERSION")?
                .unwrap_or(defaults.api_version),
            cors_origin: get_optional_var::<String>(prefix, "CORS_ORIGIN")?,
        })
    }
}

/// Instantiates all resources to serve the application backed by `db` as configured by
/// `options`.
///
/// While it'd be nice to push this responsibility to `main`, doing so would force us to expose many
/// crate-internal types to the public, which in turn would make dead code detection harder.
pub async fn serve(
    options: ServerOptions,
    db: Arc<dyn Db + Send + Sync>,
) -> Result<(), Box<dyn Error>> {
    let cors = cors_layer(options.cors_origin.as_deref())?;
    let driver = Driver::new(db, Arc::new(SystemClock::default()));
    let app = app(driver, &options.api_version, cors);

    let listener = tokio::net::TcpListener::bind((options.bind_address, options.port)).await?;
    info!("Listening on {} with APIs under /api/{}", listener.local_addr()?, options.api_version);
    axum::serve(listener, app).await?;
    Ok(())
}
