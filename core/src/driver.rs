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

//! Generic business logic for any service.
//!
//! Every service should implement its own `Driver` type, holding the database it coordinates and
//! any other in-memory state required by the app:
//!
//! ```rust
//! use staysync_core::clocks::Clock;
//! use staysync_core::db::Db;
//! use std::sync::Arc;
//!
//! #[derive(Clone)]
//! pub struct Driver {
//!     /// The database that the driver uses for persistence.
//!     db: Arc<dyn Db + Send + Sync>,
//!
//!     /// Clock instance to obtain the current time.
//!     clock: Arc<dyn Clock + Send + Sync>,
//! }
//! ```
//!
//! Every operation implemented in the `Driver` should take consume `self` because this is the
//! layer that coordinates multiple operations against the database inside a single transaction.
//! Consuming `self` prevents the caller from easily issuing multiple operations against the driver,
//! as this would require a clone and highlight an undesirable pattern.
//!
//! Every error carries a stable, machine-readable code that the REST layer forwards to clients.

use crate::db::DbError;
use crate::model::FieldErrors;

/// Business logic errors.  These errors encompass backend and logical errors.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum DriverError {
    /// Indicates that a request to create an entry failed because a unique field is taken.
    #[error("{message}")]
    AlreadyExists {
        /// Stable code identifying the condition.
        code: &'static str,

        /// Descriptive message explaining the nature of the problem.
        message: String,
    },

    /// Catch-all error type for unexpected database errors.
    #[error("{0}")]
    BackendError(String),

    /// Indicates that the request is well-formed but clashes with the current state of the data,
    /// such as overlapping stays or disallowed status changes.
    #[error("{message}")]
    Conflict {
        /// Stable code identifying the condition.
        code: &'static str,

        /// Descriptive message explaining the nature of the problem.
        message: String,

        /// Diagnostic data to help the caller understand the conflict.
        details: Option<serde_json::Value>,
    },

    /// Indicates that an entry cannot be deleted because other entries still reference it.
    #[error("{message}")]
    HasDependents {
        /// Stable code identifying the condition.
        code: &'static str,

        /// Descriptive message explaining the nature of the problem.
        message: String,

        /// Diagnostic data, typically the number of dependents.
        details: Option<serde_json::Value>,
    },

    /// Indicates an error in the input data that is not tied to a specific field.
    #[error("{message}")]
    InvalidInput {
        /// Stable code identifying the condition.
        code: &'static str,

        /// Descriptive message explaining the nature of the problem.
        message: String,
    },

    /// Indicates that a requested entry does not exist.
    #[error("{message}")]
    NotFound {
        /// Stable code identifying the condition.
        code: &'static str,

        /// Descriptive message explaining the nature of the problem.
        message: String,
    },

    /// Indicates that one or more input fields failed validation.
    #[error("{0}")]
    Validation(FieldErrors),
}

impl DriverError {
    /// Shorthand to construct a `NotFound` error.
    pub fn not_found<S: Into<String>>(code: &'static str, message: S) -> Self {
        DriverError::NotFound { code, message: message.into() }
    }

    /// Shorthand to construct an `InvalidInput` error.
    pub fn invalid_input<S: Into<String>>(code: &'static str, message: S) -> Self {
        DriverError::InvalidInput { code, message: message.into() }
    }
}

impl From<DbError> for DriverError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::AlreadyExists => {
                DriverError::AlreadyExists { code: "ALREADY_EXISTS", message: e.to_string() }
            }
            DbError::BackendError(_) => DriverError::BackendError(e.to_string()),
            DbError::DataIntegrityError(_) => DriverError::BackendError(e.to_string()),
            DbError::NotFound => DriverError::not_found("NOT_FOUND", e.to_string()),
            DbError::Unavailable => DriverError::BackendError(e.to_string()),
        }
    }
}

impl From<FieldErrors> for DriverError {
    fn from(e: FieldErrors) -> Self {
        DriverError::Validation(e)
    }
}

/// Result type for this module.
pub type DriverResult<T> = Result<T, DriverError>;
