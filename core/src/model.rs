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

//! Generic data types shared by all services.
//!
//! Types in this module validate their contents at construction time so that any value that
//! exists is known to be valid.  Request payloads are validated field by field and all failures
//! are collected in `FieldErrors` so that callers learn about every problem at once.

use serde::{Deserialize, Serialize};

mod emailaddress;
pub use emailaddress::EmailAddress;

/// Model errors.
#[derive(Debug, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct ModelError(pub String);

/// Result type for this module.
pub type ModelResult<T> = Result<T, ModelError>;

/// Describes why a single input field was rejected.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FieldError {
    /// Name of the field as it appears in the request.
    pub field: String,

    /// Human-readable reason for the rejection.
    pub message: String,
}

/// Collector of validation failures across all the fields of a request.
#[derive(Debug, Default, PartialEq, thiserror::Error)]
#[error("Validation failed for {}", join_fields(.0))]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    /// Creates a collection holding a single failure for `field`.
    pub fn single<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    /// Records that `field` failed validation with `message`.
    pub fn add<F: Into<String>, M: Into<String>>(&mut self, field: F, message: M) {
        self.0.push(FieldError { field: field.into(), message: message.into() });
    }

    /// Records a failure for `field` unless `ok` holds.
    pub fn check<M: Into<String>>(&mut self, field: &str, ok: bool, message: M) {
        if !ok {
            self.add(field, message);
        }
    }

    /// Validates the mandatory `raw` value of `field` with `parse`.
    ///
    /// Returns the parsed value, or `None` after recording why the value was missing or invalid.
    pub fn required<R, T, P>(&mut self, field: &str, raw: Option<R>, parse: P) -> Option<T>
    where
        P: FnOnce(R) -> ModelResult<T>,
    {
        match raw {
            Some(raw) => self.optional(field, Some(raw), parse),
            None => {
                self.add(field, format!("{} is required", field));
                None
            }
        }
    }

    /// Validates the optional `raw` value of `field` with `parse`.
    ///
    /// Returns `None` both when the value is absent and when it is invalid.  In the latter case
    /// the failure is recorded so that `finish` rejects the request.
    pub fn optional<R, T, P>(&mut self, field: &str, raw: Option<R>, parse: P) -> Option<T>
    where
        P: FnOnce(R) -> ModelResult<T>,
    {
        match raw.map(parse) {
            Some(Ok(value)) => Some(value),
            Some(Err(e)) => {
                self.add(field, e.0);
                None
            }
            None => None,
        }
    }

    /// Returns true if no failures have been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the names of the fields that failed, in the order they were recorded.
    pub fn fields(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.field.as_str()).collect()
    }

    /// Returns the recorded failures.
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Fails with all recorded errors, if any.
    pub fn finish(self) -> Result<(), FieldErrors> {
        if self.0.is_empty() { Ok(()) } else { Err(self) }
    }
}

/// Formats the names of the fields in `errors` as a comma-separated list.
fn join_fields(errors: &[FieldError]) -> String {
    errors.iter().map(|e| e.field.as_str()).collect::<Vec<&str>>().join(", ")
}

/// Validates that the trimmed length of `s` is within `[min, max]` characters and returns the
/// trimmed string.  `what` names the value in error messages.
pub fn bounded_text(what: &str, s: String, min: usize, max: usize) -> ModelResult<String> {
    let trimmed = s.trim();
    let len = trimmed.chars().count();
    if len < min {
        if min == 1 {
            return Err(ModelError(format!("{} cannot be empty", what)));
        }
        return Err(ModelError(format!("{} must be at least {} characters long", what, min)));
    }
    if len > max {
        return Err(ModelError(format!("{} must be at most {} characters long", what, max)));
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_collects_everything() {
        let mut errors = FieldErrors::default();
        let a: Option<String> =
            errors.required("a", None::<String>, |s| bounded_text("a", s, 1, 10));
        let b = errors.required("b", Some("x".to_owned()), |s| bounded_text("b", s, 2, 10));
        let c = errors.optional("c", Some("fine".to_owned()), |s| bounded_text("c", s, 1, 10));
        errors.check("d", false, "d is wrong");

        assert_eq!(None, a);
        assert_eq!(None, b);
        assert_eq!(Some("fine".to_owned()), c);
        assert_eq!(vec!["a", "b", "d"], errors.fields());
        assert_eq!("a is required", errors.errors()[0].message);
        assert_eq!("b must be at least 2 characters long", errors.errors()[1].message);

        let err = errors.finish().unwrap_err();
        assert_eq!("Validation failed for a, b, d", err.to_string());
    }

    #[test]
    fn test_field_errors_finish_ok() {
        let mut errors = FieldErrors::default();
        assert_eq!(None, errors.optional("x", None::<String>, |s| bounded_text("x", s, 1, 2)));
        assert!(errors.is_empty());
        errors.finish().unwrap();
    }

    #[test]
    fn test_bounded_text() {
        assert_eq!("abc", bounded_text("Name", "  abc ".to_owned(), 2, 5).unwrap());
        assert_eq!(
            ModelError("Name cannot be empty".to_owned()),
            bounded_text("Name", "   ".to_owned(), 1, 5).unwrap_err()
        );
        assert_eq!(
            ModelError("Name must be at most 5 characters long".to_owned()),
            bounded_text("Name", "abcdef".to_owned(), 1, 5).unwrap_err()
        );
        // Lengths count characters, not bytes.
        assert_eq!("台北市", bounded_text("City", "台北市".to_owned(), 1, 3).unwrap());
    }
}
