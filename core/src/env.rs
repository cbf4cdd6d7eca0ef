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

//! Helpers to read the service configuration from environment variables.
//!
//! Every setting lives in a variable named `<prefix>_<suffix>`, where the prefix identifies the
//! component being configured, such as `STAYSYNC` for the server or `PGSQL_PROD` for the
//! database.

use std::env;
use std::net::IpAddr;

/// Result type for environment errors.
type Result<T> = std::result::Result<T, String>;

/// Raw value of an environment variable, pending conversion to its target type.
pub struct Value(String);

impl TryFrom<Value> for String {
    type Error = String;

    fn try_from(value: Value) -> Result<Self> {
        Ok(value.0)
    }
}

/// Implements `TryFrom<Value>` for types that implement `FromStr`.
macro_rules! parse_value_as [
    ( $( $t:ty ),+ ) => {
        $(
            impl TryFrom<Value> for $t {
                type Error = String;

                fn try_from(value: Value) -> Result<Self> {
                    value.0.parse::<$t>().map_err(|e| format!("Invalid {}: {}", stringify!($t), e))
                }
            }
        )+
    }
];

parse_value_as!(u16, u32, IpAddr);

/// Reads and converts the variable `name`, returning `None` if it is not set.
fn lookup<T: TryFrom<Value, Error = String>>(name: &str) -> Result<Option<T>> {
    let raw = match env::var(name) {
        Ok(raw) => raw,
        Err(env::VarError::NotPresent) => return Ok(None),
        Err(env::VarError::NotUnicode(_)) => {
            return Err(format!("Invalid value in environment variable {}", name));
        }
    };
    T::try_from(Value(raw))
        .map(Some)
        .map_err(|e| format!("Invalid type in environment variable {}: {}", name, e))
}

/// Gets the required variable `<prefix>_<suffix>` converted to `T`.
pub fn get_required_var<T: TryFrom<Value, Error = String>>(
    prefix: &str,
    suffix: &str,
) -> Result<T> {
    let name = format!("{}_{}", prefix, suffix);
    lookup(&name)?.ok_or_else(|| format!("Required environment variable {} not present", name))
}

/// Gets the optional variable `<prefix>_<suffix>` converted to `T`, or `None` if it is not set.
pub fn get_optional_var<T: TryFrom<Value, Error = String>>(
    prefix: &str,
    suffix: &str,
) -> Result<Option<T>> {
    lookup(&format!("{}_{}", prefix, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    #[test]
    fn test_value_conversions() {
        assert_eq!("Tainan", String::try_from(Value("Tainan".to_owned())).unwrap());
        assert_eq!(3000u16, u16::try_from(Value("3000".to_owned())).unwrap());
        assert_eq!(25u32, u32::try_from(Value("25".to_owned())).unwrap());
        assert_eq!(
            IpAddr::from([0, 0, 0, 0]),
            IpAddr::try_from(Value("0.0.0.0".to_owned())).unwrap()
        );

        for (raw, prefix) in [("-1", "Invalid u16:"), ("70000", "Invalid u16:")] {
            let err = u16::try_from(Value(raw.to_owned())).unwrap_err();
            assert!(err.starts_with(prefix), "Bad error for {}: {}", raw, err);
        }
        assert!(IpAddr::try_from(Value("localhost".to_owned())).is_err());
    }

    #[test]
    fn test_get_required_var() {
        temp_env::with_var("STAYSYNC_TEST_HOST", Some("db.local"), || {
            assert_eq!("db.local", get_required_var::<String>("STAYSYNC_TEST", "HOST").unwrap());
        });

        temp_env::with_var_unset("STAYSYNC_TEST_HOST", || {
            assert_eq!(
                "Required environment variable STAYSYNC_TEST_HOST not present",
                get_required_var::<String>("STAYSYNC_TEST", "HOST").unwrap_err()
            );
        });
    }

    #[test]
    fn test_get_optional_var() {
        temp_env::with_var("STAYSYNC_TEST_PORT", Some("8080"), || {
            assert_eq!(Some(8080u16), get_optional_var::<u16>("STAYSYNC_TEST", "PORT").unwrap());
        });

        temp_env::with_var_unset("STAYSYNC_TEST_PORT", || {
            assert_eq!(None, get_optional_var::<u16>("STAYSYNC_TEST", "PORT").unwrap());
        });
    }

    #[test]
    fn test_bad_values_are_errors_whether_required_or_not() {
        temp_env::with_var("STAYSYNC_TEST_PORT", Some("http"), || {
            let exp = "Invalid type in environment variable STAYSYNC_TEST_PORT: Invalid u16";
            let err = get_required_var::<u16>("STAYSYNC_TEST", "PORT").unwrap_err();
            assert!(err.starts_with(exp), "Bad error: {}", err);
            let err = get_optional_var::<u16>("STAYSYNC_TEST", "PORT").unwrap_err();
            assert!(err.starts_with(exp), "Bad error: {}", err);
        });

        temp_env::with_var("STAYSYNC_TEST_NAME", Some(OsStr::from_bytes(b"\xc3\x28")), || {
            let exp = "Invalid value in environment variable STAYSYNC_TEST_NAME";
            assert_eq!(exp, get_required_var::<String>("STAYSYNC_TEST", "NAME").unwrap_err());
            assert_eq!(exp, get_optional_var::<String>("STAYSYNC_TEST", "NAME").unwrap_err());
        });
    }
}
