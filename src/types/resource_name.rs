// ABOUTME: Logical resource name validation.
// ABOUTME: Names are DNS-style labels so they stay stable and valid across providers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResourceNameError {
    #[error("resource name cannot be empty")]
    Empty,

    #[error("resource name exceeds maximum length of 63 characters")]
    TooLong,

    #[error("resource name cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("resource name cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("resource name must be lowercase")]
    NotLowercase,

    #[error("invalid character in resource name: '{0}'")]
    InvalidChar(char),
}

/// Logical name of a declared resource, unique within one deployment.
///
/// The engine keys its state on this name, so it must not change between
/// runs for the same resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceName(String);

impl ResourceName {
    pub fn new(value: &str) -> Result<Self, ResourceNameError> {
        if value.is_empty() {
            return Err(ResourceNameError::Empty);
        }

        if value.len() > 63 {
            return Err(ResourceNameError::TooLong);
        }

        if value.starts_with('-') {
            return Err(ResourceNameError::StartsWithHyphen);
        }

        if value.ends_with('-') {
            return Err(ResourceNameError::EndsWithHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(ResourceNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(ResourceNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ResourceName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ResourceName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        ResourceName::new(&value).map_err(serde::de::Error::custom)
    }
}
