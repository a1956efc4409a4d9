//! Composite `(project, environment)` key identifying one provisioned instance.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest segment accepted (Docker names derived from the key stay well under 128).
pub const MAX_SEGMENT_LEN: usize = 63;

/// Errors produced when a key or one of its segments is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("{segment} name must not be empty")]
    Empty { segment: &'static str },

    #[error("{segment} name '{value}' is longer than {MAX_SEGMENT_LEN} characters")]
    TooLong { segment: &'static str, value: String },

    #[error(
        "{segment} name '{value}' must start with a letter or digit and contain only letters, digits, '-' or '_'"
    )]
    InvalidChars { segment: &'static str, value: String },

    #[error("instance key '{0}' must have the form <project>/<environment>")]
    Malformed(String),
}

/// Unique identifier of an instance within a state collection.
///
/// Serialized as the string `"<project>/<environment>"`, which is also the
/// JSON object key used by the state files.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceKey {
    project: String,
    environment: String,
}

impl InstanceKey {
    /// Build a key from its two segments, validating both.
    pub fn new(project: &str, environment: &str) -> Result<Self, KeyError> {
        validate_segment("project", project)?;
        validate_segment("environment", environment)?;
        Ok(Self {
            project: project.to_string(),
            environment: environment.to_string(),
        })
    }

    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }
}

/// Check one key segment against `^[A-Za-z0-9][A-Za-z0-9_-]{0,62}$`.
pub fn validate_segment(segment: &'static str, value: &str) -> Result<(), KeyError> {
    let Some(first) = value.chars().next() else {
        return Err(KeyError::Empty { segment });
    };
    if value.len() > MAX_SEGMENT_LEN {
        return Err(KeyError::TooLong {
            segment,
            value: value.to_string(),
        });
    }
    let valid = first.is_ascii_alphanumeric()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(KeyError::InvalidChars {
            segment,
            value: value.to_string(),
        });
    }
    Ok(())
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.environment)
    }
}

impl FromStr for InstanceKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (project, environment) = s
            .split_once('/')
            .ok_or_else(|| KeyError::Malformed(s.to_string()))?;
        if environment.contains('/') {
            return Err(KeyError::Malformed(s.to_string()));
        }
        Self::new(project, environment)
    }
}

impl TryFrom<String> for InstanceKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InstanceKey> for String {
    fn from(key: InstanceKey) -> Self {
        key.to_string()
    }
}
