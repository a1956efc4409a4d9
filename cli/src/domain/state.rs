//! State document validation and serialization.
//!
//! A state document is a JSON object mapping `project/environment` keys to
//! instance records. Parsing validates every record field by field before
//! deserializing, so a corrupt file is reported with the offending field
//! named instead of a generic serde message.

use chrono::DateTime;
use outpost_common::{InstanceKey, StateCollection};
use serde_json::{Map, Value};

use crate::domain::error::StateError;

/// String fields every record must carry, non-empty.
pub const REQUIRED_STRING_FIELDS: &[&str] = &[
    "database",
    "app_username",
    "app_password",
    "admin_password",
    "volume",
    "container_id",
];

/// Parse and validate a state document read from `location`.
///
/// # Errors
///
/// [`StateError::Parse`] when the text is not JSON, and
/// [`StateError::Validation`] naming the first offending field otherwise.
pub fn parse_collection(location: &str, text: &str) -> Result<StateCollection, StateError> {
    let value: Value = serde_json::from_str(text).map_err(|e| StateError::Parse {
        location: location.to_string(),
        reason: e.to_string(),
    })?;
    validate_document(location, &value)?;
    serde_json::from_value(value).map_err(|e| StateError::Parse {
        location: location.to_string(),
        reason: e.to_string(),
    })
}

/// Render a collection as pretty JSON with a trailing newline.
///
/// # Errors
///
/// Returns [`StateError::Parse`] if serialization fails.
pub fn render_collection(location: &str, collection: &StateCollection) -> Result<String, StateError> {
    let mut text = serde_json::to_string_pretty(collection).map_err(|e| StateError::Parse {
        location: location.to_string(),
        reason: e.to_string(),
    })?;
    text.push('\n');
    Ok(text)
}

/// Validate the shape of a whole document.
///
/// # Errors
///
/// Returns [`StateError::Validation`] for the first violation found.
pub fn validate_document(location: &str, value: &Value) -> Result<(), StateError> {
    let Some(records) = value.as_object() else {
        return Err(invalid(location, None, "<root>", "must be a JSON object"));
    };
    for (key, record) in records {
        if let Err(e) = key.parse::<InstanceKey>() {
            return Err(invalid(location, Some(key), "<key>", &e.to_string()));
        }
        validate_record(location, key, record)?;
    }
    Ok(())
}

fn validate_record(location: &str, key: &str, record: &Value) -> Result<(), StateError> {
    let Some(fields) = record.as_object() else {
        return Err(invalid(location, Some(key), "<record>", "must be a JSON object"));
    };

    match fields.get("port") {
        None => return Err(invalid(location, Some(key), "port", "is missing")),
        Some(port) => {
            let valid = port
                .as_u64()
                .is_some_and(|p| (1024..=u64::from(u16::MAX)).contains(&p));
            if !valid {
                return Err(invalid(
                    location,
                    Some(key),
                    "port",
                    "must be an integer between 1024 and 65535",
                ));
            }
        }
    }

    for field in REQUIRED_STRING_FIELDS {
        require_string(location, key, fields, field)?;
    }

    let created_at = require_string(location, key, fields, "created_at")?;
    if DateTime::parse_from_rfc3339(created_at).is_err() {
        return Err(invalid(
            location,
            Some(key),
            "created_at",
            "must be an RFC 3339 timestamp",
        ));
    }

    match fields.get("last_backup_at") {
        None | Some(Value::Null) => {}
        Some(Value::String(s)) if DateTime::parse_from_rfc3339(s).is_ok() => {}
        Some(_) => {
            return Err(invalid(
                location,
                Some(key),
                "last_backup_at",
                "must be an RFC 3339 timestamp or absent",
            ));
        }
    }
    Ok(())
}

fn require_string<'a>(
    location: &str,
    key: &str,
    fields: &'a Map<String, Value>,
    field: &str,
) -> Result<&'a str, StateError> {
    match fields.get(field) {
        None => Err(invalid(location, Some(key), field, "is missing")),
        Some(Value::String(s)) if !s.is_empty() => Ok(s),
        Some(Value::String(_)) => Err(invalid(location, Some(key), field, "must not be empty")),
        Some(_) => Err(invalid(location, Some(key), field, "must be a string")),
    }
}

fn invalid(location: &str, key: Option<&str>, field: &str, reason: &str) -> StateError {
    StateError::Validation {
        location: location.to_string(),
        key: key.map(str::to_string),
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
