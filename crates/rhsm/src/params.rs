//! Raw attribute values and the per-kind validators.
//!
//! Each [`ValueKind`] has one function here that either normalizes a
//! [`RawValue`] into a [`Value`] or explains why it was rejected.

use crate::error::ValidationError;
use crate::schema::{AttributeDescriptor, ValueKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An untyped value as declared in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Integer(i64),
    String(String),
    List(Vec<String>),
    /// A value of a type no attribute accepts, named by its type
    #[serde(skip_deserializing)]
    Unsupported(String),
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::String(s) => write!(f, "{s}"),
            Self::List(items) => write!(f, "[{}]", items.join(", ")),
            Self::Unsupported(kind) => write!(f, "<{kind}>"),
        }
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Desired registration state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    #[default]
    Present,
    Absent,
}

impl fmt::Display for Ensure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => write!(f, "present"),
            Self::Absent => write!(f, "absent"),
        }
    }
}

/// A validated, normalized attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Ensure(Ensure),
    Bool(bool),
    Port(u16),
    Keys(Vec<String>),
    Text(String),
}

/// Validate `raw` against the value kind of `attr`.
pub fn validate(attr: &AttributeDescriptor, raw: &RawValue) -> Result<Value, ValidationError> {
    if let RawValue::Unsupported(kind) = raw {
        return Err(invalid_value(
            attr.name,
            raw,
            &format!("unsupported value type {kind}"),
        ));
    }
    match attr.value_kind {
        ValueKind::Ensure => parse_ensure(attr.name, raw).map(Value::Ensure),
        ValueKind::Hostname => validate_hostname(attr.name, raw).map(Value::Text),
        ValueKind::Url => validate_url(attr.name, raw).map(Value::Text),
        ValueKind::Boolean => parse_boolean(attr.name, raw).map(Value::Bool),
        ValueKind::Path => validate_path(attr.name, raw).map(Value::Text),
        ValueKind::KeyList => parse_key_list(attr.name, raw).map(Value::Keys),
        ValueKind::Port => parse_port(attr.name, raw).map(Value::Port),
        ValueKind::FreeText => validate_text(attr, raw).map(Value::Text),
    }
}

/// Accept `present`/`absent`, case-insensitive.
pub fn parse_ensure(attribute: &str, raw: &RawValue) -> Result<Ensure, ValidationError> {
    match raw {
        RawValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(Ensure::Present),
            "absent" => Ok(Ensure::Absent),
            _ => Err(invalid_value(attribute, raw, "expected present or absent")),
        },
        _ => Err(invalid_value(attribute, raw, "expected present or absent")),
    }
}

/// Check `raw` against `^[A-Za-z0-9][A-Za-z0-9.-]*$`.
pub fn validate_hostname(attribute: &str, raw: &RawValue) -> Result<String, ValidationError> {
    let RawValue::String(value) = raw else {
        return Err(ValidationError::InvalidHostname {
            attribute: attribute.to_string(),
            value: raw.to_string(),
        });
    };

    if is_valid_hostname(value) {
        Ok(value.clone())
    } else {
        Err(ValidationError::InvalidHostname {
            attribute: attribute.to_string(),
            value: value.clone(),
        })
    }
}

/// Whether `value` is a plain hostname: alphanumerics, dots and hyphens,
/// starting with an alphanumeric.
pub fn is_valid_hostname(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        }
        _ => false,
    }
}

/// Accept native booleans and `true`/`false`/`yes`/`no`, case-insensitive.
pub fn parse_boolean(attribute: &str, raw: &RawValue) -> Result<bool, ValidationError> {
    let parsed = match raw {
        RawValue::Bool(b) => Some(*b),
        RawValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    };

    parsed.ok_or_else(|| ValidationError::InvalidBoolean {
        attribute: attribute.to_string(),
        value: raw.to_string(),
    })
}

/// Require an absolute http(s) URL with a host. The input string is kept
/// as declared so well-formed values round-trip unchanged.
pub fn validate_url(attribute: &str, raw: &RawValue) -> Result<String, ValidationError> {
    let reject = |value: &str, reason: &str| ValidationError::InvalidUrl {
        attribute: attribute.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let RawValue::String(value) = raw else {
        return Err(reject(&raw.to_string(), "expected a string"));
    };

    let parsed = url::Url::parse(value).map_err(|e| reject(value, &e.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(reject(value, "scheme must be http or https"));
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(value.clone()),
        _ => Err(reject(value, "missing host")),
    }
}

/// Syntax-only path check; the file does not need to exist yet.
pub fn validate_path(attribute: &str, raw: &RawValue) -> Result<String, ValidationError> {
    let RawValue::String(value) = raw else {
        return Err(invalid_value(attribute, raw, "expected a path"));
    };

    if value.trim().is_empty() {
        return Err(invalid_value(attribute, raw, "path is empty"));
    }
    if value.chars().any(char::is_control) {
        return Err(invalid_value(attribute, raw, "path contains control characters"));
    }

    Ok(value.clone())
}

/// Split a comma separated key list into trimmed tokens. A list of
/// strings is taken as already split.
pub fn parse_key_list(attribute: &str, raw: &RawValue) -> Result<Vec<String>, ValidationError> {
    let tokens: Vec<&str> = match raw {
        RawValue::String(value) => value.split(',').collect(),
        RawValue::List(items) if !items.is_empty() => items.iter().map(String::as_str).collect(),
        _ => return Err(invalid_value(attribute, raw, "expected comma separated keys")),
    };

    let mut keys = Vec::new();
    for token in tokens {
        let token = token.trim();
        if token.is_empty() {
            return Err(invalid_value(attribute, raw, "empty key in list"));
        }
        if token.contains(',') {
            return Err(invalid_value(attribute, raw, "keys cannot contain commas"));
        }
        if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(invalid_value(attribute, raw, "keys cannot contain whitespace"));
        }
        keys.push(token.to_string());
    }

    Ok(keys)
}

/// Accept integers or numeric strings in 1..=65535.
pub fn parse_port(attribute: &str, raw: &RawValue) -> Result<u16, ValidationError> {
    let number = match raw {
        RawValue::Integer(i) => Some(*i),
        RawValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    number
        .and_then(|n| u16::try_from(n).ok())
        .filter(|port| *port != 0)
        .ok_or_else(|| invalid_value(attribute, raw, "expected a port between 1 and 65535"))
}

fn validate_text(attr: &AttributeDescriptor, raw: &RawValue) -> Result<String, ValidationError> {
    let RawValue::String(value) = raw else {
        return Err(invalid_value(attr.name, raw, "expected a string"));
    };

    // Secrets are never echoed back in errors
    let shown = |raw: &RawValue| {
        if attr.sensitive {
            RawValue::from("[redacted]")
        } else {
            raw.clone()
        }
    };

    if value.is_empty() {
        return Err(invalid_value(attr.name, &shown(raw), "value is empty"));
    }
    if value.chars().any(char::is_control) {
        return Err(invalid_value(
            attr.name,
            &shown(raw),
            "value contains control characters",
        ));
    }

    Ok(value.clone())
}

fn invalid_value(attribute: &str, raw: &RawValue, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        attribute: attribute.to_string(),
        value: raw.to_string(),
        reason: reason.to_string(),
    }
}
