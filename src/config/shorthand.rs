//! Shorthand-or-longhand list parsing.
//!
//! Several list fields accept bare strings in place of objects, and a single
//! list may mix both forms:
//!
//! ```yaml
//! requirements:
//!   - package.json
//!   - { from: build, source: /srv/app/dist }
//! ```
//!
//! [`deserialize_with`] handles all of them. Each caller only supplies the
//! constructor that turns a bare string into its canonical object.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_yaml::Value;

/// Deserializes a list whose entries are either strings (passed to
/// `factory`) or full objects. A missing or null value is an empty list.
pub fn deserialize_with<'de, D, T, F>(deserializer: D, factory: F) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
    F: Fn(String) -> T,
{
    let value = Value::deserialize(deserializer)?;
    from_value(value, factory).map_err(D::Error::custom)
}

/// Same as [`deserialize_with`], starting from an already parsed value.
pub fn from_value<T, F>(value: Value, factory: F) -> Result<Vec<T>, serde_yaml::Error>
where
    T: DeserializeOwned,
    F: Fn(String) -> T,
{
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(entries) => entries
            .into_iter()
            .map(|entry| match entry {
                Value::String(shorthand) => Ok(factory(shorthand)),
                longhand => serde_yaml::from_value(longhand),
            })
            .collect(),
        other => Err(serde_yaml::Error::custom(format!(
            "expected a list of strings or objects, found {}",
            describe(&other)
        ))),
    }
}

/// Deserializes a string or a list of strings.
pub fn string_or_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(value) if value.is_empty() => Ok(Some(Vec::new())),
        Value::String(value) => Ok(Some(vec![value])),
        list @ Value::Sequence(_) => serde_yaml::from_value(list).map(Some).map_err(D::Error::custom),
        other => Err(D::Error::custom(format!(
            "expected a string or a list of strings, found {}",
            describe(&other)
        ))),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
