use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Open key-value payload used for metadata and rule sets the server owns.
pub type JsonMap = Map<String, Value>;

/// Reads `key` from an open map as a string, treating absent and null alike.
pub fn string_field(map: &JsonMap, key: &str) -> Result<Option<String>, String> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.to_owned())),
        Some(other) => Err(format!("expected string or null for {key}, got {other}")),
    }
}

/// Reads `key` as a number. Numeric strings are accepted since some
/// aggregate endpoints serialize counts as text.
pub fn number_field(map: &JsonMap, key: &str) -> Result<Option<f64>, String> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| format!("expected number for {key}, got {s:?}")),
        Some(other) => Err(format!("expected number for {key}, got {other}")),
    }
}

/// Field of a partial update: left out, cleared with `null`, or set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    #[default]
    Omitted,
    Null,
    Value(T),
}

impl<T> Patch<T> {
    pub fn is_omitted(&self) -> bool {
        matches!(self, Patch::Omitted)
    }

    /// Empty form input clears the field instead of storing "".
    pub fn from_input(input: &str) -> Patch<T>
    where
        T: From<String>,
    {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            Patch::Null
        } else {
            Patch::Value(T::from(trimmed.to_string()))
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Patch::Value(value),
            None => Patch::Null,
        }
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Patch::Omitted | Patch::Null => serializer.serialize_none(),
            Patch::Value(value) => value.serialize(serializer),
        }
    }
}
