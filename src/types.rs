use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Scalar values read from a result tuple or bound as statement parameters.
///
/// ```rust
/// use mysql_bounded_io::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Null,
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Signed integer value (64-bit)
    Int(i64),
    /// Unsigned integer value that does not fit in `i64`
    UInt(u64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Date/datetime value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// Binary data that is not valid UTF-8
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// Integer view of the value.
    ///
    /// MySQL's text protocol reports numbers as strings, so numeric text is parsed too.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RowValues::Int(value) => Some(*value),
            RowValues::UInt(value) => i64::try_from(*value).ok(),
            RowValues::Text(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            RowValues::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            RowValues::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            RowValues::Timestamp(value) => Some(*value),
            RowValues::Text(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                .ok(),
            _ => None,
        }
    }

    /// Convert a JSON scalar into a value; arrays and objects are stored as their JSON text.
    #[must_use]
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => RowValues::Null,
            JsonValue::Bool(b) => RowValues::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    RowValues::Int(i)
                } else if let Some(u) = n.as_u64() {
                    RowValues::UInt(u)
                } else {
                    RowValues::Float(n.as_f64().unwrap_or_default())
                }
            }
            JsonValue::String(s) => RowValues::Text(s.clone()),
            other => RowValues::Text(other.to_string()),
        }
    }
}

impl Serialize for RowValues {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RowValues::Int(v) => serializer.serialize_i64(*v),
            RowValues::UInt(v) => serializer.serialize_u64(*v),
            RowValues::Float(v) => serializer.serialize_f64(*v),
            RowValues::Text(v) => serializer.serialize_str(v),
            RowValues::Bool(v) => serializer.serialize_bool(*v),
            RowValues::Timestamp(v) => {
                serializer.serialize_str(&v.format("%Y-%m-%d %H:%M:%S%.f").to_string())
            }
            RowValues::Null => serializer.serialize_none(),
            RowValues::Blob(v) => serializer.serialize_bytes(v),
        }
    }
}

impl From<i64> for RowValues {
    fn from(value: i64) -> Self {
        RowValues::Int(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}
