use std::sync::Arc;

use chrono::NaiveDate;
use mysql_async::Value;

use crate::results::Row;
use crate::types::RowValues;

/// Convert a MySQL wire value into a middleware value.
///
/// The text protocol sends every non-NULL value as bytes; they become `Text`
/// when valid UTF-8 and `Blob` otherwise.
#[must_use]
pub fn from_mysql_value(value: Value) -> RowValues {
    match value {
        Value::NULL => RowValues::Null,
        Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => RowValues::Text(text),
            Err(err) => RowValues::Blob(err.into_bytes()),
        },
        Value::Int(i) => RowValues::Int(i),
        Value::UInt(u) => i64::try_from(u).map_or(RowValues::UInt(u), RowValues::Int),
        Value::Float(f) => RowValues::Float(f64::from(f)),
        Value::Double(d) => RowValues::Float(d),
        Value::Date(year, month, day, hour, min, sec, micro) => {
            NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
                .and_then(|d| {
                    d.and_hms_micro_opt(u32::from(hour), u32::from(min), u32::from(sec), micro)
                })
                .map_or_else(
                    // zero dates such as 0000-00-00 have no chrono representation
                    || {
                        RowValues::Text(format!(
                            "{year:04}-{month:02}-{day:02} {hour:02}:{min:02}:{sec:02}"
                        ))
                    },
                    RowValues::Timestamp,
                )
        }
        Value::Time(negative, days, hour, min, sec, micro) => {
            let hours = days * 24 + u32::from(hour);
            let sign = if negative { "-" } else { "" };
            RowValues::Text(format!("{sign}{hours:02}:{min:02}:{sec:02}.{micro:06}"))
        }
    }
}

/// Build a middleware row from a driver row sharing `columns`.
#[must_use]
pub fn build_row(columns: &Arc<Vec<String>>, row: mysql_async::Row) -> Row {
    let values = row.unwrap().into_iter().map(from_mysql_value).collect();
    Row::new(Arc::clone(columns), values)
}
