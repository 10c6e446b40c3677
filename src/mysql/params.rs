use chrono::{Datelike, NaiveDateTime, Timelike};
use mysql_async::{Params, Value};

use crate::error::DriverError;
use crate::types::RowValues;

/// Convert one middleware value into a MySQL parameter value.
///
/// # Errors
/// Returns an error for timestamps whose year MySQL cannot store (outside `0..=9999`).
pub fn to_mysql_value(value: &RowValues) -> Result<Value, DriverError> {
    Ok(match value {
        RowValues::Int(i) => Value::Int(*i),
        RowValues::UInt(u) => Value::UInt(*u),
        RowValues::Float(f) => Value::Double(*f),
        RowValues::Text(s) => Value::Bytes(s.as_bytes().to_vec()),
        RowValues::Bool(b) => Value::Int(i64::from(*b)),
        RowValues::Timestamp(dt) => timestamp_value(dt)?,
        RowValues::Null => Value::NULL,
        RowValues::Blob(bytes) => Value::Bytes(bytes.clone()),
    })
}

#[allow(clippy::cast_possible_truncation)]
fn timestamp_value(dt: &NaiveDateTime) -> Result<Value, DriverError> {
    let year = u16::try_from(dt.year())
        .ok()
        .filter(|year| *year <= 9999)
        .ok_or_else(|| format!("timestamp {dt} has a year outside 0..=9999"))?;
    // chrono keeps the remaining fields within u8 range
    Ok(Value::Date(
        year,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second() as u8,
        dt.nanosecond() / 1000,
    ))
}

/// Positional parameters for one value tuple of a batch.
///
/// # Errors
/// Returns the first value conversion error.
pub fn to_params(tuple: &[RowValues]) -> Result<Params, DriverError> {
    if tuple.is_empty() {
        return Ok(Params::Empty);
    }
    let values = tuple.iter().map(to_mysql_value).collect::<Result<_, _>>()?;
    Ok(Params::Positional(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn converts_scalars() {
        assert_eq!(to_mysql_value(&RowValues::Int(-3)).unwrap(), Value::Int(-3));
        assert_eq!(to_mysql_value(&RowValues::Bool(true)).unwrap(), Value::Int(1));
        assert_eq!(
            to_mysql_value(&RowValues::Text("ab".into())).unwrap(),
            Value::Bytes(b"ab".to_vec())
        );
        assert_eq!(to_mysql_value(&RowValues::Null).unwrap(), Value::NULL);
    }

    #[test]
    fn converts_timestamps_to_dates() {
        let dt = NaiveDate::from_ymd_opt(2024, 2, 3)
            .unwrap()
            .and_hms_micro_opt(4, 5, 6, 7)
            .unwrap();
        assert_eq!(
            to_mysql_value(&RowValues::Timestamp(dt)).unwrap(),
            Value::Date(2024, 2, 3, 4, 5, 6, 7)
        );
    }

    #[test]
    fn years_mysql_cannot_store_are_rejected() {
        for year in [-5, 12_000] {
            let dt = NaiveDate::from_ymd_opt(year, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap();
            assert!(to_mysql_value(&RowValues::Timestamp(dt)).is_err(), "year {year}");
            assert!(to_params(&[RowValues::Int(1), RowValues::Timestamp(dt)]).is_err());
        }
    }

    #[test]
    fn empty_tuple_has_no_params() {
        assert_eq!(to_params(&[]).unwrap(), Params::Empty);
    }
}
