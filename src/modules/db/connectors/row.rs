//! Decoding PostgreSQL rows into JSON values

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::decode::Decode;
use sqlx::postgres::types::{Oid, PgInterval, PgMoney, PgTimeTz};
use sqlx::postgres::{PgRow, PgTypeInfo, PgTypeKind, Postgres};
use sqlx::{Column, Row, TypeInfo};
use uuid::Uuid;
use wakalib_core::{Record, WakalibError};

/// Convert a row into a [`Record`] with values in column order
pub(crate) fn row_to_record(row: &PgRow) -> Result<Record, WakalibError> {
    let columns = row.columns().iter().map(|c| c.name().to_string()).collect();
    Ok(Record::new(columns, row_to_values(row)?))
}

/// Values of a row in column order
///
/// A column whose type has no JSON mapping fails the whole row, naming the
/// column, instead of being reported as `null`.
pub(crate) fn row_to_values(row: &PgRow) -> Result<Vec<Value>, WakalibError> {
    row.columns()
        .iter()
        .map(|column| {
            decode(row, column.ordinal(), column.type_info()).map_err(|e| {
                WakalibError::Query(format!("column '{}' {}", column.name(), e))
            })
        })
        .collect()
}

fn number<T: Into<serde_json::Number>>(v: T) -> Value {
    Value::Number(v.into())
}

fn float(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn text<T: ToString>(v: T) -> Value {
    Value::String(v.to_string())
}

fn get<'r, T>(row: &'r PgRow, idx: usize, f: impl Fn(T) -> Value) -> Result<Value, String>
where
    T: Decode<'r, Postgres>,
{
    row.try_get_unchecked::<Option<T>, _>(idx)
        .map(|v| v.map(f).unwrap_or(Value::Null))
        .map_err(|e| format!("could not be decoded: {}", e))
}

fn get_list<'r, T>(row: &'r PgRow, idx: usize, f: impl Fn(T) -> Value) -> Result<Value, String>
where
    Vec<Option<T>>: Decode<'r, Postgres>,
{
    get(row, idx, |items: Vec<Option<T>>| {
        Value::Array(
            items
                .into_iter()
                .map(|item| item.map(&f).unwrap_or(Value::Null))
                .collect(),
        )
    })
}

fn decode(row: &PgRow, idx: usize, ty: &PgTypeInfo) -> Result<Value, String> {
    match ty.name() {
        "BOOL" => get(row, idx, Value::Bool),
        "INT2" => get::<i16>(row, idx, number),
        "INT4" => get::<i32>(row, idx, number),
        "INT8" => get::<i64>(row, idx, number),
        "OID" => get(row, idx, |oid: Oid| number(oid.0)),
        "\"CHAR\"" => get(row, idx, |c: i8| text(c as u8 as char)),
        "FLOAT4" => get(row, idx, |f: f32| float(f as f64)),
        "FLOAT8" => get(row, idx, float),
        "NUMERIC" => get::<Decimal>(row, idx, text),
        "MONEY" => get(row, idx, |m: PgMoney| text(m.to_decimal(2))),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" | "XML" | "UNKNOWN" => {
            get(row, idx, Value::String)
        }
        "BYTEA" => get(row, idx, |b: Vec<u8>| Value::String(hex_bytes(&b))),
        "UUID" => get::<Uuid>(row, idx, text),
        "DATE" => get::<NaiveDate>(row, idx, text),
        "TIME" => get::<NaiveTime>(row, idx, text),
        "TIMETZ" => get(row, idx, |t: PgTimeTz<NaiveTime, FixedOffset>| {
            Value::String(format!("{}{}", t.time, t.offset))
        }),
        "TIMESTAMP" => get::<NaiveDateTime>(row, idx, text),
        "TIMESTAMPTZ" => get(row, idx, |t: DateTime<Utc>| Value::String(t.to_rfc3339())),
        "INTERVAL" => get(row, idx, |i: PgInterval| Value::String(interval_text(&i))),
        "JSON" | "JSONB" => get(row, idx, |v: Value| v),
        "VOID" => Ok(Value::Null),
        "BOOL[]" => get_list(row, idx, Value::Bool),
        "INT2[]" => get_list::<i16>(row, idx, number),
        "INT4[]" => get_list::<i32>(row, idx, number),
        "INT8[]" => get_list::<i64>(row, idx, number),
        "FLOAT4[]" => get_list(row, idx, |f: f32| float(f as f64)),
        "FLOAT8[]" => get_list(row, idx, float),
        "NUMERIC[]" => get_list::<Decimal>(row, idx, text),
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => get_list(row, idx, Value::String),
        "UUID[]" => get_list::<Uuid>(row, idx, text),
        "DATE[]" => get_list::<NaiveDate>(row, idx, text),
        "TIMESTAMP[]" => get_list::<NaiveDateTime>(row, idx, text),
        "TIMESTAMPTZ[]" => get_list(row, idx, |t: DateTime<Utc>| Value::String(t.to_rfc3339())),
        "JSON[]" | "JSONB[]" => get_list(row, idx, |v: Value| v),
        // Unresolved types have no kind to inspect
        "?" => Err(format!("has unsupported type {}; cast it in the query", ty)),
        name => match ty.kind() {
            PgTypeKind::Enum(_) => get(row, idx, Value::String),
            PgTypeKind::Domain(base) => decode(row, idx, base),
            _ => Err(format!("has unsupported type {}; cast it in the query", name)),
        },
    }
}

/// `\x`-prefixed lowercase hex, as PostgreSQL prints bytea
fn hex_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// PostgreSQL's default interval output, e.g. `1 year 2 mons 3 days 04:05:06`
fn interval_text(interval: &PgInterval) -> String {
    fn unit(n: i64, name: &str, plural: &str) -> String {
        format!("{} {}", n, if n == 1 { name } else { plural })
    }

    let mut parts = Vec::new();
    let years = (interval.months / 12) as i64;
    let months = (interval.months % 12) as i64;
    if years != 0 {
        parts.push(unit(years, "year", "years"));
    }
    if months != 0 {
        parts.push(unit(months, "mon", "mons"));
    }
    if interval.days != 0 {
        parts.push(unit(interval.days as i64, "day", "days"));
    }

    let micros = interval.microseconds;
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let micros = micros.unsigned_abs();
        let secs = micros / 1_000_000;
        let frac = micros % 1_000_000;
        let mut clock = format!(
            "{}{:02}:{:02}:{:02}",
            sign,
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        );
        if frac != 0 {
            let digits = format!("{:06}", frac);
            clock.push('.');
            clock.push_str(digits.trim_end_matches('0'));
        }
        parts.push(clock);
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(months: i32, days: i32, microseconds: i64) -> PgInterval {
        PgInterval {
            months,
            days,
            microseconds,
        }
    }

    #[test]
    fn test_interval_text() {
        assert_eq!(interval_text(&interval(0, 1, 0)), "1 day");
        assert_eq!(interval_text(&interval(14, 3, 0)), "1 year 2 mons 3 days");
        assert_eq!(interval_text(&interval(0, 0, 0)), "00:00:00");
        assert_eq!(interval_text(&interval(-12, 0, 0)), "-1 years");
        assert_eq!(
            interval_text(&interval(0, 2, 3_723_500_000)),
            "2 days 01:02:03.5"
        );
        assert_eq!(interval_text(&interval(-1, 0, -60_000_000)), "-1 mons -00:01:00");
    }

    #[test]
    fn test_hex_bytes() {
        assert_eq!(hex_bytes(b"abc"), "\\x616263");
        assert_eq!(hex_bytes(&[]), "\\x");
        assert_eq!(hex_bytes(&[0, 255]), "\\x00ff");
    }
}
