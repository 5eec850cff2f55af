//! Converting JSON values to PostgreSQL parameters
//!
//! Values are converted to the parameter types the server reports for the
//! statement, so `"2024-01-01"` binds as a DATE where a date is expected and
//! `null` binds without a type. Without a reported type a value binds as its
//! natural JSON counterpart.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgTypeInfo, PgTypeKind, Postgres};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{Type, TypeInfo};
use std::str::FromStr;
use uuid::Uuid;
use wakalib_core::WakalibError;

/// A value ready to be bound
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PgParam {
    /// NULL with no declared type; the server infers it
    Null,
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    Numeric(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Timestamptz(DateTime<Utc>),
    Uuid(Uuid),
    Json(Value),
    /// Enum label sent under the enum's own type
    Label(PgTypeInfo, String),
    BoolArray(Vec<Option<bool>>),
    Int2Array(Vec<Option<i16>>),
    Int4Array(Vec<Option<i32>>),
    Int8Array(Vec<Option<i64>>),
    Float4Array(Vec<Option<f32>>),
    Float8Array(Vec<Option<f64>>),
    NumericArray(Vec<Option<Decimal>>),
    TextArray(Vec<Option<String>>),
    UuidArray(Vec<Option<Uuid>>),
    DateArray(Vec<Option<NaiveDate>>),
    TimestampArray(Vec<Option<NaiveDateTime>>),
    TimestamptzArray(Vec<Option<DateTime<Utc>>>),
}

/// Convert arguments against the described parameter types
///
/// `types` may be shorter than `args` (or empty); missing entries bind
/// naturally.
pub(crate) fn to_params(args: &[Value], types: &[PgTypeInfo]) -> Result<Vec<PgParam>, WakalibError> {
    args.iter()
        .enumerate()
        .map(|(i, value)| {
            convert(value, types.get(i)).map_err(|e| {
                WakalibError::InvalidArgument(format!("parameter ${}: {}", i + 1, e))
            })
        })
        .collect()
}

/// Bind every parameter in order
pub(crate) fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: Vec<PgParam>,
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            PgParam::Null => query.bind(Raw {
                type_info: PgTypeInfo::with_oid(Oid(0)),
                bytes: None,
            }),
            PgParam::Bool(v) => query.bind(v),
            PgParam::Int2(v) => query.bind(v),
            PgParam::Int4(v) => query.bind(v),
            PgParam::Int8(v) => query.bind(v),
            PgParam::Float4(v) => query.bind(v),
            PgParam::Float8(v) => query.bind(v),
            PgParam::Numeric(v) => query.bind(v),
            PgParam::Text(v) => query.bind(v),
            PgParam::Bytes(v) => query.bind(v),
            PgParam::Date(v) => query.bind(v),
            PgParam::Time(v) => query.bind(v),
            PgParam::Timestamp(v) => query.bind(v),
            PgParam::Timestamptz(v) => query.bind(v),
            PgParam::Uuid(v) => query.bind(v),
            PgParam::Json(v) => query.bind(Json(v)),
            PgParam::Label(type_info, label) => query.bind(Raw {
                type_info,
                bytes: Some(label.into_bytes()),
            }),
            PgParam::BoolArray(v) => query.bind(v),
            PgParam::Int2Array(v) => query.bind(v),
            PgParam::Int4Array(v) => query.bind(v),
            PgParam::Int8Array(v) => query.bind(v),
            PgParam::Float4Array(v) => query.bind(v),
            PgParam::Float8Array(v) => query.bind(v),
            PgParam::NumericArray(v) => query.bind(v),
            PgParam::TextArray(v) => query.bind(v),
            PgParam::UuidArray(v) => query.bind(v),
            PgParam::DateArray(v) => query.bind(v),
            PgParam::TimestampArray(v) => query.bind(v),
            PgParam::TimestamptzArray(v) => query.bind(v),
        };
    }
    query
}

/// Pre-encoded bytes sent under a type chosen at runtime
struct Raw {
    type_info: PgTypeInfo,
    bytes: Option<Vec<u8>>,
}

impl Type<Postgres> for Raw {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl<'q> Encode<'q, Postgres> for Raw {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> IsNull {
        match &self.bytes {
            Some(bytes) => {
                buf.extend_from_slice(bytes);
                IsNull::No
            }
            None => IsNull::Yes,
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(self.type_info.clone())
    }
}

fn convert(value: &Value, target: Option<&PgTypeInfo>) -> Result<PgParam, String> {
    if value.is_null() {
        return Ok(PgParam::Null);
    }
    let Some(ty) = target else {
        return Ok(natural(value));
    };

    let name = ty.name();
    if let Some(element) = name.strip_suffix("[]") {
        return convert_array(value, element);
    }
    match name {
        "BOOL" => to_bool(value).map(PgParam::Bool),
        "INT2" => to_int(value).map(PgParam::Int2),
        "INT4" => to_int(value).map(PgParam::Int4),
        "INT8" => to_int(value).map(PgParam::Int8),
        "FLOAT4" => to_float(value).map(|f| PgParam::Float4(f as f32)),
        "FLOAT8" => to_float(value).map(PgParam::Float8),
        "NUMERIC" => to_decimal(value).map(PgParam::Numeric),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "UNKNOWN" => Ok(PgParam::Text(to_text(value))),
        "BYTEA" => match value {
            Value::String(s) => Ok(PgParam::Bytes(s.clone().into_bytes())),
            other => Err(format!("expected a string for BYTEA, got {}", other)),
        },
        "DATE" => to_date(value).map(PgParam::Date),
        "TIME" => to_time(value).map(PgParam::Time),
        "TIMESTAMP" => to_timestamp(value).map(PgParam::Timestamp),
        "TIMESTAMPTZ" => to_timestamptz(value).map(PgParam::Timestamptz),
        "UUID" => to_uuid(value).map(PgParam::Uuid),
        "JSON" | "JSONB" => Ok(PgParam::Json(to_json(value))),
        // Declared but unresolved types have no kind to inspect
        "?" => Ok(natural(value)),
        _ => match ty.kind() {
            PgTypeKind::Enum(_) => Ok(PgParam::Label(ty.clone(), to_text(value))),
            PgTypeKind::Domain(base) => convert(value, Some(base)),
            _ => Ok(natural(value)),
        },
    }
}

fn convert_array(value: &Value, element: &str) -> Result<PgParam, String> {
    let Value::Array(items) = value else {
        return Err(format!("expected a list for {}[], got {}", element, value));
    };
    Ok(match element {
        "BOOL" => PgParam::BoolArray(each(items, to_bool)?),
        "INT2" => PgParam::Int2Array(each(items, to_int)?),
        "INT4" => PgParam::Int4Array(each(items, to_int)?),
        "INT8" => PgParam::Int8Array(each(items, to_int)?),
        "FLOAT4" => PgParam::Float4Array(each(items, |v| to_float(v).map(|f| f as f32))?),
        "FLOAT8" => PgParam::Float8Array(each(items, to_float)?),
        "NUMERIC" => PgParam::NumericArray(each(items, to_decimal)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
            PgParam::TextArray(each(items, |v| Ok(to_text(v)))?)
        }
        "UUID" => PgParam::UuidArray(each(items, to_uuid)?),
        "DATE" => PgParam::DateArray(each(items, to_date)?),
        "TIMESTAMP" => PgParam::TimestampArray(each(items, to_timestamp)?),
        "TIMESTAMPTZ" => PgParam::TimestamptzArray(each(items, to_timestamptz)?),
        _ => natural(value),
    })
}

fn each<T>(
    items: &[Value],
    f: impl Fn(&Value) -> Result<T, String>,
) -> Result<Vec<Option<T>>, String> {
    items
        .iter()
        .map(|v| if v.is_null() { Ok(None) } else { f(v).map(Some) })
        .collect()
}

/// Binding used when the server gave no type
fn natural(value: &Value) -> PgParam {
    match value {
        Value::Null => PgParam::Null,
        Value::Bool(b) => PgParam::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => PgParam::Int8(i),
            None => PgParam::Float8(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => PgParam::Text(s.clone()),
        Value::Array(items) => natural_array(value, items),
        Value::Object(_) => PgParam::Json(value.clone()),
    }
}

/// Homogeneous scalar lists become Postgres arrays; anything else is sent as JSON
fn natural_array(value: &Value, items: &[Value]) -> PgParam {
    if items.iter().all(Value::is_string) {
        return PgParam::TextArray(items.iter().map(|v| v.as_str().map(str::to_string)).collect());
    }
    if items.iter().all(Value::is_boolean) {
        return PgParam::BoolArray(items.iter().map(Value::as_bool).collect());
    }
    if items.iter().all(Value::is_i64) {
        return PgParam::Int8Array(items.iter().map(Value::as_i64).collect());
    }
    if items.iter().all(Value::is_number) {
        return PgParam::Float8Array(items.iter().map(Value::as_f64).collect());
    }
    PgParam::Json(value.clone())
}

fn to_bool(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(true),
        Value::Number(n) if n.as_i64() == Some(0) => Ok(false),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "t" | "true" | "y" | "yes" | "on" | "1" => Ok(true),
            "f" | "false" | "n" | "no" | "off" | "0" => Ok(false),
            _ => Err(format!("{:?} is not a boolean", s)),
        },
        other => Err(format!("{} is not a boolean", other)),
    }
}

fn to_int<T: TryFrom<i64>>(value: &Value) -> Result<T, String> {
    let wide = match value {
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i,
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => f as i64,
            _ => return Err(format!("{} is not an integer", n)),
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("{:?} is not an integer", s))?,
        other => return Err(format!("{} is not an integer", other)),
    };
    T::try_from(wide).map_err(|_| format!("{} is out of range", wide))
}

fn to_float(value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("{} is not a number", n)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("{:?} is not a number", s)),
        other => Err(format!("{} is not a number", other)),
    }
}

fn to_decimal(value: &Value) -> Result<Decimal, String> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => return Err(format!("{} is not a number", other)),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| format!("{:?} is not a decimal number", text))
}

fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Strings that hold JSON are stored as that JSON; other strings as JSON strings
fn to_json(value: &Value) -> Value {
    match value {
        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    }
}

fn as_str<'v>(value: &'v Value, what: &str) -> Result<&'v str, String> {
    value
        .as_str()
        .map(str::trim)
        .ok_or_else(|| format!("expected a {} string, got {}", what, value))
}

fn to_date(value: &Value) -> Result<NaiveDate, String> {
    let s = as_str(value, "date")?;
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| format!("{:?} is not a date", s))
}

fn to_time(value: &Value) -> Result<NaiveTime, String> {
    let s = as_str(value, "time")?;
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| format!("{:?} is not a time", s))
}

fn parse_naive_timestamp(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn to_timestamp(value: &Value) -> Result<NaiveDateTime, String> {
    let s = as_str(value, "timestamp")?;
    parse_naive_timestamp(s)
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|t| t.naive_local()))
        .ok_or_else(|| format!("{:?} is not a timestamp", s))
}

/// Offsets are honored; a timestamp without one is taken as UTC
fn to_timestamptz(value: &Value) -> Result<DateTime<Utc>, String> {
    let s = as_str(value, "timestamp")?;
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z"))
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_naive_timestamp(s).map(|t| t.and_utc()))
        .ok_or_else(|| format!("{:?} is not a timestamp", s))
}

fn to_uuid(value: &Value) -> Result<Uuid, String> {
    let s = as_str(value, "uuid")?;
    Uuid::parse_str(s).map_err(|_| format!("{:?} is not a uuid", s))
}
