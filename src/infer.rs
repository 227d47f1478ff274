//! Driver-type inference for loosely-typed parameter values.
//!
//! SQL Server's binding layer wants an explicit fixed-point precision/scale for
//! numeric inputs, so default inference derives a precision wide enough to
//! round-trip the literal's textual representation.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};

use crate::error::MssqlBridgeError;
use crate::params::{DeclaredType, Timezone, TypedParam};
use crate::value::SqlValue;

/// SQL Server precision ceiling for DECIMAL/NUMERIC.
const MAX_DECIMAL_PRECISION: u8 = 38;

/// Driver-level column type resolved for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    BigInt,
    Decimal { precision: u8, scale: u8 },
    Bit,
    Date,
    /// Timezone-naive datetime, high precision.
    DateTime2,
    /// Timezone-aware datetime.
    DateTimeOffset,
    /// Variable-length string, optionally bounded.
    VarChar(Option<u32>),
    VarBinary,
}

/// Infer the driver type for a raw (descriptor-less) value.
pub fn infer_type(value: &SqlValue) -> SqlType {
    match value {
        SqlValue::Int(i) => {
            let (precision, scale) = precision_and_scale(&i.to_string());
            SqlType::Decimal { precision, scale }
        }
        SqlValue::Float(f) => {
            let (precision, scale) = precision_and_scale(&f.to_string());
            SqlType::Decimal { precision, scale }
        }
        SqlValue::Bool(_) => SqlType::Bit,
        SqlValue::DateTime(_) => SqlType::DateTime2,
        SqlValue::DateTimeUtc(_) => SqlType::DateTimeOffset,
        SqlValue::Date(_) => SqlType::Date,
        SqlValue::Blob(_) => SqlType::VarBinary,
        // Default type: unbounded variable-length string.
        SqlValue::Text(_) | SqlValue::Null | SqlValue::Multi(_) => SqlType::VarChar(None),
    }
}

/// Derive decimal precision/scale from a numeric literal's text form.
///
/// Precision is the digit count; scale is the fractional digit count, reduced
/// by a positive exponent (floored at zero) or widened by a negative one.
pub(crate) fn precision_and_scale(text: &str) -> (u8, u8) {
    let text = text.strip_prefix('-').unwrap_or(text);
    let (mantissa, exponent) = match text.split_once(['e', 'E']) {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (text, 0),
    };

    let digits = mantissa.chars().filter(char::is_ascii_digit).count();
    let frac = mantissa
        .split_once('.')
        .map_or(0, |(_, f)| f.chars().filter(char::is_ascii_digit).count());

    let scale = (frac as i64 - i64::from(exponent)).max(0);
    let scale = u8::try_from(scale).unwrap_or(MAX_DECIMAL_PRECISION);
    let precision = u8::try_from(digits.max(1)).unwrap_or(MAX_DECIMAL_PRECISION);

    clamp_decimal(precision, scale)
}

fn clamp_decimal(precision: u8, scale: u8) -> (u8, u8) {
    let precision = precision.max(scale).min(MAX_DECIMAL_PRECISION);
    (precision, scale.min(precision))
}

/// Driver-precision correction for raw datetime values: sub-second precision
/// is truncated to milliseconds before binding. Not a semantic change.
fn truncate_subseconds(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_nanosecond(dt.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(dt)
}

/// Resolve a raw parameter value to its bound value and driver type.
pub(crate) fn resolve_value(value: &SqlValue) -> Result<(SqlValue, SqlType), MssqlBridgeError> {
    let value = match value {
        SqlValue::DateTime(dt) => SqlValue::DateTime(truncate_subseconds(*dt)),
        SqlValue::DateTimeUtc(dt) => {
            let naive = truncate_subseconds(dt.naive_utc());
            SqlValue::DateTimeUtc(DateTime::from_naive_utc_and_offset(naive, Utc))
        }
        SqlValue::Multi(_) => {
            return Err(MssqlBridgeError::BindingError(
                "multi-valued result cells cannot be bound as parameters".to_string(),
            ));
        }
        other => other.clone(),
    };
    let ty = infer_type(&value);
    Ok((value, ty))
}

/// Resolve an explicit descriptor to its bound value and driver type.
///
/// An absent value always binds SQL NULL of the declared type, never the
/// type's zero value.
pub(crate) fn resolve_typed(param: &TypedParam) -> Result<(SqlValue, SqlType), MssqlBridgeError> {
    match param.ty {
        DeclaredType::Integer => {
            let value = match &param.value {
                SqlValue::Null => SqlValue::Null,
                SqlValue::Int(i) => SqlValue::Int(*i),
                SqlValue::Float(f) if f.fract() == 0.0 => SqlValue::Int(*f as i64),
                other => return Err(type_mismatch("integer", other)),
            };
            Ok((value, SqlType::BigInt))
        }
        DeclaredType::Number => {
            let (inferred_precision, inferred_scale) = match &param.value {
                SqlValue::Null => (MAX_DECIMAL_PRECISION, 0),
                SqlValue::Int(i) => precision_and_scale(&i.to_string()),
                SqlValue::Float(f) => precision_and_scale(&f.to_string()),
                other => return Err(type_mismatch("number", other)),
            };
            let precision = param
                .max_length
                .map_or(inferred_precision, |p| u8::try_from(p).unwrap_or(u8::MAX));
            let scale = param
                .decimals
                .map_or(inferred_scale, |s| u8::try_from(s).unwrap_or(u8::MAX));
            let (precision, scale) = clamp_decimal(precision, scale);
            Ok((param.value.clone(), SqlType::Decimal { precision, scale }))
        }
        DeclaredType::Date => {
            let value = match &param.value {
                SqlValue::Null => SqlValue::Null,
                SqlValue::Date(d) => SqlValue::Date(*d),
                SqlValue::DateTime(dt) => SqlValue::Date(dt.date()),
                SqlValue::DateTimeUtc(dt) => SqlValue::Date(dt.date_naive()),
                SqlValue::Text(s) => SqlValue::Date(parse_date(s)?),
                other => return Err(type_mismatch("date", other)),
            };
            Ok((value, SqlType::Date))
        }
        DeclaredType::DateTime => {
            let naive = match &param.value {
                SqlValue::Null => None,
                SqlValue::DateTime(dt) => Some(*dt),
                SqlValue::DateTimeUtc(dt) => Some(dt.naive_utc()),
                SqlValue::Date(d) => d.and_hms_opt(0, 0, 0),
                SqlValue::Text(s) => Some(parse_datetime(s)?),
                other => return Err(type_mismatch("datetime", other)),
            };
            match param.timezone {
                Timezone::Ignore => Ok((
                    naive.map_or(SqlValue::Null, SqlValue::DateTime),
                    SqlType::DateTime2,
                )),
                Timezone::Utc => Ok((
                    naive.map_or(SqlValue::Null, |dt| {
                        SqlValue::DateTimeUtc(DateTime::from_naive_utc_and_offset(dt, Utc))
                    }),
                    SqlType::DateTimeOffset,
                )),
            }
        }
        DeclaredType::Text => {
            let value = match &param.value {
                SqlValue::Null => SqlValue::Null,
                SqlValue::Text(s) => {
                    if let Some(max) = param.max_length
                        && s.chars().count() as u64 > u64::from(max)
                    {
                        return Err(MssqlBridgeError::TruncationError(format!(
                            "string of {} characters exceeds declared width {max}",
                            s.chars().count()
                        )));
                    }
                    SqlValue::Text(s.clone())
                }
                other => return Err(type_mismatch("string", other)),
            };
            Ok((value, SqlType::VarChar(param.max_length)))
        }
    }
}

fn type_mismatch(expected: &str, got: &SqlValue) -> MssqlBridgeError {
    MssqlBridgeError::BindingError(format!(
        "declared {expected} parameter cannot bind value {got:?}"
    ))
}

fn parse_date(s: &str) -> Result<NaiveDate, MssqlBridgeError> {
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d);
    }
    parse_datetime(s).map(|dt| dt.date())
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime, MssqlBridgeError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        && let Some(dt) = d.and_hms_opt(0, 0, 0)
    {
        return Ok(dt);
    }
    Err(MssqlBridgeError::BindingError(format!(
        "cannot coerce {s:?} into a date/time value"
    )))
}
