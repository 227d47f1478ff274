//! Placeholder rewriting and parameter binding.
//!
//! Statements arrive with positional (`$1`) or named (`@name`) placeholders.
//! tiberius binds inputs ordinally as `@P1…@PN`, so every referenced
//! placeholder is assigned an ordinal in first-appearance order and rewritten
//! to `@P<n>`. The scanner skips string literals, quoted identifiers, and
//! comments; `@@` system variables are never treated as placeholders.

use std::borrow::Cow;

use tiberius::numeric::Numeric;
use tiberius::{ColumnData, ToSql};

use crate::error::MssqlBridgeError;
use crate::infer::{SqlType, resolve_typed, resolve_value};
use crate::params::{Params, SqlParam};
use crate::value::SqlValue;

/// A statement rewritten for the driver, with its typed inputs in bind order.
#[derive(Debug, Clone)]
pub struct BoundStatement {
    pub sql: String,
    pub params: Vec<BoundParam>,
}

/// A resolved parameter: the value to send and the driver type it binds as.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    pub value: SqlValue,
    pub ty: SqlType,
}

/// Rewrite placeholders and assemble the typed input set.
///
/// Positional: distinct `$<digits>` tokens must not outnumber the supplied
/// parameters (`ArityError` otherwise); extra supplied parameters are ignored,
/// and a referenced index with no supplied value binds NULL. Named: every
/// `@name` token must resolve against the map (`BindingError` otherwise);
/// extra keys are ignored.
pub fn bind(statement: &str, params: &Params) -> Result<BoundStatement, MssqlBridgeError> {
    match params {
        Params::None => bind_positional(statement, &[]),
        Params::Positional(list) => bind_positional(statement, list),
        Params::Named(pairs) => bind_named(statement, pairs),
    }
}

fn bind_positional(
    statement: &str,
    list: &[SqlParam],
) -> Result<BoundStatement, MssqlBridgeError> {
    let (sql, keys) = rewrite(statement, positional_token);
    if keys.len() > list.len() {
        return Err(MssqlBridgeError::ArityError(format!(
            "too many parameters in statement: {} placeholders, {} values",
            keys.len(),
            list.len()
        )));
    }

    let mut bound = Vec::with_capacity(keys.len());
    for key in &keys {
        let index: usize = key.parse().map_err(|_| {
            MssqlBridgeError::BindingError(format!("positional placeholder ${key} out of range"))
        })?;
        // 1-based; an index past the supplied values binds NULL, matching the
        // permissive lookup semantics of the original contract.
        let param = index.checked_sub(1).and_then(|i| list.get(i));
        bound.push(resolve_param(param)?);
    }

    Ok(BoundStatement {
        sql: sql.into_owned(),
        params: bound,
    })
}

fn bind_named(
    statement: &str,
    pairs: &[(String, SqlParam)],
) -> Result<BoundStatement, MssqlBridgeError> {
    let (sql, keys) = rewrite(statement, named_token);

    let mut bound = Vec::with_capacity(keys.len());
    for key in &keys {
        let param = pairs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, param)| param)
            .ok_or_else(|| {
                MssqlBridgeError::BindingError(format!(
                    "must declare the scalar variable \"@{key}\""
                ))
            })?;
        bound.push(resolve_param(Some(param))?);
    }

    Ok(BoundStatement {
        sql: sql.into_owned(),
        params: bound,
    })
}

fn resolve_param(param: Option<&SqlParam>) -> Result<BoundParam, MssqlBridgeError> {
    let (value, ty) = match param {
        None => (SqlValue::Null, SqlType::VarChar(None)),
        Some(SqlParam::Value(value)) => resolve_value(value)?,
        Some(SqlParam::Typed(typed)) => resolve_typed(typed)?,
    };
    if let SqlType::Decimal { precision, scale } = ty {
        check_decimal_fit(&value, precision, scale)?;
    }
    Ok(BoundParam { value, ty })
}

/// The scaled integer sent for a decimal must stay under 10^38 (the widest
/// NUMERIC SQL Server accepts); anything larger would bind a silently wrong
/// value instead of failing server-side.
fn check_decimal_fit(value: &SqlValue, precision: u8, scale: u8) -> Result<(), MssqlBridgeError> {
    const MAX_MAGNITUDE: f64 = 1e38;
    let in_range = match value {
        SqlValue::Int(i) => 10_i128
            .checked_pow(u32::from(scale))
            .and_then(|m| i128::from(*i).checked_mul(m))
            .is_some_and(|scaled| (scaled.unsigned_abs() as f64) < MAX_MAGNITUDE),
        SqlValue::Float(f) => {
            let scaled = f * 10_f64.powi(i32::from(scale));
            scaled.is_finite() && scaled.abs() < MAX_MAGNITUDE
        }
        _ => true,
    };
    if in_range {
        Ok(())
    } else {
        Err(MssqlBridgeError::BindingError(format!(
            "numeric value {value:?} out of range for decimal({precision},{scale})"
        )))
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    BracketQuoted,
    LineComment,
    BlockComment(u32),
}

enum Scan {
    /// A placeholder token ending (exclusive) at `end`, keyed for ordinal lookup.
    Token { end: usize, key: String },
    /// A non-placeholder run to step over verbatim (e.g. `@@IDENTITY`).
    Skip { end: usize },
}

/// Walk the statement, rewriting each recognized token to `@P<ordinal>`.
/// Returns the (possibly borrowed) rewritten text and the distinct token keys
/// in first-appearance order; `keys[i]` binds as ordinal `i + 1`.
fn rewrite<'a>(
    sql: &'a str,
    try_token: impl Fn(&[u8], usize) -> Option<Scan>,
) -> (Cow<'a, str>, Vec<String>) {
    let bytes = sql.as_bytes();
    let mut out = String::new();
    let mut copy_from = 0;
    let mut replaced = false;
    let mut keys: Vec<String> = Vec::new();
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => {
                if is_line_comment_start(bytes, idx) {
                    state = State::LineComment;
                    idx += 2;
                    continue;
                }
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(1);
                    idx += 2;
                    continue;
                }
                match b {
                    b'\'' => state = State::SingleQuoted,
                    b'"' => state = State::DoubleQuoted,
                    b'[' => state = State::BracketQuoted,
                    _ => match try_token(bytes, idx) {
                        Some(Scan::Token { end, key }) => {
                            let ordinal = match keys.iter().position(|k| *k == key) {
                                Some(pos) => pos + 1,
                                None => {
                                    keys.push(key);
                                    keys.len()
                                }
                            };
                            out.push_str(&sql[copy_from..idx]);
                            out.push_str("@P");
                            out.push_str(&ordinal.to_string());
                            copy_from = end;
                            replaced = true;
                            idx = end;
                            continue;
                        }
                        Some(Scan::Skip { end }) => {
                            idx = end;
                            continue;
                        }
                        None => {}
                    },
                }
            }
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::BracketQuoted => {
                if b == b']' {
                    if bytes.get(idx + 1) == Some(&b']') {
                        idx += 1; // escaped closing bracket
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 2;
                    continue;
                }
                if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 2;
                    continue;
                }
            }
        }
        idx += 1;
    }

    if replaced {
        out.push_str(&sql[copy_from..]);
        (Cow::Owned(out), keys)
    } else {
        (Cow::Borrowed(sql), keys)
    }
}

fn positional_token(bytes: &[u8], idx: usize) -> Option<Scan> {
    if bytes[idx] != b'$' {
        return None;
    }
    let (end, digits) = scan_digits(bytes, idx + 1)?;
    Some(Scan::Token {
        end,
        key: digits.to_string(),
    })
}

fn named_token(bytes: &[u8], idx: usize) -> Option<Scan> {
    if bytes[idx] != b'@' {
        return None;
    }
    // @@ROWCOUNT and friends are system variables, not placeholders.
    if bytes.get(idx + 1) == Some(&b'@') {
        return Some(Scan::Skip {
            end: scan_word_end(bytes, idx + 2),
        });
    }
    let end = scan_word_end(bytes, idx + 1);
    if end == idx + 1 {
        return None;
    }
    std::str::from_utf8(&bytes[idx + 1..end])
        .ok()
        .map(|name| Scan::Token {
            end,
            key: name.to_string(),
        })
}

fn scan_digits(bytes: &[u8], start: usize) -> Option<(usize, &str)> {
    let mut idx = start;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx == start {
        None
    } else {
        std::str::from_utf8(&bytes[start..idx])
            .ok()
            .map(|digits| (idx, digits))
    }
}

fn scan_word_end(bytes: &[u8], start: usize) -> usize {
    let mut idx = start;
    while idx < bytes.len() && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_') {
        idx += 1;
    }
    idx
}

fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

// ---------------------------------------------------------------------------
// Driver binding
// ---------------------------------------------------------------------------

impl ToSql for BoundParam {
    fn to_sql(&self) -> ColumnData<'_> {
        match (&self.ty, &self.value) {
            (SqlType::BigInt, SqlValue::Int(i)) => ColumnData::I64(Some(*i)),
            (SqlType::BigInt, _) => ColumnData::I64(None),
            (SqlType::Decimal { scale, .. }, SqlValue::Int(i)) => {
                ColumnData::Numeric(Some(numeric_from_int(*i, *scale)))
            }
            (SqlType::Decimal { scale, .. }, SqlValue::Float(f)) => {
                ColumnData::Numeric(Some(numeric_from_float(*f, *scale)))
            }
            (SqlType::Decimal { .. }, _) => ColumnData::Numeric(None),
            (SqlType::Bit, SqlValue::Bool(b)) => ColumnData::Bit(Some(*b)),
            (SqlType::Bit, _) => ColumnData::Bit(None),
            (SqlType::Date, SqlValue::Date(d)) => d.to_sql(),
            (SqlType::Date, _) => ColumnData::Date(None),
            (SqlType::DateTime2, SqlValue::DateTime(dt)) => dt.to_sql(),
            (SqlType::DateTime2, _) => ColumnData::DateTime2(None),
            (SqlType::DateTimeOffset, SqlValue::DateTimeUtc(dt)) => dt.to_sql(),
            (SqlType::DateTimeOffset, _) => ColumnData::DateTimeOffset(None),
            (SqlType::VarChar(_), SqlValue::Text(s)) => {
                ColumnData::String(Some(Cow::from(s.as_str())))
            }
            (SqlType::VarChar(_), _) => ColumnData::String(None),
            (SqlType::VarBinary, SqlValue::Blob(bytes)) => {
                ColumnData::Binary(Some(Cow::from(bytes.as_slice())))
            }
            (SqlType::VarBinary, _) => ColumnData::Binary(None),
        }
    }
}

fn numeric_from_int(value: i64, scale: u8) -> Numeric {
    let scaled = 10_i128
        .checked_pow(u32::from(scale))
        .and_then(|m| i128::from(value).checked_mul(m))
        .unwrap_or(i128::from(value));
    Numeric::new_with_scale(scaled, scale)
}

fn numeric_from_float(value: f64, scale: u8) -> Numeric {
    let scaled = (value * 10_f64.powi(i32::from(scale))).round() as i128;
    Numeric::new_with_scale(scaled, scale)
}
