use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Values that can be bound as query parameters or read back from result rows.
///
/// This is the unified representation the bridge uses on both sides of the
/// driver boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timezone-naive datetime
    DateTime(NaiveDateTime),
    /// Timezone-aware datetime
    DateTimeUtc(DateTime<Utc>),
    /// Date-only value
    Date(NaiveDate),
    /// Binary data
    Blob(Vec<u8>),
    /// NULL value
    Null,
    /// A duplicate-named result column whose instances differ.
    ///
    /// Only produced by result normalization; never valid as a parameter.
    Multi(Vec<SqlValue>),
}

impl SqlValue {
    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        if let SqlValue::Int(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            SqlValue::Float(value) => Some(*value),
            SqlValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        if let SqlValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(value) => Some(*value),
            SqlValue::Int(0) => Some(false),
            SqlValue::Int(1) => Some(true),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            SqlValue::DateTime(value) => Some(*value),
            SqlValue::DateTimeUtc(value) => Some(value.naive_utc()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            SqlValue::Date(value) => Some(*value),
            SqlValue::DateTime(value) => Some(value.date()),
            SqlValue::DateTimeUtc(value) => Some(value.date_naive()),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        if let SqlValue::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Borrow the unfolded instances of a duplicate-named column.
    pub fn as_multi(&self) -> Option<&[SqlValue]> {
        if let SqlValue::Multi(values) = self {
            Some(values)
        } else {
            None
        }
    }
}
