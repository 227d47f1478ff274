use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::value::SqlValue;

/// Timezone handling for an explicitly declared datetime parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timezone {
    /// Bind as a timezone-aware datetime (the default).
    #[default]
    Utc,
    /// Bind as a timezone-naive, high-precision datetime.
    Ignore,
}

/// Declared type of an explicit parameter descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredType {
    Integer,
    Number,
    Date,
    DateTime,
    Text,
}

/// Explicit parameter descriptor: a value plus a declared driver type and
/// optional width/scale/timezone refinements.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedParam {
    pub value: SqlValue,
    pub ty: DeclaredType,
    pub max_length: Option<u32>,
    pub decimals: Option<u32>,
    pub timezone: Timezone,
}

impl TypedParam {
    pub fn new(value: impl Into<SqlValue>, ty: DeclaredType) -> Self {
        Self {
            value: value.into(),
            ty,
            max_length: None,
            decimals: None,
            timezone: Timezone::default(),
        }
    }

    /// A descriptor with no value; binds SQL NULL of the declared type.
    pub fn null(ty: DeclaredType) -> Self {
        Self::new(SqlValue::Null, ty)
    }

    #[must_use]
    pub fn max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    #[must_use]
    pub fn decimals(mut self, decimals: u32) -> Self {
        self.decimals = Some(decimals);
        self
    }

    #[must_use]
    pub fn timezone(mut self, timezone: Timezone) -> Self {
        self.timezone = timezone;
        self
    }
}

/// A single parameter entry: either a raw value whose driver type is inferred,
/// or an explicit descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Value(SqlValue),
    Typed(TypedParam),
}

impl SqlParam {
    pub fn null() -> Self {
        SqlParam::Value(SqlValue::Null)
    }
}

impl From<SqlValue> for SqlParam {
    fn from(value: SqlValue) -> Self {
        SqlParam::Value(value)
    }
}

impl From<TypedParam> for SqlParam {
    fn from(typed: TypedParam) -> Self {
        SqlParam::Typed(typed)
    }
}

macro_rules! impl_param_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for SqlParam {
                fn from(value: $ty) -> Self {
                    SqlParam::Value(value.into())
                }
            }
        )*
    };
}

impl_param_from!(
    i32,
    i64,
    f64,
    bool,
    &str,
    String,
    NaiveDateTime,
    DateTime<Utc>,
    NaiveDate,
    Vec<u8>,
);

impl<T: Into<SqlValue>> From<Option<T>> for SqlParam {
    fn from(value: Option<T>) -> Self {
        SqlParam::Value(value.into())
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(i64::from(value))
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(value: NaiveDateTime) -> Self {
        SqlValue::DateTime(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::DateTimeUtc(value)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(value: NaiveDate) -> Self {
        SqlValue::Date(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Blob(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}

/// The parameter set supplied with a statement.
///
/// Positional parameters pair with `$1, $2, …` placeholders by 1-based index;
/// named parameters pair with `@name` placeholders by key.
#[derive(Debug, Clone, Default)]
pub enum Params {
    /// No parameters; the statement is executed as-is.
    #[default]
    None,
    Positional(Vec<SqlParam>),
    Named(Vec<(String, SqlParam)>),
}

impl Params {
    pub fn positional<I, P>(params: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<SqlParam>,
    {
        Params::Positional(params.into_iter().map(Into::into).collect())
    }

    pub fn named<I, K, P>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: Into<SqlParam>,
    {
        Params::Named(
            params
                .into_iter()
                .map(|(k, p)| (k.into(), p.into()))
                .collect(),
        )
    }
}

impl From<Vec<SqlParam>> for Params {
    fn from(params: Vec<SqlParam>) -> Self {
        Params::Positional(params)
    }
}
