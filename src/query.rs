//! Statement execution against a live tiberius client and conversion of wire
//! rows into normalized [`ResultSet`]s.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures_util::TryStreamExt;
use tiberius::{ColumnData, QueryStream, Row, ToSql};

use crate::binder::BoundStatement;
use crate::connection::MssqlClient;
use crate::error::MssqlBridgeError;
use crate::results::{ColumnLayout, ResultSet};
use crate::value::SqlValue;

/// Execute one bound statement and materialize its first result set.
pub(crate) async fn run_statement(
    client: &mut MssqlClient,
    bound: &BoundStatement,
) -> Result<ResultSet, MssqlBridgeError> {
    let refs: Vec<&dyn ToSql> = bound.params.iter().map(|p| p as &dyn ToSql).collect();
    let stream = client
        .query(bound.sql.as_str(), &refs)
        .await
        .map_err(MssqlBridgeError::ExecutionError)?;
    collect_rows(stream).await
}

/// Execute a raw multi-statement script and materialize every result set it
/// produces, in order, into one row list.
pub(crate) async fn run_batch(
    client: &mut MssqlClient,
    script: &str,
) -> Result<ResultSet, MssqlBridgeError> {
    let stream = client
        .simple_query(script)
        .await
        .map_err(MssqlBridgeError::ExecutionError)?;
    let row_sets = stream
        .into_results()
        .await
        .map_err(MssqlBridgeError::ExecutionError)?;

    let mut result_set = ResultSet::default();
    for rows in row_sets {
        let Some(first) = rows.first() else {
            continue;
        };
        let layout = ColumnLayout::new(first.columns().iter().map(|c| c.name().to_string()));
        for row in &rows {
            result_set.add_row(layout.fold(materialize(row)));
        }
    }
    Ok(result_set)
}

async fn collect_rows(mut stream: QueryStream<'_>) -> Result<ResultSet, MssqlBridgeError> {
    let Some(columns) = stream
        .columns()
        .await
        .map_err(MssqlBridgeError::ExecutionError)?
    else {
        return Ok(ResultSet::default());
    };
    let layout = ColumnLayout::new(columns.iter().map(|c| c.name().to_string()));

    let mut result_set = ResultSet::default();
    let mut rows = stream.into_row_stream();
    while let Some(row) = rows
        .try_next()
        .await
        .map_err(MssqlBridgeError::ExecutionError)?
    {
        result_set.add_row(layout.fold(materialize(&row)));
    }
    Ok(result_set)
}

fn materialize(row: &Row) -> Vec<SqlValue> {
    row.cells()
        .enumerate()
        .map(|(idx, (_column, data))| cell_value(row, idx, data))
        .collect()
}

/// Convert one wire cell. Temporal encodings go back through the driver's
/// typed accessors rather than being decoded by hand.
fn cell_value(row: &Row, idx: usize, data: &ColumnData<'_>) -> SqlValue {
    match data {
        ColumnData::U8(v) => v.map_or(SqlValue::Null, |n| SqlValue::Int(i64::from(n))),
        ColumnData::I16(v) => v.map_or(SqlValue::Null, |n| SqlValue::Int(i64::from(n))),
        ColumnData::I32(v) => v.map_or(SqlValue::Null, |n| SqlValue::Int(i64::from(n))),
        ColumnData::I64(v) => v.map_or(SqlValue::Null, SqlValue::Int),
        ColumnData::F32(v) => v.map_or(SqlValue::Null, |n| SqlValue::Float(f64::from(n))),
        ColumnData::F64(v) => v.map_or(SqlValue::Null, SqlValue::Float),
        ColumnData::Bit(v) => v.map_or(SqlValue::Null, SqlValue::Bool),
        ColumnData::String(v) => v
            .as_ref()
            .map_or(SqlValue::Null, |s| SqlValue::Text(s.to_string())),
        ColumnData::Guid(v) => v.map_or(SqlValue::Null, |g| SqlValue::Text(g.to_string())),
        ColumnData::Binary(v) => v
            .as_ref()
            .map_or(SqlValue::Null, |b| SqlValue::Blob(b.to_vec())),
        ColumnData::Numeric(v) => v.map_or(SqlValue::Null, |n| {
            SqlValue::Float(n.value() as f64 / 10f64.powi(i32::from(n.scale())))
        }),
        ColumnData::Xml(v) => v
            .as_ref()
            .map_or(SqlValue::Null, |x| SqlValue::Text(x.to_string())),
        ColumnData::Date(_) => row
            .try_get::<NaiveDate, _>(idx)
            .ok()
            .flatten()
            .map_or(SqlValue::Null, SqlValue::Date),
        ColumnData::DateTimeOffset(_) => row
            .try_get::<DateTime<Utc>, _>(idx)
            .ok()
            .flatten()
            .map_or(SqlValue::Null, SqlValue::DateTimeUtc),
        ColumnData::Time(_) => row
            .try_get::<NaiveTime, _>(idx)
            .ok()
            .flatten()
            .map_or(SqlValue::Null, |t| {
                SqlValue::Text(t.format("%H:%M:%S%.f").to_string())
            }),
        // DateTime, SmallDateTime, DateTime2.
        _ => row
            .try_get::<NaiveDateTime, _>(idx)
            .ok()
            .flatten()
            .map_or(SqlValue::Null, SqlValue::DateTime),
    }
}
