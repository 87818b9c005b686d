use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::{Client, Row, Statement};

use super::params::as_refs;
use crate::error::SqlToolkitError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Prepare and run one statement. Statements without a result description report the
/// affected row count instead of rows.
///
/// # Errors
/// Returns driver errors from preparation, binding or execution.
pub(crate) async fn execute(
    client: &Client,
    sql: &str,
    params: &[RowValues],
) -> Result<ResultSet, SqlToolkitError> {
    let stmt = client.prepare(sql).await?;
    let refs = as_refs(params);
    if stmt.columns().is_empty() {
        let affected = client.execute(&stmt, &refs).await?;
        let affected = usize::try_from(affected).map_err(|e| {
            SqlToolkitError::ExecutionError(format!(
                "postgres affected rows conversion error: {e}"
            ))
        })?;
        return Ok(ResultSet::affected(affected));
    }
    let rows = client.query(&stmt, &refs).await?;
    build_result_set_from_statement(&stmt, &rows)
}

/// Build a result set using statement metadata for column names.
fn build_result_set_from_statement(
    stmt: &Statement,
    rows: &[Row],
) -> Result<ResultSet, SqlToolkitError> {
    let column_names: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    let column_count = column_names.len();

    let mut result_set = ResultSet::with_capacity(rows.len());
    result_set.set_column_names(Arc::new(column_names));

    for row in rows {
        let mut row_values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            row_values.push(postgres_extract_value(row, idx)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

/// Column bytes for types without a dedicated mapping.
struct RawColumn(Vec<u8>);

impl<'a> FromSql<'a> for RawColumn {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(RawColumn(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

impl RawColumn {
    fn into_value(self) -> RowValues {
        match String::from_utf8(self.0) {
            Ok(text) => RowValues::Text(text),
            Err(err) => RowValues::Blob(err.into_bytes()),
        }
    }
}

fn postgres_extract_value(row: &Row, idx: usize) -> Result<RowValues, SqlToolkitError> {
    let ty = row.columns()[idx].type_();
    let value = match *ty {
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)?
            .map(|v| RowValues::Int(i64::from(v))),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)?
            .map(|v| RowValues::Int(i64::from(v))),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(RowValues::Int),
        Type::OID => row
            .try_get::<_, Option<u32>>(idx)?
            .map(|v| RowValues::Int(i64::from(v))),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|v| RowValues::Float(f64::from(v))),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(RowValues::Float),
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(RowValues::Bool),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(RowValues::Timestamp),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|v| RowValues::Timestamp(v.naive_utc())),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(|v| RowValues::Timestamp(v.and_time(NaiveTime::MIN))),
        Type::JSON | Type::JSONB => row.try_get::<_, Option<Value>>(idx)?.map(RowValues::JSON),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(RowValues::Blob),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            row.try_get::<_, Option<String>>(idx)?.map(RowValues::Text)
        }
        Type::VOID => None,
        _ => row
            .try_get::<_, Option<RawColumn>>(idx)?
            .map(RawColumn::into_value),
    };
    Ok(value.unwrap_or(RowValues::Null))
}
