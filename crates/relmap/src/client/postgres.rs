//! `GenericClient` for tokio-postgres connections and transactions.

use super::{GenericClient, Row};
use crate::convert::TypeConverter;
use crate::dialect::{Dialect, PostgresDialect};
use crate::error::{OrmError, OrmResult};
use crate::value::{Value, ValueType};
use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::error::Error;
use std::sync::Arc;
use tokio_postgres::GenericClient as PgClient;
use tokio_postgres::types::{FromSql, IsNull, Kind, ToSql, Type, to_sql_checked};

type BoxError = Box<dyn Error + Sync + Send>;

static DIALECT: PostgresDialect = PostgresDialect;

/// The Rust representation a PostgreSQL type is bound and read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scalar {
    Bool,
    Char,
    Int2,
    Int4,
    Int8,
    Oid,
    Float4,
    Float8,
    Numeric,
    Text,
    Bytea,
    Uuid,
    Json,
    Date,
    Time,
    Timestamp,
    Timestamptz,
    Enum,
}

fn scalar(ty: &Type) -> Option<Scalar> {
    if let Kind::Enum(_) = ty.kind() {
        return Some(Scalar::Enum);
    }
    if ty.schema() != "pg_catalog" {
        return None;
    }
    Some(match ty.name() {
        "bool" => Scalar::Bool,
        "char" => Scalar::Char,
        "int2" => Scalar::Int2,
        "int4" => Scalar::Int4,
        "int8" => Scalar::Int8,
        "oid" => Scalar::Oid,
        "float4" => Scalar::Float4,
        "float8" => Scalar::Float8,
        "numeric" => Scalar::Numeric,
        "text" | "varchar" | "bpchar" | "name" | "unknown" => Scalar::Text,
        "bytea" => Scalar::Bytea,
        "uuid" => Scalar::Uuid,
        "json" | "jsonb" => Scalar::Json,
        "date" => Scalar::Date,
        "time" => Scalar::Time,
        "timestamp" => Scalar::Timestamp,
        "timestamptz" => Scalar::Timestamptz,
        _ => return None,
    })
}

/// A bound parameter, converted to whatever the server declared for its placeholder.
#[derive(Debug)]
struct Param<'a>(&'a Option<Value>);

fn encode<T: ToSql + ValueType>(value: &Value, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    TypeConverter::convert_to::<T>(value.clone())?.to_sql(ty, out)
}

impl ToSql for Param<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        let Some(value) = self.0 else {
            return Ok(IsNull::Yes);
        };
        let Some(scalar) = scalar(ty) else {
            return Err(format!("cannot bind {} to PostgreSQL type {ty}", value.type_name()).into());
        };
        match scalar {
            Scalar::Bool => encode::<bool>(value, ty, out),
            Scalar::Char => encode::<i8>(value, ty, out),
            Scalar::Int2 => encode::<i16>(value, ty, out),
            Scalar::Int4 => encode::<i32>(value, ty, out),
            Scalar::Int8 => encode::<i64>(value, ty, out),
            Scalar::Oid => encode::<u32>(value, ty, out),
            Scalar::Float4 => encode::<f32>(value, ty, out),
            Scalar::Float8 => encode::<f64>(value, ty, out),
            Scalar::Numeric => encode::<Decimal>(value, ty, out),
            // Enum labels travel as text.
            Scalar::Text | Scalar::Enum => encode::<String>(value, ty, out),
            Scalar::Bytea => encode::<Vec<u8>>(value, ty, out),
            Scalar::Uuid => encode::<uuid::Uuid>(value, ty, out),
            Scalar::Json => encode::<serde_json::Value>(value, ty, out),
            Scalar::Date => encode::<NaiveDate>(value, ty, out),
            Scalar::Time => encode::<NaiveTime>(value, ty, out),
            Scalar::Timestamp => encode::<NaiveDateTime>(value, ty, out),
            Scalar::Timestamptz => encode::<DateTime<Utc>>(value, ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// The label of a PostgreSQL enum value.
struct EnumLabel(String);

impl<'a> FromSql<'a> for EnumLabel {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(EnumLabel(std::str::from_utf8(raw)?.to_string()))
    }

    fn accepts(ty: &Type) -> bool {
        matches!(ty.kind(), Kind::Enum(_))
    }
}

fn decode<'a, T>(row: &'a tokio_postgres::Row, index: usize) -> OrmResult<Option<Value>>
where
    T: FromSql<'a> + ValueType,
{
    row.try_get::<_, Option<T>>(index)
        .map(|value| value.map(Value::new))
        .map_err(|e| OrmError::decode(row.columns()[index].name(), e.to_string()))
}

fn read_column(row: &tokio_postgres::Row, index: usize) -> OrmResult<Option<Value>> {
    let column = &row.columns()[index];
    let Some(scalar) = scalar(column.type_()) else {
        return Err(OrmError::decode(
            column.name(),
            format!("unsupported PostgreSQL type {}", column.type_()),
        ));
    };
    match scalar {
        Scalar::Bool => decode::<bool>(row, index),
        Scalar::Char => decode::<i8>(row, index),
        Scalar::Int2 => decode::<i16>(row, index),
        Scalar::Int4 => decode::<i32>(row, index),
        Scalar::Int8 => decode::<i64>(row, index),
        Scalar::Oid => decode::<u32>(row, index),
        Scalar::Float4 => decode::<f32>(row, index),
        Scalar::Float8 => decode::<f64>(row, index),
        Scalar::Numeric => decode::<Decimal>(row, index),
        Scalar::Text => decode::<String>(row, index),
        Scalar::Bytea => decode::<Vec<u8>>(row, index),
        Scalar::Uuid => decode::<uuid::Uuid>(row, index),
        Scalar::Json => decode::<serde_json::Value>(row, index),
        Scalar::Date => decode::<NaiveDate>(row, index),
        Scalar::Time => decode::<NaiveTime>(row, index),
        Scalar::Timestamp => decode::<NaiveDateTime>(row, index),
        Scalar::Timestamptz => decode::<DateTime<Utc>>(row, index),
        Scalar::Enum => row
            .try_get::<_, Option<EnumLabel>>(index)
            .map(|label| label.map(|l| Value::new(l.0)))
            .map_err(|e| OrmError::decode(column.name(), e.to_string())),
    }
}

fn convert_rows(rows: Vec<tokio_postgres::Row>) -> OrmResult<Vec<Row>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns: Arc<[String]> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    rows.iter()
        .map(|row| {
            let values = (0..row.len())
                .map(|i| read_column(row, i))
                .collect::<OrmResult<Vec<_>>>()?;
            Ok(Row::new(columns.clone(), values))
        })
        .collect()
}

async fn pg_query<C>(client: &C, sql: &str, params: &[Option<Value>]) -> OrmResult<Vec<Row>>
where
    C: PgClient + Sync,
{
    let bound: Vec<Param<'_>> = params.iter().map(Param).collect();
    let refs: Vec<&(dyn ToSql + Sync)> = bound.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
    let rows = client
        .query(sql, &refs)
        .await
        .map_err(OrmError::from_db_error)?;
    convert_rows(rows)
}

async fn pg_execute<C>(client: &C, sql: &str, params: &[Option<Value>]) -> OrmResult<u64>
where
    C: PgClient + Sync,
{
    let bound: Vec<Param<'_>> = params.iter().map(Param).collect();
    let refs: Vec<&(dyn ToSql + Sync)> = bound.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
    client
        .execute(sql, &refs)
        .await
        .map_err(OrmError::from_db_error)
}

#[async_trait]
impl GenericClient for tokio_postgres::Client {
    fn dialect(&self) -> &dyn Dialect {
        &DIALECT
    }

    async fn query(&self, sql: &str, params: &[Option<Value>]) -> OrmResult<Vec<Row>> {
        pg_query(self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Option<Value>]) -> OrmResult<u64> {
        pg_execute(self, sql, params).await
    }
}

#[async_trait]
impl GenericClient for tokio_postgres::Transaction<'_> {
    fn dialect(&self) -> &dyn Dialect {
        &DIALECT
    }

    async fn query(&self, sql: &str, params: &[Option<Value>]) -> OrmResult<Vec<Row>> {
        pg_query(self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Option<Value>]) -> OrmResult<u64> {
        pg_execute(self, sql, params).await
    }
}

// ===== deadpool-postgres support =====

#[cfg(feature = "pool")]
#[async_trait]
impl GenericClient for deadpool_postgres::Client {
    fn dialect(&self) -> &dyn Dialect {
        &DIALECT
    }

    async fn query(&self, sql: &str, params: &[Option<Value>]) -> OrmResult<Vec<Row>> {
        let client: &tokio_postgres::Client = self;
        pg_query(client, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Option<Value>]) -> OrmResult<u64> {
        let client: &tokio_postgres::Client = self;
        pg_execute(client, sql, params).await
    }
}

#[cfg(feature = "pool")]
#[async_trait]
impl GenericClient for deadpool_postgres::Transaction<'_> {
    fn dialect(&self) -> &dyn Dialect {
        &DIALECT
    }

    async fn query(&self, sql: &str, params: &[Option<Value>]) -> OrmResult<Vec<Row>> {
        let tx: &tokio_postgres::Transaction<'_> = self;
        pg_query(tx, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Option<Value>]) -> OrmResult<u64> {
        let tx: &tokio_postgres::Transaction<'_> = self;
        pg_execute(tx, sql, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_types_map_to_scalars() {
        assert_eq!(scalar(&Type::INT8), Some(Scalar::Int8));
        assert_eq!(scalar(&Type::VARCHAR), Some(Scalar::Text));
        assert_eq!(scalar(&Type::JSONB), Some(Scalar::Json));
        assert_eq!(scalar(&Type::TIMESTAMPTZ), Some(Scalar::Timestamptz));
        assert_eq!(scalar(&Type::POINT), None);
    }

    #[test]
    fn params_convert_to_the_declared_type() {
        let value = Some(Value::new(7_i32));
        let mut out = BytesMut::new();
        let is_null = Param(&value).to_sql(&Type::INT8, &mut out).unwrap();
        assert!(matches!(is_null, IsNull::No));
        assert_eq!(&out[..], &7_i64.to_be_bytes());

        let mut out = BytesMut::new();
        assert!(matches!(Param(&None).to_sql(&Type::TEXT, &mut out).unwrap(), IsNull::Yes));
    }

    #[test]
    fn unconvertible_params_fail() {
        let value = Some(Value::new("abc".to_string()));
        let mut out = BytesMut::new();
        assert!(Param(&value).to_sql(&Type::INT4, &mut out).is_err());
        assert!(Param(&value).to_sql(&Type::POINT, &mut out).is_err());
    }
}
