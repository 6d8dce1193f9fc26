//! Mapping of dynamically-typed query rows to JSON objects.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Number, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo};

/// Convert one row to a JSON object keyed by column name.
///
/// Translator-generated statements project an open-ended column set, so
/// the mapping goes by the column's reported type. NaN and infinite
/// floats become null (JSON has no representation for them), unknown
/// types fall back to their text form when available.
pub fn row_to_json(row: &PgRow) -> Map<String, Value> {
    let mut object = Map::with_capacity(row.columns().len());

    for column in row.columns() {
        let name = column.name().to_string();
        let idx = column.ordinal();

        let value = match column.type_info().name() {
            "INT2" => row
                .try_get::<Option<i16>, _>(idx)
                .ok()
                .flatten()
                .map(|v| Value::Number(v.into()))
                .unwrap_or(Value::Null),
            "INT4" => row
                .try_get::<Option<i32>, _>(idx)
                .ok()
                .flatten()
                .map(|v| Value::Number(v.into()))
                .unwrap_or(Value::Null),
            "INT8" => row
                .try_get::<Option<i64>, _>(idx)
                .ok()
                .flatten()
                .map(|v| Value::Number(v.into()))
                .unwrap_or(Value::Null),
            "FLOAT4" => float_value(row.try_get::<Option<f32>, _>(idx).ok().flatten().map(f64::from)),
            "FLOAT8" => float_value(row.try_get::<Option<f64>, _>(idx).ok().flatten()),
            "BOOL" => row
                .try_get::<Option<bool>, _>(idx)
                .ok()
                .flatten()
                .map(Value::Bool)
                .unwrap_or(Value::Null),
            "TIMESTAMPTZ" => row
                .try_get::<Option<DateTime<Utc>>, _>(idx)
                .ok()
                .flatten()
                .map(|v| Value::String(v.to_rfc3339()))
                .unwrap_or(Value::Null),
            "TIMESTAMP" => row
                .try_get::<Option<NaiveDateTime>, _>(idx)
                .ok()
                .flatten()
                .map(|v| Value::String(v.format("%Y-%m-%d %H:%M:%S").to_string()))
                .unwrap_or(Value::Null),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row
                .try_get::<Option<String>, _>(idx)
                .ok()
                .flatten()
                .map(Value::String)
                .unwrap_or(Value::Null),
            _ => row
                .try_get::<Option<String>, _>(idx)
                .ok()
                .flatten()
                .map(Value::String)
                .unwrap_or(Value::Null),
        };

        object.insert(name, value);
    }

    object
}

fn float_value(value: Option<f64>) -> Value {
    match value {
        Some(v) if v.is_finite() => Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}
