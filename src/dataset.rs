// Fixed sample dataset written by the job

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use lakewrite_writer::{Row, Value};
use std::sync::Arc;

/// `name: string, id: int, height: double`, all nullable
pub fn sample_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("name", DataType::Utf8, true),
        Field::new("id", DataType::Int32, true),
        Field::new("height", DataType::Float64, true),
    ]))
}

pub fn sample_rows() -> Vec<Row> {
    [("Alice", 101, 155.5), ("Bob", 102, 180.1), ("Charlie", 103, 175.0)]
        .into_iter()
        .map(|(name, id, height)| vec![Value::from(name), Value::from(id), Value::from(height)])
        .collect()
}
