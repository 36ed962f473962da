//! In-memory dataframes built from literal rows

use crate::error::{Result, WriterError};
use crate::session::SessionInner;
use crate::write::DataFrameWriter;
use arrow::array::cast::AsArray;
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int32Array, Int64Array, RecordBatch, StringArray,
};
use arrow::datatypes::{DataType, Field, Float64Type, Int32Type, Int64Type, SchemaRef};
use arrow::util::pretty::pretty_format_batches;
use std::sync::Arc;

/// Rows shown by [`DataFrame::show`]
const SHOW_ROWS: usize = 20;

/// A single dynamically typed cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Utf8(String),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Boolean(bool),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Utf8(_) => "string",
            Value::Int32(_) => "int",
            Value::Int64(_) => "bigint",
            Value::Float64(_) => "double",
            Value::Boolean(_) => "boolean",
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Utf8(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Utf8(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float64(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

pub type Row = Vec<Value>;

/// Collect one column's cells, checking type and nullability
fn collect_cells<T>(
    field: &Field,
    index: usize,
    rows: &[Row],
    extract: impl Fn(&Value) -> Option<T>,
) -> Result<Vec<Option<T>>> {
    rows.iter()
        .enumerate()
        .map(|(row_no, row)| match &row[index] {
            Value::Null if field.is_nullable() => Ok(None),
            Value::Null => Err(WriterError::invalid_data(format!(
                "row {}: null in non-nullable column '{}'",
                row_no,
                field.name()
            ))),
            value => extract(value).map(Some).ok_or_else(|| {
                WriterError::invalid_data(format!(
                    "row {}: column '{}' expects {}, got {}",
                    row_no,
                    field.name(),
                    field.data_type(),
                    value.type_name()
                ))
            }),
        })
        .collect()
}

fn build_column(field: &Field, index: usize, rows: &[Row]) -> Result<ArrayRef> {
    let array: ArrayRef = match field.data_type() {
        DataType::Utf8 => Arc::new(StringArray::from(collect_cells(
            field,
            index,
            rows,
            |v| match v {
                Value::Utf8(s) => Some(s.clone()),
                _ => None,
            },
        )?)),
        DataType::Int32 => Arc::new(Int32Array::from(collect_cells(
            field,
            index,
            rows,
            |v| match v {
                Value::Int32(i) => Some(*i),
                _ => None,
            },
        )?)),
        // Int32 literals widen into bigint columns
        DataType::Int64 => Arc::new(Int64Array::from(collect_cells(
            field,
            index,
            rows,
            |v| match v {
                Value::Int64(i) => Some(*i),
                Value::Int32(i) => Some(i64::from(*i)),
                _ => None,
            },
        )?)),
        DataType::Float64 => Arc::new(Float64Array::from(collect_cells(
            field,
            index,
            rows,
            |v| match v {
                Value::Float64(f) => Some(*f),
                _ => None,
            },
        )?)),
        DataType::Boolean => Arc::new(BooleanArray::from(collect_cells(
            field,
            index,
            rows,
            |v| match v {
                Value::Boolean(b) => Some(*b),
                _ => None,
            },
        )?)),
        other => {
            return Err(WriterError::invalid_data(format!(
                "column '{}' has unsupported type {}",
                field.name(),
                other
            )))
        }
    };
    Ok(array)
}

pub(crate) fn rows_to_batch(rows: &[Row], schema: &SchemaRef) -> Result<RecordBatch> {
    let width = schema.fields().len();
    if let Some((row_no, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != width) {
        return Err(WriterError::invalid_data(format!(
            "row {} has {} values but the schema has {} columns",
            row_no,
            row.len(),
            width
        )));
    }

    let columns = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(index, field)| build_column(field, index, rows))
        .collect::<Result<Vec<_>>>()?;

    RecordBatch::try_new(schema.clone(), columns)
        .map_err(|e| WriterError::invalid_data(format!("failed to assemble batch: {}", e)))
}

fn value_at(array: &dyn Array, row: usize) -> Value {
    if array.is_null(row) {
        return Value::Null;
    }
    match array.data_type() {
        DataType::Utf8 => Value::Utf8(array.as_string::<i32>().value(row).to_string()),
        DataType::Int32 => Value::Int32(array.as_primitive::<Int32Type>().value(row)),
        DataType::Int64 => Value::Int64(array.as_primitive::<Int64Type>().value(row)),
        DataType::Float64 => Value::Float64(array.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => Value::Boolean(array.as_boolean().value(row)),
        _ => Value::Null,
    }
}

/// Schema plus record batches, bound to the session that created it
#[derive(Clone)]
pub struct DataFrame {
    session: Arc<SessionInner>,
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl DataFrame {
    pub(crate) fn new(
        session: Arc<SessionInner>,
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
    ) -> Self {
        Self {
            session,
            schema,
            batches,
        }
    }

    pub(crate) fn session(&self) -> &Arc<SessionInner> {
        &self.session
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Number of rows
    pub fn count(&self) -> Result<usize> {
        self.session.ensure_active()?;
        Ok(self.batches.iter().map(|b| b.num_rows()).sum())
    }

    /// Materialize the rows as [`Value`]s
    pub fn collect_rows(&self) -> Result<Vec<Row>> {
        self.session.ensure_active()?;
        let mut rows = Vec::new();
        for batch in &self.batches {
            for row in 0..batch.num_rows() {
                rows.push(
                    batch
                        .columns()
                        .iter()
                        .map(|column| value_at(column.as_ref(), row))
                        .collect(),
                );
            }
        }
        Ok(rows)
    }

    /// Render every row as a table
    pub fn to_pretty_string(&self) -> Result<String> {
        self.session.ensure_active()?;
        self.render(usize::MAX)
    }

    /// Print the first rows as a table on stdout
    pub fn show(&self) -> Result<()> {
        self.session.ensure_active()?;
        let mut out = self.render(SHOW_ROWS)?;
        let total: usize = self.batches.iter().map(|b| b.num_rows()).sum();
        if total > SHOW_ROWS {
            out.push_str(&format!("\nonly showing top {} rows", SHOW_ROWS));
        }
        println!("{}", out);
        Ok(())
    }

    fn render(&self, limit: usize) -> Result<String> {
        let mut remaining = limit;
        let mut visible = Vec::new();
        for batch in &self.batches {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(batch.num_rows());
            visible.push(batch.slice(0, take));
            remaining -= take;
        }
        if visible.is_empty() {
            visible.push(RecordBatch::new_empty(self.schema.clone()));
        }

        pretty_format_batches(&visible)
            .map(|table| table.to_string())
            .map_err(|e| WriterError::invalid_data(format!("failed to render dataframe: {}", e)))
    }

    /// Start a write of this dataframe
    pub fn write(&self) -> DataFrameWriter<'_> {
        DataFrameWriter::new(self)
    }
}

impl std::fmt::Debug for DataFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFrame")
            .field("app_name", &self.session.app_name)
            .field("schema", &self.schema)
            .field("rows", &self.batches.iter().map(|b| b.num_rows()).sum::<usize>())
            .finish()
    }
}
