//! Dynamically-typed rows materialized from query results.
//!
//! The schema of a relation is whatever the ingested file carried, so rows are
//! an ordered column-name to [`Scalar`] mapping rather than a fixed struct.
//! Arrow batches returned by DuckDB are flattened into rows here.

use std::fmt;
use std::sync::Arc;

use duckdb::arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use duckdb::arrow::compute::cast;
use duckdb::arrow::datatypes::DataType;
use duckdb::arrow::record_batch::RecordBatch;
use duckdb::arrow::util::display::{ArrayFormatter, FormatOptions};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::error::LoaderError;

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(v) => Some(*v),
            Scalar::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            Scalar::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Numeric view of the cell. Text is parsed leniently; null and
    /// unparseable text yield `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            Scalar::Text(s) => s.trim().parse().ok(),
            Scalar::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("NULL"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

/// An immutable row. Rows from the same result share their column list.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Scalar>,
}

impl Row {
    /// Build a row; `values` is truncated or padded with nulls to match `columns`.
    pub fn new(columns: Arc<[String]>, mut values: Vec<Scalar>) -> Self {
        values.resize(columns.len(), Scalar::Null);
        Self { columns, values }
    }

    /// Convenience constructor for hand-built rows.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Scalar>,
    {
        let (columns, values): (Vec<String>, Vec<Scalar>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self::new(columns.into(), values)
    }

    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.columns
            .iter()
            .position(|name| name == column)
            .map(|idx| &self.values[idx])
    }

    /// Numeric value of `column`, `None` when absent, null or not numeric.
    pub fn f64(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(Scalar::as_f64)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Flatten record batches into rows sharing one column list.
pub fn rows_from_batches(batches: &[RecordBatch]) -> Result<Vec<Row>, LoaderError> {
    let Some(first) = batches.first() else {
        return Ok(Vec::new());
    };
    let columns: Arc<[String]> = first
        .schema()
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .collect();

    let total_rows = batches.iter().map(RecordBatch::num_rows).sum();
    let mut rows = Vec::with_capacity(total_rows);
    for batch in batches {
        let mut cells: Vec<Vec<Scalar>> = (0..batch.num_rows())
            .map(|_| Vec::with_capacity(columns.len()))
            .collect();
        for column in batch.columns() {
            for (row_idx, value) in column_to_scalars(column)?.into_iter().enumerate() {
                cells[row_idx].push(value);
            }
        }
        rows.extend(cells.into_iter().map(|values| Row::new(columns.clone(), values)));
    }
    Ok(rows)
}

/// Convert one Arrow column to scalars.
///
/// Integers widen to i64 (u64 beyond i64 range falls back to float), floats
/// and decimals become f64, booleans become 0/1, strings stay text, and any
/// other type is rendered with Arrow's display formatter.
pub fn column_to_scalars(array: &ArrayRef) -> Result<Vec<Scalar>, LoaderError> {
    let arrow_err = |err: duckdb::arrow::error::ArrowError| LoaderError::query(err);

    match array.data_type() {
        DataType::Null => Ok(vec![Scalar::Null; array.len()]),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => {
            let widened = cast(array, &DataType::Int64).map_err(arrow_err)?;
            let ints = downcast::<Int64Array>(&widened)?;
            Ok(collect(ints, |arr, idx| Scalar::Int(arr.value(idx))))
        }
        DataType::UInt64 => {
            let floats = cast(array, &DataType::Float64).map_err(arrow_err)?;
            let ints = cast(array, &DataType::Int64);
            match ints {
                // Overflowing values become null under a safe cast; keep those as floats.
                Ok(ints) => {
                    let ints = downcast::<Int64Array>(&ints)?;
                    let floats = downcast::<Float64Array>(&floats)?;
                    Ok((0..array.len())
                        .map(|idx| {
                            if array.is_null(idx) {
                                Scalar::Null
                            } else if ints.is_null(idx) {
                                Scalar::Float(floats.value(idx))
                            } else {
                                Scalar::Int(ints.value(idx))
                            }
                        })
                        .collect())
                }
                Err(_) => {
                    let floats = downcast::<Float64Array>(&floats)?;
                    Ok(collect(floats, |arr, idx| Scalar::Float(arr.value(idx))))
                }
            }
        }
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => {
            let widened = cast(array, &DataType::Float64).map_err(arrow_err)?;
            let floats = downcast::<Float64Array>(&widened)?;
            Ok(collect(floats, |arr, idx| Scalar::Float(arr.value(idx))))
        }
        DataType::Boolean => {
            let bools = downcast::<BooleanArray>(array)?;
            Ok(collect(bools, |arr, idx| Scalar::Int(arr.value(idx) as i64)))
        }
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
            let strings = cast(array, &DataType::Utf8).map_err(arrow_err)?;
            let strings = downcast::<StringArray>(&strings)?;
            Ok(collect(strings, |arr, idx| {
                Scalar::Text(arr.value(idx).to_string())
            }))
        }
        _ => {
            let options = FormatOptions::default();
            let formatter = ArrayFormatter::try_new(array.as_ref(), &options).map_err(arrow_err)?;
            Ok((0..array.len())
                .map(|idx| {
                    if array.is_null(idx) {
                        Scalar::Null
                    } else {
                        Scalar::Text(formatter.value(idx).to_string())
                    }
                })
                .collect())
        }
    }
}

fn collect<A: Array>(arr: &A, value: impl Fn(&A, usize) -> Scalar) -> Vec<Scalar> {
    (0..arr.len())
        .map(|idx| {
            if arr.is_null(idx) {
                Scalar::Null
            } else {
                value(arr, idx)
            }
        })
        .collect()
}

fn downcast<T: 'static>(array: &ArrayRef) -> Result<&T, LoaderError> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        LoaderError::internal(format!(
            "failed to downcast {} column to {}",
            array.data_type(),
            std::any::type_name::<T>()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use duckdb::arrow::array::{Date32Array, Int32Array, UInt64Array};
    use duckdb::arrow::datatypes::{Field, Schema};

    fn batch(columns: Vec<(&str, ArrayRef)>) -> anyhow::Result<RecordBatch> {
        let fields: Vec<Field> = columns
            .iter()
            .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
            .collect();
        let arrays = columns.into_iter().map(|(_, array)| array).collect();
        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }

    #[test]
    fn flattens_batches_into_ordered_rows() -> anyhow::Result<()> {
        let first = batch(vec![
            ("id", Arc::new(Int32Array::from(vec![1, 2])) as ArrayRef),
            (
                "h3_id",
                Arc::new(StringArray::from(vec![Some("8a1"), None])) as ArrayRef,
            ),
        ])?;
        let second = batch(vec![
            ("id", Arc::new(Int32Array::from(vec![3])) as ArrayRef),
            ("h3_id", Arc::new(StringArray::from(vec!["8a3"])) as ArrayRef),
        ])?;

        let rows = rows_from_batches(&[first, second])?;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].columns(), ["id".to_string(), "h3_id".to_string()]);
        assert_eq!(rows[0].get("id"), Some(&Scalar::Int(1)));
        assert_eq!(rows[1].get("h3_id"), Some(&Scalar::Null));
        assert_eq!(rows[2].get("h3_id"), Some(&Scalar::Text("8a3".into())));
        assert_eq!(rows[2].get("missing"), None);
        Ok(())
    }

    #[test]
    fn empty_result_has_no_rows() -> anyhow::Result<()> {
        assert!(rows_from_batches(&[])?.is_empty());
        Ok(())
    }

    #[test]
    fn converts_floats_bools_and_large_unsigned() -> anyhow::Result<()> {
        let floats: ArrayRef = Arc::new(Float64Array::from(vec![Some(0.5), None]));
        assert_eq!(
            column_to_scalars(&floats)?,
            vec![Scalar::Float(0.5), Scalar::Null]
        );

        let bools: ArrayRef = Arc::new(BooleanArray::from(vec![true, false]));
        assert_eq!(
            column_to_scalars(&bools)?,
            vec![Scalar::Int(1), Scalar::Int(0)]
        );

        let unsigned: ArrayRef = Arc::new(UInt64Array::from(vec![7, u64::MAX]));
        let converted = column_to_scalars(&unsigned)?;
        assert_eq!(converted[0], Scalar::Int(7));
        assert!(matches!(converted[1], Scalar::Float(v) if v > 1.0e19));
        Ok(())
    }

    #[test]
    fn renders_other_types_as_text() -> anyhow::Result<()> {
        let dates: ArrayRef = Arc::new(Date32Array::from(vec![Some(0), None]));
        assert_eq!(
            column_to_scalars(&dates)?,
            vec![Scalar::Text("1970-01-01".into()), Scalar::Null]
        );
        Ok(())
    }

    #[test]
    fn scalar_numeric_views_parse_text() {
        assert_eq!(Scalar::Text(" 12.5 ".into()).as_f64(), Some(12.5));
        assert_eq!(Scalar::Text("n/a".into()).as_f64(), None);
        assert_eq!(Scalar::Float(2021.0).as_i64(), Some(2021));
        assert_eq!(Scalar::Null.as_f64(), None);
    }

    #[test]
    fn row_serializes_as_object_in_column_order() -> anyhow::Result<()> {
        let row = Row::from_pairs([
            ("h3", Scalar::from("8a1")),
            ("year", Scalar::from(2021_i64)),
            ("score", Scalar::Null),
        ]);
        assert_eq!(
            serde_json::to_string(&row)?,
            r#"{"h3":"8a1","year":2021,"score":null}"#
        );
        Ok(())
    }
}
