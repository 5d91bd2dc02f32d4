//! Arrow record batches.

use super::FeatureSource;
use crate::core::{RecordSet, Timestamp, Value};
use crate::prelude::*;
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray, TimestampMillisecondArray, TimestampNanosecondArray,
    TimestampSecondArray, UInt64Array,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Utc};

/// A source over Arrow record batches already in memory.
#[derive(Debug, Clone)]
pub struct RecordBatchSource {
    name: String,
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl RecordBatchSource {
    /// Creates a source from batches sharing `schema`.
    pub fn new(name: impl Into<String>, schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self {
            name: name.into(),
            schema,
            batches,
        }
    }

    /// Creates a source from a single batch.
    pub fn from_batch(name: impl Into<String>, batch: RecordBatch) -> Self {
        Self::new(name, batch.schema(), vec![batch])
    }
}

#[async_trait]
impl FeatureSource for RecordBatchSource {
    async fn load(&self) -> Result<RecordSet> {
        record_set_from_batches(self.name.clone(), &self.schema, &self.batches)
    }

    fn description(&self) -> String {
        let rows: usize = self.batches.iter().map(RecordBatch::num_rows).sum();
        format!("Arrow batches '{}' ({rows} rows)", self.name)
    }
}

/// Converts Arrow batches into a record set.
///
/// Integer columns become `Int` (unsigned values beyond `i64::MAX` become
/// `Float`), floating and decimal columns become `Float`, string-like and
/// dictionary-encoded string columns become `String`. Timestamps with a
/// time zone become offset-aware values; timestamps without one, and dates,
/// become naive values. Arrow nulls become `Null`.
pub fn record_set_from_batches(
    name: impl Into<String>,
    schema: &SchemaRef,
    batches: &[RecordBatch],
) -> Result<RecordSet> {
    let columns: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
    let mut set = RecordSet::new(name, columns)?;

    for batch in batches {
        if batch.num_columns() != schema.fields().len() {
            return Err(SkewError::data_source(
                "Arrow",
                format!(
                    "batch has {} columns but the schema has {}",
                    batch.num_columns(),
                    schema.fields().len()
                ),
            ));
        }
        let converted: Vec<Vec<Value>> = schema
            .fields()
            .iter()
            .zip(batch.columns())
            .map(|(field, array)| column_values(field.name(), array))
            .collect::<Result<_>>()?;

        for row in 0..batch.num_rows() {
            set.push_row(converted.iter().map(|column| column[row].clone()).collect())?;
        }
    }
    Ok(set)
}

fn column_values(name: &str, array: &ArrayRef) -> Result<Vec<Value>> {
    match array.data_type() {
        DataType::Null => Ok(vec![Value::Null; array.len()]),
        DataType::Boolean => {
            let values = downcast::<BooleanArray>(name, array)?;
            Ok(collect(values, |i| Value::Bool(values.value(i))))
        }
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => {
            let cast_array = cast(array, &DataType::Int64)?;
            let values = downcast::<Int64Array>(name, &cast_array)?;
            Ok(collect(values, |i| Value::Int(values.value(i))))
        }
        DataType::UInt64 => {
            let values = downcast::<UInt64Array>(name, array)?;
            Ok(collect(values, |i| {
                let v = values.value(i);
                i64::try_from(v).map_or(Value::Float(v as f64), Value::Int)
            }))
        }
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => {
            let cast_array = cast(array, &DataType::Float64)?;
            let values = downcast::<Float64Array>(name, &cast_array)?;
            Ok(collect(values, |i| Value::Float(values.value(i))))
        }
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View | DataType::Dictionary(_, _) => {
            let cast_array = cast(array, &DataType::Utf8)?;
            let values = downcast::<StringArray>(name, &cast_array)?;
            Ok(collect(values, |i| Value::String(values.value(i).to_string())))
        }
        DataType::Timestamp(unit, tz) => {
            // stored values are UTC instants in their native unit
            let offset = tz.as_deref().map(parse_offset);
            timestamp_values(name, array, *unit, offset)
        }
        DataType::Date32 | DataType::Date64 => {
            let target = DataType::Timestamp(TimeUnit::Millisecond, None);
            timestamp_values(name, &cast(array, &target)?, TimeUnit::Millisecond, None)
        }
        other => Err(SkewError::NotSupported(format!(
            "column '{name}' has Arrow type {other}, which has no feature value mapping"
        ))),
    }
}

fn timestamp_values(
    name: &str,
    array: &ArrayRef,
    unit: TimeUnit,
    offset: Option<FixedOffset>,
) -> Result<Vec<Value>> {
    let raw: Vec<Option<i64>> = match unit {
        TimeUnit::Second => downcast::<TimestampSecondArray>(name, array)?.iter().collect(),
        TimeUnit::Millisecond => downcast::<TimestampMillisecondArray>(name, array)?
            .iter()
            .collect(),
        TimeUnit::Microsecond => downcast::<TimestampMicrosecondArray>(name, array)?
            .iter()
            .collect(),
        TimeUnit::Nanosecond => downcast::<TimestampNanosecondArray>(name, array)?
            .iter()
            .collect(),
    };

    raw.into_iter()
        .map(|value| {
            let Some(value) = value else {
                return Ok(Value::Null);
            };
            let utc = instant(value, unit).ok_or_else(|| {
                SkewError::data_source(
                    "Arrow",
                    format!("column '{name}' holds an out-of-range timestamp ({value} {unit:?})"),
                )
            })?;
            let ts = match offset {
                Some(offset) => Timestamp::Aware(utc.with_timezone(&offset)),
                None => Timestamp::Naive(utc.naive_utc()),
            };
            Ok(Value::Timestamp(ts))
        })
        .collect()
}

fn instant(value: i64, unit: TimeUnit) -> Option<DateTime<Utc>> {
    match unit {
        TimeUnit::Second => DateTime::from_timestamp(value, 0),
        TimeUnit::Millisecond => DateTime::from_timestamp_millis(value),
        TimeUnit::Microsecond => DateTime::from_timestamp_micros(value),
        TimeUnit::Nanosecond => Some(DateTime::from_timestamp_nanos(value)),
    }
}

// Named zones other than UTC need a tz database; the instant is what gets
// compared, so they are kept at offset zero.
fn parse_offset(tz: &str) -> FixedOffset {
    let utc = Utc.fix();
    match tz {
        "UTC" | "Z" | "utc" => utc,
        other => other.parse::<FixedOffset>().unwrap_or(utc),
    }
}

fn downcast<'a, T: 'static>(name: &str, array: &'a ArrayRef) -> Result<&'a T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        SkewError::Internal(format!(
            "column '{name}' could not be read as {}",
            std::any::type_name::<T>()
        ))
    })
}

fn collect<A: Array>(array: &A, value: impl Fn(usize) -> Value) -> Vec<Value> {
    (0..array.len())
        .map(|i| if array.is_null(i) { Value::Null } else { value(i) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FeatureRule, FeatureSpec, SkewCheck};
    use arrow::array::Int32Array;
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_batch_conversion() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("user_id", DataType::Int32, false),
            Field::new("spend", DataType::Float64, true),
            Field::new("country", DataType::Utf8, true),
            Field::new("active", DataType::Boolean, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int32Array::from(vec![1, 2])),
                Arc::new(Float64Array::from(vec![Some(1.5), None])),
                Arc::new(StringArray::from(vec![Some("US"), Some("UK")])),
                Arc::new(BooleanArray::from(vec![Some(true), None])),
            ],
        )
        .unwrap();

        let set = RecordBatchSource::from_batch("offline", batch).load().await.unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.value(0, "user_id"), Some(&Value::Int(1)));
        assert_eq!(set.value(0, "spend"), Some(&Value::Float(1.5)));
        assert_eq!(set.value(1, "spend"), Some(&Value::Null));
        assert_eq!(set.value(1, "country"), Some(&Value::from("UK")));
        assert_eq!(set.value(1, "active"), Some(&Value::Null));
    }

    #[test]
    fn test_timestamp_zones() {
        let naive = TimestampSecondArray::from(vec![Some(1_704_067_200), None]);
        let aware =
            TimestampSecondArray::from(vec![Some(1_704_067_200), None]).with_timezone("+02:00");
        let schema = Arc::new(Schema::new(vec![
            Field::new("naive", naive.data_type().clone(), true),
            Field::new("aware", aware.data_type().clone(), true),
        ]));
        let columns: Vec<ArrayRef> = vec![Arc::new(naive), Arc::new(aware)];
        let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();

        let set = record_set_from_batches("online", &schema, &[batch]).unwrap();
        let naive = set.value(0, "naive").and_then(Value::as_timestamp).unwrap();
        let aware = set.value(0, "aware").and_then(Value::as_timestamp).unwrap();
        assert!(!naive.is_aware());
        assert!(aware.is_aware());
        assert_eq!(naive.to_utc(), aware.to_utc());
        assert_eq!(aware.to_string(), "2024-01-01T02:00:00+02:00");
        assert_eq!(set.value(1, "aware"), Some(&Value::Null));
    }

    fn nanosecond_batch(ids: Vec<i64>, nanos: Vec<i64>) -> RecordBatch {
        let ts = TimestampNanosecondArray::from(nanos).with_timezone("UTC");
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("ts", ts.data_type().clone(), true),
        ]));
        RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(ids)), Arc::new(ts)]).unwrap()
    }

    #[tokio::test]
    async fn test_nanosecond_timestamps_keep_full_precision() {
        let base = 1_704_067_200_000_000_123i64;
        let offline_batch = nanosecond_batch(vec![1, 2], vec![base, base]);
        let online_batch = nanosecond_batch(vec![1, 2], vec![base, base + 999]);
        let offline = RecordBatchSource::from_batch("offline", offline_batch);
        let online = RecordBatchSource::from_batch("online", online_batch);

        let loaded = offline.load().await.unwrap();
        let ts = loaded.value(0, "ts").and_then(Value::as_timestamp).unwrap();
        assert_eq!(ts.to_utc().timestamp_nanos_opt(), Some(base));

        let spec = FeatureSpec::builder()
            .key("id")
            .feature(FeatureRule::exact("ts"))
            .build()
            .unwrap();
        let verdict = SkewCheck::new(spec).run_sources(&offline, &online).await.unwrap();
        assert!(!verdict.ok);
        assert_eq!(verdict.feature("ts").unwrap().num_mismatches, 1);
    }

    #[test]
    fn test_dates_become_naive_midnight() {
        let dates: ArrayRef = Arc::new(arrow::array::Date32Array::from(vec![Some(19_723), None]));
        let values = column_values("ds", &dates).unwrap();
        let ts = values[0].as_timestamp().unwrap();
        assert!(!ts.is_aware());
        assert_eq!(ts.to_utc().timestamp(), 19_723 * 86_400);
        assert_eq!(values[1], Value::Null);
    }

    #[test]
    fn test_unsupported_type() {
        let array: ArrayRef = Arc::new(arrow::array::BinaryArray::from(vec![b"x".as_ref()]));
        let err = column_values("blob", &array).unwrap_err();
        assert!(matches!(err, SkewError::NotSupported(_)));
    }
}
