//! In-memory record sets produced by one pipeline.

use super::value::Value;
use crate::prelude::*;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

/// One row of a [`RecordSet`].
///
/// Cells are positional against the owning set's column list. `None` means
/// the pipeline did not emit that column for this row, which is distinct
/// from emitting an explicit [`Value::Null`].
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    cells: Vec<Option<Value>>,
}

impl Row {
    /// Returns the cell at `index`; `None` when absent.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.cells.get(index).and_then(Option::as_ref)
    }

    /// Number of cells (equal to the owning set's column count).
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if the row has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// A normalized table: ordered column names plus rows of typed values.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    name: String,
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Row>,
}

impl RecordSet {
    /// Creates an empty record set with the given columns.
    ///
    /// Fails with a schema error when a column name repeats.
    pub fn new<S: Into<String>>(name: impl Into<String>, columns: Vec<S>) -> Result<Self> {
        let name = name.into();
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut index = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if index.insert(column.clone(), i).is_some() {
                return Err(SkewError::schema(format!(
                    "column '{column}' appears more than once in record set '{name}'"
                )));
            }
        }
        Ok(Self {
            name,
            columns,
            index,
            rows: Vec::new(),
        })
    }

    /// Builds a record set from column-name → value maps.
    ///
    /// Columns are the union of all map keys, in first-seen order. A key
    /// missing from one map leaves that row's cell absent.
    pub fn from_maps(
        name: impl Into<String>,
        maps: impl IntoIterator<Item = BTreeMap<String, Value>>,
    ) -> Result<Self> {
        let maps: Vec<_> = maps.into_iter().collect();
        let mut columns: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for map in &maps {
            for key in map.keys() {
                if seen.insert(key.as_str()) {
                    columns.push(key.clone());
                }
            }
        }

        let mut set = RecordSet::new(name, columns)?;
        for map in maps {
            let mut cells = vec![None; set.columns.len()];
            for (key, value) in map {
                let i = set.index[&key];
                cells[i] = Some(value);
            }
            set.rows.push(Row { cells });
        }
        Ok(set)
    }

    /// Appends a row carrying a value for every column.
    pub fn push_row(&mut self, values: Vec<Value>) -> Result<()> {
        self.push_cells(values.into_iter().map(Some).collect())
    }

    /// Appends a row whose cells may be absent.
    pub fn push_cells(&mut self, cells: Vec<Option<Value>>) -> Result<()> {
        if cells.len() != self.columns.len() {
            return Err(SkewError::schema(format!(
                "row has {} cells but record set '{}' has {} columns",
                cells.len(),
                self.name,
                self.columns.len()
            )));
        }
        self.rows.push(Row { cells });
        Ok(())
    }

    /// Builder-style variant of [`push_row`](Self::push_row).
    pub fn with_row(mut self, values: Vec<Value>) -> Result<Self> {
        self.push_row(values)?;
        Ok(self)
    }

    /// Name of the pipeline side this set came from (e.g. "offline").
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of `column`, if present.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    /// Returns true if `column` was emitted at all.
    pub fn has_column(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    /// Rows in input order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the cell for `column` in row `row`; `None` when the column or
    /// the cell is absent.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let i = self.column_index(column)?;
        self.rows.get(row)?.get(i)
    }

    /// Rewrites every cell of `column` through `f`. Absent cells are left
    /// alone.
    pub fn map_column<F>(&mut self, column: &str, mut f: F) -> Result<()>
    where
        F: FnMut(Value) -> Result<Value>,
    {
        let Some(i) = self.column_index(column) else {
            return Err(SkewError::schema(format!(
                "column '{column}' not found in record set '{}'",
                self.name
            )));
        };
        for row in &mut self.rows {
            if let Some(cell) = row.cells[i].take() {
                row.cells[i] = Some(f(cell)?);
            }
        }
        Ok(())
    }
}

/// The identity of a logical row: the values of the key columns, in key
/// order.
///
/// Equality and hashing are canonical: an integral float equals the
/// matching integer and timestamps compare as UTC instants, so pipelines
/// that disagree only on representation still join.
#[derive(Debug, Clone)]
pub struct KeyTuple(Vec<Value>);

#[derive(PartialEq, Eq, Hash)]
enum KeyPart<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(&'a str),
    Instant(i64, u32),
}

// 2^63 as f64; anything at or beyond it cannot be an exact i64
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

fn key_part(value: &Value) -> KeyPart<'_> {
    match value {
        Value::Null => KeyPart::Null,
        Value::Bool(b) => KeyPart::Bool(*b),
        Value::Int(i) => KeyPart::Int(*i),
        Value::Float(f) if f.is_nan() => KeyPart::Null,
        Value::Float(f) if f.fract() == 0.0 && *f >= -I64_BOUND && *f < I64_BOUND => {
            KeyPart::Int(*f as i64)
        }
        Value::Float(f) => KeyPart::Float(f.to_bits()),
        Value::String(s) => KeyPart::Str(s),
        Value::Timestamp(ts) => {
            let utc = ts.to_utc();
            KeyPart::Instant(utc.timestamp(), utc.timestamp_subsec_nanos())
        }
    }
}

impl KeyTuple {
    /// Creates a key tuple from values in key order.
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Creates a single-column key.
    pub fn single(value: impl Into<Value>) -> Self {
        Self(vec![value.into()])
    }

    /// The key values.
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Returns true if any key value is null.
    pub fn has_null(&self) -> bool {
        self.0.iter().any(Value::is_null)
    }
}

impl PartialEq for KeyTuple {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(&other.0)
                .all(|(a, b)| key_part(a) == key_part(b))
    }
}

impl Eq for KeyTuple {}

impl Hash for KeyTuple {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for value in &self.0 {
            key_part(value).hash(state);
        }
    }
}

impl fmt::Display for KeyTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, ")")
    }
}

impl Serialize for KeyTuple {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::Timestamp;

    #[test]
    fn test_duplicate_columns_rejected() {
        let err = RecordSet::new("offline", vec!["id", "x", "id"]).unwrap_err();
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_row_width_checked() {
        let mut set = RecordSet::new("online", vec!["id", "x"]).unwrap();
        assert!(set.push_row(vec![Value::Int(1)]).is_err());
        assert!(set.push_row(vec![Value::Int(1), Value::Null]).is_ok());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_from_maps_tracks_absent_cells() {
        let mut first = BTreeMap::new();
        first.insert("id".to_string(), Value::Int(1));
        first.insert("x".to_string(), Value::Float(1.5));
        let mut second = BTreeMap::new();
        second.insert("id".to_string(), Value::Int(2));

        let set = RecordSet::from_maps("online", vec![first, second]).unwrap();
        assert_eq!(set.columns(), &["id".to_string(), "x".to_string()]);
        assert_eq!(set.value(0, "x"), Some(&Value::Float(1.5)));
        assert_eq!(set.value(1, "x"), None);
        assert!(!set.has_column("y"));
    }

    #[test]
    fn test_key_tuple_canonical_equality() {
        let int_key = KeyTuple::new(vec![Value::Int(3), Value::from("a")]);
        let float_key = KeyTuple::new(vec![Value::Float(3.0), Value::from("a")]);
        assert_eq!(int_key, float_key);

        let mut set = HashSet::new();
        set.insert(int_key);
        assert!(set.contains(&float_key));

        assert_ne!(KeyTuple::single(3.5), KeyTuple::single(3));
    }

    #[test]
    fn test_key_tuple_timestamps_compare_as_instants() {
        let naive = Value::Timestamp(Timestamp::parse("2024-03-01T00:00:00").unwrap());
        let aware = Value::Timestamp(Timestamp::parse("2024-03-01T01:00:00+01:00").unwrap());
        assert_eq!(KeyTuple::single(naive), KeyTuple::single(aware));
    }

    #[test]
    fn test_map_column() {
        let mut set = RecordSet::new("offline", vec!["id", "ts"])
            .unwrap()
            .with_row(vec![Value::Int(1), Value::from("2024-01-01")])
            .unwrap();
        set.map_column("ts", |v| {
            v.into_timestamp()
                .ok_or_else(|| SkewError::schema("bad timestamp"))
        })
        .unwrap();
        assert!(matches!(set.value(0, "ts"), Some(Value::Timestamp(_))));
        assert!(set.map_column("missing", Ok).is_err());
    }

    #[test]
    fn test_key_display() {
        let key = KeyTuple::new(vec![Value::Int(1), Value::from("UK")]);
        assert_eq!(key.to_string(), "(1, UK)");
    }
}
