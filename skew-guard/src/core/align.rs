//! Key-based alignment of offline and online record sets.

use super::record_set::{KeyTuple, RecordSet, Row};
use super::value::Value;
use crate::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, instrument, warn};

const MAX_NOTE_EXAMPLES: usize = 5;

/// Which pipeline a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Training-time pipeline
    Offline,
    /// Serving-time pipeline
    Online,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Offline => write!(f, "offline"),
            Side::Online => write!(f, "online"),
        }
    }
}

/// A non-fatal data-quality observation made while aligning.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataQualityNote {
    /// Some key tuples appeared more than once on one side; the last-seen
    /// row was kept for each.
    DuplicateKeys {
        /// Side with the duplicates
        side: Side,
        /// Number of rows that overwrote an earlier row
        overwritten_rows: usize,
        /// A few of the duplicated keys
        examples: Vec<KeyTuple>,
    },
    /// Some key tuples contain a null value.
    NullKeys {
        /// Side with the null keys
        side: Side,
        /// Number of rows with a null key value
        rows: usize,
    },
}

impl fmt::Display for DataQualityNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityNote::DuplicateKeys {
                side,
                overwritten_rows,
                examples,
            } => {
                write!(
                    f,
                    "{side} records contain duplicate keys; \
                     {overwritten_rows} earlier row(s) were replaced by later ones"
                )?;
                if !examples.is_empty() {
                    let shown: Vec<String> = examples.iter().map(ToString::to_string).collect();
                    write!(f, " (e.g. {})", shown.join(", "))?;
                }
                Ok(())
            }
            DataQualityNote::NullKeys { side, rows } => {
                write!(f, "{side} records contain {rows} row(s) with a null key value")
            }
        }
    }
}

/// A borrowed row together with the set it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    set: &'a RecordSet,
    row: &'a Row,
}

impl<'a> RowRef<'a> {
    /// Looks up a cell by column name; `None` when absent.
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.set.column_index(column).and_then(|i| self.row.get(i))
    }

    /// Looks up a cell by position in the owning set.
    pub fn get_at(&self, index: usize) -> Option<&'a Value> {
        self.row.get(index)
    }

    /// The owning record set.
    pub fn set(&self) -> &'a RecordSet {
        self.set
    }
}

/// One offline row and one online row sharing a key tuple.
#[derive(Debug, Clone)]
pub struct MatchedPair<'a> {
    /// Position of this pair in alignment order
    pub index: usize,
    /// The shared key
    pub key: KeyTuple,
    /// Offline row
    pub offline: RowRef<'a>,
    /// Online row
    pub online: RowRef<'a>,
}

/// The result of aligning two record sets.
#[derive(Debug, Clone)]
pub struct Alignment<'a> {
    /// Matched pairs in offline first-seen key order
    pub pairs: Vec<MatchedPair<'a>>,
    /// Keys present offline but not online, in offline order
    pub only_offline: Vec<KeyTuple>,
    /// Keys present online but not offline, in online order
    pub only_online: Vec<KeyTuple>,
    /// Non-fatal observations (duplicate or null keys)
    pub notes: Vec<DataQualityNote>,
    offline: &'a RecordSet,
    online: &'a RecordSet,
}

impl<'a> Alignment<'a> {
    /// The offline record set.
    pub fn offline(&self) -> &'a RecordSet {
        self.offline
    }

    /// The online record set.
    pub fn online(&self) -> &'a RecordSet {
        self.online
    }

    /// Number of matched pairs.
    pub fn num_pairs(&self) -> usize {
        self.pairs.len()
    }
}

struct SideIndex {
    order: Vec<KeyTuple>,
    rows: HashMap<KeyTuple, usize>,
    overwritten: usize,
    duplicate_examples: Vec<KeyTuple>,
    null_keys: usize,
}

impl SideIndex {
    fn notes(&self, side: Side) -> Vec<DataQualityNote> {
        let mut notes = Vec::new();
        if self.overwritten > 0 {
            notes.push(DataQualityNote::DuplicateKeys {
                side,
                overwritten_rows: self.overwritten,
                examples: self.duplicate_examples.clone(),
            });
        }
        if self.null_keys > 0 {
            notes.push(DataQualityNote::NullKeys {
                side,
                rows: self.null_keys,
            });
        }
        notes
    }
}

fn key_columns(set: &RecordSet, keys: &[String], side: Side) -> Result<Vec<usize>> {
    let missing: Vec<&str> = keys
        .iter()
        .filter(|k| !set.has_column(k))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(SkewError::schema(format!(
            "{side} records are missing key column(s): {}",
            missing.join(", ")
        )));
    }
    Ok(keys.iter().filter_map(|k| set.column_index(k)).collect())
}

fn index_side(set: &RecordSet, keys: &[String], side: Side) -> Result<SideIndex> {
    let columns = key_columns(set, keys, side)?;
    let mut index = SideIndex {
        order: Vec::with_capacity(set.len()),
        rows: HashMap::with_capacity(set.len()),
        overwritten: 0,
        duplicate_examples: Vec::new(),
        null_keys: 0,
    };

    for (i, row) in set.rows().iter().enumerate() {
        let mut values = Vec::with_capacity(columns.len());
        for (&column, name) in columns.iter().zip(keys) {
            let value = row.get(column).ok_or_else(|| {
                SkewError::schema(format!("{side} row {i} has no value for key column '{name}'"))
            })?;
            values.push(value.clone());
        }
        let key = KeyTuple::new(values);
        if key.has_null() {
            index.null_keys += 1;
        }

        // last-seen row wins; position stays at first sighting
        if index.rows.insert(key.clone(), i).is_some() {
            index.overwritten += 1;
            if index.duplicate_examples.len() < MAX_NOTE_EXAMPLES
                && !index.duplicate_examples.contains(&key)
            {
                index.duplicate_examples.push(key);
            }
        } else {
            index.order.push(key);
        }
    }
    Ok(index)
}

/// Joins two record sets on the declared key columns.
///
/// Pairs follow the offline side's first-seen key order. When a key repeats
/// within one side the last-seen row is used and a
/// [`DataQualityNote::DuplicateKeys`] is recorded.
///
/// # Errors
///
/// Returns a schema error when either side lacks a key column entirely or a
/// row carries no value for a key column.
///
/// # Examples
///
/// ```rust
/// use skew_guard::core::{align, RecordSet, Value};
///
/// # fn main() -> skew_guard::error::Result<()> {
/// let offline = RecordSet::new("offline", vec!["id", "x"])?
///     .with_row(vec![Value::Int(1), Value::Float(1.0)])?
///     .with_row(vec![Value::Int(2), Value::Float(2.0)])?;
/// let online = RecordSet::new("online", vec!["id", "x"])?
///     .with_row(vec![Value::Int(2), Value::Float(2.0)])?;
///
/// let alignment = align(&offline, &online, &["id".to_string()])?;
/// assert_eq!(alignment.num_pairs(), 1);
/// assert_eq!(alignment.only_offline.len(), 1);
/// # Ok(())
/// # }
/// ```
#[instrument(skip_all, fields(
    offline_rows = offline.len(),
    online_rows = online.len(),
    keys = ?keys
))]
pub fn align<'a>(
    offline: &'a RecordSet,
    online: &'a RecordSet,
    keys: &[String],
) -> Result<Alignment<'a>> {
    let offline_index = index_side(offline, keys, Side::Offline)?;
    let online_index = index_side(online, keys, Side::Online)?;

    let mut pairs = Vec::with_capacity(offline_index.order.len().min(online_index.order.len()));
    let mut only_offline = Vec::new();
    for key in &offline_index.order {
        match online_index.rows.get(key) {
            Some(&online_row) => {
                let offline_row = offline_index.rows[key];
                pairs.push(MatchedPair {
                    index: pairs.len(),
                    key: key.clone(),
                    offline: RowRef {
                        set: offline,
                        row: &offline.rows()[offline_row],
                    },
                    online: RowRef {
                        set: online,
                        row: &online.rows()[online_row],
                    },
                });
            }
            None => only_offline.push(key.clone()),
        }
    }

    let only_online: Vec<KeyTuple> = online_index
        .order
        .iter()
        .filter(|key| !offline_index.rows.contains_key(key))
        .cloned()
        .collect();

    let mut notes = offline_index.notes(Side::Offline);
    notes.extend(online_index.notes(Side::Online));
    for note in &notes {
        warn!(note = %note, "Data quality issue found during alignment");
    }

    debug!(
        pairs = pairs.len(),
        only_offline = only_offline.len(),
        only_online = only_online.len(),
        "Aligned record sets"
    );

    Ok(Alignment {
        pairs,
        only_offline,
        only_online,
        notes,
        offline,
        online,
    })
}
