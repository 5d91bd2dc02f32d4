//! JSON row files.

use super::FeatureSource;
use crate::core::{RecordSet, Value};
use crate::prelude::*;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

type JsonRow = BTreeMap<String, Value>;

/// How rows are laid out in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonLayout {
    /// A single JSON array of objects
    Array,
    /// One object per line
    Lines,
    /// Array when the first non-blank character is `[`, lines otherwise
    #[default]
    Auto,
}

/// Reads rows from a JSON file.
///
/// Each row is an object mapping column names to scalars. A key missing
/// from a row leaves that cell absent; an explicit `null` is a null value.
/// JSON has no timestamp type, so columns holding timestamps are declared
/// with [`with_timestamp_column`](Self::with_timestamp_column) and parsed
/// from their string form (RFC 3339, or naive ISO-8601 read as UTC).
#[derive(Debug, Clone)]
pub struct JsonRowsSource {
    name: String,
    path: PathBuf,
    layout: JsonLayout,
    timestamp_columns: Vec<String>,
}

impl JsonRowsSource {
    /// Creates a source named `name` reading `path`.
    pub fn new(name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            path: path.as_ref().to_path_buf(),
            layout: JsonLayout::default(),
            timestamp_columns: Vec::new(),
        }
    }

    /// Sets the file layout.
    pub fn with_layout(mut self, layout: JsonLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Declares a column whose strings should be parsed as timestamps.
    pub fn with_timestamp_column(mut self, column: impl Into<String>) -> Self {
        self.timestamp_columns.push(column.into());
        self
    }

    /// Declares several timestamp columns.
    pub fn with_timestamp_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.timestamp_columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Parses rows from text already in memory.
    pub fn parse(&self, text: &str) -> Result<RecordSet> {
        let rows = match self.layout {
            JsonLayout::Array => parse_array(text)?,
            JsonLayout::Lines => parse_lines(text)?,
            JsonLayout::Auto if text.trim_start().starts_with('[') => parse_array(text)?,
            JsonLayout::Auto => parse_lines(text)?,
        };

        let mut set = RecordSet::from_maps(self.name.clone(), rows)?;
        parse_timestamp_columns(&mut set, &self.timestamp_columns, "JSON")?;
        Ok(set)
    }
}

/// Re-reads the string cells of `columns` as timestamps. Columns the set
/// does not have are skipped.
pub(super) fn parse_timestamp_columns(
    set: &mut RecordSet,
    columns: &[String],
    source_type: &str,
) -> Result<()> {
    for column in columns {
        if !set.has_column(column) {
            continue;
        }
        set.map_column(column, |value| {
            let text = match &value {
                Value::String(s) => Some(s.clone()),
                _ => None,
            };
            value.into_timestamp().ok_or_else(|| {
                SkewError::data_source(
                    source_type,
                    format!(
                        "column '{column}' holds '{}', which is not a timestamp",
                        text.unwrap_or_default()
                    ),
                )
            })
        })?;
    }
    Ok(())
}

fn parse_array(text: &str) -> Result<Vec<JsonRow>> {
    serde_json::from_str(text).map_err(|e| {
        SkewError::data_source_with_source("JSON", "expected an array of row objects", Box::new(e))
    })
}

fn parse_lines(text: &str) -> Result<Vec<JsonRow>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| {
                SkewError::data_source_with_source(
                    "JSON",
                    format!("line {} is not a row object", i + 1),
                    Box::new(e),
                )
            })
        })
        .collect()
}

#[async_trait]
impl FeatureSource for JsonRowsSource {
    #[instrument(skip(self), fields(name = %self.name, path = %self.path.display()))]
    async fn load(&self) -> Result<RecordSet> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SkewError::data_source_with_source(
                "JSON",
                format!("failed to read {}", self.path.display()),
                Box::new(e),
            )
        })?;
        let set = self.parse(&text)?;
        debug!(rows = set.len(), columns = set.columns().len(), "Loaded JSON rows");
        Ok(set)
    }

    fn description(&self) -> String {
        format!("JSON rows '{}' from {}", self.name, self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Timestamp;

    #[test]
    fn test_parse_array_with_absent_cells() {
        let source = JsonRowsSource::new("online", "unused.json");
        let set = source
            .parse(r#"[{"id": 1, "x": 1.5}, {"id": 2, "x": null}, {"id": 3}]"#)
            .unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.value(0, "x"), Some(&Value::Float(1.5)));
        assert_eq!(set.value(1, "x"), Some(&Value::Null));
        assert_eq!(set.value(2, "x"), None);
    }

    #[test]
    fn test_parse_lines() {
        let source = JsonRowsSource::new("offline", "unused.jsonl");
        let set = source
            .parse("{\"id\": 1, \"c\": \"US\"}\n\n{\"id\": 2, \"c\": \"UK\"}\n")
            .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.value(1, "c"), Some(&Value::from("UK")));
    }

    #[test]
    fn test_timestamp_columns_are_parsed() {
        let source = JsonRowsSource::new("offline", "unused.json").with_timestamp_column("ts");
        let set = source
            .parse(r#"[{"id": 1, "ts": "2024-01-01T10:00:00+02:00"}, {"id": 2, "ts": null}]"#)
            .unwrap();
        let expected = Timestamp::parse("2024-01-01T08:00:00Z").unwrap();
        match set.value(0, "ts") {
            Some(Value::Timestamp(ts)) => assert_eq!(ts.to_utc(), expected.to_utc()),
            other => panic!("expected timestamp, got {other:?}"),
        }
        assert_eq!(set.value(1, "ts"), Some(&Value::Null));
    }

    #[test]
    fn test_bad_timestamp_is_data_source_error() {
        let source = JsonRowsSource::new("offline", "unused.json").with_timestamp_column("ts");
        let err = source.parse(r#"[{"id": 1, "ts": "soon"}]"#).unwrap_err();
        assert!(matches!(err, SkewError::DataSource { .. }));
        assert!(err.to_string().contains("soon"));
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let source = JsonRowsSource::new("offline", "unused.jsonl").with_layout(JsonLayout::Lines);
        let err = source.parse("{\"id\": 1}\n{oops}\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
