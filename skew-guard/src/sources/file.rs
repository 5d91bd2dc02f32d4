//! CSV and Parquet files, read through DataFusion.

use super::batch::record_set_from_batches;
use super::json::parse_timestamp_columns;
use super::FeatureSource;
use crate::core::RecordSet;
use crate::prelude::*;
use async_trait::async_trait;
use datafusion::prelude::{CsvReadOptions, DataFrame, ParquetReadOptions, SessionContext};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Options for reading CSV files.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Whether the first line holds column names
    pub has_header: bool,
    /// Field delimiter
    pub delimiter: u8,
    /// Number of records read to infer column types
    pub schema_infer_max_records: usize,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            delimiter: b',',
            schema_infer_max_records: 1000,
        }
    }
}

impl CsvOptions {
    /// Tab-separated values with a header line.
    pub fn tsv() -> Self {
        Self {
            delimiter: b'\t',
            ..Self::default()
        }
    }
}

/// On-disk format of a [`FileSource`].
#[derive(Debug, Clone)]
pub enum FileFormat {
    /// Delimited text
    Csv(CsvOptions),
    /// Apache Parquet
    Parquet,
}

impl FileFormat {
    /// Picks a format from the file extension: `.csv`, `.tsv`, `.parquet`
    /// or `.pq`. Returns `None` for anything else.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "csv" => Some(FileFormat::Csv(CsvOptions::default())),
            "tsv" => Some(FileFormat::Csv(CsvOptions::tsv())),
            "parquet" | "pq" => Some(FileFormat::Parquet),
            _ => None,
        }
    }

    fn source_type(&self) -> &'static str {
        match self {
            FileFormat::Csv(_) => "CSV",
            FileFormat::Parquet => "Parquet",
        }
    }
}

/// Reads a CSV or Parquet file into a record set.
///
/// Column types come from the file: Parquet carries its own schema, CSV
/// types are inferred by DataFusion from the leading records.
///
/// # Examples
///
/// ```rust,no_run
/// use skew_guard::sources::{FeatureSource, FileSource};
///
/// # async fn example() -> skew_guard::prelude::Result<()> {
/// let offline = FileSource::parquet("offline", "features/offline.parquet");
/// let online = FileSource::csv("online", "features/online.csv");
/// let records = offline.load().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileSource {
    name: String,
    path: PathBuf,
    format: FileFormat,
    timestamp_columns: Vec<String>,
}

impl FileSource {
    /// Creates a source reading `path` in the given format.
    pub fn new(name: impl Into<String>, path: impl AsRef<Path>, format: FileFormat) -> Self {
        Self {
            name: name.into(),
            path: path.as_ref().to_path_buf(),
            format,
            timestamp_columns: Vec::new(),
        }
    }

    /// A CSV file with default options.
    pub fn csv(name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self::new(name, path, FileFormat::Csv(CsvOptions::default()))
    }

    /// A Parquet file.
    pub fn parquet(name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self::new(name, path, FileFormat::Parquet)
    }

    /// Creates a source whose format follows the file extension.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for extensions other than `.csv`,
    /// `.tsv`, `.parquet` and `.pq`.
    pub fn from_path(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = FileFormat::from_path(path).ok_or_else(|| {
            SkewError::Configuration(format!(
                "cannot tell the file format of {} from its extension",
                path.display()
            ))
        })?;
        Ok(Self::new(name, path, format))
    }

    /// Declares columns whose string cells should be parsed as timestamps.
    /// Columns the file already types as timestamps are left as they are.
    pub fn with_timestamp_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.timestamp_columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// The file format.
    pub fn format(&self) -> &FileFormat {
        &self.format
    }

    async fn read(&self, ctx: &SessionContext, path: &str, extension: &str) -> Result<DataFrame> {
        let df = match &self.format {
            FileFormat::Csv(options) => {
                let read_options = CsvReadOptions::new()
                    .has_header(options.has_header)
                    .delimiter(options.delimiter)
                    .schema_infer_max_records(options.schema_infer_max_records)
                    .file_extension(extension);
                ctx.read_csv(path, read_options).await?
            }
            FileFormat::Parquet => {
                let read_options = ParquetReadOptions {
                    file_extension: extension,
                    ..Default::default()
                };
                ctx.read_parquet(path, read_options).await?
            }
        };
        Ok(df)
    }
}

#[async_trait]
impl FeatureSource for FileSource {
    #[instrument(skip(self), fields(
        name = %self.name,
        path = %self.path.display(),
        format = self.format.source_type()
    ))]
    async fn load(&self) -> Result<RecordSet> {
        let source_type = self.format.source_type();
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Err(SkewError::data_source(
                source_type,
                format!("file not found: {}", self.path.display()),
            ));
        }
        let path = self.path.to_str().ok_or_else(|| {
            SkewError::Configuration(format!(
                "path is not valid UTF-8: {}",
                self.path.display()
            ))
        })?;
        // DataFusion filters listed files by extension, so pass the real one
        let extension = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();

        let ctx = SessionContext::new();
        let df = self.read(&ctx, path, &extension).await?;
        let schema = Arc::new(df.schema().as_arrow().clone());
        let batches = df.collect().await?;
        debug!(batches = batches.len(), "Read {source_type} file");
        let mut set = record_set_from_batches(self.name.clone(), &schema, &batches)?;
        parse_timestamp_columns(&mut set, &self.timestamp_columns, source_type)?;
        Ok(set)
    }

    fn description(&self) -> String {
        format!(
            "{} file '{}' from {}",
            self.format.source_type(),
            self.name,
            self.path.display()
        )
    }
}
