//! skew-guard command line
//!
//! Compares an offline and an online feature dump under a feature spec and
//! exits 0 when they agree, 1 on a parity violation, and 2 when an error
//! prevented a verdict.

use clap::{Args, Parser, Subcommand, ValueEnum};
use skew_guard::core::{CheckConfig, FeatureSpec, SkewCheck, Verdict};
use skew_guard::formatters::{
    FormatterConfig, HtmlFormatter, HumanFormatter, JsonFormatter, MarkdownFormatter,
    VerdictFormatter,
};
use skew_guard::logging::setup::{init_logging, LoggingConfig};
use skew_guard::logging::LogConfig;
use skew_guard::prelude::*;
use skew_guard::sources::{FeatureSource, FileFormat, FileSource, JsonRowsSource};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare offline and online feature rows
    Check(CheckArgs),
    /// Print the version
    Version,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Feature spec (.json or .toml)
    #[arg(long)]
    spec: PathBuf,

    /// Offline rows: .csv, .tsv, .parquet, or JSON (array or lines)
    #[arg(long)]
    offline: PathBuf,

    /// Online rows: .csv, .tsv, .parquet, or JSON (array or lines)
    #[arg(long)]
    online: PathBuf,

    /// Report format written to stdout or --output
    #[arg(long, value_enum, default_value_t = ReportFormat::Human)]
    format: ReportFormat,

    /// Write the report to a file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Also write the JSON report to this file
    #[arg(long)]
    json: Option<PathBuf>,

    /// Maximum number of sample mismatches to keep
    #[arg(long, default_value_t = 10)]
    max_samples: usize,

    /// Column to parse as a timestamp on both sides (repeatable)
    #[arg(long = "timestamp-column")]
    timestamp_columns: Vec<String>,

    /// Fail when a feature column is absent from either side
    #[arg(long)]
    strict: bool,

    /// Compare features on a single thread
    #[arg(long)]
    sequential: bool,

    /// Debug logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ReportFormat {
    Human,
    Json,
    Markdown,
    Html,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Version => {
            println!("skew-guard {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Command::Check(args) => match check(args).await {
            Ok(verdict) => exit_code(verdict.exit_code()),
            Err(err) => {
                eprintln!("error: {err}");
                exit_code(SkewError::EXIT_CODE)
            }
        },
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX))
}

async fn check(args: CheckArgs) -> Result<Verdict> {
    let logging = if args.verbose {
        LoggingConfig::development()
    } else {
        LoggingConfig::default()
    };
    if let Err(err) = init_logging(logging) {
        eprintln!("warning: {err}");
    }

    let spec = FeatureSpec::from_path(&args.spec)?;
    let offline = source_for("offline", &args.offline, &args.timestamp_columns);
    let online = source_for("online", &args.online, &args.timestamp_columns);

    let config = CheckConfig::default()
        .with_max_sample_mismatches(args.max_samples)
        .with_parallel(!args.sequential)
        .with_require_feature_columns(args.strict)
        .with_log_config(if args.verbose {
            LogConfig::verbose()
        } else {
            LogConfig::default()
        });
    let verdict = SkewCheck::with_config(spec, config)
        .run_sources(offline.as_ref(), online.as_ref())
        .await?;

    let to_terminal = args.output.is_none() && std::io::stdout().is_terminal();
    let formatter_config = FormatterConfig::default().with_colors(to_terminal);
    let report = match args.format {
        ReportFormat::Human => HumanFormatter::with_config(formatter_config).format(&verdict)?,
        ReportFormat::Json => JsonFormatter::with_config(formatter_config).format(&verdict)?,
        ReportFormat::Markdown => {
            MarkdownFormatter::with_config(formatter_config).format(&verdict)?
        }
        ReportFormat::Html => {
            let mut formatter = HtmlFormatter::with_config(formatter_config);
            if let Some(json) = &args.json {
                formatter = formatter.with_json_href(json.display().to_string());
            }
            formatter.format(&verdict)?
        }
    };

    match &args.output {
        Some(path) => write_report(path, &report).await?,
        None => print!("{report}"),
    }
    if let Some(path) = &args.json {
        let json = JsonFormatter::new().format(&verdict)?;
        write_report(path, &json).await?;
    }
    Ok(verdict)
}

/// Picks the reader from the file extension; anything that is not CSV or
/// Parquet is read as JSON rows.
fn source_for(name: &str, path: &Path, timestamp_columns: &[String]) -> Box<dyn FeatureSource> {
    let timestamp_columns = timestamp_columns.iter().cloned();
    match FileFormat::from_path(path) {
        Some(format) => {
            Box::new(FileSource::new(name, path, format).with_timestamp_columns(timestamp_columns))
        }
        None => Box::new(JsonRowsSource::new(name, path).with_timestamp_columns(timestamp_columns)),
    }
}

async fn write_report(path: &Path, contents: &str) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("failed to write report to {}", path.display()))
}
