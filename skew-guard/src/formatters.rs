//! Rendering verdicts for people and tools.
//!
//! Four renderings are provided:
//!
//! - [`JsonFormatter`]: the machine-readable report. Field names (`ok`,
//!   `missing_in_online`, `missing_in_offline`, `features[]`,
//!   `failing_features[]`) are stable.
//! - [`HumanFormatter`]: terminal text, optionally colorized.
//! - [`MarkdownFormatter`]: for pull request comments and CI summaries.
//! - [`HtmlFormatter`]: a standalone HTML page.
//!
//! # Examples
//!
//! ```rust
//! use skew_guard::formatters::{FormatterConfig, HumanFormatter, VerdictFormatter};
//! # use skew_guard::core::Verdict;
//!
//! # fn example(verdict: &Verdict) -> skew_guard::prelude::Result<()> {
//! let text = HumanFormatter::with_config(FormatterConfig::ci()).format(verdict)?;
//! println!("{text}");
//! # Ok(())
//! # }
//! ```

use crate::core::{FeatureStats, Verdict};
use crate::prelude::*;
use std::fmt::{self, Write};

/// Options controlling what a formatter includes.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Include sample mismatches
    pub include_samples: bool,
    /// Include data-quality notes
    pub include_notes: bool,
    /// Maximum number of samples to render (`None` for all the verdict holds)
    pub max_samples: Option<usize>,
    /// Colorize human output with ANSI escapes
    pub use_colors: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            include_samples: true,
            include_notes: true,
            max_samples: None,
            use_colors: true,
        }
    }
}

impl FormatterConfig {
    /// Summary and per-feature table only.
    pub fn minimal() -> Self {
        Self {
            include_samples: false,
            include_notes: false,
            max_samples: Some(0),
            use_colors: false,
        }
    }

    /// Everything the verdict holds.
    pub fn detailed() -> Self {
        Self::default()
    }

    /// No colors, bounded samples.
    pub fn ci() -> Self {
        Self {
            include_samples: true,
            include_notes: true,
            max_samples: Some(20),
            use_colors: false,
        }
    }

    /// Sets whether to include sample mismatches.
    pub fn with_samples(mut self, include: bool) -> Self {
        self.include_samples = include;
        self
    }

    /// Sets whether to include data-quality notes.
    pub fn with_notes(mut self, include: bool) -> Self {
        self.include_notes = include;
        self
    }

    /// Caps the number of rendered samples.
    pub fn with_max_samples(mut self, max: usize) -> Self {
        self.max_samples = Some(max);
        self
    }

    /// Sets whether to use colorized output.
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }
}

/// Turns a verdict into text.
///
/// # Examples
///
/// ```rust
/// use skew_guard::formatters::VerdictFormatter;
/// use skew_guard::core::Verdict;
///
/// struct OneLine;
///
/// impl VerdictFormatter for OneLine {
///     fn format(&self, verdict: &Verdict) -> skew_guard::prelude::Result<String> {
///         Ok(format!("ok={} failing={}", verdict.ok, verdict.failing_features.join(",")))
///     }
/// }
/// ```
pub trait VerdictFormatter {
    /// Formats with the formatter's own configuration.
    fn format(&self, verdict: &Verdict) -> Result<String>;

    /// Formats with an explicit configuration. The default ignores it.
    fn format_with_config(&self, verdict: &Verdict, _config: &FormatterConfig) -> Result<String> {
        self.format(verdict)
    }
}

/// Pretty or compact JSON.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    config: FormatterConfig,
    pretty: bool,
}

impl JsonFormatter {
    /// Pretty JSON with the default configuration.
    pub fn new() -> Self {
        Self::with_config(FormatterConfig::default())
    }

    /// Pretty JSON with `config`.
    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            pretty: true,
        }
    }

    /// Sets whether to pretty-print.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl VerdictFormatter for JsonFormatter {
    fn format(&self, verdict: &Verdict) -> Result<String> {
        self.format_with_config(verdict, &self.config)
    }

    fn format_with_config(&self, verdict: &Verdict, config: &FormatterConfig) -> Result<String> {
        let filtered = filter_verdict(verdict, config);
        let json = if self.pretty {
            serde_json::to_string_pretty(&filtered)
        } else {
            serde_json::to_string(&filtered)
        };
        json.map_err(|e| SkewError::Serialization(format!("failed to serialize verdict: {e}")))
    }
}

/// Plain terminal text.
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    /// Text with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Text with `config`.
    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }

    fn render(&self, verdict: &Verdict, config: &FormatterConfig, out: &mut String) -> fmt::Result {
        let paint = |text: String, code: &str| {
            if config.use_colors {
                format!("\x1b[{code}m{text}\x1b[0m")
            } else {
                text
            }
        };

        let status = if verdict.ok { "32" } else { "31" };
        writeln!(out, "{}", paint(format!("OK: {}", verdict.ok), status))?;
        writeln!(out, "Keys: {}", verdict.keys.join(", "))?;
        writeln!(out, "Pairs compared: {}", verdict.num_pairs)?;
        write_missing(
            out,
            "online",
            verdict.missing_in_online,
            &verdict.missing_in_online_examples,
        )?;
        write_missing(
            out,
            "offline",
            verdict.missing_in_offline,
            &verdict.missing_in_offline_examples,
        )?;
        if !verdict.failing_features.is_empty() {
            writeln!(
                out,
                "Failing features: {}",
                paint(verdict.failing_features.join(", "), "31")
            )?;
        }

        writeln!(out)?;
        writeln!(out, "Per-feature:")?;
        for stats in &verdict.features {
            write!(
                out,
                "  {} [{}]: mismatch_rate={:.4} ({}/{})",
                stats.name, stats.kind, stats.mismatch_rate, stats.num_mismatches, stats.num_rows
            )?;
            if let Some(mean) = stats.mean_abs_diff {
                write!(out, ", mean_abs_diff={mean:.6}")?;
            }
            if let Some(unknown) = stats.unknown_category_count {
                write!(out, ", unknown_categories={unknown}")?;
            }
            if stats.null_mismatches > 0 {
                write!(out, ", null_mismatches={}", stats.null_mismatches)?;
            }
            if stats.missing_column_count > 0 {
                write!(out, ", missing_column={}", stats.missing_column_count)?;
            }
            if let Some(out_of_range) = stats.out_of_range_count.filter(|n| *n > 0) {
                write!(out, ", out_of_range={out_of_range}")?;
            }
            writeln!(out)?;
            write_unknown_values(out, stats)?;
        }

        let samples = shown_samples(verdict, config);
        if !samples.is_empty() {
            writeln!(out)?;
            writeln!(out, "Sample mismatches:")?;
            for sample in samples {
                write!(
                    out,
                    "  {} {}: offline={} online={}",
                    sample.key, sample.feature, sample.offline, sample.online
                )?;
                if let Some(diff) = sample.abs_diff {
                    write!(out, " abs_diff={diff}")?;
                }
                writeln!(out)?;
            }
        }

        if config.include_notes && !verdict.notes.is_empty() {
            writeln!(out)?;
            writeln!(out, "Notes:")?;
            for note in &verdict.notes {
                writeln!(out, "  - {note}")?;
            }
        }
        Ok(())
    }
}

fn write_missing(
    out: &mut String,
    side: &str,
    count: usize,
    examples: &[crate::core::KeyTuple],
) -> fmt::Result {
    write!(out, "Missing in {side}: {count}")?;
    if !examples.is_empty() {
        let shown: Vec<String> = examples.iter().map(ToString::to_string).collect();
        write!(out, " (e.g. {})", shown.join(", "))?;
    }
    writeln!(out)
}

fn write_unknown_values(out: &mut String, stats: &FeatureStats) -> fmt::Result {
    for (side, values) in [("offline", &stats.offline_unknown), ("online", &stats.online_unknown)] {
        if !values.is_empty() {
            let values: Vec<&str> = values.iter().map(String::as_str).collect();
            writeln!(out, "      unknown {side} values: {}", values.join(", "))?;
        }
    }
    Ok(())
}

impl VerdictFormatter for HumanFormatter {
    fn format(&self, verdict: &Verdict) -> Result<String> {
        self.format_with_config(verdict, &self.config)
    }

    fn format_with_config(&self, verdict: &Verdict, config: &FormatterConfig) -> Result<String> {
        let mut out = String::new();
        self.render(verdict, config, &mut out)
            .map_err(|e| SkewError::Internal(format!("failed to render verdict: {e}")))?;
        Ok(out)
    }
}

/// GitHub-flavored Markdown.
#[derive(Debug, Clone)]
pub struct MarkdownFormatter {
    config: FormatterConfig,
    heading_level: u8,
}

impl MarkdownFormatter {
    /// Markdown with the default configuration and a level-2 heading.
    pub fn new() -> Self {
        Self::with_config(FormatterConfig::default())
    }

    /// Markdown with `config`.
    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            heading_level: 2,
        }
    }

    /// Sets the top heading level (clamped to 1..=6).
    pub fn with_heading_level(mut self, level: u8) -> Self {
        self.heading_level = level.clamp(1, 6);
        self
    }

    fn render(&self, verdict: &Verdict, config: &FormatterConfig, out: &mut String) -> fmt::Result {
        let h = "#".repeat(self.heading_level as usize);
        let status = if verdict.ok { "✅ parity OK" } else { "❌ parity violated" };
        writeln!(out, "{h} Skew check: {status}")?;
        writeln!(out)?;
        writeln!(out, "- **Keys:** {}", verdict.keys.join(", "))?;
        writeln!(out, "- **Pairs compared:** {}", verdict.num_pairs)?;
        writeln!(out, "- **Missing in online:** {}", verdict.missing_in_online)?;
        writeln!(out, "- **Missing in offline:** {}", verdict.missing_in_offline)?;
        if !verdict.failing_features.is_empty() {
            let names: Vec<String> =
                verdict.failing_features.iter().map(|n| format!("`{n}`")).collect();
            writeln!(out, "- **Failing features:** {}", names.join(", "))?;
        }
        writeln!(out)?;

        writeln!(out, "{h}# Per-feature")?;
        writeln!(out)?;
        writeln!(
            out,
            "| Feature | Kind | Rows | Mismatches | Mismatch rate | Mean abs diff | \
             Unknown categories |"
        )?;
        writeln!(out, "|---|---|---:|---:|---:|---:|---:|")?;
        for stats in &verdict.features {
            writeln!(
                out,
                "| `{}` | {} | {} | {} | {:.4} | {} | {} |",
                stats.name,
                stats.kind,
                stats.num_rows,
                stats.num_mismatches,
                stats.mismatch_rate,
                stats.mean_abs_diff.map_or("-".to_string(), |m| format!("{m:.6}")),
                stats.unknown_category_count.map_or("-".to_string(), |n| n.to_string()),
            )?;
        }

        let samples = shown_samples(verdict, config);
        if !samples.is_empty() {
            writeln!(out)?;
            writeln!(out, "{h}# Sample mismatches")?;
            writeln!(out)?;
            writeln!(out, "| Key | Feature | Offline | Online | Abs diff |")?;
            writeln!(out, "|---|---|---|---|---:|")?;
            for sample in samples {
                writeln!(
                    out,
                    "| {} | `{}` | {} | {} | {} |",
                    sample.key,
                    sample.feature,
                    sample.offline,
                    sample.online,
                    sample.abs_diff.map_or("-".to_string(), |d| d.to_string()),
                )?;
            }
        }

        if config.include_notes && !verdict.notes.is_empty() {
            writeln!(out)?;
            writeln!(out, "{h}# Data quality notes")?;
            writeln!(out)?;
            for note in &verdict.notes {
                writeln!(out, "- {note}")?;
            }
        }
        Ok(())
    }
}

impl Default for MarkdownFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl VerdictFormatter for MarkdownFormatter {
    fn format(&self, verdict: &Verdict) -> Result<String> {
        self.format_with_config(verdict, &self.config)
    }

    fn format_with_config(&self, verdict: &Verdict, config: &FormatterConfig) -> Result<String> {
        let mut out = String::new();
        self.render(verdict, config, &mut out)
            .map_err(|e| SkewError::Internal(format!("failed to render verdict: {e}")))?;
        Ok(out)
    }
}

/// A standalone HTML page.
#[derive(Debug, Clone, Default)]
pub struct HtmlFormatter {
    config: FormatterConfig,
    json_href: Option<String>,
}

impl HtmlFormatter {
    /// HTML with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// HTML with `config`.
    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            json_href: None,
        }
    }

    /// Links the page to the JSON report at `href`.
    pub fn with_json_href(mut self, href: impl Into<String>) -> Self {
        self.json_href = Some(href.into());
        self
    }

    fn render(&self, verdict: &Verdict, config: &FormatterConfig, out: &mut String) -> fmt::Result {
        let (status, color) = if verdict.ok {
            ("Parity OK", "#1a7f37")
        } else {
            ("Parity violated", "#cf222e")
        };
        writeln!(out, "<!DOCTYPE html>")?;
        writeln!(out, "<html><head><meta charset=\"utf-8\"><title>skew-guard report</title>")?;
        writeln!(
            out,
            "<style>body{{font-family:sans-serif;margin:2em}}table{{border-collapse:collapse}}\
             td,th{{border:1px solid #ccc;padding:4px 8px}}.num{{text-align:right}}</style>"
        )?;
        writeln!(out, "</head><body>")?;
        writeln!(out, "<h1>skew-guard report</h1>")?;
        writeln!(out, "<p style=\"color:{color}\"><strong>{status}</strong></p>")?;
        writeln!(out, "<ul>")?;
        writeln!(out, "<li>Keys: {}</li>", escape_html(&verdict.keys.join(", ")))?;
        writeln!(out, "<li>Pairs compared: {}</li>", verdict.num_pairs)?;
        writeln!(out, "<li>Missing in online: {}</li>", verdict.missing_in_online)?;
        writeln!(out, "<li>Missing in offline: {}</li>", verdict.missing_in_offline)?;
        writeln!(out, "</ul>")?;
        if let Some(href) = &self.json_href {
            writeln!(out, "<p><a href=\"{}\">JSON report</a></p>", escape_html(href))?;
        }

        writeln!(out, "<h2>Per-feature</h2>")?;
        writeln!(
            out,
            "<table><tr><th>Feature</th><th>Kind</th><th>Rows</th><th>Mismatches</th>\
             <th>Mismatch rate</th><th>Mean abs diff</th><th>Unknown categories</th></tr>"
        )?;
        for stats in &verdict.features {
            writeln!(
                out,
                "<tr><td>{}</td><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td>\
                 <td class=\"num\">{:.4}</td><td class=\"num\">{}</td>\
                 <td class=\"num\">{}</td></tr>",
                escape_html(&stats.name),
                stats.kind,
                stats.num_rows,
                stats.num_mismatches,
                stats.mismatch_rate,
                stats.mean_abs_diff.map_or("-".to_string(), |m| format!("{m:.6}")),
                stats.unknown_category_count.map_or("-".to_string(), |n| n.to_string()),
            )?;
        }
        writeln!(out, "</table>")?;

        let samples = shown_samples(verdict, config);
        if !samples.is_empty() {
            writeln!(out, "<h2>Sample mismatches</h2>")?;
            writeln!(
                out,
                "<table><tr><th>Key</th><th>Feature</th><th>Offline</th><th>Online</th>\
                 <th>Abs diff</th></tr>"
            )?;
            for sample in samples {
                writeln!(
                    out,
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
                     <td class=\"num\">{}</td></tr>",
                    escape_html(&sample.key.to_string()),
                    escape_html(&sample.feature),
                    escape_html(&sample.offline.to_string()),
                    escape_html(&sample.online.to_string()),
                    sample.abs_diff.map_or("-".to_string(), |d| d.to_string()),
                )?;
            }
            writeln!(out, "</table>")?;
        }

        if config.include_notes && !verdict.notes.is_empty() {
            writeln!(out, "<h2>Data quality notes</h2><ul>")?;
            for note in &verdict.notes {
                writeln!(out, "<li>{}</li>", escape_html(&note.to_string()))?;
            }
            writeln!(out, "</ul>")?;
        }
        writeln!(out, "</body></html>")
    }
}

impl VerdictFormatter for HtmlFormatter {
    fn format(&self, verdict: &Verdict) -> Result<String> {
        self.format_with_config(verdict, &self.config)
    }

    fn format_with_config(&self, verdict: &Verdict, config: &FormatterConfig) -> Result<String> {
        let mut out = String::new();
        self.render(verdict, config, &mut out)
            .map_err(|e| SkewError::Internal(format!("failed to render verdict: {e}")))?;
        Ok(out)
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn shown_samples<'v>(
    verdict: &'v Verdict,
    config: &FormatterConfig,
) -> &'v [crate::core::SampleMismatch] {
    if !config.include_samples {
        return &[];
    }
    let limit = config
        .max_samples
        .unwrap_or(verdict.sample_mismatches.len())
        .min(verdict.sample_mismatches.len());
    &verdict.sample_mismatches[..limit]
}

fn filter_verdict(verdict: &Verdict, config: &FormatterConfig) -> Verdict {
    let mut filtered = verdict.clone();
    filtered.sample_mismatches = shown_samples(verdict, config).to_vec();
    if !config.include_notes {
        filtered.notes.clear();
    }
    filtered
}
