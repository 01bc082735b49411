//! Configuration for highlight export.
//!
//! All export behaviour is controlled through [`ExportConfig`], built via its
//! [`ExportConfigBuilder`]. Project-level settings can also come from a
//! `config.yaml` ([`ProjectConfig`]) that feeds the same builder, so the CLI
//! and library callers share one validation path.

use crate::error::HighlightError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Minimum normalised title similarity for a fuzzy candidate.
pub const DEFAULT_TITLE_THRESHOLD: f64 = 0.85;

/// Matches scoring below this are kept but flagged with a warning.
pub const DEFAULT_LOW_CONFIDENCE: f64 = 0.95;

/// Field delimiter of the `Title_Authors_Year` filename schema.
pub const DEFAULT_FILENAME_DELIMITER: &str = "_";

/// Category column value for CSV rows.
pub const DEFAULT_CATEGORY: &str = "articles";

/// Configuration for one export run.
///
/// # Example
/// ```rust
/// use pdf_highlights::ExportConfig;
///
/// let config = ExportConfig::builder()
///     .title_threshold(0.9)
///     .markdown_dir("notes")
///     .build()
///     .unwrap();
/// assert_eq!(config.thresholds.title_similarity, 0.9);
/// ```
#[derive(Clone)]
pub struct ExportConfig {
    /// Which files to write per document. Default: all three.
    pub formats: OutputFormats,

    /// Directory for enriched JSON files. Default: current directory.
    pub json_dir: PathBuf,

    /// Directory for CSV files. Default: current directory.
    pub csv_dir: PathBuf,

    /// Directory for Markdown files. Default: current directory.
    pub markdown_dir: PathBuf,

    /// Similarity thresholds used by the matcher.
    pub thresholds: MatchThresholds,

    /// Which candidate source the matcher consults first.
    pub precedence: SourcePrecedence,

    /// Delimiter between `Title`, `Authors` and `Year` in file names. Default: `_`.
    pub filename_delimiter: String,

    /// Highlight colour to Markdown tag mapping.
    pub color_tags: ColorTagMap,

    /// Value of the CSV `Category` column. Default: `articles`.
    pub category: String,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Documents processed at once by [`crate::convert::process_batch`]. Default: 4.
    pub concurrency: usize,

    /// Optional batch progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            formats: OutputFormats::default(),
            json_dir: PathBuf::from("."),
            csv_dir: PathBuf::from("."),
            markdown_dir: PathBuf::from("."),
            thresholds: MatchThresholds::default(),
            precedence: SourcePrecedence::default(),
            filename_delimiter: DEFAULT_FILENAME_DELIMITER.to_string(),
            color_tags: ColorTagMap::default(),
            category: DEFAULT_CATEGORY.to_string(),
            password: None,
            concurrency: 4,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("formats", &self.formats)
            .field("json_dir", &self.json_dir)
            .field("csv_dir", &self.csv_dir)
            .field("markdown_dir", &self.markdown_dir)
            .field("thresholds", &self.thresholds)
            .field("precedence", &self.precedence)
            .field("filename_delimiter", &self.filename_delimiter)
            .field("color_tags", &self.color_tags)
            .field("category", &self.category)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl ExportConfig {
    /// Create a new builder for `ExportConfig`.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExportConfig`].
#[derive(Debug)]
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl ExportConfigBuilder {
    pub fn formats(mut self, formats: OutputFormats) -> Self {
        self.config.formats = formats;
        self
    }

    pub fn json_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.json_dir = dir.into();
        self
    }

    pub fn csv_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.csv_dir = dir.into();
        self
    }

    pub fn markdown_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.markdown_dir = dir.into();
        self
    }

    /// Put every output format in the same directory.
    pub fn output_dir(self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.json_dir(dir.clone())
            .csv_dir(dir.clone())
            .markdown_dir(dir)
    }

    pub fn title_threshold(mut self, t: f64) -> Self {
        self.config.thresholds.title_similarity = t;
        self
    }

    pub fn low_confidence(mut self, t: f64) -> Self {
        self.config.thresholds.low_confidence = t;
        self
    }

    pub fn precedence(mut self, precedence: SourcePrecedence) -> Self {
        self.config.precedence = precedence;
        self
    }

    pub fn filename_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.config.filename_delimiter = delimiter.into();
        self
    }

    pub fn color_tags(mut self, tags: ColorTagMap) -> Self {
        self.config.color_tags = tags;
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.config.category = category.into();
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExportConfig, HighlightError> {
        let c = &self.config;
        let t = &c.thresholds;
        if !(t.title_similarity > 0.0 && t.title_similarity <= 1.0) {
            return Err(HighlightError::InvalidConfig(format!(
                "title threshold must be in (0, 1], got {}",
                t.title_similarity
            )));
        }
        if !(0.0..=1.0).contains(&t.low_confidence) {
            return Err(HighlightError::InvalidConfig(format!(
                "low-confidence threshold must be in [0, 1], got {}",
                t.low_confidence
            )));
        }
        if c.filename_delimiter.is_empty() {
            return Err(HighlightError::InvalidConfig(
                "filename delimiter must not be empty".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(HighlightError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if !c.formats.any() {
            return Err(HighlightError::InvalidConfig(
                "at least one output format must be enabled".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Knobs ────────────────────────────────────────────────────────────────

/// Output files written per document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFormats {
    pub json: bool,
    pub csv: bool,
    pub markdown: bool,
}

impl Default for OutputFormats {
    fn default() -> Self {
        Self {
            json: true,
            csv: true,
            markdown: true,
        }
    }
}

impl OutputFormats {
    pub fn none() -> Self {
        Self {
            json: false,
            csv: false,
            markdown: false,
        }
    }

    pub fn any(&self) -> bool {
        self.json || self.csv || self.markdown
    }

    /// Parse a comma-separated list such as `md,csv`.
    pub fn parse_list(s: &str) -> Result<Self, HighlightError> {
        let mut formats = Self::none();
        for item in s.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            match item.to_ascii_lowercase().as_str() {
                "json" => formats.json = true,
                "csv" => formats.csv = true,
                "md" | "markdown" => formats.markdown = true,
                "all" => formats = Self::default(),
                other => {
                    return Err(HighlightError::InvalidConfig(format!(
                        "unknown output format '{other}' (expected json, csv, md)"
                    )))
                }
            }
        }
        Ok(formats)
    }
}

/// Matcher thresholds; both scores are normalised to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchThresholds {
    /// Minimum title similarity for a candidate. Default: 0.85.
    pub title_similarity: f64,
    /// Matches below this confidence carry a warning. Default: 0.95.
    pub low_confidence: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            title_similarity: DEFAULT_TITLE_THRESHOLD,
            low_confidence: DEFAULT_LOW_CONFIDENCE,
        }
    }
}

/// Which title/author source the matcher tries first.
///
/// The second source is consulted only when the first is inconclusive, so
/// this also decides the winner when both would match different entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourcePrecedence {
    /// Parsed file name first, embedded PDF metadata as fallback. (default)
    #[default]
    FilenameFirst,
    /// Embedded PDF metadata first, parsed file name as fallback.
    MetadataFirst,
}

/// Highlight colour (lowercase `#rrggbb`) to tag name, without the leading `#`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct ColorTagMap(BTreeMap<String, String>);

impl From<BTreeMap<String, String>> for ColorTagMap {
    fn from(raw: BTreeMap<String, String>) -> Self {
        Self::from_pairs(raw.iter().map(|(c, t)| (c.as_str(), t.as_str())))
    }
}

impl From<ColorTagMap> for BTreeMap<String, String> {
    fn from(map: ColorTagMap) -> Self {
        map.0
    }
}

impl Default for ColorTagMap {
    fn default() -> Self {
        Self::from_pairs([
            ("#b9e8b9", "important-pdf"),
            ("#c3e1f8", "reference-note-pdf"),
            ("#f0bbcd", "secondary-pdf"),
            ("#f9e196", "general-pdf"),
        ])
    }
}

impl ColorTagMap {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(color, tag)| (normalize_hex(color), tag.trim_start_matches('#').to_string()))
                .collect(),
        )
    }

    /// Tag for a colour, tolerant of case and a missing `#`.
    pub fn tag_for(&self, color: &str) -> Option<&str> {
        self.0.get(&normalize_hex(color)).map(String::as_str)
    }
}

fn normalize_hex(color: &str) -> String {
    let c = color.trim().trim_start_matches('#').to_ascii_lowercase();
    format!("#{c}")
}

// ── Project file ─────────────────────────────────────────────────────────

/// The `config.yaml` project file.
///
/// ```yaml
/// bibtex_path: library.bib
/// json_output_dir: out/json
/// csv_output_dir: out/csv
/// md_output_dir: notes
/// title_threshold: 0.9
/// color_tags:
///   "#f9e196": general-pdf
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub bibtex_path: Option<PathBuf>,
    pub json_output_dir: Option<PathBuf>,
    pub csv_output_dir: Option<PathBuf>,
    pub md_output_dir: Option<PathBuf>,
    pub formats: Option<OutputFormats>,
    pub title_threshold: Option<f64>,
    pub low_confidence: Option<f64>,
    pub precedence: Option<SourcePrecedence>,
    pub filename_delimiter: Option<String>,
    pub color_tags: Option<ColorTagMap>,
    pub category: Option<String>,
    pub concurrency: Option<usize>,
}

impl ProjectConfig {
    /// Load a project file; relative paths resolve against its directory.
    pub fn from_yaml_file(path: &Path) -> Result<Self, HighlightError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            HighlightError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut project = Self::from_yaml_str(&raw)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        project.resolve_paths(base);
        Ok(project)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, HighlightError> {
        serde_yaml::from_str(raw)
            .map_err(|e| HighlightError::InvalidConfig(format!("config.yaml: {e}")))
    }

    fn resolve_paths(&mut self, base: &Path) {
        for p in [
            &mut self.bibtex_path,
            &mut self.json_output_dir,
            &mut self.csv_output_dir,
            &mut self.md_output_dir,
        ]
        .into_iter()
        .flatten()
        {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        }
    }

    /// Seed a builder with every value this file sets.
    pub fn into_builder(self) -> ExportConfigBuilder {
        let mut b = ExportConfig::builder();
        if let Some(d) = self.json_output_dir {
            b = b.json_dir(d);
        }
        if let Some(d) = self.csv_output_dir {
            b = b.csv_dir(d);
        }
        if let Some(d) = self.md_output_dir {
            b = b.markdown_dir(d);
        }
        if let Some(f) = self.formats {
            b = b.formats(f);
        }
        if let Some(t) = self.title_threshold {
            b = b.title_threshold(t);
        }
        if let Some(t) = self.low_confidence {
            b = b.low_confidence(t);
        }
        if let Some(p) = self.precedence {
            b = b.precedence(p);
        }
        if let Some(d) = self.filename_delimiter {
            b = b.filename_delimiter(d);
        }
        if let Some(c) = self.color_tags {
            b = b.color_tags(c);
        }
        if let Some(c) = self.category {
            b = b.category(c);
        }
        if let Some(n) = self.concurrency {
            b = b.concurrency(n);
        }
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build() {
        let c = ExportConfig::builder().build().unwrap();
        assert_eq!(c.thresholds.title_similarity, 0.85);
        assert_eq!(c.filename_delimiter, "_");
        assert_eq!(c.category, "articles");
        assert!(c.formats.json && c.formats.csv && c.formats.markdown);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        assert!(ExportConfig::builder().title_threshold(0.0).build().is_err());
        assert!(ExportConfig::builder().title_threshold(1.5).build().is_err());
        assert!(ExportConfig::builder().low_confidence(-0.1).build().is_err());
    }

    #[test]
    fn rejects_empty_delimiter_and_no_formats() {
        assert!(ExportConfig::builder().filename_delimiter("").build().is_err());
        assert!(ExportConfig::builder()
            .formats(OutputFormats::none())
            .build()
            .is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let c = ExportConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
    }

    #[test]
    fn default_color_tags() {
        let tags = ColorTagMap::default();
        assert_eq!(tags.tag_for("#b9e8b9"), Some("important-pdf"));
        assert_eq!(tags.tag_for("#B9E8B9"), Some("important-pdf"));
        assert_eq!(tags.tag_for("c3e1f8"), Some("reference-note-pdf"));
        assert_eq!(tags.tag_for("#000000"), None);
    }

    #[test]
    fn parse_format_list() {
        let f = OutputFormats::parse_list("md, csv").unwrap();
        assert!(f.markdown && f.csv && !f.json);
        assert_eq!(OutputFormats::parse_list("all").unwrap(), OutputFormats::default());
        assert!(OutputFormats::parse_list("pdf").is_err());
    }

    #[test]
    fn project_yaml_feeds_builder() {
        let yaml = r##"
bibtex_path: refs/library.bib
md_output_dir: notes
title_threshold: 0.9
precedence: metadata-first
color_tags:
  "#FFFF00": yellow
"##;
        let mut project = ProjectConfig::from_yaml_str(yaml).unwrap();
        project.resolve_paths(Path::new("/proj"));
        assert_eq!(
            project.bibtex_path.as_deref(),
            Some(Path::new("/proj/refs/library.bib"))
        );

        let config = project.into_builder().build().unwrap();
        assert_eq!(config.markdown_dir, PathBuf::from("/proj/notes"));
        assert_eq!(config.thresholds.title_similarity, 0.9);
        assert_eq!(config.precedence, SourcePrecedence::MetadataFirst);
        assert_eq!(config.color_tags.tag_for("#ffff00"), Some("yellow"));
    }

    #[test]
    fn project_yaml_rejects_unknown_keys() {
        assert!(ProjectConfig::from_yaml_str("bibtex: x.bib\n").is_err());
    }
}
