//! CLI binary for pdf-highlights.
//!
//! A thin shim over the library crate that maps CLI flags and an optional
//! `config.yaml` to `ExportConfig` and prints the run summary.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_highlights::{
    inspect, process_batch, render_from_json, BatchProgressCallback, BatchReport, BibStore,
    ColorTagMap, DocumentReport, ExportConfig, ExportConfigBuilder, OutputFormats, Outcome,
    ProgressCallback, ProjectConfig, SourcePrecedence,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the batch plus a log line per
/// finished document. Documents finish out of order when run concurrently.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-document wall-clock start times, keyed by input index.
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading bibliography…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Exporting");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .map(|mut m| m.remove(&index))
            .ok()
            .flatten()
            .map(|t| t.elapsed().as_millis() as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.activate_bar(total_documents);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Exporting highlights from {total_documents} documents…"))
        ));
    }

    fn on_document_start(&self, index: usize, _total: usize, file_name: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(file_name.to_string());
    }

    fn on_document_complete(&self, index: usize, _total: usize, report: &DocumentReport) {
        let secs = self.elapsed_secs(index);
        let mark = match report.outcome {
            Outcome::Ok => green("✓"),
            Outcome::Warning => yellow("⚠"),
            Outcome::Skipped => dim("–"),
        };
        self.bar.println(format!(
            "  {} {:<48}  {}  {}",
            mark,
            truncate(&report.file_name, 48),
            dim(&format!("{:>4} highlights", report.highlight_count)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, _total: usize, file_name: &str, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {:<48}  {}  {}",
            red("✗"),
            truncate(file_name, 48),
            red(&truncate(error, 80)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, report: &BatchReport) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        let total = report.documents.len() + report.failures.len();
        if failed == 0 {
            eprintln!("{} {} documents processed", green("✔"), bold(&total.to_string()));
        } else {
            eprintln!(
                "{} {}/{} documents processed  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&(total - failed).to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

const AFTER_HELP: &str = r##"EXAMPLES:
  # Export every annotated PDF in a folder next to the library
  pdf-highlights --bib library.bib papers/ --output-dir notes/

  # Use a project file for paths and colour tags
  pdf-highlights --config config.yaml papers/*.pdf

  # Markdown only, metadata before file name when matching
  pdf-highlights --bib library.bib --formats markdown --precedence metadata-first paper.pdf

  # Re-render CSV and Markdown from a previously exported JSON record
  pdf-highlights --from-json out/paper.json --output-dir notes/

  # Inspect what a PDF offers (no bibliography needed)
  pdf-highlights --inspect-only paper.pdf
  pdf-highlights --inspect-only --json paper.pdf

FILE NAMES:
  PDFs named  <title>_<authors>_<year>.pdf  give the best matches; the
  delimiter is configurable with --delimiter. Authors may be separated by
  "and" or commas.

CONFIG FILE (config.yaml):
  bibtex_path: library.bib
  json_output_dir: out/json
  csv_output_dir: out/csv
  md_output_dir: vault/literature
  title_threshold: 0.85
  color_tags:
    "#b9e8b9": important-pdf

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory); system library otherwise
  PDF_HIGHLIGHTS_BIB      Default BibTeX library
  PDF_HIGHLIGHTS_CONFIG   Default project file
  RUST_LOG                Override the log filter (e.g. pdf_highlights=debug)
"##;

/// Export PDF highlights, matched against a BibTeX library, to Markdown,
/// CSV and JSON.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-highlights",
    version,
    about = "Export PDF highlights to Markdown, CSV and JSON using a BibTeX library",
    long_about = "Extract highlight annotations from PDFs, match each document to its \
BibTeX entry by file name, embedded metadata or DOI, and write Markdown notes with YAML \
front matter, highlight-import CSV and enriched JSON records.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files or directories containing PDFs.
    inputs: Vec<PathBuf>,

    /// BibTeX library to match against.
    #[arg(short, long, env = "PDF_HIGHLIGHTS_BIB")]
    bib: Option<PathBuf>,

    /// YAML project file (bibtex_path, output directories, knobs).
    #[arg(long, env = "PDF_HIGHLIGHTS_CONFIG")]
    config: Option<PathBuf>,

    /// Write every format into this directory.
    #[arg(short, long, env = "PDF_HIGHLIGHTS_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Directory for enriched JSON records.
    #[arg(long, env = "PDF_HIGHLIGHTS_JSON_DIR")]
    json_dir: Option<PathBuf>,

    /// Directory for highlight-import CSV files.
    #[arg(long, env = "PDF_HIGHLIGHTS_CSV_DIR")]
    csv_dir: Option<PathBuf>,

    /// Directory for Markdown notes.
    #[arg(long, env = "PDF_HIGHLIGHTS_MD_DIR")]
    md_dir: Option<PathBuf>,

    /// Output formats: any of json, csv, markdown (comma separated).
    #[arg(short, long, env = "PDF_HIGHLIGHTS_FORMATS")]
    formats: Option<String>,

    /// Minimum title similarity for a fuzzy match (0.0–1.0).
    #[arg(long, env = "PDF_HIGHLIGHTS_THRESHOLD")]
    threshold: Option<f64>,

    /// Matches below this confidence are reported as warnings.
    #[arg(long, env = "PDF_HIGHLIGHTS_LOW_CONFIDENCE")]
    low_confidence: Option<f64>,

    /// Which evidence to try first when matching.
    #[arg(long, env = "PDF_HIGHLIGHTS_PRECEDENCE", value_enum)]
    precedence: Option<PrecedenceArg>,

    /// File-name field delimiter.
    #[arg(long, env = "PDF_HIGHLIGHTS_DELIMITER")]
    delimiter: Option<String>,

    /// Colour tag mapping COLOR=TAG (repeatable), e.g. "#b9e8b9=important-pdf".
    #[arg(long = "tag", value_name = "COLOR=TAG")]
    tags: Vec<String>,

    /// Value of the CSV Category column.
    #[arg(long, env = "PDF_HIGHLIGHTS_CATEGORY")]
    category: Option<String>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF_HIGHLIGHTS_PASSWORD")]
    password: Option<String>,

    /// Number of documents processed at once.
    #[arg(short, long, env = "PDF_HIGHLIGHTS_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Render CSV and Markdown from an enriched JSON record instead of a PDF.
    #[arg(long, conflicts_with_all = ["inputs", "inspect_only"])]
    from_json: Option<PathBuf>,

    /// Print PDF metadata and highlight counts only, no matching or export.
    #[arg(long)]
    inspect_only: bool,

    /// Print inspect results or the run report as JSON on stdout.
    #[arg(long, env = "PDF_HIGHLIGHTS_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF_HIGHLIGHTS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF_HIGHLIGHTS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF_HIGHLIGHTS_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PrecedenceArg {
    FilenameFirst,
    MetadataFirst,
}

impl From<PrecedenceArg> for SourcePrecedence {
    fn from(v: PrecedenceArg) -> Self {
        match v {
            PrecedenceArg::FilenameFirst => SourcePrecedence::FilenameFirst,
            PrecedenceArg::MetadataFirst => SourcePrecedence::MetadataFirst,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO-level library logs are suppressed while the progress bar is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only && cli.from_json.is_none();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let paths = pdf_highlights::pipeline::input::expand_inputs(&cli.inputs).context("Failed to list inputs")?;
        let mut reports = Vec::with_capacity(paths.len());
        for path in &paths {
            let report = inspect(path, cli.password.as_deref())
                .await
                .with_context(|| format!("Failed to inspect {}", path.display()))?;
            reports.push(report);
        }

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&reports).context("Failed to serialize metadata")?
            );
        } else {
            for (i, r) in reports.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                println!("File:         {}", r.file_name);
                println!("Highlights:   {}", r.highlight_count);
                println!("Pages:        {}", r.metadata.page_count);
                if let Some(ref t) = r.metadata.title {
                    println!("Title:        {}", t);
                }
                if let Some(ref a) = r.metadata.author {
                    println!("Author:       {}", a);
                }
                if let Some(ref s) = r.metadata.subject {
                    println!("Subject:      {}", s);
                }
                if let Some(ref d) = r.metadata.doi {
                    println!("DOI:          {}", d);
                }
                if let Some(ref t) = r.filename.title_fragment {
                    println!("Name title:   {}", t);
                }
                if !r.filename.authors.is_empty() {
                    println!("Name authors: {}", r.filename.authors.join(", "));
                }
                if let Some(y) = r.filename.year {
                    println!("Name year:    {}", y);
                }
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let project = match cli.config {
        Some(ref path) => Some(
            ProjectConfig::from_yaml_file(path).with_context(|| format!("Failed to load {}", path.display()))?,
        ),
        None => None,
    };
    let bib_path = cli
        .bib
        .clone()
        .or_else(|| project.as_ref().and_then(|p| p.bibtex_path.clone()));

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, project, progress_cb)?;

    // ── JSON-first mode ──────────────────────────────────────────────────
    if let Some(ref json_path) = cli.from_json {
        let report = render_from_json(json_path, &config)
            .with_context(|| format!("Failed to render {}", json_path.display()))?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report).context("Failed to serialise report")?);
        } else if !cli.quiet {
            print_document(&report);
        }
        return Ok(());
    }

    // ── Batch run ────────────────────────────────────────────────────────
    let Some(bib_path) = bib_path else {
        bail!("No bibliography given: pass --bib or set bibtex_path in the config file");
    };
    let store = BibStore::load(&bib_path).with_context(|| format!("Failed to load {}", bib_path.display()))?;

    let paths = pdf_highlights::pipeline::input::expand_inputs(&cli.inputs).context("Failed to list inputs")?;
    if paths.is_empty() {
        bail!("No PDF files found in the given inputs");
    }

    let report = process_batch(paths, Arc::new(store), &config).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report).context("Failed to serialise report")?);
    } else if !cli.quiet {
        print_summary(&report);
    }

    if !report.failures.is_empty() {
        bail!("{} of {} documents failed", report.failures.len(), report.documents.len() + report.failures.len());
    }
    Ok(())
}

/// Merge the project file and CLI flags into `ExportConfig`; flags win.
fn build_config(cli: &Cli, project: Option<ProjectConfig>, progress: Option<ProgressCallback>) -> Result<ExportConfig> {
    let mut builder: ExportConfigBuilder = match project {
        Some(p) => p.into_builder(),
        None => ExportConfig::builder(),
    };

    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_dir(dir);
    }
    if let Some(ref dir) = cli.json_dir {
        builder = builder.json_dir(dir);
    }
    if let Some(ref dir) = cli.csv_dir {
        builder = builder.csv_dir(dir);
    }
    if let Some(ref dir) = cli.md_dir {
        builder = builder.markdown_dir(dir);
    }
    if let Some(ref f) = cli.formats {
        builder = builder.formats(OutputFormats::parse_list(f)?);
    }
    if let Some(t) = cli.threshold {
        builder = builder.title_threshold(t);
    }
    if let Some(t) = cli.low_confidence {
        builder = builder.low_confidence(t);
    }
    if let Some(p) = cli.precedence {
        builder = builder.precedence(p.into());
    }
    if let Some(ref d) = cli.delimiter {
        builder = builder.filename_delimiter(d.clone());
    }
    if !cli.tags.is_empty() {
        builder = builder.color_tags(parse_tags(&cli.tags)?);
    }
    if let Some(ref c) = cli.category {
        builder = builder.category(c.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse repeated `--tag COLOR=TAG` values.
fn parse_tags(raw: &[String]) -> Result<ColorTagMap> {
    let mut pairs = Vec::with_capacity(raw.len());
    for item in raw {
        let Some((color, tag)) = item.split_once('=') else {
            bail!("Invalid --tag '{}': expected COLOR=TAG", item);
        };
        let (color, tag) = (color.trim(), tag.trim().trim_start_matches('#'));
        if color.is_empty() || tag.is_empty() {
            bail!("Invalid --tag '{}': expected COLOR=TAG", item);
        }
        pairs.push((color, tag));
    }
    Ok(ColorTagMap::from_pairs(pairs))
}

fn print_document(doc: &DocumentReport) {
    let mark = match doc.outcome {
        Outcome::Ok => green("ok"),
        Outcome::Warning => yellow("warning"),
        Outcome::Skipped => dim("skipped"),
    };
    let matched = match &doc.matched_key {
        Some(key) => format!("{} ({:.2})", bold(key), doc.confidence),
        None => dim("no match"),
    };
    println!("{:<8} {}  →  {}  {} highlights", mark, doc.file_name, matched, doc.highlight_count);
    println!(
        "         json: {}  csv: {}  markdown: {}",
        format_status(doc, doc.files.json.as_deref()),
        format_status(doc, doc.files.csv.as_deref()),
        format_status(doc, doc.files.markdown.as_deref()),
    );
    for w in &doc.warnings {
        println!("         {} {}", yellow("!"), w);
    }
}

fn format_status(doc: &DocumentReport, path: Option<&Path>) -> String {
    match path {
        Some(p) => green(&format!("written {}", p.display())),
        None if doc.outcome == Outcome::Skipped => dim("skipped"),
        None => dim("off"),
    }
}

fn print_summary(report: &BatchReport) {
    for doc in &report.documents {
        print_document(doc);
    }
    for failure in &report.failures {
        println!("{:<8} {}  {}", red("failed"), failure.file_name, red(&failure.error));
    }
    println!();
    println!(
        "{} ok  {} warning  {} skipped  {} failed  {} highlights  {}ms",
        green(&report.count(Outcome::Ok).to_string()),
        yellow(&report.count(Outcome::Warning).to_string()),
        dim(&report.count(Outcome::Skipped).to_string()),
        red(&report.failures.len().to_string()),
        report.total_highlights(),
        report.elapsed_ms,
    );
    // The progress bar filters logs to `error`, hiding load-time skip warnings.
    if !report.skipped_entries.is_empty() {
        eprintln!(
            "{} {} bibliography entries skipped",
            yellow("⚠"),
            report.skipped_entries.len()
        );
        for entry in &report.skipped_entries {
            eprintln!("  {}", dim(&entry.to_string()));
        }
    }
}
