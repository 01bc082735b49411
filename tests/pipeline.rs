//! Integration tests for the document pipeline.
//!
//! These drive the public API with an in-memory bibliography and synthetic
//! annotations, so they need neither pdfium nor PDF fixtures.
//!
//! Run with:
//!   cargo test --test pipeline

use pdf_highlights::pipeline::names::normalize_names;
use pdf_highlights::pipeline::sanitize::sanitize;
use pdf_highlights::{
    process_annotations, render_from_json, write_outputs, BibStore, DocumentInput, EnrichedRecord,
    ExportConfig, MatchStrategy, OutputFormats, Outcome, PdfMetadata, RawAnnotation,
};
use std::path::Path;

// ── Test helpers ─────────────────────────────────────────────────────────────

const LIBRARY: &str = r#"
@article{lecun2015,
  title   = {Deep Learning},
  author  = {LeCun, Yann and Bengio, Yoshua and Hinton, Geoffrey},
  journal = {Nature},
  year    = {2015},
  doi     = {10.1038/nature14539}
}

@inproceedings{vaswani2017,
  title     = {Attention Is All You Need},
  author    = {Vaswani, Ashish and Shazeer, Noam and Parmar, Niki},
  booktitle = {Advances in Neural Information Processing Systems},
  year      = {2017}
}

@book{knuth1984,
  title  = {The {TeX}book},
  author = {Knuth, Donald E.},
  year   = {1984}
}
"#;

/// Route library logs through the test harness; `RUST_LOG=debug` shows
/// matcher decisions.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn store() -> BibStore {
    init_logging();
    BibStore::parse(LIBRARY).expect("library parses")
}

fn raw(text: &str, page: u32, color: Option<&str>, note: Option<&str>) -> RawAnnotation {
    RawAnnotation {
        text: text.to_string(),
        page,
        color: color.map(String::from),
        note: note.map(String::from),
    }
}

fn config_in(dir: &Path) -> ExportConfig {
    ExportConfig::builder().output_dir(dir).build().expect("valid config")
}

/// The YAML between the two `---` fences.
fn front_matter(md: &str) -> &str {
    let rest = md.strip_prefix("---\n").expect("front matter opens the note");
    let end = rest.find("\n---\n").expect("front matter is closed");
    &rest[..=end]
}

// ── Matching ─────────────────────────────────────────────────────────────────

#[test]
fn test_exact_title_match_is_full_confidence() {
    let input = DocumentInput {
        file_name: "Deep Learning_LeCun and Bengio_2015.pdf".into(),
        annotations: vec![raw("Deep learning allows computational models", 1, None, None)],
        metadata: None,
    };
    let run = process_annotations(&input, &store(), &ExportConfig::default());

    assert_eq!(run.report.outcome, Outcome::Ok, "warnings: {:?}", run.report.warnings);
    assert_eq!(run.report.matched_key.as_deref(), Some("lecun2015"));
    assert_eq!(run.report.confidence, 1.0);
    assert_eq!(run.report.strategy.as_deref(), Some(MatchStrategy::ExactTitle.to_string().as_str()));

    let record = run.record.expect("record assembled");
    assert_eq!(record.meta.title.as_deref(), Some("Deep Learning"));
    assert_eq!(record.meta.authors, vec!["Yann LeCun", "Yoshua Bengio", "Geoffrey Hinton"]);
    assert_eq!(record.meta.year, Some(2015));
}

#[test]
fn test_citation_key_file_name_matches() {
    let input = DocumentInput {
        file_name: "knuth1984.pdf".into(),
        annotations: vec![raw("boxes and glue", 66, None, None)],
        metadata: None,
    };
    let run = process_annotations(&input, &store(), &ExportConfig::default());
    assert_eq!(run.report.matched_key.as_deref(), Some("knuth1984"));
    let record = run.record.expect("record assembled");
    assert_eq!(record.meta.title.as_deref(), Some("The TeXbook"));
    assert_eq!(record.meta.authors, vec!["Donald E. Knuth"]);
}

#[test]
fn test_doi_in_metadata_matches_unhelpful_file_name() {
    let input = DocumentInput {
        file_name: "nature14539.pdf".into(),
        annotations: vec![raw("representation learning", 2, None, None)],
        metadata: Some(PdfMetadata {
            doi: Some("10.1038/nature14539".into()),
            page_count: 9,
            ..PdfMetadata::default()
        }),
    };
    let run = process_annotations(&input, &store(), &ExportConfig::default());
    assert_eq!(run.report.matched_key.as_deref(), Some("lecun2015"));
    assert_eq!(run.report.strategy.as_deref(), Some(MatchStrategy::Doi.to_string().as_str()));
}

#[test]
fn test_no_match_still_produces_a_warning_record() {
    let input = DocumentInput {
        file_name: "Unrelated Work_Nobody_1999.pdf".into(),
        annotations: vec![raw("nothing to see", 1, None, None)],
        metadata: None,
    };
    let run = process_annotations(&input, &store(), &ExportConfig::default());
    assert_eq!(run.report.outcome, Outcome::Warning);
    assert_eq!(run.report.matched_key, None);

    let record = run.record.expect("unmatched documents still get a record");
    assert_eq!(record.meta.title.as_deref(), Some("Unrelated Work"));
    assert_eq!(record.meta.authors, vec!["Nobody"]);
    assert_eq!(record.meta.year, Some(1999));
    assert_eq!(record.meta.citation_key, None);
}

#[test]
fn test_year_conflict_rejects_similar_title() {
    let input = DocumentInput {
        file_name: "Attention Is All We Need_Vaswani_2009.pdf".into(),
        annotations: vec![raw("self-attention", 3, None, None)],
        metadata: None,
    };
    let run = process_annotations(&input, &store(), &ExportConfig::default());
    assert_eq!(run.report.matched_key, None);
}

#[test]
fn test_similar_title_without_authors_does_not_match() {
    let input = DocumentInput {
        file_name: "Attention Is All We Need__2017.pdf".into(),
        annotations: vec![raw("self-attention", 3, None, None)],
        metadata: Some(PdfMetadata {
            title: Some("Attention Is All We Need".into()),
            page_count: 11,
            ..PdfMetadata::default()
        }),
    };
    let run = process_annotations(&input, &store(), &ExportConfig::default());
    assert_eq!(run.report.matched_key, None);
    assert_eq!(run.report.outcome, Outcome::Warning);
    assert!(run.report.warnings.iter().any(|w| w == "no matching bibliography entry"));
}

#[test]
fn test_unmatched_note_front_matter_parses() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let input = DocumentInput {
        file_name: r#"C:\drafts # "v2"_Nobody_n.d.pdf"#.into(),
        annotations: vec![raw("draft text", 1, None, None)],
        metadata: None,
    };
    let record = process_annotations(&input, &store(), &config).record.unwrap();
    let files = write_outputs(&record, "draft", &config).unwrap();

    let md = std::fs::read_to_string(files.markdown.expect("markdown written")).unwrap();
    let yaml: serde_yaml::Value = serde_yaml::from_str(front_matter(&md)).unwrap();
    assert_eq!(yaml["title"].as_str(), Some(r#"C:\drafts # "v2""#));
    assert!(yaml["year"].is_null());
    assert!(yaml["citation-key"].is_null());
    assert!(yaml["type"].is_null());
    assert_eq!(yaml["author-1"].as_str(), Some("[[Nobody]]"));
}

// ── Export ───────────────────────────────────────────────────────────────────

#[test]
fn test_written_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let input = DocumentInput {
        file_name: "Attention Is All You Need_Vaswani and Shazeer_2017.pdf".into(),
        annotations: vec![
            raw("The dominant sequence\ntransduction models", 1, Some("#B9E8B9"), Some("key claim")),
            raw("multi-head attention", 4, Some("#000000"), None),
            raw("positional encodings", 6, None, Some("positional   encodings")),
        ],
        metadata: None,
    };

    let run = process_annotations(&input, &store(), &config);
    let record = run.record.expect("record assembled");
    let files = write_outputs(&record, "Attention Is All You Need_Vaswani and Shazeer_2017", &config).unwrap();

    // CSV: header plus one row per highlight.
    let csv_path = files.csv.expect("csv written");
    let csv = std::fs::read_to_string(&csv_path).unwrap();
    let mut reader = csv::Reader::from_reader(csv.as_bytes());
    let headers = reader.headers().unwrap().clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        vec!["Title", "Author", "Category", "Source URL", "Highlight", "Note", "Location"]
    );
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(&rows[0][4], "The dominant sequence transduction models");
    assert_eq!(&rows[0][5], "key claim");
    assert_eq!(&rows[1][6], "Page 4");
    assert_eq!(&rows[2][1], "Ashish Vaswani, Noam Shazeer, Niki Parmar");
    assert_eq!(&rows[2][2], "articles");

    // Markdown: named after key and type, front matter parses as YAML.
    let md_path = files.markdown.expect("markdown written");
    assert_eq!(
        md_path.file_name().and_then(|n| n.to_str()),
        Some("vaswani2017 inproceedings-pdf.md")
    );
    let md = std::fs::read_to_string(&md_path).unwrap();
    let yaml: serde_yaml::Value = serde_yaml::from_str(front_matter(&md)).unwrap();
    assert_eq!(yaml["title"].as_str(), Some("Attention Is All You Need"));
    assert_eq!(yaml["year"].as_i64(), Some(2017));
    assert_eq!(yaml["author-1"].as_str(), Some("[[Ashish Vaswani]]"));
    assert_eq!(yaml["author-3"].as_str(), Some("[[Niki Parmar]]"));
    assert_eq!(yaml["citation-key"].as_str(), Some("vaswani2017"));
    assert!(yaml["highlights"].is_null());

    // Mapped colour gets a tag line, unmapped colours none.
    assert!(md.contains("- The dominant sequence transduction models\n> page: `01`\n> tags: #important-pdf\n"));
    assert!(md.contains("- multi-head attention\n> page: `04`\n\n"));
    assert!(md.contains(">[!memo]\n> key claim\n"));
    // A note repeating the highlight is not echoed as a memo.
    assert_eq!(md.matches("[!memo]").count(), 1);

    // JSON round trip.
    let json_path = files.json.expect("json written");
    let back = EnrichedRecord::from_json_file(&json_path).unwrap();
    assert_eq!(back, record);
}

#[test]
fn test_skipped_document_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let input = DocumentInput {
        file_name: "Deep Learning_LeCun_2015.pdf".into(),
        annotations: vec![],
        metadata: None,
    };
    let run = process_annotations(&input, &store(), &config);
    assert_eq!(run.report.outcome, Outcome::Skipped);
    assert!(run.record.is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_selected_formats_only() {
    let dir = tempfile::tempdir().unwrap();
    let config = ExportConfig::builder()
        .output_dir(dir.path())
        .formats(OutputFormats::parse_list("csv").unwrap())
        .build()
        .unwrap();
    let input = DocumentInput {
        file_name: "knuth1984.pdf".into(),
        annotations: vec![raw("glue", 1, None, None)],
        metadata: None,
    };
    let record = process_annotations(&input, &store(), &config).record.unwrap();
    let files = write_outputs(&record, "knuth1984", &config).unwrap();
    assert!(files.csv.is_some());
    assert!(files.json.is_none());
    assert!(files.markdown.is_none());
}

#[test]
fn test_render_from_json_does_not_rewrite_json() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let input = DocumentInput {
        file_name: "Deep Learning_LeCun_2015.pdf".into(),
        annotations: vec![raw("Deep learning", 1, None, None)],
        metadata: None,
    };
    let record = process_annotations(&input, &store(), &config).record.unwrap();
    let files = write_outputs(&record, "Deep Learning_LeCun_2015", &config).unwrap();
    let json_path = files.json.unwrap();
    let before = std::fs::read(&json_path).unwrap();
    std::fs::remove_file(files.csv.unwrap()).unwrap();

    let report = render_from_json(&json_path, &config).unwrap();
    assert_eq!(report.matched_key.as_deref(), Some("lecun2015"));
    assert!(report.files.json.is_none());
    assert!(report.files.csv.as_deref().is_some_and(Path::exists));
    assert_eq!(std::fs::read(&json_path).unwrap(), before);
}

// ── Text handling ────────────────────────────────────────────────────────────

#[test]
fn test_bibtex_name_lists() {
    assert_eq!(normalize_names("Smith, John and Doe, Jane"), vec!["John Smith", "Jane Doe"]);
    assert_eq!(normalize_names("Ada Lovelace and others"), vec!["Ada Lovelace"]);
}

#[test]
fn test_sanitize_is_idempotent() {
    for s in [
        "  line one\nline two\t\u{00ad}end ",
        "ﬁrst ﬂoor\r\n",
        "\u{200b}zero\u{feff}width",
        "&am-\np;",
        "&#17-\n3;",
        "",
    ] {
        let once = sanitize(s);
        assert_eq!(sanitize(&once), once, "input {s:?}");
        assert!(!once.contains('\n'));
    }
}

#[test]
fn test_store_reports_skipped_entries() {
    let text = format!("{LIBRARY}\n@misc{{untitled2020,\n  author = {{Roe, Richard}},\n  year = {{2020}}\n}}\n");
    let store = BibStore::parse(&text).unwrap();
    assert_eq!(store.len(), 3);
    assert_eq!(store.skipped().len(), 1);
    assert!(store.lookup("untitled2020").is_none());
}
