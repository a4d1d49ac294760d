//! End-to-end exports through `Exporter` with in-memory hosts.

use base64::Engine;
use chrono::NaiveDate;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use pretty_assertions::assert_eq;
use review_export::dispatch::{FIX_REQUIRED_MESSAGE, GENERIC_FAILURE_MESSAGE};
use review_export::fallback::{RawTextStrategy, StrategyInput};
use review_export::model::mime;
use review_export::{
    get_page_count, Artifact, ExportConfig, ExportError, ExportFormat, ExportOutcome,
    ExportRequest, ExportStrategy, Exporter, FallbackChain, FixedClock, Issue, IssuePosition,
    MemoryDownloader, MemoryNotifier, MemoryStage, Route, Severity,
};
use std::io::{Cursor, Read};

// ============================================================
// Fixtures
// ============================================================

fn clock() -> FixedClock {
    FixedClock(
        NaiveDate::from_ymd_opt(2024, 11, 5)
            .unwrap()
            .and_hms_opt(16, 45, 0)
            .unwrap(),
    )
}

/// Two-page Letter PDF with a line of text on each page.
fn sample_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Times-Roman",
    });

    let mut kids = Vec::new();
    for i in 0..2 {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                Operation::new("Td", vec![Object::Integer(72), Object::Integer(700)]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("Chapter {}", i + 1))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
        });
        kids.push(Object::Reference(page_id));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => 2,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn positioned_fix(location: &str) -> Issue {
    let mut issue = Issue::new("Spelling", Severity::Minor, "receive");
    issue.is_fixed = true;
    issue.location = Some(location.to_string());
    issue.position = Some(IssuePosition {
        left: 10.0,
        top: 20.0,
        width: 30.0,
        height: 5.0,
    });
    issue
}

struct Failing;

impl ExportStrategy for Failing {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn produce(&self, _input: &StrategyInput<'_>) -> Result<Artifact, ExportError> {
        Err(ExportError::Render("report synthesis failed".into()))
    }
}

// ============================================================
// PDF Overlay
// ============================================================

#[test]
fn annotated_pdf_is_delivered_with_dated_name() {
    let downloader = MemoryDownloader::new();
    let notifier = MemoryNotifier::new();
    let exporter = Exporter::new(&downloader, &notifier).with_clock(clock());

    let mut request = ExportRequest::new("Lab Report.pdf", ExportFormat::Original);
    request.original_base64 = format!(
        "data:application/pdf;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(sample_pdf())
    );
    request.issues = vec![positioned_fix("Page 2"), {
        let mut open = positioned_fix("Page 1");
        open.is_fixed = false;
        open
    }];

    let outcome = exporter.export(&request);
    assert_eq!(
        outcome,
        ExportOutcome::Delivered {
            route: Route::PdfOverlay,
            file_name: "Corrected_Lab Report_20241105.pdf".to_string(),
        }
    );
    assert!(notifier.alerts().is_empty());

    let delivered = downloader.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].mime_type, mime::PDF);
    assert_eq!(get_page_count(&delivered[0].bytes).unwrap(), 2);
}

// ============================================================
// Precondition Gate
// ============================================================

#[test]
fn nothing_fixed_means_no_download_and_one_alert() {
    let downloader = MemoryDownloader::new();
    let notifier = MemoryNotifier::new();
    let exporter = Exporter::new(&downloader, &notifier).with_clock(clock());

    let mut request = ExportRequest::new("scan.pdf", ExportFormat::Pdf);
    request.original_base64 = base64::engine::general_purpose::STANDARD.encode(sample_pdf());
    request.issues = vec![Issue::new("Grammar", Severity::Critical, "unused")];

    let outcome = exporter.export(&request);
    assert!(matches!(outcome, ExportOutcome::Rejected { .. }));
    assert_eq!(downloader.count(), 0);
    assert_eq!(notifier.alerts(), vec![FIX_REQUIRED_MESSAGE.to_string()]);
}

// ============================================================
// HTML-based Renderers
// ============================================================

#[test]
fn docx_export_uses_strict_name() {
    let downloader = MemoryDownloader::new();
    let notifier = MemoryNotifier::new();
    let exporter = Exporter::new(&downloader, &notifier).with_clock(clock());

    let mut request = ExportRequest::new("Report Final.docx", ExportFormat::Docx);
    request.edited_content = Some("<h1>Results</h1><p>All good.</p>".into());

    let outcome = exporter.export(&request);
    assert_eq!(outcome.file_name(), Some("Corrected_Report Final.docx"));

    let delivered = downloader.delivered();
    assert_eq!(delivered[0].mime_type, mime::DOCX);

    let mut archive = zip::ZipArchive::new(Cursor::new(delivered[0].bytes.as_slice())).unwrap();
    let mut document = String::new();
    archive
        .by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut document)
        .unwrap();
    assert!(document.contains("Results"));
    assert!(document.contains("All good."));
}

#[test]
fn plain_html_keeps_full_original_name() {
    let downloader = MemoryDownloader::new();
    let notifier = MemoryNotifier::new();
    let exporter = Exporter::new(&downloader, &notifier).with_clock(clock());

    let mut request = ExportRequest::new("essay.docx", ExportFormat::Html);
    request.edited_content = Some("<p>Edited</p>".into());

    let outcome = exporter.export(&request);
    assert_eq!(outcome.file_name(), Some("Corrected_essay.docx.html"));
    assert_eq!(downloader.delivered()[0].bytes, b"<p>Edited</p>");
}

#[test]
fn html_to_pdf_releases_stage_on_success() {
    let downloader = MemoryDownloader::new();
    let notifier = MemoryNotifier::new();
    let stage = MemoryStage::instant();
    let exporter = Exporter::new(&downloader, &notifier)
        .with_clock(clock())
        .with_stage(&stage);

    let mut request = ExportRequest::new("thesis.docx", ExportFormat::Pdf);
    request.edited_content = Some("<h1>Chapter</h1><p>Text</p><img src=\"gone.png\">".into());

    let outcome = exporter.export(&request);
    assert_eq!(
        outcome,
        ExportOutcome::Delivered {
            route: Route::HtmlToPdf,
            file_name: "Corrected_thesis_20241105.pdf".to_string(),
        }
    );
    assert_eq!(stage.mounted_count(), 0);
    assert_eq!(get_page_count(&downloader.delivered()[0].bytes).unwrap(), 1);
}

#[test]
fn html_to_pdf_releases_stage_on_failure() {
    let downloader = MemoryDownloader::new();
    let notifier = MemoryNotifier::new();
    let stage = MemoryStage::instant();
    let mut config = ExportConfig::default();
    config.page.margin = 500.0;
    let exporter = Exporter::new(&downloader, &notifier)
        .with_clock(clock())
        .with_stage(&stage)
        .with_config(config);

    let mut request = ExportRequest::new("thesis.docx", ExportFormat::Pdf);
    request.edited_content = Some("<p>Text</p>".into());

    let outcome = exporter.export(&request);
    assert!(matches!(outcome, ExportOutcome::Failed { .. }));
    assert_eq!(stage.mounted_count(), 0);
    assert_eq!(downloader.count(), 0);

    let alerts = notifier.alerts();
    assert_eq!(alerts.len(), 2);
    assert!(alerts[0].contains("Original Format or HTML"));
    assert_eq!(alerts[1], GENERIC_FAILURE_MESSAGE);
    assert!(!exporter.is_busy());
}

// ============================================================
// Word Report and Fallback
// ============================================================

#[test]
fn word_original_gets_report() {
    let downloader = MemoryDownloader::new();
    let notifier = MemoryNotifier::new();
    let exporter = Exporter::new(&downloader, &notifier).with_clock(clock());

    let mut request = ExportRequest::new("essay.docx", ExportFormat::Original);
    let mut fixed = Issue::new("Citation", Severity::Major, "Add page number");
    fixed.is_fixed = true;
    request.issues = vec![fixed, Issue::new("Tone", Severity::Minor, "HIDDEN")];

    let outcome = exporter.export(&request);
    assert_eq!(
        outcome,
        ExportOutcome::Delivered {
            route: Route::WordReport,
            file_name: "Corrected_essay_20241105.html".to_string(),
        }
    );
    let delivered = downloader.delivered();
    assert_eq!(delivered[0].mime_type, mime::WORD_HTML);
    let html = String::from_utf8(delivered[0].bytes.clone()).unwrap();
    assert!(html.contains("Add page number"));
    assert!(!html.contains("HIDDEN"));
    assert!(html.contains("<strong>1</strong> of <strong>2</strong>"));
}

#[test]
fn failing_report_degrades_to_text() {
    let downloader = MemoryDownloader::new();
    let notifier = MemoryNotifier::new();
    let exporter = Exporter::new(&downloader, &notifier)
        .with_clock(clock())
        .with_report_chain(FallbackChain::new().then(Failing).then(RawTextStrategy));

    let mut request = ExportRequest::new("essay.docx", ExportFormat::Original);
    request.edited_content = Some("<p>Edited body</p>".into());

    let outcome = exporter.export(&request);
    assert_eq!(
        outcome,
        ExportOutcome::Degraded {
            file_name: "Corrected_essay.txt".to_string(),
        }
    );
    let delivered = downloader.delivered();
    assert_eq!(delivered[0].mime_type, mime::TEXT);
    assert_eq!(delivered[0].bytes, b"<p>Edited body</p>");
    assert!(notifier.alerts().is_empty());
}

// ============================================================
// Request Parsing
// ============================================================

#[test]
fn camel_case_request_round_trips_through_exporter() {
    let json = r#"{
        "originalBase64": "",
        "fileName": "notes.odt",
        "mimeType": "application/vnd.oasis.opendocument.text",
        "analysisId": "an-42",
        "issues": [
            {"type": "Grammar", "severity": "Recommended", "suggestion": "its", "isFixed": true},
            {"type": "Style", "severity": "cosmetic", "suggestion": "x"}
        ],
        "format": "original"
    }"#;
    let request = ExportRequest::from_json(json).unwrap();
    assert_eq!(request.issues[0].severity, Severity::Major);
    assert_eq!(request.issues[1].severity, Severity::Minor);
    assert!(!request.issues[1].is_fixed);
    assert_eq!(request.analysis_id.as_deref(), Some("an-42"));

    let downloader = MemoryDownloader::new();
    let notifier = MemoryNotifier::new();
    let exporter = Exporter::new(&downloader, &notifier).with_clock(clock());
    let outcome = exporter.export(&request);
    assert_eq!(outcome.file_name(), Some("Corrected_notes_20241105.html"));
}

#[test]
fn malformed_request_json_is_a_validation_error() {
    assert!(matches!(
        ExportRequest::from_json("{\"fileName\": 3}"),
        Err(ExportError::Validation(_))
    ));
}
