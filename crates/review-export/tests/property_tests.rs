//! Property-based tests for routing, naming and geometry
//!
//! Exercises the pure decision functions with proptest.

use chrono::NaiveDate;
use proptest::prelude::*;
use review_export::coords::percent_to_pdf;
use review_export::{
    select_route, ExportFormat, FileKind, FileNamer, IssuePosition, Route, Severity,
};

fn any_format() -> impl Strategy<Value = ExportFormat> {
    prop::sample::select(ExportFormat::ALL.to_vec())
}

fn any_kind() -> impl Strategy<Value = FileKind> {
    prop::sample::select(FileKind::ALL.to_vec())
}

fn any_date() -> impl Strategy<Value = NaiveDate> {
    (2000i32..2100, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // ============================================================
    // Route Selection
    // ============================================================

    #[test]
    fn edited_content_wins_for_explicit_formats(format in any_format(), kind in any_kind()) {
        let route = select_route(format, kind, true);
        let expected = match format {
            ExportFormat::Html => Some(Route::PlainHtml),
            ExportFormat::Pdf => Some(Route::HtmlToPdf),
            ExportFormat::Docx => Some(Route::Docx),
            ExportFormat::Original => None,
        };
        if let Some(expected) = expected {
            prop_assert_eq!(route, expected);
        }
    }

    #[test]
    fn overlay_only_for_unedited_pdf(format in any_format(), kind in any_kind(), edited in any::<bool>()) {
        let route = select_route(format, kind, edited);
        if route == Route::PdfOverlay {
            prop_assert_eq!(kind, FileKind::Pdf);
            prop_assert!(!edited);
            prop_assert!(matches!(format, ExportFormat::Pdf | ExportFormat::Original));
        }
    }

    #[test]
    fn html_based_routes_need_edited_content(format in any_format(), kind in any_kind(), edited in any::<bool>()) {
        let route = select_route(format, kind, edited);
        if matches!(route, Route::PlainHtml | Route::HtmlToPdf | Route::Docx) {
            prop_assert!(edited);
        }
    }

    #[test]
    fn unedited_requests_never_use_html_renderers(format in any_format(), kind in any_kind()) {
        let route = select_route(format, kind, false);
        prop_assert!(matches!(route, Route::WordReport | Route::PdfOverlay));
    }

    #[test]
    fn word_originals_default_to_report(edited in any::<bool>()) {
        prop_assert_eq!(
            select_route(ExportFormat::Original, FileKind::Word, edited),
            Route::WordReport
        );
    }

    // ============================================================
    // File Naming
    // ============================================================

    #[test]
    fn dated_names_drop_original_extension(
        base in "[A-Za-z0-9][A-Za-z0-9 _-]{0,30}",
        original_ext in prop::sample::select(vec!["pdf", "docx", "doc", "odt"]),
        ext in prop::sample::select(vec!["html", "pdf", "txt"]),
        date in any_date(),
    ) {
        let file_name = format!("{}.{}", base, original_ext);
        let name = FileNamer::default().dated(&file_name, date, ext);

        let expected_suffix = format!("_{}.{}", date.format("%Y%m%d"), ext);
        prop_assert!(name.starts_with("Corrected_"));
        prop_assert!(name.ends_with(&expected_suffix));
        let stem = name.strip_suffix(&expected_suffix).unwrap();
        let original_with_dot = format!(".{}", original_ext);
        prop_assert!(!stem.ends_with(&original_with_dot));
    }

    #[test]
    fn docx_names_keep_only_safe_characters(base in "\\PC{1,40}") {
        let name = FileNamer::default().docx(&format!("{}.docx", base));
        let stem = name
            .strip_prefix("Corrected_")
            .and_then(|n| n.strip_suffix(".docx"))
            .unwrap();
        prop_assert!(!stem.is_empty());
        prop_assert!(stem.chars().all(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_')));
    }

    #[test]
    fn names_never_contain_path_separators(name in "\\PC{0,60}", date in any_date()) {
        let namer = FileNamer::default();
        for produced in [
            namer.dated(&name, date, "pdf"),
            namer.undated(&name, "txt"),
            namer.raw_html(&name),
            namer.docx(&name),
        ] {
            prop_assert!(!produced.contains('/'));
            prop_assert!(!produced.contains('\\'));
        }
    }

    // ============================================================
    // Page Geometry
    // ============================================================

    #[test]
    fn percent_boxes_stay_on_page(
        left in 0.0f64..100.0,
        top in 0.0f64..100.0,
        width_frac in 0.0f64..1.0,
        height_frac in 0.0f64..1.0,
        page_w in 100.0f64..2000.0,
        page_h in 100.0f64..2000.0,
    ) {
        let position = IssuePosition {
            left,
            top,
            width: (100.0 - left) * width_frac,
            height: (100.0 - top) * height_frac,
        };
        let rect = percent_to_pdf(&position, page_w, page_h);
        prop_assert!(rect.x >= 0.0 && rect.x + rect.width <= page_w + 1e-6);
        prop_assert!(rect.y >= -1e-6 && rect.y + rect.height <= page_h + 1e-6);
    }

    // ============================================================
    // Severity Labels
    // ============================================================

    #[test]
    fn severity_parsing_ignores_case(label in prop::sample::select(vec![
        "critical", "major", "recommended", "minor", "cosmetic",
    ]), upper in any::<bool>()) {
        let input = if upper { label.to_uppercase() } else { label.to_string() };
        let expected = match label {
            "critical" => Severity::Critical,
            "major" | "recommended" => Severity::Major,
            _ => Severity::Minor,
        };
        prop_assert_eq!(Severity::parse(&input), expected);
    }
}

#[test]
fn coordinate_example_matches_reference_values() {
    let rect = percent_to_pdf(
        &IssuePosition {
            left: 10.0,
            top: 20.0,
            width: 30.0,
            height: 5.0,
        },
        600.0,
        800.0,
    );
    assert!((rect.x - 60.0).abs() < 1e-9);
    assert!((rect.y - 600.0).abs() < 1e-9);
    assert!((rect.width - 180.0).abs() < 1e-9);
    assert!((rect.height - 40.0).abs() < 1e-9);
}
