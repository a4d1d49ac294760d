//! Annotate the original PDF in place
//!
//! Each accepted issue that carries a page box is painted over with white,
//! its suggestion written into the box, and the box outlined in green so a
//! reader can tell which regions were machine-corrected.

use crate::config::OverlayConfig;
use crate::coords::{media_box_size, percent_to_pdf, PdfRect};
use crate::error::ExportError;
use crate::fonts::{encode_win_ansi, font_dictionary};
use crate::model::{fixed_issues, Issue, IssuePosition};
use chrono::NaiveDate;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeMap;

/// Font resource name registered on every touched page.
const OVERLAY_FONT: &str = "FCorr";

/// US Letter, used when no MediaBox is found anywhere in the page tree.
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Parent chain depth limit when looking up inherited page attributes.
const MAX_TREE_DEPTH: usize = 32;

#[derive(Debug, Clone)]
pub struct AnnotatedPdf {
    pub bytes: Vec<u8>,
    /// Number of corrections drawn onto the document
    pub applied: usize,
}

/// Overlay every fixed, positioned issue onto the original PDF.
///
/// If no issue qualifies the original bytes are returned untouched.
pub fn annotate_pdf(
    pdf_bytes: &[u8],
    issues: &[Issue],
    config: &OverlayConfig,
    generated: NaiveDate,
) -> Result<AnnotatedPdf, ExportError> {
    let drawable: Vec<(&Issue, &IssuePosition)> = fixed_issues(issues)
        .filter_map(|issue| issue.position.as_ref().map(|pos| (issue, pos)))
        .collect();

    if drawable.is_empty() {
        tracing::info!("no positioned corrections, returning original PDF");
        return Ok(AnnotatedPdf {
            bytes: pdf_bytes.to_vec(),
            applied: 0,
        });
    }

    let mut doc = Document::load_mem(pdf_bytes)?;
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if pages.is_empty() {
        return Err(ExportError::Parse("document has no pages".into()));
    }

    let mut page_ops: BTreeMap<usize, Vec<Operation>> = BTreeMap::new();
    for (issue, position) in &drawable {
        let index = target_page_index(issue, pages.len());
        let (width, height) = media_box_size(page_media_box(&doc, pages[index]));
        let rect = percent_to_pdf(position, width, height);
        tracing::debug!(
            page = index,
            x = rect.x,
            y = rect.y,
            w = rect.width,
            h = rect.height,
            "drawing correction"
        );
        page_ops
            .entry(index)
            .or_default()
            .extend(correction_operations(&rect, &issue.suggestion, config));
    }

    let applied = drawable.len();
    if config.footnote {
        let last = pages.len() - 1;
        page_ops
            .entry(last)
            .or_default()
            .extend(footnote_operations(applied, generated));
    }

    let font_id = doc.add_object(Object::Dictionary(font_dictionary("Helvetica")));
    for (index, operations) in page_ops {
        let page_id = pages[index];
        add_font_resource(&mut doc, page_id, font_id)?;
        append_page_content(&mut doc, page_id, operations)?;
    }

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| ExportError::Render(format!("Save failed: {}", e)))?;

    tracing::info!(applied, pages = pages.len(), "annotated original PDF");
    Ok(AnnotatedPdf {
        bytes: output,
        applied,
    })
}

/// 0-based page for an issue. Missing, zero or out-of-range page numbers
/// land on the first page.
pub fn target_page_index(issue: &Issue, page_count: usize) -> usize {
    match issue.page_number() {
        None => 0,
        Some(n) if n >= 1 && (n as usize) <= page_count => n as usize - 1,
        Some(n) => {
            tracing::warn!(
                page = n,
                page_count,
                location = issue.location.as_deref().unwrap_or(""),
                "page number out of range, drawing correction on first page"
            );
            0
        }
    }
}

fn correction_operations(rect: &PdfRect, suggestion: &str, config: &OverlayConfig) -> Vec<Operation> {
    let font_size = (rect.height * config.font_size_ratio).max(config.min_font_size);
    let [r, g, b] = config.border_color;

    vec![
        Operation::new("q", vec![]),
        // White cover
        Operation::new("rg", vec![real(1.0), real(1.0), real(1.0)]),
        Operation::new("re", rect_operands(rect)),
        Operation::new("f", vec![]),
        // Suggestion text
        Operation::new("BT", vec![]),
        Operation::new("rg", vec![real(0.0), real(0.0), real(0.0)]),
        Operation::new("Tf", vec![Object::Name(OVERLAY_FONT.as_bytes().to_vec()), real(font_size)]),
        Operation::new(
            "Td",
            vec![real(rect.x + config.text_inset), real(rect.y + rect.height / 4.0)],
        ),
        Operation::new("Tj", vec![pdf_string(suggestion)]),
        Operation::new("ET", vec![]),
        // Green marker border
        Operation::new("RG", vec![real(r), real(g), real(b)]),
        Operation::new("w", vec![real(config.border_width)]),
        Operation::new("re", rect_operands(rect)),
        Operation::new("S", vec![]),
        Operation::new("Q", vec![]),
    ]
}

fn footnote_operations(applied: usize, generated: NaiveDate) -> Vec<Operation> {
    let plural = if applied == 1 { "" } else { "s" };
    let text = format!(
        "{} correction{} applied \u{b7} Generated {}",
        applied,
        plural,
        generated.format("%Y-%m-%d")
    );
    vec![
        Operation::new("q", vec![]),
        Operation::new("BT", vec![]),
        Operation::new("rg", vec![real(0.5), real(0.5), real(0.5)]),
        Operation::new("Tf", vec![Object::Name(OVERLAY_FONT.as_bytes().to_vec()), real(7.0)]),
        Operation::new("Td", vec![real(20.0), real(12.0)]),
        Operation::new("Tj", vec![pdf_string(&text)]),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]
}

fn rect_operands(rect: &PdfRect) -> Vec<Object> {
    vec![
        real(rect.x),
        real(rect.y),
        real(rect.width),
        real(rect.height),
    ]
}

pub(crate) fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

pub(crate) fn pdf_string(text: &str) -> Object {
    Object::String(encode_win_ansi(text), lopdf::StringFormat::Literal)
}

pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(v) => Some(*v as f64),
        Object::Real(v) => Some(*v as f64),
        _ => None,
    }
}

/// Look up a page attribute, following /Parent for inheritable keys.
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

fn resolve(doc: &Document, obj: Object) -> Object {
    match obj {
        Object::Reference(id) => doc.get_object(id).cloned().unwrap_or(Object::Null),
        other => other,
    }
}

fn page_media_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    let Some(Object::Array(items)) =
        inherited_attribute(doc, page_id, b"MediaBox").map(|obj| resolve(doc, obj))
    else {
        return DEFAULT_MEDIA_BOX;
    };
    let values: Vec<f64> = items
        .iter()
        .filter_map(|item| number(&resolve(doc, item.clone())))
        .collect();
    match values.as_slice() {
        [a, b, c, d] => [*a, *b, *c, *d],
        _ => DEFAULT_MEDIA_BOX,
    }
}

/// Give the page its own resource dictionary containing the overlay font.
///
/// Resources shared with other pages are copied rather than modified.
fn add_font_resource(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> Result<(), ExportError> {
    let mut resources = match inherited_attribute(doc, page_id, b"Resources").map(|o| resolve(doc, o)) {
        Some(Object::Dictionary(dict)) => dict,
        _ => Dictionary::new(),
    };
    let mut fonts = match resources.get(b"Font").ok().cloned().map(|o| resolve(doc, o)) {
        Some(Object::Dictionary(dict)) => dict,
        _ => Dictionary::new(),
    };
    fonts.set(OVERLAY_FONT, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Append drawing operations after the existing page content.
///
/// The existing content is wrapped in `q`/`Q` so graphics state it leaves
/// behind cannot skew the overlay.
fn append_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    operations: Vec<Operation>,
) -> Result<(), ExportError> {
    let encoded = Content { operations }
        .encode()
        .map_err(|e| ExportError::Render(e.to_string()))?;

    let existing = doc.get_object(page_id)?.as_dict()?.get(b"Contents").ok().cloned();
    let mut streams = Vec::new();
    match existing {
        Some(Object::Array(items)) => streams.extend(items),
        Some(Object::Reference(id)) => match doc.get_object(id) {
            Ok(Object::Array(items)) => streams.extend(items.iter().cloned()),
            _ => streams.push(Object::Reference(id)),
        },
        _ => {}
    }

    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let mut closing = b"Q\n".to_vec();
    closing.extend_from_slice(&encoded);
    let close_id = doc.add_object(Stream::new(Dictionary::new(), closing));

    let mut contents = vec![Object::Reference(open_id)];
    contents.extend(streams);
    contents.push(Object::Reference(close_id));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Contents", Object::Array(contents));
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::Severity;
    use lopdf::dictionary;

    /// Build a PDF with `num_pages` pages; the MediaBox lives on the page tree
    /// root so pages inherit it.
    pub(crate) fn create_test_pdf(num_pages: u32, media_box: [i64; 4]) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(font_dictionary("Times-Roman"));

        let mut page_ids = Vec::new();
        for i in 0..num_pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                    Operation::new("Td", vec![Object::Integer(100), Object::Integer(700)]),
                    Operation::new(
                        "Tj",
                        vec![Object::String(
                            format!("Original page {}", i + 1).into_bytes(),
                            lopdf::StringFormat::Literal,
                        )],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "Contents" => Object::Reference(content_id),
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => Object::Reference(font_id) },
                },
            });
            page_ids.push(page_id);
        }

        let pages = dictionary! {
            "Type" => "Pages",
            "Count" => num_pages as i64,
            "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
            "MediaBox" => media_box.iter().map(|v| Object::Integer(*v)).collect::<Vec<_>>(),
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn positioned_issue(suggestion: &str, location: Option<&str>, fixed: bool) -> Issue {
        let mut issue = Issue::new("Grammar", Severity::Major, suggestion);
        issue.location = location.map(str::to_string);
        issue.position = Some(IssuePosition {
            left: 10.0,
            top: 20.0,
            width: 30.0,
            height: 5.0,
        });
        issue.is_fixed = fixed;
        issue
    }

    fn page_operations(bytes: &[u8], page_index: usize) -> Vec<Operation> {
        let doc = Document::load_mem(bytes).unwrap();
        let page_id = *doc.get_pages().values().nth(page_index).unwrap();
        Content::decode(&doc.get_page_content(page_id).unwrap())
            .unwrap()
            .operations
    }

    /// Strings shown with `Tj` on a page.
    fn page_text(bytes: &[u8], page_index: usize) -> Vec<String> {
        page_operations(bytes, page_index)
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(s, _)) => Some(String::from_utf8_lossy(s).into_owned()),
                _ => None,
            })
            .collect()
    }

    fn page_rects(bytes: &[u8], page_index: usize) -> Vec<Vec<f64>> {
        page_operations(bytes, page_index)
            .iter()
            .filter(|op| op.operator == "re")
            .map(|op| op.operands.iter().filter_map(number).collect())
            .collect()
    }

    fn shows(texts: &[String], needle: &str) -> bool {
        texts.iter().any(|t| t.contains(needle))
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn test_fixed_issue_is_drawn_with_cover_text_and_border() {
        let pdf = create_test_pdf(1, [0, 0, 600, 800]);
        let issues = vec![positioned_issue("They were", Some("Page 1"), true)];
        let result = annotate_pdf(&pdf, &issues, &OverlayConfig::default(), date()).unwrap();
        assert_eq!(result.applied, 1);

        let texts = page_text(&result.bytes, 0);
        assert!(shows(&texts, "They were"), "texts: {:?}", texts);
        assert!(shows(&texts, "Original page 1"));
        assert!(shows(&texts, "1 correction applied"));

        // Cover and border share the same box
        let rects = page_rects(&result.bytes, 0);
        assert_eq!(rects, vec![vec![60.0, 600.0, 180.0, 40.0]; 2]);
    }

    #[test]
    fn test_unfixed_issues_are_never_drawn() {
        let pdf = create_test_pdf(1, [0, 0, 612, 792]);
        let issues = vec![
            positioned_issue("accepted", None, true),
            positioned_issue("rejected", None, false),
        ];
        let result = annotate_pdf(&pdf, &issues, &OverlayConfig::default(), date()).unwrap();
        assert_eq!(result.applied, 1);
        let texts = page_text(&result.bytes, 0);
        assert!(shows(&texts, "accepted"));
        assert!(!shows(&texts, "rejected"));
        assert_eq!(page_rects(&result.bytes, 0).len(), 2);
    }

    #[test]
    fn test_nothing_drawable_returns_original() {
        let pdf = create_test_pdf(1, [0, 0, 612, 792]);
        let mut unpositioned = positioned_issue("x", None, true);
        unpositioned.position = None;
        let result = annotate_pdf(&pdf, &[unpositioned], &OverlayConfig::default(), date()).unwrap();
        assert_eq!(result.applied, 0);
        assert_eq!(result.bytes, pdf);
    }

    #[test]
    fn test_page_from_location_and_footnote_on_last_page() {
        let pdf = create_test_pdf(3, [0, 0, 612, 792]);
        let issues = vec![positioned_issue("second", Some("Page 2, para 1"), true)];
        let result = annotate_pdf(&pdf, &issues, &OverlayConfig::default(), date()).unwrap();

        assert!(!shows(&page_text(&result.bytes, 0), "second"));
        assert!(shows(&page_text(&result.bytes, 1), "second"));
        assert!(shows(&page_text(&result.bytes, 2), "Generated 2024-05-01"));
    }

    #[test]
    fn test_out_of_range_page_falls_back_to_first() {
        let issue = positioned_issue("x", Some("Page 9"), true);
        assert_eq!(target_page_index(&issue, 3), 0);
        let issue = positioned_issue("x", Some("page 0"), true);
        assert_eq!(target_page_index(&issue, 3), 0);
        let issue = positioned_issue("x", Some("Page 3"), true);
        assert_eq!(target_page_index(&issue, 3), 2);
    }

    #[test]
    fn test_small_boxes_use_minimum_font_size() {
        let rect = PdfRect {
            x: 0.0,
            y: 0.0,
            width: 50.0,
            height: 4.0,
        };
        let ops = correction_operations(&rect, "x", &OverlayConfig::default());
        let tf = ops.iter().find(|op| op.operator == "Tf").unwrap();
        assert_eq!(number(&tf.operands[1]), Some(8.0));
    }

    #[test]
    fn test_footnote_can_be_disabled() {
        let pdf = create_test_pdf(1, [0, 0, 612, 792]);
        let config = OverlayConfig {
            footnote: false,
            ..OverlayConfig::default()
        };
        let issues = vec![positioned_issue("fix", None, true)];
        let result = annotate_pdf(&pdf, &issues, &config, date()).unwrap();
        assert!(!shows(&page_text(&result.bytes, 0), "Generated"));
    }

    #[test]
    fn test_overlay_font_is_registered_alongside_existing_fonts() {
        let pdf = create_test_pdf(1, [0, 0, 612, 792]);
        let issues = vec![positioned_issue("fix", None, true)];
        let result = annotate_pdf(&pdf, &issues, &OverlayConfig::default(), date()).unwrap();

        let doc = Document::load_mem(&result.bytes).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(OVERLAY_FONT.as_bytes()));
    }

    #[test]
    fn test_garbage_input_is_a_parse_error() {
        let issues = vec![positioned_issue("fix", None, true)];
        let err = annotate_pdf(b"not a pdf", &issues, &OverlayConfig::default(), date()).unwrap_err();
        assert!(matches!(err, ExportError::Parse(_)));
    }
}
