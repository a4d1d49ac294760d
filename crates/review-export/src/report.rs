//! Word-compatible HTML correction report
//!
//! A standalone HTML document that Word opens directly (served as
//! `application/msword`). It lists every accepted correction followed by the
//! edited document body.

use crate::html::escape_html;
use crate::model::{fixed_issues, Issue};
use chrono::NaiveDateTime;
use std::fmt::Write;

const REPORT_STYLES: &str = "\
body{font-family:'Times New Roman',serif;font-size:12pt;color:#111;margin:1in}\
.header{border-bottom:2px solid #1e3a8a;padding-bottom:8pt;margin-bottom:16pt}\
.header h1{font-size:20pt;color:#1e3a8a;margin:0 0 4pt 0}\
.header p{margin:2pt 0;color:#444}\
.summary{background:#f1f5f9;border:1px solid #cbd5e1;padding:8pt;margin-bottom:16pt}\
.issue{border:1px solid #e2e8f0;padding:8pt;margin-bottom:8pt}\
.badge{display:inline-block;color:#fff;font-size:9pt;padding:1pt 6pt;margin-right:4pt}\
.badge-type{background:#475569}\
.original{text-decoration:line-through;color:#b91c1c}\
.corrected{font-weight:bold;color:#15803d}\
.meta{color:#555;font-size:10pt}\
.placeholder{color:#777;font-style:italic}\
.content{margin-top:24pt}";

/// Text shown in place of the document body when there is no edited content.
pub const CONTENT_PLACEHOLDER: &str = "No edited content available.";

pub struct ReportInput<'a> {
    pub file_name: &'a str,
    pub issues: &'a [Issue],
    pub edited_content: Option<&'a str>,
    pub generated: NaiveDateTime,
}

/// Build the report document.
///
/// Everything interpolated is escaped except `edited_content`, which is
/// already HTML and is embedded unchanged.
pub fn build_report(input: &ReportInput<'_>) -> String {
    let file_name = escape_html(input.file_name);
    let fixed: Vec<&Issue> = fixed_issues(input.issues).collect();

    let mut html = String::with_capacity(4096 + input.edited_content.map_or(0, str::len));
    html.push_str("<!DOCTYPE html>\n");
    html.push_str(
        "<html xmlns:o=\"urn:schemas-microsoft-com:office:office\" \
         xmlns:w=\"urn:schemas-microsoft-com:office:word\" \
         xmlns=\"http://www.w3.org/TR/REC-html40\">\n",
    );
    html.push_str("<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>Corrected - {}</title>", file_name);
    html.push_str(
        "<!--[if gte mso 9]><xml><w:WordDocument><w:View>Print</w:View>\
         <w:Zoom>100</w:Zoom></w:WordDocument></xml><![endif]-->\n",
    );
    let _ = writeln!(html, "<style>{}</style>", REPORT_STYLES);
    html.push_str("</head>\n<body>\n");

    html.push_str("<div class=\"header\">\n<h1>Corrected Document</h1>\n");
    let _ = writeln!(html, "<p><strong>File:</strong> {}</p>", file_name);
    let _ = writeln!(
        html,
        "<p><strong>Exported:</strong> {}</p>",
        input.generated.format("%Y-%m-%d %H:%M")
    );
    html.push_str("</div>\n");

    let _ = writeln!(
        html,
        "<div class=\"summary\"><strong>{}</strong> of <strong>{}</strong> issues corrected</div>",
        fixed.len(),
        input.issues.len()
    );

    html.push_str("<div class=\"corrections\">\n<h2>Corrections Applied</h2>\n");
    if fixed.is_empty() {
        html.push_str("<p class=\"placeholder\">No corrections were applied.</p>\n");
    }
    for (i, issue) in fixed.iter().enumerate() {
        write_issue(&mut html, i + 1, issue);
    }
    html.push_str("</div>\n");

    html.push_str("<div class=\"content\">\n<h2>Document Content</h2>\n");
    match input.edited_content.filter(|c| !c.trim().is_empty()) {
        Some(content) => {
            html.push_str(content);
            html.push('\n');
        }
        None => {
            let _ = writeln!(html, "<p class=\"placeholder\">{}</p>", CONTENT_PLACEHOLDER);
        }
    }
    html.push_str("</div>\n</body>\n</html>\n");
    html
}

fn write_issue(html: &mut String, number: usize, issue: &Issue) {
    html.push_str("<div class=\"issue\">\n");
    let _ = write!(
        html,
        "<p><strong>{}.</strong> <span class=\"badge\" style=\"background:{}\">{}</span>",
        number,
        issue.severity.badge_color(),
        issue.severity.label()
    );
    if !issue.issue_type.is_empty() {
        let _ = write!(
            html,
            "<span class=\"badge badge-type\">{}</span>",
            escape_html(&issue.issue_type)
        );
    }
    html.push_str("</p>\n");

    match (&issue.original_text, &issue.corrected_text) {
        (Some(original), Some(corrected)) => {
            let _ = writeln!(
                html,
                "<p><span class=\"original\"><del>{}</del></span> &rarr; <span class=\"corrected\"><strong>{}</strong></span></p>",
                escape_html(original),
                escape_html(corrected)
            );
        }
        (Some(original), None) => {
            let _ = writeln!(
                html,
                "<p><span class=\"original\"><del>{}</del></span></p>",
                escape_html(original)
            );
        }
        (None, Some(corrected)) => {
            let _ = writeln!(
                html,
                "<p><span class=\"corrected\"><strong>{}</strong></span></p>",
                escape_html(corrected)
            );
        }
        (None, None) => {}
    }

    if !issue.description.is_empty() {
        let _ = writeln!(html, "<p>{}</p>", escape_html(&issue.description));
    }
    if !issue.suggestion.is_empty() {
        let _ = writeln!(
            html,
            "<p class=\"meta\"><strong>Suggestion:</strong> {}</p>",
            escape_html(&issue.suggestion)
        );
    }
    if let Some(location) = issue.location.as_deref().filter(|l| !l.is_empty()) {
        let _ = writeln!(
            html,
            "<p class=\"meta\"><strong>Location:</strong> {}</p>",
            escape_html(location)
        );
    }
    html.push_str("</div>\n");
}
