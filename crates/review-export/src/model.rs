//! Issue and export request data model
//!
//! Mirrors the JSON the analysis backend returns (camelCase field names).

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// How serious a detected issue is.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Critical,
    /// Also reported as "Recommended"
    Major,
    /// Also reported as "Cosmetic"
    Minor,
}

impl Severity {
    /// Parse a backend severity label. Unknown labels are treated as minor.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "critical" | "error" | "high" => Severity::Critical,
            "major" | "recommended" | "warning" | "medium" => Severity::Major,
            _ => Severity::Minor,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::Major => "Major",
            Severity::Minor => "Minor",
        }
    }

    /// Badge colour used in the Word-compatible report.
    pub fn badge_color(&self) -> &'static str {
        match self {
            Severity::Critical => "#dc2626",
            Severity::Major => "#d97706",
            Severity::Minor => "#2563eb",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Minor
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Severity::parse(&label))
    }
}

/// Bounding box in percent of the rendered page, origin top-left.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IssuePosition {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// A single detected problem in a document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[serde(rename = "type", default)]
    pub issue_type: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub suggestion: String,
    #[serde(default)]
    pub original_text: Option<String>,
    #[serde(default)]
    pub corrected_text: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub position: Option<IssuePosition>,
    #[serde(default)]
    pub is_fixed: bool,
}

impl Issue {
    pub fn new(issue_type: &str, severity: Severity, suggestion: &str) -> Self {
        Self {
            issue_type: issue_type.to_string(),
            severity,
            description: String::new(),
            suggestion: suggestion.to_string(),
            original_text: None,
            corrected_text: None,
            location: None,
            position: None,
            is_fixed: false,
        }
    }

    /// 1-based page number: the first run of digits in `location`.
    pub fn page_number(&self) -> Option<u32> {
        let location = self.location.as_deref()?;
        let digits: String = location
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }
}

/// Issues the user accepted, in detection order.
pub fn fixed_issues(issues: &[Issue]) -> impl Iterator<Item = &Issue> {
    issues.iter().filter(|issue| issue.is_fixed)
}

/// Requested output format. A hint: the dispatcher decides the actual output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Original,
    Html,
    Pdf,
    Docx,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [
        ExportFormat::Original,
        ExportFormat::Html,
        ExportFormat::Pdf,
        ExportFormat::Docx,
    ];
}

/// Classification of the original upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Word,
    Pdf,
    Other,
}

impl FileKind {
    pub const ALL: [FileKind; 3] = [FileKind::Word, FileKind::Pdf, FileKind::Other];

    /// Classify by extension first, then by MIME type.
    pub fn classify(file_name: &str, mime_type: Option<&str>) -> Self {
        let lower = file_name.to_lowercase();
        let ext = lower.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
        match ext {
            "doc" | "docx" | "odt" | "rtf" => return FileKind::Word,
            "pdf" => return FileKind::Pdf,
            _ => {}
        }

        let mime = mime_type.unwrap_or("").to_lowercase();
        if mime == "application/pdf" {
            FileKind::Pdf
        } else if mime.contains("word")
            || mime.contains("officedocument")
            || mime.contains("opendocument.text")
        {
            FileKind::Word
        } else {
            FileKind::Other
        }
    }
}

/// Everything needed for a single export. Built on an "Export" click, consumed
/// immediately, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    #[serde(default)]
    pub original_base64: String,
    pub file_name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub analysis_id: Option<String>,
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub edited_content: Option<String>,
    #[serde(default)]
    pub format: ExportFormat,
}

impl ExportRequest {
    pub fn new(file_name: &str, format: ExportFormat) -> Self {
        Self {
            file_name: file_name.to_string(),
            format,
            ..Default::default()
        }
    }

    /// Parse the camelCase request JSON sent by the review UI.
    pub fn from_json(json: &str) -> Result<Self, crate::error::ExportError> {
        serde_json::from_str(json).map_err(|e| {
            crate::error::ExportError::Validation(format!("Invalid export request: {}", e))
        })
    }

    pub fn file_kind(&self) -> FileKind {
        FileKind::classify(&self.file_name, self.mime_type.as_deref())
    }

    /// Edited content, treating whitespace-only strings as absent.
    pub fn edited(&self) -> Option<&str> {
        self.edited_content
            .as_deref()
            .filter(|content| !content.trim().is_empty())
    }

    pub fn fixed_count(&self) -> usize {
        fixed_issues(&self.issues).count()
    }
}

/// A finished file ready to hand to a `Downloader`.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: &'static str,
}

impl Artifact {
    pub fn new(bytes: Vec<u8>, file_name: String, mime_type: &'static str) -> Self {
        Self {
            bytes,
            file_name,
            mime_type,
        }
    }
}

pub mod mime {
    pub const PDF: &str = "application/pdf";
    pub const HTML: &str = "text/html";
    pub const WORD_HTML: &str = "application/msword";
    pub const DOCX: &str =
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
    pub const TEXT: &str = "text/plain";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_aliases() {
        assert_eq!(Severity::parse("Critical"), Severity::Critical);
        assert_eq!(Severity::parse("recommended"), Severity::Major);
        assert_eq!(Severity::parse("MAJOR"), Severity::Major);
        assert_eq!(Severity::parse("cosmetic"), Severity::Minor);
        assert_eq!(Severity::parse("whatever"), Severity::Minor);
    }

    #[test]
    fn test_issue_deserializes_camel_case() {
        let json = r#"{
            "type": "Grammar",
            "severity": "Recommended",
            "description": "Subject-verb agreement",
            "suggestion": "They were",
            "originalText": "They was",
            "location": "Page 2",
            "position": {"left": 10, "top": 20, "width": 30, "height": 5},
            "isFixed": true
        }"#;
        let issue: Issue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.issue_type, "Grammar");
        assert_eq!(issue.severity, Severity::Major);
        assert_eq!(issue.original_text.as_deref(), Some("They was"));
        assert!(issue.is_fixed);
        assert_eq!(issue.page_number(), Some(2));
    }

    #[test]
    fn test_is_fixed_defaults_to_false() {
        let issue: Issue = serde_json::from_str(r#"{"type":"Margin"}"#).unwrap();
        assert!(!issue.is_fixed);
        assert!(issue.position.is_none());
    }

    #[test]
    fn test_page_number_takes_first_integer() {
        let mut issue = Issue::new("Margin", Severity::Minor, "");
        issue.location = Some("Page 12, line 4".into());
        assert_eq!(issue.page_number(), Some(12));
        issue.location = Some("Introduction".into());
        assert_eq!(issue.page_number(), None);
        issue.location = None;
        assert_eq!(issue.page_number(), None);
    }

    #[test]
    fn test_file_kind_classification() {
        assert_eq!(FileKind::classify("thesis.DOCX", None), FileKind::Word);
        assert_eq!(FileKind::classify("thesis.pdf", None), FileKind::Pdf);
        assert_eq!(
            FileKind::classify("upload", Some("application/pdf")),
            FileKind::Pdf
        );
        assert_eq!(
            FileKind::classify("upload", Some("application/msword")),
            FileKind::Word
        );
        assert_eq!(FileKind::classify("notes.txt", Some("text/plain")), FileKind::Other);
    }

    #[test]
    fn test_request_format_deserializes_lowercase() {
        let json = r#"{"fileName":"a.pdf","format":"docx","editedContent":"  "}"#;
        let req: ExportRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.format, ExportFormat::Docx);
        assert!(req.edited().is_none());
    }
}
