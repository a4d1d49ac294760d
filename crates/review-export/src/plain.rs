//! Untransformed HTML and plain-text exports

use crate::html::to_plain_text;
use crate::model::{mime, Artifact};
use crate::naming::FileNamer;
use chrono::NaiveDate;

/// Body used when a text export has nothing to carry.
pub const NO_CONTENT: &str = "No content available";

const SEPARATOR_WIDTH: usize = 60;

/// The edited HTML exactly as the editor produced it.
pub fn raw_html_artifact(html: &str, file_name: &str, namer: &FileNamer) -> Artifact {
    Artifact::new(html.as_bytes().to_vec(), namer.raw_html(file_name), mime::HTML)
}

/// The edited content (or [`NO_CONTENT`]) as a `.txt` download, unchanged.
pub fn raw_text_artifact(content: Option<&str>, file_name: &str, namer: &FileNamer) -> Artifact {
    let body = content.filter(|c| !c.trim().is_empty()).unwrap_or(NO_CONTENT);
    Artifact::new(body.as_bytes().to_vec(), namer.undated(file_name, "txt"), mime::TEXT)
}

/// Readable text dump of the edited content behind a short banner.
pub fn export_as_text(file_name: &str, content: Option<&str>, generated: NaiveDate) -> String {
    let separator = "=".repeat(SEPARATOR_WIDTH);
    let body = match content.filter(|c| !c.trim().is_empty()) {
        Some(html) => to_plain_text(html),
        None => NO_CONTENT.to_string(),
    };
    format!(
        "CORRECTED DOCUMENT\nFile: {}\nGenerated: {}\n{}\n\n{}\n",
        file_name,
        generated.format("%Y-%m-%d"),
        separator,
        body.trim_end()
    )
}
