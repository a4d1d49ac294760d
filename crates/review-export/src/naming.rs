//! Download file names
//!
//! `<prefix>_<basename>[_<YYYYMMDD>].<ext>`, where the basename is the
//! original file name without its extension.

use chrono::NaiveDate;

/// Replace characters that are unsafe in a download name.
///
/// Path separators and reserved characters become `_`, control characters
/// are dropped, surrounding whitespace and dots are trimmed.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .filter_map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => Some('_'),
            '\0'..='\x1f' | '\x7f' => None,
            c => Some(c),
        })
        .collect();

    let trimmed = sanitized.trim().trim_matches('.');

    // Keep well under the common 255 byte filesystem limit, on a char boundary
    let limited = match trimmed.char_indices().nth(200) {
        Some((end_idx, _)) => &trimmed[..end_idx],
        None => trimmed,
    };

    if limited.is_empty() {
        "document".to_string()
    } else {
        limited.to_string()
    }
}

/// File name without its final extension. Dotfiles keep their name.
pub fn basename(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    }
}

/// Stricter form used for DOCX output: only alphanumerics, space, `-`, `_`.
pub fn strict_basename(file_name: &str) -> String {
    let base: String = basename(file_name)
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let base = base.trim();
    if base.is_empty() {
        "document".to_string()
    } else {
        base.to_string()
    }
}

/// Builds download names with a fixed prefix.
#[derive(Debug, Clone)]
pub struct FileNamer {
    prefix: String,
}

impl FileNamer {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    /// `Corrected_<basename>_<YYYYMMDD>.<ext>`
    pub fn dated(&self, file_name: &str, date: NaiveDate, ext: &str) -> String {
        format!(
            "{}_{}_{}.{}",
            self.prefix,
            sanitize_filename(basename(file_name)),
            date.format("%Y%m%d"),
            ext
        )
    }

    /// `Corrected_<basename>.<ext>`
    pub fn undated(&self, file_name: &str, ext: &str) -> String {
        format!(
            "{}_{}.{}",
            self.prefix,
            sanitize_filename(basename(file_name)),
            ext
        )
    }

    /// `Corrected_<strict basename>.docx`
    pub fn docx(&self, file_name: &str) -> String {
        format!("{}_{}.docx", self.prefix, strict_basename(file_name))
    }

    /// `Corrected_<fileName>.html`, the full original name kept as-is.
    pub fn raw_html(&self, file_name: &str) -> String {
        format!("{}_{}.html", self.prefix, sanitize_filename(file_name))
    }
}

impl Default for FileNamer {
    fn default() -> Self {
        Self::new("Corrected")
    }
}
