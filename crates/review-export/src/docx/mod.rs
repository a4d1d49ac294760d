//! Edited HTML to a real Word document
//!
//! The HTML is read into blocks and written as WordprocessingML with a fixed
//! document shell: Times New Roman 12pt body, a heading scale from 24pt down
//! to 12pt, bordered tables and one-inch margins.

mod document;
mod parts;

pub use document::DocumentWriter;
pub use parts::{BODY_FONT, HEADING_SIZES};

use crate::error::ExportError;
use crate::html::parse_blocks;
use std::io::{Cursor, Seek, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Alert shown when there is nothing to convert.
pub const EMPTY_CONTENT_MESSAGE: &str = "No content available to export.";

/// Packages the parts of a `.docx` archive.
pub struct DocxWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
}

impl<W: Write + Seek> DocxWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            zip: ZipWriter::new(writer),
        }
    }

    /// Write every part and finish the archive.
    pub fn write(mut self, document_xml: &str) -> Result<W, ExportError> {
        self.write_file("[Content_Types].xml", &parts::content_types_xml())?;
        self.write_file("_rels/.rels", &parts::root_rels_xml())?;
        self.write_file("word/document.xml", document_xml)?;
        self.write_file("word/styles.xml", &parts::styles_xml())?;
        self.write_file("word/settings.xml", &parts::settings_xml())?;
        self.write_file("word/_rels/document.xml.rels", &parts::document_rels_xml())?;
        Ok(self.zip.finish()?)
    }

    fn write_file(&mut self, path: &str, content: &str) -> Result<(), ExportError> {
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        self.zip.start_file(path, options)?;
        self.zip
            .write_all(content.as_bytes())
            .map_err(|e| ExportError::Docx(format!("{}: {}", path, e)))?;
        Ok(())
    }
}

/// Convert edited HTML into `.docx` bytes.
///
/// Content with no visible blocks (blank, or markup such as `<p><br></p>`)
/// is refused with [`EMPTY_CONTENT_MESSAGE`].
pub fn html_to_docx(html: &str) -> Result<Vec<u8>, ExportError> {
    let blocks = parse_blocks(html);
    if blocks.is_empty() {
        return Err(ExportError::Validation(EMPTY_CONTENT_MESSAGE.to_string()));
    }

    let document_xml = DocumentWriter::new().write(&blocks);
    let cursor = DocxWriter::new(Cursor::new(Vec::new())).write(&document_xml)?;

    tracing::debug!(blocks = blocks.len(), "converted edited content to docx");
    Ok(cursor.into_inner())
}
