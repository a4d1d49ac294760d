//! word/document.xml from parsed HTML blocks

use super::parts::namespaces;
use crate::html::{Block, Run, TableRow};
use quick_xml::escape::escape;

/// A4 in twentieths of a point.
const PAGE_WIDTH_TWIPS: u32 = 11906;
const PAGE_HEIGHT_TWIPS: u32 = 16838;
/// One inch on every side.
const MARGIN_TWIPS: u32 = 1440;
const LIST_INDENT_TWIPS: u32 = 720;
const HANGING_TWIPS: u32 = 360;

#[derive(Debug, Default)]
pub struct DocumentWriter;

impl DocumentWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn write(&self, blocks: &[Block]) -> String {
        let mut xml = String::new();
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<w:document xmlns:w="{}" xmlns:r="{}">"#,
            namespaces::W,
            namespaces::R
        ));
        xml.push_str("<w:body>");

        for block in blocks {
            self.write_block(&mut xml, block);
        }
        // A body must hold at least one paragraph before sectPr
        if blocks.is_empty() {
            xml.push_str("<w:p/>");
        }

        xml.push_str(&format!(
            r#"<w:sectPr><w:pgSz w:w="{}" w:h="{}"/><w:pgMar w:top="{m}" w:right="{m}" w:bottom="{m}" w:left="{m}" w:header="720" w:footer="720" w:gutter="0"/></w:sectPr>"#,
            PAGE_WIDTH_TWIPS,
            PAGE_HEIGHT_TWIPS,
            m = MARGIN_TWIPS
        ));
        xml.push_str("</w:body></w:document>");
        xml
    }

    fn write_block(&self, xml: &mut String, block: &Block) {
        match block {
            Block::Heading { level, runs } => {
                let level = (*level).clamp(1, 6);
                self.write_paragraph(xml, Some(&format!("Heading{}", level)), "", None, runs);
            }
            Block::Paragraph { runs } => self.write_paragraph(xml, None, "", None, runs),
            Block::Quote { runs } => self.write_paragraph(xml, Some("Quote"), "", None, runs),
            Block::ListItem {
                ordinal,
                depth,
                runs,
            } => {
                let left = LIST_INDENT_TWIPS * (*depth).max(1) as u32;
                let indent = format!(
                    r#"<w:ind w:left="{}" w:hanging="{}"/>"#,
                    left, HANGING_TWIPS
                );
                let marker = match ordinal {
                    Some(n) => format!("{}.", n),
                    None => "\u{2022}".to_string(),
                };
                self.write_paragraph(xml, Some("ListParagraph"), &indent, Some(&marker), runs);
            }
            Block::Preformatted { text } => {
                for line in text.lines() {
                    xml.push_str(r#"<w:p><w:pPr><w:pStyle w:val="Preformatted"/></w:pPr>"#);
                    if !line.is_empty() {
                        xml.push_str(&format!(
                            r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#,
                            escape(line.replace('\t', "    ").as_str())
                        ));
                    }
                    xml.push_str("</w:p>");
                }
            }
            Block::Table { rows } => self.write_table(xml, rows),
            Block::Image { alt, .. } => {
                // Images are not packaged; keep their alt text in the flow
                if !alt.is_empty() {
                    let runs = vec![Run::plain(&format!("[Image: {}]", alt))];
                    self.write_paragraph(xml, None, "", None, &runs);
                }
            }
            Block::Rule => {
                xml.push_str(r#"<w:p><w:pPr><w:pBdr><w:bottom w:val="single" w:sz="6" w:space="1" w:color="999999"/></w:pBdr></w:pPr></w:p>"#);
            }
        }
    }

    fn write_paragraph(
        &self,
        xml: &mut String,
        style: Option<&str>,
        extra_props: &str,
        marker: Option<&str>,
        runs: &[Run],
    ) {
        xml.push_str("<w:p>");
        if style.is_some() || !extra_props.is_empty() {
            xml.push_str("<w:pPr>");
            if let Some(style) = style {
                xml.push_str(&format!(r#"<w:pStyle w:val="{}"/>"#, style));
            }
            xml.push_str(extra_props);
            xml.push_str("</w:pPr>");
        }
        if let Some(marker) = marker {
            xml.push_str(&format!(
                r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r><w:r><w:tab/></w:r>"#,
                escape(marker)
            ));
        }
        for run in runs {
            self.write_run(xml, run, false);
        }
        xml.push_str("</w:p>");
    }

    fn write_run(&self, xml: &mut String, run: &Run, force_bold: bool) {
        if run.is_line_break() {
            xml.push_str("<w:r><w:br/></w:r>");
            return;
        }
        xml.push_str("<w:r>");
        let style = run.style;
        if style.bold || force_bold || style.italic || style.underline || style.strike {
            xml.push_str("<w:rPr>");
            if style.bold || force_bold {
                xml.push_str("<w:b/><w:bCs/>");
            }
            if style.italic {
                xml.push_str("<w:i/><w:iCs/>");
            }
            if style.underline {
                xml.push_str(r#"<w:u w:val="single"/>"#);
            }
            if style.strike {
                xml.push_str("<w:strike/>");
            }
            xml.push_str("</w:rPr>");
        }
        xml.push_str(&format!(
            r#"<w:t xml:space="preserve">{}</w:t>"#,
            escape(run.text.as_str())
        ));
        xml.push_str("</w:r>");
    }

    fn write_table(&self, xml: &mut String, rows: &[TableRow]) {
        let columns = rows.iter().map(|r| r.cells.len()).max().unwrap_or(0);
        if columns == 0 {
            return;
        }
        let content_width = PAGE_WIDTH_TWIPS - 2 * MARGIN_TWIPS;
        let column_width = content_width / columns as u32;

        xml.push_str("<w:tbl>");
        xml.push_str(r#"<w:tblPr><w:tblStyle w:val="TableGrid"/><w:tblW w:w="5000" w:type="pct"/><w:tblLook w:val="04A0"/></w:tblPr>"#);
        xml.push_str("<w:tblGrid>");
        for _ in 0..columns {
            xml.push_str(&format!(r#"<w:gridCol w:w="{}"/>"#, column_width));
        }
        xml.push_str("</w:tblGrid>");

        for row in rows {
            xml.push_str("<w:tr>");
            if row.header {
                xml.push_str("<w:trPr><w:tblHeader/></w:trPr>");
            }
            for column in 0..columns {
                xml.push_str(&format!(
                    r#"<w:tc><w:tcPr><w:tcW w:w="{}" w:type="dxa"/></w:tcPr><w:p>"#,
                    column_width
                ));
                if let Some(cell) = row.cells.get(column) {
                    for run in cell {
                        self.write_run(xml, run, row.header);
                    }
                }
                xml.push_str("</w:p></w:tc>");
            }
            xml.push_str("</w:tr>");
        }
        xml.push_str("</w:tbl>");
        // Word merges adjacent tables unless a paragraph separates them
        xml.push_str("<w:p/>");
    }
}
