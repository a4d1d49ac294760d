//! Edited HTML to a paginated A4 PDF
//!
//! Content is staged, its images are resolved, and after a settling delay the
//! block sequence is flowed onto pages. Blocks are laid out line by line so a
//! page break never cuts through a line of text, a table row or an image.

use crate::config::{ExportConfig, PageConfig};
use crate::error::ExportError;
use crate::fonts::{font_dictionary, text_width, Face};
use crate::html::{image_sources, parse_blocks, Block, Run, TableRow};
use crate::images::{load_all, ImageResolver, RasterImage};
use crate::overlay::{pdf_string, real};
use crate::stage::{Stage, StageGuard};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use std::collections::HashMap;

/// Heading sizes relative to the body size, h1..h6.
const HEADING_SCALE: [f64; 6] = [2.0, 1.6, 1.35, 1.15, 1.0, 0.9];
const LIST_INDENT: f64 = 18.0;
const MARKER_GAP: f64 = 4.0;
const CELL_PADDING: f64 = 4.0;
const STROKE_WIDTH: f64 = 0.5;
/// Courier advance width, in em.
const MONO_ADVANCE: f64 = 0.6;

#[derive(Debug, Clone)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub images_embedded: usize,
    pub images_skipped: usize,
}

/// Render edited HTML into a PDF using the page geometry in `config`.
///
/// The staging container is unmounted before this returns, whatever the
/// outcome. Images that fail to resolve are left out of the document.
pub fn render_html_to_pdf<S, R>(
    html: &str,
    config: &ExportConfig,
    stage: &S,
    resolver: &R,
) -> Result<RenderedPdf, ExportError>
where
    S: Stage + ?Sized,
    R: ImageResolver + ?Sized,
{
    let guard = StageGuard::mount(stage, html, config.page.container_width_px)?;

    let blocks = parse_blocks(&guard.markup()?);
    let loaded = load_all(resolver, &image_sources(&blocks));
    let images_skipped = loaded.iter().filter(|l| l.image.is_none()).count();
    let images: HashMap<String, RasterImage> = loaded
        .into_iter()
        .filter_map(|l| l.image.map(|image| (l.src, image)))
        .collect();

    guard.settle(config.render.settle_delay());

    let mut layout = Layout::new(config)?;
    for block in &blocks {
        layout.place_block(block, &images);
    }
    let pages = layout.finish();

    let page_count = pages.len();
    let images_embedded: usize = pages.iter().map(|p| p.images.len()).sum();
    let bytes = build_document(pages, &config.page)?;

    tracing::debug!(
        blocks = blocks.len(),
        page_count,
        images_embedded,
        images_skipped,
        "rendered edited content to pdf"
    );

    Ok(RenderedPdf {
        bytes,
        page_count,
        images_embedded,
        images_skipped,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TextStyle {
    face: Face,
    size: f64,
    underline: bool,
    strike: bool,
}

#[derive(Debug, Clone)]
struct Fragment {
    text: String,
    style: TextStyle,
    /// Offset from the line's left edge
    x: f64,
    width: f64,
}

#[derive(Debug, Clone, Default)]
struct Line {
    fragments: Vec<Fragment>,
    width: f64,
}

impl Line {
    fn append(&mut self, text: &str, style: TextStyle, width: f64, gap: f64) {
        if let Some(last) = self.fragments.last_mut() {
            if last.style == style {
                if gap > 0.0 {
                    last.text.push(' ');
                }
                last.text.push_str(text);
                last.width += gap + width;
                self.width += gap + width;
                return;
            }
        }
        self.fragments.push(Fragment {
            text: text.to_string(),
            style,
            x: self.width + gap,
            width,
        });
        self.width += gap + width;
    }
}

/// Break styled runs into lines no wider than `max_width`.
fn wrap_runs(runs: &[Run], size: f64, max_width: f64, bold: bool, italic: bool) -> Vec<Line> {
    let mut lines = vec![Line::default()];
    let mut pending_space = false;

    for run in runs {
        if run.is_line_break() {
            lines.push(Line::default());
            pending_space = false;
            continue;
        }
        let style = TextStyle {
            face: Face::from_style(run.style.bold || bold, run.style.italic || italic),
            size,
            underline: run.style.underline,
            strike: run.style.strike,
        };
        if run.text.starts_with(char::is_whitespace) {
            pending_space = true;
        }
        for (i, word) in run.text.split_whitespace().enumerate() {
            if i > 0 {
                pending_space = true;
            }
            push_word(&mut lines, word, style, pending_space, max_width);
            pending_space = false;
        }
        if run.text.ends_with(char::is_whitespace) {
            pending_space = true;
        }
    }

    if lines.len() > 1 && lines.last().is_some_and(|l| l.fragments.is_empty()) {
        lines.pop();
    }
    lines
}

fn push_word(lines: &mut Vec<Line>, word: &str, style: TextStyle, space: bool, max_width: f64) {
    let width = text_width(word, style.face, style.size);
    let mut line = lines.len() - 1;

    let gap = if space && !lines[line].fragments.is_empty() {
        text_width(" ", style.face, style.size)
    } else {
        0.0
    };
    if !lines[line].fragments.is_empty() && lines[line].width + gap + width > max_width {
        lines.push(Line::default());
        line += 1;
    }

    if width <= max_width {
        let gap = if lines[line].fragments.is_empty() { 0.0 } else { gap };
        lines[line].append(word, style, width, gap);
        return;
    }

    // A single word wider than the line is split by character
    let mut chunk = String::new();
    for c in word.chars() {
        chunk.push(c);
        if chunk.chars().count() > 1 && text_width(&chunk, style.face, style.size) > max_width {
            chunk.pop();
            let chunk_width = text_width(&chunk, style.face, style.size);
            if !lines[line].fragments.is_empty() {
                lines.push(Line::default());
                line += 1;
            }
            lines[line].append(&chunk, style, chunk_width, 0.0);
            lines.push(Line::default());
            line += 1;
            chunk.clear();
            chunk.push(c);
        }
    }
    if !chunk.is_empty() {
        let chunk_width = text_width(&chunk, style.face, style.size);
        lines[line].append(&chunk, style, chunk_width, 0.0);
    }
}

#[derive(Debug, Default)]
struct PageContent<'a> {
    operations: Vec<Operation>,
    images: Vec<&'a RasterImage>,
}

struct Layout<'a> {
    page: &'a PageConfig,
    base_size: f64,
    line_height: f64,
    pages: Vec<PageContent<'a>>,
    current: PageContent<'a>,
    /// Top edge of the next thing placed, in PDF user space
    cursor: f64,
    page_has_content: bool,
}

impl<'a> Layout<'a> {
    fn new(config: &'a ExportConfig) -> Result<Self, ExportError> {
        let page = &config.page;
        if page.content_width() <= 0.0 || page.content_height() <= 0.0 {
            return Err(ExportError::Render(
                "page margins leave no printable area".to_string(),
            ));
        }
        if page.container_width_px == 0 || page.capture_scale <= 0.0 {
            return Err(ExportError::Render(
                "staging container has no width".to_string(),
            ));
        }
        Ok(Self {
            page,
            base_size: config.render.base_font_size,
            line_height: config.render.line_height,
            pages: Vec::new(),
            current: PageContent::default(),
            cursor: page.height - page.margin,
            page_has_content: false,
        })
    }

    fn bottom(&self) -> f64 {
        self.page.margin
    }

    fn left(&self) -> f64 {
        self.page.margin
    }

    fn new_page(&mut self) {
        let finished = std::mem::take(&mut self.current);
        self.pages.push(finished);
        self.cursor = self.page.height - self.page.margin;
        self.page_has_content = false;
    }

    /// Start a new page unless `height` still fits on this one.
    fn ensure(&mut self, height: f64) {
        if self.page_has_content && self.cursor - height < self.bottom() {
            self.new_page();
        }
    }

    fn space(&mut self, amount: f64) {
        if self.page_has_content {
            self.cursor -= amount;
        }
    }

    fn finish(mut self) -> Vec<PageContent<'a>> {
        self.new_page();
        self.pages
    }

    fn place_block(&mut self, block: &Block, images: &'a HashMap<String, RasterImage>) {
        let base = self.base_size;
        let width = self.page.content_width();
        match block {
            Block::Heading { level, runs } => {
                let index = (*level).clamp(1, 6) as usize - 1;
                let size = base * HEADING_SCALE[index];
                self.space(size * 0.5);
                let lines = wrap_runs(runs, size, width, true, false);
                self.place_lines(&lines, self.left(), size, None);
                self.cursor -= size * 0.3;
            }
            Block::Paragraph { runs } => {
                let lines = wrap_runs(runs, base, width, false, false);
                self.place_lines(&lines, self.left(), base, None);
                self.cursor -= base * 0.5;
            }
            Block::ListItem {
                ordinal,
                depth,
                runs,
            } => {
                let indent = LIST_INDENT * (*depth).max(1) as f64;
                let marker = match ordinal {
                    Some(n) => format!("{}.", n),
                    None => "\u{2022}".to_string(),
                };
                let lines = wrap_runs(runs, base, width - indent, false, false);
                self.place_lines(&lines, self.left() + indent, base, Some(&marker));
                self.cursor -= base * 0.2;
            }
            Block::Quote { runs } => {
                let lines = wrap_runs(runs, base, width - LIST_INDENT, false, true);
                self.place_lines(&lines, self.left() + LIST_INDENT, base, None);
                self.cursor -= base * 0.5;
            }
            Block::Preformatted { text } => {
                let size = base * 0.9;
                let lines = preformatted_lines(text, size, width);
                self.place_lines(&lines, self.left(), size, None);
                self.cursor -= base * 0.5;
            }
            Block::Table { rows } => {
                self.place_table(rows);
                self.cursor -= base * 0.5;
            }
            Block::Image {
                src,
                width: width_attr,
                height: height_attr,
                ..
            } => {
                if let Some(image) = images.get(src) {
                    self.place_image(image, *width_attr, *height_attr);
                }
            }
            Block::Rule => self.place_rule(),
        }
    }

    fn place_lines(&mut self, lines: &[Line], x: f64, size: f64, marker: Option<&str>) {
        let line_height = size * self.line_height;
        for (i, line) in lines.iter().enumerate() {
            self.ensure(line_height);
            let top = self.cursor;
            if i == 0 {
                if let Some(marker) = marker {
                    let marker_width = text_width(marker, Face::Regular, size);
                    let baseline = baseline(top, size, line_height);
                    self.current.operations.extend(show_text(
                        marker,
                        Face::Regular,
                        size,
                        x - MARKER_GAP - marker_width,
                        baseline,
                    ));
                }
            }
            self.emit_line(line, x, top, size);
            self.cursor -= line_height;
            self.page_has_content = true;
        }
    }

    fn emit_line(&mut self, line: &Line, x: f64, top: f64, size: f64) {
        let line_height = size * self.line_height;
        let baseline = baseline(top, size, line_height);
        for fragment in &line.fragments {
            let left = x + fragment.x;
            let style = fragment.style;
            self.current.operations.extend(show_text(
                &fragment.text,
                style.face,
                style.size,
                left,
                baseline,
            ));
            if style.underline {
                let y = baseline - style.size * 0.12;
                self.current
                    .operations
                    .extend(stroke_line(left, y, left + fragment.width, y, 0.0));
            }
            if style.strike {
                let y = baseline + style.size * 0.3;
                self.current
                    .operations
                    .extend(stroke_line(left, y, left + fragment.width, y, 0.0));
            }
        }
    }

    fn place_table(&mut self, rows: &[TableRow]) {
        let columns = rows.iter().map(|r| r.cells.len()).max().unwrap_or(0);
        if columns == 0 {
            return;
        }
        let size = self.base_size;
        let line_height = size * self.line_height;
        let column_width = self.page.content_width() / columns as f64;
        let inner_width = (column_width - 2.0 * CELL_PADDING).max(size);

        for row in rows {
            let cells: Vec<Vec<Line>> = row
                .cells
                .iter()
                .map(|cell| wrap_runs(cell, size, inner_width, row.header, false))
                .collect();
            let tallest = cells.iter().map(|lines| lines.len()).max().unwrap_or(1).max(1);
            let row_height = tallest as f64 * line_height + 2.0 * CELL_PADDING;
            self.ensure(row_height);

            let top = self.cursor;
            for column in 0..columns {
                let x = self.left() + column as f64 * column_width;
                self.current.operations.extend(stroke_rect(
                    x,
                    top - row_height,
                    column_width,
                    row_height,
                ));
                if let Some(lines) = cells.get(column) {
                    for (i, line) in lines.iter().enumerate() {
                        let line_top = top - CELL_PADDING - i as f64 * line_height;
                        self.emit_line(line, x + CELL_PADDING, line_top, size);
                    }
                }
            }
            self.cursor -= row_height;
            self.page_has_content = true;
        }
    }

    /// Size in points for an image, honouring declared CSS dimensions and
    /// capped to the printable area.
    fn image_size(&self, image: &RasterImage, width_attr: Option<f64>, height_attr: Option<f64>) -> (f64, f64) {
        let px = self.page.px_to_pt();
        let natural_w = image.width as f64 / self.page.capture_scale * px;
        let natural_h = image.height as f64 / self.page.capture_scale * px;
        let aspect = natural_h / natural_w;

        let (mut w, mut h) = match (width_attr, height_attr) {
            (Some(w), Some(h)) => (w * px, h * px),
            (Some(w), None) => (w * px, w * px * aspect),
            (None, Some(h)) => (h * px / aspect, h * px),
            (None, None) => (natural_w, natural_h),
        };

        let max_w = self.page.content_width();
        let max_h = self.page.content_height();
        if w > max_w {
            h *= max_w / w;
            w = max_w;
        }
        if h > max_h {
            w *= max_h / h;
            h = max_h;
        }
        (w, h)
    }

    fn place_image(&mut self, image: &'a RasterImage, width_attr: Option<f64>, height_attr: Option<f64>) {
        if image.width == 0 || image.height == 0 {
            return;
        }
        let (w, h) = self.image_size(image, width_attr, height_attr);
        if !(w > 0.0 && h > 0.0) {
            return;
        }
        self.ensure(h);

        let name = format!("Im{}", self.current.images.len());
        self.current.images.push(image);
        let x = self.left();
        let y = self.cursor - h;
        self.current.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![real(w), real(0.0), real(0.0), real(h), real(x), real(y)],
            ),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
        self.cursor -= h + self.base_size * 0.5;
        self.page_has_content = true;
    }

    fn place_rule(&mut self) {
        let base = self.base_size;
        self.ensure(base);
        let y = self.cursor - base / 2.0;
        let x = self.left();
        self.current
            .operations
            .extend(stroke_line(x, y, x + self.page.content_width(), y, 0.6));
        self.cursor -= base;
        self.page_has_content = true;
    }
}

fn baseline(top: f64, size: f64, line_height: f64) -> f64 {
    top - (line_height - size) / 2.0 - size * 0.8
}

fn preformatted_lines(text: &str, size: f64, max_width: f64) -> Vec<Line> {
    let style = TextStyle {
        face: Face::Mono,
        size,
        underline: false,
        strike: false,
    };
    let per_line = ((max_width / (size * MONO_ADVANCE)).floor() as usize).max(1);
    let mut lines = Vec::new();
    for source in text.replace('\t', "    ").lines() {
        let chars: Vec<char> = source.chars().collect();
        if chars.is_empty() {
            lines.push(Line::default());
            continue;
        }
        for chunk in chars.chunks(per_line) {
            let chunk: String = chunk.iter().collect();
            let mut line = Line::default();
            let width = text_width(&chunk, Face::Mono, size);
            line.append(&chunk, style, width, 0.0);
            lines.push(line);
        }
    }
    lines
}

fn show_text(text: &str, face: Face, size: f64, x: f64, y: f64) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(face.resource_name().as_bytes().to_vec()), real(size)],
        ),
        Operation::new("Td", vec![real(x), real(y)]),
        Operation::new("Tj", vec![pdf_string(text)]),
        Operation::new("ET", vec![]),
    ]
}

fn stroke_line(x1: f64, y1: f64, x2: f64, y2: f64, gray: f64) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("w", vec![real(STROKE_WIDTH)]),
        Operation::new("G", vec![real(gray)]),
        Operation::new("m", vec![real(x1), real(y1)]),
        Operation::new("l", vec![real(x2), real(y2)]),
        Operation::new("S", vec![]),
        Operation::new("Q", vec![]),
    ]
}

fn stroke_rect(x: f64, y: f64, w: f64, h: f64) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("w", vec![real(STROKE_WIDTH)]),
        Operation::new("G", vec![real(0.0)]),
        Operation::new("re", vec![real(x), real(y), real(w), real(h)]),
        Operation::new("S", vec![]),
        Operation::new("Q", vec![]),
    ]
}

fn build_document(pages: Vec<PageContent<'_>>, page: &PageConfig) -> Result<Vec<u8>, ExportError> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut fonts = Dictionary::new();
    for face in Face::ALL {
        let font_id = doc.add_object(font_dictionary(face.base_font()));
        fonts.set(face.resource_name(), Object::Reference(font_id));
    }
    let fonts_id = doc.add_object(fonts);

    let mut page_ids = Vec::with_capacity(pages.len());
    for content in pages {
        let mut resources = dictionary! {
            "Font" => Object::Reference(fonts_id),
        };
        if !content.images.is_empty() {
            let mut xobjects = Dictionary::new();
            for (i, image) in content.images.iter().enumerate() {
                let image_id = image.add_to(&mut doc);
                xobjects.set(format!("Im{}", i), Object::Reference(image_id));
            }
            resources.set("XObject", xobjects);
        }

        let encoded = Content {
            operations: content.operations,
        }
        .encode()
        .map_err(|e| ExportError::Render(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![real(0.0), real(0.0), real(page.width), real(page.height)],
            "Resources" => resources,
            "Contents" => Object::Reference(content_id),
        });
        page_ids.push(page_id);
    }

    let count = page_ids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => count,
            "Kids" => page_ids.into_iter().map(Object::Reference).collect::<Vec<_>>(),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    let info_id = doc.add_object(dictionary! {
        "Producer" => Object::string_literal("review-export"),
    });
    doc.trailer.set("Info", Object::Reference(info_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ExportError::Render(e.to_string()))?;
    Ok(buffer)
}
