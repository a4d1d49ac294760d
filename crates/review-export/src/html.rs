//! Lightweight HTML reading for export
//!
//! Edited documents arrive as HTML produced by the review editor. Renderers
//! don't need a full DOM, only the block flow: headings, paragraphs, list
//! items, tables, preformatted text and images, each carrying styled runs.

use std::borrow::Cow;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
}

/// A span of text sharing one style. A run whose text is `"\n"` is a line break.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub text: String,
    pub style: RunStyle,
}

impl Run {
    pub fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            style: RunStyle::default(),
        }
    }

    pub fn line_break() -> Self {
        Self::plain("\n")
    }

    pub fn is_line_break(&self) -> bool {
        self.text == "\n"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub cells: Vec<Vec<Run>>,
    pub header: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: u8, runs: Vec<Run> },
    Paragraph { runs: Vec<Run> },
    ListItem { ordinal: Option<u32>, depth: u8, runs: Vec<Run> },
    Quote { runs: Vec<Run> },
    Preformatted { text: String },
    Table { rows: Vec<TableRow> },
    Image { src: String, alt: String, width: Option<f64>, height: Option<f64> },
    Rule,
}

/// Concatenated text of a run sequence.
pub fn runs_text(runs: &[Run]) -> String {
    runs.iter().map(|r| r.text.as_str()).collect()
}

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Decode character references (`&amp;`, `&#8217;`, `&#x2014;` ...).
/// Unknown references are kept verbatim.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after
            .find(';')
            .filter(|&end| end > 0 && end <= 10)
            .and_then(|end| decode_reference(&after[..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_reference(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "bull" => '\u{2022}',
        "middot" => '\u{b7}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "deg" => '\u{b0}',
        "euro" => '\u{20ac}',
        _ => return None,
    };
    Some(c)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Text(String),
    Start {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    End(String),
}

fn tokenize(html: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = html;

    while !rest.is_empty() {
        let Some(lt) = rest.find('<') else {
            tokens.push(Token::Text(rest.to_string()));
            break;
        };
        if lt > 0 {
            tokens.push(Token::Text(rest[..lt].to_string()));
        }
        rest = &rest[lt..];

        if let Some(comment) = rest.strip_prefix("<!--") {
            rest = comment.find("-->").map_or("", |end| &comment[end + 3..]);
            continue;
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            rest = rest.find('>').map_or("", |end| &rest[end + 1..]);
            continue;
        }
        if let Some(closing) = rest.strip_prefix("</") {
            let end = closing.find('>').unwrap_or(closing.len());
            let name = closing[..end].trim().to_ascii_lowercase();
            tokens.push(Token::End(name));
            rest = closing.get(end + 1..).unwrap_or("");
            continue;
        }

        let starts_tag = rest[1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic());
        if !starts_tag {
            tokens.push(Token::Text("<".to_string()));
            rest = &rest[1..];
            continue;
        }

        let (token, consumed) = parse_start_tag(&rest[1..]);
        rest = &rest[1 + consumed..];

        // Raw text elements: skip their bodies entirely
        if let Token::Start { name, self_closing: false, .. } = &token {
            if matches!(name.as_str(), "script" | "style") {
                let close = format!("</{}", name);
                let lower = rest.to_ascii_lowercase();
                rest = match lower.find(&close) {
                    Some(idx) => rest[idx..].find('>').map_or("", |end| &rest[idx + end + 1..]),
                    None => "",
                };
                continue;
            }
        }
        tokens.push(token);
    }

    tokens
}

/// Parse `name attr="v" ...>` (the leading `<` already consumed).
/// Returns the token and the number of bytes consumed, including `>`.
fn parse_start_tag(input: &str) -> (Token, usize) {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
        i += 1;
    }
    let name = input[..i].to_ascii_lowercase();
    let mut attrs = Vec::new();
    let mut self_closing = false;

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        match bytes[i] {
            b'>' => {
                i += 1;
                break;
            }
            b'/' => {
                self_closing = true;
                i += 1;
                continue;
            }
            _ => {}
        }

        let attr_start = i;
        while i < bytes.len() && !matches!(bytes[i], b'=' | b'>' | b'/') && !bytes[i].is_ascii_whitespace()
        {
            i += 1;
        }
        let attr_name = input[attr_start..i].to_ascii_lowercase();
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        let mut value = String::new();
        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                let quote = bytes[i];
                i += 1;
                let value_start = i;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                value = input[value_start..i].to_string();
                i = (i + 1).min(bytes.len());
            } else {
                let value_start = i;
                while i < bytes.len() && bytes[i] != b'>' && !bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                value = input[value_start..i].to_string();
            }
        }

        if attr_name.is_empty() {
            // Stray character; step over it whole so the loop always advances
            if i == attr_start {
                i += input[i..].chars().next().map_or(1, char::len_utf8);
            }
        } else {
            attrs.push((attr_name, decode_entities(&value).into_owned()));
        }
    }

    (
        Token::Start {
            name,
            attrs,
            self_closing,
        },
        i,
    )
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// `width="320"` or `style="width: 320px"`.
fn dimension(attrs: &[(String, String)], name: &str) -> Option<f64> {
    if let Some(v) = attr(attrs, name) {
        if let Ok(n) = v.trim().trim_end_matches("px").parse::<f64>() {
            return Some(n);
        }
    }
    let style = attr(attrs, "style")?;
    style.split(';').find_map(|decl| {
        let (key, value) = decl.split_once(':')?;
        if key.trim().eq_ignore_ascii_case(name) {
            value.trim().trim_end_matches("px").parse().ok()
        } else {
            None
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Pending {
    Paragraph,
    Heading(u8),
    ListItem(Option<u32>, u8),
    Quote,
}

#[derive(Default)]
struct TableState {
    rows: Vec<TableRow>,
    row: Option<TableRow>,
    cell: Option<Vec<Run>>,
    header_cell: bool,
}

#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    runs: Vec<Run>,
    pending: Option<Pending>,
    bold: u32,
    italic: u32,
    underline: u32,
    strike: u32,
    skip_depth: u32,
    pre: Option<String>,
    lists: Vec<(bool, u32)>,
    tables: Vec<TableState>,
    quote_depth: u32,
}

impl BlockBuilder {
    fn style(&self) -> RunStyle {
        RunStyle {
            bold: self.bold > 0,
            italic: self.italic > 0,
            underline: self.underline > 0,
            strike: self.strike > 0,
        }
    }

    fn in_cell(&self) -> bool {
        self.tables.last().is_some_and(|t| t.cell.is_some())
    }

    fn target(&mut self) -> &mut Vec<Run> {
        if let Some(cell) = self.tables.last_mut().and_then(|t| t.cell.as_mut()) {
            return cell;
        }
        &mut self.runs
    }

    fn push_text(&mut self, raw: &str) {
        if self.skip_depth > 0 {
            return;
        }
        let text = decode_entities(raw);
        if let Some(pre) = self.pre.as_mut() {
            pre.push_str(&text);
            return;
        }

        let mut collapsed = String::with_capacity(text.len());
        let mut last_space = false;
        for c in text.chars() {
            if c.is_whitespace() && c != '\u{a0}' {
                if !last_space {
                    collapsed.push(' ');
                }
                last_space = true;
            } else {
                collapsed.push(c);
                last_space = false;
            }
        }
        if collapsed.is_empty() {
            return;
        }

        let style = self.style();
        let target = self.target();
        // Avoid doubling whitespace across run boundaries
        let after_space = target
            .last()
            .map_or(true, |r| r.text.ends_with(' ') || r.is_line_break());
        let collapsed = if after_space {
            collapsed.trim_start().to_string()
        } else {
            collapsed
        };
        if collapsed.is_empty() {
            return;
        }
        match target.last_mut() {
            Some(last) if last.style == style && !last.is_line_break() => {
                last.text.push_str(&collapsed)
            }
            _ => target.push(Run {
                text: collapsed,
                style,
            }),
        }
    }

    fn push_break(&mut self) {
        if let Some(pre) = self.pre.as_mut() {
            pre.push('\n');
            return;
        }
        self.target().push(Run::line_break());
    }

    fn flush(&mut self) {
        let runs = clean_runs(std::mem::take(&mut self.runs));
        let pending = self.pending.take();
        if runs.is_empty() {
            return;
        }
        let block = match pending {
            Some(Pending::Heading(level)) => Block::Heading { level, runs },
            Some(Pending::ListItem(ordinal, depth)) => Block::ListItem {
                ordinal,
                depth,
                runs,
            },
            Some(Pending::Quote) => Block::Quote { runs },
            Some(Pending::Paragraph) | None if self.quote_depth > 0 => Block::Quote { runs },
            Some(Pending::Paragraph) | None => Block::Paragraph { runs },
        };
        self.blocks.push(block);
    }

    fn open_block(&mut self, pending: Pending) {
        if self.in_cell() {
            self.push_break();
            return;
        }
        self.flush();
        self.pending = Some(pending);
    }

    fn close_block(&mut self) {
        if self.in_cell() {
            return;
        }
        self.flush();
    }

    fn start(&mut self, name: &str, attrs: &[(String, String)], self_closing: bool) {
        match name {
            "head" | "title" | "noscript" | "template" if !self_closing => self.skip_depth += 1,
            _ if self.skip_depth > 0 => {}
            "b" | "strong" => self.bold += 1,
            "i" | "em" | "cite" => self.italic += 1,
            "u" | "ins" => self.underline += 1,
            "s" | "strike" | "del" => self.strike += 1,
            "br" => self.push_break(),
            "p" | "div" | "section" | "article" | "header" | "footer" | "main" | "caption"
            | "figure" | "figcaption" | "dd" | "dt" => {
                if !self_closing {
                    self.open_block(Pending::Paragraph)
                }
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse().unwrap_or(1);
                self.open_block(Pending::Heading(level));
            }
            "blockquote" => {
                self.open_block(Pending::Quote);
                self.quote_depth += 1;
            }
            "ul" | "ol" => {
                self.close_block();
                let start = attr(attrs, "start")
                    .and_then(|s| s.parse::<u32>().ok())
                    .map_or(0, |s| s.saturating_sub(1));
                self.lists.push((name == "ol", start));
            }
            "li" => {
                let depth = u8::try_from(self.lists.len().max(1)).unwrap_or(u8::MAX);
                let ordinal = match self.lists.last_mut() {
                    Some((true, counter)) => {
                        *counter = counter.saturating_add(1);
                        Some(*counter)
                    }
                    _ => None,
                };
                self.open_block(Pending::ListItem(ordinal, depth));
            }
            "pre" => {
                self.close_block();
                if !self.in_cell() {
                    self.pre = Some(String::new());
                }
            }
            "hr" => {
                self.close_block();
                if !self.in_cell() {
                    self.blocks.push(Block::Rule);
                }
            }
            "img" => {
                let src = attr(attrs, "src").unwrap_or("").to_string();
                let alt = attr(attrs, "alt").unwrap_or("").to_string();
                if self.in_cell() {
                    if !alt.is_empty() {
                        self.push_text(&format!("[{}]", alt));
                    }
                } else if !src.is_empty() {
                    self.flush();
                    self.blocks.push(Block::Image {
                        src,
                        alt,
                        width: dimension(attrs, "width"),
                        height: dimension(attrs, "height"),
                    });
                }
            }
            "table" => {
                if self.in_cell() {
                    // Nested tables flatten into the enclosing cell
                    self.push_break();
                    return;
                }
                self.flush();
                self.tables.push(TableState::default());
            }
            "tr" => {
                if let Some(table) = self.tables.last_mut() {
                    if table.cell.is_none() {
                        finish_row(table);
                        table.row = Some(TableRow {
                            cells: Vec::new(),
                            header: false,
                        });
                    }
                }
            }
            "td" | "th" => {
                if let Some(table) = self.tables.last_mut() {
                    if let Some(cell) = table.cell.take() {
                        // Unclosed previous cell
                        push_cell(table, cell);
                    }
                    if table.row.is_none() {
                        table.row = Some(TableRow {
                            cells: Vec::new(),
                            header: false,
                        });
                    }
                    table.header_cell = name == "th";
                    table.cell = Some(Vec::new());
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, name: &str) {
        match name {
            "head" | "title" | "noscript" | "template" => {
                self.skip_depth = self.skip_depth.saturating_sub(1)
            }
            _ if self.skip_depth > 0 => {}
            "b" | "strong" => self.bold = self.bold.saturating_sub(1),
            "i" | "em" | "cite" => self.italic = self.italic.saturating_sub(1),
            "u" | "ins" => self.underline = self.underline.saturating_sub(1),
            "s" | "strike" | "del" => self.strike = self.strike.saturating_sub(1),
            "p" | "div" | "section" | "article" | "header" | "footer" | "main" | "caption"
            | "figure" | "figcaption" | "dd" | "dt" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
            | "li" => self.close_block(),
            "blockquote" => {
                self.close_block();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            "ul" | "ol" => {
                self.close_block();
                self.lists.pop();
            }
            "pre" => {
                if let Some(text) = self.pre.take() {
                    let text = text.trim_matches('\n').to_string();
                    if !text.trim().is_empty() {
                        self.blocks.push(Block::Preformatted { text });
                    }
                }
            }
            "td" | "th" => {
                if let Some(table) = self.tables.last_mut() {
                    if let Some(cell) = table.cell.take() {
                        push_cell(table, cell);
                    }
                }
            }
            "tr" => {
                if let Some(table) = self.tables.last_mut() {
                    if table.cell.is_none() {
                        finish_row(table);
                    }
                }
            }
            "table" => {
                if self.in_cell() {
                    return;
                }
                if let Some(mut table) = self.tables.pop() {
                    if let Some(cell) = table.cell.take() {
                        push_cell(&mut table, cell);
                    }
                    finish_row(&mut table);
                    if !table.rows.is_empty() {
                        self.blocks.push(Block::Table { rows: table.rows });
                    }
                }
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Block> {
        if let Some(text) = self.pre.take() {
            if !text.trim().is_empty() {
                self.blocks.push(Block::Preformatted { text });
            }
        }
        while let Some(mut table) = self.tables.pop() {
            if let Some(cell) = table.cell.take() {
                push_cell(&mut table, cell);
            }
            finish_row(&mut table);
            if !table.rows.is_empty() {
                self.blocks.push(Block::Table { rows: table.rows });
            }
        }
        self.flush();
        self.blocks
    }
}

fn push_cell(table: &mut TableState, cell: Vec<Run>) {
    let header = table.header_cell;
    let row = table.row.get_or_insert_with(|| TableRow {
        cells: Vec::new(),
        header,
    });
    if header && row.cells.is_empty() {
        row.header = true;
    }
    row.cells.push(clean_runs(cell));
}

fn finish_row(table: &mut TableState) {
    if let Some(row) = table.row.take() {
        if !row.cells.is_empty() {
            table.rows.push(row);
        }
    }
}

/// Trim whitespace at the edges of a block and drop empty runs.
fn clean_runs(mut runs: Vec<Run>) -> Vec<Run> {
    while runs.last().is_some_and(|r| r.is_line_break()) {
        runs.pop();
    }
    while runs.first().is_some_and(|r| r.is_line_break()) {
        runs.remove(0);
    }
    if let Some(first) = runs.first_mut() {
        first.text = first.text.trim_start().to_string();
    }
    if let Some(last) = runs.last_mut() {
        if !last.is_line_break() {
            last.text = last.text.trim_end().to_string();
        }
    }
    runs.retain(|r| !r.text.is_empty());
    if runs.iter().all(|r| r.is_line_break()) {
        runs.clear();
    }
    runs
}

/// Parse HTML into a flat block sequence.
pub fn parse_blocks(html: &str) -> Vec<Block> {
    let mut builder = BlockBuilder::default();
    for token in tokenize(html) {
        match token {
            Token::Text(text) => builder.push_text(&text),
            Token::Start {
                name,
                attrs,
                self_closing,
            } => builder.start(&name, &attrs, self_closing),
            Token::End(name) => builder.end(&name),
        }
    }
    builder.finish()
}

/// Image sources in document order.
pub fn image_sources(blocks: &[Block]) -> Vec<&str> {
    blocks
        .iter()
        .filter_map(|b| match b {
            Block::Image { src, .. } => Some(src.as_str()),
            _ => None,
        })
        .collect()
}

/// Readable plain text of a document: one block per paragraph, list
/// markers kept, table cells separated by `|`.
pub fn to_plain_text(html: &str) -> String {
    let mut out = String::new();
    for block in parse_blocks(html) {
        let text = match block {
            Block::Heading { runs, .. } | Block::Paragraph { runs } => runs_text(&runs),
            Block::Quote { runs } => format!("> {}", runs_text(&runs)),
            Block::ListItem {
                ordinal,
                depth,
                runs,
            } => {
                let indent = "  ".repeat(depth.saturating_sub(1) as usize);
                match ordinal {
                    Some(n) => format!("{}{}. {}", indent, n, runs_text(&runs)),
                    None => format!("{}\u{2022} {}", indent, runs_text(&runs)),
                }
            }
            Block::Preformatted { text } => text,
            Block::Table { rows } => rows
                .iter()
                .map(|row| {
                    row.cells
                        .iter()
                        .map(|cell| runs_text(cell).replace('\n', " "))
                        .collect::<Vec<_>>()
                        .join(" | ")
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Block::Image { alt, .. } if !alt.is_empty() => format!("[Image: {}]", alt),
            Block::Image { .. } => continue,
            Block::Rule => "----------------------------------------".to_string(),
        };
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&text);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_paragraph_with_styled_runs() {
        let blocks = parse_blocks("<p>Hello <b>bold</b> and <em>italic</em></p>");
        assert_eq!(
            blocks,
            vec![Block::Paragraph {
                runs: vec![
                    Run::plain("Hello "),
                    Run {
                        text: "bold".into(),
                        style: RunStyle {
                            bold: true,
                            ..Default::default()
                        }
                    },
                    Run::plain(" and "),
                    Run {
                        text: "italic".into(),
                        style: RunStyle {
                            italic: true,
                            ..Default::default()
                        }
                    },
                ]
            }]
        );
    }

    #[test]
    fn test_headings_and_whitespace_collapse() {
        let blocks = parse_blocks("<h2>  Chapter\n   One </h2>\n<p>a\t\tb</p>");
        assert_eq!(
            blocks,
            vec![
                Block::Heading {
                    level: 2,
                    runs: vec![Run::plain("Chapter One")]
                },
                Block::Paragraph {
                    runs: vec![Run::plain("a b")]
                },
            ]
        );
    }

    #[test]
    fn test_lists_number_and_nest() {
        let blocks = parse_blocks("<ol start=\"3\"><li>three</li><li>four<ul><li>dot</li></ul></li></ol>");
        assert_eq!(
            blocks,
            vec![
                Block::ListItem {
                    ordinal: Some(3),
                    depth: 1,
                    runs: vec![Run::plain("three")]
                },
                Block::ListItem {
                    ordinal: Some(4),
                    depth: 1,
                    runs: vec![Run::plain("four")]
                },
                Block::ListItem {
                    ordinal: None,
                    depth: 2,
                    runs: vec![Run::plain("dot")]
                },
            ]
        );
    }

    #[test]
    fn test_table_rows_and_header() {
        let blocks = parse_blocks(
            "<table><tr><th>Name</th><th>Score</th></tr><tr><td>Ana</td><td><p>9</p></td></tr></table>",
        );
        let Block::Table { rows } = &blocks[0] else {
            panic!("expected table, got {:?}", blocks);
        };
        assert_eq!(rows.len(), 2);
        assert!(rows[0].header);
        assert!(!rows[1].header);
        assert_eq!(runs_text(&rows[1].cells[1]), "9");
    }

    #[test]
    fn test_script_style_and_head_are_skipped() {
        let html = "<html><head><title>T</title><style>p{color:red}</style></head>\
                    <body><script>alert('<p>x</p>')</script><p>kept</p></body></html>";
        assert_eq!(
            parse_blocks(html),
            vec![Block::Paragraph {
                runs: vec![Run::plain("kept")]
            }]
        );
    }

    #[test]
    fn test_entities_decode() {
        assert_eq!(decode_entities("a &amp; b &#8217; &#x2014; &bogus;"), "a & b \u{2019} \u{2014} &bogus;");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>\"x\" & 'y'</b>"), "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;");
        assert!(matches!(escape_html("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_images_and_pre() {
        let blocks = parse_blocks(
            "<p>before</p><img src=\"data:image/png;base64,AA\" alt=\"fig\" width=\"120\"><pre>  x = 1\n  y = 2</pre>",
        );
        assert_eq!(image_sources(&blocks), vec!["data:image/png;base64,AA"]);
        assert!(matches!(
            &blocks[1],
            Block::Image { width: Some(w), .. } if *w == 120.0
        ));
        assert_eq!(
            blocks[2],
            Block::Preformatted {
                text: "  x = 1\n  y = 2".into()
            }
        );
    }

    #[test]
    fn test_line_breaks_inside_paragraph() {
        let blocks = parse_blocks("<p>one<br>two<br/></p>");
        assert_eq!(
            blocks,
            vec![Block::Paragraph {
                runs: vec![Run::plain("one"), Run::line_break(), Run::plain("two")]
            }]
        );
    }

    #[test]
    fn test_plain_text_rendering() {
        let text = to_plain_text("<h1>Title</h1><ul><li>a</li></ul><table><tr><td>x</td><td>y</td></tr></table>");
        assert_eq!(text, "Title\n\n\u{2022} a\n\nx | y");
    }

    #[test]
    fn test_bare_text_becomes_paragraph() {
        assert_eq!(to_plain_text("just text, 3 < 4"), "just text, 3 < 4");
    }

    #[test]
    fn test_stray_attribute_before_multibyte_text() {
        assert_eq!(
            parse_blocks("<p =\"x\"é>Résumé</p>"),
            vec![Block::Paragraph {
                runs: vec![Run::plain("Résumé")]
            }]
        );
        assert_eq!(to_plain_text("<span =\"\"ü>Grüße</span>"), "Grüße");
        assert_eq!(to_plain_text("<p =ü>Ärger</p>"), "Ärger");
    }

    #[test]
    fn test_list_numbering_saturates() {
        assert_eq!(
            to_plain_text("<ol start=\"4294967295\"><li>a</li><li>b</li></ol>"),
            "4294967295. a\n\n4294967295. b"
        );
    }

    #[test]
    fn test_deep_list_nesting_caps_depth() {
        let html = format!("{}<li>deep</li>", "<ul>".repeat(300));
        let blocks = parse_blocks(&html);
        assert!(matches!(
            blocks.as_slice(),
            [Block::ListItem { ordinal: None, depth: 255, .. }]
        ));
    }
}
