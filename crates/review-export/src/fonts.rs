//! Standard 14 font helpers: WinAnsi encoding and Helvetica metrics

use lopdf::{dictionary, Dictionary, Object};

/// Helvetica advance widths for ASCII 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

/// Bold faces run slightly wider; close enough for line breaking.
const BOLD_FACTOR: f64 = 1.06;

/// Helvetica variants used by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    Regular,
    Bold,
    Oblique,
    BoldOblique,
    Mono,
}

impl Face {
    pub fn from_style(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (true, true) => Face::BoldOblique,
            (true, false) => Face::Bold,
            (false, true) => Face::Oblique,
            (false, false) => Face::Regular,
        }
    }

    pub fn base_font(&self) -> &'static str {
        match self {
            Face::Regular => "Helvetica",
            Face::Bold => "Helvetica-Bold",
            Face::Oblique => "Helvetica-Oblique",
            Face::BoldOblique => "Helvetica-BoldOblique",
            Face::Mono => "Courier",
        }
    }

    /// Resource name inside a page's /Font dictionary.
    pub fn resource_name(&self) -> &'static str {
        match self {
            Face::Regular => "F1",
            Face::Bold => "F2",
            Face::Oblique => "F3",
            Face::BoldOblique => "F4",
            Face::Mono => "F5",
        }
    }

    pub const ALL: [Face; 5] = [
        Face::Regular,
        Face::Bold,
        Face::Oblique,
        Face::BoldOblique,
        Face::Mono,
    ];
}

/// Type1 font dictionary for a standard face.
pub fn font_dictionary(base_font: &str) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
        "Encoding" => "WinAnsiEncoding",
    }
}

/// Width of `text` in points.
pub fn text_width(text: &str, face: Face, size: f64) -> f64 {
    let units: u32 = text
        .chars()
        .map(|c| match face {
            Face::Mono => 600,
            _ => char_width(c) as u32,
        })
        .sum();
    let width = units as f64 * size / 1000.0;
    match face {
        Face::Bold | Face::BoldOblique => width * BOLD_FACTOR,
        _ => width,
    }
}

fn char_width(c: char) -> u16 {
    match c {
        ' '..='~' => HELVETICA_WIDTHS[c as usize - 32],
        '\u{a0}' => 278,
        '\u{2022}' => 350,
        '\u{2013}' => 556,
        '\u{2014}' => 1000,
        '\u{2026}' => 1000,
        '\u{2018}' | '\u{2019}' => 222,
        '\u{201c}' | '\u{201d}' => 333,
        _ => 556,
    }
}

/// Encode text as WinAnsi bytes for a standard-font string operand.
/// Characters outside the code page become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .map(|c| match c {
            '\t' => b' ',
            ' '..='~' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '\u{20ac}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201c}' => 0x93,
            '\u{201d}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99,
            _ => b'?',
        })
        .collect()
}
