//! Coordinate transformation from percentage page boxes to PDF space

use crate::model::IssuePosition;

/// Rectangle in PDF user space (bottom-left origin, points).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Convert a top-left-origin percentage box into PDF coordinates.
///
/// The percentage-from-top is flipped onto the bottom-up PDF origin, so `y`
/// is the lower edge of the box.
pub fn percent_to_pdf(position: &IssuePosition, page_width: f64, page_height: f64) -> PdfRect {
    let width = position.width / 100.0 * page_width;
    let height = position.height / 100.0 * page_height;
    let x = position.left / 100.0 * page_width;
    let y = page_height - position.top / 100.0 * page_height - height;

    PdfRect {
        x,
        y,
        width,
        height,
    }
}

/// Page width and height from a MediaBox `[llx, lly, urx, ury]`.
pub fn media_box_size(media_box: [f64; 4]) -> (f64, f64) {
    let [llx, lly, urx, ury] = media_box;
    ((urx - llx).abs(), (ury - lly).abs())
}
