//! Export pipeline for reviewed documents
//!
//! Turns an analysis result (original file, detected issues, optional edited
//! HTML) into a downloadable file:
//! - `overlay`: corrections painted onto the original PDF
//! - `html_pdf`: edited HTML laid out onto A4 pages
//! - `docx`: edited HTML as a Word document
//! - `report`: Word-compatible HTML correction report
//! - `plain`: raw HTML and plain text
//!
//! `dispatch::Exporter` picks one of these per request and hands the result
//! to the host through the capabilities in `host` and `stage`.

pub mod config;
pub mod coords;
pub mod dispatch;
pub mod docx;
pub mod error;
pub mod fallback;
pub mod fonts;
pub mod host;
pub mod html;
pub mod html_pdf;
pub mod images;
pub mod model;
pub mod naming;
pub mod overlay;
pub mod plain;
pub mod report;
pub mod stage;

pub use config::ExportConfig;
pub use dispatch::{check_preconditions, select_route, ExportOutcome, Exporter, Route};
pub use docx::html_to_docx;
pub use error::ExportError;
pub use fallback::{ExportStrategy, FallbackChain};
pub use host::{Clock, Downloader, FixedClock, MemoryDownloader, MemoryNotifier, Notifier, SystemClock};
pub use html_pdf::render_html_to_pdf;
pub use images::{DataUriResolver, ImageCache, ImageResolver, RasterImage};
pub use model::{Artifact, ExportFormat, ExportRequest, FileKind, Issue, IssuePosition, Severity};
pub use naming::FileNamer;
pub use overlay::annotate_pdf;
pub use plain::export_as_text;
pub use stage::{ContainerId, MemoryStage, Stage, StageGuard};

/// Page count of a PDF, used by hosts to sanity-check overlay input.
pub fn get_page_count(bytes: &[u8]) -> Result<usize, ExportError> {
    let doc = lopdf::Document::load_mem(bytes)?;
    Ok(doc.get_pages().len())
}
