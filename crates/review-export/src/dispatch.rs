//! Export dispatcher
//!
//! Picks a renderer from the requested format and the inputs that are
//! actually available, runs it, and hands the result to the host. Every
//! call ends in a delivery, a degraded delivery, or a user-visible alert.

use crate::config::ExportConfig;
use crate::docx::html_to_docx;
use crate::error::ExportError;
use crate::fallback::{FallbackChain, StrategyInput};
use crate::host::{Clock, Downloader, Notifier, SystemClock};
use crate::html_pdf::render_html_to_pdf;
use crate::images::{DataUriResolver, ImageResolver};
use crate::model::{mime, Artifact, ExportFormat, ExportRequest, FileKind};
use crate::naming::FileNamer;
use crate::overlay::annotate_pdf;
use crate::plain::{export_as_text, raw_html_artifact};
use crate::stage::{MemoryStage, Stage};
use base64::Engine;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shown when nothing would change in the exported document.
pub const FIX_REQUIRED_MESSAGE: &str = "Please fix at least one issue before exporting.";

/// Shown after a failure has been reported in detail.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to export document. Please try again.";

/// Which renderer produces the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Edited HTML delivered untouched
    PlainHtml,
    HtmlToPdf,
    Docx,
    WordReport,
    /// Corrections drawn onto the original PDF
    PdfOverlay,
    /// Banner plus text dump of the edited content
    PlainText,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::PlainHtml => "plain-html",
            Route::HtmlToPdf => "html-to-pdf",
            Route::Docx => "docx",
            Route::WordReport => "word-report",
            Route::PdfOverlay => "pdf-overlay",
            Route::PlainText => "plain-text",
        }
    }
}

/// Decide which renderer serves a request. First matching rule wins.
pub fn select_route(format: ExportFormat, kind: FileKind, has_edited: bool) -> Route {
    if has_edited {
        match format {
            ExportFormat::Html => return Route::PlainHtml,
            ExportFormat::Pdf => return Route::HtmlToPdf,
            ExportFormat::Docx => return Route::Docx,
            ExportFormat::Original => {}
        }
    }

    let original = format == ExportFormat::Original;
    if format == ExportFormat::Html || (kind == FileKind::Word && original) {
        return Route::WordReport;
    }
    if format == ExportFormat::Pdf || (kind == FileKind::Pdf && original) {
        return if has_edited {
            Route::HtmlToPdf
        } else if kind == FileKind::Pdf {
            Route::PdfOverlay
        } else {
            Route::WordReport
        };
    }
    Route::WordReport
}

/// Refuse exports that would produce an unchanged document.
///
/// Word originals, edited content and HTML reports are always allowed;
/// anything else needs at least one accepted fix.
pub fn check_preconditions(request: &ExportRequest) -> Result<(), ExportError> {
    let needs_fix = request.file_kind() != FileKind::Word
        && request.edited().is_none()
        && request.format != ExportFormat::Html;
    if needs_fix && request.fixed_count() == 0 {
        return Err(ExportError::Validation(FIX_REQUIRED_MESSAGE.to_string()));
    }
    Ok(())
}

/// Decode the original file, tolerating a `data:*;base64,` prefix and
/// embedded whitespace.
pub fn decode_original(encoded: &str) -> Result<Vec<u8>, ExportError> {
    let payload = match encoded.trim_start().strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| ExportError::Decode("malformed data URI".to_string()))?,
        None => encoded,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(ExportError::Decode("original file is empty".to_string()));
    }
    Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
}

/// How an export ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Delivered { route: Route, file_name: String },
    /// A fallback strategy produced the file
    Degraded { file_name: String },
    /// Refused before any rendering; the user was told why
    Rejected { message: String },
    Failed { message: String },
}

impl ExportOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ExportOutcome::Delivered { .. } | ExportOutcome::Degraded { .. }
        )
    }

    pub fn file_name(&self) -> Option<&str> {
        match self {
            ExportOutcome::Delivered { file_name, .. } | ExportOutcome::Degraded { file_name } => {
                Some(file_name)
            }
            _ => None,
        }
    }
}

enum Produced {
    Artifact(Artifact),
    Degraded(Artifact),
}

/// Held while an export runs; clears the in-flight flag when dropped.
pub struct InFlight<'e> {
    flag: &'e AtomicBool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Runs exports against a set of host capabilities.
pub struct Exporter<'a> {
    downloader: Box<dyn Downloader + 'a>,
    notifier: Box<dyn Notifier + 'a>,
    stage: Box<dyn Stage + 'a>,
    resolver: Box<dyn ImageResolver + 'a>,
    clock: Box<dyn Clock + 'a>,
    report_chain: FallbackChain<'a>,
    config: ExportConfig,
    in_flight: AtomicBool,
}

impl<'a> Exporter<'a> {
    /// An exporter with an in-memory stage, inline image support, the system
    /// clock and default configuration.
    pub fn new(downloader: impl Downloader + 'a, notifier: impl Notifier + 'a) -> Self {
        Self {
            downloader: Box::new(downloader),
            notifier: Box::new(notifier),
            stage: Box::new(MemoryStage::new()),
            resolver: Box::new(DataUriResolver),
            clock: Box::new(SystemClock),
            report_chain: FallbackChain::report(),
            config: ExportConfig::default(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_stage(mut self, stage: impl Stage + 'a) -> Self {
        self.stage = Box::new(stage);
        self
    }

    pub fn with_resolver(mut self, resolver: impl ImageResolver + 'a) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'a) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_config(mut self, config: ExportConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_report_chain(mut self, chain: FallbackChain<'a>) -> Self {
        self.report_chain = chain;
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claim the exporter. Fails with `Busy` while another export holds it.
    pub fn begin(&self) -> Result<InFlight<'_>, ExportError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ExportError::Busy)?;
        Ok(InFlight {
            flag: &self.in_flight,
        })
    }

    fn namer(&self) -> FileNamer {
        FileNamer::new(&self.config.naming.prefix)
    }

    /// Export the corrected document in the requested format.
    pub fn export(&self, request: &ExportRequest) -> ExportOutcome {
        let span = tracing::info_span!(
            "export",
            analysis_id = request.analysis_id.as_deref().unwrap_or("-"),
            file = %request.file_name,
            format = ?request.format,
        );
        let _enter = span.enter();

        let _in_flight = match self.begin() {
            Ok(guard) => guard,
            Err(e) => return self.reject(e),
        };
        if let Err(e) = check_preconditions(request) {
            return self.reject(e);
        }

        let route = select_route(request.format, request.file_kind(), request.edited().is_some());
        tracing::info!(
            route = route.as_str(),
            issues = request.issues.len(),
            fixed = request.fixed_count(),
            "export started"
        );

        let produced = match self.produce(route, request) {
            Ok(produced) => produced,
            Err(e) => return self.fail(route, e),
        };
        match produced {
            Produced::Artifact(artifact) => match self.deliver(&artifact) {
                Ok(()) => ExportOutcome::Delivered {
                    route,
                    file_name: artifact.file_name,
                },
                Err(e) => self.fail(route, e),
            },
            Produced::Degraded(artifact) => match self.deliver(&artifact) {
                Ok(()) => ExportOutcome::Degraded {
                    file_name: artifact.file_name,
                },
                Err(e) => self.fail(route, e),
            },
        }
    }

    /// Deliver the edited content as a plain-text dump behind a banner.
    pub fn export_text(&self, request: &ExportRequest) -> ExportOutcome {
        let span = tracing::info_span!(
            "export_text",
            analysis_id = request.analysis_id.as_deref().unwrap_or("-"),
            file = %request.file_name,
        );
        let _enter = span.enter();

        let _in_flight = match self.begin() {
            Ok(guard) => guard,
            Err(e) => return self.reject(e),
        };
        let text = export_as_text(
            &request.file_name,
            request.edited(),
            self.clock.now().date(),
        );
        let artifact = Artifact::new(
            text.into_bytes(),
            self.namer().undated(&request.file_name, "txt"),
            mime::TEXT,
        );
        match self.deliver(&artifact) {
            Ok(()) => ExportOutcome::Delivered {
                route: Route::PlainText,
                file_name: artifact.file_name,
            },
            Err(e) => self.fail(Route::PlainText, e),
        }
    }

    fn produce(&self, route: Route, request: &ExportRequest) -> Result<Produced, ExportError> {
        let namer = self.namer();
        let now = self.clock.now();
        let edited = request.edited().unwrap_or_default();

        let artifact = match route {
            Route::PlainHtml => raw_html_artifact(edited, &request.file_name, &namer),
            Route::HtmlToPdf => {
                let rendered =
                    render_html_to_pdf(edited, &self.config, &*self.stage, &*self.resolver)?;
                Artifact::new(
                    rendered.bytes,
                    namer.dated(&request.file_name, now.date(), "pdf"),
                    mime::PDF,
                )
            }
            Route::Docx => Artifact::new(
                html_to_docx(edited)?,
                namer.docx(&request.file_name),
                mime::DOCX,
            ),
            Route::PdfOverlay => {
                let original = decode_original(&request.original_base64)?;
                let annotated =
                    annotate_pdf(&original, &request.issues, &self.config.overlay, now.date())?;
                if annotated.applied == 0 {
                    tracing::warn!("no fixed issue carries a position; delivering the original pages");
                }
                Artifact::new(
                    annotated.bytes,
                    namer.dated(&request.file_name, now.date(), "pdf"),
                    mime::PDF,
                )
            }
            Route::WordReport => {
                let outcome = self.report_chain.run(&StrategyInput {
                    file_name: &request.file_name,
                    issues: &request.issues,
                    edited_content: request.edited(),
                    generated: now,
                    namer: &namer,
                })?;
                return Ok(if outcome.degraded() {
                    Produced::Degraded(outcome.artifact)
                } else {
                    Produced::Artifact(outcome.artifact)
                });
            }
            Route::PlainText => Artifact::new(
                export_as_text(&request.file_name, request.edited(), now.date()).into_bytes(),
                namer.undated(&request.file_name, "txt"),
                mime::TEXT,
            ),
        };
        Ok(Produced::Artifact(artifact))
    }

    fn deliver(&self, artifact: &Artifact) -> Result<(), ExportError> {
        self.downloader
            .deliver(&artifact.bytes, &artifact.file_name, artifact.mime_type)?;
        tracing::info!(
            file_name = %artifact.file_name,
            bytes = artifact.bytes.len(),
            mime_type = artifact.mime_type,
            "artifact delivered"
        );
        Ok(())
    }

    fn reject(&self, error: ExportError) -> ExportOutcome {
        let message = error.user_message();
        tracing::warn!(error = %error, "export refused");
        self.notifier.alert(&message);
        ExportOutcome::Rejected { message }
    }

    fn fail(&self, route: Route, error: ExportError) -> ExportOutcome {
        if let ExportError::Validation(_) = error {
            return self.reject(error);
        }
        let message = error.user_message();
        tracing::error!(route = route.as_str(), error = %error, "export failed");
        self.notifier.alert(&message);
        if error.is_render_failure() {
            self.notifier.alert(GENERIC_FAILURE_MESSAGE);
        }
        ExportOutcome::Failed { message }
    }
}
