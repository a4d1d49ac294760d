//! Export session held on the Rust side
//!
//! The page builds one `ReviewExportSession` and awaits `exportDocument` with
//! the request object the review view already has. Delivery and alerts
//! happen inside the call; the resolved object only reports how it went.

use crate::host::{prefetch_images, sleep, AlertNotifier, BrowserDownloader, DomStage, JsClock};
use review_export::html::{image_sources, parse_blocks};
use review_export::images::is_remote_source;
use review_export::{
    select_route, ExportConfig, ExportError, ExportOutcome, ExportRequest, Exporter, ImageCache,
    Notifier, Route,
};
use serde::Serialize;
use std::cell::Cell;
use std::sync::Arc;
use wasm_bindgen::prelude::*;

/// Outcome of one export as seen by JavaScript.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeView {
    pub success: bool,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&ExportOutcome> for OutcomeView {
    fn from(outcome: &ExportOutcome) -> Self {
        let (status, route, message) = match outcome {
            ExportOutcome::Delivered { route, .. } => ("delivered", Some(route.as_str()), None),
            ExportOutcome::Degraded { .. } => ("degraded", None, None),
            ExportOutcome::Rejected { message } => ("rejected", None, Some(message.clone())),
            ExportOutcome::Failed { message } => ("failed", None, Some(message.clone())),
        };
        Self {
            success: outcome.is_success(),
            status,
            route,
            file_name: outcome.file_name().map(str::to_string),
            message,
        }
    }
}

/// Parse an optional TOML configuration passed from the page.
fn session_config(config_toml: Option<&str>) -> Result<ExportConfig, ExportError> {
    match config_toml.map(str::trim).filter(|s| !s.is_empty()) {
        Some(toml) => {
            ExportConfig::from_str(toml).map_err(|e| ExportError::Config(format!("{:#}", e)))
        }
        None => Ok(ExportConfig::default()),
    }
}

/// Accepts either a JSON string or a plain JavaScript object.
fn parse_request(request: JsValue) -> Result<ExportRequest, JsValue> {
    if let Some(json) = request.as_string() {
        return ExportRequest::from_json(&json).map_err(|e| JsValue::from_str(&e.to_string()));
    }
    serde_wasm_bindgen::from_value(request)
        .map_err(|e| JsValue::from_str(&format!("Invalid export request: {}", e)))
}

/// Remote images a request will need before it can be rendered.
fn remote_images(request: &ExportRequest) -> Vec<String> {
    let route = select_route(request.format, request.file_kind(), request.edited().is_some());
    match (route, request.edited()) {
        (Route::HtmlToPdf, Some(edited)) => image_sources(&parse_blocks(edited))
            .into_iter()
            .filter(|src| is_remote_source(src))
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn to_js(outcome: &ExportOutcome) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&OutcomeView::from(outcome))
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Set while an export is loading images; cleared on drop.
struct Preparing<'s>(&'s Cell<bool>);

impl<'s> Preparing<'s> {
    fn claim(flag: &'s Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            return None;
        }
        Some(Self(flag))
    }
}

impl Drop for Preparing<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Export session bound to the current page
#[wasm_bindgen]
pub struct ReviewExportSession {
    exporter: Exporter<'static>,
    images: Arc<ImageCache>,
    preparing: Cell<bool>,
}

#[wasm_bindgen]
impl ReviewExportSession {
    /// Create a session, optionally with a TOML configuration string
    #[wasm_bindgen(constructor)]
    pub fn new(config_toml: Option<String>) -> Result<ReviewExportSession, JsValue> {
        let config = session_config(config_toml.as_deref())
            .map_err(|e| JsValue::from_str(&e.user_message()))?;
        let images = Arc::new(ImageCache::new());
        let exporter = Exporter::new(BrowserDownloader, AlertNotifier)
            .with_stage(DomStage::new())
            .with_resolver(Arc::clone(&images))
            .with_clock(JsClock)
            .with_config(config);
        Ok(Self {
            exporter,
            images,
            preparing: Cell::new(false),
        })
    }

    /// True while an export is loading images or running
    #[wasm_bindgen(getter, js_name = isBusy)]
    pub fn is_busy(&self) -> bool {
        self.preparing.get() || self.exporter.is_busy()
    }

    /// Export the corrected document in the format named by the request.
    ///
    /// Remote images in edited content are fetched first, each one either
    /// loading or failing, then the configured settle delay is awaited
    /// before the document is rendered and downloaded.
    #[wasm_bindgen(js_name = exportDocument)]
    pub async fn export_document(&self, request: JsValue) -> Result<JsValue, JsValue> {
        let request = parse_request(request)?;
        let Some(_preparing) = Preparing::claim(&self.preparing) else {
            return to_js(&self.refuse_busy());
        };

        let remote = remote_images(&request);
        if !remote.is_empty() {
            let sources: Vec<&str> = remote.iter().map(String::as_str).collect();
            let loaded = prefetch_images(&self.images, &sources).await;
            tracing::debug!(requested = sources.len(), loaded, "remote images prefetched");
        }
        if request.edited().is_some() {
            sleep(self.exporter.config().render.settle_delay()).await?;
        }

        let outcome = self.exporter.export(&request);
        self.images.clear();
        if !outcome.is_success() {
            tracing::warn!(?outcome, "export did not complete");
        }
        to_js(&outcome)
    }

    /// Download the edited content as plain text
    #[wasm_bindgen(js_name = exportText)]
    pub fn export_text(&self, request: JsValue) -> Result<JsValue, JsValue> {
        let request = parse_request(request)?;
        if self.preparing.get() {
            return to_js(&self.refuse_busy());
        }
        to_js(&self.exporter.export_text(&request))
    }
}

impl ReviewExportSession {
    fn refuse_busy(&self) -> ExportOutcome {
        let message = ExportError::Busy.user_message();
        AlertNotifier.alert(&message);
        ExportOutcome::Rejected { message }
    }
}
