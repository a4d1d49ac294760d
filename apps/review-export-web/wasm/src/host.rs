//! Browser capabilities: object-URL downloads, `window.alert`, an inert
//! staging document, image fetching and the JavaScript clock.

use chrono::{NaiveDate, NaiveDateTime};
use review_export::images::is_remote_source;
use review_export::stage::staged_markup;
use review_export::{
    Clock, ContainerId, Downloader, ExportError, ImageCache, Notifier, RasterImage, Stage,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Blob, BlobPropertyBag, Document, Element, HtmlAnchorElement, Response, Url,
};

fn js_message(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

fn document() -> Result<Document, ExportError> {
    web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| ExportError::Delivery("no document available".to_string()))
}

/// Saves files through a temporary object URL and a synthetic
/// `<a download>` click.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserDownloader;

impl BrowserDownloader {
    fn click_download(document: &Document, url: &str, file_name: &str) -> Result<(), JsValue> {
        let anchor: HtmlAnchorElement = document.create_element("a")?.dyn_into()?;
        anchor.set_href(url);
        anchor.set_download(file_name);
        let body = document
            .body()
            .ok_or_else(|| JsValue::from_str("document has no body"))?;
        body.append_child(&anchor)?;
        anchor.click();
        anchor.remove();
        Ok(())
    }
}

impl Downloader for BrowserDownloader {
    fn deliver(&self, bytes: &[u8], file_name: &str, mime_type: &str) -> Result<(), ExportError> {
        let document = document()?;

        let parts = js_sys::Array::of1(&js_sys::Uint8Array::from(bytes));
        let options = BlobPropertyBag::new();
        options.set_type(mime_type);
        let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options)
            .map_err(|e| ExportError::Delivery(js_message(&e)))?;
        let url = Url::create_object_url_with_blob(&blob)
            .map_err(|e| ExportError::Delivery(js_message(&e)))?;

        let clicked = Self::click_download(&document, &url, file_name);
        // The URL is released whether or not the click went through
        let _ = Url::revoke_object_url(&url);
        clicked.map_err(|e| ExportError::Delivery(js_message(&e)))?;

        tracing::debug!(file_name, mime_type, bytes = bytes.len(), "download triggered");
        Ok(())
    }
}

/// Shows messages with `window.alert` and mirrors them to the console.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlertNotifier;

impl Notifier for AlertNotifier {
    fn alert(&self, message: &str) {
        web_sys::console::error_1(&JsValue::from_str(message));
        if let Some(window) = web_sys::window() {
            let _ = window.alert_with_message(message);
        }
    }
}

/// Stages HTML in a container inside a detached document.
///
/// The staging document comes from `document.implementation` and has no
/// browsing context: scripts in edited content never run, inline handlers
/// never fire, and nothing is attached to the live page. The browser still
/// parses and normalizes the markup, which is what the renderer reads back.
#[derive(Default)]
pub struct DomStage {
    next_id: Cell<u64>,
    staging: RefCell<Option<Document>>,
    mounted: RefCell<HashMap<u64, Element>>,
}

impl DomStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mounted_count(&self) -> usize {
        self.mounted.borrow().len()
    }

    fn staging_document(&self) -> Result<Document, ExportError> {
        if let Some(staging) = self.staging.borrow().as_ref() {
            return Ok(staging.clone());
        }
        let staging = document()?
            .implementation()
            .and_then(|implementation| implementation.create_html_document())
            .map_err(|e| ExportError::Render(js_message(&e)))?;
        *self.staging.borrow_mut() = Some(staging.clone());
        Ok(staging)
    }
}

impl Stage for DomStage {
    fn mount(&self, html: &str, width_px: u32) -> Result<ContainerId, ExportError> {
        let render_err = |e: JsValue| ExportError::Render(js_message(&e));
        let staging = self.staging_document()?;
        let container = staging.create_element("div").map_err(render_err)?;
        container
            .set_attribute("style", &format!("width:{}px;background:#fff", width_px))
            .map_err(render_err)?;
        container.set_inner_html(&staged_markup(html, width_px));
        staging
            .body()
            .ok_or_else(|| ExportError::Render("staging document has no body".to_string()))?
            .append_child(&container)
            .map_err(render_err)?;

        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.mounted.borrow_mut().insert(id, container);
        Ok(ContainerId(id))
    }

    fn settle(&self, delay: Duration) {
        // The session awaits the delay before the synchronous render starts
        tracing::trace!(delay_ms = delay.as_millis() as u64, "settle already awaited");
    }

    fn unmount(&self, id: ContainerId) {
        if let Some(container) = self.mounted.borrow_mut().remove(&id.0) {
            container.remove();
        }
    }

    fn is_mounted(&self, id: ContainerId) -> bool {
        self.mounted.borrow().contains_key(&id.0)
    }

    fn markup(&self, id: ContainerId) -> Option<String> {
        self.mounted
            .borrow()
            .get(&id.0)
            .map(|container| container.inner_html())
    }
}

/// Fetch an image and decode it.
pub async fn fetch_image(src: &str) -> Result<RasterImage, ExportError> {
    let image_err = |e: JsValue| ExportError::Image(format!("{}: {}", src, js_message(&e)));
    let window =
        web_sys::window().ok_or_else(|| ExportError::Image("no window available".to_string()))?;

    let response: Response = JsFuture::from(window.fetch_with_str(src))
        .await
        .map_err(image_err)?
        .dyn_into()
        .map_err(image_err)?;
    if !response.ok() {
        return Err(ExportError::Image(format!(
            "{}: HTTP {}",
            src,
            response.status()
        )));
    }

    let buffer = JsFuture::from(response.array_buffer().map_err(image_err)?)
        .await
        .map_err(image_err)?;
    RasterImage::from_bytes(js_sys::Uint8Array::new(&buffer).to_vec())
}

/// Load every remote source into `cache`, one at a time. Each image either
/// loads or fails; failures are logged and left for the renderer to skip.
/// Returns how many images were loaded.
pub async fn prefetch_images(cache: &ImageCache, sources: &[&str]) -> usize {
    let mut loaded = 0;
    for src in sources {
        if !is_remote_source(src) || cache.contains(src) {
            continue;
        }
        match fetch_image(src).await {
            Ok(image) => {
                cache.insert(src, image);
                loaded += 1;
            }
            Err(e) => tracing::warn!(src = *src, error = %e, "image failed to load"),
        }
    }
    loaded
}

/// Resolve after `delay` on the page's timer.
pub async fn sleep(delay: Duration) -> Result<(), JsValue> {
    let ms = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let scheduled = web_sys::window().map(|window| {
            window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
        });
        if !matches!(scheduled, Some(Ok(_))) {
            let _ = resolve.call0(&JsValue::NULL);
        }
    });
    JsFuture::from(promise).await.map(|_| ())
}

/// Local time from `new Date()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsClock;

impl Clock for JsClock {
    fn now(&self) -> NaiveDateTime {
        let now = js_sys::Date::new_0();
        NaiveDate::from_ymd_opt(now.get_full_year() as i32, now.get_month() + 1, now.get_date())
            .and_then(|date| date.and_hms_opt(now.get_hours(), now.get_minutes(), now.get_seconds()))
            .unwrap_or_default()
    }
}
