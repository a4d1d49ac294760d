//! WASM bindings for the review export pipeline
//!
//! Wires `review-export` to browser capabilities: downloads go through an
//! object URL and a synthetic anchor click, messages through `window.alert`,
//! staged HTML through a detached document, and remote images in edited
//! content are fetched before rendering.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { ReviewExportSession } from './pkg/review_export_wasm.js';
//!
//! await init();
//!
//! const session = new ReviewExportSession();
//! const result = await session.exportDocument({
//!   fileName: "thesis.pdf",
//!   mimeType: "application/pdf",
//!   originalBase64,
//!   issues,
//!   editedContent,
//!   format: "pdf",
//! });
//! if (!result.success) console.warn(result.status, result.message);
//! ```

pub mod host;
pub mod session;

use wasm_bindgen::prelude::*;

pub use host::{AlertNotifier, BrowserDownloader, DomStage, JsClock};
pub use session::{OutcomeView, ReviewExportSession};

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
