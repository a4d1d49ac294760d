//! Off-screen staging area for HTML that is about to be rendered
//!
//! The renderer mounts edited content into a container of the nominal page
//! width, waits for it to settle, captures it, then removes it. Removal is
//! tied to `StageGuard` so the container never outlives the render.

use crate::error::ExportError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Print styles applied to staged content: black on white, serif body,
/// images capped to the container width, bordered tables.
pub const PRINT_STYLESHEET: &str = "\
body,div{background:#fff;color:#000;font-family:'Times New Roman',serif;font-size:12pt;line-height:1.4}\
img{max-width:100%;height:auto}\
table{border-collapse:collapse;width:100%}\
td,th{border:1px solid #000;padding:4px}\
h1{font-size:24pt}h2{font-size:20pt}h3{font-size:16pt}\
h4{font-size:14pt}h5{font-size:13pt}h6{font-size:12pt}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(pub u64);

/// Somewhere staged HTML can live while it is laid out.
pub trait Stage {
    /// Mount `html` inside a new container `width_px` wide.
    fn mount(&self, html: &str, width_px: u32) -> Result<ContainerId, ExportError>;

    /// Wait for layout and fonts to settle.
    fn settle(&self, delay: Duration);

    fn unmount(&self, id: ContainerId);

    fn is_mounted(&self, id: ContainerId) -> bool;

    /// Markup of a mounted container as the stage holds it after mounting.
    fn markup(&self, id: ContainerId) -> Option<String>;
}

impl<T: Stage + ?Sized> Stage for &T {
    fn mount(&self, html: &str, width_px: u32) -> Result<ContainerId, ExportError> {
        (**self).mount(html, width_px)
    }

    fn settle(&self, delay: Duration) {
        (**self).settle(delay)
    }

    fn unmount(&self, id: ContainerId) {
        (**self).unmount(id)
    }

    fn is_mounted(&self, id: ContainerId) -> bool {
        (**self).is_mounted(id)
    }

    fn markup(&self, id: ContainerId) -> Option<String> {
        (**self).markup(id)
    }
}

/// Wrap content in the staging container markup.
pub fn staged_markup(html: &str, width_px: u32) -> String {
    format!(
        "<style>{}</style><div style=\"width:{}px;padding:0;margin:0\">{}</div>",
        PRINT_STYLESHEET, width_px, html
    )
}

/// Unmounts its container when dropped.
pub struct StageGuard<'a, S: Stage + ?Sized> {
    stage: &'a S,
    id: ContainerId,
}

impl<'a, S: Stage + ?Sized> StageGuard<'a, S> {
    pub fn mount(stage: &'a S, html: &str, width_px: u32) -> Result<Self, ExportError> {
        let id = stage.mount(html, width_px)?;
        tracing::debug!(container = id.0, width_px, "staged content mounted");
        Ok(Self { stage, id })
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn settle(&self, delay: Duration) {
        self.stage.settle(delay);
    }

    /// The staged markup, which is what gets laid out.
    pub fn markup(&self) -> Result<String, ExportError> {
        self.stage
            .markup(self.id)
            .ok_or_else(|| ExportError::Render("staged content is no longer mounted".into()))
    }
}

impl<S: Stage + ?Sized> Drop for StageGuard<'_, S> {
    fn drop(&mut self) {
        self.stage.unmount(self.id);
        tracing::debug!(container = self.id.0, "staged content unmounted");
    }
}

#[derive(Debug, Clone)]
struct Container {
    markup: String,
    width_px: u32,
}

/// In-memory stage. Settling sleeps for the requested delay.
#[derive(Debug, Default)]
pub struct MemoryStage {
    containers: Mutex<HashMap<ContainerId, Container>>,
    next_id: AtomicU64,
    skip_settle: bool,
}

impl MemoryStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stage whose `settle` returns immediately.
    pub fn instant() -> Self {
        Self {
            skip_settle: true,
            ..Self::default()
        }
    }

    pub fn mounted_count(&self) -> usize {
        self.containers.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn width_px(&self, id: ContainerId) -> Option<u32> {
        self.containers
            .lock()
            .ok()
            .and_then(|c| c.get(&id).map(|container| container.width_px))
    }
}

impl Stage for MemoryStage {
    fn mount(&self, html: &str, width_px: u32) -> Result<ContainerId, ExportError> {
        let id = ContainerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut containers = self
            .containers
            .lock()
            .map_err(|e| ExportError::Render(e.to_string()))?;
        containers.insert(
            id,
            Container {
                markup: staged_markup(html, width_px),
                width_px,
            },
        );
        Ok(id)
    }

    fn settle(&self, delay: Duration) {
        if !self.skip_settle && !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }

    fn unmount(&self, id: ContainerId) {
        if let Ok(mut containers) = self.containers.lock() {
            containers.remove(&id);
        }
    }

    fn is_mounted(&self, id: ContainerId) -> bool {
        self.containers
            .lock()
            .map(|c| c.contains_key(&id))
            .unwrap_or(false)
    }
    fn markup(&self, id: ContainerId) -> Option<String> {
        self.containers
            .lock()
            .ok()
            .and_then(|c| c.get(&id).map(|container| container.markup.clone()))
    }
}
