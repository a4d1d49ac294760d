//! Export configuration
//!
//! TOML-based settings for page geometry, rendering, overlay styling and
//! file naming. Every field has a default, so an empty file is valid.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// A4 in PDF points.
pub const A4_WIDTH_PT: f64 = 595.28;
pub const A4_HEIGHT_PT: f64 = 841.89;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExportConfig {
    #[serde(default)]
    pub page: PageConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub naming: NamingConfig,
}

impl ExportConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    ///
    /// ```
    /// use review_export::config::ExportConfig;
    ///
    /// let config = ExportConfig::from_str("[render]\nsettle_delay_ms = 0").unwrap();
    /// assert_eq!(config.render.settle_delay_ms, 0);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject geometry that would leave no room for content.
    pub fn validate(&self) -> anyhow::Result<()> {
        let page = &self.page;
        if page.width <= 0.0 || page.height <= 0.0 {
            anyhow::bail!("page dimensions must be positive");
        }
        if page.margin * 2.0 >= page.width || page.margin * 2.0 >= page.height {
            anyhow::bail!("page margins leave no printable area");
        }
        if page.container_width_px == 0 {
            anyhow::bail!("container_width_px must be non-zero");
        }
        if page.capture_scale <= 0.0 {
            anyhow::bail!("capture_scale must be positive");
        }
        if self.naming.prefix.trim().is_empty() {
            anyhow::bail!("naming prefix must not be empty");
        }
        Ok(())
    }
}

/// Output page for HTML rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageConfig {
    #[serde(default = "default_page_width")]
    pub width: f64,
    #[serde(default = "default_page_height")]
    pub height: f64,
    /// Uniform margin on all four sides, in points
    #[serde(default = "default_margin")]
    pub margin: f64,
    /// Nominal width of the off-screen container, emulating a printed page
    #[serde(default = "default_container_width")]
    pub container_width_px: u32,
    /// Pixel density of captured images
    #[serde(default = "default_capture_scale")]
    pub capture_scale: f64,
}

fn default_page_width() -> f64 {
    A4_WIDTH_PT
}

fn default_page_height() -> f64 {
    A4_HEIGHT_PT
}

fn default_margin() -> f64 {
    36.0
}

fn default_container_width() -> u32 {
    794
}

fn default_capture_scale() -> f64 {
    2.0
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            width: default_page_width(),
            height: default_page_height(),
            margin: default_margin(),
            container_width_px: default_container_width(),
            capture_scale: default_capture_scale(),
        }
    }
}

impl PageConfig {
    pub fn content_width(&self) -> f64 {
        self.width - 2.0 * self.margin
    }

    pub fn content_height(&self) -> f64 {
        self.height - 2.0 * self.margin
    }

    /// Points per CSS pixel of the off-screen container.
    pub fn px_to_pt(&self) -> f64 {
        self.content_width() / self.container_width_px as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderConfig {
    /// Fixed wait before capture so layout can stabilise
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_base_font_size")]
    pub base_font_size: f64,
    #[serde(default = "default_line_height")]
    pub line_height: f64,
}

fn default_settle_delay() -> u64 {
    800
}

fn default_base_font_size() -> f64 {
    11.0
}

fn default_line_height() -> f64 {
    1.4
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
            base_font_size: default_base_font_size(),
            line_height: default_line_height(),
        }
    }
}

impl RenderConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverlayConfig {
    /// Suggestion text size as a fraction of box height
    #[serde(default = "default_font_ratio")]
    pub font_size_ratio: f64,
    #[serde(default = "default_min_font_size")]
    pub min_font_size: f64,
    #[serde(default = "default_text_inset")]
    pub text_inset: f64,
    #[serde(default = "default_border_width")]
    pub border_width: f64,
    /// RGB, 0-1 range
    #[serde(default = "default_border_color")]
    pub border_color: [f64; 3],
    #[serde(default = "default_true")]
    pub footnote: bool,
}

fn default_font_ratio() -> f64 {
    0.7
}

fn default_min_font_size() -> f64 {
    8.0
}

fn default_text_inset() -> f64 {
    2.0
}

fn default_border_width() -> f64 {
    0.5
}

fn default_border_color() -> [f64; 3] {
    [0.0, 0.6, 0.0]
}

fn default_true() -> bool {
    true
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            font_size_ratio: default_font_ratio(),
            min_font_size: default_min_font_size(),
            text_inset: default_text_inset(),
            border_width: default_border_width(),
            border_color: default_border_color(),
            footnote: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamingConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    "Corrected".to_string()
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}
