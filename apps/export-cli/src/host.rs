//! Native capabilities: files on disk and alerts on stderr

use review_export::naming::sanitize_filename;
use review_export::{Downloader, ExportError, Notifier};
use std::fs;
use std::path::PathBuf;

/// Writes delivered files into a directory.
pub struct FsDownloader {
    out_dir: PathBuf,
}

impl FsDownloader {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Where a delivered file lands. The name is sanitized so it can never
    /// leave the output directory.
    pub fn target(&self, file_name: &str) -> PathBuf {
        self.out_dir.join(sanitize_filename(file_name))
    }
}

impl Downloader for FsDownloader {
    fn deliver(&self, bytes: &[u8], file_name: &str, mime_type: &str) -> Result<(), ExportError> {
        fs::create_dir_all(&self.out_dir).map_err(|e| {
            ExportError::Delivery(format!("{}: {}", self.out_dir.display(), e))
        })?;
        let path = self.target(file_name);
        fs::write(&path, bytes)
            .map_err(|e| ExportError::Delivery(format!("{}: {}", path.display(), e)))?;
        tracing::info!(path = %path.display(), mime_type, bytes = bytes.len(), "wrote export");
        Ok(())
    }
}

/// Prints alerts to stderr.
#[derive(Debug, Default)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn alert(&self, message: &str) {
        eprintln!("{}", message);
    }
}
