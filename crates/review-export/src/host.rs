//! Host capabilities the pipeline needs from its environment
//!
//! In a browser these are an object URL + anchor click, `window.alert` and
//! `Date.now()`. Natively they are a directory on disk, stderr and the
//! system clock. The in-memory versions here collect what the pipeline
//! produced so callers can inspect it.

use crate::error::ExportError;
use chrono::{Local, NaiveDateTime};
use std::sync::Mutex;

/// Hands a finished file to the user.
pub trait Downloader {
    fn deliver(&self, bytes: &[u8], file_name: &str, mime_type: &str) -> Result<(), ExportError>;
}

/// Shows a blocking, user-visible message.
pub trait Notifier {
    fn alert(&self, message: &str);
}

/// Source of the local time used in file names and report headers.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// A file delivered to a `MemoryDownloader`.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivered {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

/// Keeps delivered files in memory.
#[derive(Debug, Default)]
pub struct MemoryDownloader {
    delivered: Mutex<Vec<Delivered>>,
}

impl MemoryDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Delivered> {
        self.delivered
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.delivered.lock().map(|d| d.len()).unwrap_or(0)
    }
}

impl Downloader for MemoryDownloader {
    fn deliver(&self, bytes: &[u8], file_name: &str, mime_type: &str) -> Result<(), ExportError> {
        let mut delivered = self
            .delivered
            .lock()
            .map_err(|e| ExportError::Delivery(e.to_string()))?;
        delivered.push(Delivered {
            bytes: bytes.to_vec(),
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
        });
        Ok(())
    }
}

/// Keeps alert messages in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    alerts: Mutex<Vec<String>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

impl Notifier for MemoryNotifier {
    fn alert(&self, message: &str) {
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.push(message.to_string());
        }
    }
}

impl<T: Downloader + ?Sized> Downloader for &T {
    fn deliver(&self, bytes: &[u8], file_name: &str, mime_type: &str) -> Result<(), ExportError> {
        (**self).deliver(bytes, file_name, mime_type)
    }
}

impl<T: Notifier + ?Sized> Notifier for &T {
    fn alert(&self, message: &str) {
        (**self).alert(message)
    }
}
