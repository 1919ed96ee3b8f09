// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Builder for configured reads.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::Result;
use crate::device::{Device, FileDevice, OpenMode};
use crate::io::options::IoOptions;
use crate::io::registry::HandlerRegistry;
use crate::model::Trial;

/// Configuration of a read.
#[derive(Debug, Clone, Default)]
pub struct ReaderConfig {
    /// Path to the file to read
    pub path: PathBuf,
    /// Handler name or extension; detected from the content when `None`
    pub format: Option<String>,
    /// Handler options
    pub options: IoOptions,
}

/// Builder for reading a trial file.
#[derive(Debug, Clone, Default)]
pub struct ReaderBuilder {
    config: ReaderConfig,
}

impl ReaderBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the path to the file.
    pub fn path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.path = path.as_ref().to_path_buf();
        self
    }

    /// Force the handler, by name or extension.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.config.format = Some(format.into());
        self
    }

    /// Set the handler options.
    pub fn options(mut self, options: IoOptions) -> Self {
        self.config.options = options;
        self
    }

    /// Configuration built so far.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Open the file and decode it.
    ///
    /// # Errors
    ///
    /// - [`TrialError::Device`](crate::TrialError::Device) if the file cannot be opened
    /// - [`TrialError::UnknownFormat`](crate::TrialError::UnknownFormat) or
    ///   [`TrialError::NotReadable`](crate::TrialError::NotReadable) for a
    ///   forced format no handler can read
    /// - [`TrialError::NoMatch`](crate::TrialError::NoMatch) if detection fails
    /// - [`TrialError::Decode`](crate::TrialError::Decode) if decoding fails
    pub fn read(self) -> Result<Trial> {
        let registry = HandlerRegistry::with_options(&self.config.options);
        let mut device = FileDevice::open(&self.config.path, OpenMode::Read)?;
        debug!(
            context = "reader",
            path = %self.config.path.display(),
            format = ?self.config.format,
            size = device.size(),
            "Reading trial"
        );
        match &self.config.format {
            Some(format) => registry.read_as(&mut device, format),
            None => registry.read(&mut device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TrialError;

    #[test]
    fn test_builder_default() {
        let builder = ReaderBuilder::new();
        assert_eq!(builder.config().format, None);
        assert_eq!(builder.config().options, IoOptions::default());
    }

    #[test]
    fn test_builder_fluent() {
        let builder = ReaderBuilder::new().path("walk.c3d").format("trc");
        assert_eq!(builder.config().path, PathBuf::from("walk.c3d"));
        assert_eq!(builder.config().format.as_deref(), Some("trc"));
    }

    #[test]
    fn test_builder_missing_path() {
        let err = ReaderBuilder::new().read().unwrap_err();
        assert!(matches!(err, TrialError::Device(_)));
    }

    #[test]
    fn test_builder_file_not_found() {
        let err = ReaderBuilder::new()
            .path("/nonexistent/walk.c3d")
            .read()
            .unwrap_err();
        assert!(matches!(err, TrialError::Device(_)));
    }

    #[test]
    fn test_unknown_forced_format() {
        let path = std::env::temp_dir().join(format!("mocodec_reader_{}.bin", std::process::id()));
        let mut device = FileDevice::open(&path, OpenMode::Write).unwrap();
        device.write_all(b"data").unwrap();
        device.flush().unwrap();
        drop(device);

        let err = ReaderBuilder::new()
            .path(&path)
            .format("mcap")
            .read()
            .unwrap_err();
        assert_eq!(err, TrialError::UnknownFormat("mcap".to_string()));
        let _ = std::fs::remove_file(&path);
    }
}
