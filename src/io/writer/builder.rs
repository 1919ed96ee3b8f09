// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Builder for configured writes.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::{Result, TrialError};
use crate::device::{FileDevice, OpenMode};
use crate::io::detection::extension_of;
use crate::io::options::IoOptions;
use crate::io::registry::HandlerRegistry;
use crate::model::Trial;

/// Configuration of a write.
#[derive(Debug, Clone, Default)]
pub struct WriterConfig {
    /// Path to the output file
    pub path: PathBuf,
    /// Handler name or extension; taken from `path` when `None`
    pub format: Option<String>,
    /// Handler options
    pub options: IoOptions,
    /// Keep the output file when encoding fails
    pub keep_incomplete: bool,
}

/// Builder for writing a trial file.
#[derive(Debug, Clone, Default)]
pub struct WriterBuilder {
    config: WriterConfig,
}

impl WriterBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the path to the output file.
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

    /// Keep the output file when encoding fails.
    pub fn keep_incomplete(mut self, keep: bool) -> Self {
        self.config.keep_incomplete = keep;
        self
    }

    /// Configuration built so far.
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    fn format_name(&self) -> Result<String> {
        if let Some(format) = &self.config.format {
            return Ok(format.clone());
        }
        let path = self.config.path.to_string_lossy();
        extension_of(&path).ok_or_else(|| TrialError::UnknownFormat(path.to_string()))
    }

    /// Create the file and encode `trial` into it.
    ///
    /// The handler is resolved before the file is created, so an unknown or
    /// read-only format leaves the file system untouched.
    ///
    /// # Errors
    ///
    /// - [`TrialError::UnknownFormat`] if no handler matches the format
    /// - [`TrialError::NotWritable`] for a read-only format
    /// - [`TrialError::Device`] if the file cannot be created
    /// - [`TrialError::Encode`] if encoding fails
    pub fn write(self, trial: &Trial) -> Result<()> {
        let registry = HandlerRegistry::with_options(&self.config.options);
        let format = self.format_name()?;
        let handler = registry
            .handler(&format)
            .ok_or_else(|| TrialError::UnknownFormat(format.clone()))?;
        if !handler.capability().can_write() {
            return Err(TrialError::NotWritable(handler.name().to_string()));
        }

        let path = &self.config.path;
        debug!(
            context = "writer",
            path = %path.display(),
            handler = handler.name(),
            "Writing trial"
        );
        let mut device = FileDevice::open(path, OpenMode::Write)?;
        let result = registry.write(&mut device, trial, handler.name());
        drop(device);

        if let Err(err) = &result {
            if self.config.keep_incomplete {
                if err.is_incomplete_output() {
                    warn!(
                        context = "writer",
                        path = %path.display(),
                        "Keeping incomplete output"
                    );
                }
            } else if let Err(remove) = std::fs::remove_file(path) {
                warn!(
                    context = "writer",
                    path = %path.display(),
                    error = %remove,
                    "Failed to remove output after a failed write"
                );
            } else {
                debug!(
                    context = "writer",
                    path = %path.display(),
                    "Removed output after a failed write"
                );
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Analog, Point};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("mocodec_writer_{}_{name}", std::process::id()))
    }

    #[test]
    fn test_builder_fluent() {
        let builder = WriterBuilder::new()
            .path("out.c3d")
            .format("TRC")
            .keep_incomplete(true);
        assert_eq!(builder.config().path, PathBuf::from("out.c3d"));
        assert_eq!(builder.config().format.as_deref(), Some("TRC"));
        assert!(builder.config().keep_incomplete);
    }

    #[test]
    fn test_format_from_extension() {
        let builder = WriterBuilder::new().path("dir/walk.Trc");
        assert_eq!(builder.format_name().unwrap(), "trc");
        let builder = WriterBuilder::new().path("dir/walk");
        assert!(matches!(
            builder.format_name(),
            Err(TrialError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_read_only_format_creates_nothing() {
        let path = temp_path("walk.tsv");
        let trial = Trial::with_frames(100.0, 2).unwrap();
        let err = WriterBuilder::new().path(&path).write(&trial).unwrap_err();
        assert_eq!(err, TrialError::NotWritable("TSV".to_string()));
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_write_removes_output() {
        let path = temp_path("analog.trc");
        let trial = Trial::with_frames(100.0, 2).unwrap();
        trial
            .add_point(Point::with_coords("C7", vec![[1.0, 2.0, 3.0]; 2]))
            .unwrap();
        trial
            .add_analog(Analog::with_samples("EMG", vec![0.0; 2]))
            .unwrap();

        let err = WriterBuilder::new().path(&path).write(&trial).unwrap_err();
        assert!(matches!(err, TrialError::Encode(_)));
        assert!(!path.exists());

        let err = WriterBuilder::new()
            .path(&path)
            .keep_incomplete(true)
            .write(&trial)
            .unwrap_err();
        assert!(matches!(err, TrialError::Encode(_)));
        assert!(path.exists());
        let _ = std::fs::remove_file(&path);
    }
}
