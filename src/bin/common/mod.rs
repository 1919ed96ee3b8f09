// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for CLI commands.

use std::io::IsTerminal as _;
use std::path::Path;

use anyhow::Context as _;
use serde::Serialize;

use mocodec::device::{FileDevice, OpenMode};
use mocodec::io::{HandlerRegistry, IoOptions, ProbeOutcome};
use mocodec::{Trial, TrialError};

pub use anyhow::Result as CliResult;
pub type Result<T = ()> = CliResult<T>;

/// Load handler options from a TOML file, or defaults without one.
pub fn load_options(path: Option<&Path>) -> Result<IoOptions> {
    match path {
        Some(path) => Ok(IoOptions::from_file(path)?),
        None => Ok(IoOptions::default()),
    }
}

/// Decode a trial, returning the name of the handler used.
///
/// `format` forces a handler; otherwise the content decides.
pub fn load_trial(
    registry: &HandlerRegistry,
    path: &Path,
    format: Option<&str>,
) -> Result<(&'static str, Trial)> {
    let mut device = FileDevice::open(path, OpenMode::Read)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let handler = match format {
        Some(format) => registry
            .handler(format)
            .ok_or_else(|| TrialError::UnknownFormat(format.to_string()))?,
        None => match registry.probe(&mut device) {
            ProbeOutcome::Matched(handler) => handler,
            ProbeOutcome::NoMatch { sampled } => return Err(TrialError::NoMatch { sampled }.into()),
        },
    };
    let trial = registry
        .read_as(&mut device, handler.name())
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok((handler.name(), trial))
}

/// Format a duration in seconds to human-readable string.
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0ms".to_string();
    }
    let millis = (seconds * 1000.0).round() as u64;
    let secs = millis / 1000;
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}.{:03}s", secs, millis % 1000)
    } else {
        format!("{}ms", millis)
    }
}

/// Format a timestamp in nanoseconds since the epoch.
pub fn format_timestamp(nanos: i64) -> String {
    let datetime = chrono::DateTime::<chrono::Utc>::from_timestamp_nanos(nanos);
    datetime.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string()
}

/// Print `value` as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Progress bar wrapper for consistent progress reporting.
///
/// Hidden when stderr is not a terminal.
pub struct ProgressBar {
    inner: Option<indicatif::ProgressBar>,
}

impl ProgressBar {
    /// Create a new progress bar.
    pub fn new(total: u64, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let inner = if std::io::stderr().is_terminal() {
            let pb = indicatif::ProgressBar::new(total);
            if let Ok(style) = indicatif::ProgressStyle::default_bar()
                .template("{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
            {
                pb.set_style(style.progress_chars("=>-"));
            }
            pb.set_prefix(prefix);
            Some(pb)
        } else {
            None
        };

        Self { inner }
    }

    /// Advance by one item.
    pub fn inc(&self) {
        if let Some(pb) = &self.inner {
            pb.inc(1);
        }
    }

    /// Finish the progress bar with a message.
    pub fn finish_with_message(&self, msg: String) {
        if let Some(pb) = &self.inner {
            pb.finish_with_message(msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.5), "500ms");
        assert_eq!(format_duration(1.5), "1.500s");
        assert_eq!(format_duration(90.0), "1m 30s");
        assert_eq!(format_duration(3600.0), "1h 0m");
        assert_eq!(format_duration(f64::NAN), "0ms");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00.000 UTC");
        assert_eq!(
            format_timestamp(1_500_000_000),
            "1970-01-01 00:00:01.500 UTC"
        );
    }

    #[test]
    fn test_default_options_without_file() {
        assert_eq!(load_options(None).unwrap(), IoOptions::default());
    }
}
