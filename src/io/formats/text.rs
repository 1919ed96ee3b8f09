// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Tab-separated text helpers shared by the text handlers.

use crate::core::DecodeError;
use crate::device::Device;

/// One line of a text file.
#[derive(Debug, Clone)]
pub(crate) struct Line {
    /// Byte offset of the first character
    pub offset: u64,
    /// Content without the line terminator
    pub text: String,
}

impl Line {
    /// Tab-separated fields, trimmed of surrounding spaces.
    pub fn fields(&self) -> Vec<&str> {
        self.text.split('\t').map(str::trim).collect()
    }

    /// Check if the line holds only whitespace.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Read the whole device as lines.
///
/// Accepts `\n` and `\r\n` terminators; invalid UTF-8 is replaced.
pub(crate) fn read_lines(
    device: &mut dyn Device,
    format: &'static str,
) -> Result<Vec<Line>, DecodeError> {
    device
        .seek(0)
        .map_err(|e| DecodeError::device(format, "file", e))?;
    let data = device
        .read_to_end()
        .map_err(|e| DecodeError::device(format, "file", e))?;
    Ok(split_lines(&data))
}

fn split_lines(data: &[u8]) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut start = 0usize;
    while start < data.len() {
        let end = data[start..]
            .iter()
            .position(|b| *b == b'\n')
            .map_or(data.len(), |p| start + p);
        let mut content = &data[start..end];
        if let Some(stripped) = content.strip_suffix(b"\r") {
            content = stripped;
        }
        lines.push(Line {
            offset: start as u64,
            text: String::from_utf8_lossy(content).into_owned(),
        });
        start = end + 1;
    }
    lines
}

/// Parse a real field; empty fields yield `None`.
pub(crate) fn parse_real(
    field: &str,
    format: &'static str,
    line: &Line,
    context: &str,
) -> Result<Option<f64>, DecodeError> {
    if field.is_empty() {
        return Ok(None);
    }
    field.parse::<f64>().map(Some).map_err(|_| {
        DecodeError::malformed(
            format,
            line.offset,
            context,
            format!("expected a number, found '{field}'"),
        )
    })
}

/// Format a real so that parsing it back yields the same value.
pub(crate) fn format_real(value: f64) -> String {
    format!("{value}")
}
