// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! In-memory device.

use crate::core::DeviceError;

use super::{Device, OpenMode};

/// Device over an owned byte buffer.
///
/// Read-mode buffers reject seeks past the end; writable buffers grow on
/// demand and zero-fill any gap left by a forward seek.
#[derive(Debug, Clone)]
pub struct BufferDevice {
    name: String,
    data: Vec<u8>,
    position: u64,
    mode: OpenMode,
    writes: u64,
}

impl BufferDevice {
    /// Create a read-only device over `data`.
    pub fn new(data: Vec<u8>) -> Self {
        Self::with_mode("<memory>", data, OpenMode::Read)
    }

    /// Create a read-only device with a name used as extension hint.
    ///
    /// ```
    /// use mocodec::device::{BufferDevice, Device};
    ///
    /// let device = BufferDevice::named("walk.c3d", vec![]);
    /// assert_eq!(device.name(), "walk.c3d");
    /// ```
    pub fn named(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self::with_mode(name, data, OpenMode::Read)
    }

    /// Create an empty read-write device.
    pub fn writable() -> Self {
        Self::with_mode("<memory>", Vec::new(), OpenMode::ReadWrite)
    }

    /// Create a device with an explicit mode.
    ///
    /// `OpenMode::Write` discards `data`, mirroring a truncating file open.
    pub fn with_mode(name: impl Into<String>, data: Vec<u8>, mode: OpenMode) -> Self {
        let data = if mode == OpenMode::Write {
            Vec::new()
        } else {
            data
        };
        Self {
            name: name.into(),
            data,
            position: 0,
            mode,
            writes: 0,
        }
    }

    /// Borrow the buffer content.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the device and return the buffer.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    fn index(&self, position: u64) -> Result<usize, DeviceError> {
        usize::try_from(position).map_err(|_| DeviceError::OutOfRange {
            position,
            size: self.data.len() as u64,
        })
    }
}

impl Device for BufferDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> OpenMode {
        self.mode
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, position: u64) -> Result<(), DeviceError> {
        if !self.mode.can_write() && position > self.size() {
            return Err(DeviceError::OutOfRange {
                position,
                size: self.size(),
            });
        }
        self.position = position;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), DeviceError> {
        if !self.mode.can_read() {
            return Err(DeviceError::InvalidMode {
                mode: self.mode,
                operation: "reading",
            });
        }
        let available = self.remaining();
        if buf.len() as u64 > available {
            return Err(DeviceError::truncated(self.position, buf.len(), available));
        }
        let start = self.index(self.position)?;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        self.position += buf.len() as u64;
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), DeviceError> {
        if !self.mode.can_write() {
            return Err(DeviceError::InvalidMode {
                mode: self.mode,
                operation: "writing",
            });
        }
        self.writes += 1;
        let start = self.index(self.position)?;
        let end = start
            .checked_add(buf.len())
            .ok_or_else(|| DeviceError::write_failed(self.position, "buffer size overflow"))?;
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(buf);
        self.position = end as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn writes_attempted(&self) -> u64 {
        self.writes
    }
}
