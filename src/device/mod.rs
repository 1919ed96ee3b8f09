// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Random-access byte devices with per-call byte order.
//!
//! Format handlers never touch files or buffers directly; they talk to a
//! [`Device`], which provides absolute positioning and typed reads/writes.
//! The byte order is an argument of every typed call, so a handler can read
//! a little-endian header, discover a processor flag, and switch to big
//! endian for the payload on the same device.
//!
//! Two devices are provided:
//! - [`BufferDevice`] over an in-memory `Vec<u8>`
//! - [`FileDevice`] over a file (memory-mapped when opened for reading)
//!
//! # Example
//!
//! ```
//! use mocodec::device::{BufferDevice, Device, Endian};
//!
//! let mut device = BufferDevice::writable();
//! device.write_u16(Endian::Little, 0x0102)?;
//! device.write_u16(Endian::Big, 0x0102)?;
//! device.seek(0)?;
//! assert_eq!(device.read_u16(Endian::Little)?, 0x0102);
//! assert_eq!(device.read_u16(Endian::Big)?, 0x0102);
//! # Ok::<(), mocodec::DeviceError>(())
//! ```

pub mod buffer;
pub mod endian;
pub mod file;

pub use buffer::BufferDevice;
pub use endian::Endian;
pub use file::FileDevice;

use serde::{Deserialize, Serialize};

use crate::core::DeviceError;

/// Access mode of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpenMode {
    /// Read only; seeking past the end is an error
    Read,
    /// Write only; the source is truncated on open
    Write,
    /// Read and write; existing content is kept
    ReadWrite,
}

impl OpenMode {
    /// Whether reads are permitted.
    pub fn can_read(self) -> bool {
        matches!(self, OpenMode::Read | OpenMode::ReadWrite)
    }

    /// Whether writes are permitted.
    pub fn can_write(self) -> bool {
        matches!(self, OpenMode::Write | OpenMode::ReadWrite)
    }
}

impl std::fmt::Display for OpenMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenMode::Read => write!(f, "read"),
            OpenMode::Write => write!(f, "write"),
            OpenMode::ReadWrite => write!(f, "read-write"),
        }
    }
}

/// Seekable byte stream with endianness-aware typed access.
///
/// Implementors provide positioning and raw byte transfer; the typed
/// helpers are derived from those. A failed read leaves the position
/// unchanged.
pub trait Device: Send {
    /// File path or buffer name, used in diagnostics and as extension hint.
    fn name(&self) -> &str;

    /// Mode the device was opened with.
    fn mode(&self) -> OpenMode;

    /// Current size in bytes.
    fn size(&self) -> u64;

    /// Current absolute position.
    fn tell(&self) -> u64;

    /// Move to an absolute position.
    ///
    /// Positions past the end are accepted in write modes (the next write
    /// zero-fills the gap) and rejected with [`DeviceError::OutOfRange`] in
    /// read mode.
    fn seek(&mut self, position: u64) -> Result<(), DeviceError>;

    /// Fill `buf` from the current position.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), DeviceError>;

    /// Write `buf` at the current position.
    fn write_all(&mut self, buf: &[u8]) -> Result<(), DeviceError>;

    /// Push written bytes to the underlying medium.
    fn flush(&mut self) -> Result<(), DeviceError>;

    /// Number of `write_all` calls that reached the medium, failed ones
    /// included.
    fn writes_attempted(&self) -> u64;

    /// Bytes between the position and the end.
    fn remaining(&self) -> u64 {
        self.size().saturating_sub(self.tell())
    }

    /// Check if the position is at (or past) the end.
    fn is_at_end(&self) -> bool {
        self.tell() >= self.size()
    }

    /// Advance the position by `count` bytes.
    ///
    /// In read mode, skipping past the end reports a truncation.
    fn skip(&mut self, count: u64) -> Result<(), DeviceError> {
        let position = self.tell();
        if !self.mode().can_write() && count > self.remaining() {
            return Err(DeviceError::truncated(
                position,
                usize::try_from(count).unwrap_or(usize::MAX),
                self.remaining(),
            ));
        }
        self.seek(position.saturating_add(count))
    }

    /// Read `count` bytes.
    fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, DeviceError> {
        // Checked before allocating so corrupt lengths cannot exhaust memory.
        if count as u64 > self.remaining() {
            return Err(DeviceError::truncated(self.tell(), count, self.remaining()));
        }
        let mut buf = vec![0u8; count];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read everything from the position to the end.
    fn read_to_end(&mut self) -> Result<Vec<u8>, DeviceError> {
        let count = usize::try_from(self.remaining()).map_err(|_| DeviceError::OutOfRange {
            position: self.tell(),
            size: self.size(),
        })?;
        self.read_bytes(count)
    }

    /// Read `count` bytes as text, replacing invalid UTF-8.
    fn read_string(&mut self, count: usize) -> Result<String, DeviceError> {
        let bytes = self.read_bytes(count)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read up to `count` bytes without moving the position.
    ///
    /// Returns fewer bytes near the end of the device.
    fn peek(&mut self, count: usize) -> Result<Vec<u8>, DeviceError> {
        let position = self.tell();
        let available = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        let bytes = self.read_bytes(count.min(available))?;
        self.seek(position)?;
        Ok(bytes)
    }

    /// Read an unsigned byte.
    fn read_u8(&mut self) -> Result<u8, DeviceError> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Read a signed byte.
    fn read_i8(&mut self) -> Result<i8, DeviceError> {
        Ok(self.read_u8()? as i8)
    }

    /// Read a u16 value.
    fn read_u16(&mut self, endian: Endian) -> Result<u16, DeviceError> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(endian.decode_u16(&buf))
    }

    /// Read an i16 value.
    fn read_i16(&mut self, endian: Endian) -> Result<i16, DeviceError> {
        Ok(self.read_u16(endian)? as i16)
    }

    /// Read a u32 value.
    fn read_u32(&mut self, endian: Endian) -> Result<u32, DeviceError> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(endian.decode_u32(&buf))
    }

    /// Read an i32 value.
    fn read_i32(&mut self, endian: Endian) -> Result<i32, DeviceError> {
        Ok(self.read_u32(endian)? as i32)
    }

    /// Read an f32 value.
    fn read_f32(&mut self, endian: Endian) -> Result<f32, DeviceError> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(endian.decode_f32(&buf))
    }

    /// Read an f64 value.
    fn read_f64(&mut self, endian: Endian) -> Result<f64, DeviceError> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(endian.decode_f64(&buf))
    }

    /// Write an unsigned byte.
    fn write_u8(&mut self, value: u8) -> Result<(), DeviceError> {
        self.write_all(&[value])
    }

    /// Write a signed byte.
    fn write_i8(&mut self, value: i8) -> Result<(), DeviceError> {
        self.write_all(&[value as u8])
    }

    /// Write a u16 value.
    fn write_u16(&mut self, endian: Endian, value: u16) -> Result<(), DeviceError> {
        self.write_all(&endian.encode_u16(value))
    }

    /// Write an i16 value.
    fn write_i16(&mut self, endian: Endian, value: i16) -> Result<(), DeviceError> {
        self.write_u16(endian, value as u16)
    }

    /// Write a u32 value.
    fn write_u32(&mut self, endian: Endian, value: u32) -> Result<(), DeviceError> {
        self.write_all(&endian.encode_u32(value))
    }

    /// Write an i32 value.
    fn write_i32(&mut self, endian: Endian, value: i32) -> Result<(), DeviceError> {
        self.write_u32(endian, value as u32)
    }

    /// Write an f32 value.
    ///
    /// Fails with [`DeviceError::WriteFailed`], writing nothing, when the
    /// byte order cannot represent `value`.
    fn write_f32(&mut self, endian: Endian, value: f32) -> Result<(), DeviceError> {
        let bytes = endian.encode_f32(value).ok_or_else(|| {
            DeviceError::write_failed(self.tell(), format!("{value} has no {endian} representation"))
        })?;
        self.write_all(&bytes)
    }

    /// Write an f64 value.
    fn write_f64(&mut self, endian: Endian, value: f64) -> Result<(), DeviceError> {
        self.write_all(&endian.encode_f64(value))
    }

    /// Write `count` zero bytes.
    fn write_zeros(&mut self, count: usize) -> Result<(), DeviceError> {
        self.write_all(&vec![0u8; count])
    }

    /// Write `text` into a field of exactly `width` bytes, padded with `fill`.
    ///
    /// Longer text is cut at `width` bytes.
    fn write_padded(&mut self, text: &str, width: usize, fill: u8) -> Result<(), DeviceError> {
        let mut field = vec![fill; width];
        let bytes = text.as_bytes();
        let len = bytes.len().min(width);
        field[..len].copy_from_slice(&bytes[..len]);
        self.write_all(&field)
    }
}
