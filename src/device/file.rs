// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! File-backed device.
//!
//! Read-mode devices map the file into memory; write modes go through an
//! unbuffered [`File`] so every completed write is immediately visible to
//! a subsequent read on the same device.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::warn;

use crate::core::DeviceError;

use super::{Device, OpenMode};

#[derive(Debug)]
enum Backing {
    /// Read mode over a non-empty file
    Mapped(memmap2::Mmap),
    /// Read mode over an empty file (zero-length files cannot be mapped)
    Empty,
    /// Write or read-write mode
    File(File),
}

/// Device over a file on disk.
///
/// The file is closed when the device is dropped; writable devices are
/// flushed first.
#[derive(Debug)]
pub struct FileDevice {
    path: String,
    mode: OpenMode,
    backing: Backing,
    position: u64,
    size: u64,
    writes: u64,
}

impl FileDevice {
    /// Open `path` with the given mode.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::AccessDenied`] on permission failure
    /// - [`DeviceError::Unavailable`] for any other open failure
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self, DeviceError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let (backing, size) = match mode {
            OpenMode::Read => {
                let file = File::open(path.as_ref())
                    .map_err(|e| DeviceError::from_open(&path_str, &e))?;
                let size = file
                    .metadata()
                    .map_err(|e| DeviceError::from_open(&path_str, &e))?
                    .len();
                if size == 0 {
                    (Backing::Empty, 0)
                } else {
                    // The mapping is read-only and owned by the device.
                    let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| {
                        DeviceError::Unavailable {
                            name: path_str.clone(),
                            reason: format!("Failed to mmap file: {e}"),
                        }
                    })?;
                    (Backing::Mapped(mmap), size)
                }
            }
            OpenMode::Write => {
                let file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(path.as_ref())
                    .map_err(|e| DeviceError::from_open(&path_str, &e))?;
                (Backing::File(file), 0)
            }
            OpenMode::ReadWrite => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(path.as_ref())
                    .map_err(|e| DeviceError::from_open(&path_str, &e))?;
                let size = file
                    .metadata()
                    .map_err(|e| DeviceError::from_open(&path_str, &e))?
                    .len();
                (Backing::File(file), size)
            }
        };

        Ok(Self {
            path: path_str,
            mode,
            backing,
            position: 0,
            size,
            writes: 0,
        })
    }

    /// Path the device was opened from.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Device for FileDevice {
    fn name(&self) -> &str {
        &self.path
    }

    fn mode(&self) -> OpenMode {
        self.mode
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, position: u64) -> Result<(), DeviceError> {
        if !self.mode.can_write() && position > self.size {
            return Err(DeviceError::OutOfRange {
                position,
                size: self.size,
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
        if buf.is_empty() {
            return Ok(());
        }

        match &mut self.backing {
            Backing::Mapped(mmap) => {
                // position + len <= size == mmap.len(), checked above
                let start = self.position as usize;
                buf.copy_from_slice(&mmap[start..start + buf.len()]);
            }
            Backing::Empty => {
                return Err(DeviceError::truncated(self.position, buf.len(), 0));
            }
            Backing::File(file) => {
                let offset = self.position;
                let len = buf.len();
                file.seek(SeekFrom::Start(offset))
                    .and_then(|_| file.read_exact(buf))
                    .map_err(|e| {
                        if e.kind() == std::io::ErrorKind::UnexpectedEof {
                            DeviceError::truncated(offset, len, available)
                        } else {
                            DeviceError::Unavailable {
                                name: self.path.clone(),
                                reason: e.to_string(),
                            }
                        }
                    })?;
            }
        }
        self.position += buf.len() as u64;
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), DeviceError> {
        let offset = self.position;
        let Backing::File(file) = &mut self.backing else {
            return Err(DeviceError::InvalidMode {
                mode: self.mode,
                operation: "writing",
            });
        };
        self.writes += 1;
        if let Err(e) = file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| file.write_all(buf))
        {
            // Part of `buf` may have landed before the failure
            if let Ok(metadata) = file.metadata() {
                self.size = self.size.max(metadata.len());
            }
            return Err(DeviceError::write_failed(offset, e.to_string()));
        }
        self.position = offset + buf.len() as u64;
        self.size = self.size.max(self.position);
        Ok(())
    }

    fn writes_attempted(&self) -> u64 {
        self.writes
    }

    fn flush(&mut self) -> Result<(), DeviceError> {
        if let Backing::File(file) = &mut self.backing {
            file.flush()
                .map_err(|e| DeviceError::write_failed(self.position, e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for FileDevice {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(
                context = "file_device",
                path = %self.path,
                error = %e,
                "Failed to flush device on close"
            );
        }
    }
}
