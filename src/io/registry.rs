// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Handler registry and dispatch.
//!
//! Reading a device goes through a small state machine:
//!
//! ```text
//! Unprobed ──probe──► Matched(handler) ──read──► Decoded
//!     │
//!     └──────────────► NoMatch { sampled }
//! ```
//!
//! Candidates are probed in a fixed order: handlers claiming the device's
//! extension first, then by descending [`priority`](TrialHandler::priority),
//! then in registration order. The first [`Signature::Valid`] wins and the
//! decision is final: a decode error is returned as is, never retried with
//! another handler.

use std::sync::OnceLock;

use tracing::{debug, warn};

use crate::core::{Result, TrialError};
use crate::device::Device;
use crate::model::Trial;

use super::detection::{extension_of, sample_leading_bytes};
use super::formats::{AncHandler, C3dHandler, TrcHandler, TsvHandler};
use super::options::IoOptions;
use super::traits::{Signature, TrialHandler};

/// Result of probing a device.
pub enum ProbeOutcome<'a> {
    /// A handler recognised the content
    Matched(&'a dyn TrialHandler),
    /// No handler recognised the content
    NoMatch {
        /// Leading bytes of the device
        sampled: Vec<u8>,
    },
}

impl std::fmt::Debug for ProbeOutcome<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeOutcome::Matched(handler) => f.debug_tuple("Matched").field(&handler.name()).finish(),
            ProbeOutcome::NoMatch { sampled } => f
                .debug_struct("NoMatch")
                .field("sampled", &hex::encode(sampled))
                .finish(),
        }
    }
}

/// Ordered collection of format handlers.
pub struct HandlerRegistry {
    handlers: Vec<Box<dyn TrialHandler>>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|h| h.name()))
            .finish()
    }
}

impl HandlerRegistry {
    /// Create a registry without handlers.
    pub fn empty() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Create a registry with the built-in handlers (C3D, TRC, ANC, TSV)
    /// and default options.
    pub fn builtin() -> Self {
        Self::with_options(&IoOptions::default())
    }

    /// Create a registry with the built-in handlers configured by `options`.
    pub fn with_options(options: &IoOptions) -> Self {
        let mut registry = Self::empty();
        registry.register(C3dHandler::with_options(options.c3d.clone()));
        registry.register(TrcHandler::new());
        registry.register(AncHandler::with_options(options.anc.clone()));
        registry.register(TsvHandler::new());
        registry
    }

    /// Append a handler; it ranks after every handler registered before it.
    pub fn register<H: TrialHandler + 'static>(&mut self, handler: H) {
        self.handlers.push(Box::new(handler));
    }

    /// Handlers in registration order.
    pub fn handlers(&self) -> impl Iterator<Item = &dyn TrialHandler> {
        self.handlers.iter().map(|h| h.as_ref())
    }

    /// Find a handler by name or extension, ignoring case.
    pub fn handler(&self, name_or_extension: &str) -> Option<&dyn TrialHandler> {
        let key = name_or_extension.trim_start_matches('.');
        self.handlers()
            .find(|h| h.name().eq_ignore_ascii_case(key))
            .or_else(|| self.handlers().find(|h| h.claims_extension(key)))
    }

    /// Handlers in probing order for a device named `name`.
    pub fn candidates(&self, name: &str) -> Vec<&dyn TrialHandler> {
        let extension = extension_of(name);
        let mut candidates: Vec<&dyn TrialHandler> = self.handlers().collect();
        // Stable sort keeps registration order among equal keys
        candidates.sort_by_key(|h| {
            let claimed = extension
                .as_deref()
                .is_some_and(|ext| h.claims_extension(ext));
            (!claimed, std::cmp::Reverse(h.priority()))
        });
        candidates
    }

    /// Find the handler recognising the device content.
    ///
    /// The device position is restored after every probe.
    pub fn probe(&self, device: &mut dyn Device) -> ProbeOutcome<'_> {
        let start = device.tell();
        let name = device.name().to_string();
        for handler in self.candidates(&name) {
            if !handler.capability().can_read() {
                continue;
            }
            let signature = handler.validate_signature(device);
            if device.tell() != start && device.seek(start).is_err() {
                warn!(
                    context = "registry",
                    handler = handler.name(),
                    "Failed to restore device position after probe"
                );
            }
            debug!(
                context = "registry",
                device = %name,
                handler = handler.name(),
                ?signature,
                "Probed handler"
            );
            if signature == Signature::Valid {
                return ProbeOutcome::Matched(handler);
            }
        }
        ProbeOutcome::NoMatch {
            sampled: sample_leading_bytes(device),
        }
    }

    /// Detect the format and decode the device.
    ///
    /// # Errors
    ///
    /// - [`TrialError::NoMatch`] if no handler recognises the content
    /// - [`TrialError::Decode`] if the matched handler fails
    pub fn read(&self, device: &mut dyn Device) -> Result<Trial> {
        match self.probe(device) {
            ProbeOutcome::Matched(handler) => {
                debug!(
                    context = "registry",
                    device = %device.name(),
                    handler = handler.name(),
                    "Decoding trial"
                );
                Ok(handler.read(device)?)
            }
            ProbeOutcome::NoMatch { sampled } => Err(TrialError::NoMatch { sampled }),
        }
    }

    /// Decode the device with the handler named `format`, skipping probing.
    ///
    /// # Errors
    ///
    /// - [`TrialError::UnknownFormat`] if no handler matches `format`
    /// - [`TrialError::NotReadable`] if the handler cannot decode
    /// - [`TrialError::Decode`] if decoding fails
    pub fn read_as(&self, device: &mut dyn Device, format: &str) -> Result<Trial> {
        let handler = self
            .handler(format)
            .ok_or_else(|| TrialError::UnknownFormat(format.to_string()))?;
        if !handler.capability().can_read() {
            return Err(TrialError::NotReadable(handler.name().to_string()));
        }
        Ok(handler.read(device)?)
    }

    /// Encode `trial` with the handler named (or claiming extension)
    /// `format`, then flush the device.
    ///
    /// When the handler fails after bytes reached the device, the returned
    /// error reports the output as incomplete.
    ///
    /// # Errors
    ///
    /// - [`TrialError::UnknownFormat`] if no handler matches `format`
    /// - [`TrialError::NotWritable`] if the handler cannot encode
    /// - [`TrialError::Encode`] if encoding fails
    /// - [`TrialError::Device`] if the final flush fails
    pub fn write(&self, device: &mut dyn Device, trial: &Trial, format: &str) -> Result<()> {
        let handler = self
            .handler(format)
            .ok_or_else(|| TrialError::UnknownFormat(format.to_string()))?;
        if !handler.capability().can_write() {
            return Err(TrialError::NotWritable(handler.name().to_string()));
        }

        let (size, position, writes) = (device.size(), device.tell(), device.writes_attempted());
        if let Err(err) = handler.write(device, trial) {
            let touched = err.incomplete
                || device.writes_attempted() != writes
                || device.size() != size
                || device.tell() != position;
            if touched {
                warn!(
                    context = "registry",
                    device = %device.name(),
                    handler = handler.name(),
                    error = %err,
                    "Encoding failed after writing to the device"
                );
            }
            return Err(err.with_incomplete(touched).into());
        }
        device.flush()?;
        Ok(())
    }
}

static DEFAULT_REGISTRY: OnceLock<HandlerRegistry> = OnceLock::new();

/// Shared registry with the built-in handlers and default options.
pub fn default_registry() -> &'static HandlerRegistry {
    DEFAULT_REGISTRY.get_or_init(HandlerRegistry::builtin)
}
