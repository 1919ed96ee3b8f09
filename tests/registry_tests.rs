// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Handler registry: probing order, lookups and write failures.

mod common;

use mocodec::core::{EncodeError, EncodeErrorKind};
use mocodec::device::{BufferDevice, Device, Endian};
use mocodec::io::{
    match_signature, Capability, HandlerRegistry, ProbeOutcome, Signature, TrialHandler,
};
use mocodec::{DecodeError, Trial, TrialError};

use common::marker_trial;

const MAGIC: &[u8] = b"MOCK";

/// Handler recognising [`MAGIC`]; the decoded trial's first frame carries
/// `tag` so tests can tell which handler ran.
struct Tagged {
    name: &'static str,
    tag: u32,
    priority: i32,
    extensions: &'static [&'static str],
}

impl Tagged {
    fn new(name: &'static str, tag: u32) -> Self {
        Self {
            name,
            tag,
            priority: 0,
            extensions: &[],
        }
    }
}

impl TrialHandler for Tagged {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        "test handler"
    }

    fn capability(&self) -> Capability {
        Capability::CAN_READ
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        self.extensions
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn validate_signature(&self, device: &mut dyn Device) -> Signature {
        match_signature(device, 0, MAGIC)
    }

    fn read(&self, _device: &mut dyn Device) -> Result<Trial, DecodeError> {
        let trial = Trial::new();
        trial.set_first_frame(self.tag);
        Ok(trial)
    }
}

/// Handler that writes a few bytes and then fails.
struct Failing {
    bytes_first: usize,
}

impl TrialHandler for Failing {
    fn name(&self) -> &'static str {
        "FAIL"
    }

    fn description(&self) -> &'static str {
        "always fails to encode"
    }

    fn capability(&self) -> Capability {
        Capability::READ_WRITE
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["fail"]
    }

    fn validate_signature(&self, _device: &mut dyn Device) -> Signature {
        Signature::Invalid
    }

    fn read(&self, device: &mut dyn Device) -> Result<Trial, DecodeError> {
        Err(DecodeError::malformed("FAIL", device.tell(), "trial", "never readable"))
    }

    fn write(&self, device: &mut dyn Device, _trial: &Trial) -> Result<(), EncodeError> {
        for _ in 0..self.bytes_first {
            device
                .write_u16(Endian::Little, 0xFFFF)
                .map_err(|e| EncodeError::device("FAIL", "header", e))?;
        }
        Err(EncodeError::unrepresentable("FAIL", "points", "anything"))
    }
}

fn magic_device(name: &str) -> BufferDevice {
    BufferDevice::named(name, b"MOCK payload".to_vec())
}

fn tag_of(registry: &HandlerRegistry, device: &mut BufferDevice) -> u32 {
    registry.read(device).unwrap().first_frame()
}

#[test]
fn test_same_signature_earlier_registration_wins() {
    let mut registry = HandlerRegistry::empty();
    registry.register(Tagged::new("FIRST", 1));
    registry.register(Tagged::new("SECOND", 2));

    for _ in 0..5 {
        assert_eq!(tag_of(&registry, &mut magic_device("<memory>")), 1);
    }
}

#[test]
fn test_priority_before_registration_order() {
    let mut registry = HandlerRegistry::empty();
    registry.register(Tagged::new("LOW", 1));
    registry.register(Tagged {
        priority: 10,
        ..Tagged::new("HIGH", 2)
    });
    assert_eq!(tag_of(&registry, &mut magic_device("<memory>")), 2);
}

#[test]
fn test_extension_hint_before_priority() {
    let mut registry = HandlerRegistry::empty();
    registry.register(Tagged {
        priority: 10,
        ..Tagged::new("HIGH", 1)
    });
    registry.register(Tagged {
        extensions: &["mck"],
        ..Tagged::new("HINTED", 2)
    });
    assert_eq!(tag_of(&registry, &mut magic_device("walk.MCK")), 2);
    assert_eq!(tag_of(&registry, &mut magic_device("walk.c3d")), 1);
}

#[test]
fn test_probe_restores_position() {
    let registry = HandlerRegistry::builtin();
    let mut device = BufferDevice::new(b"PathFileType\t4\t(X/Y/Z)\twalk.trc\n".to_vec());
    device.seek(7).unwrap();
    let outcome = registry.probe(&mut device);
    assert!(matches!(outcome, ProbeOutcome::Matched(h) if h.name() == "TRC"));
    assert_eq!(device.tell(), 7);
}

#[test]
fn test_no_match_carries_sampled_bytes() {
    let registry = HandlerRegistry::builtin();
    let data = b"RIFF\x24\x00\x00\x00WAVEfmt 0123456789".to_vec();
    let mut device = BufferDevice::new(data.clone());
    match registry.probe(&mut device) {
        ProbeOutcome::NoMatch { sampled } => assert_eq!(sampled, data[..16].to_vec()),
        other => panic!("unexpected outcome: {other:?}"),
    }

    let err = registry.read(&mut BufferDevice::new(data)).unwrap_err();
    assert!(matches!(err, TrialError::NoMatch { .. }));
}

#[test]
fn test_empty_device_is_no_match() {
    let registry = HandlerRegistry::builtin();
    let outcome = registry.probe(&mut BufferDevice::new(Vec::new()));
    assert!(matches!(outcome, ProbeOutcome::NoMatch { sampled } if sampled.is_empty()));
}

#[test]
fn test_read_as_unknown_format() {
    let registry = HandlerRegistry::builtin();
    let err = registry
        .read_as(&mut magic_device("<memory>"), "mcap")
        .unwrap_err();
    assert_eq!(err, TrialError::UnknownFormat("mcap".to_string()));
}

#[test]
fn test_read_only_handler_refuses_write() {
    let registry = HandlerRegistry::builtin();
    let mut device = BufferDevice::writable();
    let err = registry
        .write(&mut device, &marker_trial(), "tsv")
        .unwrap_err();
    assert_eq!(err, TrialError::NotWritable("TSV".to_string()));
    assert_eq!(device.size(), 0);
}

#[test]
fn test_failure_after_writing_is_incomplete() {
    let mut registry = HandlerRegistry::empty();
    registry.register(Failing { bytes_first: 3 });
    let mut device = BufferDevice::writable();
    let err = registry
        .write(&mut device, &marker_trial(), "FAIL")
        .unwrap_err();
    match err {
        TrialError::Encode(err) => {
            assert!(err.incomplete);
            assert!(matches!(err.kind, EncodeErrorKind::Unrepresentable(_)));
            assert!(err.to_string().contains("incomplete"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(device.size(), 6);
}

#[test]
fn test_failure_before_writing_is_complete() {
    let mut registry = HandlerRegistry::empty();
    registry.register(Failing { bytes_first: 0 });
    let mut device = BufferDevice::writable();
    let err = registry
        .write(&mut device, &marker_trial(), "fail")
        .unwrap_err();
    assert!(matches!(err, TrialError::Encode(ref e) if !e.incomplete));
    assert_eq!(device.size(), 0);
}
