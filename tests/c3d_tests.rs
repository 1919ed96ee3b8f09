// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! C3D layout details and failure modes.

mod common;

use mocodec::core::{DecodeErrorKind, EncodeErrorKind};
use mocodec::device::{BufferDevice, Device};
use mocodec::io::formats::C3dHandler;
use mocodec::io::{C3dOptions, C3dProcessor, C3dStorage, TrialHandler};
use mocodec::{Event, EventTime, Point, Trial};

use common::{full_trial, marker_trial};

fn encode(trial: &Trial, options: C3dOptions) -> Vec<u8> {
    let mut device = BufferDevice::writable();
    C3dHandler::with_options(options)
        .write(&mut device, trial)
        .unwrap();
    device.into_inner()
}

fn decode(bytes: Vec<u8>) -> Result<Trial, mocodec::DecodeError> {
    C3dHandler::new().read(&mut BufferDevice::new(bytes))
}

#[test]
fn test_header_layout() {
    for (processor, code) in [
        (C3dProcessor::Intel, 84u8),
        (C3dProcessor::Dec, 85),
        (C3dProcessor::Mips, 86),
    ] {
        let bytes = encode(
            &marker_trial(),
            C3dOptions {
                processor,
                ..C3dOptions::default()
            },
        );
        assert_eq!(bytes[0], 2);
        assert_eq!(bytes[1], 0x50);
        // parameter section header: reserved, reserved, block count, processor
        assert_eq!(bytes[512 + 3], code);
        assert!(bytes[512 + 2] >= 1);
    }
}

#[test]
fn test_every_truncation_fails_within_bounds() {
    let bytes = encode(&full_trial(), C3dOptions::default());
    for len in 0..bytes.len() {
        let err = decode(bytes[..len].to_vec())
            .err()
            .unwrap_or_else(|| panic!("{len} bytes decoded"));
        assert!(
            err.offset <= len as u64,
            "offset {} past {len} bytes",
            err.offset
        );
    }
    assert!(decode(bytes).is_ok());
}

#[test]
fn test_bad_key_byte() {
    let mut bytes = encode(&marker_trial(), C3dOptions::default());
    bytes[1] = 0x51;
    let err = decode(bytes).unwrap_err();
    assert_eq!(err.offset, 1);
    assert!(matches!(err.kind, DecodeErrorKind::Malformed(_)));
}

#[test]
fn test_large_first_frame_uses_trial_group() {
    let trial = marker_trial();
    trial.set_first_frame(100_000);
    let decoded = decode(encode(&trial, C3dOptions::default())).unwrap();
    assert_eq!(decoded.first_frame(), 100_000);
    assert_eq!(decoded.last_frame(), 100_009);
    assert!(decoded.metadata().group("TRIAL").is_none());
    assert!(trial.differences(&decoded).is_empty());
}

#[test]
fn test_many_points_spill_into_numbered_labels() {
    let trial = Trial::with_frames(60.0, 2).unwrap();
    for i in 0..300 {
        let point = Point::with_coords(format!("M{i:03}"), vec![[i as f64, 0.0, 1.0]; 2]);
        trial.add_point(point).unwrap();
    }
    let decoded = decode(encode(&trial, C3dOptions::default())).unwrap();
    assert_eq!(decoded.point_count(), 300);
    assert_eq!(decoded.points().last().unwrap().label(), "M299");
    assert!(decoded.metadata().group("POINT").is_none());
    assert!(trial.differences(&decoded).is_empty());
}

#[test]
fn test_frame_events_convert_to_seconds() {
    let trial = marker_trial();
    trial
        .add_event(Event::new("Foot Strike", EventTime::Frame(5)))
        .unwrap();
    let decoded = decode(encode(&trial, C3dOptions::default())).unwrap();
    let event = decoded.events().next().unwrap();
    let seconds = match event.time() {
        EventTime::Seconds(s) => s,
        other => panic!("unexpected time {other:?}"),
    };
    assert!((seconds - 0.04).abs() < 1e-6);
    assert!(trial.differences(&decoded).is_empty());
}

fn encode_error(trial: &Trial, options: C3dOptions) -> mocodec::EncodeError {
    let mut device = BufferDevice::writable();
    let err = C3dHandler::with_options(options)
        .write(&mut device, trial)
        .unwrap_err();
    assert_eq!(device.size(), 0, "failed encode wrote bytes");
    err
}

#[test]
fn test_wide_mask_is_unrepresentable() {
    let trial = marker_trial();
    trial
        .point("RASI")
        .unwrap()
        .set_frame(0, [1.0, 2.0, 3.0], 0.5, 0x80)
        .unwrap();
    let err = encode_error(&trial, C3dOptions::default());
    assert!(matches!(err.kind, EncodeErrorKind::Unrepresentable(_)));
}

#[test]
fn test_large_residual_is_unrepresentable() {
    let trial = marker_trial();
    trial
        .point("RASI")
        .unwrap()
        .set_frame(0, [1.0, 2.0, 3.0], 30.0, 0)
        .unwrap();
    let err = encode_error(&trial, C3dOptions::default());
    assert!(matches!(err.kind, EncodeErrorKind::Unrepresentable(_)));
}

#[test]
fn test_integer_storage_range() {
    let trial = Trial::with_frames(100.0, 1).unwrap();
    trial
        .add_point(Point::with_coords("FAR", vec![[4000.0, 0.0, 0.0]]))
        .unwrap();
    let integer = C3dOptions {
        storage: C3dStorage::Integer,
        ..C3dOptions::default()
    };
    let err = encode_error(&trial, integer.clone());
    assert!(matches!(err.kind, EncodeErrorKind::Unrepresentable(_)));

    // a coarser scale fits the same coordinate
    let coarse = C3dOptions {
        integer_point_scale: 1.0,
        ..integer
    };
    let decoded = decode(encode(&trial, coarse)).unwrap();
    assert_eq!(decoded.point("FAR").unwrap().coord(0), Some([4000.0, 0.0, 0.0]));
}

#[test]
fn test_frame_event_without_rate_is_unrepresentable() {
    let trial = Trial::with_frames(0.0, 0).unwrap();
    trial
        .add_event(Event::new("Start", EventTime::Frame(1)))
        .unwrap();
    let err = encode_error(&trial, C3dOptions::default());
    assert!(matches!(err.kind, EncodeErrorKind::Unrepresentable(_)));
}

/// Intel-order file with the given header counts and raw parameter records.
///
/// Block 1 is the header, block 2 the parameter section and block 3 a
/// zeroed data block.
fn hand_built(point_count: u16, first: u16, last: u16, records: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0u8; 3 * 512];
    bytes[0] = 2;
    bytes[1] = 0x50;
    bytes[2..4].copy_from_slice(&point_count.to_le_bytes());
    bytes[6..8].copy_from_slice(&first.to_le_bytes());
    bytes[8..10].copy_from_slice(&last.to_le_bytes());
    bytes[12..16].copy_from_slice(&1.0f32.to_le_bytes());
    bytes[16..18].copy_from_slice(&3u16.to_le_bytes());
    bytes[18..20].copy_from_slice(&1u16.to_le_bytes());
    bytes[20..24].copy_from_slice(&100.0f32.to_le_bytes());
    bytes[512..516].copy_from_slice(&[1, 0x50, 1, 84]);
    bytes[516..516 + records.len()].copy_from_slice(records);
    bytes
}

/// A group record followed by a real-valued `USED` parameter ending the
/// section.
fn real_used(group: &str, used: f32) -> Vec<u8> {
    let mut records = vec![group.len() as u8, (-1i8) as u8];
    records.extend_from_slice(group.as_bytes());
    records.extend_from_slice(&3i16.to_le_bytes());
    records.push(0);
    records.extend_from_slice(&[4, 1]);
    records.extend_from_slice(b"USED");
    records.extend_from_slice(&0i16.to_le_bytes());
    records.extend_from_slice(&[4, 0]);
    records.extend_from_slice(&used.to_le_bytes());
    records.push(0);
    records
}

#[test]
fn test_oversized_used_counts_are_malformed() {
    let cases = [
        // no frames: nothing to read, the count alone must be rejected
        ("ANALOG", 1.0e15, 1, 0),
        ("ANALOG", -3.0, 1, 0),
        ("POINT", 1.0e15, 1, 1),
        ("POINT", f32::NAN, 1, 1),
    ];
    for (group, used, first, last) in cases {
        let err = decode(hand_built(0, first, last, &real_used(group, used))).unwrap_err();
        assert!(
            matches!(err.kind, DecodeErrorKind::Malformed(_)),
            "{group}:USED = {used}: {err}"
        );
        assert_eq!(err.context, "parameters");
    }

    // the same layout with a sane count decodes
    let trial = decode(hand_built(0, 1, 1, &real_used("POINT", 1.0))).unwrap();
    assert_eq!(trial.point_count(), 1);
    assert_eq!(trial.frame_count(), 1);
}

#[test]
fn test_frame_range_beyond_data_fails() {
    let bytes = hand_built(1, 1, 60_000, &[0, 0]);
    let len = bytes.len() as u64;
    let err = decode(bytes).unwrap_err();
    assert!(matches!(err.kind, DecodeErrorKind::Device(_)), "{err}");
    assert!(err.offset <= len);
}

#[test]
fn test_dec_reals_outside_vax_range_are_unrepresentable() {
    let trial = Trial::with_frames(100.0, 1).unwrap();
    trial
        .add_point(Point::with_coords("FAR", vec![[2.0e38, 0.0, 0.0]]))
        .unwrap();
    let dec = C3dOptions {
        processor: C3dProcessor::Dec,
        storage: C3dStorage::Float,
        ..C3dOptions::default()
    };
    let err = encode_error(&trial, dec);
    assert!(matches!(err.kind, EncodeErrorKind::Unrepresentable(_)), "{err}");

    // IEEE processors hold the same value
    let intel = C3dOptions {
        processor: C3dProcessor::Intel,
        storage: C3dStorage::Float,
        ..C3dOptions::default()
    };
    let decoded = decode(encode(&trial, intel)).unwrap();
    assert_eq!(decoded.point("FAR").unwrap().coord(0), Some([2.0e38f32 as f64, 0.0, 0.0]));
}

#[test]
fn test_failed_device_write_is_incomplete() {
    let mut device = BufferDevice::writable();
    device.seek(u64::MAX - 1).unwrap();
    let err = C3dHandler::new()
        .write(&mut device, &marker_trial())
        .unwrap_err();
    assert!(matches!(err.kind, EncodeErrorKind::Device(_)), "{err}");
    assert!(err.incomplete);

    // a device refusing writes outright was never touched
    let mut device = BufferDevice::new(Vec::new());
    let err = C3dHandler::new()
        .write(&mut device, &marker_trial())
        .unwrap_err();
    assert!(!err.incomplete);
}
