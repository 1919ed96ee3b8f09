// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Write-then-read through every writable handler.
//!
//! A decoded trial must equal the original on every field the handler
//! does not list in `discarded_fields`.

mod common;

use mocodec::device::{BufferDevice, Device};
use mocodec::io::formats::{AncHandler, C3dHandler, TrcHandler};
use mocodec::io::{
    detect_format, C3dOptions, C3dProcessor, C3dStorage, ReaderBuilder, TrialHandler,
    WriterBuilder,
};
use mocodec::core::EncodeErrorKind;
use mocodec::{read_trial, write_trial, Analog, Gain, Point, Trial, TrialField};

use common::{assert_same_except, full_trial, marker_trial, temp_path, FRAMES};

fn round_trip(handler: &dyn TrialHandler, trial: &Trial) -> Trial {
    let mut device = BufferDevice::writable();
    handler.write(&mut device, trial).unwrap();
    let mut device = BufferDevice::new(device.into_inner());
    assert!(
        matches!(
            handler.validate_signature(&mut device),
            mocodec::io::Signature::Valid
        ),
        "{} does not recognise its own output",
        handler.name()
    );
    handler.read(&mut device).unwrap()
}

/// Analog-only trial with ±10 V channels holding exact 16-bit counts.
fn analog_trial() -> Trial {
    let trial = Trial::with_frames(100.0, FRAMES).unwrap();
    trial.set_analog_ratio(10).unwrap();
    let step = 20.0 / 65536.0;
    for (c, label) in ["Fx", "Fy", "Fz"].into_iter().enumerate() {
        let samples = (0..FRAMES * 10)
            .map(|s| ((s as i64 * 37 + c as i64 * 1000) % 30000 - 15000) as f64 * step)
            .collect();
        let analog = Analog::with_samples(label, samples);
        analog.set_gain(Gain::PlusMinus10);
        trial.add_analog(analog).unwrap();
    }
    trial
}

// ============================================================================
// C3D
// ============================================================================

#[test]
fn test_c3d_every_processor_and_storage() {
    let trial = full_trial();
    for processor in [C3dProcessor::Intel, C3dProcessor::Dec, C3dProcessor::Mips] {
        for storage in [C3dStorage::Float, C3dStorage::Integer] {
            let handler = C3dHandler::with_options(C3dOptions {
                processor,
                storage,
                ..C3dOptions::default()
            });
            let decoded = round_trip(&handler, &trial);
            assert_eq!(
                trial.differences(&decoded),
                Vec::<TrialField>::new(),
                "{processor:?}/{storage:?}"
            );
        }
    }
}

#[test]
fn test_c3d_discards_nothing() {
    assert!(C3dHandler::new().discarded_fields().is_empty());
}

#[test]
fn test_c3d_keeps_metadata_details() {
    let decoded = round_trip(&C3dHandler::new(), &full_trial());
    let metadata = decoded.metadata();
    assert_eq!(
        metadata.group_description("SUBJECTS").as_deref(),
        Some("Subject information")
    );
    let marker_sets = metadata.entry_details("SUBJECTS", "MARKER_SETS").unwrap();
    assert!(marker_sets.locked);
    assert_eq!(marker_sets.description, "Marker set");
    assert!(metadata.group("ANALOG").is_none());
    assert_eq!(
        metadata.entry("POINT", "X_SCREEN").and_then(|v| v.as_str().map(str::to_string)),
        Some("+X".to_string())
    );
}

#[test]
fn test_c3d_occluded_frame_stays_invalid() {
    let decoded = round_trip(&C3dHandler::new(), &marker_trial());
    let lasi = decoded.point("LASI").unwrap();
    assert!(!lasi.is_valid(4));
    assert!(lasi.is_valid(3));
    assert_eq!(lasi.masks()[4], 0);
    assert_eq!(lasi.masks()[3], 3);
}

#[test]
fn test_c3d_empty_trial() {
    let trial = Trial::with_frames(50.0, 0).unwrap();
    let decoded = round_trip(&C3dHandler::new(), &trial);
    assert_eq!(decoded.frame_count(), 0);
    assert_eq!(decoded.point_count(), 0);
    assert_eq!(decoded.point_rate(), 50.0);
}

// ============================================================================
// TRC
// ============================================================================

#[test]
fn test_trc_keeps_coordinates() {
    let handler = TrcHandler::new();
    let trial = marker_trial();
    trial.set_first_frame(25);
    let decoded = round_trip(&handler, &trial);
    assert_same_except(&trial, &decoded, handler.discarded_fields());
    assert_eq!(decoded.first_frame(), 25);
    assert!(!decoded.point("LASI").unwrap().is_valid(4));
}

#[test]
fn test_trc_discarded_fields() {
    let discarded = TrcHandler::new().discarded_fields();
    for field in [
        TrialField::PointResiduals,
        TrialField::PointMasks,
        TrialField::Events,
        TrialField::Metadata,
    ] {
        assert!(discarded.contains(&field), "{field:?}");
    }
    assert!(!discarded.contains(&TrialField::PointValues));
    assert!(!discarded.contains(&TrialField::FirstFrame));
}

#[test]
fn test_trc_rejects_analog_channels() {
    let mut device = BufferDevice::writable();
    let err = TrcHandler::new()
        .write(&mut device, &full_trial())
        .unwrap_err();
    assert!(err.to_string().contains("analog"));
}

// ============================================================================
// ANC
// ============================================================================

#[test]
fn test_anc_keeps_samples() {
    let handler = AncHandler::new();
    let trial = analog_trial();
    let decoded = round_trip(&handler, &trial);
    assert_same_except(&trial, &decoded, handler.discarded_fields());
    assert_eq!(decoded.analog_rate(), 1000.0);
    assert_eq!(decoded.analog_ratio(), 1);
    assert_eq!(decoded.analog("Fy").unwrap().gain(), Gain::PlusMinus10);
}

#[test]
fn test_anc_rejects_points() {
    let mut device = BufferDevice::writable();
    assert!(AncHandler::new()
        .write(&mut device, &marker_trial())
        .is_err());
}

// ============================================================================
// Files
// ============================================================================

#[test]
fn test_file_round_trip_by_extension() {
    let trial = full_trial();
    let (path, _guard) = temp_path("walk.c3d");
    write_trial(&path, &trial).unwrap();
    assert_eq!(detect_format(&path).unwrap(), "C3D");
    let decoded = read_trial(&path).unwrap();
    assert!(trial.differences(&decoded).is_empty());
}

#[test]
fn test_file_round_trip_with_options() {
    let trial = marker_trial();
    let (path, _guard) = temp_path("walk.bin");
    let options = mocodec::IoOptions {
        c3d: C3dOptions {
            processor: C3dProcessor::Mips,
            storage: C3dStorage::Integer,
            integer_point_scale: 0.05,
        },
        ..Default::default()
    };
    WriterBuilder::new()
        .path(&path)
        .format("c3d")
        .options(options.clone())
        .write(&trial)
        .unwrap();

    let decoded = ReaderBuilder::new()
        .path(&path)
        .options(options)
        .read()
        .unwrap();
    assert!(trial.differences(&decoded).is_empty());
}

#[test]
fn test_conversion_c3d_to_trc() {
    let trial = full_trial();
    for analog in trial.analogs().collect::<Vec<_>>() {
        trial.remove_analog(&analog.label());
    }
    let (c3d, guard) = temp_path("walk.c3d");
    let trc = guard.dir().join("walk.trc");
    write_trial(&c3d, &trial).unwrap();
    write_trial(&trc, &read_trial(&c3d).unwrap()).unwrap();

    let mut device = mocodec::device::FileDevice::open(&trc, mocodec::device::OpenMode::Read)
        .unwrap();
    assert!(device.size() > 0);
    let decoded = TrcHandler::new().read(&mut device).unwrap();
    assert_same_except(&trial, &decoded, TrcHandler::new().discarded_fields());
}

/// Attach `child` under the named collection, skipping the model's checks.
fn attach_raw(trial: &Trial, collection: &str, child: &mocodec::node::Node) {
    trial
        .node()
        .find_child(collection)
        .unwrap()
        .add_child(child.clone())
        .unwrap();
}

#[test]
fn test_writers_reject_data_attached_through_nodes() {
    let points = Trial::with_frames(100.0, FRAMES).unwrap();
    let short = Point::with_coords("LASI", vec![[1.0, 2.0, 3.0]; 2]);
    attach_raw(&points, "Points", short.node());
    assert_eq!(points.point_count(), 1);

    let analogs = Trial::with_frames(100.0, FRAMES).unwrap();
    analogs.set_analog_ratio(2).unwrap();
    let short = Analog::with_samples("EMG", vec![0.5; 3]);
    attach_raw(&analogs, "Analogs", short.node());
    assert_eq!(analogs.analog_count(), 1);

    let c3d = C3dHandler::new();
    let trc = TrcHandler::new();
    let anc = AncHandler::new();
    let cases: [(&dyn TrialHandler, &Trial); 4] = [
        (&c3d, &points),
        (&trc, &points),
        (&c3d, &analogs),
        (&anc, &analogs),
    ];
    for (handler, trial) in cases {
        let mut device = BufferDevice::writable();
        let err = handler.write(&mut device, trial).unwrap_err();
        assert!(
            matches!(err.kind, EncodeErrorKind::Model(_)),
            "{}: {err}",
            handler.name()
        );
        assert!(!err.incomplete);
        assert_eq!(device.size(), 0);
    }
}
