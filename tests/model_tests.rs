// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Trial model invariants and graph editing through the public API.

mod common;

use mocodec::{Analog, Event, EventTime, Gain, ModelError, Point, Trial, TrialError};

use common::{full_trial, marker_trial, FRAMES, RATE, RATIO};

// ============================================================================
// Invariants
// ============================================================================

#[test]
fn test_scenario_analog_length_must_match_frames() {
    let trial = Trial::with_frames(RATE, FRAMES).unwrap();
    trial.set_analog_ratio(RATIO).unwrap();
    assert_eq!(trial.analog_rate(), 1000.0);
    for label in ["LASI", "RASI"] {
        trial
            .add_point(Point::with_coords(label, vec![[1.0, 2.0, 3.0]; FRAMES]))
            .unwrap();
    }

    trial
        .add_analog(Analog::with_samples("EMG1", vec![0.0; 100]))
        .unwrap();
    let err = trial
        .add_analog(Analog::with_samples("EMG2", vec![0.0; 99]))
        .unwrap_err();
    assert!(matches!(err, ModelError::Inconsistent { .. }));
    assert_eq!(trial.analog_count(), 1);
    assert_eq!(trial.analog_sample_count(), 100);
}

#[test]
fn test_negative_rate_is_rejected() {
    assert!(matches!(
        Trial::with_frames(-1.0, 10),
        Err(ModelError::Inconsistent { .. })
    ));
    let trial = marker_trial();
    assert!(trial.set_point_rate(-100.0).is_err());
    assert_eq!(trial.point_rate(), RATE);
}

#[test]
fn test_point_frames_must_match() {
    let trial = marker_trial();
    let err = trial
        .add_point(Point::with_coords("SHORT", vec![[0.0; 3]; FRAMES - 1]))
        .unwrap_err();
    assert!(matches!(err, ModelError::Inconsistent { .. }));

    let point = trial.point("RASI").unwrap();
    assert!(point.set_data(vec![], vec![], vec![]).is_err());
    assert_eq!(point.frame_count(), FRAMES);
}

#[test]
fn test_frame_count_change_is_checked() {
    let trial = full_trial();
    assert!(trial.set_frame_count(FRAMES + 1).is_err());
    assert_eq!(trial.frame_count(), FRAMES);
}

#[test]
fn test_model_error_converts_to_trial_error() {
    let err: TrialError = Trial::with_frames(f64::NAN, 1).unwrap_err().into();
    assert!(matches!(err, TrialError::Model(_)));
}

// ============================================================================
// Editing
// ============================================================================

#[test]
fn test_gain_change_keeps_samples() {
    let trial = full_trial();
    let analog = trial.analog("EMG1").unwrap();
    let before = analog.samples();
    let scale = analog.scale();

    analog.set_gain(Gain::PlusMinus10);
    assert_eq!(analog.gain(), Gain::PlusMinus10);
    assert_eq!(analog.samples(), before);
    assert_eq!(analog.scale(), scale);
}

#[test]
fn test_rename_point_through_node() {
    let trial = marker_trial();
    let point = trial.point("LASI").unwrap();
    point.node().set_name("L_ASIS");
    assert!(trial.point("LASI").is_none());
    assert_eq!(trial.point("L_ASIS").unwrap().frame_count(), FRAMES);
}

#[test]
fn test_remove_event() {
    let trial = full_trial();
    let first = trial.events().next().unwrap();
    assert!(trial.remove_event(&first));
    assert!(!trial.remove_event(&first));
    let labels: Vec<String> = trial.events().map(|e| e.label()).collect();
    assert_eq!(labels, vec!["Foot Off"]);
}

#[test]
fn test_frame_event_time() {
    let trial = marker_trial();
    trial
        .add_event(Event::new("Toe Off", EventTime::Frame(11)))
        .unwrap();
    let event = trial.events().next().unwrap();
    assert_eq!(event.time().seconds(trial.point_rate()), Some(0.1));
    assert_eq!(EventTime::Frame(3).seconds(0.0), None);
}

#[test]
fn test_trials_are_independent() {
    let a = full_trial();
    let b = full_trial();
    assert!(a.differences(&b).is_empty());

    b.point("RASI").unwrap().invalidate(0).unwrap();
    let differences = a.differences(&b);
    assert!(differences.contains(&mocodec::TrialField::PointValues));
    assert!(a.point("RASI").unwrap().is_valid(0));
}

#[test]
fn test_model_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Trial>();
    assert_send_sync::<Point>();

    let trial = full_trial();
    let counts = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| trial.points().map(|p| p.frame_count()).sum::<usize>()))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<Vec<_>>()
    });
    assert_eq!(counts, vec![3 * FRAMES; 4]);
}
