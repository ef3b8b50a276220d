//! Tests for the telemetry wire format as produced by the pipeline


use head_pose_telemetry::{
    config::Config,
    constants::TELEMETRY_FIELD_COUNT,
    pipeline::{FaceOutcome, Pipeline},
    rotation::Quaternion,
    telemetry::{TelemetryFrame, TelemetryReceiver, TelemetrySink, UdpSink},
};
use nalgebra::Vector3;
use std::time::Duration;
use test_helpers::*;

fn converged_frame() -> TelemetryFrame {
    let mut pipeline = Pipeline::new(&Config::default());
    let mut last = None;
    for _ in 0..30 {
        let mut results = pipeline.process_frame(&[frontal_face()], Some(default_size())).unwrap();
        if let FaceOutcome::Telemetry(frame) = results.remove(0).outcome {
            last = Some(frame);
        }
    }
    last.expect("telemetry frame")
}

#[test]
fn test_pipeline_message_layout() {
    let message = converged_frame().encode().unwrap();
    let fields: Vec<f64> = message.split(':').map(|part| part.parse().unwrap()).collect();
    assert_eq!(fields.len(), TELEMETRY_FIELD_COUNT);

    // Translation first, in millimetres
    assert!((fields[2] - 1800.0).abs() < 5.0);
    // Quaternion at wire precision
    for component in &fields[3..7] {
        assert!((component * 1e4 - (component * 1e4).round()).abs() < 1e-6);
    }
    // Open eyes and a closed mouth give small positive ratios
    assert!(fields[7] > 0.0 && fields[8] > 0.0);
    assert!(fields[10] > 0.0);
}

#[test]
fn test_reparse_recovers_quaternion() {
    for rotation in [
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(std::f64::consts::PI, 0.0, 0.0),
        Vector3::new(0.3, -1.2, 0.7),
        Vector3::new(-2.0, 0.5, 0.25),
    ] {
        let quaternion = Quaternion::from_rotation_vector(&rotation);
        let frame = TelemetryFrame::new(&Vector3::new(1.0, 2.0, 3.0), &quaternion, converged_frame().metrics);
        let decoded: TelemetryFrame = frame.encode().unwrap().parse().unwrap();
        for (a, b) in decoded.quaternion.to_array().iter().zip(quaternion.to_array()) {
            assert!((a - b).abs() <= 5e-5 + 1e-12);
        }
    }
}

#[test]
fn test_left_and_right_are_not_swapped() {
    let frame = converged_frame();
    // Symmetric template: both eyes and both frowns match
    assert!((frame.metrics.left_eye_width - frame.metrics.right_eye_width).abs() < 1e-6);
    assert!((frame.metrics.left_frown - frame.metrics.right_frown).abs() < 1e-6);
}

#[test]
fn test_pipeline_output_over_udp() {
    let receiver = TelemetryReceiver::bind("127.0.0.1:0", Duration::from_secs(1)).unwrap();
    let mut sink = UdpSink::new(&receiver.local_addr().unwrap().to_string()).unwrap();
    assert!(sink.destination().ip().is_loopback());

    let frame = converged_frame();
    sink.send(&frame.encode().unwrap()).unwrap();
    let (_, received) = receiver.recv().unwrap().expect("datagram");
    assert_eq!(received, frame);
}
