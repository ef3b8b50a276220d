//! Tests for the built-in landmark sources


use head_pose_telemetry::{
    app::TelemetryApp,
    config::Config,
    landmarks::LandmarkSet,
    source::{
        osf::{parse_packet, RECORD_SIZE},
        replay::write_recording,
        FrameSize, FrameSource, LandmarkFrame, OsfSource, PreDetected, ReplaySource,
    },
    telemetry::MemorySink,
};
use std::{net::UdpSocket, time::Duration};
use test_helpers::*;

/// Offset of the 2D landmark block inside an `OpenSeeFace` record
const LANDMARKS_OFFSET: usize = 345;

fn osf_record(face_id: i32, size: FrameSize, landmarks: &LandmarkSet) -> Vec<u8> {
    let mut record = Vec::with_capacity(RECORD_SIZE);
    record.extend_from_slice(&1.25f64.to_le_bytes());
    record.extend_from_slice(&face_id.to_le_bytes());
    record.extend_from_slice(&(size.width as f32).to_le_bytes());
    record.extend_from_slice(&(size.height as f32).to_le_bytes());
    record.resize(LANDMARKS_OFFSET, 0);
    for point in landmarks.points() {
        record.extend_from_slice(&(point.x as f32).to_le_bytes());
        record.extend_from_slice(&(point.y as f32).to_le_bytes());
    }
    record.resize(RECORD_SIZE, 0);
    record
}

#[test]
fn test_osf_packet_with_two_faces() {
    let left = frontal_face_at(-400.0, 0.0);
    let right = frontal_face_at(400.0, 0.0);
    let mut packet = osf_record(0, default_size(), &left);
    packet.extend(osf_record(1, default_size(), &right));

    let faces = parse_packet(&packet).unwrap();
    assert_eq!(faces.len(), 2);
    assert_eq!(faces[1].face_id, 1);
    assert_eq!(faces[0].camera_resolution, [640.0, 480.0]);
    for (decoded, original) in faces[1].landmarks.points().iter().zip(right.points()) {
        assert!((decoded - original).norm() < 1e-3);
    }
}

#[test]
fn test_osf_source_feeds_app() {
    let source = OsfSource::bind("127.0.0.1:0", Duration::from_millis(500)).unwrap();
    let address = source.local_addr().unwrap();
    let sender = UdpSocket::bind("127.0.0.1:0").unwrap();

    let size = FrameSize { width: 1280, height: 720 };
    let face = synthetic_face(&frontal_rotation(), &default_translation(), size);
    let packet = osf_record(0, size, &face);

    let mut app = TelemetryApp::new(&Config::default(), source, PreDetected, MemorySink::default());
    for _ in 0..6 {
        sender.send_to(&packet, address).unwrap();
        assert!(app.step().unwrap());
    }

    let stats = app.stats();
    assert_eq!(stats.frames, 6);
    assert_eq!(stats.faces, 6);
    assert_eq!(stats.sent + stats.pose_failures, 6);
    assert!(stats.sent >= 3);
}

#[test]
fn test_osf_malformed_packet_yields_empty_frame() {
    let mut source = OsfSource::bind("127.0.0.1:0", Duration::from_millis(500)).unwrap();
    let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
    sender.send_to(&[1, 2, 3], source.local_addr().unwrap()).unwrap();

    let frame = source.read().unwrap().expect("frame");
    assert!(frame.faces.is_empty());
    assert!(source.frame_size().is_none());
}

#[test]
fn test_replay_file_roundtrip() {
    let frames = vec![
        frame_of(vec![frontal_face()]),
        LandmarkFrame {
            faces: Vec::new(),
            size: None,
        },
        frame_of(vec![frontal_face_at(-400.0, 0.0), frontal_face_at(400.0, 0.0)]),
    ];
    let path = std::env::temp_dir().join(format!("head_pose_source_{}.jsonl", std::process::id()));
    {
        let mut file = std::fs::File::create(&path).unwrap();
        write_recording(&mut file, &frames).unwrap();
    }

    let mut source = ReplaySource::open(&path).unwrap();
    let mut replayed = Vec::new();
    while let Some(frame) = source.read().unwrap() {
        replayed.push(frame);
    }
    std::fs::remove_file(&path).ok();

    assert_eq!(replayed.len(), 3);
    assert_eq!(replayed[0].size, Some(default_size()));
    for (decoded, original) in replayed[0].faces[0].points().iter().zip(frames[0].faces[0].points()) {
        assert!((decoded - original).norm() < 1e-9);
    }
    // Size carries over lines that omit it
    assert_eq!(replayed[1].size, Some(default_size()));
    assert!(replayed[1].faces.is_empty());
    assert_eq!(replayed[2].faces.len(), 2);
    assert_eq!(source.frame_size(), Some(default_size()));
}
