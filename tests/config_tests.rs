//! Tests for configuration loading, saving and validation

use head_pose_telemetry::{
    config::{Config, SolverKind, SourceKind, EXAMPLE_CONFIG},
    filters::WarmupPolicy,
    source::{open_source, FrameSource},
    Error,
};
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("head_pose_{}_{name}", std::process::id()))
}

#[test]
fn test_config_file_roundtrip() {
    let mut config = Config::default();
    config.filter.warmup = WarmupPolicy::OccupiedOnly;
    config.filter.window_size = 7;
    config.telemetry.host = "192.168.1.20".to_string();
    config.telemetry.port = 6000;
    config.source.kind = SourceKind::Osf;

    let path = temp_path("roundtrip.yaml");
    config.to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.filter.warmup, WarmupPolicy::OccupiedOnly);
    assert_eq!(loaded.filter.window_size, 7);
    assert_eq!(loaded.telemetry_address(), "192.168.1.20:6000");
    assert_eq!(loaded.source.kind, SourceKind::Osf);
    assert!(loaded.validate().is_ok());
}

#[test]
fn test_example_config_matches_defaults() {
    let example = Config::from_yaml(EXAMPLE_CONFIG).unwrap();
    let defaults = Config::default();

    assert_eq!(example.filter.process_noise, defaults.filter.process_noise);
    assert_eq!(example.filter.observation_noise, defaults.filter.observation_noise);
    assert_eq!(example.filter.window_size, defaults.filter.window_size);
    assert_eq!(example.filter.warmup, defaults.filter.warmup);
    assert_eq!(example.pose.solver, SolverKind::Iterative);
    assert_eq!(example.pose.max_reprojection_error, defaults.pose.max_reprojection_error);
    assert_eq!(example.tracking.max_missed_frames, defaults.tracking.max_missed_frames);
    assert_eq!(example.telemetry_address(), defaults.telemetry_address());
    assert_eq!(example.source.osf_bind, defaults.source.osf_bind);
}

#[test]
fn test_listen_address_follows_telemetry_port() {
    let mut config = Config::default();
    assert_eq!(config.listen_address(), "127.0.0.1:5065");

    config.telemetry.port = 9000;
    config.telemetry.host = "192.168.1.20".to_string();
    assert_eq!(config.listen_address(), "127.0.0.1:9000");
}

#[test]
fn test_empty_yaml_is_default() {
    let config = Config::from_yaml("{}").unwrap();
    assert!(config.validate().is_ok());
    assert!(config.filter.enabled);
    assert_eq!(config.camera.width, 640);
    assert_eq!(config.camera.height, 480);
}

#[test]
fn test_missing_file_is_io_error() {
    let result = Config::from_file(temp_path("does_not_exist.yaml"));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_unknown_enum_value_is_rejected() {
    assert!(matches!(
        Config::from_yaml("pose:\n  solver: ransac\n"),
        Err(Error::ConfigError(_))
    ));
    assert!(matches!(
        Config::from_yaml("filter:\n  warmup: sometimes\n"),
        Err(Error::ConfigError(_))
    ));
}

#[test]
fn test_validation_rejects_bad_values() {
    let cases: [(&str, fn(&mut Config)); 11] = [
        ("zero process noise", |c: &mut Config| c.filter.process_noise = 0.0),
        ("infinite observation noise", |c: &mut Config| c.filter.observation_noise = f64::INFINITY),
        ("zero window", |c: &mut Config| c.filter.window_size = 0),
        ("zero width", |c: &mut Config| c.camera.width = 0),
        ("negative reprojection bound", |c: &mut Config| c.pose.max_reprojection_error = -1.0),
        ("zero iterations", |c: &mut Config| c.pose.max_iterations = 0),
        ("zero tracks", |c: &mut Config| c.tracking.max_tracks = 0),
        ("zero match distance", |c: &mut Config| c.tracking.max_match_distance = 0.0),
        ("empty host", |c: &mut Config| c.telemetry.host.clear()),
        ("zero port", |c: &mut Config| c.telemetry.port = 0),
        ("zero osf timeout", |c: &mut Config| {
            c.source.kind = SourceKind::Osf;
            c.source.osf_timeout_ms = 0;
        }),
    ];

    for (name, mutate) in cases {
        let mut config = Config::default();
        mutate(&mut config);
        assert!(
            matches!(config.validate(), Err(Error::ConfigError(_))),
            "{name} should be rejected"
        );
    }
}

#[cfg(not(feature = "opencv"))]
#[test]
fn test_opencv_solver_needs_feature() {
    let mut config = Config::default();
    config.pose.solver = SolverKind::Opencv;
    assert!(config.validate().is_err());
}

#[test]
fn test_open_configured_osf_source() {
    let mut config = Config::default();
    config.source.kind = SourceKind::Osf;
    config.source.osf_bind = "127.0.0.1:0".to_string();
    let source = open_source(&config.source).unwrap();
    assert!(source.frame_size().is_none());
}

#[test]
fn test_open_missing_recording_fails() {
    let mut config = Config::default();
    config.source.replay_path = Some(temp_path("missing.jsonl"));
    assert!(matches!(open_source(&config.source), Err(Error::Capture(_))));
}
