use std::fs;
use std::path::PathBuf;

use gaze_control::config::{AppConfig, ConditionsConfig, LoopConfig};
use gaze_control::gaze::aversion::AversionParams;
use gaze_control::gaze::behavior::GazeParams;
use gaze_control::gaze::condition::{Dimension, EyeConfig};

fn unique_path(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!(
        "gaze_control_config_restore_{}_{}",
        name,
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    path
}

fn assert_close(a: f32, b: f32, label: &str) {
    let diff = (a - b).abs();
    assert!(diff <= 1e-6, "{label} mismatch: {a} vs {b}");
}

fn custom_config() -> AppConfig {
    AppConfig {
        gaze: GazeParams {
            pursuit_smoothness: 0.2,
            saccade_speed: 0.25,
            hold_ms: 1_200,
            dwell_ms: 2_500,
            dynamic_saccade_speed: 0.3,
            side_left_x: 0.1,
            side_right_x: 0.9,
            side_y: 0.45,
            respond_to_head_turns: true,
        },
        aversion: AversionParams {
            duration_ms: 250,
            interval_min_ms: 800,
            interval_max_ms: 2_400,
            spread_x: 0.3,
            spread_y: 0.5,
        },
        sink: EyeConfig {
            eye_width: Dimension(140.0),
            eye_height: Dimension(100.0),
            pupil_width: Dimension(40.0),
            pupil_height: Dimension(30.0),
        },
        control_loop: LoopConfig {
            frame_ms: 33,
            seed: Some(1234),
            max_frames: Some(600),
        },
        conditions: ConditionsConfig {
            path: Some("conditions.json".to_string()),
        },
    }
}

#[test]
fn custom_config_survives_a_round_trip() {
    let path = unique_path("custom.toml");
    let expected = custom_config();
    fs::write(&path, toml::to_string_pretty(&expected).unwrap()).unwrap();

    let actual = AppConfig::load_or_default(&path.to_string_lossy());

    assert_close(
        actual.gaze.pursuit_smoothness,
        expected.gaze.pursuit_smoothness,
        "gaze.pursuit_smoothness",
    );
    assert_close(
        actual.gaze.saccade_speed,
        expected.gaze.saccade_speed,
        "gaze.saccade_speed",
    );
    assert_eq!(actual.gaze.hold_ms, expected.gaze.hold_ms);
    assert_eq!(actual.gaze.dwell_ms, expected.gaze.dwell_ms);
    assert!(actual.gaze.respond_to_head_turns);
    assert_close(
        actual.gaze.dynamic_saccade_speed,
        expected.gaze.dynamic_saccade_speed,
        "gaze.dynamic_saccade_speed",
    );
    assert_close(actual.gaze.side_y, expected.gaze.side_y, "gaze.side_y");
    assert_eq!(actual.aversion, expected.aversion);
    assert_eq!(actual.sink, expected.sink);
    assert_eq!(actual.control_loop.frame_ms, 33);
    assert_eq!(actual.control_loop.seed, Some(1234));
    assert_eq!(actual.control_loop.max_frames, Some(600));
    assert_eq!(actual.conditions.path.as_deref(), Some("conditions.json"));

    let _ = fs::remove_file(&path);
}
