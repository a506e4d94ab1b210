//! Player config file loading

use jitterplay::{Error, InterpolationMode, PlaybackDriver, PlayerConfig};
use std::fs;

#[test]
fn test_load_overrides_and_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[logging]
level = "jitterplay=trace"

[stream]
input_sample_rate = 24000
output_sample_rate = 44100
interpolation = "cubic"
max_queue_size = 20
min_buffer_threshold = 6
min_floor = 2
max_ceiling = 12
"#,
    )
    .unwrap();

    let config = PlayerConfig::load(Some(&path)).unwrap();
    assert_eq!(config.logging.level, "jitterplay=trace");
    assert_eq!(config.stream.input_sample_rate, 24_000);
    assert_eq!(config.stream.output_sample_rate, 44_100);
    assert_eq!(config.stream.interpolation, InterpolationMode::Cubic);
    assert_eq!(config.stream.min_buffer_threshold, 6);
    // Unspecified knobs keep their defaults
    assert_eq!(config.stream.fade_decay, 0.95);
    assert_eq!(config.stream.underrun_burst, 3);

    let driver = PlaybackDriver::new(config.stream).unwrap();
    assert_eq!(driver.threshold(), 6);
}

#[test]
fn test_no_file_means_defaults() {
    let config = PlayerConfig::load(None).unwrap();
    assert_eq!(config, PlayerConfig::default());
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[stream\ninput_sample_rate = ").unwrap();

    assert!(matches!(PlayerConfig::load(Some(&path)), Err(Error::Config(_))));
}

#[test]
fn test_inconsistent_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inconsistent.toml");
    fs::write(&path, "[stream]\nmin_floor = 12\nmax_ceiling = 8\n").unwrap();

    assert!(matches!(
        PlayerConfig::load(Some(&path)),
        Err(Error::InvalidConfiguration(_))
    ));
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(matches!(PlayerConfig::load(Some(&path)), Err(Error::Config(_))));
}
