//! Integration tests for aunalyzer
//!
//! Every fixture is generated with hound into a temp dir, so the exact sample
//! content, rate and length are known up front.

use aunalyzer::{
    album_gain, analyze, analyze_with, AnalyzeOptions, ErrorCategory, ErrorKind, TrackInfo,
    Verbosity,
};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Once;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::TRACE)
            .try_init();
    });
}

// ========== Fixture Helpers ==========

/// Write a 997 Hz sine as integer PCM
fn write_int_wav(
    path: &Path,
    sample_rate: u32,
    channels: u16,
    bits: u16,
    frames: usize,
    amplitude: f64,
) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: bits,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let full_scale = f64::from((1i32 << (bits - 1)) - 1);
    for i in 0..frames {
        let t = i as f64 / f64::from(sample_rate);
        let value = (amplitude * (2.0 * std::f64::consts::PI * 997.0 * t).sin() * full_scale) as i32;
        for _ in 0..channels {
            writer.write_sample(value).unwrap();
        }
    }
    writer.finalize().unwrap();
}

/// Write a 997 Hz sine as 32-bit float PCM
fn write_float_wav(path: &Path, sample_rate: u32, channels: u16, frames: usize, amplitude: f32) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let value = amplitude * (2.0 * std::f32::consts::PI * 997.0 * t).sin();
        for _ in 0..channels {
            writer.write_sample(value).unwrap();
        }
    }
    writer.finalize().unwrap();
}

fn stereo_cd_fixture(dir: &Path) -> PathBuf {
    let path = dir.join("cd_5s.wav");
    write_int_wav(&path, 44100, 2, 16, 44100 * 5, 0.5);
    path
}

fn quiet() -> AnalyzeOptions {
    AnalyzeOptions::default().with_verbosity(Verbosity::Quiet)
}

// ========== Metadata ==========

#[test]
fn test_cd_quality_metadata_and_duration() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = stereo_cd_fixture(dir.path());

    let info = analyze(&path, true, true, false).unwrap();

    assert_eq!(info.format_name.as_deref(), Some("wav"));
    assert_eq!(info.sample_rate, 44100);
    assert_eq!(info.bit_depth, 16);
    assert_eq!(info.duration_secs, 5);
    assert_eq!(info.duration_diff, Some(0));
    assert_eq!(info.total_frames, Some(44100 * 5));

    // 44100 Hz * 2 channels * 16 bits
    assert_eq!(info.bit_rate, 1_411_200);
}

#[test]
fn test_metadata_only_leaves_decode_fields_unset() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = stereo_cd_fixture(dir.path());

    let info = analyze(&path, false, true, true).unwrap();

    assert_eq!(info.sample_rate, 44100);
    assert_eq!(info.duration_secs, 5);
    assert!(info.total_frames.is_none());
    assert!(info.duration_diff.is_none());
    assert!(info.integrated_lufs.is_none());
    assert!(info.sample_peak.is_none());
    assert!(info.loudness_range.is_none());
    assert!(info.replaygain_db.is_none());
}

#[test]
fn test_decode_without_loudness_counts_frames() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = stereo_cd_fixture(dir.path());

    let info = analyze(&path, true, false, false).unwrap();

    assert_eq!(info.total_frames, Some(44100 * 5));
    assert_eq!(info.duration_diff, Some(0));
    assert!(info.integrated_lufs.is_none());
    assert!(info.replaygain_db.is_none());
}

#[test]
fn test_high_resolution_int() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hires.wav");
    write_int_wav(&path, 96000, 2, 24, 96000 * 3, 0.5);

    let info = analyze_with(&path, &quiet()).unwrap();

    assert_eq!(info.sample_rate, 96000);
    assert_eq!(info.bit_depth, 24);
    assert_eq!(info.duration_secs, 3);
    assert_eq!(info.total_frames, Some(96000 * 3));
    assert!(info.integrated_lufs.unwrap().is_finite());
}

// ========== Loudness ==========

#[test]
fn test_replaygain_is_reference_minus_loudness() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = stereo_cd_fixture(dir.path());

    let info = analyze(&path, true, true, false).unwrap();

    let iloud = info.integrated_lufs.unwrap();
    assert!((info.replaygain_db.unwrap() - (-18.0 - iloud)).abs() < 1e-9);

    // Half-scale stereo sine comes out around -6.7 LUFS
    assert!(iloud > -8.0 && iloud < -1.0, "integrated loudness {}", iloud);

    let peak = info.sample_peak.unwrap();
    assert!(peak > 0.49 && peak <= 0.5 + 1e-6, "peak {}", peak);
    assert!(info.relative_threshold.unwrap() < iloud);
}

#[test]
fn test_loudness_range_only_when_requested() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = stereo_cd_fixture(dir.path());

    let without = analyze(&path, true, true, false).unwrap();
    assert!(without.loudness_range.is_none());

    let with = analyze(&path, true, true, true).unwrap();
    assert!(with.loudness_range.unwrap() >= 0.0);

    // The range measurement does not disturb the others
    assert_eq!(with.integrated_lufs, without.integrated_lufs);
    assert_eq!(with.sample_peak, without.sample_peak);
}

#[test]
fn test_float_and_int_sources_measure_alike() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let float_path = dir.path().join("float.wav");
    let int_path = dir.path().join("int.wav");
    write_float_wav(&float_path, 48000, 2, 48000 * 4, 0.25);
    write_int_wav(&int_path, 48000, 2, 24, 48000 * 4, 0.25);

    let float = analyze_with(&float_path, &quiet()).unwrap();
    let int = analyze_with(&int_path, &quiet()).unwrap();

    assert_eq!(float.bit_depth, 32);
    assert_eq!(float.total_frames, int.total_frames);
    let delta = (float.integrated_lufs.unwrap() - int.integrated_lufs.unwrap()).abs();
    assert!(delta < 0.01, "loudness differs by {}", delta);
}

#[test]
fn test_silence_is_not_an_error() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("silence.wav");
    write_int_wav(&path, 44100, 2, 16, 44100 * 2, 0.0);

    let info = analyze(&path, true, true, false).unwrap();

    assert_eq!(info.integrated_lufs, Some(f64::NEG_INFINITY));
    assert_eq!(info.sample_peak, Some(0.0));
    assert_eq!(info.total_frames, Some(44100 * 2));
}

#[test]
fn test_custom_reference_level() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = stereo_cd_fixture(dir.path());

    let options = quiet().with_reference_lufs(-23.0);
    let info = analyze_with(&path, &options).unwrap();

    let iloud = info.integrated_lufs.unwrap();
    assert!((info.replaygain_db.unwrap() - (-23.0 - iloud)).abs() < 1e-9);
}

#[test]
fn test_album_gain_over_analyzed_tracks() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let soft = dir.path().join("soft.wav");
    let loud = dir.path().join("loud.wav");
    write_int_wav(&soft, 44100, 2, 16, 44100 * 3, 0.1);
    write_int_wav(&loud, 44100, 2, 16, 44100 * 3, 0.8);

    let tracks: Vec<TrackInfo> = [&soft, &loud]
        .iter()
        .map(|p| analyze_with(p, &quiet()).unwrap())
        .collect();
    let album = album_gain(&tracks).unwrap();

    assert_eq!(album.track_count, 2);
    assert!(album.album_lufs > tracks[0].integrated_lufs.unwrap());
    assert!(album.album_lufs < tracks[1].integrated_lufs.unwrap());
    assert_eq!(Some(album.peak), tracks[1].sample_peak);
}

#[test]
fn test_many_channels_are_measured() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ten_channels.wav");
    write_int_wav(&path, 48000, 10, 16, 48000 * 2, 0.25);

    let info = analyze_with(&path, &quiet()).unwrap();

    assert_eq!(info.total_frames, Some(48000 * 2));
    assert_eq!(info.bit_rate, 48000 * 10 * 16);
    assert!(info.integrated_lufs.unwrap().is_finite());
    let peak = info.sample_peak.unwrap();
    assert!(peak > 0.24 && peak <= 0.25 + 1e-4, "peak {}", peak);
}

#[test]
fn test_low_sample_rate_is_measured() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("low_rate.wav");
    write_int_wav(&path, 4000, 1, 16, 4000 * 3, 0.25);

    let info = analyze_with(&path, &quiet()).unwrap();

    assert_eq!(info.sample_rate, 4000);
    assert_eq!(info.total_frames, Some(4000 * 3));
    assert!(info.sample_peak.unwrap() > 0.0);
    assert!(info.replaygain_db.is_some());
}

// ========== Determinism ==========

#[test]
fn test_repeated_analysis_is_identical() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mono.wav");
    write_int_wav(&path, 48000, 1, 16, 48000 * 3 + 1234, 0.3);

    let options = quiet().with_range(true);
    let first = analyze_with(&path, &options).unwrap();
    let second = analyze_with(&path, &options).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_concurrent_analysis() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let paths: Vec<PathBuf> = (0..4)
        .map(|i| {
            let path = dir.path().join(format!("track{}.wav", i));
            write_int_wav(&path, 44100, 2, 16, 44100 * 2, 0.1 * f64::from(i + 1));
            path
        })
        .collect();

    let sequential: Vec<TrackInfo> = paths
        .iter()
        .map(|p| analyze_with(p, &quiet()).unwrap())
        .collect();

    let parallel: Vec<TrackInfo> = std::thread::scope(|scope| {
        let handles: Vec<_> = paths
            .iter()
            .map(|p| scope.spawn(move || analyze_with(p, &quiet()).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(sequential, parallel);
}

// ========== Errors ==========

#[test]
fn test_missing_file() {
    init_tracing();
    let err = analyze("/nonexistent/dir/track.flac", true, true, false).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::FileNotFound);
    assert_eq!(err.kind().category(), ErrorCategory::FileNotFound);
    assert_eq!(err.partial(), &TrackInfo::default());
    assert!(err
        .to_string()
        .starts_with("Audio analyzer error: File not found or not accessible"));
}

#[test]
fn test_non_audio_file_has_no_stream() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.wav");
    let mut file = File::create(&path).unwrap();
    file.write_all(b"This is not a valid WAV file, just some text.")
        .unwrap();
    drop(file);

    let err = analyze(&path, true, true, false).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NoStream);
    assert_eq!(err.code(), 3);
    assert_eq!(err.partial(), &TrackInfo::default());
}

#[test]
fn test_directory_is_not_a_file() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let err = analyze(dir.path(), false, false, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileNotFound);
}

// ========== Configuration ==========

#[test]
fn test_options_from_json() {
    let options: AnalyzeOptions =
        serde_json::from_str(r#"{ "measure_range": true, "verbosity": "verbose" }"#).unwrap();

    assert!(options.do_decode);
    assert!(options.measure_loudness);
    assert!(options.measure_range);
    assert_eq!(options.verbosity, Verbosity::Verbose);
    assert_eq!(options.duration_warn_secs, 2);
    assert_eq!(options.reference_lufs, -18.0);
}

#[test]
fn test_track_info_serializes() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = stereo_cd_fixture(dir.path());
    let info = analyze(&path, false, false, false).unwrap();

    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["format_name"], "wav");
    assert_eq!(json["sample_rate"], 44100);
    assert!(json["integrated_lufs"].is_null());
}
