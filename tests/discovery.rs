//! Source video discovery tests.

use std::fs;

use battlecut::{BattlecutError, find_source_video};

#[test]
fn finds_the_single_recording() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    fs::write(directory.path().join("session.mp4"), b"").unwrap();
    fs::write(directory.path().join("start_frame.jpg"), b"").unwrap();
    fs::write(directory.path().join("notes.txt"), b"").unwrap();

    let found = find_source_video(directory.path(), "mp4").expect("Expected one recording");
    assert_eq!(found, directory.path().join("session.mp4"));
}

#[test]
fn extension_match_ignores_case_and_dot() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    fs::write(directory.path().join("SESSION.MP4"), b"").unwrap();

    let found = find_source_video(directory.path(), ".mp4").expect("Expected one recording");
    assert_eq!(found, directory.path().join("SESSION.MP4"));
}

#[test]
fn no_recording_is_an_error() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    fs::write(directory.path().join("session.mkv"), b"").unwrap();

    let result = find_source_video(directory.path(), "mp4");
    assert!(matches!(
        result,
        Err(BattlecutError::InputCardinality { found: 0, .. })
    ));
}

#[test]
fn several_recordings_are_an_error() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    fs::write(directory.path().join("a.mp4"), b"").unwrap();
    fs::write(directory.path().join("b.mp4"), b"").unwrap();

    let error = find_source_video(directory.path(), "mp4").unwrap_err();
    assert!(matches!(
        error,
        BattlecutError::InputCardinality { found: 2, .. }
    ));
    assert!(
        error.to_string().contains("exactly one .mp4"),
        "Error message should explain the expectation: {error}"
    );
}

#[test]
fn directories_are_not_recordings() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    fs::create_dir(directory.path().join("old.mp4")).unwrap();
    fs::write(directory.path().join("new.mp4"), b"").unwrap();

    let found = find_source_video(directory.path(), "mp4").unwrap();
    assert_eq!(found, directory.path().join("new.mp4"));
}

#[test]
fn missing_directory_is_an_io_error() {
    let result = find_source_video("this_directory_does_not_exist", "mp4");
    assert!(matches!(result, Err(BattlecutError::IoError(_))));
}
