use std::process::Command;

use tempfile::tempdir;

use tapedeck::frames::{FrameStore, Layer};
use tapedeck::options::Options;
use tapedeck::render::{run_pipeline, Encoder};
use tapedeck::session::cleanup_frames;

fn touch_command(path: &std::path::Path) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(format!("touch {}", path.display()));
    command
}

fn failing_command() -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg("echo simulated encoder failure; exit 3");
    command
}

#[test]
fn one_failing_encoder_does_not_block_the_rest() {
    let dir = tempdir().unwrap();
    let broken = dir.path().join("out.mp4");
    let produced = dir.path().join("out.gif");

    // The failing encoder runs first; the pipeline must still reach the
    // second one and report overall success.
    let artifacts = run_pipeline(vec![
        Encoder::new("mp4", &broken, failing_command()),
        Encoder::new("gif", &produced, touch_command(&produced)),
    ])
    .unwrap();

    assert_eq!(artifacts, vec![produced.clone()]);
    assert!(produced.is_file());
    assert!(!broken.exists());
}

#[test]
fn missing_encoder_binary_is_survivable() {
    let artifacts = run_pipeline(vec![Encoder::new(
        "gone",
        "/tmp/never-produced",
        Command::new("tapedeck-no-such-encoder"),
    )])
    .unwrap();
    assert!(artifacts.is_empty());
}

#[test]
fn cleanup_honors_the_configured_flag() {
    let dir = tempdir().unwrap();
    let store = FrameStore::new(dir.path().join("frames"));
    store.init().unwrap();
    store.write_frame(Layer::Text, 1, b"png").unwrap();

    let mut options = Options::default();
    options.video.cleanup_frames = false;
    cleanup_frames(&options, &store).unwrap();
    assert!(store.root().is_dir());

    options.video.cleanup_frames = true;
    cleanup_frames(&options, &store).unwrap();
    assert!(!store.root().exists());

    // Idempotent once the directory is gone.
    cleanup_frames(&options, &store).unwrap();
}
