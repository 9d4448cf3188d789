use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result};

use crate::frames::{FrameStore, Layer};
use crate::options::{Theme, VideoOptions};

/// One external encoder invocation producing one artifact.
pub struct Encoder {
    name: &'static str,
    artifact: PathBuf,
    command: Command,
}

impl Encoder {
    pub fn new<P: Into<PathBuf>>(name: &'static str, artifact: P, command: Command) -> Self {
        Self {
            name,
            artifact: artifact.into(),
            command,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn artifact(&self) -> &Path {
        &self.artifact
    }
}

/// Runs every encoder to completion, sequentially. A failing encoder has
/// its combined output surfaced and the rest still run; the pipeline
/// reports success regardless, returning the artifacts that were
/// produced. This is deliberately softer than the rotation's fatal
/// policy.
pub fn run_pipeline(encoders: Vec<Encoder>) -> Result<Vec<PathBuf>> {
    let mut artifacts = Vec::new();
    for mut encoder in encoders {
        let invoked = encoder
            .command
            .output()
            .with_context(|| format!("failed to invoke {} encoder", encoder.name));
        match invoked {
            Ok(output) if output.status.success() => artifacts.push(encoder.artifact),
            Ok(output) => {
                eprintln!("{} encoder exited with {}", encoder.name, output.status);
                eprintln!("{}", combined_output(&output).trim_end());
            }
            Err(err) => eprintln!("{err:#}"),
        }
    }
    Ok(artifacts)
}

fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

/// The default encoder set over a captured frame sequence: a looping GIF
/// plus MP4 and WebM containers, one per configured output path.
pub fn default_encoders(
    store: &FrameStore,
    video: &VideoOptions,
    starting_frame: u32,
    theme: &Theme,
) -> Vec<Encoder> {
    let mut encoders = Vec::new();
    if let Some(path) = &video.output.gif {
        encoders.push(Encoder::new(
            "gif",
            path,
            gif_command(store, video, starting_frame, theme, path),
        ));
    }
    if let Some(path) = &video.output.mp4 {
        encoders.push(Encoder::new(
            "mp4",
            path,
            mp4_command(store, video, starting_frame, theme, path),
        ));
    }
    if let Some(path) = &video.output.webm {
        encoders.push(Encoder::new(
            "webm",
            path,
            webm_command(store, video, starting_frame, theme, path),
        ));
    }
    encoders
}

fn gif_command(
    store: &FrameStore,
    video: &VideoOptions,
    starting_frame: u32,
    theme: &Theme,
    path: &Path,
) -> Command {
    let filter = format!(
        "{};[framed]split[a][b];[a]palettegen[palette];[b][palette]paletteuse[out]",
        compose_filter(video, theme)
    );
    let mut command = ffmpeg_command();
    command
        .args(sequence_input_args(store, video, starting_frame))
        .arg("-filter_complex")
        .arg(filter)
        .args(["-map", "[out]"])
        .arg(path);
    command
}

fn mp4_command(
    store: &FrameStore,
    video: &VideoOptions,
    starting_frame: u32,
    theme: &Theme,
    path: &Path,
) -> Command {
    let mut command = ffmpeg_command();
    command
        .args(sequence_input_args(store, video, starting_frame))
        .arg("-filter_complex")
        .arg(compose_filter(video, theme))
        .args(["-map", "[framed]"])
        .args(["-c:v", "libx264", "-pix_fmt", "yuv420p", "-an"])
        .arg(path);
    command
}

fn webm_command(
    store: &FrameStore,
    video: &VideoOptions,
    starting_frame: u32,
    theme: &Theme,
    path: &Path,
) -> Command {
    let mut command = ffmpeg_command();
    command
        .args(sequence_input_args(store, video, starting_frame))
        .arg("-filter_complex")
        .arg(compose_filter(video, theme))
        .args(["-map", "[framed]"])
        .args(["-c:v", "libvpx-vp9", "-pix_fmt", "yuv420p", "-an"])
        .arg(path);
    command
}

/// Both layer sequences as ffmpeg inputs: text first, cursor second.
fn sequence_input_args(store: &FrameStore, video: &VideoOptions, starting_frame: u32) -> Vec<String> {
    let framerate = video.framerate.to_string();
    let start = starting_frame.to_string();
    vec![
        "-hide_banner".to_owned(),
        "-loglevel".to_owned(),
        "error".to_owned(),
        "-y".to_owned(),
        "-r".to_owned(),
        framerate.clone(),
        "-start_number".to_owned(),
        start.clone(),
        "-i".to_owned(),
        store.sequence_pattern(Layer::Text),
        "-r".to_owned(),
        framerate,
        "-start_number".to_owned(),
        start,
        "-i".to_owned(),
        store.sequence_pattern(Layer::Cursor),
    ]
}

/// Overlays the cursor layer on the text layer and pads the result to the
/// configured video size with the terminal background color.
fn compose_filter(video: &VideoOptions, theme: &Theme) -> String {
    format!(
        "[0][1]overlay[merged];[merged]pad={}:{}:{p}:{p}:{bg}[framed]",
        video.width,
        video.height,
        p = video.padding,
        bg = theme.background,
    )
}

#[cfg(feature = "sidecar_ffmpeg")]
fn ffmpeg_command() -> Command {
    let path = ffmpeg_sidecar::paths::ffmpeg_path();
    if !path.exists() {
        if let Err(err) = ffmpeg_sidecar::download::auto_download() {
            eprintln!("ffmpeg sidecar download failed ({err:#}), falling back to system ffmpeg");
            return Command::new("ffmpeg");
        }
    }
    Command::new(path)
}

#[cfg(not(feature = "sidecar_ffmpeg"))]
fn ffmpeg_command() -> Command {
    Command::new("ffmpeg")
}
