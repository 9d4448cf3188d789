use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_FONT_SIZE: u32 = 22;
const DEFAULT_TYPING_SPEED_MS: u64 = 50;
const DEFAULT_FONT_FAMILY: &str = "JetBrains Mono,DejaVu Sans Mono,Menlo,Bitstream Vera Sans Mono,Inconsolata,Roboto Mono,Hack,Consolas,ui-monospace,monospace";
const DEFAULT_PROMPT: &str = r"\[\e[38;2;90;86;224m\]> \[\e[0m\]";

/// Everything a recording session is configured with. Built once at
/// session start and read-only from then on.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Options {
    pub font_family: String,
    pub font_size: u32,
    pub letter_spacing: f64,
    pub line_height: f64,
    /// Shell prompt installed into the live terminal during setup.
    pub prompt: String,
    /// Keystroke pacing for the command layer that drives terminal input.
    pub typing_speed_ms: u64,
    pub theme: Theme,
    pub video: VideoOptions,
    /// Percentage of the sequence moved to the tail so the video loops
    /// without a visible seam. 0 disables the rotation.
    pub loop_offset_percent: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct VideoOptions {
    pub width: u32,
    pub height: u32,
    /// Subtracted symmetrically from width and height to size the
    /// captured viewport.
    pub padding: u32,
    pub framerate: u32,
    /// Directory the frame sequence is written to.
    pub input: PathBuf,
    pub starting_frame: u32,
    pub cleanup_frames: bool,
    pub output: OutputPaths,
}

/// Artifact paths per encoder. An unset path skips that encoder.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OutputPaths {
    pub gif: Option<PathBuf>,
    pub mp4: Option<PathBuf>,
    pub webm: Option<PathBuf>,
}

/// Terminal color scheme, serialized to JSON in the shape the terminal
/// emulator's `theme` option expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default, rename_all = "camelCase")]
pub struct Theme {
    pub background: String,
    pub foreground: String,
    pub black: String,
    pub red: String,
    pub green: String,
    pub yellow: String,
    pub blue: String,
    pub magenta: String,
    pub cyan: String,
    pub white: String,
    pub bright_black: String,
    pub bright_red: String,
    pub bright_green: String,
    pub bright_yellow: String,
    pub bright_blue: String,
    pub bright_magenta: String,
    pub bright_cyan: String,
    pub bright_white: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            font_family: DEFAULT_FONT_FAMILY.to_owned(),
            font_size: DEFAULT_FONT_SIZE,
            letter_spacing: 0.0,
            line_height: 1.0,
            prompt: DEFAULT_PROMPT.to_owned(),
            typing_speed_ms: DEFAULT_TYPING_SPEED_MS,
            theme: Theme::default(),
            video: VideoOptions::default(),
            loop_offset_percent: 0.0,
        }
    }
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
            padding: 72,
            framerate: 60,
            input: env::temp_dir().join(format!("tapedeck-frames-{}", process::id())),
            starting_frame: 1,
            cleanup_frames: true,
            output: OutputPaths::default(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: "#171717".to_owned(),
            foreground: "#dddddd".to_owned(),
            black: "#282a2e".to_owned(),
            red: "#d74e6f".to_owned(),
            green: "#31bb71".to_owned(),
            yellow: "#d3e561".to_owned(),
            blue: "#8056ff".to_owned(),
            magenta: "#ed61d7".to_owned(),
            cyan: "#04d7d7".to_owned(),
            white: "#bfbfbf".to_owned(),
            bright_black: "#4d4d4d".to_owned(),
            bright_red: "#fe5f86".to_owned(),
            bright_green: "#00d787".to_owned(),
            bright_yellow: "#ebff71".to_owned(),
            bright_blue: "#9b79ff".to_owned(),
            bright_magenta: "#ff7aea".to_owned(),
            bright_cyan: "#00fefe".to_owned(),
            bright_white: "#e6e6e6".to_owned(),
        }
    }
}

impl Options {
    pub fn validate(&self) -> Result<()> {
        if self.font_size == 0 {
            bail!("font size must be > 0");
        }
        if !(self.loop_offset_percent >= 0.0 && self.loop_offset_percent <= 100.0) {
            bail!(
                "loop offset must be between 0 and 100, got {}",
                self.loop_offset_percent
            );
        }
        self.video.validate()
    }

    /// Viewport captured from the terminal: the configured video size with
    /// the padding removed from both edges.
    pub fn capture_viewport(&self) -> (u32, u32) {
        (
            self.video.width - 2 * self.video.padding,
            self.video.height - 2 * self.video.padding,
        )
    }

    pub fn typing_speed(&self) -> Duration {
        Duration::from_millis(self.typing_speed_ms)
    }
}

impl VideoOptions {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!("video size must be positive, got {}x{}", self.width, self.height);
        }
        if 2 * self.padding >= self.width.min(self.height) {
            bail!(
                "padding {} leaves no viewport inside {}x{}",
                self.padding,
                self.width,
                self.height
            );
        }
        if self.framerate == 0 {
            bail!("framerate must be > 0");
        }
        if self.starting_frame == 0 {
            bail!("frame indices start at 1");
        }
        Ok(())
    }
}

/// Loads an options file (YAML) and validates it.
pub fn load_options(path: &Path) -> Result<Options> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read options file {}", path.display()))?;
    let options: Options = serde_yaml::from_str(&contents).map_err(|error| {
        let location = error
            .location()
            .map(|location| format!("line {}, column {}", location.line(), location.column()))
            .unwrap_or_else(|| "unknown location".to_owned());
        anyhow!(
            "failed to parse yaml in {} at {}: {}",
            path.display(),
            location,
            error
        )
    })?;
    options.validate()?;
    Ok(options)
}
