use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Which rendering surface of the terminal a frame was captured from.
///
/// The text glyphs and the cursor are drawn on separate canvases and are
/// recorded as separate image streams; a complete frame needs one image
/// from each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Text,
    Cursor,
}

impl Layer {
    pub const ALL: [Layer; 2] = [Layer::Text, Layer::Cursor];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Cursor => "cursor",
        }
    }
}

/// File name for one frame. The mapping between (layer, index) and file
/// name is bijective and survives sequence rotation.
pub fn frame_file_name(layer: Layer, index: u32) -> String {
    format!("frame-{}-{:05}.png", layer.as_str(), index)
}

/// File-backed ordered collection of captured frames.
///
/// The capture loop is the only writer while recording; the rotator is the
/// only writer while rotating; rendering only reads.
#[derive(Debug, Clone)]
pub struct FrameStore {
    root: PathBuf,
}

impl FrameStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Clears any previous sequence and recreates the frame directory.
    pub fn init(&self) -> Result<()> {
        self.remove()?;
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create frame directory {}", self.root.display()))
    }

    pub fn frame_path(&self, layer: Layer, index: u32) -> PathBuf {
        self.root.join(frame_file_name(layer, index))
    }

    pub fn write_frame(&self, layer: Layer, index: u32, bytes: &[u8]) -> Result<()> {
        let path = self.frame_path(layer, index);
        fs::write(&path, bytes)
            .with_context(|| format!("failed to write {} frame {}", layer.as_str(), path.display()))
    }

    /// ffmpeg-style `%05d` input pattern for one layer's image sequence.
    pub fn sequence_pattern(&self, layer: Layer) -> String {
        self.root
            .join(format!("frame-{}-%05d.png", layer.as_str()))
            .display()
            .to_string()
    }

    /// Removes the frame directory. An absent directory is fine.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| {
                format!("failed to remove frame directory {}", self.root.display())
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn frame_names_are_zero_padded_per_layer() {
        assert_eq!(frame_file_name(Layer::Text, 1), "frame-text-00001.png");
        assert_eq!(frame_file_name(Layer::Cursor, 90), "frame-cursor-00090.png");
        assert_eq!(frame_file_name(Layer::Text, 123_456), "frame-text-123456.png");
    }

    #[test]
    fn distinct_frames_never_collide() {
        let mut names = std::collections::BTreeSet::new();
        for layer in Layer::ALL {
            for index in 1..=200 {
                assert!(names.insert(frame_file_name(layer, index)));
            }
        }
    }

    #[test]
    fn init_clears_previous_sequence() {
        let dir = tempdir().unwrap();
        let store = FrameStore::new(dir.path().join("frames"));
        store.init().unwrap();
        store.write_frame(Layer::Text, 1, b"png").unwrap();
        assert!(store.frame_path(Layer::Text, 1).is_file());

        store.init().unwrap();
        assert!(!store.frame_path(Layer::Text, 1).exists());
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = FrameStore::new(dir.path().join("frames"));
        store.init().unwrap();
        store.remove().unwrap();
        store.remove().unwrap();
        assert!(!store.root().exists());
    }

    #[test]
    fn sequence_pattern_matches_written_names() {
        let store = FrameStore::new("/tmp/frames");
        let pattern = store.sequence_pattern(Layer::Cursor);
        assert!(pattern.ends_with("frame-cursor-%05d.png"));
    }
}
