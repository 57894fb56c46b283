use crate::error::{CoreError, Result};
use crate::store::EditorStore;
use crate::types::*;
use std::path::{Path, PathBuf};

pub const PROJECT_EXTENSION: &str = "reelcut";

impl EditorState {
    /// Save the document as pretty-printed JSON.
    /// Appends the `.reelcut` extension if not present and returns the path written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = ensure_extension(path.as_ref());
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        tracing::debug!(path = %path.display(), "project saved");
        Ok(path)
    }

    /// Load a document from a JSON file. Derived fields are taken as stored;
    /// use [`EditorStore::open`] to get them re-normalized.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref()).map_err(CoreError::Io)?;
        let doc: EditorState = serde_json::from_str(&data)?;
        Ok(doc)
    }
}

impl EditorStore {
    /// Open a project file into a fresh store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(EditorState::load_from_file(path)?))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        self.state().save_to_file(path)
    }
}

fn preset(width: u32, height: u32, fps: f64, video_bitrate: u64) -> ExportSettings {
    ExportSettings {
        width,
        height,
        fps,
        video_bitrate,
        audio_bitrate: 192_000,
        sample_rate: 48_000,
        channels: 2,
        container: Container::Mp4,
        codec: VideoCodec::H264,
    }
}

/// 1920x1080 30fps preset.
pub fn preset_1080p() -> ExportSettings {
    preset(1920, 1080, 30.0, 8_000_000)
}

/// 1080x1920 30fps (vertical/shorts) preset.
pub fn preset_shorts() -> ExportSettings {
    preset(1080, 1920, 30.0, 8_000_000)
}

/// 1280x720 30fps preset.
pub fn preset_720p() -> ExportSettings {
    preset(1280, 720, 30.0, 5_000_000)
}

/// 3840x2160 30fps (4K) preset.
pub fn preset_4k() -> ExportSettings {
    preset(3840, 2160, 30.0, 35_000_000)
}

/// 1920x1080 60fps preset.
pub fn preset_1080p_60() -> ExportSettings {
    preset(1920, 1080, 60.0, 12_000_000)
}

/// Look a preset up by its CLI name.
pub fn preset_by_name(name: &str) -> Option<ExportSettings> {
    match name {
        "1080p" => Some(preset_1080p()),
        "1080p60" => Some(preset_1080p_60()),
        "720p" => Some(preset_720p()),
        "4k" => Some(preset_4k()),
        "shorts" => Some(preset_shorts()),
        _ => None,
    }
}

fn ensure_extension(path: &Path) -> PathBuf {
    if path.extension().and_then(|e| e.to_str()) == Some(PROJECT_EXTENSION) {
        path.to_path_buf()
    } else {
        let mut p = path.to_path_buf();
        let mut name = p.file_name().unwrap_or_default().to_os_string();
        name.push(".");
        name.push(PROJECT_EXTENSION);
        p.set_file_name(name);
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewClip;
    use tempfile::TempDir;

    #[test]
    fn create_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test_project.reelcut");

        let state = EditorState::new("Test Project");
        state.save_to_file(&path).unwrap();

        let loaded = EditorState::load_from_file(&path).unwrap();
        assert_eq!(state, loaded);
    }

    #[test]
    fn save_load_with_assets_and_clips() {
        let dir = TempDir::new().unwrap();
        let mut store = EditorStore::default();
        let track = store.add_track("V1");
        let asset = store.add_asset(Asset::loaded(
            "clip.mp4",
            "/media/clip.mp4",
            AssetMeta::Video {
                duration: 10.0,
                fps: 30.0,
                width: 1920,
                height: 1080,
                has_audio: true,
            },
        ));
        store
            .add_clip(track, NewClip::new(asset, 0.0).with_trim(0.0, Some(5.0)))
            .unwrap();

        let written = store.save(dir.path().join("populated")).unwrap();
        let reopened = EditorStore::open(&written).unwrap();
        assert_eq!(store.snapshot(), reopened.snapshot());
    }

    #[test]
    fn load_nonexistent_file_returns_error() {
        let result = EditorState::load_from_file("/tmp/does_not_exist_reelcut_test.reelcut");
        assert!(matches!(result, Err(CoreError::Io(_))));
    }

    #[test]
    fn load_garbage_returns_json_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.reelcut");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            EditorState::load_from_file(&path),
            Err(CoreError::Json(_))
        ));
    }

    #[test]
    fn preset_values_are_correct() {
        let p1080 = preset_1080p();
        assert_eq!((p1080.width, p1080.height, p1080.fps), (1920, 1080, 30.0));
        assert_eq!(p1080.sample_rate, 48000);

        let shorts = preset_shorts();
        assert_eq!((shorts.width, shorts.height), (1080, 1920));

        let p720 = preset_720p();
        assert_eq!((p720.width, p720.height), (1280, 720));

        let p4k = preset_4k();
        assert_eq!((p4k.width, p4k.height), (3840, 2160));

        let p1080_60 = preset_1080p_60();
        assert_eq!(p1080_60.fps, 60.0);

        assert_eq!(ExportSettings::default(), preset_1080p());
        assert_eq!(preset_by_name("shorts"), Some(preset_shorts()));
        assert_eq!(preset_by_name("8k"), None);
    }

    #[test]
    fn extension_appended_if_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no_ext");

        let state = EditorState::new("ExtTest");
        let written = state.save_to_file(&path).unwrap();

        let expected_path = dir.path().join("no_ext.reelcut");
        assert_eq!(written, expected_path);
        assert!(expected_path.exists());

        let loaded = EditorState::load_from_file(&expected_path).unwrap();
        assert_eq!(state, loaded);
    }
}
