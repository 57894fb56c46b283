//! Create an empty project.

use std::path::PathBuf;

use anyhow::Context;
use reelcut_core::config::EngineConfig;
use reelcut_core::{EditorState, EditorStore};

pub fn run(path: PathBuf, name: Option<String>, config: &EngineConfig) -> anyhow::Result<()> {
    let name = name.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled".to_string())
    });

    let mut state = EditorState::new(name);
    state.export_settings = config.export.clone();
    let mut store = EditorStore::new(state);
    store.add_track("Video 1");
    store.add_track("Audio 1");

    let written = store
        .save(&path)
        .with_context(|| format!("Failed to write project {}", path.display()))?;
    println!("Created project: {}", written.display());
    Ok(())
}
