//! List the clips on screen at a given time.

use std::path::PathBuf;

use anyhow::Context;
use reelcut_core::time::format_timecode;
use reelcut_core::EditorStore;

pub fn run(project: PathBuf, at: f64) -> anyhow::Result<()> {
    let store = EditorStore::open(&project)
        .with_context(|| format!("Failed to load project {}", project.display()))?;

    let active = store.active_clips(at);
    println!(
        "Active at {} ({} clips, bottom first):",
        format_timecode(at),
        active.len()
    );
    for a in &active {
        println!(
            "  [{}] {:<12} {:?} {}  local {}",
            a.track.z_index,
            a.track.name,
            a.clip.kind(),
            a.asset.map(|asset| asset.name.as_str()).unwrap_or("?"),
            format_timecode(a.local_time)
        );
    }
    Ok(())
}
