//! Show project information.

use std::path::PathBuf;

use anyhow::Context;
use reelcut_core::time::format_timecode;
use reelcut_core::{EditorStore, LoadState};

pub fn run(project: PathBuf, json: bool) -> anyhow::Result<()> {
    let store = EditorStore::open(&project)
        .with_context(|| format!("Failed to load project {}", project.display()))?;
    let state = store.state();

    if json {
        println!("{}", serde_json::to_string_pretty(&store.snapshot())?);
        return Ok(());
    }

    println!("Project: {}", state.name);
    println!("  ID: {}", state.id);
    println!("  Duration: {}", format_timecode(state.total_duration));
    println!();

    println!("Tracks (top first):");
    for track in &state.tracks {
        let mut flags = Vec::new();
        if track.muted {
            flags.push("muted");
        }
        if !track.visible {
            flags.push("hidden");
        }
        if track.locked {
            flags.push("locked");
        }
        println!(
            "  [{}] {} ({} clips, volume {:.2}){}",
            track.z_index,
            track.name,
            track.clips.len(),
            track.volume,
            if flags.is_empty() {
                String::new()
            } else {
                format!(" {}", flags.join(", "))
            }
        );
        for clip in &track.clips {
            let asset = state
                .asset(clip.asset_id)
                .map(|a| a.name.as_str())
                .unwrap_or("?");
            println!(
                "    {:?} {} .. {}  {}",
                clip.kind(),
                format_timecode(clip.start),
                format_timecode(clip.end),
                asset
            );
        }
    }
    println!();

    println!("Assets:");
    for asset in state.assets.values() {
        let status = match &asset.load_state {
            LoadState::Loading => "loading".to_string(),
            LoadState::Loaded => match asset.duration() {
                Some(d) => format!("{:.2}s", d),
                None => "loaded".to_string(),
            },
            LoadState::Error(e) => format!("error: {e}"),
        };
        println!("  {} ({:?}, {}) {}", asset.name, asset.kind, status, asset.src);
    }
    println!();

    let export = &state.export_settings;
    println!("Export settings:");
    println!(
        "  {}x{} @ {}fps, {:?}/{:?}",
        export.width, export.height, export.fps, export.container, export.codec
    );
    println!(
        "  Audio: {} Hz, {} ch, {} kbps",
        export.sample_rate,
        export.channels,
        export.audio_bitrate / 1000
    );

    Ok(())
}
