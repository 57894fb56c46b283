//! Probe a media file and place it on a track.

use std::path::PathBuf;

use anyhow::Context;
use reelcut_core::config::EngineConfig;
use reelcut_core::placement::find_nearest_free_placement;
use reelcut_core::snapping::{collect_snap_points, find_snap_point};
use reelcut_core::store::DEFAULT_STILL_DURATION;
use reelcut_core::{EditorStore, LoadState, NewClip};
use reelcut_render::{detect_asset_kind, FfprobeLoader};

pub fn run(
    project: PathBuf,
    media: PathBuf,
    track: Option<String>,
    at: Option<f64>,
    config: &EngineConfig,
) -> anyhow::Result<()> {
    let mut store = EditorStore::open(&project)
        .with_context(|| format!("Failed to load project {}", project.display()))?;

    let media = media
        .canonicalize()
        .with_context(|| format!("Media file not found: {}", media.display()))?;
    let kind = detect_asset_kind(&media);
    let name = media
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "media".to_string());

    let asset_id = store.load_asset(&FfprobeLoader, name, media.to_string_lossy(), kind);
    let asset = store
        .asset(asset_id)
        .context("Asset vanished after load")?
        .clone();
    if let LoadState::Error(message) = &asset.load_state {
        anyhow::bail!("Failed to import {}: {message}", media.display());
    }

    let track_name = track.unwrap_or_else(|| {
        if kind == reelcut_core::AssetKind::Audio {
            "Audio 1".to_string()
        } else {
            "Video 1".to_string()
        }
    });
    let track_id = match store.state().tracks.iter().find(|t| t.name == track_name) {
        Some(t) => t.id,
        None => store.add_track(track_name.clone()),
    };

    let track = store
        .track(track_id)
        .context("Track vanished after creation")?;
    let duration = asset.duration().unwrap_or(DEFAULT_STILL_DURATION);
    let desired = match at {
        Some(t) => {
            let points = collect_snap_points(store.state(), None);
            find_snap_point(t.max(0.0), &points, config.snap_threshold)
        }
        None => track.end(),
    };
    let start = find_nearest_free_placement(track, desired, duration, None);

    let mut clip = NewClip::new(asset_id, start);
    if !kind.is_timed() {
        clip = clip.with_end(start + duration);
    }
    let clip_id = store
        .add_clip(track_id, clip)
        .context("Failed to place clip")?;

    store
        .save(&project)
        .with_context(|| format!("Failed to write project {}", project.display()))?;

    let clip = store.clip(clip_id).context("Clip vanished after insert")?;
    println!(
        "Imported {} as {:?} on '{}' at {:.3}s..{:.3}s",
        asset.name, kind, track_name, clip.start, clip.end
    );
    Ok(())
}
