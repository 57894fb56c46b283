//! Play a project through mpv, one process per media clip.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use reelcut_core::config::EngineConfig;
use reelcut_core::time::format_timecode;
use reelcut_core::{EditorStore, TickOutcome};
use reelcut_preview::{MpvOpener, PreviewSession};

/// Display-refresh cadence of the preview loop.
const TICK: Duration = Duration::from_millis(16);

pub async fn run(project: PathBuf, from: f64, config: &EngineConfig) -> anyhow::Result<()> {
    let mut store = EditorStore::open(&project)
        .with_context(|| format!("Failed to load project {}", project.display()))?;
    if store.total_duration() <= 0.0 {
        anyhow::bail!("Project {} has nothing to play", project.display());
    }

    let mut session = PreviewSession::new(MpvOpener, config.sync.clone());
    session.attach(&mut store);
    session.seek(&mut store, from, Instant::now());
    store.play();
    println!(
        "Playing {} from {} (Ctrl-C to stop)",
        store.state().name,
        format_timecode(store.current_time())
    );

    let mut interval = tokio::time::interval(TICK);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut last = Instant::now();

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut ctrl_c => break,
        }
        let now = Instant::now();
        let elapsed = now.duration_since(last).as_secs_f64();
        last = now;
        if let TickOutcome::Stopped(t) = session.tick(&mut store, elapsed, now) {
            tracing::debug!(t, "preview reached the end");
            break;
        }
    }

    store.pause();
    session.reconcile(store.state(), Instant::now());
    session.detach(&mut store);
    println!("Stopped at {}", format_timecode(store.current_time()));
    Ok(())
}
