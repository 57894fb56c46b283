//! Export a project to video.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use reelcut_core::project::preset_by_name;
use reelcut_core::{Container, EditorStore};
use reelcut_render::{
    ExportPhase, Exporter, FfmpegAudioDecoder, FfmpegEncoder, SlateRenderer,
};

pub async fn run(
    project: PathBuf,
    output: Option<PathBuf>,
    preset: Option<String>,
) -> anyhow::Result<()> {
    let mut store = EditorStore::open(&project)
        .with_context(|| format!("Failed to load project {}", project.display()))?;

    let settings = match preset {
        Some(name) => preset_by_name(&name).with_context(|| {
            format!("Unknown preset: {name}. Use: 1080p, 1080p60, 720p, 4k, shorts")
        })?,
        None => store.state().export_settings.clone(),
    };
    let output = output.unwrap_or_else(|| {
        project.with_extension(match settings.container {
            Container::Mp4 => "mp4",
            Container::Webm => "webm",
        })
    });

    println!("Exporting {}", project.display());
    println!("  Output: {}", output.display());
    println!(
        "  Resolution: {}x{} @ {}fps",
        settings.width, settings.height, settings.fps
    );

    let renderer = SlateRenderer::new(settings.width, settings.height);
    let (exporter, mut status) = Exporter::new(renderer, FfmpegEncoder::new(), FfmpegAudioDecoder);
    let mut exporter = exporter.with_settings(settings);

    let watcher = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let s = status.borrow_and_update().clone();
            if s.phase == ExportPhase::Encoding {
                print!(
                    "\r  Progress: {:.1}% ({}/{} frames)  ",
                    s.progress * 100.0,
                    s.frame,
                    s.total_frames
                );
                let _ = std::io::stdout().flush();
            }
            if s.is_terminal() {
                break;
            }
        }
    });

    let target = output.clone();
    let result = tokio::task::spawn_blocking(move || exporter.run(&mut store, &target))
        .await
        .context("Export task panicked")?;
    let _ = watcher.await;

    match result {
        Ok(path) => {
            println!("\nExport complete: {}", path.display());
            Ok(())
        }
        Err(e) => Err(anyhow::Error::new(e).context("Export failed")),
    }
}
