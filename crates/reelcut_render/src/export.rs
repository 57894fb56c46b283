//! Deterministic frame-by-frame export.
//!
//! The exporter drives the store's own clock: for every output frame it seeks
//! the store, resolves the active clips exactly as live playback would, asks
//! the [`Renderer`] for one synchronous pass and hands the cropped raster to the
//! [`Encoder`]. Audio is mixed offline into a single buffer. The finished
//! container is written to `<output>.partial` and renamed into place, so a
//! failed export never clobbers an earlier artifact.

use crate::decode::AudioDecoder;
use crate::error::{RenderError, Result};
use crate::frame::{composition_frame, Raster};
use crate::mix::{build_mix_plan, mix, MixPlan};
use reelcut_core::time::frame_count;
use reelcut_core::{
    active_clips, ActiveClip, EditorState, EditorStore, ExportSettings, Seconds, TIME_EPSILON,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::watch;

/// Draws the composition at one instant.
pub trait Renderer {
    /// Size of the surface `render` draws into.
    fn surface_size(&self) -> (u32, u32);

    /// Draw `active` (bottom-most first) as of global time `t`.
    fn render(&mut self, state: &EditorState, t: Seconds, active: &[ActiveClip<'_>])
        -> Result<Raster>;
}

/// Accepts raster frames and one PCM track, produces the finished container.
pub trait Encoder {
    fn begin(&mut self, settings: &ExportSettings) -> Result<()>;
    fn push_video_frame(&mut self, frame: &Raster, t: Seconds, duration: Seconds) -> Result<()>;
    fn push_audio(&mut self, samples: &[f32], sample_rate: u32, channels: u16) -> Result<()>;
    fn finalize(&mut self) -> Result<Vec<u8>>;

    /// Tear down a session that will not be finalized. Must leave the
    /// encoder ready for another `begin`; a no-op when nothing is open.
    fn abort(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    Idle,
    Preparing,
    Encoding,
    Finalizing,
    Done,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportStatus {
    pub phase: ExportPhase,
    /// 0.0 to 1.0.
    pub progress: f64,
    pub message: Option<String>,
    pub output: Option<PathBuf>,
    pub frame: u64,
    pub total_frames: u64,
}

impl Default for ExportStatus {
    fn default() -> Self {
        Self {
            phase: ExportPhase::Idle,
            progress: 0.0,
            message: None,
            output: None,
            frame: 0,
            total_frames: 0,
        }
    }
}

impl ExportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, ExportPhase::Done | ExportPhase::Error)
    }
}

/// Check settings the encoder relies on.
pub fn validate_settings(settings: &ExportSettings) -> Result<()> {
    if settings.width == 0 || settings.height == 0 {
        return Err(RenderError::InvalidSettings(
            "width/height must be non-zero".into(),
        ));
    }
    if settings.width % 2 != 0 || settings.height % 2 != 0 {
        return Err(RenderError::InvalidSettings(format!(
            "width/height must be even, got {}x{}",
            settings.width, settings.height
        )));
    }
    if !settings.fps.is_finite() || settings.fps <= 0.0 {
        return Err(RenderError::InvalidSettings(format!(
            "fps must be positive, got {}",
            settings.fps
        )));
    }
    if settings.sample_rate == 0 {
        return Err(RenderError::InvalidSettings(
            "sample rate must be non-zero".into(),
        ));
    }
    if !(1..=2).contains(&settings.channels) {
        return Err(RenderError::InvalidSettings(format!(
            "channels must be 1 or 2, got {}",
            settings.channels
        )));
    }
    Ok(())
}

/// Global time of output frame `index`. Never reaches `total` itself, where
/// no clip is active any more.
pub fn frame_time(index: u64, fps: f64, total: Seconds) -> Seconds {
    (index as f64 / fps).min(total - TIME_EPSILON).max(0.0)
}

/// `<output>.partial` next to the output.
pub fn partial_path(output: &Path) -> Result<PathBuf> {
    let name = output.file_name().ok_or_else(|| {
        RenderError::InvalidSettings(format!("output path has no file name: {}", output.display()))
    })?;
    let mut partial = name.to_os_string();
    partial.push(".partial");
    Ok(output.with_file_name(partial))
}

pub struct Exporter<R, E, D> {
    renderer: R,
    encoder: E,
    decoder: D,
    settings: Option<ExportSettings>,
    status: watch::Sender<ExportStatus>,
}

impl<R: Renderer, E: Encoder, D: AudioDecoder> Exporter<R, E, D> {
    pub fn new(renderer: R, encoder: E, decoder: D) -> (Self, watch::Receiver<ExportStatus>) {
        let (status, rx) = watch::channel(ExportStatus::default());
        (
            Self {
                renderer,
                encoder,
                decoder,
                settings: None,
                status,
            },
            rx,
        )
    }

    /// Export with `settings` instead of the project's own.
    pub fn with_settings(mut self, settings: ExportSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<ExportStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> ExportStatus {
        self.status.borrow().clone()
    }

    pub fn into_parts(self) -> (R, E, D) {
        (self.renderer, self.encoder, self.decoder)
    }

    /// Render the whole composition to `output`.
    ///
    /// Playback is paused for the duration and the clock is put back where it
    /// was afterwards, whether or not the export succeeded.
    pub fn run(&mut self, store: &mut EditorStore, output: &Path) -> Result<PathBuf> {
        let saved_time = store.current_time();
        let was_playing = store.is_playing();
        store.pause();

        let started = Instant::now();
        let result = self.export(store, output);

        store.seek_to(saved_time);
        if was_playing {
            store.play();
        }

        match result {
            Ok(path) => {
                tracing::info!(
                    output = %path.display(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "export finished"
                );
                self.status.send_modify(|s| {
                    s.phase = ExportPhase::Done;
                    s.progress = 1.0;
                    s.message = None;
                    s.output = Some(path.clone());
                });
                Ok(path)
            }
            Err(e) => {
                tracing::warn!(error = %e, output = %output.display(), "export failed");
                self.status.send_modify(|s| {
                    s.phase = ExportPhase::Error;
                    s.message = Some(e.to_string());
                    s.output = None;
                });
                Err(e)
            }
        }
    }

    fn set_phase(&self, phase: ExportPhase, message: &str) {
        self.status.send_modify(|s| {
            s.phase = phase;
            s.message = Some(message.to_string());
        });
    }

    fn export(&mut self, store: &mut EditorStore, output: &Path) -> Result<PathBuf> {
        self.status.send_replace(ExportStatus {
            phase: ExportPhase::Preparing,
            message: Some("Preparing".into()),
            ..ExportStatus::default()
        });

        let settings = self
            .settings
            .clone()
            .unwrap_or_else(|| store.state().export_settings.clone());
        validate_settings(&settings)?;

        let total = store.total_duration();
        if store.state().clips().next().is_none() || total <= TIME_EPSILON {
            return Err(RenderError::EmptyComposition);
        }
        let total_frames = frame_count(total, settings.fps);
        let partial = partial_path(output)?;

        let (surface_w, surface_h) = self.renderer.surface_size();
        tracing::info!(
            output = %output.display(),
            surface = %format!("{surface_w}x{surface_h}"),
            width = settings.width,
            height = settings.height,
            fps = settings.fps,
            duration = total,
            total_frames,
            "export started"
        );

        let plan = build_mix_plan(store.state(), &settings, &mut self.decoder)?;

        self.encoder.begin(&settings)?;
        let bytes = match self.encode(store, &settings, &plan, total, total_frames) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.encoder.abort();
                return Err(e);
            }
        };
        write_atomically(&partial, output, &bytes)?;
        Ok(output.to_path_buf())
    }

    /// Everything between `begin` and `finalize`.
    fn encode(
        &mut self,
        store: &mut EditorStore,
        settings: &ExportSettings,
        plan: &MixPlan,
        total: Seconds,
        total_frames: u64,
    ) -> Result<Vec<u8>> {
        self.status.send_modify(|s| {
            s.phase = ExportPhase::Encoding;
            s.message = Some("Encoding".into());
            s.total_frames = total_frames;
        });

        let frame_duration = 1.0 / settings.fps;
        let throttle = (total_frames / 100).max(1);
        for index in 0..total_frames {
            let t = frame_time(index, settings.fps, total);
            store.seek_to(t);
            let state = store.state();
            let active = active_clips(state, t);
            let surface = self.renderer.render(state, t, &active)?;
            let frame = fit_to_output(&surface, settings);
            self.encoder.push_video_frame(&frame, t, frame_duration)?;

            let done = index + 1;
            if done % throttle == 0 || done == total_frames {
                self.status.send_modify(|s| {
                    s.frame = done;
                    s.progress = done as f64 / total_frames as f64;
                });
            }
        }

        let samples = mix(plan);
        self.encoder
            .push_audio(&samples, plan.sample_rate, plan.channels)?;

        self.set_phase(ExportPhase::Finalizing, "Finalizing");
        self.encoder.finalize()
    }
}

/// Crop the composition frame out of the surface and scale it to the output
/// size. Surfaces that already match are passed through untouched.
fn fit_to_output(surface: &Raster, settings: &ExportSettings) -> Raster {
    if surface.width == settings.width && surface.height == settings.height {
        return surface.clone();
    }
    let rect = composition_frame(surface.width, surface.height, settings.aspect_ratio());
    surface.crop_scale(rect, settings.width, settings.height)
}

fn write_atomically(partial: &Path, output: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let written = std::fs::write(partial, bytes).and_then(|()| std::fs::rename(partial, output));
    if let Err(e) = written {
        let _ = std::fs::remove_file(partial);
        return Err(e.into());
    }
    Ok(())
}
