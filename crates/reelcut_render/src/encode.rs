//! ffmpeg-backed [`Encoder`].
//!
//! Video frames are piped as raw RGBA into one ffmpeg process writing a
//! video-only file in a scratch directory. The mixed audio is written as
//! `f32le` next to it and muxed in a second pass with the video stream copied.

use crate::error::{spawn_error, RenderError, Result};
use crate::export::Encoder;
use crate::frame::Raster;
use crate::mix::to_f32le_bytes;
use reelcut_core::{Container, ExportSettings, Seconds, VideoCodec};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;
use tempfile::TempDir;

struct VideoPass {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<String>>,
}

struct Session {
    settings: ExportSettings,
    scratch: TempDir,
    video_path: PathBuf,
    video: VideoPass,
    audio: Option<(PathBuf, u32, u16)>,
    frames: u64,
}

#[derive(Default)]
pub struct FfmpegEncoder {
    session: Option<Session>,
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

fn extension(container: Container) -> &'static str {
    match container {
        Container::Mp4 => "mp4",
        Container::Webm => "webm",
    }
}

fn codec_args(settings: &ExportSettings) -> Result<Vec<String>> {
    let args = match (settings.container, settings.codec) {
        (Container::Mp4, VideoCodec::H264) => vec![
            "-c:v",
            "libx264",
            "-preset",
            "medium",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ],
        (Container::Webm, VideoCodec::Vp9) => vec!["-c:v", "libvpx-vp9", "-pix_fmt", "yuv420p"],
        (container, codec) => {
            return Err(RenderError::InvalidSettings(format!(
                "{codec:?} cannot be stored in {container:?}"
            )))
        }
    };
    let mut args: Vec<String> = args.into_iter().map(String::from).collect();
    args.push("-b:v".into());
    args.push(settings.video_bitrate.to_string());
    Ok(args)
}

fn audio_codec(container: Container) -> &'static str {
    match container {
        Container::Mp4 => "aac",
        Container::Webm => "libopus",
    }
}

/// Read the child's stderr on its own thread while frames are written.
fn drain_stderr(child: &mut Child) -> Option<JoinHandle<String>> {
    let mut stderr = child.stderr.take()?;
    Some(std::thread::spawn(move || {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf);
        buf
    }))
}

fn spawn_video_pass(settings: &ExportSettings, out: &Path) -> Result<VideoPass> {
    let mut cmd = Command::new("ffmpeg");
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .args(["-y", "-loglevel", "error"])
        .args(["-f", "rawvideo", "-pix_fmt", "rgba"])
        .args(["-s", &format!("{}x{}", settings.width, settings.height)])
        .args(["-r", &settings.fps.to_string()])
        .args(["-i", "pipe:0", "-an"])
        .args(codec_args(settings)?)
        .arg(out);

    let mut child = cmd.spawn().map_err(spawn_error)?;
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| RenderError::Encoder("failed to open ffmpeg stdin".into()))?;
    let stderr = drain_stderr(&mut child);
    Ok(VideoPass {
        child,
        stdin: Some(stdin),
        stderr,
    })
}

impl VideoPass {
    fn finish(mut self) -> Result<()> {
        drop(self.stdin.take());
        let status = self.child.wait()?;
        let stderr = self
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        if !status.success() {
            return Err(RenderError::FfmpegFailed(format!(
                "video pass exited with {}: {}",
                status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    /// Close stdin and stop the process without waiting for it to flush.
    fn kill(mut self) {
        drop(self.stdin.take());
        if let Err(e) = self.child.kill() {
            tracing::debug!(error = %e, "ffmpeg video pass already exited");
        }
        let _ = self.child.wait();
        if let Some(handle) = self.stderr.take() {
            let _ = handle.join();
        }
    }
}

fn mux(settings: &ExportSettings, video: &Path, audio: (&Path, u32, u16), out: &Path) -> Result<()> {
    let (audio_path, sample_rate, channels) = audio;
    let output = Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(video)
        .args(["-f", "f32le", "-ar", &sample_rate.to_string()])
        .args(["-ac", &channels.to_string(), "-i"])
        .arg(audio_path)
        .args(["-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy"])
        .args(["-c:a", audio_codec(settings.container)])
        .args(["-b:a", &settings.audio_bitrate.to_string()])
        .arg(out)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(spawn_error)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RenderError::FfmpegFailed(format!(
            "audio mux failed: {}",
            stderr.trim()
        )));
    }
    Ok(())
}

impl Encoder for FfmpegEncoder {
    fn begin(&mut self, settings: &ExportSettings) -> Result<()> {
        if self.session.is_some() {
            return Err(RenderError::Encoder("encoder already started".into()));
        }
        let scratch = tempfile::Builder::new().prefix("reelcut-export-").tempdir()?;
        let video_path = scratch
            .path()
            .join(format!("video.{}", extension(settings.container)));
        let video = spawn_video_pass(settings, &video_path)?;
        tracing::debug!(scratch = %scratch.path().display(), "ffmpeg video pass started");

        self.session = Some(Session {
            settings: settings.clone(),
            scratch,
            video_path,
            video,
            audio: None,
            frames: 0,
        });
        Ok(())
    }

    fn push_video_frame(&mut self, frame: &Raster, _t: Seconds, _duration: Seconds) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| RenderError::Encoder("encoder not started".into()))?;
        if frame.width != session.settings.width || frame.height != session.settings.height {
            return Err(RenderError::Encoder(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, session.settings.width, session.settings.height
            )));
        }
        let stdin = session
            .video
            .stdin
            .as_mut()
            .ok_or_else(|| RenderError::Encoder("video pass already closed".into()))?;
        stdin.write_all(&frame.data).map_err(|e| {
            RenderError::Encoder(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        session.frames += 1;
        Ok(())
    }

    fn push_audio(&mut self, samples: &[f32], sample_rate: u32, channels: u16) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| RenderError::Encoder("encoder not started".into()))?;
        if samples.is_empty() {
            return Ok(());
        }
        let path = session.scratch.path().join("audio.f32le");
        std::fs::write(&path, to_f32le_bytes(samples))?;
        session.audio = Some((path, sample_rate, channels));
        Ok(())
    }

    fn finalize(&mut self) -> Result<Vec<u8>> {
        let session = self
            .session
            .take()
            .ok_or_else(|| RenderError::Encoder("encoder not started".into()))?;
        session.video.finish()?;
        tracing::debug!(frames = session.frames, "ffmpeg video pass finished");

        let path = match &session.audio {
            Some((audio_path, sample_rate, channels)) => {
                let muxed = session
                    .scratch
                    .path()
                    .join(format!("muxed.{}", extension(session.settings.container)));
                mux(
                    &session.settings,
                    &session.video_path,
                    (audio_path.as_path(), *sample_rate, *channels),
                    &muxed,
                )?;
                muxed
            }
            None => session.video_path.clone(),
        };
        Ok(std::fs::read(path)?)
    }

    fn abort(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        session.video.kill();
        tracing::debug!(
            frames = session.frames,
            scratch = %session.scratch.path().display(),
            "ffmpeg session aborted"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn h264_goes_in_mp4() {
        let settings = ExportSettings::default();
        let args = codec_args(&settings).unwrap();
        assert!(args.iter().any(|a| a == "libx264"));
        assert_eq!(args.last(), Some(&settings.video_bitrate.to_string()));
    }

    #[test]
    fn mismatched_codec_is_rejected() {
        let settings = ExportSettings {
            container: Container::Webm,
            codec: VideoCodec::H264,
            ..ExportSettings::default()
        };
        assert!(matches!(
            codec_args(&settings),
            Err(RenderError::InvalidSettings(_))
        ));
    }

    #[test]
    fn frames_before_begin_are_rejected() {
        let mut encoder = FfmpegEncoder::new();
        let frame = Raster::new(2, 2);
        assert!(matches!(
            encoder.push_video_frame(&frame, 0.0, 1.0 / 30.0),
            Err(RenderError::Encoder(_))
        ));
        assert!(encoder.finalize().is_err());
    }

    #[test]
    fn abort_without_session_leaves_encoder_reusable() {
        let mut encoder = FfmpegEncoder::new();
        encoder.abort();
        encoder.abort();
        assert!(encoder.session.is_none());
    }
}
