use reelcut_core::{Asset, AssetKind, AssetLoader, AssetMeta, LoadState};
use serde::Deserialize;
use std::path::Path;
use uuid::Uuid;

use crate::error::{RenderError, Result};

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    channels: Option<u16>,
    sample_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run ffprobe on a media file and describe it as an asset of `kind`.
pub fn probe_asset(path: impl AsRef<Path>, kind: AssetKind) -> Result<AssetMeta> {
    if kind == AssetKind::Text {
        return Ok(AssetMeta::Text);
    }
    let path = path.as_ref();
    if !path.exists() {
        return Err(RenderError::FileNotFound(path.to_path_buf()));
    }

    let output = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| RenderError::FfprobeExec(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RenderError::FfprobeFailed(stderr.into_owned()));
    }

    let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
    parse_probe_output(&probe, kind)
}

/// Import a media file: detect its kind, probe it and create a loaded `Asset`.
pub fn import_asset(path: impl AsRef<Path>) -> Result<Asset> {
    let path = path.as_ref();
    let kind = detect_asset_kind(path);
    let meta = probe_asset(path, kind)?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string());

    Ok(Asset {
        id: Uuid::new_v4(),
        name,
        src: path.to_string_lossy().into_owned(),
        kind,
        load_state: LoadState::Loaded,
        meta,
    })
}

/// [`AssetLoader`] backed by ffprobe.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfprobeLoader;

impl AssetLoader for FfprobeLoader {
    fn load(
        &self,
        src: &str,
        kind: AssetKind,
    ) -> std::result::Result<AssetMeta, Box<dyn std::error::Error + Send + Sync>> {
        Ok(probe_asset(src, kind)?)
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn parse_probe_output(probe: &FfprobeOutput, kind: AssetKind) -> Result<AssetMeta> {
    let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");
    let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let width = video_stream.and_then(|s| s.width).unwrap_or(0);
    let height = video_stream.and_then(|s| s.height).unwrap_or(0);

    match kind {
        AssetKind::Video => {
            if video_stream.is_none() {
                return Err(RenderError::FfprobeFailed("no video stream".into()));
            }
            if duration <= 0.0 {
                return Err(RenderError::FfprobeFailed("unknown duration".into()));
            }
            let fps = video_stream
                .and_then(|s| s.r_frame_rate.as_deref())
                .and_then(parse_frame_rate)
                .unwrap_or(0.0);
            Ok(AssetMeta::Video {
                duration,
                fps,
                width,
                height,
                has_audio: audio_stream.is_some(),
            })
        }
        AssetKind::Audio => {
            let stream =
                audio_stream.ok_or_else(|| RenderError::FfprobeFailed("no audio stream".into()))?;
            if duration <= 0.0 {
                return Err(RenderError::FfprobeFailed("unknown duration".into()));
            }
            Ok(AssetMeta::Audio {
                duration,
                sample_rate: stream
                    .sample_rate
                    .as_deref()
                    .and_then(|r| r.parse::<u32>().ok())
                    .unwrap_or(0),
                channels: stream.channels.unwrap_or(0),
            })
        }
        AssetKind::Image => {
            if width == 0 || height == 0 {
                return Err(RenderError::FfprobeFailed("image has no dimensions".into()));
            }
            Ok(AssetMeta::Image { width, height })
        }
        AssetKind::Text => Ok(AssetMeta::Text),
    }
}

/// Parse ffprobe frame rate string like "30000/1001" or "30/1" into f64.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    if let Some((num, den)) = rate.split_once('/') {
        let n: f64 = num.parse().ok()?;
        let d: f64 = den.parse().ok()?;
        if d == 0.0 {
            return None;
        }
        Some(n / d)
    } else {
        rate.parse().ok()
    }
}

/// Detect asset kind from the file extension; anything unknown is treated as video.
pub fn detect_asset_kind(path: &Path) -> AssetKind {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" | "tiff" => AssetKind::Image,
        "mp3" | "wav" | "flac" | "aac" | "ogg" | "m4a" | "opus" => AssetKind::Audio,
        "txt" => AssetKind::Text,
        _ => AssetKind::Video,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str, kind: AssetKind) -> Result<AssetMeta> {
        let output: FfprobeOutput = serde_json::from_str(json).unwrap();
        parse_probe_output(&output, kind)
    }

    const VIDEO_JSON: &str = r#"{
        "streams": [
            {
                "codec_type": "video",
                "codec_name": "h264",
                "width": 1920,
                "height": 1080,
                "r_frame_rate": "30/1"
            },
            {
                "codec_type": "audio",
                "codec_name": "aac",
                "channels": 2,
                "sample_rate": "48000"
            }
        ],
        "format": {
            "duration": "10.5"
        }
    }"#;

    #[test]
    fn parse_frame_rate_fraction() {
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_frame_rate_plain() {
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
    }

    #[test]
    fn parse_frame_rate_zero_denominator() {
        assert!(parse_frame_rate("30/0").is_none());
    }

    #[test]
    fn detect_kind_by_extension() {
        assert_eq!(detect_asset_kind(Path::new("photo.png")), AssetKind::Image);
        assert_eq!(detect_asset_kind(Path::new("PHOTO.JPG")), AssetKind::Image);
        assert_eq!(detect_asset_kind(Path::new("song.mp3")), AssetKind::Audio);
        assert_eq!(detect_asset_kind(Path::new("clip.mkv")), AssetKind::Video);
    }

    #[test]
    fn parse_video_with_audio() {
        let meta = parse(VIDEO_JSON, AssetKind::Video).unwrap();
        assert_eq!(
            meta,
            AssetMeta::Video {
                duration: 10.5,
                fps: 30.0,
                width: 1920,
                height: 1080,
                has_audio: true,
            }
        );
    }

    #[test]
    fn parse_audio_only() {
        let json = r#"{
            "streams": [
                {
                    "codec_type": "audio",
                    "codec_name": "mp3",
                    "channels": 2,
                    "sample_rate": "44100"
                }
            ],
            "format": {
                "duration": "180.0"
            }
        }"#;
        assert_eq!(
            parse(json, AssetKind::Audio).unwrap(),
            AssetMeta::Audio {
                duration: 180.0,
                sample_rate: 44100,
                channels: 2,
            }
        );
        assert!(parse(json, AssetKind::Video).is_err());
    }

    #[test]
    fn parse_image_dimensions() {
        let json = r#"{
            "streams": [{ "codec_type": "video", "width": 640, "height": 480 }],
            "format": {}
        }"#;
        assert_eq!(
            parse(json, AssetKind::Image).unwrap(),
            AssetMeta::Image {
                width: 640,
                height: 480
            }
        );
    }

    #[test]
    fn parse_missing_streams_fails_for_timed_media() {
        let json = r#"{ "streams": [], "format": {} }"#;
        assert!(parse(json, AssetKind::Video).is_err());
        assert!(parse(json, AssetKind::Audio).is_err());
        assert!(parse(json, AssetKind::Image).is_err());
    }

    #[test]
    fn probe_nonexistent_file_returns_error() {
        let result = probe_asset("/tmp/does_not_exist_reelcut_probe_test.mp4", AssetKind::Video);
        assert!(matches!(result, Err(RenderError::FileNotFound(_))));
    }

    #[test]
    fn text_assets_need_no_probe() {
        assert_eq!(
            probe_asset("/nowhere", AssetKind::Text).unwrap(),
            AssetMeta::Text
        );
    }
}
