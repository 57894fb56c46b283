//! Offline audio mix for export.
//!
//! Every audible clip contributes one [`AudioSegment`]; segments are summed
//! additively into an interleaved buffer covering `[0, total_duration)` and
//! the result is clamped to `[-1, 1]`.

use crate::decode::{AudioDecoder, PcmBuffer};
use crate::error::{RenderError, Result};
use reelcut_core::time::frame_to_seconds;
use reelcut_core::{Asset, AssetKind, ClipContent, EditorState, ExportSettings, Seconds};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// One clip's contribution to the mix.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    pub clip_id: Uuid,
    pub timeline_start_sample: u64,
    pub timeline_end_sample: u64,
    pub source_start_sec: Seconds,
    pub source_end_sec: Option<Seconds>,
    /// Source seconds consumed per timeline second.
    pub playback_rate: f64,
    /// `clip_volume * track_volume`.
    pub volume: f32,
    pub fade_in_sec: Seconds,
    pub fade_out_sec: Seconds,
    pub source: Arc<PcmBuffer>,
}

#[derive(Debug, Clone)]
pub struct MixPlan {
    pub sample_rate: u32,
    pub channels: u16,
    pub total_samples: u64,
    pub segments: Vec<AudioSegment>,
}

pub fn seconds_to_sample(t: Seconds, sample_rate: u32) -> u64 {
    (t.max(0.0) * f64::from(sample_rate)).round() as u64
}

/// Gain an audible clip contributes, or `None` when it is silent.
///
/// A clip pointing at an asset the document no longer has is an error rather
/// than silence, so a broken project does not export with missing audio.
fn clip_gain(state: &EditorState, clip_id: Uuid) -> Result<Option<(f32, &Asset)>> {
    let Some((track, clip)) = state.clip(clip_id) else {
        return Ok(None);
    };
    if track.muted || !clip.is_audible() {
        return Ok(None);
    }
    let gain = clip.volume * track.volume;
    if gain <= 0.0 {
        return Ok(None);
    }
    let asset = state
        .asset(clip.asset_id)
        .ok_or(RenderError::AssetNotFound(clip.asset_id))?;
    if !asset.is_loaded() {
        return Ok(None);
    }
    let carries_audio = match asset.kind {
        AssetKind::Audio => true,
        AssetKind::Video => asset.has_audio(),
        AssetKind::Image | AssetKind::Text => false,
    };
    Ok(carries_audio.then_some((gain as f32, asset)))
}

/// Decode every audible source once and lay out one segment per clip.
pub fn build_mix_plan(
    state: &EditorState,
    settings: &ExportSettings,
    decoder: &mut dyn AudioDecoder,
) -> Result<MixPlan> {
    let sample_rate = settings.sample_rate;
    let channels = settings.channels;
    let total_samples = seconds_to_sample(state.total_duration, sample_rate);

    let mut sources: HashMap<Uuid, Arc<PcmBuffer>> = HashMap::new();
    let mut segments = Vec::new();

    for (_, clip) in state.clips() {
        let Some((volume, asset)) = clip_gain(state, clip.id)? else {
            continue;
        };
        let source = match sources.get(&asset.id) {
            Some(pcm) => Arc::clone(pcm),
            None => {
                let pcm = Arc::new(decoder.decode(asset, sample_rate, channels)?);
                if pcm.channels == 0 || pcm.sample_rate == 0 {
                    return Err(RenderError::Decode(format!(
                        "{}: decoder returned an empty format",
                        asset.src
                    )));
                }
                sources.insert(asset.id, Arc::clone(&pcm));
                pcm
            }
        };

        let (fade_in_sec, fade_out_sec) = match &clip.content {
            ClipContent::Audio {
                fade_in, fade_out, ..
            } => (*fade_in, *fade_out),
            ClipContent::Video { .. } | ClipContent::Image { .. } | ClipContent::Text { .. } => {
                (0.0, 0.0)
            }
        };

        segments.push(AudioSegment {
            clip_id: clip.id,
            timeline_start_sample: seconds_to_sample(clip.start, sample_rate),
            timeline_end_sample: seconds_to_sample(clip.end, sample_rate).min(total_samples),
            source_start_sec: clip.trim_start(),
            source_end_sec: clip.trim_end(asset.duration()),
            playback_rate: clip.content.speed(),
            volume,
            fade_in_sec,
            fade_out_sec,
            source,
        });
    }

    tracing::debug!(
        segments = segments.len(),
        sources = sources.len(),
        total_samples,
        "audio mix planned"
    );
    Ok(MixPlan {
        sample_rate,
        channels,
        total_samples,
        segments,
    })
}

/// Mix all segments into interleaved output PCM.
pub fn mix(plan: &MixPlan) -> Vec<f32> {
    let frames = plan.total_samples as usize;
    let mut out = vec![0.0f32; frames * usize::from(plan.channels)];

    for seg in &plan.segments {
        mix_segment(&mut out, plan, seg);
    }

    for s in &mut out {
        *s = s.clamp(-1.0, 1.0);
    }
    out
}

fn mix_segment(out: &mut [f32], plan: &MixPlan, seg: &AudioSegment) {
    let channels = usize::from(plan.channels);
    if channels == 0 {
        return;
    }
    let first = seg.timeline_start_sample as usize;
    let count = seg
        .timeline_end_sample
        .saturating_sub(seg.timeline_start_sample) as usize;
    let length = frame_to_seconds(count as u64, f64::from(plan.sample_rate));

    let frames = out.chunks_exact_mut(channels).skip(first).take(count);
    for (offset, frame) in frames.enumerate() {
        let rel = frame_to_seconds(offset as u64, f64::from(plan.sample_rate));
        let Some(src_t) = seg.source_time(rel) else {
            break;
        };
        let gain = seg.envelope(rel, length) * seg.volume;
        for (ch, slot) in frame.iter_mut().enumerate() {
            let Some(value) = seg.source.sample_at(src_t, ch) else {
                return;
            };
            *slot += value * gain;
        }
    }
}

impl AudioSegment {
    /// Source time heard `rel` seconds into the segment; `None` once the
    /// trimmed source is used up.
    fn source_time(&self, rel: Seconds) -> Option<Seconds> {
        let t = self.source_start_sec + rel * self.playback_rate;
        match self.source_end_sec {
            Some(end) if t >= end => None,
            _ => Some(t),
        }
    }

    /// Fade-in times fade-out at `rel` seconds into a segment `length` long.
    fn envelope(&self, rel: Seconds, length: Seconds) -> f32 {
        ramp(rel, self.fade_in_sec) * ramp(length - rel, self.fade_out_sec)
    }
}

/// 0 at `elapsed = 0` rising linearly to 1 at `over`. No fade when `over` is 0.
fn ramp(elapsed: Seconds, over: Seconds) -> f32 {
    if over <= 0.0 {
        return 1.0;
    }
    (elapsed / over).clamp(0.0, 1.0) as f32
}

/// Raw little-endian bytes of interleaved samples, as ffmpeg's `f32le` expects.
pub fn to_f32le_bytes(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 4);
    for &sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}
