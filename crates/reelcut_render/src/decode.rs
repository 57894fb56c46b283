use reelcut_core::{Asset, Seconds};
use std::process::{Command, Stdio};

use crate::error::{spawn_error, RenderError, Result};

/// Decoded PCM for one source, interleaved `f32` in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl PcmBuffer {
    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / usize::from(self.channels)
    }

    /// Linearly interpolated value of `channel` at source time `t`, or `None`
    /// past the end. Channels beyond the buffer's reuse its last one.
    pub fn sample_at(&self, t: Seconds, channel: usize) -> Option<f32> {
        let stride = usize::from(self.channels);
        let frames = self.frames();
        if frames == 0 {
            return None;
        }
        let pos = t * f64::from(self.sample_rate);
        if !pos.is_finite() || pos < 0.0 {
            return None;
        }
        let i0 = pos.floor() as usize;
        if i0 >= frames {
            return None;
        }
        let i1 = (i0 + 1).min(frames - 1);
        let ch = channel.min(stride - 1);
        let a = *self.samples.get(i0 * stride + ch)?;
        let b = *self.samples.get(i1 * stride + ch)?;
        Some(a + (b - a) * (pos - i0 as f64) as f32)
    }
}

/// Turns an asset's audio track into PCM at the requested mix format.
pub trait AudioDecoder {
    fn decode(&mut self, asset: &Asset, sample_rate: u32, channels: u16) -> Result<PcmBuffer>;
}

/// Decodes through `ffmpeg -f f32le` on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegAudioDecoder;

impl AudioDecoder for FfmpegAudioDecoder {
    fn decode(&mut self, asset: &Asset, sample_rate: u32, channels: u16) -> Result<PcmBuffer> {
        let output = Command::new("ffmpeg")
            .args(["-v", "error", "-i", &asset.src])
            .args([
                "-vn",
                "-f",
                "f32le",
                "-acodec",
                "pcm_f32le",
                "-ac",
                &channels.to_string(),
                "-ar",
                &sample_rate.to_string(),
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(spawn_error)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::Decode(format!(
                "{}: {}",
                asset.src,
                stderr.trim()
            )));
        }

        let samples = parse_f32le(&output.stdout);
        tracing::debug!(src = %asset.src, frames = samples.len() / usize::from(channels.max(1)), "decoded audio");
        Ok(PcmBuffer {
            sample_rate,
            channels,
            samples,
        })
    }
}

fn parse_f32le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_f32le_samples() {
        let mut bytes = Vec::new();
        for v in [0.0f32, 0.5, -1.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.push(0xff); // trailing partial sample
        assert_eq!(parse_f32le(&bytes), vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn frame_count_accounts_for_channels() {
        let pcm = PcmBuffer {
            sample_rate: 48_000,
            channels: 2,
            samples: vec![0.0; 10],
        };
        assert_eq!(pcm.frames(), 5);
    }

    #[test]
    fn sample_at_interpolates_and_stops_at_end() {
        let pcm = PcmBuffer {
            sample_rate: 10,
            channels: 1,
            samples: vec![0.0, 1.0, 0.5],
        };
        assert_eq!(pcm.sample_at(0.0, 0), Some(0.0));
        assert!((pcm.sample_at(0.05, 0).unwrap() - 0.5).abs() < 1e-6);
        // mono source feeds the right channel too
        assert_eq!(pcm.sample_at(0.1, 1), Some(1.0));
        assert_eq!(pcm.sample_at(0.3, 0), None);
        assert_eq!(pcm.sample_at(-0.1, 0), None);
    }
}
