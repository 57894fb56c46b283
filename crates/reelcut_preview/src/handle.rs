use crate::error::Result;
use reelcut_core::{Asset, Seconds};

/// A playable media resource with its own clock (a video element, an mpv
/// instance, an audio sink). Positions are in the asset's own timeline.
pub trait MediaHandle {
    fn seek(&mut self, t: Seconds) -> Result<()>;
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn set_rate(&mut self, rate: f64) -> Result<()>;
    /// Linear gain, 0.0 for silence.
    fn set_volume(&mut self, volume: f64) -> Result<()>;
    /// Self-reported position. Only ever used to measure drift.
    fn position(&self) -> Result<Seconds>;
    fn is_paused(&self) -> Result<bool>;
}

/// Opens a [`MediaHandle`] for a loaded video or audio asset.
pub trait MediaOpener {
    fn open(&mut self, asset: &Asset) -> Result<Box<dyn MediaHandle>>;
}
