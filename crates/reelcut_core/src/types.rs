use crate::time::{Seconds, TIME_EPSILON};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Vec3 / Transform
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: Vec3::ONE,
    };
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Video,
    Image,
    Audio,
    Text,
}

impl AssetKind {
    /// Video and audio play back against their own clock and can be trimmed.
    pub fn is_timed(self) -> bool {
        matches!(self, AssetKind::Video | AssetKind::Audio)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum LoadState {
    Loading,
    Loaded,
    Error(String),
}

/// Metadata reported by the asset loader once decoding finished.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AssetMeta {
    Pending,
    Video {
        duration: Seconds,
        fps: f64,
        width: u32,
        height: u32,
        has_audio: bool,
    },
    Audio {
        duration: Seconds,
        sample_rate: u32,
        channels: u16,
    },
    Image {
        width: u32,
        height: u32,
    },
    Text,
}

impl AssetMeta {
    pub fn duration(&self) -> Option<Seconds> {
        match self {
            AssetMeta::Video { duration, .. } | AssetMeta::Audio { duration, .. } => {
                Some(*duration)
            }
            AssetMeta::Image { .. } | AssetMeta::Text | AssetMeta::Pending => None,
        }
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            AssetMeta::Video { width, height, .. } | AssetMeta::Image { width, height } => {
                Some((*width, *height))
            }
            AssetMeta::Audio { .. } | AssetMeta::Text | AssetMeta::Pending => None,
        }
    }

    /// Whether this metadata can describe an asset of `kind`.
    pub fn matches_kind(&self, kind: AssetKind) -> bool {
        matches!(
            (self, kind),
            (AssetMeta::Video { .. }, AssetKind::Video)
                | (AssetMeta::Audio { .. }, AssetKind::Audio)
                | (AssetMeta::Image { .. }, AssetKind::Image)
                | (AssetMeta::Text, AssetKind::Text)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Asset {
    pub id: Uuid,
    pub name: String,
    pub src: String,
    pub kind: AssetKind,
    pub load_state: LoadState,
    pub meta: AssetMeta,
}

impl Asset {
    /// A fully loaded asset.
    pub fn loaded(name: impl Into<String>, src: impl Into<String>, meta: AssetMeta) -> Self {
        let kind = match meta {
            AssetMeta::Video { .. } => AssetKind::Video,
            AssetMeta::Audio { .. } => AssetKind::Audio,
            AssetMeta::Image { .. } => AssetKind::Image,
            AssetMeta::Text | AssetMeta::Pending => AssetKind::Text,
        };
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            src: src.into(),
            kind,
            load_state: LoadState::Loaded,
            meta,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.load_state == LoadState::Loaded
    }

    pub fn duration(&self) -> Option<Seconds> {
        self.meta.duration()
    }

    pub fn aspect_ratio(&self) -> Option<f64> {
        self.meta
            .dimensions()
            .filter(|(w, h)| *w > 0 && *h > 0)
            .map(|(w, h)| w as f64 / h as f64)
    }

    /// Whether the asset carries an audio stream the mixer can use.
    pub fn has_audio(&self) -> bool {
        match self.meta {
            AssetMeta::Video { has_audio, .. } => has_audio,
            AssetMeta::Audio { .. } => true,
            AssetMeta::Image { .. } | AssetMeta::Text | AssetMeta::Pending => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Kind-specific clip content
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ImageAdjustments {
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
    pub exposure: f64,
    pub temperature: f64,
    pub blur: f64,
}

impl ImageAdjustments {
    pub const NEUTRAL: Self = Self {
        brightness: 0.0,
        contrast: 1.0,
        saturation: 1.0,
        exposure: 0.0,
        temperature: 0.0,
        blur: 0.0,
    };
}

impl Default for ImageAdjustments {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FilterPreset {
    Grayscale,
    Sepia,
    Vintage,
    Warm,
    Cool,
    Dramatic,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f64,
    pub color: String,
    pub background: Option<String>,
    pub bold: bool,
    pub italic: bool,
    pub align: TextAlign,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: "Inter".to_string(),
            font_size: 48.0,
            color: "#ffffff".to_string(),
            background: None,
            bold: false,
            italic: false,
            align: TextAlign::Center,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TextAnimationKind {
    FadeIn,
    FadeOut,
    SlideUp,
    SlideDown,
    Typewriter,
    Pop,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TextAnimation {
    pub kind: TextAnimationKind,
    pub duration: Seconds,
}

/// Per-kind clip fields. Every consumer matches exhaustively on this.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClipContent {
    Video {
        trim_start: Seconds,
        trim_end: Option<Seconds>,
    },
    Audio {
        trim_start: Seconds,
        trim_end: Option<Seconds>,
        speed: f64,
        fade_in: Seconds,
        fade_out: Seconds,
    },
    Image {
        adjustments: ImageAdjustments,
        filter: Option<FilterPreset>,
    },
    Text {
        content: String,
        style: TextStyle,
        animations: Vec<TextAnimation>,
    },
}

impl ClipContent {
    /// Default content for a freshly added clip of `kind`.
    pub fn default_for(kind: AssetKind) -> Self {
        match kind {
            AssetKind::Video => ClipContent::Video {
                trim_start: 0.0,
                trim_end: None,
            },
            AssetKind::Audio => ClipContent::Audio {
                trim_start: 0.0,
                trim_end: None,
                speed: 1.0,
                fade_in: 0.0,
                fade_out: 0.0,
            },
            AssetKind::Image => ClipContent::Image {
                adjustments: ImageAdjustments::NEUTRAL,
                filter: None,
            },
            AssetKind::Text => ClipContent::Text {
                content: String::new(),
                style: TextStyle::default(),
                animations: vec![],
            },
        }
    }

    pub fn kind(&self) -> AssetKind {
        match self {
            ClipContent::Video { .. } => AssetKind::Video,
            ClipContent::Audio { .. } => AssetKind::Audio,
            ClipContent::Image { .. } => AssetKind::Image,
            ClipContent::Text { .. } => AssetKind::Text,
        }
    }

    /// `(trim_start, trim_end)` for video/audio content.
    pub fn trim(&self) -> Option<(Seconds, Option<Seconds>)> {
        match self {
            ClipContent::Video {
                trim_start,
                trim_end,
            }
            | ClipContent::Audio {
                trim_start,
                trim_end,
                ..
            } => Some((*trim_start, *trim_end)),
            ClipContent::Image { .. } | ClipContent::Text { .. } => None,
        }
    }

    pub fn set_trim(&mut self, start: Seconds, end: Option<Seconds>) {
        match self {
            ClipContent::Video {
                trim_start,
                trim_end,
            }
            | ClipContent::Audio {
                trim_start,
                trim_end,
                ..
            } => {
                *trim_start = start;
                *trim_end = end;
            }
            ClipContent::Image { .. } | ClipContent::Text { .. } => {}
        }
    }

    /// Source seconds consumed per timeline second.
    pub fn speed(&self) -> f64 {
        match self {
            ClipContent::Audio { speed, .. } if *speed > 0.0 => *speed,
            ClipContent::Audio { .. }
            | ClipContent::Video { .. }
            | ClipContent::Image { .. }
            | ClipContent::Text { .. } => 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Clip
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clip {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub start: Seconds,
    pub end: Seconds,
    pub duration: Seconds,
    pub transform: Transform,
    pub opacity: f64,
    pub visible: bool,
    pub volume: f64,
    pub muted: bool,
    pub content: ClipContent,
}

impl Clip {
    pub fn kind(&self) -> AssetKind {
        self.content.kind()
    }

    pub fn trim_start(&self) -> Seconds {
        self.content.trim().map(|(s, _)| s).unwrap_or(0.0)
    }

    /// Effective trim end: explicit `trim_end`, else the asset's duration.
    pub fn trim_end(&self, asset_duration: Option<Seconds>) -> Option<Seconds> {
        self.content
            .trim()
            .and_then(|(_, end)| end.or(asset_duration))
    }

    /// Recompute `duration` (and for video/audio, `end`) from the current fields.
    pub fn recompute_duration(&mut self, asset_duration: Option<Seconds>) {
        match self.content.trim() {
            Some((trim_start, _)) => {
                if let Some(trim_end) = self.trim_end(asset_duration) {
                    self.duration = ((trim_end - trim_start) / self.content.speed()).max(0.0);
                    self.end = self.start + self.duration;
                } else {
                    self.duration = self.end - self.start;
                }
            }
            None => self.duration = self.end - self.start,
        }
    }

    /// `start <= t < end`
    pub fn contains(&self, t: Seconds) -> bool {
        self.start <= t && t < self.end
    }

    pub fn overlaps(&self, start: Seconds, end: Seconds) -> bool {
        self.start < end - TIME_EPSILON && start < self.end - TIME_EPSILON
    }

    /// Position inside the asset's own timeline for global time `t`.
    pub fn local_time(&self, t: Seconds, asset_duration: Option<Seconds>) -> Seconds {
        let raw = self.trim_start() + (t - self.start) * self.content.speed();
        match asset_duration {
            Some(d) => raw.clamp(0.0, d.max(0.0)),
            None => raw.max(0.0),
        }
    }

    /// Audible at all, before track settings are applied.
    pub fn is_audible(&self) -> bool {
        !self.muted && self.volume > 0.0
    }
}

// ---------------------------------------------------------------------------
// Track
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub id: Uuid,
    pub name: String,
    pub clips: Vec<Clip>,
    pub muted: bool,
    pub volume: f64,
    pub z_index: usize,
    pub visible: bool,
    pub locked: bool,
    pub color: String,
}

impl Track {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            clips: vec![],
            muted: false,
            volume: 1.0,
            z_index: 0,
            visible: true,
            locked: false,
            color: "#4f8cff".to_string(),
        }
    }

    pub fn clip(&self, id: Uuid) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    /// Latest end over this track's clips, 0 when empty.
    pub fn end(&self) -> Seconds {
        self.clips.iter().map(|c| c.end).fold(0.0, f64::max)
    }
}

// ---------------------------------------------------------------------------
// Playback / viewport / export settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackState {
    pub current_time: Seconds,
    pub is_playing: bool,
    pub playback_rate: f64,
    pub loop_enabled: bool,
    pub start_time: Seconds,
    pub end_time: Option<Seconds>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            is_playing: false,
            playback_rate: 1.0,
            loop_enabled: false,
            start_time: 0.0,
            end_time: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    /// Pixels per second.
    pub zoom: f64,
    pub scroll_offset: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 100.0,
            scroll_offset: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Mp4,
    Webm,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    Vp9,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportSettings {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Bits per second.
    pub video_bitrate: u64,
    /// Bits per second.
    pub audio_bitrate: u64,
    pub sample_rate: u32,
    pub channels: u16,
    pub container: Container,
    pub codec: VideoCodec,
}

impl ExportSettings {
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 1.0;
        }
        self.width as f64 / self.height as f64
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        crate::project::preset_1080p()
    }
}

// ---------------------------------------------------------------------------
// EditorState
// ---------------------------------------------------------------------------

/// The whole editable document. `snapshot()` hands out clones of this.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditorState {
    pub id: Uuid,
    pub name: String,
    pub tracks: Vec<Track>,
    pub assets: BTreeMap<Uuid, Asset>,
    pub playback: PlaybackState,
    pub selected_clip_ids: BTreeSet<Uuid>,
    pub selected_track_ids: BTreeSet<Uuid>,
    pub viewport: Viewport,
    pub total_duration: Seconds,
    pub export_settings: ExportSettings,
}

/// Persisted form of the editor state.
pub type EditorDocument = EditorState;

impl EditorState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            tracks: vec![],
            assets: BTreeMap::new(),
            playback: PlaybackState::default(),
            selected_clip_ids: BTreeSet::new(),
            selected_track_ids: BTreeSet::new(),
            viewport: Viewport::default(),
            total_duration: 0.0,
            export_settings: ExportSettings::default(),
        }
    }

    pub fn track(&self, id: Uuid) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn asset(&self, id: Uuid) -> Option<&Asset> {
        self.assets.get(&id)
    }

    /// Clip by id together with the track that owns it.
    pub fn clip(&self, id: Uuid) -> Option<(&Track, &Clip)> {
        self.tracks
            .iter()
            .find_map(|t| t.clip(id).map(|c| (t, c)))
    }

    pub fn clips(&self) -> impl Iterator<Item = (&Track, &Clip)> {
        self.tracks
            .iter()
            .flat_map(|t| t.clips.iter().map(move |c| (t, c)))
    }
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
