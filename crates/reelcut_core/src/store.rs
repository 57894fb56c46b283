//! The canonical editor document and every mutation that may touch it.
//!
//! [`EditorStore`] owns the [`EditorState`]. Readers get shared references or
//! [`EditorStore::snapshot`] clones; writers go through the methods here, each
//! of which leaves the document consistent before returning: clip durations
//! derived, `total_duration` recomputed, track z-order normalized and no
//! selection pointing at a deleted id.

use crate::error::{CoreError, Result};
use crate::placement;
use crate::time::{Seconds, TIME_EPSILON};
use crate::types::*;
use std::fmt;
use uuid::Uuid;

/// Length given to image and text clips added without an explicit end.
pub const DEFAULT_STILL_DURATION: Seconds = 5.0;

/// Shortest clip an interactive trim may leave behind.
pub const MIN_CLIP_DURATION: Seconds = 0.05;

/// Capability to resolve a source into asset metadata.
pub trait AssetLoader {
    fn load(
        &self,
        src: &str,
        kind: AssetKind,
    ) -> std::result::Result<AssetMeta, Box<dyn std::error::Error + Send + Sync>>;
}

/// Notification sent to subscribers after a mutation has been applied.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    AssetAdded(Uuid),
    AssetUpdated(Uuid),
    AssetRemoved(Uuid),
    TrackAdded(Uuid),
    TrackUpdated(Uuid),
    TrackRemoved(Uuid),
    TracksReordered,
    ClipAdded(Uuid),
    ClipUpdated(Uuid),
    ClipRemoved(Uuid),
    SelectionChanged,
    PlaybackChanged,
    TimeUpdated(Seconds),
    Seeked(Seconds),
    DocumentChanged,
    SnapshotLoaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

pub type Listener = Box<dyn FnMut(&StoreEvent) + Send>;

// ---------------------------------------------------------------------------
// Mutation inputs
// ---------------------------------------------------------------------------

/// Parameters for [`EditorStore::add_clip`].
#[derive(Debug, Clone)]
pub struct NewClip {
    pub asset_id: Uuid,
    pub start: Seconds,
    /// Required span for image/text clips; defaults to [`DEFAULT_STILL_DURATION`].
    /// Ignored for video/audio, whose length comes from the trim range.
    pub end: Option<Seconds>,
    pub trim: Option<(Seconds, Option<Seconds>)>,
    pub content: Option<ClipContent>,
    pub transform: Transform,
    pub opacity: f64,
    pub volume: f64,
}

impl NewClip {
    pub fn new(asset_id: Uuid, start: Seconds) -> Self {
        Self {
            asset_id,
            start,
            end: None,
            trim: None,
            content: None,
            transform: Transform::IDENTITY,
            opacity: 1.0,
            volume: 1.0,
        }
    }

    pub fn with_end(mut self, end: Seconds) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_trim(mut self, trim_start: Seconds, trim_end: Option<Seconds>) -> Self {
        self.trim = Some((trim_start, trim_end));
        self
    }

    pub fn with_content(mut self, content: ClipContent) -> Self {
        self.content = Some(content);
        self
    }
}

/// Field-wise update for [`EditorStore::update_clip`]. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct ClipPatch {
    pub start: Option<Seconds>,
    pub end: Option<Seconds>,
    pub trim_start: Option<Seconds>,
    pub trim_end: Option<Option<Seconds>>,
    pub transform: Option<Transform>,
    pub opacity: Option<f64>,
    pub visible: Option<bool>,
    pub volume: Option<f64>,
    pub muted: Option<bool>,
    /// Replaces the kind-specific overrides. Must keep the clip's kind.
    pub content: Option<ClipContent>,
}

impl ClipPatch {
    fn touches_timing(&self) -> bool {
        self.start.is_some()
            || self.end.is_some()
            || self.trim_start.is_some()
            || self.trim_end.is_some()
            || self.content.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrackPatch {
    pub name: Option<String>,
    pub muted: Option<bool>,
    pub volume: Option<f64>,
    pub visible: Option<bool>,
    pub locked: Option<bool>,
    pub color: Option<String>,
}

// ---------------------------------------------------------------------------
// EditorStore
// ---------------------------------------------------------------------------

pub struct EditorStore {
    pub(crate) state: EditorState,
    revision: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl fmt::Debug for EditorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorStore")
            .field("state", &self.state)
            .field("revision", &self.revision)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for EditorStore {
    fn default() -> Self {
        Self::new(EditorState::default())
    }
}

impl EditorStore {
    pub fn new(state: EditorState) -> Self {
        let mut store = Self {
            state,
            revision: 0,
            listeners: Vec::new(),
            next_subscription: 0,
        };
        store.normalize();
        store
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    /// Monotonic counter bumped by every applied mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn total_duration(&self) -> Seconds {
        self.state.total_duration
    }

    pub fn track(&self, id: Uuid) -> Option<&Track> {
        self.state.track(id)
    }

    pub fn clip(&self, id: Uuid) -> Option<&Clip> {
        self.state.clip(id).map(|(_, c)| c)
    }

    pub fn asset(&self, id: Uuid) -> Option<&Asset> {
        self.state.asset(id)
    }

    /// Every clip whose interval contains `t`, regardless of visibility.
    pub fn clips_at_time(&self, t: Seconds) -> Vec<&Clip> {
        self.state
            .clips()
            .filter(|(_, c)| c.contains(t))
            .map(|(_, c)| c)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    pub fn subscribe(&mut self, listener: impl FnMut(&StoreEvent) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub(crate) fn emit(&mut self, event: StoreEvent) {
        self.revision += 1;
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> EditorDocument {
        self.state.clone()
    }

    /// Replace the document. Z-order, clip durations, total duration and
    /// selection are re-derived rather than trusted.
    pub fn load_snapshot(&mut self, doc: EditorDocument) {
        self.state = doc;
        self.normalize();
        tracing::debug!(
            tracks = self.state.tracks.len(),
            assets = self.state.assets.len(),
            "snapshot loaded"
        );
        self.emit(StoreEvent::SnapshotLoaded);
    }

    fn normalize(&mut self) {
        self.normalize_z_index();
        let assets = &self.state.assets;
        for track in &mut self.state.tracks {
            for clip in &mut track.clips {
                clip.recompute_duration(assets.get(&clip.asset_id).and_then(Asset::duration));
            }
        }
        self.recompute_total_duration();
        self.prune_selection(false);
    }

    // -----------------------------------------------------------------------
    // Document settings
    // -----------------------------------------------------------------------

    pub fn set_project_name(&mut self, name: impl Into<String>) {
        self.state.name = name.into();
        self.emit(StoreEvent::DocumentChanged);
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.state.viewport = Viewport {
            zoom: viewport.zoom.max(crate::time::MIN_ZOOM),
            scroll_offset: viewport.scroll_offset.max(0.0),
        };
        self.emit(StoreEvent::DocumentChanged);
    }

    pub fn set_export_settings(&mut self, settings: ExportSettings) {
        self.state.export_settings = settings;
        self.emit(StoreEvent::DocumentChanged);
    }

    // -----------------------------------------------------------------------
    // Assets
    // -----------------------------------------------------------------------

    pub fn add_asset(&mut self, asset: Asset) -> Uuid {
        let id = asset.id;
        self.state.assets.insert(id, asset);
        self.emit(StoreEvent::AssetAdded(id));
        id
    }

    /// Register an asset whose metadata is still being resolved.
    pub fn begin_asset_load(
        &mut self,
        name: impl Into<String>,
        src: impl Into<String>,
        kind: AssetKind,
    ) -> Uuid {
        self.add_asset(Asset {
            id: Uuid::new_v4(),
            name: name.into(),
            src: src.into(),
            kind,
            load_state: LoadState::Loading,
            meta: AssetMeta::Pending,
        })
    }

    /// Completion callback for a load. Returns `false` when the asset was
    /// removed while the load was in flight.
    pub fn complete_asset_load(&mut self, id: Uuid, meta: AssetMeta) -> bool {
        let Some(asset) = self.state.assets.get_mut(&id) else {
            tracing::debug!(%id, "load completed for removed asset; ignoring");
            return false;
        };
        if meta.matches_kind(asset.kind) {
            asset.meta = meta;
            asset.load_state = LoadState::Loaded;
        } else {
            tracing::warn!(%id, kind = ?asset.kind, "loaded metadata does not match asset kind");
            asset.load_state = LoadState::Error("metadata does not match asset kind".into());
        }
        let duration = asset.duration();
        for track in &mut self.state.tracks {
            for clip in track.clips.iter_mut().filter(|c| c.asset_id == id) {
                clip.recompute_duration(duration);
            }
        }
        self.recompute_total_duration();
        self.emit(StoreEvent::AssetUpdated(id));
        true
    }

    /// Failure callback for a load. Returns `false` when the asset is gone.
    pub fn fail_asset_load(&mut self, id: Uuid, message: impl Into<String>) -> bool {
        let Some(asset) = self.state.assets.get_mut(&id) else {
            return false;
        };
        let message = message.into();
        tracing::warn!(%id, src = %asset.src, %message, "asset load failed");
        asset.load_state = LoadState::Error(message);
        self.emit(StoreEvent::AssetUpdated(id));
        true
    }

    /// Register and resolve an asset through `loader` in one step.
    pub fn load_asset(
        &mut self,
        loader: &dyn AssetLoader,
        name: impl Into<String>,
        src: impl Into<String>,
        kind: AssetKind,
    ) -> Uuid {
        let src = src.into();
        let id = self.begin_asset_load(name, src.clone(), kind);
        match loader.load(&src, kind) {
            Ok(meta) => self.complete_asset_load(id, meta),
            Err(e) => self.fail_asset_load(id, e.to_string()),
        };
        id
    }

    /// Remove an asset and every clip that references it.
    pub fn remove_asset(&mut self, id: Uuid) -> Result<Asset> {
        let asset = self
            .state
            .assets
            .remove(&id)
            .ok_or(CoreError::AssetNotFound(id))?;
        let mut removed = Vec::new();
        for track in &mut self.state.tracks {
            track.clips.retain(|c| {
                if c.asset_id == id {
                    removed.push(c.id);
                    false
                } else {
                    true
                }
            });
        }
        self.recompute_total_duration();
        self.prune_selection(true);
        for clip_id in removed {
            self.emit(StoreEvent::ClipRemoved(clip_id));
        }
        self.emit(StoreEvent::AssetRemoved(id));
        Ok(asset)
    }

    // -----------------------------------------------------------------------
    // Tracks
    // -----------------------------------------------------------------------

    /// Append a track. Appended tracks sit below every existing track.
    pub fn add_track(&mut self, name: impl Into<String>) -> Uuid {
        let index = self.state.tracks.len();
        self.insert_track(index, name)
    }

    pub fn insert_track(&mut self, index: usize, name: impl Into<String>) -> Uuid {
        let track = Track::new(name);
        let id = track.id;
        let index = index.min(self.state.tracks.len());
        self.state.tracks.insert(index, track);
        self.normalize_z_index();
        self.emit(StoreEvent::TrackAdded(id));
        id
    }

    /// Remove a track together with its clips.
    pub fn remove_track(&mut self, id: Uuid) -> Result<Track> {
        let index = self.track_index(id)?;
        let track = self.state.tracks.remove(index);
        self.normalize_z_index();
        self.recompute_total_duration();
        self.prune_selection(true);
        for clip in &track.clips {
            self.emit(StoreEvent::ClipRemoved(clip.id));
        }
        self.emit(StoreEvent::TrackRemoved(id));
        Ok(track)
    }

    pub fn update_track(&mut self, id: Uuid, patch: TrackPatch) -> Result<()> {
        let index = self.track_index(id)?;
        let track = &mut self.state.tracks[index];
        if let Some(name) = patch.name {
            track.name = name;
        }
        if let Some(muted) = patch.muted {
            track.muted = muted;
        }
        if let Some(volume) = patch.volume {
            track.volume = volume.max(0.0);
        }
        if let Some(visible) = patch.visible {
            track.visible = visible;
        }
        if let Some(locked) = patch.locked {
            track.locked = locked;
        }
        if let Some(color) = patch.color {
            track.color = color;
        }
        self.emit(StoreEvent::TrackUpdated(id));
        Ok(())
    }

    /// Move a track to `new_index` in the stacking order (0 is topmost).
    pub fn move_track(&mut self, id: Uuid, new_index: usize) -> Result<()> {
        let index = self.track_index(id)?;
        if new_index >= self.state.tracks.len() {
            return Err(CoreError::InvalidOperation(format!(
                "new_index {} out of bounds ({} tracks)",
                new_index,
                self.state.tracks.len()
            )));
        }
        let track = self.state.tracks.remove(index);
        self.state.tracks.insert(new_index, track);
        self.normalize_z_index();
        self.emit(StoreEvent::TracksReordered);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Clips
    // -----------------------------------------------------------------------

    /// Place a new clip on a track. The asset must be loaded and the clip must
    /// not overlap anything already on the track.
    pub fn add_clip(&mut self, track_id: Uuid, new: NewClip) -> Result<Uuid> {
        let track_index = self.track_index(track_id)?;
        let asset = self
            .state
            .assets
            .get(&new.asset_id)
            .ok_or(CoreError::AssetNotFound(new.asset_id))?;
        if !asset.is_loaded() {
            return Err(CoreError::AssetNotReady(asset.id));
        }

        let mut content = new
            .content
            .unwrap_or_else(|| ClipContent::default_for(asset.kind));
        if content.kind() != asset.kind {
            return Err(CoreError::InvalidOperation(format!(
                "{:?} content cannot reference a {:?} asset",
                content.kind(),
                asset.kind
            )));
        }
        if let Some((trim_start, trim_end)) = new.trim {
            content.set_trim(trim_start, trim_end);
        }

        let asset_duration = asset.duration();
        let mut clip = Clip {
            id: Uuid::new_v4(),
            asset_id: asset.id,
            start: new.start,
            end: new.end.unwrap_or(new.start + DEFAULT_STILL_DURATION),
            duration: 0.0,
            transform: new.transform,
            opacity: new.opacity.clamp(0.0, 1.0),
            visible: true,
            volume: new.volume.max(0.0),
            muted: false,
            content,
        };
        clip.recompute_duration(asset_duration);
        validate_clip(&clip, asset_duration)?;

        let track = &mut self.state.tracks[track_index];
        if placement::does_overlap(track, clip.start, clip.end, None) {
            return Err(CoreError::OverlapDetected);
        }
        let id = clip.id;
        track.clips.push(clip);
        self.recompute_total_duration();
        self.emit(StoreEvent::ClipAdded(id));
        Ok(id)
    }

    /// Apply a patch. Durations are re-derived whenever timing fields change.
    /// Overlap is not re-validated here; interactive callers go through
    /// [`move_clip`](Self::move_clip) and the trim operations instead.
    pub fn update_clip(&mut self, id: Uuid, patch: ClipPatch) -> Result<()> {
        let (ti, ci) = self.clip_location(id)?;
        let mut clip = self.state.tracks[ti].clips[ci].clone();
        let asset_duration = self.asset_duration(clip.asset_id);
        let touches_timing = patch.touches_timing();

        if let Some(content) = patch.content {
            if content.kind() != clip.kind() {
                return Err(CoreError::InvalidOperation(
                    "clip content cannot change kind".into(),
                ));
            }
            clip.content = content;
        }
        if let Some(transform) = patch.transform {
            clip.transform = transform;
        }
        if let Some(opacity) = patch.opacity {
            clip.opacity = opacity.clamp(0.0, 1.0);
        }
        if let Some(visible) = patch.visible {
            clip.visible = visible;
        }
        if let Some(volume) = patch.volume {
            clip.volume = volume.max(0.0);
        }
        if let Some(muted) = patch.muted {
            clip.muted = muted;
        }

        if touches_timing {
            match clip.content.trim() {
                Some((trim_start, trim_end)) => {
                    let trim_start = patch.trim_start.unwrap_or(trim_start);
                    let start = patch.start.unwrap_or(clip.start);
                    // An explicit end on a trimmed clip moves its out-point.
                    let trim_end = match (patch.trim_end, patch.end) {
                        (Some(trim_end), _) => trim_end,
                        (None, Some(end)) => {
                            Some(trim_start + (end - start) * clip.content.speed())
                        }
                        (None, None) => trim_end,
                    };
                    clip.content.set_trim(trim_start, trim_end);
                    clip.start = start;
                }
                None => {
                    let span = clip.end - clip.start;
                    if let Some(start) = patch.start {
                        clip.start = start;
                        clip.end = start + span;
                    }
                    if let Some(end) = patch.end {
                        clip.end = end;
                    }
                }
            }
            clip.recompute_duration(asset_duration);
            validate_clip(&clip, asset_duration)?;
        }

        self.state.tracks[ti].clips[ci] = clip;
        self.recompute_total_duration();
        self.emit(StoreEvent::ClipUpdated(id));
        Ok(())
    }

    pub fn remove_clip(&mut self, id: Uuid) -> Result<Clip> {
        let (ti, ci) = self.clip_location(id)?;
        let clip = self.state.tracks[ti].clips.remove(ci);
        self.recompute_total_duration();
        self.prune_selection(true);
        self.emit(StoreEvent::ClipRemoved(id));
        Ok(clip)
    }

    /// Copy a clip into the nearest free slot at or after its end on the same
    /// track, and select the copy.
    pub fn duplicate_clip(&mut self, id: Uuid) -> Result<Uuid> {
        let (ti, ci) = self.clip_location(id)?;
        let track = &self.state.tracks[ti];
        let original = &track.clips[ci];

        let mut copy = original.clone();
        copy.id = Uuid::new_v4();
        copy.start =
            placement::find_nearest_free_placement(track, original.end, original.duration, None);
        copy.end = copy.start + copy.duration;

        let new_id = copy.id;
        self.state.tracks[ti].clips.push(copy);
        self.recompute_total_duration();
        self.state.selected_clip_ids.clear();
        self.state.selected_clip_ids.insert(new_id);
        self.state.selected_track_ids.clear();
        self.emit(StoreEvent::ClipAdded(new_id));
        self.emit(StoreEvent::SelectionChanged);
        Ok(new_id)
    }

    /// Split a clip at timeline position `at`, which must lie strictly inside
    /// it. Returns the ids of the (left, right) halves; the left half keeps
    /// the original id.
    pub fn split_clip(&mut self, id: Uuid, at: Seconds) -> Result<(Uuid, Uuid)> {
        let (ti, ci) = self.clip_location(id)?;
        let original = self.state.tracks[ti].clips[ci].clone();
        if at <= original.start + TIME_EPSILON || at >= original.end - TIME_EPSILON {
            return Err(CoreError::InvalidOperation(
                "split position must be strictly between clip start and end".into(),
            ));
        }
        let asset_duration = self.asset_duration(original.asset_id);

        let mut left = original.clone();
        let mut right = original;
        right.id = Uuid::new_v4();
        right.start = at;

        match left.content.trim() {
            Some((trim_start, _)) => {
                let split_source = trim_start + (at - left.start) * left.content.speed();
                let trim_end = right.trim_end(asset_duration);
                left.content.set_trim(trim_start, Some(split_source));
                right.content.set_trim(split_source, trim_end);
            }
            None => left.end = at,
        }
        left.recompute_duration(asset_duration);
        right.recompute_duration(asset_duration);

        let ids = (left.id, right.id);
        let clips = &mut self.state.tracks[ti].clips;
        clips[ci] = left;
        clips.insert(ci + 1, right);
        self.recompute_total_duration();
        self.emit(StoreEvent::ClipUpdated(ids.0));
        self.emit(StoreEvent::ClipAdded(ids.1));
        Ok(ids)
    }

    /// Reattach a clip to another track as-is. Overlap on the target track is
    /// the caller's responsibility (see [`placement`]).
    pub fn move_clip_to_track(&mut self, clip_id: Uuid, target_track_id: Uuid) -> Result<()> {
        let target = self.track_index(target_track_id)?;
        let (ti, ci) = self.clip_location(clip_id)?;
        if ti == target {
            return Ok(());
        }
        let clip = self.state.tracks[ti].clips.remove(ci);
        self.state.tracks[target].clips.push(clip);
        self.emit(StoreEvent::ClipUpdated(clip_id));
        Ok(())
    }

    /// Move a clip along its track to the free position closest to
    /// `desired_start`. Returns the start actually applied.
    pub fn move_clip(&mut self, id: Uuid, desired_start: Seconds) -> Result<Seconds> {
        let (ti, ci) = self.clip_location(id)?;
        let track = &self.state.tracks[ti];
        ensure_unlocked(track)?;
        let duration = track.clips[ci].duration;
        let start = placement::find_nearest_free_placement(track, desired_start, duration, Some(id));

        let clip = &mut self.state.tracks[ti].clips[ci];
        clip.start = start;
        clip.end = start + duration;
        self.recompute_total_duration();
        self.emit(StoreEvent::ClipUpdated(id));
        Ok(start)
    }

    /// Drag the left edge of a clip, keeping its right edge fixed. The edge
    /// stops at the left neighbour and, for video/audio, at the start of the
    /// source. Returns the start actually applied.
    pub fn trim_clip_start(&mut self, id: Uuid, proposed_start: Seconds) -> Result<Seconds> {
        let (ti, ci) = self.clip_location(id)?;
        let track = &self.state.tracks[ti];
        ensure_unlocked(track)?;
        let clip = &track.clips[ci];
        let asset_duration = self.asset_duration(clip.asset_id);

        // Neighbour and source limits go last and win over the length floor.
        let mut start = proposed_start.min(clip.end - MIN_CLIP_DURATION);
        start = placement::clamp_trim_start_to_left(track, clip, start);
        let speed = clip.content.speed();
        if clip.content.trim().is_some() {
            start = start.max(clip.start - clip.trim_start() / speed);
        }

        let mut clip = clip.clone();
        if let Some((trim_start, _)) = clip.content.trim() {
            let trim_end = clip.trim_end(asset_duration);
            clip.content
                .set_trim((trim_start + (start - clip.start) * speed).max(0.0), trim_end);
        }
        clip.start = start;
        clip.recompute_duration(asset_duration);

        self.state.tracks[ti].clips[ci] = clip;
        self.recompute_total_duration();
        self.emit(StoreEvent::ClipUpdated(id));
        Ok(start)
    }

    /// Drag the right edge of a clip. The edge stops at the right neighbour
    /// and, for video/audio, at the end of the source. Returns the end applied.
    pub fn trim_clip_end(&mut self, id: Uuid, proposed_end: Seconds) -> Result<Seconds> {
        let (ti, ci) = self.clip_location(id)?;
        let track = &self.state.tracks[ti];
        ensure_unlocked(track)?;
        let clip = &track.clips[ci];
        let asset_duration = self.asset_duration(clip.asset_id);

        let mut end = proposed_end.max(clip.start + MIN_CLIP_DURATION);
        end = placement::clamp_trim_end_to_right(track, clip, end);
        let speed = clip.content.speed();
        if let (Some(_), Some(source_len)) = (clip.content.trim(), asset_duration) {
            end = end.min(clip.start + (source_len - clip.trim_start()) / speed);
        }

        let mut clip = clip.clone();
        match clip.content.trim() {
            Some((trim_start, _)) => {
                let trim_end = trim_start + (end - clip.start) * speed;
                clip.content.set_trim(trim_start, Some(trim_end));
            }
            None => clip.end = end,
        }
        clip.recompute_duration(asset_duration);
        let applied = clip.end;

        self.state.tracks[ti].clips[ci] = clip;
        self.recompute_total_duration();
        self.emit(StoreEvent::ClipUpdated(id));
        Ok(applied)
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Select a clip. Clip and track selection are mutually exclusive, so any
    /// selected track is deselected.
    pub fn select_clip(&mut self, id: Uuid, additive: bool) -> Result<()> {
        self.clip_location(id)?;
        if !additive {
            self.state.selected_clip_ids.clear();
        }
        self.state.selected_clip_ids.insert(id);
        self.state.selected_track_ids.clear();
        self.emit(StoreEvent::SelectionChanged);
        Ok(())
    }

    pub fn deselect_clip(&mut self, id: Uuid) -> bool {
        let removed = self.state.selected_clip_ids.remove(&id);
        if removed {
            self.emit(StoreEvent::SelectionChanged);
        }
        removed
    }

    pub fn select_track(&mut self, id: Uuid) -> Result<()> {
        self.track_index(id)?;
        self.state.selected_clip_ids.clear();
        self.state.selected_track_ids.clear();
        self.state.selected_track_ids.insert(id);
        self.emit(StoreEvent::SelectionChanged);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.state.selected_clip_ids.clear();
        self.state.selected_track_ids.clear();
        self.emit(StoreEvent::SelectionChanged);
    }

    /// Drop selected ids that no longer exist. With `fallback`, a selection
    /// emptied this way is replaced by the first remaining track.
    fn prune_selection(&mut self, fallback: bool) {
        let state = &mut self.state;
        let had_selection =
            !state.selected_clip_ids.is_empty() || !state.selected_track_ids.is_empty();

        let clip_ids: Vec<Uuid> = state.clips().map(|(_, c)| c.id).collect();
        state.selected_clip_ids.retain(|id| clip_ids.contains(id));
        let track_ids: Vec<Uuid> = state.tracks.iter().map(|t| t.id).collect();
        state.selected_track_ids.retain(|id| track_ids.contains(id));

        let emptied = state.selected_clip_ids.is_empty() && state.selected_track_ids.is_empty();
        if fallback && had_selection && emptied {
            if let Some(first) = state.tracks.first() {
                state.selected_track_ids.insert(first.id);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// First track is topmost: `z_index = count - index - 1`.
    fn normalize_z_index(&mut self) {
        let count = self.state.tracks.len();
        for (index, track) in self.state.tracks.iter_mut().enumerate() {
            track.z_index = count - index - 1;
        }
    }

    pub(crate) fn recompute_total_duration(&mut self) {
        let clips_end = self
            .state
            .tracks
            .iter()
            .map(Track::end)
            .fold(0.0, f64::max);
        self.state.total_duration = match self.state.playback.end_time {
            Some(end_time) => clips_end.max(end_time),
            None => clips_end,
        };
    }

    fn track_index(&self, id: Uuid) -> Result<usize> {
        self.state
            .tracks
            .iter()
            .position(|t| t.id == id)
            .ok_or(CoreError::TrackNotFound(id))
    }

    /// `(track_index, clip_index)` for a clip id.
    fn clip_location(&self, id: Uuid) -> Result<(usize, usize)> {
        for (ti, track) in self.state.tracks.iter().enumerate() {
            if let Some(ci) = track.clips.iter().position(|c| c.id == id) {
                return Ok((ti, ci));
            }
        }
        Err(CoreError::ClipNotFound(id))
    }

    fn asset_duration(&self, asset_id: Uuid) -> Option<Seconds> {
        self.state.assets.get(&asset_id).and_then(Asset::duration)
    }
}

fn ensure_unlocked(track: &Track) -> Result<()> {
    if track.locked {
        return Err(CoreError::InvalidOperation(format!(
            "track '{}' is locked",
            track.name
        )));
    }
    Ok(())
}

/// Check the clip invariants: `0 <= start < end` and, for trimmed kinds,
/// `0 <= trim_start < trim_end <= asset_duration`.
fn validate_clip(clip: &Clip, asset_duration: Option<Seconds>) -> Result<()> {
    if clip.start < 0.0 {
        return Err(CoreError::InvalidOperation("clip start must be >= 0".into()));
    }
    if let Some((trim_start, _)) = clip.content.trim() {
        if trim_start < 0.0 {
            return Err(CoreError::InvalidOperation("trim start must be >= 0".into()));
        }
        let trim_end = clip.trim_end(asset_duration).ok_or_else(|| {
            CoreError::InvalidOperation("trimmed clip needs a known source duration".into())
        })?;
        if trim_end <= trim_start {
            return Err(CoreError::InvalidOperation(
                "trim start must be before trim end".into(),
            ));
        }
        if let Some(source_len) = asset_duration {
            if trim_end > source_len + TIME_EPSILON {
                return Err(CoreError::InvalidOperation(
                    "trim end exceeds source duration".into(),
                ));
            }
        }
    }
    if clip.end <= clip.start {
        return Err(CoreError::InvalidOperation(
            "clip start must be before end".into(),
        ));
    }
    Ok(())
}
