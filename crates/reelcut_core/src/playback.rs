//! The authoritative playback clock and active-clip resolution.
//!
//! Time advances only through [`EditorStore::tick`]; every media element and
//! the exporter derive their positions from `current_time` rather than the
//! other way around.

use crate::store::{EditorStore, StoreEvent};
use crate::time::{Seconds, TIME_EPSILON};
use crate::types::{Asset, Clip, EditorState, Track};

pub const MIN_PLAYBACK_RATE: f64 = 0.1;
pub const MAX_PLAYBACK_RATE: f64 = 16.0;

/// A clip that is visible at some global time, with its resolved local time.
#[derive(Debug, Clone, Copy)]
pub struct ActiveClip<'a> {
    pub track: &'a Track,
    pub clip: &'a Clip,
    pub asset: Option<&'a Asset>,
    /// Position within the asset's own timeline.
    pub local_time: Seconds,
}

/// Clips that should be drawn at `t`, bottom-most first.
///
/// A clip is active when its track and the clip itself are visible and
/// `start <= t < end`. The result is sorted by ascending track `z_index`, so
/// painting in order leaves the first track on top.
pub fn active_clips(state: &EditorState, t: Seconds) -> Vec<ActiveClip<'_>> {
    let mut active: Vec<ActiveClip<'_>> = state
        .tracks
        .iter()
        .filter(|track| track.visible)
        .flat_map(|track| {
            track
                .clips
                .iter()
                .filter(move |clip| clip.visible && clip.contains(t))
                .map(move |clip| {
                    let asset = state.asset(clip.asset_id);
                    ActiveClip {
                        track,
                        clip,
                        asset,
                        local_time: clip.local_time(t, asset.and_then(Asset::duration)),
                    }
                })
        })
        .collect();
    active.sort_by_key(|a| a.track.z_index);
    active
}

/// What a single [`EditorStore::tick`] did to the clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Not playing; nothing changed.
    Idle,
    Advanced(Seconds),
    /// Reached the end with looping on and jumped back to `start_time`.
    Looped(Seconds),
    /// Reached the end and stopped there.
    Stopped(Seconds),
}

impl EditorStore {
    pub fn active_clips(&self, t: Seconds) -> Vec<ActiveClip<'_>> {
        active_clips(&self.state, t)
    }

    pub fn current_time(&self) -> Seconds {
        self.state.playback.current_time
    }

    pub fn is_playing(&self) -> bool {
        self.state.playback.is_playing
    }

    /// Advance the clock by `elapsed` real seconds scaled by the playback rate.
    pub fn tick(&mut self, elapsed: Seconds) -> TickOutcome {
        let playback = &mut self.state.playback;
        if !playback.is_playing {
            return TickOutcome::Idle;
        }
        let total = self.state.total_duration;
        let next = playback.current_time + elapsed.max(0.0) * playback.playback_rate;

        if next >= total {
            if playback.loop_enabled && total > playback.start_time + TIME_EPSILON {
                playback.current_time = playback.start_time;
                let t = playback.current_time;
                tracing::debug!(t, "playback looped");
                self.emit(StoreEvent::Seeked(t));
                return TickOutcome::Looped(t);
            }
            playback.current_time = total;
            playback.is_playing = false;
            tracing::debug!(t = total, "playback reached end");
            self.emit(StoreEvent::PlaybackChanged);
            return TickOutcome::Stopped(total);
        }

        playback.current_time = next;
        self.emit(StoreEvent::TimeUpdated(next));
        TickOutcome::Advanced(next)
    }

    /// Jump to `t`, clamped to `[0, total_duration]`. Always signals a seek,
    /// even when the position does not change, so media gets resynchronized.
    /// NaN leaves the position where it is.
    pub fn seek_to(&mut self, t: Seconds) -> Seconds {
        let t = if t.is_nan() {
            self.state.playback.current_time
        } else {
            t
        };
        let clamped = t.clamp(0.0, self.state.total_duration.max(0.0));
        self.state.playback.current_time = clamped;
        self.emit(StoreEvent::Seeked(clamped));
        clamped
    }

    /// Flip between playing and paused. Starting playback from the end
    /// restarts it from `start_time`.
    pub fn toggle_playback(&mut self) -> bool {
        if self.state.playback.is_playing {
            self.pause();
        } else {
            self.play();
        }
        self.state.playback.is_playing
    }

    pub fn play(&mut self) {
        if self.state.playback.is_playing {
            return;
        }
        let total = self.state.total_duration;
        if self.state.playback.current_time >= total - TIME_EPSILON {
            let start = self.state.playback.start_time.clamp(0.0, total.max(0.0));
            self.state.playback.current_time = start;
            self.emit(StoreEvent::Seeked(start));
        }
        self.state.playback.is_playing = true;
        self.emit(StoreEvent::PlaybackChanged);
    }

    pub fn pause(&mut self) {
        if !self.state.playback.is_playing {
            return;
        }
        self.state.playback.is_playing = false;
        self.emit(StoreEvent::PlaybackChanged);
    }

    /// Returns the rate actually applied.
    pub fn set_playback_rate(&mut self, rate: f64) -> f64 {
        let rate = if rate.is_finite() {
            rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE)
        } else {
            1.0
        };
        self.state.playback.playback_rate = rate;
        self.emit(StoreEvent::PlaybackChanged);
        rate
    }

    pub fn toggle_loop(&mut self) -> bool {
        let playback = &mut self.state.playback;
        playback.loop_enabled = !playback.loop_enabled;
        let enabled = playback.loop_enabled;
        self.emit(StoreEvent::PlaybackChanged);
        enabled
    }

    /// Set the loop/restart range. `end_time` also extends `total_duration`
    /// when it lies past the last clip.
    pub fn set_play_range(&mut self, start_time: Seconds, end_time: Option<Seconds>) {
        self.state.playback.start_time = start_time.max(0.0);
        self.state.playback.end_time = end_time.map(|e| e.max(0.0));
        self.recompute_total_duration();
        self.emit(StoreEvent::PlaybackChanged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewClip, TrackPatch};
    use crate::types::AssetMeta;
    use proptest::prelude::*;

    fn still() -> Asset {
        Asset::loaded(
            "still.png",
            "/still.png",
            AssetMeta::Image {
                width: 100,
                height: 100,
            },
        )
    }

    fn ten_second_store() -> EditorStore {
        let mut store = EditorStore::default();
        let track = store.add_track("V1");
        let asset = store.add_asset(still());
        store
            .add_clip(track, NewClip::new(asset, 0.0).with_end(10.0))
            .unwrap();
        store
    }

    #[test]
    fn tick_stops_at_end() {
        let mut store = ten_second_store();
        store.set_playback_rate(2.0);
        store.seek_to(9.5);
        store.play();
        assert_eq!(store.tick(1.0), TickOutcome::Stopped(10.0));
        assert!(!store.is_playing());
        assert_eq!(store.current_time(), 10.0);
    }

    #[test]
    fn tick_loops_to_start_time() {
        let mut store = ten_second_store();
        store.set_play_range(2.0, None);
        store.toggle_loop();
        store.seek_to(9.5);
        store.play();
        assert_eq!(store.tick(1.0), TickOutcome::Looped(2.0));
        assert!(store.is_playing());
        assert_eq!(store.current_time(), 2.0);
    }

    #[test]
    fn tick_scales_by_rate() {
        let mut store = ten_second_store();
        store.set_playback_rate(0.5);
        store.play();
        assert_eq!(store.tick(1.0), TickOutcome::Advanced(0.5));
    }

    #[test]
    fn tick_while_paused_is_idle() {
        let mut store = ten_second_store();
        let before = store.revision();
        assert_eq!(store.tick(1.0), TickOutcome::Idle);
        assert_eq!(store.revision(), before);
    }

    #[test]
    fn nan_seek_keeps_position() {
        let mut store = ten_second_store();
        store.seek_to(4.0);
        assert_eq!(store.seek_to(f64::NAN), 4.0);
        assert_eq!(store.current_time(), 4.0);
        assert_eq!(store.seek_to(f64::INFINITY), 10.0);
    }

    #[test]
    fn seek_clamps_and_always_signals() {
        let mut store = ten_second_store();
        assert_eq!(store.seek_to(42.0), 10.0);
        assert_eq!(store.seek_to(-3.0), 0.0);

        let seen = std::sync::Arc::new(std::sync::Mutex::new(0));
        let sink = seen.clone();
        store.subscribe(move |e| {
            if matches!(e, StoreEvent::Seeked(_)) {
                *sink.lock().unwrap() += 1;
            }
        });
        store.seek_to(0.0);
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn play_from_end_restarts() {
        let mut store = ten_second_store();
        store.seek_to(10.0);
        assert!(store.toggle_playback());
        assert_eq!(store.current_time(), 0.0);
        assert!(!store.toggle_playback());
    }

    #[test]
    fn playback_rate_is_clamped() {
        let mut store = EditorStore::default();
        assert_eq!(store.set_playback_rate(100.0), MAX_PLAYBACK_RATE);
        assert_eq!(store.set_playback_rate(0.0), MIN_PLAYBACK_RATE);
        assert_eq!(store.set_playback_rate(f64::NAN), 1.0);
    }

    #[test]
    fn end_time_extends_total_duration() {
        let mut store = ten_second_store();
        store.set_play_range(0.0, Some(15.0));
        assert_eq!(store.total_duration(), 15.0);
    }

    #[test]
    fn active_clips_sorted_bottom_first() {
        let mut store = EditorStore::default();
        let top = store.add_track("Top");
        let bottom = store.add_track("Bottom");
        let asset = store.add_asset(still());
        let top_clip = store
            .add_clip(top, NewClip::new(asset, 0.0).with_end(4.0))
            .unwrap();
        let bottom_clip = store
            .add_clip(bottom, NewClip::new(asset, 1.0).with_end(4.0))
            .unwrap();

        let active = store.active_clips(2.0);
        let ids: Vec<_> = active.iter().map(|a| a.clip.id).collect();
        assert_eq!(ids, vec![bottom_clip, top_clip]);
        assert_eq!(active[1].track.id, top);

        let early = store.active_clips(0.5);
        assert_eq!(early.len(), 1);
        assert_eq!(early[0].clip.id, top_clip);
        assert!(store.active_clips(4.0).is_empty());
    }

    #[test]
    fn active_clips_skip_hidden() {
        let mut store = EditorStore::default();
        let track = store.add_track("V1");
        let asset = store.add_asset(still());
        store
            .add_clip(track, NewClip::new(asset, 0.0).with_end(4.0))
            .unwrap();
        store
            .update_track(
                track,
                TrackPatch {
                    visible: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(store.active_clips(1.0).is_empty());
    }

    #[test]
    fn active_clip_local_time_follows_trim() {
        let mut store = EditorStore::default();
        let track = store.add_track("V1");
        let asset = store.add_asset(Asset::loaded(
            "v.mp4",
            "/v.mp4",
            AssetMeta::Video {
                duration: 20.0,
                fps: 25.0,
                width: 640,
                height: 360,
                has_audio: false,
            },
        ));
        store
            .add_clip(track, NewClip::new(asset, 3.0).with_trim(4.0, Some(10.0)))
            .unwrap();
        let active = store.active_clips(5.0);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].local_time, 6.0);
    }

    proptest! {
        #[test]
        fn active_clips_match_interval_membership(
            lengths in proptest::collection::vec((1u32..6, 0u32..3), 1..6),
            t_steps in 0u32..80,
        ) {
            let mut store = EditorStore::default();
            let tracks = [store.add_track("A"), store.add_track("B")];
            let asset = store.add_asset(still());
            for (i, (len, gap)) in lengths.iter().enumerate() {
                let track = tracks[i % 2];
                let start = store.track(track).unwrap().end() + *gap as f64;
                store
                    .add_clip(track, NewClip::new(asset, start).with_end(start + *len as f64))
                    .unwrap();
            }

            let expected_total = store
                .state()
                .clips()
                .map(|(_, c)| c.end)
                .fold(0.0, f64::max);
            prop_assert_eq!(store.total_duration(), expected_total);

            let t = t_steps as f64 * 0.25;
            let active = store.active_clips(t);
            prop_assert_eq!(active.len(), store.clips_at_time(t).len());
            for a in &active {
                prop_assert!(a.clip.start <= t && t < a.clip.end);
            }
            prop_assert!(active.windows(2).all(|w| w[0].track.z_index <= w[1].track.z_index));
        }
    }
}
