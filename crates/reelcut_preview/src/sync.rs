//! Keeps one clip's media resource in step with the timeline clock.
//!
//! The store's `current_time` is the only clock that matters. The handle's
//! own position is read back solely to measure drift; everything the
//! controller asks the handle to do is derived from the document on each
//! [`MediaSyncController::update`].

use crate::handle::MediaHandle;
use reelcut_core::config::SyncConfig;
use reelcut_core::{Asset, EditorState, Seconds, TIME_EPSILON};
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Clip not under the playhead; the resource is paused.
    Idle,
    /// A seek/play was rejected and a retry is pending.
    Seeking,
    Playing,
    /// Timeline paused; the resource is parked at the expected frame.
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryOp {
    /// Seek to the expected position, then play.
    Resync,
    /// Seek to the expected position only.
    Park,
}

#[derive(Debug, Clone, Copy)]
struct PendingRetry {
    op: RetryOp,
    due: Instant,
}

/// Where the clip's media should be right now, derived from the document.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Target {
    expected: Seconds,
    rate: f64,
    volume: f64,
    playing: bool,
}

pub struct MediaSyncController {
    clip_id: Uuid,
    handle: Box<dyn MediaHandle>,
    config: SyncConfig,
    state: SyncState,
    pending: Option<PendingRetry>,
    last_poll: Option<Instant>,
    /// Position last hard-set while paused.
    parked_at: Option<Seconds>,
    applied_rate: Option<f64>,
    applied_volume: Option<f64>,
    force_resync: bool,
}

impl MediaSyncController {
    pub fn new(clip_id: Uuid, handle: Box<dyn MediaHandle>, config: SyncConfig) -> Self {
        Self {
            clip_id,
            handle,
            config,
            state: SyncState::Idle,
            pending: None,
            last_poll: None,
            parked_at: None,
            applied_rate: None,
            applied_volume: None,
            force_resync: false,
        }
    }

    pub fn clip_id(&self) -> Uuid {
        self.clip_id
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Re-seek on the next update even if drift is within threshold, e.g.
    /// after the user scrubbed.
    pub fn force_resync(&mut self) {
        self.force_resync = true;
        self.parked_at = None;
    }

    /// Reconcile the resource with the document at wall-clock `now`.
    pub fn update(&mut self, doc: &EditorState, now: Instant) {
        let Some(target) = self.target(doc) else {
            self.deactivate();
            return;
        };
        self.apply_rate_and_volume(&target);

        if let Some(pending) = self.pending {
            if now < pending.due {
                return;
            }
            self.pending = None;
            self.run_retry(pending.op, &target, now);
            return;
        }

        if target.playing {
            self.update_playing(&target, now);
        } else {
            self.update_paused(&target, now);
        }
        self.force_resync = false;
    }

    /// Pause the resource and forget all sync state.
    pub fn deactivate(&mut self) {
        if self.state != SyncState::Idle {
            if let Err(e) = self.handle.pause() {
                tracing::debug!(clip = %self.clip_id, error = %e, "pause on deactivate failed");
            }
        }
        self.state = SyncState::Idle;
        self.pending = None;
        self.last_poll = None;
        self.parked_at = None;
        self.force_resync = false;
    }

    fn target(&self, doc: &EditorState) -> Option<Target> {
        let (track, clip) = doc.clip(self.clip_id)?;
        let t = doc.playback.current_time;
        if !(track.visible && clip.visible && clip.contains(t)) {
            return None;
        }
        let asset_duration = doc.asset(clip.asset_id).and_then(Asset::duration);
        let volume = if clip.muted || track.muted {
            0.0
        } else {
            clip.volume * track.volume
        };
        Some(Target {
            expected: clip.local_time(t, asset_duration),
            rate: doc.playback.playback_rate * clip.content.speed(),
            volume,
            playing: doc.playback.is_playing,
        })
    }

    fn apply_rate_and_volume(&mut self, target: &Target) {
        if self
            .applied_rate
            .map_or(true, |r| (r - target.rate).abs() > TIME_EPSILON)
        {
            if let Err(e) = self.handle.set_rate(target.rate) {
                tracing::warn!(clip = %self.clip_id, error = %e, "failed to set playback rate");
            }
            self.applied_rate = Some(target.rate);
        }
        if self
            .applied_volume
            .map_or(true, |v| (v - target.volume).abs() > TIME_EPSILON)
        {
            if let Err(e) = self.handle.set_volume(target.volume) {
                tracing::warn!(clip = %self.clip_id, error = %e, "failed to set volume");
            }
            self.applied_volume = Some(target.volume);
        }
    }

    fn update_playing(&mut self, target: &Target, now: Instant) {
        self.parked_at = None;
        match self.state {
            SyncState::Idle | SyncState::Paused | SyncState::Seeking => {
                self.resync(target, now);
            }
            SyncState::Playing if self.force_resync => self.resync(target, now),
            SyncState::Playing => {
                let due = self
                    .last_poll
                    .map_or(true, |last| now.duration_since(last) >= self.config.poll_interval());
                if !due {
                    return;
                }
                self.last_poll = Some(now);
                if self.needs_resync(target.expected) {
                    self.resync(target, now);
                }
            }
        }
    }

    fn update_paused(&mut self, target: &Target, now: Instant) {
        if self.state == SyncState::Playing {
            if let Err(e) = self.handle.pause() {
                tracing::debug!(clip = %self.clip_id, error = %e, "pause failed");
            }
        }
        self.state = SyncState::Paused;
        let unchanged = self
            .parked_at
            .is_some_and(|p| (p - target.expected).abs() <= TIME_EPSILON);
        if unchanged && self.parked_in_place(target.expected) {
            return;
        }
        match self.handle.seek(target.expected) {
            Ok(()) => self.parked_at = Some(target.expected),
            Err(e) => {
                tracing::debug!(clip = %self.clip_id, error = %e, "seek rejected; retrying");
                self.schedule_retry(RetryOp::Park, now);
            }
        }
    }

    /// Whether a parked resource is still where it was put. Something other
    /// than the controller (a key press in the player) may have moved it.
    fn parked_in_place(&self, expected: Seconds) -> bool {
        match self.handle.position() {
            Ok(actual) => (actual - expected).abs() <= TIME_EPSILON,
            Err(e) => {
                tracing::debug!(clip = %self.clip_id, error = %e, "position unavailable");
                true
            }
        }
    }

    fn needs_resync(&mut self, expected: Seconds) -> bool {
        match self.handle.is_paused() {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => {
                tracing::debug!(clip = %self.clip_id, error = %e, "pause state unavailable");
                return false;
            }
        }
        match self.handle.position() {
            Ok(actual) => {
                let drift = (actual - expected).abs();
                if drift > self.config.drift_threshold {
                    tracing::debug!(clip = %self.clip_id, drift, "drift over threshold");
                    true
                } else {
                    false
                }
            }
            Err(e) => {
                tracing::debug!(clip = %self.clip_id, error = %e, "position unavailable");
                false
            }
        }
    }

    fn resync(&mut self, target: &Target, now: Instant) {
        match self.seek_and_play(target.expected) {
            Ok(()) => {
                self.state = SyncState::Playing;
                self.last_poll = Some(now);
            }
            Err(e) => {
                tracing::debug!(clip = %self.clip_id, error = %e, "resync rejected; retrying");
                self.schedule_retry(RetryOp::Resync, now);
            }
        }
    }

    fn seek_and_play(&mut self, t: Seconds) -> crate::error::Result<()> {
        self.handle.seek(t)?;
        self.handle.play()
    }

    fn schedule_retry(&mut self, op: RetryOp, now: Instant) {
        self.state = SyncState::Seeking;
        self.pending = Some(PendingRetry {
            op,
            due: now + self.config.retry_delay(),
        });
    }

    /// Second and last attempt. The target is recomputed, so a newer seek
    /// wins over the one that failed.
    fn run_retry(&mut self, op: RetryOp, target: &Target, now: Instant) {
        // The timeline may have started or stopped since the first attempt.
        let result = if target.playing {
            self.seek_and_play(target.expected)
        } else {
            self.handle.seek(target.expected)
        };
        if let Err(e) = result {
            tracing::warn!(clip = %self.clip_id, ?op, error = %e, "media sync failed after retry");
        }
        // Either way the attempt is spent; drift polling picks it up later.
        if target.playing {
            self.state = SyncState::Playing;
            self.last_poll = Some(now);
        } else {
            self.state = SyncState::Paused;
            self.parked_at = Some(target.expected);
        }
        self.force_resync = false;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{PreviewError, Result};
    use reelcut_core::{AssetMeta, EditorStore, NewClip};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Call {
        Seek(Seconds),
        Play,
        Pause,
        Rate(f64),
        Volume(f64),
    }

    #[derive(Debug, Default)]
    pub(crate) struct MockMedia {
        pub calls: Vec<Call>,
        pub position: Seconds,
        pub paused: bool,
        pub fail_seeks: usize,
    }

    impl MockMedia {
        pub fn seeks(&self) -> Vec<Seconds> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Seek(t) => Some(*t),
                    _ => None,
                })
                .collect()
        }
    }

    #[derive(Clone, Default)]
    pub(crate) struct MockHandle(pub Rc<RefCell<MockMedia>>);

    impl MediaHandle for MockHandle {
        fn seek(&mut self, t: Seconds) -> Result<()> {
            let mut m = self.0.borrow_mut();
            m.calls.push(Call::Seek(t));
            if m.fail_seeks > 0 {
                m.fail_seeks -= 1;
                return Err(PreviewError::Media("seek rejected".into()));
            }
            m.position = t;
            Ok(())
        }

        fn play(&mut self) -> Result<()> {
            let mut m = self.0.borrow_mut();
            m.calls.push(Call::Play);
            m.paused = false;
            Ok(())
        }

        fn pause(&mut self) -> Result<()> {
            let mut m = self.0.borrow_mut();
            m.calls.push(Call::Pause);
            m.paused = true;
            Ok(())
        }

        fn set_rate(&mut self, rate: f64) -> Result<()> {
            self.0.borrow_mut().calls.push(Call::Rate(rate));
            Ok(())
        }

        fn set_volume(&mut self, volume: f64) -> Result<()> {
            self.0.borrow_mut().calls.push(Call::Volume(volume));
            Ok(())
        }

        fn position(&self) -> Result<Seconds> {
            Ok(self.0.borrow().position)
        }

        fn is_paused(&self) -> Result<bool> {
            Ok(self.0.borrow().paused)
        }
    }

    /// Video asset of 20s placed at [2, 8) with trim_start 3.
    fn setup() -> (EditorStore, Uuid, MediaSyncController, Rc<RefCell<MockMedia>>) {
        let mut store = EditorStore::default();
        let track = store.add_track("V1");
        let asset = store.add_asset(Asset::loaded(
            "v.mp4",
            "/v.mp4",
            AssetMeta::Video {
                duration: 20.0,
                fps: 30.0,
                width: 1280,
                height: 720,
                has_audio: true,
            },
        ));
        let clip = store
            .add_clip(track, NewClip::new(asset, 2.0).with_trim(3.0, Some(9.0)))
            .unwrap();
        let handle = MockHandle::default();
        let media = handle.0.clone();
        media.borrow_mut().paused = true;
        let controller = MediaSyncController::new(clip, Box::new(handle), SyncConfig::default());
        (store, clip, controller, media)
    }

    #[test]
    fn inactive_clip_stays_idle() {
        let (mut store, _, mut ctl, media) = setup();
        store.seek_to(1.0);
        store.play();
        ctl.update(store.state(), Instant::now());
        assert_eq!(ctl.state(), SyncState::Idle);
        assert!(media.borrow().seeks().is_empty());
        assert!(!media.borrow().calls.contains(&Call::Play));
    }

    #[test]
    fn activation_while_playing_seeks_then_plays() {
        let (mut store, _, mut ctl, media) = setup();
        store.seek_to(4.0);
        store.play();
        ctl.update(store.state(), Instant::now());
        assert_eq!(ctl.state(), SyncState::Playing);

        let calls = media.borrow().calls.clone();
        let seek = calls.iter().position(|c| *c == Call::Seek(5.0)).unwrap();
        let play = calls.iter().position(|c| *c == Call::Play).unwrap();
        assert!(seek < play);
    }

    #[test]
    fn leaving_clip_pauses_without_seeking() {
        let (mut store, _, mut ctl, media) = setup();
        store.seek_to(4.0);
        store.play();
        let now = Instant::now();
        ctl.update(store.state(), now);

        store.seek_to(9.0);
        let seeks_before = media.borrow().seeks().len();
        ctl.update(store.state(), now);
        assert_eq!(ctl.state(), SyncState::Idle);
        assert_eq!(media.borrow().calls.last(), Some(&Call::Pause));
        assert_eq!(media.borrow().seeks().len(), seeks_before);
    }

    #[test]
    fn paused_timeline_parks_media_at_expected_frame() {
        let (mut store, _, mut ctl, media) = setup();
        let now = Instant::now();
        store.seek_to(3.0);
        ctl.update(store.state(), now);
        assert_eq!(ctl.state(), SyncState::Paused);
        assert_eq!(media.borrow().position, 4.0);

        store.seek_to(6.5);
        ctl.update(store.state(), now);
        assert_eq!(media.borrow().position, 7.5);
        assert!(!media.borrow().calls.contains(&Call::Play));

        // Nothing moved, nothing sent.
        let count = media.borrow().calls.len();
        ctl.update(store.state(), now);
        assert_eq!(media.borrow().calls.len(), count);
    }

    #[test]
    fn paused_media_moved_elsewhere_is_parked_again() {
        let (mut store, _, mut ctl, media) = setup();
        let now = Instant::now();
        store.seek_to(3.0);
        ctl.update(store.state(), now);
        assert_eq!(media.borrow().seeks(), vec![4.0]);

        media.borrow_mut().position = 11.0;
        ctl.update(store.state(), now);
        assert_eq!(media.borrow().seeks(), vec![4.0, 4.0]);
        assert_eq!(media.borrow().position, 4.0);
        assert_eq!(ctl.state(), SyncState::Paused);
    }

    #[test]
    fn drift_over_threshold_triggers_resync() {
        let (mut store, _, mut ctl, media) = setup();
        let start = Instant::now();
        store.seek_to(4.0);
        store.play();
        ctl.update(store.state(), start);

        store.tick(1.0);
        media.borrow_mut().position = 5.1; // expected 6.0
        let later = start + Duration::from_millis(300);
        ctl.update(store.state(), later);
        assert_eq!(media.borrow().seeks().last(), Some(&6.0));
    }

    #[test]
    fn small_drift_is_tolerated() {
        let (mut store, _, mut ctl, media) = setup();
        let start = Instant::now();
        store.seek_to(4.0);
        store.play();
        ctl.update(store.state(), start);

        store.tick(1.0);
        media.borrow_mut().position = 5.8;
        ctl.update(store.state(), start + Duration::from_millis(300));
        assert_eq!(media.borrow().seeks(), vec![5.0]);
    }

    #[test]
    fn drift_is_only_polled_on_interval() {
        let (mut store, _, mut ctl, media) = setup();
        let start = Instant::now();
        store.seek_to(4.0);
        store.play();
        ctl.update(store.state(), start);

        store.tick(1.0);
        media.borrow_mut().position = 0.0;
        ctl.update(store.state(), start + Duration::from_millis(100));
        assert_eq!(media.borrow().seeks().len(), 1);
    }

    #[test]
    fn unexpected_pause_triggers_resync() {
        let (mut store, _, mut ctl, media) = setup();
        let start = Instant::now();
        store.seek_to(4.0);
        store.play();
        ctl.update(store.state(), start);

        media.borrow_mut().paused = true;
        ctl.update(store.state(), start + Duration::from_millis(300));
        assert_eq!(media.borrow().seeks().len(), 2);
        assert!(!media.borrow().paused);
    }

    #[test]
    fn rejected_seek_is_retried_once() {
        let (mut store, _, mut ctl, media) = setup();
        media.borrow_mut().fail_seeks = 1;
        let start = Instant::now();
        store.seek_to(4.0);
        store.play();
        ctl.update(store.state(), start);
        assert_eq!(ctl.state(), SyncState::Seeking);

        // Not yet due.
        ctl.update(store.state(), start + Duration::from_millis(50));
        assert_eq!(media.borrow().seeks().len(), 1);

        ctl.update(store.state(), start + Duration::from_millis(200));
        assert_eq!(ctl.state(), SyncState::Playing);
        assert_eq!(media.borrow().seeks(), vec![5.0, 5.0]);
        assert!(!media.borrow().paused);
    }

    #[test]
    fn second_failure_is_dropped() {
        let (mut store, _, mut ctl, media) = setup();
        media.borrow_mut().fail_seeks = 2;
        let start = Instant::now();
        store.seek_to(4.0);
        store.play();
        ctl.update(store.state(), start);
        ctl.update(store.state(), start + Duration::from_millis(200));
        assert_eq!(media.borrow().seeks().len(), 2);
        assert_eq!(ctl.state(), SyncState::Playing);

        // No third attempt until the next drift poll.
        ctl.update(store.state(), start + Duration::from_millis(250));
        assert_eq!(media.borrow().seeks().len(), 2);
    }

    #[test]
    fn rate_combines_global_rate_and_clip_speed() {
        let (mut store, _, mut ctl, media) = setup();
        store.set_playback_rate(2.0);
        store.seek_to(4.0);
        ctl.update(store.state(), Instant::now());
        assert!(media.borrow().calls.contains(&Call::Rate(2.0)));

        store.set_playback_rate(1.5);
        ctl.update(store.state(), Instant::now());
        let rates: Vec<_> = media
            .borrow()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Rate(_)))
            .cloned()
            .collect();
        assert_eq!(rates, vec![Call::Rate(2.0), Call::Rate(1.5)]);
    }

    #[test]
    fn forced_resync_seeks_while_playing() {
        let (mut store, _, mut ctl, media) = setup();
        let start = Instant::now();
        store.seek_to(4.0);
        store.play();
        ctl.update(store.state(), start);

        store.seek_to(7.0);
        ctl.force_resync();
        ctl.update(store.state(), start + Duration::from_millis(10));
        assert_eq!(media.borrow().seeks(), vec![5.0, 8.0]);
    }

    #[test]
    fn removed_clip_deactivates() {
        let (mut store, clip, mut ctl, _) = setup();
        store.seek_to(4.0);
        store.play();
        ctl.update(store.state(), Instant::now());
        store.remove_clip(clip).unwrap();
        ctl.update(store.state(), Instant::now());
        assert_eq!(ctl.state(), SyncState::Idle);
    }
}
