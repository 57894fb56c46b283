//! Preview session: the display-tick driver.
//!
//! Each tick advances the store's clock and reconciles one
//! [`MediaSyncController`] per video/audio clip that has been under the
//! playhead. Controllers are created lazily on first activation and torn down
//! when their clip leaves the document or falls more than
//! `SyncConfig::release_distance` away from the playhead.

use crate::handle::MediaOpener;
use crate::sync::{MediaSyncController, SyncState};
use reelcut_core::config::SyncConfig;
use reelcut_core::{EditorState, EditorStore, Seconds, StoreEvent, SubscriptionId, TickOutcome};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

pub struct PreviewSession<O: MediaOpener> {
    opener: O,
    config: SyncConfig,
    controllers: BTreeMap<Uuid, MediaSyncController>,
    /// Clips whose media could not be opened; not retried until the asset changes.
    unopenable: BTreeSet<(Uuid, Uuid)>,
    seeked: Arc<AtomicBool>,
    subscription: Option<SubscriptionId>,
}

impl<O: MediaOpener> PreviewSession<O> {
    pub fn new(opener: O, config: SyncConfig) -> Self {
        Self {
            opener,
            config,
            controllers: BTreeMap::new(),
            unopenable: BTreeSet::new(),
            seeked: Arc::new(AtomicBool::new(false)),
            subscription: None,
        }
    }

    /// Listen for seeks on `store` so every controller is re-seeked on the
    /// next reconcile, whoever moved the playhead.
    pub fn attach(&mut self, store: &mut EditorStore) {
        self.detach(store);
        let seeked = Arc::clone(&self.seeked);
        let id = store.subscribe(move |event| {
            if matches!(event, StoreEvent::Seeked(_) | StoreEvent::SnapshotLoaded) {
                seeked.store(true, Ordering::Relaxed);
            }
        });
        self.subscription = Some(id);
    }

    pub fn detach(&mut self, store: &mut EditorStore) {
        if let Some(id) = self.subscription.take() {
            store.unsubscribe(id);
        }
    }

    /// Advance the clock by `elapsed` real seconds and reconcile media.
    pub fn tick(&mut self, store: &mut EditorStore, elapsed: Seconds, now: Instant) -> TickOutcome {
        let outcome = store.tick(elapsed);
        if matches!(outcome, TickOutcome::Looped(_)) {
            self.seeked.store(true, Ordering::Relaxed);
        }
        self.reconcile(store.state(), now);
        outcome
    }

    /// Seek the store and resync every controller immediately.
    pub fn seek(&mut self, store: &mut EditorStore, t: Seconds, now: Instant) -> Seconds {
        let applied = store.seek_to(t);
        self.seeked.store(true, Ordering::Relaxed);
        self.reconcile(store.state(), now);
        applied
    }

    pub fn reconcile(&mut self, doc: &EditorState, now: Instant) {
        self.release_stale(doc);
        self.open_newly_active(doc);

        if self.seeked.swap(false, Ordering::Relaxed) {
            for controller in self.controllers.values_mut() {
                controller.force_resync();
            }
        }
        for controller in self.controllers.values_mut() {
            controller.update(doc, now);
        }
    }

    pub fn controller(&self, clip_id: Uuid) -> Option<&MediaSyncController> {
        self.controllers.get(&clip_id)
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// Clips whose media is currently running.
    pub fn playing(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.controllers
            .values()
            .filter(|c| c.state() == SyncState::Playing)
            .map(MediaSyncController::clip_id)
    }

    fn release_stale(&mut self, doc: &EditorState) {
        let t = doc.playback.current_time;
        let release_distance = self.config.release_distance;
        let live: BTreeSet<Uuid> = doc.clips().map(|(_, c)| c.id).collect();
        let distant: BTreeSet<Uuid> = doc
            .clips()
            .filter(|(_, c)| distance_to(c.start, c.end, t) > release_distance)
            .map(|(_, c)| c.id)
            .collect();
        self.controllers.retain(|id, controller| {
            let keep = live.contains(id) && !distant.contains(id);
            if !keep {
                controller.deactivate();
                tracing::debug!(clip = %id, "media controller released");
            }
            keep
        });
        self.unopenable
            .retain(|(clip, asset)| live.contains(clip) && doc.asset(*asset).is_some());
    }

    fn open_newly_active(&mut self, doc: &EditorState) {
        let t = doc.playback.current_time;
        for (track, clip) in doc.clips() {
            if !clip.kind().is_timed() || self.controllers.contains_key(&clip.id) {
                continue;
            }
            if !(track.visible && clip.visible && clip.contains(t)) {
                continue;
            }
            let Some(asset) = doc.asset(clip.asset_id).filter(|a| a.is_loaded()) else {
                continue;
            };
            if self.unopenable.contains(&(clip.id, asset.id)) {
                continue;
            }
            match self.opener.open(asset) {
                Ok(handle) => {
                    tracing::debug!(clip = %clip.id, src = %asset.src, "media controller created");
                    self.controllers.insert(
                        clip.id,
                        MediaSyncController::new(clip.id, handle, self.config.clone()),
                    );
                }
                Err(e) => {
                    tracing::warn!(clip = %clip.id, src = %asset.src, error = %e, "failed to open media");
                    self.unopenable.insert((clip.id, asset.id));
                }
            }
        }
    }
}

/// Seconds between `t` and the nearest point of `[start, end)`.
fn distance_to(start: Seconds, end: Seconds, t: Seconds) -> Seconds {
    (start - t).max(t - end).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PreviewError, Result};
    use crate::handle::MediaHandle;
    use crate::sync::tests::{Call, MockHandle, MockMedia};
    use reelcut_core::{Asset, AssetMeta, NewClip};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct MockOpener {
        opened: Vec<Rc<RefCell<MockMedia>>>,
        fail: bool,
    }

    impl MediaOpener for MockOpener {
        fn open(&mut self, _asset: &Asset) -> Result<Box<dyn MediaHandle>> {
            if self.fail {
                return Err(PreviewError::Media("no decoder".into()));
            }
            let handle = MockHandle::default();
            handle.0.borrow_mut().paused = true;
            self.opened.push(handle.0.clone());
            Ok(Box::new(handle))
        }
    }

    fn video() -> Asset {
        Asset::loaded(
            "v.mp4",
            "/v.mp4",
            AssetMeta::Video {
                duration: 10.0,
                fps: 30.0,
                width: 640,
                height: 360,
                has_audio: true,
            },
        )
    }

    /// Two video clips back to back on one track, plus a still image.
    fn setup() -> (EditorStore, [Uuid; 2]) {
        let mut store = EditorStore::default();
        let track = store.add_track("V1");
        let asset = store.add_asset(video());
        let still = store.add_asset(Asset::loaded(
            "s.png",
            "/s.png",
            AssetMeta::Image {
                width: 10,
                height: 10,
            },
        ));
        let a = store
            .add_clip(track, NewClip::new(asset, 0.0).with_trim(0.0, Some(4.0)))
            .unwrap();
        let b = store
            .add_clip(track, NewClip::new(asset, 4.0).with_trim(2.0, Some(6.0)))
            .unwrap();
        let overlay = store.add_track("Overlay");
        store.add_clip(overlay, NewClip::new(still, 0.0)).unwrap();
        (store, [a, b])
    }

    #[test]
    fn controllers_are_created_on_activation() {
        let (mut store, [a, b]) = setup();
        let mut session = PreviewSession::new(MockOpener::default(), SyncConfig::default());
        let now = Instant::now();

        store.play();
        session.tick(&mut store, 0.5, now);
        assert_eq!(session.len(), 1);
        assert_eq!(session.controller(a).unwrap().state(), SyncState::Playing);

        session.tick(&mut store, 4.0, now);
        assert_eq!(session.len(), 2);
        assert_eq!(session.controller(a).unwrap().state(), SyncState::Idle);
        assert_eq!(session.playing().collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn removed_clip_releases_controller() {
        let (mut store, [a, _]) = setup();
        let mut session = PreviewSession::new(MockOpener::default(), SyncConfig::default());
        store.play();
        session.tick(&mut store, 0.1, Instant::now());
        assert!(session.controller(a).is_some());

        store.remove_clip(a).unwrap();
        session.reconcile(store.state(), Instant::now());
        assert!(session.is_empty());
    }

    #[test]
    fn distant_controllers_are_released_and_reopened() {
        let (mut store, [a, b]) = setup();
        let config = SyncConfig {
            release_distance: 1.0,
            ..SyncConfig::default()
        };
        let mut session = PreviewSession::new(MockOpener::default(), config);
        let now = Instant::now();
        store.play();
        session.tick(&mut store, 0.5, now);

        // 4.5: just past clip a, still within reach.
        session.tick(&mut store, 4.0, now);
        assert_eq!(session.len(), 2);

        // 5.5: a is 1.5s behind the playhead.
        session.tick(&mut store, 1.0, now);
        assert!(session.controller(a).is_none());
        assert!(session.controller(b).is_some());
        assert_eq!(session.opener.opened[0].borrow().calls.last(), Some(&Call::Pause));

        session.seek(&mut store, 1.0, now);
        assert!(session.controller(a).is_some());
        assert_eq!(session.opener.opened.len(), 3);
    }

    #[test]
    fn external_seek_forces_resync() {
        let (mut store, _) = setup();
        let mut session = PreviewSession::new(MockOpener::default(), SyncConfig::default());
        session.attach(&mut store);
        let now = Instant::now();
        store.play();
        session.tick(&mut store, 0.5, now);

        store.seek_to(1.5);
        session.reconcile(store.state(), now);
        let media = session.opener.opened[0].clone();
        assert_eq!(media.borrow().seeks(), vec![0.5, 1.5]);
    }

    #[test]
    fn open_failure_is_not_retried_every_tick() {
        let (mut store, _) = setup();
        let opener = MockOpener {
            fail: true,
            ..Default::default()
        };
        let mut session = PreviewSession::new(opener, SyncConfig::default());
        store.play();
        session.tick(&mut store, 0.1, Instant::now());
        session.tick(&mut store, 0.1, Instant::now());
        assert!(session.is_empty());
        assert_eq!(session.unopenable.len(), 1);
    }

    #[test]
    fn images_get_no_controller() {
        let (mut store, [a, b]) = setup();
        store.remove_clip(a).unwrap();
        store.remove_clip(b).unwrap();
        let mut session = PreviewSession::new(MockOpener::default(), SyncConfig::default());
        session.seek(&mut store, 1.0, Instant::now());
        assert!(session.is_empty());
    }
}
