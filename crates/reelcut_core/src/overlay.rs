//! In-gesture transform overlay.
//!
//! While a clip is being dragged, scaled or rotated, its live transform lives
//! here rather than in the document. Readers call
//! [`GestureOverlay::effective_transform`]; the gesture ends with either
//! [`commit`](GestureOverlay::commit), which writes through
//! [`EditorStore::update_clip`], or [`discard`](GestureOverlay::discard).

use crate::error::Result;
use crate::store::{ClipPatch, EditorStore};
use crate::types::{Clip, Transform};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct GestureOverlay {
    transforms: HashMap<Uuid, Transform>,
}

impl GestureOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a gesture on `clip` from its persisted transform.
    pub fn begin(&mut self, clip: &Clip) {
        self.transforms.insert(clip.id, clip.transform);
    }

    /// Replace the live transform. Ignored unless a gesture is in progress.
    pub fn update(&mut self, clip_id: Uuid, transform: Transform) -> bool {
        match self.transforms.get_mut(&clip_id) {
            Some(live) => {
                *live = transform;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, clip_id: Uuid) -> Option<&Transform> {
        self.transforms.get(&clip_id)
    }

    pub fn is_active(&self, clip_id: Uuid) -> bool {
        self.transforms.contains_key(&clip_id)
    }

    /// Live transform if the clip is mid-gesture, else the persisted one.
    pub fn effective_transform(&self, clip: &Clip) -> Transform {
        self.transforms
            .get(&clip.id)
            .copied()
            .unwrap_or(clip.transform)
    }

    pub fn discard(&mut self, clip_id: Uuid) -> bool {
        self.transforms.remove(&clip_id).is_some()
    }

    /// End the gesture and persist its transform. The overlay entry is gone
    /// afterwards whether or not the write succeeded.
    pub fn commit(&mut self, clip_id: Uuid, store: &mut EditorStore) -> Result<bool> {
        let Some(transform) = self.transforms.remove(&clip_id) else {
            return Ok(false);
        };
        store.update_clip(
            clip_id,
            ClipPatch {
                transform: Some(transform),
                ..Default::default()
            },
        )?;
        Ok(true)
    }

    /// Drop every pending gesture, e.g. after a snapshot reload.
    pub fn clear(&mut self) {
        self.transforms.clear();
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}
