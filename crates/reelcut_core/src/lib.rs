pub mod config;
pub mod error;
pub mod overlay;
pub mod placement;
pub mod playback;
pub mod project;
pub mod snapping;
pub mod store;
pub mod time;
pub mod types;

pub use error::{CoreError, Result};
pub use overlay::GestureOverlay;
pub use playback::{active_clips, ActiveClip, TickOutcome};
pub use store::{
    AssetLoader, ClipPatch, EditorStore, NewClip, StoreEvent, SubscriptionId, TrackPatch,
};
pub use time::{Seconds, TIME_EPSILON};
pub use types::*;
