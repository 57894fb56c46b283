pub mod error;
pub mod handle;
pub mod mpv;
pub mod session;
pub mod sync;

pub use error::{PreviewError, Result};
pub use handle::{MediaHandle, MediaOpener};
pub use mpv::{MpvHandle, MpvOpener};
pub use session::PreviewSession;
pub use sync::{MediaSyncController, SyncState};
