pub mod decode;
pub mod encode;
pub mod error;
pub mod export;
pub mod frame;
pub mod mix;
pub mod probe;
pub mod slate;

pub use decode::{AudioDecoder, FfmpegAudioDecoder, PcmBuffer};
pub use encode::FfmpegEncoder;
pub use error::{RenderError, Result};
pub use export::{Encoder, ExportPhase, ExportStatus, Exporter, Renderer};
pub use frame::{composition_frame, Raster, Rect};
pub use probe::{detect_asset_kind, import_asset, probe_asset, FfprobeLoader};
pub use slate::SlateRenderer;
