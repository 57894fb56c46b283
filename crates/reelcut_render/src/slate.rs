//! Software renderer that draws every visual clip as a flat box.
//!
//! Stands in for a real compositor in the CLI and in tests: the layout honors
//! the composition frame, the clip transform (including any in-progress
//! gesture), opacity and draw order, so an export shows exactly which clips
//! were on screen and where.

use crate::error::Result;
use crate::export::Renderer;
use crate::frame::{composition_frame, parse_hex_color, Raster, Rect};
use reelcut_core::{ActiveClip, AssetKind, EditorState, GestureOverlay, Seconds};

const FALLBACK_COLOR: [u8; 3] = [255, 255, 255];

pub struct SlateRenderer {
    width: u32,
    height: u32,
    background: [u8; 4],
    overlay: GestureOverlay,
}

impl SlateRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            background: [0, 0, 0, 255],
            overlay: GestureOverlay::new(),
        }
    }

    pub fn with_background(mut self, rgb: [u8; 3]) -> Self {
        self.background = [rgb[0], rgb[1], rgb[2], 255];
        self
    }

    /// Transforms of clips being dragged; consulted before persisted values.
    pub fn overlay_mut(&mut self) -> &mut GestureOverlay {
        &mut self.overlay
    }

    /// Where `active` lands on the surface, or `None` for clips with nothing
    /// to draw.
    ///
    /// Position is a fraction of the composition frame (x right, y up) measured
    /// from its center; scale multiplies the fitted size.
    pub fn clip_rect(&self, frame: Rect, active: &ActiveClip<'_>) -> Option<Rect> {
        let (base_w, base_h) = match active.clip.kind() {
            AssetKind::Audio => return None,
            AssetKind::Text => (frame.width * 0.6, frame.height * 0.15),
            AssetKind::Video | AssetKind::Image => {
                let aspect = active
                    .asset
                    .and_then(|a| a.aspect_ratio())
                    .unwrap_or(frame.width / frame.height);
                let fitted = composition_frame(
                    frame.width.round() as u32,
                    frame.height.round() as u32,
                    aspect,
                );
                (fitted.width, fitted.height)
            }
        };

        let transform = self.overlay.effective_transform(active.clip);
        let w = base_w * transform.scale.x.abs();
        let h = base_h * transform.scale.y.abs();
        let (cx, cy) = frame.center();
        let cx = cx + transform.position.x * frame.width;
        let cy = cy - transform.position.y * frame.height;
        Some(Rect::new(cx - w / 2.0, cy - h / 2.0, w, h))
    }
}

impl Renderer for SlateRenderer {
    fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn render(
        &mut self,
        state: &EditorState,
        _t: Seconds,
        active: &[ActiveClip<'_>],
    ) -> Result<Raster> {
        let mut raster = Raster::new(self.width, self.height);
        raster.fill(self.background);
        let frame = composition_frame(
            self.width,
            self.height,
            state.export_settings.aspect_ratio(),
        );

        for clip in active {
            let Some(rect) = self.clip_rect(frame, clip) else {
                continue;
            };
            let color = parse_hex_color(&clip.track.color).unwrap_or(FALLBACK_COLOR);
            raster.blend_rect(rect, color, clip.clip.opacity);
        }
        Ok(raster)
    }
}
