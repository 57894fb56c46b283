//! Composition-frame math and a minimal RGBA raster.

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Largest rectangle with `aspect` (width / height) that fits the surface,
/// centered on it.
///
/// Preview and export both cut this region out of the renderer surface, so
/// what the user saw is what gets encoded.
pub fn composition_frame(surface_w: u32, surface_h: u32, aspect: f64) -> Rect {
    let sw = f64::from(surface_w);
    let sh = f64::from(surface_h);
    if surface_w == 0 || surface_h == 0 || !aspect.is_finite() || aspect <= 0.0 {
        return Rect::new(0.0, 0.0, sw, sh);
    }

    let surface_aspect = sw / sh;
    if (surface_aspect - aspect).abs() < 1e-9 {
        return Rect::new(0.0, 0.0, sw, sh);
    }
    let (width, height) = if surface_aspect > aspect {
        (sh * aspect, sh)
    } else {
        (sw, sw / aspect)
    };
    Rect::new((sw - width) / 2.0, (sh - height) / 2.0, width, height)
}

/// Straight-alpha RGBA8 pixels, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Raster {
    /// Opaque black raster.
    pub fn new(width: u32, height: u32) -> Self {
        let mut raster = Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        };
        raster.fill([0, 0, 0, 255]);
        raster
    }

    pub fn fill(&mut self, rgba: [u8; 4]) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Blend a solid colour over `rect` (clipped to the raster) at `opacity`.
    pub fn blend_rect(&mut self, rect: Rect, rgb: [u8; 3], opacity: f64) {
        let alpha = opacity.clamp(0.0, 1.0);
        if alpha <= 0.0 || rect.width <= 0.0 || rect.height <= 0.0 {
            return;
        }
        let x0 = rect.x.max(0.0).round() as u32;
        let y0 = rect.y.max(0.0).round() as u32;
        let x1 = (rect.x + rect.width).min(f64::from(self.width)).max(0.0).round() as u32;
        let y1 = (rect.y + rect.height).min(f64::from(self.height)).max(0.0).round() as u32;

        for y in y0..y1 {
            let row = y as usize * self.width as usize;
            for x in x0..x1 {
                let i = (row + x as usize) * 4;
                for c in 0..3 {
                    let dst = f64::from(self.data[i + c]);
                    let src = f64::from(rgb[c]);
                    self.data[i + c] = (src * alpha + dst * (1.0 - alpha)).round() as u8;
                }
                self.data[i + 3] = 255;
            }
        }
    }

    /// Nearest-neighbour resample of `rect` into a new `out_w`×`out_h` raster.
    pub fn crop_scale(&self, rect: Rect, out_w: u32, out_h: u32) -> Raster {
        let mut out = Raster {
            width: out_w,
            height: out_h,
            data: vec![0; out_w as usize * out_h as usize * 4],
        };
        if self.width == 0 || self.height == 0 {
            return out;
        }
        let sx = rect.width / f64::from(out_w.max(1));
        let sy = rect.height / f64::from(out_h.max(1));

        for y in 0..out_h {
            let src_y = (rect.y + (f64::from(y) + 0.5) * sy)
                .floor()
                .clamp(0.0, f64::from(self.height - 1)) as usize;
            for x in 0..out_w {
                let src_x = (rect.x + (f64::from(x) + 0.5) * sx)
                    .floor()
                    .clamp(0.0, f64::from(self.width - 1)) as usize;
                let si = (src_y * self.width as usize + src_x) * 4;
                let di = (y as usize * out_w as usize + x as usize) * 4;
                out.data[di..di + 4].copy_from_slice(&self.data[si..si + 4]);
            }
        }
        out
    }
}

/// Parse `#rrggbb` (leading `#` optional). Anything else is `None`.
pub fn parse_hex_color(s: &str) -> Option<[u8; 3]> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composition_frame_pillarboxes_wide_surface() {
        let rect = composition_frame(2000, 1000, 16.0 / 9.0);
        assert!((rect.height - 1000.0).abs() < 1e-9);
        assert!((rect.width - 1000.0 * 16.0 / 9.0).abs() < 1e-9);
        assert!((rect.x - (2000.0 - rect.width) / 2.0).abs() < 1e-9);
        assert_eq!(rect.y, 0.0);
    }

    #[test]
    fn composition_frame_letterboxes_tall_surface() {
        let rect = composition_frame(1080, 1920, 16.0 / 9.0);
        assert_eq!(rect.width, 1080.0);
        assert!((rect.height - 607.5).abs() < 1e-9);
        assert!((rect.center().1 - 960.0).abs() < 1e-9);
    }

    #[test]
    fn composition_frame_exact_fit_has_no_padding() {
        let rect = composition_frame(1920, 1080, 16.0 / 9.0);
        assert_eq!(rect, Rect::new(0.0, 0.0, 1920.0, 1080.0));
    }

    #[test]
    fn blend_rect_clips_and_mixes() {
        let mut r = Raster::new(4, 4);
        r.blend_rect(Rect::new(2.0, 2.0, 10.0, 10.0), [200, 100, 0], 0.5);
        assert_eq!(r.pixel(0, 0), Some([0, 0, 0, 255]));
        assert_eq!(r.pixel(3, 3), Some([100, 50, 0, 255]));
    }

    #[test]
    fn crop_scale_samples_region() {
        let mut r = Raster::new(4, 2);
        r.blend_rect(Rect::new(2.0, 0.0, 2.0, 2.0), [255, 255, 255], 1.0);
        let out = r.crop_scale(Rect::new(2.0, 0.0, 2.0, 2.0), 2, 2);
        assert_eq!(out.pixel(0, 0), Some([255, 255, 255, 255]));
        let half = r.crop_scale(Rect::new(0.0, 0.0, 4.0, 2.0), 2, 1);
        assert_eq!(half.pixel(0, 0), Some([0, 0, 0, 255]));
        assert_eq!(half.pixel(1, 0), Some([255, 255, 255, 255]));
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#4f8cff"), Some([0x4f, 0x8c, 0xff]));
        assert_eq!(parse_hex_color("000000"), Some([0, 0, 0]));
        assert_eq!(parse_hex_color("#fff"), None);
    }
}
