/// Timeline positions and durations, in seconds.
pub type Seconds = f64;

/// Tolerance used when comparing timeline positions.
pub const TIME_EPSILON: Seconds = 1e-6;

/// Smallest zoom (pixels per second) accepted by the pixel conversions.
pub const MIN_ZOOM: f64 = 1e-3;

pub fn seconds_to_pixels(t: Seconds, zoom: f64) -> f64 {
    t * zoom.max(MIN_ZOOM)
}

pub fn pixels_to_seconds(px: f64, zoom: f64) -> Seconds {
    px / zoom.max(MIN_ZOOM)
}

/// Index of the frame that is on screen at `t`.
pub fn seconds_to_frame(t: Seconds, fps: f64) -> u64 {
    if fps <= 0.0 || t <= 0.0 {
        return 0;
    }
    (t * fps + TIME_EPSILON).floor() as u64
}

pub fn frame_to_seconds(frame: u64, fps: f64) -> Seconds {
    if fps <= 0.0 {
        return 0.0;
    }
    frame as f64 / fps
}

/// Number of frames needed to cover `duration` at `fps`, i.e. `ceil(duration * fps)`.
///
/// Products that land within rounding noise of an integer are treated as that
/// integer, so 10s at 30fps is 300 frames rather than 301.
pub fn frame_count(duration: Seconds, fps: f64) -> u64 {
    if fps <= 0.0 || duration <= 0.0 {
        return 0;
    }
    let exact = duration * fps;
    let rounded = exact.round();
    if (exact - rounded).abs() < 1e-6 {
        rounded as u64
    } else {
        exact.ceil() as u64
    }
}

/// Format seconds as `HH:MM:SS.mmm`.
pub fn format_timecode(t: Seconds) -> String {
    let total_ms = (t.abs() * 1_000.0).round() as u64;
    let ms = total_ms % 1_000;
    let total_secs = total_ms / 1_000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;
    if t < 0.0 {
        format!("-{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
    } else {
        format!("{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
    }
}
