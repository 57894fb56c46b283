//! Collision and placement math over a single track's clip intervals.
//!
//! Every function here is pure. Intervals are half-open `[start, end)`, so two
//! clips that share an edge do not collide.

use crate::time::{Seconds, TIME_EPSILON};
use crate::types::{Clip, Track};
use uuid::Uuid;

/// Closest clips on either side of an interval.
#[derive(Debug, Clone, Copy, Default)]
pub struct Neighbors<'a> {
    /// Clip with the latest end at or before the interval's start.
    pub left: Option<&'a Clip>,
    /// Clip with the earliest start at or after the interval's end.
    pub right: Option<&'a Clip>,
}

/// True if `[start, end)` intersects any clip on `track` other than
/// `except_id`, or if the interval is empty or inverted.
pub fn does_overlap(track: &Track, start: Seconds, end: Seconds, except_id: Option<Uuid>) -> bool {
    if end <= start {
        return true;
    }
    others(track, except_id).any(|c| c.overlaps(start, end))
}

pub fn neighbor_clips(track: &Track, id: Option<Uuid>, start: Seconds, end: Seconds) -> Neighbors<'_> {
    let mut neighbors = Neighbors::default();
    for clip in others(track, id) {
        if clip.end <= start + TIME_EPSILON
            && neighbors.left.map_or(true, |l| clip.end > l.end)
        {
            neighbors.left = Some(clip);
        }
        if clip.start >= end - TIME_EPSILON
            && neighbors.right.map_or(true, |r| clip.start < r.start)
        {
            neighbors.right = Some(clip);
        }
    }
    neighbors
}

/// Start position closest to `desired_start` at which a clip of `duration`
/// fits on `track` without overlapping anything (ignoring `except_id`).
///
/// Every gap wide enough is considered, plus the open region after the last
/// clip. Equal distances resolve to the earlier candidate.
pub fn find_nearest_free_placement(
    track: &Track,
    desired_start: Seconds,
    duration: Seconds,
    except_id: Option<Uuid>,
) -> Seconds {
    let mut clips: Vec<&Clip> = others(track, except_id).collect();
    if clips.is_empty() {
        return desired_start.max(0.0);
    }
    clips.sort_by(|a, b| a.start.total_cmp(&b.start));

    let duration = duration.max(0.0);
    let mut best: Option<(Seconds, Seconds)> = None;
    let mut consider = |lo: Seconds, hi: Seconds| {
        let candidate = clamp_into(desired_start, lo, hi);
        let dist = (candidate - desired_start).abs();
        match best {
            Some((_, best_dist)) if dist >= best_dist - TIME_EPSILON => {}
            _ => best = Some((candidate, dist)),
        }
    };

    // `cursor` is the end of everything seen so far; gaps open between it and
    // the next clip's start.
    let mut cursor: Seconds = 0.0;
    for clip in &clips {
        if clip.start - cursor >= duration - TIME_EPSILON {
            consider(cursor, clip.start - duration);
        }
        cursor = cursor.max(clip.end);
    }
    consider(cursor, f64::INFINITY);

    best.map(|(start, _)| start).unwrap_or(cursor)
}

/// Limit a new left edge for `clip` so it stops at the left neighbour's end
/// (or at zero).
pub fn clamp_trim_start_to_left(track: &Track, clip: &Clip, proposed_start: Seconds) -> Seconds {
    let floor = neighbor_clips(track, Some(clip.id), clip.start, clip.end)
        .left
        .map(|l| l.end)
        .unwrap_or(0.0);
    proposed_start.max(floor)
}

/// Limit a new right edge for `clip` so it stops at the right neighbour's start.
pub fn clamp_trim_end_to_right(track: &Track, clip: &Clip, proposed_end: Seconds) -> Seconds {
    match neighbor_clips(track, Some(clip.id), clip.start, clip.end).right {
        Some(r) => proposed_end.min(r.start),
        None => proposed_end,
    }
}

fn others(track: &Track, except_id: Option<Uuid>) -> impl Iterator<Item = &Clip> {
    track.clips.iter().filter(move |c| Some(c.id) != except_id)
}

fn clamp_into(value: Seconds, lo: Seconds, hi: Seconds) -> Seconds {
    value.max(lo).min(hi.max(lo))
}
