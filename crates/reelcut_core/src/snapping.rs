use crate::time::Seconds;
use crate::types::EditorState;
use uuid::Uuid;

/// Find the nearest snap point within the threshold.
/// Returns the snapped position if within threshold, otherwise the original position.
pub fn find_snap_point(position: Seconds, snap_points: &[Seconds], threshold: Seconds) -> Seconds {
    let mut best = position;
    let mut best_dist = f64::INFINITY;

    for &point in snap_points {
        let dist = (position - point).abs();
        if dist < best_dist {
            best = point;
            best_dist = dist;
        }
    }

    if best_dist <= threshold {
        best
    } else {
        position
    }
}

/// Collect all snap points from the editor state (zero, playhead, clip edges).
pub fn collect_snap_points(state: &EditorState, exclude_clip_id: Option<Uuid>) -> Vec<Seconds> {
    let mut points = vec![0.0, state.playback.current_time];

    for (_, clip) in state.clips() {
        if Some(clip.id) == exclude_clip_id {
            continue;
        }
        points.push(clip.start);
        points.push(clip.end);
    }

    points.sort_by(f64::total_cmp);
    points.dedup();
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::tests::track_with;

    fn make_state() -> EditorState {
        let mut state = EditorState::new("snap");
        state.tracks.push(track_with(&[(1.0, 4.0), (5.0, 7.0)]));
        state.playback.current_time = 10.0;
        state
    }

    #[test]
    fn snap_to_nearest_point() {
        let points = vec![0.0, 1.0, 5.0];
        assert_eq!(find_snap_point(1.1, &points, 0.2), 1.0);
    }

    #[test]
    fn no_snap_beyond_threshold() {
        let points = vec![0.0, 1.0, 5.0];
        assert_eq!(find_snap_point(3.0, &points, 0.2), 3.0);
    }

    #[test]
    fn empty_snap_points_returns_original() {
        assert_eq!(find_snap_point(2.0, &[], 0.5), 2.0);
    }

    #[test]
    fn snap_to_closest_of_two() {
        let points = vec![1.0, 2.0];
        assert_eq!(find_snap_point(1.4, &points, 0.6), 1.0);
        assert_eq!(find_snap_point(1.7, &points, 0.6), 2.0);
    }

    #[test]
    fn collect_snap_points_from_state() {
        let state = make_state();
        let points = collect_snap_points(&state, None);
        assert_eq!(points, vec![0.0, 1.0, 4.0, 5.0, 7.0, 10.0]);
    }

    #[test]
    fn collect_excludes_clip() {
        let state = make_state();
        let excluded = state.tracks[0].clips[0].id;
        let points = collect_snap_points(&state, Some(excluded));
        assert!(!points.contains(&1.0));
        assert!(!points.contains(&4.0));
        assert!(points.contains(&5.0));
        assert!(points.contains(&0.0));
    }
}
