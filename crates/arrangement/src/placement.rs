//! Track placement: derives a non-overlapping track index for every
//! element. The assignment is a view over the element list, recomputed
//! on every change and never stored authoritatively.

use std::collections::HashMap;

use crate::{Element, ElementId, Role, Span, TrackMeta, MAIN_TRACK};

pub type TrackAssignment = HashMap<ElementId, usize>;

/// Whether `track` may host an element of `role`. Locked tracks refuse
/// everything; the main track is clip-only even without metadata.
pub fn track_accepts(tracks: &[TrackMeta], track: usize, role: Role) -> bool {
    if let Some(meta) = tracks.get(track) {
        if meta.locked {
            return false;
        }
        if let Some(track_role) = meta.role {
            return track_role == role;
        }
    }
    if track == MAIN_TRACK {
        return role == Role::Clip;
    }
    true
}

/// Whether `span` fits on `track` without overlapping any already
/// assigned element. Transitions ride on their neighbors and never
/// count as occupancy.
pub fn is_free(
    span: Span,
    track: usize,
    elements: &[Element],
    assignment: &TrackAssignment,
    exclude: Option<ElementId>,
) -> bool {
    for el in elements {
        if el.is_transition() || Some(el.id) == exclude {
            continue;
        }
        let Some(&t) = assignment.get(&el.id) else {
            continue;
        };
        if t == track && el.span.overlaps(&span) {
            return false;
        }
    }
    true
}

/// Upward scan from `start_track` for a track that accepts `role` and
/// has room for `span`. Falls back to the first index past every
/// assigned and scanned track when nothing in
/// `start_track..track_count` is free; on an empty timeline that is
/// track 0.
#[allow(clippy::too_many_arguments)]
pub fn find_free_track(
    span: Span,
    role: Role,
    elements: &[Element],
    assignment: &TrackAssignment,
    exclude: Option<ElementId>,
    start_track: usize,
    track_count: usize,
    tracks: &[TrackMeta],
) -> usize {
    for track in start_track..track_count {
        if !track_accepts(tracks, track, role) {
            continue;
        }
        if is_free(span, track, elements, assignment, exclude) {
            return track;
        }
    }
    let next = assignment.values().copied().max().map_or(0, |t| t + 1);
    next.max(track_count)
}

/// Derive a conflict-free track index for every element, honoring the
/// stored index where possible. An overlap loser is bumped via
/// `find_free_track`, so locked and role-restricted tracks in the
/// document metadata are never chosen for it. Ties break by ascending
/// track, then span start, then id, so the result is deterministic.
pub fn assign(elements: &[Element], tracks: &[TrackMeta]) -> TrackAssignment {
    let mut order: Vec<&Element> = elements.iter().filter(|e| !e.is_transition()).collect();
    order.sort_by_key(|e| (e.track, e.span.start, e.id));

    let max_track = order.iter().map(|e| e.track).max().unwrap_or(0);
    let track_count = (max_track + 1).max(tracks.len());
    let mut out = TrackAssignment::new();
    for el in &order {
        let track = if is_free(el.span, el.track, elements, &out, Some(el.id)) {
            el.track
        } else {
            find_free_track(
                el.span,
                el.role(),
                elements,
                &out,
                Some(el.id),
                el.track + 1,
                track_count,
                tracks,
            )
        };
        out.insert(el.id, track);
    }

    // Transitions follow the track of the clip they lead out of.
    for el in elements.iter().filter(|e| e.is_transition()) {
        let track = el
            .transition()
            .and_then(|spec| out.get(&spec.from).copied())
            .unwrap_or(el.track);
        out.insert(el.id, track);
    }
    out
}

/// Compact the derived assignment to dense indices `0..k`. The main
/// track and every index backed by track metadata count as present, so
/// compaction never renumbers an element onto an existing (possibly
/// locked) track. Idempotent.
pub fn normalize(elements: &[Element], tracks: &[TrackMeta]) -> TrackAssignment {
    let assignment = assign(elements, tracks);
    let mut used: Vec<usize> = assignment.values().copied().collect();
    used.extend(0..tracks.len().max(MAIN_TRACK + 1));
    used.sort_unstable();
    used.dedup();
    let rank: HashMap<usize, usize> = used.iter().enumerate().map(|(i, t)| (*t, i)).collect();
    assignment
        .into_iter()
        .map(|(id, t)| (id, rank[&t]))
        .collect()
}

/// Open a new track at `index`: every element on a track at or above it
/// shifts up by one.
pub fn insert_track_at(index: usize, assignment: &TrackAssignment) -> TrackAssignment {
    assignment
        .iter()
        .map(|(&id, &t)| (id, if t >= index { t + 1 } else { t }))
        .collect()
}

/// Write a derived assignment back into the stored indices.
pub fn apply_assignment(elements: &mut [Element], assignment: &TrackAssignment) {
    for el in elements.iter_mut() {
        if let Some(&t) = assignment.get(&el.id) {
            el.track = t;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ElementKind, Frame};

    fn clip(start: Frame, end: Frame, track: usize) -> Element {
        Element::new(
            ElementKind::Video {
                src: "test.mp4".into(),
            },
            Span::new(start, end),
            track,
        )
    }

    #[test]
    fn assign_keeps_disjoint_elements_in_place() {
        let elements = vec![clip(0, 100, 0), clip(100, 200, 0), clip(0, 50, 1)];
        let assignment = assign(&elements, &[]);
        assert_eq!(assignment[&elements[0].id], 0);
        assert_eq!(assignment[&elements[1].id], 0);
        assert_eq!(assignment[&elements[2].id], 1);
    }

    #[test]
    fn assign_bumps_overlap_to_next_track() {
        let elements = vec![clip(0, 100, 0), clip(50, 150, 0)];
        let assignment = assign(&elements, &[]);
        assert_eq!(assignment[&elements[0].id], 0);
        assert_eq!(assignment[&elements[1].id], 1);
    }

    #[test]
    fn no_two_elements_share_a_track_and_overlap() {
        let elements = vec![
            clip(0, 100, 0),
            clip(50, 150, 0),
            clip(80, 120, 0),
            clip(0, 10, 2),
            clip(5, 15, 2),
        ];
        let assignment = assign(&elements, &[]);
        for a in &elements {
            for b in &elements {
                if a.id == b.id {
                    continue;
                }
                if assignment[&a.id] == assignment[&b.id] {
                    assert!(
                        !a.span.overlaps(&b.span),
                        "overlap on track {}",
                        assignment[&a.id]
                    );
                }
            }
        }
    }

    #[test]
    fn find_free_track_skips_locked_and_role_mismatch() {
        let elements = vec![clip(0, 100, 0)];
        let assignment = assign(&elements, &[]);
        let mut locked = TrackMeta::new("V2");
        locked.locked = true;
        let tracks = vec![TrackMeta::new("Main"), locked, TrackMeta::new("V3")];
        let t = find_free_track(
            Span::new(0, 50),
            Role::Clip,
            &elements,
            &assignment,
            None,
            0,
            3,
            &tracks,
        );
        assert_eq!(t, 2);
    }

    #[test]
    fn find_free_track_overflows_to_new_track() {
        let elements = vec![clip(0, 100, 0), clip(0, 100, 1)];
        let assignment = assign(&elements, &[]);
        let t = find_free_track(
            Span::new(20, 60),
            Role::Clip,
            &elements,
            &assignment,
            None,
            0,
            2,
            &[],
        );
        assert_eq!(t, 2);
    }

    #[test]
    fn main_track_refuses_non_clip_roles() {
        assert!(!track_accepts(&[], MAIN_TRACK, Role::Audio));
        assert!(track_accepts(&[], MAIN_TRACK, Role::Clip));
        assert!(track_accepts(&[], 1, Role::Audio));
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut elements = vec![clip(0, 10, 3), clip(0, 10, 7), clip(0, 10, 0)];
        let once = normalize(&elements, &[]);
        apply_assignment(&mut elements, &once);
        let twice = normalize(&elements, &[]);
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_reserves_main_track() {
        let mut elements = vec![clip(0, 10, 2), clip(0, 10, 5)];
        let norm = normalize(&elements, &[]);
        apply_assignment(&mut elements, &norm);
        assert_eq!(elements[0].track, 1);
        assert_eq!(elements[1].track, 2);
    }

    #[test]
    fn assign_never_bumps_conflict_onto_locked_track() {
        // A and B both stored on track 0 overlap; track 1 is locked in
        // the document, so the loser lands on track 2.
        let elements = vec![clip(0, 100, 0), clip(50, 150, 0)];
        let mut locked = TrackMeta::new("V2");
        locked.locked = true;
        let tracks = vec![TrackMeta::new("Main"), locked, TrackMeta::new("V3")];
        let assignment = assign(&elements, &tracks);
        assert_eq!(assignment[&elements[0].id], 0);
        assert_eq!(assignment[&elements[1].id], 2);
    }

    #[test]
    fn assign_respects_track_role_metadata_on_bump() {
        let elements = vec![clip(0, 100, 0), clip(50, 150, 0)];
        let mut audio_only = TrackMeta::new("A1");
        audio_only.role = Some(Role::Audio);
        let tracks = vec![TrackMeta::new("Main"), audio_only];
        let assignment = assign(&elements, &tracks);
        assert_eq!(assignment[&elements[1].id], 2);
    }

    #[test]
    fn normalize_keeps_metadata_backed_tracks_in_place() {
        // Track 1 exists (locked) but holds nothing; the element on
        // track 2 must not compact down onto it.
        let mut elements = vec![clip(0, 10, 0), clip(0, 10, 2)];
        let mut locked = TrackMeta::new("V2");
        locked.locked = true;
        let tracks = vec![TrackMeta::new("Main"), locked, TrackMeta::new("V3")];
        let norm = normalize(&elements, &tracks);
        apply_assignment(&mut elements, &norm);
        assert_eq!(elements[1].track, 2);
    }

    #[test]
    fn find_free_track_on_empty_timeline_is_main() {
        let t = find_free_track(
            Span::new(0, 50),
            Role::Clip,
            &[],
            &TrackAssignment::new(),
            None,
            0,
            0,
            &[],
        );
        assert_eq!(t, 0);
    }

    #[test]
    fn insert_track_shifts_indices_at_or_above() {
        let elements = vec![clip(0, 10, 0), clip(0, 10, 1), clip(0, 10, 2)];
        let assignment = assign(&elements, &[]);
        let shifted = insert_track_at(1, &assignment);
        assert_eq!(shifted[&elements[0].id], 0);
        assert_eq!(shifted[&elements[1].id], 2);
        assert_eq!(shifted[&elements[2].id], 3);
    }
}
