//! Main-track magnet: keeps the main track strictly sequential.
//! When enabled, main-track elements sorted by start form a contiguous
//! chain from frame 0. Every reflow re-runs attachment propagation for
//! parents whose start changed, then re-normalizes track indices.
//!
//! All three operations take the attachment map as an argument so a
//! commit pipeline can propagate against the relations captured at
//! gesture start; transient mid-pipeline positions must not rebind
//! children to the wrong parent.

use std::collections::HashSet;

use tracing::debug;

use crate::{
    apply_assignment, assign, normalize, AttachmentMap, Element, ElementId, Frame, TrackMeta,
    MAIN_TRACK,
};

/// Ids of main-track elements in timeline order (start, then id).
fn main_track_order(elements: &[Element], tracks: &[TrackMeta]) -> Vec<ElementId> {
    let assignment = assign(elements, tracks);
    let mut ids: Vec<(Frame, ElementId)> = elements
        .iter()
        .filter(|e| !e.is_transition() && assignment.get(&e.id) == Some(&MAIN_TRACK))
        .map(|e| (e.span.start, e.id))
        .collect();
    ids.sort_unstable();
    ids.into_iter().map(|(_, id)| id).collect()
}

/// Lay the given main-track elements out contiguously from frame 0 in
/// the given order, co-moving attachments and re-normalizing tracks.
/// Members of the sequence itself never ride as children, whatever a
/// stale map says.
fn reflow(
    elements: &mut Vec<Element>,
    order: &[ElementId],
    tracks: &[TrackMeta],
    attachments: &AttachmentMap,
) {
    let members: HashSet<ElementId> = order.iter().copied().collect();

    let mut cursor: Frame = 0;
    let mut deltas: Vec<(ElementId, Frame)> = Vec::new();
    for id in order {
        let Some(el) = elements.iter().find(|e| e.id == *id) else {
            continue;
        };
        let delta = cursor - el.span.start;
        cursor += el.span.duration();
        if delta != 0 {
            deltas.push((*id, delta));
        }
    }

    for (id, delta) in deltas {
        if let Some(el) = elements.iter_mut().find(|e| e.id == id) {
            el.span = el.span.shifted(delta);
        }
        if let Some(children) = attachments.get(&id) {
            let riders: Vec<ElementId> = children
                .iter()
                .copied()
                .filter(|c| !members.contains(c))
                .collect();
            crate::propagate(elements, &riders, delta);
        }
    }

    let norm = normalize(elements, tracks);
    apply_assignment(elements, &norm);
}

/// Full reflow of the main track, order preserved.
pub fn compact(elements: &mut Vec<Element>, tracks: &[TrackMeta], attachments: &AttachmentMap) {
    let order = main_track_order(elements, tracks);
    reflow(elements, &order, tracks, attachments);
}

/// Remove `id` from its current position in the main-track sequence and
/// re-insert it at the slot matching `desired_start`. The insertion
/// index comes from comparing `desired_start` against the reflowed
/// neighbors' midpoints, so a drag past a neighbor's midpoint swaps
/// with it while durations are preserved.
pub fn insert_at(
    elements: &mut Vec<Element>,
    id: ElementId,
    desired_start: Frame,
    tracks: &[TrackMeta],
    attachments: &AttachmentMap,
) {
    let Some(el) = elements.iter_mut().find(|e| e.id == id) else {
        return;
    };
    el.track = MAIN_TRACK;

    let rest: Vec<ElementId> = main_track_order(elements, tracks)
        .into_iter()
        .filter(|other| *other != id)
        .collect();

    // Midpoints as they will sit once the dragged element is out.
    let mut cursor: Frame = 0;
    let mut index = rest.len();
    for (i, other) in rest.iter().enumerate() {
        let Some(other_el) = elements.iter().find(|e| e.id == *other) else {
            continue;
        };
        let duration = other_el.span.duration();
        if desired_start < cursor + duration / 2 {
            index = i;
            break;
        }
        cursor += duration;
    }

    let mut order = rest;
    order.insert(index, id);
    debug!(%id, desired_start, index, "magnet insert");
    reflow(elements, &order, tracks, attachments);
}

/// Resize ripple: set the element's end to `new_end` and shift every
/// later main-track element by `delta`.
pub fn shift_after(
    elements: &mut Vec<Element>,
    id: ElementId,
    new_end: Frame,
    delta: Frame,
    tracks: &[TrackMeta],
    attachments: &AttachmentMap,
) {
    let assignment = assign(elements, tracks);

    let Some(el) = elements.iter_mut().find(|e| e.id == id) else {
        return;
    };
    let old_end = el.span.end;
    el.span.end = new_end;

    let later: Vec<ElementId> = elements
        .iter()
        .filter(|e| {
            e.id != id
                && !e.is_transition()
                && assignment.get(&e.id) == Some(&MAIN_TRACK)
                && e.span.start >= old_end
        })
        .map(|e| e.id)
        .collect();
    let main: HashSet<ElementId> = later.iter().copied().collect();

    for other in later {
        if let Some(el) = elements.iter_mut().find(|e| e.id == other) {
            el.span = el.span.shifted(delta);
        }
        if let Some(children) = attachments.get(&other) {
            let riders: Vec<ElementId> = children
                .iter()
                .copied()
                .filter(|c| !main.contains(c) && *c != id)
                .collect();
            crate::propagate(elements, &riders, delta);
        }
    }

    let norm = normalize(elements, tracks);
    apply_assignment(elements, &norm);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{find_attachments, ElementKind, Span};

    fn clip(start: Frame, end: Frame) -> Element {
        Element::new(
            ElementKind::Video {
                src: "test.mp4".into(),
            },
            Span::new(start, end),
            MAIN_TRACK,
        )
    }

    fn overlay(start: Frame, end: Frame, track: usize) -> Element {
        Element::new(
            ElementKind::Overlay { src: None },
            Span::new(start, end),
            track,
        )
    }

    fn spans(elements: &[Element]) -> Vec<(Frame, Frame)> {
        let mut out: Vec<(Frame, Frame)> = elements
            .iter()
            .filter(|e| e.track == MAIN_TRACK)
            .map(|e| (e.span.start, e.span.end))
            .collect();
        out.sort_unstable();
        out
    }

    fn assert_contiguous(elements: &[Element]) {
        let mut cursor = 0;
        for (start, end) in spans(elements) {
            assert_eq!(start, cursor, "gap on main track");
            cursor = end;
        }
    }

    #[test]
    fn compact_closes_gaps_preserving_order() {
        let mut elements = vec![clip(10, 60), clip(100, 130)];
        let attachments = find_attachments(&elements, &[]);
        compact(&mut elements, &[], &attachments);
        assert_eq!(spans(&elements), vec![(0, 50), (50, 80)]);
        assert_contiguous(&elements);
    }

    #[test]
    fn insert_reorders_by_midpoint() {
        // A[0,50) dragged to desired start 80 lands after B[50,120):
        // the result is B[0,70), A[70,120).
        let a = clip(0, 50);
        let b = clip(50, 120);
        let a_id = a.id;
        let mut elements = vec![a, b];
        let attachments = find_attachments(&elements, &[]);
        insert_at(&mut elements, a_id, 80, &[], &attachments);
        assert_eq!(spans(&elements), vec![(0, 70), (70, 120)]);
        let a_el = elements.iter().find(|e| e.id == a_id).unwrap();
        assert_eq!(a_el.span, Span::new(70, 120));
        assert_contiguous(&elements);
    }

    #[test]
    fn insert_before_midpoint_keeps_position() {
        let a = clip(0, 50);
        let b = clip(50, 120);
        let a_id = a.id;
        let mut elements = vec![a, b];
        let attachments = find_attachments(&elements, &[]);
        // Desired start 20 stays left of B's reflowed midpoint (35).
        insert_at(&mut elements, a_id, 20, &[], &attachments);
        let a_el = elements.iter().find(|e| e.id == a_id).unwrap();
        assert_eq!(a_el.span, Span::new(0, 50));
        assert_contiguous(&elements);
    }

    #[test]
    fn shift_after_ripples_later_elements() {
        let a = clip(0, 100);
        let b = clip(100, 200);
        let c = clip(200, 250);
        let a_id = a.id;
        let mut elements = vec![a, b, c];
        let attachments = find_attachments(&elements, &[]);
        shift_after(&mut elements, a_id, 90, -10, &[], &attachments);
        assert_eq!(spans(&elements), vec![(0, 90), (90, 190), (190, 240)]);
        assert_contiguous(&elements);
    }

    #[test]
    fn reflow_carries_attachments_along() {
        let a = clip(20, 70);
        let child = overlay(30, 40, 1);
        let child_id = child.id;
        let mut elements = vec![a, child];
        let attachments = find_attachments(&elements, &[]);
        compact(&mut elements, &[], &attachments);
        // Parent shifted by -20; the child rides along.
        let child_el = elements.iter().find(|e| e.id == child_id).unwrap();
        assert_eq!(child_el.span, Span::new(10, 20));
    }

    #[test]
    fn shift_after_moves_attachments_of_later_clips() {
        let a = clip(0, 100);
        let b = clip(100, 200);
        let child = overlay(120, 140, 1);
        let (a_id, child_id) = (a.id, child.id);
        let mut elements = vec![a, b, child];
        let attachments = find_attachments(&elements, &[]);
        shift_after(&mut elements, a_id, 80, -20, &[], &attachments);
        let child_el = elements.iter().find(|e| e.id == child_id).unwrap();
        assert_eq!(child_el.span, Span::new(100, 120));
    }
}
