//! Transition reconciliation: keeps transition elements bound to the
//! junction of the two clips they bridge. Orphans (whose neighbors are
//! no longer adjacent) are dropped; durations are clamped so that the
//! claims on each neighbor never overlap.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::{assign, Element, ElementId, Frame, Span, TrackMeta};

/// A live adjacency pair: `from.end == to.start` on one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Junction {
    pub from: ElementId,
    pub to: ElementId,
    pub time: Frame,
}

/// Collect every time-adjacent pair of non-transition elements sharing
/// a track.
pub fn find_junctions(elements: &[Element], tracks: &[TrackMeta]) -> Vec<Junction> {
    let assignment = assign(elements, tracks);
    let mut by_track: HashMap<usize, Vec<&Element>> = HashMap::new();
    for el in elements.iter().filter(|e| !e.is_transition()) {
        if let Some(&track) = assignment.get(&el.id) {
            by_track.entry(track).or_default().push(el);
        }
    }

    let mut junctions = Vec::new();
    let mut lanes: Vec<(usize, Vec<&Element>)> = by_track.into_iter().collect();
    lanes.sort_by_key(|(track, _)| *track);
    for (_, mut members) in lanes {
        members.sort_by_key(|e| (e.span.start, e.id));
        for pair in members.windows(2) {
            if pair[0].span.end == pair[1].span.start {
                junctions.push(Junction {
                    from: pair[0].id,
                    to: pair[1].id,
                    time: pair[0].span.end,
                });
            }
        }
    }
    junctions
}

/// Re-resolve every transition against the live adjacency pairs.
///
/// Matched transitions get `boundary` snapped to the junction time, a
/// duration clamped against each neighbor's unclaimed length, and a
/// rendered span of `[boundary - ceil(d/2), boundary + floor(d/2)]`.
/// Unmatched transitions are removed from the list.
pub fn reconcile(elements: &mut Vec<Element>, tracks: &[TrackMeta]) {
    let junctions = find_junctions(elements, tracks);
    let assignment = assign(elements, tracks);
    let lengths: HashMap<ElementId, Frame> = elements
        .iter()
        .filter(|e| !e.is_transition())
        .map(|e| (e.id, e.span.duration()))
        .collect();

    // Deterministic resolution order: by current boundary, then id.
    let mut order: Vec<(Frame, ElementId)> = elements
        .iter()
        .filter_map(|e| e.transition().map(|spec| (spec.boundary, e.id)))
        .collect();
    order.sort_unstable();

    let mut claimed: HashMap<ElementId, Frame> = HashMap::new();
    let mut dropped: Vec<ElementId> = Vec::new();

    for (_, id) in order {
        let Some(idx) = elements.iter().position(|e| e.id == id) else {
            continue;
        };
        let Some(spec) = elements[idx].transition().cloned() else {
            continue;
        };

        let junction = junctions
            .iter()
            .find(|j| j.from == spec.from && j.to == spec.to)
            .copied();
        let Some(junction) = junction else {
            warn!(%id, "dropping orphaned transition");
            dropped.push(id);
            continue;
        };

        let from_len = lengths.get(&spec.from).copied().unwrap_or(0);
        let to_len = lengths.get(&spec.to).copied().unwrap_or(0);
        let from_avail = from_len - claimed.get(&spec.from).copied().unwrap_or(0);
        let to_avail = to_len - claimed.get(&spec.to).copied().unwrap_or(0);
        let bound = from_avail.min(to_avail);
        let duration = spec.duration.min(bound);
        if duration < 1 {
            warn!(%id, bound, "dropping transition with no room");
            dropped.push(id);
            continue;
        }

        // Head/tail rounding must sum back to the duration.
        let head = (duration + 1) / 2;
        let tail = duration / 2;
        *claimed.entry(spec.from).or_default() += head;
        *claimed.entry(spec.to).or_default() += tail;

        let track = assignment.get(&spec.from).copied().unwrap_or(0);
        let el = &mut elements[idx];
        if let Some(spec) = el.transition_mut() {
            spec.boundary = junction.time;
            spec.duration = duration;
        }
        el.span = Span::new(junction.time - head, junction.time + tail);
        el.track = track;
        debug!(%id, boundary = junction.time, duration, "reconciled transition");
    }

    if !dropped.is_empty() {
        elements.retain(|e| !dropped.contains(&e.id));
    }
}
