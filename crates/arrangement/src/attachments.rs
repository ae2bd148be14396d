//! Attachment graph: derived parent -> children relations used to
//! co-move dependents when their anchor shifts.
//!
//! Policy: start-containment. A child is any non-main-track element
//! whose span start lies inside a main-track element's span; the
//! containing main-track element is the parent. Main-track spans are
//! disjoint, so each child has at most one parent.

use std::collections::HashMap;

use crate::{assign, Element, ElementId, Frame, TrackMeta, MAIN_TRACK};

pub type AttachmentMap = HashMap<ElementId, Vec<ElementId>>;

/// Compute the parent -> ordered child-id mapping from the element
/// list. Children are ordered by (start, id).
pub fn find_attachments(elements: &[Element], tracks: &[TrackMeta]) -> AttachmentMap {
    let assignment = assign(elements, tracks);

    let parents: Vec<&Element> = elements
        .iter()
        .filter(|e| !e.is_transition() && assignment.get(&e.id) == Some(&MAIN_TRACK))
        .collect();

    let mut children: Vec<&Element> = elements
        .iter()
        .filter(|e| {
            !e.is_transition() && assignment.get(&e.id).is_some_and(|&t| t != MAIN_TRACK)
        })
        .collect();
    children.sort_by_key(|e| (e.span.start, e.id));

    let mut map = AttachmentMap::new();
    for child in children {
        let parent = parents
            .iter()
            .filter(|p| p.span.contains(child.span.start))
            .max_by_key(|p| (p.span.start, p.id));
        if let Some(parent) = parent {
            map.entry(parent.id).or_default().push(child.id);
        }
    }
    map
}

/// Shift the given children by the parent's delta. A child whose new
/// start would be negative keeps its prior span exactly; the
/// attachment breaks silently rather than erroring.
pub fn propagate(elements: &mut [Element], children: &[ElementId], delta: Frame) {
    if delta == 0 {
        return;
    }
    for id in children {
        if let Some(el) = elements.iter_mut().find(|e| e.id == *id) {
            if el.span.start + delta >= 0 {
                el.span = el.span.shifted(delta);
            }
        }
    }
}
