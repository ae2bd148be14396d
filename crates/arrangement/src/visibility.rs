//! Boundary queries for the rendering surface: which elements are
//! visible at a given time, in a stable render order.

use crate::{assign, Element, Frame, TrackMeta};

/// Elements visible at `time`, in render order: ascending derived
/// track index, ties broken by list order. An element is visible iff
/// `time` falls in its half-open span; for transitions the span is the
/// reconciler's rendered span. Elements on hidden tracks are skipped.
pub fn elements_visible_at<'a>(
    elements: &'a [Element],
    tracks: &[TrackMeta],
    time: Frame,
) -> Vec<&'a Element> {
    let assignment = assign(elements, tracks);
    let mut visible: Vec<(usize, usize, &Element)> = elements
        .iter()
        .enumerate()
        .filter(|(_, el)| el.span.contains(time))
        .filter_map(|(list_index, el)| {
            let track = assignment.get(&el.id).copied()?;
            if tracks.get(track).map_or(false, |t| t.hidden) {
                return None;
            }
            Some((track, list_index, el))
        })
        .collect();
    visible.sort_by_key(|(track, list_index, _)| (*track, *list_index));
    visible.into_iter().map(|(_, _, el)| el).collect()
}
