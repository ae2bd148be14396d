//! Snap resolution: finds the nearest "interesting" time within a
//! pixel-derived tolerance. Points are other elements' edges plus the
//! playhead; ties resolve to the first point found, stable by input
//! order.

use crate::{Element, ElementId, Frame, Span};

/// Snap tolerance at the pointer, in pixels. Converted to frames with
/// the current zoom before matching.
pub const SNAP_PIXELS: f32 = 8.0;

/// Tolerance in frames for a zoom of `px_per_frame` pixels per frame.
/// Never below one frame.
pub fn snap_threshold(px_per_frame: f32) -> Frame {
    ((SNAP_PIXELS / px_per_frame).round() as Frame).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapped {
    pub time: Frame,
    pub matched: bool,
}

/// Gather every other element's start and end plus the playhead, in
/// input order.
pub fn collect_snap_points(
    elements: &[Element],
    playhead: Frame,
    exclude: Option<ElementId>,
) -> Vec<Frame> {
    let mut points = Vec::with_capacity(elements.len() * 2 + 1);
    for el in elements {
        if Some(el.id) == exclude {
            continue;
        }
        points.push(el.span.start);
        points.push(el.span.end);
    }
    points.push(playhead);
    points
}

/// Pick the nearest point within tolerance, or echo `time` back
/// unmatched.
pub fn apply_snap(time: Frame, points: &[Frame], px_per_frame: f32) -> Snapped {
    let threshold = snap_threshold(px_per_frame);
    let mut best: Option<(Frame, Frame)> = None; // (point, distance)
    for &point in points {
        let dist = (time - point).abs();
        if dist <= threshold && best.map_or(true, |(_, d)| dist < d) {
            best = Some((point, dist));
        }
    }
    match best {
        Some((point, _)) => Snapped {
            time: point,
            matched: true,
        },
        None => Snapped {
            time,
            matched: false,
        },
    }
}

/// Snap a whole moving span: whichever edge is closer to a point wins,
/// and the other edge is recomputed so the duration is preserved.
pub fn apply_snap_for_drag(
    start: Frame,
    end: Frame,
    points: &[Frame],
    px_per_frame: f32,
) -> (Span, bool) {
    let duration = end - start;
    let snap_start = apply_snap(start, points, px_per_frame);
    let snap_end = apply_snap(end, points, px_per_frame);

    match (snap_start.matched, snap_end.matched) {
        (false, false) => (Span::new(start, end), false),
        (true, false) => (Span::new(snap_start.time, snap_start.time + duration), true),
        (false, true) => (Span::new(snap_end.time - duration, snap_end.time), true),
        (true, true) => {
            let start_dist = (snap_start.time - start).abs();
            let end_dist = (snap_end.time - end).abs();
            if end_dist < start_dist {
                (Span::new(snap_end.time - duration, snap_end.time), true)
            } else {
                (Span::new(snap_start.time, snap_start.time + duration), true)
            }
        }
    }
}
