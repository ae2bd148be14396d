//! Drop target resolution: maps a live pointer position onto a
//! placement decision. A drag either lands on an existing track or
//! opens a gap for a brand-new one; conflicts fall back exactly one
//! level before forcing a new track, so a drag never cascades silently
//! through the whole stack.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    assign, find_free_track, is_free, track_accepts, Element, ElementId, Role, Span, TrackMeta,
};

/// Pointer distance (px) to a track boundary below which the position
/// reads as a gap between tracks rather than the track itself.
pub const GAP_THRESHOLD_PX: f32 = 6.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DropKind {
    /// Place on the existing track at `DropTarget::track`.
    Track,
    /// Insert a new track at `DropTarget::track`, shifting indices >= it.
    Gap,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DropTarget {
    pub track: usize,
    pub kind: DropKind,
}

enum RawTarget {
    Track(usize),
    Gap(usize),
}

/// Classify the raw pointer position against the live track geometry.
/// `track_heights[i]` is the pixel height of track `i`, stacked from
/// y = 0 downward. A gap at `i` sits between tracks `i - 1` and `i`.
fn classify(pointer_y: f32, track_heights: &[f32]) -> RawTarget {
    let mut top = 0.0f32;
    for (i, h) in track_heights.iter().enumerate() {
        let bottom = top + h;
        if pointer_y < bottom {
            if pointer_y - top <= GAP_THRESHOLD_PX {
                return RawTarget::Gap(i);
            }
            if bottom - pointer_y <= GAP_THRESHOLD_PX {
                return RawTarget::Gap(i + 1);
            }
            return RawTarget::Track(i);
        }
        top = bottom;
    }
    RawTarget::Gap(track_heights.len())
}

/// Resolve a pointer position plus candidate span into a placement
/// decision, or `None` when the gesture lands on a locked track and
/// must be refused by the caller.
///
/// With `magnet` set, overlap on the main track does not count as a
/// conflict: the magnet reflow resolves it downstream, so a clip aimed
/// at the main track lands there instead of falling back.
#[allow(clippy::too_many_arguments)]
pub fn resolve_drop_target(
    pointer_y: f32,
    track_heights: &[f32],
    span: Span,
    role: Role,
    exclude: Option<ElementId>,
    elements: &[Element],
    tracks: &[TrackMeta],
    magnet: bool,
) -> Option<DropTarget> {
    let assignment = assign(elements, tracks);
    let track_count = track_heights.len();
    let fits = |track: usize| {
        if !track_accepts(tracks, track, role) {
            return false;
        }
        if magnet && track == crate::MAIN_TRACK && role == Role::Clip {
            return true;
        }
        is_free(span, track, elements, &assignment, exclude)
    };

    let target = match classify(pointer_y, track_heights) {
        RawTarget::Track(raw) => {
            if tracks.get(raw).map_or(false, |t| t.locked) {
                debug!(track = raw, "drop refused: track locked");
                return None;
            }
            // Redirect a role-incompatible landing to the nearest
            // compatible track before looking at occupancy.
            let track = if track_accepts(tracks, raw, role) {
                raw
            } else {
                find_free_track(
                    span,
                    role,
                    elements,
                    &assignment,
                    exclude,
                    raw,
                    track_count,
                    tracks,
                )
            };
            if track >= track_count {
                // Nothing compatible exists yet; the placement is a new
                // track at the top of the stack.
                DropTarget {
                    track,
                    kind: DropKind::Gap,
                }
            } else if fits(track) {
                DropTarget {
                    track,
                    kind: DropKind::Track,
                }
            } else if track + 1 < track_count && fits(track + 1) {
                // One-level fallback: probe exactly the next track up.
                DropTarget {
                    track: track + 1,
                    kind: DropKind::Track,
                }
            } else {
                DropTarget {
                    track: track + 1,
                    kind: DropKind::Gap,
                }
            }
        }
        RawTarget::Gap(gap) => {
            // Collapse the gap into an adjacent track when either side
            // can take the element as-is; only a doubly-blocked gap
            // stays a real "insert new track" decision.
            let mut collapsed = None;
            let mut adjacent = Vec::new();
            if gap > 0 {
                adjacent.push(gap - 1);
            }
            if gap < track_count {
                adjacent.push(gap);
            }
            for t in adjacent {
                if fits(t) {
                    collapsed = Some(t);
                    break;
                }
            }
            match collapsed {
                Some(track) => DropTarget {
                    track,
                    kind: DropKind::Track,
                },
                None => {
                    // A track inserted at index 0 becomes the clip-only
                    // main track; non-clip elements open theirs above it.
                    let gap = if gap == crate::MAIN_TRACK && role != Role::Clip {
                        gap + 1
                    } else {
                        gap
                    };
                    DropTarget {
                        track: gap,
                        kind: DropKind::Gap,
                    }
                }
            }
        }
    };
    Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ElementKind;

    fn clip(start: i64, end: i64, track: usize) -> Element {
        Element::new(
            ElementKind::Video {
                src: "test.mp4".into(),
            },
            Span::new(start, end),
            track,
        )
    }

    const HEIGHTS: [f32; 3] = [40.0, 40.0, 40.0];

    fn resolve(
        pointer_y: f32,
        span: Span,
        role: Role,
        elements: &[Element],
        tracks: &[TrackMeta],
        magnet: bool,
    ) -> Option<DropTarget> {
        resolve_drop_target(pointer_y, &HEIGHTS, span, role, None, elements, tracks, magnet)
    }

    #[test]
    fn mid_track_position_reads_as_track() {
        let target = resolve(60.0, Span::new(0, 10), Role::Clip, &[], &[], false).unwrap();
        assert_eq!(
            target,
            DropTarget {
                track: 1,
                kind: DropKind::Track
            }
        );
    }

    #[test]
    fn boundary_proximity_reads_as_gap_but_collapses_when_free() {
        // y = 41 is within GAP_THRESHOLD_PX of the 40px boundary; both
        // neighbors are empty so the gap collapses into track 0.
        let target = resolve(41.0, Span::new(0, 10), Role::Clip, &[], &[], false).unwrap();
        assert_eq!(target.kind, DropKind::Track);
        assert_eq!(target.track, 0);
    }

    #[test]
    fn gap_survives_when_both_neighbors_occupied() {
        let elements = vec![clip(0, 100, 0), clip(0, 100, 1)];
        let target = resolve(41.0, Span::new(10, 50), Role::Clip, &elements, &[], false).unwrap();
        assert_eq!(
            target,
            DropTarget {
                track: 1,
                kind: DropKind::Gap
            }
        );
    }

    #[test]
    fn conflict_probes_one_level_then_inserts() {
        // Track 0 occupied, track 1 free: fall back one level up.
        let elements = vec![clip(0, 100, 0)];
        let target = resolve(20.0, Span::new(50, 80), Role::Clip, &elements, &[], false).unwrap();
        assert_eq!(
            target,
            DropTarget {
                track: 1,
                kind: DropKind::Track
            }
        );

        // Tracks 0 and 1 both occupied: the fallback stops after one
        // level and opens a new track instead of cascading.
        let elements = vec![clip(0, 100, 0), clip(0, 100, 1)];
        let target = resolve(20.0, Span::new(50, 80), Role::Clip, &elements, &[], false).unwrap();
        assert_eq!(
            target,
            DropTarget {
                track: 1,
                kind: DropKind::Gap
            }
        );
    }

    #[test]
    fn locked_track_yields_no_target() {
        let mut locked = TrackMeta::new("V1");
        locked.locked = true;
        let tracks = vec![TrackMeta::new("Main"), locked];
        let target = resolve(60.0, Span::new(0, 10), Role::Clip, &[], &tracks, false);
        assert!(target.is_none());
    }

    #[test]
    fn role_incompatible_track_redirects_upward() {
        // Audio dropped on the clip-only main track moves to the next
        // compatible track.
        let target = resolve(20.0, Span::new(0, 10), Role::Audio, &[], &[], false).unwrap();
        assert_eq!(target.kind, DropKind::Track);
        assert_eq!(target.track, 1);
    }

    #[test]
    fn below_all_tracks_is_an_append_gap() {
        let elements = vec![clip(0, 100, 0), clip(0, 100, 1), clip(0, 100, 2)];
        let target = resolve(500.0, Span::new(0, 50), Role::Clip, &elements, &[], false).unwrap();
        assert_eq!(
            target,
            DropTarget {
                track: 3,
                kind: DropKind::Gap
            }
        );
    }

    #[test]
    fn top_edge_gap_never_opens_a_main_track_for_non_clips() {
        // y = 2 reads as the gap above track 0. An overlay cannot
        // collapse onto the clip-only main track, and a new track 0
        // would itself become the main track, so the insert moves up.
        let overlay = Element::new(
            ElementKind::Overlay { src: None },
            Span::new(0, 50),
            1,
        );
        let elements = vec![clip(0, 100, 0), overlay];
        let target = resolve(2.0, Span::new(0, 50), Role::Overlay, &elements, &[], false).unwrap();
        assert_eq!(
            target,
            DropTarget {
                track: 1,
                kind: DropKind::Gap
            }
        );
    }

    #[test]
    fn magnet_keeps_clip_on_occupied_main_track() {
        let elements = vec![clip(0, 100, 0)];
        let target = resolve(20.0, Span::new(50, 80), Role::Clip, &elements, &[], true).unwrap();
        assert_eq!(
            target,
            DropTarget {
                track: 0,
                kind: DropKind::Track
            }
        );
    }
}
