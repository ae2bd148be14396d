//! Drag session state machine: `Idle -> Previewing -> Idle`.
//!
//! A gesture snapshots the committed list once at `begin`, previews
//! against that immutable snapshot on every pointer move, and commits
//! exactly once on gesture end, running the pipeline in its
//! load-bearing order: placement, attachment propagation, main-track
//! magnet, transition reconciliation, normalize.

use std::mem;

use tracing::debug;

use crate::{
    apply_assignment, apply_snap, apply_snap_for_drag, assign, collect_snap_points, compact,
    find_attachments, insert_at, insert_track_at, normalize, propagate, reconcile,
    resolve_drop_target, shift_after, Arrangement, ArrangementError, DropKind, DropTarget, Element,
    ElementId, Frame, Span, TrackMeta, MAIN_TRACK,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DragMode {
    Move,
    TrimStart,
    TrimEnd,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GesturePhase {
    First,
    Move,
    Last,
}

/// One pointer event from the gesture layer.
#[derive(Clone, Copy, Debug)]
pub struct PointerInput {
    pub pointer_x: f32,
    pub pointer_y: f32,
    pub delta_x: f32,
    pub delta_y: f32,
    pub phase: GesturePhase,
}

/// Live view geometry the preview is resolved against.
#[derive(Clone, Debug)]
pub struct TimelineView {
    /// Pixel height per track, stacked from y = 0 downward.
    pub track_heights: Vec<f32>,
    /// Zoom: pixels per frame.
    pub px_per_frame: f32,
    pub playhead: Frame,
    pub snap_enabled: bool,
}

/// Non-committing output of a preview step: where the ghost sits and
/// which drop target is highlighted. `target == None` means the
/// gesture currently has no valid target and would be refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DragPreview {
    pub ghost: Span,
    pub track: usize,
    pub target: Option<DropTarget>,
    pub snapped: bool,
}

/// Immutable snapshot taken at gesture start.
#[derive(Clone, Debug)]
struct DragSnapshot {
    element_id: ElementId,
    mode: DragMode,
    origin_span: Span,
    origin_track: usize,
    elements: Vec<Element>,
    start_x: Option<f32>,
}

#[derive(Clone, Debug)]
enum State {
    Idle,
    Previewing {
        snapshot: DragSnapshot,
        preview: Option<DragPreview>,
    },
}

/// Result of a committed drag: the new element list, plus the index of
/// a freshly opened track when the drop landed in a gap, so the
/// document layer can insert matching track metadata.
#[derive(Clone, Debug)]
pub struct DragOutcome {
    pub elements: Vec<Element>,
    pub inserted_track: Option<usize>,
}

/// At most one session is live at a time; beginning a new gesture
/// force-ends the previous one.
#[derive(Debug, Default)]
pub struct DragSession {
    state: State,
}

impl Default for State {
    fn default() -> Self {
        Self::Idle
    }
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, State::Previewing { .. })
    }

    /// Snapshot the committed list and enter `Previewing`. Fails when
    /// the element is missing or sits on a locked track.
    pub fn begin(
        &mut self,
        arr: &Arrangement,
        element_id: ElementId,
        mode: DragMode,
    ) -> Result<(), ArrangementError> {
        if self.is_active() {
            debug!("force-ending previous drag session");
            self.state = State::Idle;
        }
        let element = arr
            .element(element_id)
            .ok_or(ArrangementError::ElementNotFound(element_id))?;
        let assignment = assign(&arr.elements, &arr.tracks);
        let origin_track = assignment.get(&element_id).copied().unwrap_or(element.track);
        if arr.tracks.get(origin_track).map_or(false, |t| t.locked) {
            return Err(ArrangementError::TrackLocked(origin_track));
        }
        self.state = State::Previewing {
            snapshot: DragSnapshot {
                element_id,
                mode,
                origin_span: element.span,
                origin_track,
                elements: arr.elements.clone(),
                start_x: None,
            },
            preview: None,
        };
        Ok(())
    }

    /// Recompute the preview for the current pointer position. Pure
    /// over (snapshot, input); never touches the committed list, so
    /// calling it repeatedly for the same input is idempotent.
    pub fn update(
        &mut self,
        arr: &Arrangement,
        view: &TimelineView,
        input: PointerInput,
    ) -> Result<DragPreview, ArrangementError> {
        let State::Previewing { snapshot, preview } = &mut self.state else {
            return Err(ArrangementError::NoActiveDrag);
        };
        if matches!(input.phase, GesturePhase::First) || snapshot.start_x.is_none() {
            snapshot.start_x = Some(input.pointer_x);
        }
        let start_x = snapshot.start_x.unwrap_or(input.pointer_x);
        let frame_delta = ((input.pointer_x - start_x) / view.px_per_frame).round() as Frame;

        let element = snapshot
            .elements
            .iter()
            .find(|e| e.id == snapshot.element_id)
            .ok_or(ArrangementError::ElementNotFound(snapshot.element_id))?;
        let role = element.role();
        let origin = snapshot.origin_span;

        let next = match snapshot.mode {
            DragMode::Move => {
                let mut ghost = origin.shifted(frame_delta);
                if ghost.start < 0 {
                    ghost = Span::new(0, origin.duration());
                }
                let mut snapped = false;
                if view.snap_enabled {
                    let points = collect_snap_points(
                        &snapshot.elements,
                        view.playhead,
                        Some(snapshot.element_id),
                    );
                    let (candidate, matched) =
                        apply_snap_for_drag(ghost.start, ghost.end, &points, view.px_per_frame);
                    if candidate.start >= 0 {
                        ghost = candidate;
                        snapped = matched;
                    }
                }
                let target = resolve_drop_target(
                    input.pointer_y,
                    &view.track_heights,
                    ghost,
                    role,
                    Some(snapshot.element_id),
                    &snapshot.elements,
                    &arr.tracks,
                    arr.magnet_enabled,
                );
                DragPreview {
                    ghost,
                    track: target.map_or(snapshot.origin_track, |t| t.track),
                    target,
                    snapped,
                }
            }
            DragMode::TrimStart => {
                let max_start = origin.end - 1;
                let mut start = (origin.start + frame_delta).clamp(0, max_start);
                let mut snapped = false;
                if view.snap_enabled {
                    let points = collect_snap_points(
                        &snapshot.elements,
                        view.playhead,
                        Some(snapshot.element_id),
                    );
                    let result = apply_snap(start, &points, view.px_per_frame);
                    if result.matched && result.time >= 0 && result.time <= max_start {
                        start = result.time;
                        snapped = true;
                    }
                }
                DragPreview {
                    ghost: Span::new(start, origin.end),
                    track: snapshot.origin_track,
                    target: Some(DropTarget {
                        track: snapshot.origin_track,
                        kind: DropKind::Track,
                    }),
                    snapped,
                }
            }
            DragMode::TrimEnd => {
                let min_end = origin.start + 1;
                let mut end = (origin.end + frame_delta).max(min_end);
                let mut snapped = false;
                if view.snap_enabled {
                    let points = collect_snap_points(
                        &snapshot.elements,
                        view.playhead,
                        Some(snapshot.element_id),
                    );
                    let result = apply_snap(end, &points, view.px_per_frame);
                    if result.matched && result.time >= min_end {
                        end = result.time;
                        snapped = true;
                    }
                }
                DragPreview {
                    ghost: Span::new(origin.start, end),
                    track: snapshot.origin_track,
                    target: Some(DropTarget {
                        track: snapshot.origin_track,
                        kind: DropKind::Track,
                    }),
                    snapped,
                }
            }
        };

        *preview = Some(next);
        Ok(next)
    }

    /// Commit the resolved placement, producing a new element list. The
    /// committed input list is never mutated. A session without a
    /// preview (or whose preview found no valid target) commits to the
    /// unchanged list, which is how a refused gesture ends.
    pub fn commit(&mut self, arr: &Arrangement) -> Result<DragOutcome, ArrangementError> {
        let state = mem::take(&mut self.state);
        let State::Previewing { snapshot, preview } = state else {
            return Err(ArrangementError::NoActiveDrag);
        };
        let unchanged = DragOutcome {
            elements: arr.elements.clone(),
            inserted_track: None,
        };
        let Some(preview) = preview else {
            return Ok(unchanged);
        };

        let mut elements = arr.elements.clone();
        let attachments = find_attachments(&elements, &arr.tracks);
        let Some(idx) = elements.iter().position(|e| e.id == snapshot.element_id) else {
            return Err(ArrangementError::ElementNotFound(snapshot.element_id));
        };
        let mut inserted_track = None;

        match snapshot.mode {
            DragMode::Move => {
                let Some(target) = preview.target else {
                    debug!(element = %snapshot.element_id, "drag refused: no valid target");
                    return Ok(unchanged);
                };
                let target_track = match target.kind {
                    DropKind::Track => target.track,
                    DropKind::Gap => {
                        let assignment = assign(&elements, &arr.tracks);
                        let shifted = insert_track_at(target.track, &assignment);
                        apply_assignment(&mut elements, &shifted);
                        inserted_track = Some(target.track);
                        target.track
                    }
                };
                let delta = preview.ghost.start - snapshot.origin_span.start;
                elements[idx].span = preview.ghost;
                elements[idx].track = target_track;
                // For a gap drop the track metadata does not exist yet;
                // `apply_outcome` backfills the ref once it does.
                elements[idx].track_ref = match target.kind {
                    DropKind::Track => arr.tracks.get(target_track).map(|t| t.id),
                    DropKind::Gap => None,
                };

                if let Some(children) = attachments.get(&snapshot.element_id) {
                    propagate(&mut elements, children, delta);
                }

                if arr.magnet_enabled {
                    if target_track == MAIN_TRACK {
                        insert_at(
                            &mut elements,
                            snapshot.element_id,
                            preview.ghost.start,
                            &arr.tracks,
                            &attachments,
                        );
                    } else if snapshot.origin_track == MAIN_TRACK {
                        // The element left the main track; close the
                        // hole it left behind.
                        compact(&mut elements, &arr.tracks, &attachments);
                    }
                }
            }
            DragMode::TrimStart => {
                elements[idx].span = preview.ghost;
                if arr.magnet_enabled && snapshot.origin_track == MAIN_TRACK {
                    compact(&mut elements, &arr.tracks, &attachments);
                }
            }
            DragMode::TrimEnd => {
                if arr.magnet_enabled && snapshot.origin_track == MAIN_TRACK {
                    let delta = preview.ghost.end - snapshot.origin_span.end;
                    shift_after(
                        &mut elements,
                        snapshot.element_id,
                        preview.ghost.end,
                        delta,
                        &arr.tracks,
                        &attachments,
                    );
                } else {
                    elements[idx].span = preview.ghost;
                }
            }
        }

        reconcile(&mut elements, &arr.tracks);
        let norm = normalize(&elements, &arr.tracks);
        apply_assignment(&mut elements, &norm);
        debug!(element = %snapshot.element_id, mode = ?snapshot.mode, "drag committed");
        Ok(DragOutcome {
            elements,
            inserted_track,
        })
    }

    /// Discard preview state, leaving the committed list untouched.
    pub fn cancel(&mut self) {
        self.state = State::Idle;
    }
}

impl Arrangement {
    /// Fold a committed drag back into the document, keeping track
    /// metadata aligned with the element list.
    pub fn apply_outcome(&mut self, outcome: DragOutcome) {
        self.elements = outcome.elements;
        if let Some(index) = outcome.inserted_track {
            let index = index.min(self.tracks.len());
            let meta = TrackMeta::new(format!("Track {}", index + 1));
            let meta_id = meta.id;
            self.tracks.insert(index, meta);
            for el in self.elements.iter_mut() {
                if el.track == index && el.track_ref.is_none() {
                    el.track_ref = Some(meta_id);
                }
            }
        }
        let track_count = self
            .elements
            .iter()
            .map(|e| e.track + 1)
            .max()
            .unwrap_or(1)
            .max(1);
        while self.tracks.len() < track_count {
            let name = format!("Track {}", self.tracks.len() + 1);
            self.tracks.push(TrackMeta::new(name));
        }
    }
}
