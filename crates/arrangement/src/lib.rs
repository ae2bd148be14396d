use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

mod attachments;
pub use attachments::*;
mod drag;
pub use drag::*;
mod drop_target;
pub use drop_target::*;
mod magnet;
pub use magnet::*;
mod placement;
pub use placement::*;
mod snap;
pub use snap::*;
mod transitions;
pub use transitions::*;
mod visibility;
pub use visibility::*;

#[derive(Debug, Error)]
pub enum ArrangementError {
    #[error("invalid operation: {0}")]
    InvalidOp(String),
    #[error("element not found: {0}")]
    ElementNotFound(ElementId),
    #[error("malformed element {0}: {1}")]
    MalformedElement(ElementId, String),
    #[error("track {0} is locked")]
    TrackLocked(usize),
    #[error("no active drag session")]
    NoActiveDrag,
}

pub type Frame = i64; // time in frames, rate-agnostic

/// Index of the main track. Always present, restricted to clip-role
/// elements, and kept gap-free when the magnet is enabled.
pub const MAIN_TRACK: usize = 0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct ElementId(pub Uuid);

impl ElementId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct TrackId(pub Uuid);

impl TrackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half-open `[start, end)` time range in frames.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Span {
    pub start: Frame,
    pub end: Frame,
}

impl Span {
    pub fn new(start: Frame, end: Frame) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Frame {
        self.end - self.start
    }

    pub fn contains(&self, frame: Frame) -> bool {
        frame >= self.start && frame < self.end
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn shifted(&self, delta: Frame) -> Self {
        Self {
            start: self.start + delta,
            end: self.end + delta,
        }
    }
}

/// Role constraining which tracks an element may occupy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Clip,
    Overlay,
    Effect,
    Audio,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStyle {
    Dissolve,
    Wipe,
    Slide,
    Custom(String),
}

impl Default for TransitionStyle {
    fn default() -> Self {
        Self::Dissolve
    }
}

/// Pairing data carried by a transition instead of a free span. The
/// rendered span is derived by the reconciler, never authored directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransitionSpec {
    pub from: ElementId,
    pub to: ElementId,
    pub boundary: Frame,
    pub duration: Frame,
    #[serde(default)]
    pub style: TransitionStyle,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementKind {
    Video { src: String },
    Image { src: String },
    Audio { src: String },
    Text { text: String, color: String },
    Overlay { src: Option<String> },
    Effect { effect_id: String },
    Transition(TransitionSpec),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Element {
    pub id: ElementId,
    #[serde(flatten)]
    pub kind: ElementKind,
    pub span: Span,
    /// Dense non-negative track index. Authoritative placement is the
    /// derived assignment; this is the last committed position.
    #[serde(default)]
    pub track: usize,
    /// Stable track identity surviving index renumbering.
    #[serde(default)]
    pub track_ref: Option<TrackId>,
    /// Explicit role override; falls back to the kind's default.
    #[serde(default)]
    pub role: Option<Role>,
}

impl Element {
    pub fn new(kind: ElementKind, span: Span, track: usize) -> Self {
        Self {
            id: ElementId::new(),
            kind,
            span,
            track,
            track_ref: None,
            role: None,
        }
    }

    pub fn role(&self) -> Role {
        if let Some(role) = self.role {
            return role;
        }
        match &self.kind {
            ElementKind::Video { .. } | ElementKind::Image { .. } | ElementKind::Text { .. } => {
                Role::Clip
            }
            ElementKind::Audio { .. } => Role::Audio,
            ElementKind::Overlay { .. } => Role::Overlay,
            ElementKind::Effect { .. } => Role::Effect,
            ElementKind::Transition(_) => Role::Clip,
        }
    }

    pub fn is_transition(&self) -> bool {
        matches!(self.kind, ElementKind::Transition(_))
    }

    pub fn transition(&self) -> Option<&TransitionSpec> {
        match &self.kind {
            ElementKind::Transition(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn transition_mut(&mut self) -> Option<&mut TransitionSpec> {
        match &mut self.kind {
            ElementKind::Transition(spec) => Some(spec),
            _ => None,
        }
    }

    /// Mutation-boundary check: the engine itself assumes well-formed
    /// input and only `debug_assert`s on violation.
    pub fn validate(&self) -> Result<(), ArrangementError> {
        match &self.kind {
            ElementKind::Transition(spec) => {
                if spec.duration < 1 {
                    return Err(ArrangementError::MalformedElement(
                        self.id,
                        format!("transition duration {} < 1", spec.duration),
                    ));
                }
            }
            _ => {
                if self.span.start >= self.span.end {
                    return Err(ArrangementError::MalformedElement(
                        self.id,
                        format!("span [{}, {}) is empty", self.span.start, self.span.end),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Split a non-transition element at `frame`, returning the tail as a
    /// new element. `None` when the cut falls outside the interior.
    pub fn split_at(&mut self, frame: Frame) -> Option<Element> {
        if self.is_transition() || frame <= self.span.start || frame >= self.span.end {
            return None;
        }
        let mut tail = self.clone();
        tail.id = ElementId::new();
        tail.span.start = frame;
        self.span.end = frame;
        Some(tail)
    }
}

/// Per-track metadata persisted alongside the element list. Keyed by
/// track index in the document; the id survives renumbering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackMeta {
    pub id: TrackId,
    pub name: String,
    /// Role restriction for the whole track. `None` accepts any role
    /// (the main track is clip-only regardless).
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub solo: bool,
}

impl TrackMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            role: None,
            hidden: false,
            locked: false,
            muted: false,
            solo: false,
        }
    }
}

/// The committed document: the element list (sole source of truth) plus
/// per-track metadata. Every derived map is recomputed from `elements`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arrangement {
    pub name: String,
    pub elements: Vec<Element>,
    #[serde(default)]
    pub tracks: Vec<TrackMeta>,
    #[serde(default)]
    pub magnet_enabled: bool,
}

impl Arrangement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elements: Vec::new(),
            tracks: vec![TrackMeta::new("Main")],
            magnet_enabled: false,
        }
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// Admit an element into the document, rejecting malformed input at
    /// the boundary.
    pub fn push_element(&mut self, element: Element) -> Result<ElementId, ArrangementError> {
        element.validate()?;
        let id = element.id;
        self.elements.push(element);
        Ok(id)
    }

    pub fn remove_element(&mut self, id: ElementId) -> Option<Element> {
        let idx = self.elements.iter().position(|e| e.id == id)?;
        Some(self.elements.remove(idx))
    }
}
