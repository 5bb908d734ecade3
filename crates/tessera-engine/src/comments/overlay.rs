use std::collections::BTreeMap;
use std::ops::Range;

use thiserror::Error;

use super::anchor::{Anchor, AnchorId, AnchorState};
use crate::decoration::{Decoration, DecorationSet};
use crate::model::{Attrs, Mark, Node, PositionOutOfRange, ResolvedPos};
use crate::schema::{COMMENT, Schema};
use crate::transform::{Applied, Selection, Transaction};

pub const DRAFT_CLASS: &str = "note-comment";
pub const ACTIVE_CLASS: &str = "note-comment-active";
pub const HOVER_CLASS: &str = "note-comment-hover";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommentError {
    #[error("a comment needs a non-empty selection")]
    EmptySelection,
    #[error("there is no draft comment to persist")]
    NoDraft,
    #[error("unknown comment `{0}`")]
    UnknownComment(String),
    #[error("schema has no comment mark")]
    NoCommentMark,
    #[error(transparent)]
    Position(#[from] PositionOutOfRange),
}

/// Messages the overlay understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentAction {
    /// Start annotating a selection. Replaces any unsaved draft.
    StartDraft { from: usize, to: usize },
    CancelDraft,
    /// The backing comment was created server-side.
    PersistDraft { comment_id: String },
    Resolve { comment_id: String },
    Remove { comment_id: String },
    /// Open the popover for a comment, or close it with `None`.
    Activate(Option<String>),
    ClickAt(usize),
    Hover(usize),
    PointerLeave,
}

/// Notifications for the overlay's owner (popover, sidebar).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayEvent {
    /// A comment became the active one. Drafts carry their range.
    Activated {
        id: AnchorId,
        range: Option<Range<usize>>,
    },
    Deactivated,
    Hovered(Option<AnchorId>),
    StateChanged {
        id: AnchorId,
        state: AnchorState,
    },
}

/// The result of handling a [`CommentAction`].
#[derive(Debug, Clone)]
pub struct Handled {
    pub overlay: CommentOverlay,
    /// Document change to dispatch, if the action needs one.
    pub transaction: Option<Transaction>,
    pub events: Vec<OverlayEvent>,
}

/// Comment anchors and their decorations.
///
/// The overlay is a value: [`CommentOverlay::apply`] and
/// [`CommentOverlay::handle`] return the next overlay rather than mutating
/// this one. Active anchors follow the comment marks in the document; a
/// draft has no mark yet and is tracked by remapping alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentOverlay {
    anchors: Vec<Anchor>,
    active: Option<AnchorId>,
    hover: Option<AnchorId>,
    decorations: DecorationSet,
}

impl CommentOverlay {
    /// Builds the overlay for a loaded document, with an active anchor per
    /// comment found in it.
    pub fn new(doc: &Node) -> Self {
        let anchors = comment_ranges(doc)
            .into_iter()
            .map(|(id, range)| Anchor::active(id, range))
            .collect();
        Self {
            anchors,
            ..Self::default()
        }
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn anchor(&self, id: &AnchorId) -> Option<&Anchor> {
        self.anchors.iter().find(|a| a.id() == id)
    }

    pub fn draft(&self) -> Option<&Anchor> {
        self.anchors.iter().find(|a| a.is_draft())
    }

    pub fn active(&self) -> Option<&AnchorId> {
        self.active.as_ref()
    }

    pub fn hovered(&self) -> Option<&AnchorId> {
        self.hover.as_ref()
    }

    pub fn decorations(&self) -> &DecorationSet {
        &self.decorations
    }

    /// Follows a transaction.
    pub fn apply(&self, applied: &Applied) -> (CommentOverlay, Vec<OverlayEvent>) {
        if !applied.doc_changed() && applied.mapping().is_identity() {
            return (self.clone(), Vec::new());
        }
        let marked = comment_ranges(&applied.doc);
        let touched = applied.touched_before();
        let mut events = Vec::new();
        let mut anchors = Vec::with_capacity(self.anchors.len());
        let mut set_changed = false;
        let mut tracked_touched = false;

        for anchor in &self.anchors {
            tracked_touched |= touched.iter().any(|r| anchor.overlaps(r));
            let next = match (anchor.state(), anchor.id()) {
                (AnchorState::Active, AnchorId::Comment(id)) => match marked.get(id) {
                    Some(range) => anchor.with_range(range.clone()),
                    None => anchor.remap(applied).with_state(AnchorState::Removed),
                },
                _ => {
                    let next = anchor.remap(applied);
                    let ambiguous = applied
                        .ambiguities()
                        .iter()
                        .any(|a| anchor.overlaps(&(a.from..a.to)));
                    if ambiguous && !next.state().is_terminal() {
                        log::warn!("dropping comment {} over an ambiguous remote change", anchor.id());
                        next.with_state(AnchorState::Removed)
                    } else {
                        next
                    }
                }
            };
            if next.state().is_terminal() {
                set_changed = true;
                events.push(OverlayEvent::StateChanged {
                    id: next.id().clone(),
                    state: next.state(),
                });
                continue;
            }
            anchors.push(next);
        }

        for (id, range) in marked {
            let known = anchors
                .iter()
                .any(|a| matches!(a.id(), AnchorId::Comment(c) if *c == id));
            if !known {
                set_changed = true;
                let anchor = Anchor::active(id, range);
                events.push(OverlayEvent::StateChanged {
                    id: anchor.id().clone(),
                    state: AnchorState::Active,
                });
                anchors.push(anchor);
            }
        }

        let mut next = CommentOverlay {
            anchors,
            active: self.active.clone(),
            hover: self.hover.clone(),
            decorations: DecorationSet::empty(),
        };
        next.drop_stale_focus(&mut events);
        if set_changed || tracked_touched || applied.is_remote() {
            log::debug!("recomputing comment decorations");
            next.rebuild_decorations();
        } else {
            next.decorations = self.decorations.map(applied.mapping());
        }
        (next, events)
    }

    /// Handles one action against the current document.
    pub fn handle(
        &self,
        doc: &Node,
        schema: &Schema,
        action: CommentAction,
    ) -> Result<Handled, CommentError> {
        let mut next = self.clone();
        let mut events = Vec::new();
        let mut transaction = None;

        match action {
            CommentAction::StartDraft { from, to } => {
                if from >= to {
                    return Err(CommentError::EmptySelection);
                }
                ResolvedPos::resolve(doc, to)?;
                next.discard_draft(&mut events);
                let draft = Anchor::draft(from..to);
                let id = draft.id().clone();
                next.anchors.push(draft);
                next.show(id, Some(from..to), &mut events);
                transaction = Some(Transaction::new().set_selection(Selection::cursor(to)));
            }
            CommentAction::CancelDraft => next.discard_draft(&mut events),
            CommentAction::PersistDraft { comment_id } => {
                let index = next
                    .anchors
                    .iter()
                    .position(Anchor::is_draft)
                    .ok_or(CommentError::NoDraft)?;
                let draft = next.anchors[index].clone();
                let mark = comment_mark(schema, &comment_id)?;
                let range = draft.range();
                transaction = Some(Transaction::new().add_mark(range.start, range.end, mark));
                let persisted = draft.persist(&comment_id);
                events.push(OverlayEvent::StateChanged {
                    id: persisted.id().clone(),
                    state: AnchorState::Active,
                });
                if next.active.as_ref() == Some(draft.id()) {
                    next.active = Some(persisted.id().clone());
                    events.push(OverlayEvent::Activated {
                        id: persisted.id().clone(),
                        range: None,
                    });
                }
                next.anchors[index] = persisted;
            }
            CommentAction::Resolve { comment_id } => {
                transaction = Some(next.finish(doc, schema, &comment_id, AnchorState::Resolved, &mut events)?);
            }
            CommentAction::Remove { comment_id } => {
                transaction = Some(next.finish(doc, schema, &comment_id, AnchorState::Removed, &mut events)?);
            }
            CommentAction::Activate(Some(comment_id)) => {
                let id = AnchorId::comment(&comment_id);
                if next.anchor(&id).is_none() {
                    return Err(CommentError::UnknownComment(comment_id));
                }
                next.show(id, None, &mut events);
            }
            CommentAction::Activate(None) => next.hide(&mut events),
            CommentAction::ClickAt(pos) => match clicked_comment(doc, pos) {
                Some(id) => next.show(AnchorId::Comment(id), None, &mut events),
                None => next.hide(&mut events),
            },
            CommentAction::Hover(pos) => {
                let id = node_at(doc, pos)
                    .and_then(|node| comment_id_in(node.marks()))
                    .map(AnchorId::Comment)
                    .filter(|id| next.active.as_ref() != Some(id));
                next.set_hover(id, &mut events);
            }
            CommentAction::PointerLeave => next.set_hover(None, &mut events),
        }

        next.rebuild_decorations();
        Ok(Handled {
            overlay: next,
            transaction,
            events,
        })
    }

    fn show(&mut self, id: AnchorId, range: Option<Range<usize>>, events: &mut Vec<OverlayEvent>) {
        self.set_hover(None, events);
        self.active = Some(id.clone());
        events.push(OverlayEvent::Activated { id, range });
    }

    /// Closes the active comment; an unsaved draft goes with it.
    fn hide(&mut self, events: &mut Vec<OverlayEvent>) {
        if self.active.take().is_some() {
            self.discard_draft(events);
            events.push(OverlayEvent::Deactivated);
        }
    }

    fn set_hover(&mut self, id: Option<AnchorId>, events: &mut Vec<OverlayEvent>) {
        if self.hover != id {
            self.hover = id.clone();
            events.push(OverlayEvent::Hovered(id));
        }
    }

    fn discard_draft(&mut self, events: &mut Vec<OverlayEvent>) {
        let Some(index) = self.anchors.iter().position(Anchor::is_draft) else {
            return;
        };
        let draft = self.anchors.remove(index);
        events.push(OverlayEvent::StateChanged {
            id: draft.id().clone(),
            state: AnchorState::Removed,
        });
        if self.active.as_ref() == Some(draft.id()) {
            self.active = None;
            events.push(OverlayEvent::Deactivated);
        }
    }

    /// Moves a comment to a terminal state and builds the transaction that
    /// removes its marks.
    fn finish(
        &mut self,
        doc: &Node,
        schema: &Schema,
        comment_id: &str,
        state: AnchorState,
        events: &mut Vec<OverlayEvent>,
    ) -> Result<Transaction, CommentError> {
        let id = AnchorId::comment(comment_id);
        let index = self
            .anchors
            .iter()
            .position(|a| *a.id() == id)
            .ok_or_else(|| CommentError::UnknownComment(comment_id.to_string()))?;
        let mark = comment_mark(schema, comment_id)?;
        self.anchors.remove(index);
        events.push(OverlayEvent::StateChanged {
            id: id.clone(),
            state,
        });
        if self.active.as_ref() == Some(&id) {
            self.active = None;
            events.push(OverlayEvent::Deactivated);
        }
        if self.hover.as_ref() == Some(&id) {
            self.set_hover(None, events);
        }
        Ok(Transaction::new().remove_mark(
            0,
            doc.content_size(),
            COMMENT,
            Some(mark.attrs().clone()),
        ))
    }

    /// Clears active and hover ids whose anchors are gone.
    fn drop_stale_focus(&mut self, events: &mut Vec<OverlayEvent>) {
        if let Some(active) = &self.active
            && self.anchor(active).is_none()
        {
            self.active = None;
            events.push(OverlayEvent::Deactivated);
        }
        if let Some(hover) = &self.hover
            && self.anchor(hover).is_none()
        {
            self.hover = None;
            events.push(OverlayEvent::Hovered(None));
        }
    }

    fn rebuild_decorations(&mut self) {
        let decorations = self
            .anchors
            .iter()
            .filter_map(|anchor| {
                let class = if anchor.is_draft() {
                    DRAFT_CLASS
                } else if self.active.as_ref() == Some(anchor.id()) {
                    ACTIVE_CLASS
                } else if self.hover.as_ref() == Some(anchor.id()) {
                    HOVER_CLASS
                } else {
                    return None;
                };
                let range = anchor.range();
                Some(Decoration::inline(range.start, range.end, class).with_key(anchor.id().to_string()))
            })
            .collect();
        self.decorations = DecorationSet::new(decorations);
    }
}

fn comment_mark(schema: &Schema, comment_id: &str) -> Result<Mark, CommentError> {
    schema
        .mark(COMMENT, Attrs::new().with("comment_id", comment_id))
        .map_err(|_| CommentError::NoCommentMark)
}

fn comment_id_in(marks: &[Mark]) -> Option<String> {
    marks
        .iter()
        .find(|m| m.kind() == COMMENT)
        .and_then(|m| m.attrs().str("comment_id"))
        .map(str::to_string)
}

/// Extent of every comment id's marks.
pub fn comment_ranges(doc: &Node) -> BTreeMap<String, Range<usize>> {
    let mut out: BTreeMap<String, Range<usize>> = BTreeMap::new();
    doc.descendants(&mut |node, pos| {
        let end = pos + node.node_size();
        for mark in node.marks().iter().filter(|m| m.kind() == COMMENT) {
            let Some(id) = mark.attrs().str("comment_id") else {
                continue;
            };
            out.entry(id.to_string())
                .and_modify(|r| {
                    r.start = r.start.min(pos);
                    r.end = r.end.max(end);
                })
                .or_insert(pos..end);
        }
        true
    });
    out
}

/// The node directly after `pos`, or the text node containing it.
fn node_at(doc: &Node, pos: usize) -> Option<&Node> {
    ResolvedPos::resolve(doc, pos).ok()?.node_after()
}

/// Marks in effect at `pos`. Comment marks do not extend past their end, so
/// at a boundary they only count when the nodes on both sides carry them.
fn marks_at(doc: &Node, pos: usize) -> Vec<Mark> {
    let Ok(rp) = ResolvedPos::resolve(doc, pos) else {
        return Vec::new();
    };
    if rp.text_offset() > 0 {
        return rp.node_after().map(|n| n.marks().to_vec()).unwrap_or_default();
    }
    let (main, other) = match (rp.node_before(), rp.node_after()) {
        (Some(before), after) => (before, after),
        (None, Some(after)) => (after, None),
        (None, None) => return Vec::new(),
    };
    main.marks()
        .iter()
        .filter(|m| m.kind() != COMMENT || other.is_some_and(|o| m.is_in_set(o.marks())))
        .cloned()
        .collect()
}

/// Comment under a click. Falls back to a single-character text node at or
/// just before `pos`, since a one-character comment has no inner position.
fn clicked_comment(doc: &Node, pos: usize) -> Option<String> {
    let single = |node: &Node| node.as_text().is_some_and(|t| t.chars().count() == 1);
    let mut marks = marks_at(doc, pos);
    if marks.is_empty() {
        if let Some(node) = node_at(doc, pos).filter(|n| single(n) && !n.marks().is_empty()) {
            marks = node.marks().to_vec();
        } else if pos > 0
            && let Some(node) = node_at(doc, pos - 1).filter(|n| single(n) && !n.marks().is_empty())
        {
            marks = node.marks().to_vec();
        }
    }
    comment_id_in(&marks)
}
