use std::fmt;
use std::ops::Range;

use uuid::Uuid;

use crate::transform::{Applied, Bias};

/// Identity of an anchor: an optimistic id while the comment only exists
/// locally, then the persisted comment id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnchorId {
    Draft(Uuid),
    Comment(String),
}

impl AnchorId {
    pub fn new_draft() -> Self {
        AnchorId::Draft(Uuid::new_v4())
    }

    pub fn comment(id: impl Into<String>) -> Self {
        AnchorId::Comment(id.into())
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, AnchorId::Draft(_))
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorId::Draft(id) => write!(f, "draft:{id}"),
            AnchorId::Comment(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorState {
    /// Selection captured locally, nothing persisted yet.
    Draft,
    /// Backed by comment marks in the document.
    Active,
    Resolved,
    Removed,
}

impl AnchorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AnchorState::Resolved | AnchorState::Removed)
    }
}

/// A tracked `[from, to)` range backing a comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    id: AnchorId,
    range: Range<usize>,
    state: AnchorState,
}

impl Anchor {
    pub fn draft(range: Range<usize>) -> Self {
        Self {
            id: AnchorId::new_draft(),
            range,
            state: AnchorState::Draft,
        }
    }

    pub fn active(id: impl Into<String>, range: Range<usize>) -> Self {
        Self {
            id: AnchorId::comment(id),
            range,
            state: AnchorState::Active,
        }
    }

    pub fn id(&self) -> &AnchorId {
        &self.id
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn state(&self) -> AnchorState {
        self.state
    }

    pub fn is_draft(&self) -> bool {
        self.state == AnchorState::Draft
    }

    pub(crate) fn overlaps(&self, range: &Range<usize>) -> bool {
        self.range.start <= range.end && range.start <= self.range.end
    }

    /// Moves to `state`. Terminal states are final.
    #[must_use]
    pub(crate) fn with_state(&self, state: AnchorState) -> Anchor {
        if self.state.is_terminal() {
            return self.clone();
        }
        Anchor {
            state,
            ..self.clone()
        }
    }

    #[must_use]
    pub(crate) fn with_range(&self, range: Range<usize>) -> Anchor {
        Anchor {
            range,
            ..self.clone()
        }
    }

    /// Converts a draft into the persisted comment `id`, keeping its range.
    #[must_use]
    pub(crate) fn persist(&self, id: impl Into<String>) -> Anchor {
        Anchor {
            id: AnchorId::comment(id),
            range: self.range.clone(),
            state: AnchorState::Active,
        }
    }

    /// Follows the range through a transaction.
    ///
    /// `from` sticks right and `to` sticks left, so text typed at either
    /// edge stays outside. An end that fell inside removed content clamps to
    /// the surviving edge; when both ends were removed, or the range
    /// collapses, the anchor is `Removed`.
    #[must_use]
    pub fn remap(&self, applied: &Applied) -> Anchor {
        if self.state.is_terminal() {
            return self.clone();
        }
        let from = applied.map(self.range.start, Bias::Right);
        let to = applied.map(self.range.end, Bias::Left);
        if (from.deleted && to.deleted) || to.pos <= from.pos {
            return Anchor {
                range: from.pos..from.pos,
                ..self.with_state(AnchorState::Removed)
            };
        }
        self.with_range(from.pos..to.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attrs, Node};
    use crate::transform::Transaction;
    use pretty_assertions::assert_eq;

    fn doc() -> Node {
        Node::element(
            "doc",
            Attrs::new(),
            vec![Node::element(
                "paragraph",
                Attrs::new(),
                vec![Node::text("hello brave world", vec![])],
            )],
        )
    }

    // "brave" is 7..12
    fn brave() -> Anchor {
        Anchor::active("c1", 7..12)
    }

    #[test]
    fn insertion_outside_shifts_range() {
        let applied = Transaction::new().insert_text(1, "oh ", vec![]).apply(&doc()).unwrap();
        let anchor = brave().remap(&applied);
        assert_eq!(anchor.range(), 10..15);
        let text = applied.doc.text_content();
        assert_eq!(&text[anchor.range().start - 1..anchor.range().end - 1], "brave");
    }

    #[test]
    fn insertion_at_edges_stays_outside() {
        let applied = Transaction::new()
            .insert_text(7, "<", vec![])
            .insert_text(12, ">", vec![])
            .apply(&doc())
            .unwrap();
        assert_eq!(brave().remap(&applied).range(), 8..13);
    }

    #[test]
    fn insertion_inside_grows_range() {
        let applied = Transaction::new().insert_text(9, "xyz", vec![]).apply(&doc()).unwrap();
        assert_eq!(brave().remap(&applied).range(), 7..15);
    }

    #[test]
    fn deleting_the_range_removes_the_anchor() {
        let applied = Transaction::new().delete(7, 12).apply(&doc()).unwrap();
        assert_eq!(brave().remap(&applied).state(), AnchorState::Removed);
    }

    #[test]
    fn partial_deletion_clamps() {
        let applied = Transaction::new().delete(4, 9).apply(&doc()).unwrap();
        let anchor = brave().remap(&applied);
        assert_eq!(anchor.state(), AnchorState::Active);
        assert_eq!(anchor.range(), 4..7);
    }

    #[test]
    fn terminal_states_are_final() {
        let removed = brave().with_state(AnchorState::Removed);
        assert_eq!(removed.with_state(AnchorState::Active).state(), AnchorState::Removed);
    }
}
