use std::ops::Range;

use super::map::{Bias, MapResult, Mapping};
use super::reconcile::{DEFAULT_MAX_DIFF_CELLS, ReconciliationAmbiguity, reconcile};
use super::step::{Step, StepError, Wrapper};
use crate::model::{AttrValue, Attrs, Mark, Node, TypeName};

/// Where a transaction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Origin {
    /// A local edit.
    #[default]
    Local,
    /// A snapshot received from a collaborator.
    Remote,
    /// A follow-up transaction the engine appended after a local one.
    Appended,
}

/// Cursor or range selection in document positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: usize,
    pub head: usize,
}

impl Selection {
    pub fn cursor(pos: usize) -> Self {
        Self {
            anchor: pos,
            head: pos,
        }
    }

    pub fn range(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    pub fn from(&self) -> usize {
        self.anchor.min(self.head)
    }

    pub fn to(&self) -> usize {
        self.anchor.max(self.head)
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    pub fn map(&self, mapping: &Mapping) -> Selection {
        Selection {
            anchor: mapping.map(self.anchor, Bias::Right),
            head: mapping.map(self.head, Bias::Right),
        }
    }
}

/// An ordered group of steps applied atomically.
///
/// Every step's positions refer to the document the transaction is applied
/// to; they are mapped through the earlier steps while applying.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transaction {
    steps: Vec<Step>,
    origin: Origin,
    snapshot: Option<Node>,
    selection: Option<Selection>,
    diff_budget: Option<usize>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transaction replacing the whole document with a collaborator's
    /// snapshot.
    pub fn remote(snapshot: Node) -> Self {
        Self {
            origin: Origin::Remote,
            snapshot: Some(snapshot),
            ..Self::default()
        }
    }

    pub fn appended() -> Self {
        Self {
            origin: Origin::Appended,
            ..Self::default()
        }
    }

    /// Overrides the diff budget used to reconcile a remote snapshot.
    #[must_use]
    pub fn with_diff_budget(mut self, cells: usize) -> Self {
        self.diff_budget = Some(cells);
        self
    }

    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    #[must_use]
    pub fn insert(self, pos: usize, content: Vec<Node>) -> Self {
        self.step(Step::Insert { pos, content })
    }

    #[must_use]
    pub fn insert_text(self, pos: usize, text: &str, marks: Vec<Mark>) -> Self {
        self.insert(pos, vec![Node::text(text, marks)])
    }

    #[must_use]
    pub fn delete(self, from: usize, to: usize) -> Self {
        self.step(Step::Delete { from, to })
    }

    #[must_use]
    pub fn replace(self, from: usize, to: usize, content: Vec<Node>) -> Self {
        self.step(Step::Replace { from, to, content })
    }

    #[must_use]
    pub fn add_mark(self, from: usize, to: usize, mark: Mark) -> Self {
        self.step(Step::AddMark { from, to, mark })
    }

    #[must_use]
    pub fn remove_mark(
        self,
        from: usize,
        to: usize,
        kind: impl Into<TypeName>,
        attrs: Option<Attrs>,
    ) -> Self {
        self.step(Step::RemoveMark {
            from,
            to,
            kind: kind.into(),
            attrs,
        })
    }

    #[must_use]
    pub fn set_attr(self, pos: usize, key: &str, value: impl Into<AttrValue>) -> Self {
        self.step(Step::SetAttr {
            pos,
            key: key.to_string(),
            value: value.into(),
        })
    }

    #[must_use]
    pub fn set_node_type(self, pos: usize, kind: impl Into<TypeName>, attrs: Attrs) -> Self {
        self.step(Step::SetNodeType {
            pos,
            kind: kind.into(),
            attrs,
        })
    }

    #[must_use]
    pub fn join(self, pos: usize) -> Self {
        self.step(Step::Join { pos })
    }

    #[must_use]
    pub fn wrap(self, from: usize, to: usize, outer: Wrapper, inner: Option<Wrapper>) -> Self {
        self.step(Step::Wrap {
            from,
            to,
            outer,
            inner,
        })
    }

    #[must_use]
    pub fn unwrap_node(self, pos: usize) -> Self {
        self.step(Step::Unwrap { pos })
    }

    /// Selection to install after the transaction, in final coordinates.
    #[must_use]
    pub fn set_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_remote(&self) -> bool {
        self.origin == Origin::Remote
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty() && self.snapshot.is_none()
    }

    /// Applies every step in order. A failing step aborts the whole
    /// transaction and leaves `doc` untouched.
    pub fn apply(&self, doc: &Node) -> Result<Applied, StepError> {
        let mut mapping = Mapping::new();
        let mut ambiguities = Vec::new();
        let mut current = doc.clone();

        if let Some(snapshot) = &self.snapshot {
            let reconciled = reconcile(
                doc,
                snapshot,
                self.diff_budget.unwrap_or(DEFAULT_MAX_DIFF_CELLS),
            );
            mapping.push(reconciled.map);
            ambiguities = reconciled.ambiguities;
            current = snapshot.clone();
        }

        for step in &self.steps {
            let mapped = step.map_through(&mapping);
            let (next, map) = mapped.apply(&current).inspect_err(|e| {
                log::debug!("transaction aborted at {step:?}: {e}");
            })?;
            mapping.push(map);
            current = next;
        }

        let doc_changed = current != *doc;
        Ok(Applied {
            doc: current,
            mapping,
            steps: self.steps.clone(),
            origin: self.origin,
            selection: self.selection,
            ambiguities,
            doc_changed,
        })
    }
}

/// The outcome of applying a [`Transaction`].
#[derive(Debug, Clone)]
pub struct Applied {
    pub doc: Node,
    mapping: Mapping,
    steps: Vec<Step>,
    origin: Origin,
    selection: Option<Selection>,
    ambiguities: Vec<ReconciliationAmbiguity>,
    doc_changed: bool,
}

impl Applied {
    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_remote(&self) -> bool {
        self.origin == Origin::Remote
    }

    pub fn doc_changed(&self) -> bool {
        self.doc_changed
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn ambiguities(&self) -> &[ReconciliationAmbiguity] {
        &self.ambiguities
    }

    /// Follows a position from the starting document to the result, or
    /// `None` if it fell inside removed or replaced content.
    pub fn remap(&self, pos: usize) -> Option<usize> {
        self.mapping.remap(pos)
    }

    pub fn map(&self, pos: usize, bias: Bias) -> MapResult {
        self.mapping.map_result(pos, bias)
    }

    /// Ranges of the starting document the steps touched. For a remote
    /// snapshot this is every range the diff marked as changed.
    pub fn touched_before(&self) -> Vec<Range<usize>> {
        if self.is_remote() {
            return self
                .mapping
                .maps()
                .first()
                .map(|m| {
                    m.ranges()
                        .iter()
                        .map(|r| r.start..r.start + r.old_size)
                        .collect()
                })
                .unwrap_or_default();
        }
        self.steps.iter().map(Step::range).collect()
    }

    /// Ranges of the resulting document the steps touched.
    pub fn touched_after(&self) -> Vec<Range<usize>> {
        self.mapping.touched_ranges()
    }
}
