use std::ops::Range;

use thiserror::Error;

use super::map::{Bias, ChangedRange, Mapping, StepMap};
use crate::model::{
    AttrValue, Attrs, Mark, Node, NodeBody, PositionOutOfRange, ResolvedPos, TypeName,
    cut_children, normalize,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error(transparent)]
    OutOfRange(#[from] PositionOutOfRange),
    #[error("range {from}..{to} does not start and end in the same parent")]
    Unaligned { from: usize, to: usize },
    #[error("no node starts at position {0}")]
    NoNodeAt(usize),
    #[error("nodes around position {0} cannot be joined")]
    CannotJoin(usize),
    #[error("range {from}..{to} contains no whole nodes to wrap")]
    EmptyWrap { from: usize, to: usize },
}

/// Type and attributes of a node a [`Step::Wrap`] creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wrapper {
    pub kind: TypeName,
    pub attrs: Attrs,
}

impl Wrapper {
    pub fn new(kind: impl Into<TypeName>, attrs: Attrs) -> Self {
        Self {
            kind: kind.into(),
            attrs,
        }
    }
}

/// A primitive document change. Positions are in the coordinates of the
/// document the transaction started from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Insert {
        pos: usize,
        content: Vec<Node>,
    },
    Delete {
        from: usize,
        to: usize,
    },
    Replace {
        from: usize,
        to: usize,
        content: Vec<Node>,
    },
    AddMark {
        from: usize,
        to: usize,
        mark: Mark,
    },
    /// Removes marks of `kind`; when `attrs` is given only exact matches go.
    RemoveMark {
        from: usize,
        to: usize,
        kind: TypeName,
        attrs: Option<Attrs>,
    },
    SetAttr {
        pos: usize,
        key: String,
        value: AttrValue,
    },
    SetNodeType {
        pos: usize,
        kind: TypeName,
        attrs: Attrs,
    },
    /// Merges the two sibling containers meeting at `pos`.
    Join {
        pos: usize,
    },
    /// Wraps the whole siblings between `from` and `to` in `outer`, and each
    /// of them in `inner` when given.
    Wrap {
        from: usize,
        to: usize,
        outer: Wrapper,
        inner: Option<Wrapper>,
    },
    /// Replaces the container starting at `pos` with its children.
    Unwrap {
        pos: usize,
    },
}

impl Step {
    /// Range of the starting document this step touches.
    pub fn range(&self) -> Range<usize> {
        match self {
            Step::Insert { pos, .. }
            | Step::SetAttr { pos, .. }
            | Step::SetNodeType { pos, .. }
            | Step::Unwrap { pos } => *pos..*pos,
            Step::Join { pos } => pos.saturating_sub(1)..pos + 1,
            Step::Delete { from, to }
            | Step::Replace { from, to, .. }
            | Step::AddMark { from, to, .. }
            | Step::RemoveMark { from, to, .. }
            | Step::Wrap { from, to, .. } => *from..*to,
        }
    }

    /// Translates the step's positions through the maps of earlier steps.
    pub(crate) fn map_through(&self, mapping: &Mapping) -> Step {
        let start = |p: usize| mapping.map(p, Bias::Right);
        let span = |from: usize, to: usize| {
            let a = mapping.map(from, Bias::Right);
            let b = mapping.map(to, Bias::Left).max(a);
            (a, b)
        };
        match self.clone() {
            Step::Insert { pos, content } => Step::Insert {
                pos: start(pos),
                content,
            },
            Step::Delete { from, to } => {
                let (from, to) = span(from, to);
                Step::Delete { from, to }
            }
            Step::Replace { from, to, content } => {
                let (from, to) = span(from, to);
                Step::Replace { from, to, content }
            }
            Step::AddMark { from, to, mark } => {
                let (from, to) = span(from, to);
                Step::AddMark { from, to, mark }
            }
            Step::RemoveMark {
                from,
                to,
                kind,
                attrs,
            } => {
                let (from, to) = span(from, to);
                Step::RemoveMark {
                    from,
                    to,
                    kind,
                    attrs,
                }
            }
            Step::SetAttr { pos, key, value } => Step::SetAttr {
                pos: start(pos),
                key,
                value,
            },
            Step::SetNodeType { pos, kind, attrs } => Step::SetNodeType {
                pos: start(pos),
                kind,
                attrs,
            },
            Step::Join { pos } => Step::Join { pos: start(pos) },
            Step::Wrap {
                from,
                to,
                outer,
                inner,
            } => {
                let (from, to) = span(from, to);
                Step::Wrap {
                    from,
                    to,
                    outer,
                    inner,
                }
            }
            Step::Unwrap { pos } => Step::Unwrap { pos: start(pos) },
        }
    }

    /// Applies the step, returning the new document and its position map.
    pub fn apply(&self, doc: &Node) -> Result<(Node, StepMap), StepError> {
        match self {
            Step::Insert { pos, content } => replace(doc, *pos, *pos, content),
            Step::Delete { from, to } => replace(doc, *from, *to, &[]),
            Step::Replace { from, to, content } => replace(doc, *from, *to, content),
            Step::AddMark { from, to, mark } => {
                let doc = map_marks(doc, *from, *to, &|marks| mark.add_to_set(marks))?;
                Ok((doc, StepMap::empty()))
            }
            Step::RemoveMark {
                from,
                to,
                kind,
                attrs,
            } => {
                let doc = map_marks(doc, *from, *to, &|marks| {
                    marks
                        .iter()
                        .filter(|m| {
                            m.kind() != kind.as_ref()
                                || attrs.as_ref().is_some_and(|a| a != m.attrs())
                        })
                        .cloned()
                        .collect()
                })?;
                Ok((doc, StepMap::empty()))
            }
            Step::SetAttr { pos, key, value } => {
                let doc = update_node_at(doc, *pos, |node| {
                    let mut attrs = node.attrs().clone();
                    attrs.set(key.clone(), value.clone());
                    Ok(node.with_attrs(attrs))
                })?;
                Ok((doc, StepMap::empty()))
            }
            Step::SetNodeType { pos, kind, attrs } => {
                let doc = update_node_at(doc, *pos, |node| {
                    if !node.is_element() {
                        return Err(StepError::NoNodeAt(*pos));
                    }
                    Ok(node.with_kind(kind.clone(), attrs.clone()))
                })?;
                Ok((doc, StepMap::empty()))
            }
            Step::Join { pos } => join(doc, *pos),
            Step::Wrap {
                from,
                to,
                outer,
                inner,
            } => wrap(doc, *from, *to, outer, inner.as_ref()),
            Step::Unwrap { pos } => unwrap(doc, *pos),
        }
    }
}

/// Rebuilds the ancestors along `path`, replacing the node at its end.
fn update_path(
    node: &Node,
    path: &[usize],
    f: impl FnOnce(&Node) -> Result<Node, StepError>,
) -> Result<Node, StepError> {
    let Some((&index, rest)) = path.split_first() else {
        return f(node);
    };
    let mut children = node.children().to_vec();
    let Some(child) = children.get(index) else {
        return Err(StepError::NoNodeAt(index));
    };
    children[index] = update_path(child, rest, f)?;
    Ok(node.with_children(children))
}

fn replace(
    doc: &Node,
    from: usize,
    to: usize,
    content: &[Node],
) -> Result<(Node, StepMap), StepError> {
    let rf = ResolvedPos::resolve(doc, from)?;
    let rt = ResolvedPos::resolve(doc, to)?;
    if to < from || !rf.same_parent(&rt) {
        return Err(StepError::Unaligned { from, to });
    }
    let a = rf.parent_offset();
    let b = rt.parent_offset();
    let new = update_path(doc, &rf.path(), |parent| {
        let children = parent.children();
        let size = parent.content_size();
        let mut next = cut_children(children, 0, a);
        next.extend(content.iter().cloned());
        next.extend(cut_children(children, b, size));
        Ok(parent.with_children(next))
    })?;
    let inserted: usize = content.iter().map(Node::node_size).sum();
    Ok((new, StepMap::replaced(from, to - from, inserted)))
}

type MarkFn<'a> = dyn Fn(&[Mark]) -> Vec<Mark> + 'a;

fn map_marks(doc: &Node, from: usize, to: usize, f: &MarkFn<'_>) -> Result<Node, StepError> {
    let size = doc.content_size();
    if from > size || to > size {
        return Err(PositionOutOfRange {
            pos: from.max(to),
            size,
        }
        .into());
    }
    Ok(doc.with_children(map_marks_in(doc.children(), 0, from, to, f)))
}

fn map_marks_in(
    children: &[Node],
    start: usize,
    from: usize,
    to: usize,
    f: &MarkFn<'_>,
) -> Vec<Node> {
    let mut out = Vec::with_capacity(children.len());
    let mut pos = start;
    for child in children {
        let end = pos + child.node_size();
        if end <= from || pos >= to {
            out.push(child.clone());
        } else {
            match child.body() {
                NodeBody::Text(text) => {
                    let a = from.saturating_sub(pos);
                    let b = (to - pos).min(end - pos);
                    let chars: Vec<char> = text.chars().collect();
                    let head: String = chars[..a].iter().collect();
                    let mid: String = chars[a..b].iter().collect();
                    let tail: String = chars[b..].iter().collect();
                    out.push(Node::text(head, child.marks().to_vec()));
                    out.push(Node::text(mid, f(child.marks())));
                    out.push(Node::text(tail, child.marks().to_vec()));
                }
                NodeBody::Leaf { inline: true } => out.push(child.with_marks(f(child.marks()))),
                NodeBody::Leaf { inline: false } => out.push(child.clone()),
                NodeBody::Children(inner) => {
                    out.push(child.with_children(map_marks_in(inner, pos + 1, from, to, f)));
                }
            }
        }
        pos = end;
    }
    normalize(out)
}

/// Applies `f` to the node starting exactly at `pos`.
fn update_node_at(
    doc: &Node,
    pos: usize,
    f: impl FnOnce(&Node) -> Result<Node, StepError>,
) -> Result<Node, StepError> {
    let rp = ResolvedPos::resolve(doc, pos)?;
    let index = rp.index(rp.depth());
    match rp.node_after() {
        Some(node) if rp.at_boundary() && !node.is_text() => {
            let mut path = rp.path();
            path.push(index);
            update_path(doc, &path, f)
        }
        _ => Err(StepError::NoNodeAt(pos)),
    }
}

fn join(doc: &Node, pos: usize) -> Result<(Node, StepMap), StepError> {
    let rp = ResolvedPos::resolve(doc, pos)?;
    let (Some(before), Some(after)) = (rp.node_before(), rp.node_after()) else {
        return Err(StepError::CannotJoin(pos));
    };
    if !rp.at_boundary() || !before.is_element() || !after.is_element() {
        return Err(StepError::CannotJoin(pos));
    }
    let index = rp.index(rp.depth());
    let new = update_path(doc, &rp.path(), |parent| {
        let mut children = parent.children().to_vec();
        let mut merged = before.children().to_vec();
        merged.extend(after.children().iter().cloned());
        children.splice(index - 1..=index, [before.with_children(merged)]);
        Ok(parent.with_children(children))
    })?;
    Ok((new, StepMap::replaced(pos - 1, 2, 0)))
}

fn wrap(
    doc: &Node,
    from: usize,
    to: usize,
    outer: &Wrapper,
    inner: Option<&Wrapper>,
) -> Result<(Node, StepMap), StepError> {
    let rf = ResolvedPos::resolve(doc, from)?;
    let rt = ResolvedPos::resolve(doc, to)?;
    if !rf.same_parent(&rt) || !rf.at_boundary() || !rt.at_boundary() {
        return Err(StepError::Unaligned { from, to });
    }
    let depth = rf.depth();
    let (first, last) = (rf.index(depth), rt.index(depth));
    if first >= last {
        return Err(StepError::EmptyWrap { from, to });
    }

    let parent = rf.parent();
    let mut ranges = Vec::new();
    let mut wrapped = Vec::with_capacity(last - first);
    let mut pos = from;
    for (i, child) in parent.children()[first..last].iter().enumerate() {
        match inner {
            Some(w) => {
                // outer+inner open before the first child, inner close+open
                // between siblings
                ranges.push(ChangedRange {
                    start: pos,
                    old_size: 0,
                    new_size: 2,
                });
                wrapped.push(Node::element(
                    w.kind.clone(),
                    w.attrs.clone(),
                    vec![child.clone()],
                ));
            }
            None => {
                if i == 0 {
                    ranges.push(ChangedRange {
                        start: pos,
                        old_size: 0,
                        new_size: 1,
                    });
                }
                wrapped.push(child.clone());
            }
        }
        pos += child.node_size();
    }
    ranges.push(ChangedRange {
        start: to,
        old_size: 0,
        new_size: if inner.is_some() { 2 } else { 1 },
    });

    let new = update_path(doc, &rf.path(), |parent| {
        let mut children = parent.children().to_vec();
        children.splice(
            first..last,
            [Node::element(outer.kind.clone(), outer.attrs.clone(), wrapped)],
        );
        Ok(parent.with_children(children))
    })?;
    Ok((new, StepMap::from_ranges(ranges)))
}

fn unwrap(doc: &Node, pos: usize) -> Result<(Node, StepMap), StepError> {
    let rp = ResolvedPos::resolve(doc, pos)?;
    let index = rp.index(rp.depth());
    let Some(target) = rp.node_after().filter(|n| rp.at_boundary() && n.is_element()) else {
        return Err(StepError::NoNodeAt(pos));
    };
    let size = target.node_size();
    let new = update_path(doc, &rp.path(), |parent| {
        let mut children = parent.children().to_vec();
        children.splice(index..=index, target.children().iter().cloned());
        Ok(parent.with_children(children))
    })?;
    let map = StepMap::from_ranges(vec![
        ChangedRange {
            start: pos,
            old_size: 1,
            new_size: 0,
        },
        ChangedRange {
            start: pos + size - 1,
            old_size: 1,
            new_size: 0,
        },
    ]);
    Ok((new, map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MarkSpec;
    use pretty_assertions::assert_eq;

    fn text(t: &str) -> Node {
        Node::text(t, vec![])
    }

    fn para(t: &str) -> Node {
        Node::element("paragraph", Attrs::new(), vec![text(t)])
    }

    fn doc(children: Vec<Node>) -> Node {
        Node::element("doc", Attrs::new(), children)
    }

    fn bold() -> Mark {
        Mark::new(
            "bold",
            Attrs::new(),
            MarkSpec {
                rank: 1,
                exclusive: true,
            },
        )
    }

    #[test]
    fn insert_text_inside_paragraph() {
        let d = doc(vec![para("helo")]);
        let (out, map) = Step::Insert {
            pos: 4,
            content: vec![text("l")],
        }
        .apply(&d)
        .unwrap();
        assert_eq!(out, doc(vec![para("hello")]));
        assert_eq!(map.map(5, Bias::Right), 6);
    }

    #[test]
    fn delete_across_parents_is_rejected() {
        let d = doc(vec![para("ab"), para("cd")]);
        let err = Step::Delete { from: 2, to: 6 }.apply(&d).unwrap_err();
        assert_eq!(err, StepError::Unaligned { from: 2, to: 6 });
    }

    #[test]
    fn add_and_remove_mark() {
        let d = doc(vec![para("abcd")]);
        let (marked, _) = Step::AddMark {
            from: 2,
            to: 4,
            mark: bold(),
        }
        .apply(&d)
        .unwrap();
        assert_eq!(
            marked.child(0).unwrap().children(),
            &[text("a"), Node::text("bc", vec![bold()]), text("d")]
        );

        let (cleared, _) = Step::RemoveMark {
            from: 1,
            to: 5,
            kind: "bold".into(),
            attrs: None,
        }
        .apply(&marked)
        .unwrap();
        assert_eq!(cleared, d);
    }

    #[test]
    fn join_merges_siblings() {
        let list = |t: &str| {
            Node::element(
                "bullet_list",
                Attrs::new(),
                vec![Node::element("list_item", Attrs::new(), vec![para(t)])],
            )
        };
        let d = doc(vec![list("a"), list("b")]);
        let boundary = d.child(0).unwrap().node_size();
        let (out, map) = Step::Join { pos: boundary }.apply(&d).unwrap();
        assert_eq!(out.child_count(), 1);
        assert_eq!(out.child(0).unwrap().child_count(), 2);
        assert_eq!(map.map(boundary + 2, Bias::Right), boundary);
    }

    #[test]
    fn wrap_then_unwrap_restores_document() {
        let d = doc(vec![para("a"), para("b")]);
        let (wrapped, map) = Step::Wrap {
            from: 0,
            to: 6,
            outer: Wrapper::new("bullet_list", Attrs::new()),
            inner: Some(Wrapper::new("list_item", Attrs::new())),
        }
        .apply(&d)
        .unwrap();
        assert_eq!(wrapped.child(0).unwrap().kind(), "bullet_list");
        assert_eq!(wrapped.child(0).unwrap().child_count(), 2);
        // "b" was at 4, now behind list + two item opens and one item close
        assert_eq!(map.map(4, Bias::Right), 8);

        let (lifted, _) = Step::Unwrap { pos: 0 }.apply(&wrapped).unwrap();
        assert_eq!(lifted.child(0).unwrap().kind(), "list_item");
        let (once, _) = Step::Unwrap { pos: 0 }.apply(&lifted).unwrap();
        let second = once.child(0).unwrap().node_size();
        let (twice, _) = Step::Unwrap { pos: second }.apply(&once).unwrap();
        assert_eq!(twice, d);
    }

    #[test]
    fn set_node_type_keeps_content() {
        let d = doc(vec![para("title")]);
        let (out, map) = Step::SetNodeType {
            pos: 0,
            kind: "heading".into(),
            attrs: Attrs::new().with("level", 1),
        }
        .apply(&d)
        .unwrap();
        assert_eq!(out.child(0).unwrap().kind(), "heading");
        assert_eq!(out.child(0).unwrap().text_content(), "title");
        assert!(map.is_empty());
    }
}
