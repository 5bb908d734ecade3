use super::{Attrs, Mark, TypeName};

/// What a node holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeBody {
    /// Text content. Sizes are counted in `char`s.
    Text(String),
    /// Atom without content (image, mention, rule, hard break).
    Leaf { inline: bool },
    /// Element with child nodes.
    Children(Vec<Node>),
}

/// An immutable document node.
///
/// Positions follow the usual token model: a text node occupies one position
/// per character, a leaf occupies one position, and an element occupies its
/// content plus one position for each of its open and close tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    kind: TypeName,
    attrs: Attrs,
    body: NodeBody,
    marks: Vec<Mark>,
}

pub const TEXT: &str = "text";

impl Node {
    pub fn text(text: impl Into<String>, marks: Vec<Mark>) -> Node {
        Node {
            kind: TypeName::Borrowed(TEXT),
            attrs: Attrs::new(),
            body: NodeBody::Text(text.into()),
            marks,
        }
    }

    pub fn leaf(kind: impl Into<TypeName>, attrs: Attrs, inline: bool) -> Node {
        Node {
            kind: kind.into(),
            attrs,
            body: NodeBody::Leaf { inline },
            marks: Vec::new(),
        }
    }

    /// Builds an element. Adjacent text with equal marks is merged and empty
    /// text is dropped.
    pub fn element(kind: impl Into<TypeName>, attrs: Attrs, children: Vec<Node>) -> Node {
        Node {
            kind: kind.into(),
            attrs,
            body: NodeBody::Children(normalize(children)),
            marks: Vec::new(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn type_name(&self) -> &TypeName {
        &self.kind
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    pub fn body(&self) -> &NodeBody {
        &self.body
    }

    pub fn is_text(&self) -> bool {
        matches!(self.body, NodeBody::Text(_))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.body, NodeBody::Leaf { .. })
    }

    pub fn is_element(&self) -> bool {
        matches!(self.body, NodeBody::Children(_))
    }

    /// Text and inline atoms.
    pub fn is_inline(&self) -> bool {
        matches!(
            self.body,
            NodeBody::Text(_) | NodeBody::Leaf { inline: true }
        )
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.body {
            NodeBody::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Node] {
        match &self.body {
            NodeBody::Children(c) => c,
            _ => &[],
        }
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.children().get(index)
    }

    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    /// Whether every child is inline (and there is at least one, or none at all).
    pub fn is_textblock(&self) -> bool {
        self.is_element() && self.children().iter().all(Node::is_inline)
    }

    pub fn node_size(&self) -> usize {
        match &self.body {
            NodeBody::Text(t) => t.chars().count(),
            NodeBody::Leaf { .. } => 1,
            NodeBody::Children(c) => c.iter().map(Node::node_size).sum::<usize>() + 2,
        }
    }

    pub fn content_size(&self) -> usize {
        match &self.body {
            NodeBody::Children(c) => c.iter().map(Node::node_size).sum(),
            _ => 0,
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        match &self.body {
            NodeBody::Text(t) => t.clone(),
            NodeBody::Leaf { .. } => String::new(),
            NodeBody::Children(c) => c.iter().map(Node::text_content).collect(),
        }
    }

    #[must_use]
    pub fn with_children(&self, children: Vec<Node>) -> Node {
        Node::element(self.kind.clone(), self.attrs.clone(), children)
    }

    #[must_use]
    pub fn with_attrs(&self, attrs: Attrs) -> Node {
        Node {
            attrs,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_marks(&self, marks: Vec<Mark>) -> Node {
        Node {
            marks,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_kind(&self, kind: impl Into<TypeName>, attrs: Attrs) -> Node {
        Node {
            kind: kind.into(),
            attrs,
            ..self.clone()
        }
    }

    /// Walks descendants in document order. `visit` receives each node and the
    /// position where it starts (relative to this node's content). Returning
    /// `false` skips the node's children.
    pub fn descendants<'a>(&'a self, visit: &mut impl FnMut(&'a Node, usize) -> bool) {
        walk(self.children(), 0, visit);
    }

    /// Content between two positions of this node's content, as a list of
    /// children. Elements that straddle a boundary are cut recursively.
    pub fn slice_content(&self, from: usize, to: usize) -> Vec<Node> {
        cut_children(self.children(), from, to)
    }

    /// Position of child `index` relative to this node's content start.
    pub fn child_offset(&self, index: usize) -> usize {
        self.children()
            .iter()
            .take(index)
            .map(Node::node_size)
            .sum()
    }
}

fn walk<'a>(children: &'a [Node], start: usize, visit: &mut impl FnMut(&'a Node, usize) -> bool) {
    let mut pos = start;
    for child in children {
        if visit(child, pos) && child.is_element() {
            walk(child.children(), pos + 1, visit);
        }
        pos += child.node_size();
    }
}

/// Slices a string by char positions.
pub(crate) fn slice_chars(s: &str, from: usize, to: usize) -> String {
    s.chars().skip(from).take(to.saturating_sub(from)).collect()
}

/// Cuts a run of siblings to the range `from..to` (relative to their start).
pub(crate) fn cut_children(children: &[Node], from: usize, to: usize) -> Vec<Node> {
    let mut out = Vec::new();
    let mut pos = 0;
    for child in children {
        let size = child.node_size();
        let end = pos + size;
        if end > from && pos < to {
            match &child.body {
                NodeBody::Text(t) => {
                    let a = from.saturating_sub(pos);
                    let b = (to - pos).min(size);
                    out.push(Node::text(slice_chars(t, a, b), child.marks.clone()));
                }
                NodeBody::Leaf { .. } => out.push(child.clone()),
                NodeBody::Children(inner) => {
                    if from <= pos && end <= to {
                        out.push(child.clone());
                    } else {
                        let a = from.saturating_sub(pos + 1);
                        let b = (to.saturating_sub(pos + 1)).min(child.content_size());
                        out.push(child.with_children(cut_children(inner, a, b)));
                    }
                }
            }
        }
        pos = end;
    }
    normalize(out)
}

/// Merges adjacent text nodes with identical marks and drops empty text.
pub(crate) fn normalize(children: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(children.len());
    for child in children {
        if let NodeBody::Text(t) = &child.body {
            if t.is_empty() {
                continue;
            }
            if let Some(prev) = out.last_mut()
                && prev.marks == child.marks
                && let NodeBody::Text(prev_text) = &mut prev.body
            {
                prev_text.push_str(t);
                continue;
            }
        }
        out.push(child);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(text: &str) -> Node {
        Node::element("paragraph", Attrs::new(), vec![Node::text(text, vec![])])
    }

    #[test]
    fn sizes_follow_token_model() {
        let doc = Node::element("doc", Attrs::new(), vec![para("héllo"), para("")]);
        assert_eq!(doc.child(0).map(Node::node_size), Some(7));
        assert_eq!(doc.child(1).map(Node::node_size), Some(2));
        assert_eq!(doc.content_size(), 9);
    }

    #[test]
    fn element_merges_adjacent_text() {
        let p = Node::element(
            "paragraph",
            Attrs::new(),
            vec![
                Node::text("a", vec![]),
                Node::text("", vec![]),
                Node::text("b", vec![]),
            ],
        );
        assert_eq!(p.children(), &[Node::text("ab", vec![])]);
    }

    #[test]
    fn slice_cuts_through_elements() {
        let doc = Node::element("doc", Attrs::new(), vec![para("hello"), para("world")]);
        // "llo" from the first paragraph and "wo" from the second
        let slice = doc.slice_content(3, 10);
        assert_eq!(slice, vec![para("llo"), para("wo")]);
    }

    #[test]
    fn descendants_report_positions() {
        let doc = Node::element("doc", Attrs::new(), vec![para("ab"), para("cd")]);
        let mut seen = Vec::new();
        doc.descendants(&mut |node, pos| {
            seen.push((node.kind().to_string(), pos));
            true
        });
        assert_eq!(
            seen,
            vec![
                ("paragraph".to_string(), 0),
                ("text".to_string(), 1),
                ("paragraph".to_string(), 4),
                ("text".to_string(), 5),
            ]
        );
    }
}
