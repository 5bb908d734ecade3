use thiserror::Error;

use super::Node;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("position {pos} is outside the document content (size {size})")]
pub struct PositionOutOfRange {
    pub pos: usize,
    pub size: usize,
}

#[derive(Debug, Clone, Copy)]
struct Level<'a> {
    node: &'a Node,
    /// Index of the child at or after the position inside `node`.
    index: usize,
    /// Absolute position where `node`'s content starts.
    start: usize,
}

/// A position resolved against a document: the chain of ancestors that
/// contain it and the offset inside the innermost one.
#[derive(Debug, Clone)]
pub struct ResolvedPos<'a> {
    pub pos: usize,
    levels: Vec<Level<'a>>,
    text_offset: usize,
}

impl<'a> ResolvedPos<'a> {
    pub fn resolve(doc: &'a Node, pos: usize) -> Result<Self, PositionOutOfRange> {
        let size = doc.content_size();
        if pos > size {
            return Err(PositionOutOfRange { pos, size });
        }

        let mut levels = Vec::new();
        let mut node = doc;
        let mut start = 0;
        loop {
            let offset = pos - start;
            let (index, child_start) = find_index(node, offset);
            levels.push(Level { node, index, start });
            let rem = offset - child_start;
            if rem == 0 {
                return Ok(Self {
                    pos,
                    levels,
                    text_offset: 0,
                });
            }
            let Some(child) = node.child(index) else {
                return Err(PositionOutOfRange { pos, size });
            };
            if !child.is_element() {
                return Ok(Self {
                    pos,
                    levels,
                    text_offset: rem,
                });
            }
            node = child;
            start += child_start + 1;
        }
    }

    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn parent(&self) -> &'a Node {
        self.levels[self.depth()].node
    }

    pub fn node(&self, depth: usize) -> &'a Node {
        self.levels[depth].node
    }

    pub fn index(&self, depth: usize) -> usize {
        self.levels[depth].index
    }

    /// Absolute position where the content of the ancestor at `depth` starts.
    pub fn start(&self, depth: usize) -> usize {
        self.levels[depth].start
    }

    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content_size()
    }

    /// Position directly before the ancestor at `depth` (depth >= 1).
    pub fn before(&self, depth: usize) -> usize {
        self.start(depth).saturating_sub(1)
    }

    /// Position directly after the ancestor at `depth` (depth >= 1).
    pub fn after(&self, depth: usize) -> usize {
        self.end(depth) + 1
    }

    pub fn parent_offset(&self) -> usize {
        self.pos - self.start(self.depth())
    }

    /// Offset into a text node or leaf when the position falls inside one.
    pub fn text_offset(&self) -> usize {
        self.text_offset
    }

    /// Whether the position sits on a boundary between children.
    pub fn at_boundary(&self) -> bool {
        self.text_offset == 0
    }

    /// Child indices from the root down to the parent of this position.
    pub fn path(&self) -> Vec<usize> {
        self.levels[..self.depth()]
            .iter()
            .map(|l| l.index)
            .collect()
    }

    /// Node directly after the position. Inside text this is the text node
    /// itself.
    pub fn node_after(&self) -> Option<&'a Node> {
        self.parent().child(self.index(self.depth()))
    }

    pub fn node_before(&self) -> Option<&'a Node> {
        let index = self.index(self.depth());
        if self.text_offset > 0 {
            return self.parent().child(index);
        }
        index.checked_sub(1).and_then(|i| self.parent().child(i))
    }

    /// Innermost ancestor depth whose node satisfies `pred`.
    pub fn find_ancestor(&self, pred: impl Fn(&Node) -> bool) -> Option<usize> {
        (0..=self.depth()).rev().find(|&d| pred(self.node(d)))
    }

    pub fn same_parent(&self, other: &ResolvedPos<'_>) -> bool {
        self.depth() == other.depth() && self.start(self.depth()) == other.start(other.depth())
    }
}

/// Returns the index of the child containing or starting at `offset`, and
/// that child's start offset.
fn find_index(node: &Node, offset: usize) -> (usize, usize) {
    let mut pos = 0;
    for (i, child) in node.children().iter().enumerate() {
        let end = pos + child.node_size();
        if offset < end {
            return (i, pos);
        }
        pos = end;
    }
    (node.child_count(), pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attrs;

    fn doc() -> Node {
        let item = |t: &str| {
            Node::element(
                "list_item",
                Attrs::new(),
                vec![Node::element(
                    "paragraph",
                    Attrs::new(),
                    vec![Node::text(t, vec![])],
                )],
            )
        };
        Node::element(
            "doc",
            Attrs::new(),
            vec![
                Node::element("paragraph", Attrs::new(), vec![Node::text("ab", vec![])]),
                Node::element("bullet_list", Attrs::new(), vec![item("cd"), item("ef")]),
            ],
        )
    }

    #[test]
    fn resolves_inside_text() {
        let doc = doc();
        let rp = ResolvedPos::resolve(&doc, 2).unwrap();
        assert_eq!(rp.depth(), 1);
        assert_eq!(rp.parent().kind(), "paragraph");
        assert_eq!(rp.parent_offset(), 1);
        assert_eq!(rp.text_offset(), 1);
    }

    #[test]
    fn resolves_nested_boundaries() {
        let doc = doc();
        // doc: p(0..4) list(4..) item(5..) para(6..) text "cd" at 7..9
        let rp = ResolvedPos::resolve(&doc, 7).unwrap();
        assert_eq!(rp.depth(), 3);
        assert_eq!(rp.parent().kind(), "paragraph");
        assert_eq!(rp.before(2), 5);
        assert_eq!(rp.before(1), 4);
        assert_eq!(rp.path(), vec![1, 0, 0]);
        assert!(rp.at_boundary());
    }

    #[test]
    fn rejects_out_of_range() {
        let doc = doc();
        let size = doc.content_size();
        assert!(ResolvedPos::resolve(&doc, size).is_ok());
        assert_eq!(
            ResolvedPos::resolve(&doc, size + 1).unwrap_err(),
            PositionOutOfRange {
                pos: size + 1,
                size
            }
        );
    }
}
