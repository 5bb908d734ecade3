use std::ops::Range;

use thiserror::Error;

use crate::model::{Attrs, Node, ResolvedPos};
use crate::schema::{
    BULLET_LIST, LIST_ITEM, ORDERED_LIST, PARAGRAPH, Schema, SchemaError, TASK_ITEM, TASK_LIST,
};
use crate::transform::Transaction;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReorderError {
    #[error("no draggable block at position {0}")]
    NoBlock(usize),
    #[error("cannot drop a block inside itself")]
    IntoItself,
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// A block picked up for dragging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSource {
    /// Position directly before the block.
    pub pos: usize,
    pub node: Node,
    /// Kind and attributes of the enclosing list, for list items.
    pub list: Option<(String, Attrs)>,
    /// What the move deletes. Widens to the parent when the block is its
    /// only child, so no empty wrapper is left behind.
    pub remove: Range<usize>,
}

/// A boundary between blocks where a dragged block can land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropTarget {
    pub pos: usize,
    /// Kind of the container the boundary sits in.
    pub container: String,
}

struct Located<'a> {
    before: usize,
    node: &'a Node,
    parent: &'a Node,
    /// Depth of `parent` in the resolved position.
    parent_depth: usize,
}

fn is_list(kind: &str) -> bool {
    matches!(kind, BULLET_LIST | ORDERED_LIST | TASK_LIST)
}

fn is_item(kind: &str) -> bool {
    matches!(kind, LIST_ITEM | TASK_ITEM)
}

/// A draggable block, except the leading paragraph of a list item, which
/// drags the item.
fn eligible(schema: &Schema, node: &Node, parent: &Node, index: usize) -> bool {
    let draggable = schema.entry(node.kind()).is_some_and(|e| e.is_draggable());
    draggable && !(node.kind() == PARAGRAPH && index == 0 && is_item(parent.kind()))
}

/// Finds the block a pointer position belongs to.
///
/// Positions inside a drag-isolating container resolve to the container.
/// Otherwise a block boundary picks the block after it, and any other
/// position picks its innermost eligible ancestor.
fn locate<'a>(rp: &ResolvedPos<'a>, schema: &Schema) -> Option<Located<'a>> {
    let ancestor = |depth: usize| Located {
        before: rp.before(depth),
        node: rp.node(depth),
        parent: rp.node(depth - 1),
        parent_depth: depth - 1,
    };

    let isolating = (1..=rp.depth()).find(|&d| {
        schema
            .entry(rp.node(d).kind())
            .is_some_and(|e| e.is_drag_isolating())
    });
    if let Some(depth) = isolating {
        return Some(ancestor(depth));
    }

    if rp.at_boundary()
        && let Some(next) = rp.node_after()
        && !next.is_inline()
        && eligible(schema, next, rp.parent(), rp.index(rp.depth()))
    {
        return Some(Located {
            before: rp.pos,
            node: next,
            parent: rp.parent(),
            parent_depth: rp.depth(),
        });
    }

    (1..=rp.depth())
        .rev()
        .find(|&d| eligible(schema, rp.node(d), rp.node(d - 1), rp.index(d - 1)))
        .map(ancestor)
}

/// Resolves the block to drag from a pointer position.
pub fn drag_source(doc: &Node, schema: &Schema, pos: usize) -> Option<DragSource> {
    let rp = ResolvedPos::resolve(doc, pos).ok()?;
    let found = locate(&rp, schema)?;
    let end = found.before + found.node.node_size();
    let remove = if found.parent_depth > 0 && found.parent.child_count() == 1 {
        rp.before(found.parent_depth)..rp.after(found.parent_depth)
    } else {
        found.before..end
    };
    let list = is_item(found.node.kind())
        .then(|| (found.parent.kind().to_string(), found.parent.attrs().clone()));
    Some(DragSource {
        pos: found.before,
        node: found.node.clone(),
        list,
        remove,
    })
}

/// Resolves where a block dropped at a pointer position lands: before the
/// block under the pointer when in its first half, after it otherwise.
pub fn drop_target(doc: &Node, schema: &Schema, pos: usize) -> Option<DropTarget> {
    let rp = ResolvedPos::resolve(doc, pos).ok()?;
    let found = locate(&rp, schema)?;
    let size = found.node.node_size();
    let pos = if pos <= found.before + size / 2 {
        found.before
    } else {
        found.before + size
    };
    Some(DropTarget {
        pos,
        container: found.parent.kind().to_string(),
    })
}

/// Builds the transaction moving `source` to `target`.
///
/// List items dropped outside a list are wrapped in a list of their original
/// type; other blocks dropped between list items are wrapped in an item.
pub fn move_block(
    schema: &Schema,
    source: &DragSource,
    target: &DropTarget,
) -> Result<Transaction, ReorderError> {
    let end = source.pos + source.node.node_size();
    if target.pos == source.pos || target.pos == end {
        return Ok(Transaction::new());
    }
    if source.remove.start < target.pos && target.pos < source.remove.end {
        return Err(ReorderError::IntoItself);
    }
    let content = fit(schema, source, &target.container)?;
    log::debug!(
        "moving {} from {} to {}",
        source.node.kind(),
        source.pos,
        target.pos
    );
    Ok(Transaction::new()
        .delete(source.remove.start, source.remove.end)
        .insert(target.pos, vec![content]))
}

fn fit(schema: &Schema, source: &DragSource, container: &str) -> Result<Node, ReorderError> {
    let node = &source.node;
    let into_list = is_list(container);
    if is_item(node.kind()) {
        if into_list {
            return Ok(retype_item(node, container));
        }
        let (kind, attrs) = source
            .list
            .clone()
            .unwrap_or_else(|| (BULLET_LIST.to_string(), Attrs::new()));
        let item = retype_item(node, &kind);
        return Ok(schema.node(&kind, attrs, vec![item])?);
    }
    if into_list {
        let item = if container == TASK_LIST { TASK_ITEM } else { LIST_ITEM };
        return Ok(schema.node(item, Attrs::new(), vec![node.clone()])?);
    }
    Ok(node.clone())
}

/// Task items live in task lists and list items everywhere else.
fn retype_item(item: &Node, list: &str) -> Node {
    match (list == TASK_LIST, item.kind()) {
        (true, LIST_ITEM) => item.with_kind(TASK_ITEM, Attrs::new().with("checked", false)),
        (false, TASK_ITEM) => item.with_kind(LIST_ITEM, Attrs::new()),
        _ => item.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{HORIZONTAL_RULE, Surface};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn schema() -> Schema {
        Surface::Note.schema().unwrap()
    }

    fn para(schema: &Schema, text: &str) -> Node {
        schema.paragraph(vec![Node::text(text, vec![])])
    }

    fn item(schema: &Schema, text: &str) -> Node {
        schema
            .node(LIST_ITEM, Attrs::new(), vec![para(schema, text)])
            .unwrap()
    }

    fn bullets(schema: &Schema, items: Vec<Node>) -> Node {
        schema.node(BULLET_LIST, Attrs::new(), items).unwrap()
    }

    // one: 0..5, two: 5..10, list: 10..22 with items at 11 and 16
    fn sample(schema: &Schema) -> Node {
        schema.doc(vec![
            para(schema, "one"),
            para(schema, "two"),
            bullets(schema, vec![item(schema, "a"), item(schema, "b")]),
        ])
    }

    #[rstest]
    #[case(7, 5, PARAGRAPH)]
    #[case(0, 0, PARAGRAPH)]
    #[case(13, 11, LIST_ITEM)]
    #[case(18, 16, LIST_ITEM)]
    #[case(10, 10, BULLET_LIST)]
    fn drag_source_resolves_nearest_block(
        #[case] pos: usize,
        #[case] expected: usize,
        #[case] kind: &str,
    ) {
        let schema = schema();
        let source = drag_source(&sample(&schema), &schema, pos).unwrap();
        assert_eq!(source.pos, expected);
        assert_eq!(source.node.kind(), kind);
    }

    #[rstest]
    #[case(7, 5)]
    #[case(8, 10)]
    #[case(13, 11)]
    fn drop_target_picks_nearest_boundary(#[case] pos: usize, #[case] expected: usize) {
        let schema = schema();
        let target = drop_target(&sample(&schema), &schema, pos).unwrap();
        assert_eq!(target.pos, expected);
    }

    #[test]
    fn table_contents_resolve_to_the_table() {
        let schema = schema();
        let cell = schema
            .node(crate::schema::TABLE_CELL, Attrs::new(), vec![para(&schema, "x")])
            .unwrap();
        let row = schema.node(crate::schema::TABLE_ROW, Attrs::new(), vec![cell]).unwrap();
        let table = schema.node(crate::schema::TABLE, Attrs::new(), vec![row]).unwrap();
        let doc = schema.doc(vec![para(&schema, "p"), table]);
        // text "x" starts at 3 + 4 = 7
        let source = drag_source(&doc, &schema, 7).unwrap();
        assert_eq!(source.node.kind(), crate::schema::TABLE);
        assert_eq!(source.pos, 3);
    }

    #[test]
    fn horizontal_rule_at_boundary_is_draggable() {
        let schema = schema();
        let rule = schema.node(HORIZONTAL_RULE, Attrs::new(), vec![]).unwrap();
        let doc = schema.doc(vec![para(&schema, "p"), rule]);
        let source = drag_source(&doc, &schema, 3).unwrap();
        assert_eq!(source.node.kind(), HORIZONTAL_RULE);
    }

    #[test]
    fn item_dropped_outside_list_keeps_its_list_type() {
        let schema = schema();
        let doc = sample(&schema);
        let source = drag_source(&doc, &schema, 18).unwrap();
        let target = drop_target(&doc, &schema, 0).unwrap();
        let moved = move_block(&schema, &source, &target)
            .unwrap()
            .apply(&doc)
            .unwrap();
        assert_eq!(
            moved.doc,
            schema.doc(vec![
                bullets(&schema, vec![item(&schema, "b")]),
                para(&schema, "one"),
                para(&schema, "two"),
                bullets(&schema, vec![item(&schema, "a")]),
            ])
        );
    }

    #[test]
    fn block_dropped_between_items_is_wrapped() {
        let schema = schema();
        let doc = sample(&schema);
        let source = drag_source(&doc, &schema, 1).unwrap();
        let target = DropTarget {
            pos: 16,
            container: BULLET_LIST.to_string(),
        };
        let moved = move_block(&schema, &source, &target)
            .unwrap()
            .apply(&doc)
            .unwrap();
        assert_eq!(
            moved.doc,
            schema.doc(vec![
                para(&schema, "two"),
                bullets(
                    &schema,
                    vec![item(&schema, "a"), item(&schema, "one"), item(&schema, "b")]
                ),
            ])
        );
    }

    #[test]
    fn moving_the_only_item_removes_its_list() {
        let schema = schema();
        let doc = schema.doc(vec![
            para(&schema, "x"),
            bullets(&schema, vec![item(&schema, "y")]),
        ]);
        // list at 3, item at 4, text "y" at 6
        let source = drag_source(&doc, &schema, 6).unwrap();
        assert_eq!(source.remove, 3..10);
        let target = drop_target(&doc, &schema, 0).unwrap();
        let moved = move_block(&schema, &source, &target)
            .unwrap()
            .apply(&doc)
            .unwrap();
        assert_eq!(
            moved.doc,
            schema.doc(vec![
                bullets(&schema, vec![item(&schema, "y")]),
                para(&schema, "x"),
            ])
        );
    }

    #[test]
    fn dropping_into_itself_is_rejected() {
        let schema = schema();
        let doc = sample(&schema);
        let source = drag_source(&doc, &schema, 10).unwrap();
        let target = DropTarget {
            pos: 16,
            container: BULLET_LIST.to_string(),
        };
        assert_eq!(
            move_block(&schema, &source, &target).unwrap_err(),
            ReorderError::IntoItself
        );
    }

    #[test]
    fn dropping_in_place_is_a_no_op() {
        let schema = schema();
        let doc = sample(&schema);
        let source = drag_source(&doc, &schema, 7).unwrap();
        let target = drop_target(&doc, &schema, 6).unwrap();
        assert!(move_block(&schema, &source, &target).unwrap().is_empty());
    }
}
