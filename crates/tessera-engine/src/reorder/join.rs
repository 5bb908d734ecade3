use std::ops::Range;

use crate::model::Node;
use crate::schema::Schema;
use crate::transform::Transaction;

/// Joins adjacent siblings of the same joinable type whose boundary lies in
/// one of `ranges`.
///
/// `ranges` are positions in `doc`, usually the ranges the last transaction
/// touched. Returns `None` when nothing needs joining.
pub fn auto_join(doc: &Node, schema: &Schema, ranges: &[Range<usize>]) -> Option<Transaction> {
    if ranges.is_empty() {
        return None;
    }
    let mut boundaries = Vec::new();
    collect(doc, 0, schema, ranges, &mut boundaries);
    if boundaries.is_empty() {
        return None;
    }
    log::debug!("auto-joining at {boundaries:?}");
    Some(
        boundaries
            .into_iter()
            .fold(Transaction::appended(), Transaction::join),
    )
}

fn touches(ranges: &[Range<usize>], from: usize, to: usize) -> bool {
    ranges.iter().any(|r| r.start <= to && from <= r.end)
}

fn collect(parent: &Node, start: usize, schema: &Schema, ranges: &[Range<usize>], out: &mut Vec<usize>) {
    let mut pos = start;
    let mut prev: Option<&Node> = None;
    for child in parent.children() {
        if let Some(before) = prev
            && touches(ranges, pos, pos)
            && joinable(schema, before, child)
        {
            out.push(pos);
        }
        let end = pos + child.node_size();
        if child.is_element() && touches(ranges, pos, end) {
            collect(child, pos + 1, schema, ranges, out);
        }
        pos = end;
        prev = Some(child);
    }
}

fn joinable(schema: &Schema, a: &Node, b: &Node) -> bool {
    if a.kind() != b.kind() {
        return false;
    }
    let Some(policy) = schema.entry(a.kind()).and_then(|e| e.join_policy()) else {
        return false;
    };
    a.attrs().without(&policy.ignored_attrs) == b.attrs().without(&policy.ignored_attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attrs;
    use crate::schema::{BULLET_LIST, LIST_ITEM, ORDERED_LIST, Surface};
    use pretty_assertions::assert_eq;

    fn schema() -> Schema {
        Surface::Markdown.schema().unwrap()
    }

    fn list(schema: &Schema, kind: &str, texts: &[&str]) -> Node {
        let items = texts
            .iter()
            .map(|t| {
                let para = schema.paragraph(vec![Node::text(*t, vec![])]);
                schema.node(LIST_ITEM, Attrs::new(), vec![para]).unwrap()
            })
            .collect();
        schema.node(kind, Attrs::new(), items).unwrap()
    }

    fn full(doc: &Node) -> Vec<Range<usize>> {
        vec![0..doc.content_size()]
    }

    #[test]
    fn joins_adjacent_lists_once() {
        let schema = schema();
        let doc = schema.doc(vec![
            list(&schema, BULLET_LIST, &["a"]),
            list(&schema, BULLET_LIST, &["b"]),
            list(&schema, BULLET_LIST, &["c"]),
        ]);
        let joined = auto_join(&doc, &schema, &full(&doc))
            .unwrap()
            .apply(&doc)
            .unwrap();
        assert_eq!(
            joined.doc,
            schema.doc(vec![list(&schema, BULLET_LIST, &["a", "b", "c"])])
        );
        assert!(auto_join(&joined.doc, &schema, &full(&joined.doc)).is_none());
    }

    #[test]
    fn only_touched_boundaries_are_inspected() {
        let schema = schema();
        let doc = schema.doc(vec![
            list(&schema, BULLET_LIST, &["a"]),
            list(&schema, BULLET_LIST, &["b"]),
        ]);
        // the boundary sits at 7
        assert!(auto_join(&doc, &schema, &[1..2]).is_none());
        assert!(auto_join(&doc, &schema, &[7..7]).is_some());
    }

    #[test]
    fn different_list_types_stay_apart() {
        let schema = schema();
        let doc = schema.doc(vec![
            list(&schema, BULLET_LIST, &["a"]),
            list(&schema, ORDERED_LIST, &["b"]),
        ]);
        assert!(auto_join(&doc, &schema, &full(&doc)).is_none());
    }

    #[test]
    fn ordered_lists_join_despite_different_start() {
        let schema = schema();
        let second = list(&schema, ORDERED_LIST, &["b"]);
        let second = second.with_attrs(second.attrs().clone().with("order", 5));
        let doc = schema.doc(vec![list(&schema, ORDERED_LIST, &["a"]), second]);
        let joined = auto_join(&doc, &schema, &full(&doc))
            .unwrap()
            .apply(&doc)
            .unwrap();
        assert_eq!(joined.doc.child_count(), 1);
        assert_eq!(joined.doc.children()[0].attrs().int("order"), Some(1));
    }
}
