//! Compiles editor commands into transactions against the current document.

use super::EditorError;
use crate::model::{Attrs, Mark, Node, ResolvedPos};
use crate::schema::{
    BULLET_LIST, COMMENT, ContentKind, EntryKind, HARD_BREAK, LINK, LIST_ITEM, ORDERED_LIST,
    PARAGRAPH, Schema, SchemaError, TASK_ITEM, TASK_LIST,
};
use crate::transform::{Selection, Transaction, Wrapper};

/// Marks that do not extend to text typed at their edges.
const NON_INCLUSIVE: &[&str] = &[COMMENT, LINK];

/// Content for [`super::Editor::insert_content`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Plain text, inserted with the marks around the cursor.
    Text(String),
    /// Pasted markdown. Falls back to plain text when it cannot be parsed.
    Markdown(String),
    Nodes(Vec<Node>),
}

fn is_list(kind: &str) -> bool {
    matches!(kind, BULLET_LIST | ORDERED_LIST | TASK_LIST)
}

fn item_for(list: &str) -> &'static str {
    if list == TASK_LIST { TASK_ITEM } else { LIST_ITEM }
}

/// Kind and attributes for a node of `name`, with the schema's defaults.
fn wrapper(schema: &Schema, name: &str, attrs: Attrs) -> Result<Wrapper, SchemaError> {
    let node = schema.node(name, attrs, Vec::new())?;
    Ok(Wrapper::new(node.type_name().clone(), node.attrs().clone()))
}

fn textblock_depth(schema: &Schema, rp: &ResolvedPos<'_>) -> Option<usize> {
    rp.find_ancestor(|n| schema.is_textblock(n)).filter(|&d| d > 0)
}

pub(crate) fn toggle_mark(
    doc: &Node,
    schema: &Schema,
    selection: Selection,
    name: &str,
    attrs: Attrs,
) -> Result<Transaction, EditorError> {
    let mark = schema.mark(name, attrs)?;
    let (from, to) = (selection.from(), selection.to());
    if from == to {
        return Ok(Transaction::new());
    }
    if range_has_mark(doc, from, to, mark.kind()) {
        return Ok(Transaction::new().remove_mark(from, to, mark.kind().to_string(), None));
    }
    Ok(Transaction::new().add_mark(from, to, mark))
}

/// Whether every inline node in `from..to` carries a mark of `kind`.
fn range_has_mark(doc: &Node, from: usize, to: usize, kind: &str) -> bool {
    let (mut any, mut all) = (false, true);
    doc.descendants(&mut |node, pos| {
        if pos + node.node_size() <= from || pos >= to {
            return false;
        }
        if node.is_inline() {
            any = true;
            all &= node.marks().iter().any(|m| m.kind() == kind);
        }
        node.is_element()
    });
    any && all
}

pub(crate) fn toggle_block_type(
    doc: &Node,
    schema: &Schema,
    selection: Selection,
    name: &str,
    attrs: Attrs,
) -> Result<Transaction, EditorError> {
    let entry = schema
        .entry(name)
        .ok_or_else(|| SchemaError::UnknownType(name.to_string()))?;
    let target = wrapper(schema, name, attrs)?;
    if is_list(name) {
        return toggle_list(doc, schema, selection, target);
    }
    if entry.is_textblock() {
        return set_textblocks(doc, schema, selection, target);
    }
    if entry.kind() == EntryKind::Block(ContentKind::Blocks) {
        return toggle_wrapper(doc, schema, selection, target);
    }
    Err(EditorError::NotToggleable(name.to_string()))
}

/// Textblocks whose content overlaps the selection, with their positions.
fn textblocks<'a>(doc: &'a Node, schema: &Schema, selection: Selection) -> Vec<(usize, &'a Node)> {
    let (from, to) = (selection.from(), selection.to());
    let mut blocks = Vec::new();
    doc.descendants(&mut |node, pos| {
        let end = pos + node.node_size();
        if !node.is_element() || pos >= to || end <= from {
            return false;
        }
        if schema.is_textblock(node) {
            blocks.push((pos, node));
            return false;
        }
        true
    });
    blocks
}

/// Sets every selected textblock to `target`, or back to paragraphs when
/// they all already are.
fn set_textblocks(
    doc: &Node,
    schema: &Schema,
    selection: Selection,
    target: Wrapper,
) -> Result<Transaction, EditorError> {
    let blocks = textblocks(doc, schema, selection);
    if blocks.is_empty() {
        return Err(EditorError::NoTextblock(selection.from()));
    }
    let toggled_off = blocks
        .iter()
        .all(|(_, n)| n.type_name() == &target.kind && n.attrs() == &target.attrs);
    let target = if toggled_off {
        wrapper(schema, PARAGRAPH, Attrs::new())?
    } else {
        target
    };
    let to_code = schema
        .entry(&target.kind)
        .and_then(|e| e.content())
        .is_some_and(|c| c == ContentKind::Code);

    let mut tr = Transaction::new();
    for (pos, node) in blocks {
        if to_code && schema.content_of(node) != Some(ContentKind::Code) {
            tr = tr.replace(
                pos + 1,
                pos + node.node_size() - 1,
                vec![Node::text(plain_text(node), Vec::new())],
            );
        }
        tr = tr.set_node_type(pos, target.kind.clone(), target.attrs.clone());
    }
    Ok(tr)
}

/// Text of a textblock with hard breaks as newlines and no marks.
fn plain_text(block: &Node) -> String {
    block
        .children()
        .iter()
        .map(|child| match child.as_text() {
            Some(text) => text.to_string(),
            None if child.kind() == HARD_BREAK => "\n".to_string(),
            None => String::new(),
        })
        .collect()
}

/// Positions before the first and after the last selected textblock, when
/// they share a parent; otherwise the block at the selection start alone.
fn block_range(doc: &Node, schema: &Schema, selection: Selection) -> Result<(usize, usize), EditorError> {
    let rf = ResolvedPos::resolve(doc, selection.from())?;
    let rt = ResolvedPos::resolve(doc, selection.to())?;
    let depth = textblock_depth(schema, &rf).ok_or(EditorError::NoTextblock(selection.from()))?;
    let end = match textblock_depth(schema, &rt) {
        Some(d) if d == depth && rt.start(d - 1) == rf.start(depth - 1) => rt.after(d),
        _ => rf.after(depth),
    };
    Ok((rf.before(depth), end))
}

fn toggle_wrapper(
    doc: &Node,
    schema: &Schema,
    selection: Selection,
    target: Wrapper,
) -> Result<Transaction, EditorError> {
    let rp = ResolvedPos::resolve(doc, selection.from())?;
    if let Some(depth) = rp
        .find_ancestor(|n| n.type_name() == &target.kind)
        .filter(|&d| d > 0)
    {
        return Ok(Transaction::new().unwrap_node(rp.before(depth)));
    }
    let (from, to) = block_range(doc, schema, selection)?;
    Ok(Transaction::new().wrap(from, to, target, None))
}

/// Lifts the enclosing list when it already has the target type, converts it
/// when it has another, and wraps the selected blocks otherwise.
fn toggle_list(
    doc: &Node,
    schema: &Schema,
    selection: Selection,
    target: Wrapper,
) -> Result<Transaction, EditorError> {
    let rp = ResolvedPos::resolve(doc, selection.from())?;
    let Some(depth) = rp.find_ancestor(|n| is_list(n.kind())).filter(|&d| d > 0) else {
        let (from, to) = block_range(doc, schema, selection)?;
        let item = wrapper(schema, item_for(&target.kind), Attrs::new())?;
        return Ok(Transaction::new().wrap(from, to, target, Some(item)));
    };

    let list = rp.node(depth);
    let list_pos = rp.before(depth);
    let item_positions = list.children().iter().scan(list_pos + 1, |pos, item| {
        let at = *pos;
        *pos += item.node_size();
        Some((at, item))
    });

    if list.type_name() == &target.kind {
        let mut tr = Transaction::new().unwrap_node(list_pos);
        for (pos, _) in item_positions {
            tr = tr.unwrap_node(pos);
        }
        return Ok(tr);
    }

    let mut attrs = target.attrs;
    if let Some(tight) = list.attrs().get("tight") {
        attrs.set("tight", tight.clone());
    }
    let item = wrapper(schema, item_for(&target.kind), Attrs::new())?;
    let mut tr = Transaction::new().set_node_type(list_pos, target.kind, attrs);
    for (pos, node) in item_positions {
        if node.type_name() != &item.kind {
            tr = tr.set_node_type(pos, item.kind.clone(), item.attrs.clone());
        }
    }
    Ok(tr)
}

/// Marks typed text picks up at `rp`: those of the inline node before it,
/// or after it at the start of a block. Non-inclusive marks only carry over
/// when the node on the other side has them too.
fn inherited_marks(rp: &ResolvedPos<'_>) -> Vec<Mark> {
    let before = rp.node_before().filter(|n| n.is_inline());
    let after = rp.node_after().filter(|n| n.is_inline());
    let (source, other) = match (before, after) {
        (Some(b), a) => (b, a),
        (None, Some(a)) => (a, None),
        (None, None) => return Vec::new(),
    };
    source
        .marks()
        .iter()
        .filter(|m| {
            !NON_INCLUSIVE.contains(&m.kind()) || other.is_some_and(|o| m.is_in_set(o.marks()))
        })
        .cloned()
        .collect()
}

pub(crate) fn insert_text(
    doc: &Node,
    schema: &Schema,
    selection: Selection,
    text: &str,
) -> Result<Transaction, EditorError> {
    let (from, to) = (selection.from(), selection.to());
    let rp = ResolvedPos::resolve(doc, from)?;
    let parent = rp.parent();
    let len = text.chars().count();
    if rp.depth() == 0 || !schema.is_textblock(parent) {
        let paragraph = schema.paragraph(vec![Node::text(text, Vec::new())]);
        return Ok(Transaction::new()
            .replace(from, to, vec![paragraph])
            .set_selection(Selection::cursor(from + 1 + len)));
    }
    let marks = if schema.content_of(parent) == Some(ContentKind::Code) {
        Vec::new()
    } else {
        inherited_marks(&rp)
    };
    Ok(Transaction::new()
        .replace(from, to, vec![Node::text(text, marks)])
        .set_selection(Selection::cursor(from + len)))
}

/// Inserts inline nodes at the selection, or block nodes after the textblock
/// holding it. An empty paragraph is replaced by the blocks.
pub(crate) fn insert_nodes(
    doc: &Node,
    schema: &Schema,
    selection: Selection,
    nodes: Vec<Node>,
) -> Result<Transaction, EditorError> {
    if nodes.is_empty() {
        return Ok(Transaction::new());
    }
    let (from, to) = (selection.from(), selection.to());
    let size: usize = nodes.iter().map(Node::node_size).sum();
    let rp = ResolvedPos::resolve(doc, from)?;
    let depth = textblock_depth(schema, &rp);

    if nodes.iter().all(Node::is_inline) {
        return Ok(match depth {
            Some(_) => Transaction::new()
                .replace(from, to, nodes)
                .set_selection(Selection::cursor(from + size)),
            None => Transaction::new()
                .replace(from, to, vec![schema.paragraph(nodes)])
                .set_selection(Selection::cursor(from + size + 1)),
        });
    }

    let Some(depth) = depth else {
        return Ok(Transaction::new()
            .replace(from, to, nodes)
            .set_selection(Selection::cursor(from + size)));
    };
    let block = rp.node(depth);
    let (before, after) = (rp.before(depth), rp.after(depth));
    if block.kind() == PARAGRAPH && block.content_size() == 0 {
        return Ok(Transaction::new()
            .replace(before, after, nodes)
            .set_selection(Selection::cursor(before + size)));
    }
    let removed = to - from;
    Ok(Transaction::new()
        .delete(from, to)
        .insert(after, nodes)
        .set_selection(Selection::cursor(after - removed + size)))
}

/// Inserts `node` at `pos`, moving block nodes past the enclosing
/// textblock and wrapping inline nodes that land between blocks.
pub(crate) fn insert_at(
    doc: &Node,
    schema: &Schema,
    node: Node,
    pos: usize,
) -> Result<Transaction, EditorError> {
    let rp = ResolvedPos::resolve(doc, pos)?;
    let depth = textblock_depth(schema, &rp);
    Ok(match (node.is_inline(), depth) {
        (true, Some(_)) => Transaction::new().insert(pos, vec![node]),
        (true, None) => Transaction::new().insert(pos, vec![schema.paragraph(vec![node])]),
        (false, Some(depth)) => Transaction::new().insert(rp.after(depth), vec![node]),
        (false, None) => Transaction::new().insert(pos, vec![node]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BLOCKQUOTE, BOLD, CODE_BLOCK, HEADING, Surface};
    use crate::serialize::format_tree;
    use pretty_assertions::assert_eq;

    fn schema() -> Schema {
        Surface::Note.schema().unwrap()
    }

    fn text(t: &str) -> Node {
        Node::text(t, vec![])
    }

    fn apply(doc: &Node, tr: Transaction) -> Node {
        tr.apply(doc).unwrap().doc
    }

    // "one" at 0..5, "two" at 5..10
    fn two_paragraphs(schema: &Schema) -> Node {
        schema.doc(vec![
            schema.paragraph(vec![text("one")]),
            schema.paragraph(vec![text("two")]),
        ])
    }

    #[test]
    fn toggle_mark_adds_then_removes() {
        let schema = schema();
        let doc = two_paragraphs(&schema);
        let selection = Selection::range(1, 4);
        let bold = apply(&doc, toggle_mark(&doc, &schema, selection, BOLD, Attrs::new()).unwrap());
        assert_eq!(bold.child(0).unwrap().child(0).unwrap().marks()[0].kind(), BOLD);

        let plain = apply(&bold, toggle_mark(&bold, &schema, selection, BOLD, Attrs::new()).unwrap());
        assert_eq!(plain, doc);
    }

    #[test]
    fn toggle_mark_on_partly_marked_range_adds() {
        let schema = schema();
        let doc = two_paragraphs(&schema);
        let partly = apply(&doc, toggle_mark(&doc, &schema, Selection::range(1, 2), BOLD, Attrs::new()).unwrap());
        let tr = toggle_mark(&partly, &schema, Selection::range(1, 4), BOLD, Attrs::new()).unwrap();
        assert!(matches!(tr.steps(), [crate::transform::Step::AddMark { .. }]));
    }

    #[test]
    fn toggle_mark_rejects_unknown_marks() {
        let schema = Surface::Markdown.schema().unwrap();
        let doc = two_paragraphs(&schema);
        let err = toggle_mark(&doc, &schema, Selection::range(1, 4), COMMENT, Attrs::new()).unwrap_err();
        assert!(matches!(err, EditorError::Schema(SchemaError::UnknownType(_))));
    }

    #[test]
    fn heading_toggles_back_to_paragraph() {
        let schema = schema();
        let doc = two_paragraphs(&schema);
        let attrs = Attrs::new().with("level", 2);
        let heading = apply(
            &doc,
            toggle_block_type(&doc, &schema, Selection::cursor(2), HEADING, attrs.clone()).unwrap(),
        );
        assert_eq!(heading.child(0).unwrap().kind(), HEADING);
        assert_eq!(heading.child(0).unwrap().attrs().int("level"), Some(2));
        assert_eq!(heading.child(1).unwrap().kind(), PARAGRAPH);

        let back = apply(
            &heading,
            toggle_block_type(&heading, &schema, Selection::cursor(2), HEADING, attrs).unwrap(),
        );
        assert_eq!(back, doc);
    }

    #[test]
    fn code_block_drops_marks_and_keeps_breaks() {
        let schema = schema();
        let bold = schema.mark(BOLD, Attrs::new()).unwrap();
        let doc = schema.doc(vec![schema.paragraph(vec![
            Node::text("a", vec![bold]),
            schema.node(HARD_BREAK, Attrs::new(), vec![]).unwrap(),
            text("b"),
        ])]);
        let code = apply(
            &doc,
            toggle_block_type(&doc, &schema, Selection::cursor(1), CODE_BLOCK, Attrs::new()).unwrap(),
        );
        let block = code.child(0).unwrap();
        assert_eq!(block.kind(), CODE_BLOCK);
        assert_eq!(block.children(), &[text("a\nb")]);
    }

    #[test]
    fn bullet_list_wraps_lifts_and_converts() {
        let schema = schema();
        let doc = two_paragraphs(&schema);
        let listed = apply(
            &doc,
            toggle_block_type(&doc, &schema, Selection::range(2, 7), BULLET_LIST, Attrs::new()).unwrap(),
        );
        assert_eq!(
            format_tree(&listed),
            concat!(
                "doc\n",
                "  bullet_list {tight=false}\n",
                "    list_item\n",
                "      paragraph\n",
                "        \"one\"\n",
                "    list_item\n",
                "      paragraph\n",
                "        \"two\"\n",
            )
        );

        // positions shift by the list and item tokens
        let tasks = apply(
            &listed,
            toggle_block_type(&listed, &schema, Selection::cursor(4), TASK_LIST, Attrs::new()).unwrap(),
        );
        assert_eq!(tasks.child(0).unwrap().kind(), TASK_LIST);
        assert!(tasks.child(0).unwrap().children().iter().all(|i| i.kind() == TASK_ITEM));

        let lifted = apply(
            &tasks,
            toggle_block_type(&tasks, &schema, Selection::cursor(4), TASK_LIST, Attrs::new()).unwrap(),
        );
        assert_eq!(lifted, doc);
    }

    #[test]
    fn blockquote_wraps_and_unwraps() {
        let schema = schema();
        let doc = two_paragraphs(&schema);
        let quoted = apply(
            &doc,
            toggle_block_type(&doc, &schema, Selection::cursor(7), BLOCKQUOTE, Attrs::new()).unwrap(),
        );
        assert_eq!(quoted.child(1).unwrap().kind(), BLOCKQUOTE);
        let back = apply(
            &quoted,
            toggle_block_type(&quoted, &schema, Selection::cursor(8), BLOCKQUOTE, Attrs::new()).unwrap(),
        );
        assert_eq!(back, doc);
    }

    #[test]
    fn typed_text_inherits_marks_except_links() {
        let schema = schema();
        let bold = schema.mark(BOLD, Attrs::new()).unwrap();
        let link = schema.mark(LINK, Attrs::new().with("href", "https://x.test")).unwrap();
        let doc = schema.doc(vec![schema.paragraph(vec![Node::text("ab", vec![link, bold.clone()])])]);
        let tr = insert_text(&doc, &schema, Selection::cursor(3), "c").unwrap();
        let out = tr.apply(&doc).unwrap();
        let para = out.doc.child(0).unwrap();
        assert_eq!(para.child(1), Some(&Node::text("c", vec![bold])));
        assert_eq!(out.selection(), Some(Selection::cursor(4)));
    }

    #[test]
    fn block_nodes_go_after_the_current_block() {
        let schema = schema();
        let doc = two_paragraphs(&schema);
        let quote = schema.node(BLOCKQUOTE, Attrs::new(), vec![schema.paragraph(vec![text("q")])]).unwrap();
        let out = apply(&doc, insert_nodes(&doc, &schema, Selection::cursor(2), vec![quote.clone()]).unwrap());
        assert_eq!(out.child(1), Some(&quote));
    }

    #[test]
    fn block_nodes_replace_an_empty_paragraph() {
        let schema = schema();
        let doc = schema.doc(vec![]);
        let rule = schema.paragraph(vec![text("x")]);
        let out = apply(&doc, insert_nodes(&doc, &schema, Selection::cursor(1), vec![rule.clone()]).unwrap());
        assert_eq!(out.children(), &[rule]);
    }

    #[test]
    fn insert_at_moves_blocks_out_of_text() {
        let schema = schema();
        let doc = two_paragraphs(&schema);
        let quote = schema.node(BLOCKQUOTE, Attrs::new(), vec![schema.paragraph(vec![text("q")])]).unwrap();
        let out = apply(&doc, insert_at(&doc, &schema, quote.clone(), 7).unwrap());
        assert_eq!(out.child(2), Some(&quote));
    }
}
