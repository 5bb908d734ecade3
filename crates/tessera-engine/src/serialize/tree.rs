//! Stable text rendering of a document tree, used by the CLI and by
//! snapshot tests.
//!
//! ```text
//! doc
//!   heading {level=1}
//!     "Title"
//!   paragraph
//!     "plain "
//!     "strong" [bold]
//! ```
//!
//! Null attributes are omitted.

use std::fmt::Write;

use crate::model::{Attrs, Node};

pub fn format_tree(node: &Node) -> String {
    let mut out = String::new();
    write_node(&mut out, node, 0);
    out
}

fn write_node(out: &mut String, node: &Node, depth: usize) {
    let indent = "  ".repeat(depth);
    match node.as_text() {
        Some(text) => {
            let _ = write!(out, "{indent}{text:?}");
        }
        None => {
            let _ = write!(out, "{indent}{}{}", node.kind(), attrs_suffix(node.attrs()));
        }
    }
    for mark in node.marks() {
        let _ = write!(out, " [{}{}]", mark.kind(), attrs_suffix(mark.attrs()));
    }
    out.push('\n');
    for child in node.children() {
        write_node(out, child, depth + 1);
    }
}

fn attrs_suffix(attrs: &Attrs) -> String {
    let shown: Attrs = attrs
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if shown.is_empty() {
        String::new()
    } else {
        format!(" {shown}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Mark;
    use crate::model::MarkSpec;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_nested_nodes_and_marks() {
        let link = Mark::new(
            "link",
            Attrs::new().with("href", "u").with("title", crate::model::AttrValue::Null),
            MarkSpec {
                rank: 0,
                exclusive: true,
            },
        );
        let doc = Node::element(
            "doc",
            Attrs::new(),
            vec![Node::element(
                "heading",
                Attrs::new().with("level", 2),
                vec![Node::text("Hi", vec![link])],
            )],
        );
        assert_eq!(
            format_tree(&doc),
            "doc\n  heading {level=2}\n    \"Hi\" [link {href=\"u\"}]\n"
        );
    }
}
