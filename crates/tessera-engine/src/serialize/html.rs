//! Persisted HTML output through the schema's node views.

use crate::model::{Mark, Node};
use crate::schema::{HtmlParts, Schema};

/// Renders `doc` as persisted content, prefixed by the schema version
/// comment that [`crate::parsing::HtmlParser`] checks.
pub fn to_html(schema: &Schema, doc: &Node) -> String {
    let body = doc
        .children()
        .iter()
        .map(|node| node_html(schema, node))
        .collect::<Vec<_>>()
        .join("\n");
    format!("<!-- schema-version: {} -->\n{body}", schema.version())
}

fn view(schema: &Schema, kind: &str, attrs: &crate::model::Attrs) -> HtmlParts {
    schema
        .entry(kind)
        .and_then(|e| e.node_view())
        .map(|view| view(attrs))
        .unwrap_or_default()
}

fn node_html(schema: &Schema, node: &Node) -> String {
    if let Some(text) = node.as_text() {
        return html_escape::encode_text(text).into_owned();
    }
    let parts = view(schema, node.kind(), node.attrs());
    if node.is_leaf() {
        return parts.open;
    }
    let inner = if schema.is_textblock(node) {
        inline_html(schema, node.children())
    } else {
        node.children()
            .iter()
            .map(|child| node_html(schema, child))
            .collect()
    };
    format!("{}{inner}{}", parts.open, parts.close)
}

fn inline_html(schema: &Schema, children: &[Node]) -> String {
    let mut out = String::new();
    let mut active: Vec<&Mark> = Vec::new();
    for child in children {
        let keep = active
            .iter()
            .zip(child.marks())
            .take_while(|(a, b)| **a == *b)
            .count();
        for mark in active.drain(keep..).rev() {
            out.push_str(&view(schema, mark.kind(), mark.attrs()).close);
        }
        for mark in &child.marks()[keep..] {
            out.push_str(&view(schema, mark.kind(), mark.attrs()).open);
            active.push(mark);
        }
        out.push_str(&node_html(schema, child));
    }
    for mark in active.iter().rev() {
        out.push_str(&view(schema, mark.kind(), mark.attrs()).close);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attrs;
    use crate::schema::Surface;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_marks_and_version() {
        let schema = Surface::Note.schema().unwrap();
        let bold = schema.mark("bold", Attrs::new()).unwrap();
        let doc = schema.doc(vec![schema.paragraph(vec![
            Node::text("a < b ", vec![]),
            Node::text("bold", vec![bold]),
        ])]);
        assert_eq!(
            to_html(&schema, &doc),
            "<!-- schema-version: 1 -->\n<p>a &lt; b <strong>bold</strong></p>"
        );
    }

    #[test]
    fn code_block_language_class() {
        let schema = Surface::Note.schema().unwrap();
        let block = schema
            .node(
                "code_block",
                Attrs::new().with("language", "rust"),
                vec![Node::text("x < 1", vec![])],
            )
            .unwrap();
        let doc = schema.doc(vec![block]);
        assert_eq!(
            to_html(&schema, &doc),
            "<!-- schema-version: 1 -->\n<pre><code class=\"language-rust\">x &lt; 1</code></pre>"
        );
    }
}
