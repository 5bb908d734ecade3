//! Markdown output through the schema's markdown bindings.
//!
//! Block writers receive the [`MarkdownWriter`] so they can render their
//! children; inline content is written by [`MarkdownWriter::inline`], which
//! keeps the mark delimiters balanced and moves boundary whitespace outside
//! them.

use crate::model::{Mark, Node};
use crate::schema::{
    BULLET_LIST, CODE, HARD_BREAK, MarkdownWrite, ORDERED_LIST, Schema, TASK_LIST,
    heading_level,
};

#[derive(Clone, Copy)]
pub struct MarkdownWriter<'s> {
    schema: &'s Schema,
    /// Write list markers in their alternate form so the list stays separate
    /// from an identical list right before it.
    alternate: bool,
}

impl<'s> MarkdownWriter<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            alternate: false,
        }
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    pub fn alternate(&self) -> bool {
        self.alternate
    }

    /// Writes sibling blocks separated by blank lines.
    pub fn blocks(&self, nodes: &[Node]) -> String {
        self.blocks_joined(nodes, "\n\n")
    }

    fn blocks_joined(&self, nodes: &[Node], separator: &str) -> String {
        let mut parts = Vec::with_capacity(nodes.len());
        let mut previous = None;
        let mut alternate = false;
        for node in nodes {
            let family = list_family(node.kind());
            alternate = family.is_some() && family == previous && !alternate;
            let writer = MarkdownWriter { alternate, ..*self };
            parts.push(writer.block(node));
            previous = family;
        }
        parts.join(separator)
    }

    pub fn block(&self, node: &Node) -> String {
        let write = self
            .schema
            .entry(node.kind())
            .and_then(|e| e.markdown_binding())
            .and_then(|b| b.write);
        match write {
            Some(MarkdownWrite::Block(write)) => write(self, node),
            Some(MarkdownWrite::Inline(write)) => write(node),
            _ if self.schema.is_textblock(node) => self.inline(node),
            _ => self.blocks(node.children()),
        }
    }

    /// Writes the inline children of a textblock.
    pub fn inline(&self, parent: &Node) -> String {
        let mut out = String::new();
        let mut active: Vec<Mark> = Vec::new();
        let mut pending = String::new();
        let mut line_start = true;

        for child in parent.children() {
            let marks: Vec<Mark> = child
                .marks()
                .iter()
                .filter(|m| m.kind() != CODE)
                .cloned()
                .collect();
            let keep = active
                .iter()
                .zip(&marks)
                .take_while(|(a, b)| a == b)
                .count();
            let text = child.as_text();
            if let Some(blank) = text
                && blank.trim().is_empty()
            {
                pending.push_str(blank);
                continue;
            }
            for mark in active.drain(keep..).rev() {
                out.push_str(&self.mark_close(&mark));
            }
            out.push_str(&pending);
            pending.clear();

            match text {
                Some(text) => {
                    let (lead, core, trail) = split_whitespace(text);
                    out.push_str(lead);
                    for mark in &marks[keep..] {
                        out.push_str(&self.mark_open(mark));
                    }
                    active.extend_from_slice(&marks[keep..]);
                    if child.marks().iter().any(|m| m.kind() == CODE) {
                        out.push_str(&code_span(core));
                    } else {
                        out.push_str(&escape_text(core, line_start));
                    }
                    pending.push_str(trail);
                    line_start = core.ends_with('\n');
                }
                None => {
                    for mark in &marks[keep..] {
                        out.push_str(&self.mark_open(mark));
                    }
                    active.extend_from_slice(&marks[keep..]);
                    out.push_str(&self.leaf(child));
                    line_start = child.kind() == HARD_BREAK;
                }
            }
        }
        for mark in active.iter().rev() {
            out.push_str(&self.mark_close(mark));
        }
        out.push_str(&pending);
        out
    }

    fn leaf(&self, node: &Node) -> String {
        match self.write_of(node.kind()) {
            Some(MarkdownWrite::Inline(write)) => write(node),
            _ => String::new(),
        }
    }

    fn mark_open(&self, mark: &Mark) -> String {
        match self.write_of(mark.kind()) {
            Some(MarkdownWrite::Mark { open, .. }) => open(mark),
            _ => String::new(),
        }
    }

    fn mark_close(&self, mark: &Mark) -> String {
        match self.write_of(mark.kind()) {
            Some(MarkdownWrite::Mark { close, .. }) => close(mark),
            _ => String::new(),
        }
    }

    fn write_of(&self, kind: &str) -> Option<MarkdownWrite> {
        self.schema
            .entry(kind)
            .and_then(|e| e.markdown_binding())
            .and_then(|b| b.write)
    }
}

/// Serializes a whole document to markdown.
pub fn to_markdown(schema: &Schema, doc: &Node) -> String {
    MarkdownWriter::new(schema).blocks(doc.children())
}

/// Bullet and task lists share `-`, so they would merge when adjacent.
fn list_family(kind: &str) -> Option<&'static str> {
    match kind {
        BULLET_LIST | TASK_LIST => Some(BULLET_LIST),
        ORDERED_LIST => Some(ORDERED_LIST),
        _ => None,
    }
}

pub fn write_paragraph(w: &MarkdownWriter<'_>, node: &Node) -> String {
    w.inline(node)
}

pub fn write_heading(w: &MarkdownWriter<'_>, node: &Node) -> String {
    let hashes = "#".repeat(heading_level(node.attrs()) as usize);
    let content = w.inline(node);
    if content.is_empty() {
        hashes
    } else {
        format!("{hashes} {content}")
    }
}

pub fn write_blockquote(w: &MarkdownWriter<'_>, node: &Node) -> String {
    let inner = w.blocks(node.children());
    inner
        .split('\n')
        .map(|line| {
            if line.is_empty() {
                ">".to_string()
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn write_bullet_list(w: &MarkdownWriter<'_>, node: &Node) -> String {
    let bullet = if w.alternate() { "*" } else { "-" };
    write_items(w, node, |_, _| (format!("{bullet} "), 2))
}

pub fn write_ordered_list(w: &MarkdownWriter<'_>, node: &Node) -> String {
    let start = node.attrs().int("order").unwrap_or(1).max(0);
    let delimiter = if w.alternate() { ')' } else { '.' };
    write_items(w, node, |i, _| {
        let marker = format!("{}{delimiter} ", start + i as i64);
        let width = marker.len();
        (marker, width)
    })
}

pub fn write_task_list(w: &MarkdownWriter<'_>, node: &Node) -> String {
    let bullet = if w.alternate() { "*" } else { "-" };
    write_items(w, node, |_, item| {
        let check = if item.attrs().bool("checked").unwrap_or(false) {
            'x'
        } else {
            ' '
        };
        (format!("{bullet} [{check}] "), 2)
    })
}

/// Writes list items. `marker` returns the item's marker and the indent its
/// continuation lines need.
fn write_items(
    w: &MarkdownWriter<'_>,
    list: &Node,
    marker: impl Fn(usize, &Node) -> (String, usize),
) -> String {
    let tight = list.attrs().bool("tight").unwrap_or(false);
    let separator = if tight { "\n" } else { "\n\n" };
    list.children()
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let (marker, width) = marker(i, item);
            let body = w.blocks_joined(item.children(), separator);
            indent_item(&marker, width, &body)
        })
        .collect::<Vec<_>>()
        .join(separator)
}

fn indent_item(marker: &str, width: usize, body: &str) -> String {
    let pad = " ".repeat(width);
    let mut out = String::new();
    for (i, line) in body.split('\n').enumerate() {
        if i == 0 {
            out.push_str(marker);
            out.push_str(line);
            if line.is_empty() {
                let trimmed = out.trim_end().len();
                out.truncate(trimmed);
            }
        } else {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(&pad);
                out.push_str(line);
            }
        }
    }
    out
}

pub fn write_code_block(_: &MarkdownWriter<'_>, node: &Node) -> String {
    let text = node.text_content();
    let longest = text
        .lines()
        .map(|line| line.trim_start().chars().take_while(|&c| c == '`').count())
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest.max(2) + 1);
    let language = node.attrs().str("language").unwrap_or_default();
    if text.is_empty() {
        format!("{fence}{language}\n{fence}")
    } else {
        format!("{fence}{language}\n{text}\n{fence}")
    }
}

/// GFM pipe table. The first row becomes the header row; line breaks inside
/// cells are written as `<br>`.
pub fn write_table(w: &MarkdownWriter<'_>, node: &Node) -> String {
    let rows: Vec<Vec<String>> = node
        .children()
        .iter()
        .map(|row| {
            row.children()
                .iter()
                .map(|cell| w.inline(cell).replace("\\\n", "<br>").replace('\n', " "))
                .collect()
        })
        .collect();
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
    let line = |cells: &[String]| {
        let mut out = String::from("|");
        for i in 0..columns {
            let cell = cells.get(i).map(String::as_str).unwrap_or_default();
            out.push_str(&format!(" {cell} |"));
        }
        out
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(line(rows.first().map(Vec::as_slice).unwrap_or_default()));
    lines.push(format!("|{}", " --- |".repeat(columns)));
    for row in rows.iter().skip(1) {
        lines.push(line(row));
    }
    lines.join("\n")
}

pub fn write_image(node: &Node) -> String {
    let attrs = node.attrs();
    let alt = escape_text(attrs.str("alt").unwrap_or_default(), false);
    let src = destination(attrs.str("src").unwrap_or_default());
    match attrs.str("title") {
        Some(title) => format!("![{alt}]({src} \"{}\")", escape_title(title)),
        None => format!("![{alt}]({src})"),
    }
}

pub fn close_link(mark: &Mark) -> String {
    let href = destination(mark.attrs().str("href").unwrap_or_default());
    match mark.attrs().str("title") {
        Some(title) => format!("]({href} \"{}\")", escape_title(title)),
        None => format!("]({href})"),
    }
}

fn destination(url: &str) -> String {
    if url.is_empty() || url.contains([' ', '(', ')', '<', '>']) {
        format!("<{}>", url.replace('<', "%3C").replace('>', "%3E"))
    } else {
        url.to_string()
    }
}

fn escape_title(title: &str) -> String {
    title.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Splits leading and trailing whitespace off `text`.
fn split_whitespace(text: &str) -> (&str, &str, &str) {
    let start = text.len() - text.trim_start().len();
    let end = text.trim_end().len().max(start);
    (&text[..start], &text[start..end], &text[end..])
}

fn code_span(text: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in text.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    let fence = "`".repeat(longest + 1);
    let pad = if text.starts_with('`')
        || text.ends_with('`')
        || (text.starts_with(' ') && text.ends_with(' ') && !text.trim().is_empty())
    {
        " "
    } else {
        ""
    };
    format!("{fence}{pad}{text}{pad}{fence}")
}

/// Escapes characters markdown would interpret. `line_start` says whether
/// `text` begins a line, where block markers also need escaping.
pub(crate) fn escape_text(text: &str, line_start: bool) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut at_start = line_start;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if at_start {
            if matches!(c, '#' | '-' | '+' | '=') {
                out.push('\\');
            } else if c.is_ascii_digit() {
                let digits = chars[i..].iter().take_while(|c| c.is_ascii_digit()).count();
                if matches!(chars.get(i + digits), Some('.' | ')')) {
                    out.extend(&chars[i..i + digits]);
                    out.push('\\');
                    out.push(chars[i + digits]);
                    i += digits + 1;
                    at_start = false;
                    continue;
                }
            }
        }
        if matches!(
            c,
            '\\' | '*' | '_' | '`' | '[' | ']' | '<' | '>' | '~' | '&' | '|'
        ) {
            out.push('\\');
        }
        out.push(c);
        if c == '\n' {
            at_start = true;
        } else if !c.is_whitespace() {
            at_start = false;
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attrs;
    use crate::schema::Surface;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("a*b", false, "a\\*b")]
    #[case("# not a heading", true, "\\# not a heading")]
    #[case("# mid line", false, "# mid line")]
    #[case("1. not a list", true, "1\\. not a list")]
    #[case("2024 was fine", true, "2024 was fine")]
    #[case("a <b> & c", false, "a \\<b\\> \\& c")]
    fn escapes(#[case] text: &str, #[case] line_start: bool, #[case] expected: &str) {
        assert_eq!(escape_text(text, line_start), expected);
    }

    #[rstest]
    #[case("x", "`x`")]
    #[case("a`b", "``a`b``")]
    #[case("`tick", "`` `tick ``")]
    fn code_spans(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(code_span(text), expected);
    }

    #[test]
    fn whitespace_moves_outside_marks() {
        let schema = Surface::Markdown.schema().unwrap();
        let bold = schema.mark("bold", Attrs::new()).unwrap();
        let para = schema.paragraph(vec![
            Node::text("plain", vec![]),
            Node::text(" strong ", vec![bold]),
            Node::text("after", vec![]),
        ]);
        assert_eq!(MarkdownWriter::new(&schema).inline(&para), "plain **strong** after");
    }

    #[test]
    fn adjacent_bullet_lists_alternate_markers() {
        let schema = Surface::Markdown.schema().unwrap();
        let list = |text: &str| {
            schema
                .node(
                    "bullet_list",
                    Attrs::new().with("tight", true),
                    vec![
                        schema
                            .node(
                                "list_item",
                                Attrs::new(),
                                vec![schema.paragraph(vec![Node::text(text, vec![])])],
                            )
                            .unwrap(),
                    ],
                )
                .unwrap()
        };
        let doc = schema.doc(vec![list("a"), list("b")]);
        assert_eq!(to_markdown(&schema, &doc), "- a\n\n* b");
    }

    #[test]
    fn indent_keeps_blank_lines_empty() {
        assert_eq!(indent_item("- ", 2, "a\n\nb"), "- a\n\n  b");
        assert_eq!(indent_item("- ", 2, ""), "-");
    }
}
