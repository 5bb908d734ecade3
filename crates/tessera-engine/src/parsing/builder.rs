//! Stack-based document builder shared by the markdown and HTML importers.
//!
//! Frames are open containers. Inline content arriving in a block container
//! opens an implicit paragraph; HTML-opened frames and marks are closed
//! implicitly when their containing block ends.

use super::html::{HtmlPiece, HtmlTag, TagKind};
use crate::model::{Attrs, Mark, Node};
use crate::schema::{
    CODE_BLOCK, ContentKind, EntryKind, HARD_BREAK, PARAGRAPH, Schema, SchemaEntry,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Origin {
    Root,
    Markdown(&'static str),
    Html(String),
    Implicit,
}

#[derive(Debug)]
struct Frame<'s> {
    entry: &'s SchemaEntry,
    attrs: Attrs,
    children: Vec<Node>,
    origin: Origin,
    /// Collapse and trim whitespace in this frame's text.
    collapse: bool,
    /// Source text to fall back to if the node fails validation.
    raw: Option<String>,
}

impl Frame<'_> {
    fn content(&self) -> ContentKind {
        self.entry.content().unwrap_or(ContentKind::Blocks)
    }
}

#[derive(Debug)]
struct ActiveMark {
    mark: Mark,
    origin: Origin,
    /// Stack height when the mark opened.
    depth: usize,
}

/// Swallows the content of an atom written with an open and close tag, such
/// as `<span data-type="mention">@Ann</span>`.
#[derive(Debug)]
struct Capture {
    tag: String,
    nested: usize,
    depth: usize,
    /// Source taken in so far. Becomes literal text if the close tag never
    /// arrives.
    swallowed: String,
}

pub(crate) struct TreeBuilder<'s> {
    schema: &'s Schema,
    stack: Vec<Frame<'s>>,
    marks: Vec<ActiveMark>,
    capture: Option<Capture>,
}

impl<'s> TreeBuilder<'s> {
    pub(crate) fn new(schema: &'s Schema, root: &'s SchemaEntry) -> Self {
        Self {
            schema,
            stack: vec![Frame {
                entry: root,
                attrs: Attrs::new(),
                children: Vec::new(),
                origin: Origin::Root,
                collapse: false,
                raw: None,
            }],
            marks: Vec::new(),
            capture: None,
        }
    }

    pub(crate) fn schema(&self) -> &'s Schema {
        self.schema
    }

    pub(crate) fn capturing(&self) -> bool {
        self.capture.is_some()
    }

    fn top(&self) -> &Frame<'s> {
        &self.stack[self.stack.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Frame<'s> {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn in_textblock(&self) -> bool {
        self.top().content() != ContentKind::Blocks
    }

    /// Pops frames that were opened implicitly or from HTML until the top
    /// accepts blocks. Returns `false` if a markdown textblock is in the way.
    fn leave_textblock(&mut self) -> bool {
        while self.in_textblock() {
            match self.top().origin {
                Origin::Implicit | Origin::Html(_) => self.close_top(),
                _ => return false,
            }
        }
        true
    }

    pub(crate) fn open_markdown_block(
        &mut self,
        entry: &'s SchemaEntry,
        token: &'static str,
        raw: Option<String>,
    ) {
        if !self.leave_textblock() {
            log::debug!("block `{}` inside a textblock; ignored", entry.name());
            return;
        }
        self.push_frame(entry, Attrs::new(), Origin::Markdown(token), false, raw);
    }

    fn push_frame(
        &mut self,
        entry: &'s SchemaEntry,
        attrs: Attrs,
        origin: Origin,
        collapse: bool,
        raw: Option<String>,
    ) {
        self.stack.push(Frame {
            entry,
            attrs,
            children: Vec::new(),
            origin,
            collapse,
            raw,
        });
    }

    /// Sets attributes of the innermost open markdown frame for `token`.
    pub(crate) fn set_markdown_attrs(&mut self, token: &'static str, attrs: Attrs) {
        if let Some(frame) = self
            .stack
            .iter_mut()
            .rev()
            .find(|f| f.origin == Origin::Markdown(token))
        {
            frame.attrs = attrs;
        }
    }

    /// Closes frames down to and including the innermost markdown frame for
    /// `token`. Frames HTML opened inside it are closed implicitly.
    pub(crate) fn close_markdown_block(&mut self, token: &'static str) {
        let Some(index) = self
            .stack
            .iter()
            .rposition(|f| f.origin == Origin::Markdown(token))
        else {
            return;
        };
        while self.stack.len() > index {
            self.close_top();
        }
    }

    pub(crate) fn open_mark(&mut self, mark: Mark, token: &'static str) {
        self.marks.push(ActiveMark {
            mark,
            origin: Origin::Markdown(token),
            depth: self.stack.len(),
        });
    }

    pub(crate) fn close_mark(&mut self, token: &'static str) {
        if let Some(i) = self
            .marks
            .iter()
            .rposition(|m| m.origin == Origin::Markdown(token))
        {
            self.marks.remove(i);
        }
    }

    fn current_marks(&self) -> Vec<Mark> {
        if self.top().content() == ContentKind::Code {
            return Vec::new();
        }
        self.marks
            .iter()
            .fold(Vec::new(), |set, active| active.mark.add_to_set(&set))
    }

    fn ensure_inline_parent(&mut self, collapse: bool) {
        if !self.in_textblock()
            && let Some(paragraph) = self.schema.entry(PARAGRAPH)
        {
            self.push_frame(paragraph, Attrs::new(), Origin::Implicit, collapse, None);
        }
    }

    /// Adds text with the active marks. With `collapse`, whitespace runs
    /// become single spaces and whitespace-only text between blocks is dropped.
    pub(crate) fn add_text(&mut self, text: &str, collapse: bool) {
        if text.is_empty() {
            return;
        }
        if let Some(capture) = &mut self.capture {
            capture.swallowed.push_str(text);
            return;
        }
        let collapse = collapse && self.top().content() != ContentKind::Code;
        let mut text = if collapse {
            collapse_whitespace(text)
        } else {
            text.to_string()
        };
        if collapse {
            if !self.in_textblock() && text.trim().is_empty() {
                return;
            }
            let fresh = !self.in_textblock()
                || self
                    .top()
                    .children
                    .last()
                    .is_none_or(|n| {
                        n.kind() == HARD_BREAK || n.as_text().is_some_and(|t| t.ends_with(' '))
                    });
            if fresh {
                text = text.trim_start().to_string();
            }
            if text.is_empty() {
                return;
            }
        }
        self.ensure_inline_parent(collapse);
        let marks = self.current_marks();
        self.top_mut().children.push(Node::text(text, marks));
    }

    /// Adds an inline atom, validating its attributes. Invalid atoms fall
    /// back to `fallback` as literal text.
    pub(crate) fn add_inline_leaf(&mut self, entry: &SchemaEntry, attrs: Attrs, fallback: &str) -> bool {
        if let Some(capture) = &mut self.capture {
            capture.swallowed.push_str(fallback);
            return false;
        }
        let node = match self.build_leaf(entry, attrs) {
            Some(node) => node,
            None => {
                self.add_text(fallback, false);
                return false;
            }
        };
        self.ensure_inline_parent(false);
        if self.top().content() == ContentKind::Code {
            if entry.name() == HARD_BREAK {
                self.top_mut().children.push(Node::text("\n", Vec::new()));
            }
            return true;
        }
        let marks = self.current_marks();
        self.top_mut().children.push(node.with_marks(marks));
        true
    }

    pub(crate) fn hard_break(&mut self) {
        if let Some(entry) = self.schema.entry(HARD_BREAK) {
            self.add_inline_leaf(entry, Attrs::new(), "\n");
        } else {
            self.add_text("\n", false);
        }
    }

    fn build_leaf(&self, entry: &SchemaEntry, attrs: Attrs) -> Option<Node> {
        let node = self.schema.node(entry.name(), attrs, Vec::new()).ok()?;
        match self.schema.validate(entry, node.attrs()) {
            Ok(()) => Some(node),
            Err(e) => {
                log::warn!("{e}; keeping the source text instead");
                None
            }
        }
    }

    /// Adds a block that arrives complete (rule, code block).
    pub(crate) fn add_block(&mut self, node: Node) {
        if !self.leave_textblock() {
            log::debug!("block `{}` inside a textblock; ignored", node.kind());
            return;
        }
        self.top_mut().children.push(node);
    }

    /// Adds source text that no schema entry claims.
    pub(crate) fn add_raw(&mut self, raw: &str) {
        let raw = raw.trim_end_matches('\n');
        if raw.is_empty() {
            return;
        }
        if self.in_textblock() {
            self.add_text(raw, false);
            return;
        }
        let has_break = self.schema.has(HARD_BREAK);
        for (i, line) in raw.split('\n').enumerate() {
            if i > 0 {
                if has_break {
                    self.hard_break();
                } else {
                    self.add_text("\n", false);
                }
            }
            self.add_text(line, false);
        }
        if self.top().origin == Origin::Implicit {
            self.close_top();
        }
    }

    /// Ends an atom whose close tag never came, keeping what it swallowed
    /// as literal text.
    fn release_capture(&mut self) {
        let Some(capture) = self.capture.take() else {
            return;
        };
        if !capture.swallowed.is_empty() {
            log::debug!("unclosed `<{}>` atom; keeping its content as text", capture.tag);
            self.add_text(&capture.swallowed, false);
        }
    }

    fn close_top(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        if self.capture.as_ref().is_some_and(|c| c.depth >= self.stack.len()) {
            self.release_capture();
        }
        let Some(mut frame) = self.stack.pop() else {
            return;
        };
        let height = self.stack.len();
        self.marks.retain(|m| m.depth <= height);

        if frame.collapse
            && let Some(last) = frame.children.last_mut()
            && let Some(text) = last.as_text()
        {
            let trimmed = text.trim_end().to_string();
            *last = Node::text(trimmed, last.marks().to_vec());
        }

        if frame.origin == Origin::Implicit
            && frame
                .children
                .iter()
                .all(|n| n.as_text().is_some_and(|t| t.trim().is_empty()))
        {
            return;
        }

        match self.schema.validate(frame.entry, &frame.attrs) {
            Ok(()) => {
                let node = match self.schema.node(frame.entry.name(), frame.attrs, frame.children) {
                    Ok(node) => node,
                    Err(e) => {
                        log::warn!("{e}");
                        return;
                    }
                };
                self.top_mut().children.push(node);
            }
            Err(e) => {
                log::warn!("{e}; keeping the source text instead");
                match frame.raw.take() {
                    Some(raw) => self.add_raw(&raw),
                    None => {
                        for child in frame.children {
                            if child.is_inline() {
                                self.ensure_inline_parent(false);
                            } else {
                                self.leave_textblock();
                            }
                            self.top_mut().children.push(child);
                        }
                    }
                }
            }
        }
    }

    /// Marks a point to close HTML-opened frames back to.
    pub(crate) fn begin_scope(&self) -> usize {
        self.stack.len()
    }

    pub(crate) fn end_scope(&mut self, floor: usize) {
        while self.stack.len() > floor.max(1) {
            self.close_top();
        }
        self.marks
            .retain(|m| !(matches!(m.origin, Origin::Html(_)) && m.depth >= floor));
        self.release_capture();
    }

    /// Processes one lexed HTML piece against the schema's DOM rules.
    pub(crate) fn html_piece(&mut self, piece: HtmlPiece, collapse: bool) {
        match piece {
            HtmlPiece::Comment(_) => {}
            HtmlPiece::Text(text) => self.add_text(&text, collapse),
            HtmlPiece::Tag(tag) => match tag.kind {
                TagKind::Open if tag.is_void() => self.html_atom(tag, collapse),
                TagKind::Open => self.html_open(tag, collapse),
                TagKind::SelfClosing => self.html_atom(tag, collapse),
                TagKind::Close => self.html_close(tag, collapse),
            },
        }
    }

    fn html_open(&mut self, tag: HtmlTag, collapse: bool) {
        if let Some(capture) = &mut self.capture {
            if capture.tag == tag.name {
                capture.nested += 1;
            }
            capture.swallowed.push_str(&tag.raw);
            return;
        }
        if self.top().content() == ContentKind::Code && tag.name == "code" {
            // <pre><code class="language-x">
            let language = tag
                .attr("class")
                .and_then(|c| c.split_whitespace().find_map(|c| c.strip_prefix("language-")))
                .map(str::to_string);
            if let Some(language) = language
                && self.top().attrs.str("language").is_none()
            {
                self.top_mut().attrs.set("language", language);
            }
            return;
        }
        let Some((entry, rule)) = self.schema.dom_match(&tag) else {
            self.add_text(&tag.raw, false);
            return;
        };
        let attrs = rule.get_attrs.map(|f| f(&tag)).unwrap_or_default();
        if entry.markdown_binding().is_some_and(|b| b.ignore) {
            return;
        }
        match entry.kind() {
            EntryKind::Mark { .. } => match self.schema.mark(entry.name(), attrs) {
                Ok(mark) if self.schema.validate(entry, mark.attrs()).is_ok() => {
                    self.marks.push(ActiveMark {
                        mark,
                        origin: Origin::Html(tag.name.clone()),
                        depth: self.stack.len(),
                    });
                }
                _ => self.add_text(&tag.raw, false),
            },
            EntryKind::Leaf { inline: true } => {
                if self.add_inline_leaf(entry, attrs, &tag.raw) {
                    self.capture = Some(Capture {
                        tag: tag.name.clone(),
                        nested: 0,
                        depth: self.stack.len(),
                        swallowed: String::new(),
                    });
                }
            }
            EntryKind::Leaf { inline: false } => {
                if let Some(node) = self.build_leaf(entry, attrs) {
                    self.add_block(node);
                }
            }
            EntryKind::Block(_) => {
                if !self.leave_textblock() {
                    // a block tag inside markdown inline content
                    return;
                }
                self.push_frame(
                    entry,
                    attrs,
                    Origin::Html(tag.name.clone()),
                    collapse,
                    None,
                );
            }
        }
    }

    fn html_atom(&mut self, tag: HtmlTag, collapse: bool) {
        if let Some(capture) = &mut self.capture {
            capture.swallowed.push_str(&tag.raw);
            return;
        }
        let Some((entry, rule)) = self.schema.dom_match(&tag) else {
            self.add_text(&tag.raw, false);
            return;
        };
        let attrs = rule.get_attrs.map(|f| f(&tag)).unwrap_or_default();
        match entry.kind() {
            EntryKind::Leaf { inline: true } => {
                self.add_inline_leaf(entry, attrs, &tag.raw);
            }
            EntryKind::Leaf { inline: false } => {
                if let Some(node) = self.build_leaf(entry, attrs) {
                    self.add_block(node);
                }
            }
            EntryKind::Block(_) if entry.name() != CODE_BLOCK => {
                // `<p/>` and friends: an empty container
                if self.leave_textblock() {
                    self.push_frame(entry, attrs, Origin::Html(tag.name.clone()), collapse, None);
                    self.close_top();
                }
            }
            _ => {}
        }
    }

    fn html_close(&mut self, tag: HtmlTag, _collapse: bool) {
        let html = Origin::Html(tag.name.clone());
        if let Some(capture) = &mut self.capture {
            if capture.tag == tag.name {
                if capture.nested == 0 {
                    self.capture = None;
                    return;
                }
                capture.nested -= 1;
                capture.swallowed.push_str(&tag.raw);
                return;
            }
            // a close tag for an enclosing frame ends the atom with it
            if !self.stack.iter().any(|f| f.origin == html) {
                capture.swallowed.push_str(&tag.raw);
                return;
            }
        }
        if let Some(index) = self.stack.iter().rposition(|f| f.origin == html) {
            while self.stack.len() > index {
                self.close_top();
            }
            return;
        }
        if let Some(i) = self.marks.iter().rposition(|m| m.origin == html) {
            self.marks.remove(i);
            return;
        }
        if self.schema.knows_tag(&tag.name) || tag.name == "code" {
            log::debug!("ignoring orphan closing tag `{}`", tag.raw);
            return;
        }
        self.add_text(&tag.raw, false);
    }

    /// Closes everything and returns the document.
    pub(crate) fn finish(mut self) -> Node {
        while self.stack.len() > 1 {
            self.close_top();
        }
        let children = self.stack.pop().map(|f| f.children).unwrap_or_default();
        self.schema.doc(children)
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}
