//! The editing surface: one document, its selection and the overlays that
//! follow it.
//!
//! Every change goes through [`Editor::dispatch`]. A dispatch applies the
//! transaction, lets the comment overlay and the highlighter observe it, then
//! runs the auto-join pass over the touched ranges as an appended transaction
//! that the overlays observe as well. UI controls use the command methods
//! (`toggle_mark`, `toggle_block_type`, `insert_content`, ...), which compile
//! to transactions and dispatch them.
//!
//! ```rust
//! # use std::sync::Arc;
//! # use tessera_engine::editor::{Content, Editor, EditorOptions};
//! # use tessera_engine::highlight::LanguageRegistry;
//! let languages = Arc::new(LanguageRegistry::with_builtins());
//! let mut editor = Editor::from_markdown(EditorOptions::default(), languages, "hello").unwrap();
//! editor.focus(Some(6));
//! editor.insert_content(Content::Text(" world".to_string())).unwrap();
//! assert_eq!(editor.get_markdown(), "hello world");
//! ```

mod commands;
mod patch;

use std::sync::Arc;

use thiserror::Error;

pub use commands::Content;
pub use patch::Patch;

use crate::comments::{CommentAction, CommentError, CommentOverlay, OverlayEvent};
use crate::decoration::DecorationSet;
use crate::highlight::{HighlightDecorator, LanguageRegistry, Ticket};
use crate::model::{Attrs, Node, PositionOutOfRange};
use crate::parsing::{HtmlParser, MarkdownParser, ParseFailure, ParseOptions};
use crate::reorder::{ReorderError, auto_join, drag_source, drop_target, move_block};
use crate::schema::{PARAGRAPH, Schema, SchemaError, Surface};
use crate::serialize::{to_html, to_markdown};
use crate::transform::{
    Applied, Bias, DEFAULT_MAX_DIFF_CELLS, Selection, StepError, Transaction,
};

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Step(#[from] StepError),
    #[error(transparent)]
    Position(#[from] PositionOutOfRange),
    #[error(transparent)]
    Parse(#[from] ParseFailure),
    #[error(transparent)]
    Comment(#[from] CommentError),
    #[error(transparent)]
    Reorder(#[from] ReorderError),
    #[error("`{0}` cannot be toggled on a block")]
    NotToggleable(String),
    #[error("position {0} is not inside a text block")]
    NoTextblock(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorOptions {
    pub surface: Surface,
    pub parse: ParseOptions,
    /// Run the first highlight pass from [`Editor::run_deferred`] instead of
    /// on construction.
    pub defer_initial_highlight: bool,
    /// Diff budget for reconciling remote snapshots.
    pub max_diff_cells: usize,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            surface: Surface::default(),
            parse: ParseOptions::default(),
            defer_initial_highlight: true,
            max_diff_cells: DEFAULT_MAX_DIFF_CELLS,
        }
    }
}

pub struct Editor {
    schema: Schema,
    options: EditorOptions,
    doc: Node,
    selection: Selection,
    focused: bool,
    /// Incremented on every change to the document
    version: u64,
    comments: CommentOverlay,
    highlight: HighlightDecorator,
    pending_highlight: Option<Ticket>,
}

impl Editor {
    /// An editor holding an empty document.
    pub fn new(options: EditorOptions, languages: Arc<LanguageRegistry>) -> Result<Self, EditorError> {
        let schema = options.surface.schema()?;
        let doc = schema.doc(Vec::new());
        Ok(Self::with_doc(schema, options, languages, doc))
    }

    pub fn from_markdown(
        options: EditorOptions,
        languages: Arc<LanguageRegistry>,
        markdown: &str,
    ) -> Result<Self, EditorError> {
        let schema = options.surface.schema()?;
        let doc = MarkdownParser::new(&schema, options.parse).try_parse(markdown)?;
        Ok(Self::with_doc(schema, options, languages, doc))
    }

    /// An editor over persisted HTML content.
    pub fn from_html(
        options: EditorOptions,
        languages: Arc<LanguageRegistry>,
        html: &str,
    ) -> Result<Self, EditorError> {
        let schema = options.surface.schema()?;
        let doc = HtmlParser::new(&schema).parse(html)?;
        Ok(Self::with_doc(schema, options, languages, doc))
    }

    fn with_doc(schema: Schema, options: EditorOptions, languages: Arc<LanguageRegistry>, doc: Node) -> Self {
        let highlight = HighlightDecorator::new(languages);
        let (highlight, pending_highlight) = if options.defer_initial_highlight {
            let (pending, ticket) = highlight.schedule_initial();
            (pending, Some(ticket))
        } else {
            (highlight.highlighted(&doc), None)
        };
        Self {
            selection: Selection::cursor(first_text_position(&schema, &doc)),
            comments: CommentOverlay::new(&doc),
            schema,
            options,
            doc,
            focused: false,
            version: 0,
            highlight,
            pending_highlight,
        }
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn options(&self) -> &EditorOptions {
        &self.options
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn comments(&self) -> &CommentOverlay {
        &self.comments
    }

    pub fn highlighter(&self) -> &HighlightDecorator {
        &self.highlight
    }

    /// Takes focus, optionally moving the cursor to `at`.
    pub fn focus(&mut self, at: Option<usize>) {
        self.focused = true;
        if let Some(pos) = at {
            self.set_selection(Selection::cursor(pos));
        }
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    /// Moves the selection, clamped to the document.
    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = clamp(selection, self.doc.content_size());
    }

    /// Applies a transaction and everything that follows from it.
    pub fn dispatch(&mut self, transaction: Transaction) -> Result<Patch, EditorError> {
        let applied = transaction.apply(&self.doc)?;
        let mut events = self.observe(&applied);
        let mut changed = applied.touched_after();
        let mut joined = false;

        if applied.doc_changed()
            && let Some(join) = auto_join(&self.doc, &self.schema, &changed)
        {
            match join.apply(&self.doc) {
                Ok(follow) => {
                    changed = changed
                        .iter()
                        .map(|r| follow.map(r.start, Bias::Left).pos..follow.map(r.end, Bias::Right).pos)
                        .chain(follow.touched_after())
                        .collect();
                    events.extend(self.observe(&follow));
                    joined = true;
                }
                Err(e) => log::warn!("skipping auto-join: {e}"),
            }
        }

        if applied.doc_changed() {
            self.version += 1;
        }
        Ok(Patch {
            changed,
            selection: self.selection,
            version: self.version,
            events,
            joined,
        })
    }

    /// Installs an applied transaction and lets the overlays follow it.
    fn observe(&mut self, applied: &Applied) -> Vec<OverlayEvent> {
        let before = std::mem::replace(&mut self.doc, applied.doc.clone());
        let selection_before = self.selection;
        let selection = applied
            .selection()
            .unwrap_or_else(|| selection_before.map(applied.mapping()));
        self.selection = clamp(selection, self.doc.content_size());

        let (comments, events) = self.comments.apply(applied);
        self.comments = comments;
        self.highlight = self
            .highlight
            .apply(&before, applied, selection_before, self.selection);
        events
    }

    /// Replaces the document with a snapshot from a collaborator.
    pub fn apply_remote(&mut self, snapshot: Node) -> Result<Patch, EditorError> {
        self.dispatch(Transaction::remote(snapshot).with_diff_budget(self.options.max_diff_cells))
    }

    pub fn toggle_mark(&mut self, name: &str, attrs: Attrs) -> Result<Patch, EditorError> {
        let transaction = commands::toggle_mark(&self.doc, &self.schema, self.selection, name, attrs)?;
        self.dispatch(transaction)
    }

    /// Sets the selected blocks to `name`, or back to paragraphs when they
    /// already are. Lists and quotes wrap the selected blocks instead.
    pub fn toggle_block_type(&mut self, name: &str, attrs: Attrs) -> Result<Patch, EditorError> {
        let transaction =
            commands::toggle_block_type(&self.doc, &self.schema, self.selection, name, attrs)?;
        self.dispatch(transaction)
    }

    /// Replaces the selection with `content`.
    ///
    /// Pasted markdown that cannot be parsed is inserted as plain text. A
    /// single pasted paragraph inserts its inline content.
    pub fn insert_content(&mut self, content: Content) -> Result<Patch, EditorError> {
        let transaction = match content {
            Content::Text(text) => {
                commands::insert_text(&self.doc, &self.schema, self.selection, &text)?
            }
            Content::Markdown(markdown) => {
                match MarkdownParser::new(&self.schema, self.options.parse).parse(&markdown) {
                    Some(parsed) => {
                        let nodes = match parsed.children() {
                            [single] if single.kind() == PARAGRAPH => single.children().to_vec(),
                            blocks => blocks.to_vec(),
                        };
                        commands::insert_nodes(&self.doc, &self.schema, self.selection, nodes)?
                    }
                    None => commands::insert_text(&self.doc, &self.schema, self.selection, &markdown)?,
                }
            }
            Content::Nodes(nodes) => {
                commands::insert_nodes(&self.doc, &self.schema, self.selection, nodes)?
            }
        };
        self.dispatch(transaction)
    }

    /// Inserts a finished node (an uploaded image, say) at `pos`.
    pub fn insert_at_position(&mut self, node: Node, pos: usize) -> Result<Patch, EditorError> {
        let transaction = commands::insert_at(&self.doc, &self.schema, node, pos)?;
        self.dispatch(transaction)
    }

    /// Persisted HTML content.
    pub fn get_content(&self) -> String {
        to_html(&self.schema, &self.doc)
    }

    pub fn set_content(&mut self, html: &str) -> Result<Patch, EditorError> {
        let doc = HtmlParser::new(&self.schema).parse(html)?;
        self.replace_doc(doc)
    }

    pub fn get_markdown(&self) -> String {
        to_markdown(&self.schema, &self.doc)
    }

    pub fn set_markdown(&mut self, markdown: &str) -> Result<Patch, EditorError> {
        let doc = MarkdownParser::new(&self.schema, self.options.parse).try_parse(markdown)?;
        self.replace_doc(doc)
    }

    fn replace_doc(&mut self, doc: Node) -> Result<Patch, EditorError> {
        let cursor = first_text_position(&self.schema, &doc);
        let transaction = Transaction::new()
            .replace(0, self.doc.content_size(), doc.children().to_vec())
            .set_selection(Selection::cursor(cursor));
        self.dispatch(transaction)
    }

    /// Handles a comment action, dispatching the mark change it needs.
    pub fn comment(&mut self, action: CommentAction) -> Result<Patch, EditorError> {
        let handled = self.comments.handle(&self.doc, &self.schema, action)?;
        let previous = std::mem::replace(&mut self.comments, handled.overlay);
        let mut patch = match handled.transaction {
            Some(transaction) => match self.dispatch(transaction) {
                Ok(patch) => patch,
                Err(e) => {
                    self.comments = previous;
                    return Err(e);
                }
            },
            None => self.unchanged(),
        };
        let mut events = handled.events;
        events.append(&mut patch.events);
        patch.events = events;
        Ok(patch)
    }

    /// Moves the block picked up at `from` to the drop position `to`.
    pub fn drag_drop(&mut self, from: usize, to: usize) -> Result<Patch, EditorError> {
        let source = drag_source(&self.doc, &self.schema, from).ok_or(ReorderError::NoBlock(from))?;
        let target = drop_target(&self.doc, &self.schema, to).ok_or(ReorderError::NoBlock(to))?;
        let transaction = move_block(&self.schema, &source, &target)?;
        self.dispatch(transaction)
    }

    /// Runs deferred work. Returns whether a highlight pass ran; a pass
    /// superseded by an earlier full highlight does nothing.
    pub fn run_deferred(&mut self) -> bool {
        let Some(ticket) = self.pending_highlight.take() else {
            return false;
        };
        let passes = self.highlight.passes();
        self.highlight = self.highlight.run(ticket, &self.doc);
        self.highlight.passes() > passes
    }

    /// Comment and syntax decorations together.
    pub fn decorations(&self) -> DecorationSet {
        self.comments
            .decorations()
            .add(self.highlight.decorations().iter().cloned().collect())
    }

    fn unchanged(&self) -> Patch {
        Patch {
            changed: Vec::new(),
            selection: self.selection,
            version: self.version,
            events: Vec::new(),
            joined: false,
        }
    }
}

fn clamp(selection: Selection, size: usize) -> Selection {
    Selection::range(selection.anchor.min(size), selection.head.min(size))
}

/// Start of the first textblock's content, or 0 when there is none.
fn first_text_position(schema: &Schema, doc: &Node) -> usize {
    let mut found = None;
    doc.descendants(&mut |node, pos| {
        if found.is_some() {
            return false;
        }
        if schema.is_textblock(node) {
            found = Some(pos + 1);
            return false;
        }
        node.is_element()
    });
    found.unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comments::{ACTIVE_CLASS, AnchorState, DRAFT_CLASS};
    use crate::schema::{BOLD, BULLET_LIST, CODE_BLOCK, COMMENT, HEADING};
    use pretty_assertions::assert_eq;

    fn languages() -> Arc<LanguageRegistry> {
        Arc::new(LanguageRegistry::with_builtins())
    }

    fn editor(surface: Surface, markdown: &str) -> Editor {
        let options = EditorOptions {
            surface,
            ..EditorOptions::default()
        };
        Editor::from_markdown(options, languages(), markdown).unwrap()
    }

    #[test]
    fn starts_with_cursor_in_first_block() {
        let editor = editor(Surface::Markdown, "# Title\n\nbody");
        assert_eq!(editor.selection(), Selection::cursor(1));
        assert!(!editor.is_focused());
    }

    #[test]
    fn typing_bumps_version_and_moves_cursor() {
        let mut editor = editor(Surface::Markdown, "ab");
        editor.focus(Some(3));
        let patch = editor.insert_content(Content::Text("c".into())).unwrap();
        assert_eq!(patch.version, 1);
        assert_eq!(patch.selection, Selection::cursor(4));
        assert_eq!(editor.get_markdown(), "abc");
    }

    #[test]
    fn focus_clamps_to_document() {
        let mut editor = editor(Surface::Markdown, "ab");
        editor.focus(Some(100));
        assert!(editor.is_focused());
        assert_eq!(editor.selection(), Selection::cursor(4));
    }

    #[test]
    fn toggles_bold_over_selection() {
        let mut editor = editor(Surface::Markdown, "hello");
        editor.set_selection(Selection::range(1, 6));
        editor.toggle_mark(BOLD, Attrs::new()).unwrap();
        assert_eq!(editor.get_markdown(), "**hello**");
        editor.toggle_mark(BOLD, Attrs::new()).unwrap();
        assert_eq!(editor.get_markdown(), "hello");
    }

    #[test]
    fn toggles_heading() {
        let mut editor = editor(Surface::Markdown, "title");
        editor
            .toggle_block_type(HEADING, Attrs::new().with("level", 2))
            .unwrap();
        assert_eq!(editor.get_markdown(), "## title");
    }

    #[test]
    fn single_pasted_paragraph_goes_inline() {
        let mut editor = editor(Surface::Markdown, "ab");
        editor.focus(Some(2));
        editor
            .insert_content(Content::Markdown("**x**".into()))
            .unwrap();
        assert_eq!(editor.get_markdown(), "a**x**b");
        assert_eq!(editor.doc().child_count(), 1);
    }

    #[test]
    fn pasted_blocks_follow_the_current_block() {
        let mut editor = editor(Surface::Markdown, "ab");
        editor.focus(Some(2));
        editor
            .insert_content(Content::Markdown("# one\n\ntwo".into()))
            .unwrap();
        assert_eq!(editor.get_markdown(), "ab\n\n# one\n\ntwo");
    }

    #[test]
    fn unparseable_paste_falls_back_to_text() {
        let options = EditorOptions {
            parse: ParseOptions {
                max_nesting: 2,
                ..ParseOptions::default()
            },
            ..EditorOptions::default()
        };
        let mut editor = Editor::new(options, languages()).unwrap();
        editor.focus(Some(1));
        editor
            .insert_content(Content::Markdown("> > a".into()))
            .unwrap();
        assert_eq!(editor.doc().text_content(), "> > a");
    }

    #[test]
    fn adjacent_lists_join_after_the_gap_is_deleted() {
        // list "a" 0..7, paragraph "x" 7..10, list "b" 10..17
        let mut editor = editor(Surface::Markdown, "- a\n\nx\n\n- b");
        assert_eq!(editor.doc().child_count(), 3);
        let patch = editor.dispatch(Transaction::new().delete(7, 10)).unwrap();
        assert!(patch.joined);
        assert_eq!(editor.doc().child_count(), 1);
        assert_eq!(editor.doc().child(0).unwrap().kind(), BULLET_LIST);
        assert_eq!(editor.doc().child(0).unwrap().child_count(), 2);
        assert_eq!(patch.version, 1);
    }

    #[test]
    fn selection_only_transaction_keeps_version() {
        let mut editor = editor(Surface::Markdown, "ab");
        let patch = editor
            .dispatch(Transaction::new().set_selection(Selection::range(1, 3)))
            .unwrap();
        assert_eq!(patch.version, 0);
        assert_eq!(editor.selection(), Selection::range(1, 3));
    }

    #[test]
    fn failing_transaction_leaves_document_alone() {
        let mut editor = editor(Surface::Markdown, "ab");
        let before = editor.doc().clone();
        let err = editor.dispatch(Transaction::new().delete(1, 400)).unwrap_err();
        assert!(matches!(err, EditorError::Step(_)));
        assert_eq!(editor.doc(), &before);
        assert_eq!(editor.version(), 0);
    }

    #[test]
    fn markdown_and_html_content_round_trip() {
        let mut editor = editor(Surface::Markdown, "# A\n\nb **c**");
        let html = editor.get_content();
        let markdown = editor.get_markdown();
        editor.set_markdown("plain").unwrap();
        assert_eq!(editor.get_markdown(), "plain");
        editor.set_content(&html).unwrap();
        assert_eq!(editor.get_markdown(), markdown);
        assert_eq!(editor.selection(), Selection::cursor(1));
    }

    #[test]
    fn comment_draft_persists_as_mark() {
        let mut editor = editor(Surface::Note, "hello world");
        let started = editor
            .comment(CommentAction::StartDraft { from: 1, to: 6 })
            .unwrap();
        assert_eq!(started.version, 0);
        assert_eq!(editor.selection(), Selection::cursor(6));
        assert!(editor.decorations().iter().any(|d| d.class == DRAFT_CLASS));

        let persisted = editor
            .comment(CommentAction::PersistDraft {
                comment_id: "c1".into(),
            })
            .unwrap();
        assert_eq!(persisted.version, 1);
        let first = editor.doc().child(0).unwrap().child(0).unwrap();
        assert_eq!(first.marks()[0].kind(), COMMENT);
        let anchor = editor.comments().anchors()[0].clone();
        assert_eq!(anchor.state(), AnchorState::Active);
        assert_eq!(anchor.range(), 1..6);
        assert!(editor.decorations().iter().any(|d| d.class == ACTIVE_CLASS));
    }

    #[test]
    fn comment_marks_need_a_surface_with_comments() {
        let mut editor = editor(Surface::Markdown, "hello");
        editor
            .comment(CommentAction::StartDraft { from: 1, to: 3 })
            .unwrap();
        let err = editor
            .comment(CommentAction::PersistDraft {
                comment_id: "c1".into(),
            })
            .unwrap_err();
        assert!(matches!(err, EditorError::Comment(CommentError::NoCommentMark)));
    }

    #[test]
    fn draft_beyond_the_document_is_rejected() {
        let mut editor = editor(Surface::Note, "hello");
        let err = editor
            .comment(CommentAction::StartDraft { from: 1, to: 100 })
            .unwrap_err();
        assert!(matches!(
            err,
            EditorError::Comment(CommentError::Position(PositionOutOfRange { pos: 100, size: 7 }))
        ));

        let err = editor
            .comment(CommentAction::PersistDraft {
                comment_id: "c1".into(),
            })
            .unwrap_err();
        assert!(matches!(err, EditorError::Comment(CommentError::NoDraft)));
        assert!(editor.comments().anchors().is_empty());
        assert!(editor.decorations().is_empty());
        assert_eq!(editor.version(), 0);
    }

    #[test]
    fn drag_drop_moves_paragraph() {
        // "one" 0..5, "two" 5..10
        let mut editor = editor(Surface::Markdown, "one\n\ntwo");
        editor.drag_drop(6, 1).unwrap();
        assert_eq!(editor.get_markdown(), "two\n\none");
    }

    #[test]
    fn drag_from_nowhere_is_an_error() {
        let mut editor = editor(Surface::Markdown, "one");
        let err = editor.drag_drop(400, 0).unwrap_err();
        assert!(matches!(err, EditorError::Reorder(ReorderError::NoBlock(400))));
    }

    #[test]
    fn deferred_highlight_runs_once() {
        let mut editor = editor(Surface::Markdown, "```rust\nlet x = 1;\n```");
        assert!(editor.decorations().is_empty());
        assert!(editor.run_deferred());
        assert!(!editor.decorations().is_empty());
        assert!(!editor.run_deferred());
    }

    #[test]
    fn deferred_highlight_superseded_by_first_edit() {
        let mut editor = editor(Surface::Markdown, "```rust\nlet x = 1;\n```");
        editor.focus(Some(1));
        editor.insert_content(Content::Text("// ".into())).unwrap();
        assert!(editor.highlighter().is_initialized());
        assert!(!editor.run_deferred());
        assert_eq!(editor.highlighter().passes(), 1);
    }

    #[test]
    fn eager_highlight_on_construction() {
        let options = EditorOptions {
            defer_initial_highlight: false,
            ..EditorOptions::default()
        };
        let editor = Editor::from_markdown(options, languages(), "```py\npass\n```").unwrap();
        assert_eq!(editor.doc().child(0).unwrap().kind(), CODE_BLOCK);
        assert_eq!(editor.decorations().len(), 1);
    }

    #[test]
    fn remote_snapshot_replaces_document() {
        let mut editor = editor(Surface::Markdown, "one");
        let snapshot = MarkdownParser::new(editor.schema(), ParseOptions::default())
            .parse("one two")
            .unwrap();
        editor.focus(Some(2));
        let patch = editor.apply_remote(snapshot).unwrap();
        assert_eq!(editor.get_markdown(), "one two");
        assert_eq!(patch.selection, Selection::cursor(2));
        assert_eq!(patch.version, 1);
    }

    #[test]
    fn image_inserted_inside_text_stays_inline() {
        let mut editor = editor(Surface::Markdown, "ab");
        let image = editor
            .schema()
            .node(crate::schema::IMAGE, Attrs::new().with("src", "a.png"), vec![])
            .unwrap();
        editor.insert_at_position(image, 2).unwrap();
        assert_eq!(editor.get_markdown(), "a![](a.png)b");
    }
}
