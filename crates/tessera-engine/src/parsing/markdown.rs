//! Markdown import: token stream to document through the schema's token
//! bindings.

use super::builder::TreeBuilder;
use super::html::lex;
use super::token::{Nesting, Token};
use super::tokenizer::tokenize;
use super::ParseFailure;
use crate::model::{Attrs, Node};
use crate::schema::{DOC, EntryKind, Schema, SchemaEntry};

pub const DEFAULT_MAX_NESTING: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Turn single newlines inside paragraphs into hard breaks.
    pub soft_breaks_as_hard: bool,
    pub max_nesting: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            soft_breaks_as_hard: true,
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }
}

/// Parses markdown into documents of one schema.
///
/// Tokens no entry claims are kept as their literal source text, so nothing
/// the user typed is dropped.
pub struct MarkdownParser<'s> {
    schema: &'s Schema,
    options: ParseOptions,
}

impl<'s> MarkdownParser<'s> {
    pub fn new(schema: &'s Schema, options: ParseOptions) -> Self {
        Self { schema, options }
    }

    /// Parses `text`, or returns `None` when the token stream cannot be
    /// built. Callers fall back to inserting plain text.
    pub fn parse(&self, text: &str) -> Option<Node> {
        match self.try_parse(text) {
            Ok(doc) => Some(doc),
            Err(e) => {
                log::warn!("markdown parse failed: {e}");
                None
            }
        }
    }

    pub fn try_parse(&self, text: &str) -> Result<Node, ParseFailure> {
        let tokens = tokenize(text, self.options.max_nesting)?;
        let root = self.schema.entry(DOC).ok_or(ParseFailure::NoRoot)?;
        let mut builder = TreeBuilder::new(self.schema, root);

        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            match token.name {
                "text" => builder.add_text(&token.content, false),
                "softbreak" if !builder.capturing() => {
                    if self.options.soft_breaks_as_hard {
                        builder.hard_break();
                    } else {
                        builder.add_text("\n", false);
                    }
                }
                "softbreak" => builder.add_text("\n", false),
                "html_inline" => {
                    for piece in lex(&token.content) {
                        builder.html_piece(piece, false);
                    }
                }
                "html_block" => {
                    let floor = builder.begin_scope();
                    for piece in lex(&token.content) {
                        builder.html_piece(piece, true);
                    }
                    builder.end_scope(floor);
                }
                _ => {
                    i = self.bound_token(&mut builder, text, &tokens, i);
                    continue;
                }
            }
            i += 1;
        }

        Ok(builder.finish())
    }

    /// Handles a token through its schema binding and returns the index of
    /// the next token to look at.
    fn bound_token(
        &self,
        builder: &mut TreeBuilder<'s>,
        text: &str,
        tokens: &[Token],
        i: usize,
    ) -> usize {
        let token = &tokens[i];
        let raw = text.get(token.source.clone()).unwrap_or_default();

        let Some(entry) = self.schema.entry_for_token(token.name) else {
            log::debug!("no schema entry for token `{}`; keeping source", token.name);
            return match token.nesting {
                Nesting::Open => {
                    builder.add_raw(raw);
                    skip_to_close(tokens, i) + 1
                }
                Nesting::SelfClosing => {
                    builder.add_raw(raw);
                    i + 1
                }
                Nesting::Close => i + 1,
            };
        };
        let Some(binding) = entry.markdown_binding() else {
            return i + 1;
        };
        if binding.ignore {
            return i + 1;
        }
        let attrs = |t: &Token| {
            binding
                .get_attrs
                .map(|f| f(t, tokens, i))
                .unwrap_or_default()
        };

        match entry.kind() {
            EntryKind::Mark { .. } => self.mark_token(builder, entry, token, attrs(token)),
            EntryKind::Leaf { inline: true } => {
                builder.add_inline_leaf(entry, attrs(token), raw);
            }
            EntryKind::Leaf { inline: false } => {
                match self.validated(entry, attrs(token), Vec::new()) {
                    Some(node) => builder.add_block(node),
                    None => builder.add_raw(raw),
                }
                if token.nesting == Nesting::Open {
                    return skip_to_close(tokens, i) + 1;
                }
            }
            EntryKind::Block(_) if binding.no_close_token => {
                let content = token.content.strip_suffix('\n').unwrap_or(&token.content);
                let children = vec![Node::text(content, Vec::new())];
                match self.validated(entry, attrs(token), children) {
                    Some(node) => builder.add_block(node),
                    None => builder.add_raw(raw),
                }
            }
            EntryKind::Block(_) => match token.nesting {
                Nesting::Open => {
                    builder.open_markdown_block(entry, token.name, Some(raw.to_string()));
                    builder.set_markdown_attrs(token.name, attrs(token));
                }
                Nesting::Close => builder.close_markdown_block(token.name),
                Nesting::SelfClosing => builder.add_raw(raw),
            },
        }
        i + 1
    }

    fn mark_token(
        &self,
        builder: &mut TreeBuilder<'s>,
        entry: &SchemaEntry,
        token: &Token,
        attrs: Attrs,
    ) {
        if token.nesting == Nesting::Close {
            builder.close_mark(token.name);
            return;
        }
        let mark = match self.schema.mark(entry.name(), attrs) {
            Ok(mark) => mark,
            Err(e) => {
                log::warn!("{e}");
                return;
            }
        };
        if let Err(e) = self.schema.validate(entry, mark.attrs()) {
            log::warn!("{e}; ignoring the mark");
            if token.nesting == Nesting::SelfClosing {
                builder.add_text(&token.content, false);
            }
            return;
        }
        builder.open_mark(mark, token.name);
        if token.nesting == Nesting::SelfClosing {
            builder.add_text(&token.content, false);
            builder.close_mark(token.name);
        }
    }

    fn validated(&self, entry: &SchemaEntry, attrs: Attrs, children: Vec<Node>) -> Option<Node> {
        let node = self.schema.node(entry.name(), attrs, children).ok()?;
        match self.schema.validate(entry, node.attrs()) {
            Ok(()) => Some(node),
            Err(e) => {
                log::warn!("{e}; keeping the source text instead");
                None
            }
        }
    }
}

/// Index of the close token matching the open token at `open`.
fn skip_to_close(tokens: &[Token], open: usize) -> usize {
    let name = tokens[open].name;
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        if token.name != name {
            continue;
        }
        match token.nesting {
            Nesting::Open => depth += 1,
            Nesting::Close => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            Nesting::SelfClosing => {}
        }
    }
    tokens.len()
}
