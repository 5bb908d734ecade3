//! CommonMark + GFM tokenization.
//!
//! pulldown-cmark's event stream is turned into a flat token list with
//! explicit nesting. A few shapes are adjusted on the way:
//!
//! - inline content sitting directly in a tight list item is wrapped in a
//!   hidden paragraph, so tightness can be read back from the tokens
//! - lists whose every item starts with a task marker become task lists
//! - images, code blocks and HTML blocks collapse into single tokens
//! - table header cells are wrapped in a row and body rows in `tbody`

use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

use super::ParseFailure;
use super::token::{Nesting, Token};
use crate::model::Attrs;

pub fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

#[derive(Debug)]
struct Frame {
    name: &'static str,
    hidden: bool,
    /// Index of the open token.
    token: usize,
}

struct Tokenizer {
    tokens: Vec<Token>,
    stack: Vec<Frame>,
    max_nesting: usize,
}

type Events<'a> = [(Event<'a>, Range<usize>)];

/// Tokenizes `text`, failing when containers nest deeper than
/// `max_nesting` or the event stream does not balance.
pub fn tokenize(text: &str, max_nesting: usize) -> Result<Vec<Token>, ParseFailure> {
    let events: Vec<_> = Parser::new_ext(text, options())
        .into_offset_iter()
        .collect();
    let mut tz = Tokenizer {
        tokens: Vec::with_capacity(events.len()),
        stack: Vec::new(),
        max_nesting,
    };

    let mut i = 0;
    while i < events.len() {
        let (event, range) = &events[i];
        let range = range.clone();
        match event {
            Event::Start(Tag::Image {
                dest_url, title, ..
            }) => {
                let (alt, end) = collect_text(&events, i);
                tz.inline()?;
                let attrs = Attrs::new()
                    .with("src", dest_url.to_string())
                    .with("title", title.to_string())
                    .with("alt", alt);
                tz.push(Token::new("image", Nesting::SelfClosing, range).with_attrs(attrs));
                i = end;
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                let (content, end) = collect_text(&events, i);
                tz.close_hidden();
                let (name, attrs) = match kind {
                    CodeBlockKind::Fenced(info) => {
                        ("fence", Attrs::new().with("info", info.to_string()))
                    }
                    CodeBlockKind::Indented => ("code_block", Attrs::new()),
                };
                tz.push(
                    Token::new(name, Nesting::SelfClosing, range)
                        .with_attrs(attrs)
                        .with_content(content),
                );
                i = end;
            }
            Event::Start(Tag::HtmlBlock) => {
                let (content, end) = collect_text(&events, i);
                tz.close_hidden();
                tz.push(Token::new("html_block", Nesting::SelfClosing, range).with_content(content));
                i = end;
            }
            Event::Start(Tag::List(start)) => {
                tz.close_hidden();
                let (name, attrs) = match start {
                    Some(n) => ("ordered_list", Attrs::new().with("start", *n as i64)),
                    None if all_items_are_tasks(&events, i) => ("task_list", Attrs::new()),
                    None => ("bullet_list", Attrs::new()),
                };
                tz.open(Token::new(name, Nesting::Open, range).with_attrs(attrs))?;
            }
            Event::Start(Tag::Item) => {
                tz.close_hidden();
                let name = match tz.nearest_list() {
                    Some("task_list") => "task_item",
                    _ => "list_item",
                };
                tz.open(Token::new(name, Nesting::Open, range))?;
            }
            Event::Start(Tag::TableHead) => {
                tz.open(Token::new("thead", Nesting::Open, range.clone()))?;
                tz.open(Token::new("tr", Nesting::Open, range))?;
            }
            Event::Start(Tag::TableRow) => {
                if !tz.stack.iter().any(|f| f.name == "tbody") {
                    tz.open(Token::new("tbody", Nesting::Open, range.clone()))?;
                }
                tz.open(Token::new("tr", Nesting::Open, range))?;
            }
            Event::Start(Tag::TableCell) => {
                let name = if tz.stack.iter().any(|f| f.name == "thead") {
                    "th"
                } else {
                    "td"
                };
                tz.open(Token::new(name, Nesting::Open, range))?;
            }
            Event::Start(tag) => {
                let (name, attrs, inline) = describe(tag);
                if inline {
                    tz.inline()?;
                } else {
                    tz.close_hidden();
                }
                tz.open(Token::new(name, Nesting::Open, range).with_attrs(attrs))?;
            }
            Event::End(TagEnd::TableHead) => {
                tz.close(range.clone())?;
                tz.close(range)?;
            }
            Event::End(TagEnd::Table) => {
                if tz.stack.last().is_some_and(|f| f.name == "tbody") {
                    tz.close(range.clone())?;
                }
                tz.close(range)?;
            }
            Event::End(_) => {
                tz.close_hidden();
                tz.close(range)?;
            }
            Event::Text(text) => {
                tz.inline()?;
                tz.push(Token::new("text", Nesting::SelfClosing, range).with_content(text.to_string()));
            }
            Event::Code(code) => {
                tz.inline()?;
                tz.push(
                    Token::new("code_inline", Nesting::SelfClosing, range)
                        .with_content(code.to_string()),
                );
            }
            Event::InlineHtml(html) => {
                tz.inline()?;
                tz.push(
                    Token::new("html_inline", Nesting::SelfClosing, range)
                        .with_content(html.to_string()),
                );
            }
            Event::Html(html) => {
                tz.close_hidden();
                tz.push(
                    Token::new("html_block", Nesting::SelfClosing, range)
                        .with_content(html.to_string()),
                );
            }
            Event::SoftBreak => {
                tz.inline()?;
                tz.push(Token::new("softbreak", Nesting::SelfClosing, range));
            }
            Event::HardBreak => {
                tz.inline()?;
                tz.push(Token::new("hardbreak", Nesting::SelfClosing, range));
            }
            Event::Rule => {
                tz.close_hidden();
                tz.push(Token::new("hr", Nesting::SelfClosing, range));
            }
            Event::TaskListMarker(checked) => {
                if let Some(item) = tz.stack.iter().rev().find(|f| f.name == "task_item") {
                    tz.tokens[item.token].attrs.set("checked", *checked);
                } else {
                    // marker in a list that is not a task list: keep it as text
                    tz.inline()?;
                    let marker = if *checked { "[x] " } else { "[ ] " };
                    tz.push(Token::new("text", Nesting::SelfClosing, range).with_content(marker));
                }
            }
            _ => {
                // footnote references, math and other extensions stay literal
                tz.inline()?;
                let raw = text.get(range.clone()).unwrap_or_default().to_string();
                tz.push(Token::new("text", Nesting::SelfClosing, range).with_content(raw));
            }
        }
        i += 1;
    }

    tz.close_hidden();
    if let Some(frame) = tz.stack.last() {
        return Err(ParseFailure::Unbalanced(format!(
            "`{}` is never closed",
            frame.name
        )));
    }
    Ok(tz.tokens)
}

impl Tokenizer {
    fn push(&mut self, token: Token) {
        self.tokens.push(token);
    }

    fn open(&mut self, token: Token) -> Result<(), ParseFailure> {
        if self.stack.len() >= self.max_nesting {
            return Err(ParseFailure::TooDeep {
                limit: self.max_nesting,
            });
        }
        self.stack.push(Frame {
            name: token.name,
            hidden: token.hidden,
            token: self.tokens.len(),
        });
        self.tokens.push(token);
        Ok(())
    }

    fn close(&mut self, range: Range<usize>) -> Result<(), ParseFailure> {
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| ParseFailure::Unbalanced("close without open".to_string()))?;
        let mut token = Token::new(frame.name, Nesting::Close, range);
        token.hidden = frame.hidden;
        self.tokens.push(token);
        Ok(())
    }

    /// Makes sure inline content has a paragraph to live in when it sits
    /// directly inside a (tight) list item.
    fn inline(&mut self) -> Result<(), ParseFailure> {
        let in_item = self
            .stack
            .last()
            .is_some_and(|f| matches!(f.name, "list_item" | "task_item"));
        if in_item {
            let at = self.tokens.last().map(|t| t.source.end).unwrap_or_default();
            self.open(Token::new("paragraph", Nesting::Open, at..at).hidden())?;
        }
        Ok(())
    }

    fn close_hidden(&mut self) {
        if self.stack.last().is_some_and(|f| f.hidden) {
            let at = self.tokens.last().map(|t| t.source.end).unwrap_or_default();
            if let Some(frame) = self.stack.pop() {
                self.tokens
                    .push(Token::new(frame.name, Nesting::Close, at..at).hidden());
            }
        }
    }

    fn nearest_list(&self) -> Option<&'static str> {
        self.stack
            .iter()
            .rev()
            .map(|f| f.name)
            .find(|name| matches!(*name, "bullet_list" | "ordered_list" | "task_list"))
    }
}

/// Token name, attributes and whether the tag is inline.
fn describe(tag: &Tag<'_>) -> (&'static str, Attrs, bool) {
    match tag {
        Tag::Paragraph => ("paragraph", Attrs::new(), false),
        Tag::Heading { level, .. } => (
            "heading",
            Attrs::new().with("level", *level as i64),
            false,
        ),
        Tag::BlockQuote(_) => ("blockquote", Attrs::new(), false),
        Tag::Table(_) => ("table", Attrs::new(), false),
        Tag::Emphasis => ("em", Attrs::new(), true),
        Tag::Strong => ("strong", Attrs::new(), true),
        Tag::Strikethrough => ("s", Attrs::new(), true),
        Tag::Link {
            dest_url, title, ..
        } => (
            "link",
            Attrs::new()
                .with("href", dest_url.to_string())
                .with("title", title.to_string()),
            true,
        ),
        _ => ("unsupported", Attrs::new(), false),
    }
}

/// Concatenated text inside the container starting at `start`, and the index
/// of its end event.
fn collect_text(events: &Events<'_>, start: usize) -> (String, usize) {
    let mut depth = 0usize;
    let mut text = String::new();
    for (i, (event, _)) in events.iter().enumerate().skip(start) {
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return (text, i);
                }
            }
            Event::Text(t) | Event::Code(t) | Event::Html(t) | Event::InlineHtml(t) => {
                text.push_str(t)
            }
            Event::SoftBreak | Event::HardBreak => text.push('\n'),
            _ => {}
        }
    }
    (text, events.len())
}

/// Whether every item of the list starting at `start` opens with a task
/// marker.
fn all_items_are_tasks(events: &Events<'_>, start: usize) -> bool {
    let mut depth = 0usize;
    let mut items = 0;
    let mut i = start + 1;
    while i < events.len() {
        match &events[i].0 {
            Event::Start(Tag::List(_)) => depth += 1,
            Event::End(TagEnd::List(_)) => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            Event::Start(Tag::Item) if depth == 0 => {
                items += 1;
                let mut next = i + 1;
                if matches!(events.get(next), Some((Event::Start(Tag::Paragraph), _))) {
                    next += 1;
                }
                if !matches!(events.get(next), Some((Event::TaskListMarker(_), _))) {
                    return false;
                }
            }
            _ => {}
        }
        i += 1;
    }
    items > 0
}
