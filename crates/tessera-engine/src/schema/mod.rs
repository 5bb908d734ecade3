//! Schema registry.
//!
//! A [`Schema`] is built once from a list of [`SchemaEntry`] values and is
//! immutable afterwards. Each entry declares its node or mark type together
//! with its optional capabilities:
//!
//! - a markdown token binding, used by the import pipeline and serializer
//! - DOM rules, used when parsing HTML (inline HTML in markdown and
//!   persisted HTML content)
//! - a node view, used when rendering HTML
//! - reorder behaviour (draggable, drag-isolating, join policy)
//!
//! Editing surfaces pick a subset of the built-in entries, see [`Surface`].

mod builtin;
mod entry;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub use builtin::*;
pub use entry::{
    ContentKind, DomRule, EntryKind, HtmlParts, JoinPolicy, MarkdownBinding, MarkdownWrite,
    NodeView, SchemaEntry, TagAttrs, TokenAttrs,
};

use crate::model::{Attrs, Mark, MarkSpec, Node};
use crate::parsing::HtmlTag;

/// Version written into persisted HTML content.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema conflict: {0}")]
    Conflict(String),
    #[error("schema has no `{0}` entry")]
    Missing(&'static str),
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("`{0}` is a mark, not a node type")]
    NotANode(String),
    #[error("`{0}` is a node type, not a mark")]
    NotAMark(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{kind}` is missing required attribute `{attr}`")]
pub struct SchemaValidationError {
    pub kind: String,
    pub attr: &'static str,
}

/// Immutable set of node and mark types.
#[derive(Debug, Clone)]
pub struct Schema {
    entries: Vec<SchemaEntry>,
    by_name: HashMap<&'static str, usize>,
    by_token: HashMap<&'static str, usize>,
    mark_ranks: HashMap<&'static str, u16>,
}

impl Schema {
    /// Builds a schema, rejecting duplicate names and markdown tokens claimed
    /// by more than one non-ignore entry.
    pub fn register(entries: Vec<SchemaEntry>) -> Result<Schema, SchemaError> {
        let mut by_name = HashMap::new();
        let mut by_token: HashMap<&'static str, usize> = HashMap::new();
        let mut mark_ranks = HashMap::new();

        for (i, entry) in entries.iter().enumerate() {
            if by_name.insert(entry.name, i).is_some() {
                return Err(SchemaError::Conflict(format!(
                    "type `{}` is registered twice",
                    entry.name
                )));
            }
            if entry.is_mark() {
                let rank = u16::try_from(mark_ranks.len()).unwrap_or(u16::MAX);
                mark_ranks.insert(entry.name, rank);
            }
            let Some(binding) = &entry.markdown else {
                continue;
            };
            for token in &binding.tokens {
                match by_token.get(token) {
                    None => {
                        by_token.insert(token, i);
                    }
                    Some(&prev) => {
                        let prev_ignores = entries[prev]
                            .markdown
                            .as_ref()
                            .is_some_and(|b| b.ignore);
                        if !binding.ignore && !prev_ignores {
                            return Err(SchemaError::Conflict(format!(
                                "token `{token}` is claimed by both `{}` and `{}`",
                                entries[prev].name, entry.name
                            )));
                        }
                        // a real binding wins over an ignore binding
                        if prev_ignores && !binding.ignore {
                            by_token.insert(token, i);
                        }
                    }
                }
            }
        }

        for required in ["doc", "paragraph"] {
            if !by_name.contains_key(required) {
                return Err(SchemaError::Missing(required));
            }
        }

        log::debug!(
            "registered schema with {} entries ({} marks)",
            entries.len(),
            mark_ranks.len()
        );
        Ok(Schema {
            entries,
            by_name,
            by_token,
            mark_ranks,
        })
    }

    pub fn version(&self) -> u32 {
        SCHEMA_VERSION
    }

    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&SchemaEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    pub fn has(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn entry_for_token(&self, token: &str) -> Option<&SchemaEntry> {
        self.by_token.get(token).map(|&i| &self.entries[i])
    }

    /// Best DOM rule for a tag: highest priority first, then registration
    /// order.
    pub fn dom_match(&self, tag: &HtmlTag) -> Option<(&SchemaEntry, &DomRule)> {
        let mut best: Option<(&SchemaEntry, &DomRule)> = None;
        for entry in &self.entries {
            for rule in &entry.dom {
                if rule.matches(tag) && best.is_none_or(|(_, b)| rule.priority > b.priority) {
                    best = Some((entry, rule));
                }
            }
        }
        best
    }

    /// Whether any DOM rule is written for this tag name, regardless of
    /// attribute requirements.
    pub fn knows_tag(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.dom.iter().any(|r| r.tag == name))
    }

    pub fn mark_spec(&self, name: &str) -> Result<MarkSpec, SchemaError> {
        let entry = self
            .entry(name)
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))?;
        let EntryKind::Mark { exclusive } = entry.kind else {
            return Err(SchemaError::NotAMark(name.to_string()));
        };
        let rank = self.mark_ranks.get(entry.name).copied().unwrap_or(u16::MAX);
        Ok(MarkSpec { rank, exclusive })
    }

    pub fn mark(&self, name: &str, attrs: Attrs) -> Result<Mark, SchemaError> {
        let spec = self.mark_spec(name)?;
        let entry = self
            .entry(name)
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))?;
        Ok(Mark::new(entry.name, merge(entry.defaults(), attrs), spec))
    }

    /// Creates a node, filling in default attributes.
    pub fn node(&self, name: &str, attrs: Attrs, children: Vec<Node>) -> Result<Node, SchemaError> {
        let entry = self
            .entry(name)
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))?;
        let attrs = merge(entry.defaults(), attrs);
        match entry.kind {
            EntryKind::Block(_) => Ok(Node::element(entry.name, attrs, children)),
            EntryKind::Leaf { inline } => Ok(Node::leaf(entry.name, attrs, inline)),
            EntryKind::Mark { .. } => Err(SchemaError::NotANode(name.to_string())),
        }
    }

    pub fn text(&self, text: impl Into<String>, marks: Vec<Mark>) -> Node {
        Node::text(text, marks)
    }

    pub fn paragraph(&self, children: Vec<Node>) -> Node {
        Node::element(PARAGRAPH, Attrs::new(), children)
    }

    pub fn doc(&self, children: Vec<Node>) -> Node {
        let children = if children.is_empty() {
            vec![self.paragraph(Vec::new())]
        } else {
            children
        };
        Node::element(DOC, Attrs::new(), children)
    }

    /// Checks the attributes an entry requires are present and non-null.
    pub fn validate(&self, entry: &SchemaEntry, attrs: &Attrs) -> Result<(), SchemaValidationError> {
        for attr in &entry.required_attrs {
            if attrs.get(attr).is_none_or(|v| v.is_null()) {
                return Err(SchemaValidationError {
                    kind: entry.name.to_string(),
                    attr,
                });
            }
        }
        Ok(())
    }

    pub fn content_of(&self, node: &Node) -> Option<ContentKind> {
        self.entry(node.kind()).and_then(SchemaEntry::content)
    }

    pub fn is_textblock(&self, node: &Node) -> bool {
        self.entry(node.kind()).is_some_and(SchemaEntry::is_textblock)
    }
}

fn merge(defaults: &Attrs, attrs: Attrs) -> Attrs {
    let mut out = defaults.clone();
    for (k, v) in attrs.iter() {
        out.set(k.clone(), v.clone());
    }
    out
}

/// Editing surfaces with their own subsets of the built-in types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Surface {
    /// Plain markdown documents: everything except mentions and comments.
    #[default]
    Markdown,
    /// Collaborative notes: every built-in type.
    Note,
    /// Chat messages: inline formatting, lists, quotes and code.
    Chat,
}

impl Surface {
    pub fn entries(self) -> Vec<SchemaEntry> {
        let all = builtin_entries();
        match self {
            Surface::Note => all,
            Surface::Markdown => all
                .into_iter()
                .filter(|e| !matches!(e.name, MENTION | COMMENT))
                .collect(),
            Surface::Chat => all
                .into_iter()
                .filter(|e| CHAT_TYPES.contains(&e.name))
                .collect(),
        }
    }

    pub fn schema(self) -> Result<Schema, SchemaError> {
        Schema::register(self.entries())
    }

    pub fn name(self) -> &'static str {
        match self {
            Surface::Markdown => "markdown",
            Surface::Note => "note",
            Surface::Chat => "chat",
        }
    }
}

const CHAT_TYPES: &[&str] = &[
    DOC,
    PARAGRAPH,
    HARD_BREAK,
    BOLD,
    ITALIC,
    STRIKE,
    CODE,
    CODE_BLOCK,
    LINK,
    MENTION,
    BULLET_LIST,
    ORDERED_LIST,
    LIST_ITEM,
    BLOCKQUOTE,
];

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown surface `{0}` (expected markdown, note or chat)")]
pub struct UnknownSurface(pub String);

impl FromStr for Surface {
    type Err = UnknownSurface;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" => Ok(Surface::Markdown),
            "note" => Ok(Surface::Note),
            "chat" => Ok(Surface::Chat),
            _ => Err(UnknownSurface(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Surface::Markdown)]
    #[case(Surface::Note)]
    #[case(Surface::Chat)]
    fn built_in_surfaces_register(#[case] surface: Surface) {
        let schema = surface.schema().unwrap();
        assert!(schema.has("doc"));
        assert!(schema.has("paragraph"));
    }

    #[test]
    fn surfaces_pick_their_subsets() {
        let markdown = Surface::Markdown.schema().unwrap();
        let note = Surface::Note.schema().unwrap();
        let chat = Surface::Chat.schema().unwrap();

        assert!(!markdown.has(MENTION) && !markdown.has(COMMENT));
        assert!(note.has(MENTION) && note.has(COMMENT) && note.has(TABLE));
        assert!(chat.has(MENTION) && !chat.has(HEADING) && !chat.has(TABLE));
    }

    #[test]
    fn duplicate_names_conflict() {
        let err = Schema::register(vec![doc(), paragraph(), paragraph()]).unwrap_err();
        assert!(matches!(err, SchemaError::Conflict(_)));
    }

    #[test]
    fn shared_token_conflicts_unless_ignored() {
        let clash = SchemaEntry::block("other", ContentKind::Inline)
            .markdown(MarkdownBinding::tokens(&["paragraph"]));
        let err = Schema::register(vec![doc(), paragraph(), clash]).unwrap_err();
        assert!(matches!(err, SchemaError::Conflict(_)));

        let ignored = SchemaEntry::block("other", ContentKind::Inline)
            .markdown(MarkdownBinding::tokens(&["paragraph"]).ignore());
        let schema = Schema::register(vec![doc(), paragraph(), ignored]).unwrap();
        assert_eq!(schema.entry_for_token("paragraph").map(|e| e.name()), Some("paragraph"));
    }

    #[test]
    fn missing_doc_is_rejected() {
        let err = Schema::register(vec![paragraph()]).unwrap_err();
        assert_eq!(err, SchemaError::Missing("doc"));
    }

    #[test]
    fn mark_ranks_follow_registration_order() {
        let schema = Surface::Note.schema().unwrap();
        let link = schema.mark_spec(LINK).unwrap();
        let code = schema.mark_spec(CODE).unwrap();
        assert!(link.rank < code.rank);
        assert!(!schema.mark_spec(COMMENT).unwrap().exclusive);
    }

    #[test]
    fn validation_reports_missing_attrs() {
        let schema = Surface::Note.schema().unwrap();
        let mention = schema.entry(MENTION).unwrap();
        let err = schema
            .validate(mention, &Attrs::new().with("label", "Ann"))
            .unwrap_err();
        assert_eq!(err.attr, "id");
    }

    #[test]
    fn node_fills_defaults() {
        let schema = Surface::Markdown.schema().unwrap();
        let list = schema.node(ORDERED_LIST, Attrs::new(), vec![]).unwrap();
        assert_eq!(list.attrs().int("order"), Some(1));
    }

    #[test]
    fn surface_parses_case_insensitively() {
        assert_eq!("Chat".parse::<Surface>().unwrap(), Surface::Chat);
        assert!("slack".parse::<Surface>().is_err());
    }
}
