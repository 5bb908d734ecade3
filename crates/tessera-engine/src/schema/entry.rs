use crate::model::{Attrs, Mark, Node};
use crate::parsing::{HtmlTag, Token};
use crate::serialize::MarkdownWriter;

/// What a block accepts as children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Other blocks.
    Blocks,
    /// Text, inline atoms and marks.
    Inline,
    /// Plain text only, no marks.
    Code,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Block(ContentKind),
    Leaf { inline: bool },
    Mark { exclusive: bool },
}

pub type TokenAttrs = fn(&Token, &[Token], usize) -> Attrs;
pub type TagAttrs = fn(&HtmlTag) -> Attrs;

/// How an entry is written back to markdown.
#[derive(Clone, Copy)]
pub enum MarkdownWrite {
    Block(fn(&MarkdownWriter<'_>, &Node) -> String),
    Inline(fn(&Node) -> String),
    Mark {
        open: fn(&Mark) -> String,
        close: fn(&Mark) -> String,
    },
}

/// Markdown token binding of an entry.
#[derive(Clone)]
pub struct MarkdownBinding {
    pub tokens: Vec<&'static str>,
    /// The token carries its whole content and has no close token.
    pub no_close_token: bool,
    /// Tokens are skipped but their children are still processed.
    pub ignore: bool,
    pub get_attrs: Option<TokenAttrs>,
    pub write: Option<MarkdownWrite>,
}

impl MarkdownBinding {
    pub fn tokens(tokens: &[&'static str]) -> Self {
        Self {
            tokens: tokens.to_vec(),
            no_close_token: false,
            ignore: false,
            get_attrs: None,
            write: None,
        }
    }

    #[must_use]
    pub fn no_close_token(mut self) -> Self {
        self.no_close_token = true;
        self
    }

    #[must_use]
    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    #[must_use]
    pub fn attrs(mut self, f: TokenAttrs) -> Self {
        self.get_attrs = Some(f);
        self
    }

    #[must_use]
    pub fn write(mut self, write: MarkdownWrite) -> Self {
        self.write = Some(write);
        self
    }
}

/// Matches an HTML tag to an entry.
#[derive(Clone)]
pub struct DomRule {
    pub tag: &'static str,
    /// Attributes the tag must carry, optionally with an exact value.
    pub require: Vec<(&'static str, Option<&'static str>)>,
    pub get_attrs: Option<TagAttrs>,
    /// Higher priority rules are tried first.
    pub priority: u8,
}

impl DomRule {
    pub fn tag(tag: &'static str) -> Self {
        Self {
            tag,
            require: Vec::new(),
            get_attrs: None,
            priority: 50,
        }
    }

    #[must_use]
    pub fn requires(mut self, attr: &'static str, value: Option<&'static str>) -> Self {
        self.require.push((attr, value));
        self
    }

    #[must_use]
    pub fn attrs(mut self, f: TagAttrs) -> Self {
        self.get_attrs = Some(f);
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn matches(&self, tag: &HtmlTag) -> bool {
        tag.name == self.tag
            && self.require.iter().all(|(name, value)| match value {
                Some(v) => tag.attr(name) == Some(*v),
                None => tag.attr(name).is_some(),
            })
    }
}

/// Opening and closing HTML for a node or mark. Leaves only use `open`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HtmlParts {
    pub open: String,
    pub close: String,
}

impl HtmlParts {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }
}

pub type NodeView = fn(&Attrs) -> HtmlParts;

/// Attributes ignored when deciding whether two adjacent containers may be
/// merged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JoinPolicy {
    pub ignored_attrs: Vec<&'static str>,
}

/// One node or mark type the schema knows.
#[derive(Clone)]
pub struct SchemaEntry {
    pub(crate) name: &'static str,
    pub(crate) kind: EntryKind,
    pub(crate) required_attrs: Vec<&'static str>,
    pub(crate) defaults: Attrs,
    pub(crate) markdown: Option<MarkdownBinding>,
    pub(crate) dom: Vec<DomRule>,
    pub(crate) view: Option<NodeView>,
    pub(crate) draggable: bool,
    pub(crate) drag_isolating: bool,
    pub(crate) join: Option<JoinPolicy>,
}

impl std::fmt::Debug for SchemaEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaEntry")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("markdown", &self.markdown.as_ref().map(|m| &m.tokens))
            .field("dom", &self.dom.iter().map(|r| r.tag).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl SchemaEntry {
    fn new(name: &'static str, kind: EntryKind) -> Self {
        Self {
            name,
            kind,
            required_attrs: Vec::new(),
            defaults: Attrs::new(),
            markdown: None,
            dom: Vec::new(),
            view: None,
            draggable: false,
            drag_isolating: false,
            join: None,
        }
    }

    pub fn block(name: &'static str, content: ContentKind) -> Self {
        Self::new(name, EntryKind::Block(content))
    }

    pub fn leaf(name: &'static str, inline: bool) -> Self {
        Self::new(name, EntryKind::Leaf { inline })
    }

    pub fn mark(name: &'static str, exclusive: bool) -> Self {
        Self::new(name, EntryKind::Mark { exclusive })
    }

    #[must_use]
    pub fn requires(mut self, attrs: &[&'static str]) -> Self {
        self.required_attrs.extend_from_slice(attrs);
        self
    }

    #[must_use]
    pub fn default_attr(mut self, key: &str, value: impl Into<crate::model::AttrValue>) -> Self {
        self.defaults.set(key, value);
        self
    }

    #[must_use]
    pub fn markdown(mut self, binding: MarkdownBinding) -> Self {
        self.markdown = Some(binding);
        self
    }

    #[must_use]
    pub fn dom(mut self, rule: DomRule) -> Self {
        self.dom.push(rule);
        self
    }

    #[must_use]
    pub fn view(mut self, view: NodeView) -> Self {
        self.view = Some(view);
        self
    }

    #[must_use]
    pub fn draggable(mut self) -> Self {
        self.draggable = true;
        self
    }

    #[must_use]
    pub fn drag_isolating(mut self) -> Self {
        self.drag_isolating = true;
        self
    }

    #[must_use]
    pub fn joinable(mut self, ignored_attrs: &[&'static str]) -> Self {
        self.join = Some(JoinPolicy {
            ignored_attrs: ignored_attrs.to_vec(),
        });
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn content(&self) -> Option<ContentKind> {
        match self.kind {
            EntryKind::Block(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_mark(&self) -> bool {
        matches!(self.kind, EntryKind::Mark { .. })
    }

    pub fn is_textblock(&self) -> bool {
        matches!(
            self.kind,
            EntryKind::Block(ContentKind::Inline | ContentKind::Code)
        )
    }

    pub fn has_markdown_binding(&self) -> bool {
        self.markdown.is_some()
    }

    pub fn has_dom_rule(&self) -> bool {
        !self.dom.is_empty()
    }

    pub fn has_node_view(&self) -> bool {
        self.view.is_some()
    }

    pub fn markdown_binding(&self) -> Option<&MarkdownBinding> {
        self.markdown.as_ref()
    }

    pub fn dom_rules(&self) -> &[DomRule] {
        &self.dom
    }

    pub fn node_view(&self) -> Option<NodeView> {
        self.view
    }

    pub fn is_draggable(&self) -> bool {
        self.draggable
    }

    pub fn is_drag_isolating(&self) -> bool {
        self.drag_isolating
    }

    pub fn join_policy(&self) -> Option<&JoinPolicy> {
        self.join.as_ref()
    }

    pub fn required_attrs(&self) -> &[&'static str] {
        &self.required_attrs
    }

    pub fn defaults(&self) -> &Attrs {
        &self.defaults
    }
}
