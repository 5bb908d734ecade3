use std::ops::Range;

use crate::model::Attrs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nesting {
    Open,
    Close,
    SelfClosing,
}

/// One entry of the flat markdown token stream.
///
/// Containers appear as an `Open`/`Close` pair, everything else as a single
/// `SelfClosing` token whose `content` carries its text.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub name: &'static str,
    pub nesting: Nesting,
    pub attrs: Attrs,
    pub content: String,
    /// Paragraphs synthesized inside tight list items.
    pub hidden: bool,
    /// Byte range of the source the token came from.
    pub source: Range<usize>,
}

impl Token {
    pub(crate) fn new(name: &'static str, nesting: Nesting, source: Range<usize>) -> Self {
        Self {
            name,
            nesting,
            attrs: Attrs::new(),
            content: String::new(),
            hidden: false,
            source,
        }
    }

    #[must_use]
    pub(crate) fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    #[must_use]
    pub(crate) fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;
        self
    }

    #[must_use]
    pub(crate) fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}
