//! Importing markdown and persisted HTML into documents.

mod builder;
pub mod content;
pub mod html;
pub mod markdown;
pub mod token;
pub mod tokenizer;

pub use content::HtmlParser;
pub use html::{HtmlPiece, HtmlTag, TagKind, lex};
pub use markdown::{DEFAULT_MAX_NESTING, MarkdownParser, ParseOptions};
pub use token::{Nesting, Token};
pub use tokenizer::tokenize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFailure {
    #[error("containers nest deeper than {limit} levels")]
    TooDeep { limit: usize },
    #[error("unbalanced token stream: {0}")]
    Unbalanced(String),
    #[error("schema has no document root")]
    NoRoot,
}
