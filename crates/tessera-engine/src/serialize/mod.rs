//! Writing documents back out: markdown, persisted HTML and the debug tree.

pub mod html;
pub mod markdown;
mod tree;

pub use html::to_html;
pub use markdown::{MarkdownWriter, to_markdown};
pub use tree::format_tree;
