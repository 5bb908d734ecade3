//! Schema-driven rich-text document core: markdown and HTML import, a
//! transaction model with position mapping, comment anchors, block reordering
//! and code highlighting, behind a small editor command surface.

pub mod comments;
pub mod decoration;
pub mod editor;
pub mod highlight;
pub mod model;
pub mod parsing;
pub mod reorder;
pub mod schema;
pub mod serialize;
pub mod transform;

// Re-export key types for easier usage
pub use comments::{Anchor, AnchorId, AnchorState, CommentAction, CommentOverlay, OverlayEvent};
pub use decoration::{Decoration, DecorationSet};
pub use editor::{Content, Editor, EditorError, EditorOptions, Patch};
pub use highlight::{HighlightDecorator, LanguageRegistry};
pub use model::{Attrs, Mark, Node, ResolvedPos};
pub use parsing::{HtmlParser, MarkdownParser, ParseFailure, ParseOptions};
pub use schema::{Schema, SchemaEntry, SchemaError, Surface};
pub use serialize::{format_tree, to_html, to_markdown};
pub use transform::{Applied, Selection, Step, Transaction};
