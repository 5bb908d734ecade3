//! Code block syntax highlighting.
//!
//! Grammars live in a [`LanguageRegistry`] that callers build and pass in.
//! The [`HighlightDecorator`] re-tokenizes code blocks only when a
//! transaction could have invalidated its spans and maps them otherwise.

mod decorator;
mod grammars;
mod language;

pub use decorator::{HighlightDecorator, Scheduler, Ticket};
pub use language::{Grammar, HighlightError, LanguageRegistry, Span};
